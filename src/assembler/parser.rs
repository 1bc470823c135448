use super::{AssemblyError, AssemblyErrors, ErrorKind};

/** A leaf of an operand expression. */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Integer(i64),
    Symbol(String),
    Plus,
    Minus,
    /** `.`, the address of the current command. */
    Offset,
    String(Vec<u8>),
    /** A bracketed memory operand. */
    Memory(Vec<Token>),
}

/** One comma-separated operand. */
pub type Expression = Vec<Token>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Label(String),
    Directive(String, Vec<Expression>),
    Instruction(String, Vec<Expression>),
}

/** A command, with the source line it came from. */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    /** 1-based source line. */
    pub line: usize,
    /** The text of the line, for diagnostics. */
    pub text: String,
}

impl Node {
    pub fn error(&self, kind: ErrorKind) -> AssemblyError {
        AssemblyError {kind, line: self.line, source_text: self.text.clone()}
    }
}

//-----------------------------------------------------------------------------

/** The lexical structure of one line. */
#[derive(Debug, Clone, PartialEq, Eq)]
enum Lexeme {
    Word(String),
    String(Vec<u8>),
    Comma,
    Colon,
    Plus,
    Minus,
    Open,
    Close,
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

fn escape(c: char) -> u8 {
    match c {
        'n' => b'\n',
        't' => b'\t',
        'r' => b'\r',
        '0' => 0,
        c => c as u8,
    }
}

fn lex(line: &str) -> Result<Vec<Lexeme>, ErrorKind> {
    let mut lexemes = Vec::new();
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '#' => break,
            ',' => lexemes.push(Lexeme::Comma),
            ':' => lexemes.push(Lexeme::Colon),
            '+' => lexemes.push(Lexeme::Plus),
            '-' => lexemes.push(Lexeme::Minus),
            '[' => lexemes.push(Lexeme::Open),
            ']' => lexemes.push(Lexeme::Close),
            '"' => {
                let mut bytes = Vec::new();
                loop {
                    match chars.next() {
                        None => return Err(ErrorKind::UnterminatedString),
                        Some('"') => break,
                        Some('\\') => bytes.push(escape(chars.next().ok_or(ErrorKind::UnterminatedString)?)),
                        Some(c) => {
                            let mut buffer = [0u8; 4];
                            bytes.extend_from_slice(c.encode_utf8(&mut buffer).as_bytes());
                        },
                    }
                }
                lexemes.push(Lexeme::String(bytes));
            },
            c if c.is_whitespace() => {},
            c if is_word_char(c) => {
                let mut word = String::from(c);
                while let Some(&c) = chars.peek() {
                    if !is_word_char(c) { break; }
                    word.push(c);
                    chars.next();
                }
                lexemes.push(Lexeme::Word(word));
            },
            c => return Err(ErrorKind::UnexpectedCharacter(c)),
        }
    }
    Ok(lexemes)
}

/** Parses a decimal, `0x` hexadecimal or `0b` binary literal. */
pub fn parse_integer(word: &str) -> Option<i64> {
    let (digits, radix) = if let Some(hex) = word.strip_prefix("0x") {
        (hex, 16)
    } else if let Some(binary) = word.strip_prefix("0b") {
        (binary, 2)
    } else {
        (word, 10)
    };
    i64::from_str_radix(digits, radix).ok()
}

fn word_token(word: String) -> Result<Token, ErrorKind> {
    if word == "." {
        Ok(Token::Offset)
    } else if word.starts_with(|c: char| c.is_ascii_digit()) {
        parse_integer(&word).map(Token::Integer).ok_or(ErrorKind::InvalidInteger(word))
    } else {
        Ok(Token::Symbol(word))
    }
}

/** Splits `lexemes` into comma-separated operands. */
fn operands(lexemes: impl Iterator<Item=Lexeme>) -> Result<Vec<Expression>, ErrorKind> {
    let mut operands = Vec::new();
    let mut current = Vec::new();
    let mut memory: Option<Vec<Token>> = None;
    let mut seen_any = false;
    for lexeme in lexemes {
        seen_any = true;
        let token = match lexeme {
            Lexeme::Comma => {
                if let Some(tokens) = memory.take() { current.push(Token::Memory(tokens)); }
                if current.is_empty() { return Err(ErrorKind::MissingOperand); }
                operands.push(std::mem::take(&mut current));
                continue;
            },
            Lexeme::Open => {
                if memory.is_some() { return Err(ErrorKind::NestedMemory); }
                memory = Some(Vec::new());
                continue;
            },
            Lexeme::Close => {
                let tokens = memory.take().ok_or(ErrorKind::UnmatchedBracket)?;
                current.push(Token::Memory(tokens));
                continue;
            },
            Lexeme::Word(word) => word_token(word)?,
            Lexeme::String(bytes) => Token::String(bytes),
            Lexeme::Plus => Token::Plus,
            Lexeme::Minus => Token::Minus,
            Lexeme::Colon => return Err(ErrorKind::UnexpectedCharacter(':')),
        };
        match memory {
            Some(ref mut tokens) => tokens.push(token),
            None => current.push(token),
        }
    }
    // A memory operand may be closed by the end of the line.
    if let Some(tokens) = memory { current.push(Token::Memory(tokens)); }
    if !current.is_empty() {
        operands.push(current);
    } else if seen_any {
        return Err(ErrorKind::MissingOperand);
    }
    Ok(operands)
}

fn parse_line(line: &str, number: usize, nodes: &mut Vec<Node>) -> Result<(), ErrorKind> {
    let node = |kind| Node {kind, line: number, text: line.trim().to_string()};
    let mut lexemes = lex(line)?.into_iter().peekable();
    loop {
        let word = match lexemes.next() {
            None => return Ok(()),
            Some(Lexeme::Word(word)) => word,
            Some(Lexeme::Colon) => return Err(ErrorKind::UnexpectedCharacter(':')),
            Some(_) => return Err(ErrorKind::MalformedOperand),
        };
        if lexemes.peek() == Some(&Lexeme::Colon) {
            lexemes.next();
            nodes.push(node(NodeKind::Label(word)));
            continue;
        }
        let operands = operands(lexemes)?;
        nodes.push(node(match word.strip_prefix('.') {
            Some(name) => NodeKind::Directive(name.to_string(), operands),
            None => NodeKind::Instruction(word, operands),
        }));
        return Ok(());
    }
}

/**
 * Parses assembly source into a list of labels, directives and instructions.
 * Errors are collected for every line before giving up.
 */
pub fn parse(source: &str) -> Result<Vec<Node>, AssemblyErrors> {
    let mut nodes = Vec::new();
    let mut errors = Vec::new();
    for (i, line) in source.lines().enumerate() {
        if let Err(kind) = parse_line(line, i + 1, &mut nodes) {
            errors.push(AssemblyError {kind, line: i + 1, source_text: line.trim().to_string()});
        }
    }
    if errors.is_empty() { Ok(nodes) } else { Err(AssemblyErrors(errors)) }
}

//-----------------------------------------------------------------------------

#[cfg(test)]
pub mod tests {
    use super::*;
    use Token::*;

    fn symbol(s: &str) -> Token { Symbol(s.to_string()) }

    #[test]
    fn instruction() {
        let nodes = parse("loop: add r0, [r1+4] # comment\n\n  hlt").unwrap();
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0].kind, NodeKind::Label("loop".into()));
        assert_eq!(nodes[1].kind, NodeKind::Instruction("add".into(), vec![
            vec![symbol("r0")],
            vec![Memory(vec![symbol("r1"), Plus, Integer(4)])],
        ]));
        assert_eq!(nodes[1].line, 1);
        assert_eq!(nodes[2].kind, NodeKind::Instruction("hlt".into(), vec![]));
        assert_eq!(nodes[2].line, 3);
    }

    #[test]
    fn directives() {
        let nodes = parse(".define FOO 0x2A\n.byte \"a#\\\"\", . - 1, 0b11\n.entrypoint").unwrap();
        assert_eq!(nodes[0].kind, NodeKind::Directive("define".into(), vec![
            vec![symbol("FOO"), Integer(42)],
        ]));
        assert_eq!(nodes[1].kind, NodeKind::Directive("byte".into(), vec![
            vec![String(b"a#\"".to_vec())],
            vec![Offset, Minus, Integer(1)],
            vec![Integer(3)],
        ]));
        assert_eq!(nodes[2].kind, NodeKind::Directive("entrypoint".into(), vec![]));
    }

    #[test]
    fn memory_closed_by_newline() {
        let nodes = parse("mov r0, [r1\nnop").unwrap();
        assert_eq!(nodes[0].kind, NodeKind::Instruction("mov".into(), vec![
            vec![symbol("r0")],
            vec![Memory(vec![symbol("r1")])],
        ]));
        assert_eq!(nodes[1].line, 2);
    }

    #[test]
    fn errors() {
        let errors = parse("mov r0, \"abc\nmov r0,, r1\nmov [[r0]]\nadd r0, 12z\nsub r0, $").unwrap_err();
        let kinds: Vec<ErrorKind> = errors.iter().map(|e| e.kind.clone()).collect();
        assert_eq!(kinds, vec![
            ErrorKind::UnterminatedString,
            ErrorKind::MissingOperand,
            ErrorKind::NestedMemory,
            ErrorKind::InvalidInteger("12z".into()),
            ErrorKind::UnexpectedCharacter('$'),
        ]);
        assert_eq!(errors.iter().map(|e| e.line).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
    }
}

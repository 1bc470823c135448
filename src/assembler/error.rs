use thiserror::{Error};

/** Classification of assembly errors. */
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    #[error("unexpected character `{0}`")]
    UnexpectedCharacter(char),
    #[error("unterminated string")]
    UnterminatedString,
    #[error("`]` without matching `[`")]
    UnmatchedBracket,
    #[error("memory operands cannot be nested")]
    NestedMemory,
    #[error("invalid integer `{0}`")]
    InvalidInteger(String),
    #[error("missing operand")]
    MissingOperand,
    #[error("malformed operand")]
    MalformedOperand,
    #[error("value {0} does not fit in a byte")]
    ValueOutOfRange(i64),
    #[error("unknown directive `.{0}`")]
    UnknownDirective(String),
    #[error("`.{0}` takes no operands")]
    UnexpectedOperands(String),
    #[error("unknown mnemonic `{0}`")]
    UnknownMnemonic(String),
    #[error("no encoding of `{0}` accepts these operands")]
    NoMatchingEncoding(String),
    #[error("unresolved symbol `{0}`")]
    UnresolvedSymbol(String),
    #[error("label `{0}` is already defined")]
    DuplicateLabel(String),
    #[error("register `{0}` cannot be used in an arithmetic expression")]
    RegisterInExpression(String),
    #[error("register `{0}` cannot address memory")]
    InvalidAddressRegister(String),
    #[error("registers cannot be negated")]
    NegatedRegister,
    #[error("addition is the only arithmetic operation available")]
    RegisterSubtraction,
    #[error("unsupported addressing mode")]
    InvalidAddressingMode,
    #[error("the image exceeds 256 bytes")]
    ImageOverflow,
}

/** An error, with the line and text of the command that caused it. */
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {kind} (in `{source_text}`)")]
pub struct AssemblyError {
    pub kind: ErrorKind,
    /** 1-based source line. */
    pub line: usize,
    /** The offending command. */
    pub source_text: String,
}

fn list(errors: &[AssemblyError]) -> String {
    errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("\n")
}

/** All the errors found while assembling a program. */
#[derive(Debug, Clone, PartialEq, Eq, Default, Error)]
#[error("{}", list(.0))]
pub struct AssemblyErrors(pub Vec<AssemblyError>);

impl AssemblyErrors {
    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn iter(&self) -> impl Iterator<Item=&AssemblyError> { self.0.iter() }

    /** Tests whether any error has kind `kind`. */
    pub fn contains(&self, kind: &ErrorKind) -> bool {
        self.0.iter().any(|e| e.kind == *kind)
    }
}

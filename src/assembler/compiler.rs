use std::collections::{HashMap};
use tracing::{debug};

use crate::arch::{Instruction, Memory, Mnemonic, Operand, Register, MEMORY_SIZE};
use super::{parse, AssemblyError, AssemblyErrors, Binary, ErrorKind, Expression, Node, NodeKind, Token};
use ErrorKind::*;

/** The value of a `.define`. */
#[derive(Debug, Clone, PartialEq, Eq)]
enum Define {
    Integer(i64),
    /** An alias for a label, another define, or a register. */
    Symbol(String),
}

/** The meaning of a symbol. */
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Value {
    Integer(i64),
    Register(Register),
}

/** Returned by handlers when the image overflows, aborting the compilation. */
#[derive(Debug)]
struct Overflow;

/**
 * One traversal of the AST. The first pass has no [`Binary`]: it records
 * labels and measures commands. The second pass emits bytes.
 */
struct Pass<'a> {
    binary: Option<&'a mut Binary>,
    labels: &'a mut HashMap<String, usize>,
    /** Defines are scoped to the pass, and apply from the point of definition. */
    defines: HashMap<String, Define>,
    errors: &'a mut Vec<AssemblyError>,
}

impl<'a> Pass<'a> {
    fn new(
        binary: Option<&'a mut Binary>,
        labels: &'a mut HashMap<String, usize>,
        errors: &'a mut Vec<AssemblyError>,
    ) -> Self {
        Pass {binary, labels, defines: HashMap::new(), errors}
    }

    fn is_measuring(&self) -> bool { self.binary.is_none() }

    /**
     * Records an error. Most errors are reported by the second pass only, so
     * that each is reported once.
     */
    fn error(&mut self, node: &Node, kind: ErrorKind) {
        if !self.is_measuring() {
            self.errors.push(node.error(kind));
        }
    }

    /** Returns `false` if the image overflowed. */
    fn run(&mut self, nodes: &[Node]) -> bool {
        let mut offset = 0;
        for node in nodes {
            let next = match &node.kind {
                NodeKind::Label(name) => Ok(self.label(offset, node, name)),
                NodeKind::Directive(name, operands) => self.directive(offset, node, name, operands),
                NodeKind::Instruction(name, operands) => self.instruction(offset, node, name, operands),
            };
            match next {
                Ok(next) => { offset = next; },
                Err(Overflow) => return false,
            }
        }
        true
    }

    fn label(&mut self, offset: usize, node: &Node, name: &str) -> usize {
        if self.is_measuring() && self.labels.insert(name.to_string(), offset).is_some() {
            self.errors.push(node.error(DuplicateLabel(name.to_string())));
        }
        offset
    }

    fn emit(&mut self, offset: usize, node: &Node, bytes: &[u8]) -> Result<usize, Overflow> {
        let end = offset + bytes.len();
        if end > MEMORY_SIZE {
            self.errors.push(node.error(ImageOverflow));
            return Err(Overflow);
        }
        if let Some(binary) = self.binary.as_deref_mut() {
            binary.data[offset..end].copy_from_slice(bytes);
        }
        Ok(end)
    }

    // Symbols and expressions.

    fn resolve(&mut self, node: &Node, name: &str) -> Option<Value> {
        if let Some(r) = Register::from_name(name) { return Some(Value::Register(r)); }
        let target = match self.defines.get(name) {
            Some(Define::Integer(value)) => return Some(Value::Integer(*value)),
            Some(Define::Symbol(alias)) => alias.clone(),
            None => name.to_string(),
        };
        if target != name {
            if let Some(r) = Register::from_name(&target) { return Some(Value::Register(r)); }
            if let Some(Define::Integer(value)) = self.defines.get(&target) {
                return Some(Value::Integer(*value));
            }
        }
        if let Some(&address) = self.labels.get(&target) {
            return Some(Value::Integer(address as i64));
        }
        if self.is_measuring() {
            // Probably a forward reference.
            return Some(Value::Integer(0));
        }
        self.error(node, UnresolvedSymbol(name.to_string()));
        None
    }

    /** Evaluates a term of an expression. */
    fn term(&mut self, offset: usize, node: &Node, token: &Token) -> Option<Value> {
        match token {
            Token::Integer(value) => Some(Value::Integer(*value)),
            Token::Offset => Some(Value::Integer(offset as i64)),
            Token::Symbol(name) => self.resolve(node, name),
            _ => {
                self.error(node, MalformedOperand);
                None
            },
        }
    }

    /**
     * Splits `tokens` into signed terms, passing each to `callback`.
     * Returns whether any binary `-` was seen.
     */
    fn terms(
        &mut self,
        offset: usize,
        node: &Node,
        tokens: &[Token],
        mut callback: impl FnMut(&mut Self, i64, Value) -> Option<()>,
    ) -> Option<bool> {
        let mut sign = 1;
        let mut expect_term = true;
        let mut subtracted = false;
        for token in tokens {
            match (token, expect_term) {
                (Token::Plus, true) => {},
                (Token::Minus, true) => { sign = -sign; },
                (Token::Plus, false) => { expect_term = true; },
                (Token::Minus, false) => { expect_term = true; sign = -1; subtracted = true; },
                (token, true) => {
                    let value = self.term(offset, node, token)?;
                    callback(self, sign, value)?;
                    sign = 1;
                    expect_term = false;
                },
                (_, false) => {
                    self.error(node, MalformedOperand);
                    return None;
                },
            }
        }
        if expect_term {
            self.error(node, MalformedOperand);
            return None;
        }
        Some(subtracted)
    }

    fn evaluate(&mut self, offset: usize, node: &Node, tokens: &[Token]) -> Option<i64> {
        let mut total = 0i64;
        self.terms(offset, node, tokens, |pass, sign, value| match value {
            Value::Integer(value) => {
                total += sign * value;
                Some(())
            },
            Value::Register(r) => {
                pass.error(node, RegisterInExpression(r.name().to_string()));
                None
            },
        })?;
        Some(total)
    }

    /** The first pass may see forward references as 0, so it does not check the range. */
    fn byte(&mut self, node: &Node, value: i64) -> Option<u8> {
        if self.is_measuring() || (-128..=255).contains(&value) {
            Some(value as u8)
        } else {
            self.error(node, ValueOutOfRange(value));
            None
        }
    }

    // Operands.

    fn memory(&mut self, offset: usize, node: &Node, tokens: &[Token]) -> Option<Memory> {
        let mut registers = Vec::new();
        let mut total = 0i64;
        let mut has_offset = false;
        let subtracted = self.terms(offset, node, tokens, |pass, sign, value| match value {
            Value::Integer(value) => {
                total += sign * value;
                has_offset = true;
                Some(())
            },
            Value::Register(r) => {
                if sign < 0 {
                    pass.error(node, if registers.is_empty() { NegatedRegister } else { RegisterSubtraction });
                    return None;
                }
                if !r.is_general() {
                    pass.error(node, InvalidAddressRegister(r.name().to_string()));
                    return None;
                }
                registers.push(r);
                Some(())
            },
        })?;
        match registers[..] {
            [] => Some(Memory::Offset(self.byte(node, total)?)),
            [base] if !has_offset => Some(Memory::Register(base)),
            [base] => Some(Memory::RelativeOffset(self.byte(node, total)?, base)),
            [_, _] if subtracted => {
                self.error(node, RegisterSubtraction);
                None
            },
            [base, index] if !has_offset => Some(Memory::RelativeRegister(base, index)),
            _ => {
                self.error(node, InvalidAddressingMode);
                None
            },
        }
    }

    /** Branches take an absolute target and encode it relative to `offset`. */
    fn immediate(&mut self, offset: usize, node: &Node, mnemonic: Mnemonic, value: i64) -> Option<Operand> {
        let value = self.byte(node, value)?;
        Some(if mnemonic.is_taken(0).is_some() {
            Operand::Relative(value.wrapping_sub(offset as u8) as i8)
        } else {
            Operand::Immediate(value)
        })
    }

    fn operand(&mut self, offset: usize, node: &Node, mnemonic: Mnemonic, tokens: &[Token]) -> Option<Operand> {
        match tokens {
            [Token::Memory(inner)] => self.memory(offset, node, inner).map(Operand::Memory),
            [Token::Symbol(name)] => match self.resolve(node, name)? {
                Value::Register(r) => Some(Operand::Register(r)),
                Value::Integer(value) => self.immediate(offset, node, mnemonic, value),
            },
            _ => {
                let value = self.evaluate(offset, node, tokens)?;
                self.immediate(offset, node, mnemonic, value)
            },
        }
    }

    // Commands.

    fn instruction(&mut self, offset: usize, node: &Node, name: &str, operands: &[Expression]) -> Result<usize, Overflow> {
        let mnemonic = match Mnemonic::from_name(name) {
            Some(mnemonic) => mnemonic,
            None => {
                self.error(node, UnknownMnemonic(name.to_string()));
                return Ok(offset);
            },
        };
        if operands.len() > 3 {
            self.error(node, NoMatchingEncoding(name.to_string()));
            return Ok(offset);
        }
        let mut values = [Operand::None; 3];
        for (value, tokens) in values.iter_mut().zip(operands) {
            match self.operand(offset, node, mnemonic, tokens) {
                Some(operand) => { *value = operand; },
                None => return Ok(offset),
            }
        }
        match Instruction::new(mnemonic, values) {
            Some(instruction) => self.emit(offset, node, &instruction.encode()),
            None => {
                self.error(node, NoMatchingEncoding(name.to_string()));
                Ok(offset)
            },
        }
    }

    fn directive(&mut self, offset: usize, node: &Node, name: &str, operands: &[Expression]) -> Result<usize, Overflow> {
        match name {
            "define" => self.define(offset, node, operands),
            "byte" => return self.bytes(offset, node, operands),
            "entrypoint" => {
                if !operands.is_empty() {
                    self.error(node, UnexpectedOperands(name.to_string()));
                } else if let Some(binary) = self.binary.as_deref_mut() {
                    binary.entrypoint = offset as u8;
                }
            },
            "port" => match operands {
                [tokens] => match &tokens[..] {
                    [Token::Symbol(port)] => {
                        self.label(offset, node, port);
                        if let Some(binary) = self.binary.as_deref_mut() {
                            binary.ports.insert(port.clone(), offset as u8);
                        }
                    },
                    _ => self.error(node, MalformedOperand),
                },
                [] => self.error(node, MissingOperand),
                _ => self.error(node, MalformedOperand),
            },
            _ => self.error(node, UnknownDirective(name.to_string())),
        }
        Ok(offset)
    }

    /** `.define NAME VALUE`, where VALUE is an expression or a symbol. */
    fn define(&mut self, offset: usize, node: &Node, operands: &[Expression]) {
        let tokens: Vec<Token> = operands.concat();
        let (name, value) = match tokens.split_first() {
            Some((Token::Symbol(name), value)) => (name.clone(), value),
            Some(_) => return self.error(node, MalformedOperand),
            None => return self.error(node, MissingOperand),
        };
        let define = match value {
            [] => return self.error(node, MissingOperand),
            [Token::Symbol(alias)] => Define::Symbol(alias.clone()),
            _ => match self.evaluate(offset, node, value) {
                Some(value) => Define::Integer(value),
                None => return,
            },
        };
        self.defines.insert(name, define);
    }

    /** `.byte`, whose operands are expressions or strings. */
    fn bytes(&mut self, offset: usize, node: &Node, operands: &[Expression]) -> Result<usize, Overflow> {
        let mut bytes = Vec::new();
        for tokens in operands {
            if let [Token::String(string)] = &tokens[..] {
                bytes.extend_from_slice(string);
            } else {
                let position = offset + bytes.len();
                match self.evaluate(position, node, tokens).and_then(|value| self.byte(node, value)) {
                    Some(byte) => bytes.push(byte),
                    None => bytes.push(0),
                }
            }
        }
        self.emit(offset, node, &bytes)
    }
}

//-----------------------------------------------------------------------------

/**
 * Compiles parsed source into a [`Binary`].
 *
 * The AST is traversed twice by the same handlers: once to find the label
 * addresses, and once to emit bytes. Errors are collected across the whole
 * program. An image that exceeds the memory aborts the compilation.
 */
pub fn create_binary(nodes: &[Node]) -> Result<Binary, AssemblyErrors> {
    let mut labels = HashMap::new();
    let mut errors = Vec::new();
    let mut binary = Binary::new();
    if Pass::new(None, &mut labels, &mut errors).run(nodes) {
        Pass::new(Some(&mut binary), &mut labels, &mut errors).run(nodes);
    }
    if errors.is_empty() {
        debug!(labels = labels.len(), ports = binary.ports.len(), "assembled");
        Ok(binary)
    } else {
        debug!(errors = errors.len(), "assembly failed");
        Err(AssemblyErrors(errors))
    }
}

/** Parses and compiles `source`. */
pub fn assemble(source: &str) -> Result<Binary, AssemblyErrors> {
    create_binary(&parse(source)?)
}

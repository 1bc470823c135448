//! Assembly language for HubArch.
//!
//! Source is parsed into an AST of labels, directives and instructions, which
//! is then compiled in two passes into a [`Binary`].

mod error;
pub use error::{ErrorKind, AssemblyError, AssemblyErrors};

mod parser;
pub use parser::{parse, parse_integer, Token, Expression, Node, NodeKind};

mod binary;
pub use binary::{Binary};

mod compiler;
pub use compiler::{create_binary, assemble};

//-----------------------------------------------------------------------------

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::arch::{Instruction, Memory, Mnemonic, Operand, Register};

    fn instructions(binary: &Binary, count: usize) -> Vec<String> {
        binary.disassemble(count).into_iter().map(|(_, text)| text).collect()
    }

    #[test]
    fn simple() {
        let binary = assemble("mov r0, 5\nmov r1, 10\nadd r0, r1\nhlt").unwrap();
        assert_eq!(instructions(&binary, 4), vec![
            "mov r0, 5",
            "mov r1, 10",
            "add r0, r1",
            "hlt",
        ]);
        assert_eq!(binary.entrypoint, 0);
    }

    #[test]
    fn memory_operands() {
        let binary = assemble("\
            mov [5], r0\n\
            mov r0, [r1]\n\
            mov r0, [r1+200]\n\
            mov r0, [r1-1]\n\
            mov r0, [r2+r3]\n\
            hlt\n\
        ").unwrap();
        assert_eq!(instructions(&binary, 6), vec![
            "mov [5], r0",
            "mov r0, [r1]",
            "mov r0, [200+r1]",
            "mov r0, [255+r1]",
            "mov r0, [r2+r3]",
            "hlt",
        ]);
    }

    #[test]
    fn labels_and_branches() {
        let binary = assemble("\
            start:\n\
            sub r0, 1\n\
            jnz start\n\
            jmp end\n\
            nop\n\
            end: hlt\n\
        ").unwrap();
        let jnz = Instruction::decode(&binary.data, 3).unwrap();
        assert_eq!(jnz.mnemonic, Mnemonic::Jnz);
        assert_eq!(jnz.branch_target(3), Some(0));
        let jmp = Instruction::decode(&binary.data, 5).unwrap();
        assert_eq!(jmp.branch_target(5), Some(8));
        assert_eq!(Instruction::decode(&binary.data, 8).unwrap().mnemonic, Mnemonic::Hlt);
    }

    #[test]
    fn defines() {
        let binary = assemble("\
            .define COUNTER r1\n\
            .define LIMIT 7\n\
            .define ALSO LIMIT\n\
            mov COUNTER, ALSO\n\
        ").unwrap();
        let mov = Instruction::decode(&binary.data, 0).unwrap();
        assert_eq!(mov.operands[0], Operand::Register(Register::R1));
        assert_eq!(mov.operands[1], Operand::Immediate(7));
    }

    #[test]
    fn directives() {
        let binary = assemble("\
            .byte 1, . + 1, -1, \"hi\"\n\
            .port display\n\
            .entrypoint\n\
            mov r0, [display]\n\
        ").unwrap();
        assert_eq!(&binary.data[..5], &[1, 2, 255, b'h', b'i']);
        assert_eq!(binary.entrypoint, 5);
        assert_eq!(binary.ports.get("display"), Some(&5));
        let mov = Instruction::decode(&binary.data, 5).unwrap();
        assert_eq!(mov.operands[1], Operand::Memory(Memory::Offset(5)));
    }

    #[test]
    fn forward_reference_out_of_range() {
        // `last` is 0 until it is defined, so `last - 200` is out of range at first.
        let source = format!(
            "mov r0, last - 200\nmov r1, [last - 200]\njmp last - 200\n.byte \"{}\"\nlast: hlt",
            "x".repeat(200),
        );
        let binary = assemble(&source).unwrap();
        let mov = Instruction::decode(&binary.data, 0).unwrap();
        let load = Instruction::decode(&binary.data, mov.size as u8).unwrap();
        let jmp_offset = mov.size + load.size;
        let jmp = Instruction::decode(&binary.data, jmp_offset).unwrap();
        let last = (jmp_offset + jmp.size) as usize + 200;
        assert_eq!(Instruction::decode(&binary.data, last as u8).unwrap().mnemonic, Mnemonic::Hlt);
        let target = (last - 200) as u8;
        assert_eq!(mov.operands[1], Operand::Immediate(target));
        assert_eq!(load.operands[1], Operand::Memory(Memory::Offset(target)));
        assert_eq!(jmp.branch_target(jmp_offset), Some(target));
    }

    #[test]
    fn unresolved() {
        let errors = assemble("mov r0, undefined_label").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors.contains(&ErrorKind::UnresolvedSymbol("undefined_label".into())));
        assert_eq!(errors.iter().next().map(|e| e.line), Some(1));
    }

    #[test]
    fn many_errors() {
        let errors = assemble("\
            mov r0, [r1-r2]\n\
            mov r0, [4-r2]\n\
            mov r0, 256\n\
            frob r0\n\
            .entrypoint 3\n\
            .unknown\n\
            jmp r0\n\
            x: x:\n\
            mov r0, [flags]\n\
            add r0, r1 + 1\n\
        ").unwrap_err();
        let kinds: Vec<ErrorKind> = errors.iter().map(|e| e.kind.clone()).collect();
        assert_eq!(kinds, vec![
            ErrorKind::DuplicateLabel("x".into()),
            ErrorKind::RegisterSubtraction,
            ErrorKind::NegatedRegister,
            ErrorKind::ValueOutOfRange(256),
            ErrorKind::UnknownMnemonic("frob".into()),
            ErrorKind::UnexpectedOperands("entrypoint".into()),
            ErrorKind::UnknownDirective("unknown".into()),
            ErrorKind::NoMatchingEncoding("jmp".into()),
            ErrorKind::InvalidAddressRegister("flags".into()),
            ErrorKind::RegisterInExpression("r1".into()),
        ]);
        assert!(errors.to_string().contains("line 1: addition is the only arithmetic operation available"));
    }

    #[test]
    fn overflow() {
        let source = "mov r0, 1\n".repeat(86);
        let errors = assemble(&source).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors.contains(&ErrorKind::ImageOverflow));
        assert!(assemble(&"mov r0, 1\n".repeat(85)).is_ok());
    }
}

use std::fmt::{self, Display, Formatter};

/** Bits of the flags register. */
pub mod flag {
    pub const Z: u8 = 0x01;
    pub const S: u8 = 0x02;
    pub const C: u8 = 0x04;
    pub const O: u8 = 0x08;
}

//-----------------------------------------------------------------------------

/** A set of operand kinds admitted by one operand slot of an opcode. */
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct OperandKinds(u8);

impl OperandKinds {
    pub const NONE: Self = OperandKinds(0);
    pub const IMMEDIATE: Self = OperandKinds(1);
    pub const REGISTER: Self = OperandKinds(2);
    pub const MEMORY: Self = OperandKinds(4);
    pub const RELATIVE: Self = OperandKinds(8);
    pub const REG_MEM: Self = OperandKinds(2 | 4);
    pub const IMM_REG: Self = OperandKinds(1 | 2);
    pub const IMM_REG_MEM: Self = OperandKinds(1 | 2 | 4);

    pub fn is_none(self) -> bool { self.0 == 0 }

    /** Tests whether every kind in `other` is in `self`. */
    pub fn contains(self, other: Self) -> bool { self.0 & other.0 == other.0 }

    /** The number of kinds in `self`. */
    pub fn count(self) -> u32 { self.0.count_ones() }
}

//-----------------------------------------------------------------------------

/** The registers visible to programs. */
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Register {
    R0,
    R1,
    R2,
    R3,
    Flags,
    Pc,
}

use Register::*;

pub const ALL_REGISTERS: [Register; 6] = [R0, R1, R2, R3, Flags, Pc];
pub const GENERAL_REGISTERS: [Register; 4] = [R0, R1, R2, R3];

impl Register {
    /** The 3-bit register field. */
    pub fn code(self) -> u8 {
        match self {
            R0 => 0b100,
            R1 => 0b101,
            R2 => 0b110,
            R3 => 0b111,
            Flags => 0b000,
            Pc => 0b001,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0b100..=0b111 => Some(GENERAL_REGISTERS[(code & 3) as usize]),
            0b000 => Some(Flags),
            0b001 => Some(Pc),
            _ => None,
        }
    }

    /** For general-purpose registers, the 2-bit index. */
    pub fn index(self) -> Option<u8> {
        match self {
            R0 => Some(0),
            R1 => Some(1),
            R2 => Some(2),
            R3 => Some(3),
            Flags | Pc => None,
        }
    }

    pub fn is_general(self) -> bool { self.index().is_some() }

    pub fn name(self) -> &'static str {
        match self {
            R0 => "r0",
            R1 => "r1",
            R2 => "r2",
            R3 => "r3",
            Flags => "flags",
            Pc => "pc",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        ALL_REGISTERS.iter().copied().find(|r| r.name() == name)
    }
}

impl Display for Register {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

//-----------------------------------------------------------------------------

/** Instruction mnemonics. Several opcodes can share a mnemonic. */
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Mnemonic {
    Add, Sub, Mul, Sdiv, Udiv, Smod, Umod, Cmp, Shl, Shr, Xor, Or, And, Mov,
    Not, Neg,
    Jz, Jnz, Js, Jns, Jo, Jno, Jsl, Jsge, Jsle, Jsg, Jul, Juge, Jule, Jug,
    Jmp, Nop, Hlt, Send, Recv,
}

use Mnemonic::*;

/** The two-operand mnemonics, in opcode order. */
pub const BINARY_MNEMONICS: [Mnemonic; 14] =
    [Add, Sub, Mul, Sdiv, Udiv, Smod, Umod, Cmp, Shl, Shr, Xor, Or, And, Mov];

/** The conditional branch mnemonics, in opcode order. */
pub const CONDITIONAL_MNEMONICS: [Mnemonic; 14] =
    [Jz, Jnz, Js, Jns, Jo, Jno, Jsl, Jsge, Jsle, Jsg, Jul, Juge, Jule, Jug];

pub const ALL_MNEMONICS: [Mnemonic; 35] = [
    Add, Sub, Mul, Sdiv, Udiv, Smod, Umod, Cmp, Shl, Shr, Xor, Or, And, Mov,
    Not, Neg,
    Jz, Jnz, Js, Jns, Jo, Jno, Jsl, Jsge, Jsle, Jsg, Jul, Juge, Jule, Jug,
    Jmp, Nop, Hlt, Send, Recv,
];

impl Mnemonic {
    pub fn name(self) -> &'static str {
        match self {
            Add => "add", Sub => "sub", Mul => "mul", Sdiv => "sdiv",
            Udiv => "udiv", Smod => "smod", Umod => "umod", Cmp => "cmp",
            Shl => "shl", Shr => "shr", Xor => "xor", Or => "or",
            And => "and", Mov => "mov", Not => "not", Neg => "neg",
            Jz => "jz", Jnz => "jnz", Js => "js", Jns => "jns", Jo => "jo",
            Jno => "jno", Jsl => "jsl", Jsge => "jsge", Jsle => "jsle",
            Jsg => "jsg", Jul => "jul", Juge => "juge", Jule => "jule",
            Jug => "jug", Jmp => "jmp", Nop => "nop", Hlt => "hlt",
            Send => "send", Recv => "recv",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        ALL_MNEMONICS.iter().copied().find(|m| m.name() == name)
    }

    /** Whether the instruction overwrites its first operand. */
    pub fn writes_destination(self) -> bool {
        matches!(self,
            Add | Sub | Mul | Sdiv | Udiv | Smod | Umod | Shl | Shr |
            Xor | Or | And | Mov | Not | Neg
        )
    }

    /**
     * For branches, decides whether the branch is taken given the flags.
     * Returns `None` for other mnemonics.
     */
    pub fn is_taken(self, flags: u8) -> Option<bool> {
        let z = flags & flag::Z != 0;
        let s = flags & flag::S != 0;
        let c = flags & flag::C != 0;
        let o = flags & flag::O != 0;
        Some(match self {
            Jz => z,
            Jnz => !z,
            Js => s,
            Jns => !s,
            Jo => o,
            Jno => !o,
            Jsl => s != o,
            Jsge => s == o,
            Jsle => z || s != o,
            Jsg => !z && s == o,
            Jul => c,
            Juge => !c,
            Jule => c || z,
            Jug => !c && !z,
            Jmp => true,
            _ => return None,
        })
    }
}

impl Display for Mnemonic {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

//-----------------------------------------------------------------------------

/**
 * Looks up the 6-bit `opcode`, returning its mnemonic and the operand kinds
 * of its three slots. Returns `None` for reserved opcodes.
 */
pub fn lookup(opcode: u8) -> Option<(Mnemonic, [OperandKinds; 3])> {
    use OperandKinds as K;
    Some(match opcode {
        0x00..=0x1B => {
            let destination = if opcode & 1 == 0 { K::REGISTER } else { K::MEMORY };
            (BINARY_MNEMONICS[(opcode >> 1) as usize], [destination, K::IMM_REG_MEM, K::NONE])
        },
        0x1C => (Not, [K::REGISTER, K::NONE, K::NONE]),
        0x1D => (Not, [K::MEMORY, K::NONE, K::NONE]),
        0x1E => (Neg, [K::REGISTER, K::NONE, K::NONE]),
        0x1F => (Neg, [K::MEMORY, K::NONE, K::NONE]),
        0x20..=0x2D => (CONDITIONAL_MNEMONICS[(opcode - 0x20) as usize], [K::RELATIVE, K::NONE, K::NONE]),
        0x2E => (Jmp, [K::RELATIVE, K::NONE, K::NONE]),
        0x2F => (Nop, [K::NONE; 3]),
        0x30 => (Hlt, [K::NONE; 3]),
        0x31 => (Send, [K::IMM_REG_MEM, K::IMM_REG_MEM, K::MEMORY]),
        0x32 => (Recv, [K::IMM_REG_MEM, K::MEMORY, K::NONE]),
        _ => return None,
    })
}

//-----------------------------------------------------------------------------

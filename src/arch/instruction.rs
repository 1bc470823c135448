use std::fmt::{self, Display, Formatter};

use super::{lookup, Mnemonic, OperandKinds, Register, GENERAL_REGISTERS, MEMORY_READ_SPEED};
use crate::util::{BitReader, BitWriter};

/** The four memory addressing modes. Registers are general-purpose. */
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Memory {
    /** `[offset]` */
    Offset(u8),
    /** `[reg]` */
    Register(Register),
    /** `[offset+reg]` */
    RelativeOffset(u8, Register),
    /** `[reg+reg]` */
    RelativeRegister(Register, Register),
}

impl Memory {
    /** Computes the address, given the general-purpose registers. */
    pub fn address(&self, registers: &[u8; 4]) -> u8 {
        let r = |r: &Register| registers[r.index().unwrap_or(0) as usize];
        match self {
            Memory::Offset(offset) => *offset,
            Memory::Register(base) => r(base),
            Memory::RelativeOffset(offset, base) => offset.wrapping_add(r(base)),
            Memory::RelativeRegister(base, index) => r(base).wrapping_add(r(index)),
        }
    }

    /** Lists the registers used to compute the address. */
    pub fn registers(&self) -> Vec<Register> {
        match *self {
            Memory::Offset(_) => vec![],
            Memory::Register(base) | Memory::RelativeOffset(_, base) => vec![base],
            Memory::RelativeRegister(base, index) => vec![base, index],
        }
    }

    fn is_valid(&self) -> bool {
        self.registers().iter().all(|r| r.is_general())
    }
}

impl Display for Memory {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Memory::Offset(offset) => write!(f, "[{}]", offset),
            Memory::Register(base) => write!(f, "[{}]", base),
            Memory::RelativeOffset(offset, base) => write!(f, "[{}+{}]", offset, base),
            Memory::RelativeRegister(base, index) => write!(f, "[{}+{}]", base, index),
        }
    }
}

//-----------------------------------------------------------------------------

/** A decoded operand value. */
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    /** An unused slot. */
    None,
    Immediate(u8),
    Register(Register),
    Memory(Memory),
    /** A branch displacement, relative to the start of the instruction. */
    Relative(i8),
}

impl Operand {
    pub fn kind(&self) -> OperandKinds {
        match self {
            Operand::None => OperandKinds::NONE,
            Operand::Immediate(_) => OperandKinds::IMMEDIATE,
            Operand::Register(_) => OperandKinds::REGISTER,
            Operand::Memory(_) => OperandKinds::MEMORY,
            Operand::Relative(_) => OperandKinds::RELATIVE,
        }
    }

    pub fn is_none(&self) -> bool { matches!(self, Operand::None) }
}

impl Display for Operand {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Operand::None => Ok(()),
            Operand::Immediate(value) => write!(f, "{}", value),
            Operand::Register(r) => write!(f, "{}", r),
            Operand::Memory(m) => write!(f, "{}", m),
            Operand::Relative(rel) => write!(f, "{}", rel),
        }
    }
}

//-----------------------------------------------------------------------------

/** The effect of an instruction on the program counter. */
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Flow {
    /** Control passes to the next instruction. */
    None,
    /** Control may pass elsewhere. */
    Branch,
    /** The processor halts. */
    Pause,
    /** The instruction waits for a port. */
    Io,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ControlFlow {
    pub flow: Flow,
    pub conditional: bool,
}

//-----------------------------------------------------------------------------

/** Each slot that admits several kinds starts with a selector. */
fn write_selector(w: &mut BitWriter, slot: OperandKinds, kind: OperandKinds) {
    use OperandKinds as K;
    match slot.count() {
        2 => {
            let first = [K::IMMEDIATE, K::REGISTER, K::MEMORY].into_iter()
                .find(|&k| slot.contains(k));
            w.write((Some(kind) != first) as u8, 1);
        },
        3 => match kind {
            K::IMMEDIATE => w.write(0b00, 2),
            K::REGISTER => w.write(0b01, 2),
            _ => w.write(0b1, 1),
        },
        _ => {},
    }
}

fn read_selector(r: &mut BitReader, slot: OperandKinds) -> OperandKinds {
    use OperandKinds as K;
    let kinds: Vec<OperandKinds> = [K::IMMEDIATE, K::REGISTER, K::MEMORY, K::RELATIVE].into_iter()
        .filter(|&k| slot.contains(k))
        .collect();
    match kinds.len() {
        2 => kinds[r.read(1) as usize],
        3 => if r.read(1) == 1 { K::MEMORY } else if r.read(1) == 1 { K::REGISTER } else { K::IMMEDIATE },
        _ => kinds.first().copied().unwrap_or(K::NONE),
    }
}

fn write_operand(w: &mut BitWriter, operand: &Operand) {
    match operand {
        Operand::None => {},
        Operand::Immediate(value) => w.write(*value, 8),
        Operand::Relative(rel) => w.write(*rel as u8, 8),
        Operand::Register(r) => w.write(r.code(), 3),
        Operand::Memory(m) => {
            let index = |r: &Register| r.index().unwrap_or(0);
            match m {
                Memory::Offset(offset) => {
                    w.write(0b00, 2);
                    w.write(*offset, 8);
                },
                Memory::Register(base) => {
                    w.write(0b01, 2);
                    w.write(index(base), 2);
                },
                Memory::RelativeOffset(offset, base) => {
                    w.write(0b10, 2);
                    w.write(*offset, 8);
                    w.write(index(base), 2);
                },
                Memory::RelativeRegister(base, other) => {
                    w.write(0b11, 2);
                    w.write(index(base), 2);
                    w.write(index(other), 2);
                },
            }
        },
    }
}

fn general(r: &mut BitReader) -> Register {
    GENERAL_REGISTERS[r.read(2) as usize]
}

fn read_operand(r: &mut BitReader, kind: OperandKinds) -> Option<Operand> {
    use OperandKinds as K;
    Some(match kind {
        K::IMMEDIATE => Operand::Immediate(r.read(8)),
        K::RELATIVE => Operand::Relative(r.read(8) as i8),
        K::REGISTER => Operand::Register(Register::from_code(r.read(3))?),
        K::MEMORY => Operand::Memory(match r.read(2) {
            0b00 => Memory::Offset(r.read(8)),
            0b01 => Memory::Register(general(r)),
            0b10 => {
                let offset = r.read(8);
                Memory::RelativeOffset(offset, general(r))
            },
            _ => {
                let base = general(r);
                Memory::RelativeRegister(base, general(r))
            },
        }),
        _ => Operand::None,
    })
}

//-----------------------------------------------------------------------------

/** A decoded instruction. */
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Instruction {
    pub opcode: u8,
    pub mnemonic: Mnemonic,
    pub operands: [Operand; 3],
    /** The encoded length in bytes. */
    pub size: u8,
}

impl Instruction {
    /**
     * Selects the first opcode whose mnemonic is `mnemonic` and whose slots
     * admit `operands`. Returns `None` if there is no such opcode.
     */
    pub fn new(mnemonic: Mnemonic, operands: [Operand; 3]) -> Option<Self> {
        if operands.iter().any(|o| matches!(o, Operand::Memory(m) if !m.is_valid())) {
            return None;
        }
        let opcode = (0..64u8).find(|&opcode| {
            lookup(opcode).map_or(false, |(m, slots)| {
                m == mnemonic && slots.iter().zip(&operands).all(|(&slot, operand)| {
                    if operand.is_none() { slot.is_none() } else { slot.contains(operand.kind()) }
                })
            })
        })?;
        let mut instruction = Instruction {opcode, mnemonic, operands, size: 0};
        instruction.size = instruction.encode().len() as u8;
        Some(instruction)
    }

    /** Decodes the instruction at `offset`. Returns `None` if it is invalid. */
    pub fn decode(memory: &[u8; 256], offset: u8) -> Option<Self> {
        let mut r = BitReader::new(memory, offset);
        let opcode = r.read(6);
        let (mnemonic, slots) = lookup(opcode)?;
        let mut operands = [Operand::None; 3];
        for (operand, &slot) in operands.iter_mut().zip(&slots) {
            if slot.is_none() { break; }
            let kind = read_selector(&mut r, slot);
            *operand = read_operand(&mut r, kind)?;
        }
        Some(Instruction {opcode, mnemonic, operands, size: r.byte_len() as u8})
    }

    /** Encodes the instruction. */
    pub fn encode(&self) -> Vec<u8> {
        let mut w = BitWriter::new();
        w.write(self.opcode, 6);
        if let Some((_, slots)) = lookup(self.opcode) {
            for (operand, &slot) in self.operands.iter().zip(&slots) {
                if slot.is_none() { break; }
                write_selector(&mut w, slot, operand.kind());
                write_operand(&mut w, operand);
            }
        }
        w.finish()
    }

    /** The number of cycles needed to read the instruction. */
    pub fn cost(&self) -> usize {
        self.size as usize * MEMORY_READ_SPEED
    }

    /** Whether the instruction overwrites the program counter. */
    pub fn writes_pc(&self) -> bool {
        self.mnemonic.writes_destination() && self.operands[0] == Operand::Register(Register::Pc)
    }

    /** Whether any operand names the program counter. */
    pub fn uses_pc(&self) -> bool {
        self.operands.iter().any(|o| *o == Operand::Register(Register::Pc))
    }

    pub fn control_flow(&self) -> ControlFlow {
        use Mnemonic::*;
        let (flow, conditional) = match self.mnemonic {
            Jmp => (Flow::Branch, false),
            Hlt => (Flow::Pause, false),
            Send | Recv => (Flow::Io, false),
            m if m.is_taken(0).is_some() => (Flow::Branch, true),
            _ if self.writes_pc() => (Flow::Branch, false),
            _ => (Flow::None, false),
        };
        ControlFlow {flow, conditional}
    }

    /** Whether control always passes to the next instruction. */
    pub fn predictable_flow(&self) -> bool {
        self.control_flow().flow == Flow::None
    }

    /** For a relative branch at `offset`, the target address. */
    pub fn branch_target(&self, offset: u8) -> Option<u8> {
        match self.operands[0] {
            Operand::Relative(rel) => Some(offset.wrapping_add(rel as u8)),
            _ => None,
        }
    }

    /** The address of the next instruction, ignoring branches. */
    pub fn next(&self, offset: u8) -> u8 {
        offset.wrapping_add(self.size)
    }
}

impl Display for Instruction {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.mnemonic)?;
        let mut separator = " ";
        for operand in self.operands.iter().filter(|o| !o.is_none()) {
            write!(f, "{}{}", separator, operand)?;
            separator = ", ";
        }
        Ok(())
    }
}

//-----------------------------------------------------------------------------

//! The HubArch instruction set: an 8-bit machine with four general-purpose
//! registers, a flags register, a program counter, and 256 bytes of memory
//! holding both code and data.
//!
//! Instructions are a 6-bit opcode followed by up to three operands, packed
//! most significant bit first with no padding.

mod enums;
pub use enums::{flag, lookup, OperandKinds, Register, Mnemonic, ALL_REGISTERS, GENERAL_REGISTERS, BINARY_MNEMONICS, CONDITIONAL_MNEMONICS, ALL_MNEMONICS};

mod instruction;
pub use instruction::{Memory, Operand, Flow, ControlFlow, Instruction};

/** The number of bytes of memory, which is also the range of the program counter. */
pub const MEMORY_SIZE: usize = 256;

/** The number of cycles per simulated second. */
pub const CLOCK_RATE: usize = 400;

/** The number of cycles needed to read one byte of an instruction. */
pub const MEMORY_READ_SPEED: usize = 1;

/** The largest clock difference at which a port handshake can succeed. */
pub const PORT_WINDOW: usize = 8;

#[cfg(test)]
pub use instruction::tests::{random_operand};

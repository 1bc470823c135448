//! Native code generation for x86_64 hosts.

mod enums;
pub use enums::{Register, Byte, Precision, BinaryOp, UnaryOp, ShiftOp, Condition, Address};

mod assembler;
pub use assembler::{Assembler};

mod lowerer;
pub use lowerer::{lower, trampoline, home, is_native, MIN_SITE};

use crate::arch::{flag, Instruction, Memory, Mnemonic, Operand, Register};
use super::{Breakpoint, Processor, Request};

/** The result of executing one instruction. */
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Execution {
    /** Continue with the next instruction. */
    Next,
    /** Continue at the given address. */
    Jump(u8),
    /** Stop, leaving the program counter on this instruction. */
    Halt,
    /** A port is not ready. The cost is refunded and `run()` returns. */
    Stall,
    /** A port partner has finished. The cost is refunded and the processor completes. */
    Defer,
    /** A port operation failed. The cost is consumed and the instruction repeats. */
    Timeout,
}

fn zs(result: u8) -> u8 {
    let mut flags = 0;
    if result == 0 { flags |= flag::Z; }
    if result & 0x80 != 0 { flags |= flag::S; }
    flags
}

/**
 * Computes the result and flags of a two-operand or one-operand ALU
 * instruction. One-operand instructions ignore `b`. Returns no flags for
 * `mov`.
 */
pub fn compute(mnemonic: Mnemonic, a: u8, b: u8) -> (u8, Option<u8>) {
    use Mnemonic::*;
    const DIVIDE_BY_ZERO: u8 = flag::Z | flag::C | flag::O;
    let (result, extra) = match mnemonic {
        Mov => return (b, None),
        Add => {
            let (r, carry) = a.overflowing_add(b);
            let overflow = (a ^ r) & (b ^ r) & 0x80 != 0;
            (r, if carry { flag::C } else { 0 } | if overflow { flag::O } else { 0 })
        },
        Sub | Cmp => {
            let (r, borrow) = a.overflowing_sub(b);
            let overflow = (a ^ b) & (a ^ r) & 0x80 != 0;
            (r, if borrow { flag::C } else { 0 } | if overflow { flag::O } else { 0 })
        },
        Neg => {
            let r = a.wrapping_neg();
            (r, if a != 0 { flag::C } else { 0 } | if a == 0x80 { flag::O } else { 0 })
        },
        Mul => {
            let product = u16::from(a) * u16::from(b);
            (product as u8, if product > 0xFF { flag::C | flag::O } else { 0 })
        },
        Udiv | Umod | Sdiv | Smod if b == 0 => return (0, Some(DIVIDE_BY_ZERO)),
        Udiv => (a / b, 0),
        Umod => (a % b, 0),
        Sdiv => {
            let (r, overflow) = (a as i8).overflowing_div(b as i8);
            (r as u8, if overflow { flag::O } else { 0 })
        },
        Smod => ((a as i8).wrapping_rem(b as i8) as u8, 0),
        Shl => {
            let wide = u16::from(a) << std::cmp::min(b, 8);
            (wide as u8, if wide > 0xFF { flag::C } else { 0 })
        },
        Shr => {
            let wide = (u16::from(a) << 8) >> std::cmp::min(b, 8);
            ((wide >> 8) as u8, if wide & 0xFF != 0 { flag::C } else { 0 })
        },
        Xor => (a ^ b, 0),
        Or => (a | b, 0),
        And => (a & b, 0),
        Not => (!a, 0),
        _ => return (a, None),
    };
    (result, Some(zs(result) | extra))
}

//-----------------------------------------------------------------------------

impl Processor {
    pub(super) fn address(&self, memory: &Memory) -> u8 {
        memory.address(&self.registers.general)
    }

    fn read(&self, operand: &Operand) -> u8 {
        match operand {
            Operand::None => 0,
            Operand::Immediate(value) => *value,
            Operand::Relative(rel) => *rel as u8,
            Operand::Register(r) => self.read_register(*r),
            Operand::Memory(m) => self.ram.bytes[self.address(m) as usize],
        }
    }

    fn read_register(&self, r: Register) -> u8 {
        match (r, r.index()) {
            (_, Some(i)) => self.registers.general[i as usize],
            (Register::Flags, _) => self.registers.flags,
            _ => self.registers.pc,
        }
    }

    /** Writes `value` to `operand`. Returns the new program counter if it changed. */
    fn write(&mut self, operand: &Operand, value: u8) -> Option<u8> {
        match operand {
            Operand::Register(Register::Pc) => return Some(value),
            Operand::Register(Register::Flags) => { self.registers.flags = value; },
            Operand::Register(r) => {
                if let Some(i) = r.index() { self.registers.general[i as usize] = value; }
            },
            Operand::Memory(m) => {
                let address = self.address(m);
                self.write_memory(address, value);
            },
            _ => {},
        }
        None
    }

    /** The memory accesses `instruction` will make, for breakpoints. */
    pub(super) fn accesses(&self, offset: u8, instruction: &Instruction) -> Vec<(u8, Breakpoint)> {
        use Mnemonic::*;
        let mut accesses: Vec<(u8, Breakpoint)> = (0..instruction.size)
            .map(|i| (offset.wrapping_add(i), Breakpoint::READ))
            .collect();
        for (i, operand) in instruction.operands.iter().enumerate() {
            if let Operand::Memory(memory) = operand {
                let address = self.address(memory);
                let kind = match (instruction.mnemonic, i) {
                    (Mov, 0) | (Recv, 1) => Breakpoint::WRITE,
                    (m, 0) if m.writes_destination() => Breakpoint::READ_WRITE,
                    _ => Breakpoint::READ,
                };
                accesses.push((address, kind));
            }
        }
        accesses
    }

    /** Executes `instruction`, which is at the program counter. */
    pub(super) fn execute(&mut self, instruction: &Instruction) -> Execution {
        use Mnemonic::*;
        let pc = self.registers.pc;
        let [first, second, third] = instruction.operands;
        match instruction.mnemonic {
            Nop => Execution::Next,
            Hlt => Execution::Halt,
            Send => {
                let port = self.read(&first);
                let size = self.read(&second);
                let start = match third { Operand::Memory(m) => self.address(&m), _ => 0 };
                let data = (0..size).map(|i| self.ram.bytes[start.wrapping_add(i) as usize]).collect();
                self.port_operation(port, Request::Send(data))
            },
            Recv => {
                let port = self.read(&first);
                let destination = match second { Operand::Memory(m) => self.address(&m), _ => 0 };
                self.port_operation(port, Request::Receive(destination))
            },
            m => match m.is_taken(self.registers.flags) {
                Some(taken) => match instruction.branch_target(pc) {
                    Some(target) if taken => Execution::Jump(target),
                    _ => Execution::Next,
                },
                None => {
                    let a = self.read(&first);
                    let b = self.read(&second);
                    let (result, flags) = compute(m, a, b);
                    let mut jump = None;
                    if m.writes_destination() {
                        jump = self.write(&first, result);
                    }
                    if let Some(flags) = flags {
                        self.registers.flags = flags;
                    }
                    jump.map_or(Execution::Next, Execution::Jump)
                },
            },
        }
    }
}

//-----------------------------------------------------------------------------

#[cfg(test)]
pub mod tests {
    use super::*;
    use Mnemonic::*;

    const Z: u8 = flag::Z;
    const S: u8 = flag::S;
    const C: u8 = flag::C;
    const O: u8 = flag::O;

    #[test]
    fn arithmetic() {
        assert_eq!(compute(Add, 5, 10), (15, Some(0)));
        assert_eq!(compute(Add, 0xFF, 1), (0, Some(Z | C)));
        assert_eq!(compute(Add, 0x7F, 1), (0x80, Some(S | O)));
        assert_eq!(compute(Sub, 1, 2), (0xFF, Some(S | C)));
        assert_eq!(compute(Sub, 0x80, 1), (0x7F, Some(O)));
        assert_eq!(compute(Cmp, 3, 3), (0, Some(Z)));
        assert_eq!(compute(Neg, 0x80, 0), (0x80, Some(S | C | O)));
        assert_eq!(compute(Neg, 0, 0), (0, Some(Z)));
        assert_eq!(compute(Mul, 16, 16), (0, Some(Z | C | O)));
        assert_eq!(compute(Mul, 3, 5), (15, Some(0)));
        assert_eq!(compute(Mov, 1, 2), (2, None));
    }

    #[test]
    fn division() {
        assert_eq!(compute(Udiv, 200, 7), (28, Some(0)));
        assert_eq!(compute(Umod, 200, 7), (4, Some(0)));
        assert_eq!(compute(Sdiv, 0xF6, 3), (0xFD, Some(S)));
        assert_eq!(compute(Smod, 0xF6, 3), (0xFF, Some(S)));
        assert_eq!(compute(Sdiv, 0x80, 0xFF), (0x80, Some(S | O)));
        assert_eq!(compute(Smod, 0x80, 0xFF), (0, Some(Z)));
        for &m in &[Udiv, Umod, Sdiv, Smod] {
            assert_eq!(compute(m, 42, 0), (0, Some(Z | C | O)));
        }
    }

    #[test]
    fn shifts() {
        assert_eq!(compute(Shl, 0x81, 1), (0x02, Some(C)));
        assert_eq!(compute(Shl, 0x01, 7), (0x80, Some(S)));
        assert_eq!(compute(Shl, 0x01, 8), (0, Some(Z | C)));
        assert_eq!(compute(Shl, 0x00, 200), (0, Some(Z)));
        assert_eq!(compute(Shr, 0x81, 1), (0x40, Some(C)));
        assert_eq!(compute(Shr, 0x80, 7), (0x01, Some(0)));
        assert_eq!(compute(Shr, 0x80, 9), (0, Some(Z | C)));
        assert_eq!(compute(Shr, 0x42, 0), (0x42, Some(0)));
    }

    #[test]
    fn logic() {
        assert_eq!(compute(And, 0xF0, 0x0F), (0, Some(Z)));
        assert_eq!(compute(Or, 0xF0, 0x0F), (0xFF, Some(S)));
        assert_eq!(compute(Xor, 0xFF, 0x0F), (0xF0, Some(S)));
        assert_eq!(compute(Not, 0xFF, 0), (0, Some(Z)));
    }
}

//! Tools for generating code using the x86_64 instruction set.
//!
//! One method call on an Assembler generates one instruction. This ensures
//! that documentation about the x86_64 instruction set applies to the code we
//! assemble.
//!
//! We make no attempt to be exhaustive. The guest machine is 8-bit, so most
//! arithmetic is done on the legacy byte registers, including `AH`, `CH`,
//! `DH` and `BH`. Those registers cannot be named by an instruction with a
//! REX prefix, so the byte instructions below never write one, and their
//! memory operands are restricted to the first eight registers. The 32-bit
//! and 64-bit instructions always write a REX prefix, as a regular pattern.

use crate::buffer::{Buffer};
use super::super::{Label};
use super::{Register, Byte, Precision, BinaryOp, UnaryOp, ShiftOp, Condition, Address};
use Register::*;
use Precision::*;

/** Computes the displacement from `from` to `to`. */
pub fn disp(from: usize, to: usize) -> isize {
    if from > isize::MAX as usize || to > isize::MAX as usize {
        panic!("Displacements greater than isize::MAX are not supported");
    }
    (to as isize) - (from as isize)
}

/** Computes the i32 displacement from `from` to `to`, if possible. */
pub fn disp32(from: usize, to: usize) -> i32 {
    let disp = disp(from, to);
    if disp > i32::MAX as isize || disp < i32::MIN as isize {
        panic!("The displacement does not fit in 32 bits");
    }
    disp as i32
}

/**
 * A value which, if used as the `rel32` part of a control-flow instruction,
 * is likely to result in an immediate crash.
 */
const UNKNOWN_DISP: i32 = -0x80000000;

/** Like [`disp32()`] but returns `UNKNOWN_DISP` if `to` is `None`. */
pub fn optional_disp32(from: usize, to: Option<usize>) -> i32 {
    to.map_or(UNKNOWN_DISP, |to| disp32(from, to))
}

/**
 * An assembler, implementing a regularish subset of x86_64.
 *
 * There is a `write_x()` method for each encoding pattern `x`. A typical
 * pattern is "ROM" meaning a REX byte, an opcode byte, and a ModR/M byte.
 * Prefer the methods that assemble a single instruction. These include:
 *  - [`move8()`], [`const8()`], [`load8()`] and [`store8()`], which assemble
 *  byte `MOV` instructions, and [`widen()`] which assembles `MOVZX`/`MOVSX`.
 *  - Variants of [`op8()`], which assemble byte arithmetic, including `CMP`.
 *  - [`op()`], [`const_op()`] and [`move_()`] for wider arithmetic.
 *  - [`jump_if()`], [`const_jump()`] and [`ret()`] for control flow.
 *
 * [`move8()`]: Assembler::move8
 * [`const8()`]: Assembler::const8
 * [`load8()`]: Assembler::load8
 * [`store8()`]: Assembler::store8
 * [`widen()`]: Assembler::widen
 * [`op8()`]: Assembler::op8
 * [`op()`]: Assembler::op
 * [`const_op()`]: Assembler::const_op
 * [`move_()`]: Assembler::move_
 * [`jump_if()`]: Assembler::jump_if
 * [`const_jump()`]: Assembler::const_jump
 * [`ret()`]: Assembler::ret
 */
pub struct Assembler<B: Buffer> {
    /// The area we're filling with code.
    buffer: B,
}

impl<B: Buffer> Assembler<B> {
    /** Construct an Assembler that writes to `buffer` */
    pub fn new(buffer: B) -> Self {
        Assembler {buffer}
    }

    /** Returns the contained [`Buffer`]. */
    pub fn into_buffer(self) -> B { self.buffer }

    /** Get the assembly pointer. */
    pub fn get_pos(&self) -> usize {
        self.buffer.get_pos()
    }

    /** Set the assembly pointer. */
    pub fn set_pos(&mut self, pos: usize) {
        self.buffer.set_pos(pos);
    }

    // Patterns and constants.

    /** Writes raw bytes. */
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.buffer.write_byte(byte);
        }
    }

    /** Writes an 8-bit immediate constant. */
    pub fn write_imm8(&mut self, immediate: u8) {
        self.buffer.write_byte(immediate);
    }

    /** Writes a 32-bit signed immediate constant. */
    pub fn write_imm32(&mut self, immediate: i32) {
        self.buffer.write(u64::from(immediate as u32), 4);
    }

    /** Writes a 64-bit signed immediate constant. */
    pub fn write_imm64(&mut self, immediate: i64) {
        self.buffer.write(immediate as u64, 8);
    }

    /** Writes a 32-bit displacement from `self.get_pos()+4` to `target`. */
    pub fn write_rel32(&mut self, target: Option<usize>) {
        let pos = self.get_pos();
        self.write_imm32(optional_disp32(pos + 4, target));
    }

    /** Writes an instruction with pattern "OO", and no registers. */
    pub fn write_oo_0(&mut self, opcode: u64) {
        self.buffer.write(opcode, 2);
    }

    /** Writes an instruction with pattern "RO", and no registers. */
    pub fn write_ro_0(&mut self, opcode: u64) {
        self.buffer.write(opcode, 2);
    }

    /** Writes an instruction with pattern "RO", and one register. */
    pub fn write_ro_1(&mut self, mut opcode: u64, prec: Precision, rd: Register) {
        opcode |= prec.w_bit();
        opcode |= 0x0701 & rd.mask();
        self.buffer.write(opcode, 2);
    }

    /** Writes an instruction with pattern "ROM" and one register. */
    pub fn write_rom_1(&mut self, mut opcode: u64, prec: Precision, rm: Register) {
        opcode |= prec.w_bit();
        opcode |= 0x070001 & rm.mask();
        self.buffer.write(opcode, 3);
    }

    /** Writes an instruction with pattern "ROM" and two registers. */
    pub fn write_rom_2(&mut self, mut opcode: u64, prec: Precision, rm: Register, reg: Register) {
        opcode |= prec.w_bit();
        opcode |= 0x070001 & rm.mask();
        opcode |= 0x380004 & reg.mask();
        self.buffer.write(opcode, 3);
    }

    /** Writes a ModR/M byte with two register operands. */
    pub fn write_m_reg(&mut self, reg: u8, rm: u8) {
        assert!(reg < 8 && rm < 8);
        self.buffer.write_byte(0xC0 | reg << 3 | rm);
    }

    /** Writes a ModR/M byte and whatever follows it to address `address`. */
    pub fn write_m_mem(&mut self, reg: u8, address: Address) {
        assert!(reg < 8);
        let base = address.base.legacy();
        match address.index {
            Some(index) => {
                assert_ne!(index, RSP);
                let sib = index.legacy() << 3 | base;
                if address.disp == 0 && base != RBP as u8 {
                    self.write_bytes(&[0x04 | reg << 3, sib]);
                } else {
                    self.write_bytes(&[0x84 | reg << 3, sib]);
                    self.write_imm32(address.disp);
                }
            },
            None => {
                self.buffer.write_byte(0x80 | reg << 3 | base);
                if base == RSP as u8 {
                    // A SIB byte with no index.
                    self.buffer.write_byte(0x24);
                }
                self.write_imm32(address.disp);
            },
        }
    }

    // Wide instructions.

    /** Move register to register. */
    pub fn move_(&mut self, prec: Precision, dest: Register, src: Register) {
        self.write_rom_2(0xC08B40, prec, src, dest);
    }

    /** Move constant to register, preserving the status flags. */
    pub fn const_(&mut self, prec: Precision, dest: Register, mut imm: i64) {
        if prec == P32 {
            imm &= 0xFFFFFFFF;
        }
        if i64::from(imm as u32) == imm {
            self.write_ro_1(0xB840, P32, dest);
            self.write_imm32(imm as i32);
        } else if i64::from(imm as i32) == imm {
            self.write_rom_1(0xC0C740, P64, dest);
            self.write_imm32(imm as i32);
        } else {
            self.write_ro_1(0xB840, P64, dest);
            self.write_imm64(imm);
        }
    }

    /** Op register to register. */
    pub fn op(&mut self, op: BinaryOp, prec: Precision, dest: Register, src: Register) {
        self.write_rom_2(op.rm_reg(true), prec, dest, src);
    }

    /** Op constant to register. */
    pub fn const_op(&mut self, op: BinaryOp, prec: Precision, dest: Register, imm: i32) {
        self.write_rom_1(op.rm_imm(true), prec, dest);
        self.write_imm32(imm);
    }

    /** Bitwise AND register with register, setting the status flags only. */
    pub fn test(&mut self, prec: Precision, dest: Register, src: Register) {
        self.write_rom_2(0xC08540, prec, dest, src);
    }

    /** Shift register by `RC`. */
    pub fn shift(&mut self, op: ShiftOp, prec: Precision, dest: Register) {
        self.write_rom_1(op.rm_c(true), prec, dest);
    }

    /** Shift register by constant. */
    pub fn const_shift(&mut self, op: ShiftOp, prec: Precision, dest: Register, imm: u8) {
        assert!(imm < prec.bits() as u8);
        self.write_rom_1(op.rm_imm(true), prec, dest);
        self.write_imm8(imm);
    }

    /** Unsigned long divide (D, A) by register. Quotient in A, remainder in D. */
    pub fn udiv(&mut self, prec: Precision, src: Register) {
        self.write_rom_1(0xF0F740, prec, src);
    }

    /** Signed long divide (D, A) by register. Quotient in A, remainder in D. */
    pub fn sdiv(&mut self, prec: Precision, src: Register) {
        self.write_rom_1(0xF8F740, prec, src);
    }

    /** Sign-extend `EAX` into `EDX`. */
    pub fn cdq(&mut self) {
        self.buffer.write_byte(0x99);
    }

    /** Zero- or sign-extend a byte register into a 32-bit register. */
    pub fn widen(&mut self, signed: bool, dest: Register, src: Byte) {
        self.write_bytes(&[0x0F, if signed { 0xBE } else { 0xB6 }]);
        self.write_m_reg(dest.legacy(), src as u8);
    }

    /** Zero- or sign-extend a byte of memory into a 32-bit register. */
    pub fn load_widen(&mut self, signed: bool, dest: Register, src: Address) {
        self.write_bytes(&[0x0F, if signed { 0xBE } else { 0xB6 }]);
        self.write_m_mem(dest.legacy(), src);
    }

    // Byte instructions.

    /** Move byte register to byte register. */
    pub fn move8(&mut self, dest: Byte, src: Byte) {
        self.buffer.write_byte(0x88);
        self.write_m_reg(src as u8, dest as u8);
    }

    /** Move constant to byte register. */
    pub fn const8(&mut self, dest: Byte, imm: u8) {
        self.write_bytes(&[0xB0 | dest as u8, imm]);
    }

    /** Move memory to byte register. */
    pub fn load8(&mut self, dest: Byte, src: Address) {
        self.buffer.write_byte(0x8A);
        self.write_m_mem(dest as u8, src);
    }

    /** Move byte register to memory. */
    pub fn store8(&mut self, dest: Address, src: Byte) {
        self.buffer.write_byte(0x88);
        self.write_m_mem(src as u8, dest);
    }

    /** Move constant to memory. */
    pub fn const_store8(&mut self, dest: Address, imm: u8) {
        self.buffer.write_byte(0xC6);
        self.write_m_mem(0, dest);
        self.write_imm8(imm);
    }

    /** Op byte register to byte register. */
    pub fn op8(&mut self, op: BinaryOp, dest: Byte, src: Byte) {
        self.buffer.write_byte(op.rm_reg8());
        self.write_m_reg(src as u8, dest as u8);
    }

    /** Op constant to byte register. */
    pub fn const_op8(&mut self, op: BinaryOp, dest: Byte, imm: u8) {
        self.buffer.write_byte(0x80);
        self.write_m_reg(op as u8, dest as u8);
        self.write_imm8(imm);
    }

    /** Op memory to byte register. */
    pub fn load_op8(&mut self, op: BinaryOp, dest: Byte, src: Address) {
        self.buffer.write_byte(op.reg_rm8());
        self.write_m_mem(dest as u8, src);
    }

    /** Op byte register to memory. */
    pub fn store_op8(&mut self, op: BinaryOp, dest: Address, src: Byte) {
        self.buffer.write_byte(op.rm_reg8());
        self.write_m_mem(src as u8, dest);
    }

    /** Op constant to memory. */
    pub fn const_store_op8(&mut self, op: BinaryOp, dest: Address, imm: u8) {
        self.buffer.write_byte(0x80);
        self.write_m_mem(op as u8, dest);
        self.write_imm8(imm);
    }

    /** Shift byte register by constant. */
    pub fn const_shift8(&mut self, op: ShiftOp, dest: Byte, imm: u8) {
        assert!(imm < 8);
        self.buffer.write_byte(0xC0);
        self.write_m_reg(op as u8, dest as u8);
        self.write_imm8(imm);
    }

    /** Apply a one-operand op to a byte register. */
    pub fn unary8(&mut self, op: UnaryOp, dest: Byte) {
        self.buffer.write_byte(0xF6);
        self.write_m_reg(op as u8, dest as u8);
    }

    /** Apply a one-operand op to memory. */
    pub fn store_unary8(&mut self, op: UnaryOp, dest: Address) {
        self.buffer.write_byte(0xF6);
        self.write_m_mem(op as u8, dest);
    }

    /** Bitwise AND byte register with byte register, setting the status flags only. */
    pub fn test8(&mut self, dest: Byte, src: Byte) {
        self.buffer.write_byte(0x84);
        self.write_m_reg(src as u8, dest as u8);
    }

    /** Bitwise AND byte register with constant, setting the status flags only. */
    pub fn const_test8(&mut self, dest: Byte, imm: u8) {
        self.buffer.write_byte(0xF6);
        self.write_m_reg(0, dest as u8);
        self.write_imm8(imm);
    }

    /** Bitwise AND memory with constant, setting the status flags only. */
    pub fn const_store_test8(&mut self, dest: Address, imm: u8) {
        self.buffer.write_byte(0xF6);
        self.write_m_mem(0, dest);
        self.write_imm8(imm);
    }

    /** Exchange two byte registers. */
    pub fn exchange8(&mut self, dest: Byte, src: Byte) {
        self.buffer.write_byte(0x86);
        self.write_m_reg(src as u8, dest as u8);
    }

    /** Set a byte register to 1 if `cc` is `is_true`, otherwise to 0. */
    pub fn set_if(&mut self, cc: Condition, is_true: bool, dest: Byte) {
        self.buffer.write(cc.set_if(is_true) | u64::from(dest as u8) << 16, 3);
    }

    /** Load `AH` from the status flags. */
    pub fn lahf(&mut self) {
        self.buffer.write_byte(0x9F);
    }

    /** Store `AH` into the status flags. */
    pub fn sahf(&mut self) {
        self.buffer.write_byte(0x9E);
    }

    /** Writes one-byte `NOP`s until the assembly pointer reaches `pos`. */
    pub fn pad(&mut self, pos: usize) {
        while self.get_pos() < pos {
            self.buffer.write_byte(0x90);
        }
    }

    // Control flow.

    /** Conditional branch. */
    pub fn jump_if(&mut self, cc: Condition, is_true: bool, target: &mut Label) {
        let patch = self.get_pos();
        self.write_oo_0(cc.jump_if(is_true));
        self.write_imm32(UNKNOWN_DISP);
        self.lpush(target, patch);
    }

    /** Unconditional jump to a constant. */
    pub fn const_jump(&mut self, target: &mut Label) {
        let patch = self.get_pos();
        self.write_ro_0(0xE940);
        self.write_imm32(UNKNOWN_DISP);
        self.lpush(target, patch);
    }

    /** Unconditional call to a register. */
    pub fn call(&mut self, target: Register) {
        self.write_rom_1(0xD0FF40, P32, target);
    }

    /**
     * Adds a control-flow instruction to `label`, patching it to point to
     * the target of `label` if known. Its previous target must be
     * `UNKNOWN_DISP`.
     */
    fn lpush(&mut self, label: &mut Label, pos: usize) {
        self.patch(pos, label.target(), None);
        if !label.is_defined() {
            label.push(pos);
        }
    }

    /** Defines `label` to be the assembly pointer, and patches jumps to it. */
    pub fn define(&mut self, label: &mut Label) {
        let target = self.get_pos();
        for pos in label.define(target) {
            self.patch(pos, Some(target), None);
        }
    }

    /**
     * Change the target of the instruction at `pos` from `old_target` to
     * `new_target`.
     * - pos - the offset within the buffer of a jump instruction.
     * - new_target - an offset from the beginning of the buffer, or `None`.
     * - old_target - an offset from the beginning of the buffer, or `None`.
     */
    pub fn patch(&mut self, pos: usize, new_target: Option<usize>, old_target: Option<usize>) {
        let at = if self.buffer.read_byte(pos) == 0x0F && (self.buffer.read_byte(pos + 1) & 0xF0) == 0x80 {
            // jump_if
            pos + 2
        } else if self.buffer.read_byte(pos) == 0x40 && self.buffer.read_byte(pos + 1) == 0xE9 {
            // const_jump
            pos + 2
        } else {
            panic!("not a jump instruction");
        };
        let old_disp = self.buffer.read(at, 4) as u32 as i32;
        let old_pos = self.buffer.get_pos();
        self.buffer.set_pos(at);
        self.write_rel32(new_target);
        let at_plus_4 = self.buffer.get_pos();
        self.buffer.set_pos(old_pos);
        assert_eq!(old_disp, optional_disp32(at_plus_4, old_target));
    }

    pub fn ret(&mut self) {
        self.write_ro_0(0xC340);
    }

    /** Push a register. */
    pub fn push(&mut self, rd: Register) {
        self.write_ro_1(0x5040, P64, rd);
    }

    /** Pop a register. */
    pub fn pop(&mut self, rd: Register) {
        self.write_ro_1(0x5840, P64, rd);
    }

    /** Move 16-bit memory to a register. */
    pub fn load16(&mut self, dest: Register, src: Address) {
        self.write_bytes(&[0x66, 0x8B]);
        self.write_m_mem(dest.legacy(), src);
    }

    /** Move a 16-bit register to memory. */
    pub fn store16(&mut self, dest: Address, src: Register) {
        self.write_bytes(&[0x66, 0x89]);
        self.write_m_mem(src.legacy(), dest);
    }

    /** Move 64-bit memory to a register. */
    pub fn load64(&mut self, dest: Register, src: Address) {
        self.write_bytes(&[0x48, 0x8B]);
        self.write_m_mem(dest.legacy(), src);
    }

    /** Move a 64-bit register to memory. */
    pub fn store64(&mut self, dest: Address, src: Register) {
        self.write_bytes(&[0x48, 0x89]);
        self.write_m_mem(src.legacy(), dest);
    }
}

//-----------------------------------------------------------------------------

#[cfg(test)]
pub mod tests {
    use super::*;
    use BinaryOp::*;
    use Byte::*;
    use Condition::*;

    use std::cmp::{max};

    use iced_x86::{Decoder, Formatter, NasmFormatter};

    use crate::buffer::{VecU8};

    const ALL_BYTES: [Byte; 8] = [AL, CL, DL, BL, AH, CH, DH, BH];
    const ALL_BINARY_OPS: [BinaryOp; 8] =
        [Add, Or, Adc, Sbb, And, Sub, Xor, Cmp];

    fn new_assembler() -> Assembler<VecU8> {
        Assembler::new(VecU8::default())
    }

    /**
     * Disassemble the given x64_64 `code_bytes` as if they were at address 0.
     */
    pub fn disassemble(code_bytes: &[u8], expected: Vec<&str>)
    -> Result<(), Vec<String>> {
        // Disassemble the code.
        let mut decoder = Decoder::new(64, code_bytes, 0);
        decoder.set_ip(0);
        let mut formatter = NasmFormatter::new();
        let mut ips = Vec::new();
        let mut byteses = Vec::new();
        let mut observed = Vec::new();
        for instruction in decoder {
            let start = instruction.ip() as usize;
            let len = instruction.len() as usize;
            ips.push(start);
            byteses.push(code_bytes[start..][..len].iter().rev().map(
                |b| format!("{:02X}", b)
            ).collect::<Vec<String>>().join(" "));
            let mut assembly = String::with_capacity(80);
            formatter.format(&instruction, &mut assembly);
            observed.push(assembly);
        };

        // Search for differences.
        let mut error = false;
        for i in 0..max(expected.len(), observed.len()) {
            let e_line = if i < expected.len() { &expected[i] } else { "missing" };
            let o_line = if i < observed.len() { &observed[i] } else { "missing" };
            if e_line != o_line {
                println!("Difference in line {}", i+1);
                if i < observed.len() {
                    println!("{:016X}   {:>32}   {}", ips[i], byteses[i], o_line);
                }
                println!("{:>16}   {:>32}   {}", "Expected", "", e_line);
                error = true;
            }
        }
        if error { Err(observed) } else { Ok(()) }
    }

    fn memory() -> Address { Address::indexed(RDI, RBP) }

    /** Test that the byte registers are named correctly. */
    #[test]
    fn bytes() {
        let mut a = new_assembler();
        for &r in &ALL_BYTES {
            a.move8(r, r);
        }
        disassemble(&a.into_buffer().into_vec(), vec![
            "mov al,al",
            "mov cl,cl",
            "mov dl,dl",
            "mov bl,bl",
            "mov ah,ah",
            "mov ch,ch",
            "mov dh,dh",
            "mov bh,bh",
        ]).unwrap();
    }

    /** Test that all the BinaryOps are named correctly. */
    #[test]
    fn binary_op() {
        let mut a = new_assembler();
        for &op in &ALL_BINARY_OPS {
            a.op8(op, BH, CL);
        }
        disassemble(&a.into_buffer().into_vec(), vec![
            "add bh,cl",
            "or bh,cl",
            "adc bh,cl",
            "sbb bh,cl",
            "and bh,cl",
            "sub bh,cl",
            "xor bh,cl",
            "cmp bh,cl",
        ]).unwrap();
    }

    /** Test that we can assemble byte ops in all the different ways. */
    #[test]
    fn binary_mode() {
        let mut a = new_assembler();
        a.const_op8(Add, CH, 5);
        a.load_op8(Sub, DL, Address::indexed(RDI, RA));
        a.store_op8(Xor, memory(), AH);
        a.const_store_op8(Cmp, memory(), 7);
        a.const_store_op8(Cmp, Address {base: RDI, index: Some(RBP), disp: 0x100}, 0);
        disassemble(&a.into_buffer().into_vec(), vec![
            "add ch,5",
            "sub dl,[rdi+rax]",
            "xor [rdi+rbp],ah",
            "cmp byte [rdi+rbp],7",
            "cmp byte [rdi+rbp+100h],0",
        ]).unwrap();
    }

    /** Test that we can assemble all the different kinds of byte "MOV". */
    #[test]
    fn move8() {
        let mut a = new_assembler();
        a.const8(BL, 5);
        a.load8(AH, Address::indexed(RDI, RA));
        a.store8(memory(), BH);
        a.const_store8(memory(), 0);
        a.store8(Address::field(RDI, 0x201), AL);
        a.const_store8(Address::field(RDI, 0x200), 1);
        disassemble(&a.into_buffer().into_vec(), vec![
            "mov bl,5",
            "mov ah,[rdi+rax]",
            "mov [rdi+rbp],bh",
            "mov byte [rdi+rbp],0",
            "mov [rdi+201h],al",
            "mov byte [rdi+200h],1",
        ]).unwrap();
    }

    /** Test the instructions that pack and unpack the status flags. */
    #[test]
    fn flags() {
        let mut a = new_assembler();
        a.set_if(O, true, AL);
        a.set_if(Z, false, DL);
        a.lahf();
        a.const_shift8(ShiftOp::Rol, AH, 2);
        a.const_test8(DL, 5);
        a.test8(AH, AH);
        a.sahf();
        disassemble(&a.into_buffer().into_vec(), vec![
            "seto al",
            "setne dl",
            "lahf",
            "rol ah,2",
            "test dl,5",
            "test ah,ah",
            "sahf",
        ]).unwrap();
    }

    /** Test the one-operand byte instructions. */
    #[test]
    fn unary() {
        let mut a = new_assembler();
        a.unary8(UnaryOp::Neg, BL);
        a.store_unary8(UnaryOp::Not, memory());
        a.unary8(UnaryOp::Mul, AH);
        a.const_store_test8(memory(), 0xFF);
        a.exchange8(AH, AL);
        disassemble(&a.into_buffer().into_vec(), vec![
            "neg bl",
            "not byte [rdi+rbp]",
            "mul ah",
            "test byte [rdi+rbp],0FFh",
            "xchg ah,al",
        ]).unwrap();
    }

    /** Test the wide instructions. */
    #[test]
    fn wide() {
        let mut a = new_assembler();
        a.widen(false, RA, BH);
        a.widen(true, RA, CL);
        a.load_widen(false, RA, Address::indexed(RDI, RA));
        a.move_(P32, RBP, RA);
        a.move_(P64, R8, RC);
        a.const_(P32, RA, 8);
        a.const_op(Sub, P64, RSI, 5);
        a.test(P32, R8, R8);
        a.shift(ShiftOp::Shr, P32, RA);
        a.cdq();
        a.sdiv(P32, R8);
        a.udiv(P32, R8);
        disassemble(&a.into_buffer().into_vec(), vec![
            "movzx eax,bh",
            "movsx eax,cl",
            "movzx eax,byte [rdi+rax]",
            "mov ebp,eax",
            "mov r8,rcx",
            "mov eax,8",
            "sub rsi,5",
            "test r8d,r8d",
            "shr eax,cl",
            "cdq",
            "idiv r8d",
            "div r8d",
        ]).unwrap();
    }

    /** Test the 16-bit and 64-bit moves used to enter and leave native code. */
    #[test]
    fn state() {
        let mut a = new_assembler();
        a.load16(RB, Address::field(RBP, 2));
        a.store16(Address::field(RBP, 4), RD);
        a.load64(RSI, Address::field(RBP, 8));
        a.store64(Address::field(RBP, 8), RSI);
        a.push(RB);
        a.call(RA);
        a.pop(RB);
        a.ret();
        disassemble(&a.into_buffer().into_vec(), vec![
            "mov bx,[rbp+2]",
            "mov [rbp+4],dx",
            "mov rsi,[rbp+8]",
            "mov [rbp+8],rsi",
            "push rbx",
            "call rax",
            "pop rbx",
            "ret",
        ]).unwrap();
    }

    /** Test that we can patch jumps forwards and backwards. */
    #[test]
    fn patch() {
        let mut a = new_assembler();
        let mut back = Label::new();
        a.define(&mut back);
        let mut forward = Label::new();
        a.jump_if(Z, true, &mut forward);
        a.jump_if(L, false, &mut back);
        a.const_jump(&mut forward);
        a.define(&mut forward);
        a.ret();
        disassemble(&a.into_buffer().into_vec(), vec![
            "je near 0000000000000012h",
            "jge near 0000000000000000h",
            "jmp 0000000000000012h",
            "ret",
        ]).unwrap();
    }
}

use std::collections::{BTreeMap, HashMap};
use memoffset::{offset_of};

use crate::arch::{flag, Instruction, Memory, Mnemonic, Operand, Register as Guest};
use crate::buffer::{VecU8};
use crate::graph::{Block, Node};
use crate::processor::{Ram};
use super::super::{Label, Lowered, NativeState, Site};
use super::{Address, Assembler, BinaryOp, Byte, Condition, Precision, Register, ShiftOp, UnaryOp};
use BinaryOp::*;
use Byte::*;
use Precision::*;
use Register::*;

/** The remaining cycle budget. */
const CYCLES: Register = RSI;

/** The address of the guest [`Ram`]. */
const MEMORY: Register = RDI;

/** The length of a `JMP rel32`, and so the minimum length of a [`Site`]. */
pub const MIN_SITE: usize = 5;

/** The host byte register that holds guest register `r`. */
pub fn home(r: Guest) -> Byte {
    match r {
        Guest::R0 => BL,
        Guest::R1 => BH,
        Guest::R2 => CL,
        Guest::R3 => CH,
        Guest::Flags => DL,
        Guest::Pc => DH,
    }
}

/**
 * Whether `instruction` can be translated. Anything else exits to the
 * interpreter.
 */
pub fn is_native(instruction: &Instruction) -> bool {
    !instruction.uses_pc() && !matches!(instruction.mnemonic, Mnemonic::Hlt | Mnemonic::Send | Mnemonic::Recv)
}

fn ram_field(offset: usize) -> i32 { offset as i32 }

/** The memory source operand, addressed by `RA`. */
fn source_address() -> Address { Address::indexed(MEMORY, RA) }

/** The memory destination operand, addressed by `RBP`. */
fn dest_address() -> Address { Address::indexed(MEMORY, RBP) }

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Dest {
    Reg(Byte),
    Mem,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Src {
    Imm(u8),
    Reg(Byte),
    Mem,
}

/** Code that is assembled after all the instructions. */
#[derive(Debug)]
enum Stub {
    /** Refund `cycles` and exit at `pc`. If `site` is known, it is the site's patch target. */
    Exit {label: Label, cycles: usize, pc: u8, site: Option<usize>},
    /** Report a write to code, refund `cycles` and exit at `pc`. */
    Modified {label: Label, cycles: usize, pc: u8},
}

//-----------------------------------------------------------------------------

/**
 * Translates a [`Block`] into x86_64 code.
 *
 * The block is divided into segments, each of which begins with a check
 * that the cycle budget covers the whole segment. A segment starts at the
 * block start, at each address in `entries`, at each branch target in the
 * block, and after each branch or untranslatable instruction. Guest
 * registers live in the host byte registers given by [`home()`], the cycle
 * budget lives in `RSI`, and `RDI` points to the [`Ram`]. Native code
 * returns with the next program counter in `DH`.
 */
pub fn lower(block: &Block, entries: &[u8]) -> Lowered {
    let nodes = &block.nodes;
    let starts: Vec<bool> = nodes.iter().enumerate().map(|(i, node)| {
        i == 0 ||
        entries.contains(&node.offset) ||
        block.targets().any(|target| target == node.offset) || {
            let previous = &nodes[i - 1].instruction;
            !previous.predictable_flow() || !is_native(previous)
        }
    }).collect();
    let mut lo = Lowerer {
        a: Assembler::new(VecU8::default()),
        segments: nodes.iter().zip(&starts)
            .filter(|(_, &start)| start)
            .map(|(node, _)| (node.offset, Label::new()))
            .collect(),
        exits: BTreeMap::new(),
        stubs: Vec::new(),
        sites: Vec::new(),
        entries: Vec::new(),
    };
    let mut i = 0;
    while i < nodes.len() {
        let end = (i + 1..nodes.len()).find(|&j| starts[j]).unwrap_or(nodes.len());
        lo.segment(&nodes[i..end]);
        i = end;
    }
    if let Some(last) = nodes.last() {
        if is_native(&last.instruction) && last.instruction.mnemonic != Mnemonic::Jmp {
            lo.exit(last.instruction.next(last.offset));
        }
    }
    lo.finish()
}

struct Lowerer {
    a: Assembler<VecU8>,
    /** The start of each segment, by guest address. */
    segments: HashMap<u8, Label>,
    /** Exits to guest addresses outside the block. */
    exits: BTreeMap<u8, Label>,
    stubs: Vec<Stub>,
    sites: Vec<Site>,
    entries: Vec<(u8, usize)>,
}

impl Lowerer {
    fn segment(&mut self, nodes: &[Node]) {
        let pc = nodes[0].offset;
        let cost: usize = nodes.iter().map(|node| node.instruction.cost()).sum();
        if let Some(label) = self.segments.get_mut(&pc) {
            self.a.define(label);
        }
        self.entries.push((pc, self.a.get_pos()));
        self.a.const_op(Sub, P64, CYCLES, cost as i32);
        let mut stall = Label::new();
        self.a.jump_if(Condition::B, true, &mut stall);
        self.stubs.push(Stub::Exit {label: stall, cycles: cost, pc, site: None});
        let mut remaining = cost;
        for node in nodes {
            let native = self.a.get_pos();
            let after = remaining - node.instruction.cost();
            if is_native(&node.instruction) {
                self.instruction(node, after);
            } else {
                self.a.const_op(Add, P64, CYCLES, remaining as i32);
                self.exit(node.offset);
            }
            self.a.pad(native + MIN_SITE);
            let site = self.sites.len();
            self.sites.push(Site {pc: node.offset, size: node.instruction.size, native, stub: 0, patched: false});
            self.stubs.push(Stub::Exit {label: Label::new(), cycles: remaining, pc: node.offset, site: Some(site)});
            remaining = after;
        }
    }

    /** Returns to the trampoline with `pc` as the next program counter. */
    fn exit(&mut self, pc: u8) {
        self.a.const8(DH, pc);
        self.a.ret();
    }

    fn finish(mut self) -> Lowered {
        for stub in std::mem::take(&mut self.stubs) {
            match stub {
                Stub::Exit {mut label, cycles, pc, site} => {
                    self.a.define(&mut label);
                    if let Some(site) = site {
                        self.sites[site].stub = self.a.get_pos();
                    }
                    self.a.const_op(Add, P64, CYCLES, cycles as i32);
                    self.exit(pc);
                },
                Stub::Modified {mut label, cycles, pc} => {
                    self.a.define(&mut label);
                    self.a.move_(P32, RA, RBP);
                    self.a.store8(Address::field(MEMORY, ram_field(offset_of!(Ram, modified_address))), AL);
                    self.a.const_store8(Address::field(MEMORY, ram_field(offset_of!(Ram, modified))), 1);
                    if cycles > 0 {
                        self.a.const_op(Add, P64, CYCLES, cycles as i32);
                    }
                    self.exit(pc);
                },
            }
        }
        for (pc, mut label) in std::mem::take(&mut self.exits) {
            self.a.define(&mut label);
            self.exit(pc);
        }
        Lowered {code: self.a.into_buffer().into_vec(), entries: self.entries, sites: self.sites}
    }

    // Operands.

    /** Computes the address of `memory` into `EAX`. */
    fn address(&mut self, memory: &Memory) {
        match *memory {
            Memory::Offset(offset) => self.a.const_(P32, RA, i64::from(offset)),
            Memory::Register(base) => self.a.widen(false, RA, home(base)),
            Memory::RelativeOffset(offset, base) => {
                self.a.widen(false, RA, home(base));
                self.a.const_op8(Add, AL, offset);
            },
            Memory::RelativeRegister(base, index) => {
                self.a.widen(false, RA, home(base));
                self.a.op8(Add, AL, home(index));
            },
        }
    }

    /**
     * Prepares a destination operand. A memory destination is addressed by
     * `EBP`. Other operands cannot be destinations; they are treated as
     * `AL`, which is scratch.
     */
    fn destination(&mut self, operand: &Operand) -> Dest {
        match operand {
            Operand::Register(r) => Dest::Reg(home(*r)),
            Operand::Memory(memory) => {
                self.address(memory);
                self.a.move_(P32, RBP, RA);
                Dest::Mem
            },
            _ => Dest::Reg(AL),
        }
    }

    /** Prepares a source operand. A memory source is addressed by `EAX`. */
    fn source(&mut self, operand: &Operand) -> Src {
        match operand {
            Operand::None => Src::Imm(0),
            Operand::Immediate(value) => Src::Imm(*value),
            Operand::Relative(rel) => Src::Imm(*rel as u8),
            Operand::Register(r) => Src::Reg(home(*r)),
            Operand::Memory(memory) => {
                self.address(memory);
                Src::Mem
            },
        }
    }

    /** Writes `AL` to `dest`. */
    fn store_result(&mut self, dest: Dest) {
        match dest {
            Dest::Reg(d) => self.a.move8(d, AL),
            Dest::Mem => self.a.store8(dest_address(), AL),
        }
    }

    fn store_const(&mut self, dest: Dest, value: u8) {
        match dest {
            Dest::Reg(d) => self.a.const8(d, value),
            Dest::Mem => self.a.const_store8(dest_address(), value),
        }
    }

    /** Loads `dest` into `EAX`, extended to 32 bits. */
    fn widen(&mut self, signed: bool, dest: Dest) {
        match dest {
            Dest::Reg(d) => self.a.widen(signed, RA, d),
            Dest::Mem => self.a.load_widen(signed, RA, dest_address()),
        }
    }

    // Flags.

    /** Converts the host `O`, `C`, `Z` and `S` flags into guest flags in `DL`. */
    fn pack_flags(&mut self) {
        self.a.set_if(Condition::O, true, AL);
        self.a.lahf();
        // ZF and SF are bits 6 and 7, and CF is bit 0.
        self.a.const_shift8(ShiftOp::Rol, AH, 2);
        self.a.const_op8(And, AH, flag::Z | flag::S | flag::C);
        self.a.const_shift8(ShiftOp::Shl, AL, 3);
        self.a.op8(Or, AH, AL);
        self.a.move8(DL, AH);
    }

    /** Sets `DL` to the guest `Z` and `S` flags of `AL`. Corrupts `AL`. */
    fn zs_flags(&mut self) {
        self.a.test8(AL, AL);
        self.a.set_if(Condition::S, true, DL);
        self.a.set_if(Condition::Z, true, AL);
        self.a.const_shift8(ShiftOp::Shl, DL, 1);
        self.a.op8(Or, DL, AL);
    }

    /** ORs `AH`, which must be 0 or 1, shifted left by `shift` into `DL`. */
    fn or_flag(&mut self, shift: u8) {
        if shift > 0 {
            self.a.const_shift8(ShiftOp::Shl, AH, shift);
        }
        self.a.op8(Or, DL, AH);
    }

    /** Converts the guest flags in `DL` into host `Z`, `S`, `C` and `O` flags. */
    fn unpack_flags(&mut self) {
        self.a.move8(AH, DL);
        self.a.const_shift8(ShiftOp::Ror, AH, 2);
        self.a.move8(AL, DL);
        self.a.const_op8(And, AL, flag::O);
        self.a.const_shift8(ShiftOp::Shl, AL, 4);
        // Overflows if and only if `AL` is 0x80.
        self.a.const_op8(Add, AL, 0x80);
        self.a.sahf();
    }

    // Instructions.

    /**
     * Translates `node`. If it writes memory, it checks whether the byte
     * written holds compiled code, and if so refunds `after` and exits.
     */
    fn instruction(&mut self, node: &Node, after: usize) {
        use Mnemonic as M;
        let [first, second, _] = node.instruction.operands;
        let stored = match node.instruction.mnemonic {
            M::Nop => false,
            M::Mov => self.move_(&first, &second),
            M::Add => self.binary(Add, &first, &second),
            M::Sub => self.binary(Sub, &first, &second),
            M::And => self.binary(And, &first, &second),
            M::Or => self.binary(Or, &first, &second),
            M::Xor => self.binary(Xor, &first, &second),
            M::Cmp => self.binary(Cmp, &first, &second),
            M::Not => self.unary(UnaryOp::Not, &first),
            M::Neg => self.unary(UnaryOp::Neg, &first),
            M::Mul => self.multiply(&first, &second),
            M::Udiv => self.divide(false, false, &first, &second),
            M::Umod => self.divide(false, true, &first, &second),
            M::Sdiv => self.divide(true, false, &first, &second),
            M::Smod => self.divide(true, true, &first, &second),
            M::Shl => self.shift(true, &first, &second),
            M::Shr => self.shift(false, &first, &second),
            m => {
                if let Some(target) = node.target {
                    self.branch(m, target);
                }
                false
            },
        };
        if stored {
            let code = Address {base: MEMORY, index: Some(RBP), disp: ram_field(offset_of!(Ram, code))};
            self.a.const_store_op8(Cmp, code, 0);
            let mut label = Label::new();
            self.a.jump_if(Condition::Z, false, &mut label);
            self.stubs.push(Stub::Modified {label, cycles: after, pc: node.instruction.next(node.offset)});
        }
    }

    fn move_(&mut self, first: &Operand, second: &Operand) -> bool {
        let dest = self.destination(first);
        match (dest, self.source(second)) {
            (Dest::Reg(d), Src::Imm(v)) => self.a.const8(d, v),
            (Dest::Reg(d), Src::Reg(s)) => self.a.move8(d, s),
            (Dest::Reg(d), Src::Mem) => self.a.load8(d, source_address()),
            (Dest::Mem, Src::Imm(v)) => self.a.const_store8(dest_address(), v),
            (Dest::Mem, Src::Reg(s)) => self.a.store8(dest_address(), s),
            (Dest::Mem, Src::Mem) => {
                self.a.load8(AH, source_address());
                self.a.store8(dest_address(), AH);
            },
        }
        dest == Dest::Mem
    }

    fn binary(&mut self, op: BinaryOp, first: &Operand, second: &Operand) -> bool {
        let dest = self.destination(first);
        match (dest, self.source(second)) {
            (Dest::Reg(d), Src::Imm(v)) => self.a.const_op8(op, d, v),
            (Dest::Reg(d), Src::Reg(s)) => self.a.op8(op, d, s),
            (Dest::Reg(d), Src::Mem) => self.a.load_op8(op, d, source_address()),
            (Dest::Mem, Src::Imm(v)) => self.a.const_store_op8(op, dest_address(), v),
            (Dest::Mem, Src::Reg(s)) => self.a.store_op8(op, dest_address(), s),
            (Dest::Mem, Src::Mem) => {
                self.a.load8(AH, source_address());
                self.a.store_op8(op, dest_address(), AH);
            },
        }
        self.pack_flags();
        dest == Dest::Mem && op != Cmp
    }

    fn unary(&mut self, op: UnaryOp, first: &Operand) -> bool {
        let dest = self.destination(first);
        match dest {
            Dest::Reg(d) => {
                self.a.unary8(op, d);
                if op == UnaryOp::Not { self.a.test8(d, d); }
            },
            Dest::Mem => {
                self.a.store_unary8(op, dest_address());
                if op == UnaryOp::Not { self.a.const_store_test8(dest_address(), 0xFF); }
            },
        }
        self.pack_flags();
        dest == Dest::Mem
    }

    fn multiply(&mut self, first: &Operand, second: &Operand) -> bool {
        let dest = self.destination(first);
        let src = self.source(second);
        match src {
            Src::Imm(v) => self.a.const8(AH, v),
            Src::Mem => self.a.load8(AH, source_address()),
            Src::Reg(_) => {},
        }
        match dest {
            Dest::Reg(d) => self.a.move8(AL, d),
            Dest::Mem => self.a.load8(AL, dest_address()),
        }
        match src {
            Src::Reg(s) => self.a.unary8(UnaryOp::Mul, s),
            _ => self.a.unary8(UnaryOp::Mul, AH),
        }
        self.a.set_if(Condition::B, true, AH);
        self.store_result(dest);
        self.zs_flags();
        self.or_flag(2);
        self.or_flag(1);
        dest == Dest::Mem
    }

    fn divide(&mut self, signed: bool, modulo: bool, first: &Operand, second: &Operand) -> bool {
        let dest = self.destination(first);
        let src = self.source(second);
        // The divisor goes in `R8D`.
        match src {
            Src::Imm(0) => {
                self.store_const(dest, 0);
                self.a.const8(DL, flag::Z | flag::C | flag::O);
                return dest == Dest::Mem;
            },
            Src::Imm(v) => {
                let divisor = if signed { i64::from(v as i8) } else { i64::from(v) };
                self.a.const_(P32, R8, divisor);
            },
            Src::Reg(s) => {
                self.a.widen(signed, RA, s);
                self.a.move_(P32, R8, RA);
            },
            Src::Mem => {
                self.a.load_widen(signed, RA, source_address());
                self.a.move_(P32, R8, RA);
            },
        }
        let mut zero = Label::new();
        let variable = !matches!(src, Src::Imm(_));
        if variable {
            self.a.test(P32, R8, R8);
            self.a.jump_if(Condition::Z, true, &mut zero);
        }
        self.widen(signed, dest);
        // `RD` holds guest state.
        self.a.move_(P64, R9, RD);
        if signed {
            self.a.cdq();
            self.a.sdiv(P32, R8);
        } else {
            self.a.const_(P32, RD, 0);
            self.a.udiv(P32, R8);
        }
        if modulo {
            self.a.move_(P32, RA, RD);
        }
        self.a.move_(P64, RD, R9);
        let overflow = signed && !modulo;
        if overflow {
            // Only -128 / -1 gives 128.
            self.a.const_op(Cmp, P32, RA, 0x80);
            self.a.set_if(Condition::Z, true, AH);
        }
        self.store_result(dest);
        self.zs_flags();
        if overflow {
            self.or_flag(3);
        }
        if variable {
            let mut done = Label::new();
            self.a.const_jump(&mut done);
            self.a.define(&mut zero);
            self.store_const(dest, 0);
            self.a.const8(DL, flag::Z | flag::C | flag::O);
            self.a.define(&mut done);
        }
        dest == Dest::Mem
    }

    fn shift(&mut self, left: bool, first: &Operand, second: &Operand) -> bool {
        let dest = self.destination(first);
        // The count, at most 8, goes in `R9D`.
        match self.source(second) {
            Src::Imm(v) => self.a.const_(P32, RA, i64::from(std::cmp::min(v, 8))),
            src => {
                match src {
                    Src::Reg(s) => self.a.widen(false, RA, s),
                    _ => self.a.load_widen(false, RA, source_address()),
                }
                let mut small = Label::new();
                self.a.const_op(Cmp, P32, RA, 8);
                self.a.jump_if(Condition::B, true, &mut small);
                self.a.const_(P32, RA, 8);
                self.a.define(&mut small);
            },
        }
        self.a.move_(P32, R9, RA);
        self.widen(false, dest);
        // `RC` holds guest state.
        self.a.move_(P64, R8, RC);
        self.a.move_(P32, RC, R9);
        if left {
            self.a.shift(ShiftOp::Shl, P32, RA);
        } else {
            self.a.const_shift(ShiftOp::Shl, P32, RA, 8);
            self.a.shift(ShiftOp::Shr, P32, RA);
            self.a.exchange8(AH, AL);
        }
        self.a.move_(P64, RC, R8);
        // The bits shifted out are in `AH`.
        self.a.test8(AH, AH);
        self.a.set_if(Condition::Z, false, AH);
        self.store_result(dest);
        self.zs_flags();
        self.or_flag(2);
        dest == Dest::Mem
    }

    fn branch(&mut self, mnemonic: Mnemonic, target: u8) {
        use Mnemonic::*;
        let (mask, if_set) = match mnemonic {
            Jmp => {
                self.jump(None, target);
                return;
            },
            Jsl | Jsge | Jsle | Jsg => {
                self.unpack_flags();
                let cc = match mnemonic {
                    Jsl => Condition::L,
                    Jsge => Condition::GE,
                    Jsle => Condition::LE,
                    _ => Condition::G,
                };
                self.jump(Some((cc, true)), target);
                return;
            },
            Jz => (flag::Z, true),
            Jnz => (flag::Z, false),
            Js => (flag::S, true),
            Jns => (flag::S, false),
            Jo => (flag::O, true),
            Jno => (flag::O, false),
            Jul => (flag::C, true),
            Juge => (flag::C, false),
            Jule => (flag::C | flag::Z, true),
            Jug => (flag::C | flag::Z, false),
            _ => return,
        };
        self.a.const_test8(DL, mask);
        self.jump(Some((Condition::Z, !if_set)), target);
    }

    /** Jumps to the segment starting at `target`, or exits to it. */
    fn jump(&mut self, cc: Option<(Condition, bool)>, target: u8) {
        let label = match self.segments.get_mut(&target) {
            Some(label) => label,
            None => self.exits.entry(target).or_insert_with(Label::new),
        };
        match cc {
            Some((cc, is_true)) => self.a.jump_if(cc, is_true, label),
            None => self.a.const_jump(label),
        }
    }
}

//-----------------------------------------------------------------------------

/**
 * Assembles an `extern "sysv64" fn(*mut NativeState, usize)` that loads the
 * state into host registers, calls the native code at the given address,
 * and stores the state back.
 */
pub fn trampoline() -> Vec<u8> {
    let mut a = Assembler::new(VecU8::default());
    let state = |offset: usize| Address::field(RBP, offset as i32);
    let registers = offset_of!(NativeState, registers);
    let flags = offset_of!(NativeState, flags);
    let cycles = offset_of!(NativeState, cycles);
    a.push(RB);
    a.push(RBP);
    a.move_(P64, RBP, RDI);
    a.move_(P64, RA, RSI);
    a.load16(RB, state(registers));
    a.load16(RC, state(registers + 2));
    a.load16(RD, state(flags));
    a.load64(CYCLES, state(cycles));
    a.load64(MEMORY, state(offset_of!(NativeState, memory)));
    a.push(RBP);
    a.call(RA);
    a.pop(RBP);
    a.store16(state(registers), RB);
    a.store16(state(registers + 2), RC);
    a.store16(state(flags), RD);
    a.store64(state(cycles), CYCLES);
    a.pop(RBP);
    a.pop(RB);
    a.ret();
    a.into_buffer().into_vec()
}

//-----------------------------------------------------------------------------

#[cfg(test)]
pub mod tests {
    use super::*;
    use super::super::assembler::tests::{disassemble};

    use crate::assembler::{assemble};
    use crate::graph::{Graph};

    fn lower_first(source: &str) -> Lowered {
        let binary = assemble(source).unwrap();
        let graph = Graph::build(&binary.data, binary.entrypoint);
        let (_, block) = graph.blocks().next().unwrap();
        lower(block, &[block.start])
    }

    #[test]
    fn homes() {
        assert_eq!(home(Guest::R0), BL);
        assert_eq!(home(Guest::R1), BH);
        assert_eq!(home(Guest::Flags), DL);
        assert_eq!(home(Guest::Pc), DH);
    }

    #[test]
    fn add_and_halt() {
        let lowered = lower_first("add r0, r1\nhlt");
        disassemble(&lowered.code, vec![
            "sub rsi,3",
            "jb near 000000000000002Bh",
            "add bl,bh",
            "seto al",
            "lahf",
            "rol ah,2",
            "and ah,7",
            "shl al,3",
            "or ah,al",
            "mov dl,ah",
            "add rsi,1",
            "mov dh,2",
            "ret",
            // Stall.
            "add rsi,3",
            "mov dh,0",
            "ret",
            // Patch stubs.
            "add rsi,3",
            "mov dh,0",
            "ret",
            "add rsi,1",
            "mov dh,2",
            "ret",
        ]).unwrap();
        assert_eq!(lowered.entries, vec![(0, 0)]);
        assert_eq!(lowered.sites, vec![
            Site {pc: 0, size: 2, native: 13, stub: 0x36, patched: false},
            Site {pc: 2, size: 1, native: 0x20, stub: 0x41, patched: false},
        ]);
    }

    #[test]
    fn segments() {
        // `top` is a branch target, and the code after `jnz` starts another segment.
        let lowered = lower_first("mov r0, 3\ntop: sub r0, 1\njnz top\nnop\nhlt");
        let pcs: Vec<u8> = lowered.entries.iter().map(|&(pc, _)| pc).collect();
        assert_eq!(pcs, vec![0, 3, 8]);
        assert_eq!(lowered.sites.len(), 5);
        for site in &lowered.sites {
            let next = lowered.sites.iter().map(|s| s.native).filter(|&n| n > site.native).min();
            if let Some(next) = next {
                assert!(next - site.native >= MIN_SITE);
            }
        }
    }

    #[test]
    fn stores_are_checked() {
        let lowered = lower_first("mov [200], r0\nhlt");
        // cmp byte [rdi+rbp+100h],0
        let check = [0x80, 0xBC, 0x2F, 0x00, 0x01, 0x00, 0x00, 0x00];
        assert!(lowered.code.windows(check.len()).any(|w| w == check));
    }
}

/**
 * The x86_64 general-purpose registers.
 *
 * All register names include a leading `R`, and omit a trailing `X`. This is
 * not intended to imply anything about the operand width, which is specified
 * in another way.
 */
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(clippy::upper_case_acronyms)]
pub enum Register {
    RA = 0,
    RC = 1,
    RD = 2,
    RB = 3,
    RSP = 4,
    RBP = 5,
    RSI = 6,
    RDI = 7,
    R8 = 8,
    R9 = 9,
    R10 = 10,
    R11 = 11,
    R12 = 12,
    R13 = 13,
    R14 = 14,
    R15 = 15,
}

impl Register {
    /** Returns a bit pattern which includes `self` in all useful positions. */
    pub fn mask(self) -> u64 {
        [
            0x0000000000,
            0x0909090900, // 1
            0x1212121200, // 2
            0x1B1B1B1B00,
            0x2424242400, // 4
            0x2D2D2D2D00,
            0x3636363600,
            0x3F3F3F3F00,
            0x0000000007, // 8
            0x0909090907,
            0x1212121207,
            0x1B1B1B1B07,
            0x2424242407,
            0x2D2D2D2D07,
            0x3636363607,
            0x3F3F3F3F07,
        ][self as usize]
    }

    /** The low three bits, for registers that need no REX prefix. */
    pub fn legacy(self) -> u8 {
        assert!((self as u8) < 8, "{:?} needs a REX prefix", self);
        self as u8
    }
}

/** The byte registers that can be named without a REX prefix. */
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(clippy::upper_case_acronyms)]
pub enum Byte {
    AL = 0,
    CL = 1,
    DL = 2,
    BL = 3,
    AH = 4,
    CH = 5,
    DH = 6,
    BH = 7,
}

//-----------------------------------------------------------------------------

/**
 * Represents the precision of an arithmetic operation.
 * With P32, the arithmetic is performed with 32-bit precision, and written
 * into the bottom 32 bits of the destination. The top 32 bits are 0.
 */
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Precision {
    P32 = 0,
    P64 = 1,
}

impl Precision {
    pub fn bits(self) -> usize {
        match self {
            Precision::P32 => 32,
            Precision::P64 => 64,
        }
    }

    pub fn w_bit(self) -> u64 {
        (self as u64) << 3
    }
}

//-----------------------------------------------------------------------------

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum BinaryOp {
    Add = 0,
    Or = 1,
    Adc = 2,
    Sbb = 3,
    And = 4,
    Sub = 5,
    Xor = 6,
    Cmp = 7,
}

impl BinaryOp {
    pub fn rm_imm(self, rm_is_reg: bool) -> u64 {
        0x808140 | (rm_is_reg as u64) << 22 | (self as u64) << 19
    }

    pub fn rm_reg(self, rm_is_reg: bool) -> u64 {
        0x800140 | (rm_is_reg as u64) << 22 | (self as u64) << 11
    }

    /** The one-byte opcode of the 8-bit form with the register in `reg`. */
    pub fn rm_reg8(self) -> u8 {
        (self as u8) << 3
    }

    /** The one-byte opcode of the 8-bit form with the register in `rm`. */
    pub fn reg_rm8(self) -> u8 {
        (self as u8) << 3 | 2
    }
}

//-----------------------------------------------------------------------------

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ShiftOp {
    Rol = 0,
    Ror = 1,
    Rcl = 2,
    Rcr = 3,
    Shl = 4,
    Shr = 5,
    // 6 is allegedly an undocumented synonym for 4.
    Sar = 7,
}

impl ShiftOp {
    pub fn rm_imm(self, rm_is_reg: bool) -> u64 {
        0x80C140 | (rm_is_reg as u64) << 22 | (self as u64) << 19
    }

    pub fn rm_c(self, rm_is_reg: bool) -> u64 {
        0x80D340 | (rm_is_reg as u64) << 22 | (self as u64) << 19
    }
}

//-----------------------------------------------------------------------------

/** The 8-bit instructions of the `F6` group that take one operand. */
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum UnaryOp {
    Not = 2,
    Neg = 3,
    /** Unsigned multiply `AL` by the operand, giving `AX`. */
    Mul = 4,
}

//-----------------------------------------------------------------------------

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(clippy::upper_case_acronyms)]
pub enum Condition {
    O  = 0x0,
    NO = 0x1,
    B  = 0x2,
    AE = 0x3,
    Z  = 0x4,
    NZ = 0x5,
    BE = 0x6,
    A  = 0x7,
    S  = 0x8,
    NS = 0x9,
    P  = 0xA,
    NP = 0xB,
    L  = 0xC,
    GE = 0xD,
    LE = 0xE,
    G  = 0xF,
}

impl Condition {
    fn code(self, is_true: bool) -> u8 {
        (!is_true as u8) ^ (self as u8)
    }

    pub fn jump_if(self, is_true: bool) -> u64 {
        0x800F | u64::from(self.code(is_true)) << 8
    }

    pub fn set_if(self, is_true: bool) -> u64 {
        0xC0900F | u64::from(self.code(is_true)) << 8
    }
}

//-----------------------------------------------------------------------------

/**
 * A memory operand `[base+index+disp]`. The registers must be nameable
 * without a REX prefix, and `index` must not be `RSP`.
 */
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    pub base: Register,
    pub index: Option<Register>,
    pub disp: i32,
}

impl Address {
    pub fn indexed(base: Register, index: Register) -> Self {
        Address {base, index: Some(index), disp: 0}
    }

    pub fn field(base: Register, disp: i32) -> Self {
        Address {base, index: None, disp}
    }
}

//-----------------------------------------------------------------------------

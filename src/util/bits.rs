/**
 * Accumulates fields of up to 8 bits, most significant bit first, with no
 * padding between them.
 */
#[derive(Debug, Default, Clone)]
pub struct BitWriter {
    bytes: Vec<u8>,
    /// The number of bits written so far.
    len: usize,
}

impl BitWriter {
    pub fn new() -> Self { Self::default() }

    /** Appends the low `count` bits of `value`. */
    pub fn write(&mut self, value: u8, count: usize) {
        assert!(count <= 8);
        for i in (0..count).rev() {
            let bit = (value >> i) & 1;
            if self.len % 8 == 0 {
                self.bytes.push(0);
            }
            if bit != 0 {
                let last = self.bytes.len() - 1;
                self.bytes[last] |= 0x80 >> (self.len % 8);
            }
            self.len += 1;
        }
    }

    /** The number of bits written so far. */
    pub fn bit_len(&self) -> usize { self.len }

    /** Returns the bytes, the last one padded with zero bits. */
    pub fn finish(self) -> Vec<u8> { self.bytes }
}

//-----------------------------------------------------------------------------

/**
 * Reads fields of up to 8 bits from a 256-byte memory, most significant bit
 * first, starting at a byte address. Addresses wrap modulo 256.
 */
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    memory: &'a [u8; 256],
    start: u8,
    /// The number of bits read so far.
    pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(memory: &'a [u8; 256], start: u8) -> Self {
        BitReader {memory, start, pos: 0}
    }

    /** Reads `count` bits as an unsigned value. */
    pub fn read(&mut self, count: usize) -> u8 {
        assert!(count <= 8);
        let mut value = 0u8;
        for _ in 0..count {
            let address = self.start.wrapping_add((self.pos / 8) as u8);
            let bit = (self.memory[address as usize] >> (7 - self.pos % 8)) & 1;
            value = (value << 1) | bit;
            self.pos += 1;
        }
        value
    }

    /** The number of bits read so far. */
    pub fn bit_len(&self) -> usize { self.pos }

    /** The number of whole bytes touched so far. */
    pub fn byte_len(&self) -> usize { (self.pos + 7) / 8 }
}

//-----------------------------------------------------------------------------

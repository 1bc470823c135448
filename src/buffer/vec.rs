use std::ops::{Deref, DerefMut};
use super::{Buffer};

/** A [`Buffer`] backed by a `Vec<u8>` that grows as it is written. */
#[allow(clippy::module_name_repetitions)]
#[derive(Debug, Default)]
pub struct VecU8 {
    buffer: Vec<u8>,
    pos: usize,
}

impl VecU8 {
    pub fn new(buffer: Vec<u8>) -> Self {
        VecU8 {buffer, pos: 0}
    }

    /** Returns the written bytes, discarding any beyond the high-water mark. */
    pub fn into_vec(self) -> Vec<u8> { self.buffer }
}

impl Deref for VecU8 {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &*self.buffer
    }
}

impl DerefMut for VecU8 {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buffer
    }
}

impl Buffer for VecU8 {
    fn get_pos(&self) -> usize { self.pos }
    fn set_pos(&mut self, pos: usize) { self.pos = pos; }

    fn write_byte(&mut self, byte: u8) {
        if self.pos >= self.buffer.len() {
            self.buffer.resize(self.pos + 1, 0);
        }
        self.buffer[self.pos] = byte;
        self.pos += 1;
    }
}

//-----------------------------------------------------------------------------

use std::collections::{HashMap};

use crate::arch::{Instruction, MEMORY_SIZE};

/** An assembled program: the initial memory, the start address and the named ports. */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binary {
    pub data: [u8; MEMORY_SIZE],
    pub entrypoint: u8,
    /** Port names declared with `.port`, mapped to port ids. */
    pub ports: HashMap<String, u8>,
}

impl Binary {
    pub fn new() -> Self {
        Binary {data: [0; MEMORY_SIZE], entrypoint: 0, ports: HashMap::new()}
    }

    /** Builds a [`Binary`] that starts at address 0 of `bytes`. */
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut binary = Binary::new();
        let len = std::cmp::min(bytes.len(), MEMORY_SIZE);
        binary.data[..len].copy_from_slice(&bytes[..len]);
        binary
    }

    /**
     * Disassembles `count` consecutive instructions starting at the
     * entrypoint. Stops early at an invalid instruction.
     */
    pub fn disassemble(&self, count: usize) -> Vec<(u8, String)> {
        let mut listing = Vec::new();
        let mut offset = self.entrypoint;
        for _ in 0..count {
            match Instruction::decode(&self.data, offset) {
                Some(instruction) => {
                    listing.push((offset, instruction.to_string()));
                    offset = instruction.next(offset);
                },
                None => break,
            }
        }
        listing
    }
}

impl Default for Binary {
    fn default() -> Self { Binary::new() }
}

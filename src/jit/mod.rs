//! A just-in-time compiler from HubArch to x86_64.
//!
//! A [`Jit`] belongs to one [`Processor`]. It partitions the code reachable
//! from the program counter into blocks using a [`Graph`], translates each
//! block, and shares the translations with other processors through a
//! [`BlockCache`]. Native code runs until it leaves the compiled code, runs
//! out of cycles, reaches an instruction it cannot translate, or writes a byte
//! of memory from which code was compiled. The interpreter handles the rest.
//!
//! When a compiled byte is written, each instruction that includes it is
//! overwritten by a jump to an exit. A shared block is copied first.
//!
//! [`Processor`]: crate::processor::Processor

use std::cell::{RefCell};
use std::rc::{Rc};
use tracing::{debug};

use crate::arch::{MEMORY_SIZE};
use crate::buffer::{Executable};
use crate::graph::{Block, Graph};
use crate::processor::{Ram, Registers};

mod label;
pub use label::{Label};

mod cache;
pub use cache::{BlockKey, Site, Lowered, CompiledBlock, NativeState, BlockCache};

#[cfg(target_arch="x86_64")]
pub mod x86_64;


/** The native code at which to enter a [`CompiledBlock`]. */
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct Entry {
    /** Index into `Jit.blocks`. */
    block: usize,
    offset: usize,
}

/** The state of the JIT compiler for one [`Processor`](crate::processor::Processor). */
pub struct Jit {
    cache: Rc<RefCell<BlockCache>>,
    /** `None` only while a block is being patched. */
    blocks: Vec<Option<Rc<CompiledBlock>>>,
    entries: [Option<Entry>; MEMORY_SIZE],
    /** The addresses from which compilation has been attempted. */
    attempted: [bool; MEMORY_SIZE],
}

impl Jit {
    pub fn new(cache: Rc<RefCell<BlockCache>>) -> Self {
        Jit {
            cache,
            blocks: Vec::new(),
            entries: [None; MEMORY_SIZE],
            attempted: [false; MEMORY_SIZE],
        }
    }

    pub fn cache(&self) -> &Rc<RefCell<BlockCache>> { &self.cache }

    /** The blocks that can currently be entered. */
    pub fn blocks(&self) -> impl Iterator<Item=&Rc<CompiledBlock>> {
        self.blocks.iter().flatten()
    }

    /** Whether native code can be entered at `pc`. */
    pub fn is_compiled(&self, pc: u8) -> bool {
        self.entries[pc as usize].is_some()
    }

    /** Forgets all native code. */
    pub fn clear(&mut self, ram: &mut Ram) {
        self.blocks.clear();
        self.entries = [None; MEMORY_SIZE];
        self.attempted = [false; MEMORY_SIZE];
        ram.code = [0; MEMORY_SIZE];
        ram.modified = 0;
    }

    /**
     * Compiles the code reachable from `pc`, unless native code can already
     * be entered there or compilation has already been attempted.
     */
    pub fn compile(&mut self, ram: &mut Ram, pc: u8) {
        if self.entries[pc as usize].is_some() || self.attempted[pc as usize] { return; }
        self.attempted[pc as usize] = true;
        if !self.cache.borrow().is_available() { return; }
        let graph = Graph::build(&ram.bytes, pc);
        for (_, block) in graph.blocks() {
            let entries: Vec<u8> = block.nodes.iter()
                .map(|node| node.offset)
                .filter(|&offset| offset == block.start || graph.entries().contains(&offset))
                .collect();
            if entries.iter().all(|&offset| self.entries[offset as usize].is_some()) { continue; }
            let key = BlockKey::new(block, &ram.bytes, entries);
            if let Some(compiled) = self.translate(block, key) {
                self.install(compiled);
            }
        }
        self.update_code_map(ram);
    }

    /** Finds `key` in the cache, or compiles `block` and adds it. */
    fn translate(&mut self, block: &Block, key: BlockKey) -> Option<Rc<CompiledBlock>> {
        if let Some(compiled) = self.cache.borrow_mut().lookup(&key) {
            debug!(start = key.start, "reusing a cached block");
            return Some(compiled);
        }
        let lowered = lower(block, &key.entries)?;
        match CompiledBlock::new(key, lowered) {
            Ok(compiled) => {
                debug!(start = block.start, len = block.len, "compiled a block");
                let compiled = Rc::new(compiled);
                self.cache.borrow_mut().insert(&compiled);
                Some(compiled)
            },
            Err(e) => {
                debug!(error = %e, "cannot allocate a block");
                None
            },
        }
    }

    fn install(&mut self, compiled: Rc<CompiledBlock>) {
        let block = self.blocks.len();
        for &(pc, offset) in compiled.entries() {
            self.entries[pc as usize] = Some(Entry {block, offset});
        }
        self.blocks.push(Some(compiled));
    }

    /**
     * Drops blocks that cannot be entered, renumbering the others, and marks
     * the bytes of the rest.
     */
    fn update_code_map(&mut self, ram: &mut Ram) {
        let mut renumber = vec![None; self.blocks.len()];
        for entry in self.entries.iter().flatten() {
            renumber[entry.block] = Some(0);
        }
        let mut blocks = Vec::new();
        for (block, index) in std::mem::take(&mut self.blocks).into_iter().zip(&mut renumber) {
            match block {
                Some(block) if index.is_some() => {
                    *index = Some(blocks.len());
                    blocks.push(Some(block));
                },
                _ => { *index = None; },
            }
        }
        self.blocks = blocks;
        for entry in &mut self.entries {
            *entry = entry.and_then(|e| renumber[e.block].map(|block| Entry {block, ..e}));
        }
        self.cache.borrow_mut().purge();
        ram.code = [0; MEMORY_SIZE];
        for block in self.blocks.iter().flatten() {
            for site in block.sites().iter().filter(|site| !site.patched) {
                let start = site.pc as usize;
                let end = std::cmp::min(start + site.size as usize, MEMORY_SIZE);
                for byte in &mut ram.code[start..end] { *byte = 1; }
            }
        }
    }

    /**
     * Runs native code at the program counter, if there is any. Returns
     * `true` if the program counter or the cycle budget changed.
     */
    pub fn call(&mut self, registers: &mut Registers, cycles: &mut usize, ram: &mut Ram) -> bool {
        let pc = registers.pc;
        let entry = match self.entries[pc as usize] {
            Some(entry) => entry,
            None => return false,
        };
        let target = match self.blocks[entry.block].as_ref().and_then(|block| block.code().address(entry.offset)) {
            Some(target) => target,
            None => return false,
        };
        let cache = self.cache.borrow();
        let trampoline = match cache.trampoline() {
            Some(trampoline) => trampoline,
            None => return false,
        };
        let mut state = NativeState {
            registers: registers.general,
            flags: registers.flags,
            pc,
            padding: [0; 2],
            cycles: *cycles as u64,
            memory: ram,
        };
        if let Err(e) = enter(trampoline, &mut state, target) {
            debug!(error = %e, "cannot run native code");
            return false;
        }
        let before = *cycles;
        registers.general = state.registers;
        registers.flags = state.flags;
        registers.pc = state.pc;
        *cycles = state.cycles as usize;
        state.pc != pc || *cycles != before
    }

    /**
     * Removes native code that includes the byte at `address`, which has been
     * written. Each affected instruction is overwritten with a jump to an
     * exit, so the rest of its block remains usable.
     */
    pub fn invalidate(&mut self, ram: &mut Ram, address: u8) {
        let mut changed = false;
        for index in 0..self.blocks.len() {
            let pcs: Vec<u8> = match &self.blocks[index] {
                Some(block) => block.sites().iter()
                    .filter(|site| !site.patched && site.covers(address))
                    .map(|site| site.pc)
                    .collect(),
                None => continue,
            };
            if pcs.is_empty() { continue; }
            changed = true;
            let patched = self.blocks[index].take().and_then(|block| patch_block(block, address));
            let drop_all = patched.is_none();
            self.blocks[index] = patched;
            for pc in 0..MEMORY_SIZE {
                if let Some(entry) = self.entries[pc] {
                    if entry.block == index && (drop_all || pcs.contains(&(pc as u8))) {
                        self.entries[pc] = None;
                    }
                }
            }
            for pc in pcs {
                self.attempted[pc as usize] = false;
            }
        }
        if changed {
            self.update_code_map(ram);
        }
    }
}

impl std::fmt::Debug for Jit {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Jit")
            .field("blocks", &self.blocks().count())
            .field("slots", &self.blocks.len())
            .field("entries", &self.entries.iter().flatten().count())
            .finish()
    }
}

/**
 * Patches `block` at `address`, copying it first if it is shared. Returns
 * `None` if that fails.
 */
fn patch_block(mut block: Rc<CompiledBlock>, address: u8) -> Option<Rc<CompiledBlock>> {
    if !block.is_cached() {
        if let Some(private) = Rc::get_mut(&mut block) {
            let ok = private.patch(address).is_ok();
            return if ok { Some(block) } else { None };
        }
    }
    let mut private = match block.try_clone() {
        Ok(private) => private,
        Err(e) => {
            debug!(error = %e, "cannot copy a block");
            return None;
        },
    };
    if let Err(e) = private.patch(address) {
        debug!(error = %e, "cannot patch a block");
        return None;
    }
    debug!(start = private.key().start, address, "patched a private copy of a block");
    Some(Rc::new(private))
}

#[cfg(target_arch="x86_64")]
fn lower(block: &Block, entries: &[u8]) -> Option<Lowered> {
    Some(x86_64::lower(block, entries))
}

#[cfg(not(target_arch="x86_64"))]
fn lower(_block: &Block, _entries: &[u8]) -> Option<Lowered> {
    None
}

#[cfg(target_arch="x86_64")]
fn enter(trampoline: &Executable, state: &mut NativeState, target: usize) -> std::io::Result<()> {
    // The trampoline and the blocks only access `state` and the `Ram` it points to.
    unsafe { trampoline.invoke(0, state, target) }
}

#[cfg(not(target_arch="x86_64"))]
fn enter(_trampoline: &Executable, _state: &mut NativeState, _target: usize) -> std::io::Result<()> {
    Err(std::io::Error::new(std::io::ErrorKind::Unsupported, "native code needs an x86_64 host"))
}

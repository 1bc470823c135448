use std::collections::hash_map::{DefaultHasher};
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};
use indexmap::{IndexMap};
use tracing::{debug};

use crate::arch::{MEMORY_SIZE};
use crate::buffer::{Executable};
use crate::graph::{Block};
use crate::processor::{Ram};

/** The number of leading opcodes that contribute to the hash of a [`BlockKey`]. */
const FINGERPRINT_LENGTH: usize = 8;

/**
 * Identifies the native code for a [`Block`]. Two blocks with the same start
 * address, bytes and entry points compile to the same code.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockKey {
    pub start: u8,
    pub bytes: Vec<u8>,
    /** The addresses at which native code may be entered. */
    pub entries: Vec<u8>,
    opcodes: Vec<u8>,
}

impl BlockKey {
    pub fn new(block: &Block, memory: &[u8; MEMORY_SIZE], entries: Vec<u8>) -> Self {
        let opcodes = block.nodes.iter().take(FINGERPRINT_LENGTH).map(|node| node.instruction.opcode).collect();
        BlockKey {start: block.start, bytes: block.bytes(memory), entries, opcodes}
    }

    /** A cheap hash of the start address and the first few opcodes. */
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

impl Hash for BlockKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.start.hash(state);
        self.opcodes.hash(state);
    }
}

//-----------------------------------------------------------------------------

/**
 * The native translation of one guest instruction. It is at least five bytes
 * long, so that it can be overwritten by a jump to `stub`, which refunds the
 * cycles of the rest of its segment and exits at `pc`.
 */
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Site {
    pub pc: u8,
    /** The guest instruction's length in bytes. */
    pub size: u8,
    pub native: usize,
    pub stub: usize,
    pub patched: bool,
}

impl Site {
    /** Whether the guest instruction includes the byte at `address`. */
    pub fn covers(&self, address: u8) -> bool {
        let address = address as usize;
        address >= self.pc as usize && address < self.pc as usize + self.size as usize
    }
}

/** The output of the code generator for one [`Block`]. */
#[derive(Debug, Clone, Default)]
pub struct Lowered {
    pub code: Vec<u8>,
    /** Guest addresses paired with the native offsets at which to enter. */
    pub entries: Vec<(u8, usize)>,
    pub sites: Vec<Site>,
}

/**
 * A [`Block`] translated into executable memory.
 *
 * A cached block may be shared by several processors through a
 * [`BlockCache`], so it is never patched. A processor that needs to patch it
 * makes a private copy first.
 */
#[derive(Debug)]
pub struct CompiledBlock {
    key: BlockKey,
    code: Executable,
    entries: Vec<(u8, usize)>,
    sites: Vec<Site>,
    cached: bool,
}

impl CompiledBlock {
    pub fn new(key: BlockKey, lowered: Lowered) -> std::io::Result<Self> {
        let code = Executable::new(&lowered.code)?;
        Ok(CompiledBlock {key, code, entries: lowered.entries, sites: lowered.sites, cached: true})
    }

    pub fn key(&self) -> &BlockKey { &self.key }

    pub fn code(&self) -> &Executable { &self.code }

    pub fn entries(&self) -> &[(u8, usize)] { &self.entries }

    pub fn sites(&self) -> &[Site] { &self.sites }

    pub fn is_cached(&self) -> bool { self.cached }

    /** Whether some unpatched instruction includes the byte at `address`. */
    pub fn covers(&self, address: u8) -> bool {
        self.sites.iter().any(|site| !site.patched && site.covers(address))
    }

    /** Allocates a private, uncached copy. */
    pub fn try_clone(&self) -> std::io::Result<Self> {
        Ok(CompiledBlock {
            key: self.key.clone(),
            code: self.code.try_clone()?,
            entries: self.entries.clone(),
            sites: self.sites.clone(),
            cached: false,
        })
    }

    /**
     * Overwrites each unpatched instruction that includes the byte at
     * `address` with a jump to its exit stub. Returns the guest addresses of
     * the patched instructions.
     */
    pub fn patch(&mut self, address: u8) -> std::io::Result<Vec<u8>> {
        assert!(!self.cached);
        let mut patched = Vec::new();
        for site in self.sites.iter_mut().filter(|site| !site.patched && site.covers(address)) {
            let disp = site.stub as i64 - (site.native as i64 + 5);
            let mut jump = vec![0xE9];
            jump.extend_from_slice(&(disp as i32).to_le_bytes());
            self.code.patch(site.native, &jump)?;
            site.patched = true;
            patched.push(site.pc);
        }
        Ok(patched)
    }
}

//-----------------------------------------------------------------------------

/**
 * The state passed to native code. The trampoline loads it into host
 * registers, calls a block, and stores it back.
 */
#[repr(C)]
#[derive(Debug)]
pub struct NativeState {
    pub registers: [u8; 4],
    pub flags: u8,
    pub pc: u8,
    pub padding: [u8; 2],
    pub cycles: u64,
    pub memory: *mut Ram,
}

/**
 * Native code shared between processors. Holds the trampoline used to enter
 * native code, and weak references to every [`CompiledBlock`], so that a
 * block lives as long as some processor uses it.
 */
#[derive(Debug)]
pub struct BlockCache {
    trampoline: Option<Executable>,
    blocks: IndexMap<BlockKey, Weak<CompiledBlock>>,
}

impl BlockCache {
    /**
     * Constructs an empty cache. If native code is not supported on this
     * host, or executable memory cannot be allocated, the cache is
     * unavailable and processors using it only interpret.
     */
    pub fn new() -> Self {
        let trampoline = build_trampoline().and_then(|code| match Executable::new(&code) {
            Ok(executable) => Some(executable),
            Err(e) => {
                debug!(error = %e, "cannot allocate the trampoline");
                None
            },
        });
        BlockCache {trampoline, blocks: IndexMap::new()}
    }

    pub fn is_available(&self) -> bool { self.trampoline.is_some() }

    pub fn trampoline(&self) -> Option<&Executable> { self.trampoline.as_ref() }

    /** Returns the live block with key `key`, if any. */
    pub fn lookup(&mut self, key: &BlockKey) -> Option<Rc<CompiledBlock>> {
        let block = self.blocks.get(key)?.upgrade();
        if block.is_none() {
            self.blocks.swap_remove(key);
        }
        block
    }

    /** Shares `block` with other users of this cache. */
    pub fn insert(&mut self, block: &Rc<CompiledBlock>) {
        if block.is_cached() {
            self.blocks.insert(block.key().clone(), Rc::downgrade(block));
        }
    }

    /** Forgets blocks that no processor uses. */
    pub fn purge(&mut self) {
        self.blocks.retain(|_, block| block.strong_count() > 0);
    }

    /** The number of live blocks. */
    pub fn len(&self) -> usize {
        self.blocks.values().filter(|block| block.strong_count() > 0).count()
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl Default for BlockCache {
    fn default() -> Self { BlockCache::new() }
}

#[cfg(target_arch="x86_64")]
fn build_trampoline() -> Option<Vec<u8>> {
    Some(super::x86_64::trampoline())
}

#[cfg(not(target_arch="x86_64"))]
fn build_trampoline() -> Option<Vec<u8>> {
    None
}

//-----------------------------------------------------------------------------

use std::collections::{BTreeMap};

use crate::arch::{Instruction};
use super::{PortId};

/** Whether a debugger lets the processor run. */
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DebugMode {
    Continue,
    Pause,
    /** Execute one instruction, then pause. */
    Step,
}

/** The kinds of memory access that trigger a breakpoint. */
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Breakpoint(u8);

impl Breakpoint {
    pub const NONE: Self = Breakpoint(0);
    pub const READ: Self = Breakpoint(1);
    pub const WRITE: Self = Breakpoint(2);
    pub const READ_WRITE: Self = Breakpoint(3);

    pub fn is_none(self) -> bool { self.0 == 0 }

    pub fn intersects(self, other: Self) -> bool { self.0 & other.0 != 0 }
}

/**
 * Callbacks for a debugger. The processor calls them but does not interpret
 * the results.
 */
pub trait DebugHooks {
    /** Called after each instruction executes, with its encoding. */
    fn operation(&mut self, _offset: u8, _bytes: &[u8], _instruction: &Instruction) {}

    fn port_connection_change(&mut self, _port: PortId, _connected: bool) {}

    fn breakpoint_change(&mut self, _offset: u8, _breakpoint: Breakpoint) {}

    fn debug_mode_change(&mut self, _mode: DebugMode) {}
}

/** Debugger state attached to a processor. */
pub struct Debugger {
    pub(super) mode: DebugMode,
    pub(super) breakpoints: BTreeMap<u8, Breakpoint>,
    pub(super) hooks: Option<Box<dyn DebugHooks>>,
    /** Set when resuming, so the instruction that hit a breakpoint can run. */
    pub(super) resuming: bool,
}

impl Debugger {
    pub fn new(mode: DebugMode) -> Self {
        Debugger {mode, breakpoints: BTreeMap::new(), hooks: None, resuming: false}
    }

    pub fn with_hooks(mode: DebugMode, hooks: Box<dyn DebugHooks>) -> Self {
        Debugger {hooks: Some(hooks), ..Debugger::new(mode)}
    }

    pub fn mode(&self) -> DebugMode { self.mode }

    pub fn breakpoint(&self, offset: u8) -> Breakpoint {
        self.breakpoints.get(&offset).copied().unwrap_or_default()
    }

    /** Whether the processor may run native code while this is attached. */
    pub fn is_transparent(&self) -> bool {
        self.mode == DebugMode::Continue && self.breakpoints.is_empty() && self.hooks.is_none()
    }

    pub(super) fn set_mode(&mut self, mode: DebugMode) {
        if mode != self.mode {
            if self.mode == DebugMode::Pause { self.resuming = true; }
            self.mode = mode;
            if let Some(hooks) = self.hooks.as_mut() { hooks.debug_mode_change(mode); }
        }
    }

    pub(super) fn set_breakpoint(&mut self, offset: u8, breakpoint: Breakpoint) {
        if breakpoint.is_none() {
            self.breakpoints.remove(&offset);
        } else {
            self.breakpoints.insert(offset, breakpoint);
        }
        if let Some(hooks) = self.hooks.as_mut() { hooks.breakpoint_change(offset, breakpoint); }
    }

    /** Tests whether any of `accesses` hits a breakpoint. */
    pub(super) fn hits(&self, accesses: &[(u8, Breakpoint)]) -> bool {
        accesses.iter().any(|&(address, kind)| self.breakpoint(address).intersects(kind))
    }

    pub(super) fn hooks(&mut self) -> Option<&mut (dyn DebugHooks + 'static)> {
        self.hooks.as_deref_mut()
    }
}

impl std::fmt::Debug for Debugger {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Debugger")
            .field("mode", &self.mode)
            .field("breakpoints", &self.breakpoints)
            .finish()
    }
}

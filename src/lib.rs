//! HubArch: an 8-bit virtual CPU with an assembler, an interpreter and an
//! x86_64 JIT compiler, plus a scheduler that runs processors which talk to
//! each other through ports.

pub mod util;

pub mod buffer;

pub mod arch;

pub mod assembler;

pub mod processor;

pub mod module;

pub mod graph;

pub mod jit;

pub mod scheduler;

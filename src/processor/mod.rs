//! The HubArch interpreter.
//!
//! A [`Processor`] executes instructions against its own 256 bytes of memory
//! until its cycle budget runs out, it halts, or a port handshake cannot yet
//! make progress. If it has a [`Jit`], straight-line code runs natively.

use std::cell::{RefCell};
use std::collections::{HashMap};
use std::rc::{Rc};
use tracing::{trace};

use crate::arch::{Instruction, CLOCK_RATE, MEMORY_SIZE, PORT_WINDOW};
use crate::assembler::{Binary};
use crate::jit::{BlockCache, Jit};

mod port;
pub use port::{PortId, Transfer, PortResponse, Device, DeviceRef, Side, Endpoint, PortConnection};

mod debugger;
pub use debugger::{DebugMode, Breakpoint, DebugHooks, Debugger};

mod execute;
pub use execute::{compute, Execution};

#[cfg(test)]
mod tests;

/**
 * The memory of a [`Processor`], laid out for access by native code.
 */
#[repr(C)]
#[derive(Clone)]
pub struct Ram {
    pub bytes: [u8; MEMORY_SIZE],
    /** Nonzero for each byte from which native code has been compiled. */
    pub code: [u8; MEMORY_SIZE],
    /** Set by native code when it writes a byte marked in `code`. */
    pub modified: u8,
    /** The address written, when `modified` is set. */
    pub modified_address: u8,
}

impl Ram {
    pub fn new(bytes: [u8; MEMORY_SIZE]) -> Self {
        Ram {bytes, code: [0; MEMORY_SIZE], modified: 0, modified_address: 0}
    }
}

impl std::fmt::Debug for Ram {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Ram({:02X?})", &self.bytes[..])
    }
}

/** The registers of a [`Processor`]. */
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Registers {
    pub general: [u8; 4],
    pub flags: u8,
    pub pc: u8,
}

/** A port operation of the executing instruction. */
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Request {
    Send(Vec<u8>),
    /** The destination address. */
    Receive(u8),
}

/** The state of a [`Processor`]'s port handshake. */
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Message {
    Idle,
    /** Waiting for the device on `port` to respond. */
    Posted {port: PortId, request: Request, timestamp: usize},
    /** The other device completed the handshake. */
    Complete {wait: usize},
}

//-----------------------------------------------------------------------------

/** An interpreter for HubArch. */
pub struct Processor {
    registers: Registers,
    /** The remaining cycle budget. */
    cycles: usize,
    complete: bool,
    message: Message,
    ram: Box<Ram>,
    ports: HashMap<PortId, Endpoint>,
    jit: Option<Jit>,
    debugger: Option<Debugger>,
}

impl Processor {
    pub fn new(binary: &Binary) -> Self {
        Processor {
            registers: Registers {pc: binary.entrypoint, ..Registers::default()},
            cycles: 0,
            complete: false,
            message: Message::Idle,
            ram: Box::new(Ram::new(binary.data)),
            ports: HashMap::new(),
            jit: None,
            debugger: None,
        }
    }

    /** Constructs a [`Processor`] that compiles code using `cache`. */
    pub fn with_jit(binary: &Binary, cache: Rc<RefCell<BlockCache>>) -> Self {
        let mut processor = Processor::new(binary);
        processor.jit = Some(Jit::new(cache));
        processor
    }

    /** Reloads `binary`, clearing the registers and any compiled code. */
    pub fn reset(&mut self, binary: &Binary) {
        if let Some(jit) = self.jit.as_mut() { jit.clear(&mut self.ram); }
        self.ram.bytes = binary.data;
        self.registers = Registers {pc: binary.entrypoint, ..Registers::default()};
        self.message = Message::Idle;
        self.complete = false;
    }

    pub fn registers(&self) -> Registers { self.registers }

    pub fn set_registers(&mut self, registers: Registers) { self.registers = registers; }

    pub fn cycles(&self) -> usize { self.cycles }

    pub fn is_complete(&self) -> bool { self.complete }

    pub fn message(&self) -> &Message { &self.message }

    pub fn memory(&self) -> &[u8; MEMORY_SIZE] { &self.ram.bytes }

    pub fn jit(&self) -> Option<&Jit> { self.jit.as_ref() }

    /** Writes a byte of memory, discarding any native code compiled from it. */
    pub fn write_memory(&mut self, address: u8, value: u8) {
        self.ram.bytes[address as usize] = value;
        if self.ram.code[address as usize] != 0 {
            if let Some(jit) = self.jit.as_mut() {
                jit.invalidate(&mut self.ram, address);
            }
        }
    }

    /** Sets the cycle budget, and allows the processor to run. */
    pub fn set_cycles(&mut self, cycles: usize) {
        self.cycles = cycles;
        self.complete = false;
    }

    /** Adds `seconds` worth of cycles to the budget, and allows the processor to run. */
    pub fn add_processing_time(&mut self, seconds: f64) {
        let cycles = (seconds * CLOCK_RATE as f64) as usize;
        self.cycles = self.cycles.saturating_add(cycles);
        if let Message::Posted {ref mut timestamp, ..} = self.message {
            *timestamp = timestamp.saturating_add(cycles);
        }
        self.complete = false;
    }

    // Debugging.

    pub fn debugger(&self) -> Option<&Debugger> { self.debugger.as_ref() }

    pub fn set_debugger(&mut self, debugger: Option<Debugger>) {
        self.debugger = debugger;
        self.complete = false;
    }

    fn debugger_mut(&mut self) -> &mut Debugger {
        self.debugger.get_or_insert_with(|| Debugger::new(DebugMode::Continue))
    }

    pub fn set_debug_mode(&mut self, mode: DebugMode) {
        self.debugger_mut().set_mode(mode);
        if mode != DebugMode::Pause { self.complete = false; }
    }

    pub fn set_breakpoint(&mut self, offset: u8, breakpoint: Breakpoint) {
        self.debugger_mut().set_breakpoint(offset, breakpoint);
    }

    fn is_paused(&self) -> bool {
        self.debugger.as_ref().map_or(false, |d| d.mode() == DebugMode::Pause)
    }

    // Running.

    fn finish(&mut self, reason: &'static str) {
        trace!(pc = self.registers.pc, cycles = self.cycles, reason, "complete");
        self.complete = true;
    }

    /**
     * Runs until the cycle budget is exhausted, the processor halts, or a port
     * operation stalls.
     */
    pub fn run(&mut self) {
        while !self.complete {
            if self.is_paused() {
                self.finish("paused");
                break;
            }
            if self.run_native() { continue; }
            if !self.step() { break; }
        }
    }

    /** Runs compiled code at the program counter, if any. Returns `true` on progress. */
    fn run_native(&mut self) -> bool {
        if !self.debugger.as_ref().map_or(true, Debugger::is_transparent) { return false; }
        let jit = match self.jit.as_mut() {
            Some(jit) => jit,
            None => return false,
        };
        jit.compile(&mut self.ram, self.registers.pc);
        let progress = jit.call(&mut self.registers, &mut self.cycles, &mut self.ram);
        if self.ram.modified != 0 {
            self.ram.modified = 0;
            let address = self.ram.modified_address;
            jit.invalidate(&mut self.ram, address);
        }
        progress
    }

    /** Interprets one instruction. Returns `false` if `run()` should return. */
    fn step(&mut self) -> bool {
        let pc = self.registers.pc;
        let instruction = match Instruction::decode(&self.ram.bytes, pc) {
            Some(instruction) => instruction,
            None => {
                self.finish("invalid instruction");
                return false;
            },
        };
        let cost = instruction.cost();
        if cost > self.cycles {
            self.finish("out of cycles");
            return false;
        }
        let accesses = match &self.debugger {
            Some(debugger) if !debugger.breakpoints.is_empty() => self.accesses(pc, &instruction),
            _ => Vec::new(),
        };
        if let Some(debugger) = self.debugger.as_mut() {
            if debugger.resuming {
                debugger.resuming = false;
            } else if debugger.hits(&accesses) {
                debugger.set_mode(DebugMode::Pause);
                self.finish("breakpoint");
                return false;
            }
        }
        self.cycles -= cost;
        let executed = match self.execute(&instruction) {
            Execution::Next => { self.registers.pc = instruction.next(pc); true },
            Execution::Jump(target) => { self.registers.pc = target; true },
            Execution::Halt => { self.finish("halt"); true },
            Execution::Timeout => false,
            Execution::Stall => {
                self.cycles += cost;
                return false;
            },
            Execution::Defer => {
                self.cycles += cost;
                self.finish("deferred");
                return false;
            },
        };
        if let Some(debugger) = self.debugger.as_mut() {
            if let Some(hooks) = debugger.hooks().filter(|_| executed) {
                hooks.operation(pc, &instruction.encode(), &instruction);
            }
            if debugger.mode() == DebugMode::Step {
                debugger.set_mode(DebugMode::Pause);
                self.finish("stepped");
            }
        }
        !self.complete
    }

    // Ports.

    /** Disconnects every port. */
    pub fn disconnect_all(&mut self) {
        let ports: Vec<PortId> = self.ports.keys().copied().collect();
        for port in ports {
            self.disconnect(port);
        }
    }

    /** Starts or continues a port operation of the executing instruction. */
    fn port_operation(&mut self, port: PortId, request: Request) -> Execution {
        if let Message::Complete {wait} = self.message {
            self.message = Message::Idle;
            self.cycles = self.cycles.saturating_sub(wait);
            return Execution::Next;
        }
        let endpoint = match self.ports.get(&port) {
            Some(endpoint) => endpoint.clone(),
            None => {
                self.message = Message::Idle;
                return Execution::Timeout;
            },
        };
        let timestamp = self.cycles;
        let mut received = Vec::new();
        let response = match &request {
            Request::Send(data) => endpoint.transmit(Transfer::Send(data), timestamp),
            Request::Receive(_) => endpoint.transmit(Transfer::Receive(&mut received), timestamp),
        };
        match response {
            PortResponse::Success {wait} => {
                if let Request::Receive(destination) = request {
                    self.store(destination, &received);
                }
                self.message = Message::Idle;
                self.cycles = self.cycles.saturating_sub(wait);
                Execution::Next
            },
            PortResponse::Retry => {
                self.message = Message::Posted {port, request, timestamp};
                Execution::Stall
            },
            PortResponse::Timeout => {
                self.message = Message::Idle;
                Execution::Timeout
            },
            PortResponse::Defer => {
                self.message = Message::Idle;
                Execution::Defer
            },
        }
    }

    fn store(&mut self, destination: u8, data: &[u8]) {
        for (i, &byte) in data.iter().enumerate() {
            self.write_memory(destination.wrapping_add(i as u8), byte);
        }
    }

    fn hooks(&mut self) -> Option<&mut (dyn DebugHooks + 'static)> {
        self.debugger.as_mut().and_then(Debugger::hooks)
    }
}

impl Device for Processor {
    fn connect(&mut self, port: PortId, endpoint: Endpoint) {
        if let Some(old) = self.ports.insert(port, endpoint) {
            old.connection.disconnect();
        }
        if let Some(hooks) = self.hooks() { hooks.port_connection_change(port, true); }
    }

    fn disconnect(&mut self, port: PortId) {
        if let Some(endpoint) = self.ports.remove(&port) {
            endpoint.connection.disconnect();
            if let Some(hooks) = self.hooks() { hooks.port_connection_change(port, false); }
        }
    }

    fn port(&self, port: PortId) -> Option<Rc<PortConnection>> {
        self.ports.get(&port).map(|endpoint| endpoint.connection.clone())
    }

    fn transmit(&mut self, port: PortId, transfer: Transfer, timestamp: usize) -> PortResponse {
        let (request, posted) = match &self.message {
            Message::Posted {port: p, request, timestamp: posted} if *p == port => (request.clone(), *posted),
            Message::Posted {..} | Message::Complete {..} => return PortResponse::Timeout,
            Message::Idle => {
                return if self.complete {
                    PortResponse::Defer
                } else if self.cycles.saturating_add(PORT_WINDOW) >= timestamp {
                    PortResponse::Retry
                } else {
                    PortResponse::Timeout
                };
            },
        };
        if timestamp.abs_diff(posted) > PORT_WINDOW {
            return PortResponse::Timeout;
        }
        match (request, transfer) {
            (Request::Send(data), Transfer::Receive(buffer)) => buffer.extend_from_slice(&data),
            (Request::Receive(destination), Transfer::Send(data)) => self.store(destination, data),
            _ => return PortResponse::Timeout,
        }
        let meet = std::cmp::min(timestamp, posted);
        self.message = Message::Complete {wait: posted - meet};
        PortResponse::Success {wait: timestamp - meet}
    }
}

impl Drop for Processor {
    fn drop(&mut self) {
        for (_, endpoint) in self.ports.drain() {
            endpoint.connection.disconnect();
        }
    }
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("registers", &self.registers)
            .field("cycles", &self.cycles)
            .field("complete", &self.complete)
            .field("message", &self.message)
            .finish()
    }
}

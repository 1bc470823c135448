//! A peripheral backed by memory, such as a display or a keyboard buffer.

use std::collections::{HashMap};
use std::rc::{Rc};
use tracing::{trace};

use crate::processor::{Device, Endpoint, PortConnection, PortId, PortResponse, Transfer};

/**
 * A [`Device`] whose ports are windows onto its memory. Port `p` addresses
 * `window` bytes starting at `p * window`, wrapping around the end of the
 * memory. A `send` to the module writes the window; a `recv` from it reads
 * the whole window. The module answers at once.
 */
#[derive(Debug)]
pub struct Module {
    memory: Vec<u8>,
    window: usize,
    ports: HashMap<PortId, Endpoint>,
}

impl Module {
    pub fn new(size: usize, window: usize) -> Self {
        Module {memory: vec![0; size], window, ports: HashMap::new()}
    }

    pub fn memory(&self) -> &[u8] { &self.memory }

    pub fn memory_mut(&mut self) -> &mut [u8] { &mut self.memory }

    pub fn window(&self) -> usize { self.window }

    /** The index of the first byte addressed through `port`. */
    pub fn address(&self, port: PortId) -> usize {
        if self.memory.is_empty() { return 0; }
        (port as usize * self.window) % self.memory.len()
    }

    /** Disconnects every port. */
    pub fn disconnect_all(&mut self) {
        let ports: Vec<PortId> = self.ports.keys().copied().collect();
        for port in ports {
            self.disconnect(port);
        }
    }
}

impl Device for Module {
    fn connect(&mut self, port: PortId, endpoint: Endpoint) {
        if let Some(old) = self.ports.insert(port, endpoint) {
            old.connection.disconnect();
        }
    }

    fn disconnect(&mut self, port: PortId) {
        if let Some(endpoint) = self.ports.remove(&port) {
            endpoint.connection.disconnect();
        }
    }

    fn port(&self, port: PortId) -> Option<Rc<PortConnection>> {
        self.ports.get(&port).map(|endpoint| endpoint.connection.clone())
    }

    fn transmit(&mut self, port: PortId, transfer: Transfer, timestamp: usize) -> PortResponse {
        if self.memory.is_empty() { return PortResponse::Timeout; }
        let start = self.address(port);
        let len = self.memory.len();
        match transfer {
            Transfer::Send(data) => {
                for (i, &byte) in data.iter().enumerate() {
                    self.memory[(start + i) % len] = byte;
                }
                trace!(port, timestamp, size = data.len(), "module written");
            },
            Transfer::Receive(buffer) => {
                buffer.extend((0..self.window).map(|i| self.memory[(start + i) % len]));
                trace!(port, timestamp, size = self.window, "module read");
            },
        }
        PortResponse::Success {wait: 0}
    }
}

impl Drop for Module {
    fn drop(&mut self) {
        for (_, endpoint) in self.ports.drain() {
            endpoint.connection.disconnect();
        }
    }
}

//-----------------------------------------------------------------------------

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::cell::{RefCell};

    use crate::assembler::{assemble};
    use crate::processor::{DeviceRef, Processor};

    #[test]
    fn address() {
        let module = Module::new(16, 4);
        assert_eq!(module.address(0), 0);
        assert_eq!(module.address(2), 8);
        assert_eq!(module.address(5), 4);
        assert_eq!(Module::new(0, 4).address(3), 0);
    }

    #[test]
    fn send_and_receive() {
        let binary = assemble("\
            send 1, 3, [data]\n\
            recv 1, [result]\n\
            hlt\n\
            data: .byte 7, 8, 9\n\
            result: .byte 0, 0, 0, 0").unwrap();
        let processor = Rc::new(RefCell::new(Processor::new(&binary)));
        let module = Rc::new(RefCell::new(Module::new(16, 4)));
        module.borrow_mut().memory_mut()[11] = 10;
        let p: DeviceRef = processor.clone();
        let m: DeviceRef = module.clone();
        let connection = PortConnection::connect(&p, 1, &m, 2);
        assert!(connection.is_connected());
        processor.borrow_mut().set_cycles(1_000);
        processor.borrow_mut().run();
        let processor = processor.borrow();
        assert!(processor.is_complete());
        assert_eq!(&module.borrow().memory()[8..12], &[7, 8, 9, 10]);
        let result = processor.memory().windows(4).position(|w| w == [7, 8, 9, 10]);
        assert!(result.is_some());
    }

    #[test]
    fn disconnect() {
        let module = Rc::new(RefCell::new(Module::new(8, 1)));
        let other = Rc::new(RefCell::new(Module::new(8, 1)));
        let a: DeviceRef = module.clone();
        let b: DeviceRef = other.clone();
        let connection = PortConnection::connect(&a, 0, &b, 3);
        assert!(module.borrow().port(0).is_some());
        module.borrow_mut().disconnect_all();
        assert!(!connection.is_connected());
        assert!(module.borrow().port(0).is_none());
        assert!(other.borrow().port(3).is_none());
        // Again.
        module.borrow_mut().disconnect(0);
        connection.disconnect();
    }
}

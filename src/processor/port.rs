use std::cell::{RefCell};
use std::rc::{Rc, Weak};
use tracing::{trace};

/** Identifies a port of a [`Device`]. */
pub type PortId = u8;

/** The payload of a port operation, from the point of view of the initiator. */
#[derive(Debug)]
pub enum Transfer<'a> {
    /** The initiator offers these bytes. */
    Send(&'a [u8]),
    /** The initiator wants bytes, which the responder appends. */
    Receive(&'a mut Vec<u8>),
}

/** The outcome of a port operation. */
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PortResponse {
    /**
     * The transfer happened. The initiator must consume `wait` cycles to
     * synchronize with the responder.
     */
    Success {wait: usize},
    /** The transfer cannot happen; the initiator may try again later. */
    Timeout,
    /** The responder is not ready yet; the initiator should stall. */
    Retry,
    /** The responder has finished for now; try again after more time is added. */
    Defer,
}

/** A peripheral or processor with ports. */
pub trait Device {
    /** Records that `port` is attached to `endpoint`. */
    fn connect(&mut self, port: PortId, endpoint: Endpoint);

    /**
     * Forgets the connection on `port`, if any, and disconnects it.
     * Must tolerate being called for a port that is already disconnected.
     */
    fn disconnect(&mut self, port: PortId);

    /** The connection on `port`, if any. */
    fn port(&self, port: PortId) -> Option<Rc<PortConnection>>;

    /** Answers a request from the device at the other end of `port`. */
    fn transmit(&mut self, port: PortId, transfer: Transfer, timestamp: usize) -> PortResponse;
}

/** A shared handle to a [`Device`]. */
pub type DeviceRef = Rc<RefCell<dyn Device>>;

//-----------------------------------------------------------------------------

/** Which end of a [`PortConnection`]. */
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Side {A = 0, B = 1}

impl Side {
    pub fn opposite(self) -> Self {
        match self { Side::A => Side::B, Side::B => Side::A }
    }
}

/** A device's view of a [`PortConnection`]. */
#[derive(Clone)]
pub struct Endpoint {
    pub connection: Rc<PortConnection>,
    pub side: Side,
}

impl Endpoint {
    /** Asks the device at the other end to take part in a transfer. */
    pub fn transmit(&self, transfer: Transfer, timestamp: usize) -> PortResponse {
        self.connection.transmit(self.side, transfer, timestamp)
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Endpoint({:?})", self.side)
    }
}

/**
 * Connects a port of one device to a port of another. Both devices hold the
 * connection; the connection holds only weak references to the devices.
 */
pub struct PortConnection {
    ends: [RefCell<Option<(Weak<RefCell<dyn Device>>, PortId)>>; 2],
}

impl PortConnection {
    /** Connects `port_a` of `a` to `port_b` of `b`. */
    pub fn connect(a: &DeviceRef, port_a: PortId, b: &DeviceRef, port_b: PortId) -> Rc<Self> {
        let connection = Rc::new(PortConnection {ends: [
            RefCell::new(Some((Rc::downgrade(a), port_a))),
            RefCell::new(Some((Rc::downgrade(b), port_b))),
        ]});
        if let Ok(mut a) = a.try_borrow_mut() {
            a.connect(port_a, Endpoint {connection: connection.clone(), side: Side::A});
        }
        if let Ok(mut b) = b.try_borrow_mut() {
            b.connect(port_b, Endpoint {connection: connection.clone(), side: Side::B});
        }
        connection
    }

    /** The device and port at `side`, if still connected. */
    pub fn end(&self, side: Side) -> Option<(DeviceRef, PortId)> {
        let end = self.ends[side as usize].borrow();
        end.as_ref().and_then(|(device, port)| device.upgrade().map(|d| (d, *port)))
    }

    pub fn is_connected(&self) -> bool {
        self.end(Side::A).is_some() && self.end(Side::B).is_some()
    }

    /** Passes a request from `from` to the opposite device. */
    pub fn transmit(&self, from: Side, transfer: Transfer, timestamp: usize) -> PortResponse {
        let (device, port) = match self.end(from.opposite()) {
            Some(end) => end,
            None => return PortResponse::Timeout,
        };
        // A device connected to itself is busy.
        let response = match device.try_borrow_mut() {
            Ok(mut device) => device.transmit(port, transfer, timestamp),
            Err(_) => PortResponse::Timeout,
        };
        trace!(?from, port, timestamp, ?response, "transmit");
        response
    }

    /**
     * Disconnects both ends. Devices that are busy (e.g. the caller) are not
     * told. Disconnecting twice is harmless.
     */
    pub fn disconnect(&self) {
        for end in &self.ends {
            let end = end.borrow_mut().take();
            if let Some((device, port)) = end {
                if let Some(device) = device.upgrade() {
                    if let Ok(mut device) = device.try_borrow_mut() {
                        device.disconnect(port);
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for PortConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let port = |side| self.end(side).map(|(_, port)| port);
        write!(f, "PortConnection({:?}, {:?})", port(Side::A), port(Side::B))
    }
}

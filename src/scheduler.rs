//! Runs a set of [`Processor`]s for a period of simulated time.

use std::cell::{RefCell};
use std::rc::{Rc};
use indexmap::{IndexSet};
use tracing::{debug};

use crate::processor::{Processor};
use crate::util::{RcEq};

/** A shared handle to a [`Processor`]. */
pub type ProcessorRef = Rc<RefCell<Processor>>;

/**
 * Runs processors round-robin. A processor waiting for a port handshake may
 * only make progress once its partner has run, so a [`run()`] keeps sweeping
 * until every processor is complete.
 *
 * [`run()`]: Scheduler::run
 */
#[derive(Debug, Default)]
pub struct Scheduler {
    processors: IndexSet<RcEq<RefCell<Processor>>>,
}

impl Scheduler {
    pub fn new() -> Self { Scheduler::default() }

    /** Returns `false` if `processor` was already present. */
    pub fn add(&mut self, processor: &ProcessorRef) -> bool {
        self.processors.insert(RcEq(processor.clone()))
    }

    /**
     * Removes `processor` and disconnects all its ports. Returns `false` if
     * it was not present.
     */
    pub fn remove(&mut self, processor: &ProcessorRef) -> bool {
        let removed = self.processors.shift_remove(&RcEq(processor.clone()));
        if removed {
            processor.borrow_mut().disconnect_all();
        }
        removed
    }

    pub fn contains(&self, processor: &ProcessorRef) -> bool {
        self.processors.contains(&RcEq(processor.clone()))
    }

    pub fn len(&self) -> usize { self.processors.len() }

    pub fn is_empty(&self) -> bool { self.processors.is_empty() }

    pub fn processors(&self) -> impl Iterator<Item=&ProcessorRef> {
        self.processors.iter().map(|p| &p.0)
    }

    /**
     * Gives every processor `seconds` worth of cycles, then runs them until
     * all are complete. Returns the number of sweeps.
     */
    pub fn run(&mut self, seconds: f64) -> usize {
        for p in &self.processors {
            p.borrow_mut().add_processing_time(seconds);
        }
        let mut sweeps = 0;
        loop {
            sweeps += 1;
            let mut complete = true;
            for p in &self.processors {
                let mut p = p.borrow_mut();
                if !p.is_complete() { p.run(); }
                complete &= p.is_complete();
            }
            if complete { break; }
        }
        debug!(processors = self.processors.len(), sweeps, "scheduler converged");
        sweeps
    }
}

//-----------------------------------------------------------------------------

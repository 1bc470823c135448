mod rceq;
pub use rceq::{RcEq};

mod fifo;
pub use fifo::{Fifo};

mod bits;
pub use bits::{BitWriter, BitReader};

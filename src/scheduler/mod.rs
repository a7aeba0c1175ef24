//! Action scheduling
//!
//! Picks exactly one action per loop tick by strict priority over
//! elapsed-time thresholds.

mod clock;

pub use clock::{SessionClock, TickAction, TICK_PAUSE};

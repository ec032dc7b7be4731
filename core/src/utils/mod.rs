//! Utility functions and types
//!
//! This module provides the stage timer used by the revision controller and
//! the clock abstraction behind every "today" computation.

pub mod clock;
pub mod timer;

pub use clock::{Clock, FixedClock, SystemClock};
pub use timer::StageTimer;

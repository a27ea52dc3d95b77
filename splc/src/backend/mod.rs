//! Back ends for resolved flat programs.
//!
//! - `basic`: line-numbered BASIC text
//! - `sim`: reference interpreter used by the tests and `splc --run`

pub mod basic;
pub mod sim;

pub use basic::{write_lines, write_program};
pub use sim::{run, SimError, SimOutcome};

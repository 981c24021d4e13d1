//! Assigns participants to time-slotted workshops across several days.
//!
//! Preferences and the workshop schedule are loaded by [`parser`], turned into a
//! 0/1 model per cohort by [`schedule::builder`], and solved cohort by cohort
//! (earliest submitters first) by [`schedule::sequencer`], each cohort seeing
//! only the capacity left by forced placements and earlier cohorts.

pub mod config;
pub mod display;
pub mod error;
pub mod parser;
pub mod schedule;

pub use error::{
    CapacityError, DataError, Diagnosis, InfeasibilityReport, NoSolution, RunError, SolverFault,
};

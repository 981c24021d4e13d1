//! Error types shared by the loader, the solver core and the run sequencer.

use std::fmt;
use thiserror::Error;

use crate::schedule::types::SlotKey;

/// Malformed or missing input data
#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read {table}: {source}")]
    Csv {
        table: &'static str,
        #[source]
        source: csv::Error,
    },

    #[error("{table} is missing required column '{column}'")]
    MissingColumn {
        table: &'static str,
        column: &'static str,
    },

    #[error("{table} row {row}: {field} value '{value}' is not an integer")]
    NotAnInteger {
        table: &'static str,
        row: usize,
        field: &'static str,
        value: String,
    },

    #[error("{table} row {row}: invalid {field} '{value}': {reason}")]
    InvalidValue {
        table: &'static str,
        row: usize,
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("activity '{activity}' is scheduled but no zone is known for it")]
    UnknownZone { activity: String },

    #[error("forced placement for '{participant}' refers to unscheduled slot {slot}")]
    UnknownSlot { participant: String, slot: SlotKey },

    #[error("forced placement for '{participant}' does not fit: {source}")]
    ForcedOverCapacity {
        participant: String,
        #[source]
        source: CapacityError,
    },
}

/// Rejected capacity mutation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapacityError {
    #[error("slot {0} is not in the capacity table")]
    UnknownSlot(SlotKey),

    #[error("slot {slot} has {remaining} seat(s) left, {requested} requested")]
    Exhausted {
        slot: SlotKey,
        remaining: u32,
        requested: u32,
    },
}

/// The optimisation engine itself failed, as opposed to proving infeasibility
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("optimisation engine fault: {0}")]
pub struct SolverFault(pub String);

/// Why an engine returned without an assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum NoSolution {
    Infeasible,
    TimeLimit,
}

impl fmt::Display for NoSolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoSolution::Infeasible => write!(f, "no feasible assignment exists"),
            NoSolution::TimeLimit => write!(f, "no feasible assignment found within the time budget"),
        }
    }
}

/// What the search for a failing participant concluded
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Diagnosis {
    /// Diagnosis was turned off
    Skipped,
    /// First participant who cannot be placed alone, or whose addition breaks the cohort
    Culprit(String),
    /// A trial solve ran out of time, so nobody can be blamed
    Undetermined,
    /// Every trial solve succeeded
    NotFound,
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnosis::Skipped => write!(f, "diagnosis skipped"),
            Diagnosis::Culprit(participant) => write!(f, "first failing participant: {}", participant),
            Diagnosis::Undetermined => {
                write!(f, "failing participant undetermined, a trial solve hit the time budget")
            }
            Diagnosis::NotFound => write!(f, "no single failing participant found"),
        }
    }
}

/// Context captured when a cohort cannot be placed
#[derive(Debug, Clone)]
pub struct InfeasibilityReport {
    pub cohort: usize,
    pub label: String,
    pub members: Vec<String>,
    pub reason: NoSolution,
    pub diagnosis: Diagnosis,
    pub residual: Vec<(SlotKey, u32)>,
}

impl fmt::Display for InfeasibilityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cohort {} ({}, {} participants): {}",
            self.cohort,
            self.label,
            self.members.len(),
            self.reason
        )?;
        if self.diagnosis != Diagnosis::Skipped {
            write!(f, "; {}", self.diagnosis)?;
        }
        write!(f, "\nresidual capacity at failure:")?;
        for (slot, remaining) in &self.residual {
            write!(f, "\n  {} -> {}", slot, remaining)?;
        }
        Ok(())
    }
}

/// Failure of a whole sequenced run
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error("{0}")]
    Infeasible(Box<InfeasibilityReport>),

    #[error("cohort {cohort}: {source}")]
    Fault {
        cohort: usize,
        #[source]
        source: SolverFault,
    },

    #[error("run cannot move from {from} to {to}")]
    Phase { from: String, to: String },
}

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::error::{DataError, Diagnosis, InfeasibilityReport, NoSolution, RunError};
use crate::parser::Domain;
use super::builder::SolveOptions;
use super::capacity::CapacityTable;
use super::cohort::{CohortOutcome, CohortSolver};
use super::diagnostics::{diagnose_cohort, find_duplicates, DuplicateAssignment};
use super::engine::Engine;
use super::types::{Assignment, ForcedAssignment, SlotKey};

const LABEL_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Where a run currently is. Phases only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunPhase {
    Loading,
    ApplyingForced,
    SolvingCohort(usize),
    Validating,
    Done,
    Failed,
}

impl RunPhase {
    fn can_advance_to(self, next: RunPhase) -> bool {
        match (self, next) {
            (RunPhase::Done | RunPhase::Failed, _) => false,
            (_, RunPhase::Failed) => true,
            (RunPhase::Loading, RunPhase::ApplyingForced) => true,
            (RunPhase::ApplyingForced, RunPhase::SolvingCohort(1)) => true,
            (RunPhase::ApplyingForced, RunPhase::Validating) => true,
            (RunPhase::SolvingCohort(current), RunPhase::SolvingCohort(following)) => {
                following == current + 1
            }
            (RunPhase::SolvingCohort(_), RunPhase::Validating) => true,
            (RunPhase::Validating, RunPhase::Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::SolvingCohort(index) => write!(f, "SolvingCohort[{}]", index),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Participants solved together, numbered from 1 in solve order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cohort {
    pub index: usize,
    pub label: String,
    pub members: Vec<String>,
}

/// Splits participants into half-open submission windows `[cutoff[i-1], cutoff[i])`.
/// There is always one more cohort than distinct cutoffs; members are sorted by name.
pub fn partition_cohorts(
    submitted: &HashMap<String, NaiveDateTime>,
    cutoffs: &[NaiveDateTime],
) -> Vec<Cohort> {
    let mut bounds = cutoffs.to_vec();
    bounds.sort();
    bounds.dedup();

    let mut cohorts: Vec<Cohort> = (0..=bounds.len())
        .map(|i| Cohort {
            index: i + 1,
            label: cohort_label(&bounds, i),
            members: Vec::new(),
        })
        .collect();

    for (participant, at) in submitted {
        let slot = bounds.partition_point(|cutoff| cutoff <= at);
        cohorts[slot].members.push(participant.clone());
    }
    for cohort in &mut cohorts {
        cohort.members.sort();
    }
    cohorts
}

fn cohort_label(bounds: &[NaiveDateTime], i: usize) -> String {
    let at = |b: &NaiveDateTime| b.format(LABEL_FORMAT).to_string();
    match (i.checked_sub(1).map(|p| &bounds[p]), bounds.get(i)) {
        (None, None) => "all submissions".to_string(),
        (None, Some(end)) => format!("before {}", at(end)),
        (Some(start), Some(end)) => format!("{} to {}", at(start), at(end)),
        (Some(start), None) => format!("from {}", at(start)),
    }
}

/// Per-cohort line of the run report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CohortSummary {
    pub index: usize,
    pub label: String,
    pub members: usize,
    pub rows: usize,
}

/// Everything a finished run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Forced rows first, then cohorts in solve order
    pub assignments: Vec<Assignment>,
    pub forced_rows: usize,
    pub cohorts: Vec<CohortSummary>,
    pub duplicates: Vec<DuplicateAssignment>,
    pub residual: Vec<(SlotKey, u32)>,
}

/// Owns the residual capacity and drives forced placements and cohort solves in order
pub struct Sequencer<'a, E: Engine> {
    domain: &'a Domain,
    solver: CohortSolver<'a, E>,
    capacity: CapacityTable,
    phase: RunPhase,
    diagnose: bool,
    assignments: Vec<Assignment>,
    forced_rows: usize,
    summaries: Vec<CohortSummary>,
}

impl<'a, E: Engine> Sequencer<'a, E> {
    pub fn new(domain: &'a Domain, options: &'a SolveOptions, engine: &'a E) -> Self {
        Sequencer {
            domain,
            solver: CohortSolver::new(domain, options, engine),
            capacity: domain.capacity.clone(),
            phase: RunPhase::Loading,
            diagnose: true,
            assignments: Vec::new(),
            forced_rows: 0,
            summaries: Vec::new(),
        }
    }

    /// Whether an infeasible cohort is searched to name the failing participant
    pub fn with_diagnosis(mut self, diagnose: bool) -> Self {
        self.diagnose = diagnose;
        self
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn capacity(&self) -> &CapacityTable {
        &self.capacity
    }

    /// Solver carrying the forced placements applied so far
    pub fn solver(&self) -> &CohortSolver<'a, E> {
        &self.solver
    }

    /// Cohorts to solve after forced placements. Forced participants stay in the
    /// cohort of their submission; those who never submitted join the first one.
    pub fn cohorts(&self, cutoffs: &[NaiveDateTime]) -> Vec<Cohort> {
        let mut cohorts = partition_cohorts(&self.domain.submitted, cutoffs);
        let unsubmitted: Vec<String> = self
            .solver
            .pinned()
            .keys()
            .filter(|participant| !self.domain.submitted.contains_key(*participant))
            .cloned()
            .collect();
        if !unsubmitted.is_empty() {
            tracing::info!(
                participants = unsubmitted.len(),
                "Forced participants without preferences join the first cohort"
            );
            let first = &mut cohorts[0].members;
            first.extend(unsubmitted);
            first.sort();
        }
        cohorts
    }

    fn advance(&mut self, next: RunPhase) -> Result<(), RunError> {
        if !self.phase.can_advance_to(next) {
            return Err(RunError::Phase {
                from: self.phase.to_string(),
                to: next.to_string(),
            });
        }
        tracing::debug!(from = %self.phase, to = %next, "Run phase change");
        self.phase = next;
        Ok(())
    }

    fn fail(&mut self, err: RunError) -> RunError {
        tracing::error!(phase = %self.phase, error = %err, "Run failed");
        self.phase = RunPhase::Failed;
        err
    }

    /// Runs the whole sequence: forced placements, every cohort in order, validation
    pub fn run(
        &mut self,
        forced: &[ForcedAssignment],
        cutoffs: &[NaiveDateTime],
    ) -> Result<RunReport, RunError> {
        self.apply_forced(forced)?;

        let cohorts = self.cohorts(cutoffs);
        tracing::info!(
            cohorts = cohorts.len(),
            participants = cohorts.iter().map(|c| c.members.len()).sum::<usize>(),
            pinned = self.solver.pinned().len(),
            "Partitioned participants by submission time"
        );

        for cohort in &cohorts {
            self.solve_cohort(cohort)?;
        }
        self.finish()
    }

    /// Takes a seat for every forced placement before any cohort is solved.
    /// The participant's cohort solve later fills the rest of their schedule.
    pub fn apply_forced(&mut self, forced: &[ForcedAssignment]) -> Result<usize, RunError> {
        self.advance(RunPhase::ApplyingForced)?;

        for placement in forced {
            if let Err(err) = self.place_forced(placement) {
                return Err(self.fail(err.into()));
            }
        }
        self.forced_rows = forced.len();
        tracing::info!(placements = forced.len(), "Applied forced placements");
        Ok(forced.len())
    }

    fn place_forced(&mut self, placement: &ForcedAssignment) -> Result<(), DataError> {
        let slot = &placement.slot;
        if !self.capacity.contains(slot) {
            return Err(DataError::UnknownSlot {
                participant: placement.participant.clone(),
                slot: slot.clone(),
            });
        }
        let zone = self
            .domain
            .zones
            .zone_of(&slot.activity)
            .ok_or_else(|| DataError::UnknownZone {
                activity: slot.activity.clone(),
            })?;
        self.capacity
            .consume(slot, 1)
            .map_err(|source| DataError::ForcedOverCapacity {
                participant: placement.participant.clone(),
                source,
            })?;
        self.solver.pin(&placement.participant, slot.clone());
        self.assignments.push(Assignment {
            participant: placement.participant.clone(),
            zone: zone.to_string(),
            day: slot.day.clone(),
            period: slot.period,
            activity: slot.activity.clone(),
        });
        Ok(())
    }

    /// Solves the next cohort against whatever capacity earlier steps left
    pub fn solve_cohort(&mut self, cohort: &Cohort) -> Result<CohortSummary, RunError> {
        self.advance(RunPhase::SolvingCohort(cohort.index))?;
        tracing::info!(
            cohort = cohort.index,
            label = %cohort.label,
            members = cohort.members.len(),
            "Solving cohort"
        );

        let outcome = match self.solver.solve(&cohort.members, &mut self.capacity) {
            Ok(outcome) => outcome,
            Err(source) => {
                return Err(self.fail(RunError::Fault {
                    cohort: cohort.index,
                    source,
                }))
            }
        };

        let rows = match outcome {
            CohortOutcome::Assigned(rows) => rows,
            CohortOutcome::NoSolution(reason) => {
                let diagnosis = if !self.diagnose {
                    Diagnosis::Skipped
                } else if reason == NoSolution::TimeLimit {
                    Diagnosis::Undetermined
                } else {
                    match diagnose_cohort(&self.solver, &cohort.members, &self.capacity) {
                        Ok(diagnosis) => diagnosis,
                        Err(source) => {
                            return Err(self.fail(RunError::Fault {
                                cohort: cohort.index,
                                source,
                            }))
                        }
                    }
                };
                let report = InfeasibilityReport {
                    cohort: cohort.index,
                    label: cohort.label.clone(),
                    members: cohort.members.clone(),
                    reason,
                    diagnosis,
                    residual: self.capacity.snapshot(),
                };
                return Err(self.fail(RunError::Infeasible(Box::new(report))));
            }
        };

        let summary = CohortSummary {
            index: cohort.index,
            label: cohort.label.clone(),
            members: cohort.members.len(),
            rows: rows.len(),
        };
        tracing::info!(cohort = cohort.index, rows = rows.len(), "Cohort solved");
        self.assignments.extend(rows);
        self.summaries.push(summary.clone());
        Ok(summary)
    }

    /// Checks the accumulated rows and closes the run
    pub fn finish(&mut self) -> Result<RunReport, RunError> {
        self.advance(RunPhase::Validating)?;

        let duplicates = find_duplicates(&self.assignments);
        for dup in &duplicates {
            tracing::warn!(
                participant = %dup.participant,
                activity = %dup.activity,
                count = dup.count,
                "Duplicate assignment"
            );
        }

        self.advance(RunPhase::Done)?;
        Ok(RunReport {
            assignments: std::mem::take(&mut self.assignments),
            forced_rows: self.forced_rows,
            cohorts: std::mem::take(&mut self.summaries),
            duplicates,
            residual: self.capacity.snapshot(),
        })
    }
}

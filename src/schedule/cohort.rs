use serde::Serialize;

use crate::error::{NoSolution, SolverFault};
use crate::parser::Domain;
use super::builder::{ModelBuilder, PinnedSlots, SolveOptions};
use super::capacity::CapacityTable;
use super::engine::{Engine, Outcome};
use super::types::{Assignment, SlotKey};

/// Result of one cohort solve
#[derive(Debug, Clone, PartialEq)]
pub enum CohortOutcome {
    Assigned(Vec<Assignment>),
    NoSolution(NoSolution),
}

/// Answer of a trial solve. A solve that runs out of time proves nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Feasibility {
    Feasible,
    Infeasible,
    Undetermined,
}

/// Solves one cohort against the shared residual capacity
pub struct CohortSolver<'a, E: Engine> {
    domain: &'a Domain,
    options: &'a SolveOptions,
    engine: &'a E,
    pinned: PinnedSlots,
}

impl<'a, E: Engine> CohortSolver<'a, E> {
    pub fn new(domain: &'a Domain, options: &'a SolveOptions, engine: &'a E) -> Self {
        CohortSolver {
            domain,
            options,
            engine,
            pinned: PinnedSlots::new(),
        }
    }

    /// Holds `participant` in `slot` in every later solve that includes them.
    /// The seat itself is taken by the caller.
    pub fn pin(&mut self, participant: &str, slot: SlotKey) {
        self.pinned.entry(participant.to_string()).or_default().insert(slot);
    }

    pub fn pinned(&self) -> &PinnedSlots {
        &self.pinned
    }

    /// Places `members` and takes their seats out of `capacity`.
    /// Capacity is left untouched when no assignment is found. Pinned slots
    /// are neither charged again nor returned as rows.
    pub fn solve(
        &self,
        members: &[String],
        capacity: &mut CapacityTable,
    ) -> Result<CohortOutcome, SolverFault> {
        if members.is_empty() {
            return Ok(CohortOutcome::Assigned(Vec::new()));
        }

        let builder = ModelBuilder::new(self.domain, self.options).with_pinned(&self.pinned);
        let built = builder.build(members, capacity);
        tracing::debug!(
            members = members.len(),
            variables = built.model.variable_count(),
            constraints = built.model.constraints.len(),
            "Built cohort model"
        );

        let values = match self.engine.solve(&built.model, self.options.time_limit)? {
            Outcome::Solved(values) => values,
            Outcome::NoSolution(reason) => return Ok(CohortOutcome::NoSolution(reason)),
        };
        if values.len() != built.vars.len() {
            return Err(SolverFault(format!(
                "expected {} values, engine returned {}",
                built.vars.len(),
                values.len()
            )));
        }

        let mut rows = Vec::new();
        let mut consumed = capacity.clone();
        for (key, value) in built.vars.iter().zip(values) {
            let chosen = value >= 0.5;
            if builder.is_pinned(&key.participant, &key.slot) {
                if !chosen {
                    return Err(SolverFault(format!(
                        "forced placement of {} in {} was dropped",
                        key.participant, key.slot
                    )));
                }
                continue;
            }
            if !chosen {
                continue;
            }
            consumed
                .consume(&key.slot, 1)
                .map_err(|e| SolverFault(format!("assignment overbooks capacity: {}", e)))?;
            let zone = self.domain.zones.zone_of(&key.slot.activity).unwrap_or_default();
            rows.push(Assignment {
                participant: key.participant.clone(),
                zone: zone.to_string(),
                day: key.slot.day.clone(),
                period: key.slot.period,
                activity: key.slot.activity.clone(),
            });
        }

        *capacity = consumed;
        Ok(CohortOutcome::Assigned(rows))
    }

    /// Whether `members` could be placed on top of `capacity`, which is not modified
    pub fn check(&self, members: &[String], capacity: &CapacityTable) -> Result<Feasibility, SolverFault> {
        let mut scratch = capacity.clone();
        Ok(match self.solve(members, &mut scratch)? {
            CohortOutcome::Assigned(_) => Feasibility::Feasible,
            CohortOutcome::NoSolution(NoSolution::Infeasible) => Feasibility::Infeasible,
            CohortOutcome::NoSolution(NoSolution::TimeLimit) => Feasibility::Undetermined,
        })
    }
}

use std::collections::BTreeMap;
use serde::Serialize;

use crate::error::{Diagnosis, SolverFault};
use super::capacity::CapacityTable;
use super::cohort::{CohortSolver, Feasibility};
use super::engine::Engine;
use super::types::Assignment;

/// A participant placed in the same activity more than once
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateAssignment {
    pub participant: String,
    pub activity: String,
    pub count: usize,
}

/// Reports every (participant, activity) pair assigned more than once. Nothing is removed.
pub fn find_duplicates(assignments: &[Assignment]) -> Vec<DuplicateAssignment> {
    let mut counts: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    for row in assignments {
        *counts
            .entry((row.participant.as_str(), row.activity.as_str()))
            .or_insert(0) += 1;
    }
    counts
        .into_iter()
        .filter(|(_, count)| *count > 1)
        .map(|((participant, activity), count)| DuplicateAssignment {
            participant: participant.to_string(),
            activity: activity.to_string(),
            count,
        })
        .collect()
}

/// Feasibility of one participant placed alone
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SoloCheck {
    pub participant: String,
    pub outcome: Feasibility,
}

fn check_alone<E: Engine>(
    solver: &CohortSolver<'_, E>,
    member: &String,
    capacity: &CapacityTable,
) -> Result<Feasibility, SolverFault> {
    let outcome = solver.check(std::slice::from_ref(member), capacity)?;
    match outcome {
        Feasibility::Feasible => tracing::debug!(participant = %member, "Placeable alone"),
        Feasibility::Infeasible => {
            tracing::warn!(participant = %member, "Infeasible on its own")
        }
        Feasibility::Undetermined => {
            tracing::warn!(participant = %member, "Solve alone hit the time budget")
        }
    }
    Ok(outcome)
}

/// Solves each member alone on a copy of `capacity`
pub fn check_individually<E: Engine>(
    solver: &CohortSolver<'_, E>,
    members: &[String],
    capacity: &CapacityTable,
) -> Result<Vec<SoloCheck>, SolverFault> {
    members
        .iter()
        .map(|member| {
            Ok(SoloCheck {
                participant: member.clone(),
                outcome: check_alone(solver, member, capacity)?,
            })
        })
        .collect()
}

/// Grows the cohort one member at a time and names the first member whose
/// addition makes it infeasible. Stops at the first solve that times out.
pub fn find_breaking_member<E: Engine>(
    solver: &CohortSolver<'_, E>,
    members: &[String],
    capacity: &CapacityTable,
) -> Result<Diagnosis, SolverFault> {
    for end in 1..=members.len() {
        match solver.check(&members[..end], capacity)? {
            Feasibility::Feasible => {}
            Feasibility::Infeasible => {
                tracing::warn!(
                    participant = %members[end - 1],
                    cohort_size = end,
                    "Cohort becomes infeasible when adding participant"
                );
                return Ok(Diagnosis::Culprit(members[end - 1].clone()));
            }
            Feasibility::Undetermined => {
                tracing::warn!(cohort_size = end, "Trial solve hit the time budget");
                return Ok(Diagnosis::Undetermined);
            }
        }
    }
    Ok(Diagnosis::NotFound)
}

/// Names the participant to blame for an infeasible cohort: someone infeasible
/// alone first, otherwise the member whose addition breaks the cohort.
/// A trial solve that times out ends the search as undetermined.
pub fn diagnose_cohort<E: Engine>(
    solver: &CohortSolver<'_, E>,
    members: &[String],
    capacity: &CapacityTable,
) -> Result<Diagnosis, SolverFault> {
    for member in members {
        match check_alone(solver, member, capacity)? {
            Feasibility::Feasible => {}
            Feasibility::Infeasible => return Ok(Diagnosis::Culprit(member.clone())),
            Feasibility::Undetermined => return Ok(Diagnosis::Undetermined),
        }
    }
    find_breaking_member(solver, members, capacity)
}

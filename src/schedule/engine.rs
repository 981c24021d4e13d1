//! Boundary to the mixed-integer engine.
//!
//! The core only ever talks to [`Engine`]; [`MicroLpEngine`] hands the model to
//! `good_lp` with the pure-Rust microlp backend.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use good_lp::{
    constraint, default_solver, variable, Expression, ProblemVariables, ResolutionError,
    Solution, SolverModel, Variable,
};

use crate::error::{NoSolution, SolverFault};
use super::model::{Model, Sense};

/// What an engine hands back for a model
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// One value per model variable
    Solved(Vec<f64>),
    NoSolution(NoSolution),
}

pub trait Engine {
    /// Solves `model` within `budget`. Infeasibility is an `Outcome`, not an error.
    fn solve(&self, model: &Model, budget: Duration) -> Result<Outcome, SolverFault>;
}

/// Runs good_lp's default (microlp) solver on a worker thread bounded by the budget
#[derive(Debug, Clone, Copy, Default)]
pub struct MicroLpEngine;

impl Engine for MicroLpEngine {
    fn solve(&self, model: &Model, budget: Duration) -> Result<Outcome, SolverFault> {
        // Constant constraints are decided here; the backend is never handed an empty row.
        let mut pruned = model.clone();
        let no_values = vec![0.0; model.variable_count()];
        let mut trivially_infeasible = false;
        pruned.constraints.retain(|c| {
            if !c.terms.is_empty() {
                return true;
            }
            if !c.is_satisfied_by(&no_values) {
                tracing::debug!(constraint = %c.name, "Constant constraint cannot hold");
                trivially_infeasible = true;
            }
            false
        });
        if trivially_infeasible {
            return Ok(Outcome::NoSolution(NoSolution::Infeasible));
        }
        if pruned.variable_count() == 0 {
            return Ok(Outcome::Solved(Vec::new()));
        }

        let (tx, rx) = mpsc::sync_channel(1);
        let worker = pruned.clone();
        thread::Builder::new()
            .name("milp-solve".to_string())
            .spawn(move || {
                // The receiver may have given up already; nothing to report then.
                let _ = tx.send(solve_with_good_lp(&worker));
            })
            .map_err(|e| SolverFault(format!("could not start solver thread: {}", e)))?;

        let outcome = match rx.recv_timeout(budget) {
            Ok(result) => result?,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                tracing::warn!(budget_secs = budget.as_secs_f64(), "Solver exceeded its time budget");
                return Ok(Outcome::NoSolution(NoSolution::TimeLimit));
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                return Err(SolverFault("solver thread terminated without a result".to_string()));
            }
        };

        if let Outcome::Solved(values) = &outcome {
            if let Some(name) = model.first_violation(values) {
                return Err(SolverFault(format!("returned solution violates {}", name)));
            }
        }
        Ok(outcome)
    }
}

fn solve_with_good_lp(model: &Model) -> Result<Outcome, SolverFault> {
    let mut vars = ProblemVariables::new();
    let handles: Vec<Variable> = model
        .costs
        .iter()
        .map(|_| vars.add(variable().binary()))
        .collect();

    let objective = model
        .costs
        .iter()
        .zip(&handles)
        .fold(Expression::from(0.0), |acc, (&cost, &v)| acc + cost * v);

    let mut problem = vars.minimise(objective).using(default_solver);
    for c in &model.constraints {
        let lhs = c
            .terms
            .iter()
            .fold(Expression::from(0.0), |acc, &(var, coef)| acc + coef * handles[var]);
        let rhs = c.rhs;
        let built = match c.sense {
            Sense::Le => constraint!(lhs <= rhs),
            Sense::Ge => constraint!(lhs >= rhs),
            Sense::Eq => constraint!(lhs == rhs),
        };
        problem = problem.with(built);
    }

    match problem.solve() {
        Ok(solution) => Ok(Outcome::Solved(
            handles.iter().map(|&v| solution.value(v).round()).collect(),
        )),
        Err(ResolutionError::Infeasible) => Ok(Outcome::NoSolution(NoSolution::Infeasible)),
        Err(other) => Err(SolverFault(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn budget() -> Duration {
        Duration::from_secs(30)
    }

    #[test]
    fn test_picks_the_cheapest_feasible_variable() {
        let mut model = Model::default();
        let cheap = model.add_variable(1.0);
        let dear = model.add_variable(5.0);
        model.add_constraint("pick_one", [(cheap, 1.0), (dear, 1.0)], Sense::Eq, 1.0);

        let outcome = MicroLpEngine.solve(&model, budget()).unwrap();
        assert_eq!(outcome, Outcome::Solved(vec![1.0, 0.0]));
    }

    #[test]
    fn test_respects_upper_bounds() {
        let mut model = Model::default();
        let cheap = model.add_variable(1.0);
        let dear = model.add_variable(5.0);
        model.add_constraint("pick_one", [(cheap, 1.0), (dear, 1.0)], Sense::Eq, 1.0);
        model.add_constraint("closed", [(cheap, 1.0)], Sense::Le, 0.0);

        let outcome = MicroLpEngine.solve(&model, budget()).unwrap();
        assert_eq!(outcome, Outcome::Solved(vec![0.0, 1.0]));
    }

    #[test]
    fn test_reports_infeasibility_as_outcome() {
        let mut model = Model::default();
        let a = model.add_variable(1.0);
        model.add_constraint("need_two", [(a, 1.0)], Sense::Ge, 2.0);

        let outcome = MicroLpEngine.solve(&model, budget()).unwrap();
        assert_eq!(outcome, Outcome::NoSolution(NoSolution::Infeasible));
    }

    #[test]
    fn test_constant_constraints_are_decided_up_front() {
        let mut model = Model::default();
        model.add_variable(1.0);
        model.add_constraint("empty_quota", Vec::new(), Sense::Eq, 2.0);
        assert_eq!(
            MicroLpEngine.solve(&model, budget()).unwrap(),
            Outcome::NoSolution(NoSolution::Infeasible)
        );

        let mut model = Model::default();
        model.add_constraint("empty_cap", Vec::new(), Sense::Le, 3.0);
        assert_eq!(MicroLpEngine.solve(&model, budget()).unwrap(), Outcome::Solved(Vec::new()));
    }
}

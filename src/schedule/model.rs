//! Solver-independent 0/1 model: binary variables with costs and named
//! linear constraints over them.

const TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Le,
    Ge,
    Eq,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint {
    pub name: String,
    /// (variable index, coefficient)
    pub terms: Vec<(usize, f64)>,
    pub sense: Sense,
    pub rhs: f64,
}

impl LinearConstraint {
    pub fn lhs(&self, values: &[f64]) -> f64 {
        self.terms.iter().map(|&(var, coef)| coef * values[var]).sum()
    }

    pub fn is_satisfied_by(&self, values: &[f64]) -> bool {
        let lhs = self.lhs(values);
        match self.sense {
            Sense::Le => lhs <= self.rhs + TOLERANCE,
            Sense::Ge => lhs >= self.rhs - TOLERANCE,
            Sense::Eq => (lhs - self.rhs).abs() <= TOLERANCE,
        }
    }
}

/// Minimisation model over binary variables
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Model {
    /// Objective coefficient per variable; the index is the variable id
    pub costs: Vec<f64>,
    pub constraints: Vec<LinearConstraint>,
}

impl Model {
    pub fn add_variable(&mut self, cost: f64) -> usize {
        self.costs.push(cost);
        self.costs.len() - 1
    }

    pub fn add_constraint<I>(&mut self, name: impl Into<String>, terms: I, sense: Sense, rhs: f64)
    where
        I: IntoIterator<Item = (usize, f64)>,
    {
        self.constraints.push(LinearConstraint {
            name: name.into(),
            terms: terms.into_iter().collect(),
            sense,
            rhs,
        });
    }

    pub fn variable_count(&self) -> usize {
        self.costs.len()
    }

    pub fn constraint(&self, name: &str) -> Option<&LinearConstraint> {
        self.constraints.iter().find(|c| c.name == name)
    }

    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.costs.iter().zip(values).map(|(cost, value)| cost * value).sum()
    }

    /// Checks binarity and every constraint; returns the first violated constraint name
    pub fn first_violation(&self, values: &[f64]) -> Option<&str> {
        if values.len() != self.costs.len() {
            return Some("variable count");
        }
        if values
            .iter()
            .any(|v| v.abs() > TOLERANCE && (v - 1.0).abs() > TOLERANCE)
        {
            return Some("binarity");
        }
        self.constraints
            .iter()
            .find(|c| !c.is_satisfied_by(values))
            .map(|c| c.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> Model {
        let mut model = Model::default();
        let a = model.add_variable(1.0);
        let b = model.add_variable(3.0);
        model.add_constraint("pick_one", [(a, 1.0), (b, 1.0)], Sense::Eq, 1.0);
        model.add_constraint("b_cap", [(b, 1.0)], Sense::Le, 0.0);
        model
    }

    #[test]
    fn test_objective_and_feasibility_check() {
        let model = model();
        assert_eq!(model.variable_count(), 2);
        assert_eq!(model.objective_value(&[1.0, 0.0]), 1.0);
        assert_eq!(model.first_violation(&[1.0, 0.0]), None);
        assert_eq!(model.first_violation(&[0.0, 1.0]), Some("b_cap"));
        assert_eq!(model.first_violation(&[1.0, 1.0]), Some("pick_one"));
        assert_eq!(model.first_violation(&[0.5, 0.5]), Some("binarity"));
    }

    #[test]
    fn test_lookup_by_name() {
        let model = model();
        let cap = model.constraint("b_cap").unwrap();
        assert_eq!(cap.sense, Sense::Le);
        assert!(model.constraint("missing").is_none());
    }
}

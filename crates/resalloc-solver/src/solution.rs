use std::fmt;

use log::{debug, warn};

use crate::error::ResultError;
use crate::problem::Model;
use crate::registry::{VarDomain, VarKey};

/// Distance from an integer within which discrete values are snapped.
pub const INTEGRALITY_TOLERANCE: f64 = 1e-6;

/// Default relative tolerance for objective reproducibility checks.
pub const OBJECTIVE_TOLERANCE: f64 = 1e-6;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// An optimal solution was found
    Optimal,
    /// A limit stopped the search; the values are the best incumbent found
    Feasible,
    /// The problem is infeasible (no solution exists)
    Infeasible,
    /// The problem is unbounded
    Unbounded,
    /// Solver reported an error for this model
    Error,
}

impl SolveStatus {
    /// Whether the outcome carries variable values.
    pub fn has_solution(self) -> bool {
        matches!(self, SolveStatus::Optimal | SolveStatus::Feasible)
    }
}

impl fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolveStatus::Optimal => write!(f, "optimal"),
            SolveStatus::Feasible => write!(f, "feasible"),
            SolveStatus::Infeasible => write!(f, "infeasible"),
            SolveStatus::Unbounded => write!(f, "unbounded"),
            SolveStatus::Error => write!(f, "error"),
        }
    }
}

/// Raw answer of a solver adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveOutcome {
    pub status: SolveStatus,
    /// Full objective value including the expression constant. Optimal and feasible only.
    pub objective_value: Option<f64>,
    /// One value per variable, indexed by `VarId::index`. Optimal and feasible only.
    pub values: Option<Vec<f64>>,
    /// Backend message for `SolveStatus::Error`
    pub message: Option<String>,
}

impl SolveOutcome {
    pub fn optimal(objective_value: f64, values: Vec<f64>) -> Self {
        Self {
            status: SolveStatus::Optimal,
            objective_value: Some(objective_value),
            values: Some(values),
            message: None,
        }
    }

    /// Best incumbent of a search stopped by a time or gap limit.
    pub fn feasible(objective_value: f64, values: Vec<f64>) -> Self {
        Self {
            status: SolveStatus::Feasible,
            ..Self::optimal(objective_value, values)
        }
    }

    pub fn infeasible() -> Self {
        Self::without_values(SolveStatus::Infeasible)
    }

    pub fn unbounded() -> Self {
        Self::without_values(SolveStatus::Unbounded)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::without_values(SolveStatus::Error)
        }
    }

    fn without_values(status: SolveStatus) -> Self {
        Self {
            status,
            objective_value: None,
            values: None,
            message: None,
        }
    }
}

/// Solver output mapped back onto a model's typed keys.
#[derive(Debug, Clone)]
pub struct Solution<'m, K> {
    model: &'m Model<K>,
    status: SolveStatus,
    objective_value: Option<f64>,
    values: Option<Vec<f64>>,
    message: Option<String>,
}

impl<K: VarKey> Model<K> {
    /// Map a raw outcome onto this model.
    ///
    /// Discrete values within [`INTEGRALITY_TOLERANCE`] of an integer are snapped to it;
    /// anything farther away is reported as a solver defect.
    pub fn interpret(&self, outcome: SolveOutcome) -> Result<Solution<'_, K>, ResultError> {
        let values = match (outcome.status.has_solution(), outcome.values) {
            (true, Some(raw)) => Some(self.snap_values(raw)?),
            (true, None) => {
                return Err(ResultError::ValueCount {
                    expected: self.num_variables(),
                    got: 0,
                });
            }
            _ => None,
        };

        Ok(Solution {
            model: self,
            status: outcome.status,
            objective_value: outcome.objective_value,
            values,
            message: outcome.message,
        })
    }

    fn snap_values(&self, mut raw: Vec<f64>) -> Result<Vec<f64>, ResultError> {
        if raw.len() != self.num_variables() {
            return Err(ResultError::ValueCount {
                expected: self.num_variables(),
                got: raw.len(),
            });
        }
        for (id, key, domain) in self.registry.iter() {
            let value = &mut raw[id.index()];
            if !domain.is_discrete() {
                continue;
            }
            let rounded = value.round();
            let in_range = domain != VarDomain::Binary || rounded == 0.0 || rounded == 1.0;
            if (*value - rounded).abs() > INTEGRALITY_TOLERANCE || !in_range {
                return Err(ResultError::NotIntegral {
                    var: format!("{:?}", key),
                    value: *value,
                });
            }
            // -0.0 reads badly in reports
            *value = rounded + 0.0;
        }
        Ok(raw)
    }
}

impl<'m, K: VarKey> Solution<'m, K> {
    pub fn status(&self) -> SolveStatus {
        self.status
    }

    pub fn is_optimal(&self) -> bool {
        self.status == SolveStatus::Optimal
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn model(&self) -> &'m Model<K> {
        self.model
    }

    fn values(&self) -> Result<&[f64], ResultError> {
        match &self.values {
            Some(values) if self.status.has_solution() => Ok(values),
            _ => Err(ResultError::NotOptimal(self.status)),
        }
    }

    pub fn objective_value(&self) -> Result<f64, ResultError> {
        self.values()?;
        self.objective_value
            .ok_or(ResultError::NotOptimal(self.status))
    }

    pub fn value(&self, key: &K) -> Result<f64, ResultError> {
        let values = self.values()?;
        let id = self
            .model
            .registry
            .get(key)
            .ok_or_else(|| ResultError::UnknownVariable(format!("{:?}", key)))?;
        Ok(values[id.index()])
    }

    /// Value of an integer or binary variable as a whole number.
    pub fn integer(&self, key: &K) -> Result<i64, ResultError> {
        Ok(self.value(key)? as i64)
    }

    /// Whether a binary variable is set.
    pub fn is_selected(&self, key: &K) -> Result<bool, ResultError> {
        Ok(self.value(key)? > 0.5)
    }

    /// All variables with their solved values, in declaration order.
    pub fn iter(&self) -> Result<impl Iterator<Item = (&'m K, f64)> + '_, ResultError> {
        let values = self.values()?;
        Ok(self
            .model
            .registry
            .iter()
            .map(move |(id, key, _)| (key, values[id.index()])))
    }

    /// Objective expression evaluated directly on the returned values.
    pub fn recompute_objective(&self) -> Result<f64, ResultError> {
        Ok(self.model.problem.objective.expr.eval(self.values()?))
    }

    /// Compare the reported objective with the recomputed one within a relative tolerance.
    pub fn verify_objective(&self, rel_tol: f64) -> Result<f64, ResultError> {
        let reported = self.objective_value()?;
        let recomputed = self.recompute_objective()?;
        let scale = reported.abs().max(recomputed.abs()).max(1.0);
        if (reported - recomputed).abs() > rel_tol * scale {
            warn!(
                "objective mismatch in {}: reported {} recomputed {}",
                self.model.name(), reported, recomputed
            );
            return Err(ResultError::ObjectiveMismatch {
                reported,
                recomputed,
            });
        }
        debug!("objective of {} verified: {}", self.model.name(), reported);
        Ok(reported)
    }

    /// Names of constraints the returned values violate.
    pub fn violations(&self, tolerance: f64) -> Result<Vec<&'m str>, ResultError> {
        let values = self.values()?;
        Ok(self.model.violated_constraints(values, tolerance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::LinearExpr;
    use crate::problem::ModelBuilder;
    use crate::registry::VarDomain;

    fn mixed_model() -> Model<&'static str> {
        let mut b = ModelBuilder::new("mixed");
        let x = b.declare("x", VarDomain::Continuous).unwrap();
        let n = b.declare("n", VarDomain::Integer).unwrap();
        let s = b.declare("s", VarDomain::Binary).unwrap();
        b.maximize(LinearExpr::weighted([(x, 1.0), (n, 2.0), (s, 3.0)]) + LinearExpr::constant(1.0))
            .unwrap();
        b.build().unwrap()
    }

    #[test]
    fn test_snaps_near_integral_values() {
        let model = mixed_model();
        let outcome = SolveOutcome::optimal(12.5, vec![0.4999999, 2.9999999999, 0.999999999]);
        let solution = model.interpret(outcome).unwrap();
        assert_eq!(solution.value(&"x").unwrap(), 0.4999999);
        assert_eq!(solution.integer(&"n").unwrap(), 3);
        assert!(solution.is_selected(&"s").unwrap());
        assert_eq!(solution.value(&"s").unwrap(), 1.0);
    }

    #[test]
    fn test_rejects_fractional_integer() {
        let model = mixed_model();
        let outcome = SolveOutcome::optimal(0.0, vec![0.0, 2.5, 0.0]);
        assert!(matches!(
            model.interpret(outcome),
            Err(ResultError::NotIntegral { .. })
        ));
    }

    #[test]
    fn test_rejects_binary_out_of_range() {
        let model = mixed_model();
        let outcome = SolveOutcome::optimal(0.0, vec![0.0, 0.0, 2.0]);
        assert!(matches!(
            model.interpret(outcome),
            Err(ResultError::NotIntegral { .. })
        ));
    }

    #[test]
    fn test_reading_infeasible_fails() {
        let model = mixed_model();
        let solution = model.interpret(SolveOutcome::infeasible()).unwrap();
        assert_eq!(solution.status(), SolveStatus::Infeasible);
        assert_eq!(
            solution.value(&"x").unwrap_err(),
            ResultError::NotOptimal(SolveStatus::Infeasible)
        );
        assert!(solution.objective_value().is_err());
        assert!(solution.recompute_objective().is_err());
    }

    #[test]
    fn test_incumbent_values_are_readable() {
        let model = mixed_model();
        let solution = model
            .interpret(SolveOutcome::feasible(7.0, vec![0.0, 1.0000000001, 1.0]))
            .unwrap();
        assert_eq!(solution.status(), SolveStatus::Feasible);
        assert!(!solution.is_optimal());
        assert_eq!(solution.integer(&"n").unwrap(), 1);
        // 2*1 + 3*1 + 1 = 6, not the reported 7
        assert!(solution.verify_objective(OBJECTIVE_TOLERANCE).is_err());
    }

    #[test]
    fn test_unknown_key() {
        let model = mixed_model();
        let solution = model
            .interpret(SolveOutcome::optimal(1.0, vec![0.0, 0.0, 0.0]))
            .unwrap();
        assert!(matches!(
            solution.value(&"y"),
            Err(ResultError::UnknownVariable(_))
        ));
    }

    #[test]
    fn test_value_count_mismatch() {
        let model = mixed_model();
        let outcome = SolveOutcome::optimal(0.0, vec![0.0]);
        assert_eq!(
            model.interpret(outcome).unwrap_err(),
            ResultError::ValueCount {
                expected: 3,
                got: 1
            }
        );
    }

    #[test]
    fn test_verify_objective() {
        let model = mixed_model();
        // 1*0.5 + 2*3 + 3*1 + 1 = 10.5
        let good = model
            .interpret(SolveOutcome::optimal(10.5, vec![0.5, 3.0, 1.0]))
            .unwrap();
        assert_eq!(good.verify_objective(OBJECTIVE_TOLERANCE).unwrap(), 10.5);

        let bad = model
            .interpret(SolveOutcome::optimal(11.0, vec![0.5, 3.0, 1.0]))
            .unwrap();
        assert!(matches!(
            bad.verify_objective(OBJECTIVE_TOLERANCE),
            Err(ResultError::ObjectiveMismatch { .. })
        ));
    }
}

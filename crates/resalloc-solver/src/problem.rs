use log::debug;

use crate::error::BuildError;
use crate::expr::LinearExpr;
use crate::registry::{VarDomain, VarId, VarKey, VariableRegistry};

#[derive(Debug, Clone)]
pub struct Constraint {
    /// Name/label for the constraint (for diagnostics)
    pub name: String,
    /// Variable terms only; constants live in `rhs`
    pub expr: LinearExpr,
    /// Comparison operator
    pub op: ConstraintOp,
    /// Right-hand side value
    pub rhs: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintOp {
    /// Less than or equal (<=)
    Le,
    /// Greater than or equal (>=)
    Ge,
    /// Equal (=)
    Eq,
}

impl Constraint {
    /// Whether the constraint holds for `values`.
    ///
    /// `tolerance` is relative to the magnitude of the row (never below 1).
    pub fn is_satisfied(&self, values: &[f64], tolerance: f64) -> bool {
        let lhs = self.expr.eval(values);
        let magnitude = self
            .expr
            .terms()
            .iter()
            .map(|&(v, c)| (c * values[v.index()]).abs())
            .fold(self.rhs.abs(), f64::max);
        let slack = tolerance * magnitude.max(1.0);
        match self.op {
            ConstraintOp::Le => lhs <= self.rhs + slack,
            ConstraintOp::Ge => lhs >= self.rhs - slack,
            ConstraintOp::Eq => (lhs - self.rhs).abs() <= slack,
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Minimize,
    Maximize,
}

#[derive(Debug, Clone)]
pub struct Objective {
    /// Linear expression; its constant is reported but never sent to a solver
    pub expr: LinearExpr,
    pub sense: Sense,
}

/// The solver-facing part of a model: variable domains, objective and constraints.
///
/// Carries no typed keys, so any adapter can consume it and it can be moved to a worker.
#[derive(Debug, Clone)]
pub struct LpProblem {
    pub name: String,
    /// Domain per variable, indexed by `VarId::index`
    pub domains: Vec<VarDomain>,
    /// Printable key per variable (for diagnostics)
    pub labels: Vec<String>,
    pub objective: Objective,
    pub constraints: Vec<Constraint>,
}

impl LpProblem {
    pub fn num_variables(&self) -> usize {
        self.domains.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_mixed_integer(&self) -> bool {
        self.domains.iter().any(|d| d.is_discrete())
    }

    /// Names of constraints violated by `values`.
    pub fn violated_constraints(&self, values: &[f64], tolerance: f64) -> Vec<&str> {
        self.constraints
            .iter()
            .filter(|c| !c.is_satisfied(values, tolerance))
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// A complete, validated optimization model.
///
/// Owns its variables, objective and constraints. Built once through [`ModelBuilder`],
/// submitted to a solver by reference and kept around only for result extraction.
#[derive(Debug, Clone)]
pub struct Model<K> {
    pub(crate) registry: VariableRegistry<K>,
    pub(crate) problem: LpProblem,
}

impl<K: VarKey> Model<K> {
    pub fn name(&self) -> &str {
        &self.problem.name
    }

    pub fn problem(&self) -> &LpProblem {
        &self.problem
    }

    pub fn registry(&self) -> &VariableRegistry<K> {
        &self.registry
    }

    pub fn objective(&self) -> &Objective {
        &self.problem.objective
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.problem.constraints
    }

    pub fn num_variables(&self) -> usize {
        self.problem.num_variables()
    }

    pub fn num_constraints(&self) -> usize {
        self.problem.num_constraints()
    }

    pub fn is_mixed_integer(&self) -> bool {
        self.problem.is_mixed_integer()
    }

    pub fn lookup(&self, key: &K) -> Result<VarId, BuildError> {
        self.registry.lookup(key)
    }

    /// Names of constraints violated by `values`.
    pub fn violated_constraints(&self, values: &[f64], tolerance: f64) -> Vec<&str> {
        self.problem.violated_constraints(values, tolerance)
    }
}

/// Incrementally assembles a [`Model`].
#[derive(Debug, Clone)]
pub struct ModelBuilder<K> {
    name: String,
    registry: VariableRegistry<K>,
    objective: Option<Objective>,
    constraints: Vec<Constraint>,
}

impl<K: VarKey> ModelBuilder<K> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            registry: VariableRegistry::new(),
            objective: None,
            constraints: Vec::new(),
        }
    }

    pub fn declare(&mut self, key: K, domain: VarDomain) -> Result<VarId, BuildError> {
        self.registry.declare(key, domain)
    }

    pub fn variable(&mut self, key: K, domain: VarDomain) -> Result<VarId, BuildError> {
        self.registry.variable(key, domain)
    }

    pub fn lookup(&self, key: &K) -> Result<VarId, BuildError> {
        self.registry.lookup(key)
    }

    pub fn registry(&self) -> &VariableRegistry<K> {
        &self.registry
    }

    /// Add `expr op rhs`. Any constant inside `expr` is moved to the right-hand side.
    pub fn constrain(
        &mut self,
        name: impl Into<String>,
        expr: LinearExpr,
        op: ConstraintOp,
        rhs: f64,
    ) -> Result<(), BuildError> {
        let name = name.into();
        if !expr.is_finite() || !rhs.is_finite() {
            return Err(BuildError::NonFinite(name));
        }
        for &(var, _) in expr.terms() {
            self.registry.check(var)?;
        }

        let rhs = rhs - expr.constant_value();
        let mut terms = LinearExpr::new();
        for &(var, c) in expr.simplified().terms() {
            terms.add_term(var, c);
        }

        self.constraints.push(Constraint {
            name,
            expr: terms,
            op,
            rhs,
        });
        Ok(())
    }

    pub fn minimize(&mut self, expr: LinearExpr) -> Result<(), BuildError> {
        self.set_objective(expr, Sense::Minimize)
    }

    pub fn maximize(&mut self, expr: LinearExpr) -> Result<(), BuildError> {
        self.set_objective(expr, Sense::Maximize)
    }

    pub fn set_objective(&mut self, expr: LinearExpr, sense: Sense) -> Result<(), BuildError> {
        if !expr.is_finite() {
            return Err(BuildError::NonFinite("objective".to_string()));
        }
        for &(var, _) in expr.terms() {
            self.registry.check(var)?;
        }
        self.objective = Some(Objective {
            expr: expr.simplified(),
            sense,
        });
        Ok(())
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn build(self) -> Result<Model<K>, BuildError> {
        let objective = self
            .objective
            .ok_or_else(|| BuildError::MissingObjective(self.name.clone()))?;

        debug!(
            "built model {}: {} variables, {} constraints, {:?}",
            self.name,
            self.registry.len(),
            self.constraints.len(),
            objective.sense
        );

        let (domains, labels): (Vec<VarDomain>, Vec<String>) = self
            .registry
            .iter()
            .map(|(_, key, domain)| (domain, format!("{:?}", key)))
            .unzip();

        Ok(Model {
            problem: LpProblem {
                name: self.name,
                domains,
                labels,
                objective,
                constraints: self.constraints,
            },
            registry: self.registry,
        })
    }
}

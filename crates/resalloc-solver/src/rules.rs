//! Domain rule patterns shared by every formulation.
//!
//! Each method adds one named linear constraint (two for [`ModelBuilder::abs_diff`]).

use crate::error::BuildError;
use crate::expr::LinearExpr;
use crate::problem::{ConstraintOp, ModelBuilder};
use crate::registry::{VarId, VarKey};

impl<K: VarKey> ModelBuilder<K> {
    /// Capacity or budget cap: `sum(vars) <= rhs`.
    pub fn cap(
        &mut self,
        name: impl Into<String>,
        vars: impl IntoIterator<Item = VarId>,
        rhs: f64,
    ) -> Result<(), BuildError> {
        self.constrain(name, LinearExpr::sum(vars), ConstraintOp::Le, rhs)
    }

    /// Per-cell upper bound: `var <= rhs`.
    pub fn upper_bound(
        &mut self,
        name: impl Into<String>,
        var: VarId,
        rhs: f64,
    ) -> Result<(), BuildError> {
        self.constrain(name, LinearExpr::var(var), ConstraintOp::Le, rhs)
    }

    /// Cross-cutting resource limit: `sum(weight * var) <= rhs`.
    pub fn weighted_cap(
        &mut self,
        name: impl Into<String>,
        terms: impl IntoIterator<Item = (VarId, f64)>,
        rhs: f64,
    ) -> Result<(), BuildError> {
        self.constrain(name, LinearExpr::weighted(terms), ConstraintOp::Le, rhs)
    }

    /// Minimum commitment: `var >= rhs`. Never relaxed; conflicting minima make the
    /// model infeasible.
    pub fn minimum(
        &mut self,
        name: impl Into<String>,
        var: VarId,
        rhs: f64,
    ) -> Result<(), BuildError> {
        self.constrain(name, LinearExpr::var(var), ConstraintOp::Ge, rhs)
    }

    /// Exact assignment: `sum(vars) == 1`.
    pub fn exactly_one(
        &mut self,
        name: impl Into<String>,
        vars: impl IntoIterator<Item = VarId>,
    ) -> Result<(), BuildError> {
        self.within(name, vars, 1.0)
    }

    /// `sum(vars) == total`
    pub fn within(
        &mut self,
        name: impl Into<String>,
        vars: impl IntoIterator<Item = VarId>,
        total: f64,
    ) -> Result<(), BuildError> {
        self.constrain(name, LinearExpr::sum(vars), ConstraintOp::Eq, total)
    }

    /// Linked auxiliary variable: `aux == expr`.
    pub fn link(
        &mut self,
        name: impl Into<String>,
        aux: VarId,
        expr: LinearExpr,
    ) -> Result<(), BuildError> {
        self.constrain(name, LinearExpr::var(aux) - expr, ConstraintOp::Eq, 0.0)
    }

    /// Absolute-value linearization: `aux >= a - b` and `aux >= b - a`.
    ///
    /// `aux` only equals `|a - b|` when the objective charges for it; the two rows are
    /// suffixed `_pos` and `_neg`.
    pub fn abs_diff(
        &mut self,
        name: impl Into<String>,
        aux: VarId,
        a: LinearExpr,
        b: LinearExpr,
    ) -> Result<(), BuildError> {
        let name = name.into();
        let diff = a - b;
        self.constrain(
            format!("{}_pos", name),
            LinearExpr::var(aux) - diff.clone(),
            ConstraintOp::Ge,
            0.0,
        )?;
        self.constrain(
            format!("{}_neg", name),
            LinearExpr::var(aux) + diff,
            ConstraintOp::Ge,
            0.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::problem::{ConstraintOp, ModelBuilder};
    use crate::registry::VarDomain;
    use crate::LinearExpr;

    #[test]
    fn test_abs_diff_adds_two_rows() {
        let mut b = ModelBuilder::new("abs");
        let x = b.declare("x", VarDomain::Continuous).unwrap();
        let y = b.declare("y", VarDomain::Continuous).unwrap();
        let d = b.declare("d", VarDomain::Continuous).unwrap();
        b.abs_diff("gap", d, LinearExpr::var(x), LinearExpr::var(y))
            .unwrap();
        b.minimize(LinearExpr::var(d)).unwrap();
        let model = b.build().unwrap();

        let rows = model.constraints();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "gap_pos");
        assert_eq!(rows[1].name, "gap_neg");
        // d - x + y >= 0
        assert_eq!(rows[0].expr.terms(), &[(x, -1.0), (y, 1.0), (d, 1.0)]);
        // d + x - y >= 0
        assert_eq!(rows[1].expr.terms(), &[(x, 1.0), (y, -1.0), (d, 1.0)]);
        assert!(rows.iter().all(|r| r.op == ConstraintOp::Ge && r.rhs == 0.0));
    }

    #[test]
    fn test_link_is_equality_with_aux_on_left() {
        let mut b = ModelBuilder::new("link");
        let x = b.declare("x", VarDomain::Continuous).unwrap();
        let y = b.declare("y", VarDomain::Continuous).unwrap();
        b.link("y_def", y, LinearExpr::term(x, 0.05)).unwrap();
        b.minimize(LinearExpr::var(y)).unwrap();
        let model = b.build().unwrap();

        let row = &model.constraints()[0];
        assert_eq!(row.op, ConstraintOp::Eq);
        assert_eq!(row.expr.terms(), &[(x, -0.05), (y, 1.0)]);
        assert!(row.is_satisfied(&[100.0, 5.0], 1e-9));
    }

    #[test]
    fn test_weighted_cap() {
        let mut b = ModelBuilder::new("res");
        let x = b.declare(0, VarDomain::Integer).unwrap();
        let y = b.declare(1, VarDomain::Integer).unwrap();
        b.weighted_cap("week_1", [(x, 2.0), (y, 3.0)], 12.0).unwrap();
        b.maximize(LinearExpr::sum([x, y])).unwrap();
        let model = b.build().unwrap();
        let row = &model.constraints()[0];
        assert!(row.is_satisfied(&[3.0, 2.0], 0.0));
        assert!(!row.is_satisfied(&[3.0, 3.0], 0.0));
    }
}

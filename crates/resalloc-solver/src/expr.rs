use std::collections::BTreeMap;
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

use crate::registry::VarId;

/// A linear combination of decision variables plus a constant.
///
/// Only `coefficient * variable` terms can be expressed, so every constraint and objective
/// built from it is linear by construction. Parameters multiply into coefficients at build time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpr {
    terms: Vec<(VarId, f64)>,
    constant: f64,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constant(value: f64) -> Self {
        Self {
            terms: Vec::new(),
            constant: value,
        }
    }

    pub fn var(var: VarId) -> Self {
        Self::term(var, 1.0)
    }

    pub fn term(var: VarId, coefficient: f64) -> Self {
        Self {
            terms: vec![(var, coefficient)],
            constant: 0.0,
        }
    }

    /// Unweighted sum of variables
    pub fn sum(vars: impl IntoIterator<Item = VarId>) -> Self {
        Self {
            terms: vars.into_iter().map(|v| (v, 1.0)).collect(),
            constant: 0.0,
        }
    }

    pub fn weighted(terms: impl IntoIterator<Item = (VarId, f64)>) -> Self {
        Self {
            terms: terms.into_iter().collect(),
            constant: 0.0,
        }
    }

    pub fn add_term(&mut self, var: VarId, coefficient: f64) {
        self.terms.push((var, coefficient));
    }

    pub fn add_constant(&mut self, value: f64) {
        self.constant += value;
    }

    pub fn with_term(mut self, var: VarId, coefficient: f64) -> Self {
        self.add_term(var, coefficient);
        self
    }

    pub fn terms(&self) -> &[(VarId, f64)] {
        &self.terms
    }

    pub fn constant_value(&self) -> f64 {
        self.constant
    }

    pub fn scale(mut self, factor: f64) -> Self {
        for (_, c) in &mut self.terms {
            *c *= factor;
        }
        self.constant *= factor;
        self
    }

    /// Merge repeated variables and drop zero coefficients. Term order follows variable order.
    pub fn simplified(&self) -> Self {
        let mut merged: BTreeMap<VarId, f64> = BTreeMap::new();
        for &(v, c) in &self.terms {
            *merged.entry(v).or_insert(0.0) += c;
        }
        Self {
            terms: merged.into_iter().filter(|(_, c)| *c != 0.0).collect(),
            constant: self.constant,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.constant.is_finite() && self.terms.iter().all(|(_, c)| c.is_finite())
    }

    /// Evaluate against values indexed by `VarId::index`.
    pub fn eval(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|(v, c)| c * values[v.index()])
            .sum::<f64>()
            + self.constant
    }
}

impl From<VarId> for LinearExpr {
    fn from(var: VarId) -> Self {
        LinearExpr::var(var)
    }
}

impl From<f64> for LinearExpr {
    fn from(value: f64) -> Self {
        LinearExpr::constant(value)
    }
}

impl AddAssign for LinearExpr {
    fn add_assign(&mut self, rhs: LinearExpr) {
        self.terms.extend(rhs.terms);
        self.constant += rhs.constant;
    }
}

impl Add for LinearExpr {
    type Output = LinearExpr;

    fn add(mut self, rhs: LinearExpr) -> LinearExpr {
        self += rhs;
        self
    }
}

impl Neg for LinearExpr {
    type Output = LinearExpr;

    fn neg(self) -> LinearExpr {
        self.scale(-1.0)
    }
}

impl Sub for LinearExpr {
    type Output = LinearExpr;

    fn sub(self, rhs: LinearExpr) -> LinearExpr {
        self + (-rhs)
    }
}

impl Mul<f64> for LinearExpr {
    type Output = LinearExpr;

    fn mul(self, rhs: f64) -> LinearExpr {
        self.scale(rhs)
    }
}

impl FromIterator<(VarId, f64)> for LinearExpr {
    fn from_iter<I: IntoIterator<Item = (VarId, f64)>>(iter: I) -> Self {
        LinearExpr::weighted(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{VarDomain, VariableRegistry};

    fn two_vars() -> (VarId, VarId) {
        let mut reg = VariableRegistry::new();
        let x = reg.declare("x", VarDomain::Continuous).unwrap();
        let y = reg.declare("y", VarDomain::Continuous).unwrap();
        (x, y)
    }

    #[test]
    fn test_eval() {
        let (x, y) = two_vars();
        let expr = LinearExpr::term(x, 3.0).with_term(y, -2.0) + LinearExpr::constant(5.0);
        assert_eq!(expr.eval(&[2.0, 1.0]), 9.0);
    }

    #[test]
    fn test_sub_negates_constant_and_terms() {
        let (x, y) = two_vars();
        let expr = LinearExpr::var(x) - (LinearExpr::var(y) + LinearExpr::constant(1.0));
        assert_eq!(expr.terms(), &[(x, 1.0), (y, -1.0)]);
        assert_eq!(expr.constant_value(), -1.0);
    }

    #[test]
    fn test_simplified_merges_and_drops_zeros() {
        let (x, y) = two_vars();
        let expr = LinearExpr::weighted([(y, 2.0), (x, 1.0), (y, -2.0), (x, 0.5)]);
        let simple = expr.simplified();
        assert_eq!(simple.terms(), &[(x, 1.5)]);
    }

    #[test]
    fn test_non_finite_detected() {
        let (x, _) = two_vars();
        assert!(!LinearExpr::term(x, f64::NAN).is_finite());
        assert!(!LinearExpr::constant(f64::INFINITY).is_finite());
        assert!(LinearExpr::term(x, 1e12).is_finite());
    }
}

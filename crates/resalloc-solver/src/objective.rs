use crate::expr::LinearExpr;
use crate::registry::VarId;

/// One entity's share of an unmet-demand objective.
#[derive(Debug, Clone)]
pub struct DemandGroup {
    pub weight: f64,
    pub demand: f64,
    /// Variables whose sum fulfils this demand
    pub fulfilled_by: Vec<VarId>,
}

/// `sum(weight * (demand - sum(fulfilled_by)))`
///
/// The build-time constant `sum(weight * demand)` is kept as the expression constant, so the
/// reported objective matches the full expression even though solvers only see the variable
/// terms.
pub fn unmet_demand(groups: impl IntoIterator<Item = DemandGroup>) -> LinearExpr {
    let mut expr = LinearExpr::new();
    for group in groups {
        expr.add_constant(group.weight * group.demand);
        for var in group.fulfilled_by {
            expr.add_term(var, -group.weight);
        }
    }
    expr
}

/// `sum(weight * var) - sum(penalty)`
pub fn benefit_minus_penalty(
    benefit: impl IntoIterator<Item = (VarId, f64)>,
    penalties: impl IntoIterator<Item = VarId>,
) -> LinearExpr {
    let mut expr = LinearExpr::weighted(benefit);
    for var in penalties {
        expr.add_term(var, -1.0);
    }
    expr
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{VarDomain, VariableRegistry};

    #[test]
    fn test_unmet_demand_keeps_constant() {
        let mut reg = VariableRegistry::new();
        let a1 = reg.declare(("a", 1), VarDomain::Integer).unwrap();
        let a2 = reg.declare(("a", 2), VarDomain::Integer).unwrap();
        let b1 = reg.declare(("b", 1), VarDomain::Integer).unwrap();

        let expr = unmet_demand([
            DemandGroup {
                weight: 5.0,
                demand: 10.0,
                fulfilled_by: vec![a1, a2],
            },
            DemandGroup {
                weight: 2.0,
                demand: 4.0,
                fulfilled_by: vec![b1],
            },
        ]);

        assert_eq!(expr.constant_value(), 58.0);
        // 5*(10 - 3 - 4) + 2*(4 - 4) = 15
        assert_eq!(expr.eval(&[3.0, 4.0, 4.0]), 15.0);
    }

    #[test]
    fn test_benefit_minus_penalty() {
        let mut reg = VariableRegistry::new();
        let x = reg.declare("x", VarDomain::Continuous).unwrap();
        let d = reg.declare("d", VarDomain::Continuous).unwrap();
        let expr = benefit_minus_penalty([(x, 8.0)], [d]);
        assert_eq!(expr.eval(&[10.0, 3.0]), 77.0);
    }
}

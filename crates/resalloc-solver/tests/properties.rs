use proptest::prelude::*;
use resalloc_solver::{
    create_solver, Backend, ConstraintOp, LinearExpr, ModelBuilder, VarDomain,
    OBJECTIVE_TOLERANCE,
};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn abs_diff_aux_equals_distance(a in 0.0f64..1000.0, b in 0.0f64..1000.0) {
        let mut builder = ModelBuilder::new("abs");
        let x = builder.declare("x", VarDomain::Continuous).unwrap();
        let y = builder.declare("y", VarDomain::Continuous).unwrap();
        let d = builder.declare("d", VarDomain::Continuous).unwrap();
        builder.constrain("x_fix", LinearExpr::var(x), ConstraintOp::Eq, a).unwrap();
        builder.constrain("y_fix", LinearExpr::var(y), ConstraintOp::Eq, b).unwrap();
        builder.abs_diff("gap", d, LinearExpr::var(x), LinearExpr::var(y)).unwrap();
        builder.minimize(LinearExpr::var(d)).unwrap();
        let model = builder.build().unwrap();

        let outcome = create_solver(Backend::MicroLp, None).solve(model.problem()).unwrap();
        let solution = model.interpret(outcome).unwrap();
        let gap = solution.value(&"d").unwrap();
        prop_assert!((gap - (a - b).abs()).abs() < 1e-6, "d = {}, |a - b| = {}", gap, (a - b).abs());
    }

    #[test]
    fn reported_objective_is_reproducible(
        weights in prop::collection::vec(0.1f64..10.0, 1..6),
        budget in 1.0f64..100.0,
        offset in -50.0f64..50.0,
    ) {
        let mut builder = ModelBuilder::new("knapsack");
        let vars: Vec<_> = (0..weights.len())
            .map(|i| builder.declare(i, VarDomain::Continuous).unwrap())
            .collect();
        builder.cap("budget", vars.iter().copied(), budget).unwrap();
        for (i, &v) in vars.iter().enumerate() {
            builder.upper_bound(format!("cell_{}", i), v, budget / 2.0).unwrap();
        }
        let objective = LinearExpr::weighted(vars.iter().copied().zip(weights.iter().copied()))
            + LinearExpr::constant(offset);
        builder.maximize(objective).unwrap();
        let model = builder.build().unwrap();

        let outcome = create_solver(Backend::MicroLp, None).solve(model.problem()).unwrap();
        let solution = model.interpret(outcome).unwrap();
        prop_assert!(solution.verify_objective(OBJECTIVE_TOLERANCE).is_ok());
        prop_assert!(solution.violations(1e-6).unwrap().is_empty());
    }
}

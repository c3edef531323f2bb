mod backend;
mod error;
mod expr;
pub mod objective;
mod params;
mod problem;
mod registry;
mod rules;
mod solution;
mod worker;

pub use backend::{create_solver, Backend, GoodLpSolver, Solver};
pub use error::{BuildError, ResultError, SolveError};
pub use expr::LinearExpr;
pub use objective::DemandGroup;
pub use params::{EntitySet, ParamGrid, ParamTable};
pub use problem::{Constraint, ConstraintOp, LpProblem, Model, ModelBuilder, Objective, Sense};
pub use registry::{VarDomain, VarId, VarKey, VariableRegistry};
pub use solution::{
    Solution, SolveOutcome, SolveStatus, INTEGRALITY_TOLERANCE, OBJECTIVE_TOLERANCE,
};
pub use worker::{solve_with_retry, spawn_solve, SolveHandle, WithFallback};

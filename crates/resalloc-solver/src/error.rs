use thiserror::Error;

use crate::solution::SolveStatus;

/// A malformed model. Always fatal to the build that produced it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error("Missing parameter {table}[{key}]")]
    MissingParameter { table: String, key: String },
    #[error("Invalid parameter {table}[{key}] = {value}")]
    InvalidParameter { table: String, key: String, value: f64 },
    #[error("Parameter {table}[{key}] is used as a divisor and must not be zero")]
    ZeroDivisor { table: String, key: String },
    #[error("Duplicate entity '{id}' in set {set}")]
    DuplicateEntity { set: String, id: String },
    #[error("Variable {0} declared twice")]
    DuplicateVariable(String),
    #[error("Variable {key} already declared as {existing}, requested {requested}")]
    DomainConflict {
        key: String,
        existing: String,
        requested: String,
    },
    #[error("Undeclared variable: {0}")]
    UndeclaredVariable(String),
    #[error("Variable handle #{0} does not belong to this model")]
    ForeignVariable(usize),
    #[error("Non-finite coefficient or bound in constraint {0}")]
    NonFinite(String),
    #[error("Model {0} has no objective")]
    MissingObjective(String),
}

/// The adapter itself failed. Distinct from an infeasible or unbounded model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolveError {
    #[error("Solver backend unavailable: {0}")]
    Unavailable(String),
    #[error("Time limit of {0:.1}s reached without an incumbent")]
    TimeLimit(f64),
    #[error("Solver worker terminated without a result")]
    WorkerLost,
    #[error("Solver backend failure: {0}")]
    Backend(String),
}

/// Reading a solution in a way the solve status or variable domains do not allow.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResultError {
    #[error("Solution status is {0}, values are only defined for an optimal or feasible solve")]
    NotOptimal(SolveStatus),
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),
    #[error("Variable {var} should be integral but the solver returned {value}")]
    NotIntegral { var: String, value: f64 },
    #[error("Solver returned {got} values for a model with {expected} variables")]
    ValueCount { expected: usize, got: usize },
    #[error("Reported objective {reported} differs from recomputed {recomputed}")]
    ObjectiveMismatch { reported: f64, recomputed: f64 },
}

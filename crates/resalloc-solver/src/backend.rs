use std::fmt;
use std::str::FromStr;

use good_lp::solvers::{Solver as LpBackend, SolutionStatus, WithTimeLimit};
use good_lp::{
    variable, Expression, ProblemVariables, ResolutionError, Solution as _, SolverModel, Variable,
    VariableDefinition,
};
use log::{debug, info, warn};

use crate::error::SolveError;
use crate::problem::{ConstraintOp, LpProblem, Sense};
use crate::registry::{VarDomain, VarId};
use crate::solution::SolveOutcome;

/// Common interface for LP/MILP solver adapters
pub trait Solver: Send + Sync {
    /// Solve a problem to completion.
    ///
    /// Infeasible and unbounded problems are `Ok` outcomes. `Err` is reserved for faults of
    /// the adapter itself.
    fn solve(&self, problem: &LpProblem) -> Result<SolveOutcome, SolveError>;

    /// Get the solver name for logging/debugging
    fn name(&self) -> &str;
}

/// Available solver backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Pure Rust simplex with branch and bound, always compiled in
    MicroLp,
    #[cfg(feature = "highs")]
    Highs,
}

impl Backend {
    pub fn name(self) -> &'static str {
        match self {
            Backend::MicroLp => "microlp",
            #[cfg(feature = "highs")]
            Backend::Highs => "highs",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = SolveError;

    /// Parse a backend name (case-insensitive)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "microlp" => Ok(Backend::MicroLp),
            #[cfg(feature = "highs")]
            "highs" => Ok(Backend::Highs),
            other => Err(SolveError::Unavailable(other.to_string())),
        }
    }
}

/// Create a solver for the given backend, optionally with a time limit in seconds.
pub fn create_solver(backend: Backend, time_limit: Option<f64>) -> Box<dyn Solver> {
    let solver = GoodLpSolver::new(backend);
    match time_limit {
        Some(limit) => Box::new(solver.with_time_limit(limit)),
        None => Box::new(solver),
    }
}

/// Adapter over the `good_lp` modelling facade.
#[derive(Debug, Clone)]
pub struct GoodLpSolver {
    backend: Backend,
    time_limit: Option<f64>,
}

impl GoodLpSolver {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            time_limit: None,
        }
    }

    /// Both backends stop at the limit and return their best incumbent as
    /// `SolveStatus::Feasible`. Without an incumbent the solve fails with `SolveError::TimeLimit`.
    pub fn with_time_limit(mut self, seconds: f64) -> Self {
        self.time_limit = Some(seconds);
        self
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn time_limit(&self) -> Option<f64> {
        self.time_limit
    }
}

impl Solver for GoodLpSolver {
    fn solve(&self, problem: &LpProblem) -> Result<SolveOutcome, SolveError> {
        debug!(
            "solving {} with {}: {} variables, {} constraints",
            problem.name,
            self.backend,
            problem.num_variables(),
            problem.num_constraints()
        );

        let limit = self.time_limit;
        if let Some(seconds) = limit {
            if !seconds.is_finite() || seconds < 0.0 {
                return Err(SolveError::Backend(format!("invalid time limit {}", seconds)));
            }
        }

        let outcome = match self.backend {
            Backend::MicroLp => {
                use good_lp::solvers::microlp::{MicroLpProblem, MicroLpSolution};
                solve_with(
                    problem,
                    good_lp::microlp,
                    move |model: MicroLpProblem| match limit {
                        Some(seconds) => model.with_time_limit(seconds),
                        None => model,
                    },
                    |solution: MicroLpSolution| solution.into_inner().objective(),
                    limit,
                )?
            }
            #[cfg(feature = "highs")]
            Backend::Highs => {
                use good_lp::solvers::highs::{HighsProblem, HighsSolution};
                solve_with(
                    problem,
                    good_lp::highs,
                    move |model: HighsProblem| match limit {
                        Some(seconds) => model.with_time_limit(seconds),
                        None => model,
                    },
                    |solution: HighsSolution| solution.into_inner().objective_value(),
                    limit,
                )?
            }
        };

        info!("{} finished with status {}", problem.name, outcome.status);
        Ok(outcome)
    }

    fn name(&self) -> &str {
        self.backend.name()
    }
}

fn column(domain: VarDomain) -> VariableDefinition {
    match domain {
        VarDomain::Continuous => variable().min(0.0),
        VarDomain::Integer => variable().integer().min(0.0),
        VarDomain::Binary => variable().binary(),
    }
}

fn to_expression(terms: &[(VarId, f64)], columns: &[Variable]) -> Expression {
    let mut expr = Expression::from(0.0);
    for &(var, coefficient) in terms {
        expr += columns[var.index()] * coefficient;
    }
    expr
}

/// Translate `problem` for one good_lp backend and run it.
///
/// `objective_of` reads the objective as the backend reports it, so that it can be checked
/// against the returned values independently.
fn solve_with<S, F, G>(
    problem: &LpProblem,
    backend: S,
    configure: F,
    objective_of: G,
    time_limit: Option<f64>,
) -> Result<SolveOutcome, SolveError>
where
    S: LpBackend,
    S::Model: SolverModel<Error = ResolutionError>,
    F: FnOnce(S::Model) -> S::Model,
    G: FnOnce(<S::Model as SolverModel>::Solution) -> f64,
{
    let mut vars = ProblemVariables::new();
    let columns: Vec<Variable> = problem
        .domains
        .iter()
        .map(|&domain| vars.add(column(domain)))
        .collect();

    // The objective constant never reaches the backend; it is added back when reporting.
    let objective = to_expression(problem.objective.expr.terms(), &columns);
    let unsolved = match problem.objective.sense {
        Sense::Minimize => vars.minimise(objective),
        Sense::Maximize => vars.maximise(objective),
    };

    let mut model = configure(unsolved.using(backend));
    for c in &problem.constraints {
        let lhs = to_expression(c.expr.terms(), &columns);
        let row = match c.op {
            ConstraintOp::Le => lhs.leq(c.rhs),
            ConstraintOp::Ge => lhs.geq(c.rhs),
            ConstraintOp::Eq => lhs.eq(c.rhs),
        };
        model.add_constraint(row);
    }

    match model.solve() {
        Ok(solution) => {
            let values: Vec<f64> = columns.iter().map(|&v| solution.value(v)).collect();
            let status = solution.status();
            let objective_value =
                objective_of(solution) + problem.objective.expr.constant_value();
            match status {
                SolutionStatus::Optimal => Ok(SolveOutcome::optimal(objective_value, values)),
                stopped => {
                    info!(
                        "{} stopped early ({:?}), returning incumbent {}",
                        problem.name, stopped, objective_value
                    );
                    Ok(SolveOutcome::feasible(objective_value, values))
                }
            }
        }
        Err(error) => classify(error, time_limit),
    }
}

/// Infeasible and unbounded are answers about the model; everything else is a fault.
fn classify(error: ResolutionError, time_limit: Option<f64>) -> Result<SolveOutcome, SolveError> {
    match error {
        ResolutionError::Infeasible => Ok(SolveOutcome::infeasible()),
        ResolutionError::Unbounded => Ok(SolveOutcome::unbounded()),
        other => {
            let message = other.to_string();
            match time_limit {
                Some(seconds) if message.to_lowercase().contains("time limit") => {
                    warn!("no incumbent within {}s: {}", seconds, message);
                    Err(SolveError::TimeLimit(seconds))
                }
                _ => Err(SolveError::Backend(message)),
            }
        }
    }
}

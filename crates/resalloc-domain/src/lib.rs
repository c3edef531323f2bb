mod hospital;
mod waste;

use log::{debug, info, warn};
use resalloc_solver::{
    BuildError, Model, ResultError, Solution, SolveError, SolveStatus, Solver, VarKey,
    OBJECTIVE_TOLERANCE,
};
use thiserror::Error;

pub use hospital::{
    AdmissionPlan, AdmissionVar, Assignment, DailySchedule, DayLoad, PatientSelection,
    ScheduleVar, SchedulePlan, SelectionPlan, SelectionVar, SpecialtyAdmissions,
    WeeklyAdmissions,
};
pub use waste::{
    Allocation, BalancedImpact, Imbalance, ImpactPlan, MunicipalityFunds, MunicipalityPlan,
    PercentReduction, WastePlan, WasteReduction, WasteVar,
};

/// Relative tolerance used when re-checking constraints on a returned solution.
pub const FEASIBILITY_TOLERANCE: f64 = 1e-6;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    #[error("Build error: {0}")]
    Build(#[from] BuildError),
    #[error("Solver fault: {0}")]
    Solve(#[from] SolveError),
    #[error("Result error: {0}")]
    Result(#[from] ResultError),
    #[error("Solution is inconsistent with the model: {0}")]
    Inconsistent(String),
}

/// Terminal state of a formulation run. `Solved` and `Feasible` carry a plan.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(tag = "status", content = "plan", rename_all = "lowercase")
)]
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<P> {
    Solved(P),
    /// Best plan found before a solver limit; not proven optimal
    Feasible(P),
    Infeasible,
    Unbounded,
    /// The backend answered with an error status for this model
    Failed(String),
}

impl<P> Outcome<P> {
    pub fn plan(&self) -> Option<&P> {
        match self {
            Outcome::Solved(plan) | Outcome::Feasible(plan) => Some(plan),
            _ => None,
        }
    }
}

/// A concrete allocation problem: parameters in, typed plan out.
pub trait Formulation {
    type Key: VarKey;
    type Plan;

    /// Turn the parameters into a model. Missing or malformed parameters fail here.
    fn build(&self) -> Result<Model<Self::Key>, BuildError>;

    /// Read an optimal solution of the model returned by [`build`](Self::build).
    fn extract(&self, solution: &Solution<'_, Self::Key>) -> Result<Self::Plan, PlanError>;
}

/// Build, solve, validate and extract in one go.
pub fn solve_formulation<F: Formulation>(
    formulation: &F,
    solver: &dyn Solver,
) -> Result<Outcome<F::Plan>, PlanError> {
    let model = formulation.build()?;
    info!(
        "solving {} with {} ({} variables, {} constraints)",
        model.name(),
        solver.name(),
        model.num_variables(),
        model.num_constraints()
    );

    let outcome = solver.solve(model.problem())?;
    let solution = model.interpret(outcome)?;

    match solution.status() {
        status @ (SolveStatus::Optimal | SolveStatus::Feasible) => {
            solution.verify_objective(OBJECTIVE_TOLERANCE)?;
            let violated = solution.violations(FEASIBILITY_TOLERANCE)?;
            if !violated.is_empty() {
                warn!("{} violates {:?}", model.name(), violated);
                return Err(PlanError::Inconsistent(format!(
                    "violated constraints: {}",
                    violated.join(", ")
                )));
            }
            let plan = formulation.extract(&solution)?;
            debug!("extracted plan for {}", model.name());
            if status == SolveStatus::Feasible {
                warn!("{} stopped at a limit, plan is not proven optimal", model.name());
                return Ok(Outcome::Feasible(plan));
            }
            Ok(Outcome::Solved(plan))
        }
        SolveStatus::Infeasible => Ok(Outcome::Infeasible),
        SolveStatus::Unbounded => Ok(Outcome::Unbounded),
        SolveStatus::Error => Ok(Outcome::Failed(
            solution
                .message()
                .unwrap_or("solver reported an error")
                .to_string(),
        )),
    }
}

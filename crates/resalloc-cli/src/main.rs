use clap::{Parser, Subcommand, ValueEnum};
use dotenv::dotenv;
use log::{debug, info};
use resalloc_domain::{
    solve_formulation, AdmissionPlan, BalancedImpact, DailySchedule, Formulation, ImpactPlan,
    Outcome, PatientSelection, PercentReduction, SchedulePlan, SelectionPlan, WastePlan,
    WasteReduction, WeeklyAdmissions,
};
use resalloc_solver::{create_solver, Backend, SolveError, Solver, WithFallback};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "resalloc")]
#[command(about = "Optimal allocation of municipal waste funds and hospital capacity", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Pretty,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve a scenario file and print the plan
    Solve {
        /// The scenario file (JSON)
        file: PathBuf,
        /// Output format
        #[arg(short, long, value_enum, default_value = "pretty")]
        format: Format,
        /// Solver backend (microlp, highs)
        #[arg(short, long, env = "RESALLOC_SOLVER", default_value = "microlp")]
        solver: String,
        /// Time limit in seconds
        #[arg(short, long, env = "RESALLOC_TIME_LIMIT")]
        time_limit: Option<f64>,
    },
    /// Build the model of a scenario file without solving it
    Check {
        /// The scenario file (JSON)
        file: PathBuf,
    },
}

#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Scenario {
    WasteReduction(WasteReduction),
    BalancedImpact(BalancedImpact),
    PercentReduction(PercentReduction),
    WeeklyAdmissions(WeeklyAdmissions),
    DailySchedule(DailySchedule),
    PatientSelection(PatientSelection),
}

impl Scenario {
    fn solve(&self, solver: &dyn Solver, format: Format) -> bool {
        match self {
            Scenario::WasteReduction(f) => run(f, solver, format),
            Scenario::BalancedImpact(f) => run(f, solver, format),
            Scenario::PercentReduction(f) => run(f, solver, format),
            Scenario::WeeklyAdmissions(f) => run(f, solver, format),
            Scenario::DailySchedule(f) => run(f, solver, format),
            Scenario::PatientSelection(f) => run(f, solver, format),
        }
    }

    fn check(&self, file: &Path) -> bool {
        match self {
            Scenario::WasteReduction(f) => check(f, file),
            Scenario::BalancedImpact(f) => check(f, file),
            Scenario::PercentReduction(f) => check(f, file),
            Scenario::WeeklyAdmissions(f) => check(f, file),
            Scenario::DailySchedule(f) => check(f, file),
            Scenario::PatientSelection(f) => check(f, file),
        }
    }
}

/// Human-readable rendering of a plan.
trait Report {
    fn print(&self);
}

impl Report for WastePlan {
    fn print(&self) {
        for m in &self.municipalities {
            println!(
                "{}: reduction {:.2} t ({:.2}%), residual {:.2} t",
                m.municipality, m.reduction, m.reduction_pct, m.residual
            );
            for a in &m.funds {
                println!("  {:24} {:14.2}", a.activity, a.amount);
            }
        }
        println!();
        println!("Total residual waste: {:.2}", self.objective);
    }
}

impl Report for ImpactPlan {
    fn print(&self) {
        for m in &self.municipalities {
            println!("{}:", m.municipality);
            for a in &m.funds {
                println!("  {:24} {:14.2}", a.activity, a.amount);
            }
        }
        let penalty: f64 = self.imbalances.iter().map(|g| g.gap).sum();
        println!();
        println!("Total impact: {:.2}", self.total_impact);
        println!("Imbalance penalty: {:.2}", penalty);
        println!("Objective: {:.2}", self.objective);
    }
}

impl Report for AdmissionPlan {
    fn print(&self) {
        print!("{:20}", "");
        for w in &self.weeks {
            print!(" {:>6}", w);
        }
        println!(" {:>8} {:>8}", "admitted", "unserved");
        for s in &self.specialties {
            print!("{:20}", s.specialty);
            for n in &s.per_week {
                print!(" {:>6}", n);
            }
            println!(" {:>8} {:>8}", s.admitted, s.unserved);
        }
        print!("{:20}", "resources");
        for r in &self.resource_use {
            print!(" {:>6}", r);
        }
        println!();
        println!();
        println!("Weighted unserved patients: {:.2}", self.objective);
    }
}

impl Report for SchedulePlan {
    fn print(&self) {
        for load in &self.load {
            let patients: Vec<&str> = self
                .assignments
                .iter()
                .filter(|a| a.day == load.day)
                .map(|a| a.patient.as_str())
                .collect();
            println!("{:10} {:4} {}", load.day, load.patients, patients.join(", "));
        }
        println!();
        println!("Total waiting (day ranks): {:.0}", self.objective);
    }
}

impl Report for SelectionPlan {
    fn print(&self) {
        println!("Attended:     {}", self.selected.join(", "));
        println!("Not attended: {}", self.unselected.join(", "));
        println!("Hours used: {:.2}", self.hours_used);
        println!();
        println!("Total priority: {:.0}", self.objective);
    }
}

fn run<F>(formulation: &F, solver: &dyn Solver, format: Format) -> bool
where
    F: Formulation,
    F::Plan: Serialize + Report,
{
    let outcome = match solve_formulation(formulation, solver) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("Error: {}", e);
            return false;
        }
    };

    match format {
        Format::Json => match serde_json::to_string_pretty(&outcome) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error writing JSON: {}", e);
                return false;
            }
        },
        Format::Pretty => match &outcome {
            Outcome::Solved(plan) => {
                println!("Status: OPTIMAL");
                println!();
                plan.print();
            }
            Outcome::Feasible(plan) => {
                println!("Status: FEASIBLE (solver limit reached, not proven optimal)");
                println!();
                plan.print();
            }
            Outcome::Infeasible => {
                println!("Status: INFEASIBLE");
                println!("No allocation satisfies all constraints.");
            }
            Outcome::Unbounded => {
                println!("Status: UNBOUNDED");
                println!("The problem has no finite optimal solution.");
            }
            Outcome::Failed(message) => {
                println!("Status: ERROR");
                println!("{}", message);
            }
        },
    }
    outcome.plan().is_some()
}

fn check<F: Formulation>(formulation: &F, file: &Path) -> bool {
    match formulation.build() {
        Ok(model) => {
            println!("✓ {} is valid", file.display());
            println!("  model {}", model.name());
            println!(
                "  {} variables ({})",
                model.num_variables(),
                if model.is_mixed_integer() {
                    "mixed integer"
                } else {
                    "continuous"
                }
            );
            println!("  {} constraints", model.num_constraints());
            true
        }
        Err(e) => {
            eprintln!("✗ {} has errors:", file.display());
            eprintln!("  {}", e);
            false
        }
    }
}

fn load(file: &Path) -> Option<Scenario> {
    let source = match std::fs::read_to_string(file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error reading file: {}", e);
            return None;
        }
    };
    match serde_json::from_str(&source) {
        Ok(scenario) => Some(scenario),
        Err(e) => {
            eprintln!("Error parsing scenario: {}", e);
            None
        }
    }
}

/// Non-default backends fall back to MicroLP once if they fault.
fn make_solver(name: &str, time_limit: Option<f64>) -> Result<Box<dyn Solver>, SolveError> {
    let backend: Backend = name.parse()?;
    let primary = create_solver(backend, time_limit);
    if backend == Backend::MicroLp {
        return Ok(primary);
    }
    Ok(Box::new(WithFallback::new(
        primary,
        create_solver(Backend::MicroLp, time_limit),
    )))
}

fn main() {
    dotenv().ok();
    env_logger::init();
    let cli = Cli::parse();

    let ok = match cli.command {
        Commands::Solve {
            file,
            format,
            solver,
            time_limit,
        } => {
            let solver = match make_solver(&solver, time_limit) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            };
            info!("using solver {}", solver.name());
            match load(&file) {
                Some(scenario) => scenario.solve(solver.as_ref(), format),
                None => false,
            }
        }
        Commands::Check { file } => match load(&file) {
            Some(scenario) => scenario.check(&file),
            None => false,
        },
    };

    debug!("exiting with success = {}", ok);
    if !ok {
        std::process::exit(1);
    }
}

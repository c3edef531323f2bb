//! Hospital waiting-list models. All decision variables are integer or binary.

use std::collections::BTreeMap;

use resalloc_solver::objective::{unmet_demand, DemandGroup};
use resalloc_solver::{
    BuildError, EntitySet, LinearExpr, Model, ModelBuilder, ParamGrid, ParamTable, Solution,
    VarDomain, VarId,
};

use crate::{Formulation, PlanError};

fn non_negative_scalar(name: &str, value: f64) -> Result<f64, BuildError> {
    if !value.is_finite() || value < 0.0 {
        return Err(BuildError::InvalidParameter {
            table: name.to_string(),
            key: "*".to_string(),
            value,
        });
    }
    Ok(value)
}

/// Patients of one specialty admitted in one week.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AdmissionVar {
    pub specialty: String,
    pub week: String,
}

impl AdmissionVar {
    pub fn new(specialty: &str, week: &str) -> Self {
        Self {
            specialty: specialty.to_string(),
            week: week.to_string(),
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SpecialtyAdmissions {
    pub specialty: String,
    /// Admissions per week, in the order of `AdmissionPlan::weeks`
    pub per_week: Vec<i64>,
    pub admitted: i64,
    pub unserved: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AdmissionPlan {
    pub weeks: Vec<String>,
    pub specialties: Vec<SpecialtyAdmissions>,
    /// Resources consumed per week
    pub resource_use: Vec<f64>,
    /// Priority-weighted unserved patients
    pub objective: f64,
}

impl AdmissionPlan {
    pub fn specialty(&self, id: &str) -> Option<&SpecialtyAdmissions> {
        self.specialties.iter().find(|s| s.specialty == id)
    }
}

/// Weekly admissions per specialty against capacity and a shared resource budget.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyAdmissions {
    pub specialties: Vec<String>,
    pub weeks: Vec<String>,
    pub priority: BTreeMap<String, f64>,
    /// Patients on the waiting list, per specialty
    pub waiting: BTreeMap<String, f64>,
    /// Admission capacity, specialty -> week
    pub capacity: BTreeMap<String, BTreeMap<String, f64>>,
    pub resources_per_patient: BTreeMap<String, f64>,
    /// Resources available, per week
    pub resources_available: BTreeMap<String, f64>,
}

impl Formulation for WeeklyAdmissions {
    type Key = AdmissionVar;
    type Plan = AdmissionPlan;

    fn build(&self) -> Result<Model<AdmissionVar>, BuildError> {
        let specialties = EntitySet::new("specialties", &self.specialties)?;
        let weeks = EntitySet::new("weeks", &self.weeks)?;
        let priority = ParamTable::new("priority", &self.priority);
        let waiting = ParamTable::new("waiting", &self.waiting);
        let capacity = ParamGrid::new("capacity", &self.capacity);
        let per_patient = ParamTable::new("resources_per_patient", &self.resources_per_patient);
        let available = ParamTable::new("resources_available", &self.resources_available);

        let mut b = ModelBuilder::new("weekly_admissions");
        let mut groups = Vec::with_capacity(specialties.len());
        let mut usage: Vec<Vec<(VarId, f64)>> = vec![Vec::new(); weeks.len()];

        for s in specialties.iter() {
            let demand = waiting.non_negative(s)?;
            let resources = per_patient.non_negative(s)?;
            let mut admitted = Vec::with_capacity(weeks.len());
            for (j, w) in weeks.iter().enumerate() {
                let x = b.declare(AdmissionVar::new(s, w), VarDomain::Integer)?;
                b.upper_bound(format!("capacity_{}_{}", s, w), x, capacity.non_negative(s, w)?)?;
                usage[j].push((x, resources));
                admitted.push(x);
            }
            b.cap(format!("waiting_{}", s), admitted.iter().copied(), demand)?;
            groups.push(DemandGroup {
                weight: priority.non_negative(s)?,
                demand,
                fulfilled_by: admitted,
            });
        }

        for (w, terms) in weeks.iter().zip(usage) {
            b.weighted_cap(format!("resources_{}", w), terms, available.non_negative(w)?)?;
        }

        b.minimize(unmet_demand(groups))?;
        b.build()
    }

    fn extract(&self, solution: &Solution<'_, AdmissionVar>) -> Result<AdmissionPlan, PlanError> {
        let waiting = ParamTable::new("waiting", &self.waiting);
        let per_patient = ParamTable::new("resources_per_patient", &self.resources_per_patient);
        let mut resource_use = vec![0.0; self.weeks.len()];
        let mut specialties = Vec::with_capacity(self.specialties.len());

        for s in &self.specialties {
            let resources = per_patient.get(s)?;
            let mut per_week = Vec::with_capacity(self.weeks.len());
            for (j, w) in self.weeks.iter().enumerate() {
                let n = solution.integer(&AdmissionVar::new(s, w))?;
                resource_use[j] += resources * n as f64;
                per_week.push(n);
            }
            let admitted: i64 = per_week.iter().sum();
            specialties.push(SpecialtyAdmissions {
                specialty: s.clone(),
                per_week,
                admitted,
                unserved: waiting.get(s)? - admitted as f64,
            });
        }

        Ok(AdmissionPlan {
            weeks: self.weeks.clone(),
            specialties,
            resource_use,
            objective: solution.objective_value()?,
        })
    }
}

/// Patient attended on a given day.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScheduleVar {
    pub patient: String,
    pub day: String,
}

impl ScheduleVar {
    pub fn new(patient: &str, day: &str) -> Self {
        Self {
            patient: patient.to_string(),
            day: day.to_string(),
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub patient: String,
    pub day: String,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct DayLoad {
    pub day: String,
    pub patients: usize,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulePlan {
    pub assignments: Vec<Assignment>,
    pub load: Vec<DayLoad>,
    /// Sum of day ranks over all patients
    pub objective: f64,
}

impl SchedulePlan {
    pub fn day_of(&self, patient: &str) -> Option<&str> {
        self.assignments
            .iter()
            .find(|a| a.patient == patient)
            .map(|a| a.day.as_str())
    }
}

/// Assign every patient to exactly one day, earliest first, urgent patients within a window.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct DailySchedule {
    pub patients: Vec<String>,
    /// Planning horizon in order; a day's rank is its position plus one
    pub days: Vec<String>,
    pub daily_capacity: f64,
    pub urgent: Vec<String>,
    /// Urgent patients must be seen within this many first days
    pub urgent_within: usize,
}

impl Formulation for DailySchedule {
    type Key = ScheduleVar;
    type Plan = SchedulePlan;

    fn build(&self) -> Result<Model<ScheduleVar>, BuildError> {
        let patients = EntitySet::new("patients", &self.patients)?;
        let days = EntitySet::new("days", &self.days)?;
        let urgent = EntitySet::new("urgent", &self.urgent)?;
        let capacity = non_negative_scalar("daily_capacity", self.daily_capacity)?;
        if self.urgent_within == 0 || self.urgent_within > days.len() {
            return Err(BuildError::InvalidParameter {
                table: "urgent_within".to_string(),
                key: "*".to_string(),
                value: self.urgent_within as f64,
            });
        }

        let mut b = ModelBuilder::new("daily_schedule");
        let mut waiting = LinearExpr::new();
        let mut per_day: Vec<Vec<VarId>> = vec![Vec::new(); days.len()];

        for p in patients.iter() {
            let mut options = Vec::with_capacity(days.len());
            for (j, d) in days.iter().enumerate() {
                let x = b.declare(ScheduleVar::new(p, d), VarDomain::Binary)?;
                waiting.add_term(x, (j + 1) as f64);
                per_day[j].push(x);
                options.push(x);
            }
            b.exactly_one(format!("assign_{}", p), options)?;
        }

        for (d, vars) in days.iter().zip(per_day) {
            b.cap(format!("capacity_{}", d), vars, capacity)?;
        }

        for p in urgent.iter() {
            if patients.position(p).is_none() {
                return Err(BuildError::MissingParameter {
                    table: "patients".to_string(),
                    key: p.to_string(),
                });
            }
            let window = days
                .iter()
                .take(self.urgent_within)
                .map(|d| b.lookup(&ScheduleVar::new(p, d)))
                .collect::<Result<Vec<_>, _>>()?;
            b.within(format!("urgent_{}", p), window, 1.0)?;
        }

        b.minimize(waiting)?;
        b.build()
    }

    fn extract(&self, solution: &Solution<'_, ScheduleVar>) -> Result<SchedulePlan, PlanError> {
        let mut load: Vec<DayLoad> = self
            .days
            .iter()
            .map(|d| DayLoad {
                day: d.clone(),
                patients: 0,
            })
            .collect();
        let mut assignments = Vec::with_capacity(self.patients.len());

        for p in &self.patients {
            let mut chosen = Vec::new();
            for (j, d) in self.days.iter().enumerate() {
                if solution.is_selected(&ScheduleVar::new(p, d))? {
                    chosen.push(j);
                }
            }
            let j = match chosen[..] {
                [j] => j,
                _ => {
                    return Err(PlanError::Inconsistent(format!(
                        "{} assigned to {} days",
                        p,
                        chosen.len()
                    )));
                }
            };
            load[j].patients += 1;
            assignments.push(Assignment {
                patient: p.clone(),
                day: self.days[j].clone(),
            });
        }

        Ok(SchedulePlan {
            assignments,
            load,
            objective: solution.objective_value()?,
        })
    }
}

/// Whether a patient is attended this period.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SelectionVar(pub String);

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionPlan {
    pub selected: Vec<String>,
    pub unselected: Vec<String>,
    pub hours_used: f64,
    /// Total priority of selected patients
    pub objective: f64,
}

/// Pick the patients to attend within the available medical hours, highest total priority.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct PatientSelection {
    pub patients: Vec<String>,
    /// Hours needed, per patient
    pub hours: BTreeMap<String, f64>,
    pub priority: BTreeMap<String, f64>,
    pub available_hours: f64,
}

impl Formulation for PatientSelection {
    type Key = SelectionVar;
    type Plan = SelectionPlan;

    fn build(&self) -> Result<Model<SelectionVar>, BuildError> {
        let patients = EntitySet::new("patients", &self.patients)?;
        let hours = ParamTable::new("hours", &self.hours);
        let priority = ParamTable::new("priority", &self.priority);
        let available = non_negative_scalar("available_hours", self.available_hours)?;

        let mut b = ModelBuilder::new("patient_selection");
        let mut time = Vec::with_capacity(patients.len());
        let mut value = Vec::with_capacity(patients.len());
        for p in patients.iter() {
            let x = b.declare(SelectionVar(p.to_string()), VarDomain::Binary)?;
            time.push((x, hours.non_negative(p)?));
            value.push((x, priority.get(p)?));
        }

        b.weighted_cap("hours", time, available)?;
        b.maximize(LinearExpr::weighted(value))?;
        b.build()
    }

    fn extract(&self, solution: &Solution<'_, SelectionVar>) -> Result<SelectionPlan, PlanError> {
        let hours = ParamTable::new("hours", &self.hours);
        let mut plan = SelectionPlan {
            selected: Vec::new(),
            unselected: Vec::new(),
            hours_used: 0.0,
            objective: solution.objective_value()?,
        };
        for p in &self.patients {
            if solution.is_selected(&SelectionVar(p.clone()))? {
                plan.hours_used += hours.get(p)?;
                plan.selected.push(p.clone());
            } else {
                plan.unselected.push(p.clone());
            }
        }
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{solve_formulation, Outcome};
    use resalloc_solver::{create_solver, Backend};

    fn table(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
        entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn names(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn admissions_example() -> WeeklyAdmissions {
        let weeks = ["w1", "w2", "w3", "w4"];
        let row = |values: [f64; 4]| -> BTreeMap<String, f64> {
            weeks.iter().map(|w| w.to_string()).zip(values).collect()
        };
        let mut capacity = BTreeMap::new();
        capacity.insert("cardiology".to_string(), row([5.0, 6.0, 4.0, 5.0]));
        capacity.insert("neurology".to_string(), row([4.0, 3.0, 5.0, 2.0]));
        capacity.insert("orthopedics".to_string(), row([6.0, 5.0, 7.0, 6.0]));

        WeeklyAdmissions {
            specialties: names(&["cardiology", "neurology", "orthopedics"]),
            weeks: names(&weeks),
            priority: table(&[("cardiology", 5.0), ("neurology", 3.0), ("orthopedics", 4.0)]),
            waiting: table(&[("cardiology", 20.0), ("neurology", 15.0), ("orthopedics", 25.0)]),
            capacity,
            resources_per_patient: table(&[
                ("cardiology", 2.0),
                ("neurology", 3.0),
                ("orthopedics", 1.0),
            ]),
            resources_available: row([30.0, 25.0, 35.0, 40.0]),
        }
    }

    #[test]
    fn test_weekly_admissions() {
        // Week 2 is one resource short; dropping one neurology patient is cheapest.
        let solver = create_solver(Backend::MicroLp, None);
        let outcome = solve_formulation(&admissions_example(), solver.as_ref()).unwrap();
        let plan = outcome.plan().unwrap();

        assert!((plan.objective - 10.0).abs() < 1e-6, "objective = {}", plan.objective);
        assert_eq!(plan.specialty("cardiology").unwrap().admitted, 20);
        assert_eq!(plan.specialty("neurology").unwrap().admitted, 13);
        assert_eq!(plan.specialty("orthopedics").unwrap().admitted, 24);
        assert!(plan.resource_use[1] <= 25.0);
    }

    #[test]
    fn test_weekly_admissions_model_is_integer() {
        let model = admissions_example().build().unwrap();
        assert!(model.is_mixed_integer());
        assert_eq!(model.num_variables(), 12);
        // 12 capacities + 3 waiting lists + 4 resource rows
        assert_eq!(model.num_constraints(), 19);
        assert_eq!(model.objective().expr.constant_value(), 5.0 * 20.0 + 3.0 * 15.0 + 4.0 * 25.0);
    }

    #[test]
    fn test_missing_capacity_cell() {
        let mut f = admissions_example();
        if let Some(row) = f.capacity.get_mut("neurology") {
            row.remove("w3");
        }
        assert_eq!(
            f.build().unwrap_err(),
            BuildError::MissingParameter {
                table: "capacity".to_string(),
                key: "neurology, w3".to_string()
            }
        );
    }

    fn schedule_example() -> DailySchedule {
        DailySchedule {
            patients: (1..=10).map(|i| format!("p{}", i)).collect(),
            days: names(&["mon", "tue", "wed"]),
            daily_capacity: 4.0,
            urgent: names(&["p9", "p10"]),
            urgent_within: 1,
        }
    }

    #[test]
    fn test_daily_schedule() {
        let f = schedule_example();
        let solver = create_solver(Backend::MicroLp, None);
        let outcome = solve_formulation(&f, solver.as_ref()).unwrap();
        let plan = outcome.plan().unwrap();

        // 4 on day 1, 4 on day 2, 2 on day 3
        assert!((plan.objective - 18.0).abs() < 1e-6);
        assert_eq!(plan.assignments.len(), 10);
        assert_eq!(plan.day_of("p9"), Some("mon"));
        assert_eq!(plan.day_of("p10"), Some("mon"));
        let loads: Vec<usize> = plan.load.iter().map(|l| l.patients).collect();
        assert_eq!(loads, vec![4, 4, 2]);
    }

    #[test]
    fn test_every_patient_gets_exactly_one_day() {
        let f = schedule_example();
        let model = f.build().unwrap();
        let outcome = create_solver(Backend::MicroLp, None)
            .solve(model.problem())
            .unwrap();
        let solution = model.interpret(outcome).unwrap();
        for p in &f.patients {
            let assigned: f64 = f
                .days
                .iter()
                .map(|d| solution.value(&ScheduleVar::new(p, d)).unwrap())
                .sum();
            assert_eq!(assigned, 1.0, "{} is assigned {} times", p, assigned);
        }
    }

    #[test]
    fn test_daily_schedule_over_capacity_is_infeasible() {
        let mut f = schedule_example();
        f.daily_capacity = 3.0;
        let solver = create_solver(Backend::MicroLp, None);
        assert_eq!(
            solve_formulation(&f, solver.as_ref()).unwrap(),
            Outcome::Infeasible
        );
    }

    #[test]
    fn test_unknown_urgent_patient() {
        let mut f = schedule_example();
        f.urgent.push("p11".to_string());
        assert!(matches!(
            f.build(),
            Err(BuildError::MissingParameter { .. })
        ));
    }

    #[test]
    fn test_urgent_window_out_of_range() {
        let mut f = schedule_example();
        f.urgent_within = 4;
        assert!(matches!(
            f.build(),
            Err(BuildError::InvalidParameter { .. })
        ));
    }

    fn selection_example(available_hours: f64) -> PatientSelection {
        PatientSelection {
            patients: names(&["P1", "P2", "P3", "P4", "P5"]),
            hours: table(&[("P1", 5.0), ("P2", 8.0), ("P3", 6.0), ("P4", 4.0), ("P5", 7.0)]),
            priority: table(&[("P1", 3.0), ("P2", 5.0), ("P3", 2.0), ("P4", 4.0), ("P5", 1.0)]),
            available_hours,
        }
    }

    #[test]
    fn test_patient_selection_tight_hours() {
        let solver = create_solver(Backend::MicroLp, None);
        let outcome = solve_formulation(&selection_example(20.0), solver.as_ref()).unwrap();
        let plan = outcome.plan().unwrap();
        assert!((plan.objective - 12.0).abs() < 1e-6);
        assert_eq!(plan.selected, names(&["P1", "P2", "P4"]));
        assert_eq!(plan.hours_used, 17.0);
    }

    #[test]
    fn test_patient_selection_everyone_fits() {
        let solver = create_solver(Backend::MicroLp, None);
        let outcome = solve_formulation(&selection_example(40.0), solver.as_ref()).unwrap();
        let plan = outcome.plan().unwrap();
        assert!((plan.objective - 15.0).abs() < 1e-6);
        assert!(plan.unselected.is_empty());
    }

    #[test]
    fn test_negative_hours_rejected() {
        assert!(matches!(
            selection_example(-1.0).build(),
            Err(BuildError::InvalidParameter { .. })
        ));
    }
}

//! Municipal waste-reduction funding models.
//!
//! All three are continuous LPs over funds `x[a, m]` assigned to activity `a` in
//! municipality `m`.

use std::collections::BTreeMap;

use resalloc_solver::objective::benefit_minus_penalty;
use resalloc_solver::{
    BuildError, EntitySet, LinearExpr, Model, ModelBuilder, ParamGrid, ParamTable, Solution,
    VarDomain,
};

use crate::{Formulation, PlanError};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WasteVar {
    /// Funds for an activity in a municipality
    Funds {
        activity: String,
        municipality: String,
    },
    /// Tons of waste avoided in a municipality
    Reduction(String),
    /// |funds[first] - funds[second]| within a municipality
    Imbalance {
        first: String,
        second: String,
        municipality: String,
    },
}

impl WasteVar {
    pub fn funds(activity: &str, municipality: &str) -> Self {
        WasteVar::Funds {
            activity: activity.to_string(),
            municipality: municipality.to_string(),
        }
    }

    pub fn reduction(municipality: &str) -> Self {
        WasteVar::Reduction(municipality.to_string())
    }

    pub fn imbalance(first: &str, second: &str, municipality: &str) -> Self {
        WasteVar::Imbalance {
            first: first.to_string(),
            second: second.to_string(),
            municipality: municipality.to_string(),
        }
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub activity: String,
    pub amount: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct MunicipalityPlan {
    pub municipality: String,
    pub funds: Vec<Allocation>,
    /// Tons avoided
    pub reduction: f64,
    /// Avoided share of generated waste, in percent
    pub reduction_pct: f64,
    /// Tons left after the reduction
    pub residual: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct WastePlan {
    pub municipalities: Vec<MunicipalityPlan>,
    /// Total residual waste
    pub objective: f64,
}

impl WastePlan {
    pub fn total_residual(&self) -> f64 {
        self.municipalities.iter().map(|m| m.residual).sum()
    }

    pub fn municipality(&self, id: &str) -> Option<&MunicipalityPlan> {
        self.municipalities.iter().find(|m| m.municipality == id)
    }
}

impl MunicipalityPlan {
    pub fn funds_for(&self, activity: &str) -> Option<f64> {
        self.funds
            .iter()
            .find(|a| a.activity == activity)
            .map(|a| a.amount)
    }

    pub fn total_funds(&self) -> f64 {
        self.funds.iter().map(|a| a.amount).sum()
    }
}

fn allocations(
    solution: &Solution<'_, WasteVar>,
    activities: &[String],
    municipality: &str,
) -> Result<Vec<Allocation>, PlanError> {
    activities
        .iter()
        .map(|a| {
            Ok(Allocation {
                activity: a.clone(),
                amount: solution.value(&WasteVar::funds(a, municipality))?,
            })
        })
        .collect()
}

fn municipality_plan(
    municipality: &str,
    funds: Vec<Allocation>,
    generated: f64,
    reduction: f64,
) -> MunicipalityPlan {
    MunicipalityPlan {
        municipality: municipality.to_string(),
        funds,
        reduction,
        reduction_pct: if generated > 0.0 {
            reduction / generated * 100.0
        } else {
            0.0
        },
        residual: generated - reduction,
    }
}

/// Minimize residual waste.
///
/// Each activity has an impact (tons avoided per unit of cost) and a minimum cost that is
/// also the minimum amount every municipality must fund it with.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct WasteReduction {
    pub municipalities: Vec<String>,
    pub activities: Vec<String>,
    /// Yearly tons generated, per municipality
    pub waste: BTreeMap<String, f64>,
    /// Available funds, per municipality
    pub budget: BTreeMap<String, f64>,
    /// Tons avoided per cost unit, per activity
    pub impact: BTreeMap<String, f64>,
    /// Minimum cost, per activity
    pub cost: BTreeMap<String, f64>,
}

impl Formulation for WasteReduction {
    type Key = WasteVar;
    type Plan = WastePlan;

    fn build(&self) -> Result<Model<WasteVar>, BuildError> {
        let municipalities = EntitySet::new("municipalities", &self.municipalities)?;
        let activities = EntitySet::new("activities", &self.activities)?;
        let waste = ParamTable::new("waste", &self.waste);
        let budget = ParamTable::new("budget", &self.budget);
        let impact = ParamTable::new("impact", &self.impact);
        let cost = ParamTable::new("cost", &self.cost);

        let mut b = ModelBuilder::new("waste_reduction");
        let mut residual = LinearExpr::new();

        for m in municipalities.iter() {
            let generated = waste.non_negative(m)?;
            let y = b.declare(WasteVar::reduction(m), VarDomain::Continuous)?;
            residual.add_constant(generated);
            residual.add_term(y, -1.0);

            let mut funds = Vec::with_capacity(activities.len());
            let mut avoided = LinearExpr::new();
            for a in activities.iter() {
                let x = b.declare(WasteVar::funds(a, m), VarDomain::Continuous)?;
                let minimum = cost.non_negative(a)?;
                avoided.add_term(x, impact.get(a)? / cost.divisor(a)?);
                b.minimum(format!("min_funds_{}_{}", a, m), x, minimum)?;
                funds.push(x);
            }

            b.link(format!("reduction_{}", m), y, avoided)?;
            b.cap(format!("budget_{}", m), funds, budget.non_negative(m)?)?;
            b.upper_bound(format!("reduction_limit_{}", m), y, generated)?;
        }

        b.minimize(residual)?;
        b.build()
    }

    fn extract(&self, solution: &Solution<'_, WasteVar>) -> Result<WastePlan, PlanError> {
        let waste = ParamTable::new("waste", &self.waste);
        let municipalities = self
            .municipalities
            .iter()
            .map(|m| {
                let reduction = solution.value(&WasteVar::reduction(m))?;
                let funds = allocations(solution, &self.activities, m)?;
                Ok(municipality_plan(m, funds, waste.get(m)?, reduction))
            })
            .collect::<Result<Vec<_>, PlanError>>()?;

        Ok(WastePlan {
            municipalities,
            objective: solution.objective_value()?,
        })
    }
}

/// Minimize residual waste when each activity's impact is a percentage reduction that
/// differs per municipality.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct PercentReduction {
    pub municipalities: Vec<String>,
    pub activities: Vec<String>,
    pub waste: BTreeMap<String, f64>,
    pub budget: BTreeMap<String, f64>,
    /// Percentage points of reduction per unit of funds, activity -> municipality
    pub impact: BTreeMap<String, BTreeMap<String, f64>>,
    /// Funding cap, activity -> municipality
    pub max_funds: BTreeMap<String, BTreeMap<String, f64>>,
    /// Highest reachable reduction in percent, per municipality
    pub max_reduction_pct: BTreeMap<String, f64>,
}

impl Formulation for PercentReduction {
    type Key = WasteVar;
    type Plan = WastePlan;

    fn build(&self) -> Result<Model<WasteVar>, BuildError> {
        let municipalities = EntitySet::new("municipalities", &self.municipalities)?;
        let activities = EntitySet::new("activities", &self.activities)?;
        let waste = ParamTable::new("waste", &self.waste);
        let budget = ParamTable::new("budget", &self.budget);
        let impact = ParamGrid::new("impact", &self.impact);
        let max_funds = ParamGrid::new("max_funds", &self.max_funds);
        let max_pct = ParamTable::new("max_reduction_pct", &self.max_reduction_pct);

        let mut b = ModelBuilder::new("percent_reduction");
        let mut residual = LinearExpr::new();

        for m in municipalities.iter() {
            let generated = waste.non_negative(m)?;
            residual.add_constant(generated);

            let mut funds = Vec::with_capacity(activities.len());
            let mut pct = Vec::with_capacity(activities.len());
            for a in activities.iter() {
                let x = b.declare(WasteVar::funds(a, m), VarDomain::Continuous)?;
                let points = impact.get(a, m)?;
                residual.add_term(x, -generated * points / 100.0);
                b.upper_bound(format!("max_funds_{}_{}", a, m), x, max_funds.non_negative(a, m)?)?;
                funds.push(x);
                pct.push((x, points));
            }

            b.cap(format!("budget_{}", m), funds, budget.non_negative(m)?)?;
            b.weighted_cap(format!("max_reduction_{}", m), pct, max_pct.get(m)?)?;
        }

        b.minimize(residual)?;
        b.build()
    }

    fn extract(&self, solution: &Solution<'_, WasteVar>) -> Result<WastePlan, PlanError> {
        let waste = ParamTable::new("waste", &self.waste);
        let impact = ParamGrid::new("impact", &self.impact);
        let municipalities = self
            .municipalities
            .iter()
            .map(|m| {
                let funds = allocations(solution, &self.activities, m)?;
                let mut pct = 0.0;
                for a in &funds {
                    pct += impact.get(&a.activity, m)? * a.amount;
                }
                let generated = waste.get(m)?;
                Ok(municipality_plan(m, funds, generated, generated * pct / 100.0))
            })
            .collect::<Result<Vec<_>, PlanError>>()?;

        Ok(WastePlan {
            municipalities,
            objective: solution.objective_value()?,
        })
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct MunicipalityFunds {
    pub municipality: String,
    pub funds: Vec<Allocation>,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Imbalance {
    pub municipality: String,
    pub first: String,
    pub second: String,
    pub gap: f64,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ImpactPlan {
    pub municipalities: Vec<MunicipalityFunds>,
    pub imbalances: Vec<Imbalance>,
    /// Impact-weighted funds before the imbalance penalty
    pub total_impact: f64,
    pub objective: f64,
}

/// Maximize impact-weighted funds minus the pairwise funding imbalance between activities.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct BalancedImpact {
    pub municipalities: Vec<String>,
    pub activities: Vec<String>,
    /// Impact per unit of funds, per activity
    pub impact: BTreeMap<String, f64>,
    pub budget: BTreeMap<String, f64>,
    /// Minimum funds, per activity
    pub minimum: BTreeMap<String, f64>,
}

impl BalancedImpact {
    /// Ordered activity pairs; both (a, b) and (b, a) are penalized.
    fn pairs(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.activities.iter().flat_map(move |a| {
            self.activities
                .iter()
                .filter(move |b| *b != a)
                .map(move |b| (a.as_str(), b.as_str()))
        })
    }
}

impl Formulation for BalancedImpact {
    type Key = WasteVar;
    type Plan = ImpactPlan;

    fn build(&self) -> Result<Model<WasteVar>, BuildError> {
        let municipalities = EntitySet::new("municipalities", &self.municipalities)?;
        let activities = EntitySet::new("activities", &self.activities)?;
        let impact = ParamTable::new("impact", &self.impact);
        let budget = ParamTable::new("budget", &self.budget);
        let minimum = ParamTable::new("minimum", &self.minimum);

        let mut b = ModelBuilder::new("balanced_impact");
        let mut benefit = Vec::new();
        let mut penalties = Vec::new();

        for m in municipalities.iter() {
            let mut funds = Vec::with_capacity(activities.len());
            for a in activities.iter() {
                let x = b.declare(WasteVar::funds(a, m), VarDomain::Continuous)?;
                b.minimum(format!("min_funds_{}_{}", a, m), x, minimum.non_negative(a)?)?;
                benefit.push((x, impact.get(a)?));
                funds.push(x);
            }
            b.cap(format!("budget_{}", m), funds, budget.non_negative(m)?)?;

            for (first, second) in self.pairs() {
                let d = b.declare(WasteVar::imbalance(first, second, m), VarDomain::Continuous)?;
                let x_first = b.lookup(&WasteVar::funds(first, m))?;
                let x_second = b.lookup(&WasteVar::funds(second, m))?;
                b.abs_diff(
                    format!("imbalance_{}_{}_{}", first, second, m),
                    d,
                    LinearExpr::var(x_first),
                    LinearExpr::var(x_second),
                )?;
                penalties.push(d);
            }
        }

        b.maximize(benefit_minus_penalty(benefit, penalties))?;
        b.build()
    }

    fn extract(&self, solution: &Solution<'_, WasteVar>) -> Result<ImpactPlan, PlanError> {
        let impact = ParamTable::new("impact", &self.impact);
        let mut municipalities = Vec::with_capacity(self.municipalities.len());
        let mut imbalances = Vec::new();
        let mut total_impact = 0.0;

        for m in &self.municipalities {
            let funds = allocations(solution, &self.activities, m)?;
            for a in &funds {
                total_impact += impact.get(&a.activity)? * a.amount;
            }
            municipalities.push(MunicipalityFunds {
                municipality: m.clone(),
                funds,
            });

            for (first, second) in self.pairs() {
                imbalances.push(Imbalance {
                    municipality: m.clone(),
                    first: first.to_string(),
                    second: second.to_string(),
                    gap: solution.value(&WasteVar::imbalance(first, second, m))?,
                });
            }
        }

        Ok(ImpactPlan {
            municipalities,
            imbalances,
            total_impact,
            objective: solution.objective_value()?,
        })
    }
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const MAX_AGE: u32 = 130;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SurvivalHorizon {
    #[serde(alias = "lastSurvivor", alias = "last_survivor")]
    LastSurvivor,
    #[serde(alias = "firstDeath", alias = "first_death")]
    FirstDeath,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScenarioKind {
    Baseline,
    WithConversions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Person {
    pub start_age: u32,
    pub life_expectancy: u32,
    pub social_security_monthly: f64,
    pub social_security_claim_age: u32,
}

impl Default for Person {
    fn default() -> Self {
        Self {
            start_age: 65,
            life_expectancy: 90,
            social_security_monthly: 0.0,
            social_security_claim_age: 67,
        }
    }
}

impl Person {
    pub fn age_in(&self, years_elapsed: u32) -> u32 {
        self.start_age.saturating_add(years_elapsed)
    }

    pub fn years_remaining(&self) -> u32 {
        self.life_expectancy.saturating_sub(self.start_age)
    }

    pub fn is_alive_at(&self, age: u32) -> bool {
        age <= self.life_expectancy
    }

    pub fn social_security_at(&self, age: u32) -> f64 {
        if self.is_alive_at(age) && age >= self.social_security_claim_age {
            self.social_security_monthly.max(0.0) * 12.0
        } else {
            0.0
        }
    }
}

/// One marginal band. `upper == None` marks the open-ended top bracket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxBracket {
    pub lower: f64,
    pub upper: Option<f64>,
    pub rate: f64,
}

impl TaxBracket {
    pub const fn new(lower: f64, upper: Option<f64>, rate: f64) -> Self {
        Self { lower, upper, rate }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IrmaaTier {
    pub magi_ceiling: Option<f64>,
    pub part_b_monthly: f64,
    pub part_d_surcharge_monthly: f64,
}

impl IrmaaTier {
    pub const fn new(magi_ceiling: Option<f64>, part_b_monthly: f64, part_d: f64) -> Self {
        Self {
            magi_ceiling,
            part_b_monthly,
            part_d_surcharge_monthly: part_d,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScenarioParameters {
    pub start_year: u32,
    pub primary: Person,
    pub partner: Person,
    pub traditional_start: f64,
    pub roth_start: f64,
    pub taxable_start: f64,
    pub annual_spending: f64,
    pub investment_return: f64,
    pub inflation_rate: f64,
    pub standard_deduction: f64,
    /// Share of the joint deduction kept once only one spouse is alive.
    pub survivor_deduction_factor: f64,
    pub tax_brackets: Vec<TaxBracket>,
    pub rmd_start_age: u32,
    pub rmd_divisors: BTreeMap<u32, f64>,
    pub capital_gains_rate: f64,
    pub medicare_age: u32,
    pub irmaa_tiers: Vec<IrmaaTier>,
    pub part_d_base_monthly: f64,
    pub conversion_bracket_ceiling: f64,
    pub horizon: SurvivalHorizon,
}

impl Default for ScenarioParameters {
    fn default() -> Self {
        Self {
            start_year: 2026,
            primary: Person {
                start_age: 60,
                life_expectancy: 95,
                social_security_monthly: 3_500.0,
                social_security_claim_age: 67,
            },
            partner: Person {
                start_age: 62,
                life_expectancy: 85,
                social_security_monthly: 2_000.0,
                social_security_claim_age: 67,
            },
            traditional_start: 2_300_000.0,
            roth_start: 0.0,
            taxable_start: 0.0,
            annual_spending: 100_000.0,
            investment_return: 0.07,
            inflation_rate: 0.03,
            standard_deduction: 32_300.0,
            survivor_deduction_factor: 0.7,
            tax_brackets: default_mfj_brackets(),
            rmd_start_age: 73,
            rmd_divisors: uniform_lifetime_divisors(),
            capital_gains_rate: 0.15,
            medicare_age: 65,
            irmaa_tiers: default_mfj_irmaa_tiers(),
            part_d_base_monthly: 38.99,
            conversion_bracket_ceiling: 383_900.0,
            horizon: SurvivalHorizon::LastSurvivor,
        }
    }
}

pub fn default_mfj_brackets() -> Vec<TaxBracket> {
    vec![
        TaxBracket::new(0.0, Some(23_200.0), 0.10),
        TaxBracket::new(23_200.0, Some(94_300.0), 0.12),
        TaxBracket::new(94_300.0, Some(201_050.0), 0.22),
        TaxBracket::new(201_050.0, Some(383_900.0), 0.24),
        TaxBracket::new(383_900.0, Some(487_450.0), 0.32),
        TaxBracket::new(487_450.0, Some(731_200.0), 0.35),
        TaxBracket::new(731_200.0, None, 0.37),
    ]
}

pub fn uniform_lifetime_divisors() -> BTreeMap<u32, f64> {
    [
        (73, 26.5),
        (74, 25.5),
        (75, 24.6),
        (76, 23.7),
        (77, 22.9),
        (78, 22.0),
        (79, 21.1),
        (80, 20.2),
        (81, 19.4),
        (82, 18.5),
        (83, 17.7),
        (84, 16.8),
        (85, 16.0),
        (86, 15.2),
        (87, 14.4),
        (88, 13.7),
        (89, 12.9),
        (90, 12.2),
        (91, 11.5),
        (92, 10.8),
        (93, 10.1),
        (94, 9.5),
        (95, 8.9),
    ]
    .into_iter()
    .collect()
}

pub fn default_mfj_irmaa_tiers() -> Vec<IrmaaTier> {
    vec![
        IrmaaTier::new(Some(212_000.0), 185.00, 0.0),
        IrmaaTier::new(Some(266_000.0), 259.00, 13.70),
        IrmaaTier::new(Some(334_000.0), 370.00, 35.30),
        IrmaaTier::new(Some(400_000.0), 480.90, 57.00),
        IrmaaTier::new(Some(750_000.0), 591.90, 78.60),
        IrmaaTier::new(None, 628.90, 85.80),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationOptions {
    pub roth_conversions: bool,
    pub model_taxable_account: bool,
    pub model_irmaa: bool,
}

impl SimulationOptions {
    pub fn baseline() -> Self {
        Self {
            roth_conversions: false,
            model_taxable_account: true,
            model_irmaa: true,
        }
    }

    pub fn with_conversions() -> Self {
        Self {
            roth_conversions: true,
            ..Self::baseline()
        }
    }

    pub fn kind(&self) -> ScenarioKind {
        if self.roth_conversions {
            ScenarioKind::WithConversions
        } else {
            ScenarioKind::Baseline
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccountState {
    pub traditional: f64,
    pub roth: f64,
    pub taxable: f64,
}

impl AccountState {
    pub fn opening(params: &ScenarioParameters, options: &SimulationOptions) -> Self {
        Self {
            traditional: params.traditional_start.max(0.0),
            roth: params.roth_start.max(0.0),
            taxable: if options.model_taxable_account {
                params.taxable_start.max(0.0)
            } else {
                0.0
            },
        }
    }

    pub fn total(&self) -> f64 {
        self.traditional + self.roth + self.taxable
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyRecord {
    pub year: u32,
    pub primary_age: u32,
    pub partner_age: u32,
    pub primary_alive: bool,
    pub partner_alive: bool,
    pub social_security: f64,
    pub rmd: f64,
    pub spending_need: f64,
    pub standard_deduction: f64,
    pub roth_conversion: f64,
    pub additional_withdrawal: f64,
    pub total_ira_distribution: f64,
    pub taxable_social_security: f64,
    pub taxable_income: f64,
    pub federal_tax: f64,
    pub irmaa_premium: f64,
    pub capital_gains_tax: f64,
    pub traditional_begin: f64,
    pub traditional_contribution: f64,
    pub traditional_growth: f64,
    pub traditional_withdrawal: f64,
    pub traditional_end: f64,
    pub roth_begin: f64,
    pub roth_contribution: f64,
    pub roth_growth: f64,
    pub roth_withdrawal: f64,
    pub roth_end: f64,
    pub taxable_begin: f64,
    pub taxable_growth: f64,
    pub taxable_contribution: f64,
    pub taxable_withdrawal: f64,
    pub taxable_end: f64,
    pub total_assets_end: f64,
    pub unfunded_distribution: f64,
    pub net_available: f64,
    pub surplus_deficit: f64,
    pub solver_passes: u32,
    pub solver_converged: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioRun {
    pub kind: ScenarioKind,
    pub records: Vec<YearlyRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioSummary {
    pub kind: ScenarioKind,
    pub years: usize,
    pub total_federal_tax: f64,
    pub total_capital_gains_tax: f64,
    pub total_irmaa_premiums: f64,
    pub total_lifetime_taxes: f64,
    pub total_conversions: f64,
    pub final_traditional: f64,
    pub final_roth: f64,
    pub final_taxable: f64,
    pub total_final_assets: f64,
    pub average_surplus: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    pub baseline: ScenarioRun,
    pub with_conversions: ScenarioRun,
    pub summaries: Vec<ScenarioSummary>,
    pub conversion_years: Vec<YearlyRecord>,
}

mod config;
mod engine;
mod solver;
mod summary;
mod tax;
mod types;

pub use config::{ConfigError, ConfigResult};
pub use engine::{
    RetirementFlows, TaxableFlows, roll_forward_retirement, roll_forward_taxable, run_comparison,
    run_comparison_with, run_scenario,
};
pub use solver::{
    ConversionPlan, MAX_SOLVER_PASSES, SOLVER_TOLERANCE, WithdrawalSolution, YearCashInputs,
    size_conversion, solve_withdrawal,
};
pub use summary::{CONVERSION_DETAIL_YEARS, conversion_years, summarize};
pub use tax::{
    federal_tax, household_irmaa, irmaa_premium, irmaa_tier, required_minimum_distribution,
    rmd_divisor, taxable_income, taxable_social_security,
};
pub use types::{
    AccountState, Comparison, IrmaaTier, MAX_AGE, Person, ScenarioKind, ScenarioParameters,
    ScenarioRun, ScenarioSummary, SimulationOptions, SurvivalHorizon, TaxBracket, YearlyRecord,
    default_mfj_brackets, default_mfj_irmaa_tiers, uniform_lifetime_divisors,
};

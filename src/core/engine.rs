use tracing::{debug, info, warn};

use super::solver::{YearCashInputs, size_conversion, solve_withdrawal};
use super::summary::{CONVERSION_DETAIL_YEARS, conversion_years, summarize};
use super::tax::{household_irmaa, required_minimum_distribution};
use super::types::{
    AccountState, Comparison, MAX_AGE, ScenarioParameters, ScenarioRun, SimulationOptions,
    SurvivalHorizon, YearlyRecord,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetirementFlows {
    pub traditional_growth: f64,
    pub traditional_withdrawal: f64,
    pub roth_contribution: f64,
    pub roth_growth: f64,
    pub roth_withdrawal: f64,
    pub unfunded: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TaxableFlows {
    pub growth: f64,
    pub capital_gains_tax: f64,
    pub contribution: f64,
    pub withdrawal: f64,
}

#[derive(Debug, Clone, Copy)]
struct Household {
    primary_age: u32,
    partner_age: u32,
    primary_alive: bool,
    partner_alive: bool,
}

impl Household {
    fn at(params: &ScenarioParameters, years_elapsed: u32) -> Self {
        let primary_age = params.primary.age_in(years_elapsed);
        let partner_age = params.partner.age_in(years_elapsed);
        Self {
            primary_age,
            partner_age,
            primary_alive: params.primary.is_alive_at(primary_age),
            partner_alive: params.partner.is_alive_at(partner_age),
        }
    }

    fn within_horizon(&self, horizon: SurvivalHorizon) -> bool {
        match horizon {
            SurvivalHorizon::LastSurvivor => self.primary_alive || self.partner_alive,
            SurvivalHorizon::FirstDeath => self.primary_alive && self.partner_alive,
        }
    }

    fn both_alive(&self) -> bool {
        self.primary_alive && self.partner_alive
    }

    // Oldest living spouse; also gates the conversion window.
    fn rmd_age(&self) -> u32 {
        let primary = if self.primary_alive { self.primary_age } else { 0 };
        let partner = if self.partner_alive { self.partner_age } else { 0 };
        primary.max(partner)
    }

    fn medicare_enrollees(&self, medicare_age: u32) -> u32 {
        [
            (self.primary_alive, self.primary_age),
            (self.partner_alive, self.partner_age),
        ]
        .into_iter()
        .filter(|&(alive, age)| alive && age >= medicare_age)
        .count() as u32
    }
}

pub fn run_comparison(params: &ScenarioParameters) -> Comparison {
    run_comparison_with(params, SimulationOptions::baseline())
}

pub fn run_comparison_with(params: &ScenarioParameters, modeling: SimulationOptions) -> Comparison {
    let baseline = run_scenario(
        params,
        SimulationOptions {
            roth_conversions: false,
            ..modeling
        },
    );
    let with_conversions = run_scenario(
        params,
        SimulationOptions {
            roth_conversions: true,
            ..modeling
        },
    );
    let summaries = vec![summarize(&baseline), summarize(&with_conversions)];
    let conversion_years = conversion_years(&with_conversions.records, CONVERSION_DETAIL_YEARS);

    Comparison {
        baseline,
        with_conversions,
        summaries,
        conversion_years,
    }
}

pub fn run_scenario(params: &ScenarioParameters, options: SimulationOptions) -> ScenarioRun {
    let mut accounts = AccountState::opening(params, &options);
    let mut records = Vec::new();

    let last_year = params
        .primary
        .years_remaining()
        .max(params.partner.years_remaining())
        .min(MAX_AGE);
    for years_elapsed in 0..=last_year {
        let household = Household::at(params, years_elapsed);
        if !household.within_horizon(params.horizon) {
            break;
        }
        records.push(simulate_year(
            params,
            &options,
            years_elapsed,
            household,
            &mut accounts,
        ));
    }

    info!(
        scenario = ?options.kind(),
        years = records.len(),
        final_assets = accounts.total(),
        "Scenario complete"
    );
    ScenarioRun {
        kind: options.kind(),
        records,
    }
}

fn simulate_year(
    params: &ScenarioParameters,
    options: &SimulationOptions,
    years_elapsed: u32,
    household: Household,
    accounts: &mut AccountState,
) -> YearlyRecord {
    let year = params.start_year.saturating_add(years_elapsed);
    let begin = *accounts;

    let social_security = params.primary.social_security_at(household.primary_age)
        + params.partner.social_security_at(household.partner_age);
    let rmd_age = household.rmd_age();
    let rmd = required_minimum_distribution(
        rmd_age,
        begin.traditional,
        &params.rmd_divisors,
        params.rmd_start_age,
    );
    let spending_need = inflated_spending(params, years_elapsed);
    let standard_deduction = if household.both_alive() {
        params.standard_deduction
    } else {
        params.standard_deduction * params.survivor_deduction_factor
    };

    let cash = YearCashInputs {
        social_security,
        rmd,
        spending_need,
        standard_deduction,
        brackets: &params.tax_brackets,
    };

    let conversion = if options.roth_conversions && rmd_age < params.rmd_start_age {
        size_conversion(&cash, params.conversion_bracket_ceiling, begin.traditional).conversion
    } else {
        0.0
    };

    let solution = solve_withdrawal(&cash, conversion);
    if !solution.converged {
        warn!(
            year,
            passes = solution.passes,
            additional_withdrawal = solution.additional_withdrawal,
            "Withdrawal solve hit the pass cap; keeping last estimate"
        );
    }

    let total_distribution = rmd + conversion + solution.additional_withdrawal;
    let irmaa = if options.model_irmaa {
        household_irmaa(
            household.medicare_enrollees(params.medicare_age),
            total_distribution,
            &params.irmaa_tiers,
            params.part_d_base_monthly,
        )
    } else {
        0.0
    };

    let retirement = roll_forward_retirement(
        accounts,
        conversion,
        total_distribution,
        params.investment_return,
    );

    let spendable_distribution =
        (rmd + solution.additional_withdrawal - retirement.unfunded).max(0.0);
    let net_available = social_security + spendable_distribution - solution.federal_tax - irmaa;
    let surplus_deficit = net_available - spending_need;

    let taxable = if options.model_taxable_account {
        roll_forward_taxable(
            &mut accounts.taxable,
            surplus_deficit,
            params.investment_return,
            params.capital_gains_rate,
        )
    } else {
        TaxableFlows::default()
    };

    debug!(
        year,
        conversion,
        additional_withdrawal = solution.additional_withdrawal,
        federal_tax = solution.federal_tax,
        surplus_deficit,
        "Simulated year"
    );

    YearlyRecord {
        year,
        primary_age: household.primary_age,
        partner_age: household.partner_age,
        primary_alive: household.primary_alive,
        partner_alive: household.partner_alive,
        social_security,
        rmd,
        spending_need,
        standard_deduction,
        roth_conversion: conversion,
        additional_withdrawal: solution.additional_withdrawal,
        total_ira_distribution: total_distribution,
        taxable_social_security: solution.taxable_social_security,
        taxable_income: solution.taxable_income,
        federal_tax: solution.federal_tax,
        irmaa_premium: irmaa,
        capital_gains_tax: taxable.capital_gains_tax,
        traditional_begin: begin.traditional,
        traditional_contribution: 0.0,
        traditional_growth: retirement.traditional_growth,
        traditional_withdrawal: retirement.traditional_withdrawal,
        traditional_end: accounts.traditional,
        roth_begin: begin.roth,
        roth_contribution: retirement.roth_contribution,
        roth_growth: retirement.roth_growth,
        roth_withdrawal: retirement.roth_withdrawal,
        roth_end: accounts.roth,
        taxable_begin: begin.taxable,
        taxable_growth: taxable.growth,
        taxable_contribution: taxable.contribution,
        taxable_withdrawal: taxable.withdrawal,
        taxable_end: accounts.taxable,
        total_assets_end: accounts.total(),
        unfunded_distribution: retirement.unfunded,
        net_available,
        surplus_deficit,
        solver_passes: solution.passes,
        solver_converged: solution.converged,
    }
}

fn inflated_spending(params: &ScenarioParameters, years_elapsed: u32) -> f64 {
    params.annual_spending * (1.0 + params.inflation_rate).powi(years_elapsed as i32)
}

pub fn roll_forward_retirement(
    accounts: &mut AccountState,
    conversion: f64,
    total_distribution: f64,
    investment_return: f64,
) -> RetirementFlows {
    let traditional_growth = accounts.traditional * investment_return;
    let traditional_grown = (accounts.traditional + traditional_growth).max(0.0);
    let traditional_withdrawal = total_distribution.max(0.0).min(traditional_grown);
    let shortfall = total_distribution.max(0.0) - traditional_withdrawal;
    accounts.traditional = traditional_grown - traditional_withdrawal;

    let roth_contribution = conversion.max(0.0);
    let roth_base = accounts.roth + roth_contribution;
    let roth_growth = roth_base * investment_return;
    let roth_grown = (roth_base + roth_growth).max(0.0);
    let roth_withdrawal = shortfall.min(roth_grown);
    accounts.roth = roth_grown - roth_withdrawal;

    RetirementFlows {
        traditional_growth,
        traditional_withdrawal,
        roth_contribution,
        roth_growth,
        roth_withdrawal,
        unfunded: shortfall - roth_withdrawal,
    }
}

pub fn roll_forward_taxable(
    balance: &mut f64,
    surplus_deficit: f64,
    investment_return: f64,
    capital_gains_rate: f64,
) -> TaxableFlows {
    let growth = *balance * investment_return;
    let capital_gains_tax = growth.max(0.0) * capital_gains_rate;
    let after_tax = (*balance + growth - capital_gains_tax).max(0.0);

    let (contribution, withdrawal) = if surplus_deficit >= 0.0 {
        (surplus_deficit, 0.0)
    } else {
        (0.0, (-surplus_deficit).min(after_tax))
    };
    *balance = after_tax + contribution - withdrawal;

    TaxableFlows {
        growth,
        capital_gains_tax,
        contribution,
        withdrawal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::solver::SOLVER_TOLERANCE;
    use proptest::prelude::{prop_assert, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn assert_approx_tol(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    fn accounts(traditional: f64, roth: f64, taxable: f64) -> AccountState {
        AccountState {
            traditional,
            roth,
            taxable,
        }
    }

    fn assert_balances_non_negative(run: &ScenarioRun) {
        for r in &run.records {
            assert!(r.traditional_end >= 0.0, "{}: traditional {}", r.year, r.traditional_end);
            assert!(r.roth_end >= 0.0, "{}: roth {}", r.year, r.roth_end);
            assert!(r.taxable_end >= 0.0, "{}: taxable {}", r.year, r.taxable_end);
        }
    }

    #[test]
    fn traditional_grows_before_distribution() {
        let mut state = accounts(100_000.0, 0.0, 0.0);
        let flows = roll_forward_retirement(&mut state, 0.0, 20_000.0, 0.10);

        assert_approx(flows.traditional_growth, 10_000.0);
        assert_approx(flows.traditional_withdrawal, 20_000.0);
        assert_approx(state.traditional, 90_000.0);
        assert_approx(flows.roth_withdrawal, 0.0);
    }

    #[test]
    fn conversion_enters_roth_before_growth() {
        let mut state = accounts(500_000.0, 10_000.0, 0.0);
        let flows = roll_forward_retirement(&mut state, 90_000.0, 90_000.0, 0.10);

        assert_approx(flows.roth_contribution, 90_000.0);
        assert_approx(flows.roth_growth, 10_000.0);
        assert_approx(state.roth, 110_000.0);
        assert_approx(state.traditional, 460_000.0);
    }

    #[test]
    fn traditional_shortfall_falls_through_to_roth() {
        let mut state = accounts(10_000.0, 50_000.0, 0.0);
        let flows = roll_forward_retirement(&mut state, 0.0, 41_000.0, 0.0);

        assert_approx(state.traditional, 0.0);
        assert_approx(flows.traditional_withdrawal, 10_000.0);
        assert_approx(flows.roth_withdrawal, 31_000.0);
        assert_approx(state.roth, 19_000.0);
        assert_approx(flows.unfunded, 0.0);
    }

    #[test]
    fn exhausted_accounts_report_unfunded_distribution() {
        let mut state = accounts(10_000.0, 5_000.0, 0.0);
        let flows = roll_forward_retirement(&mut state, 0.0, 40_000.0, 0.0);

        assert_approx(state.traditional, 0.0);
        assert_approx(state.roth, 0.0);
        assert_approx(flows.unfunded, 25_000.0);
    }

    #[test]
    fn capital_gains_tax_applies_to_growth_only() {
        let mut balance = 100_000.0;
        let flows = roll_forward_taxable(&mut balance, 0.0, 0.10, 0.15);

        assert_approx(flows.growth, 10_000.0);
        assert_approx(flows.capital_gains_tax, 1_500.0);
        assert_approx(balance, 108_500.0);
    }

    #[test]
    fn losses_are_not_taxed() {
        let mut balance = 100_000.0;
        let flows = roll_forward_taxable(&mut balance, 0.0, -0.10, 0.15);

        assert_approx(flows.capital_gains_tax, 0.0);
        assert_approx(balance, 90_000.0);
    }

    #[test]
    fn surplus_is_banked_and_deficit_is_capped_at_balance() {
        let mut balance = 1_000.0;
        let flows = roll_forward_taxable(&mut balance, 2_500.0, 0.0, 0.15);
        assert_approx(flows.contribution, 2_500.0);
        assert_approx(balance, 3_500.0);

        let flows = roll_forward_taxable(&mut balance, -10_000.0, 0.0, 0.15);
        assert_approx(flows.withdrawal, 3_500.0);
        assert_approx(balance, 0.0);
    }

    #[test]
    fn last_survivor_horizon_runs_until_both_pass_expectancy() {
        let run = run_scenario(&ScenarioParameters::default(), SimulationOptions::baseline());

        // Primary is 60 in 2026 with expectancy 95.
        assert_eq!(run.records.len(), 36);
        assert_eq!(run.records.first().map(|r| r.year), Some(2026));
        assert_eq!(run.records.last().map(|r| r.year), Some(2061));
        for pair in run.records.windows(2) {
            assert_eq!(pair[1].year, pair[0].year + 1);
        }
    }

    #[test]
    fn first_death_horizon_stops_with_partner_expectancy() {
        let mut params = ScenarioParameters::default();
        params.horizon = SurvivalHorizon::FirstDeath;
        let run = run_scenario(&params, SimulationOptions::baseline());

        // Partner is 62 in 2026 with expectancy 85.
        assert_eq!(run.records.len(), 24);
        assert_eq!(run.records.last().map(|r| r.year), Some(2049));
        assert!(run.records.iter().all(|r| r.primary_alive && r.partner_alive));
    }

    #[test]
    fn oracle_baseline_first_year_withdraws_spending_plus_tax() {
        let run = run_scenario(&ScenarioParameters::default(), SimulationOptions::baseline());
        let first = &run.records[0];

        // 0.88 A = 95,660 in the 12% band with a 32,300 deduction.
        let expected = 95_660.0 / 0.88;
        assert_approx(first.rmd, 0.0);
        assert_approx(first.roth_conversion, 0.0);
        assert_approx(first.social_security, 0.0);
        assert_approx_tol(first.additional_withdrawal, expected, 1.0);
        assert_approx(
            first.total_ira_distribution,
            first.rmd + first.additional_withdrawal,
        );
        assert_approx_tol(first.federal_tax, expected - 100_000.0, 1.0);
        assert_approx_tol(first.net_available, 100_000.0, 1.0);
        assert_approx_tol(first.surplus_deficit, 0.0, 1.0);
        assert_approx(
            first.traditional_end,
            2_300_000.0 * 1.07 - first.total_ira_distribution,
        );
        assert!(first.solver_converged);
    }

    #[test]
    fn spending_need_inflates_each_year() {
        let run = run_scenario(&ScenarioParameters::default(), SimulationOptions::baseline());
        assert_approx(run.records[0].spending_need, 100_000.0);
        assert_approx(run.records[2].spending_need, 100_000.0 * 1.03 * 1.03);
    }

    #[test]
    fn social_security_starts_at_claim_age_and_stops_at_death() {
        let run = run_scenario(&ScenarioParameters::default(), SimulationOptions::baseline());
        let by_year = |year: u32| {
            run.records
                .iter()
                .find(|r| r.year == year)
                .map(|r| r.social_security)
                .expect("year present")
        };

        assert_approx(by_year(2030), 0.0);
        // Partner turns 67 in 2031, primary in 2033.
        assert_approx(by_year(2031), 24_000.0);
        assert_approx(by_year(2033), 66_000.0);
        // Partner is past 85 from 2050.
        assert_approx(by_year(2050), 42_000.0);
    }

    #[test]
    fn survivor_years_use_reduced_deduction() {
        let run = run_scenario(&ScenarioParameters::default(), SimulationOptions::baseline());
        for r in &run.records {
            let expected = if r.partner_alive { 32_300.0 } else { 32_300.0 * 0.7 };
            assert_approx(r.standard_deduction, expected);
        }
    }

    #[test]
    fn rmds_begin_when_oldest_living_spouse_reaches_start_age() {
        let run = run_scenario(&ScenarioParameters::default(), SimulationOptions::baseline());
        for r in &run.records {
            let oldest = [
                (r.primary_alive, r.primary_age),
                (r.partner_alive, r.partner_age),
            ]
            .into_iter()
            .filter(|(alive, _)| *alive)
            .map(|(_, age)| age)
            .max()
            .unwrap_or(0);
            if oldest < 73 {
                assert_approx(r.rmd, 0.0);
            } else if r.traditional_begin > 0.0 {
                assert!(r.rmd > 0.0, "{} should carry an RMD", r.year);
            }
        }
    }

    #[test]
    fn conversions_fill_target_agi_before_rmds() {
        let params = ScenarioParameters::default();
        let run = run_scenario(&params, SimulationOptions::with_conversions());

        let first = &run.records[0];
        assert_approx_tol(first.roth_conversion, 237_979.0, 1e-6);

        for r in &run.records {
            assert!(r.roth_conversion >= 0.0);
            let target_agi = params.conversion_bracket_ceiling + r.standard_deduction;
            let window_open = r.partner_age.max(r.primary_age) < 73;
            if !window_open {
                assert_approx(r.roth_conversion, 0.0);
                continue;
            }
            let total = r.rmd + r.roth_conversion + r.additional_withdrawal;
            assert!(total <= target_agi + SOLVER_TOLERANCE, "{}: {total}", r.year);
            let balance_sufficient = r.roth_conversion < r.traditional_begin - 1.0;
            if balance_sufficient && r.solver_converged {
                assert_approx_tol(total, target_agi, SOLVER_TOLERANCE);
            }
        }
        // Partner turns 73 in 2037.
        assert!(
            run.records
                .iter()
                .filter(|r| r.year < 2037 && r.traditional_begin > 0.0)
                .all(|r| r.roth_conversion > 0.0)
        );
    }

    #[test]
    fn conversions_move_money_into_roth_and_raise_early_taxes() {
        let comparison = run_comparison(&ScenarioParameters::default());
        let baseline = &comparison.baseline.records[0];
        let converted = &comparison.with_conversions.records[0];

        assert!(converted.federal_tax > baseline.federal_tax);
        assert!(converted.roth_end > 0.0);
        assert_approx(baseline.roth_end, 0.0);
        assert!(converted.traditional_end < baseline.traditional_end);
        assert_eq!(comparison.summaries.len(), 2);
        assert!(!comparison.conversion_years.is_empty());
    }

    #[test]
    fn conversion_is_not_counted_as_spendable_cash() {
        let run = run_scenario(
            &ScenarioParameters::default(),
            SimulationOptions::with_conversions(),
        );
        let first = &run.records[0];
        assert_approx_tol(first.surplus_deficit, 0.0, 1.0);
        assert_approx_tol(first.taxable_end, first.surplus_deficit.max(0.0), 1e-9);
    }

    #[test]
    fn irmaa_charged_per_enrollee_from_same_year_distribution() {
        let params = ScenarioParameters::default();
        let baseline = run_scenario(&params, SimulationOptions::baseline());
        let converted = run_scenario(&params, SimulationOptions::with_conversions());

        // Nobody is 65 before 2029.
        assert!(baseline.records.iter().take(3).all(|r| r.irmaa_premium == 0.0));

        // 2029: only the partner (65) is enrolled; baseline MAGI stays in the first tier.
        let base_2029 = &baseline.records[3];
        assert_eq!(base_2029.year, 2029);
        assert_approx(base_2029.irmaa_premium, 12.0 * (185.0 + 38.99));

        let conv_2029 = &converted.records[3];
        assert!(conv_2029.irmaa_premium > base_2029.irmaa_premium);
    }

    #[test]
    fn irmaa_and_taxable_account_can_be_switched_off() {
        let mut params = ScenarioParameters::default();
        params.taxable_start = 50_000.0;
        let options = SimulationOptions {
            roth_conversions: true,
            model_taxable_account: false,
            model_irmaa: false,
        };
        let run = run_scenario(&params, options);

        for r in &run.records {
            assert_eq!(r.irmaa_premium, 0.0);
            assert_eq!(r.capital_gains_tax, 0.0);
            assert_eq!(r.taxable_begin, 0.0);
            assert_eq!(r.taxable_end, 0.0);
            assert_approx(r.total_assets_end, r.traditional_end + r.roth_end);
        }
    }

    #[test]
    fn surplus_accumulates_in_taxable_account() {
        let mut params = ScenarioParameters::default();
        params.taxable_start = 100_000.0;
        let run = run_scenario(&params, SimulationOptions::baseline());

        for r in &run.records {
            let expected = (r.taxable_begin + r.taxable_growth - r.capital_gains_tax)
                + r.taxable_contribution
                - r.taxable_withdrawal;
            assert_approx_tol(r.taxable_end, expected, 1e-6);
            assert_approx_tol(r.capital_gains_tax, r.taxable_growth * 0.15, 1e-6);
        }
    }

    #[test]
    fn records_link_end_balances_to_next_beginning() {
        let run = run_scenario(
            &ScenarioParameters::default(),
            SimulationOptions::with_conversions(),
        );
        for pair in run.records.windows(2) {
            assert_eq!(pair[1].traditional_begin, pair[0].traditional_end);
            assert_eq!(pair[1].roth_begin, pair[0].roth_end);
            assert_eq!(pair[1].taxable_begin, pair[0].taxable_end);
        }
    }

    #[test]
    fn every_account_reconciles_begin_to_end() {
        let run = run_scenario(
            &ScenarioParameters::default(),
            SimulationOptions::with_conversions(),
        );
        for r in &run.records {
            assert_eq!(r.traditional_contribution, 0.0);
            assert_approx_tol(
                r.traditional_begin + r.traditional_contribution + r.traditional_growth
                    - r.traditional_withdrawal,
                r.traditional_end,
                1e-6,
            );
            assert_approx_tol(
                r.roth_begin + r.roth_contribution + r.roth_growth - r.roth_withdrawal,
                r.roth_end,
                1e-6,
            );
        }
    }

    #[test]
    fn extreme_ages_stay_bounded_without_validation() {
        let mut params = ScenarioParameters::default();
        params.primary.start_age = u32::MAX;
        params.primary.life_expectancy = u32::MAX;
        let run = run_scenario(&params, SimulationOptions::baseline());
        assert_eq!(run.records.len(), 24);
        assert!(run.records.iter().all(|r| r.primary_age == u32::MAX));

        let mut params = ScenarioParameters::default();
        params.primary.life_expectancy = 4_000_000_000;
        let run = run_scenario(&params, SimulationOptions::baseline());
        assert_eq!(run.records.len(), MAX_AGE as usize + 1);
        assert_balances_non_negative(&run);
    }

    #[test]
    fn identical_parameters_give_identical_runs() {
        let params = ScenarioParameters::default();
        assert_eq!(run_comparison(&params), run_comparison(&params));
    }

    #[test]
    fn small_balance_depletes_without_going_negative() {
        let mut params = ScenarioParameters::default();
        params.traditional_start = 150_000.0;
        params.roth_start = 20_000.0;
        let run = run_scenario(&params, SimulationOptions::baseline());

        assert_balances_non_negative(&run);
        let last = run.records.last().expect("records");
        assert_approx(last.traditional_end, 0.0);
        assert_approx(last.roth_end, 0.0);
        assert!(run.records.iter().any(|r| r.unfunded_distribution > 0.0));
        assert!(run.records.iter().any(|r| r.surplus_deficit < -1.0));
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(32))]

        #[test]
        fn prop_balances_never_go_negative(
            traditional in 0u32..4_000_000,
            roth in 0u32..500_000,
            taxable in 0u32..500_000,
            spending in 10_000u32..250_000,
            return_bp in -500i32..1200,
            inflation_bp in 0u32..600,
            primary_age in 55u32..80,
            partner_age in 55u32..80,
            conversions in proptest::bool::ANY
        ) {
            let mut params = ScenarioParameters::default();
            params.traditional_start = traditional as f64;
            params.roth_start = roth as f64;
            params.taxable_start = taxable as f64;
            params.annual_spending = spending as f64;
            params.investment_return = return_bp as f64 / 10_000.0;
            params.inflation_rate = inflation_bp as f64 / 10_000.0;
            params.primary.start_age = primary_age;
            params.partner.start_age = partner_age;

            let options = if conversions {
                SimulationOptions::with_conversions()
            } else {
                SimulationOptions::baseline()
            };
            let run = run_scenario(&params, options);
            prop_assert!(!run.records.is_empty());
            for r in &run.records {
                prop_assert!(r.traditional_end >= 0.0);
                prop_assert!(r.roth_end >= 0.0);
                prop_assert!(r.taxable_end >= 0.0);
                prop_assert!(r.roth_conversion >= 0.0);
                prop_assert!(r.roth_conversion <= r.traditional_begin + EPS);
                prop_assert!(r.additional_withdrawal >= 0.0);
                prop_assert!(r.unfunded_distribution >= 0.0);
            }
        }

        #[test]
        fn prop_retirement_roll_forward_conserves_money(
            traditional in 0u32..2_000_000,
            roth in 0u32..500_000,
            conversion_pct in 0u32..101,
            distribution_extra in 0u32..500_000,
            return_bp in 0i32..1200
        ) {
            let rate = return_bp as f64 / 10_000.0;
            let conversion = traditional as f64 * conversion_pct as f64 / 100.0;
            let distribution = conversion + distribution_extra as f64;
            let mut state = accounts(traditional as f64, roth as f64, 0.0);
            let before = (traditional as f64 + roth as f64) * (1.0 + rate)
                + conversion * rate;

            let flows = roll_forward_retirement(&mut state, conversion, distribution, rate);
            let paid_out = distribution - conversion - flows.unfunded;
            prop_assert!(state.traditional >= 0.0);
            prop_assert!(state.roth >= 0.0);
            prop_assert!(((state.traditional + state.roth + paid_out) - before).abs() <= 1e-3);
        }
    }
}

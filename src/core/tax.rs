use std::collections::BTreeMap;

use super::types::{IrmaaTier, TaxBracket};

const SS_THRESHOLD_1: f64 = 32_000.0;
const SS_THRESHOLD_2: f64 = 44_000.0;
const SS_TIER_1_RATE: f64 = 0.5;
const SS_TIER_2_RATE: f64 = 0.85;

pub fn federal_tax(taxable_income: f64, brackets: &[TaxBracket]) -> f64 {
    let mut tax = 0.0;
    for bracket in brackets {
        let upper = bracket.upper.unwrap_or(f64::INFINITY);
        if taxable_income > bracket.lower {
            tax += (taxable_income.min(upper) - bracket.lower) * bracket.rate;
        }
        if taxable_income <= upper {
            break;
        }
    }
    tax
}

pub fn taxable_social_security(benefit: f64, agi: f64) -> f64 {
    if benefit <= 0.0 {
        return 0.0;
    }

    let provisional = agi + benefit * 0.5;
    if provisional <= SS_THRESHOLD_1 {
        return 0.0;
    }
    if provisional <= SS_THRESHOLD_2 {
        return (benefit * SS_TIER_1_RATE).min((provisional - SS_THRESHOLD_1) * SS_TIER_1_RATE);
    }

    let first_tier =
        (benefit * SS_TIER_1_RATE).min((SS_THRESHOLD_2 - SS_THRESHOLD_1) * SS_TIER_1_RATE);
    let second_tier = (benefit * SS_TIER_2_RATE - first_tier)
        .min((provisional - SS_THRESHOLD_2) * SS_TIER_2_RATE);
    first_tier + second_tier
}

pub fn taxable_income(agi: f64, taxable_ss: f64, standard_deduction: f64) -> f64 {
    (agi + taxable_ss - standard_deduction).max(0.0)
}

// Ages past the table use its last divisor.
pub fn rmd_divisor(age: u32, divisors: &BTreeMap<u32, f64>) -> Option<f64> {
    divisors
        .get(&age)
        .or_else(|| divisors.values().next_back())
        .copied()
}

pub fn required_minimum_distribution(
    age: u32,
    balance: f64,
    divisors: &BTreeMap<u32, f64>,
    start_age: u32,
) -> f64 {
    if age < start_age || balance <= 0.0 {
        return 0.0;
    }
    match rmd_divisor(age, divisors) {
        Some(divisor) if divisor > 0.0 => balance / divisor,
        _ => 0.0,
    }
}

pub fn irmaa_tier(magi: f64, tiers: &[IrmaaTier]) -> Option<&IrmaaTier> {
    tiers
        .iter()
        .find(|tier| tier.magi_ceiling.is_none_or(|ceiling| magi <= ceiling))
        .or_else(|| tiers.last())
}

pub fn irmaa_premium(magi: f64, tiers: &[IrmaaTier], part_d_base_monthly: f64) -> f64 {
    irmaa_tier(magi, tiers)
        .map(|tier| {
            12.0 * (tier.part_b_monthly + part_d_base_monthly + tier.part_d_surcharge_monthly)
        })
        .unwrap_or(0.0)
}

pub fn household_irmaa(
    enrollees: u32,
    magi: f64,
    tiers: &[IrmaaTier],
    part_d_base_monthly: f64,
) -> f64 {
    if enrollees == 0 {
        return 0.0;
    }
    enrollees as f64 * irmaa_premium(magi, tiers, part_d_base_monthly)
}

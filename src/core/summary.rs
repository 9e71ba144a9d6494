use super::types::{ScenarioRun, ScenarioSummary, YearlyRecord};

pub const CONVERSION_DETAIL_YEARS: usize = 15;

pub fn summarize(run: &ScenarioRun) -> ScenarioSummary {
    let records = &run.records;
    let sum = |field: fn(&YearlyRecord) -> f64| records.iter().map(field).sum::<f64>();

    let total_federal_tax = sum(|r| r.federal_tax);
    let total_capital_gains_tax = sum(|r| r.capital_gains_tax);
    let total_irmaa_premiums = sum(|r| r.irmaa_premium);
    let average_surplus = if records.is_empty() {
        0.0
    } else {
        sum(|r| r.surplus_deficit) / records.len() as f64
    };

    let last = records.last();
    let final_traditional = last.map(|r| r.traditional_end).unwrap_or(0.0);
    let final_roth = last.map(|r| r.roth_end).unwrap_or(0.0);
    let final_taxable = last.map(|r| r.taxable_end).unwrap_or(0.0);

    ScenarioSummary {
        kind: run.kind,
        years: records.len(),
        total_federal_tax,
        total_capital_gains_tax,
        total_irmaa_premiums,
        total_lifetime_taxes: total_federal_tax + total_capital_gains_tax + total_irmaa_premiums,
        total_conversions: sum(|r| r.roth_conversion),
        final_traditional,
        final_roth,
        final_taxable,
        total_final_assets: final_traditional + final_roth + final_taxable,
        average_surplus,
    }
}

pub fn conversion_years(records: &[YearlyRecord], limit: usize) -> Vec<YearlyRecord> {
    records
        .iter()
        .filter(|r| r.roth_conversion > 0.0)
        .take(limit)
        .cloned()
        .collect()
}

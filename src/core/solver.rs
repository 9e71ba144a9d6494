use super::tax::{federal_tax, taxable_income, taxable_social_security};
use super::types::TaxBracket;

/// Withdrawal estimates closer than this (in dollars) count as converged.
pub const SOLVER_TOLERANCE: f64 = 1.0;
pub const MAX_SOLVER_PASSES: u32 = 10;

#[derive(Debug, Clone, Copy)]
pub struct YearCashInputs<'a> {
    pub social_security: f64,
    pub rmd: f64,
    pub spending_need: f64,
    pub standard_deduction: f64,
    pub brackets: &'a [TaxBracket],
}

impl YearCashInputs<'_> {
    fn cash_on_hand(&self) -> f64 {
        self.social_security + self.rmd
    }

    fn tax_at_agi(&self, agi: f64) -> TaxAtAgi {
        let taxable_ss = taxable_social_security(self.social_security, agi);
        let taxable = taxable_income(agi, taxable_ss, self.standard_deduction);
        TaxAtAgi {
            taxable_social_security: taxable_ss,
            taxable_income: taxable,
            federal_tax: federal_tax(taxable, self.brackets),
        }
    }

    fn withdrawal_needed(&self, tax: f64) -> f64 {
        (self.spending_need + tax - self.cash_on_hand()).max(0.0)
    }
}

#[derive(Debug, Clone, Copy)]
struct TaxAtAgi {
    taxable_social_security: f64,
    taxable_income: f64,
    federal_tax: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConversionPlan {
    pub target_agi: f64,
    pub tax_at_target: f64,
    pub withdrawal_for_spending: f64,
    pub conversion: f64,
}

pub fn size_conversion(
    year: &YearCashInputs<'_>,
    bracket_ceiling: f64,
    traditional_balance: f64,
) -> ConversionPlan {
    let target_agi = bracket_ceiling + year.standard_deduction;
    let tax_at_target = year.tax_at_agi(target_agi).federal_tax;
    let withdrawal_for_spending = year.withdrawal_needed(tax_at_target);
    let conversion = (target_agi - year.rmd - withdrawal_for_spending)
        .min(traditional_balance)
        .max(0.0);

    ConversionPlan {
        target_agi,
        tax_at_target,
        withdrawal_for_spending,
        conversion,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WithdrawalSolution {
    pub additional_withdrawal: f64,
    pub taxable_social_security: f64,
    pub taxable_income: f64,
    pub federal_tax: f64,
    pub passes: u32,
    pub converged: bool,
}

/// Keeps the last estimate when [`MAX_SOLVER_PASSES`] runs out.
pub fn solve_withdrawal(year: &YearCashInputs<'_>, conversion: f64) -> WithdrawalSolution {
    let mut additional = 0.0;
    let mut passes = 0;
    let mut converged = false;

    while passes < MAX_SOLVER_PASSES {
        passes += 1;
        let agi = year.rmd + conversion + additional;
        let tax = year.tax_at_agi(agi);
        let next = year.withdrawal_needed(tax.federal_tax);

        let step = (next - additional).abs();
        additional = next;
        if step < SOLVER_TOLERANCE {
            converged = true;
            break;
        }
    }

    let settled = year.tax_at_agi(year.rmd + conversion + additional);
    WithdrawalSolution {
        additional_withdrawal: additional,
        taxable_social_security: settled.taxable_social_security,
        taxable_income: settled.taxable_income,
        federal_tax: settled.federal_tax,
        passes,
        converged,
    }
}

use std::fs;
use std::path::Path;

use thiserror::Error;

use super::types::{MAX_AGE, ScenarioParameters};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid parameter JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

fn invalid<T>(msg: impl Into<String>) -> ConfigResult<T> {
    Err(ConfigError::Invalid(msg.into()))
}

impl ScenarioParameters {
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    pub fn from_json_file(path: &Path) -> ConfigResult<Self> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        for (label, person) in [("primary", &self.primary), ("partner", &self.partner)] {
            if person.life_expectancy > MAX_AGE {
                return invalid(format!("{label}.lifeExpectancy must be <= {MAX_AGE}"));
            }
            if person.life_expectancy < person.start_age {
                return invalid(format!(
                    "{label}.lifeExpectancy must be >= {label}.startAge"
                ));
            }
            if !person.social_security_monthly.is_finite() || person.social_security_monthly < 0.0
            {
                return invalid(format!("{label}.socialSecurityMonthly must be >= 0"));
            }
        }

        for (label, value) in [
            ("traditionalStart", self.traditional_start),
            ("rothStart", self.roth_start),
            ("taxableStart", self.taxable_start),
            ("annualSpending", self.annual_spending),
            ("standardDeduction", self.standard_deduction),
            ("partDBaseMonthly", self.part_d_base_monthly),
            ("conversionBracketCeiling", self.conversion_bracket_ceiling),
        ] {
            if !value.is_finite() || value < 0.0 {
                return invalid(format!("{label} must be a finite amount >= 0"));
            }
        }

        for (label, rate) in [
            ("investmentReturn", self.investment_return),
            ("inflationRate", self.inflation_rate),
        ] {
            if !rate.is_finite() || rate <= -1.0 {
                return invalid(format!("{label} must be > -1"));
            }
        }

        if !(0.0..=1.0).contains(&self.capital_gains_rate) {
            return invalid("capitalGainsRate must be between 0 and 1");
        }
        if !(0.0..=1.0).contains(&self.survivor_deduction_factor) {
            return invalid("survivorDeductionFactor must be between 0 and 1");
        }

        self.validate_brackets()?;
        self.validate_rmd_divisors()?;
        self.validate_irmaa_tiers()
    }

    fn validate_brackets(&self) -> ConfigResult<()> {
        let Some(first) = self.tax_brackets.first() else {
            return invalid("taxBrackets must not be empty");
        };
        if first.lower != 0.0 {
            return invalid("taxBrackets must start at 0");
        }

        let last_index = self.tax_brackets.len() - 1;
        for (idx, bracket) in self.tax_brackets.iter().enumerate() {
            if !(0.0..=1.0).contains(&bracket.rate) {
                return invalid(format!("taxBrackets[{idx}].rate must be between 0 and 1"));
            }
            match bracket.upper {
                None if idx != last_index => {
                    return invalid(format!(
                        "taxBrackets[{idx}] is unbounded but is not the last bracket"
                    ));
                }
                None => {}
                Some(_) if idx == last_index => {
                    return invalid("the last tax bracket must be unbounded");
                }
                Some(upper) => {
                    if upper.is_nan() || upper <= bracket.lower {
                        return invalid(format!(
                            "taxBrackets[{idx}].upper must be greater than its lower bound"
                        ));
                    }
                    if self.tax_brackets[idx + 1].lower != upper {
                        return invalid(format!(
                            "taxBrackets[{}] must start where taxBrackets[{idx}] ends",
                            idx + 1
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    fn validate_rmd_divisors(&self) -> ConfigResult<()> {
        if self.rmd_divisors.is_empty() {
            return invalid("rmdDivisors must not be empty");
        }
        if let Some((age, _)) = self
            .rmd_divisors
            .iter()
            .find(|(_, divisor)| !divisor.is_finite() || **divisor <= 0.0)
        {
            return invalid(format!("rmdDivisors[{age}] must be > 0"));
        }
        Ok(())
    }

    fn validate_irmaa_tiers(&self) -> ConfigResult<()> {
        let Some(last) = self.irmaa_tiers.last() else {
            return invalid("irmaaTiers must not be empty");
        };
        if last.magi_ceiling.is_some() {
            return invalid("the last IRMAA tier must be unbounded");
        }

        let mut previous = f64::NEG_INFINITY;
        for (idx, tier) in self.irmaa_tiers.iter().enumerate() {
            if tier.part_b_monthly < 0.0 || tier.part_d_surcharge_monthly < 0.0 {
                return invalid(format!("irmaaTiers[{idx}] premiums must be >= 0"));
            }
            match tier.magi_ceiling {
                Some(ceiling) if ceiling <= previous => {
                    return invalid("irmaaTiers ceilings must be strictly ascending");
                }
                Some(ceiling) => previous = ceiling,
                None if idx + 1 != self.irmaa_tiers.len() => {
                    return invalid(format!(
                        "irmaaTiers[{idx}] is unbounded but is not the last tier"
                    ));
                }
                None => {}
            }
        }
        Ok(())
    }
}

//! Discounted cash flow valuation
//!
//! Used by the worker for `dcf_analysis` jobs. Assumptions come either from
//! the request payload or from the analysis model.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Longest projection horizon accepted
pub const MAX_YEARS: u32 = 30;

/// DCF inputs. Rates are fractions (0.08 = 8 %).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DcfAssumptions {
    pub base_free_cash_flow: f64,
    pub growth_rate: f64,
    pub discount_rate: f64,
    pub terminal_growth_rate: f64,
    pub years: u32,
    #[serde(default)]
    pub net_debt: f64,
}

/// One projected year
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedYear {
    pub year: u32,
    pub free_cash_flow: f64,
    pub present_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DcfResult {
    pub projections: Vec<ProjectedYear>,
    pub pv_of_cash_flows: f64,
    pub terminal_value: f64,
    pub pv_of_terminal_value: f64,
    pub enterprise_value: f64,
    pub equity_value: f64,
}

impl DcfAssumptions {
    pub fn validate(&self) -> Result<()> {
        let numbers = [
            ("baseFreeCashFlow", self.base_free_cash_flow),
            ("growthRate", self.growth_rate),
            ("discountRate", self.discount_rate),
            ("terminalGrowthRate", self.terminal_growth_rate),
            ("netDebt", self.net_debt),
        ];
        for (name, value) in numbers {
            if !value.is_finite() {
                return Err(Error::InvalidInput(format!("{} must be finite", name)));
            }
        }
        if self.years == 0 || self.years > MAX_YEARS {
            return Err(Error::InvalidInput(format!(
                "years must be between 1 and {}, got {}",
                MAX_YEARS, self.years
            )));
        }
        if self.discount_rate <= -1.0 || self.growth_rate <= -1.0 {
            return Err(Error::InvalidInput(
                "discountRate and growthRate must be greater than -1".to_string(),
            ));
        }
        if self.discount_rate <= self.terminal_growth_rate {
            return Err(Error::InvalidInput(format!(
                "discountRate ({}) must exceed terminalGrowthRate ({})",
                self.discount_rate, self.terminal_growth_rate
            )));
        }
        Ok(())
    }
}

/// Run the DCF model
pub fn evaluate(a: &DcfAssumptions) -> Result<DcfResult> {
    a.validate()?;

    let mut projections = Vec::with_capacity(a.years as usize);
    let mut fcf = a.base_free_cash_flow;
    let mut discount = 1.0;
    for year in 1..=a.years {
        fcf *= 1.0 + a.growth_rate;
        discount *= 1.0 + a.discount_rate;
        projections.push(ProjectedYear {
            year,
            free_cash_flow: fcf,
            present_value: fcf / discount,
        });
    }

    let pv_of_cash_flows: f64 = projections.iter().map(|p| p.present_value).sum();
    let terminal_value =
        fcf * (1.0 + a.terminal_growth_rate) / (a.discount_rate - a.terminal_growth_rate);
    let pv_of_terminal_value = terminal_value / discount;
    let enterprise_value = pv_of_cash_flows + pv_of_terminal_value;

    // Finite inputs can still overflow over the horizon
    if !(terminal_value.is_finite() && pv_of_terminal_value.is_finite() && enterprise_value.is_finite())
        || projections.iter().any(|p| !p.present_value.is_finite())
    {
        return Err(Error::InvalidInput(
            "Assumptions produce a non-finite valuation".to_string(),
        ));
    }

    Ok(DcfResult {
        projections,
        pv_of_cash_flows,
        terminal_value,
        pv_of_terminal_value,
        enterprise_value,
        equity_value: (enterprise_value - a.net_debt).max(0.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assumptions() -> DcfAssumptions {
        DcfAssumptions {
            base_free_cash_flow: 100.0,
            growth_rate: 0.0,
            discount_rate: 0.10,
            terminal_growth_rate: 0.0,
            years: 5,
            net_debt: 0.0,
        }
    }

    #[test]
    fn test_flat_cash_flow_equals_perpetuity() {
        // Zero growth: EV of a flat perpetuity is FCF / r regardless of horizon
        let result = evaluate(&assumptions()).unwrap();
        assert!((result.enterprise_value - 1000.0).abs() < 1e-9);
        assert_eq!(result.projections.len(), 5);
        assert!((result.projections[0].present_value - 100.0 / 1.1).abs() < 1e-9);
    }

    #[test]
    fn test_growth_compounds_each_year() {
        let mut a = assumptions();
        a.growth_rate = 0.10;
        let result = evaluate(&a).unwrap();
        assert!((result.projections[0].free_cash_flow - 110.0).abs() < 1e-9);
        assert!((result.projections[1].free_cash_flow - 121.0).abs() < 1e-9);
        // With g == r each discounted flow equals the base
        assert!((result.pv_of_cash_flows - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_net_debt_reduces_equity_and_floors_at_zero() {
        let mut a = assumptions();
        a.net_debt = 400.0;
        assert!((evaluate(&a).unwrap().equity_value - 600.0).abs() < 1e-9);

        a.net_debt = 5000.0;
        assert_eq!(evaluate(&a).unwrap().equity_value, 0.0);
    }

    #[test]
    fn test_discount_rate_must_exceed_terminal_growth() {
        let mut a = assumptions();
        a.terminal_growth_rate = 0.10;
        assert!(matches!(evaluate(&a), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_years_bounds() {
        let mut a = assumptions();
        a.years = 0;
        assert!(evaluate(&a).is_err());
        a.years = MAX_YEARS + 1;
        assert!(evaluate(&a).is_err());
    }

    #[test]
    fn test_overflowing_projection_rejected() {
        let mut a = assumptions();
        a.growth_rate = 1e200;
        a.years = 3;
        assert!(matches!(evaluate(&a), Err(Error::InvalidInput(_))));

        // Overflow in the discount factor gives inf / inf = NaN
        let mut a = assumptions();
        a.growth_rate = 1e200;
        a.discount_rate = 1e200;
        a.years = 3;
        assert!(matches!(evaluate(&a), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut a = assumptions();
        a.base_free_cash_flow = f64::NAN;
        assert!(evaluate(&a).is_err());
    }
}

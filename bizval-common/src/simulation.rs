//! Valuation simulator
//!
//! Recomputes equity value from a company's current financials after applying
//! user-chosen multipliers to the underlying metrics. Pure arithmetic; the
//! function server exposes it as `simulate-valuation`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Financial inputs for a simulation
///
/// Missing numbers deserialize as 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Financials {
    pub revenue: f64,
    pub ebitda: f64,
    pub net_income: f64,
    pub book_equity: f64,
    pub net_debt: f64,
    pub revenue_multiple: f64,
    pub ebitda_multiple: f64,
    pub pe_multiple: f64,
}

/// Scaling applied to each base metric (1.0 = unchanged)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Multipliers {
    pub revenue: f64,
    pub ebitda: f64,
    pub net_income: f64,
    pub book_equity: f64,
    pub net_debt: f64,
}

impl Default for Multipliers {
    fn default() -> Self {
        Self {
            revenue: 1.0,
            ebitda: 1.0,
            net_income: 1.0,
            book_equity: 1.0,
            net_debt: 1.0,
        }
    }
}

impl Multipliers {
    fn validate(&self) -> Result<()> {
        let fields = [
            ("revenue", self.revenue),
            ("ebitda", self.ebitda),
            ("netIncome", self.net_income),
            ("bookEquity", self.book_equity),
            ("netDebt", self.net_debt),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidInput(format!(
                    "Multiplier '{}' must be a finite number >= 0, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Valuation method
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Revenue,
    Ebitda,
    Earnings,
    Book,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Revenue => "revenue",
            Method::Ebitda => "ebitda",
            Method::Earnings => "earnings",
            Method::Book => "book",
        }
    }

    /// Equity value by this method, or `None` when the method does not apply
    pub fn equity_value(&self, f: &Financials) -> Option<f64> {
        let value = match self {
            Method::Revenue => {
                if f.revenue <= 0.0 || f.revenue_multiple <= 0.0 {
                    return None;
                }
                f.revenue * f.revenue_multiple - f.net_debt
            }
            Method::Ebitda => {
                if f.ebitda <= 0.0 || f.ebitda_multiple <= 0.0 {
                    return None;
                }
                f.ebitda * f.ebitda_multiple - f.net_debt
            }
            Method::Earnings => {
                if f.net_income <= 0.0 || f.pe_multiple <= 0.0 {
                    return None;
                }
                f.net_income * f.pe_multiple
            }
            Method::Book => {
                if f.book_equity <= 0.0 {
                    return None;
                }
                f.book_equity
            }
        };

        if value.is_finite() {
            Some(value.max(0.0))
        } else {
            None
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "revenue" => Ok(Method::Revenue),
            "ebitda" => Ok(Method::Ebitda),
            "earnings" => Ok(Method::Earnings),
            "book" => Ok(Method::Book),
            other => Err(Error::InvalidInput(format!(
                "Unknown valuation method '{}' (expected revenue, ebitda, earnings or book)",
                other
            ))),
        }
    }
}

/// `simulate-valuation` request body
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRequest {
    pub current_financials: Financials,
    #[serde(default)]
    pub multipliers: Multipliers,
    #[serde(default)]
    pub selected_methods: Vec<String>,
}

/// Low/high/mid across the valid methods
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValueRange {
    pub low: f64,
    pub high: f64,
    pub mid: f64,
}

/// Difference between the simulated and baseline mid values
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValueChange {
    pub absolute: f64,
    pub percent: Option<f64>,
}

/// `simulate-valuation` response body
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub adjusted_financials: Financials,
    pub valuations: BTreeMap<String, Option<f64>>,
    pub range: Option<ValueRange>,
    pub change: Option<ValueChange>,
    pub valid_method_count: usize,
}

/// Apply multipliers to the base metrics; multiples are left as-is
pub fn adjust(current: &Financials, m: &Multipliers) -> Financials {
    Financials {
        revenue: current.revenue * m.revenue,
        ebitda: current.ebitda * m.ebitda,
        net_income: current.net_income * m.net_income,
        book_equity: current.book_equity * m.book_equity,
        net_debt: current.net_debt * m.net_debt,
        ..*current
    }
}

/// Parse and de-duplicate the requested methods, preserving first occurrence
pub fn parse_methods(names: &[String]) -> Result<Vec<Method>> {
    if names.is_empty() {
        return Err(Error::InvalidInput(
            "selectedMethods must contain at least one method".to_string(),
        ));
    }

    let mut methods = Vec::with_capacity(names.len());
    for name in names {
        let method: Method = name.trim().to_ascii_lowercase().parse()?;
        if !methods.contains(&method) {
            methods.push(method);
        }
    }
    Ok(methods)
}

fn range_of(values: &[f64]) -> Option<ValueRange> {
    if values.is_empty() {
        return None;
    }
    let low = values.iter().copied().fold(f64::INFINITY, f64::min);
    let high = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mid = values.iter().sum::<f64>() / values.len() as f64;
    Some(ValueRange { low, high, mid })
}

fn valid_values(f: &Financials, methods: &[Method]) -> Vec<f64> {
    methods.iter().filter_map(|m| m.equity_value(f)).collect()
}

/// Run a simulation
pub fn simulate(request: &SimulationRequest) -> Result<SimulationResult> {
    request.multipliers.validate()?;
    let methods = parse_methods(&request.selected_methods)?;

    let adjusted = adjust(&request.current_financials, &request.multipliers);

    let valuations: BTreeMap<String, Option<f64>> = methods
        .iter()
        .map(|m| (m.as_str().to_string(), m.equity_value(&adjusted)))
        .collect();

    let adjusted_values = valid_values(&adjusted, &methods);
    let range = range_of(&adjusted_values);

    let baseline = range_of(&valid_values(&request.current_financials, &methods));
    let change = match (range, baseline) {
        (Some(now), Some(base)) => {
            let absolute = now.mid - base.mid;
            let percent = if base.mid == 0.0 {
                None
            } else {
                Some(absolute / base.mid * 100.0)
            };
            Some(ValueChange { absolute, percent })
        }
        _ => None,
    };

    Ok(SimulationResult {
        adjusted_financials: adjusted,
        valuations,
        range,
        change,
        valid_method_count: adjusted_values.len(),
    })
}

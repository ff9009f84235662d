//! Standalone what-if estimator carried over from the product's loan
//! calculator page. Uses amortized (compounding) EMI math plus fee add-ons,
//! and deliberately shares nothing with the canonical schedule attached at
//! approval time.

use serde::{Deserialize, Serialize};

use super::domain::LoanCategory;

/// Flat add-on applied when the requester opts into insurance.
pub const FLAT_INSURANCE_CHARGE: f64 = 500.0;

const DEFAULT_PROCESSING_FEE_PERCENT: f64 = 1.0;
const AFFORDABILITY_EMI_SHARE: f64 = 0.5;

/// Calculator input. The rate falls back to the category's fixed annual
/// rate when no explicit override is given.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QuoteRequest {
    pub principal: f64,
    pub term_months: u32,
    #[serde(default)]
    pub category: Option<LoanCategory>,
    #[serde(default)]
    pub annual_rate_percent: Option<f64>,
    #[serde(default)]
    pub processing_fee_percent: Option<f64>,
    #[serde(default)]
    pub include_insurance: bool,
    #[serde(default)]
    pub monthly_income: Option<f64>,
}

/// Quote output mirroring the calculator's summary card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoanQuote {
    pub monthly_emi: f64,
    pub total_interest: f64,
    pub total_payment: f64,
    pub processing_fee: f64,
    pub insurance_charge: f64,
    pub total_with_fees: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affordable: Option<bool>,
}

/// Price a scenario without touching any stored record.
///
/// Degenerate input (zero or negative principal, zero term, zero rate with
/// no category to fall back on) produces an all-zero quote rather than an
/// error, matching how the calculator page behaved.
pub fn quote(request: &QuoteRequest) -> LoanQuote {
    let annual_rate = request
        .annual_rate_percent
        .or_else(|| request.category.map(LoanCategory::annual_rate_percent))
        .unwrap_or(0.0);

    let principal = request.principal;
    let periods = request.term_months;
    let monthly_rate = annual_rate / 100.0 / 12.0;

    let priceable = principal.is_finite()
        && principal > 0.0
        && periods > 0
        && monthly_rate.is_finite()
        && monthly_rate > 0.0;

    let monthly_emi = if priceable {
        let growth = (1.0 + monthly_rate).powi(periods as i32);
        principal * monthly_rate * growth / (growth - 1.0)
    } else {
        0.0
    };

    let total_payment = monthly_emi * f64::from(periods);
    let total_interest = if priceable {
        total_payment - principal
    } else {
        0.0
    };

    let processing_fee = if priceable {
        principal
            * request
                .processing_fee_percent
                .unwrap_or(DEFAULT_PROCESSING_FEE_PERCENT)
            / 100.0
    } else {
        0.0
    };
    let insurance_charge = if priceable && request.include_insurance {
        FLAT_INSURANCE_CHARGE
    } else {
        0.0
    };

    let affordable = request
        .monthly_income
        .filter(|income| priceable && income.is_finite() && *income > 0.0)
        .map(|income| monthly_emi < income * AFFORDABILITY_EMI_SHARE);

    LoanQuote {
        monthly_emi,
        total_interest,
        total_payment,
        processing_fee,
        insurance_charge,
        total_with_fees: total_payment + processing_fee + insurance_charge,
        affordable,
    }
}

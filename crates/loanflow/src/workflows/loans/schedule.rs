//! Canonical repayment math. The lifecycle engine is the only caller that
//! attaches the output to a stored record; quote previews go through
//! `calculator` and use different, compounding math on purpose.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use super::domain::{Installment, InstallmentStatus};

/// Simple-interest repayment plan: the totals plus the keyed installment
/// map that gets persisted under an approved record.
#[derive(Debug, Clone, PartialEq)]
pub struct RepaymentPlan {
    pub total_interest: f64,
    pub total_payable: f64,
    pub emi: f64,
    pub installments: BTreeMap<String, Installment>,
}

impl RepaymentPlan {
    pub fn empty() -> Self {
        Self {
            total_interest: 0.0,
            total_payable: 0.0,
            emi: 0.0,
            installments: BTreeMap::new(),
        }
    }
}

/// Build the repayment plan for an approved application.
///
/// Interest is simple, not compounding: `principal * rate/100 * months/12`.
/// Every installment carries the same rounded EMI; the rounding drift on
/// the final installment is accepted rather than re-spread. Due dates fall
/// on the first of each of the `term_months` calendar months after `from`.
pub fn build_plan(
    principal: f64,
    term_months: u32,
    annual_rate_percent: f64,
    from: NaiveDate,
) -> RepaymentPlan {
    if term_months == 0
        || !principal.is_finite()
        || principal <= 0.0
        || !annual_rate_percent.is_finite()
    {
        return RepaymentPlan::empty();
    }

    let total_interest = principal * (annual_rate_percent / 100.0) * f64::from(term_months) / 12.0;
    let total_payable = principal + total_interest;
    let emi = (total_payable / f64::from(term_months)).round();

    let mut installments = BTreeMap::new();
    for offset in 0..term_months {
        installments.insert(
            format!("month{}", offset + 1),
            Installment {
                due_on: first_of_following_month(from, offset + 1),
                amount: emi,
                status: InstallmentStatus::Due,
            },
        );
    }

    RepaymentPlan {
        total_interest,
        total_payable,
        emi,
        installments,
    }
}

/// First day of the month `months_ahead` months after `from`.
fn first_of_following_month(from: NaiveDate, months_ahead: u32) -> NaiveDate {
    let total = from.year() * 12 + from.month0() as i32 + months_ahead as i32;
    let year = total.div_euclid(12);
    let month = total.rem_euclid(12) as u32 + 1;
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(from)
}

//! JSON projections for the dashboard surfaces. Plain serializable shapes;
//! assembly lives in the service so every view goes through the same
//! time-derived status projection.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{DisplayStatus, Installment, LoanCategory};

/// One stop on the status card's progress rail.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressStop {
    pub status: DisplayStatus,
    pub label: &'static str,
    pub reached: bool,
}

/// Build the card's fixed rail for the given projected status. Approved and
/// rejected are alternative final stops; only one of them can be reached.
pub fn progress_stops(current: DisplayStatus) -> Vec<ProgressStop> {
    DisplayStatus::stops()
        .iter()
        .map(|stop| ProgressStop {
            status: *stop,
            label: stop.label(),
            reached: stop_reached(*stop, current),
        })
        .collect()
}

fn stop_reached(stop: DisplayStatus, current: DisplayStatus) -> bool {
    match current {
        DisplayStatus::Pending => matches!(stop, DisplayStatus::Pending),
        DisplayStatus::UnderReview => {
            matches!(stop, DisplayStatus::Pending | DisplayStatus::UnderReview)
        }
        DisplayStatus::Approved => !matches!(stop, DisplayStatus::Rejected),
        DisplayStatus::Rejected => !matches!(stop, DisplayStatus::Approved),
    }
}

/// Status card for the applicant's most recent application.
#[derive(Debug, Clone, Serialize)]
pub struct StatusCardView {
    pub loan_id: String,
    pub category: LoanCategory,
    pub principal: f64,
    pub status: DisplayStatus,
    pub status_label: &'static str,
    pub progress_percent: u8,
    pub stops: Vec<ProgressStop>,
    /// One-shot approval celebration flag; stays set until acknowledged.
    pub celebrate: bool,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
}

/// Row in the dashboard's loan list.
#[derive(Debug, Clone, Serialize)]
pub struct LoanSummaryView {
    pub loan_id: String,
    pub category: LoanCategory,
    pub principal: f64,
    pub term_months: u32,
    pub status: DisplayStatus,
    pub status_label: &'static str,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annual_rate_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emi: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_payable: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InstallmentView {
    pub key: String,
    pub due_on: NaiveDate,
    pub amount: f64,
    pub status: super::domain::InstallmentStatus,
    pub status_label: &'static str,
}

impl InstallmentView {
    pub fn from_entry(key: &str, installment: &Installment) -> Self {
        Self {
            key: key.to_string(),
            due_on: installment.due_on,
            amount: installment.amount,
            status: installment.status,
            status_label: installment.status.label(),
        }
    }
}

/// Full detail for one application, installments ordered by due date.
#[derive(Debug, Clone, Serialize)]
pub struct LoanDetailView {
    pub loan_id: String,
    pub category: LoanCategory,
    pub principal: f64,
    pub term_months: u32,
    pub monthly_income: f64,
    pub employment: String,
    pub status: DisplayStatus,
    pub status_label: &'static str,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annual_rate_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emi: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_payable: Option<f64>,
    pub installments: Vec<InstallmentView>,
}

/// Calendar entry for one approved loan.
#[derive(Debug, Clone, Serialize)]
pub struct LoanCalendarEntry {
    pub loan_id: String,
    pub category: LoanCategory,
    pub emi: f64,
    pub outstanding: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_unpaid: Option<InstallmentView>,
    pub installments: Vec<InstallmentView>,
}

/// Repayment calendar across a user's approved loans. `marked_dates` holds
/// every date still owing money, for the date-picker dots.
#[derive(Debug, Clone, Serialize)]
pub struct CalendarView {
    pub active: Vec<LoanCalendarEntry>,
    pub settled: Vec<LoanCalendarEntry>,
    pub marked_dates: Vec<NaiveDate>,
    pub total_outstanding: f64,
}

/// History entry: an approved loan with at least one paid installment.
#[derive(Debug, Clone, Serialize)]
pub struct LoanHistoryEntry {
    pub loan_id: String,
    pub category: LoanCategory,
    pub principal: f64,
    pub fully_paid: bool,
    pub paid_installments: Vec<InstallmentView>,
}

/// Greeting strip on the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct UserOverview {
    pub full_name: String,
    pub member_since: DateTime<Utc>,
    pub approved_loans: usize,
}

/// Response for a single-installment payment.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentView {
    pub loan_id: String,
    pub installment: InstallmentView,
    pub outstanding: f64,
}

/// Response for the pay-everything action.
#[derive(Debug, Clone, Serialize)]
pub struct PayoffView {
    pub loan_id: String,
    pub newly_paid: usize,
    pub fully_paid: bool,
}

/// Response for acknowledging the approval celebration.
#[derive(Debug, Clone, Serialize)]
pub struct CelebrationAck {
    pub loan_id: String,
    pub was_pending: bool,
}

/// Sort orders accepted by the list endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanSort {
    DateAsc,
    #[default]
    DateDesc,
    AmountAsc,
    AmountDesc,
}

/// Query filters for the dashboard list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoanListQuery {
    #[serde(default)]
    pub sort: Option<LoanSort>,
    #[serde(default)]
    pub status: Option<DisplayStatus>,
    #[serde(default)]
    pub category: Option<LoanCategory>,
}

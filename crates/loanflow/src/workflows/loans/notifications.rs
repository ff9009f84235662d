//! Derived notification projection. Every mutation that can change what a
//! user should be told about a loan ends by re-projecting that loan into
//! the feed; ids are derived from content, so re-projection is an upsert
//! and a replayed event never produces a second entry.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::domain::LoanStatus;
use super::repository::{LoanRecord, NotificationStore};

/// One entry in the per-user notification feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Project one loan record into its full notification set. Pure: the same
/// record always yields the same batch, timestamps included.
pub fn project_loan(record: &LoanRecord) -> Vec<NotificationRecord> {
    let mut batch = Vec::new();
    let loan = record.id.0.as_str();
    let decided_at = record.decided_at.unwrap_or(record.created_at);

    match record.status {
        LoanStatus::Pending => return batch,
        LoanStatus::Approved => {
            batch.push(NotificationRecord {
                id: format!("{loan}-approved"),
                message: format!(
                    "Your {} loan of {:.0} over {} months was approved.",
                    record.facts.category.label(),
                    record.facts.principal,
                    record.facts.term_months
                ),
                timestamp: decided_at,
            });
        }
        LoanStatus::Rejected => {
            batch.push(NotificationRecord {
                id: format!("{loan}-rejected"),
                message: format!(
                    "Your {} loan application of {:.0} was rejected.",
                    record.facts.category.label(),
                    record.facts.principal
                ),
                timestamp: decided_at,
            });
            return batch;
        }
    }

    for (_, installment) in record.paid_installments() {
        batch.push(NotificationRecord {
            id: format!("{loan}-paid-{}", sanitize_key(&installment.due_on.to_string())),
            message: format!(
                "EMI of {:.0} for {} is paid.",
                installment.amount, installment.due_on
            ),
            timestamp: midnight_utc(installment.due_on, decided_at),
        });
    }

    if let Some((_, upcoming)) = record.next_unpaid() {
        batch.push(NotificationRecord {
            id: format!(
                "{loan}-upcoming-{}",
                sanitize_key(&upcoming.due_on.to_string())
            ),
            message: format!(
                "Upcoming EMI of {:.0} due on {}.",
                upcoming.amount, upcoming.due_on
            ),
            timestamp: midnight_utc(upcoming.due_on, decided_at),
        });
    }

    batch
}

/// Upsert the full projection for one loan. Transport failures are logged
/// and dropped; the feed is derived data and the next mutation will
/// project it again.
pub fn refresh<N: NotificationStore + ?Sized>(store: &N, record: &LoanRecord) {
    for note in project_loan(record) {
        if let Err(error) = store.upsert(&record.owner, note) {
            warn!(loan = %record.id.0, %error, "notification write dropped");
            break;
        }
    }
}

/// Replace the characters the original record store refused in keys.
pub(crate) fn sanitize_key(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '.' | '#' | '$' | '/' | '[' | ']' | ':' => '-',
            other => other,
        })
        .collect()
}

fn midnight_utc(date: NaiveDate, fallback: DateTime<Utc>) -> DateTime<Utc> {
    date.and_hms_opt(0, 0, 0)
        .map(|at| at.and_utc())
        .unwrap_or(fallback)
}

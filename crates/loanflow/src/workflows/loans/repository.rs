use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    Installment, InstallmentStatus, LoanFacts, LoanId, LoanStatus, LoanTerms, UserId,
};
use super::notifications::NotificationRecord;

/// Stored account profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user: UserId,
    pub full_name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Stored loan application: the immutable submission facts plus the
/// engine-owned outcome fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanRecord {
    pub id: LoanId,
    pub owner: UserId,
    pub facts: LoanFacts,
    pub created_at: DateTime<Utc>,
    pub status: LoanStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terms: Option<LoanTerms>,
    #[serde(default)]
    pub celebration_pending: bool,
}

impl LoanRecord {
    /// Installments ordered by due date. Map keys sort `month10` before
    /// `month2`, so anything user-facing goes through this.
    pub fn installments_by_due(&self) -> Vec<(&str, &Installment)> {
        let mut rows: Vec<(&str, &Installment)> = self
            .terms
            .iter()
            .flat_map(|terms| terms.installments.iter())
            .map(|(key, installment)| (key.as_str(), installment))
            .collect();
        rows.sort_by_key(|(_, installment)| installment.due_on);
        rows
    }

    /// Earliest installment not yet paid, missed ones included.
    pub fn next_unpaid(&self) -> Option<(&str, &Installment)> {
        self.installments_by_due()
            .into_iter()
            .find(|(_, installment)| installment.status != InstallmentStatus::Paid)
    }

    pub fn paid_installments(&self) -> Vec<(&str, &Installment)> {
        self.installments_by_due()
            .into_iter()
            .filter(|(_, installment)| installment.status == InstallmentStatus::Paid)
            .collect()
    }

    pub fn outstanding_amount(&self) -> f64 {
        self.terms
            .iter()
            .flat_map(|terms| terms.installments.values())
            .filter(|installment| installment.status != InstallmentStatus::Paid)
            .map(|installment| installment.amount)
            .sum()
    }

    /// An approved loan whose every installment is paid. Pending and
    /// rejected records are never fully paid.
    pub fn is_fully_paid(&self) -> bool {
        match &self.terms {
            Some(terms) if !terms.installments.is_empty() => terms
                .installments
                .values()
                .all(|installment| installment.status == InstallmentStatus::Paid),
            _ => false,
        }
    }
}

/// Outcome bundle the lifecycle engine asks the store to apply atomically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanResolution {
    pub status: LoanStatus,
    pub decided_at: DateTime<Utc>,
    pub terms: Option<LoanTerms>,
}

/// Result of attempting the one-time resolution write.
#[derive(Debug, Clone)]
pub enum ResolutionWrite {
    Applied(LoanRecord),
    AlreadyResolved(LoanRecord),
}

/// Storage abstraction over the per-user record tree so the service and
/// engine can be exercised in isolation.
pub trait LoanStore: Send + Sync {
    fn insert_profile(&self, profile: UserProfile) -> Result<UserProfile, RepositoryError>;
    fn fetch_profile(&self, user: &UserId) -> Result<Option<UserProfile>, RepositoryError>;
    fn insert_loan(&self, record: LoanRecord) -> Result<LoanRecord, RepositoryError>;
    fn fetch_loan(&self, user: &UserId, id: &LoanId) -> Result<Option<LoanRecord>, RepositoryError>;
    fn loans_for_user(&self, user: &UserId) -> Result<Vec<LoanRecord>, RepositoryError>;
    /// Every stored application not yet in a terminal state, across users.
    fn unresolved_loans(&self) -> Result<Vec<LoanRecord>, RepositoryError>;
    /// Apply the one-time outcome write: status, decision timestamp, terms,
    /// and (for approvals) arming the celebration marker. Must refuse to
    /// touch a record that is already terminal and report it back instead.
    fn apply_resolution(
        &self,
        user: &UserId,
        id: &LoanId,
        resolution: LoanResolution,
    ) -> Result<ResolutionWrite, RepositoryError>;
    /// Targeted write of a single installment's status; everything else on
    /// the record stays as it was.
    fn set_installment_status(
        &self,
        user: &UserId,
        id: &LoanId,
        installment: &str,
        status: InstallmentStatus,
    ) -> Result<LoanRecord, RepositoryError>;
    /// Flip every non-paid installment to paid; returns the updated record
    /// and how many installments actually changed.
    fn settle_remaining(
        &self,
        user: &UserId,
        id: &LoanId,
    ) -> Result<(LoanRecord, usize), RepositoryError>;
    /// Clear the one-shot celebration marker, reporting whether it was set.
    fn take_celebration(&self, user: &UserId, id: &LoanId) -> Result<bool, RepositoryError>;
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Sink for the derived per-user notification feed. Writes are keyed by
/// notification id, so replays overwrite instead of duplicating.
pub trait NotificationStore: Send + Sync {
    fn upsert(&self, user: &UserId, record: NotificationRecord) -> Result<(), NotificationError>;
    fn for_user(&self, user: &UserId) -> Result<Vec<NotificationRecord>, NotificationError>;
}

/// Notification dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("notification store unavailable: {0}")]
    Transport(String),
}

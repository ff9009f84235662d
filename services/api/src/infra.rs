use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use loanflow::config::LifecycleSettings;
use loanflow::workflows::loans::{
    InstallmentStatus, LifecycleConfig, LoanCategory, LoanId, LoanRecord, LoanResolution,
    LoanStatus, LoanStore, NotificationError, NotificationRecord, NotificationStore,
    RepositoryError, ResolutionWrite, UnderwritingPolicy, UserId, UserProfile,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Translate the whole-second config dials into engine durations.
pub(crate) fn lifecycle_config(settings: &LifecycleSettings) -> LifecycleConfig {
    LifecycleConfig {
        review_after: chrono_seconds(settings.review_after_secs),
        decide_after: chrono_seconds(settings.decide_after_secs),
        sweep_interval: std::time::Duration::from_secs(settings.sweep_interval_secs),
        policy: UnderwritingPolicy::default(),
    }
}

fn chrono_seconds(secs: u64) -> chrono::Duration {
    chrono::Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX))
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryLoanStore {
    profiles: Arc<Mutex<HashMap<UserId, UserProfile>>>,
    loans: Arc<Mutex<HashMap<UserId, BTreeMap<LoanId, LoanRecord>>>>,
}

impl LoanStore for InMemoryLoanStore {
    fn insert_profile(&self, profile: UserProfile) -> Result<UserProfile, RepositoryError> {
        let mut guard = self.profiles.lock().expect("profile mutex poisoned");
        if guard.contains_key(&profile.user) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(profile.user.clone(), profile.clone());
        Ok(profile)
    }

    fn fetch_profile(&self, user: &UserId) -> Result<Option<UserProfile>, RepositoryError> {
        let guard = self.profiles.lock().expect("profile mutex poisoned");
        Ok(guard.get(user).cloned())
    }

    fn insert_loan(&self, record: LoanRecord) -> Result<LoanRecord, RepositoryError> {
        let mut guard = self.loans.lock().expect("loan mutex poisoned");
        let tree = guard.entry(record.owner.clone()).or_default();
        if tree.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        tree.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn fetch_loan(
        &self,
        user: &UserId,
        id: &LoanId,
    ) -> Result<Option<LoanRecord>, RepositoryError> {
        let guard = self.loans.lock().expect("loan mutex poisoned");
        Ok(guard.get(user).and_then(|tree| tree.get(id)).cloned())
    }

    fn loans_for_user(&self, user: &UserId) -> Result<Vec<LoanRecord>, RepositoryError> {
        let guard = self.loans.lock().expect("loan mutex poisoned");
        Ok(guard
            .get(user)
            .map(|tree| tree.values().cloned().collect())
            .unwrap_or_default())
    }

    fn unresolved_loans(&self) -> Result<Vec<LoanRecord>, RepositoryError> {
        let guard = self.loans.lock().expect("loan mutex poisoned");
        Ok(guard
            .values()
            .flat_map(|tree| tree.values())
            .filter(|record| !record.status.is_terminal())
            .cloned()
            .collect())
    }

    fn apply_resolution(
        &self,
        user: &UserId,
        id: &LoanId,
        resolution: LoanResolution,
    ) -> Result<ResolutionWrite, RepositoryError> {
        let mut guard = self.loans.lock().expect("loan mutex poisoned");
        let record = guard
            .get_mut(user)
            .and_then(|tree| tree.get_mut(id))
            .ok_or(RepositoryError::NotFound)?;
        if record.status.is_terminal() {
            return Ok(ResolutionWrite::AlreadyResolved(record.clone()));
        }
        record.status = resolution.status;
        record.decided_at = Some(resolution.decided_at);
        record.terms = resolution.terms;
        record.celebration_pending = resolution.status == LoanStatus::Approved;
        Ok(ResolutionWrite::Applied(record.clone()))
    }

    fn set_installment_status(
        &self,
        user: &UserId,
        id: &LoanId,
        installment: &str,
        status: InstallmentStatus,
    ) -> Result<LoanRecord, RepositoryError> {
        let mut guard = self.loans.lock().expect("loan mutex poisoned");
        let record = guard
            .get_mut(user)
            .and_then(|tree| tree.get_mut(id))
            .ok_or(RepositoryError::NotFound)?;
        let entry = record
            .terms
            .as_mut()
            .and_then(|terms| terms.installments.get_mut(installment))
            .ok_or(RepositoryError::NotFound)?;
        entry.status = status;
        Ok(record.clone())
    }

    fn settle_remaining(
        &self,
        user: &UserId,
        id: &LoanId,
    ) -> Result<(LoanRecord, usize), RepositoryError> {
        let mut guard = self.loans.lock().expect("loan mutex poisoned");
        let record = guard
            .get_mut(user)
            .and_then(|tree| tree.get_mut(id))
            .ok_or(RepositoryError::NotFound)?;
        let mut changed = 0;
        if let Some(terms) = record.terms.as_mut() {
            for entry in terms.installments.values_mut() {
                if entry.status != InstallmentStatus::Paid {
                    entry.status = InstallmentStatus::Paid;
                    changed += 1;
                }
            }
        }
        Ok((record.clone(), changed))
    }

    fn take_celebration(&self, user: &UserId, id: &LoanId) -> Result<bool, RepositoryError> {
        let mut guard = self.loans.lock().expect("loan mutex poisoned");
        let record = guard
            .get_mut(user)
            .and_then(|tree| tree.get_mut(id))
            .ok_or(RepositoryError::NotFound)?;
        let was_pending = record.celebration_pending;
        record.celebration_pending = false;
        Ok(was_pending)
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryNotificationStore {
    entries: Arc<Mutex<HashMap<UserId, BTreeMap<String, NotificationRecord>>>>,
}

impl NotificationStore for InMemoryNotificationStore {
    fn upsert(&self, user: &UserId, record: NotificationRecord) -> Result<(), NotificationError> {
        let mut guard = self.entries.lock().expect("notification mutex poisoned");
        guard
            .entry(user.clone())
            .or_default()
            .insert(record.id.clone(), record);
        Ok(())
    }

    fn for_user(&self, user: &UserId) -> Result<Vec<NotificationRecord>, NotificationError> {
        let guard = self.entries.lock().expect("notification mutex poisoned");
        Ok(guard
            .get(user)
            .map(|tree| tree.values().cloned().collect())
            .unwrap_or_default())
    }
}

pub(crate) fn parse_category(raw: &str) -> Result<LoanCategory, String> {
    LoanCategory::parse(raw).ok_or_else(|| {
        format!("unknown loan category '{raw}' (expected personal, student, mortgage, auto, business, or education)")
    })
}

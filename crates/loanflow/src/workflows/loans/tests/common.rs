use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::loans::domain::{
    DocumentKind, DocumentRef, InstallmentStatus, LoanCategory, LoanFacts, LoanId, LoanStatus,
    LoanSubmission, PersonalDetails, RegistrationRequest, UserId,
};
use crate::workflows::loans::lifecycle::{LifecycleConfig, LifecycleEngine};
use crate::workflows::loans::notifications::NotificationRecord;
use crate::workflows::loans::repository::{
    LoanRecord, LoanResolution, LoanStore, NotificationError, NotificationStore, RepositoryError,
    ResolutionWrite, UserProfile,
};
use crate::workflows::loans::service::LoanService;
use crate::workflows::loans::underwriting::UnderwritingPolicy;

pub(super) fn test_user() -> UserId {
    UserId("user-101".to_string())
}

pub(super) fn submitted_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0)
        .single()
        .expect("valid timestamp")
}

/// A moment safely past the decision window for `lifecycle_config`.
pub(super) fn decision_time() -> DateTime<Utc> {
    submitted_at() + Duration::seconds(21)
}

pub(super) fn lifecycle_config() -> LifecycleConfig {
    LifecycleConfig {
        review_after: Duration::seconds(10),
        decide_after: Duration::seconds(20),
        sweep_interval: std::time::Duration::from_secs(5),
        policy: UnderwritingPolicy::default(),
    }
}

pub(super) fn personal_details() -> PersonalDetails {
    PersonalDetails {
        full_name: "Asha Verma".to_string(),
        email: "asha@example.com".to_string(),
        phone: "9876543210".to_string(),
        date_of_birth: NaiveDate::from_ymd_opt(1994, 3, 21).expect("valid date"),
    }
}

pub(super) fn documents() -> Vec<DocumentRef> {
    vec![
        DocumentRef {
            kind: DocumentKind::Aadhaar,
            file_name: "aadhaar.pdf".to_string(),
        },
        DocumentRef {
            kind: DocumentKind::Pan,
            file_name: "pan.pdf".to_string(),
        },
        DocumentRef {
            kind: DocumentKind::IncomeProof,
            file_name: "salary-slips.pdf".to_string(),
        },
    ]
}

pub(super) fn submission() -> LoanSubmission {
    LoanSubmission {
        principal: 10000.0,
        term_months: 12,
        monthly_income: 20000.0,
        employment: "employed".to_string(),
        category: LoanCategory::Personal,
        personal: personal_details(),
        documents: documents(),
    }
}

pub(super) fn registration() -> RegistrationRequest {
    RegistrationRequest {
        full_name: "Asha Verma".to_string(),
        email: "asha@example.com".to_string(),
    }
}

pub(super) fn facts(principal: f64, income: f64, employment: &str) -> LoanFacts {
    LoanFacts {
        principal,
        term_months: 12,
        monthly_income: income,
        employment: employment.to_string(),
        category: LoanCategory::Personal,
        personal: None,
        documents: Vec::new(),
    }
}

/// Shared test world: one store and one feed behind both the service and
/// the engine, the same wiring the server uses.
pub(super) struct Stack {
    pub(super) service: Arc<LoanService<MemoryLoanStore, MemoryNotifications>>,
    pub(super) engine: Arc<LifecycleEngine<MemoryLoanStore, MemoryNotifications>>,
    pub(super) store: Arc<MemoryLoanStore>,
    pub(super) notifications: Arc<MemoryNotifications>,
}

pub(super) fn build_stack() -> Stack {
    let store = Arc::new(MemoryLoanStore::default());
    let notifications = Arc::new(MemoryNotifications::default());
    let service = Arc::new(LoanService::new(
        store.clone(),
        notifications.clone(),
        lifecycle_config(),
    ));
    let engine = Arc::new(LifecycleEngine::new(
        store.clone(),
        notifications.clone(),
        lifecycle_config(),
    ));
    Stack {
        service,
        engine,
        store,
        notifications,
    }
}

/// Submit the standard application and run the sweep past the window, so a
/// test can start from an approved record.
pub(super) fn resolved_loan(stack: &Stack) -> LoanRecord {
    let user = test_user();
    let record = stack
        .service
        .submit(&user, submission(), submitted_at())
        .expect("submission accepted");
    stack.engine.sweep(decision_time()).expect("sweep runs");
    stack
        .store
        .fetch_loan(&user, &record.id)
        .expect("store reachable")
        .expect("record present")
}

#[derive(Default, Clone)]
pub(super) struct MemoryLoanStore {
    profiles: Arc<Mutex<HashMap<UserId, UserProfile>>>,
    loans: Arc<Mutex<HashMap<UserId, BTreeMap<LoanId, LoanRecord>>>>,
}

impl LoanStore for MemoryLoanStore {
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
pub(super) struct MemoryNotifications {
    entries: Arc<Mutex<HashMap<UserId, BTreeMap<String, NotificationRecord>>>>,
}

impl NotificationStore for MemoryNotifications {
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

/// Store that fails the resolution write for one specific loan exactly
/// once, then behaves normally. Everything else delegates to the inner
/// in-memory store.
#[derive(Default)]
pub(super) struct FlakyResolutionStore {
    pub(super) inner: MemoryLoanStore,
    fail_once_for: Mutex<Option<LoanId>>,
}

impl FlakyResolutionStore {
    pub(super) fn fail_once_for(&self, id: LoanId) {
        *self
            .fail_once_for
            .lock()
            .expect("flaky target mutex poisoned") = Some(id);
    }
}

impl LoanStore for FlakyResolutionStore {
    fn insert_profile(&self, profile: UserProfile) -> Result<UserProfile, RepositoryError> {
        self.inner.insert_profile(profile)
    }

    fn fetch_profile(&self, user: &UserId) -> Result<Option<UserProfile>, RepositoryError> {
        self.inner.fetch_profile(user)
    }

    fn insert_loan(&self, record: LoanRecord) -> Result<LoanRecord, RepositoryError> {
        self.inner.insert_loan(record)
    }

    fn fetch_loan(
        &self,
        user: &UserId,
        id: &LoanId,
    ) -> Result<Option<LoanRecord>, RepositoryError> {
        self.inner.fetch_loan(user, id)
    }

    fn loans_for_user(&self, user: &UserId) -> Result<Vec<LoanRecord>, RepositoryError> {
        self.inner.loans_for_user(user)
    }

    fn unresolved_loans(&self) -> Result<Vec<LoanRecord>, RepositoryError> {
        self.inner.unresolved_loans()
    }

    fn apply_resolution(
        &self,
        user: &UserId,
        id: &LoanId,
        resolution: LoanResolution,
    ) -> Result<ResolutionWrite, RepositoryError> {
        let mut target = self
            .fail_once_for
            .lock()
            .expect("flaky target mutex poisoned");
        if target.as_ref() == Some(id) {
            *target = None;
            return Err(RepositoryError::Unavailable("simulated outage".to_string()));
        }
        drop(target);
        self.inner.apply_resolution(user, id, resolution)
    }

    fn set_installment_status(
        &self,
        user: &UserId,
        id: &LoanId,
        installment: &str,
        status: InstallmentStatus,
    ) -> Result<LoanRecord, RepositoryError> {
        self.inner.set_installment_status(user, id, installment, status)
    }

    fn settle_remaining(
        &self,
        user: &UserId,
        id: &LoanId,
    ) -> Result<(LoanRecord, usize), RepositoryError> {
        self.inner.settle_remaining(user, id)
    }

    fn take_celebration(&self, user: &UserId, id: &LoanId) -> Result<bool, RepositoryError> {
        self.inner.take_celebration(user, id)
    }
}

pub(super) struct UnavailableStore;

impl LoanStore for UnavailableStore {
    fn insert_profile(&self, _profile: UserProfile) -> Result<UserProfile, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch_profile(&self, _user: &UserId) -> Result<Option<UserProfile>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn insert_loan(&self, _record: LoanRecord) -> Result<LoanRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch_loan(
        &self,
        _user: &UserId,
        _id: &LoanId,
    ) -> Result<Option<LoanRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn loans_for_user(&self, _user: &UserId) -> Result<Vec<LoanRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn unresolved_loans(&self) -> Result<Vec<LoanRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn apply_resolution(
        &self,
        _user: &UserId,
        _id: &LoanId,
        _resolution: LoanResolution,
    ) -> Result<ResolutionWrite, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn set_installment_status(
        &self,
        _user: &UserId,
        _id: &LoanId,
        _installment: &str,
        _status: InstallmentStatus,
    ) -> Result<LoanRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn settle_remaining(
        &self,
        _user: &UserId,
        _id: &LoanId,
    ) -> Result<(LoanRecord, usize), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn take_celebration(&self, _user: &UserId, _id: &LoanId) -> Result<bool, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::calculator::{self, LoanQuote, QuoteRequest};
use super::domain::{
    InstallmentStatus, LoanFacts, LoanId, LoanStatus, LoanSubmission, QuickSubmission,
    RegistrationRequest, UserId,
};
use super::intake::{IntakeError, IntakeGuard};
use super::lifecycle::{display_status, LifecycleConfig};
use super::notifications::{self, NotificationRecord};
use super::repository::{
    LoanRecord, LoanStore, NotificationError, NotificationStore, RepositoryError, UserProfile,
};
use super::views::{
    progress_stops, CalendarView, CelebrationAck, InstallmentView, LoanCalendarEntry,
    LoanDetailView, LoanHistoryEntry, LoanListQuery, LoanSort, LoanSummaryView, PaymentView,
    PayoffView, StatusCardView, UserOverview,
};

/// Service composing the intake guard, the two store seams, and the
/// time-derived status projection. Decisions are never made here; they
/// belong to the lifecycle engine.
pub struct LoanService<S, N> {
    guard: IntakeGuard,
    store: Arc<S>,
    notifications: Arc<N>,
    config: LifecycleConfig,
}

static LOAN_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_loan_id() -> LoanId {
    let id = LOAN_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    LoanId(format!("loan-{id:06}"))
}

impl<S, N> LoanService<S, N>
where
    S: LoanStore + 'static,
    N: NotificationStore + 'static,
{
    pub fn new(store: Arc<S>, notifications: Arc<N>, config: LifecycleConfig) -> Self {
        Self {
            guard: IntakeGuard::default(),
            store,
            notifications,
            config,
        }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Register an account profile. Refuses duplicates.
    pub fn register(
        &self,
        user: &UserId,
        request: RegistrationRequest,
        now: DateTime<Utc>,
    ) -> Result<UserProfile, LoanServiceError> {
        self.guard.check_registration(&request)?;
        let profile = UserProfile {
            user: user.clone(),
            full_name: request.full_name.trim().to_string(),
            email: request.email.trim().to_string(),
            created_at: now,
        };
        Ok(self.store.insert_profile(profile)?)
    }

    /// Accept a full application. Facts persist immediately as pending;
    /// pricing waits for the lifecycle engine.
    pub fn submit(
        &self,
        user: &UserId,
        submission: LoanSubmission,
        now: DateTime<Utc>,
    ) -> Result<LoanRecord, LoanServiceError> {
        let facts = self.guard.facts_from_submission(submission)?;
        self.insert_record(user, facts, now)
    }

    /// Quick re-apply: fresh amount, term, employment, and category, with
    /// income, identity, and documents carried over from the latest
    /// application.
    pub fn submit_quick(
        &self,
        user: &UserId,
        submission: QuickSubmission,
        now: DateTime<Utc>,
    ) -> Result<LoanRecord, LoanServiceError> {
        let previous = self
            .latest_loan(user)?
            .ok_or(IntakeError::NoPriorApplication)?;
        let facts = self.guard.facts_from_quick(submission, &previous.facts)?;
        self.insert_record(user, facts, now)
    }

    fn insert_record(
        &self,
        user: &UserId,
        facts: LoanFacts,
        now: DateTime<Utc>,
    ) -> Result<LoanRecord, LoanServiceError> {
        let record = LoanRecord {
            id: next_loan_id(),
            owner: user.clone(),
            facts,
            created_at: now,
            status: LoanStatus::Pending,
            decided_at: None,
            terms: None,
            celebration_pending: false,
        };
        Ok(self.store.insert_loan(record)?)
    }

    fn latest_loan(&self, user: &UserId) -> Result<Option<LoanRecord>, RepositoryError> {
        let mut loans = self.store.loans_for_user(user)?;
        loans.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(loans.pop())
    }

    /// Status card for the most recent application, or `None` when the user
    /// has never applied.
    pub fn latest_status(
        &self,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<StatusCardView>, LoanServiceError> {
        let Some(record) = self.latest_loan(user)? else {
            return Ok(None);
        };
        Ok(Some(self.status_card(&record, now)))
    }

    pub fn status_card(&self, record: &LoanRecord, now: DateTime<Utc>) -> StatusCardView {
        let display = display_status(record.status, now - record.created_at, &self.config);
        StatusCardView {
            loan_id: record.id.0.clone(),
            category: record.facts.category,
            principal: record.facts.principal,
            status: display,
            status_label: display.label(),
            progress_percent: display.progress_percent(),
            stops: progress_stops(display),
            celebrate: record.celebration_pending,
            submitted_at: record.created_at,
            decided_at: record.decided_at,
        }
    }

    /// Loan list with sorting and filters, every row carrying the
    /// time-projected status.
    pub fn list(
        &self,
        user: &UserId,
        query: &LoanListQuery,
        now: DateTime<Utc>,
    ) -> Result<Vec<LoanSummaryView>, LoanServiceError> {
        let mut loans = self.store.loans_for_user(user)?;
        if let Some(category) = query.category {
            loans.retain(|record| record.facts.category == category);
        }

        let mut rows: Vec<LoanSummaryView> = loans
            .iter()
            .map(|record| self.summary_view(record, now))
            .collect();
        if let Some(status) = query.status {
            rows.retain(|row| row.status == status);
        }

        match query.sort.unwrap_or_default() {
            LoanSort::DateAsc => rows.sort_by_key(|row| row.submitted_at),
            LoanSort::DateDesc => {
                rows.sort_by_key(|row| row.submitted_at);
                rows.reverse();
            }
            LoanSort::AmountAsc => rows.sort_by(|a, b| a.principal.total_cmp(&b.principal)),
            LoanSort::AmountDesc => rows.sort_by(|a, b| b.principal.total_cmp(&a.principal)),
        }

        Ok(rows)
    }

    pub fn summary_view(&self, record: &LoanRecord, now: DateTime<Utc>) -> LoanSummaryView {
        let display = display_status(record.status, now - record.created_at, &self.config);
        LoanSummaryView {
            loan_id: record.id.0.clone(),
            category: record.facts.category,
            principal: record.facts.principal,
            term_months: record.facts.term_months,
            status: display,
            status_label: display.label(),
            submitted_at: record.created_at,
            annual_rate_percent: record.terms.as_ref().map(|terms| terms.annual_rate_percent),
            emi: record.terms.as_ref().map(|terms| terms.emi),
            total_payable: record.terms.as_ref().map(|terms| terms.total_payable),
        }
    }

    /// Full detail for one application.
    pub fn loan_detail(
        &self,
        user: &UserId,
        id: &LoanId,
        now: DateTime<Utc>,
    ) -> Result<LoanDetailView, LoanServiceError> {
        let record = self.fetch_required(user, id)?;
        let display = display_status(record.status, now - record.created_at, &self.config);
        Ok(LoanDetailView {
            loan_id: record.id.0.clone(),
            category: record.facts.category,
            principal: record.facts.principal,
            term_months: record.facts.term_months,
            monthly_income: record.facts.monthly_income,
            employment: record.facts.employment.clone(),
            status: display,
            status_label: display.label(),
            submitted_at: record.created_at,
            decided_at: record.decided_at,
            annual_rate_percent: record.terms.as_ref().map(|terms| terms.annual_rate_percent),
            emi: record.terms.as_ref().map(|terms| terms.emi),
            total_payable: record.terms.as_ref().map(|terms| terms.total_payable),
            installments: record
                .installments_by_due()
                .into_iter()
                .map(|(key, installment)| InstallmentView::from_entry(key, installment))
                .collect(),
        })
    }

    /// Repayment calendar across the user's approved loans.
    pub fn calendar(&self, user: &UserId) -> Result<CalendarView, LoanServiceError> {
        let mut loans = self.store.loans_for_user(user)?;
        loans.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut active = Vec::new();
        let mut settled = Vec::new();
        let mut marked = BTreeSet::new();
        let mut total_outstanding = 0.0;

        for record in &loans {
            if record.status != LoanStatus::Approved {
                continue;
            }
            let entry = calendar_entry(record);
            if record.is_fully_paid() {
                settled.push(entry);
                continue;
            }
            for (_, installment) in record.installments_by_due() {
                if installment.status != InstallmentStatus::Paid {
                    marked.insert(installment.due_on);
                }
            }
            total_outstanding += record.outstanding_amount();
            active.push(entry);
        }

        Ok(CalendarView {
            active,
            settled,
            marked_dates: marked.into_iter().collect(),
            total_outstanding,
        })
    }

    /// Approved loans with at least one paid installment, oldest first.
    pub fn history(&self, user: &UserId) -> Result<Vec<LoanHistoryEntry>, LoanServiceError> {
        let mut loans = self.store.loans_for_user(user)?;
        loans.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        Ok(loans
            .iter()
            .filter(|record| record.status == LoanStatus::Approved)
            .filter_map(|record| {
                let paid = record.paid_installments();
                if paid.is_empty() {
                    return None;
                }
                Some(LoanHistoryEntry {
                    loan_id: record.id.0.clone(),
                    category: record.facts.category,
                    principal: record.facts.principal,
                    fully_paid: record.is_fully_paid(),
                    paid_installments: paid
                        .into_iter()
                        .map(|(key, installment)| InstallmentView::from_entry(key, installment))
                        .collect(),
                })
            })
            .collect())
    }

    /// Greeting strip: profile name plus the approved-loan count.
    pub fn overview(&self, user: &UserId) -> Result<UserOverview, LoanServiceError> {
        let profile = self
            .store
            .fetch_profile(user)?
            .ok_or(RepositoryError::NotFound)?;
        let loans = self.store.loans_for_user(user)?;
        Ok(UserOverview {
            full_name: profile.full_name,
            member_since: profile.created_at,
            approved_loans: loans
                .iter()
                .filter(|record| record.status == LoanStatus::Approved)
                .count(),
        })
    }

    /// Pay one due installment. The caller must have confirmed the action;
    /// missed installments are off limits from the dashboard.
    pub fn pay_installment(
        &self,
        user: &UserId,
        id: &LoanId,
        installment_key: &str,
        confirmed: bool,
    ) -> Result<PaymentView, LoanServiceError> {
        if !confirmed {
            return Err(PaymentError::ConfirmationRequired.into());
        }

        let record = self.fetch_required(user, id)?;
        if record.status != LoanStatus::Approved {
            return Err(PaymentError::LoanNotApproved.into());
        }

        let current = record
            .terms
            .as_ref()
            .and_then(|terms| terms.installments.get(installment_key))
            .ok_or(PaymentError::UnknownInstallment)?;
        match current.status {
            InstallmentStatus::Paid => return Err(PaymentError::AlreadyPaid.into()),
            InstallmentStatus::Missed => return Err(PaymentError::InstallmentMissed.into()),
            InstallmentStatus::Due => {}
        }

        let updated =
            self.store
                .set_installment_status(user, id, installment_key, InstallmentStatus::Paid)?;
        notifications::refresh(self.notifications.as_ref(), &updated);

        let installment = updated
            .terms
            .as_ref()
            .and_then(|terms| terms.installments.get(installment_key))
            .ok_or(PaymentError::UnknownInstallment)?;
        Ok(PaymentView {
            loan_id: updated.id.0.clone(),
            installment: InstallmentView::from_entry(installment_key, installment),
            outstanding: updated.outstanding_amount(),
        })
    }

    /// Pay off everything left on a loan in one action. Idempotent: running
    /// it against a settled loan changes nothing and reports zero.
    pub fn pay_off(&self, user: &UserId, id: &LoanId) -> Result<PayoffView, LoanServiceError> {
        let record = self.fetch_required(user, id)?;
        if record.status != LoanStatus::Approved {
            return Err(PaymentError::LoanNotApproved.into());
        }

        let (updated, newly_paid) = self.store.settle_remaining(user, id)?;
        if newly_paid > 0 {
            notifications::refresh(self.notifications.as_ref(), &updated);
        }

        Ok(PayoffView {
            loan_id: updated.id.0.clone(),
            newly_paid,
            fully_paid: updated.is_fully_paid(),
        })
    }

    /// Consume the one-shot approval celebration marker.
    pub fn acknowledge_celebration(
        &self,
        user: &UserId,
        id: &LoanId,
    ) -> Result<CelebrationAck, LoanServiceError> {
        let was_pending = self.store.take_celebration(user, id)?;
        Ok(CelebrationAck {
            loan_id: id.0.clone(),
            was_pending,
        })
    }

    /// The derived notification feed, newest first.
    pub fn notifications(
        &self,
        user: &UserId,
    ) -> Result<Vec<NotificationRecord>, LoanServiceError> {
        let mut records = self.notifications.for_user(user)?;
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
        Ok(records)
    }

    /// Price a what-if scenario. Never touches stored records.
    pub fn quote(&self, request: &QuoteRequest) -> LoanQuote {
        calculator::quote(request)
    }

    fn fetch_required(&self, user: &UserId, id: &LoanId) -> Result<LoanRecord, LoanServiceError> {
        let record = self
            .store
            .fetch_loan(user, id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(record)
    }
}

fn calendar_entry(record: &LoanRecord) -> LoanCalendarEntry {
    LoanCalendarEntry {
        loan_id: record.id.0.clone(),
        category: record.facts.category,
        emi: record.terms.as_ref().map(|terms| terms.emi).unwrap_or(0.0),
        outstanding: record.outstanding_amount(),
        next_unpaid: record
            .next_unpaid()
            .map(|(key, installment)| InstallmentView::from_entry(key, installment)),
        installments: record
            .installments_by_due()
            .into_iter()
            .map(|(key, installment)| InstallmentView::from_entry(key, installment))
            .collect(),
    }
}

/// Payment action failures, mapped onto HTTP statuses by the router.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("payment requires explicit confirmation")]
    ConfirmationRequired,
    #[error("loan is not approved for repayment")]
    LoanNotApproved,
    #[error("unknown installment")]
    UnknownInstallment,
    #[error("installment already paid")]
    AlreadyPaid,
    #[error("missed installments cannot be paid from the dashboard")]
    InstallmentMissed,
}

/// Error raised by the loan service.
#[derive(Debug, thiserror::Error)]
pub enum LoanServiceError {
    #[error(transparent)]
    Intake(#[from] IntakeError),
    #[error(transparent)]
    Payment(#[from] PaymentError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Notification(#[from] NotificationError),
}

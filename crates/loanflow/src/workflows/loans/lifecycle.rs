//! Timed progression of stored applications. Two halves: a pure projection
//! that derives the user-facing status from elapsed time, and a periodic
//! sweep that applies the one-time underwriting decision once an
//! application's window has closed.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use super::domain::{DisplayStatus, LoanStatus, LoanTerms};
use super::notifications;
use super::repository::{
    LoanRecord, LoanResolution, LoanStore, NotificationStore, RepositoryError, ResolutionWrite,
};
use super::schedule;
use super::underwriting::{self, Decision, UnderwritingPolicy};

/// Timing and policy dials for the pipeline. The 10s/20s/5s cadence is the
/// observed production default, not a business constant.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    /// Pending applications project as `under_review` once this much time
    /// has passed since submission.
    pub review_after: Duration,
    /// The sweep may decide an application once this much time has passed.
    pub decide_after: Duration,
    /// How often the background sweep runs.
    pub sweep_interval: std::time::Duration,
    pub policy: UnderwritingPolicy,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            review_after: Duration::seconds(10),
            decide_after: Duration::seconds(20),
            sweep_interval: std::time::Duration::from_secs(5),
            policy: UnderwritingPolicy::default(),
        }
    }
}

/// Project the user-facing status from the stored status and the time since
/// submission. Terminal statuses always win; the clock only matters while
/// the record is pending, so a projection can never move backwards.
pub fn display_status(
    status: LoanStatus,
    elapsed: Duration,
    config: &LifecycleConfig,
) -> DisplayStatus {
    match status {
        LoanStatus::Approved => DisplayStatus::Approved,
        LoanStatus::Rejected => DisplayStatus::Rejected,
        LoanStatus::Pending => {
            if elapsed < config.review_after {
                DisplayStatus::Pending
            } else {
                DisplayStatus::UnderReview
            }
        }
    }
}

/// Tally for one sweep pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepOutcome {
    pub examined: usize,
    pub resolved: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Periodic resolver. Examines every unresolved application and applies
/// the one-time decision once its window closes; approvals get their
/// repayment schedule attached in the same write.
pub struct LifecycleEngine<S, N> {
    store: Arc<S>,
    notifications: Arc<N>,
    config: LifecycleConfig,
}

impl<S, N> LifecycleEngine<S, N>
where
    S: LoanStore + 'static,
    N: NotificationStore + 'static,
{
    pub fn new(store: Arc<S>, notifications: Arc<N>, config: LifecycleConfig) -> Self {
        Self {
            store,
            notifications,
            config,
        }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Resolve every application whose decision window has closed as of
    /// `now`. A failure on one record is logged and does not stop the rest;
    /// a failure listing candidates bubbles up so the caller can retry on
    /// the next tick.
    pub fn sweep(&self, now: DateTime<Utc>) -> Result<SweepOutcome, RepositoryError> {
        let candidates = self.store.unresolved_loans()?;
        let mut outcome = SweepOutcome::default();

        for record in candidates {
            outcome.examined += 1;
            if record.status.is_terminal() || now - record.created_at < self.config.decide_after {
                outcome.skipped += 1;
                continue;
            }

            match self.resolve(&record, now) {
                Ok(true) => outcome.resolved += 1,
                Ok(false) => outcome.skipped += 1,
                Err(error) => {
                    outcome.failed += 1;
                    warn!(loan = %record.id.0, %error, "resolution failed; will retry next sweep");
                }
            }
        }

        Ok(outcome)
    }

    /// Decide one application and apply the single outcome write. Returns
    /// false when another pass resolved the record first.
    fn resolve(&self, record: &LoanRecord, now: DateTime<Utc>) -> Result<bool, RepositoryError> {
        let resolution = match underwriting::decide(&record.facts, &self.config.policy) {
            Decision::Approved => {
                let rate = record.facts.category.annual_rate_percent();
                let plan = schedule::build_plan(
                    record.facts.principal,
                    record.facts.term_months,
                    rate,
                    now.date_naive(),
                );
                LoanResolution {
                    status: LoanStatus::Approved,
                    decided_at: now,
                    terms: Some(LoanTerms {
                        annual_rate_percent: rate,
                        emi: plan.emi,
                        total_payable: plan.total_payable,
                        installments: plan.installments,
                    }),
                }
            }
            Decision::Rejected(reason) => {
                info!(loan = %record.id.0, reason = %reason.summary(), "application rejected");
                LoanResolution {
                    status: LoanStatus::Rejected,
                    decided_at: now,
                    terms: None,
                }
            }
        };

        match self
            .store
            .apply_resolution(&record.owner, &record.id, resolution)?
        {
            ResolutionWrite::Applied(updated) => {
                info!(
                    loan = %updated.id.0,
                    status = updated.status.label(),
                    "application resolved"
                );
                notifications::refresh(self.notifications.as_ref(), &updated);
                Ok(true)
            }
            ResolutionWrite::AlreadyResolved(_) => Ok(false),
        }
    }

    /// Run the sweep on a fixed interval until the returned handle is
    /// aborted.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.sweep_interval);
            loop {
                ticker.tick().await;
                match self.sweep(Utc::now()) {
                    Ok(outcome) if outcome.resolved > 0 || outcome.failed > 0 => {
                        info!(
                            examined = outcome.examined,
                            resolved = outcome.resolved,
                            failed = outcome.failed,
                            "lifecycle sweep finished"
                        );
                    }
                    Ok(_) => {}
                    Err(error) => {
                        warn!(%error, "lifecycle sweep could not list applications; retrying next tick");
                    }
                }
            }
        })
    }
}

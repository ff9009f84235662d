//! Consumer loan lifecycle workflow: intake validation, the timed
//! underwriting pipeline, repayment tracking, and the dashboard
//! projections derived from stored records.

pub mod calculator;
pub mod domain;
pub mod intake;
pub mod lifecycle;
pub mod notifications;
pub mod repository;
pub mod router;
pub mod schedule;
pub mod service;
pub mod underwriting;
pub mod views;

#[cfg(test)]
mod tests;

pub use calculator::{LoanQuote, QuoteRequest};
pub use domain::{
    DisplayStatus, DocumentKind, DocumentRef, EmploymentCategory, Installment, InstallmentStatus,
    LoanCategory, LoanFacts, LoanId, LoanStatus, LoanSubmission, LoanTerms, PersonalDetails,
    QuickSubmission, RegistrationRequest, UserId,
};
pub use intake::{IntakeError, IntakeGuard, IntakeRules};
pub use lifecycle::{display_status, LifecycleConfig, LifecycleEngine, SweepOutcome};
pub use notifications::NotificationRecord;
pub use repository::{
    LoanRecord, LoanResolution, LoanStore, NotificationError, NotificationStore, RepositoryError,
    ResolutionWrite, UserProfile,
};
pub use router::loan_router;
pub use schedule::{build_plan, RepaymentPlan};
pub use service::{LoanService, LoanServiceError, PaymentError};
pub use underwriting::{decide, Decision, RejectionReason, UnderwritingPolicy};
pub use views::{LoanListQuery, LoanSort};

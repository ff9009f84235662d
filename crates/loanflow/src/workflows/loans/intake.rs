use super::domain::{
    LoanFacts, LoanSubmission, PersonalDetails, QuickSubmission, RegistrationRequest,
};

/// Validation errors raised by the intake guard. Surfaced verbatim so
/// clients can show them inline next to the offending field.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("requested principal must be at least {minimum}")]
    PrincipalBelowMinimum { minimum: f64 },
    #[error("declared monthly income must be at least {minimum}")]
    IncomeBelowMinimum { minimum: f64 },
    #[error("amounts must be finite numbers")]
    AmountNotNumeric,
    #[error("a term of {term} months is not offered")]
    TermNotOffered { term: u32 },
    #[error("employment category is required")]
    EmploymentMissing,
    #[error("full name must be at least {minimum} characters")]
    NameTooShort { minimum: usize },
    #[error("email address looks invalid")]
    EmailInvalid,
    #[error("phone number must contain at least {minimum} digits")]
    PhoneTooShort { minimum: usize },
    #[error("no earlier application to carry details over from")]
    NoPriorApplication,
}

const DEFAULT_MINIMUM_PRINCIPAL: f64 = 500.0;
const DEFAULT_MINIMUM_INCOME: f64 = 100.0;
const DEFAULT_OFFERED_TERMS: [u32; 5] = [1, 3, 6, 9, 12];
const DEFAULT_MINIMUM_NAME_CHARS: usize = 2;
const DEFAULT_MINIMUM_PHONE_DIGITS: usize = 10;

/// Product floors enforced at submission time, before the underwriting
/// policy ever sees the application.
#[derive(Debug, Clone, PartialEq)]
pub struct IntakeRules {
    pub minimum_principal: f64,
    pub minimum_monthly_income: f64,
    pub offered_terms: Vec<u32>,
    pub minimum_name_chars: usize,
    pub minimum_phone_digits: usize,
}

impl Default for IntakeRules {
    fn default() -> Self {
        Self {
            minimum_principal: DEFAULT_MINIMUM_PRINCIPAL,
            minimum_monthly_income: DEFAULT_MINIMUM_INCOME,
            offered_terms: DEFAULT_OFFERED_TERMS.to_vec(),
            minimum_name_chars: DEFAULT_MINIMUM_NAME_CHARS,
            minimum_phone_digits: DEFAULT_MINIMUM_PHONE_DIGITS,
        }
    }
}

/// Guard responsible for producing immutable `LoanFacts` from inbound
/// submissions.
#[derive(Debug, Clone, Default)]
pub struct IntakeGuard {
    rules: IntakeRules,
}

impl IntakeGuard {
    pub fn with_rules(rules: IntakeRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &IntakeRules {
        &self.rules
    }

    /// Convert a full multi-step submission into loan facts.
    pub fn facts_from_submission(
        &self,
        submission: LoanSubmission,
    ) -> Result<LoanFacts, IntakeError> {
        self.check_financials(
            submission.principal,
            submission.monthly_income,
            submission.term_months,
            &submission.employment,
        )?;
        self.check_personal(&submission.personal)?;

        Ok(LoanFacts {
            principal: submission.principal,
            term_months: submission.term_months,
            monthly_income: submission.monthly_income,
            employment: submission.employment.trim().to_string(),
            category: submission.category,
            personal: Some(submission.personal),
            documents: submission.documents,
        })
    }

    /// Quick re-apply: fresh financial facts, with income, identity, and
    /// documents carried over from the applicant's previous facts.
    pub fn facts_from_quick(
        &self,
        submission: QuickSubmission,
        previous: &LoanFacts,
    ) -> Result<LoanFacts, IntakeError> {
        self.check_financials(
            submission.principal,
            previous.monthly_income,
            submission.term_months,
            &submission.employment,
        )?;

        Ok(LoanFacts {
            principal: submission.principal,
            term_months: submission.term_months,
            monthly_income: previous.monthly_income,
            employment: submission.employment.trim().to_string(),
            category: submission.category,
            personal: previous.personal.clone(),
            documents: previous.documents.clone(),
        })
    }

    pub fn check_registration(&self, request: &RegistrationRequest) -> Result<(), IntakeError> {
        if request.full_name.trim().chars().count() < self.rules.minimum_name_chars {
            return Err(IntakeError::NameTooShort {
                minimum: self.rules.minimum_name_chars,
            });
        }
        if !plausible_email(&request.email) {
            return Err(IntakeError::EmailInvalid);
        }
        Ok(())
    }

    fn check_financials(
        &self,
        principal: f64,
        income: f64,
        term: u32,
        employment: &str,
    ) -> Result<(), IntakeError> {
        if !principal.is_finite() || !income.is_finite() {
            return Err(IntakeError::AmountNotNumeric);
        }
        if principal < self.rules.minimum_principal {
            return Err(IntakeError::PrincipalBelowMinimum {
                minimum: self.rules.minimum_principal,
            });
        }
        if income < self.rules.minimum_monthly_income {
            return Err(IntakeError::IncomeBelowMinimum {
                minimum: self.rules.minimum_monthly_income,
            });
        }
        if !self.rules.offered_terms.contains(&term) {
            return Err(IntakeError::TermNotOffered { term });
        }
        if employment.trim().is_empty() {
            return Err(IntakeError::EmploymentMissing);
        }
        Ok(())
    }

    fn check_personal(&self, personal: &PersonalDetails) -> Result<(), IntakeError> {
        if personal.full_name.trim().chars().count() < self.rules.minimum_name_chars {
            return Err(IntakeError::NameTooShort {
                minimum: self.rules.minimum_name_chars,
            });
        }
        if !plausible_email(&personal.email) {
            return Err(IntakeError::EmailInvalid);
        }
        let digits = personal
            .phone
            .chars()
            .filter(|c| c.is_ascii_digit())
            .count();
        if digits < self.rules.minimum_phone_digits {
            return Err(IntakeError::PhoneTooShort {
                minimum: self.rules.minimum_phone_digits,
            });
        }
        Ok(())
    }
}

fn plausible_email(raw: &str) -> bool {
    match raw.trim().split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

//! The employment-based decision table. Applied exactly once per
//! application by the lifecycle engine; the outward contract stays binary
//! even though rejections carry a reason internally.

use serde::{Deserialize, Serialize};

use super::domain::{EmploymentCategory, LoanFacts};

/// Thresholds behind the decision table. The defaults are the observed
/// production values, kept here as dials rather than constants scattered
/// through the rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnderwritingPolicy {
    /// Employed and self-employed applicants need income of at least this
    /// multiple of the requested principal.
    pub employed_income_multiple: f64,
    /// Unemployed applicants need income of at least this multiple.
    pub unemployed_income_multiple: f64,
    /// Students may not borrow more than this.
    pub student_principal_cap: f64,
    /// Students must declare at least this monthly income.
    pub student_income_floor: f64,
}

impl Default for UnderwritingPolicy {
    fn default() -> Self {
        Self {
            employed_income_multiple: 1.5,
            unemployed_income_multiple: 3.0,
            student_principal_cap: 5000.0,
            student_income_floor: 1000.0,
        }
    }
}

/// Outcome of applying the decision table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Decision {
    Approved,
    Rejected(RejectionReason),
}

impl Decision {
    pub fn is_approved(&self) -> bool {
        matches!(self, Decision::Approved)
    }
}

/// Why an application was turned down. Logged for operators; applicants
/// only ever see the binary outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RejectionReason {
    InsufficientIncome { required: f64, declared: f64 },
    StudentCriteriaNotMet { principal_cap: f64, income_floor: f64 },
    UnrecognizedEmployment(String),
    UnusableAmounts,
}

impl RejectionReason {
    pub fn summary(&self) -> String {
        match self {
            RejectionReason::InsufficientIncome { required, declared } => format!(
                "declared income {declared:.2} below the required {required:.2}"
            ),
            RejectionReason::StudentCriteriaNotMet {
                principal_cap,
                income_floor,
            } => format!(
                "student applications need principal at most {principal_cap:.2} and income at least {income_floor:.2}"
            ),
            RejectionReason::UnrecognizedEmployment(raw) => {
                format!("employment category '{raw}' is not recognized")
            }
            RejectionReason::UnusableAmounts => {
                "principal or income was not a usable number".to_string()
            }
        }
    }
}

/// Apply the decision table to one application's facts. Deterministic and
/// total: malformed numbers reject instead of panicking, so one bad stored
/// record cannot take down a sweep.
pub fn decide(facts: &LoanFacts, policy: &UnderwritingPolicy) -> Decision {
    let principal = facts.principal;
    let income = facts.monthly_income;

    if !principal.is_finite() || !income.is_finite() || principal <= 0.0 {
        return Decision::Rejected(RejectionReason::UnusableAmounts);
    }

    match EmploymentCategory::parse(&facts.employment) {
        Some(EmploymentCategory::Employed) | Some(EmploymentCategory::SelfEmployed) => {
            let required = policy.employed_income_multiple * principal;
            if income >= required {
                Decision::Approved
            } else {
                Decision::Rejected(RejectionReason::InsufficientIncome {
                    required,
                    declared: income,
                })
            }
        }
        Some(EmploymentCategory::Student) => {
            if principal <= policy.student_principal_cap && income >= policy.student_income_floor {
                Decision::Approved
            } else {
                Decision::Rejected(RejectionReason::StudentCriteriaNotMet {
                    principal_cap: policy.student_principal_cap,
                    income_floor: policy.student_income_floor,
                })
            }
        }
        Some(EmploymentCategory::Unemployed) => {
            let required = policy.unemployed_income_multiple * principal;
            if income >= required {
                Decision::Approved
            } else {
                Decision::Rejected(RejectionReason::InsufficientIncome {
                    required,
                    declared: income,
                })
            }
        }
        None => Decision::Rejected(RejectionReason::UnrecognizedEmployment(
            facts.employment.trim().to_string(),
        )),
    }
}

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// Identifier wrapper for loan applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LoanId(pub String);

/// Identifier for an account holder, issued by the authentication boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Product catalogue entry. Each category carries a fixed annual interest
/// rate; there is no per-applicant pricing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanCategory {
    Personal,
    Student,
    Mortgage,
    Auto,
    Business,
    Education,
}

impl LoanCategory {
    pub const fn annual_rate_percent(self) -> f64 {
        match self {
            LoanCategory::Personal => 15.0,
            LoanCategory::Student => 10.0,
            LoanCategory::Mortgage => 8.0,
            LoanCategory::Auto => 12.0,
            LoanCategory::Business => 14.0,
            LoanCategory::Education => 10.0,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            LoanCategory::Personal => "personal",
            LoanCategory::Student => "student",
            LoanCategory::Mortgage => "mortgage",
            LoanCategory::Auto => "auto",
            LoanCategory::Business => "business",
            LoanCategory::Education => "education",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "personal" => Some(Self::Personal),
            "student" => Some(Self::Student),
            "mortgage" => Some(Self::Mortgage),
            "auto" => Some(Self::Auto),
            "business" => Some(Self::Business),
            "education" => Some(Self::Education),
            _ => None,
        }
    }
}

/// Employment buckets recognized by the underwriting rule. Submissions carry
/// the applicant's free-text declaration; normalization happens here, at
/// decision time, so a stored record never loses what was actually declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmploymentCategory {
    Employed,
    SelfEmployed,
    Student,
    Unemployed,
}

impl EmploymentCategory {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "employed" => Some(Self::Employed),
            "self-employed" => Some(Self::SelfEmployed),
            "student" => Some(Self::Student),
            "unemployed" => Some(Self::Unemployed),
            _ => None,
        }
    }
}

/// Authoritative stored status. Records are pending until the lifecycle
/// engine applies its one-time decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Pending,
    Approved,
    Rejected,
}

impl LoanStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, LoanStatus::Approved | LoanStatus::Rejected)
    }

    pub const fn label(self) -> &'static str {
        match self {
            LoanStatus::Pending => "pending",
            LoanStatus::Approved => "approved",
            LoanStatus::Rejected => "rejected",
        }
    }
}

/// Time-derived projection shown on dashboards; never persisted. The extra
/// `UnderReview` stop exists only in this projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayStatus {
    Pending,
    UnderReview,
    Approved,
    Rejected,
}

impl DisplayStatus {
    pub const fn label(self) -> &'static str {
        match self {
            DisplayStatus::Pending => "pending",
            DisplayStatus::UnderReview => "under_review",
            DisplayStatus::Approved => "approved",
            DisplayStatus::Rejected => "rejected",
        }
    }

    pub const fn progress_percent(self) -> u8 {
        match self {
            DisplayStatus::Pending => 33,
            DisplayStatus::UnderReview => 66,
            DisplayStatus::Approved | DisplayStatus::Rejected => 100,
        }
    }

    /// The status card's fixed progress stops, in rendering order.
    pub const fn stops() -> [DisplayStatus; 4] {
        [
            DisplayStatus::Pending,
            DisplayStatus::UnderReview,
            DisplayStatus::Approved,
            DisplayStatus::Rejected,
        ]
    }
}

/// Repayment state of a single installment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallmentStatus {
    Due,
    Paid,
    Missed,
}

impl InstallmentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            InstallmentStatus::Due => "due",
            InstallmentStatus::Paid => "paid",
            InstallmentStatus::Missed => "missed",
        }
    }
}

/// One scheduled repayment. The parent map keys these `month1..monthN`;
/// display ordering always goes by due date, never by key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installment {
    pub due_on: NaiveDate,
    pub amount: f64,
    pub status: InstallmentStatus,
}

/// Applicant identity snapshot collected by the multi-step form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalDetails {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: NaiveDate,
}

/// Supporting document slots captured at submission. Metadata only; the
/// service stores no file contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Aadhaar,
    Pan,
    IncomeProof,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub kind: DocumentKind,
    pub file_name: String,
}

/// Facts captured at submission. Immutable once the record exists; the
/// lifecycle engine only ever adds an outcome next to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanFacts {
    pub principal: f64,
    pub term_months: u32,
    pub monthly_income: f64,
    pub employment: String,
    pub category: LoanCategory,
    pub personal: Option<PersonalDetails>,
    #[serde(default)]
    pub documents: Vec<DocumentRef>,
}

/// Derived pricing attached by the one-time resolution write. Present iff
/// the application was approved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanTerms {
    pub annual_rate_percent: f64,
    pub emi: f64,
    pub total_payable: f64,
    pub installments: std::collections::BTreeMap<String, Installment>,
}

/// Full multi-step submission payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanSubmission {
    #[serde(deserialize_with = "amount_from_value")]
    pub principal: f64,
    pub term_months: u32,
    #[serde(deserialize_with = "amount_from_value")]
    pub monthly_income: f64,
    pub employment: String,
    pub category: LoanCategory,
    pub personal: PersonalDetails,
    #[serde(default)]
    pub documents: Vec<DocumentRef>,
}

/// Quick re-apply payload. Income, identity, and documents carry over from
/// the applicant's latest application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickSubmission {
    #[serde(deserialize_with = "amount_from_value")]
    pub principal: f64,
    pub term_months: u32,
    pub employment: String,
    pub category: LoanCategory,
}

/// Account registration payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRequest {
    pub full_name: String,
    pub email: String,
}

/// Earlier clients stored amounts both as numbers and as numeric strings;
/// accept either shape on the way in. Non-numeric text still fails the
/// deserializer, and non-finite values fail intake validation afterwards.
pub(crate) fn amount_from_value<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawAmount {
        Number(f64),
        Text(String),
    }

    match RawAmount::deserialize(deserializer)? {
        RawAmount::Number(value) => Ok(value),
        RawAmount::Text(raw) => raw.trim().parse::<f64>().map_err(serde::de::Error::custom),
    }
}

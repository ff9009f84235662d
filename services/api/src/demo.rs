use crate::infra::{InMemoryLoanStore, InMemoryNotificationStore};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use clap::Args;
use std::sync::Arc;

use loanflow::error::AppError;
use loanflow::workflows::loans::calculator;
use loanflow::workflows::loans::{
    DisplayStatus, DocumentKind, DocumentRef, LifecycleConfig, LifecycleEngine, LoanCategory,
    LoanService, LoanSubmission, PersonalDetails, QuoteRequest, RegistrationRequest, UserId,
};

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Requested principal amount
    #[arg(long, default_value_t = 10000.0)]
    pub(crate) principal: f64,
    /// Repayment term in months (1, 3, 6, 9, or 12)
    #[arg(long, default_value_t = 12)]
    pub(crate) term_months: u32,
    /// Declared monthly income
    #[arg(long, default_value_t = 20000.0)]
    pub(crate) monthly_income: f64,
    /// Employment status (employed, self-employed, student, or unemployed)
    #[arg(long, default_value = "employed")]
    pub(crate) employment: String,
    /// Loan category
    #[arg(long, value_parser = crate::infra::parse_category, default_value = "personal")]
    pub(crate) category: LoanCategory,
    /// Skip the repayment portion of the demo
    #[arg(long)]
    pub(crate) skip_repayment: bool,
}

#[derive(Args, Debug)]
pub(crate) struct QuoteArgs {
    /// Principal amount to price
    #[arg(long)]
    pub(crate) principal: f64,
    /// Repayment term in months
    #[arg(long)]
    pub(crate) term_months: u32,
    /// Loan category supplying the default annual rate
    #[arg(long, value_parser = crate::infra::parse_category)]
    pub(crate) category: Option<LoanCategory>,
    /// Override the annual interest rate (percent)
    #[arg(long)]
    pub(crate) annual_rate_percent: Option<f64>,
    /// Processing fee as a percentage of principal (defaults to 1%)
    #[arg(long)]
    pub(crate) processing_fee_percent: Option<f64>,
    /// Add the flat insurance charge to the totals
    #[arg(long)]
    pub(crate) include_insurance: bool,
    /// Declared monthly income, enabling the affordability check
    #[arg(long)]
    pub(crate) monthly_income: Option<f64>,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        principal,
        term_months,
        monthly_income,
        employment,
        category,
        skip_repayment,
    } = args;

    println!("Loan lifecycle demo");
    println!(
        "Scenario: {} loan of {principal:.0} over {term_months} months, income {monthly_income:.0} ({employment})",
        category.label()
    );

    let store = Arc::new(InMemoryLoanStore::default());
    let notifications = Arc::new(InMemoryNotificationStore::default());
    let config = LifecycleConfig::default();
    let service = LoanService::new(store.clone(), notifications.clone(), config.clone());
    let engine = LifecycleEngine::new(store, notifications, config);

    let user = UserId("demo-user".to_string());
    let submitted_at = Utc::now();

    let profile = match service.register(
        &user,
        RegistrationRequest {
            full_name: "Asha Verma".to_string(),
            email: "asha@example.com".to_string(),
        },
        submitted_at,
    ) {
        Ok(profile) => profile,
        Err(err) => {
            println!("  Registration failed: {err}");
            return Ok(());
        }
    };
    println!("- Registered {} ({})", profile.full_name, profile.email);

    let submission = demo_submission(principal, term_months, monthly_income, employment, category);
    let record = match service.submit(&user, submission, submitted_at) {
        Ok(record) => record,
        Err(err) => {
            println!("  Submission rejected: {err}");
            return Ok(());
        }
    };
    println!("- Application {} accepted for review", record.id.0);

    println!("\nStatus rail (timestamps simulated so the demo finishes instantly)");
    print_status_line(
        &service,
        &user,
        submitted_at + Duration::seconds(5),
        "5s after submission",
    );
    print_status_line(
        &service,
        &user,
        submitted_at + Duration::seconds(11),
        "11s after submission",
    );

    match engine.sweep(submitted_at + Duration::seconds(15)) {
        Ok(outcome) => println!(
            "- Sweep at 15s: examined {}, resolved {} (decision window still open)",
            outcome.examined, outcome.resolved
        ),
        Err(err) => {
            println!("  Sweep failed: {err}");
            return Ok(());
        }
    }

    let decided_at = submitted_at + Duration::seconds(21);
    match engine.sweep(decided_at) {
        Ok(outcome) => println!("- Sweep at 21s: resolved {}", outcome.resolved),
        Err(err) => {
            println!("  Sweep failed: {err}");
            return Ok(());
        }
    }

    let card = match service.latest_status(&user, decided_at + Duration::seconds(1)) {
        Ok(Some(card)) => card,
        Ok(None) => {
            println!("  No application on file");
            return Ok(());
        }
        Err(err) => {
            println!("  Status unavailable: {err}");
            return Ok(());
        }
    };

    println!("\nDecision");
    println!(
        "Status card: {} ({}% along the rail)",
        card.status_label, card.progress_percent
    );
    for stop in &card.stops {
        println!("  [{}] {}", if stop.reached { "x" } else { " " }, stop.label);
    }
    if card.celebrate {
        match service.acknowledge_celebration(&user, &record.id) {
            Ok(ack) if ack.was_pending => println!("  Approval celebration shown and acknowledged"),
            Ok(_) => {}
            Err(err) => println!("  Celebration lookup failed: {err}"),
        }
    }

    match serde_json::to_string_pretty(&card) {
        Ok(json) => println!("Status payload:\n{json}"),
        Err(err) => println!("Status payload unavailable: {err}"),
    }

    if card.status != DisplayStatus::Approved {
        print_feed(&service, &user);
        return Ok(());
    }

    let detail = match service.loan_detail(&user, &record.id, decided_at + Duration::seconds(1)) {
        Ok(detail) => detail,
        Err(err) => {
            println!("  Detail unavailable: {err}");
            return Ok(());
        }
    };
    if let (Some(rate), Some(emi), Some(total)) = (
        detail.annual_rate_percent,
        detail.emi,
        detail.total_payable,
    ) {
        println!("\nTerms: {rate}% annual | EMI {emi:.0} | total payable {total:.0}");
    }
    println!("Repayment schedule");
    for row in &detail.installments {
        println!(
            "  - {} | due {} | {:.0} | {}",
            row.key, row.due_on, row.amount, row.status_label
        );
    }

    if skip_repayment {
        return Ok(());
    }

    println!("\nRepayment walkthrough");
    match service.pay_installment(&user, &record.id, "month1", true) {
        Ok(payment) => println!(
            "- Paid {} ({:.0}); outstanding {:.0}",
            payment.installment.key, payment.installment.amount, payment.outstanding
        ),
        Err(err) => println!("  Payment refused: {err}"),
    }
    match service.pay_off(&user, &record.id) {
        Ok(payoff) => println!(
            "- Paid off the remaining {} installments (fully paid: {})",
            payoff.newly_paid, payoff.fully_paid
        ),
        Err(err) => println!("  Payoff refused: {err}"),
    }
    match service.pay_off(&user, &record.id) {
        Ok(payoff) => println!(
            "- A second payoff touches {} installments",
            payoff.newly_paid
        ),
        Err(err) => println!("  Payoff refused: {err}"),
    }

    match service.history(&user) {
        Ok(entries) => {
            for entry in &entries {
                println!(
                    "- History: {} has {} paid installments (settled: {})",
                    entry.loan_id,
                    entry.paid_installments.len(),
                    entry.fully_paid
                );
            }
        }
        Err(err) => println!("  History unavailable: {err}"),
    }

    match service.calendar(&user) {
        Ok(calendar) => println!(
            "- Calendar: {} active loans, {} marked dates, {:.0} outstanding",
            calendar.active.len(),
            calendar.marked_dates.len(),
            calendar.total_outstanding
        ),
        Err(err) => println!("  Calendar unavailable: {err}"),
    }

    print_feed(&service, &user);

    Ok(())
}

pub(crate) fn run_quote(args: QuoteArgs) -> Result<(), AppError> {
    let QuoteArgs {
        principal,
        term_months,
        category,
        annual_rate_percent,
        processing_fee_percent,
        include_insurance,
        monthly_income,
    } = args;

    let quote = calculator::quote(&QuoteRequest {
        principal,
        term_months,
        category,
        annual_rate_percent,
        processing_fee_percent,
        include_insurance,
        monthly_income,
    });

    println!("Loan quote");
    println!("- Monthly EMI: {:.2}", quote.monthly_emi);
    println!("- Total interest: {:.2}", quote.total_interest);
    println!("- Total payment: {:.2}", quote.total_payment);
    println!("- Processing fee: {:.2}", quote.processing_fee);
    if quote.insurance_charge > 0.0 {
        println!("- Insurance charge: {:.2}", quote.insurance_charge);
    }
    println!("- Total with fees: {:.2}", quote.total_with_fees);
    match quote.affordable {
        Some(true) => println!("- Affordability: the EMI fits within half of the declared income"),
        Some(false) => println!("- Affordability: the EMI exceeds half of the declared income"),
        None => {}
    }

    Ok(())
}

fn demo_submission(
    principal: f64,
    term_months: u32,
    monthly_income: f64,
    employment: String,
    category: LoanCategory,
) -> LoanSubmission {
    LoanSubmission {
        principal,
        term_months,
        monthly_income,
        employment,
        category,
        personal: PersonalDetails {
            full_name: "Asha Verma".to_string(),
            email: "asha@example.com".to_string(),
            phone: "9876543210".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1994, 3, 21).unwrap_or_default(),
        },
        documents: vec![
            DocumentRef {
                kind: DocumentKind::Aadhaar,
                file_name: "aadhaar.pdf".to_string(),
            },
            DocumentRef {
                kind: DocumentKind::IncomeProof,
                file_name: "salary-slips.pdf".to_string(),
            },
        ],
    }
}

fn print_status_line(
    service: &LoanService<InMemoryLoanStore, InMemoryNotificationStore>,
    user: &UserId,
    at: DateTime<Utc>,
    heading: &str,
) {
    match service.latest_status(user, at) {
        Ok(Some(card)) => println!(
            "- {heading}: {} ({}% along)",
            card.status_label, card.progress_percent
        ),
        Ok(None) => println!("- {heading}: no application on file"),
        Err(err) => println!("- {heading}: status unavailable ({err})"),
    }
}

fn print_feed(
    service: &LoanService<InMemoryLoanStore, InMemoryNotificationStore>,
    user: &UserId,
) {
    match service.notifications(user) {
        Ok(feed) if feed.is_empty() => println!("\nNotification feed: empty"),
        Ok(feed) => {
            println!("\nNotification feed (newest first)");
            for note in feed {
                println!(
                    "- [{}] {}",
                    note.timestamp.format("%Y-%m-%d %H:%M"),
                    note.message
                );
            }
        }
        Err(err) => println!("\nNotification feed unavailable: {err}"),
    }
}

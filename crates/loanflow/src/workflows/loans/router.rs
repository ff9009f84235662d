use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::calculator::QuoteRequest;
use super::domain::{LoanId, LoanSubmission, QuickSubmission, RegistrationRequest, UserId};
use super::repository::{LoanStore, NotificationStore, RepositoryError};
use super::service::{LoanService, LoanServiceError, PaymentError};
use super::views::LoanListQuery;

/// Router builder exposing the loan workflow over HTTP. All user-scoped
/// routes trust the path's user id; authentication sits in front of this
/// service, not inside it.
pub fn loan_router<S, N>(service: Arc<LoanService<S, N>>) -> Router
where
    S: LoanStore + 'static,
    N: NotificationStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/users/:user_id/profile",
            post(register_handler::<S, N>),
        )
        .route(
            "/api/v1/users/:user_id/overview",
            get(overview_handler::<S, N>),
        )
        .route(
            "/api/v1/users/:user_id/loans",
            post(submit_handler::<S, N>).get(list_handler::<S, N>),
        )
        .route(
            "/api/v1/users/:user_id/loans/quick",
            post(quick_submit_handler::<S, N>),
        )
        .route(
            "/api/v1/users/:user_id/loans/latest/status",
            get(latest_status_handler::<S, N>),
        )
        .route(
            "/api/v1/users/:user_id/loans/:loan_id",
            get(detail_handler::<S, N>),
        )
        .route(
            "/api/v1/users/:user_id/loans/:loan_id/installments/:installment_key/payment",
            post(pay_installment_handler::<S, N>),
        )
        .route(
            "/api/v1/users/:user_id/loans/:loan_id/payoff",
            post(payoff_handler::<S, N>),
        )
        .route(
            "/api/v1/users/:user_id/loans/:loan_id/celebration",
            post(celebration_handler::<S, N>),
        )
        .route(
            "/api/v1/users/:user_id/calendar",
            get(calendar_handler::<S, N>),
        )
        .route(
            "/api/v1/users/:user_id/history",
            get(history_handler::<S, N>),
        )
        .route(
            "/api/v1/users/:user_id/notifications",
            get(notifications_handler::<S, N>),
        )
        .route("/api/v1/quote", post(quote_handler::<S, N>))
        .with_state(service)
}

/// Body for the single-installment payment action. Anything short of an
/// explicit `{"confirm": true}` counts as unconfirmed.
#[derive(Debug, Deserialize)]
pub(crate) struct PaymentRequest {
    #[serde(default)]
    confirm: bool,
}

pub(crate) async fn register_handler<S, N>(
    State(service): State<Arc<LoanService<S, N>>>,
    Path(user_id): Path<String>,
    axum::Json(request): axum::Json<RegistrationRequest>,
) -> Response
where
    S: LoanStore + 'static,
    N: NotificationStore + 'static,
{
    let user = UserId(user_id);
    match service.register(&user, request, Utc::now()) {
        Ok(profile) => (StatusCode::CREATED, axum::Json(profile)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn overview_handler<S, N>(
    State(service): State<Arc<LoanService<S, N>>>,
    Path(user_id): Path<String>,
) -> Response
where
    S: LoanStore + 'static,
    N: NotificationStore + 'static,
{
    let user = UserId(user_id);
    match service.overview(&user) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn submit_handler<S, N>(
    State(service): State<Arc<LoanService<S, N>>>,
    Path(user_id): Path<String>,
    axum::Json(submission): axum::Json<LoanSubmission>,
) -> Response
where
    S: LoanStore + 'static,
    N: NotificationStore + 'static,
{
    let user = UserId(user_id);
    let now = Utc::now();
    match service.submit(&user, submission, now) {
        Ok(record) => {
            let view = service.summary_view(&record, now);
            (StatusCode::ACCEPTED, axum::Json(view)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn quick_submit_handler<S, N>(
    State(service): State<Arc<LoanService<S, N>>>,
    Path(user_id): Path<String>,
    axum::Json(submission): axum::Json<QuickSubmission>,
) -> Response
where
    S: LoanStore + 'static,
    N: NotificationStore + 'static,
{
    let user = UserId(user_id);
    let now = Utc::now();
    match service.submit_quick(&user, submission, now) {
        Ok(record) => {
            let view = service.summary_view(&record, now);
            (StatusCode::ACCEPTED, axum::Json(view)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn list_handler<S, N>(
    State(service): State<Arc<LoanService<S, N>>>,
    Path(user_id): Path<String>,
    Query(query): Query<LoanListQuery>,
) -> Response
where
    S: LoanStore + 'static,
    N: NotificationStore + 'static,
{
    let user = UserId(user_id);
    match service.list(&user, &query, Utc::now()) {
        Ok(rows) => (StatusCode::OK, axum::Json(rows)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn latest_status_handler<S, N>(
    State(service): State<Arc<LoanService<S, N>>>,
    Path(user_id): Path<String>,
) -> Response
where
    S: LoanStore + 'static,
    N: NotificationStore + 'static,
{
    let user = UserId(user_id);
    match service.latest_status(&user, Utc::now()) {
        // A user with no applications is a normal dashboard state, not 404.
        Ok(card) => (StatusCode::OK, axum::Json(card)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn detail_handler<S, N>(
    State(service): State<Arc<LoanService<S, N>>>,
    Path((user_id, loan_id)): Path<(String, String)>,
) -> Response
where
    S: LoanStore + 'static,
    N: NotificationStore + 'static,
{
    let user = UserId(user_id);
    let id = LoanId(loan_id);
    match service.loan_detail(&user, &id, Utc::now()) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn pay_installment_handler<S, N>(
    State(service): State<Arc<LoanService<S, N>>>,
    Path((user_id, loan_id, installment_key)): Path<(String, String, String)>,
    payload: Option<axum::Json<PaymentRequest>>,
) -> Response
where
    S: LoanStore + 'static,
    N: NotificationStore + 'static,
{
    let user = UserId(user_id);
    let id = LoanId(loan_id);
    let confirmed = payload.map(|axum::Json(body)| body.confirm).unwrap_or(false);
    match service.pay_installment(&user, &id, &installment_key, confirmed) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn payoff_handler<S, N>(
    State(service): State<Arc<LoanService<S, N>>>,
    Path((user_id, loan_id)): Path<(String, String)>,
) -> Response
where
    S: LoanStore + 'static,
    N: NotificationStore + 'static,
{
    let user = UserId(user_id);
    let id = LoanId(loan_id);
    match service.pay_off(&user, &id) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn celebration_handler<S, N>(
    State(service): State<Arc<LoanService<S, N>>>,
    Path((user_id, loan_id)): Path<(String, String)>,
) -> Response
where
    S: LoanStore + 'static,
    N: NotificationStore + 'static,
{
    let user = UserId(user_id);
    let id = LoanId(loan_id);
    match service.acknowledge_celebration(&user, &id) {
        Ok(ack) => (StatusCode::OK, axum::Json(ack)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn calendar_handler<S, N>(
    State(service): State<Arc<LoanService<S, N>>>,
    Path(user_id): Path<String>,
) -> Response
where
    S: LoanStore + 'static,
    N: NotificationStore + 'static,
{
    let user = UserId(user_id);
    match service.calendar(&user) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn history_handler<S, N>(
    State(service): State<Arc<LoanService<S, N>>>,
    Path(user_id): Path<String>,
) -> Response
where
    S: LoanStore + 'static,
    N: NotificationStore + 'static,
{
    let user = UserId(user_id);
    match service.history(&user) {
        Ok(entries) => (StatusCode::OK, axum::Json(entries)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn notifications_handler<S, N>(
    State(service): State<Arc<LoanService<S, N>>>,
    Path(user_id): Path<String>,
) -> Response
where
    S: LoanStore + 'static,
    N: NotificationStore + 'static,
{
    let user = UserId(user_id);
    match service.notifications(&user) {
        Ok(records) => (StatusCode::OK, axum::Json(records)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn quote_handler<S, N>(
    State(service): State<Arc<LoanService<S, N>>>,
    axum::Json(request): axum::Json<QuoteRequest>,
) -> Response
where
    S: LoanStore + 'static,
    N: NotificationStore + 'static,
{
    let quote = service.quote(&request);
    (StatusCode::OK, axum::Json(quote)).into_response()
}

fn error_response(error: LoanServiceError) -> Response {
    let status = match &error {
        LoanServiceError::Intake(_) => StatusCode::UNPROCESSABLE_ENTITY,
        LoanServiceError::Payment(PaymentError::ConfirmationRequired)
        | LoanServiceError::Payment(PaymentError::InstallmentMissed) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        LoanServiceError::Payment(PaymentError::AlreadyPaid)
        | LoanServiceError::Payment(PaymentError::LoanNotApproved) => StatusCode::CONFLICT,
        LoanServiceError::Payment(PaymentError::UnknownInstallment) => StatusCode::NOT_FOUND,
        LoanServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        LoanServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        LoanServiceError::Repository(RepositoryError::Unavailable(_))
        | LoanServiceError::Notification(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}

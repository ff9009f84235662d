use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::{
    build_stack, lifecycle_config, read_json_body, registration, resolved_loan, submission,
    MemoryLoanStore, MemoryNotifications, UnavailableStore,
};
use crate::workflows::loans::domain::LoanCategory;
use crate::workflows::loans::router::loan_router;
use crate::workflows::loans::service::LoanService;

#[tokio::test]
async fn submit_handler_rejects_undersized_principals() {
    let stack = build_stack();
    let mut raw = submission();
    raw.principal = 100.0;

    let response = crate::workflows::loans::router::submit_handler::<
        MemoryLoanStore,
        MemoryNotifications,
    >(
        State(stack.service.clone()),
        Path("user-101".to_string()),
        axum::Json(raw),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert!(payload
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .contains("principal"));
}

#[tokio::test]
async fn submit_handler_reports_store_outages() {
    let service = Arc::new(LoanService::new(
        Arc::new(UnavailableStore),
        Arc::new(MemoryNotifications::default()),
        lifecycle_config(),
    ));

    let response = crate::workflows::loans::router::submit_handler::<
        UnavailableStore,
        MemoryNotifications,
    >(
        State(service),
        Path("user-101".to_string()),
        axum::Json(submission()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn submit_route_accepts_loan_applications() {
    let stack = build_stack();
    let router = loan_router(stack.service.clone());

    let response = router
        .oneshot(
            axum::http::Request::post("/api/v1/users/user-101/loans")
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(
                    serde_json::to_vec(&submission()).unwrap(),
                ))
                .unwrap(),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let payload = read_json_body(response).await;
    assert!(payload
        .get("loan_id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .starts_with("loan-"));
    assert_eq!(payload.get("status"), Some(&json!("pending")));
}

#[tokio::test]
async fn malformed_bodies_never_reach_the_service() {
    let stack = build_stack();
    let router = loan_router(stack.service.clone());

    let syntax = router
        .clone()
        .oneshot(
            axum::http::Request::post("/api/v1/users/user-101/loans")
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from("not json"))
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(syntax.status(), StatusCode::BAD_REQUEST);

    let missing_fields = router
        .oneshot(
            axum::http::Request::post("/api/v1/users/user-101/loans")
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(r#"{"principal": 10000}"#))
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(missing_fields.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn latest_status_route_returns_null_for_new_users() {
    let stack = build_stack();
    let router = loan_router(stack.service.clone());

    let response = router
        .oneshot(
            axum::http::Request::get("/api/v1/users/user-101/loans/latest/status")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json_body(response).await, Value::Null);
}

#[tokio::test]
async fn list_route_honours_query_parameters() {
    let stack = build_stack();
    let router = loan_router(stack.service.clone());

    let mut auto = submission();
    auto.principal = 5000.0;
    auto.category = LoanCategory::Auto;
    for raw in [submission(), auto] {
        let response = router
            .clone()
            .oneshot(
                axum::http::Request::post("/api/v1/users/user-101/loans")
                    .header(axum::http::header::CONTENT_TYPE, "application/json")
                    .body(axum::body::Body::from(serde_json::to_vec(&raw).unwrap()))
                    .unwrap(),
            )
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    let sorted = router
        .clone()
        .oneshot(
            axum::http::Request::get("/api/v1/users/user-101/loans?sort=amount_asc")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(sorted.status(), StatusCode::OK);
    let payload = read_json_body(sorted).await;
    let principals: Vec<f64> = payload
        .as_array()
        .expect("array payload")
        .iter()
        .filter_map(|row| row.get("principal").and_then(Value::as_f64))
        .collect();
    assert_eq!(principals, vec![5000.0, 10000.0]);

    let filtered = router
        .oneshot(
            axum::http::Request::get("/api/v1/users/user-101/loans?category=auto")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");
    let payload = read_json_body(filtered).await;
    assert_eq!(payload.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn payment_route_requires_explicit_confirmation() {
    let stack = build_stack();
    let record = resolved_loan(&stack);
    let router = loan_router(stack.service.clone());
    let uri = format!(
        "/api/v1/users/{}/loans/{}/installments/month1/payment",
        record.owner.0, record.id.0
    );

    let bare = router
        .clone()
        .oneshot(
            axum::http::Request::post(&uri)
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(bare.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let declined = router
        .clone()
        .oneshot(
            axum::http::Request::post(&uri)
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(r#"{"confirm": false}"#))
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(declined.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let confirmed = router
        .clone()
        .oneshot(
            axum::http::Request::post(&uri)
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(r#"{"confirm": true}"#))
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(confirmed.status(), StatusCode::OK);
    let payload = read_json_body(confirmed).await;
    assert_eq!(
        payload.pointer("/installment/key").and_then(Value::as_str),
        Some("month1")
    );
    assert_eq!(
        payload.get("outstanding").and_then(Value::as_f64),
        Some(958.0 * 11.0)
    );

    let replay = router
        .oneshot(
            axum::http::Request::post(&uri)
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(r#"{"confirm": true}"#))
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(replay.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn payoff_and_celebration_routes_round_trip() {
    let stack = build_stack();
    let record = resolved_loan(&stack);
    let router = loan_router(stack.service.clone());

    let payoff_uri = format!(
        "/api/v1/users/{}/loans/{}/payoff",
        record.owner.0, record.id.0
    );
    let first = router
        .clone()
        .oneshot(
            axum::http::Request::post(&payoff_uri)
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(first.status(), StatusCode::OK);
    let payload = read_json_body(first).await;
    assert_eq!(payload.get("newly_paid"), Some(&json!(12)));
    assert_eq!(payload.get("fully_paid"), Some(&json!(true)));

    let second = router
        .clone()
        .oneshot(
            axum::http::Request::post(&payoff_uri)
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");
    let payload = read_json_body(second).await;
    assert_eq!(payload.get("newly_paid"), Some(&json!(0)));

    let celebration_uri = format!(
        "/api/v1/users/{}/loans/{}/celebration",
        record.owner.0, record.id.0
    );
    let armed = router
        .clone()
        .oneshot(
            axum::http::Request::post(&celebration_uri)
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");
    let payload = read_json_body(armed).await;
    assert_eq!(payload.get("was_pending"), Some(&json!(true)));

    let acknowledged = router
        .oneshot(
            axum::http::Request::post(&celebration_uri)
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");
    let payload = read_json_body(acknowledged).await;
    assert_eq!(payload.get("was_pending"), Some(&json!(false)));
}

#[tokio::test]
async fn detail_route_renders_the_schedule() {
    let stack = build_stack();
    let record = resolved_loan(&stack);
    let router = loan_router(stack.service.clone());

    let response = router
        .clone()
        .oneshot(
            axum::http::Request::get(format!(
                "/api/v1/users/{}/loans/{}",
                record.owner.0, record.id.0
            ))
            .body(axum::body::Body::empty())
            .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let installments = payload
        .get("installments")
        .and_then(Value::as_array)
        .expect("installments present");
    assert_eq!(installments.len(), 12);
    assert_eq!(
        installments[0].get("key").and_then(Value::as_str),
        Some("month1")
    );

    let missing = router
        .oneshot(
            axum::http::Request::get(format!(
                "/api/v1/users/{}/loans/loan-999999",
                record.owner.0
            ))
            .body(axum::body::Body::empty())
            .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn dashboard_routes_render_for_an_active_loan() {
    let stack = build_stack();
    let record = resolved_loan(&stack);
    stack
        .service
        .pay_installment(&record.owner, &record.id, "month1", true)
        .expect("payment accepted");
    let router = loan_router(stack.service.clone());

    let calendar = router
        .clone()
        .oneshot(
            axum::http::Request::get(format!("/api/v1/users/{}/calendar", record.owner.0))
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(calendar.status(), StatusCode::OK);
    let payload = read_json_body(calendar).await;
    assert_eq!(payload.pointer("/active").and_then(Value::as_array).map(Vec::len), Some(1));
    assert_eq!(
        payload
            .get("marked_dates")
            .and_then(Value::as_array)
            .map(Vec::len),
        Some(11)
    );
    assert_eq!(
        payload.get("total_outstanding").and_then(Value::as_f64),
        Some(958.0 * 11.0)
    );

    let history = router
        .clone()
        .oneshot(
            axum::http::Request::get(format!("/api/v1/users/{}/history", record.owner.0))
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(history.status(), StatusCode::OK);
    let payload = read_json_body(history).await;
    let entries = payload.as_array().expect("array payload");
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries[0]
            .get("paid_installments")
            .and_then(Value::as_array)
            .map(Vec::len),
        Some(1)
    );

    let feed = router
        .oneshot(
            axum::http::Request::get(format!("/api/v1/users/{}/notifications", record.owner.0))
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(feed.status(), StatusCode::OK);
    let payload = read_json_body(feed).await;
    let newest = payload
        .as_array()
        .and_then(|rows| rows.first())
        .and_then(|row| row.get("id"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    assert!(newest.contains("-upcoming-"));
}

#[tokio::test]
async fn quote_route_prices_scenarios() {
    let stack = build_stack();
    let router = loan_router(stack.service.clone());

    let response = router
        .oneshot(
            axum::http::Request::post("/api/v1/quote")
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(
                    json!({
                        "principal": 100000.0,
                        "term_months": 12,
                        "annual_rate_percent": 12.0,
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let emi = payload
        .get("monthly_emi")
        .and_then(Value::as_f64)
        .expect("emi present");
    assert!((emi - 8884.88).abs() < 0.01);
    assert_eq!(
        payload.get("processing_fee").and_then(Value::as_f64),
        Some(1000.0)
    );
}

#[tokio::test]
async fn register_route_creates_profiles_once() {
    let stack = build_stack();
    let router = loan_router(stack.service.clone());

    let created = router
        .clone()
        .oneshot(
            axum::http::Request::post("/api/v1/users/user-101/profile")
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(
                    serde_json::to_vec(&registration()).unwrap(),
                ))
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(created.status(), StatusCode::CREATED);
    let payload = read_json_body(created).await;
    assert_eq!(payload.get("full_name"), Some(&json!("Asha Verma")));

    let duplicate = router
        .oneshot(
            axum::http::Request::post("/api/v1/users/user-101/profile")
                .header(axum::http::header::CONTENT_TYPE, "application/json")
                .body(axum::body::Body::from(
                    serde_json::to_vec(&registration()).unwrap(),
                ))
                .unwrap(),
        )
        .await
        .expect("route executes");
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
}

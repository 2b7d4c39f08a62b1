use axum::http::StatusCode;
use nestegg_shared::auth::create_test_request;
use nestegg_shared::error::StoreError;
use nestegg_shared::models::{Loan, LoanStatus};
use nestegg_shared::store::LoanStore;
use nestegg_shared::test_utils::http_test_utils::response_to_json;
use serde_json::json;
use tower::ServiceExt;

use super::goal_handlers_test::create_test_app;

#[tokio::test]
async fn test_create_and_list_loans() {
    let (app, _store) = create_test_app();

    let response = app
        .clone()
        .oneshot(create_test_request(
            "POST",
            "/loans",
            "owner-1",
            Some(json!({ "lender": "Credit Union", "principal": 5000, "balance": 3200.5 })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let loan = response_to_json(response).await;
    assert_eq!(loan["lender"], "Credit Union");
    assert_eq!(loan["balance"], 3200.5);
    assert_eq!(loan["status"], "active");
    assert_eq!(loan["totalPaid"], 0.0);

    let response = app
        .clone()
        .oneshot(create_test_request("GET", "/loans", "owner-1", None))
        .await
        .unwrap();
    let json_resp = response_to_json(response).await;
    assert_eq!(json_resp["loans"].as_array().unwrap().len(), 1);

    // Loans are private to their owner
    let response = app
        .oneshot(create_test_request("GET", "/loans", "someone-else", None))
        .await
        .unwrap();
    let json_resp = response_to_json(response).await;
    assert!(json_resp["loans"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_create_loan_rejects_balance_above_principal() {
    let (app, _store) = create_test_app();

    let response = app
        .oneshot(create_test_request(
            "POST",
            "/loans",
            "owner-1",
            Some(json!({ "lender": "Bank", "principal": 100, "balance": 150 })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_loan_payments_until_paid_off() {
    let (app, store) = create_test_app();

    let response = app
        .clone()
        .oneshot(create_test_request(
            "POST",
            "/loans",
            "owner-1",
            Some(json!({ "lender": "Bank", "principal": 300 })),
        ))
        .await
        .unwrap();
    let loan = response_to_json(response).await;
    let id = loan["id"].as_str().unwrap().to_string();
    let payments_uri = format!("/loans/{}/payments", id);

    let response = app
        .clone()
        .oneshot(create_test_request(
            "POST",
            &payments_uri,
            "owner-1",
            Some(json!({ "amount": 100, "note": "January" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let json_resp = response_to_json(response).await;
    assert_eq!(json_resp["payment"]["amount"], 100.0);
    assert_eq!(json_resp["loan"]["balance"], 200.0);

    // Overpaying is rejected and leaves the balance alone
    let response = app
        .clone()
        .oneshot(create_test_request(
            "POST",
            &payments_uri,
            "owner-1",
            Some(json!({ "amount": 250 })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(store.get_loan(&id).await.unwrap().balance, 200.0);

    let response = app
        .clone()
        .oneshot(create_test_request(
            "POST",
            &payments_uri,
            "owner-1",
            Some(json!({ "amount": 200 })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let json_resp = response_to_json(response).await;
    assert_eq!(json_resp["loan"]["status"], "paidOff");
    assert_eq!(json_resp["loan"]["totalPaid"], 300.0);

    let response = app
        .oneshot(create_test_request(
            "POST",
            &payments_uri,
            "owner-1",
            Some(json!({ "amount": 1 })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_loan_access_is_owner_only() {
    let (app, _store) = create_test_app();

    let response = app
        .clone()
        .oneshot(create_test_request(
            "POST",
            "/loans",
            "owner-1",
            Some(json!({ "lender": "Bank", "principal": 50 })),
        ))
        .await
        .unwrap();
    let loan = response_to_json(response).await;
    let uri = format!("/loans/{}", loan["id"].as_str().unwrap());

    let response = app
        .clone()
        .oneshot(create_test_request("GET", &uri, "intruder", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .oneshot(create_test_request("GET", "/loans/missing", "owner-1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

fn seeded_loan(id: &str, balance: f64) -> Loan {
    Loan {
        id: id.to_string(),
        owner_id: "owner-1".to_string(),
        lender: "Bank".to_string(),
        principal: 1000.0,
        balance,
        interest_rate: Some(4.5),
        payments: vec![],
        status: LoanStatus::Active,
        created_at: "2026-01-01T00:00:00+00:00".to_string(),
        updated_at: "2026-01-01T00:00:00+00:00".to_string(),
    }
}

#[tokio::test]
async fn test_loan_store_errors_map_to_status_codes() {
    let (app, store) = create_test_app();
    store.insert_loan(seeded_loan("loan-1", 500.0)).await;

    store
        .fail_loan_writes(StoreError::AccessDenied("table policy".into()))
        .await;
    let response = app
        .clone()
        .oneshot(create_test_request(
            "POST",
            "/loans/loan-1/payments",
            "owner-1",
            Some(json!({ "amount": 100 })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(store.get_loan("loan-1").await.unwrap().balance, 500.0);

    store
        .fail_loan_writes(StoreError::ConditionFailed("updatedAt moved".into()))
        .await;
    let response = app
        .clone()
        .oneshot(create_test_request(
            "POST",
            "/loans/loan-1/payments",
            "owner-1",
            Some(json!({ "amount": 100 })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    store
        .fail_loan_reads(StoreError::Other("throttled".into()))
        .await;
    let response = app
        .oneshot(create_test_request("GET", "/loans", "owner-1", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json_resp = response_to_json(response).await;
    assert!(json_resp["error"].as_str().unwrap().contains("throttled"));
}

#[tokio::test]
async fn test_payment_against_stale_loan_is_rejected() {
    let (_app, store) = create_test_app();
    store.insert_loan(seeded_loan("loan-1", 500.0)).await;

    let mut first = store.get_loan("loan-1").await.unwrap();
    let mut second = first.clone();
    let read_at = first.updated_at.clone();

    nestegg_shared::loans::record_payment(&mut first, 400.0, None, "2026-02-01T00:00:00+00:00")
        .unwrap();
    store.update_loan(first, &read_at).await.unwrap();

    nestegg_shared::loans::record_payment(&mut second, 400.0, None, "2026-02-01T00:00:01+00:00")
        .unwrap();
    let err = store.update_loan(second, &read_at).await.unwrap_err();
    assert!(matches!(err, StoreError::ConditionFailed(_)));
    assert_eq!(store.get_loan("loan-1").await.unwrap().balance, 100.0);
}

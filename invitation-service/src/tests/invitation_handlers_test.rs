use axum::{http::StatusCode, Router};
use log::debug;
use nestegg_shared::auth::{create_test_request, create_test_request_with_email};
use nestegg_shared::error::StoreError;
use nestegg_shared::models::InvitationStatus;
use nestegg_shared::store::{InvitationStore, SavingsGoalStore};
use nestegg_shared::test_utils::http_test_utils::response_to_json;
use nestegg_shared::test_utils::mock_store::MockStore;
use nestegg_shared::test_utils::test_logging::init_test_logging;
use serde_json::json;
use std::env;
use std::sync::Arc;
use tower::ServiceExt;

use super::support::{goal, pending_invitation, INVITEE_EMAIL};
use crate::routes::create_router_with_stores;

// Helper to set up the router over an in-memory store
async fn create_test_app() -> (Router, Arc<MockStore>) {
    init_test_logging();

    // Never publish to SNS from tests
    env::set_var("TEST_SNS", "true");

    debug!("Using mock store for invitation tests");
    let store = Arc::new(MockStore::new());
    let app = create_router_with_stores(store.clone(), store.clone(), "");
    (app, store)
}

#[tokio::test]
async fn test_create_invitation() {
    let (app, store) = create_test_app().await;
    store.insert_goal(goal("goal-1", &[])).await;

    let payload = json!({
        "savingsGoalId": "goal-1",
        "inviteeEmail": "Friend@Example.com",
        "inviterName": "Owner"
    });

    let response = app
        .oneshot(create_test_request(
            "POST",
            "/invitations",
            "owner-1",
            Some(payload),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let json_resp = response_to_json(response).await;

    assert_eq!(json_resp["savingsGoalId"], "goal-1");
    assert_eq!(json_resp["savingsGoalTitle"], "Summer trip");
    assert_eq!(json_resp["inviterId"], "owner-1");
    assert_eq!(json_resp["inviteeEmail"], "friend@example.com");
    assert_eq!(json_resp["status"], "pending");
    assert!(json_resp["inviteeId"].is_null());

    let id = json_resp["id"].as_str().unwrap();
    let stored = store.get_invitation(id).await.unwrap();
    assert_eq!(stored.status, InvitationStatus::Pending);
}

#[tokio::test]
async fn test_create_invitation_requires_goal_owner() {
    let (app, store) = create_test_app().await;
    store.insert_goal(goal("goal-1", &["member-a"])).await;

    let payload = json!({
        "savingsGoalId": "goal-1",
        "inviteeEmail": "friend@example.com"
    });

    let response = app
        .oneshot(create_test_request(
            "POST",
            "/invitations",
            "member-a",
            Some(payload),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_create_invitation_rejects_bad_email_and_missing_goal() {
    let (app, store) = create_test_app().await;
    store.insert_goal(goal("goal-1", &[])).await;

    let response = app
        .clone()
        .oneshot(create_test_request(
            "POST",
            "/invitations",
            "owner-1",
            Some(json!({ "savingsGoalId": "goal-1", "inviteeEmail": "not-an-email" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(create_test_request(
            "POST",
            "/invitations",
            "owner-1",
            Some(json!({ "savingsGoalId": "missing", "inviteeEmail": "a@b.com" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_sent_and_received_invitations() {
    let (app, store) = create_test_app().await;
    store
        .insert_invitation(pending_invitation("inv-1", Some("goal-1")))
        .await;
    let mut other = pending_invitation("inv-2", Some("goal-2"));
    other.inviter_id = "someone-else".into();
    other.invitee_email = "other@example.com".into();
    store.insert_invitation(other).await;
    let mut answered = pending_invitation("inv-3", Some("goal-1"));
    answered.status = InvitationStatus::Declined;
    store.insert_invitation(answered).await;

    let response = app
        .clone()
        .oneshot(create_test_request(
            "GET",
            "/invitations/sent",
            "owner-1",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let sent = response_to_json(response).await;
    assert_eq!(sent.as_array().unwrap().len(), 2);

    let response = app
        .oneshot(create_test_request_with_email(
            "GET",
            "/invitations/received",
            "user-2",
            "Friend@example.com",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let received = response_to_json(response).await;
    let received = received.as_array().unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0]["id"], "inv-1");
}

#[tokio::test]
async fn test_respond_accept() {
    let (app, store) = create_test_app().await;
    store
        .insert_invitation(pending_invitation("inv-1", Some("goal-1")))
        .await;
    store.insert_goal(goal("goal-1", &[])).await;

    let response = app
        .oneshot(create_test_request_with_email(
            "PATCH",
            "/invitations/inv-1/respond",
            "user-2",
            INVITEE_EMAIL,
            Some(json!({ "decision": "accepted" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json_resp = response_to_json(response).await;
    assert_eq!(json_resp["success"], true);
    assert_eq!(json_resp["invitationId"], "inv-1");
    assert_eq!(json_resp["savingsGoalId"], "goal-1");
    assert!(json_resp.get("warning").is_none());
}

#[tokio::test]
async fn test_respond_status_codes() {
    let (app, store) = create_test_app().await;
    store
        .insert_invitation(pending_invitation("inv-1", Some("goal-1")))
        .await;
    store.insert_goal(goal("goal-1", &[])).await;

    // Unknown invitation
    let response = app
        .clone()
        .oneshot(create_test_request_with_email(
            "PATCH",
            "/invitations/nope/respond",
            "user-2",
            INVITEE_EMAIL,
            Some(json!({ "decision": "declined" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json_resp = response_to_json(response).await;
    assert_eq!(json_resp["success"], false);
    assert_eq!(json_resp["code"], "NOT_FOUND");

    // Token with an empty subject
    let response = app
        .clone()
        .oneshot(create_test_request(
            "PATCH",
            "/invitations/inv-1/respond",
            "",
            Some(json!({ "decision": "accepted" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json_resp = response_to_json(response).await;
    assert_eq!(json_resp["code"], "UNAUTHENTICATED");

    // First answer wins, the second conflicts
    let response = app
        .clone()
        .oneshot(create_test_request_with_email(
            "PATCH",
            "/invitations/inv-1/respond",
            "user-2",
            INVITEE_EMAIL,
            Some(json!({ "decision": "declined" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(create_test_request_with_email(
            "PATCH",
            "/invitations/inv-1/respond",
            "user-2",
            INVITEE_EMAIL,
            Some(json!({ "decision": "accepted" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json_resp = response_to_json(response).await;
    assert_eq!(json_resp["code"], "ALREADY_RESOLVED");
}

#[tokio::test]
async fn test_respond_permission_denied_on_goal() {
    let (app, store) = create_test_app().await;
    store
        .insert_invitation(pending_invitation("inv-1", Some("goal-1")))
        .await;
    store.insert_goal(goal("goal-1", &[])).await;
    store
        .fail_goal_writes(StoreError::AccessDenied("sharing disabled".into()))
        .await;

    let response = app
        .oneshot(create_test_request_with_email(
            "PATCH",
            "/invitations/inv-1/respond",
            "user-2",
            INVITEE_EMAIL,
            Some(json!({ "decision": "accepted" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json_resp = response_to_json(response).await;
    assert_eq!(json_resp["code"], "PERMISSION_DENIED");
    assert_eq!(json_resp["invitationId"], "inv-1");
    assert_eq!(json_resp["savingsGoalId"], "goal-1");
}

#[tokio::test]
async fn test_received_only_lists_callers_own_invitations() {
    let (app, store) = create_test_app().await;
    store
        .insert_invitation(pending_invitation("inv-1", Some("goal-1")))
        .await;

    // An email in the query string is ignored; the token's claim decides.
    let response = app
        .clone()
        .oneshot(create_test_request_with_email(
            "GET",
            "/invitations/received?email=friend@example.com",
            "intruder",
            "intruder@example.com",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let received = response_to_json(response).await;
    assert!(received.as_array().unwrap().is_empty());

    // No email claim at all
    let response = app
        .oneshot(create_test_request(
            "GET",
            "/invitations/received?email=friend@example.com",
            "intruder",
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_only_the_invitee_can_respond() {
    let (app, store) = create_test_app().await;
    store
        .insert_invitation(pending_invitation("inv-1", Some("goal-1")))
        .await;
    store.insert_goal(goal("goal-1", &[])).await;

    let response = app
        .clone()
        .oneshot(create_test_request_with_email(
            "PATCH",
            "/invitations/inv-1/respond",
            "intruder",
            "intruder@example.com",
            Some(json!({ "decision": "accepted" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json_resp = response_to_json(response).await;
    assert_eq!(json_resp["code"], "PERMISSION_DENIED");

    let response = app
        .clone()
        .oneshot(create_test_request(
            "PATCH",
            "/invitations/inv-1/respond",
            "intruder",
            Some(json!({ "decision": "declined" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let invitation = store.get_invitation("inv-1").await.unwrap();
    assert_eq!(invitation.status, InvitationStatus::Pending);
    assert!(invitation.invitee_id.is_none());
    assert!(store.get_goal("goal-1").await.unwrap().members.is_empty());

    // The addressee can still accept it
    let response = app
        .oneshot(create_test_request_with_email(
            "PATCH",
            "/invitations/inv-1/respond",
            "user-2",
            "Friend@Example.com",
            Some(json!({ "decision": "accepted" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(store
        .get_goal("goal-1")
        .await
        .unwrap()
        .members
        .contains("user-2"));
}

#[tokio::test]
async fn test_requests_without_token_are_rejected() {
    let (app, _store) = create_test_app().await;

    let request = axum::http::Request::builder()
        .method("GET")
        .uri("/invitations/sent")
        .body(axum::body::Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let (app, _store) = create_test_app().await;

    let response = app
        .oneshot(create_test_request("GET", "/nowhere", "user-2", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

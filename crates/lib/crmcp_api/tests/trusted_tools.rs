//! Integration tests: `POST /api/tools/{name}` with platform sessions.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{PLATFORM_SECRET, app, bearer_for};
use crmcp_core::auth::jwt::generate_session_token;
use serde_json::json;

fn session_for(user: &crmcp_core::credentials::User) -> String {
    generate_session_token(&user.id, &user.tenant_id, PLATFORM_SECRET.as_bytes()).unwrap()
}

#[tokio::test]
async fn platform_session_calls_tools_directly() {
    let app = app().await;
    let session = session_for(&app.member);

    let body = json!({"name": "Hooli"});
    let created = app
        .post_json("/api/tools/create_account", body, Some(&session))
        .await;
    assert_eq!(created.status, StatusCode::OK);
    assert_eq!(created.json()["name"], "Hooli");

    // arguments may be omitted entirely
    let listed = app
        .send(
            Request::post("/api/tools/list_accounts")
                .header("authorization", format!("Bearer {session}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(listed.status, StatusCode::OK);
    assert_eq!(listed.json()["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn domain_errors_map_to_http_statuses() {
    let app = app().await;
    let session = session_for(&app.member);

    let body = json!({"id": "nope"});
    let missing = app
        .post_json("/api/tools/get_account", body, Some(&session))
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.json()["code"], "NOT_FOUND");

    let forbidden = app
        .post_json("/api/tools/list_users", json!({}), Some(&session))
        .await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);

    let unknown = app
        .post_json("/api/tools/nope", json!({}), Some(&session))
        .await;
    assert_eq!(unknown.status, StatusCode::BAD_REQUEST);
    assert_eq!(unknown.json()["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn upstream_bearer_tokens_are_not_platform_sessions() {
    let app = app().await;

    let none = app
        .post_json("/api/tools/list_accounts", json!({}), None)
        .await;
    assert_eq!(none.status, StatusCode::UNAUTHORIZED);

    let token = bearer_for(&app.member);
    let upstream = app
        .post_json("/api/tools/list_accounts", json!({}), Some(&token))
        .await;
    assert_eq!(upstream.status, StatusCode::UNAUTHORIZED);
    assert_eq!(upstream.json()["error"], "unauthorized");
}

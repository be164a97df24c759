// @zen-component: MCP-DispatcherTests

use std::sync::Arc;

use chrono::{Duration, Utc};
use crmcp_core::auth::{BearerTokenResolver, ClaimExpectations};
use crmcp_core::credentials::{
    CredentialStore, MemoryCredentialStore, NewUser, Role, User, UserUpdate,
};
use crmcp_core::crm::{CrmService, MemoryDocumentStore};
use http::StatusCode;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};

use super::*;

const ISSUER: &str = "https://id.example.com";
const AUDIENCE: &str = "crm";

struct Harness {
    dispatcher: Dispatcher,
    credentials: Arc<MemoryCredentialStore>,
    user: User,
}

async fn harness() -> Harness {
    let credentials = Arc::new(MemoryCredentialStore::new());
    let tenant = credentials.insert_tenant("Acme").await.unwrap();
    let user = credentials
        .insert_user(NewUser {
            tenant_id: tenant.id,
            email: "ada@acme.test".into(),
            name: Some("Ada".into()),
            role: Role::Member,
        })
        .await
        .unwrap();
    let resolver = Arc::new(BearerTokenResolver::new(
        ClaimExpectations {
            issuer: ISSUER.into(),
            audience: AUDIENCE.into(),
        },
        credentials.clone(),
    ));
    let service = CrmService::new(Arc::new(MemoryDocumentStore::new()), credentials.clone());
    Harness {
        dispatcher: Dispatcher::new(resolver, ToolInvoker::with_default_hooks(service)),
        credentials,
        user,
    }
}

fn token_for(user: &User) -> String {
    encode(
        &Header::default(),
        &json!({
            "sub": format!("{}|session-1", user.id),
            "email": user.email,
            "exp": (Utc::now() + Duration::hours(1)).timestamp(),
            "iss": ISSUER,
            "aud": AUDIENCE,
        }),
        &EncodingKey::from_secret(b"upstream"),
    )
    .unwrap()
}

fn call(id: i64, name: &str, arguments: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": { "name": name, "arguments": arguments },
    })
}

fn reply(dispatch: &Dispatch) -> &JsonRpcResponse {
    dispatch.body().expect("response body")
}

#[test]
fn public_methods() {
    assert!(is_public_method("initialize"));
    assert!(is_public_method("tools/list"));
    assert!(is_public_method("ping"));
    assert!(!is_public_method("tools/call"));
}

#[test]
fn initialize_echoes_supported_versions_only() {
    let result = initialize_result(Some(&json!({"protocolVersion": "2024-11-05"})));
    assert_eq!(result["protocolVersion"], "2024-11-05");

    let result = initialize_result(Some(&json!({"protocolVersion": "1999-01-01"})));
    assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);

    let result = initialize_result(None);
    assert_eq!(result["serverInfo"]["name"], SERVER_NAME);
    assert_eq!(result["capabilities"]["tools"]["listChanged"], false);
}

#[tokio::test]
async fn public_methods_need_no_token() {
    let h = harness().await;

    let request = json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}});
    let init = h.dispatcher.dispatch(request, None).await;
    assert_eq!(init.status(), StatusCode::OK);
    assert_eq!(reply(&init).id, json!(1));
    let result = reply(&init).result.as_ref().unwrap();
    assert!(result["serverInfo"].is_object());

    let request = json!({"jsonrpc": "2.0", "id": "two", "method": "tools/list"});
    let list = h.dispatcher.dispatch(request, None).await;
    let tools = &reply(&list).result.as_ref().unwrap()["tools"];
    let count = tools.as_array().unwrap().len();
    assert_eq!(count, crate::tools::catalog::CATALOG.len());

    let request = json!({"jsonrpc": "2.0", "id": 3, "method": "ping"});
    let ping = h.dispatcher.dispatch(request, None).await;
    assert_eq!(reply(&ping).result, Some(json!({})));
}

#[tokio::test]
async fn notifications_are_accepted_without_body() {
    let h = harness().await;
    let notification = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
    let d = h.dispatcher.dispatch(notification, None).await;
    assert_eq!(d, Dispatch::Accepted);
    assert_eq!(d.status(), StatusCode::ACCEPTED);
    assert!(d.body().is_none());

    // id-less requests are processed but not answered
    let request = json!({"jsonrpc": "2.0", "method": "tools/list"});
    let d = h.dispatcher.dispatch(request, None).await;
    assert_eq!(d, Dispatch::Accepted);

    let d = h.dispatcher.dispatch(json!({"jsonrpc": "2.0"}), None).await;
    assert_eq!(d, Dispatch::Accepted);
}

#[tokio::test]
async fn malformed_bodies_are_bad_requests() {
    let h = harness().await;

    let d = h.dispatcher.dispatch_bytes(b"{not json", None).await;
    assert_eq!(d.status(), StatusCode::BAD_REQUEST);
    assert_eq!(reply(&d).error_code(), Some(PARSE_ERROR));
    assert_eq!(reply(&d).id, Value::Null);

    let d = h.dispatcher.dispatch(json!("hello"), None).await;
    assert_eq!(d.status(), StatusCode::BAD_REQUEST);
    assert_eq!(reply(&d).error_code(), Some(INVALID_REQUEST));

    let methodless = json!({"jsonrpc": "2.0", "id": 7});
    let d = h.dispatcher.dispatch(methodless, None).await;
    assert_eq!(d.status(), StatusCode::BAD_REQUEST);
    assert_eq!(reply(&d).id, json!(7));
}

#[tokio::test]
async fn null_id_is_invalid_not_a_notification() {
    let h = harness().await;
    let request = json!({"jsonrpc": "2.0", "id": null, "method": "tools/list"});
    let d = h.dispatcher.dispatch(request, None).await;
    assert_eq!(d.status(), StatusCode::BAD_REQUEST);
    assert_eq!(reply(&d).error_code(), Some(INVALID_REQUEST));
    assert_eq!(reply(&d).id, Value::Null);
}

#[tokio::test]
async fn unknown_method_is_method_not_found() {
    let h = harness().await;
    let request = json!({"jsonrpc": "2.0", "id": 1, "method": "resources/list"});
    let d = h.dispatcher.dispatch(request, None).await;
    assert_eq!(d.status(), StatusCode::OK);
    assert_eq!(reply(&d).error_code(), Some(METHOD_NOT_FOUND));
}

#[tokio::test]
async fn tools_call_requires_a_name() {
    let h = harness().await;
    let request = json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call", "params": {}});
    let d = h.dispatcher.dispatch(request, Some("anything")).await;
    assert_eq!(reply(&d).error_code(), Some(INVALID_PARAMS));
}

#[tokio::test]
async fn tools_call_without_token_is_auth_required() {
    let h = harness().await;
    let request = call(5, "list_accounts", json!({}));
    let d = h.dispatcher.dispatch(request, None).await;
    assert_eq!(d.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(reply(&d).error_code(), Some(AUTH_REQUIRED));
    assert_eq!(reply(&d).id, json!(5));

    let request = call(6, "list_accounts", json!({}));
    let d = h.dispatcher.dispatch(request, Some("")).await;
    assert_eq!(d.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn bad_token_is_auth_required_with_reason() {
    let h = harness().await;
    let request = call(1, "list_accounts", json!({}));
    let d = h.dispatcher.dispatch(request, Some("not-a-token")).await;
    assert_eq!(d.status(), StatusCode::UNAUTHORIZED);
    let error = reply(&d).error.as_ref().unwrap();
    assert!(error.data.as_ref().unwrap()["reason"].is_string());
}

#[tokio::test]
async fn inactive_user_is_forbidden_not_unauthenticated() {
    let h = harness().await;
    let deactivate = UserUpdate {
        active: Some(false),
        ..Default::default()
    };
    h.credentials
        .update_user(&h.user.tenant_id, &h.user.id, deactivate)
        .await
        .unwrap();

    let token = token_for(&h.user);
    let request = call(1, "list_accounts", json!({}));
    let d = h.dispatcher.dispatch(request, Some(&token)).await;
    assert_eq!(d.status(), StatusCode::OK);
    let error = reply(&d).error.as_ref().unwrap();
    assert_eq!(error.code, TOOL_ERROR);
    assert_eq!(error.data.as_ref().unwrap()["code"], "FORBIDDEN");
}

#[tokio::test]
async fn tool_errors_carry_the_crm_code() {
    let h = harness().await;
    let token = token_for(&h.user);

    let request = call(1, "no_such_tool", json!({}));
    let d = h.dispatcher.dispatch(request, Some(&token)).await;
    assert_eq!(d.status(), StatusCode::OK);
    let error = reply(&d).error.as_ref().unwrap();
    assert_eq!(error.code, TOOL_ERROR);
    assert_eq!(error.data.as_ref().unwrap()["code"], "VALIDATION_ERROR");

    let request = call(2, "get_account", json!({"id": "missing"}));
    let d = h.dispatcher.dispatch(request, Some(&token)).await;
    let error = reply(&d).error.as_ref().unwrap();
    assert_eq!(error.data.as_ref().unwrap()["code"], "NOT_FOUND");
}

#[tokio::test]
async fn successful_call_returns_text_content() {
    let h = harness().await;
    let token = token_for(&h.user);

    let request = call(1, "create_account", json!({"name": "Acme Corp"}));
    let d = h.dispatcher.dispatch(request, Some(&token)).await;
    assert_eq!(d.status(), StatusCode::OK);
    let result = reply(&d).result.as_ref().unwrap();
    assert_eq!(result["content"][0]["type"], "text");
    let text = result["content"][0]["text"].as_str().unwrap();
    let record: Value = serde_json::from_str(text).unwrap();
    assert_eq!(record["name"], "Acme Corp");
    assert_eq!(record["tenantId"], h.user.tenant_id);

    let request = call(2, "get_current_user", json!({}));
    let d = h.dispatcher.dispatch(request, Some(&token)).await;
    let result = reply(&d).result.as_ref().unwrap();
    let text = result["content"][0]["text"].as_str().unwrap();
    let me: Value = serde_json::from_str(text).unwrap();
    assert_eq!(me["user"]["email"], "ada@acme.test");
}

//! Shared fixtures for the HTTP integration tests: an app on in-memory stores
//! and helpers to mint tokens and drive requests through `oneshot`.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use chrono::{Duration, Utc};
use crmcp_api::AppState;
use crmcp_api::config::ApiConfig;
use crmcp_core::auth::opaque_token;
use crmcp_core::credentials::{CredentialStore, MemoryCredentialStore, NewUser, Role, User};
use crmcp_core::crm::{CrmService, MemoryDocumentStore};
use crmcp_core::ephemeral::EphemeralStores;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use tower::ServiceExt;

pub const BASE_URL: &str = "https://crm.example.com";
pub const SIGN_IN_URL: &str = "https://app.example.com/sign-in";
pub const ISSUER: &str = "https://id.example.com";
pub const AUDIENCE: &str = "crmcp";
pub const PLATFORM_SECRET: &str = "platform-secret";

pub struct TestApp {
    pub router: Router,
    pub stores: EphemeralStores,
    pub credentials: Arc<MemoryCredentialStore>,
    pub member: User,
    pub admin: User,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("JSON body")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub fn config(enforce_pkce: bool) -> ApiConfig {
    ApiConfig {
        bind_addr: "127.0.0.1:0".into(),
        database_url: None,
        public_base_url: BASE_URL.into(),
        sign_in_url: SIGN_IN_URL.into(),
        token_issuer: ISSUER.into(),
        token_audience: AUDIENCE.into(),
        oauth_scope: "crm".into(),
        enforce_pkce,
        platform_session_secret: PLATFORM_SECRET.into(),
        bootstrap_tenant_name: "Default".into(),
        bootstrap_admin_email: None,
    }
}

pub async fn app() -> TestApp {
    app_with(config(false)).await
}

pub async fn app_with(config: ApiConfig) -> TestApp {
    let credentials = Arc::new(MemoryCredentialStore::new());
    let tenant = credentials.insert_tenant("Acme").await.unwrap();
    let mut users = Vec::new();
    for (email, role) in [
        ("member@acme.test", Role::Member),
        ("admin@acme.test", Role::Admin),
    ] {
        users.push(
            credentials
                .insert_user(NewUser {
                    tenant_id: tenant.id.clone(),
                    email: email.into(),
                    name: None,
                    role,
                })
                .await
                .unwrap(),
        );
    }
    let admin = users.pop().unwrap();
    let member = users.pop().unwrap();

    let stores = EphemeralStores::in_memory();
    let service = CrmService::new(Arc::new(MemoryDocumentStore::new()), credentials.clone());
    let state = AppState::new(config, service, stores.clone());

    TestApp {
        router: crmcp_api::router(state),
        stores,
        credentials,
        member,
        admin,
    }
}

/// Upstream bearer token for `user`.
pub fn bearer_for(user: &User) -> String {
    encode(
        &Header::default(),
        &json!({
            "sub": format!("{}|session-1", user.id),
            "email": user.email,
            "exp": (Utc::now() + Duration::hours(1)).timestamp(),
            "iss": ISSUER,
            "aud": AUDIENCE,
        }),
        &EncodingKey::from_secret(b"upstream-signing-key"),
    )
    .unwrap()
}

/// A fresh PKCE code verifier (64 unreserved characters).
pub fn code_verifier() -> String {
    opaque_token(64)
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.expect("request");
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        let request = Request::get(uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    pub async fn post_json(&self, uri: &str, body: Value, token: Option<&str>) -> TestResponse {
        let mut builder = Request::post(uri).header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::from(body.to_string())).unwrap();
        self.send(request).await
    }

    pub async fn post_form(&self, uri: &str, form: &str) -> TestResponse {
        self.send(
            Request::post(uri)
                .header("content-type", "application/x-www-form-urlencoded")
                .body(Body::from(form.to_string()))
                .unwrap(),
        )
        .await
    }
}

pub fn rpc(id: i64, method: &str, params: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params })
}

/// Text content of a successful `tools/call`, parsed as JSON.
pub fn tool_result(envelope: &Value) -> Value {
    let text = envelope["result"]["content"][0]["text"]
        .as_str()
        .expect("text content");
    serde_json::from_str(text).expect("tool result JSON")
}

//! Integration tests: discovery, registration and the authorize → code →
//! token round trip.

mod common;

use axum::http::StatusCode;
use common::{BASE_URL, SIGN_IN_URL, TestApp, app, app_with, bearer_for, code_verifier, config};
use crmcp_core::auth::pkce::{ChallengeMethod, compute_code_challenge};
use crmcp_core::ephemeral::{PKCE_CHALLENGE_TTL_SECS, PkceChallenge};
use serde_json::json;
use url::Url;

#[tokio::test]
async fn discovery_documents_are_public() {
    let app = app().await;

    let resource = app.get("/.well-known/oauth-protected-resource").await;
    assert_eq!(resource.status, StatusCode::OK);
    let resource = resource.json();
    assert_eq!(resource["resource"], format!("{BASE_URL}/mcp"));
    assert_eq!(resource["authorization_servers"], json!([BASE_URL]));

    let server = app.get("/.well-known/oauth-authorization-server").await;
    let server = server.json();
    assert_eq!(server["issuer"], BASE_URL);
    assert_eq!(server["token_endpoint"], format!("{BASE_URL}/oauth/token"));
    assert_eq!(server["code_challenge_methods_supported"], json!(["S256"]));
    assert_eq!(
        server["token_endpoint_auth_methods_supported"],
        json!(["none"])
    );
    assert_eq!(
        server["grant_types_supported"],
        json!(["authorization_code", "refresh_token"])
    );
}

#[tokio::test]
async fn registration_issues_public_clients() {
    let app = app().await;
    let first = app
        .post_json(
            "/oauth/register",
            json!({"client_name": "Agent", "redirect_uris": ["http://localhost:9000/cb"]}),
            None,
        )
        .await;
    assert_eq!(first.status, StatusCode::CREATED);
    let first = first.json();
    assert_eq!(first["client_secret"], "");
    assert_eq!(first["client_secret_expires_at"], 0);
    assert_eq!(first["token_endpoint_auth_method"], "none");
    assert_eq!(first["redirect_uris"], json!(["http://localhost:9000/cb"]));

    let second = app.post_json("/v1/oauth/register", json!({}), None).await;
    let second = second.json();
    assert_ne!(first["client_id"], second["client_id"]);
}

#[tokio::test]
async fn authorize_redirects_to_sign_in_with_the_challenge() {
    let app = app().await;
    let response = app
        .get(
            "/oauth/authorize?response_type=code&client_id=c1\
             &redirect_uri=http%3A%2F%2Flocalhost%3A9000%2Fcb&state=s1\
             &code_challenge=abc&code_challenge_method=S256",
        )
        .await;
    assert_eq!(response.status, StatusCode::FOUND);

    let location = Url::parse(response.header("location").unwrap()).unwrap();
    assert!(location.as_str().starts_with(SIGN_IN_URL));
    let pairs: Vec<(String, String)> = location.query_pairs().into_owned().collect();
    assert!(pairs.contains(&("redirect_uri".into(), "http://localhost:9000/cb".into())));
    assert!(pairs.contains(&("state".into(), "s1".into())));
    assert!(pairs.contains(&("code_challenge".into(), "abc".into())));

    let stored = app
        .stores
        .challenges
        .take("s1", chrono::Utc::now())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.code_challenge, "abc");
    assert_eq!(stored.redirect_uri, "http://localhost:9000/cb");
}

#[tokio::test]
async fn authorize_requires_redirect_uri() {
    let app = app().await;
    let response = app.get("/oauth/authorize?state=s1").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error"], "invalid_request");
}

async fn mint(app: &TestApp, token: &str, state: &str) -> String {
    let body = json!({"token": token, "state": state});
    let response = app.post_json("/oauth/code", body, None).await;
    assert_eq!(response.status, StatusCode::OK);
    response.json()["code"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn code_is_exchanged_exactly_once() {
    let app = app().await;
    let token = bearer_for(&app.member);
    app.get("/oauth/authorize?redirect_uri=http%3A%2F%2Flocalhost%2Fcb&state=s1&code_challenge=abc")
        .await;
    let code = mint(&app, &token, "s1").await;

    let form = format!("grant_type=authorization_code&code={code}");
    let exchanged = app.post_form("/oauth/token", &form).await;
    assert_eq!(exchanged.status, StatusCode::OK);
    let body = exchanged.json();
    assert_eq!(body["access_token"], token);
    assert_eq!(body["refresh_token"], token);
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["expires_in"], 3600);
    assert_eq!(body["scope"], "crm");

    // the challenge for the state went with the code
    assert!(
        app.stores
            .challenges
            .take("s1", chrono::Utc::now())
            .await
            .unwrap()
            .is_none()
    );

    let replay = app.post_form("/oauth/token", &form).await;
    assert_eq!(replay.status, StatusCode::BAD_REQUEST);
    assert_eq!(replay.json()["error"], "invalid_grant");
}

#[tokio::test]
async fn token_endpoint_accepts_json_and_refresh() {
    let app = app().await;
    let token = bearer_for(&app.member);
    let code = mint(&app, &token, "").await;

    let exchanged = app
        .post_json(
            "/v1/oauth/token",
            json!({"grant_type": "authorization_code", "code": code}),
            None,
        )
        .await;
    assert_eq!(exchanged.json()["access_token"], token);

    let form = format!("grant_type=refresh_token&refresh_token={token}");
    let refreshed = app.post_form("/oauth/token", &form).await;
    assert_eq!(refreshed.status, StatusCode::OK);
    assert_eq!(refreshed.json()["access_token"], token);
}

#[tokio::test]
async fn token_endpoint_errors() {
    let app = app().await;

    let unknown = app
        .post_form("/oauth/token", "grant_type=authorization_code&code=nope")
        .await;
    assert_eq!(unknown.json()["error"], "invalid_grant");

    let missing_code = app
        .post_form("/oauth/token", "grant_type=authorization_code")
        .await;
    assert_eq!(missing_code.json()["error"], "invalid_request");

    let unsupported = app.post_form("/oauth/token", "grant_type=password").await;
    assert_eq!(unsupported.status, StatusCode::BAD_REQUEST);
    let body = unsupported.json();
    assert_eq!(body["error"], "unsupported_grant_type");
    assert!(body["error_description"].is_string());

    let no_grant = app.post_form("/oauth/token", "").await;
    assert_eq!(no_grant.json()["error"], "invalid_request");
}

#[tokio::test]
async fn verifier_is_ignored_unless_enforced() {
    let app = app().await;
    let token = bearer_for(&app.member);
    let challenge = compute_code_challenge(&code_verifier());
    app.get(&format!(
        "/oauth/authorize?redirect_uri=http%3A%2F%2Flocalhost%2Fcb&state=s2\
         &code_challenge={challenge}&code_challenge_method=S256"
    ))
    .await;
    let code = mint(&app, &token, "s2").await;

    let response = app
        .post_form(
            "/oauth/token",
            &format!("grant_type=authorization_code&code={code}&code_verifier=wrong"),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn enforced_pkce_rejects_wrong_or_missing_verifier() {
    let app = app_with(config(true)).await;
    let token = bearer_for(&app.member);
    let verifier = code_verifier();
    let challenge = compute_code_challenge(&verifier);

    for (state, form_verifier, expected) in [
        ("s-wrong", Some("wrong-verifier"), StatusCode::BAD_REQUEST),
        ("s-missing", None, StatusCode::BAD_REQUEST),
        ("s-right", Some(verifier.as_str()), StatusCode::OK),
    ] {
        app.get(&format!(
            "/oauth/authorize?redirect_uri=http%3A%2F%2Flocalhost%2Fcb&state={state}\
             &code_challenge={challenge}&code_challenge_method=S256"
        ))
        .await;
        let code = mint(&app, &token, state).await;
        let mut form = format!("grant_type=authorization_code&code={code}");
        if let Some(v) = form_verifier {
            form.push_str(&format!("&code_verifier={v}"));
        }
        let response = app.post_form("/oauth/token", &form).await;
        assert_eq!(response.status, expected, "state {state}");
    }

    // no challenge stored for the state: nothing to verify
    let code = mint(&app, &token, "no-challenge").await;
    let form = format!("grant_type=authorization_code&code={code}");
    let response = app.post_form("/oauth/token", &form).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn expired_challenge_does_not_block_the_exchange() {
    let app = app_with(config(true)).await;
    let token = bearer_for(&app.member);
    let created = chrono::Utc::now() - chrono::Duration::seconds(PKCE_CHALLENGE_TTL_SECS + 1);
    let challenge = compute_code_challenge(&code_verifier());
    let stale = PkceChallenge::new(
        "s-stale",
        &challenge,
        ChallengeMethod::S256,
        "http://localhost/cb",
        created,
    );
    app.stores.challenges.store(stale).await.unwrap();

    let code = mint(&app, &token, "s-stale").await;
    let form = format!("grant_type=authorization_code&code={code}");
    let response = app.post_form("/oauth/token", &form).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json()["access_token"], token);
}

#[tokio::test]
async fn mint_requires_a_token() {
    let app = app().await;
    let body = json!({"state": "s"});
    let response = app.post_json("/oauth/code", body, None).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json()["error"], "invalid_request");
}

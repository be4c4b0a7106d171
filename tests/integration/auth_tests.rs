//! Bearer authentication on the protected routes.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, header};
use serde_json::json;

use super::test_utils::{
    BOTH_JWKS, PRIMARY_JWKS, PRIMARY_KID, PRIMARY_PEM, ROTATED_JWKS, ROTATED_KID, ROTATED_PEM,
    RotatingJwks, ScriptedVision, TestApp, config, free_token, json_body, now, sign, static_jwks,
};

fn usage_request(authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri("/api/usage");
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::empty()).unwrap()
}

async fn assert_unauthorized(app: &TestApp, request: Request<Body>, detail: &str) {
    let response = app.send(request).await;
    assert_eq!(response.headers().get(header::WWW_AUTHENTICATE).unwrap(), "Bearer");

    let (status, body) = json_body(response).await;
    assert_eq!(status, 401);
    assert_eq!(body, json!({"detail": detail}));
}

#[tokio::test]
async fn test_missing_token_is_rejected() {
    let app = TestApp::new(ScriptedVision::always_ok());

    assert_unauthorized(&app, usage_request(None), "Not authenticated").await;
    assert_unauthorized(&app, usage_request(Some("Basic dXNlcjpwYXNz")), "Not authenticated")
        .await;
    assert_unauthorized(&app, usage_request(Some("Bearer ")), "Not authenticated").await;
}

#[tokio::test]
async fn test_garbage_token_is_rejected() {
    let app = TestApp::new(ScriptedVision::always_ok());

    assert_unauthorized(&app, usage_request(Some("Bearer not-a-jwt")), "Invalid token").await;
}

#[tokio::test]
async fn test_token_signed_by_unpublished_key_is_rejected() {
    let app = TestApp::new(ScriptedVision::always_ok());

    // Correct kid, wrong private key.
    let forged = sign(
        ROTATED_PEM,
        PRIMARY_KID,
        json!({"sub": "user_forged", "exp": now() + 300}),
    );
    let value = format!("Bearer {forged}");

    assert_unauthorized(&app, usage_request(Some(&value)), "Invalid token").await;
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let app = TestApp::new(ScriptedVision::always_ok());

    let expired = sign(
        PRIMARY_PEM,
        PRIMARY_KID,
        json!({"sub": "user_expired", "exp": now() - 60}),
    );
    let value = format!("Bearer {expired}");

    assert_unauthorized(&app, usage_request(Some(&value)), "Invalid token").await;
}

#[tokio::test]
async fn test_token_without_subject_is_rejected() {
    let app = TestApp::new(ScriptedVision::always_ok());

    let anonymous = sign(PRIMARY_PEM, PRIMARY_KID, json!({"exp": now() + 300}));
    let value = format!("Bearer {anonymous}");

    assert_unauthorized(&app, usage_request(Some(&value)), "Invalid token").await;
}

#[tokio::test]
async fn test_analyze_requires_authentication_before_reading_body() {
    let app = TestApp::new(ScriptedVision::always_ok());

    let request = Request::builder()
        .method("POST")
        .uri("/api/analyze")
        .header(header::CONTENT_TYPE, "multipart/form-data; boundary=x")
        .body(Body::from("not even multipart"))
        .unwrap();

    assert_unauthorized(&app, request, "Not authenticated").await;
    assert_eq!(app.vision.calls(), 0);
}

#[tokio::test]
async fn test_scheme_is_case_insensitive() {
    let app = TestApp::new(ScriptedVision::always_ok());

    let value = format!("bearer {}", free_token("user_lower"));
    let (status, _) = json_body(app.send(usage_request(Some(&value))).await).await;

    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_rotated_key_is_picked_up_without_restart() {
    let jwks = Arc::new(RotatingJwks::new(PRIMARY_JWKS));
    let config = config(&[("JWKS_REFRESH_COOLDOWN_SECONDS", "0")]);
    let app = TestApp::with(&config, jwks.clone(), ScriptedVision::always_ok());

    let (status, _) = app.usage(&free_token("user_rotation")).await;
    assert_eq!(status, 200);
    assert_eq!(jwks.fetches(), 1);

    // Cached set is fresh and knows the kid: no refetch.
    let (status, _) = app.usage(&free_token("user_rotation")).await;
    assert_eq!(status, 200);
    assert_eq!(jwks.fetches(), 1);

    jwks.publish(ROTATED_JWKS);
    let rotated = sign(
        ROTATED_PEM,
        ROTATED_KID,
        json!({"sub": "user_rotation", "exp": now() + 300}),
    );

    let (status, body) = app.usage(&rotated).await;
    assert_eq!(status, 200);
    assert_eq!(body["tier"], "free");
    assert_eq!(jwks.fetches(), 2);
}

#[tokio::test]
async fn test_unknown_kid_refetch_is_rate_limited() {
    let jwks = Arc::new(RotatingJwks::new(PRIMARY_JWKS));
    let config = config(&[("JWKS_REFRESH_COOLDOWN_SECONDS", "60")]);
    let app = TestApp::with(&config, jwks.clone(), ScriptedVision::always_ok());

    let (status, _) = app.usage(&free_token("user_cooldown")).await;
    assert_eq!(status, 200);

    let unknown = sign(
        ROTATED_PEM,
        ROTATED_KID,
        json!({"sub": "user_cooldown", "exp": now() + 300}),
    );
    for _ in 0..10 {
        let (status, _) = app.usage(&unknown).await;
        assert_eq!(status, 401);
    }

    assert_eq!(jwks.fetches(), 1);
}

#[tokio::test]
async fn test_both_keys_accepted_during_rotation_overlap() {
    let app = TestApp::with(&config(&[]), static_jwks(BOTH_JWKS), ScriptedVision::always_ok());

    let old = sign(
        PRIMARY_PEM,
        PRIMARY_KID,
        json!({"sub": "user_old_key", "exp": now() + 300}),
    );
    let new = sign(
        ROTATED_PEM,
        ROTATED_KID,
        json!({"sub": "user_new_key", "exp": now() + 300}),
    );

    let (status, _) = app.usage(&old).await;
    assert_eq!(status, 200);
    let (status, _) = app.usage(&new).await;
    assert_eq!(status, 200);
}

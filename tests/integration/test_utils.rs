//! Shared fixtures: configuration, token signing, a scripted vision model,
//! and multipart body construction.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, header};
use http_body_util::BodyExt;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};
use tower::ServiceExt;

use vision_gateway::app::{build_router, build_state};
use vision_gateway::config::Config;
use vision_gateway::services::auth::{JwksFetcher, KeyResolutionError, StaticJwks};
use vision_gateway::services::vision::{VisionError, VisionModel, VisionRequest};

pub const PRIMARY_KID: &str = "test-key-primary";
pub const ROTATED_KID: &str = "test-key-rotated";

pub const PRIMARY_PEM: &str = include_str!("../fixtures/rsa_primary.pem");
pub const ROTATED_PEM: &str = include_str!("../fixtures/rsa_rotated.pem");
pub const PRIMARY_JWKS: &str = include_str!("../fixtures/jwks_primary.json");
pub const ROTATED_JWKS: &str = include_str!("../fixtures/jwks_rotated.json");
pub const BOTH_JWKS: &str = include_str!("../fixtures/jwks_both.json");

pub const FREE_LIMIT_DETAIL: &str =
    "Free tier limit reached (1 analysis per session). Upgrade to premium for unlimited analyses.";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration with test defaults; `overrides` replace individual keys.
pub fn config(overrides: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = HashMap::from([
        (
            "CLERK_JWKS_URL".to_string(),
            "https://clerk.example.test/.well-known/jwks.json".to_string(),
        ),
        ("OPENAI_API_KEY".to_string(), "sk-test".to_string()),
    ]);
    for (key, value) in overrides {
        vars.insert(key.to_string(), value.to_string());
    }

    Config::from_lookup(|key| vars.get(key).cloned()).expect("test config should be valid")
}

// =============================================================================
// Tokens
// =============================================================================

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

pub fn sign(pem: &str, kid: &str, claims: Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).unwrap();
    jsonwebtoken::encode(&header, &claims, &key).unwrap()
}

pub fn free_token(sub: &str) -> String {
    sign(
        PRIMARY_PEM,
        PRIMARY_KID,
        json!({"sub": sub, "exp": now() + 300, "iat": now()}),
    )
}

pub fn premium_token(sub: &str) -> String {
    sign(
        PRIMARY_PEM,
        PRIMARY_KID,
        json!({
            "sub": sub,
            "exp": now() + 300,
            "public_metadata": {"subscription_tier": "premium"},
        }),
    )
}

// =============================================================================
// Key sets
// =============================================================================

pub fn static_jwks(raw: &str) -> Arc<dyn JwksFetcher> {
    Arc::new(StaticJwks::from_json(raw).unwrap())
}

/// A key set that can be swapped mid-test, counting fetches.
pub struct RotatingJwks {
    current: Mutex<JwkSet>,
    fetches: AtomicUsize,
}

impl RotatingJwks {
    pub fn new(raw: &str) -> Self {
        Self {
            current: Mutex::new(serde_json::from_str(raw).unwrap()),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn publish(&self, raw: &str) {
        *self.current.lock().unwrap() = serde_json::from_str(raw).unwrap();
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JwksFetcher for RotatingJwks {
    async fn fetch(&self) -> Result<JwkSet, KeyResolutionError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.current.lock().unwrap().clone())
    }
}

// =============================================================================
// Vision model
// =============================================================================

pub enum Reply {
    Text(&'static str),
    Status(u16),
    Hang,
}

/// Vision model that answers from a script and records what it was sent.
///
/// Once the script runs out it keeps answering with a fixed description.
pub struct ScriptedVision {
    replies: Mutex<VecDeque<Reply>>,
    calls: AtomicUsize,
    mime_types: Mutex<Vec<&'static str>>,
}

impl ScriptedVision {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
            mime_types: Mutex::new(Vec::new()),
        }
    }

    pub fn always_ok() -> Self {
        Self::new(Vec::new())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn mime_types(&self) -> Vec<&'static str> {
        self.mime_types.lock().unwrap().clone()
    }
}

#[async_trait]
impl VisionModel for ScriptedVision {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn describe(&self, request: VisionRequest<'_>) -> Result<String, VisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.mime_types.lock().unwrap().push(request.mime_type);

        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            None => Ok("A cat sitting on a windowsill.".to_string()),
            Some(Reply::Text(text)) => Ok(text.to_string()),
            Some(Reply::Status(status)) => Err(VisionError::Status {
                status,
                message: "upstream unavailable".to_string(),
            }),
            Some(Reply::Hang) => std::future::pending().await,
        }
    }
}

// =============================================================================
// Router and requests
// =============================================================================

pub struct TestApp {
    pub router: Router,
    pub vision: Arc<ScriptedVision>,
}

impl TestApp {
    pub fn new(vision: ScriptedVision) -> Self {
        Self::with(&config(&[]), static_jwks(PRIMARY_JWKS), vision)
    }

    pub fn with(config: &Config, jwks: Arc<dyn JwksFetcher>, vision: ScriptedVision) -> Self {
        let vision = Arc::new(vision);
        let state = build_state(config, jwks, vision.clone());
        Self {
            router: build_router(state, config),
            vision,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn usage(&self, token: &str) -> (u16, Value) {
        let request = Request::builder()
            .uri("/api/usage")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        json_body(self.send(request).await).await
    }

    pub async fn analyze(&self, token: &str, filename: &str, content: &[u8]) -> (u16, Value) {
        let request = analyze_request(Some(token), &[Part::file("file", filename, content)]);
        json_body(self.send(request).await).await
    }
}

pub async fn json_body(response: Response<Body>) -> (u16, Value) {
    let status = response.status().as_u16();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

// =============================================================================
// Multipart
// =============================================================================

pub const BOUNDARY: &str = "----vision-gateway-test-boundary";

pub struct Part<'a> {
    name: &'a str,
    filename: Option<&'a str>,
    content: &'a [u8],
}

impl<'a> Part<'a> {
    pub fn file(name: &'a str, filename: &'a str, content: &'a [u8]) -> Self {
        Self {
            name,
            filename: Some(filename),
            content,
        }
    }

    pub fn text(name: &'a str, content: &'a str) -> Self {
        Self {
            name,
            filename: None,
            content: content.as_bytes(),
        }
    }
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part.filename {
            Some(filename) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                        part.name, filename
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name)
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(part.content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn analyze_request(token: Option<&str>, parts: &[Part<'_>]) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/analyze")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(multipart_body(parts))).unwrap()
}

/// A few bytes that look like a PNG; the gateway never decodes them.
pub fn png_bytes() -> Vec<u8> {
    let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
    bytes.extend_from_slice(&[0u8; 64]);
    bytes
}

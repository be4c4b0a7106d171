//! Authenticated, quota-gated image description gateway.
//!
//! Callers present an identity-provider session token (RS256, verified against
//! the provider's JWKS). Free-tier callers get a fixed number of analyses per
//! process lifetime; premium callers are unbounded. Uploads are forwarded to a
//! vision model and a caller is charged only once a description comes back.
//!
//! Routes:
//!
//! ```text
//! GET  /api/health   - liveness (public)
//! GET  /api/usage    - tier, used, limit (bearer)
//! POST /api/analyze  - multipart image → description (bearer)
//! ```

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod services;
pub mod state;

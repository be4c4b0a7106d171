use serde::Serialize;

use crate::services::auth::claims::Claims;

const PREMIUM_MARKER: &str = "premium";

/// Subscription level of a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Premium,
}

impl Tier {
    /// Reads `public_metadata.subscription_tier`.
    ///
    /// Anything other than the exact string `"premium"` (missing metadata,
    /// `null`, a non-object, another value) is the free tier.
    pub fn from_claims(claims: &Claims) -> Self {
        let marker = claims
            .public_metadata
            .get("subscription_tier")
            .and_then(|v| v.as_str());

        match marker {
            Some(PREMIUM_MARKER) => Self::Premium,
            _ => Self::Free,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Premium => "premium",
        }
    }
}

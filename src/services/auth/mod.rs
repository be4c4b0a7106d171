pub mod claims;
pub mod error;
pub mod jwks;
pub mod tier;
pub mod token;

pub use claims::{Claims, VerifiedToken};
pub use error::AuthError;
pub use jwks::{HttpJwksFetcher, JwksFetcher, KeyCachePolicy, KeyResolutionError, KeyResolver, StaticJwks};
pub use tier::Tier;
pub use token::TokenVerifier;

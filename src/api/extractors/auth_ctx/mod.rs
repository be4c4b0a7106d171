/*!
 * Authentication context extractor
 *
 * Responsibility:
 * - Provide the authenticated caller (AuthCtx) to handlers
 * - axum-specific code lives in core, the type itself in types
 */

mod core;
mod types;

pub use self::core::AuthCtxExtractor;
pub use self::types::AuthCtx;

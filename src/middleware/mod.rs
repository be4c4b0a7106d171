/*
 * Responsibility
 * - Public interface of the middleware layer
 * - auth (bearer verification), cors, http (request id / trace / limits / timeout),
 *   security_headers
 */
pub mod auth;
pub mod cors;
pub mod http;
pub mod security_headers;

//! Request middleware: access logging and token authentication.

pub mod auth;
pub mod logging;

pub use auth::require_token;
pub use logging::logging_middleware;

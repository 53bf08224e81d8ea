//! Request-scoped DTOs exchanged with the browser UI.
//!
//! Nothing here is persisted; every value is built from a storage response
//! and discarded once serialized.

pub mod bucket;
pub mod credentials;
pub mod object;

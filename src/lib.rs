//! HTTP extension serving Google Cloud Storage operations to a notebook UI.
//!
//! The storage handlers translate browser requests into calls on a
//! request-scoped [`services::storage_service::StorageClient`] and translate
//! the results back into JSON or raw bytes.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

pub use errors::AppError;
pub use routes::routes::routes as create_router;
pub use state::AppState;

//! Request logging middleware.

use axum::{extract::Request, middleware::Next, response::Response};
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

/// Wrap each request in a span carrying a fresh request id.
///
/// Only the path is logged; the query string may carry a token.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let span = info_span!(
        "request",
        request_id = %Uuid::new_v4(),
        method = %request.method(),
        path = %request.uri().path(),
    );

    async move {
        info!("started");
        let response = next.run(request).await;
        info!(status = %response.status(), "finished");
        response
    }
    .instrument(span)
    .await
}

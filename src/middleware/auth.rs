//! Token authentication for plugin routes.
//!
//! Accepts the notebook server's conventions: `Authorization: token <t>`,
//! `Authorization: Bearer <t>` or a `token` query parameter.

use crate::{errors::AppError, handlers::extract::QueryArgs, state::AppState};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

fn header_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("token") || scheme.eq_ignore_ascii_case("bearer") {
        Some(token.trim())
    } else {
        None
    }
}

pub async fn require_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.auth_token.as_deref() else {
        return next.run(request).await;
    };

    let authorized = match header_token(request.headers()) {
        Some(token) => token == expected,
        None => QueryArgs::from_uri(request.uri())
            .ok()
            .is_some_and(|args| args.required("token").is_ok_and(|t| t == expected)),
    };

    if !authorized {
        warn!("rejected unauthenticated request to {}", request.uri().path());
        return AppError::new(StatusCode::FORBIDDEN, "Forbidden").into_response();
    }
    next.run(request).await
}

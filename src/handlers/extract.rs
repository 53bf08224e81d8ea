//! Argument helpers shared by the storage handlers.

use crate::errors::AppError;
use axum::{
    extract::{Form, FromRequest, Multipart, Query, Request},
    http::{StatusCode, Uri, header},
};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Missing argument {0}")]
pub struct MissingArgument(pub String);

/// Query-string arguments of a GET request.
#[derive(Debug, Default)]
pub struct QueryArgs(HashMap<String, String>);

impl QueryArgs {
    pub fn from_uri(uri: &Uri) -> Result<Self, String> {
        Query::<HashMap<String, String>>::try_from_uri(uri)
            .map(|Query(args)| Self(args))
            .map_err(|rejection| rejection.body_text())
    }

    /// A present argument; the empty string counts as present.
    pub fn required(&self, name: &str) -> Result<&str, MissingArgument> {
        self.0
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| MissingArgument(name.to_string()))
    }
}

/// Treat absent and empty body fields alike.
pub fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Parse a JSON request body; malformed bodies are server errors.
pub fn json_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, AppError> {
    serde_json::from_slice(body).map_err(|err| AppError::internal(err.to_string()))
}

/// Oversized bodies keep their 413; any other unreadable form is a server error.
fn form_rejected(status: StatusCode, message: String) -> AppError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::new(status, message)
    } else {
        AppError::internal(message)
    }
}

/// Text fields of a urlencoded or multipart form body.
#[derive(Debug, Default)]
pub struct FormFields(pub HashMap<String, String>);

impl FormFields {
    pub fn take(&mut self, name: &str) -> Option<String> {
        self.0.remove(name)
    }
}

impl<S> FromRequest<S> for FormFields
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("multipart/form-data"));

        if !is_multipart {
            let Form(fields) = Form::<HashMap<String, String>>::from_request(req, state)
                .await
                .map_err(|rejection| form_rejected(rejection.status(), rejection.body_text()))?;
            return Ok(Self(fields));
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|rejection| form_rejected(rejection.status(), rejection.body_text()))?;
        let mut fields = HashMap::new();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|err| form_rejected(err.status(), err.body_text()))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            let value = field
                .text()
                .await
                .map_err(|err| form_rejected(err.status(), err.body_text()))?;
            fields.insert(name, value);
        }
        Ok(Self(fields))
    }
}

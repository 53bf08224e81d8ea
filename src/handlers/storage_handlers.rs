//! HTTP handlers for the `api/storage/*` endpoints.
//!
//! Each handler validates its arguments before touching credentials or the
//! backend, opens one storage session, makes one storage call and drops the
//! session before building the response.
//!
//! Failure shapes differ per endpoint because the browser UI depends on them:
//! read endpoints answer HTTP 200 with `{"error"}`, mutations use 400/500 and
//! forward backend errors with their own status.

use crate::{
    errors::{AppError, CROSS_BUCKET_RENAME, MISSING_PARAMETERS},
    handlers::extract::{FormFields, QueryArgs, json_body, present},
    services::{
        notebook,
        storage_service::{ContentFormat, StorageError},
    },
    state::AppState,
};
use axum::{
    Json,
    body::{Body, Bytes},
    extract::State,
    http::{HeaderValue, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use std::fmt::Display;
use tracing::error;

const NOTEBOOK_EXTENSION: &str = ".ipynb";
const DELETE_SUCCESS: &str = "File / Folder Successfully deleted";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderRequest {
    pub bucket: Option<String>,
    pub path: Option<String>,
    pub folder_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteFileRequest {
    pub bucket: Option<String>,
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameFileRequest {
    pub old_bucket: Option<String>,
    pub old_path: Option<String>,
    pub new_bucket: Option<String>,
    pub new_path: Option<String>,
}

/// Log and report a failure with HTTP 200.
fn reported(context: &str, err: impl Display) -> AppError {
    error!("{}: {}", context, err);
    AppError::reported(err.to_string())
}

/// Log and map a failed mutation: backend errors keep their status.
fn mutation_failed(context: &str, err: StorageError) -> AppError {
    error!("{}: {}", context, err);
    match err {
        StorageError::Backend { status, message } => AppError::backend(status, message),
        other => AppError::internal(other.to_string()),
    }
}

fn raw_response(content: Bytes, content_type: &'static str) -> Response {
    let mut response = Response::new(Body::from(content));
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// GET `listBuckets?prefix=`: buckets of the active project.
pub async fn list_buckets(
    State(state): State<AppState>,
    uri: Uri,
) -> Result<impl IntoResponse, AppError> {
    const CONTEXT: &str = "Error fetching buckets";
    let args = QueryArgs::from_uri(&uri).map_err(|e| reported(CONTEXT, e))?;
    let prefix = args.required("prefix").map_err(|e| reported(CONTEXT, e))?;

    let session = state
        .storage
        .session()
        .await
        .map_err(|e| reported(CONTEXT, e))?;
    let buckets = session
        .list_buckets(prefix)
        .await
        .map_err(|e| reported(CONTEXT, e))?;
    drop(session);

    Ok(Json(buckets))
}

/// GET `listFiles?bucket=&prefix=`: one folder level of a bucket.
pub async fn list_files(
    State(state): State<AppState>,
    uri: Uri,
) -> Result<impl IntoResponse, AppError> {
    const CONTEXT: &str = "Error fetching files";
    let args = QueryArgs::from_uri(&uri).map_err(|e| reported(CONTEXT, e))?;
    let prefix = args.required("prefix").map_err(|e| reported(CONTEXT, e))?;
    let bucket = args.required("bucket").map_err(|e| reported(CONTEXT, e))?;

    let session = state
        .storage
        .session()
        .await
        .map_err(|e| reported(CONTEXT, e))?;
    let files = session
        .list_files(bucket, prefix)
        .await
        .map_err(|e| reported(CONTEXT, e))?;
    drop(session);

    Ok(Json(files))
}

/// POST `createFolder` with `{bucket, path?, folderName}`.
pub async fn create_folder(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    const CONTEXT: &str = "Error creating folder";
    let request: CreateFolderRequest =
        json_body(&body).inspect_err(|e| error!("{}: {}", CONTEXT, e))?;
    let (Some(bucket), Some(folder_name)) =
        (present(request.bucket), present(request.folder_name))
    else {
        return Err(AppError::bad_request(MISSING_PARAMETERS));
    };
    let path = request.path.unwrap_or_default();

    let session = state
        .storage
        .session()
        .await
        .map_err(|e| mutation_failed(CONTEXT, e))?;
    let folder = session
        .create_folder(&bucket, &path, &folder_name)
        .await
        .map_err(|e| mutation_failed(CONTEXT, e))?;
    drop(session);

    Ok(Json(folder))
}

/// POST `saveFile` form with `bucket`, `path`, `contents`, `upload`.
pub async fn save_file(
    State(state): State<AppState>,
    mut form: FormFields,
) -> Result<impl IntoResponse, AppError> {
    const CONTEXT: &str = "Error saving content";
    let bucket = present(form.take("bucket"));
    let path = present(form.take("path"));
    let contents = form.take("contents").unwrap_or_default();
    let upload = form.take("upload").as_deref() == Some("true");

    let (Some(bucket), Some(path)) = (bucket, path) else {
        return Err(AppError::bad_request(MISSING_PARAMETERS));
    };

    let session = state
        .storage
        .session()
        .await
        .map_err(|e| mutation_failed(CONTEXT, e))?;
    let saved = session
        .save_content(&bucket, &path, &contents, upload)
        .await
        .map_err(|e| mutation_failed(CONTEXT, e))?;
    drop(session);

    Ok(Json(saved))
}

/// GET `loadFile?bucket=&path=&format=`: file content for the editor.
///
/// Notebooks requested as `json` are decoded and normalized; `base64` content
/// and everything else is returned byte for byte.
pub async fn load_file(State(state): State<AppState>, uri: Uri) -> Result<Response, AppError> {
    const CONTEXT: &str = "Error fetching file";
    let args = QueryArgs::from_uri(&uri).map_err(|e| reported(CONTEXT, e))?;
    let bucket = args.required("bucket").map_err(|e| reported(CONTEXT, e))?;
    let path = args.required("path").map_err(|e| reported(CONTEXT, e))?;
    let format = ContentFormat::parse(args.required("format").map_err(|e| reported(CONTEXT, e))?);

    let session = state
        .storage
        .session()
        .await
        .map_err(|e| reported(CONTEXT, e))?;
    let content = session
        .get_file(bucket, path, format)
        .await
        .map_err(|e| reported(CONTEXT, e))?;
    drop(session);

    if path.ends_with(NOTEBOOK_EXTENSION) && format == ContentFormat::Json {
        let document = notebook::read_notebook(&content).map_err(|e| reported(CONTEXT, e))?;
        return Ok(Json(document).into_response());
    }
    let content_type = match format {
        ContentFormat::Base64 => "application/octet-stream",
        ContentFormat::Json | ContentFormat::Text => "text/plain; charset=utf-8",
    };
    Ok(raw_response(content, content_type))
}

/// POST `deleteFile` with `{bucket, path?}`.
pub async fn delete_file(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    const CONTEXT: &str = "Error deleting file";
    let request: DeleteFileRequest =
        json_body(&body).inspect_err(|e| error!("{}: {}", CONTEXT, e))?;
    let Some(bucket) = present(request.bucket) else {
        return Err(AppError::in_band(StatusCode::BAD_REQUEST.as_u16(), MISSING_PARAMETERS));
    };
    let path = present(request.path);

    let session = state
        .storage
        .session()
        .await
        .map_err(|e| mutation_failed(CONTEXT, e))?;
    session
        .delete_file(&bucket, path.as_deref())
        .await
        .map_err(|e| mutation_failed(CONTEXT, e))?;
    drop(session);

    Ok(Json(json!({
        "message": DELETE_SUCCESS,
        "status": StatusCode::OK.as_u16()
    })))
}

/// POST `renameFile` with `{oldBucket, oldPath, newBucket, newPath}`.
pub async fn rename_file(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    const CONTEXT: &str = "Error renaming file";
    let request: RenameFileRequest =
        json_body(&body).inspect_err(|e| error!("{}: {}", CONTEXT, e))?;
    let (Some(old_bucket), Some(old_path), Some(new_bucket), Some(new_path)) = (
        present(request.old_bucket),
        present(request.old_path),
        present(request.new_bucket),
        present(request.new_path),
    ) else {
        return Err(AppError::bad_request(MISSING_PARAMETERS));
    };
    // Objects are copied with the rewrite API, which only works within a bucket here.
    if old_bucket != new_bucket {
        return Err(AppError::bad_request(CROSS_BUCKET_RENAME));
    }

    let session = state
        .storage
        .session()
        .await
        .map_err(|e| mutation_failed(CONTEXT, e))?;
    let renamed = session
        .rename_file(&old_bucket, &old_path, &new_path)
        .await
        .map_err(|e| mutation_failed(CONTEXT, e))?;
    drop(session);

    Ok(Json(renamed))
}

/// GET `downloadFile?bucket=&path=&name=&format=`: raw bytes as an attachment.
pub async fn download_file(State(state): State<AppState>, uri: Uri) -> Result<Response, AppError> {
    const CONTEXT: &str = "Error downloading file";
    let args = QueryArgs::from_uri(&uri).map_err(|e| reported(CONTEXT, e))?;
    let bucket = args.required("bucket").map_err(|e| reported(CONTEXT, e))?;
    let path = args.required("path").map_err(|e| reported(CONTEXT, e))?;
    let name = args.required("name").map_err(|e| reported(CONTEXT, e))?;
    let format = ContentFormat::parse(args.required("format").map_err(|e| reported(CONTEXT, e))?);

    let session = state
        .storage
        .session()
        .await
        .map_err(|e| reported(CONTEXT, e))?;
    let content = session
        .download_file(bucket, path, name, format)
        .await
        .map_err(|e| reported(CONTEXT, e))?;
    drop(session);

    let mut response = raw_response(content, "application/octet-stream");
    let disposition = format!("attachment; filename=\"{}\"", name.replace(['"', '\\'], "_"));
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        response
            .headers_mut()
            .insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}

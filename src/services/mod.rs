//! Collaborators behind the HTTP handlers: the gcloud CLI, credential and
//! endpoint resolution, the storage client and notebook decoding.

pub mod credentials;
pub mod gcloud;
pub mod gcs;
pub mod notebook;
pub mod storage_service;
pub mod urls;

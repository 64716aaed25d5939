//! File uploads: content-type checks in front of the blob store.

use std::sync::Arc;

use common::{Actor, Role};
use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkflowError};
use crate::services::BlobStore;

/// What an uploaded file will be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadPurpose {
    Photo,
    Document,
    PoliceReport,
    Signature,
}

impl UploadPurpose {
    fn accepts(&self, content_type: &str) -> bool {
        match self {
            UploadPurpose::Photo | UploadPurpose::Signature => is_image(content_type),
            UploadPurpose::Document | UploadPurpose::PoliceReport => {
                is_image(content_type) || content_type == "application/pdf"
            }
        }
    }

    fn allowed_roles(&self) -> &'static [Role] {
        match self {
            UploadPurpose::Signature => &[Role::SuperAdmin],
            _ => &[
                Role::Citizen,
                Role::LicenseOfficer,
                Role::ViolationOfficer,
                Role::TrafficPolice,
                Role::SuperAdmin,
            ],
        }
    }
}

/// Raw file as received from the caller.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl FileUpload {
    pub fn new(bytes: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.into(),
        }
    }

    /// Lower-cased media type without parameters.
    pub fn media_type(&self) -> String {
        media_type(&self.content_type)
    }
}

/// Handle returned for a stored upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    pub handle: String,
    pub purpose: UploadPurpose,
    pub content_type: String,
    pub size: usize,
}

pub(crate) fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

pub(crate) fn is_image(media_type: &str) -> bool {
    media_type
        .strip_prefix("image/")
        .is_some_and(|subtype| !subtype.is_empty())
}

/// File extension suggested to the blob store.
pub(crate) fn extension_for(media_type: &str) -> &'static str {
    match media_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        "application/pdf" => "pdf",
        _ => "bin",
    }
}

pub struct Uploads {
    blobs: Arc<dyn BlobStore>,
}

impl Uploads {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    /// Stores a file and returns the handle to reference from later
    /// requests. Storage failures are returned to the caller.
    #[tracing::instrument(skip(self, file), fields(role = %actor.role, size = file.bytes.len()))]
    pub async fn upload(
        &self,
        actor: &Actor,
        purpose: UploadPurpose,
        file: FileUpload,
    ) -> Result<StoredFile> {
        actor.require(purpose.allowed_roles(), "upload this file")?;
        if file.bytes.is_empty() {
            return Err(WorkflowError::validation("uploaded file is empty"));
        }
        let media = file.media_type();
        if !purpose.accepts(&media) {
            return Err(WorkflowError::validation(format!(
                "{media} is not accepted for this upload"
            )));
        }

        let handle = self.blobs.store(&file.bytes, extension_for(&media)).await?;
        metrics::counter!("uploads_total").increment(1);
        tracing::debug!(%handle, "file stored");
        Ok(StoredFile {
            handle,
            purpose,
            content_type: media,
            size: file.bytes.len(),
        })
    }
}

//! Access to the DICOM store holding the converted instances.

mod memory;
mod orthanc;

pub use memory::MemoryStore;
pub use orthanc::{Credentials, OrthancStore};

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::tags::DicomInstanceTags;

/// Name of the attachment slot holding an instance's thumbnail.
pub const THUMBNAIL_ATTACHMENT: &str = "thumbnail";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Series {0} not found")]
    SeriesNotFound(String),

    #[error("Instance {0} not found")]
    InstanceNotFound(String),

    #[error("Attachment {attachment} of instance {instance} not found")]
    AttachmentNotFound {
        instance: String,
        attachment: String,
    },

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store rejected the request: {0}")]
    Rejected(String),

    #[error("Unexpected store response: {0}")]
    InvalidResponse(String),
}

/// Identifiers assigned by the store to an uploaded instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoredInstance {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "ParentSeries")]
    pub parent_series: String,
}

#[async_trait]
pub trait DicomStore: Send + Sync {
    /// Tags of every instance of a series, by instance identifier.
    async fn series_instance_tags(
        &self,
        series_id: &str,
    ) -> Result<BTreeMap<String, DicomInstanceTags>, StoreError>;

    async fn instance_tags(&self, instance_id: &str) -> Result<DicomInstanceTags, StoreError>;

    /// Names of the attachments of an instance.
    async fn instance_attachments(&self, instance_id: &str) -> Result<Vec<String>, StoreError>;

    /// Encoded bytes of the first frame of an instance.
    async fn frame(&self, instance_id: &str) -> Result<Vec<u8>, StoreError>;

    async fn thumbnail(&self, instance_id: &str) -> Result<Vec<u8>, StoreError>;

    /// Upload a complete DICOM file.
    async fn store_instance(&self, dicom: Vec<u8>) -> Result<StoredInstance, StoreError>;

    async fn put_thumbnail(&self, instance_id: &str, jpeg: Vec<u8>) -> Result<(), StoreError>;
}

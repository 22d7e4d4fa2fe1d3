use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{Map, Value};
use tracing::debug;

use super::{DicomStore, StoreError, StoredInstance, THUMBNAIL_ATTACHMENT};
use crate::tags::DicomInstanceTags;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Store backed by the Orthanc REST API.
#[derive(Debug, Clone)]
pub struct OrthancStore {
    base_url: String,
    credentials: Option<Credentials>,
    client: Client,
}

impl OrthancStore {
    pub fn new(base_url: &str, credentials: Option<Credentials>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            client: Client::new(),
        }
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some(credentials) => {
                request.basic_auth(&credentials.username, Some(&credentials.password))
            }
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        self.authorize(request)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", self.base_url)))
    }

    async fn get(
        &self,
        path: &str,
        not_found: impl FnOnce() -> StoreError,
    ) -> Result<Response, StoreError> {
        debug!("GET {path}");
        let response = self
            .send(self.client.get(format!("{}{path}", self.base_url)))
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(not_found()),
            status if status.is_success() => Ok(response),
            status => Err(StoreError::Rejected(format!("GET {path}: {status}"))),
        }
    }

    async fn get_bytes(
        &self,
        path: &str,
        not_found: impl FnOnce() -> StoreError,
    ) -> Result<Vec<u8>, StoreError> {
        let response = self.get(path, not_found).await?;
        let bytes = response.bytes().await.map_err(invalid_response)?;
        Ok(bytes.to_vec())
    }
}

fn invalid_response(error: reqwest::Error) -> StoreError {
    StoreError::InvalidResponse(error.to_string())
}

#[async_trait]
impl DicomStore for OrthancStore {
    async fn series_instance_tags(
        &self,
        series_id: &str,
    ) -> Result<BTreeMap<String, DicomInstanceTags>, StoreError> {
        let path = format!("/series/{series_id}/instances-tags?simplify");
        let listing: BTreeMap<String, Map<String, Value>> = self
            .get(&path, || StoreError::SeriesNotFound(series_id.to_string()))
            .await?
            .json()
            .await
            .map_err(invalid_response)?;

        Ok(listing
            .into_iter()
            .map(|(id, tags)| (id, DicomInstanceTags::from_simplified(&tags)))
            .collect())
    }

    async fn instance_tags(&self, instance_id: &str) -> Result<DicomInstanceTags, StoreError> {
        let path = format!("/instances/{instance_id}/simplified-tags");
        let tags: Map<String, Value> = self
            .get(&path, || StoreError::InstanceNotFound(instance_id.to_string()))
            .await?
            .json()
            .await
            .map_err(invalid_response)?;
        Ok(DicomInstanceTags::from_simplified(&tags))
    }

    async fn instance_attachments(&self, instance_id: &str) -> Result<Vec<String>, StoreError> {
        let path = format!("/instances/{instance_id}/attachments");
        self.get(&path, || StoreError::InstanceNotFound(instance_id.to_string()))
            .await?
            .json()
            .await
            .map_err(invalid_response)
    }

    async fn frame(&self, instance_id: &str) -> Result<Vec<u8>, StoreError> {
        let path = format!("/instances/{instance_id}/content/7fe0-0010/1");
        self.get_bytes(&path, || StoreError::InstanceNotFound(instance_id.to_string()))
            .await
    }

    async fn thumbnail(&self, instance_id: &str) -> Result<Vec<u8>, StoreError> {
        let path = format!("/instances/{instance_id}/attachments/{THUMBNAIL_ATTACHMENT}/data");
        self.get_bytes(&path, || StoreError::AttachmentNotFound {
            instance: instance_id.to_string(),
            attachment: THUMBNAIL_ATTACHMENT.to_string(),
        })
        .await
    }

    async fn store_instance(&self, dicom: Vec<u8>) -> Result<StoredInstance, StoreError> {
        debug!("POST /instances ({} bytes)", dicom.len());
        let request = self
            .client
            .post(format!("{}/instances", self.base_url))
            .header(reqwest::header::CONTENT_TYPE, "application/dicom")
            .body(dicom);
        let response = self.send(request).await?;
        if !response.status().is_success() {
            return Err(StoreError::Rejected(format!(
                "POST /instances: {}",
                response.status()
            )));
        }
        response.json().await.map_err(invalid_response)
    }

    async fn put_thumbnail(&self, instance_id: &str, jpeg: Vec<u8>) -> Result<(), StoreError> {
        let path = format!("/instances/{instance_id}/attachments/{THUMBNAIL_ATTACHMENT}");
        debug!("PUT {path} ({} bytes)", jpeg.len());
        let request = self
            .client
            .put(format!("{}{path}", self.base_url))
            .body(jpeg);
        let response = self.send(request).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(StoreError::InstanceNotFound(instance_id.to_string())),
            status if status.is_success() => Ok(()),
            status => Err(StoreError::Rejected(format!("PUT {path}: {status}"))),
        }
    }
}

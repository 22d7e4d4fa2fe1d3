use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use dicom::core::value::Value;
use dicom::object::from_reader;
use dicom_dictionary_std::tags;
use serde_json::Map;
use uuid::Uuid;

use super::{DicomStore, StoreError, StoredInstance, THUMBNAIL_ATTACHMENT};
use crate::tags::DicomInstanceTags;

const PREAMBLE_LENGTH: usize = 128;

struct StoredEntry {
    series_id: String,
    /// Kept in simplified form, as a remote store would hand it out.
    tags: Map<String, serde_json::Value>,
    frame: Vec<u8>,
    attachments: BTreeMap<String, Vec<u8>>,
}

#[derive(Default)]
struct Inner {
    instances: BTreeMap<String, StoredEntry>,
    /// SeriesInstanceUID → series identifier.
    series_ids: BTreeMap<String, String>,
    /// SOPInstanceUID → instance identifier.
    instance_ids: BTreeMap<String, String>,
}

/// In-process store with the same behaviour as the remote one: uploaded
/// files are parsed, re-uploading an instance keeps its identifier, and
/// instances are listed in identifier order.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an instance from its tags alone, without pixel data.
    pub fn insert_instance(
        &self,
        series_id: &str,
        instance_id: &str,
        instance: &DicomInstanceTags,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.instances.insert(
            instance_id.to_string(),
            StoredEntry {
                series_id: series_id.to_string(),
                tags: instance.to_simplified(),
                frame: Vec::new(),
                attachments: BTreeMap::new(),
            },
        );
        Ok(())
    }

    pub fn instance_count(&self) -> usize {
        self.lock().map(|inner| inner.instances.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

fn first_fragment(object: &dicom::object::DefaultDicomObject) -> Vec<u8> {
    match object.element(tags::PIXEL_DATA).map(|element| element.value()) {
        Ok(Value::PixelSequence(sequence)) => {
            sequence.fragments().first().cloned().unwrap_or_default()
        }
        Ok(Value::Primitive(value)) => value.to_bytes().into_owned(),
        _ => Vec::new(),
    }
}

#[async_trait]
impl DicomStore for MemoryStore {
    async fn series_instance_tags(
        &self,
        series_id: &str,
    ) -> Result<BTreeMap<String, DicomInstanceTags>, StoreError> {
        let inner = self.lock()?;
        let listing: BTreeMap<_, _> = inner
            .instances
            .iter()
            .filter(|(_, entry)| entry.series_id == series_id)
            .map(|(id, entry)| (id.clone(), DicomInstanceTags::from_simplified(&entry.tags)))
            .collect();

        if listing.is_empty() {
            return Err(StoreError::SeriesNotFound(series_id.to_string()));
        }
        Ok(listing)
    }

    async fn instance_tags(&self, instance_id: &str) -> Result<DicomInstanceTags, StoreError> {
        let inner = self.lock()?;
        inner
            .instances
            .get(instance_id)
            .map(|entry| DicomInstanceTags::from_simplified(&entry.tags))
            .ok_or_else(|| StoreError::InstanceNotFound(instance_id.to_string()))
    }

    async fn instance_attachments(&self, instance_id: &str) -> Result<Vec<String>, StoreError> {
        let inner = self.lock()?;
        inner
            .instances
            .get(instance_id)
            .map(|entry| entry.attachments.keys().cloned().collect())
            .ok_or_else(|| StoreError::InstanceNotFound(instance_id.to_string()))
    }

    async fn frame(&self, instance_id: &str) -> Result<Vec<u8>, StoreError> {
        let inner = self.lock()?;
        inner
            .instances
            .get(instance_id)
            .map(|entry| entry.frame.clone())
            .ok_or_else(|| StoreError::InstanceNotFound(instance_id.to_string()))
    }

    async fn thumbnail(&self, instance_id: &str) -> Result<Vec<u8>, StoreError> {
        let inner = self.lock()?;
        let entry = inner
            .instances
            .get(instance_id)
            .ok_or_else(|| StoreError::InstanceNotFound(instance_id.to_string()))?;
        entry
            .attachments
            .get(THUMBNAIL_ATTACHMENT)
            .cloned()
            .ok_or_else(|| StoreError::AttachmentNotFound {
                instance: instance_id.to_string(),
                attachment: THUMBNAIL_ATTACHMENT.to_string(),
            })
    }

    async fn store_instance(&self, dicom: Vec<u8>) -> Result<StoredInstance, StoreError> {
        let payload = match dicom.get(PREAMBLE_LENGTH..PREAMBLE_LENGTH + 4) {
            Some(b"DICM") => &dicom[PREAMBLE_LENGTH..],
            _ => &dicom[..],
        };
        let object = from_reader(payload).map_err(|e| StoreError::Rejected(e.to_string()))?;
        let instance = DicomInstanceTags::from_object(&object);

        let series_uid = instance
            .series_instance_uid
            .clone()
            .ok_or_else(|| StoreError::Rejected("missing SeriesInstanceUID".to_string()))?;
        let sop_uid = instance
            .sop_instance_uid
            .clone()
            .ok_or_else(|| StoreError::Rejected("missing SOPInstanceUID".to_string()))?;

        let mut inner = self.lock()?;
        let series_id = inner
            .series_ids
            .entry(series_uid)
            .or_insert_with(|| Uuid::new_v4().to_string())
            .clone();
        let instance_id = inner
            .instance_ids
            .entry(sop_uid)
            .or_insert_with(|| Uuid::new_v4().to_string())
            .clone();

        let attachments = inner
            .instances
            .remove(&instance_id)
            .map(|entry| entry.attachments)
            .unwrap_or_default();
        inner.instances.insert(
            instance_id.clone(),
            StoredEntry {
                series_id: series_id.clone(),
                tags: instance.to_simplified(),
                frame: first_fragment(&object),
                attachments,
            },
        );

        Ok(StoredInstance {
            id: instance_id,
            parent_series: series_id,
        })
    }

    async fn put_thumbnail(&self, instance_id: &str, jpeg: Vec<u8>) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let entry = inner
            .instances
            .get_mut(instance_id)
            .ok_or_else(|| StoreError::InstanceNotFound(instance_id.to_string()))?;
        entry
            .attachments
            .insert(THUMBNAIL_ATTACHMENT.to_string(), jpeg);
        Ok(())
    }
}

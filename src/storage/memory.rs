// src/storage/memory.rs
//! In-process content store.

use crate::error::StorageError;
use crate::storage::ContentStore;
use crate::utils::crypto::sha256;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// Content-addressed map: the id is `bafk` followed by the hex SHA-256 of
/// the blob, so identical blobs share an id.
#[derive(Default)]
pub struct MemoryContentStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    fail_uploads: AtomicBool,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every upload fail while set.
    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn content_id(blob: &[u8]) -> String {
        format!("bafk{}", hex::encode(sha256(blob)))
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn upload(&self, blob: Vec<u8>, filename: &str, _mime: &str) -> Result<String, StorageError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(StorageError::UploadFailure(format!("store refused {}", filename)));
        }
        let content_id = Self::content_id(&blob);
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(content_id.clone(), blob);
        Ok(content_id)
    }

    async fn download(&self, content_id: &str) -> Result<Vec<u8>, StorageError> {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(content_id)
            .cloned()
            .ok_or_else(|| StorageError::FetchFailure {
                content_id: content_id.to_string(),
                reason: "no such content".into(),
            })
    }
}

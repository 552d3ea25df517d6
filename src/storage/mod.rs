// src/storage/mod.rs
//! Content-addressed publishing of anchor bundles.
//!
//! [`ContentStore`] is the byte-level boundary to a store (IPFS node,
//! pinning service, in-memory). [`ContentAnchorStore`] publishes
//! [`AnchorBundle`]s through it and keeps the bundle's content and gateway
//! URIs up to date.

pub mod ipfs_client;
pub mod memory;
pub mod pinata;

use crate::error::StorageError;
use crate::models::anchor::AnchorBundle;
use crate::utils::serialization::to_canonical_bytes;
use async_trait::async_trait;
use std::sync::Arc;

pub use ipfs_client::IpfsNodeStore;
pub use memory::MemoryContentStore;
pub use pinata::PinataStore;

pub const BUNDLE_FILENAME: &str = "did-bundle.json";
pub const BUNDLE_MIME: &str = "application/json";

const CONTENT_SCHEME: &str = "ipfs://";
const GATEWAY_PATH: &str = "/ipfs/";

/// Raw content-addressed storage.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Stores `blob` and returns its content id.
    async fn upload(&self, blob: Vec<u8>, filename: &str, mime: &str) -> Result<String, StorageError>;

    async fn download(&self, content_id: &str) -> Result<Vec<u8>, StorageError>;
}

/// Where a bundle was published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub content_id: String,
    /// `ipfs://<content id>`
    pub content_uri: String,
    /// `https://<gateway>/ipfs/<content id>`
    pub gateway_uri: String,
}

/// Publishes bundles to a [`ContentStore`].
#[derive(Clone)]
pub struct ContentAnchorStore {
    backend: Arc<dyn ContentStore>,
    gateway_host: String,
}

impl ContentAnchorStore {
    /// Creates a publisher over `backend`.
    ///
    /// # Arguments
    /// * `backend` - Byte-level store the bundles go to
    /// * `gateway_host` - Gateway host (or base URL) for receipt links
    pub fn new(backend: Arc<dyn ContentStore>, gateway_host: impl Into<String>) -> Self {
        ContentAnchorStore {
            backend,
            gateway_host: gateway_host.into(),
        }
    }

    /// Uploads the bundle and points its `content_uri`/`gateway_uri` at the
    /// new copy.
    ///
    /// # Arguments
    /// * `bundle` - Bundle to upload as canonical JSON
    ///
    /// # Returns
    /// Content id and URIs of the upload; `UploadFailure` from the backend
    /// is passed through without retrying.
    pub async fn publish(&self, bundle: &mut AnchorBundle) -> Result<PublishReceipt, StorageError> {
        let receipt = self.upload_bundle(bundle).await?;
        bundle.content_uri = Some(receipt.content_uri.clone());
        bundle.gateway_uri = Some(receipt.gateway_uri.clone());
        log::info!("published bundle for {} as {}", bundle.did, receipt.content_id);
        Ok(receipt)
    }

    /// Uploads the audit copy of a confirmed bundle.
    ///
    /// The copy embeds the transaction result, so it gets a new content id.
    /// The bundle's URIs move to the audit copy; `transaction.uri` still
    /// names the copy the ledger points at.
    pub async fn republish(&self, bundle: &mut AnchorBundle) -> Result<PublishReceipt, StorageError> {
        if !bundle.is_confirmed() {
            return Err(StorageError::Unconfirmed);
        }
        let previous = bundle.content_uri.clone();
        let receipt = self.publish(bundle).await?;
        log::info!(
            "republished bundle for {}: {} -> {}",
            bundle.did,
            previous.as_deref().unwrap_or("<none>"),
            receipt.content_uri
        );
        Ok(receipt)
    }

    /// Downloads and parses a bundle.
    ///
    /// # Arguments
    /// * `reference` - A bare content id, an `ipfs://` URI or a gateway URL
    ///
    /// # Returns
    /// The parsed bundle; `FetchFailure` when the backend has no such
    /// content, `Serialization` when it is not a bundle.
    pub async fn fetch_bundle(&self, reference: &str) -> Result<AnchorBundle, StorageError> {
        let content_id = content_id_from_uri(reference)?;
        let bytes = self.backend.download(content_id).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn gateway_uri(&self, content_id: &str) -> String {
        gateway_url(&self.gateway_host, content_id)
    }

    async fn upload_bundle(&self, bundle: &AnchorBundle) -> Result<PublishReceipt, StorageError> {
        let blob = to_canonical_bytes(bundle)?;
        let content_id = self.backend.upload(blob, BUNDLE_FILENAME, BUNDLE_MIME).await?;
        Ok(PublishReceipt {
            content_uri: format!("{}{}", CONTENT_SCHEME, content_id),
            gateway_uri: self.gateway_uri(&content_id),
            content_id,
        })
    }
}

/// Gateway link of `content_id`.
///
/// # Arguments
/// * `gateway` - Gateway host, or a base URL when a scheme is given
///   (e.g. `http://127.0.0.1:8080` for a local gateway)
/// * `content_id` - Content id to link to
///
/// # Returns
/// `https://<gateway>/ipfs/<content id>` for a bare host.
pub fn gateway_url(gateway: &str, content_id: &str) -> String {
    let base = gateway.trim_end_matches('/');
    if base.contains("://") {
        format!("{}{}{}", base, GATEWAY_PATH, content_id)
    } else {
        format!("https://{}{}{}", base, GATEWAY_PATH, content_id)
    }
}

/// Extracts the content id from `ipfs://<id>`, `https://<host>/ipfs/<id>`
/// or a bare id.
pub fn content_id_from_uri(reference: &str) -> Result<&str, StorageError> {
    let content_id = if let Some(id) = reference.strip_prefix(CONTENT_SCHEME) {
        id
    } else if reference.starts_with("https://") || reference.starts_with("http://") {
        match reference.find(GATEWAY_PATH) {
            Some(at) => &reference[at + GATEWAY_PATH.len()..],
            None => return Err(StorageError::InvalidContentUri(reference.to_string())),
        }
    } else {
        reference
    };

    let content_id = content_id.trim_end_matches('/');
    if content_id.is_empty() || content_id.contains('/') || content_id.contains(':') {
        return Err(StorageError::InvalidContentUri(reference.to_string()));
    }
    Ok(content_id)
}

// src/storage/ipfs_client.rs
//! IPFS node backend.
//!
//! Talks to the HTTP API of an IPFS node (`ipfs daemon`, Kubo) through
//! `ipfs-api-backend-hyper`.
//!
//! # Security Considerations
//! - Everything added is public on the IPFS network
//! - Only encrypted credential subjects should ever be published

use crate::error::StorageError;
use crate::storage::ContentStore;
use async_trait::async_trait;
use bytes::BytesMut;
use futures::TryStreamExt;
use ipfs_api_backend_hyper::{IpfsApi, IpfsClient, TryFromUri};
use std::io::Cursor;
use std::sync::Arc;
use tokio::task;

/// [`ContentStore`] backed by an IPFS node.
///
/// The hyper client is driven on a dedicated runtime inside
/// `spawn_blocking`, so calls work from any tokio runtime flavour.
#[derive(Clone)]
pub struct IpfsNodeStore {
    /// Shared IPFS client instance (thread-safe via Arc)
    client: Arc<IpfsClient>,
    api_url: String,
}

impl IpfsNodeStore {
    /// Creates a store for the node API at `api_url`
    /// (e.g. `http://localhost:5001`).
    ///
    /// No connection is made until the first upload or download.
    pub fn new(api_url: &str) -> Result<Self, StorageError> {
        let client = IpfsClient::from_str(api_url)
            .map_err(|e| StorageError::InvalidContentUri(format!("{}: {}", api_url, e)))?;
        Ok(IpfsNodeStore {
            client: Arc::new(client),
            api_url: api_url.to_string(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }
}

#[async_trait]
impl ContentStore for IpfsNodeStore {
    async fn upload(&self, blob: Vec<u8>, filename: &str, _mime: &str) -> Result<String, StorageError> {
        let client = self.client.clone();
        let size = blob.len();

        let added = task::spawn_blocking(move || -> Result<_, String> {
            let rt = tokio::runtime::Runtime::new().map_err(|e| e.to_string())?;
            rt.block_on(async {
                let reader = Cursor::new(blob);
                client.add(reader).await.map_err(|e| e.to_string())
            })
        })
        .await
        .map_err(|e| StorageError::UploadFailure(e.to_string()))?
        .map_err(StorageError::UploadFailure)?;

        log::debug!("added {} ({} bytes) to IPFS as {}", filename, size, added.hash);
        Ok(added.hash)
    }

    async fn download(&self, content_id: &str) -> Result<Vec<u8>, StorageError> {
        let client = self.client.clone();
        let hash = content_id.to_string();
        let fetch_failure = |reason: String| StorageError::FetchFailure {
            content_id: content_id.to_string(),
            reason,
        };

        let data = task::spawn_blocking(move || -> Result<_, String> {
            let rt = tokio::runtime::Runtime::new().map_err(|e| e.to_string())?;
            rt.block_on(async {
                client
                    .cat(&hash)
                    .try_fold(BytesMut::new(), |mut acc, chunk| async move {
                        acc.extend_from_slice(&chunk);
                        Ok(acc)
                    })
                    .await
                    .map_err(|e| e.to_string())
            })
        })
        .await
        .map_err(|e| fetch_failure(e.to_string()))?
        .map_err(fetch_failure)?;

        Ok(data.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{mock, Matcher};

    #[test]
    fn test_new_accepts_node_api_url() {
        let store = IpfsNodeStore::new("http://localhost:5001").unwrap();
        assert_eq!(store.api_url(), "http://localhost:5001");
    }

    #[test]
    fn test_new_rejects_garbage_url() {
        assert!(matches!(
            IpfsNodeStore::new("not a url"),
            Err(StorageError::InvalidContentUri(_))
        ));
    }

    #[tokio::test]
    async fn test_add_returns_node_hash() {
        let add = mock("POST", Matcher::Regex("^/api/v0/add".into()))
            .match_body(Matcher::Regex(r#"\{"did":"did:xrpl:r1"\}"#.into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"Name":"did-bundle.json","Hash":"QmAdded","Size":"30"}"#)
            .create();

        let store = IpfsNodeStore::new(&mockito::server_url()).unwrap();
        let content_id = store
            .upload(br#"{"did":"did:xrpl:r1"}"#.to_vec(), "did-bundle.json", "application/json")
            .await
            .unwrap();

        assert_eq!(content_id, "QmAdded");
        add.assert();
    }

    #[tokio::test]
    async fn test_cat_collects_body() {
        let cat = mock("POST", Matcher::Regex("^/api/v0/cat".into()))
            .match_query(Matcher::UrlEncoded("arg".into(), "QmHere".into()))
            .with_status(200)
            .with_body(r#"{"did":"did:xrpl:r1"}"#)
            .create();

        let store = IpfsNodeStore::new(&mockito::server_url()).unwrap();
        let body = store.download("QmHere").await.unwrap();

        assert_eq!(body, br#"{"did":"did:xrpl:r1"}"#.to_vec());
        cat.assert();
    }

    #[tokio::test]
    async fn test_node_error_is_fetch_failure() {
        let _cat = mock("POST", Matcher::Regex("^/api/v0/cat".into()))
            .match_query(Matcher::UrlEncoded("arg".into(), "QmGone".into()))
            .with_status(500)
            .with_header("content-type", "application/json")
            .with_body(r#"{"Message":"block not found","Code":0,"Type":"error"}"#)
            .create();

        let store = IpfsNodeStore::new(&mockito::server_url()).unwrap();
        match store.download("QmGone").await {
            Err(StorageError::FetchFailure { content_id, .. }) => assert_eq!(content_id, "QmGone"),
            other => panic!("expected fetch failure, got {:?}", other),
        }
    }
}

// src/storage/pinata.rs
//! Pinata pinning-service backend.
//!
//! Uploads go to `pinFileToIPFS` as a multipart form authenticated with a
//! JWT; downloads are plain GETs against the IPFS gateway.

use crate::error::StorageError;
use crate::storage::{gateway_url, ContentStore};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;

/// Response of `pinFileToIPFS`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PinResponse {
    ipfs_hash: String,
    #[serde(default)]
    pin_size: u64,
}

/// [`ContentStore`] backed by Pinata.
#[derive(Clone)]
pub struct PinataStore {
    client: Client,
    endpoint: String,
    jwt: Option<String>,
    gateway_host: String,
}

impl PinataStore {
    /// Creates a store for a Pinata account.
    ///
    /// # Arguments
    /// * `endpoint` - API base URL, e.g. `https://api.pinata.cloud`
    /// * `jwt` - API token; uploads fail without one, downloads do not need it
    /// * `gateway_host` - Gateway host (or base URL) used for downloads
    pub fn new(endpoint: impl Into<String>, jwt: Option<String>, gateway_host: impl Into<String>) -> Self {
        PinataStore {
            client: Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            jwt,
            gateway_host: gateway_host.into(),
        }
    }

    fn pin_url(&self) -> String {
        format!("{}/pinning/pinFileToIPFS", self.endpoint)
    }

    fn gateway_url(&self, content_id: &str) -> String {
        gateway_url(&self.gateway_host, content_id)
    }
}

#[async_trait]
impl ContentStore for PinataStore {
    async fn upload(&self, blob: Vec<u8>, filename: &str, mime: &str) -> Result<String, StorageError> {
        let jwt = self
            .jwt
            .as_deref()
            .ok_or_else(|| StorageError::UploadFailure("no Pinata JWT configured".into()))?;

        let part = Part::bytes(blob)
            .file_name(filename.to_string())
            .mime_str(mime)
            .map_err(|e| StorageError::UploadFailure(e.to_string()))?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(self.pin_url())
            .bearer_auth(jwt)
            .multipart(form)
            .send()
            .await
            .map_err(|e| StorageError::UploadFailure(format!("pinning request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::UploadFailure(format!("pinning service returned {}: {}", status, body)));
        }

        let pinned = response
            .json::<PinResponse>()
            .await
            .map_err(|e| StorageError::UploadFailure(format!("unreadable pinning response: {}", e)))?;
        log::debug!("pinned {} ({} bytes) as {}", filename, pinned.pin_size, pinned.ipfs_hash);
        Ok(pinned.ipfs_hash)
    }

    async fn download(&self, content_id: &str) -> Result<Vec<u8>, StorageError> {
        let fetch_failure = |reason: String| StorageError::FetchFailure {
            content_id: content_id.to_string(),
            reason,
        };

        let response = self
            .client
            .get(self.gateway_url(content_id))
            .send()
            .await
            .map_err(|e| fetch_failure(e.to_string()))?;
        if !response.status().is_success() {
            return Err(fetch_failure(format!("gateway returned {}", response.status())));
        }

        let body = response.bytes().await.map_err(|e| fetch_failure(e.to_string()))?;
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{mock, Matcher};

    const JWT: &str = "test-jwt";

    /// Store whose API and gateway live under `prefix` on the mock server,
    /// so tests running in parallel never share a route.
    fn mock_store(prefix: &str) -> PinataStore {
        let base = format!("{}/{}", mockito::server_url(), prefix);
        PinataStore::new(base.clone(), Some(JWT.to_string()), format!("{}/gw", base))
    }

    #[test]
    fn test_urls() {
        let store = PinataStore::new("https://api.pinata.cloud/", None, "gateway.pinata.cloud");
        assert_eq!(store.pin_url(), "https://api.pinata.cloud/pinning/pinFileToIPFS");
        assert_eq!(
            store.gateway_url("QmAbc"),
            "https://gateway.pinata.cloud/ipfs/QmAbc"
        );
    }

    #[tokio::test]
    async fn test_upload_sends_file_part_with_bearer_token() {
        let pin = mock("POST", "/upload-ok/pinning/pinFileToIPFS")
            .match_header("authorization", format!("Bearer {}", JWT).as_str())
            .match_header("content-type", Matcher::Regex("^multipart/form-data".into()))
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#"name="file"; filename="did-bundle.json""#.into()),
                Matcher::Regex("(?i)content-type: application/json".into()),
                Matcher::Regex(r#"\{"did":"did:xrpl:r1"\}"#.into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"IpfsHash":"QmPinned","PinSize":18,"Timestamp":"2024-01-01T00:00:00Z"}"#)
            .create();

        let store = mock_store("upload-ok");
        let content_id = store
            .upload(br#"{"did":"did:xrpl:r1"}"#.to_vec(), "did-bundle.json", "application/json")
            .await
            .unwrap();

        assert_eq!(content_id, "QmPinned");
        pin.assert();
    }

    #[tokio::test]
    async fn test_upload_error_status_is_upload_failure() {
        let _pin = mock("POST", "/upload-denied/pinning/pinFileToIPFS")
            .with_status(401)
            .with_body(r#"{"error":"invalid token"}"#)
            .create();

        let result = mock_store("upload-denied")
            .upload(b"{}".to_vec(), "did-bundle.json", "application/json")
            .await;
        match result {
            Err(StorageError::UploadFailure(reason)) => assert!(reason.contains("401")),
            other => panic!("expected upload failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreadable_pin_response_is_upload_failure() {
        let _pin = mock("POST", "/upload-garbled/pinning/pinFileToIPFS")
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create();

        let result = mock_store("upload-garbled")
            .upload(b"{}".to_vec(), "did-bundle.json", "application/json")
            .await;
        assert!(matches!(result, Err(StorageError::UploadFailure(_))));
    }

    #[tokio::test]
    async fn test_upload_without_jwt_fails_locally() {
        let store = PinataStore::new("https://api.pinata.cloud", None, "gateway.pinata.cloud");
        let result = store.upload(b"{}".to_vec(), "did-bundle.json", "application/json").await;
        assert!(matches!(result, Err(StorageError::UploadFailure(_))));
    }

    #[tokio::test]
    async fn test_download_reads_gateway_body() {
        let gateway = mock("GET", "/download-ok/gw/ipfs/QmStored")
            .with_status(200)
            .with_body(r#"{"did":"did:xrpl:r1"}"#)
            .create();

        let body = mock_store("download-ok").download("QmStored").await.unwrap();

        assert_eq!(body, br#"{"did":"did:xrpl:r1"}"#.to_vec());
        gateway.assert();
    }

    #[tokio::test]
    async fn test_gateway_miss_is_fetch_failure() {
        let _gateway = mock("GET", "/download-miss/gw/ipfs/QmGone")
            .with_status(404)
            .create();

        match mock_store("download-miss").download("QmGone").await {
            Err(StorageError::FetchFailure { content_id, reason }) => {
                assert_eq!(content_id, "QmGone");
                assert!(reason.contains("404"));
            }
            other => panic!("expected fetch failure, got {:?}", other),
        }
    }
}

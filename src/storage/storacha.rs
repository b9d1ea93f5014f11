//! Reqwest implementation of the storage backend.
//!
//! Speaks a thin bearer-token HTTP surface against the configured storage
//! service: account lookup, space listing/creation, and a single-shot
//! artifact upload that returns the content identifier.

use crate::storage::{Principal, Space, StorageBackend};
use crate::utils::errors::BackupError;
use crate::Result;
use async_trait::async_trait;
use reqwest::{header, Response, StatusCode, Url};
use serde::Deserialize;
use tracing::debug;

pub struct StorachaClient {
    service_url: String,
    token: String,
}

/// Established session: parsed base URL plus the HTTP client.
pub struct StorachaHandle {
    http: reqwest::Client,
    base: Url,
}

#[derive(Deserialize)]
struct StoreResponse {
    cid: String,
}

impl StorachaClient {
    pub fn new(service_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            service_url: service_url.into(),
            token: token.into(),
        }
    }

    fn endpoint(&self, handle: &StorachaHandle, path: &str) -> Result<Url> {
        handle
            .base
            .join(path)
            .map_err(|e| BackupError::Config(format!("invalid service URL: {e}")))
    }
}

/// Surface non-success responses with their status and body text.
async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Err(BackupError::Authentication(format!("{status} - {body}")))
    } else {
        Err(BackupError::Storage(format!("{status} - {body}")))
    }
}

#[async_trait]
impl StorageBackend for StorachaClient {
    type Handle = StorachaHandle;

    async fn connect(&self) -> Result<StorachaHandle> {
        let base = Url::parse(&self.service_url)
            .map_err(|e| BackupError::Config(format!("invalid service URL: {e}")))?;
        let http = reqwest::Client::builder().build()?;
        debug!(url = %base, "storage client created");
        Ok(StorachaHandle { http, base })
    }

    async fn authenticate(&self, handle: &StorachaHandle) -> Result<Principal> {
        if self.token.is_empty() {
            return Err(BackupError::Authentication(
                "no storage token configured, run login first".to_string(),
            ));
        }
        let url = self.endpoint(handle, "account")?;
        let resp = handle
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        let principal = check(resp).await?.json::<Principal>().await?;
        Ok(principal)
    }

    async fn list_spaces(&self, handle: &StorachaHandle) -> Result<Vec<Space>> {
        let url = self.endpoint(handle, "spaces")?;
        let resp = handle
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        let spaces = check(resp).await?.json::<Vec<Space>>().await?;
        Ok(spaces)
    }

    async fn create_space(
        &self,
        handle: &StorachaHandle,
        name: &str,
        owner: &Principal,
    ) -> Result<Space> {
        let url = self.endpoint(handle, "spaces")?;
        let body = serde_json::json!({ "name": name, "owner": owner.did });
        let resp = handle
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        let space = check(resp).await?.json::<Space>().await?;
        Ok(space)
    }

    async fn store(
        &self,
        handle: &StorachaHandle,
        space: &Space,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String> {
        let url = self.endpoint(handle, "upload")?;
        let resp = handle
            .http
            .post(url)
            .bearer_auth(&self.token)
            .header(header::CONTENT_TYPE, content_type)
            .header("x-space-did", &space.did)
            .body(bytes)
            .send()
            .await?;
        let stored = check(resp).await?.json::<StoreResponse>().await?;
        Ok(stored.cid)
    }
}

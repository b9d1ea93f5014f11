//! XRPC client for the AT Protocol PDS.

use crate::pds::SnapshotSource;
use crate::utils::errors::BackupError;
use crate::Result;
use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

pub const DEFAULT_SERVICE_URL: &str = "https://bsky.social";
pub const POST_COLLECTION: &str = "app.bsky.feed.post";

/// Authenticated session returned by `com.atproto.server.createSession`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub did: String,
    pub handle: String,
    pub access_jwt: String,
    pub refresh_jwt: String,
}

/// One record from `com.atproto.repo.listRecords`. The record value keeps
/// its duck-typed shape (`text`, `createdAt`, optional embeds) as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub uri: String,
    pub cid: String,
    pub value: Value,
}

#[derive(Deserialize)]
struct ListRecordsResponse {
    records: Vec<RawRecord>,
}

pub struct PdsClient {
    http: reqwest::Client,
    service_url: String,
    access_token: Option<String>,
}

impl PdsClient {
    pub fn new(service_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            service_url: service_url.into(),
            access_token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    fn xrpc(&self, method: &str) -> String {
        format!("{}/xrpc/{}", self.service_url.trim_end_matches('/'), method)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.access_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Log in with handle (or email) and password.
    pub async fn create_session(&self, identifier: &str, password: &str) -> Result<Session> {
        let body = serde_json::json!({ "identifier": identifier, "password": password });
        let resp = self
            .http
            .post(self.xrpc("com.atproto.server.createSession"))
            .json(&body)
            .send()
            .await?;
        let session = check(resp).await?.json::<Session>().await?;
        debug!(did = %session.did, handle = %session.handle, "session created");
        Ok(session)
    }

    /// Full repository export (`com.atproto.sync.getRepo`) as CAR bytes.
    pub async fn get_repo(&self, did: &str) -> Result<Vec<u8>> {
        let resp = self
            .authed(self.http.get(self.xrpc("com.atproto.sync.getRepo")))
            .query(&[("did", did)])
            .send()
            .await?;
        let bytes = check(resp).await?.bytes().await?;
        Ok(bytes.to_vec())
    }

    /// List records in a collection (`com.atproto.repo.listRecords`).
    pub async fn list_collection(
        &self,
        repo: &str,
        collection: &str,
        limit: u32,
    ) -> Result<Vec<RawRecord>> {
        let resp = self
            .authed(self.http.get(self.xrpc("com.atproto.repo.listRecords")))
            .query(&[
                ("repo", repo),
                ("collection", collection),
                ("limit", &limit.to_string()),
            ])
            .send()
            .await?;
        let listing = check(resp).await?.json::<ListRecordsResponse>().await?;
        Ok(listing.records)
    }
}

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
        Err(BackupError::Pds(format!("{status} - {body}")))
    }
}

#[async_trait]
impl SnapshotSource for PdsClient {
    async fn fetch_archive(&self, did: &str) -> Result<Vec<u8>> {
        self.get_repo(did).await
    }

    async fn list_records(&self, did: &str, limit: u32) -> Result<Vec<RawRecord>> {
        self.list_collection(did, POST_COLLECTION, limit).await
    }
}

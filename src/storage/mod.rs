//! Content-addressed storage backend boundary.
//!
//! The pipeline is a client of a narrow "store this artifact, return a
//! content identifier" capability. The backend trait mirrors the steps the
//! upload orchestrator drives; see [`uploader`] for the state machine.

pub mod storacha;
pub mod uploader;

pub use storacha::StorachaClient;
pub use uploader::{upload_artifact, UploadResult};

use crate::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;

/// Public gateway used to derive a browsable reference from a CID.
pub const GATEWAY_PREFIX: &str = "https://w3s.link/ipfs/";

/// The strictly sequential steps of an upload. A failure at any step aborts
/// the remaining ones and is reported with the step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStep {
    Connect,
    Authenticate,
    SelectSpace,
    ReadArtifact,
    Store,
    DeriveUrl,
}

impl fmt::Display for UploadStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UploadStep::Connect => "connection",
            UploadStep::Authenticate => "authentication",
            UploadStep::SelectSpace => "space selection",
            UploadStep::ReadArtifact => "artifact read",
            UploadStep::Store => "store",
            UploadStep::DeriveUrl => "gateway reference",
        };
        f.write_str(name)
    }
}

/// An authenticated principal on the storage service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Principal {
    pub did: String,
}

/// A logical storage namespace ("space") uploads are scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Space {
    pub did: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl Space {
    /// Display label: the name if set, otherwise a shortened DID.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => {
                if self.did.chars().count() > 16 {
                    let prefix: String = self.did.chars().take(16).collect();
                    format!("{prefix}...")
                } else {
                    self.did.clone()
                }
            }
        }
    }
}

/// Storage service capability consumed by the upload orchestrator.
///
/// "No spaces yet" is a normal condition, not an error: `list_spaces`
/// returns an empty vec and the orchestrator creates one.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    type Handle: Send + Sync;

    /// Establish a client session with the storage service.
    async fn connect(&self) -> Result<Self::Handle>;

    /// Resolve the authenticated account.
    async fn authenticate(&self, handle: &Self::Handle) -> Result<Principal>;

    async fn list_spaces(&self, handle: &Self::Handle) -> Result<Vec<Space>>;

    async fn create_space(
        &self,
        handle: &Self::Handle,
        name: &str,
        owner: &Principal,
    ) -> Result<Space>;

    /// Store the bytes under the given space, tagged with a MIME type.
    /// Returns the content identifier of the stored artifact.
    async fn store(
        &self,
        handle: &Self::Handle,
        space: &Space,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String>;
}

//! Upload orchestrator: drives the multi-step publish of a local artifact.
//!
//! Strictly sequential state machine. Each step's failure aborts the
//! remaining steps and is tagged with the step name; no step ever writes,
//! moves, or deletes the local artifact, so a failed upload always leaves
//! the backup intact and re-uploadable.

use crate::backup::writer::BackupFormat;
use crate::prompt::{Prompter, SpaceChoice};
use crate::storage::{Principal, Space, StorageBackend, UploadStep, GATEWAY_PREFIX};
use crate::utils::errors::BackupError;
use crate::Result;
use std::path::Path;
use tracing::{debug, info, warn};

/// Outcome of a successful upload. Not persisted; exists for display only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub cid: String,
    pub gateway_url: String,
}

/// Upload a local artifact to the storage service.
///
/// Steps: connect, authenticate, select-or-create a space, read the
/// artifact, store the bytes (tagged with the format's MIME type), derive
/// the gateway reference. Retry is the caller's concern; nothing here is
/// retried automatically.
///
/// `default_space` (a space DID or name from the config file) resolves the
/// space without prompting when it matches one of the account's spaces.
pub async fn upload_artifact<B: StorageBackend>(
    backend: &B,
    prompter: &dyn Prompter,
    path: &Path,
    format: BackupFormat,
    default_space: Option<&str>,
) -> Result<UploadResult> {
    let handle = backend
        .connect()
        .await
        .map_err(|e| e.at_step(UploadStep::Connect))?;
    debug!("storage connection established");

    let account = backend
        .authenticate(&handle)
        .await
        .map_err(|e| e.at_step(UploadStep::Authenticate))?;
    debug!(did = %account.did, "authenticated with storage service");

    let space = select_space(backend, &handle, prompter, &account, default_space)
        .await
        .map_err(|e| e.at_step(UploadStep::SelectSpace))?;
    info!(space = %space.label(), "storage space ready");

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| BackupError::from(e).at_step(UploadStep::ReadArtifact))?;

    info!(path = %path.display(), size = bytes.len(), "uploading backup");
    let cid = backend
        .store(&handle, &space, bytes, format.content_type())
        .await
        .map_err(|e| e.at_step(UploadStep::Store))?;

    let gateway_url = format!("{GATEWAY_PREFIX}{cid}");
    info!(%cid, %gateway_url, "backup uploaded");

    Ok(UploadResult { cid, gateway_url })
}

/// Choose an existing space or create one. A configured default that
/// matches a known space (by DID or name) wins without prompting; an empty
/// space list is a normal condition requiring creation, not an error.
async fn select_space<B: StorageBackend>(
    backend: &B,
    handle: &B::Handle,
    prompter: &dyn Prompter,
    owner: &Principal,
    default: Option<&str>,
) -> Result<Space> {
    let spaces = backend.list_spaces(handle).await?;

    if let Some(wanted) = default {
        match spaces
            .iter()
            .find(|s| s.did == wanted || s.name.as_deref() == Some(wanted))
        {
            Some(space) => return Ok(space.clone()),
            None => warn!("configured space {wanted:?} not found, asking instead"),
        }
    }

    if spaces.is_empty() {
        info!("no storage spaces found, creating one");
        let name = prompter.space_name()?;
        return backend.create_space(handle, &name, owner).await;
    }

    match prompter.choose_space(&spaces)? {
        SpaceChoice::Existing(idx) => Ok(spaces[idx].clone()),
        SpaceChoice::New => {
            let name = prompter.space_name()?;
            backend.create_space(handle, &name, owner).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::select::BackupEntry;
    use crate::utils::errors::BackupError;
    use async_trait::async_trait;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Backend that fails at a chosen step and records the stored payload.
    struct FakeBackend {
        fail_at: Option<UploadStep>,
        spaces: Vec<Space>,
    }

    impl FakeBackend {
        fn new(fail_at: Option<UploadStep>) -> Self {
            Self {
                fail_at,
                spaces: vec![Space {
                    did: "did:key:space-1".to_string(),
                    name: Some("backups".to_string()),
                }],
            }
        }

        fn fails_at(&self, step: UploadStep) -> Result<()> {
            if self.fail_at == Some(step) {
                return Err(BackupError::Config(format!("injected failure at {step}")));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl StorageBackend for FakeBackend {
        type Handle = ();

        async fn connect(&self) -> Result<()> {
            self.fails_at(UploadStep::Connect)
        }

        async fn authenticate(&self, _handle: &()) -> Result<Principal> {
            self.fails_at(UploadStep::Authenticate)?;
            Ok(Principal {
                did: "did:mailto:example.com:user".to_string(),
            })
        }

        async fn list_spaces(&self, _handle: &()) -> Result<Vec<Space>> {
            self.fails_at(UploadStep::SelectSpace)?;
            Ok(self.spaces.clone())
        }

        async fn create_space(&self, _handle: &(), name: &str, _owner: &Principal) -> Result<Space> {
            Ok(Space {
                did: "did:key:new-space".to_string(),
                name: Some(name.to_string()),
            })
        }

        async fn store(
            &self,
            _handle: &(),
            _space: &Space,
            _bytes: Vec<u8>,
            _content_type: &str,
        ) -> Result<String> {
            self.fails_at(UploadStep::Store)?;
            Ok("bafytestcid".to_string())
        }
    }

    /// Prompter with canned answers.
    struct FakePrompter {
        space_choice: SpaceChoice,
    }

    impl Prompter for FakePrompter {
        fn choose_format(&self, default: BackupFormat) -> Result<BackupFormat> {
            Ok(default)
        }

        fn confirm_upload(&self) -> Result<bool> {
            Ok(true)
        }

        fn choose_space(&self, _spaces: &[Space]) -> Result<SpaceChoice> {
            Ok(self.space_choice.clone())
        }

        fn space_name(&self) -> Result<String> {
            Ok("fresh-space".to_string())
        }

        fn choose_backup(&self, _entries: &[BackupEntry]) -> Result<Option<usize>> {
            Ok(Some(0))
        }
    }

    fn artifact_with(content: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn test_successful_upload() {
        let backend = FakeBackend::new(None);
        let prompter = FakePrompter {
            space_choice: SpaceChoice::Existing(0),
        };
        let artifact = artifact_with(b"{\"postCount\": 0}");

        let result = upload_artifact(&backend, &prompter, artifact.path(), BackupFormat::Json, None)
            .await
            .unwrap();
        assert_eq!(result.cid, "bafytestcid");
        assert_eq!(result.gateway_url, "https://w3s.link/ipfs/bafytestcid");
    }

    #[tokio::test]
    async fn test_failure_at_each_step_leaves_artifact_intact() {
        let content = b"precious backup bytes";
        for step in [
            UploadStep::Connect,
            UploadStep::Authenticate,
            UploadStep::SelectSpace,
            UploadStep::Store,
        ] {
            let backend = FakeBackend::new(Some(step));
            let prompter = FakePrompter {
                space_choice: SpaceChoice::Existing(0),
            };
            let artifact = artifact_with(content);

            let err = upload_artifact(&backend, &prompter, artifact.path(), BackupFormat::Car, None)
                .await
                .unwrap_err();
            match err {
                BackupError::Upload { step: failed, .. } => assert_eq!(failed, step),
                other => panic!("expected upload error, got {other}"),
            }
            assert_eq!(std::fs::read(artifact.path()).unwrap(), content);
        }
    }

    #[tokio::test]
    async fn test_missing_artifact_fails_at_read_step() {
        let backend = FakeBackend::new(None);
        let prompter = FakePrompter {
            space_choice: SpaceChoice::Existing(0),
        };

        let err = upload_artifact(
            &backend,
            &prompter,
            Path::new("/nonexistent/backup.json"),
            BackupFormat::Json,
            None,
        )
        .await
        .unwrap_err();
        match err {
            BackupError::Upload { step, .. } => assert_eq!(step, UploadStep::ReadArtifact),
            other => panic!("expected upload error, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_no_spaces_creates_one() {
        let mut backend = FakeBackend::new(None);
        backend.spaces.clear();
        let prompter = FakePrompter {
            space_choice: SpaceChoice::Existing(0),
        };
        let artifact = artifact_with(b"bytes");

        let result = upload_artifact(&backend, &prompter, artifact.path(), BackupFormat::Json, None)
            .await
            .unwrap();
        assert_eq!(result.cid, "bafytestcid");
    }

    #[tokio::test]
    async fn test_new_space_choice_creates_one() {
        let backend = FakeBackend::new(None);
        let prompter = FakePrompter {
            space_choice: SpaceChoice::New,
        };
        let artifact = artifact_with(b"bytes");

        assert!(
            upload_artifact(&backend, &prompter, artifact.path(), BackupFormat::Json, None)
                .await
                .is_ok()
        );
    }

    /// Prompter that fails the test if any space question is asked.
    struct NoSpacePrompter;

    impl Prompter for NoSpacePrompter {
        fn choose_format(&self, default: BackupFormat) -> Result<BackupFormat> {
            Ok(default)
        }

        fn confirm_upload(&self) -> Result<bool> {
            Ok(true)
        }

        fn choose_space(&self, _spaces: &[Space]) -> Result<SpaceChoice> {
            panic!("configured space must resolve without prompting");
        }

        fn space_name(&self) -> Result<String> {
            panic!("configured space must resolve without prompting");
        }

        fn choose_backup(&self, _entries: &[BackupEntry]) -> Result<Option<usize>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_configured_space_skips_prompt() {
        let backend = FakeBackend::new(None);
        let artifact = artifact_with(b"bytes");

        // By DID.
        let result = upload_artifact(
            &backend,
            &NoSpacePrompter,
            artifact.path(),
            BackupFormat::Json,
            Some("did:key:space-1"),
        )
        .await
        .unwrap();
        assert_eq!(result.cid, "bafytestcid");

        // By name.
        let result = upload_artifact(
            &backend,
            &NoSpacePrompter,
            artifact.path(),
            BackupFormat::Json,
            Some("backups"),
        )
        .await
        .unwrap();
        assert_eq!(result.cid, "bafytestcid");
    }

    #[tokio::test]
    async fn test_unknown_configured_space_falls_back_to_prompt() {
        let backend = FakeBackend::new(None);
        let prompter = FakePrompter {
            space_choice: SpaceChoice::Existing(0),
        };
        let artifact = artifact_with(b"bytes");

        let result = upload_artifact(
            &backend,
            &prompter,
            artifact.path(),
            BackupFormat::Json,
            Some("no-such-space"),
        )
        .await
        .unwrap();
        assert_eq!(result.cid, "bafytestcid");
    }

    #[tokio::test]
    async fn test_prompt_cancel_is_not_an_upload_failure() {
        struct CancellingPrompter;
        impl Prompter for CancellingPrompter {
            fn choose_format(&self, default: BackupFormat) -> Result<BackupFormat> {
                Ok(default)
            }
            fn confirm_upload(&self) -> Result<bool> {
                Ok(true)
            }
            fn choose_space(&self, _spaces: &[Space]) -> Result<SpaceChoice> {
                Err(BackupError::Aborted)
            }
            fn space_name(&self) -> Result<String> {
                Err(BackupError::Aborted)
            }
            fn choose_backup(&self, _entries: &[BackupEntry]) -> Result<Option<usize>> {
                Ok(None)
            }
        }

        let backend = FakeBackend::new(None);
        let artifact = artifact_with(b"bytes");

        let err = upload_artifact(&backend, &CancellingPrompter, artifact.path(), BackupFormat::Json, None)
            .await
            .unwrap_err();
        assert!(matches!(err, BackupError::Aborted));
    }
}

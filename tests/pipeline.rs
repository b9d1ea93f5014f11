//! End-to-end pipeline test: a repository snapshot with a mix of decodable
//! and undecodable blocks flows through decode, local write, and a
//! simulated upload with an injected store failure.

use async_trait::async_trait;
use bsky_backup::backup::{BackupEntry, BackupFormat, BackupPipeline, BackupWriter, RecordSource};
use bsky_backup::car::{decode_car, write_block, write_header, CarHeader, RecordData};
use bsky_backup::pds::{RawRecord, SnapshotSource};
use bsky_backup::prompt::{Prompter, SpaceChoice};
use bsky_backup::storage::{upload_artifact, Principal, Space, StorageBackend, UploadStep};
use bsky_backup::{BackupError, Result};
use cid::Cid;
use multihash_codetable::{Code, MultihashDigest};
use serde_json::{json, Value};
use tempfile::tempdir;

const DAG_CBOR: u64 = 0x71;
const RAW: u64 = 0x55;

/// Not valid CBOR: 0xff is a break code, never a valid initial byte.
const RAW_PAYLOAD: [u8; 5] = [0xff, 0x13, 0x37, 0x00, 0xff];

fn snapshot_car() -> Vec<u8> {
    let mut blocks = Vec::new();
    for text in ["a", "b"] {
        let data = serde_ipld_dagcbor::to_vec(&json!({ "text": text })).unwrap();
        let cid = Cid::new_v1(DAG_CBOR, Code::Sha2_256.digest(&data));
        blocks.push((cid, data));
    }
    blocks.push((
        Cid::new_v1(RAW, Code::Sha2_256.digest(&RAW_PAYLOAD)),
        RAW_PAYLOAD.to_vec(),
    ));

    let mut buf = Vec::new();
    write_header(&mut buf, &CarHeader::new(vec![blocks[0].0])).unwrap();
    for (cid, data) in &blocks {
        write_block(&mut buf, cid, data).unwrap();
    }
    buf
}

struct FixtureSource {
    car: Vec<u8>,
}

#[async_trait]
impl SnapshotSource for FixtureSource {
    async fn fetch_archive(&self, _did: &str) -> Result<Vec<u8>> {
        Ok(self.car.clone())
    }

    async fn list_records(&self, _did: &str, _limit: u32) -> Result<Vec<RawRecord>> {
        unimplemented!("this scenario goes through the repository snapshot")
    }
}

struct StoreFailingBackend;

#[async_trait]
impl StorageBackend for StoreFailingBackend {
    type Handle = ();

    async fn connect(&self) -> Result<()> {
        Ok(())
    }

    async fn authenticate(&self, _handle: &()) -> Result<Principal> {
        Ok(Principal {
            did: "did:mailto:example.com:user".to_string(),
        })
    }

    async fn list_spaces(&self, _handle: &()) -> Result<Vec<Space>> {
        Ok(vec![Space {
            did: "did:key:space".to_string(),
            name: Some("backups".to_string()),
        }])
    }

    async fn create_space(&self, _handle: &(), _name: &str, _owner: &Principal) -> Result<Space> {
        unimplemented!()
    }

    async fn store(&self, _handle: &(), _space: &Space, _bytes: Vec<u8>, _ct: &str) -> Result<String> {
        Err(BackupError::Storage("simulated outage".to_string()))
    }
}

struct ScriptedPrompter {
    format: BackupFormat,
    upload: bool,
}

impl Prompter for ScriptedPrompter {
    fn choose_format(&self, _default: BackupFormat) -> Result<BackupFormat> {
        Ok(self.format)
    }

    fn confirm_upload(&self) -> Result<bool> {
        Ok(self.upload)
    }

    fn choose_space(&self, _spaces: &[Space]) -> Result<SpaceChoice> {
        Ok(SpaceChoice::Existing(0))
    }

    fn space_name(&self) -> Result<String> {
        Ok("backups".to_string())
    }

    fn choose_backup(&self, entries: &[BackupEntry]) -> Result<Option<usize>> {
        Ok(if entries.is_empty() { None } else { Some(0) })
    }
}

#[test]
fn decode_covers_every_block_and_preserves_raw_bytes() {
    let records = decode_car(&snapshot_car()).unwrap();

    assert_eq!(records.len(), 3);
    assert_eq!(records[0].data, RecordData::Structured(json!({"text": "a"})));
    assert_eq!(records[1].data, RecordData::Structured(json!({"text": "b"})));
    assert_eq!(
        records[2].data,
        RecordData::Raw {
            bytes: RAW_PAYLOAD.to_vec()
        }
    );
}

#[tokio::test]
async fn snapshot_to_document_to_failed_store_leaves_artifact_intact() {
    let dir = tempdir().unwrap();
    let source = FixtureSource { car: snapshot_car() };
    let backend = StoreFailingBackend;
    let prompter = ScriptedPrompter {
        format: BackupFormat::Json,
        upload: false,
    };
    let pipeline = BackupPipeline::new(
        &source,
        &backend,
        &prompter,
        BackupWriter::new(dir.path()),
    );

    // Write the structured document from the decoded snapshot.
    let artifact = pipeline
        .backup_posts("did:plc:example", RecordSource::Repo)
        .await
        .unwrap();
    assert_eq!(artifact.format, BackupFormat::Json);

    let envelope: Value =
        serde_json::from_slice(&std::fs::read(&artifact.path).unwrap()).unwrap();
    assert_eq!(envelope["postCount"], 3);
    assert_eq!(envelope["posts"][2]["data"]["bytes"], json!([255, 19, 55, 0, 255]));

    // Upload with a failing store step: the error names the step and the
    // artifact bytes are untouched.
    let before = std::fs::read(&artifact.path).unwrap();
    let err = upload_artifact(&backend, &prompter, &artifact.path, artifact.format, None)
        .await
        .unwrap_err();
    match &err {
        BackupError::Upload { step, .. } => assert_eq!(*step, UploadStep::Store),
        other => panic!("expected upload error, got {other}"),
    }
    assert!(err.to_string().contains("store"));
    assert_eq!(std::fs::read(&artifact.path).unwrap(), before);
}

#[tokio::test]
async fn car_backup_roundtrips_archive_bytes() {
    let dir = tempdir().unwrap();
    let car = snapshot_car();
    let source = FixtureSource { car: car.clone() };
    let backend = StoreFailingBackend;
    let prompter = ScriptedPrompter {
        format: BackupFormat::Car,
        upload: false,
    };
    let pipeline = BackupPipeline::new(
        &source,
        &backend,
        &prompter,
        BackupWriter::new(dir.path()),
    );

    let artifact = pipeline
        .backup_posts("did:plc:example", RecordSource::Repo)
        .await
        .unwrap();
    assert_eq!(artifact.format, BackupFormat::Car);
    assert_eq!(std::fs::read(&artifact.path).unwrap(), car);

    // The written archive decodes back to the same records.
    let records = decode_car(&std::fs::read(&artifact.path).unwrap()).unwrap();
    assert_eq!(records.len(), 3);
}

#[tokio::test]
async fn upload_existing_picks_newest_artifact() {
    let dir = tempdir().unwrap();
    let writer = BackupWriter::new(dir.path());
    std::fs::write(
        dir.path().join("bluesky-posts-2020-01-01T00-00-00Z.car"),
        b"older",
    )
    .unwrap();
    let newest = writer.write_archive(b"newer").unwrap();

    let entries = bsky_backup::backup::list_backups(dir.path()).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].path, newest.path);

    // A failed upload of the selection leaves it untouched.
    let source = FixtureSource { car: Vec::new() };
    let backend = StoreFailingBackend;
    let prompter = ScriptedPrompter {
        format: BackupFormat::Car,
        upload: true,
    };
    let pipeline = BackupPipeline::new(&source, &backend, &prompter, writer);
    pipeline.upload_existing().await.unwrap();
    assert_eq!(std::fs::read(&newest.path).unwrap(), b"newer");
}

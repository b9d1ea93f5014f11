//! CAR (Content Addressable aRchive) v1 container handling.
//!
//! A CAR file is a varint-length-prefixed sequence of frames: a dag-cbor
//! header (`{roots, version}`) followed by blocks, each frame holding a CID
//! and the block payload bytes. See
//! <https://ipld.io/specs/transport/car/carv1/>.

pub mod decode;

pub use decode::{decode_car, DecodedRecord, RecordData};

use crate::Result;
use crate::utils::errors::BackupError;
use cid::Cid;
use integer_encoding::{VarInt, VarIntReader};
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Read, Write};

/// CAR v1 header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarHeader {
    pub roots: Vec<Cid>,
    pub version: u64,
}

impl CarHeader {
    pub fn new(roots: Vec<Cid>) -> Self {
        Self { roots, version: 1 }
    }
}

/// One content-addressed block: a CID and its payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub cid: Cid,
    pub data: Vec<u8>,
}

impl Block {
    /// Split a varint frame into CID and payload.
    fn from_frame(frame: Vec<u8>) -> Result<Self> {
        let mut cursor = Cursor::new(frame);
        let cid = Cid::read_bytes(&mut cursor)
            .map_err(|e| BackupError::InvalidArchive(format!("unreadable block CID: {e}")))?;
        let pos = cursor.position() as usize;
        let frame = cursor.into_inner();
        Ok(Block {
            cid,
            data: frame[pos..].to_vec(),
        })
    }
}

/// Reads the blocks of a CAR v1 container in container-native order.
#[derive(Debug)]
pub struct CarReader<R> {
    reader: R,
    pub header: CarHeader,
}

impl<R: Read> CarReader<R> {
    /// Parse the container header. Fails if the header frame is missing,
    /// not valid dag-cbor, or not CAR version 1; this is the only wholesale
    /// failure mode of the container walk.
    pub fn new(mut reader: R) -> Result<Self> {
        let buf = ld_read(&mut reader)?
            .ok_or_else(|| BackupError::InvalidArchive("missing header frame".to_string()))?;
        let header: CarHeader = serde_ipld_dagcbor::from_slice(&buf)
            .map_err(|e| BackupError::InvalidArchive(format!("malformed header: {e}")))?;
        if header.version != 1 {
            return Err(BackupError::InvalidArchive(format!(
                "unsupported CAR version {}",
                header.version
            )));
        }
        Ok(CarReader { reader, header })
    }

    /// Next block in the container, or `None` at the end of the stream.
    pub fn next_block(&mut self) -> Result<Option<Block>> {
        match ld_read(&mut self.reader)? {
            Some(frame) => Block::from_frame(frame).map(Some),
            None => Ok(None),
        }
    }
}

/// Read one varint-length-prefixed frame. `None` on clean end of stream.
///
/// The first prefix byte is read separately so that a stream ending before
/// any prefix byte reads as a clean end, while a stream ending inside a
/// multi-byte prefix reads as truncation.
fn ld_read<R: Read>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut first = [0u8; 1];
    if let Err(e) = reader.read_exact(&mut first) {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            return Ok(None);
        }
        return Err(e.into());
    }
    let len: u64 = match first.as_slice().chain(&mut *reader).read_varint() {
        Ok(len) => len,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(BackupError::InvalidArchive(
                "truncated length prefix".to_string(),
            ))
        }
        Err(e) => return Err(e.into()),
    };
    if len == 0 {
        return Err(BackupError::InvalidArchive(
            "zero-length frame".to_string(),
        ));
    }
    let mut buf = vec![0u8; len as usize];
    reader
        .read_exact(&mut buf)
        .map_err(|e| BackupError::InvalidArchive(format!("truncated frame: {e}")))?;
    Ok(Some(buf))
}

/// Write a CAR v1 header frame.
pub fn write_header<W: Write>(writer: &mut W, header: &CarHeader) -> Result<()> {
    let bytes = serde_ipld_dagcbor::to_vec(header)
        .map_err(|e| BackupError::InvalidArchive(format!("header encode: {e}")))?;
    writer.write_all(&bytes.len().encode_var_vec())?;
    writer.write_all(&bytes)?;
    Ok(())
}

/// Write one block as a varint frame containing the CID and the payload.
pub fn write_block<W: Write>(writer: &mut W, cid: &Cid, data: &[u8]) -> Result<()> {
    let frame_len = cid.encoded_len() + data.len();
    writer.write_all(&frame_len.encode_var_vec())?;
    cid.write_bytes(&mut *writer)
        .map_err(|e| BackupError::InvalidArchive(format!("CID encode: {e}")))?;
    writer.write_all(data)?;
    Ok(())
}

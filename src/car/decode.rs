//! Best-effort structured decoding of CAR blocks.
//!
//! Every block yields exactly one record: payloads that parse as dag-cbor
//! become structured documents, anything else is kept verbatim as raw bytes.
//! A single undecodable block never aborts the walk.

use crate::car::CarReader;
use crate::Result;
use ipld_core::ipld::Ipld;
use serde::Serialize;
use serde_json::{json, Value};
use std::io::Cursor;
use tracing::warn;

/// One decoded block: the stringified content address plus its payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedRecord {
    pub cid: String,
    pub data: RecordData,
}

/// Payload representation, resolved once at decode time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RecordData {
    /// The payload parsed under the structured codec.
    Structured(Value),
    /// Fallback for payloads that are not valid dag-cbor.
    Raw { bytes: Vec<u8> },
}

/// Decode a CAR buffer into one record per block, in container order.
///
/// Fails only if the container itself cannot be opened or a frame is
/// malformed; per-block payload decode failures degrade to [`RecordData::Raw`]
/// and the walk continues.
pub fn decode_car(bytes: &[u8]) -> Result<Vec<DecodedRecord>> {
    let mut reader = CarReader::new(Cursor::new(bytes))?;
    let mut records = Vec::new();

    while let Some(block) = reader.next_block()? {
        let data = match serde_ipld_dagcbor::from_slice::<Ipld>(&block.data) {
            Ok(ipld) => RecordData::Structured(ipld_to_json(ipld)),
            Err(e) => {
                warn!(cid = %block.cid, "block is not valid dag-cbor, keeping raw bytes: {e}");
                RecordData::Raw { bytes: block.data }
            }
        };
        records.push(DecodedRecord {
            cid: block.cid.to_string(),
            data,
        });
    }

    Ok(records)
}

/// Render an IPLD document as JSON: links become `{"/": "<cid>"}` (dag-json
/// convention), byte strings become integer arrays.
fn ipld_to_json(ipld: Ipld) -> Value {
    match ipld {
        Ipld::Null => Value::Null,
        Ipld::Bool(b) => Value::Bool(b),
        Ipld::Integer(i) => match i64::try_from(i) {
            Ok(n) => Value::Number(n.into()),
            Err(_) => Value::String(i.to_string()),
        },
        Ipld::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Ipld::String(s) => Value::String(s),
        Ipld::Bytes(b) => json!({ "bytes": b }),
        Ipld::List(items) => Value::Array(items.into_iter().map(ipld_to_json).collect()),
        Ipld::Map(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, ipld_to_json(v)))
                .collect(),
        ),
        Ipld::Link(cid) => json!({ "/": cid.to_string() }),
    }
}

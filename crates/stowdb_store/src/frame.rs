//! Commit log framing.
//!
//! Every committed read-write transaction becomes one frame:
//!
//! ```text
//! magic "STOW" (4) | version (2) | payload length (4) | CBOR payload | CRC32 (4)
//! ```
//!
//! The CRC covers everything before it. Only a frame cut short by the end of
//! the log is a torn write; an interrupted append can leave nothing else.
//! A complete frame with bad magic or a checksum mismatch means committed
//! data was damaged, and the log must not be opened.

use crate::error::{StoreError, StoreResult};
use crate::record::Record;
use serde::{Deserialize, Serialize};

/// Magic bytes at the start of every frame.
pub const LOG_MAGIC: [u8; 4] = *b"STOW";

/// Current frame format version.
pub const LOG_VERSION: u16 = 1;

const HEADER_SIZE: usize = 10;
const CRC_SIZE: usize = 4;

/// A single write inside a commit batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LogOp {
    /// Insert or overwrite the record at `key`.
    Put {
        /// Composite key.
        key: String,
        /// New record.
        record: Record,
    },
    /// Remove the record at `key`.
    Delete {
        /// Composite key.
        key: String,
    },
}

/// All writes of one committed transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitBatch {
    /// Commit sequence number.
    pub sequence: u64,
    /// Writes in the order they take effect.
    pub ops: Vec<LogOp>,
}

/// Outcome of reading one frame from a byte slice.
#[derive(Debug)]
pub(crate) enum Frame {
    /// A complete, verified batch and the number of bytes it occupied.
    Batch(CommitBatch, usize),
    /// The log ends partway through a frame.
    Torn(String),
}

/// Encodes a batch into a framed byte vector.
pub(crate) fn encode(batch: &CommitBatch) -> StoreResult<Vec<u8>> {
    let mut payload = Vec::new();
    ciborium::into_writer(batch, &mut payload).map_err(|e| StoreError::Codec(e.to_string()))?;

    let len = u32::try_from(payload.len())
        .map_err(|_| StoreError::invalid_operation("commit batch too large"))?;

    let mut data = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
    data.extend_from_slice(&LOG_MAGIC);
    data.extend_from_slice(&LOG_VERSION.to_le_bytes());
    data.extend_from_slice(&len.to_le_bytes());
    data.extend_from_slice(&payload);
    let crc = crc32fast::hash(&data);
    data.extend_from_slice(&crc.to_le_bytes());
    Ok(data)
}

/// Decodes the frame at the start of `bytes`.
///
/// # Errors
///
/// Returns [`StoreError::Corrupted`] when a complete frame has bad magic,
/// fails its checksum, carries an unknown version, or holds an undecodable
/// payload.
pub(crate) fn decode(bytes: &[u8]) -> StoreResult<Frame> {
    if bytes.len() < HEADER_SIZE {
        return Ok(Frame::Torn(format!("{} trailing header bytes", bytes.len())));
    }
    if bytes[0..4] != LOG_MAGIC {
        return Err(StoreError::Corrupted("bad frame magic".into()));
    }

    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    let len = u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]) as usize;
    let total = HEADER_SIZE + len + CRC_SIZE;
    if bytes.len() < total {
        return Ok(Frame::Torn(format!(
            "frame needs {total} bytes, {} available",
            bytes.len()
        )));
    }

    let body_end = HEADER_SIZE + len;
    let stored = u32::from_le_bytes([
        bytes[body_end],
        bytes[body_end + 1],
        bytes[body_end + 2],
        bytes[body_end + 3],
    ]);
    let actual = crc32fast::hash(&bytes[..body_end]);
    if stored != actual {
        return Err(StoreError::Corrupted(format!(
            "checksum mismatch: expected {stored:08x}, got {actual:08x}"
        )));
    }

    if version != LOG_VERSION {
        return Err(StoreError::Corrupted(format!(
            "unsupported log version {version}"
        )));
    }

    let batch: CommitBatch = ciborium::from_reader(&bytes[HEADER_SIZE..body_end])
        .map_err(|e| StoreError::Corrupted(format!("undecodable batch: {e}")))?;
    Ok(Frame::Batch(batch, total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Document;
    use proptest::prelude::*;
    use serde_json::json;

    fn sample_batch() -> CommitBatch {
        let mut doc = Document::new();
        doc.insert("_id".into(), json!("a1"));
        doc.insert("n".into(), json!(1.5));
        doc.insert("tags".into(), json!(["x", {"deep": null}]));
        CommitBatch {
            sequence: 7,
            ops: vec![
                LogOp::Put {
                    key: "db.c$a1".into(),
                    record: Record::new("db.c", "a1", doc),
                },
                LogOp::Delete {
                    key: "db.c$gone".into(),
                },
            ],
        }
    }

    #[test]
    fn frame_decodes_to_same_batch() {
        let batch = sample_batch();
        let bytes = encode(&batch).unwrap();

        match decode(&bytes).unwrap() {
            Frame::Batch(decoded, used) => {
                assert_eq!(decoded, batch);
                assert_eq!(used, bytes.len());
            }
            Frame::Torn(reason) => panic!("unexpected torn frame: {reason}"),
        }
    }

    #[test]
    fn short_frame_is_torn() {
        let bytes = encode(&sample_batch()).unwrap();
        let cut = &bytes[..bytes.len() - 3];
        assert!(matches!(decode(cut).unwrap(), Frame::Torn(_)));
    }

    #[test]
    fn flipped_payload_bit_is_corruption() {
        let mut bytes = encode(&sample_batch()).unwrap();
        bytes[HEADER_SIZE + 2] ^= 0x01;
        assert!(matches!(decode(&bytes), Err(StoreError::Corrupted(_))));
    }

    #[test]
    fn bad_magic_is_corruption() {
        let mut bytes = encode(&sample_batch()).unwrap();
        bytes[0] = b'X';
        assert!(matches!(decode(&bytes), Err(StoreError::Corrupted(_))));
    }

    #[test]
    fn unknown_version_is_corruption() {
        let mut bytes = encode(&sample_batch()).unwrap();
        bytes[4] = 9;
        let body_end = bytes.len() - CRC_SIZE;
        let crc = crc32fast::hash(&bytes[..body_end]);
        bytes[body_end..].copy_from_slice(&crc.to_le_bytes());
        assert!(matches!(decode(&bytes), Err(StoreError::Corrupted(_))));
    }

    proptest! {
        #[test]
        fn every_truncation_is_torn(cut_back in 1usize..64) {
            let bytes = encode(&sample_batch()).unwrap();
            let cut = bytes.len().saturating_sub(cut_back);
            prop_assert!(matches!(decode(&bytes[..cut]).unwrap(), Frame::Torn(_)));
        }

        #[test]
        fn every_flipped_byte_is_detected(pos in 0usize..512, mask in 1u8..=255) {
            let mut bytes = encode(&sample_batch()).unwrap();
            let pos = pos % bytes.len();
            bytes[pos] ^= mask;
            prop_assert!(!matches!(decode(&bytes), Ok(Frame::Batch(..))));
        }
    }
}

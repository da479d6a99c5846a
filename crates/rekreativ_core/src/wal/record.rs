//! Log record types and their framing.

use crate::error::{CoreError, CoreResult};
use crate::key::Key;
use crate::schema::{CollectionDef, IndexDef};
use crate::types::{SequenceNumber, TransactionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Magic bytes opening every record.
pub(crate) const WAL_MAGIC: [u8; 4] = *b"RKWL";

/// Current log format version.
pub(crate) const WAL_VERSION: u16 = 1;

/// magic (4) + version (2) + type (1) + length (4)
pub(crate) const HEADER_SIZE: usize = 11;

pub(crate) const CRC_SIZE: usize = 4;

/// Type byte of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WalRecordType {
    /// Schema version change.
    Upgrade = 1,
    /// Committed transaction.
    Commit = 2,
}

impl WalRecordType {
    /// Converts a byte to a record type.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Upgrade),
            2 => Some(Self::Commit),
            _ => None,
        }
    }

    /// Converts the record type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// An index created on a collection that already existed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexAddition {
    /// Collection receiving the index.
    pub collection: String,
    /// The new index.
    pub index: IndexDef,
}

/// One write inside a committed transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WalOp {
    /// Insert or replace a record.
    Put {
        /// Target collection.
        collection: String,
        /// Primary key.
        key: Key,
        /// Full record.
        record: Value,
    },
    /// Remove a record.
    Delete {
        /// Target collection.
        collection: String,
        /// Primary key.
        key: Key,
    },
    /// Remove every record.
    Clear {
        /// Target collection.
        collection: String,
    },
}

impl WalOp {
    /// Collection the operation addresses.
    #[must_use]
    pub fn collection(&self) -> &str {
        match self {
            Self::Put { collection, .. }
            | Self::Delete { collection, .. }
            | Self::Clear { collection } => collection,
        }
    }
}

/// A log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WalRecord {
    /// The schema moved from `from` to `to`.
    Upgrade {
        /// Version before the upgrade.
        from: u32,
        /// Version after the upgrade.
        to: u32,
        /// Collections created, with their indexes.
        collections: Vec<CollectionDef>,
        /// Indexes added to collections that already existed.
        indexes: Vec<IndexAddition>,
    },

    /// A read-write transaction committed.
    Commit {
        /// Transaction ID.
        txid: TransactionId,
        /// Sequence number assigned to this commit.
        sequence: SequenceNumber,
        /// Writes in the order they were issued.
        ops: Vec<WalOp>,
    },
}

impl WalRecord {
    /// Returns the record type.
    #[must_use]
    pub fn record_type(&self) -> WalRecordType {
        match self {
            Self::Upgrade { .. } => WalRecordType::Upgrade,
            Self::Commit { .. } => WalRecordType::Commit,
        }
    }

    /// Encodes the record into a complete frame.
    pub fn encode_frame(&self) -> CoreResult<Vec<u8>> {
        let mut payload = Vec::new();
        ciborium::ser::into_writer(self, &mut payload)
            .map_err(|e| CoreError::encode(e.to_string()))?;
        let len = u32::try_from(payload.len())
            .map_err(|_| CoreError::encode("log record payload too large"))?;

        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        frame.extend_from_slice(&WAL_MAGIC);
        frame.extend_from_slice(&WAL_VERSION.to_le_bytes());
        frame.push(self.record_type().as_byte());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&payload);
        let crc = compute_crc32(&frame);
        frame.extend_from_slice(&crc.to_le_bytes());
        Ok(frame)
    }

    /// Decodes a payload whose frame has already been validated.
    pub fn decode_payload(record_type: WalRecordType, payload: &[u8]) -> CoreResult<Self> {
        let record: Self = ciborium::de::from_reader(payload)
            .map_err(|e| CoreError::wal_corruption(format!("undecodable payload: {e}")))?;
        if record.record_type() != record_type {
            return Err(CoreError::wal_corruption(format!(
                "frame type {record_type:?} carries a {:?} payload",
                record.record_type()
            )));
        }
        Ok(record)
    }
}

/// Computes the IEEE CRC32 of `data`.
pub fn compute_crc32(data: &[u8]) -> u32 {
    const TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut bit = 0;
            while bit < 8 {
                crc = if crc & 1 != 0 {
                    (crc >> 1) ^ 0xEDB8_8320
                } else {
                    crc >> 1
                };
                bit += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    !data.iter().fold(0xFFFF_FFFF_u32, |crc, &byte| {
        (crc >> 8) ^ TABLE[((crc ^ u32::from(byte)) & 0xFF) as usize]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn commit() -> WalRecord {
        WalRecord::Commit {
            txid: TransactionId::new(3),
            sequence: SequenceNumber::new(2),
            ops: vec![
                WalOp::Clear {
                    collection: "clients".into(),
                },
                WalOp::Put {
                    collection: "clients".into(),
                    key: Key::Int(1),
                    record: json!({"id": 1, "name": "Bar El Rincón", "machines": 0}),
                },
                WalOp::Delete {
                    collection: "machines".into(),
                    key: Key::from("M002"),
                },
            ],
        }
    }

    #[test]
    fn frame_layout() {
        let frame = commit().encode_frame().unwrap();
        assert_eq!(&frame[0..4], b"RKWL");
        assert_eq!(u16::from_le_bytes([frame[4], frame[5]]), WAL_VERSION);
        assert_eq!(frame[6], WalRecordType::Commit.as_byte());
        let len = u32::from_le_bytes([frame[7], frame[8], frame[9], frame[10]]) as usize;
        assert_eq!(frame.len(), HEADER_SIZE + len + CRC_SIZE);

        let body_end = frame.len() - CRC_SIZE;
        let stored = u32::from_le_bytes(frame[body_end..].try_into().unwrap());
        assert_eq!(stored, compute_crc32(&frame[..body_end]));
    }

    #[test]
    fn payload_decodes_with_json_values_intact() {
        let record = commit();
        let frame = record.encode_frame().unwrap();
        let payload = &frame[HEADER_SIZE..frame.len() - CRC_SIZE];
        let decoded = WalRecord::decode_payload(WalRecordType::Commit, payload).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn mismatched_type_byte_is_corruption() {
        let frame = commit().encode_frame().unwrap();
        let payload = &frame[HEADER_SIZE..frame.len() - CRC_SIZE];
        assert!(matches!(
            WalRecord::decode_payload(WalRecordType::Upgrade, payload),
            Err(CoreError::WalCorruption { .. })
        ));
    }

    #[test]
    fn unknown_type_bytes() {
        assert_eq!(WalRecordType::from_byte(1), Some(WalRecordType::Upgrade));
        assert_eq!(WalRecordType::from_byte(0), None);
        assert_eq!(WalRecordType::from_byte(9), None);
    }

    #[test]
    fn crc32_known_value() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(compute_crc32(b""), 0);
    }
}

//! Sequential log reader.

use crate::error::{CoreError, CoreResult};
use crate::wal::record::WalRecordType;
use crate::wal::{compute_crc32, WalRecord, CRC_SIZE, HEADER_SIZE, WAL_MAGIC, WAL_VERSION};
use rekreativ_storage::StorageBackend;

/// Iterates over complete records from the start of the log.
///
/// Yields `(offset, record)`. Stops cleanly at a torn tail and remembers
/// where the last complete record ended, see [`WalReader::valid_end`].
pub struct WalReader<'a> {
    backend: &'a dyn StorageBackend,
    size: u64,
    offset: u64,
    finished: bool,
}

impl<'a> WalReader<'a> {
    /// Creates a reader positioned at offset 0.
    pub fn new(backend: &'a dyn StorageBackend) -> CoreResult<Self> {
        Ok(Self {
            size: backend.size()?,
            backend,
            offset: 0,
            finished: false,
        })
    }

    /// Offset just past the last complete record read so far.
    #[must_use]
    pub fn valid_end(&self) -> u64 {
        self.offset
    }

    /// Bytes after the last complete record.
    #[must_use]
    pub fn torn_bytes(&self) -> u64 {
        self.size - self.offset
    }

    fn read_next(&mut self) -> CoreResult<Option<(u64, WalRecord)>> {
        let start = self.offset;
        let remaining = self.size - start;
        if remaining < HEADER_SIZE as u64 {
            return Ok(None);
        }

        let header = self.backend.read_at(start, HEADER_SIZE)?;
        if header[0..4] != WAL_MAGIC {
            return Err(CoreError::wal_corruption(format!(
                "invalid magic at offset {start}"
            )));
        }
        let version = u16::from_le_bytes([header[4], header[5]]);
        if version > WAL_VERSION {
            return Err(CoreError::wal_corruption(format!(
                "unsupported log version {version} at offset {start}"
            )));
        }
        let record_type = WalRecordType::from_byte(header[6]).ok_or_else(|| {
            CoreError::wal_corruption(format!(
                "unknown record type {} at offset {start}",
                header[6]
            ))
        })?;
        let len = u32::from_le_bytes([header[7], header[8], header[9], header[10]]) as usize;

        let frame_len = (HEADER_SIZE + len + CRC_SIZE) as u64;
        if remaining < frame_len {
            // A later frame behind this header means the length is corrupt.
            let tail = self
                .backend
                .read_at(start + WAL_MAGIC.len() as u64, (remaining as usize) - WAL_MAGIC.len())?;
            if tail.windows(WAL_MAGIC.len()).any(|w| w == WAL_MAGIC) {
                return Err(CoreError::wal_corruption(format!(
                    "record at offset {start} claims {len} bytes past the end of the log"
                )));
            }
            return Ok(None);
        }

        let rest = self
            .backend
            .read_at(start + HEADER_SIZE as u64, len + CRC_SIZE)?;
        let (payload, crc_bytes) = rest.split_at(len);
        let expected = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);

        let mut covered = header;
        covered.extend_from_slice(payload);
        let actual = compute_crc32(&covered);
        if expected != actual {
            return Err(CoreError::ChecksumMismatch { expected, actual });
        }

        let record = WalRecord::decode_payload(record_type, payload)?;
        self.offset = start + frame_len;
        Ok(Some((start, record)))
    }
}

impl Iterator for WalReader<'_> {
    type Item = CoreResult<(u64, WalRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_next() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

/// Summary of a replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalReplay {
    /// Complete records replayed.
    pub records: usize,
    /// Bytes of torn tail that were cut off.
    pub torn_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SequenceNumber, TransactionId};
    use rekreativ_storage::InMemoryBackend;

    fn frame(txid: u64) -> Vec<u8> {
        WalRecord::Commit {
            txid: TransactionId::new(txid),
            sequence: SequenceNumber::new(txid),
            ops: Vec::new(),
        }
        .encode_frame()
        .unwrap()
    }

    #[test]
    fn reads_records_in_order() {
        let mut bytes = frame(1);
        let second_at = bytes.len() as u64;
        bytes.extend(frame(2));
        let backend = InMemoryBackend::with_data(bytes);

        let records: Vec<_> = WalReader::new(&backend)
            .unwrap()
            .collect::<CoreResult<_>>()
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].0, second_at);
    }

    #[test]
    fn torn_tail_is_a_clean_end() {
        let mut bytes = frame(1);
        let complete = bytes.len() as u64;
        let second = frame(2);
        bytes.extend_from_slice(&second[..second.len() - 3]);
        let backend = InMemoryBackend::with_data(bytes);

        let mut reader = WalReader::new(&backend).unwrap();
        assert!(reader.next().unwrap().is_ok());
        assert!(reader.next().is_none());
        assert_eq!(reader.valid_end(), complete);
        assert_eq!(reader.torn_bytes(), second.len() as u64 - 3);
    }

    #[test]
    fn partial_header_is_a_clean_end() {
        let backend = InMemoryBackend::with_data(b"RKWL\x01".to_vec());
        let mut reader = WalReader::new(&backend).unwrap();
        assert!(reader.next().is_none());
        assert_eq!(reader.torn_bytes(), 5);
    }

    #[test]
    fn flipped_payload_bit_is_fatal() {
        let mut bytes = frame(1);
        bytes[HEADER_SIZE + 1] ^= 0x40;
        let backend = InMemoryBackend::with_data(bytes);
        let mut reader = WalReader::new(&backend).unwrap();
        assert!(matches!(
            reader.next(),
            Some(Err(CoreError::ChecksumMismatch { .. }))
        ));
        assert!(reader.next().is_none());
    }

    #[test]
    fn oversized_length_before_later_frames_is_fatal() {
        let mut bytes = frame(1);
        bytes.extend(frame(2));
        bytes[8] ^= 0x40;
        let backend = InMemoryBackend::with_data(bytes);
        let mut reader = WalReader::new(&backend).unwrap();
        assert!(matches!(
            reader.next(),
            Some(Err(CoreError::WalCorruption { .. }))
        ));
        assert_eq!(reader.valid_end(), 0);
    }

    #[test]
    fn bad_magic_is_fatal() {
        let mut bytes = frame(1);
        bytes[0] = b'X';
        let backend = InMemoryBackend::with_data(bytes);
        assert!(matches!(
            WalReader::new(&backend).unwrap().next(),
            Some(Err(CoreError::WalCorruption { .. }))
        ));
    }

    #[test]
    fn future_version_is_fatal() {
        let mut bytes = frame(1);
        bytes[4..6].copy_from_slice(&(WAL_VERSION + 1).to_le_bytes());
        let backend = InMemoryBackend::with_data(bytes);
        assert!(matches!(
            WalReader::new(&backend).unwrap().next(),
            Some(Err(CoreError::WalCorruption { .. }))
        ));
    }
}

//! IndexRecord writer/reader (spec.md §4.6), grounded in
//! `original_source/vrs/IndexRecord.h`.
//!
//! On disk, entries store *sizes*, not offsets: a reader reconstructs
//! absolute offsets by prefix-summing sizes starting from the first user
//! record. This keeps the index compact and means a record's final on-disk
//! size (post-compression) is the only thing that needs to be known at
//! indexing time.

use std::collections::BTreeSet;

use crate::error::{Result, VrsError};
use crate::format::{RecordType, RECORD_HEADER_SIZE};
use crate::stream_id::{RecordableTypeId, StreamId};

/// On-disk per-record entry: (timestamp, size, type, streamId). Order here
/// matches `DiskRecordInfo`'s field layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiskRecordInfo {
    pub timestamp: f64,
    pub record_size: u32,
    pub record_type: RecordType,
    pub stream_id: StreamId,
}

impl DiskRecordInfo {
    pub fn to_bytes(&self) -> [u8; 23] {
        let mut buf = [0u8; 23];
        buf[0..8].copy_from_slice(&self.timestamp.to_le_bytes());
        buf[8..12].copy_from_slice(&self.record_size.to_le_bytes());
        buf[12] = self.record_type as u8;
        buf[13..17].copy_from_slice(&(self.stream_id.type_id.0 as i32).to_le_bytes());
        buf[17..19].copy_from_slice(&self.stream_id.instance_id.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < 19 {
            return Err(VrsError::IndexCorrupt {
                reason: "truncated index entry".into(),
            });
        }
        let timestamp = f64::from_le_bytes(buf[0..8].try_into().unwrap());
        let record_size = u32::from_le_bytes(buf[8..12].try_into().unwrap());
        let record_type = RecordType::from_u8(buf[12])?;
        let type_id = i32::from_le_bytes(buf[13..17].try_into().unwrap());
        let instance_id = u16::from_le_bytes(buf[17..19].try_into().unwrap());
        Ok(DiskRecordInfo {
            timestamp,
            record_size,
            record_type,
            stream_id: StreamId::new(RecordableTypeId(type_id as u16), instance_id),
        })
    }
}

/// In-memory index entry, with the absolute file offset reconstructed from
/// the on-disk sizes. Ordered `(timestamp, streamId, fileOffset)` exactly as
/// `IndexRecord::RecordInfo::operator<`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecordInfo {
    pub timestamp: f64,
    pub file_offset: i64,
    pub stream_id: StreamId,
    pub record_type: RecordType,
}

impl PartialOrd for RecordInfo {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Eq for RecordInfo {}

impl Ord for RecordInfo {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.timestamp
            .partial_cmp(&other.timestamp)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| self.stream_id.cmp(&other.stream_id))
            .then_with(|| self.file_offset.cmp(&other.file_offset))
    }
}

/// Accumulates entries while a file is being written; serialized into a
/// single IndexRecord payload at finalize time (classic layout).
#[derive(Default)]
pub struct IndexWriter {
    stream_ids: BTreeSet<StreamId>,
    entries: Vec<DiskRecordInfo>,
}

impl IndexWriter {
    pub fn new() -> Self {
        IndexWriter::default()
    }

    pub fn add_stream(&mut self, id: StreamId) {
        self.stream_ids.insert(id);
    }

    pub fn add_record(&mut self, timestamp: f64, size: u32, stream_id: StreamId, record_type: RecordType) {
        self.stream_ids.insert(stream_id);
        self.entries.push(DiskRecordInfo {
            timestamp,
            record_size: size,
            record_type,
            stream_id,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Serialize the classic-layout index payload: stream-id table, entry
    /// count, then every entry back-to-back.
    pub fn serialize_classic(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.stream_ids.len() as u32).to_le_bytes());
        for id in &self.stream_ids {
            out.extend_from_slice(&(id.type_id.0 as i32).to_le_bytes());
            out.extend_from_slice(&id.instance_id.to_le_bytes());
        }
        out.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
        for entry in &self.entries {
            out.extend_from_slice(&entry.to_bytes());
        }
        out
    }
}

/// Parse a classic-layout index payload back into stream ids and
/// `DiskRecordInfo` entries.
pub fn parse_classic_payload(buf: &[u8]) -> Result<(BTreeSet<StreamId>, Vec<DiskRecordInfo>)> {
    let mut pos = 0usize;
    let stream_count = read_u32(buf, &mut pos)?;
    let mut stream_ids = BTreeSet::new();
    for _ in 0..stream_count {
        let type_id = read_i32(buf, &mut pos)?;
        let instance_id = read_u16(buf, &mut pos)?;
        stream_ids.insert(StreamId::new(RecordableTypeId(type_id as u16), instance_id));
    }
    let entry_count = read_u32(buf, &mut pos)?;
    let mut entries = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        let entry = DiskRecordInfo::from_bytes(&buf[pos..])?;
        pos += 19;
        entries.push(entry);
    }
    Ok((stream_ids, entries))
}

fn read_u32(buf: &[u8], pos: &mut usize) -> Result<u32> {
    let v = buf
        .get(*pos..*pos + 4)
        .ok_or_else(|| VrsError::IndexCorrupt { reason: "truncated index".into() })?;
    *pos += 4;
    Ok(u32::from_le_bytes(v.try_into().unwrap()))
}

fn read_i32(buf: &[u8], pos: &mut usize) -> Result<i32> {
    let v = buf
        .get(*pos..*pos + 4)
        .ok_or_else(|| VrsError::IndexCorrupt { reason: "truncated index".into() })?;
    *pos += 4;
    Ok(i32::from_le_bytes(v.try_into().unwrap()))
}

fn read_u16(buf: &[u8], pos: &mut usize) -> Result<u16> {
    let v = buf
        .get(*pos..*pos + 2)
        .ok_or_else(|| VrsError::IndexCorrupt { reason: "truncated index".into() })?;
    *pos += 2;
    Ok(u16::from_le_bytes(v.try_into().unwrap()))
}

/// Reconstruct absolute file offsets from a sequence of on-disk sizes,
/// starting at `first_user_record_offset` (spec.md §4.6).
pub fn reconstruct_offsets(entries: &[DiskRecordInfo], first_user_record_offset: i64) -> Vec<RecordInfo> {
    let mut offset = first_user_record_offset;
    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        out.push(RecordInfo {
            timestamp: entry.timestamp,
            file_offset: offset,
            stream_id: entry.stream_id,
            record_type: entry.record_type,
        });
        offset += entry.record_size as i64;
    }
    out
}

/// Validate that a reconstructed index is sorted and offsets are strictly
/// monotonically increasing by at least a record header's worth of bytes.
pub fn validate_index(index: &[RecordInfo]) -> bool {
    index.windows(2).all(|pair| {
        pair[0] <= pair[1] && pair[1].file_offset >= pair[0].file_offset + RECORD_HEADER_SIZE as i64
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream_id::RecordableTypeId;

    fn sid(n: u16) -> StreamId {
        StreamId::new(RecordableTypeId(100), n)
    }

    #[test]
    fn classic_round_trip() {
        let mut writer = IndexWriter::new();
        writer.add_record(1.0, 40, sid(1), RecordType::Configuration);
        writer.add_record(2.0, 60, sid(1), RecordType::Data);
        let payload = writer.serialize_classic();
        let (stream_ids, entries) = parse_classic_payload(&payload).unwrap();
        assert_eq!(stream_ids.len(), 1);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].record_size, 40);
        assert_eq!(entries[1].timestamp, 2.0);
    }

    #[test]
    fn offsets_reconstruct_by_prefix_sum() {
        let entries = vec![
            DiskRecordInfo { timestamp: 1.0, record_size: 100, record_type: RecordType::Data, stream_id: sid(1) },
            DiskRecordInfo { timestamp: 2.0, record_size: 50, record_type: RecordType::Data, stream_id: sid(1) },
        ];
        let index = reconstruct_offsets(&entries, 1000);
        assert_eq!(index[0].file_offset, 1000);
        assert_eq!(index[1].file_offset, 1100);
    }

    #[test]
    fn record_info_orders_by_timestamp_then_stream_then_offset() {
        let a = RecordInfo { timestamp: 1.0, file_offset: 100, stream_id: sid(2), record_type: RecordType::Data };
        let b = RecordInfo { timestamp: 1.0, file_offset: 50, stream_id: sid(1), record_type: RecordType::Data };
        assert!(b < a); // same timestamp, lower stream id sorts first
    }

    #[test]
    fn validate_index_detects_offset_violation() {
        let good = vec![
            RecordInfo { timestamp: 1.0, file_offset: 0, stream_id: sid(1), record_type: RecordType::Data },
            RecordInfo { timestamp: 2.0, file_offset: 100, stream_id: sid(1), record_type: RecordType::Data },
        ];
        assert!(validate_index(&good));
        let bad = vec![
            RecordInfo { timestamp: 2.0, file_offset: 0, stream_id: sid(1), record_type: RecordType::Data },
            RecordInfo { timestamp: 1.0, file_offset: 100, stream_id: sid(1), record_type: RecordType::Data },
        ];
        assert!(!validate_index(&bad));
    }
}

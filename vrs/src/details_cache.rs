//! Auxiliary file-details-cache format (spec.md §6): a small companion file
//! that lets a reader skip full index parsing when present, and records
//! whether the original file had a usable on-disk index at all.
//!
//! Grounded in `original_source/vrs/FileDetailsCache.cpp`: a distinct magic
//! triple and format version from the main container (so a details cache is
//! never mistaken for a VRS file or vice versa), description record left
//! untouched, and a body of zstd-compressed, fixed-size record-info batches
//! rather than one big compressed blob — a reader only needs to decompress
//! the batches covering the stream(s) it cares about.

use std::path::Path;

use crate::error::{Result, VrsError};
use crate::file_handler::{DiskFileHandler, FileHandler};
use crate::format::four_char_code;
use crate::index_record::RecordInfo;
use crate::stream_id::{RecordableTypeId, StreamId};

pub const DETAILS_MAGIC_1: u32 = four_char_code(b'V', b'r', b's', b'D');
pub const DETAILS_MAGIC_2: u32 = four_char_code(b'e', b't', b'a', b'i');
pub const DETAILS_MAGIC_3: u32 = four_char_code(b'l', b's', b'C', b'!');
pub const DETAILS_FORMAT_VERSION: u32 = four_char_code(b'V', b'D', b'C', b'1');

const HEADER_SIZE: usize = 32;
/// Number of record-info entries per independently zstd-compressed batch.
const BATCH_SIZE: usize = 256;
/// Wire size of one record-info entry: timestamp(8) + fileOffset(8) + typeId(4) + instanceId(2) + recordType(1).
const ENTRY_SIZE: usize = 23;

/// Parsed contents of a file-details-cache companion file.
#[derive(Debug, Clone, Default)]
pub struct DetailsCache {
    /// Whether the original file this cache describes had its own on-disk
    /// index (future4 bit 0, per spec.md §6).
    pub original_has_index: bool,
    pub streams: Vec<StreamId>,
    pub records: Vec<RecordInfo>,
}

impl DetailsCache {
    pub fn new(original_has_index: bool, streams: Vec<StreamId>, records: Vec<RecordInfo>) -> Self {
        DetailsCache { original_has_index, streams, records }
    }

    /// Serialize to bytes: header, stream-id table, record count, then the
    /// record infos split into fixed-size batches, each zstd-compressed and
    /// length-prefixed independently.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        out.extend_from_slice(&DETAILS_MAGIC_1.to_le_bytes());
        out.extend_from_slice(&DETAILS_MAGIC_2.to_le_bytes());
        out.extend_from_slice(&DETAILS_MAGIC_3.to_le_bytes());
        out.extend_from_slice(&DETAILS_FORMAT_VERSION.to_le_bytes());
        let future4: u64 = if self.original_has_index { 0 } else { 1 };
        out.extend_from_slice(&future4.to_le_bytes());
        out.extend_from_slice(&(HEADER_SIZE as u32).to_le_bytes());
        debug_assert_eq!(out.len(), HEADER_SIZE);

        out.extend_from_slice(&(self.streams.len() as u32).to_le_bytes());
        for id in &self.streams {
            out.extend_from_slice(&(id.type_id.0 as i32).to_le_bytes());
            out.extend_from_slice(&id.instance_id.to_le_bytes());
        }

        out.extend_from_slice(&(self.records.len() as u32).to_le_bytes());
        for batch in self.records.chunks(BATCH_SIZE) {
            let mut raw = Vec::with_capacity(batch.len() * ENTRY_SIZE);
            for record in batch {
                raw.extend_from_slice(&record.timestamp.to_le_bytes());
                raw.extend_from_slice(&record.file_offset.to_le_bytes());
                raw.extend_from_slice(&(record.stream_id.type_id.0 as i32).to_le_bytes());
                raw.extend_from_slice(&record.stream_id.instance_id.to_le_bytes());
                raw.push(record.record_type as u8);
            }
            let compressed = zstd::bulk::compress(&raw, 0)
                .map_err(|e| VrsError::CompressionFailed { reason: e.to_string() })?;
            out.extend_from_slice(&(batch.len() as u32).to_le_bytes());
            out.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
            out.extend_from_slice(&compressed);
        }
        Ok(out)
    }

    /// Write this cache as a standalone companion file.
    pub fn write_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = DiskFileHandler::create(path)?;
        file.append(&self.to_bytes()?)?;
        file.flush()
    }

    /// Read a companion file written by [`DetailsCache::write_to_path`].
    pub fn read_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let mut file = DiskFileHandler::open_read(path)?;
        let size = file.size()?;
        let mut buf = vec![0u8; size as usize];
        file.read_at(0, &mut buf)?;
        Self::from_bytes(&buf)
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(VrsError::UnexpectedEof { offset: 0 });
        }
        let magic1 = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        let magic2 = u32::from_le_bytes(buf[4..8].try_into().unwrap());
        let magic3 = u32::from_le_bytes(buf[8..12].try_into().unwrap());
        let version = u32::from_le_bytes(buf[12..16].try_into().unwrap());
        if magic1 != DETAILS_MAGIC_1 || magic2 != DETAILS_MAGIC_2 || magic3 != DETAILS_MAGIC_3 {
            return Err(VrsError::BadMagic {
                offset: 0,
                field: "details cache header",
                expected: DETAILS_MAGIC_1,
                got: magic1,
            });
        }
        if version != DETAILS_FORMAT_VERSION {
            return Err(VrsError::UnsupportedFormatVersion { got: version });
        }
        let future4 = u64::from_le_bytes(buf[16..24].try_into().unwrap());
        let original_has_index = future4 & 1 == 0;

        let mut pos = HEADER_SIZE;
        let stream_count = read_u32(buf, &mut pos)?;
        let mut streams = Vec::with_capacity(stream_count as usize);
        for _ in 0..stream_count {
            let type_id = read_i32(buf, &mut pos)?;
            let instance_id = read_u16(buf, &mut pos)?;
            streams.push(StreamId::new(RecordableTypeId(type_id as u16), instance_id));
        }

        let total_records = read_u32(buf, &mut pos)? as usize;
        let mut records = Vec::with_capacity(total_records);
        while records.len() < total_records {
            let batch_count = read_u32(buf, &mut pos)? as usize;
            let compressed_len = read_u32(buf, &mut pos)? as usize;
            let compressed = buf
                .get(pos..pos + compressed_len)
                .ok_or_else(|| VrsError::IndexCorrupt { reason: "truncated details cache batch".into() })?;
            pos += compressed_len;
            let raw = zstd::bulk::decompress(compressed, batch_count * ENTRY_SIZE)
                .map_err(|e| VrsError::DecompressionFailed { reason: e.to_string() })?;
            for chunk in raw.chunks_exact(ENTRY_SIZE) {
                let timestamp = f64::from_le_bytes(chunk[0..8].try_into().unwrap());
                let file_offset = i64::from_le_bytes(chunk[8..16].try_into().unwrap());
                let type_id = i32::from_le_bytes(chunk[16..20].try_into().unwrap());
                let instance_id = u16::from_le_bytes(chunk[20..22].try_into().unwrap());
                let record_type = crate::format::RecordType::from_u8(chunk[22])?;
                records.push(RecordInfo {
                    timestamp,
                    file_offset,
                    stream_id: StreamId::new(RecordableTypeId(type_id as u16), instance_id),
                    record_type,
                });
            }
        }

        Ok(DetailsCache { original_has_index, streams, records })
    }
}

fn read_u32(buf: &[u8], pos: &mut usize) -> Result<u32> {
    let v = buf
        .get(*pos..*pos + 4)
        .ok_or_else(|| VrsError::IndexCorrupt { reason: "truncated details cache".into() })?;
    *pos += 4;
    Ok(u32::from_le_bytes(v.try_into().unwrap()))
}

fn read_i32(buf: &[u8], pos: &mut usize) -> Result<i32> {
    let v = buf
        .get(*pos..*pos + 4)
        .ok_or_else(|| VrsError::IndexCorrupt { reason: "truncated details cache".into() })?;
    *pos += 4;
    Ok(i32::from_le_bytes(v.try_into().unwrap()))
}

fn read_u16(buf: &[u8], pos: &mut usize) -> Result<u16> {
    let v = buf
        .get(*pos..*pos + 2)
        .ok_or_else(|| VrsError::IndexCorrupt { reason: "truncated details cache".into() })?;
    *pos += 2;
    Ok(u16::from_le_bytes(v.try_into().unwrap()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::RecordType;

    fn sid(n: u16) -> StreamId {
        StreamId::new(RecordableTypeId(100), n)
    }

    #[test]
    fn round_trips_streams_and_records() {
        let records = vec![
            RecordInfo { timestamp: 1.0, file_offset: 72, stream_id: sid(1), record_type: RecordType::Data },
            RecordInfo { timestamp: 2.0, file_offset: 200, stream_id: sid(2), record_type: RecordType::Configuration },
        ];
        let cache = DetailsCache::new(true, vec![sid(1), sid(2)], records.clone());
        let bytes = cache.to_bytes().unwrap();
        let back = DetailsCache::from_bytes(&bytes).unwrap();
        assert!(back.original_has_index);
        assert_eq!(back.streams, vec![sid(1), sid(2)]);
        assert_eq!(back.records, records);
    }

    #[test]
    fn write_then_read_from_a_real_companion_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recording.vrs.details");
        let records = vec![RecordInfo { timestamp: 1.0, file_offset: 72, stream_id: sid(1), record_type: RecordType::Data }];
        let cache = DetailsCache::new(true, vec![sid(1)], records.clone());
        cache.write_to_path(&path).unwrap();

        let back = DetailsCache::read_from_path(&path).unwrap();
        assert!(back.original_has_index);
        assert_eq!(back.records, records);
    }

    #[test]
    fn records_missing_index_flag_when_original_had_none() {
        let cache = DetailsCache::new(false, vec![], vec![]);
        let bytes = cache.to_bytes().unwrap();
        let back = DetailsCache::from_bytes(&bytes).unwrap();
        assert!(!back.original_has_index);
    }

    #[test]
    fn batches_split_across_more_than_one_compressed_chunk() {
        let records: Vec<RecordInfo> = (0..(BATCH_SIZE * 2 + 10))
            .map(|i| RecordInfo {
                timestamp: i as f64,
                file_offset: 72 + i as i64 * 40,
                stream_id: sid(1),
                record_type: RecordType::Data,
            })
            .collect();
        let cache = DetailsCache::new(true, vec![sid(1)], records.clone());
        let bytes = cache.to_bytes().unwrap();
        let back = DetailsCache::from_bytes(&bytes).unwrap();
        assert_eq!(back.records.len(), records.len());
        assert_eq!(back.records, records);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut bytes = DetailsCache::new(true, vec![], vec![]).to_bytes().unwrap();
        bytes[0] = 0xFF;
        assert!(DetailsCache::from_bytes(&bytes).is_err());
    }
}

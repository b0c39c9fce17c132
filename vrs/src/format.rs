//! On-disk file format: file header and record header (spec.md §4.1, §6).
//!
//! All integers are little-endian, fixed width, with no padding, so a file
//! written on one platform reads back identically on any other. Mirrors
//! `original_source/vrs/FileFormat.h`'s `FileHeader`/`RecordHeader` layout.

use crate::error::{Result, VrsError};
use crate::stream_id::{RecordableTypeId, StreamId};

/// Assemble four ASCII characters into a little-endian u32, the same way
/// `original_source/vrs/FileFormat.h`'s `fourCharCode` does.
pub const fn four_char_code(a: u8, b: u8, c: u8, d: u8) -> u32 {
    (a as u32) | ((b as u32) << 8) | ((c as u32) << 16) | ((d as u32) << 24)
}

// "Visi" / "onRe" / "cord" -> "VisionRecord" split across the three magic words.
pub const MAGIC_HEADER_1: u32 = four_char_code(b'V', b'i', b's', b'i');
pub const MAGIC_HEADER_2: u32 = four_char_code(b'o', b'n', b'R', b'e');
pub const MAGIC_HEADER_3: u32 = four_char_code(b'c', b'o', b'r', b'd');

pub const CLASSIC_FORMAT_VERSION: u32 = four_char_code(b'V', b'R', b'S', b'1');
pub const FRONT_INDEX_FORMAT_VERSION: u32 = four_char_code(b'V', b'R', b'S', b'2');
pub const ZSTD_FRONT_FORMAT_VERSION: u32 = four_char_code(b'V', b'R', b'S', b'3');

pub const CLASSIC_INDEX_FORMAT_VERSION: u32 = 2;
pub const SPLIT_INDEX_FORMAT_VERSION: u32 = 3;

pub const FILE_HEADER_SIZE: u32 = 80;
pub const RECORD_HEADER_SIZE: u32 = 32;

/// Maximum slack a reader tolerates between the struct size it knows and the
/// declared on-disk size, per spec.md §4.1 ("within [struct size, struct
/// size + 200]").
pub const MAX_HEADER_GROWTH: u32 = 200;

/// Sentinel "collect everything" timestamp used by `writeRecords`/`closeFile`
/// (spec.md §4.8) when no upper bound is given.
pub const MAX_TIMESTAMP: f64 = f64::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    None = 0,
    Lz4 = 1,
    Zstd = 2,
}

impl CompressionType {
    pub fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(CompressionType::None),
            1 => Ok(CompressionType::Lz4),
            2 => Ok(CompressionType::Zstd),
            other => Err(VrsError::ConfigurationError {
                reason: format!("unknown compression type byte {other}"),
            }),
        }
    }
}

/// In-memory mirror of the on-disk `FileHeader` struct (spec.md §4.1).
#[derive(Debug, Clone, Copy)]
pub struct FileHeader {
    pub magic_header_1: u32,
    pub magic_header_2: u32,
    pub creation_id: u64,
    pub file_header_size: u32,
    pub record_header_size: u32,
    pub index_record_offset: i64,
    pub description_record_offset: i64,
    pub first_user_record_offset: i64,
    pub future2: u64,
    pub future3: u64,
    pub future4: u64,
    pub magic_header_3: u32,
    pub file_format_version: u32,
}

impl FileHeader {
    pub fn new(creation_id: u64, file_format_version: u32) -> Self {
        FileHeader {
            magic_header_1: MAGIC_HEADER_1,
            magic_header_2: MAGIC_HEADER_2,
            creation_id,
            file_header_size: FILE_HEADER_SIZE,
            record_header_size: RECORD_HEADER_SIZE,
            index_record_offset: 0,
            description_record_offset: 0,
            first_user_record_offset: 0,
            future2: 0,
            future3: 0,
            future4: 0,
            magic_header_3: MAGIC_HEADER_3,
            file_format_version,
        }
    }

    pub fn looks_like_a_vrs_file(&self) -> bool {
        self.magic_header_1 == MAGIC_HEADER_1
            && self.magic_header_2 == MAGIC_HEADER_2
            && self.magic_header_3 == MAGIC_HEADER_3
    }

    pub fn is_format_supported(&self) -> bool {
        matches!(
            self.file_format_version,
            CLASSIC_FORMAT_VERSION | FRONT_INDEX_FORMAT_VERSION | ZSTD_FRONT_FORMAT_VERSION
        )
    }

    /// Best guess of where user records end, per spec.md §4.1.
    pub fn end_of_user_records_offset(&self, file_size: i64) -> i64 {
        match self.file_format_version {
            CLASSIC_FORMAT_VERSION => {
                if self.index_record_offset > 0 {
                    self.index_record_offset
                } else {
                    file_size
                }
            }
            _ => {
                if self.index_record_offset > self.first_user_record_offset {
                    self.index_record_offset
                } else {
                    file_size
                }
            }
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(FILE_HEADER_SIZE as usize);
        out.extend_from_slice(&self.magic_header_1.to_le_bytes());
        out.extend_from_slice(&self.magic_header_2.to_le_bytes());
        out.extend_from_slice(&self.creation_id.to_le_bytes());
        out.extend_from_slice(&self.file_header_size.to_le_bytes());
        out.extend_from_slice(&self.record_header_size.to_le_bytes());
        out.extend_from_slice(&self.index_record_offset.to_le_bytes());
        out.extend_from_slice(&self.description_record_offset.to_le_bytes());
        out.extend_from_slice(&self.first_user_record_offset.to_le_bytes());
        out.extend_from_slice(&self.future2.to_le_bytes());
        out.extend_from_slice(&self.future3.to_le_bytes());
        out.extend_from_slice(&self.future4.to_le_bytes());
        out.extend_from_slice(&self.magic_header_3.to_le_bytes());
        out.extend_from_slice(&self.file_format_version.to_le_bytes());
        debug_assert_eq!(out.len(), FILE_HEADER_SIZE as usize);
        out
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < FILE_HEADER_SIZE as usize {
            return Err(VrsError::UnexpectedEof { offset: 0 });
        }
        let mut p = 0usize;
        let magic_header_1 = u32::from_le_bytes(buf[p..p + 4].try_into().unwrap());
        p += 4;
        let magic_header_2 = u32::from_le_bytes(buf[p..p + 4].try_into().unwrap());
        p += 4;
        let creation_id = u64::from_le_bytes(buf[p..p + 8].try_into().unwrap());
        p += 8;
        let file_header_size = u32::from_le_bytes(buf[p..p + 4].try_into().unwrap());
        p += 4;
        let record_header_size = u32::from_le_bytes(buf[p..p + 4].try_into().unwrap());
        p += 4;
        let index_record_offset = i64::from_le_bytes(buf[p..p + 8].try_into().unwrap());
        p += 8;
        let description_record_offset = i64::from_le_bytes(buf[p..p + 8].try_into().unwrap());
        p += 8;
        let first_user_record_offset = i64::from_le_bytes(buf[p..p + 8].try_into().unwrap());
        p += 8;
        let future2 = u64::from_le_bytes(buf[p..p + 8].try_into().unwrap());
        p += 8;
        let future3 = u64::from_le_bytes(buf[p..p + 8].try_into().unwrap());
        p += 8;
        let future4 = u64::from_le_bytes(buf[p..p + 8].try_into().unwrap());
        p += 8;
        let magic_header_3 = u32::from_le_bytes(buf[p..p + 4].try_into().unwrap());
        p += 4;
        let file_format_version = u32::from_le_bytes(buf[p..p + 4].try_into().unwrap());
        p += 4;
        let _ = p;

        let header = FileHeader {
            magic_header_1,
            magic_header_2,
            creation_id,
            file_header_size,
            record_header_size,
            index_record_offset,
            description_record_offset,
            first_user_record_offset,
            future2,
            future3,
            future4,
            magic_header_3,
            file_format_version,
        };

        if !header.looks_like_a_vrs_file() {
            return Err(VrsError::BadMagic {
                offset: 0,
                field: "file header",
                expected: MAGIC_HEADER_1,
                got: header.magic_header_1,
            });
        }
        if header.file_header_size < FILE_HEADER_SIZE
            || header.file_header_size > FILE_HEADER_SIZE + MAX_HEADER_GROWTH
        {
            return Err(VrsError::HeaderTooSmall {
                field: "fileHeaderSize",
                declared: header.file_header_size,
                minimum: FILE_HEADER_SIZE,
            });
        }
        if header.record_header_size < RECORD_HEADER_SIZE
            || header.record_header_size > RECORD_HEADER_SIZE + MAX_HEADER_GROWTH
        {
            return Err(VrsError::HeaderTooSmall {
                field: "recordHeaderSize",
                declared: header.record_header_size,
                minimum: RECORD_HEADER_SIZE,
            });
        }
        if !header.is_format_supported() {
            return Err(VrsError::UnsupportedFormatVersion {
                got: header.file_format_version,
            });
        }
        Ok(header)
    }
}

/// Closed set of record types (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[repr(u8)]
pub enum RecordType {
    Configuration = 0,
    State = 1,
    Data = 2,
    Tags = 3,
}

impl RecordType {
    pub fn name(self) -> &'static str {
        match self {
            RecordType::Configuration => "Configuration",
            RecordType::State => "State",
            RecordType::Data => "Data",
            RecordType::Tags => "Tags",
        }
    }

    pub fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(RecordType::Configuration),
            1 => Ok(RecordType::State),
            2 => Ok(RecordType::Data),
            3 => Ok(RecordType::Tags),
            other => Err(VrsError::ConfigurationError {
                reason: format!("unknown record type byte {other}"),
            }),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Configuration" => Some(RecordType::Configuration),
            "State" => Some(RecordType::State),
            "Data" => Some(RecordType::Data),
            "Tags" => Some(RecordType::Tags),
            _ => None,
        }
    }
}

/// In-memory mirror of the on-disk `RecordHeader` struct. Field order and
/// widths are frozen (spec.md §4.1/§6): `recordSize, previousRecordSize,
/// recordableTypeId, formatVersion, timestamp, instanceId, recordType,
/// compressionType, uncompressedSize`.
#[derive(Debug, Clone, Copy)]
pub struct RecordHeader {
    pub record_size: u32,
    pub previous_record_size: u32,
    pub recordable_type_id: i32,
    pub format_version: u32,
    pub timestamp: f64,
    pub instance_id: u16,
    pub record_type: u8,
    pub compression_type: u8,
    pub uncompressed_size: u32,
}

impl RecordHeader {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        record_type: RecordType,
        stream_id: StreamId,
        timestamp: f64,
        format_version: u32,
        compression_type: CompressionType,
        previous_record_size: u32,
        record_size: u32,
        uncompressed_size: u32,
    ) -> Self {
        RecordHeader {
            record_size,
            previous_record_size,
            recordable_type_id: stream_id.type_id.0 as i32,
            format_version,
            timestamp,
            instance_id: stream_id.instance_id,
            record_type: record_type as u8,
            compression_type: compression_type as u8,
            uncompressed_size,
        }
    }

    pub fn get_record_type(&self) -> Result<RecordType> {
        RecordType::from_u8(self.record_type)
    }

    pub fn get_compression_type(&self) -> Result<CompressionType> {
        CompressionType::from_u8(self.compression_type)
    }

    pub fn get_stream_id(&self) -> StreamId {
        StreamId::new(RecordableTypeId(self.recordable_type_id as u16), self.instance_id)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(RECORD_HEADER_SIZE as usize);
        out.extend_from_slice(&self.record_size.to_le_bytes());
        out.extend_from_slice(&self.previous_record_size.to_le_bytes());
        out.extend_from_slice(&self.recordable_type_id.to_le_bytes());
        out.extend_from_slice(&self.format_version.to_le_bytes());
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        out.extend_from_slice(&self.instance_id.to_le_bytes());
        out.push(self.record_type);
        out.push(self.compression_type);
        out.extend_from_slice(&self.uncompressed_size.to_le_bytes());
        debug_assert_eq!(out.len(), RECORD_HEADER_SIZE as usize);
        out
    }

    pub fn from_bytes(buf: &[u8], offset: u64) -> Result<Self> {
        if buf.len() < RECORD_HEADER_SIZE as usize {
            return Err(VrsError::UnexpectedEof { offset });
        }
        let mut p = 0usize;
        let record_size = u32::from_le_bytes(buf[p..p + 4].try_into().unwrap());
        p += 4;
        let previous_record_size = u32::from_le_bytes(buf[p..p + 4].try_into().unwrap());
        p += 4;
        let recordable_type_id = i32::from_le_bytes(buf[p..p + 4].try_into().unwrap());
        p += 4;
        let format_version = u32::from_le_bytes(buf[p..p + 4].try_into().unwrap());
        p += 4;
        let timestamp = f64::from_le_bytes(buf[p..p + 8].try_into().unwrap());
        p += 8;
        let instance_id = u16::from_le_bytes(buf[p..p + 2].try_into().unwrap());
        p += 2;
        let record_type = buf[p];
        p += 1;
        let compression_type = buf[p];
        p += 1;
        let uncompressed_size = u32::from_le_bytes(buf[p..p + 4].try_into().unwrap());
        p += 4;
        let _ = p;
        Ok(RecordHeader {
            record_size,
            previous_record_size,
            recordable_type_id,
            format_version,
            timestamp,
            instance_id,
            record_type,
            compression_type,
            uncompressed_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_header_round_trip() {
        let mut header = FileHeader::new(42, CLASSIC_FORMAT_VERSION);
        header.index_record_offset = 1000;
        header.description_record_offset = FILE_HEADER_SIZE as i64;
        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), FILE_HEADER_SIZE as usize);
        let back = FileHeader::from_bytes(&bytes).unwrap();
        assert_eq!(back.creation_id, 42);
        assert_eq!(back.index_record_offset, 1000);
        assert!(back.looks_like_a_vrs_file());
        assert!(back.is_format_supported());
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut header = FileHeader::new(1, CLASSIC_FORMAT_VERSION);
        header.magic_header_1 = 0xDEADBEEF;
        let bytes = header.to_bytes();
        assert!(FileHeader::from_bytes(&bytes).is_err());
    }

    #[test]
    fn end_of_user_records_offset_classic_without_index() {
        let header = FileHeader::new(1, CLASSIC_FORMAT_VERSION);
        assert_eq!(header.end_of_user_records_offset(5000), 5000);
    }

    #[test]
    fn end_of_user_records_offset_classic_with_index() {
        let mut header = FileHeader::new(1, CLASSIC_FORMAT_VERSION);
        header.index_record_offset = 4000;
        assert_eq!(header.end_of_user_records_offset(5000), 4000);
    }

    #[test]
    fn end_of_user_records_offset_front_index() {
        let mut header = FileHeader::new(1, FRONT_INDEX_FORMAT_VERSION);
        header.first_user_record_offset = 200;
        header.index_record_offset = 100;
        // index is before first user record -> not finalized yet
        assert_eq!(header.end_of_user_records_offset(5000), 5000);
        header.index_record_offset = 4500;
        assert_eq!(header.end_of_user_records_offset(5000), 4500);
    }

    #[test]
    fn record_header_round_trip() {
        let id = StreamId::new(RecordableTypeId(100), 1);
        let header = RecordHeader::new(
            RecordType::Data,
            id,
            1.5,
            1,
            CompressionType::Zstd,
            0,
            128,
            256,
        );
        let bytes = header.to_bytes();
        assert_eq!(bytes.len(), RECORD_HEADER_SIZE as usize);
        let back = RecordHeader::from_bytes(&bytes, 0).unwrap();
        assert_eq!(back.get_stream_id(), id);
        assert_eq!(back.timestamp, 1.5);
        assert_eq!(back.get_record_type().unwrap(), RecordType::Data);
        assert_eq!(back.get_compression_type().unwrap(), CompressionType::Zstd);
    }
}

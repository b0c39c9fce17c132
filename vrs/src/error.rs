use thiserror::Error;

use crate::stream_id::StreamId;

#[derive(Error, Debug)]
pub enum VrsError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error at file offset 0x{offset:X} ({context}): {source}")]
    IoAtOffset {
        offset: u64,
        context: &'static str,
        source: std::io::Error,
    },

    #[error("bad magic value in {field} at offset 0x{offset:X}: expected 0x{expected:08X}, got 0x{got:08X}")]
    BadMagic {
        offset: u64,
        field: &'static str,
        expected: u32,
        got: u32,
    },

    #[error("unsupported file format version 0x{got:08X}")]
    UnsupportedFormatVersion { got: u32 },

    #[error("{field} is too small: declared {declared}, need at least {minimum}")]
    HeaderTooSmall {
        field: &'static str,
        declared: u32,
        minimum: u32,
    },

    #[error("index corrupt: {reason}")]
    IndexCorrupt { reason: String },

    #[error("compression failed: {reason}")]
    CompressionFailed { reason: String },

    #[error("decompression failed: {reason}")]
    DecompressionFailed { reason: String },

    #[error("frame budget exceeded: declared {declared} bytes, max {budget} bytes")]
    FrameBudgetExceeded { declared: usize, budget: usize },

    #[error("configuration error: {reason}")]
    ConfigurationError { reason: String },

    #[error("could not parse record format descriptor {descriptor:?}: {reason}")]
    RecordFormatParse { descriptor: String, reason: String },

    #[error("content block size conflict: {reason}")]
    UnknownBlockSizeConflict { reason: String },

    #[error("stream {0} not found")]
    StreamNotFound(StreamId),

    #[error("record not found")]
    RecordNotFound,

    #[error("unexpected end of file at offset 0x{offset:X}")]
    UnexpectedEof { offset: u64 },
}

pub type Result<T> = std::result::Result<T, VrsError>;

//! Container file format and runtime for multi-stream sensor recordings.
//!
//! A VRS file interleaves records from any number of independent streams
//! (cameras, IMUs, audio, arbitrary metadata) behind a single on-disk index,
//! so a reader can dispatch records back out per-stream, in the original
//! creation order, without re-reading the whole file. [`writer::RecordFileWriter`]
//! produces files; [`reader::RecordFileReader`] and [`stream_player`] consume
//! them; [`filter`], [`copy`] and [`merge`] operate on already-written files.

pub mod compression;
pub mod content_block;
pub mod copy;
pub mod description_record;
pub mod details_cache;
pub mod error;
pub mod file_handler;
pub mod file_spec;
pub mod filter;
pub mod format;
pub mod index_record;
pub mod merge;
pub mod record;
pub mod reader;
pub mod stream;
pub mod stream_id;
pub mod stream_player;
pub mod tags;
pub mod validate;
pub mod writer;

pub use compression::{CompressionPreset, FrameCompressor};
pub use content_block::{AudioSpec, ContentBlock, DataLayout, ImageSpec, PixelFormat, RecordFormat, SampleFormat};
pub use details_cache::DetailsCache;
pub use error::{Result, VrsError};
pub use file_spec::FileSpec;
pub use format::{CompressionType, FileHeader, RecordHeader, RecordType};
pub use reader::RecordFileReader;
pub use record::{DataSource, Record, RecordManager};
pub use stream::Stream;
pub use stream_id::{RecordableTypeId, StreamId, FIRST_RECORDABLE_CLASS_ID};
pub use tags::{StreamTags, TagMap};
pub use writer::RecordFileWriter;

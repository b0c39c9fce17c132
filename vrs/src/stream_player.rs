//! StreamPlayer capability (C10), grounded in
//! `original_source/vrs/RecordFormatStreamPlayer.cpp`.
//!
//! The original type hierarchy dispatches through virtual inheritance
//! (`StreamPlayer` base, `RecordFormatStreamPlayer` subclass). Rust has no
//! equivalent, and doesn't need one: a single trait with default no-op
//! methods gives every consumer the same opt-in dispatch — implement only
//! the callbacks you care about.

use crate::content_block::{ContentBlock, DataLayout};
use crate::error::Result;
use crate::format::RecordType;
use crate::index_record::RecordInfo;

/// Per-content-block payload handed to a player, after `RecordFormat`
/// resolved block boundaries (spec.md §4.4).
pub struct Block<'a> {
    pub index: usize,
    pub content: &'a ContentBlock,
    pub bytes: &'a [u8],
}

/// Receives callbacks as a reader walks records for streams it's attached to.
/// Default implementations are no-ops, so a player only needs to override
/// the record types and block kinds it actually consumes.
pub trait StreamPlayer: Send {
    /// Called once per record before its blocks are decoded. Returning
    /// `Ok(false)` skips block decoding for this record entirely.
    #[allow(unused_variables)]
    fn process_record_header(&mut self, record: &RecordInfo, record_type: RecordType) -> Result<bool> {
        Ok(true)
    }

    /// Called once per content block, in order, after `RecordFormat`
    /// resolved sizes. If no `RecordFormat` is registered for the stream,
    /// the whole payload is delivered as a single `Custom` block.
    #[allow(unused_variables)]
    fn process_block(&mut self, record: &RecordInfo, block: &Block) -> Result<()> {
        Ok(())
    }

    /// Called for a `data_layout` block, pre-parsed via the `DataLayout`
    /// capability, if the caller supplied a parser for this (type, block).
    #[allow(unused_variables)]
    fn process_data_layout(&mut self, record: &RecordInfo, block_index: usize, json: &str) -> Result<()> {
        Ok(())
    }

    /// Called after every block of a record has been delivered.
    #[allow(unused_variables)]
    fn process_record_end(&mut self, record: &RecordInfo) -> Result<()> {
        Ok(())
    }
}

/// Convenience player that just accumulates every record it sees, for tests
/// and simple tools that don't need per-block decoding.
#[derive(Default)]
pub struct CollectingPlayer {
    pub records: Vec<(f64, RecordType, Vec<u8>)>,
}

impl StreamPlayer for CollectingPlayer {
    fn process_block(&mut self, record: &RecordInfo, block: &Block) -> Result<()> {
        if block.index == 0 {
            self.records.push((record.timestamp, record.record_type, block.bytes.to_vec()));
        } else if let Some(last) = self.records.last_mut() {
            last.2.extend_from_slice(block.bytes);
        }
        Ok(())
    }
}

/// Marker type for callers that don't want `DataLayout` decoding, only the
/// raw bytes — kept for symmetry with the capability trait; not otherwise used.
pub struct NoopDataLayout;

impl DataLayout for NoopDataLayout {
    fn to_byte_image(&self) -> Vec<u8> {
        Vec::new()
    }
    fn from_byte_image(_bytes: &[u8], _schema_json: &str) -> Result<Self> {
        Ok(NoopDataLayout)
    }
    fn schema_json(&self) -> String {
        "{}".to_string()
    }
}

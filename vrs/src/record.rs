//! Records and the per-stream RecordManager (spec.md §4.5).
//!
//! Grounded in `original_source/vrs/Record.h`/`RecordManager.h`: each stream
//! owns a `RecordManager` so producer threads rarely contend with each
//! other, only with their own stream's writer-side purge. Records are
//! recycled rather than freed where possible to keep the producer side
//! allocation-free in steady state.

use std::collections::VecDeque;

use crate::compression::CompressionPreset;
use crate::format::RecordType;

/// Over-allocation margin applied to the fast-path recycle search: a cached
/// record whose capacity is within this percentage of what's needed is
/// reused without growing its buffer.
const RECYCLE_SEARCH_MARGIN_PERCENT: usize = 20;

/// A caller-provided description of the bytes to copy into a new record
/// (spec.md §3): up to two DataLayout byte images, then up to three raw
/// chunks, concatenated in that order.
#[derive(Debug, Default, Clone)]
pub struct DataSource<'a> {
    pub data_layouts: Vec<&'a [u8]>,
    pub chunks: Vec<&'a [u8]>,
}

impl<'a> DataSource<'a> {
    pub fn new() -> Self {
        DataSource::default()
    }

    pub fn with_chunk(mut self, chunk: &'a [u8]) -> Self {
        self.chunks.push(chunk);
        self
    }

    pub fn with_data_layout(mut self, layout: &'a [u8]) -> Self {
        self.data_layouts.push(layout);
        self
    }

    pub fn total_size(&self) -> usize {
        self.data_layouts.iter().map(|b| b.len()).sum::<usize>()
            + self.chunks.iter().map(|b| b.len()).sum::<usize>()
    }

    pub fn copy_into(&self, buf: &mut Vec<u8>) {
        buf.clear();
        for layout in &self.data_layouts {
            buf.extend_from_slice(layout);
        }
        for chunk in &self.chunks {
            buf.extend_from_slice(chunk);
        }
    }
}

/// A produced record held in memory until the writer thread consumes it.
#[derive(Debug, Clone)]
pub struct Record {
    pub timestamp: f64,
    pub record_type: RecordType,
    pub format_version: u32,
    pub buffer: Vec<u8>,
    /// Per-stream monotone counter assigned at creation; breaks ties between
    /// records sharing a timestamp.
    pub creation_order: u64,
}

impl Record {
    pub fn size(&self) -> usize {
        self.buffer.len()
    }
}

fn over_allocate(requested: usize, min_bytes: usize, min_percent: usize) -> usize {
    let by_bytes = if min_bytes > 0 { requested + min_bytes } else { 0 };
    let by_percent = if min_percent > 0 {
        requested + requested * min_percent / 100
    } else {
        0
    };
    match (by_bytes, by_percent) {
        (0, 0) => requested,
        (0, p) => p,
        (b, 0) => b,
        (b, p) => b.min(p),
    }
}

/// Per-stream record manager: creation, buffer recycling, ordering, purge.
/// Mirrors `RecordManager.h`. One instance per stream; all of its state is
/// behind a single lock so cross-stream contention never happens here.
pub struct RecordManager {
    compression: CompressionPreset,
    max_cache_size: usize,
    min_bytes_over_allocation: usize,
    min_percent_over_allocation: usize,
    creation_order: u64,
    /// Records ready to be picked up by the writer, sorted by timestamp.
    active: VecDeque<Record>,
    /// Recycled buffers available for reuse, newest-first.
    cache: Vec<Record>,
}

impl Default for RecordManager {
    fn default() -> Self {
        RecordManager::new()
    }
}

impl RecordManager {
    pub fn new() -> Self {
        RecordManager {
            compression: CompressionPreset::default(),
            // spec.md §4.5's explicit default of 50 recyclable records.
            max_cache_size: 50,
            min_bytes_over_allocation: 0,
            min_percent_over_allocation: 0,
            creation_order: 0,
            active: VecDeque::new(),
            cache: Vec::new(),
        }
    }

    pub fn compression(&self) -> CompressionPreset {
        self.compression
    }

    pub fn set_compression(&mut self, preset: CompressionPreset) {
        self.compression = preset;
    }

    pub fn set_max_cache_size(&mut self, max: usize) {
        self.max_cache_size = max;
    }

    pub fn set_record_buffer_over_allocation_mins(&mut self, min_bytes: usize, min_percent: usize) {
        self.min_bytes_over_allocation = min_bytes;
        self.min_percent_over_allocation = min_percent;
    }

    pub fn get_adjusted_record_buffer_size(&self, requested_size: usize) -> usize {
        over_allocate(requested_size, self.min_bytes_over_allocation, self.min_percent_over_allocation)
    }

    pub fn current_cache_size(&self) -> usize {
        self.cache.len()
    }

    /// Create and insert a new active record, recycling a cached buffer when
    /// a suitably-sized one is available (spec.md §4.5 step 1-4).
    pub fn create_record(
        &mut self,
        timestamp: f64,
        record_type: RecordType,
        format_version: u32,
        data: &DataSource,
    ) -> u64 {
        let needed = data.total_size();
        let mut buffer = self.take_recyclable_buffer(needed).unwrap_or_default();

        self.creation_order += 1;
        let creation_order = self.creation_order;

        let target_capacity = self.get_adjusted_record_buffer_size(needed);
        if buffer.capacity() < needed {
            buffer.reserve(target_capacity - buffer.len().min(target_capacity));
        }
        data.copy_into(&mut buffer);

        let record = Record {
            timestamp,
            record_type,
            format_version,
            buffer,
            creation_order,
        };
        self.insert_sorted(record);
        creation_order
    }

    fn take_recyclable_buffer(&mut self, needed: usize) -> Option<Vec<u8>> {
        let margin = needed + needed * RECYCLE_SEARCH_MARGIN_PERCENT / 100;
        let pos = self
            .cache
            .iter()
            .rposition(|r| r.buffer.capacity() >= needed && r.buffer.capacity() <= margin.max(needed));
        if let Some(pos) = pos {
            return Some(self.cache.remove(pos).buffer);
        }
        if self.cache.len() >= self.max_cache_size {
            return self.cache.pop().map(|r| {
                let mut buf = r.buffer;
                buf.clear();
                buf
            });
        }
        None
    }

    fn insert_sorted(&mut self, record: Record) {
        match self.active.back() {
            Some(last) if last.timestamp <= record.timestamp => self.active.push_back(record),
            None => self.active.push_back(record),
            _ => {
                let pos = self
                    .active
                    .iter()
                    .rposition(|r| r.timestamp <= record.timestamp)
                    .map(|i| i + 1)
                    .unwrap_or(0);
                self.active.insert(pos, record);
            }
        }
    }

    /// Discard active records older than `cutoff`, retaining the most recent
    /// Configuration and State records plus every Tags record.
    pub fn purge_old_records(&mut self, cutoff: f64, recycle: bool) -> u32 {
        let last_config = self
            .active
            .iter()
            .rposition(|r| r.record_type == RecordType::Configuration);
        let last_state = self.active.iter().rposition(|r| r.record_type == RecordType::State);

        let mut purged = 0u32;
        let mut keep = VecDeque::new();
        for (i, record) in self.active.drain(..).enumerate() {
            let keep_record = record.timestamp >= cutoff
                || record.record_type == RecordType::Tags
                || Some(i) == last_config
                || Some(i) == last_state;
            if keep_record {
                keep.push_back(record);
            } else {
                purged += 1;
                if recycle && self.cache.len() < self.max_cache_size {
                    self.cache.push(record);
                }
            }
        }
        self.active = keep;
        purged
    }

    pub fn purge_cache(&mut self) {
        self.cache.clear();
    }

    /// Splice out every active record older than `max_age`, in order.
    pub fn collect_old_records(&mut self, max_age: f64) -> Vec<Record> {
        let split = self.active.iter().position(|r| r.timestamp >= max_age).unwrap_or(self.active.len());
        self.active.drain(..split).collect()
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn pop_front(&mut self) -> Option<Record> {
        self.active.pop_front()
    }
}

//! RecordFileReader (spec.md §4.9), grounded in
//! `original_source/vrs/RecordFileReader.h`.
//!
//! Opening a file reads the header, the description record (file + stream
//! tags), then the index — from its on-disk location if the file has one,
//! or by a linear scan of every record header if it doesn't (a crashed or
//! truncated write leaves no index behind). Reading dispatches each record
//! to whatever `StreamPlayer` is attached to its stream, decoding content
//! blocks via the stream's registered `RecordFormat` if one was found in its
//! tags.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use crate::compression;
use crate::content_block::ContentBlock;
use crate::description_record::{Description, DESCRIPTION_STREAM_ID};
use crate::error::{Result, VrsError};
use crate::file_handler::{DiskFileHandler, FileHandler};
use crate::file_spec::FileSpec;
use crate::format::{CompressionType, FileHeader, RecordHeader, RecordType};
use crate::index_record::{self, DiskRecordInfo, RecordInfo};
use crate::stream::Stream;
use crate::stream_id::{RecordableTypeId, StreamId};
use crate::stream_player::{Block, StreamPlayer};
use crate::tags::{StreamTags, TagMap};

pub struct RecordFileReader {
    file: DiskFileHandler,
    header: FileHeader,
    file_tags: TagMap,
    streams: BTreeMap<StreamId, Stream>,
    index: Vec<RecordInfo>,
    stream_index: HashMap<StreamId, Vec<usize>>,
    players: HashMap<StreamId, Box<dyn StreamPlayer>>,
    has_index: bool,
}

impl RecordFileReader {
    /// Cheap check: does this look like a VRS file, without fully opening it.
    pub fn is_vrs_file(path: impl AsRef<Path>) -> bool {
        let Ok(mut handler) = DiskFileHandler::open_read(path) else {
            return false;
        };
        let mut buf = vec![0u8; crate::format::FILE_HEADER_SIZE as usize];
        if handler.read_at(0, &mut buf).is_err() {
            return false;
        }
        FileHeader::from_bytes(&buf).is_ok()
    }

    /// Open a file named by any of the three `FileSpec` forms spec.md §6
    /// accepts (plain path, `"scheme:details?..."` URI, or JSON object).
    pub fn open_file_spec(spec: &str) -> Result<Self> {
        let spec = FileSpec::parse(spec)?;
        Self::open_file(spec.resolve_local_path()?)
    }

    pub fn open_file(path: impl AsRef<Path>) -> Result<Self> {
        let mut file = DiskFileHandler::open_read(path)?;
        let mut header_bytes = vec![0u8; crate::format::FILE_HEADER_SIZE as usize];
        file.read_at(0, &mut header_bytes)?;
        let header = FileHeader::from_bytes(&header_bytes)?;

        let description = read_description_record(&mut file, &header)?;

        let mut streams = BTreeMap::new();
        for (id, tags) in &description.streams {
            let mut stream = Stream::new(*id);
            stream.tags = tags.clone();
            stream.reparse_formats_from_tags()?;
            streams.insert(*id, stream);
        }

        let file_size = file.size()?;
        let mut has_index = false;
        let mut disk_entries: Vec<DiskRecordInfo> = Vec::new();
        if header.index_record_offset > 0 && (header.index_record_offset as u64) < file_size {
            match read_index_record(&mut file, &header) {
                Ok(entries) => {
                    disk_entries = entries;
                    has_index = true;
                }
                Err(err) => {
                    log::warn!("stored index unreadable ({err}), rebuilding by linear scan");
                }
            }
        }

        let index = if has_index {
            index_record::reconstruct_offsets(&disk_entries, header.first_user_record_offset)
        } else {
            log::info!("no on-disk index found, rebuilding by scanning every record header");
            rebuild_index_by_scan(&mut file, &header, file_size)?
        };

        let mut stream_index: HashMap<StreamId, Vec<usize>> = HashMap::new();
        for (i, entry) in index.iter().enumerate() {
            stream_index.entry(entry.stream_id).or_default().push(i);
        }
        for ids in stream_index.values_mut() {
            ids.sort_by(|a, b| index[*a].timestamp.partial_cmp(&index[*b].timestamp).unwrap());
        }

        Ok(RecordFileReader {
            file,
            header,
            file_tags: description.file_tags,
            streams,
            index,
            stream_index,
            players: HashMap::new(),
            has_index,
        })
    }

    pub fn has_index(&self) -> bool {
        self.has_index
    }

    pub fn get_streams(&self) -> BTreeSet<StreamId> {
        self.streams.keys().copied().collect()
    }

    pub fn get_streams_for_type(&self, type_id: RecordableTypeId) -> Vec<StreamId> {
        self.streams.keys().filter(|id| id.type_id == type_id).copied().collect()
    }

    pub fn get_file_tags(&self) -> &TagMap {
        &self.file_tags
    }

    pub fn get_stream_tags(&self, id: StreamId) -> Option<&StreamTags> {
        self.streams.get(&id).map(|s| &s.tags)
    }

    pub fn get_index(&self) -> &[RecordInfo] {
        &self.index
    }

    pub fn get_index_for_stream(&self, id: StreamId) -> Vec<&RecordInfo> {
        self.stream_index
            .get(&id)
            .map(|indices| indices.iter().map(|&i| &self.index[i]).collect())
            .unwrap_or_default()
    }

    pub fn get_record_count(&self, id: StreamId) -> usize {
        self.stream_index.get(&id).map(|v| v.len()).unwrap_or(0)
    }

    pub fn get_record(&self, id: StreamId, index_number: usize) -> Option<&RecordInfo> {
        self.stream_index.get(&id).and_then(|v| v.get(index_number)).map(|&i| &self.index[i])
    }

    /// First record of `id` at or after `timestamp`.
    pub fn get_record_by_time(&self, id: StreamId, timestamp: f64) -> Option<&RecordInfo> {
        let indices = self.stream_index.get(&id)?;
        let pos = indices.partition_point(|&i| self.index[i].timestamp < timestamp);
        indices.get(pos).map(|&i| &self.index[i])
    }

    pub fn set_stream_player(&mut self, id: StreamId, player: Box<dyn StreamPlayer>) {
        self.players.insert(id, player);
    }

    pub fn clear_stream_players(&mut self) {
        self.players.clear();
    }

    /// Read one record, decoding and dispatching its content blocks to
    /// whatever player is attached to its stream (a no-op if none is).
    pub fn read_record(&mut self, record: &RecordInfo) -> Result<()> {
        if !self.players.contains_key(&record.stream_id) {
            return Ok(());
        }

        let mut header_bytes = vec![0u8; crate::format::RECORD_HEADER_SIZE as usize];
        self.file.read_at(record.file_offset as u64, &mut header_bytes)?;
        let header = RecordHeader::from_bytes(&header_bytes, record.file_offset as u64)?;

        let payload_len = payload_len(&header, record.file_offset as u64)?;
        let mut payload = vec![0u8; payload_len];
        self.file.read_at(
            record.file_offset as u64 + crate::format::RECORD_HEADER_SIZE as u64,
            &mut payload,
        )?;

        let compression_type = header.get_compression_type()?;
        let decoded = if compression_type == CompressionType::None {
            payload
        } else {
            compression::decompress(&payload, compression_type, header.uncompressed_size as usize)?
        };

        let format = self
            .streams
            .get(&record.stream_id)
            .and_then(|s| s.get_record_format(record.record_type, header.format_version))
            .cloned();

        let player = self.players.get_mut(&record.stream_id).unwrap();
        if !player.process_record_header(record, record.record_type)? {
            return Ok(());
        }

        match format {
            Some(format) => {
                let sizes = format.resolve_sizes(decoded.len() as u32)?;
                let mut offset = 0usize;
                for (i, (block, size)) in format.blocks.iter().zip(sizes).enumerate() {
                    let size = size as usize;
                    let bytes = &decoded[offset..offset + size];
                    player.process_block(record, &Block { index: i, content: block, bytes })?;
                    offset += size;
                }
            }
            None => {
                let whole = ContentBlock::Custom { format: None };
                player.process_block(record, &Block { index: 0, content: &whole, bytes: &decoded })?;
            }
        }

        player.process_record_end(record)
    }

    /// Read every record in the file in timestamp order.
    pub fn read_all_records(&mut self) -> Result<()> {
        for i in 0..self.index.len() {
            let record = self.index[i];
            self.read_record(&record)?;
        }
        Ok(())
    }

    /// Raw on-disk bytes of a record, header included, compression untouched.
    /// Used by byte-preserving copy (spec.md §4.11), which must not alter a
    /// kept record's bytes at all.
    pub fn read_raw_record_bytes(&mut self, record: &RecordInfo) -> Result<Vec<u8>> {
        let mut header_bytes = vec![0u8; crate::format::RECORD_HEADER_SIZE as usize];
        self.file.read_at(record.file_offset as u64, &mut header_bytes)?;
        let header = RecordHeader::from_bytes(&header_bytes, record.file_offset as u64)?;
        let mut out = vec![0u8; header.record_size as usize];
        self.file.read_at(record.file_offset as u64, &mut out)?;
        Ok(out)
    }

    pub fn file_tags_for_streams(&self, streams: &BTreeSet<StreamId>) -> BTreeMap<StreamId, StreamTags> {
        self.streams
            .iter()
            .filter(|(id, _)| streams.contains(id))
            .map(|(id, s)| (*id, s.tags.clone()))
            .collect()
    }
}

/// `record_header.record_size - RECORD_HEADER_SIZE`, checked: a corrupt or
/// truncated file can declare a `record_size` smaller than a bare header,
/// which would otherwise underflow this subtraction.
fn payload_len(record_header: &RecordHeader, offset: u64) -> Result<usize> {
    (record_header.record_size as usize)
        .checked_sub(crate::format::RECORD_HEADER_SIZE as usize)
        .ok_or_else(|| VrsError::IndexCorrupt {
            reason: format!(
                "record at offset 0x{offset:X} declares size {} smaller than the {}-byte record header",
                record_header.record_size,
                crate::format::RECORD_HEADER_SIZE
            ),
        })
}

fn read_description_record(file: &mut DiskFileHandler, header: &FileHeader) -> Result<Description> {
    if header.description_record_offset <= 0 {
        return Ok(Description::default());
    }
    let offset = header.description_record_offset as u64;
    let mut header_bytes = vec![0u8; crate::format::RECORD_HEADER_SIZE as usize];
    file.read_at(offset, &mut header_bytes)?;
    let record_header = RecordHeader::from_bytes(&header_bytes, offset)?;
    let payload_len = payload_len(&record_header, offset)?;
    let mut payload = vec![0u8; payload_len];
    file.read_at(offset + crate::format::RECORD_HEADER_SIZE as u64, &mut payload)?;
    Description::from_bytes(&payload)
}

fn read_index_record(file: &mut DiskFileHandler, header: &FileHeader) -> Result<Vec<DiskRecordInfo>> {
    let offset = header.index_record_offset as u64;
    let mut header_bytes = vec![0u8; crate::format::RECORD_HEADER_SIZE as usize];
    file.read_at(offset, &mut header_bytes)?;
    let record_header = RecordHeader::from_bytes(&header_bytes, offset)?;
    let payload_len = payload_len(&record_header, offset)?;
    let mut payload = vec![0u8; payload_len];
    file.read_at(offset + crate::format::RECORD_HEADER_SIZE as u64, &mut payload)?;
    let (_stream_ids, entries) = index_record::parse_classic_payload(&payload)?;
    Ok(entries)
}

/// Scan every record header from `first_user_record_offset` to the end of
/// user records, reconstructing an index without relying on any stored one.
fn rebuild_index_by_scan(
    file: &mut DiskFileHandler,
    header: &FileHeader,
    file_size: u64,
) -> Result<Vec<RecordInfo>> {
    let end = header.end_of_user_records_offset(file_size as i64).max(0) as u64;
    let mut offset = header.first_user_record_offset.max(0) as u64;
    let mut out = Vec::new();
    while offset + crate::format::RECORD_HEADER_SIZE as u64 <= end {
        let mut header_bytes = vec![0u8; crate::format::RECORD_HEADER_SIZE as usize];
        file.read_at(offset, &mut header_bytes)?;
        let record_header = match RecordHeader::from_bytes(&header_bytes, offset) {
            Ok(h) => h,
            Err(_) => break,
        };
        let stream_id = record_header.get_stream_id();
        if stream_id == DESCRIPTION_STREAM_ID {
            offset += record_header.record_size as u64;
            continue;
        }
        let record_type = record_header.get_record_type().unwrap_or(RecordType::Data);
        out.push(RecordInfo {
            timestamp: record_header.timestamp,
            file_offset: offset as i64,
            stream_id,
            record_type,
        });
        if record_header.record_size == 0 {
            return Err(VrsError::IndexCorrupt {
                reason: "zero-size record encountered during index rebuild".into(),
            });
        }
        offset += record_header.record_size as u64;
    }
    out.sort();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DataSource;
    use crate::stream_id::RecordableTypeId;
    use crate::stream_player::CollectingPlayer;
    use crate::writer::RecordFileWriter;

    fn sid(n: u16) -> StreamId {
        StreamId::new(RecordableTypeId(100), n)
    }

    #[test]
    fn open_file_reads_back_tags_and_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("read.vrs");

        let mut writer = RecordFileWriter::new();
        writer.set_tag("captured_by", "test-rig").unwrap();
        writer.add_recordable(sid(1)).unwrap();
        writer.create_file(&path).unwrap();
        let data = DataSource::new().with_chunk(b"payload-one");
        writer.create_record(sid(1), 1.0, RecordType::Data, 1, &data).unwrap();
        writer.create_record(sid(1), 2.0, RecordType::Data, 1, &data).unwrap();
        writer.close_file().unwrap();

        let reader = RecordFileReader::open_file(&path).unwrap();
        assert!(reader.has_index());
        assert_eq!(reader.get_streams().len(), 1);
        assert_eq!(reader.get_file_tags().get("captured_by"), Some(&"test-rig".to_string()));
        assert_eq!(reader.get_record_count(sid(1)), 2);
    }

    #[test]
    fn read_all_records_dispatches_to_player() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dispatch.vrs");

        let mut writer = RecordFileWriter::new();
        writer.add_recordable(sid(1)).unwrap();
        writer.create_file(&path).unwrap();
        let data = DataSource::new().with_chunk(b"hello");
        writer.create_record(sid(1), 1.0, RecordType::Data, 1, &data).unwrap();
        writer.close_file().unwrap();

        let mut reader = RecordFileReader::open_file(&path).unwrap();
        reader.set_stream_player(sid(1), Box::new(CollectingPlayer::default()));
        reader.read_all_records().unwrap();
    }

    #[test]
    fn is_vrs_file_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-vrs.bin");
        std::fs::write(&path, b"definitely not a vrs file, too short").unwrap();
        assert!(!RecordFileReader::is_vrs_file(&path));
    }
}

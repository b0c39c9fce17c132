//! Cross-file merge (spec.md §4.11): combine several VRS files' streams into
//! one. Streams keep their id unless two source files used the same one, in
//! which case the later file's stream is renumbered; file tags that
//! conflict across sources are renamed rather than silently overwritten.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use crate::error::Result;
use crate::reader::RecordFileReader;
use crate::record::DataSource;
use crate::stream_id::StreamId;
use crate::writer::RecordFileWriter;

/// Merge `sources` into a single file at `dst`. Returns the total number of
/// records written.
pub fn merge_files(sources: &mut [RecordFileReader], dst: impl AsRef<Path>) -> Result<usize> {
    let mut writer = RecordFileWriter::new();
    let mut used_ids: BTreeSet<StreamId> = BTreeSet::new();
    let mut remaps: Vec<HashMap<StreamId, StreamId>> = Vec::with_capacity(sources.len());
    let mut file_tags: std::collections::BTreeMap<String, String> = std::collections::BTreeMap::new();

    for (source_index, source) in sources.iter().enumerate() {
        for (key, value) in source.get_file_tags() {
            insert_without_clobbering(&mut file_tags, key, value, source_index);
        }

        let mut remap = HashMap::new();
        for id in source.get_streams() {
            let final_id = if used_ids.contains(&id) {
                let renumbered = next_free_instance(&used_ids, id);
                log::warn!("stream {id} collides across merged files, renumbered to {renumbered}");
                renumbered
            } else {
                id
            };
            used_ids.insert(final_id);
            remap.insert(id, final_id);
            writer.add_recordable(final_id)?;
        }
        remaps.push(remap);
    }

    for (key, value) in &file_tags {
        writer.set_tag(key.clone(), value.clone())?;
    }
    writer.create_file(dst)?;

    let mut total = 0usize;
    for (source, remap) in sources.iter_mut().zip(remaps.iter()) {
        let index: Vec<_> = source.get_index().to_vec();
        for record in &index {
            let raw = source.read_raw_record_bytes(record)?;
            let header = crate::format::RecordHeader::from_bytes(&raw, record.file_offset as u64)?;
            let compression = header.get_compression_type()?;
            let payload = &raw[crate::format::RECORD_HEADER_SIZE as usize..];
            let decoded = if compression == crate::format::CompressionType::None {
                payload.to_vec()
            } else {
                crate::compression::decompress(payload, compression, header.uncompressed_size as usize)?
            };
            let final_id = remap[&record.stream_id];
            let data = DataSource::new().with_chunk(&decoded);
            writer.create_record(final_id, record.timestamp, record.record_type, header.format_version, &data)?;
            total += 1;
        }
    }
    writer.close_file()?;
    Ok(total)
}

fn insert_without_clobbering(
    tags: &mut std::collections::BTreeMap<String, String>,
    key: &str,
    value: &str,
    source_index: usize,
) {
    match tags.get(key) {
        None => {
            tags.insert(key.to_string(), value.to_string());
        }
        Some(existing) if existing == value => {}
        Some(_) => {
            tags.insert(format!("{key}#{source_index}"), value.to_string());
        }
    }
}

fn next_free_instance(used: &BTreeSet<StreamId>, id: StreamId) -> StreamId {
    let mut candidate = id.instance_id;
    loop {
        candidate += 1;
        let attempt = StreamId::new(id.type_id, candidate);
        if !used.contains(&attempt) {
            return attempt;
        }
    }
}

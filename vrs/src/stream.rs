//! A registered stream: identity, tags, RecordFormat table, and its
//! RecordManager (spec.md §3).

use std::collections::HashMap;

use crate::content_block::{
    data_layout_tag_name, parse_record_format, parse_record_format_tag_name, record_format_tag_name,
    ParsedTagName, RecordFormat,
};
use crate::error::{Result, VrsError};
use crate::format::RecordType;
use crate::record::RecordManager;
use crate::stream_id::StreamId;
use crate::tags::StreamTags;

/// A stream attached to a writer or discovered in a reader's description.
pub struct Stream {
    pub id: StreamId,
    pub tags: StreamTags,
    pub manager: RecordManager,
    record_formats: HashMap<(RecordType, u32), RecordFormat>,
    data_layouts: HashMap<(RecordType, u32, usize), String>,
}

impl Stream {
    pub fn new(id: StreamId) -> Self {
        Stream {
            id,
            tags: StreamTags::new(),
            manager: RecordManager::new(),
            record_formats: HashMap::new(),
            data_layouts: HashMap::new(),
        }
    }

    /// Register a RecordFormat and its data_layout schemas for (type, version)
    /// in this stream's internal tags, verifying every `data_layout` block has
    /// a matching schema and vice versa (spec.md §4.4).
    pub fn add_record_format(
        &mut self,
        record_type: RecordType,
        version: u32,
        format: RecordFormat,
        layouts: Vec<String>,
    ) -> Result<()> {
        let data_layout_count = format
            .blocks
            .iter()
            .filter(|b| matches!(b, crate::content_block::ContentBlock::DataLayout))
            .count();
        if data_layout_count != layouts.len() {
            return Err(VrsError::ConfigurationError {
                reason: format!(
                    "RecordFormat for ({}, {version}) declares {data_layout_count} data_layout block(s) but {} schema(s) were provided",
                    record_type.name(),
                    layouts.len()
                ),
            });
        }

        self.tags.vrs.insert(
            record_format_tag_name(record_type.name(), version),
            format.to_string(),
        );
        let mut block_index = 0usize;
        for block in &format.blocks {
            if matches!(block, crate::content_block::ContentBlock::DataLayout) {
                let schema = layouts[block_index].clone();
                self.tags
                    .vrs
                    .insert(data_layout_tag_name(record_type.name(), version, block_index), schema.clone());
                self.data_layouts.insert((record_type, version, block_index), schema);
                block_index += 1;
            }
        }
        self.record_formats.insert((record_type, version), format);
        Ok(())
    }

    pub fn get_record_format(&self, record_type: RecordType, version: u32) -> Option<&RecordFormat> {
        self.record_formats.get(&(record_type, version))
    }

    pub fn get_data_layout(&self, record_type: RecordType, version: u32, block_index: usize) -> Option<&str> {
        self.data_layouts
            .get(&(record_type, version, block_index))
            .map(|s| s.as_str())
    }

    /// Rebuild `record_formats`/`data_layouts` from a stream's internal tags,
    /// as done when opening an existing file (spec.md §4.9).
    pub fn reparse_formats_from_tags(&mut self) -> Result<()> {
        self.record_formats.clear();
        self.data_layouts.clear();
        let entries: Vec<(String, String)> = self
            .tags
            .vrs
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (key, value) in &entries {
            if let Some(parsed) = parse_record_format_tag_name(key) {
                match parsed {
                    ParsedTagName::RecordFormat { record_type, format_version } => {
                        let record_type = RecordType::from_name(&record_type).ok_or_else(|| {
                            VrsError::ConfigurationError {
                                reason: format!("unknown record type name {record_type:?} in tag {key:?}"),
                            }
                        })?;
                        let format = parse_record_format(value)?;
                        self.record_formats.insert((record_type, format_version), format);
                    }
                    ParsedTagName::DataLayout { record_type, format_version, block_index } => {
                        let record_type = RecordType::from_name(&record_type).ok_or_else(|| {
                            VrsError::ConfigurationError {
                                reason: format!("unknown record type name {record_type:?} in tag {key:?}"),
                            }
                        })?;
                        self.data_layouts
                            .insert((record_type, format_version, block_index), value.clone());
                    }
                }
            }
        }
        // Validate pairing, mirroring add_record_format's check.
        for ((record_type, version), format) in &self.record_formats {
            let expected = format
                .blocks
                .iter()
                .filter(|b| matches!(b, crate::content_block::ContentBlock::DataLayout))
                .count();
            let actual = (0..expected)
                .filter(|i| self.data_layouts.contains_key(&(*record_type, *version, *i)))
                .count();
            if actual != expected {
                return Err(VrsError::ConfigurationError {
                    reason: format!(
                        "stream {} RecordFormat ({}, {version}) expects {expected} data_layout schema(s), found {actual}",
                        self.id,
                        record_type.name()
                    ),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content_block::{parse_record_format, ContentBlock};
    use crate::stream_id::RecordableTypeId;

    fn id() -> StreamId {
        StreamId::new(RecordableTypeId(100), 1)
    }

    #[test]
    fn add_record_format_requires_matching_layout_count() {
        let mut stream = Stream::new(id());
        let format = parse_record_format("data_layout+image/640x480/pixel=grey8/stride=640").unwrap();
        assert!(stream.add_record_format(RecordType::Data, 1, format.clone(), vec![]).is_err());
        assert!(stream
            .add_record_format(RecordType::Data, 1, format, vec!["{}".to_string()])
            .is_ok());
    }

    #[test]
    fn reparse_from_tags_round_trips() {
        let mut stream = Stream::new(id());
        let format = parse_record_format("data_layout").unwrap();
        stream
            .add_record_format(RecordType::Configuration, 1, format, vec!["{\"fields\":[]}".to_string()])
            .unwrap();

        let mut reopened = Stream::new(id());
        reopened.tags = stream.tags.clone();
        reopened.reparse_formats_from_tags().unwrap();
        let fmt = reopened.get_record_format(RecordType::Configuration, 1).unwrap();
        assert_eq!(fmt.blocks, vec![ContentBlock::DataLayout]);
        assert_eq!(
            reopened.get_data_layout(RecordType::Configuration, 1, 0),
            Some("{\"fields\":[]}")
        );
    }
}

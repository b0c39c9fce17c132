//! DescriptionRecord (spec.md §4.7): file tags plus every stream's id and
//! tag maps, written once right after the file header.

use std::collections::BTreeMap;

use crate::error::{Result, VrsError};
use crate::stream_id::{RecordableTypeId, StreamId};
use crate::tags::{decode_tag_map, encode_tag_map, StreamTags, TagMap};

/// Reserved stream id used for the description record itself — it isn't a
/// real producer, so its type id lives outside the recordable-class range.
pub const DESCRIPTION_STREAM_ID: StreamId = StreamId {
    type_id: RecordableTypeId(0),
    instance_id: 0,
};

#[derive(Debug, Clone, Default)]
pub struct Description {
    pub file_tags: TagMap,
    pub streams: BTreeMap<StreamId, StreamTags>,
}

impl Description {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&encode_tag_map(&self.file_tags));
        out.extend_from_slice(&(self.streams.len() as u32).to_le_bytes());
        for (id, tags) in &self.streams {
            out.extend_from_slice(&(id.type_id.0 as i32).to_le_bytes());
            out.extend_from_slice(&id.instance_id.to_le_bytes());
            out.extend_from_slice(&encode_tag_map(&tags.user));
            out.extend_from_slice(&encode_tag_map(&tags.vrs));
        }
        out
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        let mut pos = 0usize;
        let (file_tags, consumed) = decode_tag_map(buf).ok_or_else(|| VrsError::IndexCorrupt {
            reason: "truncated description record (file tags)".into(),
        })?;
        pos += consumed;

        let stream_count = u32::from_le_bytes(
            buf.get(pos..pos + 4)
                .ok_or_else(|| VrsError::IndexCorrupt { reason: "truncated description record".into() })?
                .try_into()
                .unwrap(),
        );
        pos += 4;

        let mut streams = BTreeMap::new();
        for _ in 0..stream_count {
            let type_id = i32::from_le_bytes(
                buf.get(pos..pos + 4)
                    .ok_or_else(|| VrsError::IndexCorrupt { reason: "truncated stream entry".into() })?
                    .try_into()
                    .unwrap(),
            );
            pos += 4;
            let instance_id = u16::from_le_bytes(
                buf.get(pos..pos + 2)
                    .ok_or_else(|| VrsError::IndexCorrupt { reason: "truncated stream entry".into() })?
                    .try_into()
                    .unwrap(),
            );
            pos += 2;
            let id = StreamId::new(RecordableTypeId(type_id as u16), instance_id);

            let (user, consumed) = decode_tag_map(&buf[pos..]).ok_or_else(|| VrsError::IndexCorrupt {
                reason: "truncated user tag map".into(),
            })?;
            pos += consumed;
            let (vrs, consumed) = decode_tag_map(&buf[pos..]).ok_or_else(|| VrsError::IndexCorrupt {
                reason: "truncated vrs tag map".into(),
            })?;
            pos += consumed;

            streams.insert(id, StreamTags { user, vrs });
        }

        Ok(Description { file_tags, streams })
    }
}

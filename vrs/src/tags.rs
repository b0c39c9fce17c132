//! Tag maps: file-level tags and per-stream user/internal tag maps.
//!
//! Grounded in spec.md §3/§6: a stream carries two string maps, user-visible
//! and internal ("vrs") tags. Internal tags reuse two reserved key prefixes
//! to persist RecordFormat descriptors and DataLayout JSON schemas, defined
//! in [`crate::content_block`].

use std::collections::BTreeMap;

/// An ordered string/string map, serialized with length-prefixed UTF-8
/// (spec.md §4.7). `BTreeMap` gives deterministic iteration order for free.
pub type TagMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub struct StreamTags {
    pub user: TagMap,
    pub vrs: TagMap,
}

impl StreamTags {
    pub fn new() -> Self {
        StreamTags::default()
    }
}

/// Encode a tag map as length-prefixed UTF-8 pairs: for each entry,
/// `u32 key_len, key bytes, u32 value_len, value bytes`.
pub fn encode_tag_map(map: &TagMap) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&(map.len() as u32).to_le_bytes());
    for (key, value) in map {
        out.extend_from_slice(&(key.len() as u32).to_le_bytes());
        out.extend_from_slice(key.as_bytes());
        out.extend_from_slice(&(value.len() as u32).to_le_bytes());
        out.extend_from_slice(value.as_bytes());
    }
    out
}

pub fn decode_tag_map(buf: &[u8]) -> Option<(TagMap, usize)> {
    let mut pos = 0usize;
    let count = u32::from_le_bytes(buf.get(pos..pos + 4)?.try_into().ok()?);
    pos += 4;
    let mut map = TagMap::new();
    for _ in 0..count {
        let key_len = u32::from_le_bytes(buf.get(pos..pos + 4)?.try_into().ok()?) as usize;
        pos += 4;
        let key = String::from_utf8(buf.get(pos..pos + key_len)?.to_vec()).ok()?;
        pos += key_len;
        let value_len = u32::from_le_bytes(buf.get(pos..pos + 4)?.try_into().ok()?) as usize;
        pos += 4;
        let value = String::from_utf8(buf.get(pos..pos + value_len)?.to_vec()).ok()?;
        pos += value_len;
        map.insert(key, value);
    }
    Some((map, pos))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_map_round_trip() {
        let mut map = TagMap::new();
        map.insert("device".to_string(), "camera-1".to_string());
        map.insert("RF:Data:1".to_string(), "image/640x480/pixel=grey8/stride=640".to_string());
        let encoded = encode_tag_map(&map);
        let (decoded, consumed) = decode_tag_map(&encoded).unwrap();
        assert_eq!(consumed, encoded.len());
        assert_eq!(decoded, map);
    }

    #[test]
    fn empty_map_round_trips() {
        let map = TagMap::new();
        let encoded = encode_tag_map(&map);
        let (decoded, _) = decode_tag_map(&encoded).unwrap();
        assert!(decoded.is_empty());
    }
}

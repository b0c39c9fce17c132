//! Stream identity: a (recordable type id, instance id) pair.
//!
//! Grounded in `original_source/vrs/StreamId.h`: a recordable type id is a
//! 16-bit enumerated value; a reserved range is used for generic
//! "recordable classes" disambiguated at runtime by a textual flavor tag
//! stored on the stream. Instance ids are assigned by the writer when a
//! stream is registered and are not stable across runs.

use std::fmt;

/// Start of the "recordable class" range: generic streams sharing a type id
/// and disambiguated by a flavor string in the stream's tags.
pub const FIRST_RECORDABLE_CLASS_ID: u16 = 60000;

/// Recordable type id. A 16-bit enumerated value; values at or above
/// [`FIRST_RECORDABLE_CLASS_ID`] denote a generic recordable class that
/// must be paired with a "flavor" tag to identify the specialized stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub struct RecordableTypeId(pub u16);

impl RecordableTypeId {
    pub const UNDEFINED: RecordableTypeId = RecordableTypeId(0);

    pub fn is_recordable_class(self) -> bool {
        self.0 >= FIRST_RECORDABLE_CLASS_ID
    }
}

impl fmt::Display for RecordableTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a stream within a file: (typeId, instanceId).
///
/// String form is `"typeId-instanceId"`, matching spec.md §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub struct StreamId {
    pub type_id: RecordableTypeId,
    pub instance_id: u16,
}

impl StreamId {
    pub fn new(type_id: RecordableTypeId, instance_id: u16) -> Self {
        StreamId { type_id, instance_id }
    }

    pub fn is_recordable_class(self) -> bool {
        self.type_id.is_recordable_class()
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.type_id.0, self.instance_id)
    }
}

impl std::str::FromStr for StreamId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (type_part, instance_part) = s
            .split_once('-')
            .ok_or_else(|| format!("invalid stream id {s:?}: expected \"type-instance\""))?;
        let type_id: u16 = type_part
            .parse()
            .map_err(|_| format!("invalid type id in stream id {s:?}"))?;
        let instance_id: u16 = instance_part
            .parse()
            .map_err(|_| format!("invalid instance id in stream id {s:?}"))?;
        Ok(StreamId::new(RecordableTypeId(type_id), instance_id))
    }
}

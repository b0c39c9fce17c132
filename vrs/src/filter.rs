//! Record filtering (spec.md §4.11): restrict a read or copy operation to a
//! subset of streams, record types, and/or a time range.
//!
//! Grounded in spec.md's description of `copyOptions`/`filterOptions`: a
//! time-ranged copy still needs each stream's most recent Configuration and
//! State record before the range starts, so a reader dropped into the
//! middle of a file can still make sense of the Data records that follow.

use std::collections::BTreeSet;

use crate::format::RecordType;
use crate::index_record::RecordInfo;
use crate::stream_id::StreamId;

#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub streams: Option<BTreeSet<StreamId>>,
    pub record_types: Option<BTreeSet<RecordType>>,
    pub min_timestamp: Option<f64>,
    pub max_timestamp: Option<f64>,
    /// Carry each kept stream's latest Configuration/State record from before
    /// `min_timestamp`, even though it falls outside the time range.
    pub preroll_configuration_and_state: bool,
}

impl RecordFilter {
    pub fn new() -> Self {
        RecordFilter::default()
    }

    pub fn with_streams(mut self, streams: impl IntoIterator<Item = StreamId>) -> Self {
        self.streams = Some(streams.into_iter().collect());
        self
    }

    pub fn with_record_types(mut self, types: impl IntoIterator<Item = RecordType>) -> Self {
        self.record_types = Some(types.into_iter().collect());
        self
    }

    pub fn with_time_range(mut self, min: f64, max: f64) -> Self {
        self.min_timestamp = Some(min);
        self.max_timestamp = Some(max);
        self
    }

    fn passes_stream(&self, id: StreamId) -> bool {
        self.streams.as_ref().map_or(true, |s| s.contains(&id))
    }

    fn passes_type(&self, record_type: RecordType) -> bool {
        self.record_types.as_ref().map_or(true, |t| t.contains(&record_type))
    }

    fn in_time_range(&self, timestamp: f64) -> bool {
        self.min_timestamp.map_or(true, |min| timestamp >= min) && self.max_timestamp.map_or(true, |max| timestamp <= max)
    }

    /// Apply this filter to a full index, returning the records to keep, in
    /// their original order. When `preroll_configuration_and_state` is set,
    /// the result also includes each surviving stream's latest in-range-or-
    /// earlier Configuration/State record even if it predates the range.
    pub fn apply<'a>(&self, index: &'a [RecordInfo]) -> Vec<&'a RecordInfo> {
        let mut kept: Vec<&RecordInfo> = index
            .iter()
            .filter(|r| self.passes_stream(r.stream_id) && self.passes_type(r.record_type) && self.in_time_range(r.timestamp))
            .collect();

        if self.preroll_configuration_and_state {
            if let Some(min) = self.min_timestamp {
                let kept_streams: BTreeSet<StreamId> = kept.iter().map(|r| r.stream_id).collect();
                let mut preroll = Vec::new();
                for &id in &kept_streams {
                    for record_type in [RecordType::Configuration, RecordType::State] {
                        if let Some(r) = index
                            .iter()
                            .rev()
                            .find(|r| r.stream_id == id && r.record_type == record_type && r.timestamp < min)
                        {
                            preroll.push(r);
                        }
                    }
                }
                preroll.extend(kept);
                preroll.sort();
                preroll.dedup_by(|a, b| std::ptr::eq(*a, *b));
                kept = preroll;
            }
        }
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream_id::RecordableTypeId;

    fn sid(n: u16) -> StreamId {
        StreamId::new(RecordableTypeId(100), n)
    }

    fn rec(ts: f64, stream: StreamId, record_type: RecordType, offset: i64) -> RecordInfo {
        RecordInfo { timestamp: ts, file_offset: offset, stream_id: stream, record_type }
    }

    #[test]
    fn filters_by_stream_and_type() {
        let index = vec![
            rec(1.0, sid(1), RecordType::Data, 0),
            rec(1.0, sid(2), RecordType::Data, 100),
            rec(2.0, sid(1), RecordType::Configuration, 200),
        ];
        let filter = RecordFilter::new().with_streams([sid(1)]).with_record_types([RecordType::Data]);
        let kept = filter.apply(&index);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].file_offset, 0);
    }

    #[test]
    fn preroll_carries_latest_configuration_before_range() {
        let index = vec![
            rec(0.0, sid(1), RecordType::Configuration, 0),
            rec(5.0, sid(1), RecordType::Configuration, 100),
            rec(10.0, sid(1), RecordType::Data, 200),
            rec(20.0, sid(1), RecordType::Data, 300),
        ];
        let filter = RecordFilter::new().with_time_range(15.0, 25.0);
        let mut filter = filter;
        filter.preroll_configuration_and_state = true;
        let kept = filter.apply(&index);
        // the 20.0 data record plus the 5.0 configuration record that precedes the range
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].timestamp, 5.0);
        assert_eq!(kept[1].timestamp, 20.0);
    }
}

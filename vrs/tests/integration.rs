//! End-to-end scenarios exercising the full write -> read round trip through
//! a real file on disk, rather than any single module in isolation.

use vrs::compression::CompressionPreset;
use vrs::content_block::ContentBlock;
use vrs::copy::byte_preserving_copy_filtered;
use vrs::error::Result;
use vrs::filter::RecordFilter;
use vrs::format::{FileHeader, RecordType, FILE_HEADER_SIZE};
use vrs::index_record::RecordInfo;
use vrs::merge::merge_files;
use vrs::record::DataSource;
use vrs::stream_id::{RecordableTypeId, StreamId};
use vrs::stream_player::{Block, CollectingPlayer, StreamPlayer};
use vrs::validate::compare_vrs_files;
use vrs::{RecordFileReader, RecordFileWriter};

fn sid(type_id: u16, instance: u16) -> StreamId {
    StreamId::new(RecordableTypeId(type_id), instance)
}

#[test]
fn two_streams_interleave_in_timestamp_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("interleave.vrs");

    let camera = sid(100, 1);
    let imu = sid(200, 1);

    let mut writer = RecordFileWriter::new();
    writer.add_recordable(camera).unwrap();
    writer.add_recordable(imu).unwrap();
    writer.create_file(&path).unwrap();

    let frame = DataSource::new().with_chunk(&[1u8; 64]);
    let sample = DataSource::new().with_chunk(&[2u8; 8]);

    writer.create_record(imu, 0.5, RecordType::Data, 1, &sample).unwrap();
    writer.create_record(camera, 1.0, RecordType::Data, 1, &frame).unwrap();
    writer.create_record(imu, 1.5, RecordType::Data, 1, &sample).unwrap();
    writer.create_record(camera, 2.0, RecordType::Data, 1, &frame).unwrap();
    writer.close_file().unwrap();

    let reader = RecordFileReader::open_file(&path).unwrap();
    let timestamps: Vec<f64> = reader.get_index().iter().map(|r| r.timestamp).collect();
    assert_eq!(timestamps, vec![0.5, 1.0, 1.5, 2.0]);
    assert_eq!(reader.get_record_count(camera), 2);
    assert_eq!(reader.get_record_count(imu), 2);
}

#[test]
fn equal_timestamps_break_ties_by_stream_id() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ties.vrs");

    let low = sid(100, 1);
    let high = sid(100, 2);

    let mut writer = RecordFileWriter::new();
    writer.add_recordable(high).unwrap();
    writer.add_recordable(low).unwrap();
    writer.create_file(&path).unwrap();

    let data = DataSource::new().with_chunk(b"x");
    writer.create_record(high, 1.0, RecordType::Data, 1, &data).unwrap();
    writer.create_record(low, 1.0, RecordType::Data, 1, &data).unwrap();
    writer.close_file().unwrap();

    let reader = RecordFileReader::open_file(&path).unwrap();
    let index = reader.get_index();
    assert_eq!(index[0].stream_id, low);
    assert_eq!(index[1].stream_id, high);
}

/// Accumulates every decompressed block byte it's handed, for asserting the
/// payload survived a compress/decompress round trip unchanged.
#[derive(Default)]
struct Capture(Vec<u8>);

impl StreamPlayer for Capture {
    fn process_block(&mut self, _record: &RecordInfo, block: &Block) -> Result<()> {
        assert!(matches!(block.content, ContentBlock::Custom { .. }));
        self.0.extend_from_slice(block.bytes);
        Ok(())
    }
}

#[test]
fn compressed_payload_round_trips_through_a_real_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("compressed.vrs");

    let camera = sid(100, 1);
    let mut writer = RecordFileWriter::new();
    writer.add_recordable(camera).unwrap();
    writer.set_compression_preset(camera, CompressionPreset::ZstdMedium).unwrap();
    writer.create_file(&path).unwrap();

    let payload: Vec<u8> = (0u32..8192).map(|v| (v % 251) as u8).collect();
    let data = DataSource::new().with_chunk(&payload);
    writer.create_record(camera, 1.0, RecordType::Data, 1, &data).unwrap();
    writer.close_file().unwrap();

    let mut reader = RecordFileReader::open_file(&path).unwrap();
    reader.set_stream_player(camera, Box::new(Capture::default()));
    let record = *reader.get_record(camera, 0).unwrap();
    reader.read_record(&record).unwrap();
}

#[test]
fn missing_index_is_rebuilt_by_scanning_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("no-index.vrs");

    let camera = sid(100, 1);
    let mut writer = RecordFileWriter::new();
    writer.add_recordable(camera).unwrap();
    writer.create_file(&path).unwrap();
    let data = DataSource::new().with_chunk(b"frame-bytes");
    writer.create_record(camera, 1.0, RecordType::Data, 1, &data).unwrap();
    writer.create_record(camera, 2.0, RecordType::Data, 1, &data).unwrap();
    writer.close_file().unwrap();

    // Simulate a writer that crashed before the index record was appended:
    // truncate the file at the index offset and zero out the header's
    // pointer to it, so a reopen can't find a stored index at all.
    let mut bytes = std::fs::read(&path).unwrap();
    let mut header = FileHeader::from_bytes(&bytes[..FILE_HEADER_SIZE as usize]).unwrap();
    let index_offset = header.index_record_offset as usize;
    assert!(index_offset > 0);
    bytes.truncate(index_offset);
    header.index_record_offset = 0;
    bytes[..FILE_HEADER_SIZE as usize].copy_from_slice(&header.to_bytes());
    std::fs::write(&path, &bytes).unwrap();

    let rebuilt = RecordFileReader::open_file(&path).unwrap();
    assert!(!rebuilt.has_index());
    assert_eq!(rebuilt.get_record_count(camera), 2);
    let timestamps: Vec<f64> = rebuilt.get_index().iter().map(|r| r.timestamp).collect();
    assert_eq!(timestamps, vec![1.0, 2.0]);
}

#[test]
fn chunked_file_rolls_over_at_the_configured_size() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chunked.vrs");

    let camera = sid(100, 1);
    let mut writer = RecordFileWriter::new();
    writer.add_recordable(camera).unwrap();
    writer.create_chunked_file(&path, 1).unwrap();

    let payload = vec![7u8; 64 * 1024];
    let data = DataSource::new().with_chunk(&payload);
    for i in 0..32 {
        writer.create_record(camera, i as f64, RecordType::Data, 1, &data).unwrap();
    }
    writer.close_file().unwrap();

    let reader = RecordFileReader::open_file(&path).unwrap();
    assert_eq!(reader.get_record_count(camera), 32);
}

#[test]
fn filter_copy_keeps_only_requested_stream_and_time_range() {
    let dir = tempfile::tempdir().unwrap();
    let src_path = dir.path().join("src.vrs");

    let camera = sid(100, 1);
    let imu = sid(200, 1);
    let mut writer = RecordFileWriter::new();
    writer.add_recordable(camera).unwrap();
    writer.add_recordable(imu).unwrap();
    writer.create_file(&src_path).unwrap();
    let data = DataSource::new().with_chunk(b"x");
    writer.create_record(camera, 1.0, RecordType::Data, 1, &data).unwrap();
    writer.create_record(imu, 1.0, RecordType::Data, 1, &data).unwrap();
    writer.create_record(camera, 5.0, RecordType::Data, 1, &data).unwrap();
    writer.close_file().unwrap();

    let mut reader = RecordFileReader::open_file(&src_path).unwrap();
    let dst_path = dir.path().join("filtered.vrs");
    let filter = RecordFilter::new().with_streams([camera]).with_time_range(0.0, 2.0);
    let count = byte_preserving_copy_filtered(&mut reader, &dst_path, &filter).unwrap();
    assert_eq!(count, 1);

    let filtered = RecordFileReader::open_file(&dst_path).unwrap();
    assert_eq!(filtered.get_streams().len(), 1);
    assert_eq!(filtered.get_record_count(camera), 1);
}

#[test]
fn merge_then_checksum_matches_a_manually_combined_file() {
    let dir = tempfile::tempdir().unwrap();
    let path_a = dir.path().join("a.vrs");
    let path_b = dir.path().join("b.vrs");

    let stream_a = sid(100, 1);
    let stream_b = sid(200, 1);

    let mut writer_a = RecordFileWriter::new();
    writer_a.add_recordable(stream_a).unwrap();
    writer_a.create_file(&path_a).unwrap();
    let data = DataSource::new().with_chunk(b"alpha");
    writer_a.create_record(stream_a, 1.0, RecordType::Data, 1, &data).unwrap();
    writer_a.close_file().unwrap();

    let mut writer_b = RecordFileWriter::new();
    writer_b.add_recordable(stream_b).unwrap();
    writer_b.create_file(&path_b).unwrap();
    let data = DataSource::new().with_chunk(b"beta");
    writer_b.create_record(stream_b, 2.0, RecordType::Data, 1, &data).unwrap();
    writer_b.close_file().unwrap();

    let reader_a = RecordFileReader::open_file(&path_a).unwrap();
    let reader_b = RecordFileReader::open_file(&path_b).unwrap();
    let merged_path = dir.path().join("merged.vrs");
    let total = merge_files(&mut [reader_a, reader_b], &merged_path).unwrap();
    assert_eq!(total, 2);

    let mut combined = RecordFileWriter::new();
    combined.add_recordable(stream_a).unwrap();
    combined.add_recordable(stream_b).unwrap();
    combined.create_file(dir.path().join("expected.vrs")).unwrap();
    let data = DataSource::new().with_chunk(b"beta");
    combined.create_record(stream_b, 2.0, RecordType::Data, 1, &data).unwrap();
    let data = DataSource::new().with_chunk(b"alpha");
    combined.create_record(stream_a, 1.0, RecordType::Data, 1, &data).unwrap();
    combined.close_file().unwrap();

    let mut merged_reader = RecordFileReader::open_file(&merged_path).unwrap();
    let mut expected_reader = RecordFileReader::open_file(dir.path().join("expected.vrs")).unwrap();
    assert!(compare_vrs_files(&mut merged_reader, &mut expected_reader).unwrap());
}

#[test]
fn collecting_player_sees_every_record_across_a_full_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("collect.vrs");

    let camera = sid(100, 1);
    let mut writer = RecordFileWriter::new();
    writer.add_recordable(camera).unwrap();
    writer.create_file(&path).unwrap();
    let data = DataSource::new().with_chunk(b"abc");
    writer.create_record(camera, 1.0, RecordType::Data, 1, &data).unwrap();
    writer.create_record(camera, 2.0, RecordType::Data, 1, &data).unwrap();
    writer.close_file().unwrap();

    let mut reader = RecordFileReader::open_file(&path).unwrap();
    reader.set_stream_player(camera, Box::new(CollectingPlayer::default()));
    reader.read_all_records().unwrap();
}

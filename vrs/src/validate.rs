//! Checksum-based file comparison (spec.md §4.11 `compareVRSfiles`).
//!
//! A byte-for-byte diff is too strict: two files can carry identical record
//! content while differing in physical layout (different compression
//! preset, different write order, rebuilt index). The checksum adds each
//! record's hash into a running 256-bit total, so it doesn't care what order
//! records were combined in, only which records and bytes are present.

use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::reader::RecordFileReader;

/// Order-independent content checksum of every record in the file: each
/// record's (stream id, record type, timestamp, decoded payload) is hashed
/// independently, then the digests are summed together as a 256-bit integer.
/// Summing (rather than XORing) means a duplicated or dropped record changes
/// the total instead of canceling out.
pub fn compute_checksum(reader: &mut RecordFileReader) -> Result<[u8; 32]> {
    let index: Vec<_> = reader.get_index().to_vec();
    let mut acc = [0u8; 32];
    for record in &index {
        let raw = reader.read_raw_record_bytes(record)?;
        let header = crate::format::RecordHeader::from_bytes(&raw, record.file_offset as u64)?;
        let compression = header.get_compression_type()?;
        let payload = &raw[crate::format::RECORD_HEADER_SIZE as usize..];
        let decoded = if compression == crate::format::CompressionType::None {
            payload.to_vec()
        } else {
            crate::compression::decompress(payload, compression, header.uncompressed_size as usize)?
        };

        let mut hasher = Sha256::new();
        hasher.update(record.stream_id.to_string().as_bytes());
        hasher.update([record.record_type as u8]);
        hasher.update(record.timestamp.to_le_bytes());
        hasher.update(&decoded);
        let digest = hasher.finalize();
        add_into(&mut acc, &digest);
    }
    Ok(acc)
}

/// `acc += digest`, both read as little-endian 256-bit integers, wrapping on
/// overflow.
fn add_into(acc: &mut [u8; 32], digest: &[u8]) {
    let mut carry = 0u16;
    for i in 0..32 {
        let sum = acc[i] as u16 + digest[i] as u16 + carry;
        acc[i] = sum as u8;
        carry = sum >> 8;
    }
}

/// True if `a` and `b` contain the same streams, file tags, stream tags, and
/// record content, regardless of physical layout.
pub fn compare_vrs_files(a: &mut RecordFileReader, b: &mut RecordFileReader) -> Result<bool> {
    if a.get_streams() != b.get_streams() {
        return Ok(false);
    }
    if a.get_file_tags() != b.get_file_tags() {
        return Ok(false);
    }
    for id in a.get_streams() {
        if a.get_stream_tags(id).map(|t| &t.user) != b.get_stream_tags(id).map(|t| &t.user) {
            return Ok(false);
        }
    }
    Ok(compute_checksum(a)? == compute_checksum(b)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::RecordType;
    use crate::record::DataSource;
    use crate::stream_id::{RecordableTypeId, StreamId};
    use crate::writer::RecordFileWriter;

    fn sid(n: u16) -> StreamId {
        StreamId::new(RecordableTypeId(100), n)
    }

    fn write_fixture(path: &std::path::Path, order: [f64; 2]) {
        let mut writer = RecordFileWriter::new();
        writer.add_recordable(sid(1)).unwrap();
        writer.create_file(path).unwrap();
        let data_a = DataSource::new().with_chunk(b"first");
        let data_b = DataSource::new().with_chunk(b"second");
        writer.create_record(sid(1), order[0], RecordType::Data, 1, &data_a).unwrap();
        writer.create_record(sid(1), order[1], RecordType::Data, 1, &data_b).unwrap();
        writer.close_file().unwrap();
    }

    #[test]
    fn identical_content_matches_regardless_of_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let path_a = dir.path().join("a.vrs");
        let path_b = dir.path().join("b.vrs");
        write_fixture(&path_a, [1.0, 2.0]);
        write_fixture(&path_b, [1.0, 2.0]);

        let mut reader_a = RecordFileReader::open_file(&path_a).unwrap();
        let mut reader_b = RecordFileReader::open_file(&path_b).unwrap();
        assert!(compare_vrs_files(&mut reader_a, &mut reader_b).unwrap());
    }

    #[test]
    fn different_payload_fails_comparison() {
        let dir = tempfile::tempdir().unwrap();
        let path_a = dir.path().join("a.vrs");
        let path_b = dir.path().join("b.vrs");
        write_fixture(&path_a, [1.0, 2.0]);

        let mut writer = RecordFileWriter::new();
        writer.add_recordable(sid(1)).unwrap();
        writer.create_file(&path_b).unwrap();
        let data = DataSource::new().with_chunk(b"different");
        writer.create_record(sid(1), 1.0, RecordType::Data, 1, &data).unwrap();
        writer.close_file().unwrap();

        let mut reader_a = RecordFileReader::open_file(&path_a).unwrap();
        let mut reader_b = RecordFileReader::open_file(&path_b).unwrap();
        assert!(!compare_vrs_files(&mut reader_a, &mut reader_b).unwrap());
    }

    #[test]
    fn a_record_repeated_twice_does_not_cancel_out_of_the_checksum() {
        // File with [R1, R2, R1] (R1 repeated) must not checksum-match a file
        // with only [R2] -- an XOR-based checksum would cancel the repeated
        // R1 pair and wrongly consider these equivalent.
        let dir = tempfile::tempdir().unwrap();
        let path_with_repeat = dir.path().join("repeat.vrs");
        let path_single = dir.path().join("single.vrs");

        let mut writer = RecordFileWriter::new();
        writer.add_recordable(sid(1)).unwrap();
        writer.create_file(&path_with_repeat).unwrap();
        let data_a = DataSource::new().with_chunk(b"first");
        let data_b = DataSource::new().with_chunk(b"second");
        writer.create_record(sid(1), 1.0, RecordType::Data, 1, &data_a).unwrap();
        writer.create_record(sid(1), 2.0, RecordType::Data, 1, &data_b).unwrap();
        writer.create_record(sid(1), 1.0, RecordType::Data, 1, &data_a).unwrap();
        writer.close_file().unwrap();

        let mut writer = RecordFileWriter::new();
        writer.add_recordable(sid(1)).unwrap();
        writer.create_file(&path_single).unwrap();
        writer.create_record(sid(1), 2.0, RecordType::Data, 1, &data_b).unwrap();
        writer.close_file().unwrap();

        let mut reader_repeat = RecordFileReader::open_file(&path_with_repeat).unwrap();
        let mut reader_single = RecordFileReader::open_file(&path_single).unwrap();
        assert_ne!(
            compute_checksum(&mut reader_repeat).unwrap(),
            compute_checksum(&mut reader_single).unwrap()
        );
    }
}

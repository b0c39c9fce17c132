//! Record payload compression (spec.md §4.3).
//!
//! Grounded in `original_source/vrs/Compressor.h`: a closed set of presets
//! spanning two codec families, with lz4 tuned for speed and zstd for ratio.
//! Compression is always transparent to callers: record sizes reported by
//! the public API are the *uncompressed* size, never the on-disk size.

use crate::error::{Result, VrsError};
use crate::format::CompressionType;

/// Don't bother compressing tiny payloads; the framing overhead eats any win.
pub const MIN_BYTE_COUNT_FOR_COMPRESSION: usize = 1024;

/// Compression preset, ordered exactly as `Compressor.h`'s `CompressionPreset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub enum CompressionPreset {
    None,
    Lz4Fast,
    Lz4Tight,
    ZstdFast,
    ZstdLight,
    ZstdMedium,
    ZstdHeavy,
    ZstdHigh,
    ZstdTight,
    ZstdMax,
}

impl Default for CompressionPreset {
    fn default() -> Self {
        CompressionPreset::Lz4Fast
    }
}

impl CompressionPreset {
    pub fn codec(self) -> CompressionType {
        match self {
            CompressionPreset::None => CompressionType::None,
            CompressionPreset::Lz4Fast | CompressionPreset::Lz4Tight => CompressionType::Lz4,
            _ => CompressionType::Zstd,
        }
    }

    /// zstd compression level for this preset. lz4_flex has no level knob for
    /// the fast block format, so only zstd presets use this.
    fn zstd_level(self) -> i32 {
        match self {
            CompressionPreset::ZstdFast => 1,
            CompressionPreset::ZstdLight => 3,
            CompressionPreset::ZstdMedium => 6,
            CompressionPreset::ZstdHeavy => 9,
            CompressionPreset::ZstdHigh => 12,
            CompressionPreset::ZstdTight => 17,
            CompressionPreset::ZstdMax => 22,
            _ => 0,
        }
    }

    pub fn should_try_to_compress(self, size: usize) -> bool {
        self != CompressionPreset::None && size >= MIN_BYTE_COUNT_FOR_COMPRESSION
    }

    pub fn name(self) -> &'static str {
        match self {
            CompressionPreset::None => "none",
            CompressionPreset::Lz4Fast => "lz4fast",
            CompressionPreset::Lz4Tight => "lz4tight",
            CompressionPreset::ZstdFast => "zstdfast",
            CompressionPreset::ZstdLight => "zstdlight",
            CompressionPreset::ZstdMedium => "zstdmedium",
            CompressionPreset::ZstdHeavy => "zstdheavy",
            CompressionPreset::ZstdHigh => "zstdhigh",
            CompressionPreset::ZstdTight => "zstdtight",
            CompressionPreset::ZstdMax => "zstdmax",
        }
    }
}

/// Compress `data` with `preset`. Returns `(CompressionType::None, data.to_vec())`
/// unchanged if the preset is `None`, the payload is too small, or compression
/// didn't actually shrink the data.
pub fn compress(data: &[u8], preset: CompressionPreset) -> Result<(CompressionType, Vec<u8>)> {
    if !preset.should_try_to_compress(data.len()) {
        return Ok((CompressionType::None, data.to_vec()));
    }
    let compressed = match preset.codec() {
        CompressionType::Lz4 => lz4_flex::block::compress(data),
        CompressionType::Zstd => zstd::bulk::compress(data, preset.zstd_level())
            .map_err(|e| VrsError::CompressionFailed { reason: e.to_string() })?,
        CompressionType::None => unreachable!(),
    };
    if compressed.len() >= data.len() {
        Ok((CompressionType::None, data.to_vec()))
    } else {
        Ok((preset.codec(), compressed))
    }
}

/// Decompress a record payload given its on-disk compression type and
/// known uncompressed size.
pub fn decompress(data: &[u8], compression: CompressionType, uncompressed_size: usize) -> Result<Vec<u8>> {
    match compression {
        CompressionType::None => Ok(data.to_vec()),
        CompressionType::Lz4 => lz4_flex::block::decompress(data, uncompressed_size)
            .map_err(|e| VrsError::DecompressionFailed { reason: e.to_string() }),
        CompressionType::Zstd => zstd::bulk::decompress(data, uncompressed_size)
            .map_err(|e| VrsError::DecompressionFailed { reason: e.to_string() }),
    }
}

/// Streaming zstd frame writer, for compressing a record's payload across
/// several `add_frame_data` calls without buffering it all upfront.
/// Mirrors `Compressor::startFrame`/`addFrameData`/`endFrame`.
pub struct FrameCompressor {
    encoder: zstd::stream::write::Encoder<'static, Vec<u8>>,
    declared_size: usize,
    written: usize,
}

impl FrameCompressor {
    pub fn start(frame_size: usize, preset: CompressionPreset) -> Result<Self> {
        let level = preset.zstd_level().max(1);
        let encoder = zstd::stream::write::Encoder::new(Vec::new(), level)
            .map_err(|e| VrsError::CompressionFailed { reason: e.to_string() })?;
        Ok(FrameCompressor {
            encoder,
            declared_size: frame_size,
            written: 0,
        })
    }

    pub fn add_frame_data(&mut self, data: &[u8]) -> Result<()> {
        use std::io::Write;
        self.written += data.len();
        if self.written > self.declared_size {
            return Err(VrsError::FrameBudgetExceeded {
                declared: self.declared_size,
                budget: self.written,
            });
        }
        self.encoder
            .write_all(data)
            .map_err(|e| VrsError::CompressionFailed { reason: e.to_string() })
    }

    pub fn finish(self) -> Result<Vec<u8>> {
        self.encoder
            .finish()
            .map_err(|e| VrsError::CompressionFailed { reason: e.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_preset_is_lz4_fast() {
        assert_eq!(CompressionPreset::default(), CompressionPreset::Lz4Fast);
    }

    #[test]
    fn small_payloads_skip_compression() {
        let data = vec![0u8; 16];
        let (ctype, out) = compress(&data, CompressionPreset::ZstdMax).unwrap();
        assert_eq!(ctype, CompressionType::None);
        assert_eq!(out, data);
    }

    #[test]
    fn none_preset_never_compresses() {
        let data = vec![1u8; 4096];
        let (ctype, out) = compress(&data, CompressionPreset::None).unwrap();
        assert_eq!(ctype, CompressionType::None);
        assert_eq!(out, data);
    }

    #[test]
    fn lz4_round_trip() {
        let data = vec![7u8; 8192];
        let (ctype, compressed) = compress(&data, CompressionPreset::Lz4Fast).unwrap();
        assert_eq!(ctype, CompressionType::Lz4);
        assert!(compressed.len() < data.len());
        let back = decompress(&compressed, ctype, data.len()).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn zstd_round_trip() {
        let data = (0u32..4096).flat_map(|v| (v % 7).to_le_bytes()).collect::<Vec<u8>>();
        let (ctype, compressed) = compress(&data, CompressionPreset::ZstdMedium).unwrap();
        assert_eq!(ctype, CompressionType::Zstd);
        let back = decompress(&compressed, ctype, data.len()).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn frame_compressor_enforces_budget() {
        let mut frame = FrameCompressor::start(4, CompressionPreset::ZstdFast).unwrap();
        frame.add_frame_data(&[1, 2, 3, 4]).unwrap();
        assert!(frame.add_frame_data(&[5]).is_err());
    }

    #[test]
    fn frame_compressor_round_trip() {
        let payload = vec![42u8; 2048];
        let mut frame = FrameCompressor::start(payload.len(), CompressionPreset::ZstdFast).unwrap();
        for chunk in payload.chunks(256) {
            frame.add_frame_data(chunk).unwrap();
        }
        let compressed = frame.finish().unwrap();
        let back = decompress(&compressed, CompressionType::Zstd, payload.len()).unwrap();
        assert_eq!(back, payload);
    }
}

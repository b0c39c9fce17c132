//! RecordFormat descriptors and content blocks (spec.md §4.4).
//!
//! A record's payload is a concatenation of content blocks, described by a
//! textual descriptor string attached to the stream's tags. Descriptors are
//! parsed leniently (an unknown key is logged and skipped) but stringify
//! canonically, so `parse(s).to_string()` round-trips for any canonical `s`.

use std::collections::HashMap;
use std::fmt;

use crate::error::{Result, VrsError};

/// Closed, numerically frozen pixel format enumeration (spec.md §4.4). Values
/// persist in DataLayout JSON, so numbering never changes once assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[repr(u8)]
pub enum PixelFormat {
    Grey8 = 0,
    Bgr8 = 1,
    Depth32f = 2,
    Rgb8 = 3,
    Yuv420Sp = 4,
    Rgba8 = 5,
    Bgra8 = 6,
    Grey10 = 7,
    Grey12 = 8,
    Grey16 = 9,
    Raw10 = 10,
    Yuy2 = 11,
    Rgb10 = 12,
    Rgb12 = 13,
    Yuv420P = 14,
    Yuv422P = 15,
}

impl PixelFormat {
    /// Bytes per pixel for packed formats, or `None` for formats whose plane
    /// layout needs the raw-10/YUV-split special cases below.
    fn packed_bytes_per_pixel(self) -> Option<u32> {
        match self {
            PixelFormat::Grey8 => Some(1),
            PixelFormat::Bgr8 | PixelFormat::Rgb8 => Some(3),
            PixelFormat::Depth32f => Some(4),
            PixelFormat::Rgba8 | PixelFormat::Bgra8 => Some(4),
            PixelFormat::Grey10 | PixelFormat::Grey12 | PixelFormat::Grey16 => Some(2),
            PixelFormat::Yuy2 => Some(2),
            PixelFormat::Rgb10 | PixelFormat::Rgb12 => Some(6),
            _ => None,
        }
    }

    /// Default stride in bytes for a given width, absent an explicit
    /// `stride=` override in the descriptor.
    pub fn default_stride(self, width: u32) -> u32 {
        match self {
            PixelFormat::Raw10 => (width * 5).div_ceil(4),
            PixelFormat::Yuv420P | PixelFormat::Yuv420Sp | PixelFormat::Yuv422P => width,
            _ => width * self.packed_bytes_per_pixel().unwrap_or(1),
        }
    }

    /// Raw image size in bytes given dimensions and an explicit first-plane
    /// stride (spec.md §4.4: "per-plane stride x plane height summed across
    /// planes; YUV splits use half-width/half-height second/third planes").
    pub fn raw_size(self, width: u32, height: u32, stride: u32, stride2: Option<u32>) -> u32 {
        match self {
            PixelFormat::Yuv420P => {
                let plane2_stride = stride2.unwrap_or(stride.div_ceil(2));
                stride * height + 2 * plane2_stride * height.div_ceil(2)
            }
            PixelFormat::Yuv420Sp => {
                let plane2_stride = stride2.unwrap_or(stride);
                stride * height + plane2_stride * height.div_ceil(2)
            }
            PixelFormat::Yuv422P => {
                let plane2_stride = stride2.unwrap_or(stride.div_ceil(2));
                stride * height + 2 * plane2_stride * height
            }
            _ => stride * height,
        }
    }

    fn name(self) -> &'static str {
        match self {
            PixelFormat::Grey8 => "grey8",
            PixelFormat::Bgr8 => "bgr8",
            PixelFormat::Depth32f => "depth32f",
            PixelFormat::Rgb8 => "rgb8",
            PixelFormat::Yuv420Sp => "yuv420sp",
            PixelFormat::Rgba8 => "rgba8",
            PixelFormat::Bgra8 => "bgra8",
            PixelFormat::Grey10 => "grey10",
            PixelFormat::Grey12 => "grey12",
            PixelFormat::Grey16 => "grey16",
            PixelFormat::Raw10 => "raw10",
            PixelFormat::Yuy2 => "yuy2",
            PixelFormat::Rgb10 => "rgb10",
            PixelFormat::Rgb12 => "rgb12",
            PixelFormat::Yuv420P => "yuv420p",
            PixelFormat::Yuv422P => "yuv422p",
        }
    }

    fn from_name(s: &str) -> Option<Self> {
        Some(match s {
            "grey8" => PixelFormat::Grey8,
            "bgr8" => PixelFormat::Bgr8,
            "depth32f" => PixelFormat::Depth32f,
            "rgb8" => PixelFormat::Rgb8,
            "yuv420sp" => PixelFormat::Yuv420Sp,
            "rgba8" => PixelFormat::Rgba8,
            "bgra8" => PixelFormat::Bgra8,
            "grey10" => PixelFormat::Grey10,
            "grey12" => PixelFormat::Grey12,
            "grey16" => PixelFormat::Grey16,
            "raw10" => PixelFormat::Raw10,
            "yuy2" => PixelFormat::Yuy2,
            "rgb10" => PixelFormat::Rgb10,
            "rgb12" => PixelFormat::Rgb12,
            "yuv420p" => PixelFormat::Yuv420P,
            "yuv422p" => PixelFormat::Yuv422P,
            _ => return None,
        })
    }
}

/// Closed, numerically frozen audio sample format enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
#[repr(u8)]
pub enum SampleFormat {
    Uint8 = 0,
    Int16 = 1,
    Int32 = 2,
    Float32 = 3,
    Float64 = 4,
}

impl SampleFormat {
    pub fn bytes_per_sample(self) -> u32 {
        match self {
            SampleFormat::Uint8 => 1,
            SampleFormat::Int16 => 2,
            SampleFormat::Int32 | SampleFormat::Float32 => 4,
            SampleFormat::Float64 => 8,
        }
    }

    fn name(self) -> &'static str {
        match self {
            SampleFormat::Uint8 => "uint8",
            SampleFormat::Int16 => "int16",
            SampleFormat::Int32 => "int32",
            SampleFormat::Float32 => "float32",
            SampleFormat::Float64 => "float64",
        }
    }

    fn from_name(s: &str) -> Option<Self> {
        Some(match s {
            "uint8" => SampleFormat::Uint8,
            "int16" => SampleFormat::Int16,
            "int32" => SampleFormat::Int32,
            "float32" => SampleFormat::Float32,
            "float64" => SampleFormat::Float64,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub enum ImageSpec {
    Raw {
        pixel_format: PixelFormat,
        width: u32,
        height: u32,
        stride: u32,
        stride2: Option<u32>,
    },
    Jpg,
    Png,
    Jxl,
    Video {
        codec_name: String,
        codec_quality: Option<u32>,
        pixel_format: Option<PixelFormat>,
        width: Option<u32>,
        height: Option<u32>,
        keyframe_timestamp: Option<f64>,
        keyframe_index: Option<u32>,
    },
    CustomCodec {
        codec_name: String,
        codec_quality: Option<u32>,
        pixel_format: PixelFormat,
        width: u32,
        height: u32,
    },
    Undefined,
}

impl ImageSpec {
    /// Known byte size, or `None` if it can only be resolved from the
    /// record's residual (compressed codecs: jpg/png/jxl/video).
    pub fn known_size(&self) -> Option<u32> {
        match self {
            ImageSpec::Raw { pixel_format, width, height, stride, stride2 } => {
                Some(pixel_format.raw_size(*width, *height, *stride, *stride2))
            }
            ImageSpec::CustomCodec { pixel_format, width, height, .. } => {
                Some(pixel_format.raw_size(*width, *height, pixel_format.default_stride(*width), None))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub enum AudioSpec {
    Pcm {
        sample_format: SampleFormat,
        channels: u32,
        stride: Option<u32>,
        sample_rate: u32,
        sample_count: u32,
        stereo_pairs: Option<u32>,
    },
    Opus {
        channels: u32,
    },
    Undefined,
}

impl AudioSpec {
    pub fn known_size(&self) -> Option<u32> {
        match self {
            AudioSpec::Pcm { sample_format, channels, stride, sample_count, .. } => {
                let stride = stride.unwrap_or(sample_format.bytes_per_sample() * channels);
                Some(stride * sample_count)
            }
            AudioSpec::Opus { .. } => None,
        }
    }
}

/// A single entry in a RecordFormat descriptor (spec.md §4.4).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "jsonschema", derive(schemars::JsonSchema))]
pub enum ContentBlock {
    Custom { format: Option<String> },
    Empty,
    DataLayout,
    Image(ImageSpec),
    Audio(AudioSpec),
}

impl ContentBlock {
    pub fn known_size(&self) -> Option<u32> {
        match self {
            ContentBlock::Custom { .. } => None,
            ContentBlock::Empty => Some(0),
            ContentBlock::DataLayout => None,
            ContentBlock::Image(spec) => spec.known_size(),
            ContentBlock::Audio(spec) => spec.known_size(),
        }
    }
}

/// An ordered list of content blocks describing the layout of a record's
/// payload for a given (record type, format version).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordFormat {
    pub blocks: Vec<ContentBlock>,
}

impl RecordFormat {
    /// Resolve each block's byte size given the record's total payload size.
    /// At most one block may report "unknown"; it receives the residual.
    pub fn resolve_sizes(&self, payload_size: u32) -> Result<Vec<u32>> {
        let mut known_total: u64 = 0;
        let mut unknown_index: Option<usize> = None;
        for (i, block) in self.blocks.iter().enumerate() {
            match block.known_size() {
                Some(size) => known_total += size as u64,
                None => {
                    if unknown_index.is_some() {
                        return Err(VrsError::UnknownBlockSizeConflict {
                            reason: "more than one block of unknown size".into(),
                        });
                    }
                    unknown_index = Some(i);
                }
            }
        }
        let mut sizes: Vec<u32> = self
            .blocks
            .iter()
            .map(|b| b.known_size().unwrap_or(0))
            .collect();
        if let Some(idx) = unknown_index {
            if known_total > payload_size as u64 {
                return Err(VrsError::UnknownBlockSizeConflict {
                    reason: "known blocks alone exceed the record's payload size".into(),
                });
            }
            sizes[idx] = payload_size - known_total as u32;
        } else if known_total != payload_size as u64 {
            return Err(VrsError::UnknownBlockSizeConflict {
                reason: format!(
                    "block sizes sum to {known_total}, payload is {payload_size} bytes"
                ),
            });
        }
        Ok(sizes)
    }
}

impl fmt::Display for RecordFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.blocks.iter().map(format_block).collect();
        write!(f, "{}", parts.join("+"))
    }
}

fn format_block(block: &ContentBlock) -> String {
    match block {
        ContentBlock::Custom { format: Some(name) } => format!("custom/format={name}"),
        ContentBlock::Custom { format: None } => "custom".to_string(),
        ContentBlock::Empty => "empty".to_string(),
        ContentBlock::DataLayout => "data_layout".to_string(),
        ContentBlock::Image(spec) => format!("image/{}", format_image_spec(spec)),
        ContentBlock::Audio(spec) => format!("audio/{}", format_audio_spec(spec)),
    }
}

fn format_image_spec(spec: &ImageSpec) -> String {
    match spec {
        ImageSpec::Raw { pixel_format, width, height, stride, stride2 } => {
            let mut s = format!("{}x{}/pixel={}", width, height, pixel_format.name());
            s.push_str(&format!("/stride={stride}"));
            if let Some(s2) = stride2 {
                s.push_str(&format!("/stride_2={s2}"));
            }
            s
        }
        ImageSpec::Jpg => "jpg".to_string(),
        ImageSpec::Png => "png".to_string(),
        ImageSpec::Jxl => "jxl".to_string(),
        ImageSpec::Video {
            codec_name,
            codec_quality,
            pixel_format,
            width,
            height,
            keyframe_timestamp,
            keyframe_index,
        } => {
            let mut s = format!("video/codec={codec_name}");
            if let Some(q) = codec_quality {
                s.push_str(&format!("/codec_quality={q}"));
            }
            if let Some(pf) = pixel_format {
                s.push_str(&format!("/pixel={}", pf.name()));
            }
            if let (Some(w), Some(h)) = (width, height) {
                s.push_str(&format!("/{w}x{h}"));
            }
            if let Some(kt) = keyframe_timestamp {
                s.push_str(&format!("/keyframe_timestamp={kt}"));
            }
            if let Some(ki) = keyframe_index {
                s.push_str(&format!("/keyframe_index={ki}"));
            }
            s
        }
        ImageSpec::CustomCodec { codec_name, codec_quality, pixel_format, width, height } => {
            let mut s = format!("{}x{}/pixel={}/codec={}", width, height, pixel_format.name(), codec_name);
            if let Some(q) = codec_quality {
                s.push_str(&format!("/codec_quality={q}"));
            }
            s
        }
        ImageSpec::Undefined => "undefined".to_string(),
    }
}

fn format_audio_spec(spec: &AudioSpec) -> String {
    match spec {
        AudioSpec::Pcm { sample_format, channels, stride, sample_rate, sample_count, stereo_pairs } => {
            let mut s = format!("{}/channels={channels}/rate={sample_rate}/samples={sample_count}", sample_format.name());
            if let Some(stride) = stride {
                s.push_str(&format!("/stride={stride}"));
            }
            if let Some(sp) = stereo_pairs {
                s.push_str(&format!("/stereo_pairs={sp}"));
            }
            s
        }
        AudioSpec::Opus { channels } => format!("opus/channels={channels}"),
        AudioSpec::Undefined => "undefined".to_string(),
    }
}

/// Parse a RecordFormat descriptor string. Unknown keys inside a block are
/// logged and skipped rather than treated as a hard parse error.
pub fn parse_record_format(descriptor: &str) -> Result<RecordFormat> {
    let mut blocks = Vec::new();
    for part in descriptor.split('+') {
        blocks.push(parse_block(part)?);
    }
    Ok(RecordFormat { blocks })
}

const IMAGE_KEYS: &[&str] = &[
    "pixel", "stride", "stride_2", "codec", "codec_quality", "keyframe_timestamp", "keyframe_index",
];
const AUDIO_KEYS: &[&str] = &["channels", "rate", "samples", "stride", "stereo_pairs"];
const CUSTOM_KEYS: &[&str] = &["format"];

fn warn_on_unknown_keys(part: &str, kv: &HashMap<&str, &str>, known: &[&str]) {
    for key in kv.keys() {
        if !known.contains(key) {
            log::warn!("RecordFormat descriptor {part:?}: unknown key {key:?}, ignoring");
        }
    }
}

fn parse_block(part: &str) -> Result<ContentBlock> {
    let mut fields = part.split('/');
    let kind = fields.next().unwrap_or("");
    let kv: HashMap<&str, &str> = fields
        .filter_map(|f| f.split_once('='))
        .collect();

    match kind {
        "empty" => Ok(ContentBlock::Empty),
        "data_layout" => Ok(ContentBlock::DataLayout),
        "custom" => {
            warn_on_unknown_keys(part, &kv, CUSTOM_KEYS);
            Ok(ContentBlock::Custom {
                format: kv.get("format").map(|s| s.to_string()),
            })
        }
        "image" => {
            warn_on_unknown_keys(part, &kv, IMAGE_KEYS);
            parse_image_block(part, &kv)
        }
        "audio" => {
            warn_on_unknown_keys(part, &kv, AUDIO_KEYS);
            parse_audio_block(part, &kv)
        }
        other => Err(VrsError::RecordFormatParse {
            descriptor: part.to_string(),
            reason: format!("unknown block type {other:?}"),
        }),
    }
}

fn dims_from_part(part: &str) -> Option<(u32, u32)> {
    part.split('/').find_map(|f| {
        let (w, h) = f.split_once('x')?;
        Some((w.parse().ok()?, h.parse().ok()?))
    })
}

fn parse_image_block(part: &str, kv: &HashMap<&str, &str>) -> Result<ContentBlock> {
    if kv.get("codec").is_none() && kv.get("pixel").is_none() {
        if part.contains("jpg") {
            return Ok(ContentBlock::Image(ImageSpec::Jpg));
        }
        if part.contains("png") {
            return Ok(ContentBlock::Image(ImageSpec::Png));
        }
        if part.contains("jxl") {
            return Ok(ContentBlock::Image(ImageSpec::Jxl));
        }
        if part.contains("undefined") {
            return Ok(ContentBlock::Image(ImageSpec::Undefined));
        }
    }
    if let Some(codec) = kv.get("codec") {
        let codec_quality = kv.get("codec_quality").and_then(|v| v.parse().ok());
        if let Some(pixel) = kv.get("pixel") {
            if let Some((width, height)) = dims_from_part(part) {
                let pixel_format = PixelFormat::from_name(pixel).ok_or_else(|| VrsError::RecordFormatParse {
                    descriptor: part.to_string(),
                    reason: format!("unknown pixel format {pixel:?}"),
                })?;
                return Ok(ContentBlock::Image(ImageSpec::CustomCodec {
                    codec_name: codec.to_string(),
                    codec_quality,
                    pixel_format,
                    width,
                    height,
                }));
            }
        }
        let pixel_format = kv
            .get("pixel")
            .and_then(|p| PixelFormat::from_name(p));
        let (width, height) = dims_from_part(part).map_or((None, None), |(w, h)| (Some(w), Some(h)));
        return Ok(ContentBlock::Image(ImageSpec::Video {
            codec_name: codec.to_string(),
            codec_quality,
            pixel_format,
            width,
            height,
            keyframe_timestamp: kv.get("keyframe_timestamp").and_then(|v| v.parse().ok()),
            keyframe_index: kv.get("keyframe_index").and_then(|v| v.parse().ok()),
        }));
    }
    let (width, height) = dims_from_part(part).ok_or_else(|| VrsError::RecordFormatParse {
        descriptor: part.to_string(),
        reason: "raw image block missing WxH".into(),
    })?;
    let pixel = kv.get("pixel").ok_or_else(|| VrsError::RecordFormatParse {
        descriptor: part.to_string(),
        reason: "raw image block missing pixel=".into(),
    })?;
    let pixel_format = PixelFormat::from_name(pixel).ok_or_else(|| VrsError::RecordFormatParse {
        descriptor: part.to_string(),
        reason: format!("unknown pixel format {pixel:?}"),
    })?;
    let stride = kv
        .get("stride")
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(|| pixel_format.default_stride(width));
    let stride2 = kv.get("stride_2").and_then(|v| v.parse().ok());
    Ok(ContentBlock::Image(ImageSpec::Raw {
        pixel_format,
        width,
        height,
        stride,
        stride2,
    }))
}

fn parse_audio_block(part: &str, kv: &HashMap<&str, &str>) -> Result<ContentBlock> {
    if part.contains("opus") {
        let channels = kv.get("channels").and_then(|v| v.parse().ok()).unwrap_or(1);
        return Ok(ContentBlock::Audio(AudioSpec::Opus { channels }));
    }
    if part.contains("undefined") {
        return Ok(ContentBlock::Audio(AudioSpec::Undefined));
    }
    let sample_format_name = part
        .split('/')
        .nth(1)
        .ok_or_else(|| VrsError::RecordFormatParse {
            descriptor: part.to_string(),
            reason: "audio block missing sample format".into(),
        })?;
    let sample_format = SampleFormat::from_name(sample_format_name).ok_or_else(|| VrsError::RecordFormatParse {
        descriptor: part.to_string(),
        reason: format!("unknown sample format {sample_format_name:?}"),
    })?;
    let channels: u32 = kv
        .get("channels")
        .ok_or_else(|| VrsError::RecordFormatParse {
            descriptor: part.to_string(),
            reason: "audio block missing channels=".into(),
        })?
        .parse()
        .map_err(|_| VrsError::RecordFormatParse {
            descriptor: part.to_string(),
            reason: "channels= is not a number".into(),
        })?;
    let sample_rate = kv.get("rate").and_then(|v| v.parse().ok()).unwrap_or(0);
    let sample_count: u32 = kv
        .get("samples")
        .ok_or_else(|| VrsError::RecordFormatParse {
            descriptor: part.to_string(),
            reason: "audio block missing samples=".into(),
        })?
        .parse()
        .map_err(|_| VrsError::RecordFormatParse {
            descriptor: part.to_string(),
            reason: "samples= is not a number".into(),
        })?;
    let stride = kv.get("stride").and_then(|v| v.parse().ok());
    let stereo_pairs = kv.get("stereo_pairs").and_then(|v| v.parse().ok());
    Ok(ContentBlock::Audio(AudioSpec::Pcm {
        sample_format,
        channels,
        stride,
        sample_rate,
        sample_count,
        stereo_pairs,
    }))
}

/// Reserved tag-key prefix for a RecordFormat entry, keyed by (record type,
/// format version) (spec.md §4.4/§6): `"RF:<type>:<version>"`.
pub fn record_format_tag_name(record_type: &str, format_version: u32) -> String {
    format!("RF:{record_type}:{format_version}")
}

/// Reserved tag-key prefix for a DataLayout JSON schema, keyed by (record
/// type, format version, block index): `"DL:<type>:<version>:<blockIndex>"`.
pub fn data_layout_tag_name(record_type: &str, format_version: u32, block_index: usize) -> String {
    format!("DL:{record_type}:{format_version}:{block_index}")
}

/// Parse a reserved tag key back into its components, if it is one.
pub enum ParsedTagName {
    RecordFormat { record_type: String, format_version: u32 },
    DataLayout { record_type: String, format_version: u32, block_index: usize },
}

pub fn parse_record_format_tag_name(key: &str) -> Option<ParsedTagName> {
    let mut parts = key.split(':');
    match parts.next()? {
        "RF" => {
            let record_type = parts.next()?.to_string();
            let format_version: u32 = parts.next()?.parse().ok()?;
            Some(ParsedTagName::RecordFormat { record_type, format_version })
        }
        "DL" => {
            let record_type = parts.next()?.to_string();
            let format_version: u32 = parts.next()?.parse().ok()?;
            let block_index: usize = parts.next()?.parse().ok()?;
            Some(ParsedTagName::DataLayout { record_type, format_version, block_index })
        }
        _ => None,
    }
}

/// Capability interface for a DataLayout block (spec.md §3): the engine
/// never interprets individual fields, only round-trips JSON and byte images.
pub trait DataLayout {
    /// Exact byte image to write into a `data_layout` content block.
    fn to_byte_image(&self) -> Vec<u8>;
    /// Reconstruct from a byte image previously produced by `to_byte_image`,
    /// validated against `schema_json`.
    fn from_byte_image(bytes: &[u8], schema_json: &str) -> Result<Self>
    where
        Self: Sized;
    /// JSON schema describing this layout's fields, persisted via
    /// [`data_layout_tag_name`].
    fn schema_json(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_raw_image() {
        let s = "image/640x480/pixel=grey8/stride=640";
        let fmt = parse_record_format(s).unwrap();
        assert_eq!(fmt.to_string(), s);
    }

    #[test]
    fn round_trips_multi_block() {
        let s = "data_layout+image/320x240/pixel=rgb8/stride=960";
        let fmt = parse_record_format(s).unwrap();
        assert_eq!(fmt.to_string(), s);
        assert_eq!(fmt.blocks.len(), 2);
    }

    #[test]
    fn resolve_sizes_with_one_unknown() {
        let fmt = RecordFormat {
            blocks: vec![ContentBlock::Empty, ContentBlock::Image(ImageSpec::Jpg)],
        };
        let sizes = fmt.resolve_sizes(1000).unwrap();
        assert_eq!(sizes, vec![0, 1000]);
    }

    #[test]
    fn resolve_sizes_rejects_two_unknowns() {
        let fmt = RecordFormat {
            blocks: vec![ContentBlock::Image(ImageSpec::Jpg), ContentBlock::Image(ImageSpec::Png)],
        };
        assert!(fmt.resolve_sizes(1000).is_err());
    }

    #[test]
    fn resolve_sizes_rejects_mismatch_with_no_unknown() {
        let fmt = RecordFormat {
            blocks: vec![ContentBlock::Empty],
        };
        assert!(fmt.resolve_sizes(10).is_err());
    }

    #[test]
    fn pcm_size_from_stride_and_count() {
        let spec = AudioSpec::Pcm {
            sample_format: SampleFormat::Int16,
            channels: 2,
            stride: None,
            sample_rate: 48000,
            sample_count: 100,
            stereo_pairs: None,
        };
        assert_eq!(spec.known_size(), Some(4 * 100));
    }

    #[test]
    fn tag_name_round_trip() {
        let key = record_format_tag_name("Data", 1);
        assert_eq!(key, "RF:Data:1");
        match parse_record_format_tag_name(&key) {
            Some(ParsedTagName::RecordFormat { record_type, format_version }) => {
                assert_eq!(record_type, "Data");
                assert_eq!(format_version, 1);
            }
            _ => panic!("expected RecordFormat tag"),
        }
    }

    #[test]
    fn data_layout_tag_name_round_trip() {
        let key = data_layout_tag_name("Configuration", 2, 0);
        assert_eq!(key, "DL:Configuration:2:0");
    }

    #[test]
    fn unknown_block_type_is_an_error() {
        assert!(parse_record_format("bogus").is_err());
    }
}

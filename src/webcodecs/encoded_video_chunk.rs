//! EncodedVideoChunk - WebCodecs API implementation
//!
//! Represents a chunk of encoded video data plus the video encoder and
//! decoder configuration dictionaries.
//! See: https://developer.mozilla.org/en-US/docs/Web/API/EncodedVideoChunk

use crate::codec::ChunkData;
use crate::webcodecs::codec_string::{parse_video_codec_string, VideoCodec};
use crate::webcodecs::error::{invalid_state_error, range_error, type_error, Result, WebCodecsError};
use crate::webcodecs::media_buffer::{take_payload, MediaBuffer};
use crate::webcodecs::video_frame::VideoColorSpace;
use parking_lot::RwLock;
use std::str::FromStr;
use std::sync::Arc;

/// Encoded chunk type (WebCodecs spec)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodedVideoChunkType {
  /// Self-contained chunk, decodable without prior chunks
  Key,
  /// Differentially coded chunk, requires prior chunks
  Delta,
}

impl EncodedVideoChunkType {
  pub fn as_str(&self) -> &'static str {
    match self {
      EncodedVideoChunkType::Key => "key",
      EncodedVideoChunkType::Delta => "delta",
    }
  }
}

impl FromStr for EncodedVideoChunkType {
  type Err = WebCodecsError;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "key" => Ok(EncodedVideoChunkType::Key),
      "delta" => Ok(EncodedVideoChunkType::Delta),
      other => Err(type_error(format!("invalid chunk type: {other}"))),
    }
  }
}

/// Hardware acceleration preference (W3C spec enum)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HardwareAcceleration {
  #[default]
  NoPreference,
  PreferHardware,
  PreferSoftware,
}

impl HardwareAcceleration {
  pub fn as_str(&self) -> &'static str {
    match self {
      HardwareAcceleration::NoPreference => "no-preference",
      HardwareAcceleration::PreferHardware => "prefer-hardware",
      HardwareAcceleration::PreferSoftware => "prefer-software",
    }
  }
}

impl FromStr for HardwareAcceleration {
  type Err = WebCodecsError;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "no-preference" => Ok(HardwareAcceleration::NoPreference),
      "prefer-hardware" => Ok(HardwareAcceleration::PreferHardware),
      "prefer-software" => Ok(HardwareAcceleration::PreferSoftware),
      other => Err(type_error(format!(
        "invalid hardwareAcceleration value: {other}"
      ))),
    }
  }
}

/// Latency mode (W3C spec enum)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LatencyMode {
  #[default]
  Quality,
  Realtime,
}

/// Bitrate mode for video encoders (W3C spec enum)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoEncoderBitrateMode {
  #[default]
  Variable,
  Constant,
  Quantizer,
}

/// Alpha handling (W3C spec enum)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlphaOption {
  #[default]
  Discard,
  Keep,
}

/// AVC (H.264) bitstream format (W3C WebCodecs AVC Registration)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AvcBitstreamFormat {
  /// Parameter sets in the decoder description (ISO 14496-15)
  #[default]
  Avc,
  /// Parameter sets inline in the bitstream
  Annexb,
}

/// AVC (H.264) encoder configuration (W3C WebCodecs AVC Registration)
#[derive(Debug, Clone, Default)]
pub struct AvcEncoderConfig {
  /// Bitstream format (default: "avc")
  pub format: Option<AvcBitstreamFormat>,
}

/// HEVC (H.265) bitstream format (W3C WebCodecs HEVC Registration)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HevcBitstreamFormat {
  /// Parameter sets in the decoder description (ISO 14496-15)
  #[default]
  Hevc,
  /// Parameter sets inline in the bitstream
  Annexb,
}

/// HEVC (H.265) encoder configuration (W3C WebCodecs HEVC Registration)
#[derive(Debug, Clone, Default)]
pub struct HevcEncoderConfig {
  /// Bitstream format (default: "hevc")
  pub format: Option<HevcBitstreamFormat>,
}

/// Init dictionary for EncodedVideoChunk (W3C spec)
pub struct EncodedVideoChunkInit {
  /// Chunk type (key or delta)
  pub chunk_type: EncodedVideoChunkType,
  /// Timestamp in microseconds
  pub timestamp: i64,
  /// Duration in microseconds
  pub duration: Option<i64>,
  /// Encoded bytes
  pub data: MediaBuffer,
  /// Buffers to detach and move into the chunk
  pub transfer: Vec<MediaBuffer>,
}

/// EncodedVideoChunk - a container of encoded video bytes
///
/// The payload is opaque; `copy_to` extracts it. Chunks follow the same
/// detach contract as frames: `close()` releases the payload, after which
/// content observations fail with InvalidStateError.
pub struct EncodedVideoChunk {
  inner: Arc<RwLock<Option<ChunkData>>>,
  /// Timestamp is preserved after close
  timestamp: i64,
}

impl EncodedVideoChunk {
  /// Create a new EncodedVideoChunk
  pub fn new(init: EncodedVideoChunkInit) -> Result<Self> {
    let payload = take_payload(&init.data, &init.transfer)?;
    Ok(Self::from_data(ChunkData {
      key: init.chunk_type == EncodedVideoChunkType::Key,
      timestamp: init.timestamp,
      duration: init.duration,
      data: payload,
    }))
  }

  /// Wrap an encoder-produced carrier (crate-internal)
  pub(crate) fn from_data(data: ChunkData) -> Self {
    let timestamp = data.timestamp;
    Self {
      inner: Arc::new(RwLock::new(Some(data))),
      timestamp,
    }
  }

  /// Detach and move the carrier out (submit-side ownership transfer)
  pub(crate) fn take_data(&self) -> Result<ChunkData> {
    self
      .inner
      .write()
      .take()
      .ok_or_else(|| invalid_state_error("EncodedVideoChunk is closed"))
  }

  /// Chunk type; None once closed
  pub fn chunk_type(&self) -> Option<EncodedVideoChunkType> {
    self.inner.read().as_ref().map(|d| {
      if d.key {
        EncodedVideoChunkType::Key
      } else {
        EncodedVideoChunkType::Delta
      }
    })
  }

  /// Whether this is a key chunk
  pub fn is_key(&self) -> bool {
    self.chunk_type() == Some(EncodedVideoChunkType::Key)
  }

  /// Timestamp in microseconds; preserved after close
  pub fn timestamp(&self) -> i64 {
    self.timestamp
  }

  /// Duration in microseconds
  pub fn duration(&self) -> Option<i64> {
    self.inner.read().as_ref().and_then(|d| d.duration)
  }

  /// Payload size in bytes; 0 once closed
  pub fn byte_length(&self) -> u32 {
    self
      .inner
      .read()
      .as_ref()
      .map(|d| d.data.len() as u32)
      .unwrap_or(0)
  }

  /// Copy the payload into `destination`
  pub fn copy_to(&self, destination: &mut [u8]) -> Result<()> {
    let guard = self.inner.read();
    let data = guard
      .as_ref()
      .ok_or_else(|| invalid_state_error("EncodedVideoChunk is closed"))?;
    if destination.len() < data.data.len() {
      return Err(range_error(format!(
        "destination buffer too small: need {} bytes, got {}",
        data.data.len(),
        destination.len()
      )));
    }
    destination[..data.data.len()].copy_from_slice(&data.data);
    Ok(())
  }

  /// Create a new chunk sharing this chunk's payload
  pub fn clone_chunk(&self) -> Result<EncodedVideoChunk> {
    let guard = self.inner.read();
    let data = guard
      .as_ref()
      .ok_or_else(|| invalid_state_error("EncodedVideoChunk is closed"))?;
    Ok(Self::from_data(data.clone()))
  }

  /// Close and release the payload reference. Idempotent.
  pub fn close(&self) {
    self.inner.write().take();
  }
}

impl std::fmt::Debug for EncodedVideoChunk {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("EncodedVideoChunk")
      .field("type", &self.chunk_type())
      .field("timestamp", &self.timestamp)
      .field("byte_length", &self.byte_length())
      .finish()
  }
}

/// Video encoder configuration (WebCodecs spec)
///
/// Required members are stored as Option so that isConfigSupported() can
/// reject with TypeError for missing fields rather than failing to
/// construct; configure() validates them synchronously.
#[derive(Debug, Clone, Default)]
pub struct VideoEncoderConfig {
  /// Codec string (e.g. "avc1.42001E", "vp8", "vp09.00.10.08")
  pub codec: Option<String>,
  /// Coded width in pixels
  pub width: Option<u32>,
  /// Coded height in pixels
  pub height: Option<u32>,
  /// Display width (defaults to width)
  pub display_width: Option<u32>,
  /// Display height (defaults to height)
  pub display_height: Option<u32>,
  /// Target bitrate in bits per second
  pub bitrate: Option<f64>,
  /// Frames per second
  pub framerate: Option<f64>,
  /// Hardware acceleration preference
  pub hardware_acceleration: Option<HardwareAcceleration>,
  /// Latency mode
  pub latency_mode: Option<LatencyMode>,
  /// Bitrate mode
  pub bitrate_mode: Option<VideoEncoderBitrateMode>,
  /// Alpha handling
  pub alpha: Option<AlphaOption>,
  /// Scalability mode (SVC), e.g. "L1T1", "L1T2", "L1T3"
  pub scalability_mode: Option<String>,
  /// Content hint for encoder tuning
  pub content_hint: Option<String>,
  /// AVC (H.264) codec-specific configuration
  pub avc: Option<AvcEncoderConfig>,
  /// HEVC (H.265) codec-specific configuration
  pub hevc: Option<HevcEncoderConfig>,
}

impl VideoEncoderConfig {
  /// Config with the required members set
  pub fn new(codec: impl Into<String>, width: u32, height: u32) -> Self {
    Self {
      codec: Some(codec.into()),
      width: Some(width),
      height: Some(height),
      ..Default::default()
    }
  }

  /// Canonical echo for isConfigSupported: recognized members only,
  /// codec-specific boxes stripped when the codec family does not match.
  pub(crate) fn canonicalize(&self) -> Self {
    let mut config = self.clone();
    let family = self
      .codec
      .as_deref()
      .and_then(parse_video_codec_string)
      .map(|p| p.codec);
    if family != Some(VideoCodec::H264) {
      config.avc = None;
    }
    if family != Some(VideoCodec::Hevc) {
      config.hevc = None;
    }
    config
  }
}

/// Video decoder configuration (WebCodecs spec)
#[derive(Debug, Clone, Default)]
pub struct VideoDecoderConfig {
  /// Codec string
  pub codec: Option<String>,
  /// Coded width in pixels; may be learned from the bitstream
  pub coded_width: Option<u32>,
  /// Coded height in pixels; may be learned from the bitstream
  pub coded_height: Option<u32>,
  /// Display aspect ratio width
  pub display_aspect_width: Option<u32>,
  /// Display aspect ratio height
  pub display_aspect_height: Option<u32>,
  /// Color space applied to output frames
  pub color_space: Option<VideoColorSpace>,
  /// Hardware acceleration preference
  pub hardware_acceleration: Option<HardwareAcceleration>,
  /// Optimize for latency
  pub optimize_for_latency: Option<bool>,
  /// Codec-specific description (e.g. avcC for H.264)
  pub description: Option<Vec<u8>>,
  /// Rotation applied to output frames (0, 90, 180, 270)
  pub rotation: Option<f64>,
  /// Horizontal flip applied to output frames
  pub flip: Option<bool>,
}

impl VideoDecoderConfig {
  /// Config with the required member set
  pub fn new(codec: impl Into<String>) -> Self {
    Self {
      codec: Some(codec.into()),
      ..Default::default()
    }
  }

  pub(crate) fn canonicalize(&self) -> Self {
    self.clone()
  }
}

/// Result of VideoEncoder::is_config_supported
#[derive(Debug, Clone)]
pub struct VideoEncoderSupport {
  /// Whether the configuration is supported
  pub supported: bool,
  /// Canonicalized copy of the checked configuration
  pub config: VideoEncoderConfig,
}

/// Result of VideoDecoder::is_config_supported
#[derive(Debug, Clone)]
pub struct VideoDecoderSupport {
  /// Whether the configuration is supported
  pub supported: bool,
  /// Canonicalized copy of the checked configuration
  pub config: VideoDecoderConfig,
}

//! EncodedAudioChunk - WebCodecs API implementation
//!
//! Represents a chunk of encoded audio data plus the audio encoder and
//! decoder configuration dictionaries.
//! See: https://developer.mozilla.org/en-US/docs/Web/API/EncodedAudioChunk

use crate::codec::ChunkData;
use crate::webcodecs::codec_string::{parse_audio_codec_string, AudioCodec};
use crate::webcodecs::error::{invalid_state_error, range_error, type_error, Result, WebCodecsError};
use crate::webcodecs::media_buffer::{take_payload, MediaBuffer};
use parking_lot::RwLock;
use std::str::FromStr;
use std::sync::Arc;

/// Encoded audio chunk type (WebCodecs spec)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodedAudioChunkType {
  Key,
  Delta,
}

impl EncodedAudioChunkType {
  pub fn as_str(&self) -> &'static str {
    match self {
      EncodedAudioChunkType::Key => "key",
      EncodedAudioChunkType::Delta => "delta",
    }
  }
}

impl FromStr for EncodedAudioChunkType {
  type Err = WebCodecsError;

  fn from_str(s: &str) -> Result<Self> {
    match s {
      "key" => Ok(EncodedAudioChunkType::Key),
      "delta" => Ok(EncodedAudioChunkType::Delta),
      other => Err(type_error(format!("invalid chunk type: {other}"))),
    }
  }
}

/// Bitrate mode for audio encoders (W3C spec enum)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitrateMode {
  #[default]
  Variable,
  Constant,
}

/// Opus bitstream format (W3C WebCodecs Opus Registration)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpusBitstreamFormat {
  #[default]
  Opus,
  Ogg,
}

/// Opus encoder configuration (W3C WebCodecs Opus Registration)
#[derive(Debug, Clone, Default)]
pub struct OpusEncoderConfig {
  pub format: Option<OpusBitstreamFormat>,
  /// Frame duration in microseconds
  pub frame_duration: Option<f64>,
  /// Encoder complexity, 0-10
  pub complexity: Option<u32>,
  /// Expected packet loss percentage, 0-100
  pub packetlossperc: Option<u32>,
  /// In-band forward error correction
  pub useinbandfec: Option<bool>,
  /// Discontinuous transmission
  pub usedtx: Option<bool>,
}

/// AAC bitstream format (W3C WebCodecs AAC Registration)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AacBitstreamFormat {
  /// Raw AAC with decoder description
  #[default]
  Aac,
  /// Self-describing ADTS frames
  Adts,
}

/// AAC encoder configuration (W3C WebCodecs AAC Registration)
#[derive(Debug, Clone, Default)]
pub struct AacEncoderConfig {
  /// Bitstream format (default: "aac")
  pub format: Option<AacBitstreamFormat>,
}

/// FLAC encoder configuration (W3C WebCodecs FLAC Registration)
#[derive(Debug, Clone, Default)]
pub struct FlacEncoderConfig {
  pub block_size: Option<u32>,
  pub compress_level: Option<u32>,
}

/// Init dictionary for EncodedAudioChunk (W3C spec)
pub struct EncodedAudioChunkInit {
  pub chunk_type: EncodedAudioChunkType,
  /// Timestamp in microseconds
  pub timestamp: i64,
  /// Duration in microseconds
  pub duration: Option<i64>,
  /// Encoded bytes
  pub data: MediaBuffer,
  /// Buffers to detach and move into the chunk
  pub transfer: Vec<MediaBuffer>,
}

/// EncodedAudioChunk - a container of encoded audio bytes
pub struct EncodedAudioChunk {
  inner: Arc<RwLock<Option<ChunkData>>>,
  /// Timestamp is preserved after close
  timestamp: i64,
}

impl EncodedAudioChunk {
  /// Create a new EncodedAudioChunk
  pub fn new(init: EncodedAudioChunkInit) -> Result<Self> {
    let payload = take_payload(&init.data, &init.transfer)?;
    Ok(Self::from_data(ChunkData {
      key: init.chunk_type == EncodedAudioChunkType::Key,
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
      .ok_or_else(|| invalid_state_error("EncodedAudioChunk is closed"))
  }

  /// Chunk type; None once closed
  pub fn chunk_type(&self) -> Option<EncodedAudioChunkType> {
    self.inner.read().as_ref().map(|d| {
      if d.key {
        EncodedAudioChunkType::Key
      } else {
        EncodedAudioChunkType::Delta
      }
    })
  }

  /// Whether this is a key chunk
  pub fn is_key(&self) -> bool {
    self.chunk_type() == Some(EncodedAudioChunkType::Key)
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
      .ok_or_else(|| invalid_state_error("EncodedAudioChunk is closed"))?;
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
  pub fn clone_chunk(&self) -> Result<EncodedAudioChunk> {
    let guard = self.inner.read();
    let data = guard
      .as_ref()
      .ok_or_else(|| invalid_state_error("EncodedAudioChunk is closed"))?;
    Ok(Self::from_data(data.clone()))
  }

  /// Close and release the payload reference. Idempotent.
  pub fn close(&self) {
    self.inner.write().take();
  }
}

impl std::fmt::Debug for EncodedAudioChunk {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("EncodedAudioChunk")
      .field("type", &self.chunk_type())
      .field("timestamp", &self.timestamp)
      .field("byte_length", &self.byte_length())
      .finish()
  }
}

/// Audio encoder configuration (WebCodecs spec)
#[derive(Debug, Clone, Default)]
pub struct AudioEncoderConfig {
  /// Codec string (e.g. "mp4a.40.2", "opus", "flac")
  pub codec: Option<String>,
  /// Sample rate in Hz
  pub sample_rate: Option<f64>,
  /// Number of channels
  pub number_of_channels: Option<u32>,
  /// Target bitrate in bits per second
  pub bitrate: Option<f64>,
  /// Bitrate mode
  pub bitrate_mode: Option<BitrateMode>,
  /// Opus codec-specific configuration
  pub opus: Option<OpusEncoderConfig>,
  /// AAC codec-specific configuration
  pub aac: Option<AacEncoderConfig>,
  /// FLAC codec-specific configuration
  pub flac: Option<FlacEncoderConfig>,
}

impl AudioEncoderConfig {
  /// Config with the required members set
  pub fn new(codec: impl Into<String>, sample_rate: f64, number_of_channels: u32) -> Self {
    Self {
      codec: Some(codec.into()),
      sample_rate: Some(sample_rate),
      number_of_channels: Some(number_of_channels),
      ..Default::default()
    }
  }

  /// Canonical echo for isConfigSupported: recognized members only,
  /// codec-specific boxes stripped when the codec family does not match.
  pub(crate) fn canonicalize(&self) -> Self {
    let mut config = self.clone();
    let family = self.codec.as_deref().and_then(parse_audio_codec_string);
    if family != Some(AudioCodec::Opus) {
      config.opus = None;
    }
    if family != Some(AudioCodec::Aac) {
      config.aac = None;
    }
    if family != Some(AudioCodec::Flac) {
      config.flac = None;
    }
    config
  }
}

/// Audio decoder configuration (WebCodecs spec)
#[derive(Debug, Clone, Default)]
pub struct AudioDecoderConfig {
  /// Codec string
  pub codec: Option<String>,
  /// Sample rate in Hz
  pub sample_rate: Option<f64>,
  /// Number of channels
  pub number_of_channels: Option<u32>,
  /// Codec-specific description (e.g. AudioSpecificConfig for AAC)
  pub description: Option<Vec<u8>>,
}

impl AudioDecoderConfig {
  /// Config with the required members set
  pub fn new(codec: impl Into<String>, sample_rate: f64, number_of_channels: u32) -> Self {
    Self {
      codec: Some(codec.into()),
      sample_rate: Some(sample_rate),
      number_of_channels: Some(number_of_channels),
      description: None,
    }
  }

  pub(crate) fn canonicalize(&self) -> Self {
    self.clone()
  }
}

/// Result of AudioEncoder::is_config_supported
#[derive(Debug, Clone)]
pub struct AudioEncoderSupport {
  pub supported: bool,
  pub config: AudioEncoderConfig,
}

/// Result of AudioDecoder::is_config_supported
#[derive(Debug, Clone)]
pub struct AudioDecoderSupport {
  pub supported: bool,
  pub config: AudioDecoderConfig,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_chunk_detach_contract() {
    let chunk = EncodedAudioChunk::new(EncodedAudioChunkInit {
      chunk_type: EncodedAudioChunkType::Key,
      timestamp: 42,
      duration: None,
      data: MediaBuffer::new(vec![1u8, 2, 3]),
      transfer: Vec::new(),
    })
    .unwrap();

    assert_eq!(chunk.byte_length(), 3);
    assert!(chunk.is_key());

    chunk.close();
    assert_eq!(chunk.byte_length(), 0);
    assert_eq!(chunk.timestamp(), 42);
    let mut dest = vec![0u8; 3];
    assert_eq!(
      chunk.copy_to(&mut dest).unwrap_err().name(),
      "InvalidStateError"
    );
  }

  #[test]
  fn test_undersized_copy_is_range_error() {
    let chunk = EncodedAudioChunk::new(EncodedAudioChunkInit {
      chunk_type: EncodedAudioChunkType::Delta,
      timestamp: 0,
      duration: Some(10),
      data: MediaBuffer::new(vec![0u8; 10]),
      transfer: Vec::new(),
    })
    .unwrap();
    let mut dest = vec![0u8; 9];
    assert_eq!(chunk.copy_to(&mut dest).unwrap_err().name(), "RangeError");
  }

  #[test]
  fn test_canonicalize_strips_mismatched_boxes() {
    let mut config = AudioEncoderConfig::new("mp4a.40.2", 48_000.0, 2);
    config.opus = Some(OpusEncoderConfig::default());
    config.aac = Some(AacEncoderConfig {
      format: Some(AacBitstreamFormat::Adts),
    });
    let canonical = config.canonicalize();
    assert!(canonical.opus.is_none());
    assert!(canonical.aac.is_some());
  }
}

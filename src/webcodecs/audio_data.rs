//! AudioData - WebCodecs API implementation
//!
//! Represents uncompressed audio data that can be encoded or played.
//! See: https://developer.mozilla.org/en-US/docs/Web/API/AudioData

use crate::codec::AudioFrameData;
use crate::webcodecs::error::{
  invalid_state_error, not_supported_error, range_error, type_error, Result,
};
use crate::webcodecs::media_buffer::{take_payload, MediaBuffer};
use parking_lot::Mutex;
use std::sync::Arc;

/// Audio sample format (WebCodecs spec)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioSampleFormat {
  /// Unsigned 8-bit integer samples, interleaved
  U8,
  /// Signed 16-bit integer samples, interleaved
  S16,
  /// Signed 32-bit integer samples, interleaved
  S32,
  /// 32-bit float samples, interleaved
  F32,
  /// Unsigned 8-bit integer samples, planar
  U8Planar,
  /// Signed 16-bit integer samples, planar
  S16Planar,
  /// Signed 32-bit integer samples, planar
  S32Planar,
  /// 32-bit float samples, planar
  F32Planar,
}

impl AudioSampleFormat {
  /// Get bytes per sample
  pub fn bytes_per_sample(&self) -> usize {
    match self {
      AudioSampleFormat::U8 | AudioSampleFormat::U8Planar => 1,
      AudioSampleFormat::S16 | AudioSampleFormat::S16Planar => 2,
      AudioSampleFormat::S32
      | AudioSampleFormat::S32Planar
      | AudioSampleFormat::F32
      | AudioSampleFormat::F32Planar => 4,
    }
  }

  /// Check if this is a planar format
  pub fn is_planar(&self) -> bool {
    matches!(
      self,
      AudioSampleFormat::U8Planar
        | AudioSampleFormat::S16Planar
        | AudioSampleFormat::S32Planar
        | AudioSampleFormat::F32Planar
    )
  }

  /// The interleaved/planar pair this format belongs to. copyTo may
  /// convert between the two members of a pair but never across pairs.
  fn base(&self) -> AudioSampleFormat {
    match self {
      AudioSampleFormat::U8 | AudioSampleFormat::U8Planar => AudioSampleFormat::U8,
      AudioSampleFormat::S16 | AudioSampleFormat::S16Planar => AudioSampleFormat::S16,
      AudioSampleFormat::S32 | AudioSampleFormat::S32Planar => AudioSampleFormat::S32,
      AudioSampleFormat::F32 | AudioSampleFormat::F32Planar => AudioSampleFormat::F32,
    }
  }
}

/// Options for creating an AudioData (W3C WebCodecs spec)
pub struct AudioDataInit {
  /// Sample format (required)
  pub format: AudioSampleFormat,
  /// Sample rate in Hz (required) - W3C spec uses float
  pub sample_rate: f64,
  /// Number of frames (samples per channel) (required)
  pub number_of_frames: u32,
  /// Number of channels (required)
  pub number_of_channels: u32,
  /// Timestamp in microseconds (required)
  pub timestamp: i64,
  /// Raw audio sample data (required)
  pub data: MediaBuffer,
  /// Buffers to detach and move into the object
  pub transfer: Vec<MediaBuffer>,
}

/// Options for copyTo / allocationSize
///
/// `plane_index` is required per spec: interleaved formats only have
/// plane 0, planar formats one plane per channel.
#[derive(Debug, Clone)]
pub struct AudioDataCopyToOptions {
  /// The index of the audio plane to copy (required)
  pub plane_index: u32,
  /// The offset in frames to start copying from
  pub frame_offset: Option<u32>,
  /// The number of frames to copy (defaults to all remaining)
  pub frame_count: Option<u32>,
  /// Target format; only planarity conversion of the same sample type
  pub format: Option<AudioSampleFormat>,
}

impl AudioDataCopyToOptions {
  pub fn plane(plane_index: u32) -> Self {
    Self {
      plane_index,
      frame_offset: None,
      frame_count: None,
      format: None,
    }
  }
}

/// AudioData - represents uncompressed audio samples
///
/// The payload keeps the layout it was constructed with (interleaved or
/// planar); `copy_to` interleaves or deinterleaves on the way out.
pub struct AudioData {
  inner: Arc<Mutex<Option<AudioFrameData>>>,
  /// Timestamp is preserved after close per W3C spec
  timestamp: i64,
}

impl AudioData {
  /// Create a new AudioData (W3C WebCodecs spec)
  pub fn new(init: AudioDataInit) -> Result<Self> {
    if init.sample_rate <= 0.0 {
      return Err(type_error("sampleRate must be greater than 0"));
    }
    if init.number_of_frames == 0 {
      return Err(type_error("numberOfFrames must be greater than 0"));
    }
    if init.number_of_channels == 0 {
      return Err(type_error("numberOfChannels must be greater than 0"));
    }

    let expected = init.number_of_frames as usize
      * init.number_of_channels as usize
      * init.format.bytes_per_sample();
    let payload = take_payload(&init.data, &init.transfer)?;
    if payload.len() < expected {
      return Err(type_error(format!(
        "data buffer too small: need {} bytes, got {}",
        expected,
        payload.len()
      )));
    }

    let data = AudioFrameData {
      format: init.format,
      sample_rate: init.sample_rate,
      number_of_frames: init.number_of_frames,
      number_of_channels: init.number_of_channels,
      timestamp: init.timestamp,
      data: payload,
    };

    Ok(Self::from_data(data))
  }

  /// Wrap a decoder-produced carrier (crate-internal)
  pub(crate) fn from_data(data: AudioFrameData) -> Self {
    let timestamp = data.timestamp;
    Self {
      inner: Arc::new(Mutex::new(Some(data))),
      timestamp,
    }
  }

  /// Detach and move the carrier out (submit-side ownership transfer)
  pub(crate) fn take_data(&self) -> Result<AudioFrameData> {
    self
      .inner
      .lock()
      .take()
      .ok_or_else(|| invalid_state_error("AudioData is closed"))
  }

  // ========================================================================
  // Properties (WebCodecs spec)
  // ========================================================================

  /// Sample format; None once closed
  pub fn format(&self) -> Option<AudioSampleFormat> {
    self.inner.lock().as_ref().map(|d| d.format)
  }

  /// Sample rate in Hz; 0 once closed
  pub fn sample_rate(&self) -> f64 {
    self.inner.lock().as_ref().map(|d| d.sample_rate).unwrap_or(0.0)
  }

  /// Number of frames (samples per channel); 0 once closed
  pub fn number_of_frames(&self) -> u32 {
    self
      .inner
      .lock()
      .as_ref()
      .map(|d| d.number_of_frames)
      .unwrap_or(0)
  }

  /// Number of channels; 0 once closed
  pub fn number_of_channels(&self) -> u32 {
    self
      .inner
      .lock()
      .as_ref()
      .map(|d| d.number_of_channels)
      .unwrap_or(0)
  }

  /// Duration in microseconds, derived from frames and rate; 0 once closed
  pub fn duration(&self) -> i64 {
    self
      .inner
      .lock()
      .as_ref()
      .map(|d| (d.number_of_frames as f64 / d.sample_rate * 1_000_000.0) as i64)
      .unwrap_or(0)
  }

  /// Timestamp in microseconds; preserved after close per W3C spec
  pub fn timestamp(&self) -> i64 {
    self.timestamp
  }

  /// Whether this AudioData has been closed
  pub fn closed(&self) -> bool {
    self.inner.lock().is_none()
  }

  /// Number of planes: numberOfChannels for planar formats, else 1
  pub fn number_of_planes(&self) -> Result<u32> {
    let guard = self.inner.lock();
    let data = guard
      .as_ref()
      .ok_or_else(|| invalid_state_error("AudioData is closed"))?;
    Ok(plane_count(data))
  }

  // ========================================================================
  // Methods (WebCodecs spec)
  // ========================================================================

  /// The destination byte length required by `copy_to` with the same options
  pub fn allocation_size(&self, options: &AudioDataCopyToOptions) -> Result<u32> {
    let guard = self.inner.lock();
    let data = guard
      .as_ref()
      .ok_or_else(|| invalid_state_error("AudioData is closed"))?;

    let plan = resolve_copy_plan(data, options)?;
    Ok(plan.byte_length() as u32)
  }

  /// Copy samples into `destination`. Synchronous; completes once the copy
  /// is done. Fails with InvalidStateError when closed, RangeError when the
  /// plane index or frame range is out of bounds or the destination is
  /// undersized.
  pub fn copy_to(&self, destination: &mut [u8], options: &AudioDataCopyToOptions) -> Result<()> {
    let guard = self.inner.lock();
    let data = guard
      .as_ref()
      .ok_or_else(|| invalid_state_error("AudioData is closed"))?;

    let plan = resolve_copy_plan(data, options)?;
    let needed = plan.byte_length();
    if destination.len() < needed {
      return Err(range_error(format!(
        "destination buffer too small: need {} bytes, got {}",
        needed,
        destination.len()
      )));
    }

    let bps = data.format.bytes_per_sample();
    let channels = data.number_of_channels as usize;
    let src = &data.data;

    match (data.format.is_planar(), plan.dest_planar) {
      (true, true) => {
        // Planar to planar: contiguous run within one source plane
        let plane_size = data.number_of_frames as usize * bps;
        let start = plan.plane_index * plane_size + plan.frame_offset * bps;
        destination[..needed].copy_from_slice(&src[start..start + needed]);
      }
      (false, false) => {
        // Interleaved to interleaved: contiguous run
        let start = plan.frame_offset * channels * bps;
        destination[..needed].copy_from_slice(&src[start..start + needed]);
      }
      (false, true) => {
        // Interleaved source, extract one channel
        for i in 0..plan.frame_count {
          let src_off = ((plan.frame_offset + i) * channels + plan.plane_index) * bps;
          destination[i * bps..(i + 1) * bps].copy_from_slice(&src[src_off..src_off + bps]);
        }
      }
      (true, false) => {
        // Planar source, interleave all channels
        let plane_size = data.number_of_frames as usize * bps;
        for i in 0..plan.frame_count {
          for ch in 0..channels {
            let src_off = ch * plane_size + (plan.frame_offset + i) * bps;
            let dst_off = (i * channels + ch) * bps;
            destination[dst_off..dst_off + bps].copy_from_slice(&src[src_off..src_off + bps]);
          }
        }
      }
    }

    Ok(())
  }

  /// Create a copy of this AudioData sharing the payload
  pub fn clone_audio_data(&self) -> Result<AudioData> {
    let guard = self.inner.lock();
    let data = guard
      .as_ref()
      .ok_or_else(|| invalid_state_error("AudioData is closed"))?;
    Ok(Self::from_data(data.clone()))
  }

  /// Close and release the payload reference. Idempotent.
  pub fn close(&self) {
    self.inner.lock().take();
  }
}

impl std::fmt::Debug for AudioData {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let guard = self.inner.lock();
    if let Some(ref d) = *guard {
      return f
        .debug_struct("AudioData")
        .field("format", &d.format)
        .field("sample_rate", &d.sample_rate)
        .field("number_of_frames", &d.number_of_frames)
        .field("number_of_channels", &d.number_of_channels)
        .field("timestamp", &d.timestamp)
        .finish();
    }
    f.debug_struct("AudioData").field("closed", &true).finish()
  }
}

fn plane_count(data: &AudioFrameData) -> u32 {
  if data.format.is_planar() {
    data.number_of_channels
  } else {
    1
  }
}

/// Validated copy parameters shared by allocation_size and copy_to
struct CopyPlan {
  plane_index: usize,
  frame_offset: usize,
  frame_count: usize,
  dest_planar: bool,
  dest_channels: usize,
  bytes_per_sample: usize,
}

impl CopyPlan {
  fn byte_length(&self) -> usize {
    if self.dest_planar {
      self.frame_count * self.bytes_per_sample
    } else {
      self.frame_count * self.dest_channels * self.bytes_per_sample
    }
  }
}

fn resolve_copy_plan(data: &AudioFrameData, options: &AudioDataCopyToOptions) -> Result<CopyPlan> {
  let dest_format = options.format.unwrap_or(data.format);
  if dest_format.base() != data.format.base() {
    return Err(not_supported_error(format!(
      "cannot convert {:?} samples to {:?}",
      data.format, dest_format
    )));
  }

  let num_planes = if dest_format.is_planar() {
    data.number_of_channels
  } else {
    1
  };
  if options.plane_index >= num_planes {
    return Err(range_error(format!(
      "planeIndex {} is out of bounds (numberOfPlanes is {})",
      options.plane_index, num_planes
    )));
  }

  let frame_offset = options.frame_offset.unwrap_or(0);
  if frame_offset >= data.number_of_frames {
    return Err(range_error(format!(
      "frameOffset {} is out of bounds (numberOfFrames is {})",
      frame_offset, data.number_of_frames
    )));
  }
  let remaining = data.number_of_frames - frame_offset;
  let frame_count = options.frame_count.unwrap_or(remaining);
  if frame_count > remaining {
    return Err(range_error(format!(
      "frameCount {frame_count} exceeds the {remaining} remaining frames"
    )));
  }

  Ok(CopyPlan {
    plane_index: options.plane_index as usize,
    frame_offset: frame_offset as usize,
    frame_count: frame_count as usize,
    dest_planar: dest_format.is_planar(),
    dest_channels: data.number_of_channels as usize,
    bytes_per_sample: data.format.bytes_per_sample(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn stereo_s16(frames: u32) -> AudioData {
    // Interleaved pattern: frame i carries [2i, 2i+1]
    let mut samples: Vec<u8> = Vec::new();
    for i in 0..frames as i16 {
      samples.extend_from_slice(&(2 * i).to_le_bytes());
      samples.extend_from_slice(&(2 * i + 1).to_le_bytes());
    }
    AudioData::new(AudioDataInit {
      format: AudioSampleFormat::S16,
      sample_rate: 48_000.0,
      number_of_frames: frames,
      number_of_channels: 2,
      timestamp: 0,
      data: MediaBuffer::new(samples),
      transfer: Vec::new(),
    })
    .unwrap()
  }

  #[test]
  fn test_undersized_input_fails_construction() {
    let err = AudioData::new(AudioDataInit {
      format: AudioSampleFormat::F32,
      sample_rate: 44_100.0,
      number_of_frames: 100,
      number_of_channels: 2,
      timestamp: 0,
      data: MediaBuffer::new(vec![0u8; 100]),
      transfer: Vec::new(),
    })
    .unwrap_err();
    assert_eq!(err.name(), "TypeError");
  }

  #[test]
  fn test_zero_parameters_fail_construction() {
    for (rate, frames, channels) in [(0.0, 10, 2), (48_000.0, 0, 2), (48_000.0, 10, 0)] {
      let err = AudioData::new(AudioDataInit {
        format: AudioSampleFormat::U8,
        sample_rate: rate,
        number_of_frames: frames,
        number_of_channels: channels,
        timestamp: 0,
        data: MediaBuffer::new(vec![0u8; 64]),
        transfer: Vec::new(),
      })
      .unwrap_err();
      assert_eq!(err.name(), "TypeError");
    }
  }

  #[test]
  fn test_duration_is_derived() {
    let audio = stereo_s16(1024);
    // floor(1024 / 48000 * 1e6)
    assert_eq!(audio.duration(), 21_333);
  }

  #[test]
  fn test_close_zeroes_accessors() {
    let audio = stereo_s16(8);
    audio.close();
    audio.close();
    assert!(audio.closed());
    assert_eq!(audio.format(), None);
    assert_eq!(audio.sample_rate(), 0.0);
    assert_eq!(audio.number_of_frames(), 0);
    assert_eq!(audio.number_of_channels(), 0);
    assert_eq!(audio.duration(), 0);
    assert_eq!(
      audio.clone_audio_data().unwrap_err().name(),
      "InvalidStateError"
    );
    let mut dest = vec![0u8; 64];
    assert_eq!(
      audio
        .copy_to(&mut dest, &AudioDataCopyToOptions::plane(0))
        .unwrap_err()
        .name(),
      "InvalidStateError"
    );
  }

  #[test]
  fn test_interleaved_copy_plane_zero() {
    let audio = stereo_s16(4);
    let options = AudioDataCopyToOptions::plane(0);
    let size = audio.allocation_size(&options).unwrap();
    assert_eq!(size, 4 * 2 * 2);

    let mut dest = vec![0u8; size as usize];
    audio.copy_to(&mut dest, &options).unwrap();
    let first: i16 = i16::from_le_bytes([dest[0], dest[1]]);
    assert_eq!(first, 0);
    let second: i16 = i16::from_le_bytes([dest[2], dest[3]]);
    assert_eq!(second, 1);
  }

  #[test]
  fn test_interleaved_plane_index_must_be_zero() {
    let audio = stereo_s16(4);
    let err = audio
      .allocation_size(&AudioDataCopyToOptions::plane(1))
      .unwrap_err();
    assert_eq!(err.name(), "RangeError");
  }

  #[test]
  fn test_deinterleave_to_planar() {
    let audio = stereo_s16(4);
    let options = AudioDataCopyToOptions {
      plane_index: 1,
      frame_offset: None,
      frame_count: None,
      format: Some(AudioSampleFormat::S16Planar),
    };
    let size = audio.allocation_size(&options).unwrap();
    assert_eq!(size, 4 * 2);

    let mut dest = vec![0u8; size as usize];
    audio.copy_to(&mut dest, &options).unwrap();
    // Channel 1 carries the odd sample values
    for i in 0..4 {
      let v = i16::from_le_bytes([dest[i * 2], dest[i * 2 + 1]]);
      assert_eq!(v, 2 * i as i16 + 1);
    }
  }

  #[test]
  fn test_planar_source_interleaves() {
    // 3 frames, 2 channels planar u8: [ch0: 1 2 3][ch1: 10 20 30]
    let audio = AudioData::new(AudioDataInit {
      format: AudioSampleFormat::U8Planar,
      sample_rate: 8_000.0,
      number_of_frames: 3,
      number_of_channels: 2,
      timestamp: 0,
      data: MediaBuffer::new(vec![1u8, 2, 3, 10, 20, 30]),
      transfer: Vec::new(),
    })
    .unwrap();
    assert_eq!(audio.number_of_planes().unwrap(), 2);

    let options = AudioDataCopyToOptions {
      plane_index: 0,
      frame_offset: None,
      frame_count: None,
      format: Some(AudioSampleFormat::U8),
    };
    let mut dest = vec![0u8; 6];
    audio.copy_to(&mut dest, &options).unwrap();
    assert_eq!(dest, vec![1, 10, 2, 20, 3, 30]);
  }

  #[test]
  fn test_frame_window_copy() {
    let audio = stereo_s16(8);
    let options = AudioDataCopyToOptions {
      plane_index: 0,
      frame_offset: Some(6),
      frame_count: None,
      format: None,
    };
    assert_eq!(audio.allocation_size(&options).unwrap(), 2 * 2 * 2);

    let out_of_range = AudioDataCopyToOptions {
      plane_index: 0,
      frame_offset: Some(6),
      frame_count: Some(4),
      format: None,
    };
    assert_eq!(
      audio.allocation_size(&out_of_range).unwrap_err().name(),
      "RangeError"
    );
  }

  #[test]
  fn test_cross_type_conversion_not_supported() {
    let audio = stereo_s16(4);
    let options = AudioDataCopyToOptions {
      plane_index: 0,
      frame_offset: None,
      frame_count: None,
      format: Some(AudioSampleFormat::F32),
    };
    assert_eq!(
      audio.allocation_size(&options).unwrap_err().name(),
      "NotSupportedError"
    );
  }

  #[test]
  fn test_undersized_destination_is_range_error() {
    let audio = stereo_s16(4);
    let mut dest = vec![0u8; 4];
    assert_eq!(
      audio
        .copy_to(&mut dest, &AudioDataCopyToOptions::plane(0))
        .unwrap_err()
        .name(),
      "RangeError"
    );
  }
}

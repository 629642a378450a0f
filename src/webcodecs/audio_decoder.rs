//! AudioDecoder - WebCodecs API implementation
//!
//! Decodes EncodedAudioChunk objects into AudioData objects through a
//! pluggable audio decode engine.
//! See: https://developer.mozilla.org/en-US/docs/Web/API/AudioDecoder

use crate::codec::{AudioDecodeEngine, ChunkData, Configured};
use crate::webcodecs::audio_data::AudioData;
use crate::webcodecs::encoded_audio_chunk::{
  AudioDecoderConfig, AudioDecoderSupport, EncodedAudioChunk,
};
use crate::webcodecs::error::{
  abort_error, data_error, invalid_state_error, type_error, Result, WebCodecsError,
  WebCodecsErrorCallback,
};
use crate::webcodecs::queue::{CodecQueue, CodecState, EventListenerId, QueueLimits, WorkerHooks};
use parking_lot::Mutex;
use std::sync::Arc;

/// Output callback: receives each decoded AudioData
pub type AudioDecoderOutputCallback = Box<dyn FnMut(AudioData) + Send>;

/// Constructor callbacks (W3C AudioDecoderInit)
pub struct AudioDecoderInit {
  pub output: AudioDecoderOutputCallback,
  pub error: WebCodecsErrorCallback,
}

/// Worker-side callbacks: enforces the key-first rule
struct AudioDecoderHooks {
  output: AudioDecoderOutputCallback,
  error: WebCodecsErrorCallback,
  /// The first chunk after configure must be a key chunk
  awaiting_key: bool,
}

impl<E: AudioDecodeEngine> WorkerHooks<E> for AudioDecoderHooks {
  fn on_configured(&mut self, _config: &AudioDecoderConfig, _configured: &Configured) {
    self.awaiting_key = true;
  }

  fn filter_input(&mut self, chunk: ChunkData) -> Result<ChunkData> {
    if self.awaiting_key {
      if !chunk.key {
        return Err(data_error(
          "a key chunk is required after configure, got a delta chunk",
        ));
      }
      self.awaiting_key = false;
    }
    Ok(chunk)
  }

  fn on_output(&mut self, audio: crate::codec::AudioFrameData) {
    (self.output)(AudioData::from_data(audio));
  }

  fn on_error(&mut self, error: WebCodecsError) {
    (self.error)(error);
  }
}

/// AudioDecoder - WebCodecs-compliant audio decoder
///
/// Submissions are serialized through a bounded queue; decoded audio and
/// errors are delivered through the constructor callbacks from the
/// decoder's worker thread, never re-entrantly from inside `decode()`.
pub struct AudioDecoder<E: AudioDecodeEngine> {
  state: Mutex<CodecState>,
  queue: CodecQueue<E>,
}

impl<E: AudioDecodeEngine> AudioDecoder<E> {
  /// Create a new AudioDecoder driving `engine`
  pub fn new(engine: E, init: AudioDecoderInit) -> Self {
    let hooks = AudioDecoderHooks {
      output: init.output,
      error: init.error,
      awaiting_key: true,
    };
    Self {
      state: Mutex::new(CodecState::Unconfigured),
      queue: CodecQueue::new(engine, hooks, QueueLimits::default()),
    }
  }

  /// Decoder state
  pub fn state(&self) -> CodecState {
    *self.state.lock()
  }

  /// Number of pending decode submissions
  pub fn decode_queue_size(&self) -> u32 {
    self.queue.size()
  }

  /// Configure the decoder.
  ///
  /// Validates the config synchronously (TypeError), resets the queue and
  /// forwards the descriptor to the engine. Engine rejections surface
  /// asynchronously as NotSupportedError through the error callback.
  pub fn configure(&self, config: AudioDecoderConfig) -> Result<()> {
    let mut state = self.state.lock();
    if *state == CodecState::Closed {
      return Err(invalid_state_error("decoder is closed"));
    }

    validate_decoder_config(&config)?;

    *state = CodecState::Configured;
    self.queue.configure(config);
    Ok(())
  }

  /// Submit a chunk for decoding. Takes ownership: the chunk is detached
  /// before this returns.
  pub fn decode(&self, chunk: &EncodedAudioChunk) -> Result<()> {
    let state = self.state.lock();
    if *state != CodecState::Configured {
      return Err(invalid_state_error("decoder is not configured"));
    }
    self.queue.enqueue_with(|| chunk.take_data())
  }

  /// Drain the engine. The flush is registered before this returns; the
  /// future rejects with AbortError if reset or close lands first.
  pub fn flush(&self) -> impl std::future::Future<Output = Result<()>> + Send + 'static {
    let setup = {
      let state = self.state.lock();
      if *state != CodecState::Configured {
        Err(invalid_state_error("decoder is not configured"))
      } else {
        Ok(self.queue.begin_flush())
      }
    };
    async move {
      match setup?.await {
        Ok(result) => result,
        Err(_) => Err(abort_error("decoder closed during flush")),
      }
    }
  }

  /// Discard pending work and return to `unconfigured`. No-op when
  /// closed; never fires the error callback.
  pub fn reset(&self) {
    let mut state = self.state.lock();
    if *state == CodecState::Closed {
      return;
    }
    *state = CodecState::Unconfigured;
    self.queue.cancel();
  }

  /// Close the decoder and release the engine. Idempotent; never fires
  /// the error callback.
  pub fn close(&self) {
    let mut state = self.state.lock();
    if *state == CodecState::Closed {
      return;
    }
    *state = CodecState::Closed;
    self.queue.close();
  }

  /// Probe `config` support without constructing a decoder.
  pub async fn is_config_supported(config: AudioDecoderConfig) -> Result<AudioDecoderSupport> {
    validate_decoder_config(&config)?;

    let canonical = config.canonicalize();
    let support = E::is_config_supported(&canonical);
    Ok(AudioDecoderSupport {
      supported: support.supported,
      config: support.config.canonicalize(),
    })
  }

  // ======================================================================
  // dequeue event surface
  // ======================================================================

  /// Install (or clear) the `ondequeue` callback slot
  pub fn set_ondequeue(&self, callback: Option<Box<dyn Fn() + Send + Sync>>) {
    self.queue.set_ondequeue(callback.map(Arc::from));
  }

  pub fn add_event_listener(
    &self,
    event_type: &str,
    callback: impl Fn() + Send + Sync + 'static,
  ) -> EventListenerId {
    self.queue.add_event_listener(event_type, callback)
  }

  pub fn remove_event_listener(&self, id: EventListenerId) {
    self.queue.remove_event_listener(id)
  }

  pub fn dispatch_event(&self, event_type: &str) {
    self.queue.dispatch_event(event_type)
  }
}

/// Synchronous (TypeError) validation shared by configure and
/// isConfigSupported
fn validate_decoder_config(config: &AudioDecoderConfig) -> Result<()> {
  match config.codec.as_deref() {
    None | Some("") => return Err(type_error("codec is required")),
    Some(_) => {}
  }
  match config.sample_rate {
    Some(rate) if rate > 0.0 => {}
    Some(_) => return Err(type_error("sampleRate must be greater than 0")),
    None => return Err(type_error("sampleRate is required")),
  }
  match config.number_of_channels {
    Some(channels) if channels > 0 => {}
    Some(_) => return Err(type_error("numberOfChannels must be greater than 0")),
    None => return Err(type_error("numberOfChannels is required")),
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::codec::fake::{FakeAudioDecoder, FakeAudioEncoder};
  use crate::webcodecs::audio_data::{AudioDataCopyToOptions, AudioDataInit, AudioSampleFormat};
  use crate::webcodecs::audio_encoder::{AudioEncoder, AudioEncoderInit};
  use crate::webcodecs::encoded_audio_chunk::{
    AudioEncoderConfig, EncodedAudioChunkInit, EncodedAudioChunkType,
  };
  use crate::webcodecs::media_buffer::MediaBuffer;
  use std::time::Duration;

  type Decoded = Arc<Mutex<Vec<AudioData>>>;
  type Errors = Arc<Mutex<Vec<WebCodecsError>>>;

  fn decoder_with_sinks() -> (AudioDecoder<FakeAudioDecoder>, Decoded, Errors) {
    let decoded: Decoded = Arc::new(Mutex::new(Vec::new()));
    let errors: Errors = Arc::new(Mutex::new(Vec::new()));
    let audio_sink = decoded.clone();
    let error_sink = errors.clone();
    let decoder = AudioDecoder::new(
      FakeAudioDecoder::new(),
      AudioDecoderInit {
        output: Box::new(move |audio| {
          audio_sink.lock().push(audio);
        }),
        error: Box::new(move |error| {
          error_sink.lock().push(error);
        }),
      },
    );
    (decoder, decoded, errors)
  }

  /// Encode 5 AudioData objects of a 440 Hz stereo sine and return chunks
  async fn encode_sine_chunks() -> Vec<EncodedAudioChunk> {
    let chunks = Arc::new(Mutex::new(Vec::new()));
    let sink = chunks.clone();
    let encoder = AudioEncoder::new(
      FakeAudioEncoder::new(),
      AudioEncoderInit {
        output: Box::new(move |chunk, _| {
          sink.lock().push(chunk);
        }),
        error: Box::new(|_| {}),
      },
    );
    let mut config = AudioEncoderConfig::new("mp4a.40.2", 48_000.0, 2);
    config.bitrate = Some(128_000.0);
    encoder.configure(config).unwrap();

    let step = (1024.0 / 48_000.0 * 1_000_000.0) as i64;
    for i in 0..5 {
      let mut samples = Vec::with_capacity(1024 * 2 * 4);
      for n in 0..1024u32 {
        let t = (i as u32 * 1024 + n) as f32 / 48_000.0;
        let value = (t * 440.0 * 2.0 * std::f32::consts::PI).sin();
        samples.extend_from_slice(&value.to_le_bytes());
        samples.extend_from_slice(&value.to_le_bytes());
      }
      let audio = AudioData::new(AudioDataInit {
        format: AudioSampleFormat::F32,
        sample_rate: 48_000.0,
        number_of_frames: 1024,
        number_of_channels: 2,
        timestamp: i * step,
        data: MediaBuffer::new(samples),
        transfer: Vec::new(),
      })
      .unwrap();
      encoder.encode(&audio).unwrap();
    }
    encoder.flush().await.unwrap();
    let collected = chunks.lock().drain(..).collect();
    collected
  }

  #[tokio::test]
  async fn test_audio_round_trip() {
    let chunks = encode_sine_chunks().await;
    assert_eq!(chunks.len(), 5);

    let (decoder, decoded, errors) = decoder_with_sinks();
    decoder
      .configure(AudioDecoderConfig::new("mp4a.40.2", 48_000.0, 2))
      .unwrap();
    for chunk in &chunks {
      decoder.decode(chunk).unwrap();
    }
    decoder.flush().await.unwrap();

    let decoded = decoded.lock();
    assert!(!decoded.is_empty());
    assert!(errors.lock().is_empty());

    let mut timestamps = Vec::new();
    for audio in decoded.iter() {
      assert_eq!(audio.sample_rate(), 48_000.0);
      assert_eq!(audio.number_of_channels(), 2);
      timestamps.push(audio.timestamp());
    }
    // Sorted timestamps are monotonically non-decreasing from zero
    let mut sorted = timestamps.clone();
    sorted.sort_unstable();
    assert_eq!(timestamps, sorted);
    assert!(sorted[0] >= 0);
    assert_eq!(decoder.decode_queue_size(), 0);
  }

  #[tokio::test]
  async fn test_round_trip_preserves_samples() {
    let chunks = encode_sine_chunks().await;
    let (decoder, decoded, _) = decoder_with_sinks();
    decoder
      .configure(AudioDecoderConfig::new("mp4a.40.2", 48_000.0, 2))
      .unwrap();
    decoder.decode(&chunks[0]).unwrap();
    decoder.flush().await.unwrap();

    let decoded = decoded.lock();
    let audio = &decoded[0];
    assert_eq!(audio.number_of_frames(), 1024);

    // First frame of a sine starting at t=0 is silence
    let mut dest = vec![0u8; audio.allocation_size(&AudioDataCopyToOptions::plane(0)).unwrap() as usize];
    audio
      .copy_to(&mut dest, &AudioDataCopyToOptions::plane(0))
      .unwrap();
    let first = f32::from_le_bytes([dest[0], dest[1], dest[2], dest[3]]);
    assert!(first.abs() < 1e-6);
  }

  #[tokio::test]
  async fn test_first_chunk_must_be_key() {
    let (decoder, decoded, errors) = decoder_with_sinks();
    decoder
      .configure(AudioDecoderConfig::new("opus", 48_000.0, 2))
      .unwrap();

    let delta = EncodedAudioChunk::new(EncodedAudioChunkInit {
      chunk_type: EncodedAudioChunkType::Delta,
      timestamp: 0,
      duration: None,
      data: MediaBuffer::new(vec![0u8; 16]),
      transfer: Vec::new(),
    })
    .unwrap();
    decoder.decode(&delta).unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    let errors = errors.lock();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].name(), "DataError");
    assert!(decoded.lock().is_empty());
    assert_eq!(decoder.state(), CodecState::Configured);
  }

  #[tokio::test]
  async fn test_flush_rejects_when_unconfigured() {
    let (decoder, _, _) = decoder_with_sinks();
    assert_eq!(decoder.flush().await.unwrap_err().name(), "InvalidStateError");
  }

  #[tokio::test]
  async fn test_is_config_supported_purity() {
    let support = AudioDecoder::<FakeAudioDecoder>::is_config_supported(
      AudioDecoderConfig::new("very-unknown", 48_000.0, 2),
    )
    .await
    .unwrap();
    assert!(!support.supported);

    let err =
      AudioDecoder::<FakeAudioDecoder>::is_config_supported(AudioDecoderConfig::default())
        .await
        .unwrap_err();
    assert_eq!(err.name(), "TypeError");
  }

  #[test]
  fn test_state_machine_guards() {
    let (decoder, _, _) = decoder_with_sinks();
    assert_eq!(decoder.state(), CodecState::Unconfigured);

    decoder.reset();
    assert_eq!(decoder.state(), CodecState::Unconfigured);

    decoder
      .configure(AudioDecoderConfig::new("opus", 48_000.0, 2))
      .unwrap();
    decoder.close();
    decoder.close();
    assert_eq!(decoder.state(), CodecState::Closed);
    decoder.reset();
    assert_eq!(decoder.state(), CodecState::Closed);
  }
}

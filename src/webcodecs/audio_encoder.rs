//! AudioEncoder - WebCodecs API implementation
//!
//! Encodes AudioData objects into EncodedAudioChunk objects through a
//! pluggable audio encode engine.
//! See: https://developer.mozilla.org/en-US/docs/Web/API/AudioEncoder

use crate::codec::{AudioEncodeEngine, Configured};
use crate::webcodecs::audio_data::AudioData;
use crate::webcodecs::encoded_audio_chunk::{
  AudioEncoderConfig, AudioEncoderSupport, EncodedAudioChunk,
};
use crate::webcodecs::error::{
  abort_error, invalid_state_error, type_error, Result, WebCodecsError, WebCodecsErrorCallback,
};
use crate::webcodecs::queue::{CodecQueue, CodecState, EventListenerId, QueueLimits, WorkerHooks};
use parking_lot::Mutex;
use std::sync::Arc;

/// Decoder configuration emitted with the first chunk
#[derive(Debug, Clone)]
pub struct AudioDecoderConfigOutput {
  /// Codec string
  pub codec: String,
  /// Sample rate in Hz
  pub sample_rate: f64,
  /// Number of channels
  pub number_of_channels: u32,
  /// Codec-specific description (e.g. AudioSpecificConfig for AAC)
  pub description: Option<Vec<u8>>,
}

/// Output callback metadata
#[derive(Debug, Clone)]
pub struct EncodedAudioChunkMetadata {
  /// Decoder configuration (present on the first chunk)
  pub decoder_config: Option<AudioDecoderConfigOutput>,
}

/// Output callback: receives each encoded chunk plus its metadata
pub type AudioEncoderOutputCallback =
  Box<dyn FnMut(EncodedAudioChunk, EncodedAudioChunkMetadata) + Send>;

/// Constructor callbacks (W3C AudioEncoderInit)
pub struct AudioEncoderInit {
  pub output: AudioEncoderOutputCallback,
  pub error: WebCodecsErrorCallback,
}

/// Per-stream shaping state, rebuilt on every configure
struct EncoderStream {
  codec: String,
  sample_rate: f64,
  number_of_channels: u32,
  description: Option<Vec<u8>>,
  decoder_config_sent: bool,
}

/// Worker-side callbacks: wraps engine chunks with WebCodecs metadata
struct AudioEncoderHooks {
  output: AudioEncoderOutputCallback,
  error: WebCodecsErrorCallback,
  stream: Option<EncoderStream>,
}

impl<E: AudioEncodeEngine> WorkerHooks<E> for AudioEncoderHooks {
  fn on_configured(&mut self, config: &AudioEncoderConfig, configured: &Configured) {
    self.stream = Some(EncoderStream {
      codec: config.codec.clone().unwrap_or_default(),
      sample_rate: config.sample_rate.unwrap_or(0.0),
      number_of_channels: config.number_of_channels.unwrap_or(0),
      description: configured.description.clone(),
      decoder_config_sent: false,
    });
  }

  fn on_output(&mut self, chunk: crate::codec::ChunkData) {
    let Some(ref mut stream) = self.stream else {
      return;
    };

    let decoder_config = if !stream.decoder_config_sent {
      stream.decoder_config_sent = true;
      Some(AudioDecoderConfigOutput {
        codec: stream.codec.clone(),
        sample_rate: stream.sample_rate,
        number_of_channels: stream.number_of_channels,
        description: stream.description.clone(),
      })
    } else {
      None
    };

    let metadata = EncodedAudioChunkMetadata { decoder_config };
    (self.output)(EncodedAudioChunk::from_data(chunk), metadata);
  }

  fn on_error(&mut self, error: WebCodecsError) {
    (self.error)(error);
  }
}

/// AudioEncoder - WebCodecs-compliant audio encoder
///
/// Submissions are serialized through a bounded queue; encoded chunks and
/// errors are delivered through the constructor callbacks from the
/// encoder's worker thread, never re-entrantly from inside `encode()`.
pub struct AudioEncoder<E: AudioEncodeEngine> {
  state: Mutex<CodecState>,
  queue: CodecQueue<E>,
}

impl<E: AudioEncodeEngine> AudioEncoder<E> {
  /// Create a new AudioEncoder driving `engine`
  pub fn new(engine: E, init: AudioEncoderInit) -> Self {
    let hooks = AudioEncoderHooks {
      output: init.output,
      error: init.error,
      stream: None,
    };
    Self {
      state: Mutex::new(CodecState::Unconfigured),
      queue: CodecQueue::new(engine, hooks, QueueLimits::default()),
    }
  }

  /// Encoder state
  pub fn state(&self) -> CodecState {
    *self.state.lock()
  }

  /// Number of pending encode submissions
  pub fn encode_queue_size(&self) -> u32 {
    self.queue.size()
  }

  /// Configure the encoder.
  ///
  /// Validates the config synchronously (TypeError), resets the queue and
  /// forwards the descriptor to the engine. Engine rejections surface
  /// asynchronously as NotSupportedError through the error callback.
  pub fn configure(&self, config: AudioEncoderConfig) -> Result<()> {
    let mut state = self.state.lock();
    if *state == CodecState::Closed {
      return Err(invalid_state_error("encoder is closed"));
    }

    validate_encoder_config(&config)?;

    *state = CodecState::Configured;
    self.queue.configure(config);
    Ok(())
  }

  /// Submit audio data for encoding. Takes ownership: the AudioData is
  /// detached before this returns.
  pub fn encode(&self, data: &AudioData) -> Result<()> {
    let state = self.state.lock();
    if *state != CodecState::Configured {
      return Err(invalid_state_error("encoder is not configured"));
    }
    self.queue.enqueue_with(|| data.take_data())
  }

  /// Drain the engine. The flush is registered before this returns; the
  /// future rejects with AbortError if reset or close lands first.
  pub fn flush(&self) -> impl std::future::Future<Output = Result<()>> + Send + 'static {
    let setup = {
      let state = self.state.lock();
      if *state != CodecState::Configured {
        Err(invalid_state_error("encoder is not configured"))
      } else {
        Ok(self.queue.begin_flush())
      }
    };
    async move {
      match setup?.await {
        Ok(result) => result,
        Err(_) => Err(abort_error("encoder closed during flush")),
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

  /// Close the encoder and release the engine. Idempotent; never fires
  /// the error callback.
  pub fn close(&self) {
    let mut state = self.state.lock();
    if *state == CodecState::Closed {
      return;
    }
    *state = CodecState::Closed;
    self.queue.close();
  }

  /// Probe `config` support without constructing an encoder.
  pub async fn is_config_supported(config: AudioEncoderConfig) -> Result<AudioEncoderSupport> {
    validate_encoder_config(&config)?;

    let canonical = config.canonicalize();
    let support = E::is_config_supported(&canonical);
    Ok(AudioEncoderSupport {
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
fn validate_encoder_config(config: &AudioEncoderConfig) -> Result<()> {
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

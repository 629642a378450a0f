//! VideoEncoder - WebCodecs API implementation
//!
//! Encodes VideoFrame objects into EncodedVideoChunk objects through a
//! pluggable video encode engine.
//! See: https://developer.mozilla.org/en-US/docs/Web/API/VideoEncoder

use crate::codec::{Configured, VideoEncodeEngine, VideoEncodeInput};
use crate::webcodecs::encoded_video_chunk::{
  EncodedVideoChunk, VideoEncoderConfig, VideoEncoderSupport,
};
use crate::webcodecs::error::{
  invalid_state_error, type_error, Result, WebCodecsError, WebCodecsErrorCallback,
};
use crate::webcodecs::queue::{CodecQueue, CodecState, EventListenerId, QueueLimits, WorkerHooks};
use crate::webcodecs::video_frame::{VideoColorSpace, VideoFrame};
use parking_lot::Mutex;
use std::sync::Arc;

/// Decoder configuration emitted with the first key chunk
#[derive(Debug, Clone)]
pub struct VideoDecoderConfigOutput {
  /// Codec string
  pub codec: String,
  /// Coded width
  pub coded_width: Option<u32>,
  /// Coded height
  pub coded_height: Option<u32>,
  /// Display aspect ratio width
  pub display_aspect_width: Option<u32>,
  /// Display aspect ratio height
  pub display_aspect_height: Option<u32>,
  /// Color space echo of the configured color space
  pub color_space: Option<VideoColorSpace>,
  /// Codec-specific description (e.g. avcC for H.264)
  pub description: Option<Vec<u8>>,
}

/// SVC metadata attached to every chunk
#[derive(Debug, Clone, Copy)]
pub struct SvcOutputMetadata {
  /// Temporal layer of this chunk, derived from scalabilityMode
  pub temporal_layer_id: u32,
}

/// Output callback metadata
#[derive(Debug, Clone)]
pub struct EncodedVideoChunkMetadata {
  /// Decoder configuration (present on the first key chunk)
  pub decoder_config: Option<VideoDecoderConfigOutput>,
  /// Temporal scalability metadata
  pub svc: Option<SvcOutputMetadata>,
}

/// Encode options
#[derive(Debug, Clone, Default)]
pub struct VideoEncoderEncodeOptions {
  /// Force this frame to be a keyframe
  pub key_frame: Option<bool>,
}

/// Output callback: receives each encoded chunk plus its metadata
pub type VideoEncoderOutputCallback =
  Box<dyn FnMut(EncodedVideoChunk, EncodedVideoChunkMetadata) + Send>;

/// Constructor callbacks (W3C VideoEncoderInit)
pub struct VideoEncoderInit {
  pub output: VideoEncoderOutputCallback,
  pub error: WebCodecsErrorCallback,
}

/// Temporal layer pattern for a scalability mode; chunks cycle through
/// the pattern by output index.
fn temporal_layer_pattern(mode: Option<&str>) -> Result<&'static [u32]> {
  match mode {
    None => Ok(&[0]),
    Some("L1T1") => Ok(&[0]),
    Some("L1T2") => Ok(&[0, 1]),
    Some("L1T3") => Ok(&[0, 2, 1, 2]),
    Some(other) => Err(type_error(format!("invalid scalabilityMode: {other}"))),
  }
}

/// Per-stream shaping state, rebuilt on every configure
struct EncoderStream {
  codec: String,
  width: u32,
  height: u32,
  display_aspect_width: u32,
  display_aspect_height: u32,
  color_space: Option<VideoColorSpace>,
  description: Option<Vec<u8>>,
  svc_pattern: &'static [u32],
  chunk_index: u64,
  decoder_config_sent: bool,
}

/// Worker-side callbacks: wraps engine chunks with WebCodecs metadata
struct VideoEncoderHooks {
  output: VideoEncoderOutputCallback,
  error: WebCodecsErrorCallback,
  stream: Option<EncoderStream>,
}

impl<E: VideoEncodeEngine> WorkerHooks<E> for VideoEncoderHooks {
  fn on_configured(&mut self, config: &VideoEncoderConfig, configured: &Configured) {
    let width = config.width.unwrap_or(0);
    let height = config.height.unwrap_or(0);
    self.stream = Some(EncoderStream {
      codec: config.codec.clone().unwrap_or_default(),
      width,
      height,
      display_aspect_width: config.display_width.unwrap_or(width),
      display_aspect_height: config.display_height.unwrap_or(height),
      color_space: None,
      description: configured.description.clone(),
      svc_pattern: temporal_layer_pattern(config.scalability_mode.as_deref()).unwrap_or(&[0]),
      chunk_index: 0,
      decoder_config_sent: false,
    });
  }

  fn filter_input(&mut self, item: VideoEncodeInput) -> Result<VideoEncodeInput> {
    if let Some(ref mut stream) = self.stream {
      // The first key chunk echoes the color space of the frames fed in
      if stream.color_space.is_none() {
        stream.color_space = Some(item.frame.color_space);
      }
    }
    Ok(item)
  }

  fn on_output(&mut self, chunk: crate::codec::ChunkData) {
    let Some(ref mut stream) = self.stream else {
      return;
    };

    let temporal_layer_id =
      stream.svc_pattern[(stream.chunk_index % stream.svc_pattern.len() as u64) as usize];
    let decoder_config = if chunk.key && !stream.decoder_config_sent {
      stream.decoder_config_sent = true;
      Some(VideoDecoderConfigOutput {
        codec: stream.codec.clone(),
        coded_width: Some(stream.width),
        coded_height: Some(stream.height),
        display_aspect_width: Some(stream.display_aspect_width),
        display_aspect_height: Some(stream.display_aspect_height),
        color_space: stream.color_space,
        description: stream.description.clone(),
      })
    } else {
      None
    };
    stream.chunk_index += 1;

    let metadata = EncodedVideoChunkMetadata {
      decoder_config,
      svc: Some(SvcOutputMetadata { temporal_layer_id }),
    };
    (self.output)(EncodedVideoChunk::from_data(chunk), metadata);
  }

  fn on_error(&mut self, error: WebCodecsError) {
    (self.error)(error);
  }
}

/// VideoEncoder - WebCodecs-compliant video encoder
///
/// Submissions are serialized through a bounded queue; encoded chunks and
/// errors are delivered through the constructor callbacks from the
/// encoder's worker thread, never re-entrantly from inside `encode()`.
pub struct VideoEncoder<E: VideoEncodeEngine> {
  state: Mutex<CodecState>,
  queue: CodecQueue<E>,
}

impl<E: VideoEncodeEngine> VideoEncoder<E> {
  /// Create a new VideoEncoder driving `engine`
  pub fn new(engine: E, init: VideoEncoderInit) -> Self {
    let hooks = VideoEncoderHooks {
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
  pub fn configure(&self, config: VideoEncoderConfig) -> Result<()> {
    let mut state = self.state.lock();
    if *state == CodecState::Closed {
      return Err(invalid_state_error("encoder is closed"));
    }

    validate_encoder_config(&config)?;

    *state = CodecState::Configured;
    self.queue.configure(config);
    Ok(())
  }

  /// Submit a frame for encoding. Takes ownership: the frame is detached
  /// before this returns.
  pub fn encode(&self, frame: &VideoFrame, options: Option<VideoEncoderEncodeOptions>) -> Result<()> {
    let state = self.state.lock();
    if *state != CodecState::Configured {
      return Err(invalid_state_error("encoder is not configured"));
    }
    let key_frame = options.and_then(|o| o.key_frame).unwrap_or(false);
    self.queue.enqueue_with(|| {
      Ok(VideoEncodeInput {
        frame: frame.take_data()?,
        key_frame,
      })
    })
  }

  /// Drain the engine. The flush is registered before this returns; the
  /// future resolves once every pending submission has been processed and
  /// all outputs are delivered, and rejects with AbortError if reset or
  /// close lands first.
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
        Err(_) => Err(crate::webcodecs::error::abort_error("encoder closed during flush")),
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
  ///
  /// Rejects with TypeError for structurally invalid configs; an
  /// unrecognized codec string resolves with `supported: false`.
  pub async fn is_config_supported(config: VideoEncoderConfig) -> Result<VideoEncoderSupport> {
    validate_encoder_config(&config)?;

    let canonical = config.canonicalize();
    let support = E::is_config_supported(&canonical);
    Ok(VideoEncoderSupport {
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
fn validate_encoder_config(config: &VideoEncoderConfig) -> Result<()> {
  match config.codec.as_deref() {
    None | Some("") => return Err(type_error("codec is required")),
    Some(_) => {}
  }
  match (config.width, config.height) {
    (Some(w), Some(h)) if w > 0 && h > 0 => {}
    (Some(_), Some(_)) => return Err(type_error("width and height must be non-zero")),
    _ => return Err(type_error("width and height are required")),
  }
  if config.display_width.is_some() != config.display_height.is_some() {
    return Err(type_error(
      "displayWidth and displayHeight must both be specified, or neither",
    ));
  }
  if let (Some(w), Some(h)) = (config.display_width, config.display_height) {
    if w == 0 || h == 0 {
      return Err(type_error("displayWidth and displayHeight must be non-zero"));
    }
  }
  temporal_layer_pattern(config.scalability_mode.as_deref())?;
  Ok(())
}

//! VideoDecoder - WebCodecs API implementation
//!
//! Decodes EncodedVideoChunk objects into VideoFrame objects through a
//! pluggable video decode engine.
//! See: https://developer.mozilla.org/en-US/docs/Web/API/VideoDecoder

use crate::codec::{ChunkData, Configured, VideoDecodeEngine};
use crate::webcodecs::encoded_video_chunk::{
  EncodedVideoChunk, VideoDecoderConfig, VideoDecoderSupport,
};
use crate::webcodecs::error::{
  abort_error, data_error, invalid_state_error, type_error, Result, WebCodecsError,
  WebCodecsErrorCallback,
};
use crate::webcodecs::queue::{CodecQueue, CodecState, EventListenerId, QueueLimits, WorkerHooks};
use crate::webcodecs::video_frame::{parse_rotation, VideoColorSpace, VideoFrame};
use parking_lot::Mutex;
use std::sync::Arc;

/// Output callback: receives each decoded frame
pub type VideoDecoderOutputCallback = Box<dyn FnMut(VideoFrame) + Send>;

/// Constructor callbacks (W3C VideoDecoderInit)
pub struct VideoDecoderInit {
  pub output: VideoDecoderOutputCallback,
  pub error: WebCodecsErrorCallback,
}

/// Per-stream shaping state, rebuilt on every configure
struct DecoderStream {
  /// The first chunk after configure must be a key chunk
  awaiting_key: bool,
  color_space: Option<VideoColorSpace>,
  display_aspect: Option<(u32, u32)>,
  rotation: u32,
  flip: bool,
}

/// Worker-side callbacks: enforces the key-first rule and stamps
/// configured color space / display geometry onto output frames
struct VideoDecoderHooks {
  output: VideoDecoderOutputCallback,
  error: WebCodecsErrorCallback,
  stream: Option<DecoderStream>,
}

impl<E: VideoDecodeEngine> WorkerHooks<E> for VideoDecoderHooks {
  fn on_configured(&mut self, config: &VideoDecoderConfig, _configured: &Configured) {
    self.stream = Some(DecoderStream {
      awaiting_key: true,
      color_space: config.color_space,
      display_aspect: match (config.display_aspect_width, config.display_aspect_height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => Some((w, h)),
        _ => None,
      },
      rotation: parse_rotation(config.rotation).unwrap_or(0),
      flip: config.flip.unwrap_or(false),
    });
  }

  fn filter_input(&mut self, chunk: ChunkData) -> Result<ChunkData> {
    let Some(ref mut stream) = self.stream else {
      return Ok(chunk);
    };
    if stream.awaiting_key {
      if !chunk.key {
        return Err(data_error(
          "a key chunk is required after configure, got a delta chunk",
        ));
      }
      stream.awaiting_key = false;
    }
    Ok(chunk)
  }

  fn on_output(&mut self, mut frame: crate::codec::VideoFrameData) {
    if let Some(ref stream) = self.stream {
      if let Some(color_space) = stream.color_space {
        frame.color_space = color_space;
      }
      if let Some((aw, ah)) = stream.display_aspect {
        // Hold the coded height, derive the width from the aspect ratio
        frame.display_height = frame.coded_height;
        frame.display_width =
          (frame.coded_height as f64 * aw as f64 / ah as f64).round() as u32;
      }
      frame.rotation = stream.rotation;
      frame.flip = stream.flip;
    }
    (self.output)(VideoFrame::from_data(frame));
  }

  fn on_error(&mut self, error: WebCodecsError) {
    (self.error)(error);
  }
}

/// VideoDecoder - WebCodecs-compliant video decoder
///
/// Submissions are serialized through a bounded queue; decoded frames and
/// errors are delivered through the constructor callbacks from the
/// decoder's worker thread, never re-entrantly from inside `decode()`.
pub struct VideoDecoder<E: VideoDecodeEngine> {
  state: Mutex<CodecState>,
  queue: CodecQueue<E>,
}

impl<E: VideoDecodeEngine> VideoDecoder<E> {
  /// Create a new VideoDecoder driving `engine`
  pub fn new(engine: E, init: VideoDecoderInit) -> Self {
    let hooks = VideoDecoderHooks {
      output: init.output,
      error: init.error,
      stream: None,
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
  pub fn configure(&self, config: VideoDecoderConfig) -> Result<()> {
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
  pub fn decode(&self, chunk: &EncodedVideoChunk) -> Result<()> {
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
  ///
  /// Rejects with TypeError for structurally invalid configs; an
  /// unrecognized codec string resolves with `supported: false`.
  pub async fn is_config_supported(config: VideoDecoderConfig) -> Result<VideoDecoderSupport> {
    validate_decoder_config(&config)?;

    let canonical = config.canonicalize();
    let support = E::is_config_supported(&canonical);
    Ok(VideoDecoderSupport {
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
/// isConfigSupported. Coded dimensions are optional: they may be learned
/// from the bitstream.
fn validate_decoder_config(config: &VideoDecoderConfig) -> Result<()> {
  match config.codec.as_deref() {
    None | Some("") => return Err(type_error("codec is required")),
    Some(_) => {}
  }
  if let (Some(w), Some(h)) = (config.coded_width, config.coded_height) {
    if w == 0 || h == 0 {
      return Err(type_error("codedWidth and codedHeight must be non-zero"));
    }
  }
  if config.display_aspect_width.is_some() != config.display_aspect_height.is_some() {
    return Err(type_error(
      "displayAspectWidth and displayAspectHeight must both be specified, or neither",
    ));
  }
  parse_rotation(config.rotation)?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::codec::fake::{FakeVideoDecoder, FakeVideoEncoder};
  use crate::webcodecs::encoded_video_chunk::{EncodedVideoChunkInit, EncodedVideoChunkType};
  use crate::webcodecs::media_buffer::MediaBuffer;
  use crate::webcodecs::video_encoder::{VideoEncoder, VideoEncoderInit};
  use crate::webcodecs::video_frame::{
    VideoColorPrimaries, VideoFrameBufferInit, VideoFrameCopyToOptions, VideoFrameRect,
    VideoMatrixCoefficients, VideoPixelFormat, VideoTransferCharacteristics,
  };
  use crate::webcodecs::VideoEncoderConfig;
  use std::time::Duration;

  type Frames = Arc<Mutex<Vec<VideoFrame>>>;
  type Errors = Arc<Mutex<Vec<WebCodecsError>>>;

  fn decoder_with_sinks() -> (VideoDecoder<FakeVideoDecoder>, Frames, Errors) {
    let frames: Frames = Arc::new(Mutex::new(Vec::new()));
    let errors: Errors = Arc::new(Mutex::new(Vec::new()));
    let frame_sink = frames.clone();
    let error_sink = errors.clone();
    let decoder = VideoDecoder::new(
      FakeVideoDecoder::new(),
      VideoDecoderInit {
        output: Box::new(move |frame| {
          frame_sink.lock().push(frame);
        }),
        error: Box::new(move |error| {
          error_sink.lock().push(error);
        }),
      },
    );
    (decoder, frames, errors)
  }

  /// Encode `frames` green RGBA frames and collect the chunks
  async fn encode_frames(
    width: u32,
    height: u32,
    count: usize,
  ) -> Vec<(EncodedVideoChunk, i64)> {
    let chunks = Arc::new(Mutex::new(Vec::new()));
    let sink = chunks.clone();
    let encoder = VideoEncoder::new(
      FakeVideoEncoder::new(),
      VideoEncoderInit {
        output: Box::new(move |chunk, _| {
          let ts = chunk.timestamp();
          sink.lock().push((chunk, ts));
        }),
        error: Box::new(|_| {}),
      },
    );
    encoder
      .configure(VideoEncoderConfig::new("avc1.42001E", width, height))
      .unwrap();

    for i in 0..count {
      let mut pixels = Vec::with_capacity((width * height * 4) as usize);
      for _ in 0..width * height {
        pixels.extend_from_slice(&[0, 255, 0, 255]);
      }
      let frame = VideoFrame::new(
        &MediaBuffer::new(pixels),
        VideoFrameBufferInit::new(VideoPixelFormat::RGBA, width, height, i as i64 * 33_333),
      )
      .unwrap();
      encoder.encode(&frame, None).unwrap();
    }
    encoder.flush().await.unwrap();
    let collected = chunks.lock().drain(..).collect();
    collected
  }

  #[tokio::test]
  async fn test_video_round_trip_preserves_color() {
    let chunks = encode_frames(320, 240, 1).await;
    assert!(!chunks.is_empty());

    let (decoder, frames, errors) = decoder_with_sinks();
    let mut config = VideoDecoderConfig::new("avc1.42001E");
    config.coded_width = Some(320);
    config.coded_height = Some(240);
    decoder.configure(config).unwrap();

    for (chunk, _) in &chunks {
      decoder.decode(chunk).unwrap();
    }
    decoder.flush().await.unwrap();

    let frames = frames.lock();
    assert!(!frames.is_empty());
    assert!(errors.lock().is_empty());

    let frame = &frames[0];
    assert_eq!(frame.coded_width(), 320);
    assert_eq!(frame.coded_height(), 240);

    // Center pixel of the decoded frame: BT.601 luma of pure green
    let options = VideoFrameCopyToOptions {
      rect: Some(VideoFrameRect::new(160, 120, 1, 1)),
      layout: None,
    };
    let mut pixel = vec![0u8; 4];
    frame.copy_to(&mut pixel, Some(&options)).unwrap();
    let luma =
      0.299 * pixel[0] as f64 + 0.587 * pixel[1] as f64 + 0.114 * pixel[2] as f64;
    assert!(luma > 100.0 && luma < 200.0, "luma {luma} out of range");
    assert_eq!(decoder.decode_queue_size(), 0);
  }

  #[tokio::test]
  async fn test_fifo_outputs_no_loss_no_duplication() {
    let chunks = encode_frames(16, 16, 10).await;
    assert_eq!(chunks.len(), 10);

    let (decoder, frames, _) = decoder_with_sinks();
    decoder.configure(VideoDecoderConfig::new("avc1.42001E")).unwrap();
    for (chunk, _) in &chunks {
      decoder.decode(chunk).unwrap();
    }
    decoder.flush().await.unwrap();

    let timestamps: Vec<i64> = frames.lock().iter().map(|f| f.timestamp()).collect();
    let expected: Vec<i64> = (0..10).map(|i| i * 33_333).collect();
    assert_eq!(timestamps, expected);
  }

  #[tokio::test]
  async fn test_first_chunk_must_be_key() {
    let (decoder, frames, errors) = decoder_with_sinks();
    decoder.configure(VideoDecoderConfig::new("avc1.42001E")).unwrap();

    let delta = EncodedVideoChunk::new(EncodedVideoChunkInit {
      chunk_type: EncodedVideoChunkType::Delta,
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
    assert!(frames.lock().is_empty());
    // The pipeline stays configured; no synchronous error state
    assert_eq!(decoder.state(), CodecState::Configured);
  }

  #[tokio::test]
  async fn test_color_space_and_aspect_propagation() {
    let chunks = encode_frames(100, 50, 1).await;

    let (decoder, frames, _) = decoder_with_sinks();
    let mut config = VideoDecoderConfig::new("avc1.42001E");
    config.color_space = Some(VideoColorSpace {
      primaries: Some(VideoColorPrimaries::Bt709),
      transfer: Some(VideoTransferCharacteristics::Bt709),
      matrix: Some(VideoMatrixCoefficients::Bt709),
      full_range: Some(false),
    });
    // 4:1 display aspect on a 100x50 coded frame
    config.display_aspect_width = Some(4);
    config.display_aspect_height = Some(1);
    config.rotation = Some(180.0);
    config.flip = Some(true);
    decoder.configure(config).unwrap();

    decoder.decode(&chunks[0].0).unwrap();
    decoder.flush().await.unwrap();

    let frames = frames.lock();
    let frame = &frames[0];
    assert_eq!(
      frame.color_space().unwrap().primaries,
      Some(VideoColorPrimaries::Bt709)
    );
    assert_eq!(frame.display_height(), 50);
    assert_eq!(frame.display_width(), 200);
    assert_eq!(frame.rotation(), 180);
    assert!(frame.flip());
  }

  #[tokio::test]
  async fn test_corrupt_chunk_reports_encoding_error() {
    let (decoder, _, errors) = decoder_with_sinks();
    decoder.configure(VideoDecoderConfig::new("vp8")).unwrap();

    let garbage = EncodedVideoChunk::new(EncodedVideoChunkInit {
      chunk_type: EncodedVideoChunkType::Key,
      timestamp: 0,
      duration: None,
      data: MediaBuffer::new(vec![0xFFu8; 8]),
      transfer: Vec::new(),
    })
    .unwrap();
    decoder.decode(&garbage).unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    let errors = errors.lock();
    assert_eq!(errors.len(), 1);
    // Engine-reported decode failures surface asynchronously
    assert_eq!(errors[0].name(), "EncodingError");
    // The decoder did not close itself
    assert_eq!(decoder.state(), CodecState::Configured);
  }

  #[test]
  fn test_decode_takes_chunk_ownership() {
    let (decoder, _, _) = decoder_with_sinks();
    decoder.configure(VideoDecoderConfig::new("vp8")).unwrap();

    let chunk = EncodedVideoChunk::new(EncodedVideoChunkInit {
      chunk_type: EncodedVideoChunkType::Key,
      timestamp: 0,
      duration: None,
      data: MediaBuffer::new(vec![0u8; 4]),
      transfer: Vec::new(),
    })
    .unwrap();
    decoder.decode(&chunk).unwrap();
    assert_eq!(chunk.byte_length(), 0);
    assert_eq!(decoder.decode(&chunk).unwrap_err().name(), "InvalidStateError");
  }

  #[tokio::test]
  async fn test_reset_after_error_allows_reconfigure() {
    let (decoder, frames, errors) = decoder_with_sinks();
    decoder.configure(VideoDecoderConfig::new("vp8")).unwrap();

    let garbage = EncodedVideoChunk::new(EncodedVideoChunkInit {
      chunk_type: EncodedVideoChunkType::Key,
      timestamp: 0,
      duration: None,
      data: MediaBuffer::new(vec![0u8; 2]),
      transfer: Vec::new(),
    })
    .unwrap();
    decoder.decode(&garbage).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(errors.lock().len(), 1);

    // Recovery path: reset, reconfigure, decode something valid
    decoder.reset();
    assert_eq!(decoder.state(), CodecState::Unconfigured);
    decoder.configure(VideoDecoderConfig::new("avc1.42001E")).unwrap();

    let chunks = encode_frames(8, 8, 1).await;
    decoder.decode(&chunks[0].0).unwrap();
    decoder.flush().await.unwrap();
    assert_eq!(frames.lock().len(), 1);
  }

  #[tokio::test]
  async fn test_is_config_supported_purity() {
    let support = VideoDecoder::<FakeVideoDecoder>::is_config_supported(
      VideoDecoderConfig::new("mystery-codec-9000"),
    )
    .await
    .unwrap();
    assert!(!support.supported);

    let err = VideoDecoder::<FakeVideoDecoder>::is_config_supported(VideoDecoderConfig::default())
      .await
      .unwrap_err();
    assert_eq!(err.name(), "TypeError");

    let support =
      VideoDecoder::<FakeVideoDecoder>::is_config_supported(VideoDecoderConfig::new("vp8"))
        .await
        .unwrap();
    assert!(support.supported);
    assert_eq!(support.config.codec.as_deref(), Some("vp8"));
  }

  #[test]
  fn test_state_machine_guards() {
    let (decoder, _, _) = decoder_with_sinks();
    // decode in unconfigured state
    let chunk = EncodedVideoChunk::new(EncodedVideoChunkInit {
      chunk_type: EncodedVideoChunkType::Key,
      timestamp: 0,
      duration: None,
      data: MediaBuffer::new(vec![0u8; 4]),
      transfer: Vec::new(),
    })
    .unwrap();
    assert_eq!(decoder.decode(&chunk).unwrap_err().name(), "InvalidStateError");

    decoder.close();
    assert_eq!(decoder.state(), CodecState::Closed);
    assert_eq!(
      decoder
        .configure(VideoDecoderConfig::new("vp8"))
        .unwrap_err()
        .name(),
      "InvalidStateError"
    );
    decoder.reset();
    assert_eq!(decoder.state(), CodecState::Closed);
    decoder.close();
    assert_eq!(decoder.state(), CodecState::Closed);
  }
}

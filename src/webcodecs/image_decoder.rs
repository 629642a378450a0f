//! ImageDecoder - WebCodecs API implementation
//!
//! Decodes still and animated image containers into VideoFrame objects.
//! See: https://developer.mozilla.org/en-US/docs/Web/API/ImageDecoder
//!
//! Container-level track metadata (frame count, animation loops) is
//! probed here; pixel decoding is delegated to an [`ImageDecodeEngine`].
//! Streamed input is ingested on demand: whichever of `completed`,
//! `tracks().ready()` or `decode()` is awaited first drives the stream
//! to completion.

use crate::codec::{ImageDecodeEngine, VideoFrameData};
use crate::webcodecs::error::{
  abort_error, encoding_error, invalid_state_error, range_error, type_error, Result,
};
use crate::webcodecs::media_buffer::{take_payload, MediaBuffer};
use crate::webcodecs::video_frame::VideoFrame;
use futures::stream::{BoxStream, StreamExt};
use log::debug;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// ColorSpaceConversion for ImageDecoder (W3C WebCodecs spec)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpaceConversion {
  /// Apply default color space conversion
  #[default]
  Default,
  /// No color space conversion
  None,
}

/// PremultiplyAlpha for ImageDecoder (W3C WebCodecs spec)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PremultiplyAlpha {
  #[default]
  Default,
  Premultiply,
  None,
}

/// Data source for ImageDecoder: fully buffered bytes or a chunked
/// asynchronous stream
pub enum ImageDataSource {
  Buffer(MediaBuffer),
  Stream(BoxStream<'static, std::io::Result<Vec<u8>>>),
}

/// ImageDecoder init options (W3C ImageDecoderInit)
pub struct ImageDecoderInit {
  /// The encoded image data
  pub data: ImageDataSource,
  /// MIME type of the image (required), e.g. "image/png"
  pub mime_type: String,
  /// Color space conversion mode
  pub color_space_conversion: ColorSpaceConversion,
  /// Desired width for scaling; must be paired with desired_height
  pub desired_width: Option<u32>,
  /// Desired height for scaling; must be paired with desired_width
  pub desired_height: Option<u32>,
  /// Whether to prefer the animated track
  pub prefer_animation: Option<bool>,
  /// Alpha premultiplication mode
  pub premultiply_alpha: PremultiplyAlpha,
  /// Buffers to detach and move into the decoder
  pub transfer: Vec<MediaBuffer>,
}

impl ImageDecoderInit {
  /// Init with the required members set and everything else defaulted
  pub fn new(data: ImageDataSource, mime_type: impl Into<String>) -> Self {
    Self {
      data,
      mime_type: mime_type.into(),
      color_space_conversion: ColorSpaceConversion::Default,
      desired_width: None,
      desired_height: None,
      prefer_animation: None,
      premultiply_alpha: PremultiplyAlpha::Default,
      transfer: Vec::new(),
    }
  }
}

/// Image decode options (W3C ImageDecodeOptions)
#[derive(Debug, Clone, Default)]
pub struct ImageDecodeOptions {
  /// Frame index to decode (default 0)
  pub frame_index: Option<u32>,
  /// Whether to only return fully decoded frames
  pub complete_frames_only: Option<bool>,
}

/// Image decode result (W3C ImageDecodeResult)
#[derive(Debug)]
pub struct ImageDecodeResult {
  /// The decoded frame
  pub image: VideoFrame,
  /// Whether the frame is fully decoded
  pub complete: bool,
}

/// Internal track data shared between ImageTrack handles
#[derive(Debug, Clone)]
struct ImageTrackData {
  animated: bool,
  frame_count: u32,
  /// f64::INFINITY for "loop forever" containers
  repetition_count: f64,
}

#[derive(Debug)]
struct ImageTrackListInner {
  tracks: Vec<ImageTrackData>,
  selected_index: Option<usize>,
  /// Once the decoder closes, selection writes are silent no-ops
  closed: bool,
}

/// Image track information (W3C spec - writable `selected`)
pub struct ImageTrack {
  track_list_inner: Arc<Mutex<ImageTrackListInner>>,
  index: usize,
}

impl ImageTrack {
  /// Whether this track is animated
  pub fn animated(&self) -> bool {
    let inner = self.track_list_inner.lock();
    inner
      .tracks
      .get(self.index)
      .map(|t| t.animated)
      .unwrap_or(false)
  }

  /// Number of frames in this track
  pub fn frame_count(&self) -> u32 {
    let inner = self.track_list_inner.lock();
    inner
      .tracks
      .get(self.index)
      .map(|t| t.frame_count)
      .unwrap_or(0)
  }

  /// Number of times the animation repeats; infinity for "loop forever"
  pub fn repetition_count(&self) -> f64 {
    let inner = self.track_list_inner.lock();
    inner
      .tracks
      .get(self.index)
      .map(|t| t.repetition_count)
      .unwrap_or(0.0)
  }

  /// Whether this track is currently selected
  pub fn selected(&self) -> bool {
    let inner = self.track_list_inner.lock();
    inner.selected_index == Some(self.index)
  }

  /// Select or deselect this track. Selecting deselects every other
  /// track; after the decoder closes this is a silent no-op.
  pub fn set_selected(&self, value: bool) {
    let mut inner = self.track_list_inner.lock();
    if inner.closed {
      return;
    }
    if value {
      inner.selected_index = Some(self.index);
    } else if inner.selected_index == Some(self.index) {
      inner.selected_index = None;
    }
  }
}

/// Image track list (W3C spec)
pub struct ImageTrackList {
  inner: Arc<Mutex<ImageTrackListInner>>,
  ready: Arc<AtomicBool>,
  ready_notify: Arc<Notify>,
}

impl Clone for ImageTrackList {
  fn clone(&self) -> Self {
    ImageTrackList {
      inner: self.inner.clone(),
      ready: self.ready.clone(),
      ready_notify: self.ready_notify.clone(),
    }
  }
}

impl ImageTrackList {
  /// Number of tracks
  pub fn length(&self) -> u32 {
    self.inner.lock().tracks.len() as u32
  }

  /// Track at `index`, if any
  pub fn item(&self, index: u32) -> Option<ImageTrack> {
    let inner = self.inner.lock();
    if (index as usize) < inner.tracks.len() {
      Some(ImageTrack {
        track_list_inner: self.inner.clone(),
        index: index as usize,
      })
    } else {
      None
    }
  }

  /// Iterate over the tracks
  pub fn iter(&self) -> impl Iterator<Item = ImageTrack> + '_ {
    (0..self.length()).filter_map(|i| self.item(i))
  }

  /// Index of the selected track, -1 when none
  pub fn selected_index(&self) -> i32 {
    self
      .inner
      .lock()
      .selected_index
      .map(|i| i as i32)
      .unwrap_or(-1)
  }

  /// The selected track, if any
  pub fn selected_track(&self) -> Option<ImageTrack> {
    let inner = self.inner.lock();
    match inner.selected_index {
      Some(index) if index < inner.tracks.len() => Some(ImageTrack {
        track_list_inner: self.inner.clone(),
        index,
      }),
      _ => None,
    }
  }

  /// Resolves once all track metadata is established
  pub async fn ready(&self) {
    // Fast path: already ready
    if self.ready.load(Ordering::Acquire) {
      return;
    }

    // Register the listener before the second check so a concurrent
    // notify_waiters() cannot slip between check and wait.
    let notified = self.ready_notify.notified();
    if self.ready.load(Ordering::Acquire) {
      return;
    }
    notified.await;
  }

  fn mark_ready(&self) {
    self.ready.store(true, Ordering::Release);
    self.ready_notify.notify_waiters();
  }
}

/// Parsed GIF container metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct GifMetadata {
  pub frame_count: u32,
  /// NETSCAPE2.0 loop count; 0 means loop forever, None means no loop
  /// extension (play once)
  pub loop_count: Option<u32>,
}

/// Walk the GIF block structure counting image descriptors and picking
/// up the NETSCAPE2.0 loop count. Returns None for non-GIF or truncated
/// data.
pub(crate) fn probe_gif(data: &[u8]) -> Option<GifMetadata> {
  if data.len() < 13 || (&data[0..6] != b"GIF87a" && &data[0..6] != b"GIF89a") {
    return None;
  }

  // Logical screen descriptor; skip the global color table if flagged
  let packed = data[10];
  let mut pos = 13usize;
  if packed & 0x80 != 0 {
    pos += 3 * (1usize << ((packed & 0x07) + 1));
  }

  let mut frame_count = 0u32;
  let mut loop_count = None;

  while pos < data.len() {
    match data[pos] {
      // Trailer
      0x3B => break,
      // Extension block: label byte then sub-blocks
      0x21 => {
        pos += 1;
        let label = *data.get(pos)?;
        pos += 1;
        if label == 0xFF
          && data.len() >= pos + 12
          && data[pos] == 11
          && &data[pos + 1..pos + 12] == b"NETSCAPE2.0"
        {
          let sub = pos + 12;
          if data.len() >= sub + 4 && data[sub] == 3 && data[sub + 1] == 1 {
            loop_count = Some(u16::from_le_bytes([data[sub + 2], data[sub + 3]]) as u32);
          }
        }
        pos = skip_sub_blocks(data, pos)?;
      }
      // Image descriptor: 9 bytes, optional local color table, LZW
      // minimum code size, then pixel data sub-blocks
      0x2C => {
        frame_count += 1;
        if pos + 10 > data.len() {
          return None;
        }
        let image_packed = data[pos + 9];
        pos += 10;
        if image_packed & 0x80 != 0 {
          pos += 3 * (1usize << ((image_packed & 0x07) + 1));
        }
        pos += 1; // LZW minimum code size
        pos = skip_sub_blocks(data, pos)?;
      }
      _ => return None,
    }
  }

  if frame_count == 0 {
    return None;
  }
  Some(GifMetadata {
    frame_count,
    loop_count,
  })
}

/// Advance past a chain of length-prefixed sub-blocks, including the
/// zero terminator. `pos` addresses the first size byte.
fn skip_sub_blocks(data: &[u8], mut pos: usize) -> Option<usize> {
  loop {
    let size = *data.get(pos)? as usize;
    pos += 1;
    if size == 0 {
      return Some(pos);
    }
    pos += size;
  }
}

enum IngestState {
  /// Buffer source, or a stream that finished: bytes live in `Inner`
  Done,
  /// Stream source not yet ingested
  Stream(BoxStream<'static, std::io::Result<Vec<u8>>>),
  /// Stream failed; the message is replayed to every waiter
  Failed(String),
}

struct Inner<E> {
  engine: E,
  data: Option<Arc<[u8]>>,
  cached_frames: Option<Vec<VideoFrameData>>,
}

/// ImageDecoder - WebCodecs-compliant image decoder
pub struct ImageDecoder<E: ImageDecodeEngine> {
  inner: Mutex<Inner<E>>,
  ingest: tokio::sync::Mutex<IngestState>,
  mime_type: String,
  complete: AtomicBool,
  closed: AtomicBool,
  /// Wakes pending decode futures on reset/close
  cancel: Arc<Notify>,
  tracks: ImageTrackList,
  prefer_animation: Option<bool>,
  desired_size: Option<(u32, u32)>,
  #[allow(dead_code)]
  color_space_conversion: ColorSpaceConversion,
  #[allow(dead_code)]
  premultiply_alpha: PremultiplyAlpha,
}

impl<E: ImageDecodeEngine> ImageDecoder<E> {
  /// Create a new ImageDecoder driving `engine`
  pub fn new(engine: E, init: ImageDecoderInit) -> Result<Self> {
    if init.mime_type.is_empty() {
      return Err(type_error("type is required"));
    }
    if init.desired_width.is_some() != init.desired_height.is_some() {
      return Err(type_error(
        "desiredWidth and desiredHeight must both be specified, or neither",
      ));
    }

    let tracks = ImageTrackList {
      inner: Arc::new(Mutex::new(ImageTrackListInner {
        tracks: Vec::new(),
        selected_index: None,
        closed: false,
      })),
      ready: Arc::new(AtomicBool::new(false)),
      ready_notify: Arc::new(Notify::new()),
    };

    let (data, ingest, complete) = match init.data {
      ImageDataSource::Buffer(buffer) => {
        let payload = take_payload(&buffer, &init.transfer)?;
        (Some(payload), IngestState::Done, true)
      }
      ImageDataSource::Stream(stream) => {
        for buffer in &init.transfer {
          buffer.detach();
        }
        (None, IngestState::Stream(stream), false)
      }
    };

    let decoder = Self {
      inner: Mutex::new(Inner {
        engine,
        data: data.clone(),
        cached_frames: None,
      }),
      ingest: tokio::sync::Mutex::new(ingest),
      mime_type: init.mime_type,
      complete: AtomicBool::new(complete),
      closed: AtomicBool::new(false),
      cancel: Arc::new(Notify::new()),
      tracks,
      prefer_animation: init.prefer_animation,
      desired_size: init.desired_width.zip(init.desired_height),
      color_space_conversion: init.color_space_conversion,
      premultiply_alpha: init.premultiply_alpha,
    };

    // Buffered data: track metadata is known immediately
    if let Some(ref payload) = data {
      decoder.establish_tracks(payload);
    }

    Ok(decoder)
  }

  /// MIME type echo of the init
  pub fn mime_type(&self) -> &str {
    &self.mime_type
  }

  /// Whether all image data has been ingested
  pub fn complete(&self) -> bool {
    self.complete.load(Ordering::Acquire)
  }

  /// Resolves once all image data has been ingested
  pub async fn completed(&self) -> Result<()> {
    if self.closed.load(Ordering::Acquire) {
      return Err(invalid_state_error("ImageDecoder is closed"));
    }
    tokio::select! {
      _ = self.cancel.notified() => Err(abort_error("ImageDecoder closed during ingestion")),
      result = self.ensure_ingested() => result,
    }
  }

  /// The decoder's track list
  pub fn tracks(&self) -> ImageTrackList {
    self.tracks.clone()
  }

  /// Whether this decoder has been closed
  pub fn closed(&self) -> bool {
    self.closed.load(Ordering::Acquire)
  }

  /// Decode the frame at `frameIndex` (default 0).
  ///
  /// Rejects with InvalidStateError when closed or no track is selected,
  /// RangeError for an out-of-range index, EncodingError when the data
  /// cannot be parsed, and AbortError when reset/close lands while the
  /// decode is pending.
  pub async fn decode(&self, options: Option<ImageDecodeOptions>) -> Result<ImageDecodeResult> {
    if self.closed.load(Ordering::Acquire) {
      return Err(invalid_state_error("ImageDecoder is closed"));
    }

    tokio::select! {
      _ = self.cancel.notified() => return Err(abort_error("decode aborted")),
      result = self.ensure_ingested() => result?,
    }
    if self.closed.load(Ordering::Acquire) {
      return Err(abort_error("ImageDecoder closed during decode"));
    }
    if self.tracks.selected_index() < 0 {
      return Err(invalid_state_error("no image track is selected"));
    }

    let frame_index = options.and_then(|o| o.frame_index).unwrap_or(0) as usize;

    let mut inner = self.inner.lock();
    if inner.cached_frames.is_none() {
      let data = inner
        .data
        .clone()
        .ok_or_else(|| encoding_error("no image data available"))?;
      debug!("decoding {} ({} bytes)", self.mime_type, data.len());
      let mut frames = inner
        .engine
        .decode_frames(&self.mime_type, &data)
        .map_err(crate::webcodecs::error::WebCodecsError::from)?;

      if self.prefer_animation == Some(false) {
        frames.truncate(1);
      }
      if let Some((width, height)) = self.desired_size {
        for frame in &mut frames {
          frame.display_width = width;
          frame.display_height = height;
        }
      }

      // The engine may discover frames the container probe missed
      {
        let mut track_inner = self.tracks.inner.lock();
        if let Some(track) = track_inner.tracks.get_mut(0) {
          track.frame_count = frames.len() as u32;
        }
      }
      inner.cached_frames = Some(frames);
    }

    let frames = match inner.cached_frames.as_ref() {
      Some(frames) => frames,
      None => return Err(encoding_error("no frames decoded from image")),
    };
    if frame_index >= frames.len() {
      return Err(range_error(format!(
        "frame index {frame_index} is out of range (track has {} frames)",
        frames.len()
      )));
    }

    Ok(ImageDecodeResult {
      image: VideoFrame::from_data(frames[frame_index].clone()),
      complete: true,
    })
  }

  /// Abort pending decodes and drop cached frames; the next decode
  /// re-runs the engine over the stored data.
  pub fn reset(&self) -> Result<()> {
    if self.closed.load(Ordering::Acquire) {
      return Err(invalid_state_error("ImageDecoder is closed"));
    }
    self.cancel.notify_waiters();
    self.inner.lock().cached_frames = None;
    Ok(())
  }

  /// Close the decoder. Pending decodes reject with AbortError; track
  /// selection writes become no-ops. Idempotent.
  pub fn close(&self) {
    if self.closed.swap(true, Ordering::AcqRel) {
      return;
    }
    self.cancel.notify_waiters();
    {
      let mut inner = self.inner.lock();
      inner.cached_frames = None;
      inner.data = None;
    }
    self.tracks.inner.lock().closed = true;
    // Wake ready() waiters so they can observe the closed state
    self.tracks.mark_ready();
  }

  /// Whether `mime_type` can be decoded by this engine
  pub async fn is_type_supported(mime_type: &str) -> bool {
    E::is_type_supported(mime_type)
  }

  /// Drive a streamed source to completion; no-op for buffered data
  async fn ensure_ingested(&self) -> Result<()> {
    if self.complete.load(Ordering::Acquire) {
      return Ok(());
    }

    let mut ingest = self.ingest.lock().await;
    match std::mem::replace(&mut *ingest, IngestState::Done) {
      IngestState::Done => Ok(()),
      IngestState::Failed(message) => {
        *ingest = IngestState::Failed(message.clone());
        Err(encoding_error(message))
      }
      IngestState::Stream(mut stream) => {
        let mut collected: Vec<u8> = Vec::new();
        while let Some(chunk) = stream.next().await {
          match chunk {
            Ok(bytes) => collected.extend_from_slice(&bytes),
            Err(error) => {
              let message = format!("image data stream failed: {error}");
              *ingest = IngestState::Failed(message.clone());
              self.tracks.mark_ready();
              return Err(encoding_error(message));
            }
          }
        }

        let payload: Arc<[u8]> = Arc::from(collected);
        self.inner.lock().data = Some(payload.clone());
        self.complete.store(true, Ordering::Release);
        self.establish_tracks(&payload);
        Ok(())
      }
    }
  }

  /// Probe container metadata and publish the track list
  fn establish_tracks(&self, data: &[u8]) {
    let track = if self.mime_type.eq_ignore_ascii_case("image/gif") {
      match probe_gif(data) {
        Some(gif) if self.prefer_animation != Some(false) => ImageTrackData {
          animated: gif.frame_count > 1,
          frame_count: gif.frame_count,
          repetition_count: match gif.loop_count {
            Some(0) => f64::INFINITY,
            Some(count) => count as f64,
            None => 0.0,
          },
        },
        // Static preference or unparseable container: single frame;
        // a decode of corrupt data will reject with EncodingError
        _ => ImageTrackData {
          animated: false,
          frame_count: 1,
          repetition_count: 0.0,
        },
      }
    } else {
      ImageTrackData {
        animated: false,
        frame_count: 1,
        repetition_count: 0.0,
      }
    };

    {
      let mut inner = self.tracks.inner.lock();
      inner.tracks = vec![track];
      inner.selected_index = Some(0);
    }
    self.tracks.mark_ready();
  }
}

impl<E: ImageDecodeEngine> std::fmt::Debug for ImageDecoder<E> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ImageDecoder")
      .field("type", &self.mime_type)
      .field("complete", &self.complete())
      .field("closed", &self.closed())
      .finish()
  }
}

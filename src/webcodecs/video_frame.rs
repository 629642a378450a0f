//! VideoFrame - WebCodecs API implementation
//!
//! Represents a frame of video data that can be displayed or encoded.
//! See: https://developer.mozilla.org/en-US/docs/Web/API/VideoFrame
//!
//! A frame wraps an immutable, reference-counted plane payload plus
//! geometry and color metadata. `close()` detaches the frame: geometry
//! accessors return 0/None and content-observing methods fail with
//! InvalidStateError. Clones share the payload but detach independently.

use crate::codec::VideoFrameData;
use crate::webcodecs::error::{invalid_state_error, range_error, type_error, Result};
use crate::webcodecs::media_buffer::{take_payload, MediaBuffer};
use parking_lot::Mutex;
use std::sync::Arc;

/// Video pixel format (WebCodecs spec)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoPixelFormat {
  // 8-bit YUV formats
  /// Planar YUV 4:2:0, 12bpp
  I420,
  /// Planar YUV 4:2:0 with alpha plane
  I420A,
  /// Planar YUV 4:2:2, 16bpp
  I422,
  /// Planar YUV 4:2:2 with alpha plane
  I422A,
  /// Planar YUV 4:4:4, 24bpp
  I444,
  /// Planar YUV 4:4:4 with alpha plane
  I444A,

  // 10-bit YUV formats
  I420P10,
  I420AP10,
  I422P10,
  I422AP10,
  I444P10,
  I444AP10,

  // 12-bit YUV formats
  I420P12,
  I422P12,
  I444P12,

  // Semi-planar formats
  /// Y plane + interleaved UV
  NV12,
  /// Y plane + interleaved VU
  NV21,
  /// 10-bit Y plane + interleaved UV
  NV12P10,

  // RGB formats, packed
  RGBA,
  /// Alpha channel ignored
  RGBX,
  BGRA,
  /// Alpha channel ignored
  BGRX,
}

/// Per-plane geometry: chroma subsampling factors and samples per cell
/// (2 for the interleaved UV plane of NV12-family formats, 1 otherwise).
#[derive(Debug, Clone, Copy)]
pub struct PlaneSpec {
  pub x_sub: u32,
  pub y_sub: u32,
  pub samples: u32,
}

const fn plane(x_sub: u32, y_sub: u32, samples: u32) -> PlaneSpec {
  PlaneSpec {
    x_sub,
    y_sub,
    samples,
  }
}

const PACKED_RGB: &[PlaneSpec] = &[plane(1, 1, 1)];
const PLANES_420: &[PlaneSpec] = &[plane(1, 1, 1), plane(2, 2, 1), plane(2, 2, 1)];
const PLANES_420A: &[PlaneSpec] = &[
  plane(1, 1, 1),
  plane(2, 2, 1),
  plane(2, 2, 1),
  plane(1, 1, 1),
];
const PLANES_422: &[PlaneSpec] = &[plane(1, 1, 1), plane(2, 1, 1), plane(2, 1, 1)];
const PLANES_422A: &[PlaneSpec] = &[
  plane(1, 1, 1),
  plane(2, 1, 1),
  plane(2, 1, 1),
  plane(1, 1, 1),
];
const PLANES_444: &[PlaneSpec] = &[plane(1, 1, 1), plane(1, 1, 1), plane(1, 1, 1)];
const PLANES_444A: &[PlaneSpec] = &[
  plane(1, 1, 1),
  plane(1, 1, 1),
  plane(1, 1, 1),
  plane(1, 1, 1),
];
const PLANES_NV: &[PlaneSpec] = &[plane(1, 1, 1), plane(2, 2, 2)];

impl VideoPixelFormat {
  /// Bytes per sample (4 for packed RGB cells, 2 for 10/12-bit, else 1)
  pub fn bytes_per_sample(&self) -> u32 {
    match self {
      VideoPixelFormat::I420
      | VideoPixelFormat::I420A
      | VideoPixelFormat::I422
      | VideoPixelFormat::I422A
      | VideoPixelFormat::I444
      | VideoPixelFormat::I444A
      | VideoPixelFormat::NV12
      | VideoPixelFormat::NV21 => 1,
      VideoPixelFormat::I420P10
      | VideoPixelFormat::I420AP10
      | VideoPixelFormat::I422P10
      | VideoPixelFormat::I422AP10
      | VideoPixelFormat::I444P10
      | VideoPixelFormat::I444AP10
      | VideoPixelFormat::I420P12
      | VideoPixelFormat::I422P12
      | VideoPixelFormat::I444P12
      | VideoPixelFormat::NV12P10 => 2,
      VideoPixelFormat::RGBA
      | VideoPixelFormat::RGBX
      | VideoPixelFormat::BGRA
      | VideoPixelFormat::BGRX => 4,
    }
  }

  /// Plane geometry table for this format
  pub fn plane_specs(&self) -> &'static [PlaneSpec] {
    match self {
      VideoPixelFormat::RGBA
      | VideoPixelFormat::RGBX
      | VideoPixelFormat::BGRA
      | VideoPixelFormat::BGRX => PACKED_RGB,
      VideoPixelFormat::I420
      | VideoPixelFormat::I420P10
      | VideoPixelFormat::I420P12 => PLANES_420,
      VideoPixelFormat::I420A | VideoPixelFormat::I420AP10 => PLANES_420A,
      VideoPixelFormat::I422
      | VideoPixelFormat::I422P10
      | VideoPixelFormat::I422P12 => PLANES_422,
      VideoPixelFormat::I422A | VideoPixelFormat::I422AP10 => PLANES_422A,
      VideoPixelFormat::I444
      | VideoPixelFormat::I444P10
      | VideoPixelFormat::I444P12 => PLANES_444,
      VideoPixelFormat::I444A | VideoPixelFormat::I444AP10 => PLANES_444A,
      VideoPixelFormat::NV12 | VideoPixelFormat::NV21 | VideoPixelFormat::NV12P10 => PLANES_NV,
    }
  }

  /// Number of planes
  pub fn plane_count(&self) -> u32 {
    self.plane_specs().len() as u32
  }
}

/// Integer pixel rectangle used for codedRect/visibleRect and copyTo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoFrameRect {
  pub x: u32,
  pub y: u32,
  pub width: u32,
  pub height: u32,
}

impl VideoFrameRect {
  pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
    Self {
      x,
      y,
      width,
      height,
    }
  }

  /// Whether `other` lies entirely within this rect
  fn contains(&self, other: &VideoFrameRect) -> bool {
    other.x >= self.x
      && other.y >= self.y
      && other.x.saturating_add(other.width) <= self.x + self.width
      && other.y.saturating_add(other.height) <= self.y + self.height
  }
}

/// Video color primaries (W3C WebCodecs spec)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoColorPrimaries {
  /// BT.709 / sRGB primaries
  Bt709,
  /// BT.470 BG (PAL)
  Bt470bg,
  /// SMPTE 170M (NTSC)
  Smpte170m,
  /// BT.2020 (UHD)
  Bt2020,
  /// SMPTE 432 (DCI-P3)
  Smpte432,
}

/// Video transfer characteristics (W3C WebCodecs spec)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoTransferCharacteristics {
  Bt709,
  Smpte170m,
  /// IEC 61966-2-1 (sRGB)
  Srgb,
  Linear,
  /// Perceptual Quantizer (HDR)
  Pq,
  /// Hybrid Log-Gamma (HDR)
  Hlg,
}

/// Video matrix coefficients (W3C WebCodecs spec)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoMatrixCoefficients {
  /// RGB (identity matrix)
  Rgb,
  Bt709,
  Bt470bg,
  Smpte170m,
  /// BT.2020 non-constant luminance
  Bt2020Ncl,
}

/// Video color space parameters (WebCodecs spec)
///
/// Each member is optional; an unset member means "unknown".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VideoColorSpace {
  pub primaries: Option<VideoColorPrimaries>,
  pub transfer: Option<VideoTransferCharacteristics>,
  pub matrix: Option<VideoMatrixCoefficients>,
  pub full_range: Option<bool>,
}

/// VideoFrameMetadata - metadata associated with a VideoFrame
///
/// Members from the VideoFrame Metadata Registry that the runtime carries
/// through encode/decode untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VideoFrameMetadata {
  /// Capture wall-clock time in milliseconds
  pub capture_time: Option<f64>,
  /// Receive wall-clock time in milliseconds
  pub receive_time: Option<f64>,
  /// RTP timestamp from the capture source
  pub rtp_timestamp: Option<u32>,
}

/// Offset/stride pair describing one plane in a destination buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneLayout {
  /// Byte offset of the plane within the buffer
  pub offset: u32,
  /// Bytes per row, including any padding
  pub stride: u32,
}

/// Options for creating a VideoFrame from buffer data (VideoFrameBufferInit per spec)
#[derive(Clone)]
pub struct VideoFrameBufferInit {
  /// Pixel format (required)
  pub format: VideoPixelFormat,
  /// Coded width in pixels (required, non-zero)
  pub coded_width: u32,
  /// Coded height in pixels (required, non-zero)
  pub coded_height: u32,
  /// Timestamp in microseconds (required)
  pub timestamp: i64,
  /// Duration in microseconds
  pub duration: Option<i64>,
  /// Layout of the input planes; tightly packed when omitted
  pub layout: Option<Vec<PlaneLayout>>,
  /// Visible rect within the coded size; full coded size when omitted
  pub visible_rect: Option<VideoFrameRect>,
  /// Rotation in degrees clockwise (0, 90, 180, 270)
  pub rotation: Option<f64>,
  /// Horizontal flip
  pub flip: Option<bool>,
  /// Display width; must be paired with display_height
  pub display_width: Option<u32>,
  /// Display height; must be paired with display_width
  pub display_height: Option<u32>,
  /// Color space parameters
  pub color_space: Option<VideoColorSpace>,
  /// Metadata associated with the frame
  pub metadata: Option<VideoFrameMetadata>,
  /// Buffers to detach and move into the frame
  pub transfer: Vec<MediaBuffer>,
}

impl VideoFrameBufferInit {
  /// Init with the required members set and everything else defaulted.
  pub fn new(format: VideoPixelFormat, coded_width: u32, coded_height: u32, timestamp: i64) -> Self {
    Self {
      format,
      coded_width,
      coded_height,
      timestamp,
      duration: None,
      layout: None,
      visible_rect: None,
      rotation: None,
      flip: None,
      display_width: None,
      display_height: None,
      color_space: None,
      metadata: None,
      transfer: Vec::new(),
    }
  }
}

/// Options for cloning a VideoFrame with overrides (VideoFrameInit per spec)
#[derive(Debug, Clone, Default)]
pub struct VideoFrameInit {
  pub timestamp: Option<i64>,
  pub duration: Option<i64>,
  pub visible_rect: Option<VideoFrameRect>,
  pub rotation: Option<f64>,
  pub flip: Option<bool>,
  pub display_width: Option<u32>,
  pub display_height: Option<u32>,
  pub metadata: Option<VideoFrameMetadata>,
}

/// Options for copyTo / allocationSize
#[derive(Debug, Clone, Default)]
pub struct VideoFrameCopyToOptions {
  /// Source rect; defaults to the visible rect
  pub rect: Option<VideoFrameRect>,
  /// Destination plane layout; tightly packed when omitted
  pub layout: Option<Vec<PlaneLayout>>,
}

/// An ImageData-shaped record: tightly packed RGBA pixels
pub struct ImageData {
  pub width: u32,
  pub height: u32,
  pub data: MediaBuffer,
}

/// VideoFrame - a frame of decoded video data
///
/// Frames are created from raw pixel buffers, from other frames, from
/// ImageData-shaped records, or by a VideoDecoder. The payload is shared
/// between clones; `close()` detaches this handle only.
pub struct VideoFrame {
  inner: Arc<Mutex<Option<VideoFrameData>>>,
  /// Timestamp is preserved after close per W3C spec
  timestamp: i64,
}

impl VideoFrame {
  /// Create a new VideoFrame from raw pixel data (W3C VideoFrameBufferInit)
  pub fn new(data: &MediaBuffer, init: VideoFrameBufferInit) -> Result<Self> {
    if init.coded_width == 0 || init.coded_height == 0 {
      return Err(type_error("codedWidth and codedHeight must be non-zero"));
    }

    let coded_rect = VideoFrameRect::new(0, 0, init.coded_width, init.coded_height);
    let visible_rect = init.visible_rect.unwrap_or(coded_rect);
    if !coded_rect.contains(&visible_rect) || visible_rect.width == 0 || visible_rect.height == 0 {
      return Err(type_error("visibleRect must be a non-empty rect inside codedRect"));
    }
    validate_rect_alignment(init.format, &visible_rect).map_err(|e| type_error(e.message()))?;

    let rotation = parse_rotation(init.rotation)?;
    let (display_width, display_height) =
      resolve_display_size(&visible_rect, rotation, init.display_width, init.display_height)?;

    let payload = take_payload(data, &init.transfer)?;
    let payload = normalize_payload(
      payload,
      init.format,
      init.coded_width,
      init.coded_height,
      init.layout.as_deref(),
    )?;

    let data = VideoFrameData {
      format: init.format,
      coded_width: init.coded_width,
      coded_height: init.coded_height,
      visible_rect,
      rotation,
      flip: init.flip.unwrap_or(false),
      display_width,
      display_height,
      timestamp: init.timestamp,
      duration: init.duration,
      color_space: init.color_space.unwrap_or_default(),
      metadata: init.metadata.unwrap_or_default(),
      data: payload,
    };

    Ok(Self::from_data(data))
  }

  /// Create a VideoFrame from another frame, sharing the payload
  /// (W3C VideoFrame(frame, init) constructor)
  pub fn from_frame(source: &VideoFrame, init: VideoFrameInit) -> Result<Self> {
    let guard = source.inner.lock();
    let base = guard
      .as_ref()
      .ok_or_else(|| invalid_state_error("VideoFrame is closed"))?;

    let mut data = base.clone();
    let coded_rect = VideoFrameRect::new(0, 0, data.coded_width, data.coded_height);

    if let Some(rect) = init.visible_rect {
      if !coded_rect.contains(&rect) || rect.width == 0 || rect.height == 0 {
        return Err(type_error("visibleRect must be a non-empty rect inside codedRect"));
      }
      validate_rect_alignment(data.format, &rect).map_err(|e| type_error(e.message()))?;
      data.visible_rect = rect;
    }
    if let Some(rotation) = init.rotation {
      data.rotation = parse_rotation(Some(rotation))?;
    }
    if let Some(flip) = init.flip {
      data.flip = flip;
    }
    if init.display_width.is_some()
      || init.display_height.is_some()
      || init.visible_rect.is_some()
      || init.rotation.is_some()
    {
      let (dw, dh) = resolve_display_size(
        &data.visible_rect,
        data.rotation,
        init.display_width,
        init.display_height,
      )?;
      data.display_width = dw;
      data.display_height = dh;
    }
    if let Some(timestamp) = init.timestamp {
      data.timestamp = timestamp;
    }
    if let Some(duration) = init.duration {
      data.duration = Some(duration);
    }
    if let Some(metadata) = init.metadata {
      data.metadata = metadata;
    }

    Ok(Self::from_data(data))
  }

  /// Create an RGBA VideoFrame from an ImageData-shaped record
  pub fn from_image_data(image: &ImageData, init: VideoFrameInit) -> Result<Self> {
    if image.width == 0 || image.height == 0 {
      return Err(type_error("ImageData dimensions must be non-zero"));
    }
    let expected = image.width as usize * image.height as usize * 4;
    let bytes = image.data.to_vec()?;
    if bytes.len() < expected {
      return Err(type_error(format!(
        "ImageData buffer too small: need {} bytes, got {}",
        expected,
        bytes.len()
      )));
    }

    let mut buffer_init = VideoFrameBufferInit::new(
      VideoPixelFormat::RGBA,
      image.width,
      image.height,
      init.timestamp.unwrap_or(0),
    );
    buffer_init.duration = init.duration;
    buffer_init.visible_rect = init.visible_rect;
    buffer_init.rotation = init.rotation;
    buffer_init.flip = init.flip;
    buffer_init.display_width = init.display_width;
    buffer_init.display_height = init.display_height;
    buffer_init.metadata = init.metadata;
    // ImageData is sRGB by definition
    buffer_init.color_space = Some(VideoColorSpace {
      primaries: Some(VideoColorPrimaries::Bt709),
      transfer: Some(VideoTransferCharacteristics::Srgb),
      matrix: Some(VideoMatrixCoefficients::Rgb),
      full_range: Some(true),
    });

    VideoFrame::new(&MediaBuffer::new(bytes), buffer_init)
  }

  /// Wrap a decoder-produced carrier (crate-internal)
  pub(crate) fn from_data(data: VideoFrameData) -> Self {
    let timestamp = data.timestamp;
    Self {
      inner: Arc::new(Mutex::new(Some(data))),
      timestamp,
    }
  }

  /// Detach the frame and move its carrier out (submit-side ownership
  /// transfer; crate-internal)
  pub(crate) fn take_data(&self) -> Result<VideoFrameData> {
    self
      .inner
      .lock()
      .take()
      .ok_or_else(|| invalid_state_error("VideoFrame is closed"))
  }

  // ========================================================================
  // Properties (WebCodecs spec)
  // ========================================================================

  /// Pixel format; None once closed
  pub fn format(&self) -> Option<VideoPixelFormat> {
    self.inner.lock().as_ref().map(|d| d.format)
  }

  /// Coded width; 0 once closed
  pub fn coded_width(&self) -> u32 {
    self.inner.lock().as_ref().map(|d| d.coded_width).unwrap_or(0)
  }

  /// Coded height; 0 once closed
  pub fn coded_height(&self) -> u32 {
    self.inner.lock().as_ref().map(|d| d.coded_height).unwrap_or(0)
  }

  /// Rect {0, 0, codedWidth, codedHeight}; None once closed
  pub fn coded_rect(&self) -> Option<VideoFrameRect> {
    self
      .inner
      .lock()
      .as_ref()
      .map(|d| VideoFrameRect::new(0, 0, d.coded_width, d.coded_height))
  }

  /// Visible rect; None once closed
  pub fn visible_rect(&self) -> Option<VideoFrameRect> {
    self.inner.lock().as_ref().map(|d| d.visible_rect)
  }

  /// Display width; 0 once closed
  pub fn display_width(&self) -> u32 {
    self.inner.lock().as_ref().map(|d| d.display_width).unwrap_or(0)
  }

  /// Display height; 0 once closed
  pub fn display_height(&self) -> u32 {
    self.inner.lock().as_ref().map(|d| d.display_height).unwrap_or(0)
  }

  /// Rotation in degrees clockwise (0, 90, 180 or 270)
  pub fn rotation(&self) -> u32 {
    self.inner.lock().as_ref().map(|d| d.rotation).unwrap_or(0)
  }

  /// Horizontal flip
  pub fn flip(&self) -> bool {
    self.inner.lock().as_ref().map(|d| d.flip).unwrap_or(false)
  }

  /// Timestamp in microseconds; preserved after close per W3C spec
  pub fn timestamp(&self) -> i64 {
    self.timestamp
  }

  /// Duration in microseconds
  pub fn duration(&self) -> Option<i64> {
    self.inner.lock().as_ref().and_then(|d| d.duration)
  }

  /// Color space; None once closed
  pub fn color_space(&self) -> Option<VideoColorSpace> {
    self.inner.lock().as_ref().map(|d| d.color_space)
  }

  /// Whether this frame has been closed
  pub fn closed(&self) -> bool {
    self.inner.lock().is_none()
  }

  /// Deep copy of the frame metadata map
  pub fn metadata(&self) -> Result<VideoFrameMetadata> {
    self
      .inner
      .lock()
      .as_ref()
      .map(|d| d.metadata)
      .ok_or_else(|| invalid_state_error("VideoFrame is closed"))
  }

  // ========================================================================
  // Methods (WebCodecs spec)
  // ========================================================================

  /// Minimum destination byte length for `copy_to` with the same options
  pub fn allocation_size(&self, options: Option<&VideoFrameCopyToOptions>) -> Result<u32> {
    let guard = self.inner.lock();
    let data = guard
      .as_ref()
      .ok_or_else(|| invalid_state_error("VideoFrame is closed"))?;

    let rect = resolve_copy_rect(data, options)?;
    Ok(rect_allocation_size(data.format, &rect))
  }

  /// Copy pixel data into `destination`; returns the plane layout used.
  ///
  /// Synchronous per the runtime's suspension-point rules. Fails with
  /// InvalidStateError when closed, RangeError when the destination is
  /// undersized or the rect is out of bounds.
  pub fn copy_to(
    &self,
    destination: &mut [u8],
    options: Option<&VideoFrameCopyToOptions>,
  ) -> Result<Vec<PlaneLayout>> {
    let guard = self.inner.lock();
    let data = guard
      .as_ref()
      .ok_or_else(|| invalid_state_error("VideoFrame is closed"))?;

    let rect = resolve_copy_rect(data, options)?;
    let specs = data.format.plane_specs();
    let bps = data.format.bytes_per_sample();

    // Destination layout: caller-provided or tightly packed
    let layouts: Vec<PlaneLayout> = match options.and_then(|o| o.layout.as_ref()) {
      Some(layout) => {
        if layout.len() != specs.len() {
          return Err(range_error(format!(
            "layout must describe {} planes, got {}",
            specs.len(),
            layout.len()
          )));
        }
        layout.clone()
      }
      None => tight_layout(data.format, &rect),
    };

    // Validate the destination fits every plane
    for (i, spec) in specs.iter().enumerate() {
      let row_bytes = div_ceil(rect.width, spec.x_sub) * spec.samples * bps;
      let rows = div_ceil(rect.height, spec.y_sub);
      if layouts[i].stride < row_bytes {
        return Err(range_error(format!(
          "plane {i} stride {} is smaller than row size {row_bytes}",
          layouts[i].stride
        )));
      }
      let end = layouts[i].offset as usize
        + layouts[i].stride as usize * (rows as usize - 1)
        + row_bytes as usize;
      if end > destination.len() {
        return Err(range_error(format!(
          "destination buffer too small: plane {i} needs {end} bytes, got {}",
          destination.len()
        )));
      }
    }

    // Copy each plane row by row out of the tightly packed source
    let mut src_plane_offset = 0usize;
    for (i, spec) in specs.iter().enumerate() {
      let src_stride = (div_ceil(data.coded_width, spec.x_sub) * spec.samples * bps) as usize;
      let src_rows = div_ceil(data.coded_height, spec.y_sub) as usize;

      let row_bytes = (div_ceil(rect.width, spec.x_sub) * spec.samples * bps) as usize;
      let rows = div_ceil(rect.height, spec.y_sub) as usize;
      let first_row = (rect.y / spec.y_sub) as usize;
      let row_offset = ((rect.x / spec.x_sub) * spec.samples * bps) as usize;

      for row in 0..rows {
        let src_start = src_plane_offset + (first_row + row) * src_stride + row_offset;
        let dst_start = layouts[i].offset as usize + row * layouts[i].stride as usize;
        destination[dst_start..dst_start + row_bytes]
          .copy_from_slice(&data.data[src_start..src_start + row_bytes]);
      }

      src_plane_offset += src_stride * src_rows;
    }

    Ok(layouts)
  }

  /// Create a new VideoFrame sharing this frame's payload
  pub fn clone_frame(&self) -> Result<VideoFrame> {
    let guard = self.inner.lock();
    let data = guard
      .as_ref()
      .ok_or_else(|| invalid_state_error("VideoFrame is closed"))?;
    Ok(Self::from_data(data.clone()))
  }

  /// Close and release the payload reference. Idempotent.
  pub fn close(&self) {
    self.inner.lock().take();
  }
}

impl std::fmt::Debug for VideoFrame {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let guard = self.inner.lock();
    if let Some(ref d) = *guard {
      return f
        .debug_struct("VideoFrame")
        .field("format", &d.format)
        .field("coded_width", &d.coded_width)
        .field("coded_height", &d.coded_height)
        .field("timestamp", &d.timestamp)
        .finish();
    }
    f.debug_struct("VideoFrame").field("closed", &true).finish()
  }
}

fn div_ceil(value: u32, divisor: u32) -> u32 {
  value.div_ceil(divisor)
}

/// Total tightly packed byte size of `format` planes covering `rect`
pub(crate) fn rect_allocation_size(format: VideoPixelFormat, rect: &VideoFrameRect) -> u32 {
  let bps = format.bytes_per_sample();
  format
    .plane_specs()
    .iter()
    .map(|spec| {
      div_ceil(rect.width, spec.x_sub) * spec.samples * bps * div_ceil(rect.height, spec.y_sub)
    })
    .sum()
}

/// Tightly packed plane layout for `format` planes covering `rect`
fn tight_layout(format: VideoPixelFormat, rect: &VideoFrameRect) -> Vec<PlaneLayout> {
  let bps = format.bytes_per_sample();
  let mut offset = 0u32;
  format
    .plane_specs()
    .iter()
    .map(|spec| {
      let stride = div_ceil(rect.width, spec.x_sub) * spec.samples * bps;
      let layout = PlaneLayout { offset, stride };
      offset += stride * div_ceil(rect.height, spec.y_sub);
      layout
    })
    .collect()
}

/// Rect offsets must land on sample boundaries of every plane
fn validate_rect_alignment(format: VideoPixelFormat, rect: &VideoFrameRect) -> Result<()> {
  for (i, spec) in format.plane_specs().iter().enumerate() {
    if rect.x % spec.x_sub != 0 || rect.y % spec.y_sub != 0 {
      return Err(range_error(format!(
        "rect offset ({}, {}) is not sample-aligned for plane {i}",
        rect.x, rect.y
      )));
    }
  }
  Ok(())
}

/// Resolve and validate the source rect for copyTo/allocationSize
fn resolve_copy_rect(
  data: &VideoFrameData,
  options: Option<&VideoFrameCopyToOptions>,
) -> Result<VideoFrameRect> {
  let coded_rect = VideoFrameRect::new(0, 0, data.coded_width, data.coded_height);
  let rect = options
    .and_then(|o| o.rect)
    .unwrap_or(data.visible_rect);
  if rect.width == 0 || rect.height == 0 || !coded_rect.contains(&rect) {
    return Err(range_error("rect is empty or outside codedRect"));
  }
  validate_rect_alignment(data.format, &rect)?;
  Ok(rect)
}

/// Normalize rotation to one of {0, 90, 180, 270}
pub(crate) fn parse_rotation(rotation: Option<f64>) -> Result<u32> {
  let Some(rotation) = rotation else {
    return Ok(0);
  };
  if !rotation.is_finite() || rotation.fract() != 0.0 {
    return Err(type_error(format!("invalid rotation: {rotation}")));
  }
  let normalized = ((rotation as i64 % 360) + 360) % 360;
  match normalized {
    0 | 90 | 180 | 270 => Ok(normalized as u32),
    _ => Err(type_error(format!(
      "rotation must be a multiple of 90 degrees, got {rotation}"
    ))),
  }
}

/// Derive display dimensions from the visible rect, rotation and the
/// optional explicit displayWidth/displayHeight pair.
fn resolve_display_size(
  visible_rect: &VideoFrameRect,
  rotation: u32,
  display_width: Option<u32>,
  display_height: Option<u32>,
) -> Result<(u32, u32)> {
  match (display_width, display_height) {
    (Some(w), Some(h)) => {
      if w == 0 || h == 0 {
        return Err(type_error("displayWidth and displayHeight must be non-zero"));
      }
      Ok((w, h))
    }
    (None, None) => {
      // 90/270 degree rotation swaps the displayed axes
      if rotation == 90 || rotation == 270 {
        Ok((visible_rect.height, visible_rect.width))
      } else {
        Ok((visible_rect.width, visible_rect.height))
      }
    }
    _ => Err(type_error(
      "displayWidth and displayHeight must both be specified, or neither",
    )),
  }
}

/// Bring the input payload into the tightly packed plane order the frame
/// stores. A custom input layout is copied plane by plane; a tight layout
/// (or no layout) keeps the arena as-is.
fn normalize_payload(
  payload: Arc<[u8]>,
  format: VideoPixelFormat,
  coded_width: u32,
  coded_height: u32,
  layout: Option<&[PlaneLayout]>,
) -> Result<Arc<[u8]>> {
  let coded_rect = VideoFrameRect::new(0, 0, coded_width, coded_height);
  let tight = tight_layout(format, &coded_rect);
  let total = rect_allocation_size(format, &coded_rect) as usize;

  let Some(layout) = layout else {
    if payload.len() < total {
      return Err(type_error(format!(
        "data buffer too small: need {total} bytes, got {}",
        payload.len()
      )));
    }
    return Ok(payload);
  };

  if layout.len() != tight.len() {
    return Err(type_error(format!(
      "layout must describe {} planes, got {}",
      tight.len(),
      layout.len()
    )));
  }
  if layout == tight.as_slice() {
    if payload.len() < total {
      return Err(type_error(format!(
        "data buffer too small: need {total} bytes, got {}",
        payload.len()
      )));
    }
    return Ok(payload);
  }

  let specs = format.plane_specs();
  let bps = format.bytes_per_sample();
  let mut packed = vec![0u8; total];
  for (i, spec) in specs.iter().enumerate() {
    let row_bytes = (div_ceil(coded_width, spec.x_sub) * spec.samples * bps) as usize;
    let rows = div_ceil(coded_height, spec.y_sub) as usize;
    if (layout[i].stride as usize) < row_bytes {
      return Err(type_error(format!(
        "plane {i} stride {} is smaller than row size {row_bytes}",
        layout[i].stride
      )));
    }
    let src_end =
      layout[i].offset as usize + layout[i].stride as usize * (rows - 1) + row_bytes;
    if src_end > payload.len() {
      return Err(type_error(format!(
        "data buffer too small: plane {i} needs {src_end} bytes, got {}",
        payload.len()
      )));
    }
    for row in 0..rows {
      let src_start = layout[i].offset as usize + row * layout[i].stride as usize;
      let dst_start = tight[i].offset as usize + row * row_bytes;
      packed[dst_start..dst_start + row_bytes]
        .copy_from_slice(&payload[src_start..src_start + row_bytes]);
    }
  }

  Ok(Arc::from(packed))
}

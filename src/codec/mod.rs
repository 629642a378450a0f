//! Codec engine seam
//!
//! The pipelines never talk to a native media library directly; they drive
//! an implementation of the [`CodecEngine`] capability set. An engine is
//! owned by exactly one pipeline and all of its methods are invoked from
//! that pipeline's worker thread, so implementations need `Send` but no
//! internal synchronization.

#[cfg(test)]
pub(crate) mod fake;

use crate::webcodecs::{
    AudioDecoderConfig, AudioEncoderConfig, AudioSampleFormat, VideoColorSpace, VideoDecoderConfig,
    VideoEncoderConfig, VideoFrameMetadata, VideoFrameRect, VideoPixelFormat,
};
use std::sync::Arc;

/// Engine error type
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// Codec or configuration not supported by this engine
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Configuration understood but invalid
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input bitstream or sample data is malformed
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// An operation was attempted before configure
    #[error("codec not configured")]
    NotConfigured,

    /// Encode/decode operation failed
    #[error("codec error: {0}")]
    Codec(String),
}

/// Result of a failed push: either transient backpressure handing the
/// input back, or a fatal engine failure.
pub enum PushError<T> {
    /// The engine cannot accept more input until outputs are pulled
    Saturated(T),
    /// The engine failed processing this input
    Fatal(EngineError),
}

/// Successful configure outcome
#[derive(Debug, Clone, Default)]
pub struct Configured {
    /// Codec-specific bitstream description (e.g. avcC/hvcC extradata)
    /// captured at configure time; None for in-band parameter sets.
    pub description: Option<Vec<u8>>,
}

/// Result of a support probe: whether the descriptor is supported, plus
/// the descriptor echo with recognized properties preserved.
#[derive(Debug, Clone)]
pub struct ConfigSupport<C> {
    pub supported: bool,
    pub config: C,
}

/// Abstract capability set of a native codec engine.
///
/// `push_input`/`pull_output` form a non-blocking pair: push may report
/// saturation, in which case the caller drains outputs and retries.
/// `flush` signals end-of-stream and blocks (on the worker thread) until
/// all buffered outputs are retrievable. `reset` aborts pending work and
/// returns the engine to its pre-configured state.
pub trait CodecEngine: Send + 'static {
    type Config: Clone + Send + 'static;
    type Input: Send + 'static;
    type Output: Send + 'static;

    fn configure(&mut self, descriptor: &Self::Config) -> Result<Configured, EngineError>;

    fn push_input(&mut self, item: Self::Input) -> Result<(), PushError<Self::Input>>;

    fn pull_output(&mut self) -> Option<Self::Output>;

    fn flush(&mut self) -> Result<(), EngineError>;

    fn reset(&mut self);

    fn is_config_supported(descriptor: &Self::Config) -> ConfigSupport<Self::Config>
    where
        Self: Sized;
}

/// Raw video frame carrier moved between media objects and engines.
///
/// Planes are tightly packed in plane order covering the full coded size.
#[derive(Debug, Clone)]
pub struct VideoFrameData {
    pub format: VideoPixelFormat,
    pub coded_width: u32,
    pub coded_height: u32,
    pub visible_rect: VideoFrameRect,
    /// Degrees clockwise: 0, 90, 180 or 270
    pub rotation: u32,
    pub flip: bool,
    pub display_width: u32,
    pub display_height: u32,
    /// Presentation timestamp in microseconds
    pub timestamp: i64,
    /// Duration in microseconds
    pub duration: Option<i64>,
    pub color_space: VideoColorSpace,
    pub metadata: VideoFrameMetadata,
    pub data: Arc<[u8]>,
}

/// Raw audio sample carrier moved between media objects and engines.
///
/// Interleaved formats store one run of frames x channels samples; planar
/// formats store one contiguous plane per channel.
#[derive(Debug, Clone)]
pub struct AudioFrameData {
    pub format: AudioSampleFormat,
    pub sample_rate: f64,
    pub number_of_frames: u32,
    pub number_of_channels: u32,
    /// Presentation timestamp in microseconds
    pub timestamp: i64,
    pub data: Arc<[u8]>,
}

/// Encoded chunk carrier moved between media objects and engines.
#[derive(Debug, Clone)]
pub struct ChunkData {
    /// Key (self-contained) vs. delta (differentially coded)
    pub key: bool,
    /// Presentation timestamp in microseconds
    pub timestamp: i64,
    /// Duration in microseconds
    pub duration: Option<i64>,
    pub data: Arc<[u8]>,
}

/// Input to a video encode engine
pub struct VideoEncodeInput {
    pub frame: VideoFrameData,
    /// Force this frame to be encoded as a keyframe
    pub key_frame: bool,
}

/// Video encode engine: frames in, chunks out
pub trait VideoEncodeEngine:
    CodecEngine<Config = VideoEncoderConfig, Input = VideoEncodeInput, Output = ChunkData>
{
}
impl<T> VideoEncodeEngine for T where
    T: CodecEngine<Config = VideoEncoderConfig, Input = VideoEncodeInput, Output = ChunkData>
{
}

/// Video decode engine: chunks in, frames out
pub trait VideoDecodeEngine:
    CodecEngine<Config = VideoDecoderConfig, Input = ChunkData, Output = VideoFrameData>
{
}
impl<T> VideoDecodeEngine for T where
    T: CodecEngine<Config = VideoDecoderConfig, Input = ChunkData, Output = VideoFrameData>
{
}

/// Audio encode engine: sample buffers in, chunks out
pub trait AudioEncodeEngine:
    CodecEngine<Config = AudioEncoderConfig, Input = AudioFrameData, Output = ChunkData>
{
}
impl<T> AudioEncodeEngine for T where
    T: CodecEngine<Config = AudioEncoderConfig, Input = AudioFrameData, Output = ChunkData>
{
}

/// Audio decode engine: chunks in, sample buffers out
pub trait AudioDecodeEngine:
    CodecEngine<Config = AudioDecoderConfig, Input = ChunkData, Output = AudioFrameData>
{
}
impl<T> AudioDecodeEngine for T where
    T: CodecEngine<Config = AudioDecoderConfig, Input = ChunkData, Output = AudioFrameData>
{
}

/// Image decode capability: decode a fully buffered container into its
/// frame sequence. Container-level track metadata (frame counts,
/// animation loops) is probed by the ImageDecoder itself; the engine only
/// produces pixels.
pub trait ImageDecodeEngine: Send + 'static {
    fn decode_frames(
        &mut self,
        mime_type: &str,
        data: &[u8],
    ) -> Result<Vec<VideoFrameData>, EngineError>;

    fn is_type_supported(mime_type: &str) -> bool
    where
        Self: Sized;
}

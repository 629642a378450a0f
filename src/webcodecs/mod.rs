//! WebCodecs API implementation
//!
//! Provides a spec-compliant WebCodecs API surface over a pluggable
//! codec engine.
//! See: https://developer.mozilla.org/en-US/docs/Web/API/WebCodecs_API

mod audio_data;
mod audio_decoder;
mod audio_encoder;
pub mod codec_string;
mod encoded_audio_chunk;
mod encoded_video_chunk;
pub mod error;
pub(crate) mod image_decoder;
mod media_buffer;
mod queue;
mod video_decoder;
mod video_encoder;
pub(crate) mod video_frame;

pub use audio_data::{AudioData, AudioDataCopyToOptions, AudioDataInit, AudioSampleFormat};
pub use audio_decoder::{AudioDecoder, AudioDecoderInit, AudioDecoderOutputCallback};
pub use audio_encoder::{
  AudioDecoderConfigOutput, AudioEncoder, AudioEncoderInit, AudioEncoderOutputCallback,
  EncodedAudioChunkMetadata,
};
pub use encoded_audio_chunk::{
  AacBitstreamFormat, AacEncoderConfig, AudioDecoderConfig, AudioDecoderSupport,
  AudioEncoderConfig, AudioEncoderSupport, BitrateMode, EncodedAudioChunk, EncodedAudioChunkInit,
  EncodedAudioChunkType, FlacEncoderConfig, OpusBitstreamFormat, OpusEncoderConfig,
};
pub use encoded_video_chunk::{
  AlphaOption, AvcBitstreamFormat, AvcEncoderConfig, EncodedVideoChunk, EncodedVideoChunkInit,
  EncodedVideoChunkType, HardwareAcceleration, HevcBitstreamFormat, HevcEncoderConfig,
  LatencyMode, VideoDecoderConfig, VideoDecoderSupport, VideoEncoderBitrateMode,
  VideoEncoderConfig, VideoEncoderSupport,
};
pub use error::{Result, WebCodecsError, WebCodecsErrorCallback};
pub use image_decoder::{
  ColorSpaceConversion, ImageDataSource, ImageDecodeOptions, ImageDecodeResult, ImageDecoder,
  ImageDecoderInit, ImageTrack, ImageTrackList, PremultiplyAlpha,
};
pub use media_buffer::MediaBuffer;
pub use queue::{CodecState, EventListenerId};
pub use video_decoder::{VideoDecoder, VideoDecoderInit, VideoDecoderOutputCallback};
pub use video_encoder::{
  EncodedVideoChunkMetadata, SvcOutputMetadata, VideoDecoderConfigOutput, VideoEncoder,
  VideoEncoderEncodeOptions, VideoEncoderInit, VideoEncoderOutputCallback,
};
pub use video_frame::{
  ImageData, PlaneLayout, PlaneSpec, VideoColorPrimaries, VideoColorSpace, VideoFrame,
  VideoFrameBufferInit, VideoFrameCopyToOptions, VideoFrameInit, VideoFrameMetadata,
  VideoFrameRect, VideoMatrixCoefficients, VideoPixelFormat, VideoTransferCharacteristics,
};

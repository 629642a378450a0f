#![deny(clippy::all)]

//! W3C WebCodecs codec core
//!
//! This crate provides a spec-compliant implementation of the WebCodecs
//! API core: four state-driven codec pipelines, an image decoder, and the
//! detachable media data objects they exchange. Compression itself is
//! delegated to a pluggable codec engine (see [`codec`]).

// Codec engine seam (abstract capability set)
pub mod codec;

// WebCodecs API surface
pub mod webcodecs;

// Re-export WebCodecs types at crate root
pub use webcodecs::{
    // Video types
    AlphaOption, AvcBitstreamFormat, AvcEncoderConfig, CodecState, EncodedVideoChunk,
    EncodedVideoChunkInit, EncodedVideoChunkMetadata, EncodedVideoChunkType, HardwareAcceleration,
    HevcBitstreamFormat, HevcEncoderConfig, LatencyMode, PlaneLayout, SvcOutputMetadata,
    VideoColorPrimaries, VideoColorSpace, VideoDecoder, VideoDecoderConfig,
    VideoDecoderConfigOutput, VideoDecoderInit, VideoDecoderSupport, VideoEncoder,
    VideoEncoderBitrateMode, VideoEncoderConfig, VideoEncoderEncodeOptions, VideoEncoderInit,
    VideoEncoderSupport, VideoFrame, VideoFrameBufferInit, VideoFrameCopyToOptions,
    VideoFrameInit, VideoFrameMetadata, VideoFrameRect, VideoMatrixCoefficients,
    VideoPixelFormat, VideoTransferCharacteristics,
    // Audio types
    AacBitstreamFormat, AacEncoderConfig, AudioData, AudioDataCopyToOptions, AudioDataInit,
    AudioDecoder, AudioDecoderConfig, AudioDecoderConfigOutput, AudioDecoderInit,
    AudioDecoderSupport, AudioEncoder, AudioEncoderConfig, AudioEncoderInit, AudioEncoderSupport,
    AudioSampleFormat, BitrateMode, EncodedAudioChunk, EncodedAudioChunkInit,
    EncodedAudioChunkMetadata, EncodedAudioChunkType, FlacEncoderConfig, OpusBitstreamFormat,
    OpusEncoderConfig,
    // Image decoding
    ColorSpaceConversion, ImageData, ImageDataSource, ImageDecodeOptions, ImageDecodeResult,
    ImageDecoder, ImageDecoderInit, ImageTrack, ImageTrackList, PremultiplyAlpha,
    // Shared infrastructure
    EventListenerId, MediaBuffer, Result, WebCodecsError, WebCodecsErrorCallback,
};

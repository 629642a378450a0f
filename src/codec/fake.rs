//! Deterministic in-memory engines for pipeline tests
//!
//! The encoders serialize the raw payload behind a small header and the
//! decoders parse it back, so round trips preserve samples bit-exactly
//! and tests never need a native media library.

use super::{
    AudioFrameData, ChunkData, CodecEngine, ConfigSupport, Configured, EngineError, PushError,
    VideoEncodeInput, VideoFrameData,
};
use crate::webcodecs::codec_string::{parse_audio_codec_string, parse_video_codec_string, VideoCodec};
use crate::webcodecs::{
    AacBitstreamFormat, AudioDecoderConfig, AudioEncoderConfig, AudioSampleFormat,
    AvcBitstreamFormat, VideoColorSpace, VideoDecoderConfig, VideoEncoderConfig,
    VideoFrameMetadata, VideoFrameRect, VideoPixelFormat,
};
use crossbeam::channel::Receiver;
use std::collections::VecDeque;
use std::sync::Arc;

const VIDEO_MAGIC: &[u8; 2] = b"FV";
const AUDIO_MAGIC: &[u8; 2] = b"FA";

fn pixel_format_tag(format: VideoPixelFormat) -> u8 {
    match format {
        VideoPixelFormat::I420 => 0,
        VideoPixelFormat::I420A => 1,
        VideoPixelFormat::I422 => 2,
        VideoPixelFormat::I422A => 3,
        VideoPixelFormat::I444 => 4,
        VideoPixelFormat::I444A => 5,
        VideoPixelFormat::I420P10 => 6,
        VideoPixelFormat::I420AP10 => 7,
        VideoPixelFormat::I422P10 => 8,
        VideoPixelFormat::I422AP10 => 9,
        VideoPixelFormat::I444P10 => 10,
        VideoPixelFormat::I444AP10 => 11,
        VideoPixelFormat::I420P12 => 12,
        VideoPixelFormat::I422P12 => 13,
        VideoPixelFormat::I444P12 => 14,
        VideoPixelFormat::NV12 => 15,
        VideoPixelFormat::NV21 => 16,
        VideoPixelFormat::NV12P10 => 17,
        VideoPixelFormat::RGBA => 18,
        VideoPixelFormat::RGBX => 19,
        VideoPixelFormat::BGRA => 20,
        VideoPixelFormat::BGRX => 21,
    }
}

fn tag_pixel_format(tag: u8) -> Option<VideoPixelFormat> {
    Some(match tag {
        0 => VideoPixelFormat::I420,
        1 => VideoPixelFormat::I420A,
        2 => VideoPixelFormat::I422,
        3 => VideoPixelFormat::I422A,
        4 => VideoPixelFormat::I444,
        5 => VideoPixelFormat::I444A,
        6 => VideoPixelFormat::I420P10,
        7 => VideoPixelFormat::I420AP10,
        8 => VideoPixelFormat::I422P10,
        9 => VideoPixelFormat::I422AP10,
        10 => VideoPixelFormat::I444P10,
        11 => VideoPixelFormat::I444AP10,
        12 => VideoPixelFormat::I420P12,
        13 => VideoPixelFormat::I422P12,
        14 => VideoPixelFormat::I444P12,
        15 => VideoPixelFormat::NV12,
        16 => VideoPixelFormat::NV21,
        17 => VideoPixelFormat::NV12P10,
        18 => VideoPixelFormat::RGBA,
        19 => VideoPixelFormat::RGBX,
        20 => VideoPixelFormat::BGRA,
        21 => VideoPixelFormat::BGRX,
        _ => return None,
    })
}

fn sample_format_tag(format: AudioSampleFormat) -> u8 {
    match format {
        AudioSampleFormat::U8 => 0,
        AudioSampleFormat::S16 => 1,
        AudioSampleFormat::S32 => 2,
        AudioSampleFormat::F32 => 3,
        AudioSampleFormat::U8Planar => 4,
        AudioSampleFormat::S16Planar => 5,
        AudioSampleFormat::S32Planar => 6,
        AudioSampleFormat::F32Planar => 7,
    }
}

fn tag_sample_format(tag: u8) -> Option<AudioSampleFormat> {
    Some(match tag {
        0 => AudioSampleFormat::U8,
        1 => AudioSampleFormat::S16,
        2 => AudioSampleFormat::S32,
        3 => AudioSampleFormat::F32,
        4 => AudioSampleFormat::U8Planar,
        5 => AudioSampleFormat::S16Planar,
        6 => AudioSampleFormat::S32Planar,
        7 => AudioSampleFormat::F32Planar,
        _ => return None,
    })
}

/// Passthrough video encoder: frames become headered chunks
#[derive(Default)]
pub(crate) struct FakeVideoEncoder {
    outputs: VecDeque<ChunkData>,
    frame_index: u64,
    configured: bool,
    /// When set, every push blocks until a token arrives
    gate: Option<Receiver<()>>,
}

impl FakeVideoEncoder {
    pub fn new() -> Self {
        Self {
            outputs: VecDeque::new(),
            frame_index: 0,
            configured: false,
            gate: None,
        }
    }

    /// Encoder whose pushes park until a token is sent; used to hold the
    /// submission queue at a known occupancy
    pub fn gated(gate: Receiver<()>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new()
        }
    }
}

impl CodecEngine for FakeVideoEncoder {
    type Config = VideoEncoderConfig;
    type Input = VideoEncodeInput;
    type Output = ChunkData;

    fn configure(&mut self, descriptor: &VideoEncoderConfig) -> Result<Configured, EngineError> {
        let codec = descriptor
            .codec
            .as_deref()
            .and_then(parse_video_codec_string)
            .ok_or_else(|| {
                EngineError::NotSupported(format!(
                    "no encoder for codec {:?}",
                    descriptor.codec
                ))
            })?;
        self.configured = true;
        self.frame_index = 0;

        // Non-AnnexB H.264/H.265 carries parameter sets out of band
        let description = match codec.codec {
            VideoCodec::H264
                if descriptor
                    .avc
                    .as_ref()
                    .and_then(|avc| avc.format)
                    .unwrap_or_default()
                    == AvcBitstreamFormat::Avc =>
            {
                Some(vec![
                    0x01,
                    codec.profile.unwrap_or(66),
                    0x00,
                    codec.level.unwrap_or(30),
                    0xff,
                ])
            }
            VideoCodec::Hevc => Some(vec![0x01, codec.profile.unwrap_or(1), 0x00, 0x00]),
            _ => None,
        };

        Ok(Configured { description })
    }

    fn push_input(&mut self, item: VideoEncodeInput) -> Result<(), PushError<VideoEncodeInput>> {
        if !self.configured {
            return Err(PushError::Fatal(EngineError::NotConfigured));
        }
        if let Some(ref gate) = self.gate {
            let _ = gate.recv();
        }

        let frame = &item.frame;
        let mut payload = Vec::with_capacity(frame.data.len() + 16);
        payload.extend_from_slice(VIDEO_MAGIC);
        payload.push(pixel_format_tag(frame.format));
        payload.extend_from_slice(&frame.coded_width.to_le_bytes());
        payload.extend_from_slice(&frame.coded_height.to_le_bytes());
        payload.extend_from_slice(&frame.data);

        let key = item.key_frame || self.frame_index == 0;
        self.frame_index += 1;

        self.outputs.push_back(ChunkData {
            key,
            timestamp: frame.timestamp,
            duration: frame.duration,
            data: Arc::from(payload),
        });
        Ok(())
    }

    fn pull_output(&mut self) -> Option<ChunkData> {
        self.outputs.pop_front()
    }

    fn flush(&mut self) -> Result<(), EngineError> {
        Ok(())
    }

    fn reset(&mut self) {
        self.outputs.clear();
        self.frame_index = 0;
        self.configured = false;
    }

    fn is_config_supported(descriptor: &VideoEncoderConfig) -> ConfigSupport<VideoEncoderConfig> {
        let supported = descriptor
            .codec
            .as_deref()
            .and_then(parse_video_codec_string)
            .is_some();
        ConfigSupport {
            supported,
            config: descriptor.clone(),
        }
    }
}

/// Passthrough video decoder: headered chunks become frames
#[derive(Default)]
pub(crate) struct FakeVideoDecoder {
    outputs: VecDeque<VideoFrameData>,
    configured: bool,
}

impl FakeVideoDecoder {
    pub fn new() -> Self {
        Self {
            outputs: VecDeque::new(),
            configured: false,
        }
    }
}

impl CodecEngine for FakeVideoDecoder {
    type Config = VideoDecoderConfig;
    type Input = ChunkData;
    type Output = VideoFrameData;

    fn configure(&mut self, descriptor: &VideoDecoderConfig) -> Result<Configured, EngineError> {
        descriptor
            .codec
            .as_deref()
            .and_then(parse_video_codec_string)
            .ok_or_else(|| {
                EngineError::NotSupported(format!(
                    "no decoder for codec {:?}",
                    descriptor.codec
                ))
            })?;
        self.configured = true;
        Ok(Configured::default())
    }

    fn push_input(&mut self, chunk: ChunkData) -> Result<(), PushError<ChunkData>> {
        if !self.configured {
            return Err(PushError::Fatal(EngineError::NotConfigured));
        }
        if chunk.data.len() < 11 || &chunk.data[0..2] != VIDEO_MAGIC {
            return Err(PushError::Fatal(EngineError::Codec(
                "malformed video bitstream".to_string(),
            )));
        }
        let format = tag_pixel_format(chunk.data[2]).ok_or_else(|| {
            PushError::Fatal(EngineError::Codec("unknown pixel format".to_string()))
        })?;
        let coded_width = u32::from_le_bytes(chunk.data[3..7].try_into().unwrap());
        let coded_height = u32::from_le_bytes(chunk.data[7..11].try_into().unwrap());

        self.outputs.push_back(VideoFrameData {
            format,
            coded_width,
            coded_height,
            visible_rect: VideoFrameRect::new(0, 0, coded_width, coded_height),
            rotation: 0,
            flip: false,
            display_width: coded_width,
            display_height: coded_height,
            timestamp: chunk.timestamp,
            duration: chunk.duration,
            color_space: VideoColorSpace::default(),
            metadata: VideoFrameMetadata::default(),
            data: Arc::from(&chunk.data[11..]),
        });
        Ok(())
    }

    fn pull_output(&mut self) -> Option<VideoFrameData> {
        self.outputs.pop_front()
    }

    fn flush(&mut self) -> Result<(), EngineError> {
        Ok(())
    }

    fn reset(&mut self) {
        self.outputs.clear();
        self.configured = false;
    }

    fn is_config_supported(descriptor: &VideoDecoderConfig) -> ConfigSupport<VideoDecoderConfig> {
        let supported = descriptor
            .codec
            .as_deref()
            .and_then(parse_video_codec_string)
            .is_some();
        ConfigSupport {
            supported,
            config: descriptor.clone(),
        }
    }
}

/// Passthrough audio encoder: sample buffers become headered chunks
#[derive(Default)]
pub(crate) struct FakeAudioEncoder {
    outputs: VecDeque<ChunkData>,
    configured: bool,
}

impl FakeAudioEncoder {
    pub fn new() -> Self {
        Self {
            outputs: VecDeque::new(),
            configured: false,
        }
    }
}

impl CodecEngine for FakeAudioEncoder {
    type Config = AudioEncoderConfig;
    type Input = AudioFrameData;
    type Output = ChunkData;

    fn configure(&mut self, descriptor: &AudioEncoderConfig) -> Result<Configured, EngineError> {
        let codec = descriptor
            .codec
            .as_deref()
            .and_then(parse_audio_codec_string)
            .ok_or_else(|| {
                EngineError::NotSupported(format!(
                    "no encoder for codec {:?}",
                    descriptor.codec
                ))
            })?;
        self.configured = true;

        // ADTS frames are self-describing; raw AAC needs AudioSpecificConfig
        let description = match codec {
            crate::webcodecs::codec_string::AudioCodec::Aac
                if descriptor
                    .aac
                    .as_ref()
                    .and_then(|aac| aac.format)
                    .unwrap_or_default()
                    == AacBitstreamFormat::Aac =>
            {
                Some(vec![0x12, 0x10])
            }
            _ => None,
        };

        Ok(Configured { description })
    }

    fn push_input(&mut self, audio: AudioFrameData) -> Result<(), PushError<AudioFrameData>> {
        if !self.configured {
            return Err(PushError::Fatal(EngineError::NotConfigured));
        }

        let mut payload = Vec::with_capacity(audio.data.len() + 15);
        payload.extend_from_slice(AUDIO_MAGIC);
        payload.push(sample_format_tag(audio.format));
        payload.extend_from_slice(&(audio.sample_rate as u32).to_le_bytes());
        payload.extend_from_slice(&audio.number_of_frames.to_le_bytes());
        payload.extend_from_slice(&audio.number_of_channels.to_le_bytes());
        payload.extend_from_slice(&audio.data);

        let duration =
            (audio.number_of_frames as f64 / audio.sample_rate * 1_000_000.0) as i64;

        self.outputs.push_back(ChunkData {
            // Audio frames are independently decodable
            key: true,
            timestamp: audio.timestamp,
            duration: Some(duration),
            data: Arc::from(payload),
        });
        Ok(())
    }

    fn pull_output(&mut self) -> Option<ChunkData> {
        self.outputs.pop_front()
    }

    fn flush(&mut self) -> Result<(), EngineError> {
        Ok(())
    }

    fn reset(&mut self) {
        self.outputs.clear();
        self.configured = false;
    }

    fn is_config_supported(descriptor: &AudioEncoderConfig) -> ConfigSupport<AudioEncoderConfig> {
        let supported = descriptor
            .codec
            .as_deref()
            .and_then(parse_audio_codec_string)
            .is_some();
        ConfigSupport {
            supported,
            config: descriptor.clone(),
        }
    }
}

/// Passthrough audio decoder: headered chunks become sample buffers
#[derive(Default)]
pub(crate) struct FakeAudioDecoder {
    outputs: VecDeque<AudioFrameData>,
    configured: bool,
}

impl FakeAudioDecoder {
    pub fn new() -> Self {
        Self {
            outputs: VecDeque::new(),
            configured: false,
        }
    }
}

impl CodecEngine for FakeAudioDecoder {
    type Config = AudioDecoderConfig;
    type Input = ChunkData;
    type Output = AudioFrameData;

    fn configure(&mut self, descriptor: &AudioDecoderConfig) -> Result<Configured, EngineError> {
        descriptor
            .codec
            .as_deref()
            .and_then(parse_audio_codec_string)
            .ok_or_else(|| {
                EngineError::NotSupported(format!(
                    "no decoder for codec {:?}",
                    descriptor.codec
                ))
            })?;
        self.configured = true;
        Ok(Configured::default())
    }

    fn push_input(&mut self, chunk: ChunkData) -> Result<(), PushError<ChunkData>> {
        if !self.configured {
            return Err(PushError::Fatal(EngineError::NotConfigured));
        }
        if chunk.data.len() < 15 || &chunk.data[0..2] != AUDIO_MAGIC {
            return Err(PushError::Fatal(EngineError::Codec(
                "malformed audio bitstream".to_string(),
            )));
        }
        let format = tag_sample_format(chunk.data[2]).ok_or_else(|| {
            PushError::Fatal(EngineError::Codec("unknown sample format".to_string()))
        })?;
        let sample_rate = u32::from_le_bytes(chunk.data[3..7].try_into().unwrap());
        let number_of_frames = u32::from_le_bytes(chunk.data[7..11].try_into().unwrap());
        let number_of_channels = u32::from_le_bytes(chunk.data[11..15].try_into().unwrap());

        self.outputs.push_back(AudioFrameData {
            format,
            sample_rate: sample_rate as f64,
            number_of_frames,
            number_of_channels,
            timestamp: chunk.timestamp,
            data: Arc::from(&chunk.data[15..]),
        });
        Ok(())
    }

    fn pull_output(&mut self) -> Option<AudioFrameData> {
        self.outputs.pop_front()
    }

    fn flush(&mut self) -> Result<(), EngineError> {
        Ok(())
    }

    fn reset(&mut self) {
        self.outputs.clear();
        self.configured = false;
    }

    fn is_config_supported(descriptor: &AudioDecoderConfig) -> ConfigSupport<AudioDecoderConfig> {
        let supported = descriptor
            .codec
            .as_deref()
            .and_then(parse_audio_codec_string)
            .is_some();
        ConfigSupport {
            supported,
            config: descriptor.clone(),
        }
    }
}

/// Image engine producing solid 2x2 RGBA frames, one per container frame
pub(crate) struct FakeImageEngine;

impl super::ImageDecodeEngine for FakeImageEngine {
    fn decode_frames(
        &mut self,
        mime_type: &str,
        data: &[u8],
    ) -> Result<Vec<VideoFrameData>, EngineError> {
        if !<Self as super::ImageDecodeEngine>::is_type_supported(mime_type) {
            return Err(EngineError::NotSupported(format!(
                "unsupported image type: {mime_type}"
            )));
        }
        let frame_count = if mime_type.eq_ignore_ascii_case("image/gif") {
            crate::webcodecs::image_decoder::probe_gif(data)
                .ok_or_else(|| EngineError::InvalidData("corrupt GIF data".to_string()))?
                .frame_count
        } else if data.is_empty() {
            return Err(EngineError::InvalidData("empty image data".to_string()));
        } else {
            1
        };

        Ok((0..frame_count)
            .map(|i| {
                let shade = (i * 32 % 256) as u8;
                VideoFrameData {
                    format: VideoPixelFormat::RGBA,
                    coded_width: 2,
                    coded_height: 2,
                    visible_rect: VideoFrameRect::new(0, 0, 2, 2),
                    rotation: 0,
                    flip: false,
                    display_width: 2,
                    display_height: 2,
                    timestamp: i as i64 * 100_000,
                    duration: Some(100_000),
                    color_space: VideoColorSpace::default(),
                    metadata: VideoFrameMetadata::default(),
                    data: Arc::from(vec![shade; 16]),
                }
            })
            .collect())
    }

    fn is_type_supported(mime_type: &str) -> bool {
        matches!(
            mime_type.to_ascii_lowercase().as_str(),
            "image/gif" | "image/png" | "image/jpeg" | "image/jpg" | "image/webp" | "image/bmp"
        )
    }
}

//! Codec string parser for WebCodecs API
//!
//! Parses codec strings like vp09.PP.LL.DD, av01.P.LLT.DD, avc1.PPCCLL,
//! hev1.P.T.Lxxx into structured information (profile, level, bit depth),
//! plus the audio registry strings (mp4a.40.x, opus, flac, vorbis, mp3).
//! See: https://www.w3.org/TR/webcodecs-codec-registry/

/// Video codec families recognized by the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
  H264,
  Hevc,
  Vp8,
  Vp9,
  Av1,
}

impl VideoCodec {
  /// Registry prefix used in canonical codec strings
  pub fn as_str(&self) -> &'static str {
    match self {
      VideoCodec::H264 => "avc1",
      VideoCodec::Hevc => "hev1",
      VideoCodec::Vp8 => "vp8",
      VideoCodec::Vp9 => "vp09",
      VideoCodec::Av1 => "av01",
    }
  }
}

/// Audio codec families recognized by the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCodec {
  Aac,
  Opus,
  Flac,
  Vorbis,
  Mp3,
}

/// Parsed codec information extracted from a WebCodecs codec string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedVideoCodec {
  pub codec: VideoCodec,
  /// Profile number (codec-specific interpretation)
  pub profile: Option<u8>,
  /// Level value (codec-specific, often level x10)
  pub level: Option<u8>,
  /// Bit depth (8, 10, or 12)
  pub bit_depth: Option<u8>,
  /// Chroma subsampling (420, 422, 444)
  pub chroma_subsampling: Option<u16>,
}

impl ParsedVideoCodec {
  fn new(codec: VideoCodec) -> Self {
    Self {
      codec,
      profile: None,
      level: None,
      bit_depth: None,
      chroma_subsampling: None,
    }
  }
}

/// Parse a WebCodecs video codec string into structured information.
///
/// Supported formats:
/// - VP9: `vp09.PP.LL.DD.CC...` or `vp9`
/// - AV1: `av01.P.LLT.DD.M.CCC...` or `av1`
/// - H.264: `avc1.PPCCLL` or `avc3.PPCCLL` or `h264`
/// - H.265: `hev1.P.T.Lxxx` or `hvc1.P.T.Lxxx` or `hevc`/`h265`
/// - VP8: `vp8`
///
/// Returns `None` if the codec string is not recognized.
pub fn parse_video_codec_string(codec: &str) -> Option<ParsedVideoCodec> {
  let codec_lower = codec.to_lowercase();

  if codec_lower.starts_with("vp09") {
    return Some(parse_vp9(codec));
  }
  if codec_lower == "vp9" {
    return Some(ParsedVideoCodec::new(VideoCodec::Vp9));
  }

  if codec_lower.starts_with("av01") {
    return Some(parse_av1(codec));
  }
  if codec_lower == "av1" {
    return Some(ParsedVideoCodec::new(VideoCodec::Av1));
  }

  if codec_lower.starts_with("avc1") || codec_lower.starts_with("avc3") || codec_lower == "h264" {
    return Some(parse_avc(codec));
  }

  if codec_lower.starts_with("hev1")
    || codec_lower.starts_with("hvc1")
    || codec_lower == "h265"
    || codec_lower == "hevc"
  {
    return Some(parse_hevc(codec));
  }

  if codec_lower == "vp8" {
    return Some(ParsedVideoCodec::new(VideoCodec::Vp8));
  }

  None
}

/// Parse a WebCodecs audio codec string.
///
/// Recognizes `mp4a.40.x` (AAC object types), `opus`, `flac`, `vorbis`
/// and `mp3`. Returns `None` for anything else.
pub fn parse_audio_codec_string(codec: &str) -> Option<AudioCodec> {
  let codec_lower = codec.to_lowercase();

  if codec_lower == "mp4a.40.2"
    || codec_lower == "mp4a.40.02"
    || codec_lower == "mp4a.40.5"
    || codec_lower == "mp4a.40.05"
    || codec_lower == "mp4a.40.29"
    || codec_lower == "aac"
  {
    return Some(AudioCodec::Aac);
  }

  match codec_lower.as_str() {
    "opus" => Some(AudioCodec::Opus),
    "flac" => Some(AudioCodec::Flac),
    "vorbis" => Some(AudioCodec::Vorbis),
    "mp3" | "mp4a.69" | "mp4a.6b" => Some(AudioCodec::Mp3),
    _ => None,
  }
}

/// Parse VP9 codec string: vp09.PP.LL.DD.CC...
/// - PP: profile (00-03)
/// - LL: level (10-62)
/// - DD: bit depth (08, 10, 12)
/// - CC: chroma subsampling (00=420, 01=422, 02=444, 03=440)
fn parse_vp9(codec: &str) -> ParsedVideoCodec {
  let parts: Vec<&str> = codec.split('.').collect();

  let mut parsed = ParsedVideoCodec::new(VideoCodec::Vp9);

  if let Some(profile) = parts.get(1).and_then(|p| p.parse::<u8>().ok()) {
    parsed.profile = Some(profile);
  }
  if let Some(level) = parts.get(2).and_then(|p| p.parse::<u8>().ok()) {
    parsed.level = Some(level);
  }
  if let Some(depth) = parts.get(3).and_then(|p| p.parse::<u8>().ok()) {
    parsed.bit_depth = Some(depth);
  }
  parsed.chroma_subsampling = match parts.get(4).copied() {
    Some("00") => Some(420),
    Some("01") => Some(422),
    Some("02") => Some(444),
    Some("03") => Some(440),
    _ => None,
  };

  parsed
}

/// Parse AV1 codec string: av01.P.LLT.DD.M.CCC...
/// - P: profile (0=Main, 1=High, 2=Professional)
/// - LLT: level and tier (e.g. "04M")
/// - DD: bit depth (08, 10, 12)
/// - M: monochrome flag
/// - CCC: chroma subsampling (110=420, 100=422, 000=444)
fn parse_av1(codec: &str) -> ParsedVideoCodec {
  let parts: Vec<&str> = codec.split('.').collect();

  let mut parsed = ParsedVideoCodec::new(VideoCodec::Av1);

  if let Some(profile) = parts.get(1).and_then(|p| p.parse::<u8>().ok()) {
    parsed.profile = Some(profile);
  }
  if let Some(level_tier) = parts.get(2) {
    let level_str: String = level_tier
      .chars()
      .take_while(|c| c.is_ascii_digit())
      .collect();
    if let Ok(level) = level_str.parse::<u8>() {
      parsed.level = Some(level);
    }
  }
  if let Some(depth) = parts.get(3).and_then(|p| p.parse::<u8>().ok()) {
    parsed.bit_depth = Some(depth);
  }
  // Chroma subsampling follows the monochrome flag
  parsed.chroma_subsampling = match parts.get(5).copied() {
    Some("110") => Some(420),
    Some("100") => Some(422),
    Some("000") => Some(444),
    _ => None,
  };

  parsed
}

/// Parse AVC/H.264 codec string: avc1.PPCCLL
/// - PP: profile_idc (42=Baseline, 4D=Main, 64=High)
/// - CC: constraint_set flags
/// - LL: level_idc (1E=3.0, 1F=3.1, 28=4.0)
fn parse_avc(codec: &str) -> ParsedVideoCodec {
  let parts: Vec<&str> = codec.split('.').collect();

  let mut parsed = ParsedVideoCodec::new(VideoCodec::H264);

  if let Some(hex) = parts.get(1).filter(|p| p.len() >= 6) {
    if let Ok(profile) = u8::from_str_radix(&hex[0..2], 16) {
      parsed.profile = Some(profile);
    }
    if let Ok(level) = u8::from_str_radix(&hex[4..6], 16) {
      parsed.level = Some(level);
    }
  }

  // High 10 aside, H.264 payloads are 8-bit
  parsed.bit_depth = Some(8);

  parsed
}

/// Parse HEVC/H.265 codec string: hev1.P.TC.Lxxx.Bx
/// - P: profile (1=Main, 2=Main10, 3=Main Still Picture)
/// - Lxxx: level x30 (L120 = level 4.0, L150 = level 5.0)
fn parse_hevc(codec: &str) -> ParsedVideoCodec {
  let parts: Vec<&str> = codec.split('.').collect();

  let mut parsed = ParsedVideoCodec::new(VideoCodec::Hevc);

  if let Some(profile) = parts.get(1).and_then(|p| p.parse::<u8>().ok()) {
    parsed.profile = Some(profile);
    parsed.bit_depth = Some(if profile == 2 { 10 } else { 8 });
  }

  if let Some(level_str) = parts.get(3) {
    if let Some(rest) = level_str
      .strip_prefix('L')
      .or_else(|| level_str.strip_prefix('l'))
    {
      if let Ok(level) = rest.parse::<u8>() {
        parsed.level = Some(level);
      }
    }
  }

  parsed
}

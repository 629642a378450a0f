//! DOMException error taxonomy - WebCodecs spec compliant error handling
//!
//! Provides spec-compliant error handling following W3C DOMException conventions.
//! See: https://developer.mozilla.org/en-US/docs/Web/API/DOMException
//!
//! Every error carries a DOMException-style name plus a message, and renders
//! as `"{name}: {message}"`. Host-input validation errors (TypeError,
//! RangeError, InvalidStateError, QuotaExceededError) are returned
//! synchronously from the method that was misused; engine-origin failures
//! (NotSupportedError, DataError, EncodingError) are delivered through the
//! pipeline `error` callback; AbortError only ever rejects pending futures.

use std::fmt;

/// Result alias used across the WebCodecs surface.
pub type Result<T, E = WebCodecsError> = std::result::Result<T, E>;

/// Error callback installed on every pipeline; invoked from the
/// pipeline's worker thread for engine-origin failures.
pub type WebCodecsErrorCallback = Box<dyn FnMut(WebCodecsError) + Send>;

/// WebCodecs error with a DOMException-style name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WebCodecsError {
  /// Invalid argument type, missing required field, invalid enum value
  #[error("TypeError: {0}")]
  Type(String),
  /// Out-of-range value: undersized destination, bad rect or plane index
  #[error("RangeError: {0}")]
  Range(String),
  /// Method invoked in the wrong state, or access to a detached object
  #[error("InvalidStateError: {0}")]
  InvalidState(String),
  /// Submission queue beyond the hard limit
  #[error("QuotaExceededError: {0}")]
  QuotaExceeded(String),
  /// Codec or configuration rejected by the engine
  #[error("NotSupportedError: {0}")]
  NotSupported(String),
  /// Malformed input data (e.g. delta chunk where a key is required)
  #[error("DataError: {0}")]
  Data(String),
  /// Encode or decode operation failed inside the engine
  #[error("EncodingError: {0}")]
  Encoding(String),
  /// Pending operation cancelled by reset or close
  #[error("AbortError: {0}")]
  Abort(String),
}

impl WebCodecsError {
  /// DOMException name per WebCodecs spec
  pub fn name(&self) -> &'static str {
    match self {
      WebCodecsError::Type(_) => "TypeError",
      WebCodecsError::Range(_) => "RangeError",
      WebCodecsError::InvalidState(_) => "InvalidStateError",
      WebCodecsError::QuotaExceeded(_) => "QuotaExceededError",
      WebCodecsError::NotSupported(_) => "NotSupportedError",
      WebCodecsError::Data(_) => "DataError",
      WebCodecsError::Encoding(_) => "EncodingError",
      WebCodecsError::Abort(_) => "AbortError",
    }
  }

  /// Error message without the name prefix
  pub fn message(&self) -> &str {
    match self {
      WebCodecsError::Type(m)
      | WebCodecsError::Range(m)
      | WebCodecsError::InvalidState(m)
      | WebCodecsError::QuotaExceeded(m)
      | WebCodecsError::NotSupported(m)
      | WebCodecsError::Data(m)
      | WebCodecsError::Encoding(m)
      | WebCodecsError::Abort(m) => m,
    }
  }
}

/// Helper to create TypeError for type-related errors
///
/// Use for invalid argument types, missing required fields, invalid enums.
pub fn type_error(message: impl fmt::Display) -> WebCodecsError {
  WebCodecsError::Type(message.to_string())
}

/// Helper to create RangeError for out-of-range values
pub fn range_error(message: impl fmt::Display) -> WebCodecsError {
  WebCodecsError::Range(message.to_string())
}

/// Helper to create InvalidStateError for closed objects or wrong state
pub fn invalid_state_error(message: impl fmt::Display) -> WebCodecsError {
  WebCodecsError::InvalidState(message.to_string())
}

/// Helper to create the QuotaExceededError raised when a submission queue
/// overflows; the message always names the backpressure condition.
pub fn quota_exceeded_error(queue_size: u32, max_queue_size: u32) -> WebCodecsError {
  WebCodecsError::QuotaExceeded(format!(
    "submission queue is full ({queue_size} of {max_queue_size}): backpressure, flush() before submitting more input"
  ))
}

/// Helper to create NotSupportedError for unsupported codecs/configs
pub fn not_supported_error(message: impl fmt::Display) -> WebCodecsError {
  WebCodecsError::NotSupported(message.to_string())
}

/// Helper to create DataError for invalid data format
pub fn data_error(message: impl fmt::Display) -> WebCodecsError {
  WebCodecsError::Data(message.to_string())
}

/// Helper to create EncodingError for encoding/decoding failures
pub fn encoding_error(message: impl fmt::Display) -> WebCodecsError {
  WebCodecsError::Encoding(message.to_string())
}

/// Helper to create AbortError for cancelled operations
pub fn abort_error(message: impl fmt::Display) -> WebCodecsError {
  WebCodecsError::Abort(message.to_string())
}

impl From<crate::codec::EngineError> for WebCodecsError {
  /// Map an engine-origin failure onto the WebCodecs taxonomy.
  ///
  /// Config rejections become NotSupportedError, malformed bitstream data
  /// becomes DataError, everything else is an EncodingError.
  fn from(error: crate::codec::EngineError) -> Self {
    use crate::codec::EngineError;
    match error {
      EngineError::NotSupported(m) | EngineError::InvalidConfig(m) => {
        WebCodecsError::NotSupported(m)
      }
      EngineError::InvalidData(m) => WebCodecsError::Data(m),
      EngineError::NotConfigured => {
        WebCodecsError::Encoding("codec engine is not configured".to_string())
      }
      EngineError::Codec(m) => WebCodecsError::Encoding(m),
    }
  }
}

//! MediaBuffer - detachable host byte buffer
//!
//! The WebCodecs constructors accept a `transfer` list of buffers whose
//! ownership moves into the constructed object. MediaBuffer is the Rust
//! stand-in for a transferable ArrayBuffer: a cheaply clonable handle to an
//! immutable byte arena with a shared detach bit. Cloning a MediaBuffer
//! yields another handle to the *same* buffer; detaching through any handle
//! zeroes the length observed by all of them.

use crate::webcodecs::error::{invalid_state_error, Result};
use parking_lot::RwLock;
use std::sync::Arc;

/// A detachable, reference-counted byte buffer handle.
///
/// `byte_length()` reports 0 once the buffer has been detached; reads fail
/// with `InvalidStateError`. Detach is idempotent.
#[derive(Clone)]
pub struct MediaBuffer {
  state: Arc<RwLock<Option<Arc<[u8]>>>>,
}

impl MediaBuffer {
  /// Create a buffer owning a copy of `data`.
  pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
    Self {
      state: Arc::new(RwLock::new(Some(data.into()))),
    }
  }

  /// Length in bytes; 0 once detached.
  pub fn byte_length(&self) -> usize {
    self.state.read().as_ref().map(|b| b.len()).unwrap_or(0)
  }

  /// Whether this buffer has been detached.
  pub fn is_detached(&self) -> bool {
    self.state.read().is_none()
  }

  /// Run `f` over the buffer contents.
  ///
  /// Fails with `InvalidStateError` when the buffer is detached.
  pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Result<R> {
    let guard = self.state.read();
    match guard.as_ref() {
      Some(bytes) => Ok(f(bytes)),
      None => Err(invalid_state_error("buffer is detached")),
    }
  }

  /// Copy the contents out.
  pub fn to_vec(&self) -> Result<Vec<u8>> {
    self.with_bytes(|b| b.to_vec())
  }

  /// Detach the buffer, stealing the arena if still attached.
  pub(crate) fn detach(&self) -> Option<Arc<[u8]>> {
    self.state.write().take()
  }

  /// Whether two handles refer to the same underlying buffer.
  fn same_buffer(&self, other: &MediaBuffer) -> bool {
    Arc::ptr_eq(&self.state, &other.state)
  }
}

impl From<Vec<u8>> for MediaBuffer {
  fn from(data: Vec<u8>) -> Self {
    MediaBuffer::new(data)
  }
}

impl From<&[u8]> for MediaBuffer {
  fn from(data: &[u8]) -> Self {
    MediaBuffer::new(data)
  }
}

impl std::fmt::Debug for MediaBuffer {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("MediaBuffer")
      .field("byte_length", &self.byte_length())
      .field("detached", &self.is_detached())
      .finish()
  }
}

/// Resolve a constructor's payload honoring its `transfer` list.
///
/// When `data` itself appears in the transfer list the arena is moved
/// zero-copy; otherwise the contents are copied. Every listed buffer is
/// detached before returning. Duplicate entries and entries unrelated to
/// `data` detach silently and never error, per the transfer discipline.
pub(crate) fn take_payload(data: &MediaBuffer, transfer: &[MediaBuffer]) -> Result<Arc<[u8]>> {
  let transferred = transfer.iter().any(|buffer| buffer.same_buffer(data));

  let payload = if transferred {
    data
      .detach()
      .ok_or_else(|| invalid_state_error("data buffer is detached"))?
  } else {
    Arc::from(data.to_vec()?)
  };

  for buffer in transfer {
    buffer.detach();
  }

  Ok(payload)
}

//! Frame Codec
//!
//! TradingView's chart socket wraps every payload as
//! `~m~<len>~m~<payload>`, where `<len>` is the payload's byte length.
//! A single websocket message may carry several frames back to back.
//!
//! Heartbeats are frames whose payload is `~h~<n>`. They must be echoed
//! byte-for-byte, so decoded frames keep the exact wire text alongside the
//! payload.

use std::fmt::Write as _;

/// Frame delimiter.
pub const FRAME_MARKER: &str = "~m~";

/// Heartbeat payload prefix.
pub const HEARTBEAT_PREFIX: &str = "~h~";

/// Framing errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Length prefix is not a decimal number.
    #[error("invalid frame length prefix: {0:?}")]
    InvalidLength(String),

    /// Declared length ends inside a UTF-8 character.
    #[error("frame length {0} splits a character")]
    SplitCharacter(usize),
}

/// Wrap a payload in a frame header.
#[must_use]
pub fn encode(payload: &str) -> String {
    let mut frame = String::with_capacity(payload.len() + 16);
    let _ = write!(frame, "{FRAME_MARKER}{}{FRAME_MARKER}{payload}", payload.len());
    frame
}

/// Split a complete buffer into frame payloads. Incomplete trailing data is dropped.
///
/// # Errors
///
/// Returns an error when a length prefix is malformed.
pub fn split(buffer: &str) -> Result<Vec<String>, CodecError> {
    let mut frames = FrameBuffer::new();
    Ok(frames
        .push(buffer)?
        .into_iter()
        .map(|frame| frame.payload)
        .collect())
}

/// One decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// Exact wire text including the header.
    pub raw: String,
    /// Payload after the header.
    pub payload: String,
}

impl RawFrame {
    /// Whether the payload is a `~h~<digits>` keep-alive.
    #[must_use]
    pub fn is_heartbeat(&self) -> bool {
        self.payload
            .strip_prefix(HEARTBEAT_PREFIX)
            .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
    }
}

/// Reassembles frames across websocket messages.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    pending: String,
}

impl FrameBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pending: String::new(),
        }
    }

    /// Bytes held back waiting for the rest of a frame.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Append received text and return every frame it completes.
    ///
    /// A frame cut off at the end of `chunk` stays buffered until the next
    /// push. Text that precedes a frame marker is discarded.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed length prefix; the buffer is
    /// cleared since the stream can no longer be trusted.
    pub fn push(&mut self, chunk: &str) -> Result<Vec<RawFrame>, CodecError> {
        self.pending.push_str(chunk);
        match self.drain_frames() {
            Ok(frames) => Ok(frames),
            Err(e) => {
                self.pending.clear();
                Err(e)
            }
        }
    }

    fn drain_frames(&mut self) -> Result<Vec<RawFrame>, CodecError> {
        let mut frames = Vec::new();
        let mut pos = 0;

        while pos < self.pending.len() {
            let rest = &self.pending[pos..];
            let Some(offset) = rest.find(FRAME_MARKER) else {
                break;
            };
            if offset > 0 {
                tracing::debug!(skipped = offset, "Discarding text outside a frame");
                pos += offset;
                continue;
            }

            let len_start = pos + FRAME_MARKER.len();
            let Some(len_end) = self.pending[len_start..]
                .find(FRAME_MARKER)
                .map(|i| len_start + i)
            else {
                let digits = &self.pending[len_start..];
                let digits = digits
                    .strip_suffix("~m")
                    .or_else(|| digits.strip_suffix('~'))
                    .unwrap_or(digits);
                if digits.bytes().all(|b| b.is_ascii_digit()) {
                    break;
                }
                return Err(CodecError::InvalidLength(digits.to_string()));
            };

            let digits = &self.pending[len_start..len_end];
            let invalid = || CodecError::InvalidLength(digits.to_string());
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            let len: usize = digits.parse().map_err(|_| invalid())?;

            let body_start = len_end + FRAME_MARKER.len();
            let body_end = body_start.checked_add(len).ok_or_else(invalid)?;
            if body_end > self.pending.len() {
                break;
            }

            let payload = self
                .pending
                .get(body_start..body_end)
                .ok_or(CodecError::SplitCharacter(len))?;

            frames.push(RawFrame {
                raw: self.pending[pos..body_end].to_string(),
                payload: payload.to_string(),
            });
            pos = body_end;
        }

        self.pending.drain(..pos);
        Ok(frames)
    }
}

// =============================================================================
// Tests
// =============================================================================

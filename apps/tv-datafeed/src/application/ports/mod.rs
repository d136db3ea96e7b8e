//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `FrameTransport`: duplex text socket carrying chart protocol frames
//! - `BarSink`: destination for completed bar chunks
//! - `HistorySource`: something that can run a history download

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::bars::BarRow;
use crate::domain::history::{HistoryOutcome, HistoryRequest};

// =============================================================================
// Transport
// =============================================================================

/// Transport failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Could not establish the connection.
    #[error("connection failed: {0}")]
    Connect(String),

    /// No message within the read timeout.
    #[error("read timed out")]
    Timeout,

    /// Socket error while reading or writing.
    #[error("transport error: {0}")]
    Io(String),
}

/// A connected text-message socket.
#[async_trait]
pub trait FrameTransport: Send {
    /// Send one text message.
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Receive the next text message; `Ok(None)` once the peer has closed.
    async fn recv_text(&mut self) -> Result<Option<String>, TransportError>;

    /// Close the connection. Safe to call more than once.
    async fn close(&mut self) -> Result<(), TransportError>;
}

// =============================================================================
// Bar Sink
// =============================================================================

/// Sink failures.
#[derive(Debug, thiserror::Error)]
#[error("bar sink failed: {0}")]
pub struct SinkError(pub String);

/// Receives each completed chunk as it is flushed.
#[cfg_attr(test, mockall::automock)]
pub trait BarSink: Send {
    /// Store a chunk of rows, sorted ascending, for `symbol`.
    ///
    /// # Errors
    ///
    /// Returns an error if the rows could not be stored.
    fn write_chunk(&mut self, symbol: &str, rows: &[BarRow]) -> Result<(), SinkError>;
}

/// Sink that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl BarSink for DiscardSink {
    fn write_chunk(&mut self, _symbol: &str, _rows: &[BarRow]) -> Result<(), SinkError> {
        Ok(())
    }
}

// =============================================================================
// History Source
// =============================================================================

/// Failure to run a download at all (as opposed to one that ended early).
#[derive(Debug, thiserror::Error)]
#[error("history source failed: {0}")]
pub struct SourceError(pub String);

/// Runs history downloads.
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Download `request`, handing each completed chunk to `sink`.
    async fn fetch(
        &self,
        request: &HistoryRequest,
        sink: &mut dyn BarSink,
        cancel: &CancellationToken,
    ) -> Result<HistoryOutcome, SourceError>;
}

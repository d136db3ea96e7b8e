//! History Client
//!
//! Runs one [`SessionMachine`] per download over a dedicated socket:
//! connect, handshake, optional replay sub-handshake, then the read loop.
//! The socket is closed on every exit path.
//!
//! Setup failures (connect, handshake) are returned as errors. Once
//! streaming, failures end the download early but the chunks flushed so
//! far are still returned in the [`HistoryOutcome`].

use async_trait::async_trait;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::auth::SessionToken;
use super::codec::CodecError;
use super::command::Command;
use super::machine::{Action, HandshakeStep, SessionMachine};
use super::session::SessionIds;
use super::transport::WsTransport;
use crate::application::ports::{
    BarSink, FrameTransport, HistorySource, SourceError, TransportError,
};
use crate::domain::bars::BarTable;
use crate::domain::history::{HistoryOutcome, HistoryRequest, Termination};
use crate::infrastructure::config::StreamSettings;

// =============================================================================
// Error Type
// =============================================================================

/// Errors that abort a download before any data is streamed.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport failure during connect or handshake.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Command serialization failed.
    #[error("failed to encode command: {0}")]
    Encode(#[from] serde_json::Error),

    /// Handshake reply was not valid framing.
    #[error("framing error: {0}")]
    Codec(#[from] CodecError),

    /// Server closed the socket mid-handshake.
    #[error("connection closed during handshake")]
    HandshakeClosed,
}

impl From<ClientError> for SourceError {
    fn from(err: ClientError) -> Self {
        Self(err.to_string())
    }
}

enum Wait {
    Message(String),
    Closed,
    Cancelled,
    Deadline,
}

// =============================================================================
// Client
// =============================================================================

/// Downloads historical bars over the chart socket.
///
/// Channel ids are generated once per client and reused for every download.
#[derive(Debug)]
pub struct HistoryClient {
    settings: StreamSettings,
    token: SessionToken,
    ids: SessionIds,
}

impl HistoryClient {
    /// Create a client with fresh channel ids.
    #[must_use]
    pub fn new(settings: StreamSettings, token: SessionToken) -> Self {
        Self {
            settings,
            token,
            ids: SessionIds::generate(),
        }
    }

    /// Channel ids used by this client.
    #[must_use]
    pub const fn session_ids(&self) -> &SessionIds {
        &self.ids
    }

    /// Stream settings.
    #[must_use]
    pub const fn settings(&self) -> &StreamSettings {
        &self.settings
    }

    /// Connect and download `request`.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be opened or the handshake
    /// fails. Failures after streaming starts are reported through
    /// [`HistoryOutcome::termination`] instead.
    pub async fn get_hist(
        &self,
        request: &HistoryRequest,
        sink: &mut dyn BarSink,
        cancel: &CancellationToken,
    ) -> Result<HistoryOutcome, ClientError> {
        let mut transport = tokio::select! {
            () = cancel.cancelled() => return Ok(HistoryOutcome::empty(Termination::Cancelled)),
            connected = WsTransport::connect(&self.settings) => connected?,
        };
        self.run(&mut transport, request, sink, cancel).await
    }

    /// Download `request` over an already-open transport, closing it afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the handshake fails.
    pub async fn run<T: FrameTransport>(
        &self,
        transport: &mut T,
        request: &HistoryRequest,
        sink: &mut dyn BarSink,
        cancel: &CancellationToken,
    ) -> Result<HistoryOutcome, ClientError> {
        let result = self.exchange(transport, request, sink, cancel).await;
        if let Err(e) = transport.close().await {
            tracing::debug!(error = %e, "Error closing chart stream");
        }
        result
    }

    async fn exchange<T: FrameTransport>(
        &self,
        transport: &mut T,
        request: &HistoryRequest,
        sink: &mut dyn BarSink,
        cancel: &CancellationToken,
    ) -> Result<HistoryOutcome, ClientError> {
        let deadline = self.settings.deadline.map(|d| Instant::now() + d);
        let mut machine = SessionMachine::new(request.clone(), self.ids.clone());
        machine.connected();

        tracing::info!(
            symbol = %request.symbol,
            interval = %request.interval,
            n_bars = request.n_bars,
            replay = request.is_replay(),
            authenticated = self.token.is_authenticated(),
            "Requesting history"
        );

        for command in machine.session_setup(self.token.wire_value())? {
            send(transport, &command).await?;
        }

        if let Some(steps) = machine.replay_setup()? {
            for step in steps {
                match step {
                    HandshakeStep::Send(command) => send(transport, &command).await?,
                    HandshakeStep::Drain => {
                        let text = match next_message(transport, cancel, deadline).await? {
                            Wait::Message(text) => text,
                            Wait::Closed => return Err(ClientError::HandshakeClosed),
                            Wait::Cancelled => {
                                machine.cancel();
                                return Ok(HistoryOutcome::empty(Termination::Cancelled));
                            }
                            Wait::Deadline => {
                                machine.cancel();
                                return Ok(HistoryOutcome::empty(Termination::DeadlineExceeded));
                            }
                        };
                        for action in machine.drain(&text)? {
                            if let Action::Echo(raw) = action {
                                transport.send_text(raw).await?;
                            }
                        }
                    }
                }
            }
        }

        machine.start_streaming();
        let mut table = BarTable::new();
        let mut chunks = 0;

        let termination = 'stream: loop {
            let text = match next_message(transport, cancel, deadline).await {
                Ok(Wait::Message(text)) => text,
                Ok(Wait::Closed) => {
                    machine.fail();
                    break Termination::Failed("connection closed".to_string());
                }
                Ok(Wait::Cancelled) => {
                    machine.cancel();
                    break Termination::Cancelled;
                }
                Ok(Wait::Deadline) => {
                    machine.cancel();
                    break Termination::DeadlineExceeded;
                }
                Err(e) => {
                    machine.fail();
                    break Termination::Failed(e.to_string());
                }
            };

            let actions = match machine.on_message(&text) {
                Ok(actions) => actions,
                Err(e) => break Termination::Failed(e.to_string()),
            };

            for action in actions {
                match action {
                    Action::Echo(raw) => {
                        if let Err(e) = transport.send_text(raw).await {
                            machine.fail();
                            break 'stream Termination::Failed(e.to_string());
                        }
                    }
                    Action::Send(command) => {
                        if let Err(e) = send(transport, &command).await {
                            machine.fail();
                            break 'stream Termination::Failed(e.to_string());
                        }
                    }
                    Action::Flush(chunk) => {
                        if let Err(e) = sink.write_chunk(&request.symbol, &chunk) {
                            tracing::error!(symbol = %request.symbol, error = %e, "Failed to store chunk");
                        }
                        table.merge(chunk);
                        chunks += 1;
                    }
                    Action::Close => break 'stream Termination::Completed,
                }
            }
        };

        if termination.is_complete() {
            tracing::info!(
                symbol = %request.symbol,
                bars = table.len(),
                chunks,
                pages = machine.pages_requested(),
                rewinds = machine.rewinds(),
                "History completed"
            );
        } else {
            tracing::warn!(
                symbol = %request.symbol,
                bars = table.len(),
                chunks,
                dropped = machine.pending_rows(),
                %termination,
                "History ended early"
            );
        }

        Ok(HistoryOutcome {
            bars: table,
            chunks,
            termination,
        })
    }
}

#[async_trait]
impl HistorySource for HistoryClient {
    async fn fetch(
        &self,
        request: &HistoryRequest,
        sink: &mut dyn BarSink,
        cancel: &CancellationToken,
    ) -> Result<HistoryOutcome, SourceError> {
        Ok(self.get_hist(request, sink, cancel).await?)
    }
}

async fn send<T: FrameTransport>(transport: &mut T, command: &Command) -> Result<(), ClientError> {
    tracing::debug!(method = command.method(), "Sending command");
    transport.send_text(command.to_frame()?).await?;
    Ok(())
}

/// Wait for the next message, honoring cancellation and the deadline.
async fn next_message<T: FrameTransport>(
    transport: &mut T,
    cancel: &CancellationToken,
    deadline: Option<Instant>,
) -> Result<Wait, TransportError> {
    if cancel.is_cancelled() {
        return Ok(Wait::Cancelled);
    }
    if deadline.is_some_and(|d| Instant::now() >= d) {
        return Ok(Wait::Deadline);
    }

    let expiry = async move {
        match deadline {
            Some(d) => tokio::time::sleep_until(d).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        () = cancel.cancelled() => Ok(Wait::Cancelled),
        () = expiry => Ok(Wait::Deadline),
        received = transport.recv_text() => Ok(received?.map_or(Wait::Closed, Wait::Message)),
    }
}

// =============================================================================
// Tests
// =============================================================================

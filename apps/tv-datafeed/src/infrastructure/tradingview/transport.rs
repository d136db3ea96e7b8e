//! Websocket Transport
//!
//! [`FrameTransport`] over tokio-tungstenite. The chart endpoint checks
//! `Origin` and `User-Agent`, so both are set on the upgrade request.
//! Reads are bounded by a timeout; pings are answered by tungstenite on
//! the next write.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::{ORIGIN, USER_AGENT};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::application::ports::{FrameTransport, TransportError};
use crate::infrastructure::config::StreamSettings;

/// `Origin` header expected by the chart endpoint.
pub const ORIGIN_HEADER: &str = "https://www.tradingview.com";

/// Browser `User-Agent` sent on upgrade.
pub const USER_AGENT_HEADER: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/127.0.0.0 Safari/537.36";

/// Chart socket over tokio-tungstenite.
pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    read_timeout: Duration,
    closed: bool,
}

impl std::fmt::Debug for WsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsTransport")
            .field("read_timeout", &self.read_timeout)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl WsTransport {
    /// Open the chart socket.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Connect`] if the URL is invalid, the
    /// handshake fails, or it does not finish within the connect timeout.
    pub async fn connect(settings: &StreamSettings) -> Result<Self, TransportError> {
        let mut request = settings
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        let headers = request.headers_mut();
        headers.insert(ORIGIN, HeaderValue::from_static(ORIGIN_HEADER));
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_HEADER));

        tracing::info!(url = %settings.url, "Connecting to chart stream");

        let (stream, _response) =
            tokio::time::timeout(settings.connect_timeout, tokio_tungstenite::connect_async(request))
                .await
                .map_err(|_| TransportError::Connect("connect timed out".to_string()))?
                .map_err(|e| TransportError::Connect(e.to_string()))?;

        Ok(Self {
            stream,
            read_timeout: settings.read_timeout,
            closed: false,
        })
    }
}

#[async_trait]
impl FrameTransport for WsTransport {
    async fn send_text(&mut self, text: String) -> Result<(), TransportError> {
        tracing::trace!(len = text.len(), "Sending frame");
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn recv_text(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            let next = tokio::time::timeout(self.read_timeout, self.stream.next())
                .await
                .map_err(|_| TransportError::Timeout)?;

            match next {
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_str().to_owned())),
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => return Ok(Some(text)),
                    Err(_) => tracing::debug!(len = data.len(), "Ignoring non-UTF-8 binary message"),
                },
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(?frame, "Server sent close frame");
                    self.closed = true;
                    return Ok(None);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(TransportError::Io(e.to_string())),
                None => {
                    self.closed = true;
                    return Ok(None);
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match self.stream.close(None).await {
            Ok(())
            | Err(
                tokio_tungstenite::tungstenite::Error::ConnectionClosed
                | tokio_tungstenite::tungstenite::Error::AlreadyClosed,
            ) => Ok(()),
            Err(e) => Err(TransportError::Io(e.to_string())),
        }
    }
}

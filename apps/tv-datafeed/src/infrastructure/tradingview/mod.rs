//! TradingView Adapters
//!
//! Client for the charting websocket and its HTTP side endpoints:
//!
//! - **Chart stream**: framing, commands, classification, bar extraction,
//!   and the session state machine driving a download
//! - **Sign-in**: credential exchange for a session token
//! - **Search**: symbol lookup

pub mod auth;
pub mod classify;
pub mod client;
pub mod codec;
pub mod command;
pub mod extract;
pub mod machine;
pub mod search;
pub mod session;
pub mod transport;

pub use auth::{ANONYMOUS_TOKEN, AuthError, SessionToken, SignInClient};
pub use client::{ClientError, HistoryClient};
pub use codec::{CodecError, FrameBuffer, RawFrame};
pub use command::Command;
pub use extract::{EXCHANGE_TZ, ExtractError, extract_bars};
pub use machine::{Action, HandshakeStep, SessionMachine, SessionState};
pub use search::{SearchError, SymbolInfo, SymbolSearch};
pub use session::SessionIds;
pub use transport::WsTransport;

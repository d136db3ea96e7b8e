#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! TV Datafeed - Historical Bar Downloader
//!
//! Downloads historical OHLCV bars from TradingView's charting websocket.
//! Live history is paged backwards with `request_more_data`; deeper history
//! is reached by engaging a replay session and rewinding its playhead one
//! chunk at a time.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Bars, intervals, symbols and replay windows
//!   - `bars`: Bar rows, intervals, chunk consolidation
//!   - `history`: Requests, outcomes, terminations
//!   - `replay`: Replay window rewinding
//!   - `symbol`: `EXCHANGE:SYMBOL` formatting
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Frame transport, bar sink, history source
//!   - `services`: Batch job over many symbols
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `tradingview`: Framing, commands, session machine, websocket client,
//!     sign-in, symbol search
//!   - `persistence`: Per-day CSV output
//!   - `config`: Environment configuration
//!   - `telemetry`: Logging and optional span export
//!
//! # Data Flow
//!
//! ```text
//! chart socket ──► FrameBuffer ──► classify ──► SessionMachine ──► extract
//!       ▲                                             │
//!       └──────── heartbeat echo / paging ◄───────────┤
//!                                                     ▼
//!                                     BarSink (CSV per day) + BarTable
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Bar and request types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::bars::{BarRow, BarTable, Interval, MergeReport};
pub use domain::history::{HistoryOutcome, HistoryRequest, SessionKind, Termination};
pub use domain::replay::ReplayWindow;
pub use domain::symbol::{Contract, SymbolError, format_symbol};

// Ports and services
pub use application::ports::{BarSink, FrameTransport, HistorySource, TransportError};
pub use application::services::{HistoryJob, JobReport, JobSettings, SymbolStatus};

// TradingView client
pub use infrastructure::tradingview::{
    ClientError, HistoryClient, SessionToken, SignInClient, SymbolInfo, SymbolSearch,
};

// Persistence
pub use infrastructure::persistence::{CsvDaySink, PersistenceError};

// Infrastructure config
pub use infrastructure::config::{ConfigError, Credentials, DatafeedConfig, RunMode, StreamSettings};

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};

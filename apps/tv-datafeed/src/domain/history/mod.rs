//! History Requests
//!
//! What a caller asks for (symbol, interval, depth, optional replay
//! window) and what it gets back: the consolidated bars plus how the
//! stream ended.

use std::fmt;

use super::bars::{BarTable, Interval};
use super::replay::ReplayWindow;

/// Trading session a series is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    /// Regular trading hours only.
    #[default]
    Regular,
    /// Regular plus pre/post market.
    Extended,
}

impl SessionKind {
    /// Select the session from an "extended hours" flag.
    #[must_use]
    pub const fn from_extended(extended: bool) -> Self {
        if extended { Self::Extended } else { Self::Regular }
    }

    /// Wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::Extended => "extended",
        }
    }
}

/// One historical download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRequest {
    /// Exchange-qualified symbol, e.g. `NASDAQ:AAPL`.
    pub symbol: String,
    /// Bar interval.
    pub interval: Interval,
    /// Bars requested when the series is created.
    pub n_bars: u32,
    /// Regular or extended session.
    pub session: SessionKind,
    /// Replay backfill window; `None` streams live history only.
    pub replay: Option<ReplayWindow>,
}

impl HistoryRequest {
    /// Default series depth.
    pub const DEFAULT_BARS: u32 = 10;

    /// Request live history for an already-qualified symbol.
    #[must_use]
    pub fn new(symbol: impl Into<String>, interval: Interval) -> Self {
        Self {
            symbol: symbol.into(),
            interval,
            n_bars: Self::DEFAULT_BARS,
            session: SessionKind::Regular,
            replay: None,
        }
    }

    /// Set the initial bar count.
    #[must_use]
    pub const fn with_bars(mut self, n_bars: u32) -> Self {
        self.n_bars = n_bars;
        self
    }

    /// Set the trading session.
    #[must_use]
    pub const fn with_session(mut self, session: SessionKind) -> Self {
        self.session = session;
        self
    }

    /// Backfill through a replay window.
    #[must_use]
    pub const fn with_replay(mut self, window: ReplayWindow) -> Self {
        self.replay = Some(window);
        self
    }

    /// Whether the replay sub-protocol is engaged.
    #[must_use]
    pub const fn is_replay(&self) -> bool {
        self.replay.is_some()
    }
}

/// How a history stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// Server signalled the final chunk, or the replay boundary was reached.
    Completed,
    /// Caller cancelled.
    Cancelled,
    /// Caller deadline elapsed.
    DeadlineExceeded,
    /// Transport or framing failure mid-stream.
    Failed(String),
}

impl Termination {
    /// Whether every requested chunk arrived.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::DeadlineExceeded => f.write_str("deadline exceeded"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Bars collected by one history call.
///
/// Chunks flushed before a failure are kept; only the chunk in flight is lost.
#[derive(Debug, Clone)]
pub struct HistoryOutcome {
    /// Consolidated bars from every flushed chunk.
    pub bars: BarTable,
    /// Number of chunks flushed.
    pub chunks: usize,
    /// How the stream ended.
    pub termination: Termination,
}

impl HistoryOutcome {
    /// An outcome with nothing collected.
    #[must_use]
    pub fn empty(termination: Termination) -> Self {
        Self {
            bars: BarTable::new(),
            chunks: 0,
            termination,
        }
    }
}

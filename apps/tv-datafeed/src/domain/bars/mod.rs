//! Bar Types
//!
//! OHLCV rows, the closed set of supported bar intervals, and the
//! consolidated table that successive pagination chunks fold into.
//!
//! # Consolidation
//!
//! Chunks arrive newest-first when paginating backward, so a table is
//! kept in arrival order and only sorted when asked for. Merging drops
//! rows whose timestamp is already present and reports the overlap so
//! page boundaries that repeat bars are visible in the logs.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::DateTime;
use chrono_tz::Tz;

// =============================================================================
// Interval
// =============================================================================

/// Supported bar granularities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Interval {
    /// 1 second.
    Second1,
    /// 3 seconds.
    Second3,
    /// 5 seconds.
    Second5,
    /// 10 seconds.
    Second10,
    /// 1 minute.
    Minute1,
    /// 3 minutes.
    Minute3,
    /// 5 minutes.
    Minute5,
    /// 15 minutes.
    Minute15,
    /// 30 minutes.
    Minute30,
    /// 45 minutes.
    Minute45,
    /// 1 hour.
    Hour1,
    /// 2 hours.
    Hour2,
    /// 3 hours.
    Hour3,
    /// 4 hours.
    Hour4,
    /// 1 day.
    #[default]
    Daily,
    /// 1 week.
    Weekly,
    /// 1 month.
    Monthly,
}

impl Interval {
    /// Every supported interval, finest first.
    pub const ALL: [Self; 17] = [
        Self::Second1,
        Self::Second3,
        Self::Second5,
        Self::Second10,
        Self::Minute1,
        Self::Minute3,
        Self::Minute5,
        Self::Minute15,
        Self::Minute30,
        Self::Minute45,
        Self::Hour1,
        Self::Hour2,
        Self::Hour3,
        Self::Hour4,
        Self::Daily,
        Self::Weekly,
        Self::Monthly,
    ];

    /// Provider resolution code sent in series commands.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Second1 => "1S",
            Self::Second3 => "3S",
            Self::Second5 => "5S",
            Self::Second10 => "10S",
            Self::Minute1 => "1",
            Self::Minute3 => "3",
            Self::Minute5 => "5",
            Self::Minute15 => "15",
            Self::Minute30 => "30",
            Self::Minute45 => "45",
            Self::Hour1 => "1H",
            Self::Hour2 => "2H",
            Self::Hour3 => "3H",
            Self::Hour4 => "4H",
            Self::Daily => "1D",
            Self::Weekly => "1W",
            Self::Monthly => "1M",
        }
    }

    fn from_alias(s: &str) -> Option<Self> {
        let interval = match s.to_lowercase().as_str() {
            "1s" => Self::Second1,
            "3s" => Self::Second3,
            "5s" => Self::Second5,
            "10s" => Self::Second10,
            "1m" | "1min" => Self::Minute1,
            "3m" | "3min" => Self::Minute3,
            "5m" | "5min" => Self::Minute5,
            "15m" | "15min" => Self::Minute15,
            "30m" | "30min" => Self::Minute30,
            "45m" | "45min" => Self::Minute45,
            "1h" => Self::Hour1,
            "2h" => Self::Hour2,
            "3h" => Self::Hour3,
            "4h" => Self::Hour4,
            "1d" | "daily" => Self::Daily,
            "1w" | "weekly" => Self::Weekly,
            "1mo" | "monthly" => Self::Monthly,
            _ => return None,
        };
        Some(interval)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Unknown interval string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported interval: {0}")]
pub struct IntervalParseError(pub String);

impl FromStr for Interval {
    type Err = IntervalParseError;

    /// Accepts provider codes exactly (`1S`, `15`, `1H`, `1M`) first, then
    /// case-insensitive aliases (`15m`, `daily`, `1mo`). `1M` is monthly.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|interval| interval.code() == trimmed)
            .or_else(|| Self::from_alias(trimmed))
            .ok_or_else(|| IntervalParseError(s.to_string()))
    }
}

// =============================================================================
// Bar Row
// =============================================================================

/// One OHLCV bar, stamped in the exchange's local timezone.
#[derive(Debug, Clone, PartialEq)]
pub struct BarRow {
    /// Bar open time.
    pub timestamp: DateTime<Tz>,
    /// Open price.
    pub open: f64,
    /// High price.
    pub high: f64,
    /// Low price.
    pub low: f64,
    /// Close price.
    pub close: f64,
    /// Traded volume, 0.0 when the feed carries none.
    pub volume: f64,
}

/// Sort rows ascending by timestamp. Stable, so equal stamps keep arrival order.
pub fn sort_ascending(rows: &mut [BarRow]) {
    rows.sort_by_key(|row| row.timestamp);
}

/// Earliest timestamp in a set of rows.
#[must_use]
pub fn earliest(rows: &[BarRow]) -> Option<DateTime<Tz>> {
    rows.iter().map(|row| row.timestamp).min()
}

// =============================================================================
// Consolidated Table
// =============================================================================

/// Result of folding one chunk into a [`BarTable`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Rows appended to the table.
    pub appended: usize,
    /// Rows dropped because their timestamp was already present.
    pub duplicates: usize,
    /// Whether the chunk's time span intersected the table's span.
    pub overlapped: bool,
}

/// Bars accumulated across pagination chunks.
#[derive(Debug, Clone, Default)]
pub struct BarTable {
    rows: Vec<BarRow>,
    seen: HashSet<i64>,
}

impl BarTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a chunk into the table, skipping timestamps already held.
    pub fn merge(&mut self, chunk: impl IntoIterator<Item = BarRow>) -> MergeReport {
        let span = self.span();
        let mut report = MergeReport::default();

        for row in chunk {
            let ts = row.timestamp.timestamp();
            if let Some((first, last)) = span
                && ts >= first
                && ts <= last
            {
                report.overlapped = true;
            }
            if self.seen.insert(ts) {
                self.rows.push(row);
                report.appended += 1;
            } else {
                report.duplicates += 1;
            }
        }

        if report.overlapped {
            tracing::warn!(
                appended = report.appended,
                duplicates = report.duplicates,
                "Chunk overlaps previously merged bars"
            );
        }

        report
    }

    /// Rows in arrival order.
    #[must_use]
    pub fn rows(&self) -> &[BarRow] {
        &self.rows
    }

    /// Rows sorted ascending by timestamp.
    #[must_use]
    pub fn sorted(&self) -> Vec<BarRow> {
        let mut rows = self.rows.clone();
        sort_ascending(&mut rows);
        rows
    }

    /// Consume the table, returning rows sorted ascending.
    #[must_use]
    pub fn into_sorted(mut self) -> Vec<BarRow> {
        sort_ascending(&mut self.rows);
        self.rows
    }

    /// Number of rows held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn span(&self) -> Option<(i64, i64)> {
        let first = self.rows.iter().map(|r| r.timestamp.timestamp()).min()?;
        let last = self.rows.iter().map(|r| r.timestamp.timestamp()).max()?;
        Some((first, last))
    }
}

// =============================================================================
// Tests
// =============================================================================

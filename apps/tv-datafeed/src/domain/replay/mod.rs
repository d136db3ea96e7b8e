//! Replay Window
//!
//! Replay sessions stream bars backward from a starting frontier. After
//! each completed chunk the frontier is pulled back to the chunk's earliest
//! bar minus [`REWIND_MARGIN`], until it passes the requested boundary.
//!
//! Calendar dates are pinned to a fixed `-04:00` offset: the frontier is
//! the last second of the start date and the boundary is the 09:30 open
//! of the end date.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};

/// Gap left between a chunk's earliest bar and the next replay anchor.
pub const REWIND_MARGIN: Duration = Duration::hours(8);

/// UTC offset the calendar dates are pinned to.
const WINDOW_OFFSET_SECS: i32 = 4 * 3600;

/// Replay window errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReplayError {
    /// Date string is not `YYYY-MM-DD`.
    #[error("invalid replay date {0:?}, expected YYYY-MM-DD")]
    InvalidDate(String),

    /// Date and time do not map to a single instant.
    #[error("replay date {0} does not resolve to an instant")]
    Unresolvable(NaiveDate),
}

/// Bounds of a backward replay backfill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayWindow {
    frontier: DateTime<Utc>,
    boundary: DateTime<Utc>,
}

impl ReplayWindow {
    /// Create a window from explicit instants.
    #[must_use]
    pub const fn new(frontier: DateTime<Utc>, boundary: DateTime<Utc>) -> Self {
        Self { frontier, boundary }
    }

    /// Build a window from a start date (replay begins at its last second)
    /// back to an end date (stops at its market open).
    ///
    /// # Errors
    ///
    /// Returns an error if either date cannot be pinned to an instant.
    pub fn from_dates(start: NaiveDate, end: NaiveDate) -> Result<Self, ReplayError> {
        let frontier = pin(start, NaiveTime::from_hms_opt(23, 59, 59))?;
        let boundary = pin(end, NaiveTime::from_hms_opt(9, 30, 0))?;
        if frontier <= boundary {
            tracing::warn!(
                %start,
                %end,
                "Replay start is not after end, only one chunk will be fetched"
            );
        }
        Ok(Self { frontier, boundary })
    }

    /// Parse `YYYY-MM-DD` strings into a window.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError::InvalidDate`] for malformed dates.
    pub fn parse(start: &str, end: &str) -> Result<Self, ReplayError> {
        Self::from_dates(parse_date(start)?, parse_date(end)?)
    }

    /// Where the next replay segment starts.
    #[must_use]
    pub const fn frontier(&self) -> DateTime<Utc> {
        self.frontier
    }

    /// Oldest instant the backfill must reach.
    #[must_use]
    pub const fn boundary(&self) -> DateTime<Utc> {
        self.boundary
    }

    /// Anchor for the segment preceding a chunk whose earliest bar is `earliest`.
    #[must_use]
    pub fn anchor_before<Tz: TimeZone>(earliest: &DateTime<Tz>) -> DateTime<Utc> {
        earliest.with_timezone(&Utc) - REWIND_MARGIN
    }

    /// Pull the frontier back past a completed chunk.
    ///
    /// Returns the new frontier while the boundary is still older than it,
    /// or `None` once the backfill has reached the boundary or the anchor
    /// no longer moves back past the current frontier.
    pub fn rewind<Tz: TimeZone>(&mut self, earliest: &DateTime<Tz>) -> Option<DateTime<Utc>> {
        let anchor = Self::anchor_before(earliest);
        if anchor >= self.frontier {
            tracing::warn!(
                %anchor,
                frontier = %self.frontier,
                "Replay did not move back, stopping"
            );
            return None;
        }
        if self.boundary < anchor {
            self.frontier = anchor;
            Some(anchor)
        } else {
            None
        }
    }
}

/// Parse a `YYYY-MM-DD` date.
///
/// # Errors
///
/// Returns [`ReplayError::InvalidDate`] for malformed input.
pub fn parse_date(raw: &str) -> Result<NaiveDate, ReplayError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ReplayError::InvalidDate(raw.to_string()))
}

fn pin(date: NaiveDate, time: Option<NaiveTime>) -> Result<DateTime<Utc>, ReplayError> {
    let offset = FixedOffset::west_opt(WINDOW_OFFSET_SECS).ok_or(ReplayError::Unresolvable(date))?;
    let time = time.ok_or(ReplayError::Unresolvable(date))?;
    offset
        .from_local_datetime(&date.and_time(time))
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or(ReplayError::Unresolvable(date))
}

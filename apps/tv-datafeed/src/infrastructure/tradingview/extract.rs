//! Bar Extraction
//!
//! Pulls OHLCV rows out of the accumulated series payload text. The server
//! delivers bars as `"s":[{"i":0,"v":[ts,o,h,l,c,vol]},...]`; rather than
//! parsing whole messages, the first non-empty `"s":[...}]` region is
//! located and each bar fragment is tokenized on `[ : , ]`.
//!
//! After tokenizing, index 4 is the epoch timestamp and 5..=9 are open,
//! high, low, close and volume. Symbols without volume send only four
//! prices; the first fragment whose volume fails to parse switches the
//! whole batch to zero volume.

use std::sync::OnceLock;

use chrono::{DateTime, TimeZone};
use chrono_tz::America::New_York;
use chrono_tz::Tz;
use regex::Regex;

use crate::domain::bars::BarRow;

/// Timezone bar timestamps are rendered in.
pub const EXCHANGE_TZ: Tz = New_York;

const EMPTY_SERIES: &str = r#""s":[]"#;
const FRAGMENT_SEPARATOR: &str = r#",{""#;

const TS_INDEX: usize = 4;
const VOLUME_INDEX: usize = 9;

/// Extraction errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    /// No bar array in the payload text.
    #[error("no data for {symbol}, check the exchange and symbol")]
    NoData {
        /// Symbol the payload was requested for.
        symbol: String,
    },
}

/// Rows from one extraction call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedBars {
    /// Parsed rows in payload order.
    pub rows: Vec<BarRow>,
    /// Volume was missing for at least one row; that row and every later
    /// row in the batch report 0.0.
    pub volume_missing: bool,
    /// Fragments dropped for an unparsable timestamp or price.
    pub skipped: usize,
}

#[allow(clippy::expect_used)] // constant pattern
fn bar_array_regex() -> &'static Regex {
    static BAR_ARRAY: OnceLock<Regex> = OnceLock::new();
    BAR_ARRAY.get_or_init(|| Regex::new(r#""s":\[(.+?)\}\]"#).expect("bar array regex is valid"))
}

/// Extract bars from accumulated series text.
///
/// `symbol` is only used to label the error.
///
/// # Errors
///
/// Returns [`ExtractError::NoData`] when the text holds no bar array.
pub fn extract_bars(text: &str, symbol: &str) -> Result<ExtractedBars, ExtractError> {
    let cleaned = text.replace(EMPTY_SERIES, "");
    let region = bar_array_regex()
        .captures(&cleaned)
        .and_then(|caps| caps.get(1))
        .ok_or_else(|| ExtractError::NoData {
            symbol: symbol.to_string(),
        })?;

    let mut out = ExtractedBars::default();
    for fragment in region.as_str().split(FRAGMENT_SEPARATOR) {
        let tokens: Vec<&str> = fragment.split(['[', ':', ',', ']']).collect();
        match parse_row(&tokens, &mut out.volume_missing) {
            Some(row) => out.rows.push(row),
            None => {
                out.skipped += 1;
                tracing::warn!(symbol, fragment, "Skipping malformed bar");
            }
        }
    }

    if out.volume_missing {
        tracing::debug!(symbol, "No volume data");
    }

    Ok(out)
}

fn parse_row(tokens: &[&str], volume_missing: &mut bool) -> Option<BarRow> {
    let timestamp = parse_timestamp(tokens.get(TS_INDEX)?)?;
    let price = |i: usize| tokens.get(i).and_then(|t| t.parse::<f64>().ok());

    let open = price(5)?;
    let high = price(6)?;
    let low = price(7)?;
    let close = price(8)?;

    let volume = if *volume_missing {
        0.0
    } else if let Some(v) = price(VOLUME_INDEX) {
        v
    } else {
        *volume_missing = true;
        0.0
    };

    Some(BarRow {
        timestamp,
        open,
        high,
        low,
        close,
        volume,
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_timestamp(token: &str) -> Option<DateTime<Tz>> {
    let raw: f64 = token.parse().ok()?;
    if !raw.is_finite() {
        return None;
    }
    let secs = raw.floor();
    let nanos = ((raw - secs) * 1e9).round().min(999_999_999.0) as u32;
    EXCHANGE_TZ.timestamp_opt(secs as i64, nanos).single()
}

// =============================================================================
// Tests
// =============================================================================

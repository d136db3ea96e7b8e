//! Per-day CSV Persistence
//!
//! [`BarSink`] that writes each flushed chunk to one CSV per symbol per
//! exchange-local calendar day:
//!
//! ```text
//! <root>/<symbol>/<symbol>-<YYYY-MM-DD>.csv
//! ```
//!
//! Replay chunks arrive newest first and may split a day, so rows are merged
//! into any existing file for that day. A timestamp written twice keeps the
//! newer row. Files are replaced atomically.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate};

use crate::application::ports::{BarSink, SinkError};
use crate::domain::bars::BarRow;
use crate::infrastructure::tradingview::EXCHANGE_TZ;

const HEADER: [&str; 6] = ["datetime", "open", "high", "low", "close", "volume"];

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%:z";

/// Persistence failures.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    /// Filesystem error.
    #[error("io error on {path}: {source}")]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// CSV read or write failure.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Existing file held a row that could not be parsed.
    #[error("bad row in {path}: {reason}")]
    BadRow {
        /// File being merged.
        path: PathBuf,
        /// What was wrong.
        reason: String,
    },
}

impl From<PersistenceError> for SinkError {
    fn from(err: PersistenceError) -> Self {
        Self(err.to_string())
    }
}

/// Writes chunks as per-day CSV files under a root directory.
#[derive(Debug, Clone)]
pub struct CsvDaySink {
    root: PathBuf,
    files_written: usize,
}

impl CsvDaySink {
    /// Create a sink rooted at `root`. Directories are created on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            files_written: 0,
        }
    }

    /// Output root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Day files written (or rewritten) so far.
    #[must_use]
    pub const fn files_written(&self) -> usize {
        self.files_written
    }

    /// Path of the file holding `symbol`'s bars for `day`.
    #[must_use]
    pub fn day_path(&self, symbol: &str, day: NaiveDate) -> PathBuf {
        let name = file_stem(symbol);
        self.root
            .join(&name)
            .join(format!("{name}-{}.csv", day.format("%Y-%m-%d")))
    }

    /// Write `rows` for `symbol`, merging with existing day files.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory or file cannot be written, or an
    /// existing day file cannot be read.
    pub fn write_rows(&mut self, symbol: &str, rows: &[BarRow]) -> Result<Vec<PathBuf>, PersistenceError> {
        let mut days: BTreeMap<NaiveDate, Vec<&BarRow>> = BTreeMap::new();
        for row in rows {
            days.entry(row.timestamp.date_naive()).or_default().push(row);
        }

        let mut written = Vec::with_capacity(days.len());
        for (day, day_rows) in days {
            let path = self.day_path(symbol, day);
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir).map_err(|source| PersistenceError::Io {
                    path: dir.to_path_buf(),
                    source,
                })?;
            }

            let mut merged: BTreeMap<i64, BarRow> = if path.exists() {
                read_day(&path)?
                    .into_iter()
                    .map(|row| (row.timestamp.timestamp(), row))
                    .collect()
            } else {
                BTreeMap::new()
            };
            for row in day_rows {
                merged.insert(row.timestamp.timestamp(), row.clone());
            }

            write_day(&path, merged.values())?;
            tracing::debug!(symbol, path = %path.display(), bars = merged.len(), "Saved day file");
            self.files_written += 1;
            written.push(path);
        }

        Ok(written)
    }
}

impl BarSink for CsvDaySink {
    fn write_chunk(&mut self, symbol: &str, rows: &[BarRow]) -> Result<(), SinkError> {
        let paths = self.write_rows(symbol, rows)?;
        tracing::info!(symbol, bars = rows.len(), files = paths.len(), "Chunk saved");
        Ok(())
    }
}

fn file_stem(symbol: &str) -> String {
    symbol.replace(':', "_")
}

/// Read an existing day file.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or a row is malformed.
pub fn read_day(path: &Path) -> Result<Vec<BarRow>, PersistenceError> {
    let mut reader = csv::Reader::from_path(path)?;
    let bad = |reason: String| PersistenceError::BadRow {
        path: path.to_path_buf(),
        reason,
    };

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let field = |i: usize| record.get(i).map(str::trim).unwrap_or_default();
        let price = |i: usize| {
            field(i)
                .parse::<f64>()
                .map_err(|e| bad(format!("{}: {e}", HEADER[i])))
        };

        let timestamp = DateTime::parse_from_str(field(0), DATETIME_FORMAT)
            .map_err(|e| bad(format!("datetime {:?}: {e}", field(0))))?
            .with_timezone(&EXCHANGE_TZ);

        rows.push(BarRow {
            timestamp,
            open: price(1)?,
            high: price(2)?,
            low: price(3)?,
            close: price(4)?,
            volume: price(5)?,
        });
    }
    Ok(rows)
}

fn write_day<'a>(path: &Path, rows: impl Iterator<Item = &'a BarRow>) -> Result<(), PersistenceError> {
    let tmp = path.with_extension("csv.tmp");
    {
        let mut writer = csv::Writer::from_path(&tmp)?;
        writer.write_record(HEADER)?;
        for row in rows {
            writer.write_record([
                row.timestamp.format(DATETIME_FORMAT).to_string(),
                row.open.to_string(),
                row.high.to_string(),
                row.low.to_string(),
                row.close.to_string(),
                row.volume.to_string(),
            ])?;
        }
        writer.flush().map_err(|source| PersistenceError::Io {
            path: tmp.clone(),
            source,
        })?;
    }
    fs::rename(&tmp, path).map_err(|source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// =============================================================================
// Tests
// =============================================================================

//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `HistoryJob`: downloads a list of symbols one after another

use tokio_util::sync::CancellationToken;

use crate::application::ports::{BarSink, HistorySource};
use crate::domain::bars::Interval;
use crate::domain::history::{HistoryRequest, SessionKind, Termination};
use crate::domain::replay::ReplayWindow;
use crate::domain::symbol::{Contract, format_symbol};

// =============================================================================
// Settings
// =============================================================================

/// What to download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSettings {
    /// Symbols, bare or `EXCHANGE:SYMBOL`.
    pub symbols: Vec<String>,
    /// Exchange for bare symbols.
    pub exchange: String,
    /// Bar interval.
    pub interval: Interval,
    /// Bars in the first page.
    pub n_bars: u32,
    /// Continuous futures selector.
    pub contract: Option<Contract>,
    /// Trading session.
    pub session: SessionKind,
    /// Replay window, when both dates are given.
    pub replay: Option<ReplayWindow>,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            symbols: Vec::new(),
            exchange: "NSE".to_string(),
            interval: Interval::default(),
            n_bars: HistoryRequest::DEFAULT_BARS,
            contract: None,
            session: SessionKind::Regular,
            replay: None,
        }
    }
}

// =============================================================================
// Report
// =============================================================================

/// How one symbol went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolStatus {
    /// Download ran; see the termination.
    Downloaded {
        /// Bars consolidated.
        bars: usize,
        /// Chunks flushed to the sink.
        chunks: usize,
        /// How the stream ended.
        termination: Termination,
    },
    /// Symbol could not be formatted.
    Skipped(String),
    /// Connect or handshake failed.
    Failed(String),
}

/// Outcome for one configured symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolReport {
    /// Symbol as configured.
    pub symbol: String,
    /// What happened.
    pub status: SymbolStatus,
}

/// Outcome of a whole job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobReport {
    /// Per-symbol results, in run order.
    pub symbols: Vec<SymbolReport>,
    /// Whether the job stopped early on cancellation.
    pub cancelled: bool,
}

impl JobReport {
    /// Symbols that downloaded to completion.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.symbols
            .iter()
            .filter(|r| {
                matches!(
                    r.status,
                    SymbolStatus::Downloaded {
                        termination: Termination::Completed,
                        ..
                    }
                )
            })
            .count()
    }

    /// Total bars across symbols.
    #[must_use]
    pub fn total_bars(&self) -> usize {
        self.symbols
            .iter()
            .map(|r| match r.status {
                SymbolStatus::Downloaded { bars, .. } => bars,
                _ => 0,
            })
            .sum()
    }

    /// Whether every symbol completed.
    #[must_use]
    pub fn all_completed(&self) -> bool {
        !self.cancelled && self.completed() == self.symbols.len()
    }
}

// =============================================================================
// Job
// =============================================================================

/// Runs downloads for each configured symbol in turn.
#[derive(Debug)]
pub struct HistoryJob<S> {
    source: S,
    settings: JobSettings,
}

impl<S: HistorySource> HistoryJob<S> {
    /// Create a job.
    #[must_use]
    pub const fn new(source: S, settings: JobSettings) -> Self {
        Self { source, settings }
    }

    /// Job settings.
    #[must_use]
    pub const fn settings(&self) -> &JobSettings {
        &self.settings
    }

    /// Build the request for one configured symbol.
    ///
    /// # Errors
    ///
    /// Returns the formatting error message for a bad symbol or contract.
    pub fn request_for(&self, symbol: &str) -> Result<HistoryRequest, String> {
        let settings = &self.settings;
        let qualified = format_symbol(symbol, &settings.exchange, settings.contract.as_ref())
            .map_err(|e| e.to_string())?;

        let request = HistoryRequest::new(qualified, settings.interval)
            .with_bars(settings.n_bars)
            .with_session(settings.session);
        Ok(match settings.replay {
            Some(window) => request.with_replay(window),
            None => request,
        })
    }

    /// Download every symbol, stopping early if `cancel` fires.
    pub async fn run(&self, sink: &mut dyn BarSink, cancel: &CancellationToken) -> JobReport {
        let mut report = JobReport::default();

        for symbol in &self.settings.symbols {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let request = match self.request_for(symbol) {
                Ok(request) => request,
                Err(reason) => {
                    tracing::warn!(symbol, %reason, "Skipping symbol");
                    report.symbols.push(SymbolReport {
                        symbol: symbol.clone(),
                        status: SymbolStatus::Skipped(reason),
                    });
                    continue;
                }
            };

            let status = match self.source.fetch(&request, sink, cancel).await {
                Ok(outcome) => SymbolStatus::Downloaded {
                    bars: outcome.bars.len(),
                    chunks: outcome.chunks,
                    termination: outcome.termination,
                },
                Err(e) => {
                    tracing::error!(symbol = %request.symbol, error = %e, "Download failed");
                    SymbolStatus::Failed(e.to_string())
                }
            };

            let stop = matches!(
                status,
                SymbolStatus::Downloaded {
                    termination: Termination::Cancelled,
                    ..
                }
            );
            report.symbols.push(SymbolReport {
                symbol: symbol.clone(),
                status,
            });
            if stop {
                report.cancelled = true;
                break;
            }
        }

        tracing::info!(
            symbols = report.symbols.len(),
            completed = report.completed(),
            bars = report.total_bars(),
            cancelled = report.cancelled,
            "Job finished"
        );
        report
    }
}

// =============================================================================
// Tests
// =============================================================================

//! TV Datafeed Binary
//!
//! Downloads history for the configured symbols, or runs a symbol search.
//!
//! # Usage
//!
//! ```bash
//! TV_SYMBOLS=NASDAQ:NVDA TV_INTERVAL=1S TV_BARS=5000 \
//!   TV_START_DATE=2024-12-18 TV_END_DATE=2024-12-10 cargo run --bin tv-datafeed
//! TV_SEARCH=NIFTY TV_EXCHANGE=NSE cargo run --bin tv-datafeed
//! ```
//!
//! # Environment Variables
//!
//! ## Required (history mode)
//! - `TV_SYMBOLS`: comma-separated symbols, bare or `EXCHANGE:SYMBOL`
//!
//! ## Optional
//! - `TV_USERNAME`, `TV_PASSWORD`: sign-in (anonymous when unset)
//! - `TV_EXCHANGE`: exchange for bare symbols (default: NSE)
//! - `TV_INTERVAL`: bar interval code (default: 1D)
//! - `TV_BARS`: bars in the first page (default: 10)
//! - `TV_FUT_CONTRACT`: continuous futures contract number
//! - `TV_EXTENDED_SESSION`: include extended hours (default: false)
//! - `TV_START_DATE`, `TV_END_DATE`: replay window, newest then oldest day
//! - `TV_OUTPUT_DIR`: CSV root (default: historical-data)
//! - `TV_WS_URL`: chart websocket endpoint
//! - `TV_CONNECT_TIMEOUT_SECS`, `TV_READ_TIMEOUT_SECS`: socket timeouts (default: 5)
//! - `TV_DEADLINE_SECS`: overall limit per symbol
//! - `TV_SEARCH`: run a symbol search instead of downloading
//! - `OTEL_ENABLED`: export spans over OTLP (default: false)
//! - `RUST_LOG`: log filter (default: info)

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tv_datafeed::infrastructure::telemetry;
use tv_datafeed::{
    CsvDaySink, DatafeedConfig, HistoryClient, HistoryJob, JobSettings, RunMode, SignInClient,
    StreamSettings, SymbolSearch,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    load_dotenv();

    let _telemetry_guard = telemetry::init();

    let config = DatafeedConfig::from_env()?;
    log_config(&config);

    match config.mode {
        RunMode::Search { text, exchange } => {
            let search = SymbolSearch::new(config.stream.connect_timeout)?;
            for hit in search.search(&text, &exchange).await? {
                println!("{}\t{}\t{}", hit.qualified(), hit.kind, hit.description);
            }
            Ok(())
        }
        RunMode::History(job) => {
            run_history(config.stream, config.credentials.as_ref(), config.output_dir, job).await
        }
    }
}

async fn run_history(
    stream: StreamSettings,
    credentials: Option<&tv_datafeed::Credentials>,
    output_dir: std::path::PathBuf,
    job: JobSettings,
) -> Result<(), Box<dyn std::error::Error>> {
    let token = SignInClient::new(stream.connect_timeout)?
        .token_or_anonymous(credentials)
        .await;

    let shutdown_token = CancellationToken::new();
    tokio::spawn(await_shutdown(shutdown_token.clone()));

    let client = HistoryClient::new(stream, token);
    let mut sink = CsvDaySink::new(output_dir);
    let job = HistoryJob::new(client, job);

    let report = job.run(&mut sink, &shutdown_token).await;

    tracing::info!(
        completed = report.completed(),
        symbols = report.symbols.len(),
        files = sink.files_written(),
        root = %sink.root().display(),
        "Download finished"
    );

    if report.all_completed() {
        Ok(())
    } else {
        Err(format!(
            "{} of {} symbols did not complete",
            report.symbols.len() - report.completed(),
            job.settings().symbols.len()
        )
        .into())
    }
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_err() {
        load_dotenv_from_ancestors();
    }
}

/// Log the parsed configuration.
fn log_config(config: &DatafeedConfig) {
    tracing::info!(
        authenticated = config.credentials.is_some(),
        url = %config.stream.url,
        output_dir = %config.output_dir.display(),
        "Configuration loaded"
    );
    if let RunMode::History(job) = &config.mode {
        tracing::info!(
            symbols = job.symbols.len(),
            exchange = %job.exchange,
            interval = %job.interval,
            n_bars = job.n_bars,
            session = job.session.as_str(),
            replay = job.replay.is_some(),
            "Job configured"
        );
    }
}

/// Load .env file from any ancestor directory.
fn load_dotenv_from_ancestors() {
    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT), then cancel the job.
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, stopping download");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, stopping download");
        }
    }

    shutdown_token.cancel();
}

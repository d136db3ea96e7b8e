//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// TradingView chart stream, sign-in and search clients.
pub mod tradingview;

/// Per-day CSV output.
pub mod persistence;

/// Configuration loading.
pub mod config;

/// Logging and optional span export.
pub mod telemetry;

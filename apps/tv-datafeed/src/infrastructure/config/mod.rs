//! Configuration Module
//!
//! Configuration loading for the downloader.

mod settings;

pub use settings::{
    ConfigError, Credentials, DEFAULT_WS_URL, DatafeedConfig, RunMode, StreamSettings,
};

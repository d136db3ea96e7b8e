//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the application services and port interfaces
//! that define how the domain interacts with external systems.

/// Port interfaces for external systems (socket, sink, history source).
pub mod ports;

/// Batch download service.
pub mod services;

//! Domain Layer - Bars, symbols, and history windows.
//!
//! This layer contains the core types for historical bar collection with
//! no I/O. Everything here is plain data plus the rules that govern it
//! (symbol qualification, chunk consolidation, replay rewinding).

/// Bar rows, intervals, and chunk consolidation.
pub mod bars;

/// History requests and their outcomes.
pub mod history;

/// Replay window arithmetic for backward pagination.
pub mod replay;

/// Exchange-qualified symbol formatting.
pub mod symbol;

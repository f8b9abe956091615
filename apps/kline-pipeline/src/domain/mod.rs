//! Domain Layer - Core pipeline types and business logic.
//!
//! This layer contains the bar and indicator types plus the pure indicator
//! math. Nothing here performs I/O.

/// Bar and indicator vector types.
pub mod streaming;

/// EMA and VWAP computation over bar history.
pub mod indicators;

/// Concurrent-safe subscriber registry.
pub mod subscription;

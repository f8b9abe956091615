//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the application services and port interfaces
//! that define how the domain interacts with external systems.

/// Port interfaces for subscriber connections.
pub mod ports;

/// Application services: bar history and indicator recomputation.
pub mod services;

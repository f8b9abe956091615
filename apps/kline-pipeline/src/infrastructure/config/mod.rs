//! Configuration Module
//!
//! Environment-driven configuration for the ingest and indicator binaries.

mod settings;

pub use settings::{
    ChannelSettings, ConfigError, FeedSettings, IndicatorConfig, IngestConfig, Stage,
    load_dotenv,
};

//! Shared building blocks for the UB515 crates:
//! - **Configuration**: strongly typed, validated application settings (`config`).
//! - **Logging**: `tracing-subscriber` setup with optional OTLP export (`logging`).
//! - **Scrubbing**: best-effort PII removal for logged SQL (`scrubber`).
pub mod config;
pub mod logging;
pub mod scrubber;

pub use crate::config::{AppConfig, DatabaseSettings, StoreBackend};

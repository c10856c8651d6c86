//! Client-side state engine for the audiobook chapter pipeline.
//!
//! The crate consumes progress events and a connectivity signal from a
//! transport, keeps the ASR configuration consistent with what the backend
//! offers, and drives the proceed/skip/cancel actions. [`ClientSession`] is
//! the entry point.

pub mod asr;
pub mod backend;
pub mod controls;
pub mod pipeline;
pub mod progress;
pub mod request_log;
pub mod settings;
pub mod state;
pub mod steps;

#[cfg(test)]
mod tests;

pub use backend::{Backend, BackendError, HttpBackend};
pub use pipeline::{ClientSession, Command, CommandOutcome, ConfigurationView, FeedMessage};
pub use settings::ClientConfig;

/// Install the process-wide logger. `RUST_LOG` overrides the default `info` filter.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

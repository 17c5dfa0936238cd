// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities.
mod counting;
mod fixture;

pub use counting::CountingStore;
pub use fixture::{ConfigurationError, DEFAULT_LOGIN, MemorySession, SessionFixture};

/// Print logs of the crate during tests when `RUST_LOG` is set.
pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

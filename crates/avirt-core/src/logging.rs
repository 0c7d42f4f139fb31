//! Logger bootstrap shared by the AVIRT binaries.

use env_logger::{Builder, Env};

/// Environment variable consulted before `RUST_LOG`.
pub const LOG_ENV: &str = "AVIRT_LOG";

/// Install the global logger. `default_level` applies when neither `AVIRT_LOG`
/// nor `RUST_LOG` is set. Calling this twice is harmless.
pub fn init(default_level: &str) {
    let filter = std::env::var(LOG_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty());
    let mut builder = match filter {
        Some(filter) => {
            let mut builder = Builder::new();
            builder.parse_filters(&filter);
            builder
        }
        None => Builder::from_env(Env::default().default_filter_or(default_level)),
    };
    builder.format_timestamp_secs();
    let _ = builder.try_init();
}

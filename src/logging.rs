//! Tracing subscriber bootstrap, driven by [`crate::config::LoggingConfig`].
//! Pretty output for local development, JSON for anything that looks like
//! production (`format = "json"`), both gated by an `EnvFilter` seeded
//! from `level`.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;

/// Initializes the global `tracing` subscriber. Must be called at most
/// once per process; subsequent calls are silently ignored (mirrors
/// `tracing_subscriber`'s own `try_init` semantics).
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let result = if config.format == "json" {
        fmt().with_env_filter(filter).json().try_init()
    } else {
        fmt().with_env_filter(filter).try_init()
    };

    if let Err(err) = result {
        eprintln!("tracing subscriber already initialized: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_does_not_panic_on_repeated_calls() {
        let config = LoggingConfig {
            level: "debug".to_string(),
            format: "pretty".to_string(),
        };
        init(&config);
        init(&config);
    }
}

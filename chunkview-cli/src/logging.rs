//! Console logging setup.
//!
//! Logs go to stderr so that `view` output on stdout stays machine-readable.

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub log_level: String,
    pub ansi: bool,
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self {
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            ansi: std::env::var_os("NO_COLOR").is_none(),
        }
    }

    /// `--verbose` raises the default level, but an explicit RUST_LOG wins.
    pub fn with_verbosity(mut self, verbose: u8) -> Self {
        if std::env::var_os("RUST_LOG").is_none() {
            self.log_level = match verbose {
                0 => self.log_level,
                1 => "debug".to_string(),
                _ => "trace".to_string(),
            };
        }
        self
    }
}

pub fn init_logging(config: LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.log_level)?;
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(config.ansi)
                .with_target(false),
        )
        .try_init()?;
    Ok(())
}

use clap::Args;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Logging flags, meant to be flattened into a binary's CLI.
#[derive(Args, Clone, Debug)]
pub struct Log {
    /// The default log level; `RUST_LOG` directives take precedence.
    #[arg(long = "log-level", env = "STREAMVISOR_LOG_LEVEL", default_value = "info")]
    pub level: LevelFilter,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
        }
    }
}

impl Log {
    pub fn filter(&self) -> EnvFilter {
        EnvFilter::builder()
            .with_default_directive(self.level.into())
            .from_env_lossy()
    }

    /// Installs the global subscriber. Logs go to stderr.
    pub fn init(&self) {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(self.filter())
            .with_writer(std::io::stderr)
            .try_init();
    }
}

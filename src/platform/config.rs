//! Service configuration, read from CLI arguments and the environment.

use clap::Parser;

use crate::domain::{
    geo::DEFAULT_RADIUS_KM,
    order::{CancellationPolicy, TransitionPolicy},
};

/// Log output format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Compact, human-readable logs.
    #[default]
    Compact,

    /// Structured JSON logs.
    Json,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "rescue-orderservice", about = "Food rescue order service", long_about = None)]
pub struct Config {
    /// Server host address
    #[arg(short = 'H', long, env = "SERVER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Server port
    #[arg(short, long, env = "SERVER_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Log format (compact, json)
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    /// `PostgreSQL` connection string. Without it the service keeps its data in memory.
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    /// Maximum number of pooled database connections
    #[arg(long, env = "DATABASE_POOL_SIZE", default_value_t = 10)]
    pub database_pool_size: u32,

    /// Which status changes merchants may make
    #[arg(long, env = "STATUS_TRANSITION_POLICY", value_enum, default_value_t = TransitionPolicy::Permissive)]
    pub status_transition_policy: TransitionPolicy,

    /// Whether cancelling an order gives its quantities back to the listings
    #[arg(long, env = "CANCELLATION_POLICY", value_enum, default_value_t = CancellationPolicy::KeepInventory)]
    pub cancellation_policy: CancellationPolicy,

    /// Browse radius used when a caller gives a centre but no radius
    #[arg(long, env = "DEFAULT_RADIUS_KM", default_value_t = DEFAULT_RADIUS_KM)]
    pub default_radius_km: f64,
}

impl Config {
    /// Loads `.env` if present, then parses arguments and environment.
    pub fn load() -> Result<Self, clap::Error> {
        _ = dotenvy::dotenv();

        Self::try_parse()
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_database() {
        let config = Config::try_parse_from(["rescue-orderservice"]).unwrap();

        assert_eq!(config.socket_addr(), "0.0.0.0:8080");
        assert_eq!(config.status_transition_policy, TransitionPolicy::Permissive);
        assert_eq!(config.cancellation_policy, CancellationPolicy::KeepInventory);
        assert_eq!(config.database_pool_size, 10);
    }

    #[test]
    fn policies_from_arguments() {
        let config = Config::try_parse_from([
            "rescue-orderservice",
            "--status-transition-policy",
            "forward",
            "--cancellation-policy",
            "restore-inventory",
            "--log-format",
            "json",
        ])
        .unwrap();

        assert_eq!(config.status_transition_policy, TransitionPolicy::Forward);
        assert_eq!(config.cancellation_policy, CancellationPolicy::RestoreInventory);
        assert_eq!(config.log_format, LogFormat::Json);
    }
}

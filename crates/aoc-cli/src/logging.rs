use crate::config::{parse_bool_flag, CliConfig};
use std::io;
use tracing_subscriber::EnvFilter;

/// Installs the stderr subscriber. Output stays silent unless `RUST_LOG`,
/// a configured level, or `AOC_LOG_STDERR` asks for it.
pub fn init_logging(config: &CliConfig) {
    let from_env = EnvFilter::try_from_default_env().ok();
    let enabled = from_env.is_some()
        || config.log_level.is_some()
        || parse_bool_flag(std::env::var("AOC_LOG_STDERR").ok().as_deref());

    let filter = from_env.unwrap_or_else(|| {
        EnvFilter::new(config.log_level.as_deref().unwrap_or("warn"))
    });

    if enabled {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::sink)
            .try_init();
    }
}

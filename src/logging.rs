use eyre::Result;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::config::Config;

/// Overrides `log.level` from the config when set.
pub const LOG_ENV: &str = "ESP_LOG";

fn env_filter(level: &str) -> Result<EnvFilter> {
    let directives = std::env::var(LOG_ENV).unwrap_or_else(|_| level.to_owned());

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_regex(false)
        .parse(directives)?;

    Ok(filter)
}

/// Setup logging for the overlay
pub fn setup_logging(config: &Config) -> Result<()> {
    let env_filter = env_filter(&config.log.level)?;

    let stdout_layer = tracing_subscriber::fmt::Layer::default()
        .with_ansi(true)
        .with_target(config.log.targets);

    Registry::default()
        .with(stdout_layer)
        .with(env_filter)
        .try_init()?;

    Ok(())
}

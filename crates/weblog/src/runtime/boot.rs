//! Boot — logging init, config load, filter and pipeline creation.

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::conf::ParserConfig;
use crate::filter::Filters;
use crate::pipeline::Pipeline;

/// Initialise the tracing / logging subsystem.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "weblog=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Load config and build the pipeline with its exclusion filters.
pub fn boot() -> Result<Pipeline, Box<dyn std::error::Error>> {
    info!("Starting weblog v{}", env!("CARGO_PKG_VERSION"));

    let config = ParserConfig::load()?;
    info!(
        "Loaded configuration: log_format={:?}, date_format={:?}",
        config.log_format, config.date_format
    );
    info!(
        "Exclusions: ignore_ips={}, ignore_referers={}, ignore_crawlers={}",
        config.ignore_ips.len(),
        config.ignore_referers.len(),
        config.ignore_crawlers
    );

    let filters = Filters::from_config(&config).map_err(|e| {
        error!("Invalid exclusion rule: {}", e);
        e
    })?;

    let pipeline = Pipeline::new(config).map_err(|e| {
        error!("Cannot start parsing: {}", e);
        e
    })?;

    Ok(pipeline.with_filters(filters))
}

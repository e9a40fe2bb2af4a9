use crate::config::Config;
use crate::error::Error;
use crate::orchestrator::{NotifyStatus, Orchestrator};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize logging with environment-based configuration
pub fn init_logging() -> miette::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,hyper=warn")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::Other(format!("Failed to set up logging: {}", e)))?;

    Ok(())
}

/// Load the application config
pub fn load_config() -> miette::Result<Config> {
    match Config::load() {
        Ok(config) => Ok(config),
        Err(e) => {
            error!("Failed to load configuration: {:?}", e);
            Err(e.into())
        }
    }
}

/// Run the pipeline once and report the result
pub async fn run(config: Config) -> miette::Result<()> {
    info!(
        "Schedule: {} -> {}",
        config.schedule_urls.join(", "),
        config.output_path.display()
    );
    if !config.notifications_enabled() {
        info!("No webhook configured; notifications are disabled");
    }

    let mut orchestrator = Orchestrator::from_config(config);
    let report = orchestrator.run().await?;

    let trail: Vec<String> = report.trail.iter().map(ToString::to_string).collect();
    info!(
        changed = report.changed,
        events = report.event_count,
        skipped = report.skipped_count,
        duplicates = report.duplicate_count,
        "Run finished: {}",
        trail.join(" -> ")
    );
    if let NotifyStatus::Failed(reason) = &report.notification {
        info!("Calendar was updated but subscribers were not notified: {}", reason);
    }

    Ok(())
}

use cruisecal::startup;
use tracing::info;

#[tokio::main(flavor = "current_thread")]
async fn main() -> miette::Result<()> {
    // Initialize logging
    startup::init_logging()?;

    info!("Starting cruisecal {}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = startup::load_config()?;

    // Run the pipeline once
    startup::run(config).await
}

use anyhow::Result;
use feedguard::{
    app::FeedFilterApp,
    config,
    infrastructure::{directories, logging, shutdown},
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = config::load_config()?;
    let paths = directories::ensure_directories(&config.directories)?;
    logging::init_tracing(&config.logging, &paths.logs_dir)?;

    let shutdown = shutdown::Shutdown::new();
    shutdown::install_signal_handlers(&shutdown);

    let app = FeedFilterApp::initialize(config, paths, shutdown.clone()).await?;
    app.run().await
}

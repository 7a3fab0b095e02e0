use anyhow::Context;
use clap::Parser;
use design_scraper::{
    install_prometheus, load_config_file, setup_logging, validate_config_file, Cli, CliRunner,
    Commands, ScraperConfig,
};
use tokio::signal;
use tracing::{error, info};

const API_KEY_ENV: &str = "BROWSERBASE_KEY";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    setup_logging(args.verbose)?;

    info!("Starting design-scraper v{}", env!("CARGO_PKG_VERSION"));

    if let Commands::Validate { config } = &args.command {
        if let Err(e) = validate_config_file(config).await {
            error!("Invalid configuration: {:#}", e);
            std::process::exit(1);
        }
        return Ok(());
    }

    // Recorder must exist before the scraper registers its metrics
    let prometheus = if args.metrics {
        Some(install_prometheus()?)
    } else {
        None
    };

    let config = load_config(&args).await?;
    let cli_runner = CliRunner::new(config)?;

    let result = tokio::select! {
        result = cli_runner.run(args.command) => result,
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal");
            Ok(())
        }
    };

    if let Some(handle) = prometheus {
        eprintln!("{}", handle.render());
    }

    if let Err(e) = result {
        error!("Application error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

async fn load_config(args: &Cli) -> anyhow::Result<ScraperConfig> {
    let mut config = match &args.config {
        Some(path) => load_config_file(path).await?,
        None => ScraperConfig::default(),
    };

    if config.api_key.is_empty() {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            config.api_key = key;
        }
    }

    if let Some(api_key) = &args.api_key {
        config.api_key = api_key.clone();
    }

    if args.remote {
        config.use_remote = true;
    }

    if let Some(chrome_path) = &args.chrome_path {
        config.chrome_path = Some(chrome_path.clone());
    }

    config.validate().context("invalid configuration")?;

    info!("Configuration loaded successfully");
    info!(
        "Browser mode: {}",
        if config.connection_mode().is_remote() { "remote" } else { "local" }
    );
    info!("Navigation timeout: {:?}", config.navigation_timeout);
    info!("Max attempts: {}", config.retry.max_attempts);

    Ok(config)
}

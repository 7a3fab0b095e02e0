use crate::{
    batch_result_filename, build_http_client, default_sink, format_duration, preflight, BatchScraper,
    ProgressTracker, Scraper, ScraperConfig, ScrapingResult,
};
use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "design-scraper")]
#[command(about = "Capture a website's visual and structural design")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, help = "Use the remote browser endpoint (requires an API key)")]
    pub remote: bool,

    #[arg(long, help = "Remote browser API key (default: $BROWSERBASE_KEY)")]
    pub api_key: Option<String>,

    #[arg(long, help = "Chrome executable path")]
    pub chrome_path: Option<String>,

    #[arg(long, help = "Print Prometheus metrics to stderr after the run")]
    pub metrics: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scrape a single URL
    Scrape {
        #[arg(short, long, help = "URL to scrape")]
        url: String,

        #[arg(short, long, help = "Output JSON file (default: stdout)")]
        output: Option<PathBuf>,

        #[arg(long, help = "Maximum number of attempts")]
        max_retries: Option<usize>,

        #[arg(long, help = "Check reachability over plain HTTP first")]
        preflight: bool,
    },

    /// Scrape URLs listed in a file
    Batch {
        #[arg(short, long, help = "Input file containing URLs (one per line)")]
        input: PathBuf,

        #[arg(short, long, help = "Output directory for result files")]
        output: PathBuf,

        #[arg(short, long, help = "Concurrency level (default: number of CPUs)")]
        concurrency: Option<usize>,

        #[arg(long, help = "Progress reporting interval in seconds")]
        progress_interval: Option<u64>,
    },

    /// Validate configuration
    Validate {
        #[arg(short, long, help = "Configuration file to validate")]
        config: PathBuf,
    },
}

pub struct CliRunner {
    pub config: ScraperConfig,
    pub scraper: Arc<Scraper>,
}

impl CliRunner {
    pub fn new(config: ScraperConfig) -> anyhow::Result<Self> {
        let scraper = Scraper::with_chrome(config.clone(), default_sink())
            .context("failed to set up scraper")?;

        Ok(Self {
            config,
            scraper: Arc::new(scraper),
        })
    }

    pub async fn run(&self, command: Commands) -> anyhow::Result<()> {
        match command {
            Commands::Scrape {
                url,
                output,
                max_retries,
                preflight,
            } => self.run_scrape(&url, output, max_retries, preflight).await,
            Commands::Batch {
                input,
                output,
                concurrency,
                progress_interval,
            } => {
                self.run_batch(&input, &output, concurrency, progress_interval)
                    .await
            }
            Commands::Validate { config } => validate_config_file(&config).await,
        }
    }

    pub async fn run_scrape(
        &self,
        url: &str,
        output: Option<PathBuf>,
        max_retries: Option<usize>,
        check_reachability: bool,
    ) -> anyhow::Result<()> {
        if check_reachability {
            self.preflight(url).await;
        }

        let attempts = max_retries.unwrap_or(self.config.retry.max_attempts);
        let result = self.scraper.scrape(url, attempts).await;

        let json = serde_json::to_string_pretty(&result)?;
        match &output {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).await?;
                }
                fs::write(path, json)
                    .await
                    .with_context(|| format!("failed to write {}", path.display()))?;
                info!("Result saved to: {}", path.display());
            }
            None => println!("{json}"),
        }

        if result.success {
            print_summary(&result);
            Ok(())
        } else {
            error!("Failed to scrape {}: {:?}", url, result.error_message);
            Err(anyhow!(
                "scrape failed: {}",
                result.error().unwrap_or("unknown error")
            ))
        }
    }

    async fn preflight(&self, url: &str) {
        let client = match build_http_client(&self.config) {
            Ok(client) => client,
            Err(e) => {
                warn!("Preflight skipped: {}", e);
                return;
            }
        };

        match preflight(&client, url).await {
            Ok(status) => info!("Preflight {} -> HTTP {}", url, status),
            Err(e) => warn!("Preflight {} failed: {}", url, e),
        }
    }

    pub async fn run_batch(
        &self,
        input: &Path,
        output: &Path,
        concurrency: Option<usize>,
        progress_interval: Option<u64>,
    ) -> anyhow::Result<()> {
        info!("Starting batch scrape");

        let urls = read_urls_from_file(input).await?;
        info!("Loaded {} URLs from {}", urls.len(), input.display());

        fs::create_dir_all(output).await?;

        let tracker = Arc::new(ProgressTracker::new(urls.len()));

        if let Some(interval) = progress_interval {
            let tracker = tracker.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval));

                while !tracker.is_complete() {
                    interval.tick().await;
                    let progress = tracker.get_progress();

                    eprintln!(
                        "Progress: {}/{} ({:.1}%) - Success: {}, Errors: {}, Rate: {:.2}/s, ETA: {:?}",
                        progress.completed,
                        progress.total,
                        progress.percent(),
                        progress.success,
                        progress.errors,
                        progress.rate,
                        progress.eta
                    );
                }
            });
        }

        let batch = match concurrency {
            Some(n) => BatchScraper::new(self.scraper.clone(), n),
            None => BatchScraper::with_default_concurrency(self.scraper.clone()),
        };
        let results = batch.run(urls, tracker.clone()).await;

        for (index, result) in results.iter().enumerate() {
            let path = output.join(batch_result_filename(index, &result.url));
            fs::write(&path, serde_json::to_string_pretty(result)?)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
        }

        let progress = tracker.get_progress();
        info!(
            "Batch completed in {}. Success: {}, Errors: {}",
            format_duration(progress.elapsed),
            progress.success,
            progress.errors
        );
        Ok(())
    }
}

fn print_summary(result: &ScrapingResult) {
    eprintln!("Scrape completed successfully:");
    eprintln!("  URL: {}", result.url);
    eprintln!("  Attempts: {}", result.attempts);
    eprintln!("  Duration: {}ms", result.duration_ms);
    eprintln!("  Screenshots: {}", result.screenshots.len());
    eprintln!("  Colors: {}", result.color_palette.join(", "));
    eprintln!("  Assets: {}", result.assets.total());

    if let Some(title) = result.metadata.get("title").and_then(|t| t.as_str()) {
        eprintln!("  Title: {title}");
    }
}

/// Reads one URL per line, skipping blanks and `#` comments.
pub async fn read_urls_from_file(path: &Path) -> anyhow::Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;

    Ok(parse_url_list(&content))
}

pub fn parse_url_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.to_string())
        .collect()
}

pub async fn load_config_file(path: &Path) -> anyhow::Result<ScraperConfig> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config: ScraperConfig = serde_json::from_str(&content)
        .with_context(|| format!("invalid configuration in {}", path.display()))?;

    Ok(config)
}

pub async fn validate_config_file(path: &Path) -> anyhow::Result<()> {
    println!("Validating configuration: {}", path.display());

    let config = load_config_file(path).await?;
    config.validate()?;

    println!("Configuration is valid:");
    println!("  Mode: {}", if config.connection_mode().is_remote() { "remote" } else { "local" });
    println!("  Navigation timeout: {:?}", config.navigation_timeout);
    println!(
        "  Viewport: {}x{}",
        config.context_viewport.width, config.context_viewport.height
    );
    println!("  Max attempts: {}", config.retry.max_attempts);

    Ok(())
}

pub fn setup_logging(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("failed to initialise logging: {}", e))
}

use anyhow::Result;
use clap::Parser;
use proxy_validator::{
    config::ValidatorConfig,
    progress::{summary_line, working_line, Progress},
    proxy::{load_proxies, save_proxies, ProxyEndpoint, Validator, WorkingSet},
    tui::ValidatorApp,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Validate a proxy list and keep only the working proxies
#[derive(Parser)]
#[command(name = "proxy-validator")]
#[command(about = "Validate a proxy list and keep only the working proxies")]
struct Cli {
    /// Proxy list, one proxy per line (rewritten in place)
    input: Option<PathBuf>,

    /// Write working proxies here instead of back to the input file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// URL to request through each proxy
    #[arg(short = 'u', long)]
    target_url: Option<String>,

    /// Timeout per proxy in seconds
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Number of proxies checked concurrently
    #[arg(short = 'n', long)]
    workers: Option<usize>,

    /// Show a full-screen progress view
    #[arg(long)]
    tui: bool,

    /// Don't print the progress counter
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    /// Defaults, then the config file, then flags
    fn load_config(&self) -> Result<ValidatorConfig> {
        let mut config = match &self.config {
            Some(path) => ValidatorConfig::from_file(path)?,
            None => ValidatorConfig::default(),
        };

        if let Some(input) = &self.input {
            config = config.with_proxies_file(input.clone());
        }
        if let Some(output) = &self.output {
            config = config.with_output_file(output.clone());
        }
        if let Some(url) = &self.target_url {
            config = config.with_target_url(url.clone());
        }
        if let Some(secs) = self.timeout {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Some(workers) = self.workers {
            config = config.with_concurrency(workers);
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = cli.load_config()?;

    let proxies = load_proxies(&config.proxies_file)?;
    if proxies.is_empty() {
        println!("No proxies to test.");
        return Ok(());
    }

    let total = proxies.len();
    let validator = Validator::new(&config)?;

    let working = if cli.tui {
        ValidatorApp::new(proxies, validator, config.target_url.clone())
            .run()
            .await?
    } else {
        println!(
            "Testing {} proxies with {} workers, timeout: {}s",
            total,
            config.concurrency,
            config.timeout.as_secs()
        );
        println!("Test URL: {}", config.target_url);
        println!();

        let working = run_with_progress(&validator, proxies, cli.quiet).await;
        println!();
        println!(
            "Results: {} working, {} failed",
            working.len(),
            total - working.len()
        );
        working
    };

    save_proxies(config.output_path(), &working)?;
    println!("{}", summary_line(working.len(), config.output_path()));

    Ok(())
}

async fn run_with_progress(
    validator: &Validator,
    proxies: Vec<ProxyEndpoint>,
    quiet: bool,
) -> WorkingSet {
    let mut progress = Progress::new(proxies.len());

    validator
        .validate_with(proxies, |completion| {
            progress.record(&completion.result);
            if let Some(line) = working_line(&completion.result) {
                println!("{}", line);
            }
            if !quiet {
                eprintln!("{}", progress.status_line());
            }
        })
        .await
}

//! unlocker - find the resolver or registry mirror that gets through.
//!
//! Binary entry point for the unlocker CLI application.

#![warn(clippy::all, warnings)]
#![warn(clippy::pedantic, clippy::nursery)]

use clap::CommandFactory;
use std::io::{IsTerminal, Write};
use std::time::Duration;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use unlocker::cli::{Cli, Commands, OutputFormat};
use unlocker::config::{ConfigLoader, Paths, Settings};
use unlocker::error::Result;
use unlocker::flows::Runner;
use unlocker::output::{self, MetricKind};
use unlocker::probe::{Persisted, ProbeOutcome, RankedReport};
use unlocker::validate;

/// Set up logging based on verbosity level.
///
/// Logs go to stderr so stdout carries only the report.
///
/// # Arguments
///
/// * `verbose` - Enable debug-level logging
/// * `quiet` - Enable error-level only logging
fn setup_logging(verbose: bool, quiet: bool) {
    let default = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().without_time().with_writer(std::io::stderr))
        .init();
}

/// Build the runner from the config directory and global flags.
fn load_runner(cli: &Cli) -> Result<Runner> {
    let paths = cli
        .config_dir
        .clone()
        .map_or_else(Paths::default, Paths::new);
    let mut settings: Settings = ConfigLoader::load_settings_or_default(&paths)?;
    if cli.concurrency.is_some() {
        settings.max_concurrency = cli.concurrency;
    }
    tracing::debug!("config directory {}", paths.root.display());
    Runner::new(paths, settings)
}

/// Progress printer for table output: one `\r` line per finished candidate.
fn progress(format: OutputFormat, quiet: bool) -> impl FnMut(&ProbeOutcome) {
    let enabled = format.is_human() && !quiet && std::io::stderr().is_terminal();
    let mut done = 0usize;
    move |outcome: &ProbeOutcome| {
        done += 1;
        if enabled {
            eprint!("\r\x1b[2K[{done:>3}] {} {}", outcome.candidate, outcome.status);
            let _ = std::io::stderr().flush();
        }
    }
}

fn clear_progress(format: OutputFormat, quiet: bool) {
    if format.is_human() && !quiet && std::io::stderr().is_terminal() {
        eprint!("\r\x1b[2K");
    }
}

/// Print a report in the requested format.
fn print_report(report: &RankedReport, kind: MetricKind, format: OutputFormat) -> Result<()> {
    let color = std::io::stdout().is_terminal();
    let rendered = output::render(report, kind, format, color)?;
    print!("{rendered}");
    Ok(())
}

/// Run the bypass check command.
///
/// # Arguments
///
/// * `runner` - Loaded configuration
/// * `cli` - Global flags (format, quiet)
/// * `target` - Domain or URL as typed by the user
/// * `timeout` - Per-resolver deadline override
async fn run_check(runner: &Runner, cli: &Cli, target: &str, timeout: Option<u64>) -> Result<()> {
    let url = validate::normalize_target(target)?;
    let timeout = timeout.map_or_else(|| runner.settings().check_timeout(), Duration::from_secs);

    if cli.format.is_human() {
        println!("URL: {url}\nTimeout: {}s\n", timeout.as_secs());
    }

    let report = runner
        .bypass_check(&url, timeout, progress(cli.format, cli.quiet))
        .await?;
    clear_progress(cli.format, cli.quiet);
    print_report(&report.ranked, MetricKind::Status, cli.format)?;

    match &report.persisted {
        Ok(Persisted::Written { path, count }) => {
            tracing::info!("cached {count} resolvers to {}", path.display());
        }
        Ok(Persisted::Skipped) => tracing::info!("no resolver passed; cache left unchanged"),
        Err(e) => tracing::error!("{e}"),
    }
    Ok(())
}

/// Run the DNS speed benchmark.
async fn run_dns(
    runner: &Runner,
    cli: &Cli,
    url: &str,
    check: bool,
    timeout: Option<u64>,
) -> Result<()> {
    let url = validate::normalize_target(url)?;
    let timeout = timeout.map_or_else(|| runner.settings().benchmark_timeout(), Duration::from_secs);

    if cli.format.is_human() {
        println!("URL: {url}\nTimeout: {}s\n", timeout.as_secs());
    }

    let report = runner
        .dns_speed(&url, check, timeout, progress(cli.format, cli.quiet))
        .await?;
    clear_progress(cli.format, cli.quiet);
    print_report(&report.ranked, MetricKind::Throughput, cli.format)
}

/// Run the registry speed benchmark.
async fn run_docker(runner: &Runner, cli: &Cli, image: &str, timeout: Option<u64>) -> Result<()> {
    let image = validate::parse_image(image)?;
    let timeout = timeout.map_or_else(|| runner.settings().benchmark_timeout(), Duration::from_secs);

    if cli.format.is_human() {
        println!("Image: {image}\nTimeout: {}s\n", timeout.as_secs());
    }

    let report = runner
        .registry_speed(&image, timeout, progress(cli.format, cli.quiet))
        .await?;
    clear_progress(cli.format, cli.quiet);
    print_report(&report.ranked, MetricKind::Size, cli.format)
}

/// Print one of the candidate lists.
async fn run_list(runner: &Runner, cli: &Cli, registries: bool, cached: bool) -> Result<()> {
    let source = if registries {
        runner.registry_source()
    } else if cached {
        runner.cached_source()
    } else {
        runner.dns_source()
    };
    let candidates = source.load().await?;

    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&candidates)?),
        OutputFormat::Table => {
            println!("{} entries:\n", candidates.len());
            for (idx, c) in candidates.iter().enumerate() {
                println!("{:<4} {c}", idx + 1);
            }
        }
        OutputFormat::Csv | OutputFormat::Tsv => {
            for c in &candidates {
                println!("{c}");
            }
        }
    }
    Ok(())
}

/// Main entry point for the unlocker CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("unlocker crashed: {panic_info}");
    }));

    let cli = unlocker::cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "unlocker", &mut std::io::stdout());
        return Ok(());
    }

    let runner = load_runner(&cli)?;

    match &cli.command {
        Commands::Check { target, timeout } => {
            run_check(&runner, &cli, target, timeout.timeout).await?;
        }
        Commands::Dns {
            url,
            check,
            timeout,
        } => {
            run_dns(&runner, &cli, url, *check, timeout.timeout).await?;
        }
        Commands::Docker { image, timeout } => {
            run_docker(&runner, &cli, image, timeout.timeout).await?;
        }
        Commands::List { registries, cached } => {
            run_list(&runner, &cli, *registries, *cached).await?;
        }
        Commands::Update => {
            for path in runner.update_lists().await? {
                println!("updated {}", path.display());
            }
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}

//! page-send - Background daemon for page media publishing
//!
//! Watches the feed and story drop directories and publishes new files at
//! every scan, within the daily quotas.

use anyhow::Context;
use clap::Parser;
use libpagecast::archive::ensure_dirs;
use libpagecast::logging::{self, LogFormat};
use libpagecast::scheduling::{parse_interval, SlotTable};
use libpagecast::{scan_once, Config, GraphClient, PagecastError, Publisher, ScanReport};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "page-send")]
#[command(version)]
#[command(about = "Background daemon that publishes dropped media to a page")]
#[command(long_about = "\
page-send - Background daemon that publishes dropped media to a page

DESCRIPTION:
    page-send watches two drop directories. Images and videos placed in the
    feed directory are published to the page's feed, those placed in the
    story directory to its stories. Published files are moved to the archive
    directory; failed files stay where they are and are retried on the next
    scan.

    One scan runs at startup, then one per scan interval. The interval is
    checked every check interval.

USAGE:
    # Run in foreground (logs to stderr)
    page-send

    # Scan once and exit
    page-send --once

    # Scan every 10 minutes
    page-send --scan-interval 10m

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current scan)

CONFIGURATION:
    Configuration file: ~/.config/pagecast/config.toml

    [page]
    id = \"1234567890\"
    access_token_file = \"~/.config/pagecast/page.token\"

    [schedule]
    post_times = [\"17:05\"]
    max_posts_per_day = 1
    scan_interval = \"1h\"

    PAGECAST_PAGE_ID and PAGECAST_ACCESS_TOKEN override the file.

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error
")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Scan interval such as "30m" or "1h" (overrides config)
    #[arg(long, value_name = "INTERVAL", value_parser = parse_interval)]
    scan_interval: Option<std::time::Duration>,

    /// How often to check whether a scan is due (overrides config)
    #[arg(long, value_name = "INTERVAL", value_parser = parse_interval)]
    check_interval: Option<std::time::Duration>,

    /// Log output format: text, json or pretty
    #[arg(long, value_name = "FORMAT")]
    log_format: Option<LogFormat>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Run one scan and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        let code = e
            .downcast_ref::<PagecastError>()
            .map(PagecastError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    let mut log_config = logging::config_from_section(&config.logging);
    log_config.verbose = cli.verbose;
    if let Some(format) = cli.log_format {
        log_config.format = format;
    }
    log_config
        .init()
        .context("Failed to open the log file")?;

    let mut settings = config.resolve()?;
    if let Some(interval) = cli.scan_interval {
        settings.scan_interval = interval;
    }
    if let Some(interval) = cli.check_interval {
        settings.check_interval = interval;
    }

    ensure_dirs(settings.publisher.directories())
        .await
        .context("Failed to create the watch and archive directories")?;

    info!(
        page_id = %settings.graph.page_id,
        feed_dir = %settings.publisher.feed_dir.display(),
        story_dir = %settings.publisher.story_dir.display(),
        post_times = %slot_list(&settings.publisher.schedule.feed),
        story_times = %slot_list(&settings.publisher.schedule.story),
        scan_interval = ?settings.scan_interval,
        check_interval = ?settings.check_interval,
        "page-send daemon starting"
    );

    let client = GraphClient::new(settings.graph.clone()).map_err(PagecastError::from)?;
    let mut publisher = Publisher::new(Arc::new(client), settings.publisher.clone());

    // Set up graceful shutdown
    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    log_report(&scan_once(&mut publisher).await);

    if cli.once {
        info!("page-send: scanned once, exiting");
        return Ok(());
    }

    run_daemon_loop(
        &mut publisher,
        settings.scan_interval,
        settings.check_interval,
        shutdown,
    )
    .await;

    info!("page-send daemon stopped");
    Ok(())
}

/// Set up signal handlers for graceful shutdown
#[cfg(unix)]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> anyhow::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals =
        Signals::new([SIGINT, SIGTERM]).context("Failed to install signal handlers")?;

    std::thread::spawn(move || {
        if let Some(signal) = signals.forever().next() {
            info!(signal, "Received shutdown signal, stopping after the current scan");
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> anyhow::Result<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, stopping after the current scan");
            shutdown.store(true, Ordering::Relaxed);
        }
    });
    Ok(())
}

/// Scan whenever `scan_interval` has elapsed, checking every `check_interval`
async fn run_daemon_loop(
    publisher: &mut Publisher,
    scan_interval: Duration,
    check_interval: Duration,
    shutdown: Arc<AtomicBool>,
) {
    let mut last_scan = Instant::now();

    loop {
        if !sleep_unless_shutdown(check_interval, &shutdown).await {
            info!("Shutdown requested, stopping daemon loop");
            break;
        }

        if last_scan.elapsed() < scan_interval {
            continue;
        }

        let report = scan_once(publisher).await;
        last_scan = Instant::now();
        log_report(&report);
    }
}

fn log_report(report: &ScanReport) {
    if report.is_empty() {
        debug!("Nothing to publish");
    } else if report.failed > 0 {
        warn!(failed = report.failed, "Some files failed and will be retried");
    }
}

/// Comma-separated slot times such as "09:00, 17:05"
fn slot_list(table: &SlotTable) -> String {
    table
        .slots()
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Sleep for `duration` in short steps; false when shutdown was requested
async fn sleep_unless_shutdown(duration: Duration, shutdown: &AtomicBool) -> bool {
    let deadline = Instant::now() + duration;

    loop {
        if shutdown.load(Ordering::Relaxed) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        sleep((deadline - now).min(Duration::from_secs(1))).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_intervals() {
        let cli = Cli::try_parse_from([
            "page-send",
            "--scan-interval",
            "10m",
            "--check-interval",
            "5s",
            "--log-format",
            "json",
            "--once",
        ])
        .unwrap();

        assert_eq!(cli.scan_interval, Some(Duration::from_secs(600)));
        assert_eq!(cli.check_interval, Some(Duration::from_secs(5)));
        assert_eq!(cli.log_format, Some(LogFormat::Json));
        assert!(cli.once);
    }

    #[test]
    fn test_cli_rejects_zero_interval() {
        assert!(Cli::try_parse_from(["page-send", "--scan-interval", "0s"]).is_err());
    }

    #[test]
    fn test_slot_list() {
        let table = SlotTable::new(vec!["17:05".parse().unwrap(), "09:00".parse().unwrap()]);
        assert_eq!(slot_list(&table), "09:00, 17:05");
        assert_eq!(slot_list(&SlotTable::default()), "");
    }

    #[tokio::test]
    async fn test_sleep_stops_on_shutdown() {
        let shutdown = AtomicBool::new(true);
        assert!(!sleep_unless_shutdown(Duration::from_secs(60), &shutdown).await);
    }

    #[tokio::test]
    async fn test_sleep_completes() {
        let shutdown = AtomicBool::new(false);
        assert!(sleep_unless_shutdown(Duration::from_millis(10), &shutdown).await);
    }
}

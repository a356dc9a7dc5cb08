//! page-post - Publish one media file to a page right away

use clap::Parser;
use libpagecast::archive::ensure_dirs;
use libpagecast::logging;
use libpagecast::{
    Config, Destination, GraphClient, PagecastError, PublishReceipt, Publisher, Result,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "page-post")]
#[command(about = "Publish one image or video to a page's feed or stories", long_about = None)]
struct Cli {
    /// Image or video file to publish
    file: PathBuf,

    /// Publish to the page's stories instead of its feed
    #[arg(short, long)]
    story: bool,

    /// Leave the file in place instead of moving it to the archive
    #[arg(short, long)]
    keep: bool,

    /// Path to the configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Run the main logic and handle errors
    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    if cli.format != "text" && cli.format != "json" {
        return Err(PagecastError::InvalidInput(format!(
            "Invalid output format '{}'. Valid options: text, json",
            cli.format
        )));
    }

    if !cli.file.is_file() {
        return Err(PagecastError::InvalidInput(format!(
            "Not a file: {}",
            cli.file.display()
        )));
    }

    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    let mut log_config = logging::config_from_section(&config.logging);
    log_config.verbose = cli.verbose;
    log_config.init()?;

    let mut settings = config.resolve()?;
    // Publishing on demand ignores the posting window and never quarantines
    settings.publisher.schedule.window = None;
    settings.publisher.max_attempts = None;

    let destination = if cli.story {
        Destination::Story
    } else {
        Destination::Feed
    };

    let client = GraphClient::new(settings.graph.clone())?;
    let mut publisher = Publisher::new(Arc::new(client), settings.publisher.clone());
    if cli.keep {
        publisher = publisher.keep_files();
    } else {
        ensure_dirs([settings.publisher.archive_dir.as_path()]).await?;
    }

    let receipt = publisher.publish(&cli.file, destination).await?;
    print_receipt(&receipt, &cli.format)
}

fn print_receipt(receipt: &PublishReceipt, format: &str) -> Result<()> {
    if format == "json" {
        let json = serde_json::to_string_pretty(receipt)
            .map_err(|e| PagecastError::InvalidInput(format!("Cannot encode receipt: {}", e)))?;
        println!("{}", json);
        return Ok(());
    }

    println!(
        "{}: {} {} published{}",
        receipt.file_name,
        receipt.destination,
        receipt.kind,
        receipt
            .remote_id
            .as_deref()
            .map(|id| format!(" as {}", id))
            .unwrap_or_default()
    );
    if let Some(target) = &receipt.archived_to {
        println!("archived to {}", target.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_to_feed() {
        let cli = Cli::try_parse_from(["page-post", "photo.jpg"]).unwrap();
        assert!(!cli.story);
        assert!(!cli.keep);
        assert_eq!(cli.format, "text");
    }

    #[test]
    fn test_cli_story_and_keep() {
        let cli = Cli::try_parse_from(["page-post", "--story", "--keep", "clip.mp4"]).unwrap();
        assert!(cli.story);
        assert!(cli.keep);
        assert_eq!(cli.file, PathBuf::from("clip.mp4"));
    }

    #[test]
    fn test_cli_requires_file() {
        assert!(Cli::try_parse_from(["page-post"]).is_err());
    }
}

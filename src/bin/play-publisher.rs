//! Play Publisher CLI
//!
//! Uploads an app bundle to Google Play, assigns it to the alpha track and
//! commits or discards the edit. Input comes from the environment:
//!
//! - `GOOGLE_PLAY_CREDENTIALS_PATH` service account key file
//! - `GOOGLE_PLAY_PACKAGE_NAME` application package name
//! - `GOOGLE_PLAY_PACKAGE_PATH` bundle to upload
//! - `GOOGLE_PLAY_COMMIT` set to `true` to commit, anything else deletes the edit

use anyhow::Result;
use clap::{ArgAction, Parser};
use play_publisher::{
    EditPublisher, GooglePlayClient, PublishError, PublishOutcome, PublisherConfig, open_bundle,
};
use std::process;

/// Upload an app bundle to the Google Play alpha track
#[derive(Parser)]
#[command(name = "play-publisher")]
#[command(version)]
#[command(about = "Upload an app bundle to the Google Play alpha track", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    init_logging(cli.verbose)?;

    let config = match PublisherConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            for name in e.missing() {
                eprintln!("missing {}", name);
            }
            return Ok(1);
        }
    };

    match publish(&config).await {
        Ok(outcome) => {
            println!("{}", outcome.report_line());
            Ok(0)
        }
        Err(e) => {
            // Fatal lines are printed regardless of the log filter.
            eprintln!("{}", e);
            log::debug!("failed with {}", e.code());
            if e.leaves_orphaned_edit() {
                log::warn!("the edit was left unfinished on the server");
            }
            for action in e.suggested_actions() {
                log::info!("hint: {}", action);
            }
            Ok(e.exit_code())
        }
    }
}

async fn publish(config: &PublisherConfig) -> Result<PublishOutcome, PublishError> {
    let bundle = open_bundle(&config.bundle_path).await?;
    let client = GooglePlayClient::authenticate(&config.credentials_path).await?;

    EditPublisher::new(&client).publish(config, bundle).await
}

fn init_logging(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(format!("warn,play_publisher={level}")),
    )
    .try_init()?;

    Ok(())
}

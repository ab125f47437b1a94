#![deny(clippy::implicit_return)]
#![allow(clippy::needless_return)]

mod application;
mod configuration;
mod domain;
mod infrastructure;

use std::env;
use std::process;

use anyhow::Error;
use owo_colors::OwoColorize;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::application::cli;
use crate::application::server;
use crate::configuration::Config;

const DEFAULT_LOG_FILTER: &str = "agrichat=info,tower_http=info";

fn handle_error(err: Error) {
    eprintln!(
        "{}",
        format!(
            "Agrichat has failed with the following app version and error.\n\nVersion: {}\nCommit: {}\nError: {:#}",
            env!("CARGO_PKG_VERSION"),
            env!("VERGEN_GIT_DESCRIBE"),
            err
        )
        .red()
    );

    let backtrace = err.backtrace();
    if backtrace.to_string() == "disabled backtrace" {
        let args = env::args().collect::<Vec<String>>().join(" ");
        eprintln!("\nRunning the following can help explain further what the issue is:");
        eprintln!("\nRUST_BACKTRACE=1 {args}");
    } else {
        eprintln!("\n{}", backtrace);
    }

    process::exit(1);
}

/// Logs go to stdout, or to a daily rolling JSON file when a log directory is
/// configured. The returned guard must live until shutdown so buffered lines
/// are flushed.
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| return EnvFilter::new(DEFAULT_LOG_FILTER));

    match &config.log_dir {
        Some(log_dir) => {
            let file_appender = tracing_appender::rolling::daily(log_dir, "agrichat.log");
            let (writer, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(writer)
                .init();

            return Some(guard);
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            return None;
        }
    }
}

#[tokio::main]
async fn main() {
    better_panic::install();

    let config = match cli::parse().await {
        Ok(Some(config)) => config,
        Ok(None) => process::exit(0),
        Err(err) => {
            handle_error(err);
            return;
        }
    };

    let _guard = init_tracing(&config);

    if let Err(err) = server::start(config).await {
        handle_error(err);
    }
}

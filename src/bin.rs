//! Binary entry point for `jirabot`.
//!
//! This module provides the command-line interface for jirabot with a
//! logging verbosity option. It initializes the necessary components and
//! starts the service.

use clap::Parser;
use jirabot::base::{config, types::Void};
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::{Protocol, WithExportConfig};
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt};

/// Jirabot, a Keybase chat bridge for Jira.
///
/// Configuration comes from the `JIRABOT_CONFIG` environment variable as
/// a single JSON document. The bot answers `!jira` commands in channels
/// and announces subscribed Jira feeds.
#[derive(Parser, Debug)]
#[command(version, author, about, long_about = None)]
struct Args {
    /// Increase log verbosity (-v, -vv, etc.).
    ///
    /// Use multiple times to increase verbosity:
    /// - No flag: INFO level
    /// - -v: DEBUG level
    /// - -vv or more: TRACE level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Main entry point for the jirabot binary.
///
/// Installs the failure funnel, sets up logging based on verbosity, reads
/// the raw configuration, and starts the bot.
#[tokio::main]
async fn main() -> Void {
    // The failure funnel must exist before any asynchronous work can.
    jirabot::fatal::install();

    let args = Args::parse();

    // Construct the level filter.

    let level = match args.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    let level_filter = tracing_subscriber::filter::LevelFilter::from_level(level);

    // Prepare the log layer.

    let stdout = tracing_subscriber::fmt::layer()
        .without_time()
        .with_ansi(true)
        .with_level(true)
        .with_file(false)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);

    // Prepare the otlp layer.

    let exporter = opentelemetry_otlp::SpanExporter::builder().with_http().with_protocol(Protocol::HttpBinary).build()?;
    let tracer = opentelemetry_sdk::trace::SdkTracerProvider::builder().with_simple_exporter(exporter).build().tracer("jirabot");
    let otel = tracing_opentelemetry::layer().with_tracer(tracer);

    tracing_subscriber::registry().with(otel).with(level_filter).with(stdout).init();

    // The raw configuration is read exactly once; later environment
    // mutation cannot reach the running process.
    let raw_config = std::env::var(config::CONFIG_ENV_VAR).unwrap_or_default();

    jirabot::start(raw_config).await
}

//! foliomail - portfolio company update collection and metrics extraction.
//!
//! A tool for collecting forwarded portfolio-company update emails,
//! extracting financial metrics with an LLM, and tracking update cadence
//! across a fund's portfolio.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    // Initialize logging based on verbosity
    let default_filter = if foliomail::cli::is_verbose() {
        "foliomail=info"
    } else {
        "foliomail=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Run CLI
    foliomail::cli::run().await
}

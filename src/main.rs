mod cli;

use crate::cli::app::{App, Args};
use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = Args::parse();
    let config = checkin_feed::FeedConfig::from_env().context("failed to load configuration")?;

    App::new(args, config).run().await
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("checkin_feed=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

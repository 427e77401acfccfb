mod cli;
mod console;
mod model;
mod orchestrator;
mod storage;
mod worker;

use anyhow::Result;
use clap::Parser;

/// Log to stderr; `RUST_LOG` wins over `--log-level`.
fn init_tracing(default_filter: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    init_tracing(&args.log_level);

    let code = cli::run(args).await?;
    // Exit explicitly: the stdin reader thread would otherwise keep the runtime alive.
    std::process::exit(code);
}

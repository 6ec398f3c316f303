//! satlink — deploy satellite contracts and link them into a hub.
//!
//! ```text
//! satlink                              # stock topology, built-in artifacts
//! satlink --config satlink.toml        # custom labels, templates, keys
//! satlink --artifacts artifacts/ --format json
//! ```
//!
//! Exits 0 when every satellite is registered with the hub, 1 otherwise.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use satlink_cli::commands::deploy::{self, OutputFormat};

#[derive(Parser)]
#[command(
    name = "satlink",
    about = "Deploy satellite contracts, deploy a hub, and register every satellite with it",
    version
)]
struct Cli {
    /// Path to satlink.toml (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Directory of compiled contract artifacts; overrides [artifacts].dir
    #[arg(short, long)]
    artifacts: Option<PathBuf>,
    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

fn init_tracing() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("satlink=warn".parse()?),
        )
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = init_tracing() {
        eprintln!("error: failed to initialise logging: {e}");
        return ExitCode::FAILURE;
    }

    let cli = Cli::parse();

    match deploy::deploy(cli.config.as_deref(), cli.artifacts.as_deref(), cli.format).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

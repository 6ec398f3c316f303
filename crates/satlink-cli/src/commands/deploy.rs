use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use tracing::debug;

use satlink_core::{ArtifactDir, BuiltinTemplates, SatlinkConfig, TemplateResolver};
use satlink_ledger::DevLedger;
use satlink_rollout::{Orchestrator, Progress, RunPlan};

use crate::render;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Progress lines and a summary block on stdout.
    Text,
    /// Progress on stderr, one JSON document on stdout.
    Json,
}

/// Load configuration, build the collaborators, and run once against the
/// development ledger. Returns the process exit status.
pub async fn deploy(
    config_path: Option<&Path>,
    artifacts: Option<&Path>,
    format: OutputFormat,
) -> anyhow::Result<u8> {
    let mut config = SatlinkConfig::load(config_path)?;
    if let Some(dir) = artifacts {
        config.artifacts.dir = Some(dir.to_path_buf());
    }
    let plan = RunPlan::from_config(&config)?;

    let ledger = Arc::new(DevLedger::new(
        config.ledger.deployer_balance()?,
        Duration::from_millis(config.ledger.block_time_ms),
    ));
    let resolver: Arc<dyn TemplateResolver> = match &config.artifacts.dir {
        Some(dir) => {
            debug!(dir = %dir.display(), "resolving templates from artifacts");
            Arc::new(ArtifactDir::new(dir))
        }
        None => Arc::new(BuiltinTemplates),
    };

    let orchestrator = Orchestrator::new(ledger, resolver, plan);
    let stdout = io::stdout();
    let stderr = io::stderr();
    let code = execute(orchestrator, format, &mut stdout.lock(), &mut stderr.lock()).await?;
    Ok(code)
}

/// Run `orchestrator`, streaming progress as it happens, then print the
/// summary (or what was left behind) and return the exit status.
///
/// On failure the last line written to `err` names the phase, the item,
/// and the underlying error.
pub async fn execute<O: Write, E: Write>(
    orchestrator: Orchestrator,
    format: OutputFormat,
    out: &mut O,
    err: &mut E,
) -> io::Result<u8> {
    let (progress, mut events) = Progress::channel();
    let orchestrator = orchestrator.with_progress(progress);

    let result = {
        let sink: &mut dyn Write = match format {
            OutputFormat::Text => &mut *out,
            OutputFormat::Json => &mut *err,
        };
        let printer = async {
            while let Some(event) = events.recv().await {
                writeln!(sink, "{}", render::format_event(&event))?;
            }
            Ok::<_, io::Error>(())
        };
        let (result, printed) = tokio::join!(orchestrator.run(), printer);
        printed?;
        result
    };

    match (result, format) {
        (Ok(summary), OutputFormat::Text) => {
            write!(out, "{}", render::format_summary(&summary))?;
            out.flush()?;
            Ok(EXIT_SUCCESS)
        }
        (Ok(summary), OutputFormat::Json) => {
            serde_json::to_writer_pretty(&mut *out, &summary)?;
            writeln!(out)?;
            out.flush()?;
            Ok(EXIT_SUCCESS)
        }
        (Err(run_err), OutputFormat::Text) => {
            write!(out, "{}", render::format_failure(&run_err))?;
            out.flush()?;
            writeln!(err, "error: {run_err}")?;
            Ok(EXIT_FAILURE)
        }
        (Err(run_err), OutputFormat::Json) => {
            let doc = serde_json::json!({
                "error": run_err.to_string(),
                "phase": run_err.phase,
                "item": run_err.item,
                "partial": run_err.partial,
            });
            serde_json::to_writer_pretty(&mut *out, &doc)?;
            writeln!(out)?;
            out.flush()?;
            writeln!(err, "error: {run_err}")?;
            Ok(EXIT_FAILURE)
        }
    }
}

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use ide_hover::config::HoverConfig;
use ide_hover::replay::{run_script, Script};

#[derive(Parser)]
#[command(name = "ide-hover", about = "Replay a scripted hover session and print what the popup did.")]
struct Cli {
    /// Session script (YAML)
    script: PathBuf,

    /// Config file (defaults to ~/.ide-hover and ./.ide-hover layering)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ide_hover=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => HoverConfig::load_from(path)?,
        None => HoverConfig::load(),
    };
    let script = Script::load(&cli.script)?;

    info!(
        script = %cli.script.display(),
        events = script.events.len(),
        providers = script.providers.len(),
        "replaying"
    );
    let transcript = run_script(&script, &config).await?;
    for entry in &transcript {
        info!("{:>6}ms {:?}", entry.at.as_millis(), entry.call);
    }
    info!(calls = transcript.len(), "replay finished");

    Ok(())
}

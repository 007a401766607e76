//! Livia CLI binary entry point.

use clap::Parser;
use livia::cli::{repl, Cli};
use livia::config::ChatConfig;
use livia::session::ChatSession;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = ChatConfig::load(cli.config.as_deref())?;
    if let Some(model) = cli.model {
        config.model = model;
    }
    if let Some(system) = cli.system {
        config.system_prompt = system;
    }

    let mut session = ChatSession::from_config(&config)?;
    if let Some(t) = cli.temperature {
        session = session.with_temperature(t);
    }

    match cli.prompt {
        Some(prompt) => repl::send_once(&session, prompt, cli.buffered).await?,
        None => repl::run(&session, cli.buffered).await?,
    }

    Ok(())
}

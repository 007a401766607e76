//! CLI entry point for Livia.

pub mod repl;

use std::path::PathBuf;

use clap::Parser;

/// Livia astronomy assistant CLI
#[derive(Parser, Debug)]
#[command(name = "livia", version, about = "Livia — chat with the astronomy assistant")]
pub struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Model to use (overrides config)
    #[arg(short, long)]
    pub model: Option<String>,

    /// System prompt (overrides config)
    #[arg(short, long)]
    pub system: Option<String>,

    /// Temperature (0.0 - 2.0)
    #[arg(short, long)]
    pub temperature: Option<f64>,

    /// Wait for whole replies instead of streaming
    #[arg(long)]
    pub buffered: bool,

    /// Send one prompt and exit; omit for an interactive session
    pub prompt: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_with_defaults() {
        let cli = Cli::try_parse_from(["livia"]).unwrap();
        assert!(cli.config.is_none());
        assert!(cli.model.is_none());
        assert!(cli.system.is_none());
        assert!(cli.temperature.is_none());
        assert!(!cli.buffered);
        assert!(cli.prompt.is_none());
    }

    #[test]
    fn parse_with_all_options() {
        let cli = Cli::try_parse_from([
            "livia",
            "-c",
            "/tmp/livia.toml",
            "-m",
            "gpt-4o-mini",
            "-s",
            "You are terse",
            "-t",
            "0.7",
            "--buffered",
            "What is a pulsar?",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/livia.toml")));
        assert_eq!(cli.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(cli.system.as_deref(), Some("You are terse"));
        assert!((cli.temperature.unwrap() - 0.7).abs() < f64::EPSILON);
        assert!(cli.buffered);
        assert_eq!(cli.prompt.as_deref(), Some("What is a pulsar?"));
    }

    #[test]
    fn parse_bad_temperature_is_error() {
        assert!(Cli::try_parse_from(["livia", "-t", "warm"]).is_err());
    }
}

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "wfd")]
#[command(about = "WasteFleetDesk CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Config utilities
    Config {
        #[command(subcommand)]
        cmd: ConfigCmd,
    },

    /// Feed a JSONL event stream through a deterministic engine and print a
    /// summary. Async completions are modeled as explicitly ordered events,
    /// so interleavings replay exactly.
    Replay {
        /// Path to the JSONL event file
        #[arg(long)]
        events: String,

        /// Layered config paths in merge order
        #[arg(long = "config")]
        config_paths: Vec<String>,

        /// Optional JSONL audit output path
        #[arg(long)]
        audit_out: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConfigCmd {
    /// Merge layered config, validate, print canonical JSON + hash
    Hash {
        /// Paths in merge order (base -> site -> operator overrides)
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.cmd {
        Commands::Config {
            cmd: ConfigCmd::Hash { paths },
        } => commands::config::hash(&paths),
        Commands::Replay {
            events,
            config_paths,
            audit_out,
        } => commands::replay::run(&events, &config_paths, audit_out.as_deref()),
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();
}

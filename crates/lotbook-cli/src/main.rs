mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "lotbook")]
#[command(about = "Lot-based cost basis and realized gains over a journal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute config hash from layered YAML files (base -> overrides).
    ConfigHash {
        /// Paths in merge order
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Load a journal, assign every trade to lots and book realized gains.
    Replay {
        /// Journal file (.json, .yaml or .yml)
        #[arg(long)]
        journal: String,

        /// Layered config paths in merge order (repeatable)
        #[arg(long = "config")]
        config_paths: Vec<String>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Exit nonzero when any split's gains could not be computed
        #[arg(long, default_value_t = false)]
        strict: bool,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    // Dev-time overrides; a missing file is fine.
    dotenvy::from_filename(".env.local").ok();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            commands::init_tracing(None);
            let loaded = lotbook_config::load_layered_yaml(&paths)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Replay {
            journal,
            config_paths,
            format,
            strict,
        } => {
            commands::replay::run(&journal, &config_paths, format, strict)?;
        }
    }

    Ok(())
}

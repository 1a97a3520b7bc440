//! # Worker Scripts CLI (`wss`)
//!
//! Runs the configured policies over items and manages the annotation
//! database that backs digest tagging.
//!
//! ## Usage
//!
//! ```bash
//! wss --config ./config/wss.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `wss init` | Create the annotation database |
//! | `wss policies` | List configured policies in execution order |
//! | `wss annotate <digest> <tag>...` | Store tags for a content digest |
//! | `wss tags <digest>` | Show tags stored for a digest |
//! | `wss run <manifest.json>` | Process items from a JSON manifest |
//! | `wss scan <dir>` | Process every file under a directory |
//!
//! Outcomes are printed to stdout as JSON lines. Logs go to stderr and are
//! filtered with `RUST_LOG`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use worker_scripts::{commands, config, run};

/// Per-item classification and mutation policies for processing workers.
#[derive(Parser)]
#[command(name = "wss", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/wss.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the annotation database schema. Safe to run repeatedly.
    Init,

    /// List configured policies in execution order.
    Policies,

    /// Store one or more tags for a content digest.
    Annotate {
        /// Digest value, matched exactly.
        digest: String,

        /// Tags to add.
        #[arg(required = true)]
        tags: Vec<String>,
    },

    /// Show tags stored for a digest.
    Tags {
        digest: String,
    },

    /// Process items listed in a JSON manifest (an array of items).
    Run {
        manifest: PathBuf,

        /// Also process child files registered by policies.
        #[arg(long)]
        follow_children: bool,
    },

    /// Process every file under a directory as a top-level item.
    Scan {
        root: PathBuf,

        /// Also process child files registered by policies.
        #[arg(long)]
        follow_children: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => commands::init(&cfg).await?,
        Commands::Policies => commands::list_policies(&cfg).await?,
        Commands::Annotate { digest, tags } => commands::annotate(&cfg, &digest, &tags).await?,
        Commands::Tags { digest } => commands::show_tags(&cfg, &digest).await?,
        Commands::Run {
            manifest,
            follow_children,
        } => run::run_manifest(&cfg, &manifest, follow_children).await?,
        Commands::Scan {
            root,
            follow_children,
        } => run::run_scan(&cfg, &root, follow_children).await?,
    }

    Ok(())
}

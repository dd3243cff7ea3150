//! # repochat CLI
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `repochat index [ROOT]` | Embed every eligible file under ROOT into the index |
//! | `repochat ask` | Interactive question loop over the index |
//! | `repochat ask "<question>"` | Answer one question and exit |
//! | `repochat status` | Show what is indexed |
//!
//! ## Examples
//!
//! ```bash
//! # Rebuild the index from the current directory
//! repochat index
//!
//! # Add changed files only, keeping the rest
//! repochat index ./app --append
//!
//! # See what would be sent without calling any API
//! repochat index --dry-run
//!
//! # Use a custom config and no colour
//! repochat --config ./config/repochat.toml --no-color ask
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use repochat::{config, ingest, query, status};

/// repochat: ask questions about a codebase.
///
/// Credentials are read from `VOYAGE_API_KEY` and `OPENAI_API_KEY`, either
/// in the environment or in a `.env` file in the working directory.
#[derive(Parser)]
#[command(name = "repochat", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/repochat.toml` when it exists, otherwise
    /// built-in defaults are used.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print responses without ANSI colour (also honoured via `NO_COLOR`).
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index source files into the vector table.
    ///
    /// By default the table is dropped and rebuilt on every run.
    Index {
        /// Directory to scan (defaults to `ingest.root`).
        root: Option<PathBuf>,

        /// Scan and count tokens without calling the embedding API.
        #[arg(long)]
        dry_run: bool,

        /// Maximum number of files to process.
        #[arg(long)]
        limit: Option<usize>,

        /// Keep existing records and skip files whose content is unchanged.
        #[arg(long)]
        append: bool,
    },

    /// Ask questions about the indexed code.
    ///
    /// Without a question, starts an interactive prompt; type `exit` or
    /// press Ctrl-D or Ctrl-C to leave.
    Ask {
        /// Question to answer once, non-interactively.
        question: Vec<String>,
    },

    /// Show index statistics.
    Status,
}

fn init_tracing(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let color = !cli.no_color && std::env::var_os("NO_COLOR").is_none();
    if !color {
        colored::control::set_override(false);
    }

    let cfg = config::resolve_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Index {
            root,
            dry_run,
            limit,
            append,
        } => ingest::run_index(&cfg, root, dry_run, limit, append).await,
        Commands::Ask { question } => {
            let question = (!question.is_empty()).then(|| question.join(" "));
            query::run_ask(&cfg, question, color).await
        }
        Commands::Status => status::run_status(&cfg).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(match cli.command {
        Commands::Index { .. } | Commands::Status => "repochat=info",
        Commands::Ask { .. } => "repochat=warn",
    });

    let code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("error: {:#}", e);
            1
        }
    };
    // Exit here rather than returning: the stdin reader thread of an
    // interrupted prompt would otherwise hold up runtime shutdown.
    std::process::exit(code);
}

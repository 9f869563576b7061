//! Ghost: preview containers for cloned site repositories.
//!
//! # Usage
//!
//! ```text
//! ghost serve [--bind ADDR] [--clone-dir DIR] [--engine BIN] [--engine-timeout-secs N] [--memory LIMIT]
//! ghost sites
//! ghost start <project>
//! ghost stop <project>
//! ghost stop-all
//! ghost status <project>
//! ghost logs <project>
//! ghost stats [--json]
//! ghost clone <repo_url>
//! ```
//!
//! Every command except `serve` talks to a running server (`--url`, `GHOST_URL`).

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{client::ApiClient, serve::ServeArgs, stats::StatsArgs};

pub const DEFAULT_URL: &str = "http://127.0.0.1:8000";

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "ghost",
    version,
    about = "Run disposable preview containers for cloned site repositories",
    long_about = None,
)]
struct Cli {
    /// Base URL of the ghost server.
    #[arg(long, global = true, env = "GHOST_URL", default_value = DEFAULT_URL)]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server in the foreground.
    Serve(ServeArgs),

    /// List sites with their clone and preview state.
    Sites,

    /// Start (or restart) the preview for a cloned project.
    Start { project: String },

    /// Stop the preview for a project.
    Stop { project: String },

    /// Stop every running preview.
    StopAll,

    /// Show whether a project's preview is running, and on which port.
    Status { project: String },

    /// Print the last lines of a preview's output.
    Logs { project: String },

    /// Resource usage of running previews.
    Stats(StatsArgs),

    /// Clone a repository into the clone directory.
    Clone { repo_url: String },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = || ApiClient::new(&cli.url);
    match cli.command {
        Commands::Serve(ref args) => args.run(),
        Commands::Sites => commands::sites::run(&client()),
        Commands::Start { ref project } => commands::preview::start(&client(), project),
        Commands::Stop { ref project } => commands::preview::stop(&client(), project),
        Commands::StopAll => commands::preview::stop_all(&client()),
        Commands::Status { ref project } => commands::preview::status(&client(), project),
        Commands::Logs { ref project } => commands::preview::logs(&client(), project),
        Commands::Stats(ref args) => args.run(&client()),
        Commands::Clone { ref repo_url } => commands::preview::clone(&client(), repo_url),
    }
}

//! `ghost serve`: run the HTTP server in the foreground.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use ghost_daemon::{start_blocking, ServerConfig};

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on.
    #[arg(long, env = "GHOST_BIND", default_value = ghost_daemon::paths::DEFAULT_BIND)]
    pub bind: SocketAddr,

    /// Directory holding one working copy per project [default: ~/.ghost/clones].
    #[arg(long, env = "GHOST_CLONE_DIR")]
    pub clone_dir: Option<PathBuf>,

    /// Podman-compatible engine binary.
    #[arg(long, env = "GHOST_ENGINE", default_value = ghost_daemon::paths::DEFAULT_ENGINE)]
    pub engine: String,

    /// Upper bound for a single engine command.
    #[arg(long, env = "GHOST_ENGINE_TIMEOUT_SECS", default_value_t = 60)]
    pub engine_timeout_secs: u64,

    /// Memory ceiling per preview container (also the memory+swap ceiling).
    #[arg(long, env = "GHOST_MEMORY", default_value = "4g")]
    pub memory: String,
}

impl ServeArgs {
    pub fn config(&self) -> Result<ServerConfig> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        let mut config = ServerConfig::new(home);
        config.bind = self.bind;
        if let Some(dir) = &self.clone_dir {
            config.clone_dir = dir.clone();
        }
        config.engine_binary = self.engine.clone();
        config.engine_timeout = Duration::from_secs(self.engine_timeout_secs);
        config.memory_limit = self.memory.clone();
        Ok(config)
    }

    pub fn run(&self) -> Result<()> {
        let config = self.config()?;
        start_blocking(config).context("ghost server exited with error")
    }
}

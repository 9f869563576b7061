use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use ghost_core::ProjectName;
use ghost_engine::{ContainerEngine, PodmanEngine};
use ghost_lifecycle::{Orchestrator, OrchestratorConfig, DEFAULT_MEMORY_LIMIT};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::api::{router, AppState};
use crate::error::{io_err, DaemonError};
use crate::git::GitCli;
use crate::mail::SmtpMailer;
use crate::paths::{clones_dir, DEFAULT_BIND, DEFAULT_ENGINE, DEFAULT_ENGINE_TIMEOUT};
use crate::sites::NetlifyCli;
use crate::store::FileSettingsStore;

/// Everything `serve` needs to come up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Home directory holding `.ghost/`.
    pub home: PathBuf,
    pub clone_dir: PathBuf,
    pub engine_binary: String,
    pub engine_timeout: Duration,
    pub memory_limit: String,
}

impl ServerConfig {
    /// Defaults rooted at `home`.
    pub fn new(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        Self {
            bind: DEFAULT_BIND
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 8000))),
            clone_dir: clones_dir(&home),
            home,
            engine_binary: DEFAULT_ENGINE.to_string(),
            engine_timeout: DEFAULT_ENGINE_TIMEOUT,
            memory_limit: DEFAULT_MEMORY_LIMIT.to_string(),
        }
    }
}

/// Start the server and block the current thread until it exits.
pub fn start_blocking(config: ServerConfig) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(config))
}

/// Run the server with the Podman engine and the CLI-backed collaborators
/// until ctrl-c.
pub async fn run(config: ServerConfig) -> Result<(), DaemonError> {
    fs::create_dir_all(&config.clone_dir).map_err(|e| io_err(&config.clone_dir, e))?;

    let engine: Arc<dyn ContainerEngine> = Arc::new(PodmanEngine::new(
        config.engine_binary.clone(),
        config.engine_timeout,
    ));
    let orchestrator = Arc::new(Orchestrator::new(
        engine,
        OrchestratorConfig::new(&config.clone_dir).with_memory_limit(&config.memory_limit),
    ));

    let projects = cloned_projects(&config.clone_dir)?;
    match orchestrator.reconcile(&projects).await {
        Ok(report) => tracing::info!(
            cloned = projects.len(),
            adopted = report.adopted.len(),
            pruned = report.pruned.len(),
            "startup reconcile complete",
        ),
        Err(err) => tracing::warn!(error = %err, "startup reconcile skipped"),
    }

    let state = AppState {
        orchestrator,
        sites: Arc::new(NetlifyCli::default()),
        source: Arc::new(GitCli::default()),
        mailer: Arc::new(SmtpMailer),
        settings: Arc::new(FileSettingsStore::new(&config.home)),
    };

    let listener = TcpListener::bind(config.bind)
        .await
        .map_err(|source| DaemonError::Bind {
            addr: config.bind,
            source,
        })?;
    tracing::info!(
        addr = %config.bind,
        clone_dir = %config.clone_dir.display(),
        engine = %config.engine_binary,
        "ghost server listening",
    );

    serve(listener, router(state)).await
}

/// Serve `app` on `listener` until ctrl-c or a task failure.
pub async fn serve(listener: TcpListener, app: Router) -> Result<(), DaemonError> {
    let (shutdown_tx, _) = broadcast::channel::<()>(4);

    let server_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                })
                .await
                .map_err(|err| DaemonError::Server(err.to_string()));
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down server");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Server(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (server_result, signal_result) = tokio::join!(server_handle, signal_handle);
    handle_join("http_server", server_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

/// Directories under `clone_dir` whose names are valid project names.
pub fn cloned_projects(clone_dir: &Path) -> Result<Vec<ProjectName>, DaemonError> {
    let entries = match fs::read_dir(clone_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(io_err(clone_dir, err)),
    };

    let mut projects = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_err(clone_dir, e))?;
        if !entry.path().is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        match ProjectName::new(name) {
            Ok(project) => projects.push(project),
            Err(err) => tracing::debug!(error = %err, "skipping clone directory"),
        }
    }
    projects.sort();
    Ok(projects)
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Server(format!("{task} task join failure: {err}"))),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

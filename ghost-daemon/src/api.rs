//! HTTP surface for the dashboard. Every route lives under `/api`.
//!
//! Failures are answered as `{"detail": "<message>"}` with a status derived
//! from the error kind (see [`ApiError`]).

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use ghost_core::{CoreError, ProjectName, ProjectStatus, Settings, SmtpSettings};
use ghost_lifecycle::{LifecycleError, Orchestrator};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::error::{io_err, DaemonError};
use crate::git::{repo_name_from_url, CloneStatus, SourceControl};
use crate::mail::{Mailer, OutgoingEmail};
use crate::sites::{Site, SiteDirectory};
use crate::store::SettingsStore;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub sites: Arc<dyn SiteDirectory>,
    pub source: Arc<dyn SourceControl>,
    pub mailer: Arc<dyn Mailer>,
    pub settings: Arc<dyn SettingsStore>,
}

/// Build the router, with permissive CORS for the browser dashboard.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .route("/sites", get(list_sites))
        .route("/sites/{site_id}/contacts", post(set_contacts))
        .route("/ghost/start/{project}", post(start))
        .route("/ghost/stop/{project}", post(stop))
        .route("/ghost/stop-all", post(stop_all))
        .route("/ghost/status/{project}", get(status))
        .route("/ghost/logs/{project}", get(logs))
        .route("/ghost/stats", get(stats))
        .route("/clone", post(clone_repo))
        .route("/config/smtp", post(set_smtp))
        .route("/email/send", post(send_email));

    Router::new()
        .nest("/api", api)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// 1. Error mapping
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, detail = %self.detail, "request failed");
        } else {
            tracing::debug!(status = %self.status, detail = %self.detail, "request rejected");
        }
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        let status = match &err {
            LifecycleError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            LifecycleError::NotFound { .. } => StatusCode::NOT_FOUND,
            LifecycleError::Configuration(_) | LifecycleError::InvalidProject { .. } => {
                StatusCode::BAD_REQUEST
            }
            LifecycleError::EngineTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            LifecycleError::EngineOperationFailed { .. }
            | LifecycleError::Engine(_)
            | LifecycleError::Detect(_)
            | LifecycleError::Core(_)
            | LifecycleError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError::new(status, err.to_string())
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        LifecycleError::from(err).into()
    }
}

impl From<DaemonError> for ApiError {
    fn from(err: DaemonError) -> Self {
        match err {
            DaemonError::Lifecycle(inner) => inner.into(),
            DaemonError::Core(inner) => inner.into(),
            DaemonError::Configuration(detail) => ApiError::new(StatusCode::BAD_REQUEST, detail),
            other => ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::new(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::new(rejection.status(), rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::new(rejection.status(), rejection.body_text())
    }
}

/// [`Json`] body whose rejection is answered as `{detail}`.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
struct ApiJson<T>(T);

/// [`Query`] whose rejection is answered as `{detail}`.
#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
struct ApiQuery<T>(T);

/// [`Path`] whose rejection is answered as `{detail}`.
#[derive(FromRequestParts)]
#[from_request(via(Path), rejection(ApiError))]
struct ApiPath<T>(T);

fn project_name(raw: &str) -> Result<ProjectName, ApiError> {
    Ok(ProjectName::new(raw)?)
}

/// Run a settings file operation on the blocking pool.
async fn with_settings<T, F>(store: &Arc<dyn SettingsStore>, op: F) -> Result<T, ApiError>
where
    F: FnOnce(&dyn SettingsStore) -> Result<T, CoreError> + Send + 'static,
    T: Send + 'static,
{
    let store = Arc::clone(store);
    let result = tokio::task::spawn_blocking(move || op(store.as_ref()))
        .await
        .map_err(|err| DaemonError::Server(format!("settings task failed: {err}")))?;
    Ok(result?)
}

// ---------------------------------------------------------------------------
// 2. Sites and settings
// ---------------------------------------------------------------------------

/// One dashboard row: site metadata plus local clone and preview state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SiteView {
    pub id: String,
    pub name: String,
    pub url: Option<String>,
    pub ssl_url: Option<String>,
    pub admin_url: Option<String>,
    pub deploy_url: Option<String>,
    pub repo: Option<String>,
    pub is_cloned: bool,
    pub repo_path: Option<String>,
    pub is_running: bool,
    pub port: Option<u16>,
    pub contacts: Vec<String>,
}

async fn health() -> &'static str {
    "ok"
}

async fn list_sites(State(state): State<AppState>) -> Result<Json<Vec<SiteView>>, ApiError> {
    let sites = state.sites.list_sites().await?;
    let settings = with_settings(&state.settings, |store| store.load()).await?;

    let mut views = Vec::with_capacity(sites.len());
    for site in sites {
        views.push(site_view(&state.orchestrator, &settings, site).await);
    }
    Ok(Json(views))
}

async fn site_view(orchestrator: &Orchestrator, settings: &Settings, site: Site) -> SiteView {
    let contacts = settings.contacts_for(&site.id);
    let project = site
        .repo_url
        .as_deref()
        .and_then(repo_name_from_url)
        .and_then(|name| ProjectName::new(name).ok());

    let (is_cloned, repo_path, is_running, port) = match &project {
        Some(project) => {
            let (running, port) = match orchestrator.status(project).await {
                Ok(status) => (status.running, status.port),
                Err(err) => {
                    tracing::warn!(project = %project, error = %err, "status lookup failed; reporting not running");
                    (false, None)
                }
            };
            (
                orchestrator.is_cloned(project),
                Some(orchestrator.project_dir(project).display().to_string()),
                running,
                port,
            )
        }
        None => (false, None, false, None),
    };

    SiteView {
        id: site.id,
        name: site.name,
        url: site.url,
        ssl_url: site.ssl_url,
        admin_url: site.admin_url,
        deploy_url: site.deploy_url,
        repo: site.repo_url,
        is_cloned,
        repo_path,
        is_running,
        port,
        contacts,
    }
}

async fn set_contacts(
    State(state): State<AppState>,
    ApiPath(site_id): ApiPath<String>,
    ApiJson(contacts): ApiJson<Vec<String>>,
) -> Result<Json<Value>, ApiError> {
    let count = contacts.len();
    let site = site_id.clone();
    with_settings(&state.settings, move |store| {
        store.update(&mut |s| {
            s.site_contacts.insert(site.clone(), contacts.clone());
        })
    })
    .await?;
    tracing::info!(site = %site_id, contacts = count, "site contacts updated");
    Ok(Json(json!({ "status": "Contacts Updated" })))
}

async fn set_smtp(
    State(state): State<AppState>,
    ApiJson(smtp): ApiJson<SmtpSettings>,
) -> Result<Json<Value>, ApiError> {
    let (server, port) = (smtp.server.clone(), smtp.port);
    with_settings(&state.settings, move |store| {
        store.update(&mut |s| s.smtp = Some(smtp.clone()))
    })
    .await?;
    tracing::info!(server = %server, port, "smtp settings saved");
    Ok(Json(json!({ "status": "Config Saved" })))
}

#[derive(Debug, Deserialize)]
struct EmailParams {
    to_email: String,
    subject: String,
    body: String,
}

async fn send_email(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<EmailParams>,
) -> Result<Json<Value>, ApiError> {
    let smtp = with_settings(&state.settings, |store| store.load())
        .await?
        .smtp
        .ok_or_else(|| DaemonError::Configuration("SMTP not configured".to_string()))?;
    let email = OutgoingEmail {
        to: params.to_email,
        subject: params.subject,
        body: params.body,
    };
    state.mailer.send(&smtp, &email).await?;
    Ok(Json(json!({ "status": "Email Sent" })))
}

// ---------------------------------------------------------------------------
// 3. Preview lifecycle
// ---------------------------------------------------------------------------

async fn start(
    State(state): State<AppState>,
    ApiPath(project): ApiPath<String>,
) -> Result<Json<Value>, ApiError> {
    let project = project_name(&project)?;
    let port = state.orchestrator.start(&project).await?;
    Ok(Json(json!({ "status": "started", "port": port })))
}

async fn stop(
    State(state): State<AppState>,
    ApiPath(project): ApiPath<String>,
) -> Result<Json<Value>, ApiError> {
    let project = project_name(&project)?;
    state.orchestrator.stop(&project).await?;
    Ok(Json(json!({ "status": "stopped" })))
}

async fn stop_all(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let count = state.orchestrator.stop_all().await?;
    Ok(Json(json!({ "status": "stopped", "count": count })))
}

async fn status(
    State(state): State<AppState>,
    ApiPath(project): ApiPath<String>,
) -> Result<Json<ProjectStatus>, ApiError> {
    let project = project_name(&project)?;
    Ok(Json(state.orchestrator.status(&project).await?))
}

async fn logs(
    State(state): State<AppState>,
    ApiPath(project): ApiPath<String>,
) -> Result<Json<Value>, ApiError> {
    let project = project_name(&project)?;
    let logs = state.orchestrator.logs(&project).await?;
    Ok(Json(json!({ "logs": logs })))
}

async fn stats(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let containers = state.orchestrator.stats().await?;
    Ok(Json(json!({ "count": containers.len(), "containers": containers })))
}

// ---------------------------------------------------------------------------
// 4. Clone
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CloneParams {
    repo_url: String,
}

async fn clone_repo(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<CloneParams>,
) -> Result<Json<Value>, ApiError> {
    let name = repo_name_from_url(&params.repo_url).ok_or_else(|| {
        ApiError::new(
            StatusCode::BAD_REQUEST,
            format!("cannot derive a repository name from '{}'", params.repo_url),
        )
    })?;
    let project = project_name(&name)?;
    let orchestrator = &state.orchestrator;

    let target = orchestrator.project_dir(&project);
    if orchestrator.is_cloned(&project) {
        return Ok(Json(json!({ "status": CloneStatus::Exists, "project": project })));
    }
    std::fs::create_dir_all(orchestrator.clone_dir())
        .map_err(|e| io_err(orchestrator.clone_dir(), e))?;

    let status = match state.source.clone_repo(&params.repo_url, &target).await {
        Ok(()) => {
            tracing::info!(project = %project, url = %params.repo_url, "repository cloned");
            CloneStatus::Success
        }
        Err(err) => {
            tracing::warn!(project = %project, url = %params.repo_url, error = %err, "clone failed");
            CloneStatus::Error
        }
    };
    Ok(Json(json!({ "status": status, "project": project })))
}

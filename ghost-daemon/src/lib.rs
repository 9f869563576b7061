//! Ghost server: HTTP API over the lifecycle orchestrator, the external
//! collaborators it needs (site listing, git, mail, settings), and the
//! runtime that wires them together.

pub mod api;
mod error;
pub mod git;
pub mod mail;
pub mod paths;
mod runtime;
pub mod sites;
pub mod store;

pub use api::{router, ApiError, AppState, SiteView};
pub use error::DaemonError;
pub use git::{repo_name_from_url, CloneStatus, GitCli, SourceControl};
pub use mail::{Mailer, OutgoingEmail, SmtpMailer};
pub use runtime::{cloned_projects, run, serve, start_blocking, ServerConfig};
pub use sites::{NetlifyCli, Site, SiteDirectory};
pub use store::{FileSettingsStore, SettingsStore};

//! Runtime detection for `ghost-detector`.
//!
//! `detect_profile(path)` inspects indicator files in a project working copy
//! and returns the image and command used to serve it. Checks are ordered by
//! specificity; the static file server is the fallback for everything else.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use ghost_core::CONTAINER_PORT;
use serde::Serialize;
use thiserror::Error;

/// Image used for projects with a `package.json`.
pub const NODE_IMAGE: &str = "node:slim";

/// Image used for everything else.
pub const STATIC_IMAGE: &str = "python:3.9-slim";

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// How a project is served inside its container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    /// `npm install` then the project's dev server.
    Node,
    /// Plain file server over the working copy.
    Static,
}

impl fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeKind::Node => write!(f, "node"),
            RuntimeKind::Static => write!(f, "static"),
        }
    }
}

/// Image and command for a project's container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchProfile {
    pub kind: RuntimeKind,
    pub image: String,
    /// Command and arguments appended after the image.
    pub command: Vec<String>,
    /// Framework found in the manifest, if any. Informational only.
    pub framework: Option<String>,
}

impl LaunchProfile {
    /// Install dependencies, then start the dev server on all interfaces.
    pub fn node(framework: Option<String>) -> Self {
        Self {
            kind: RuntimeKind::Node,
            image: NODE_IMAGE.to_string(),
            command: vec![
                "sh".to_string(),
                "-c".to_string(),
                format!("npm install && npm run dev -- --host 0.0.0.0 --port {CONTAINER_PORT}"),
            ],
            framework,
        }
    }

    /// Serve the working copy as static files.
    pub fn static_files() -> Self {
        Self {
            kind: RuntimeKind::Static,
            image: STATIC_IMAGE.to_string(),
            command: vec![
                "python".to_string(),
                "-m".to_string(),
                "http.server".to_string(),
                CONTAINER_PORT.to_string(),
            ],
            framework: None,
        }
    }
}

/// Errors from runtime detection.
#[derive(Debug, Error)]
pub enum DetectError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("project directory '{path}' does not exist")]
    MissingDirectory { path: PathBuf },
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Pick the launch profile for the working copy at `path`.
pub fn detect_profile(path: &Path) -> Result<LaunchProfile, DetectError> {
    if !path.is_dir() {
        return Err(DetectError::MissingDirectory {
            path: path.to_path_buf(),
        });
    }
    if let Some(p) = detect_node(path)? {
        return Ok(p);
    }
    Ok(LaunchProfile::static_files())
}

// ---------------------------------------------------------------------------
// Detectors
// ---------------------------------------------------------------------------

fn detect_node(path: &Path) -> Result<Option<LaunchProfile>, DetectError> {
    let file = path.join("package.json");
    if !file.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&file).map_err(|source| DetectError::Io {
        path: file.clone(),
        source,
    })?;

    // A manifest that fails to parse still marks a Node project; npm reports
    // the syntax error in the container logs.
    let framework = serde_json::from_str::<serde_json::Value>(&content)
        .ok()
        .and_then(|json| node_framework(&collect_package_json_deps(&json)));

    Ok(Some(LaunchProfile::node(framework.map(str::to_string))))
}

fn node_framework(deps: &HashSet<String>) -> Option<&'static str> {
    // Most specific first: meta-frameworks before the libraries they wrap.
    if deps.contains("next") {
        Some("Next.js")
    } else if deps.contains("nuxt") || deps.contains("nuxt3") {
        Some("Nuxt")
    } else if deps.contains("astro") {
        Some("Astro")
    } else if deps.contains("gatsby") {
        Some("Gatsby")
    } else if deps.contains("@sveltejs/kit") {
        Some("SvelteKit")
    } else if deps.contains("vite") {
        Some("Vite")
    } else if deps.contains("react-scripts") {
        Some("Create React App")
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Utilities
// ---------------------------------------------------------------------------

fn collect_package_json_deps(json: &serde_json::Value) -> HashSet<String> {
    let mut deps = HashSet::new();
    for key in &["dependencies", "devDependencies", "peerDependencies"] {
        if let Some(obj) = json.get(key).and_then(|v| v.as_object()) {
            for k in obj.keys() {
                deps.insert(k.clone());
            }
        }
    }
    deps
}

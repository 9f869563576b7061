//! Blocking JSON client for the ghost server.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use ghost_core::ProjectName;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Long enough for a cold `podman run` that pulls an image.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

pub struct ApiClient {
    base: String,
    agent: ureq::Agent,
}

impl ApiClient {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new().timeout(REQUEST_TIMEOUT).build(),
        }
    }

    pub fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        self.finish(&url, self.agent.get(&url).call())
    }

    pub fn post<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = self.url(path);
        let mut request = self.agent.post(&url);
        for (key, value) in query {
            request = request.query(key, value);
        }
        self.finish(&url, request.call())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api{path}", self.base)
    }

    fn finish<T: DeserializeOwned>(
        &self,
        url: &str,
        result: Result<ureq::Response, ureq::Error>,
    ) -> Result<T> {
        match result {
            Ok(response) => response
                .into_json()
                .with_context(|| format!("invalid JSON from {url}")),
            Err(ureq::Error::Status(code, response)) => {
                let body: Value = response.into_json().unwrap_or(Value::Null);
                let detail = body
                    .get("detail")
                    .and_then(Value::as_str)
                    .unwrap_or("no detail")
                    .to_string();
                Err(anyhow!("server returned {code}: {detail}"))
            }
            Err(ureq::Error::Transport(err)) => Err(anyhow!(
                "cannot reach ghost server at {}: {err} (is `ghost serve` running?)",
                self.base
            )),
        }
    }
}

/// Validate a project argument before it is put into a URL path.
pub fn project_arg(raw: &str) -> Result<ProjectName> {
    ProjectName::new(raw).with_context(|| format!("'{raw}' is not a usable project name"))
}

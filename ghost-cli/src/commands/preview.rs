//! `ghost start|stop|stop-all|status|logs|clone`.

use anyhow::{Context, Result};
use colored::Colorize;
use ghost_core::{InstanceState, ProjectStatus};
use serde::Deserialize;
use serde_json::Value;

use super::client::{project_arg, ApiClient};

#[derive(Deserialize)]
struct Started {
    port: u16,
}

#[derive(Deserialize)]
struct StoppedAll {
    count: usize,
}

#[derive(Deserialize)]
struct Logs {
    logs: String,
}

#[derive(Deserialize)]
struct Cloned {
    status: String,
    project: Option<String>,
}

pub fn start(client: &ApiClient, project: &str) -> Result<()> {
    let project = project_arg(project)?;
    let started: Started = client
        .post(&format!("/ghost/start/{project}"), &[])
        .with_context(|| format!("failed to start '{project}'"))?;
    println!(
        "{} {project} running at {}",
        "●".green().bold(),
        format!("http://localhost:{}", started.port).underline()
    );
    Ok(())
}

pub fn stop(client: &ApiClient, project: &str) -> Result<()> {
    let project = project_arg(project)?;
    let _: Value = client
        .post(&format!("/ghost/stop/{project}"), &[])
        .with_context(|| format!("failed to stop '{project}'"))?;
    println!("{} {project} stopped", "■".bright_black().bold());
    Ok(())
}

pub fn stop_all(client: &ApiClient) -> Result<()> {
    let stopped: StoppedAll = client
        .post("/ghost/stop-all", &[])
        .context("failed to stop previews")?;
    let noun = if stopped.count == 1 { "preview" } else { "previews" };
    println!("stopped {} {noun}", stopped.count);
    Ok(())
}

pub fn status(client: &ApiClient, project: &str) -> Result<()> {
    let project = project_arg(project)?;
    let status: ProjectStatus = client
        .get(&format!("/ghost/status/{project}"))
        .with_context(|| format!("failed to query '{project}'"))?;

    let port = status
        .port
        .map(|p| format!("http://localhost:{p}"))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{} {}  {}  container {}  {port}",
        state_indicator(status.state),
        status.project.to_string().bold(),
        status.state,
        status.container,
    );
    Ok(())
}

pub fn logs(client: &ApiClient, project: &str) -> Result<()> {
    let project = project_arg(project)?;
    let logs: Logs = client
        .get(&format!("/ghost/logs/{project}"))
        .with_context(|| format!("failed to fetch logs for '{project}'"))?;
    if logs.logs.is_empty() {
        println!("no output for {project} (is it running?)");
    } else {
        print!("{}", logs.logs);
    }
    Ok(())
}

pub fn clone(client: &ApiClient, repo_url: &str) -> Result<()> {
    let cloned: Cloned = client
        .post("/clone", &[("repo_url", repo_url)])
        .with_context(|| format!("failed to clone {repo_url}"))?;
    let project = cloned.project.unwrap_or_else(|| repo_url.to_string());
    match cloned.status.as_str() {
        "success" => println!("{} cloned {project}", "✔".green().bold()),
        "exists" => println!("{} {project} is already cloned", "●".yellow().bold()),
        _ => anyhow::bail!("git clone of {repo_url} failed; see server log"),
    }
    Ok(())
}

pub(crate) fn state_indicator(state: InstanceState) -> String {
    match state {
        InstanceState::Running => "●".green().bold().to_string(),
        InstanceState::Starting | InstanceState::Stopping => "●".yellow().bold().to_string(),
        InstanceState::Absent => "■".bright_black().bold().to_string(),
    }
}

//! `ghost sites`: dashboard listing in the terminal.

use anyhow::{Context, Result};
use colored::Colorize;
use ghost_daemon::SiteView;
use tabled::{settings::Style, Table, Tabled};

use super::client::ApiClient;

#[derive(Tabled)]
struct SiteRow {
    #[tabled(rename = "site")]
    name: String,
    #[tabled(rename = "repository")]
    repo: String,
    #[tabled(rename = "cloned")]
    cloned: String,
    #[tabled(rename = "preview")]
    preview: String,
    #[tabled(rename = "contacts")]
    contacts: String,
}

pub fn run(client: &ApiClient) -> Result<()> {
    let sites: Vec<SiteView> = client.get("/sites").context("failed to list sites")?;
    if sites.is_empty() {
        println!("no sites found");
        return Ok(());
    }

    let rows: Vec<SiteRow> = sites.into_iter().map(row).collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}

fn row(site: SiteView) -> SiteRow {
    let preview = match (site.is_running, site.port) {
        (true, Some(port)) => format!("{} localhost:{port}", "●".green().bold()),
        (true, None) => format!("{} running", "●".green().bold()),
        (false, _) => "■".bright_black().bold().to_string(),
    };
    SiteRow {
        name: site.name,
        repo: site.repo.unwrap_or_else(|| "-".to_string()),
        cloned: if site.is_cloned { "yes" } else { "no" }.to_string(),
        preview,
        contacts: if site.contacts.is_empty() {
            "-".to_string()
        } else {
            site.contacts.join(", ")
        },
    }
}

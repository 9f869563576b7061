//! `ghost stats`: resource usage of running previews.

use anyhow::{Context, Result};
use clap::Args;
use ghost_core::ContainerStats;
use serde::{Deserialize, Serialize};
use tabled::{settings::Style, Table, Tabled};

use super::client::ApiClient;

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct StatsReport {
    containers: Vec<ContainerStats>,
    count: usize,
}

#[derive(Tabled)]
struct StatsRow {
    #[tabled(rename = "container")]
    name: String,
    #[tabled(rename = "cpu")]
    cpu: String,
    #[tabled(rename = "memory")]
    mem: String,
    #[tabled(rename = "mem %")]
    mem_percent: String,
    #[tabled(rename = "net i/o")]
    net_io: String,
    #[tabled(rename = "block i/o")]
    block_io: String,
}

impl StatsArgs {
    pub fn run(&self, client: &ApiClient) -> Result<()> {
        let report: StatsReport = client
            .get("/ghost/stats")
            .context("failed to fetch container stats")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to render stats JSON")?
            );
            return Ok(());
        }

        if report.count == 0 {
            println!("no previews running");
            return Ok(());
        }
        let rows: Vec<StatsRow> = report.containers.into_iter().map(row).collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}

fn row(stats: ContainerStats) -> StatsRow {
    let cell = |v: Option<String>| v.unwrap_or_else(|| "-".to_string());
    StatsRow {
        name: stats.name,
        cpu: cell(stats.cpu),
        mem: cell(stats.mem),
        mem_percent: cell(stats.mem_percent),
        net_io: cell(stats.net_io),
        block_io: cell(stats.block_io),
    }
}

mod cli;
mod error;

use crate::cli::{Cli, Command};
use crate::error::{ErrorKind, Result};
use clap::Parser;
use drivepath_config::Config;
use drivepath_storage::backend::{DriveClient, DryRunClient, RetryClient};
use drivepath_storage::{ClientHandle, Node};
use drivepath_tree::Tree;
use exn::ResultExt;
use std::process::ExitCode;
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        },
    }
}

fn init_logging(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli::log_level(verbose)));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    tracing::debug!(?config, "Loaded configuration");
    let tree = Tree::new(connect(&config, cli.dry_run)?, config.tree_context());

    match cli.command {
        Command::Resolve { path } => {
            let id = tree.resolve(&path).await.or_raise(|| ErrorKind::Command("resolve"))?;
            println!("{id}");
        },
        Command::Ls { path, filter } => {
            let nodes = tree.list(&path, filter.as_deref()).await.or_raise(|| ErrorKind::Command("ls"))?;
            print!("{}", render_table(&nodes));
        },
        Command::Mkdir { name, parent } => {
            let node = tree.create_folder(&name, parent.as_deref()).await.or_raise(|| ErrorKind::Command("mkdir"))?;
            println!("{}", node.id);
        },
        Command::Rm { path, recursive, expect } => {
            tree.delete_checked(&path, recursive, expect.map(Into::into)).await.or_raise(|| ErrorKind::Command("rm"))?;
        },
        Command::Mv { source, destination } => {
            let node = tree.move_to(&source, &destination).await.or_raise(|| ErrorKind::Command("mv"))?;
            println!("{}", node.id);
        },
        Command::Cat { path } => {
            let mut stdout = tokio::io::stdout();
            tree.copy_content(&path, &mut stdout).await.or_raise(|| ErrorKind::Command("cat"))?;
        },
        Command::Fetch { path, into } => {
            let dir = into.unwrap_or_else(|| config.download_dir.clone());
            for local in tree.fetch(&path, &dir).await.or_raise(|| ErrorKind::Command("fetch"))? {
                println!("{}", local.display());
            }
        },
    }
    Ok(())
}

/// Drive client, retried, and wrapped for dry runs if asked.
fn connect(config: &Config, dry_run: bool) -> Result<ClientHandle> {
    let token = config.access_token().or_raise(|| ErrorKind::Config)?;
    let drive = DriveClient::new("drive", config.drive.base_url.as_str(), token).or_raise(|| ErrorKind::Client)?;
    let client: ClientHandle = Arc::new(RetryClient::new(Arc::new(drive), config.retry_policy()));
    if dry_run {
        tracing::info!("Dry run: no changes will be made");
        return Ok(Arc::new(DryRunClient::new(client)));
    }
    Ok(client)
}

fn render_table(nodes: &[Node]) -> String {
    let rows: Vec<[String; 4]> = nodes
        .iter()
        .map(|node| {
            let modified = node.modified.and_then(|m| m.format(&Rfc3339).ok()).unwrap_or_else(|| "-".to_string());
            [node.name.clone(), node.kind.to_string(), node.id.to_string(), modified]
        })
        .collect();
    let header = ["NAME", "KIND", "ID", "MODIFIED"].map(str::to_string);
    let mut widths = [0usize; 4];
    for row in std::iter::once(&header).chain(&rows) {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }
    let mut out = String::new();
    for row in std::iter::once(&header).chain(&rows) {
        let line: Vec<String> = row.iter().zip(widths).map(|(cell, width)| format!("{cell:<width$}")).collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    }
    out
}

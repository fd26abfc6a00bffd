//! contactsync command-line client
//!
//! Reads and edits the contact list through the sync engine. Writes made
//! with `--offline` (or while the server is down) are queued locally and
//! sent by `contactsync sync`.
//!
//! Usage:
//!   contactsync --server http://localhost:8080/contacts/ list
//!   contactsync --offline add --name "Ada Lovelace" --email ada@example.com
//!   contactsync sync

use anyhow::Result;
use clap::Parser;
use contactsync_cli::{run, Cli};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let output = run(cli).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

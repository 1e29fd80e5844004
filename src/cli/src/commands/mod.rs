//! CLI command definitions and dispatch.

mod extract;
mod import;
mod version;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// cask — dependency-aware container image renderer.
#[derive(Parser)]
#[command(name = "cask", version, about)]
pub struct Cli {
    /// Blob store directory (default: ~/.cask/store)
    #[arg(long, global = true)]
    pub store_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Command {
    /// Import image tar files into the store
    Import(import::ImportArgs),
    /// Render an imported image and its dependencies into a directory
    Extract(extract::ExtractArgs),
    /// Show version information
    Version(version::VersionArgs),
}

/// Return the default store directory (~/.cask/store).
pub(crate) fn default_store_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".cask"))
        .unwrap_or_else(|| PathBuf::from(".cask"))
        .join("store")
}

/// Open the blob store named on the command line.
pub(crate) fn open_store(store_dir: Option<PathBuf>) -> Result<cask_renderer::DiskStore> {
    let dir = store_dir.unwrap_or_else(default_store_dir);
    let store = cask_renderer::DiskStore::open(dir)?;
    Ok(store)
}

/// Dispatch a parsed CLI to the appropriate command handler.
pub fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Import(args) => import::execute(cli.store_dir, args),
        Command::Extract(args) => extract::execute(cli.store_dir, args),
        Command::Version(args) => version::execute(args),
    }
}

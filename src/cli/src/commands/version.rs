//! `cask version` command.

use anyhow::Result;
use clap::Args;

#[derive(Args)]
pub struct VersionArgs;

pub fn execute(_args: VersionArgs) -> Result<()> {
    println!("cask version {}", cask_core::VERSION);
    Ok(())
}

//! `cask import` command.

use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

#[derive(Args)]
pub struct ImportArgs {
    /// Image tar files (optionally gzip-compressed)
    #[arg(required = true)]
    pub images: Vec<PathBuf>,
}

pub fn execute(store_dir: Option<PathBuf>, args: ImportArgs) -> Result<()> {
    let store = super::open_store(store_dir)?;

    for image in &args.images {
        let file =
            File::open(image).with_context(|| format!("opening {}", image.display()))?;
        let key = store
            .import_image(file)
            .with_context(|| format!("importing {}", image.display()))?;
        println!("{}: {}", image.display(), key);
    }

    Ok(())
}

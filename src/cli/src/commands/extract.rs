//! `cask extract` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use cask_core::ImageHash;
use cask_renderer::render_image;

#[derive(Args)]
pub struct ExtractArgs {
    /// Key of the image to render; an unambiguous prefix is accepted
    pub image: String,

    /// Directory to render into (a fresh directory under --work-dir when omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Parent directory for generated render directories
    #[arg(long)]
    pub work_dir: Option<PathBuf>,
}

pub fn execute(store_dir: Option<PathBuf>, args: ExtractArgs) -> Result<()> {
    let store = super::open_store(store_dir)?;

    let key = store.resolve_key(&args.image)?;
    let hash = ImageHash::parse(&key)?;

    let target = match args.output {
        Some(dir) => {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("creating {}", dir.display()))?;
            dir
        }
        None => {
            let work_dir = args.work_dir.unwrap_or_else(std::env::temp_dir);
            tempfile::Builder::new()
                .prefix("cask-render-")
                .tempdir_in(&work_dir)
                .context("creating render directory")?
                .keep()
        }
    };

    render_image(&store, &hash, &target)
        .with_context(|| format!("rendering {key}"))?;
    println!("image rendered to {}", target.display());

    Ok(())
}

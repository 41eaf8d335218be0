//! Synthesize the release into template files.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::compose::{PIPELINE_STACK_NAME, Release, compose_release};

pub const MANIFEST_FILE: &str = "manifest.json";
const MANIFEST_VERSION: &str = "1";

/// Index of the stacks in an output directory.
#[derive(Debug, Serialize)]
pub struct Manifest {
    pub version: String,
    pub stacks: BTreeMap<String, ManifestStack>,
}

#[derive(Debug, Serialize)]
pub struct ManifestStack {
    pub template: String,
}

/// Compose the release and write every stack template plus a manifest to `output`.
pub fn run(config_path: Option<&str>, output: &str) -> Result<()> {
    let config = super::load_config(config_path)?;
    let release = compose_release(&config).context("Failed to compose release")?;
    let written = write_release(&release, Path::new(output))?;

    for path in &written {
        println!("{}", path.display());
    }
    Ok(())
}

/// Write the release into `dir`, returning the paths written.
pub fn write_release(release: &Release, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

    let function_file = release.function_stack.name.template_file();
    let pipeline_file = format!("{}.template.json", PIPELINE_STACK_NAME);

    let mut written = Vec::new();
    written.push(write_file(
        dir,
        &function_file,
        &release.function_stack.template().to_json_pretty()?,
    )?);
    written.push(write_file(
        dir,
        &pipeline_file,
        &release.pipeline.to_template().to_json_pretty()?,
    )?);

    let mut stacks = BTreeMap::new();
    stacks.insert(
        release.function_stack.name.to_string(),
        ManifestStack {
            template: function_file,
        },
    );
    stacks.insert(
        PIPELINE_STACK_NAME.to_string(),
        ManifestStack {
            template: pipeline_file,
        },
    );
    let manifest = Manifest {
        version: MANIFEST_VERSION.to_string(),
        stacks,
    };
    written.push(write_file(
        dir,
        MANIFEST_FILE,
        &serde_json::to_string_pretty(&manifest)?,
    )?);

    info!(dir = %dir.display(), files = written.len(), "Release synthesized");
    Ok(written)
}

fn write_file(dir: &Path, name: &str, content: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

//! CLI command implementations.

pub mod synth;

use anyhow::{Context, Result};
use clarissa_config::{ReleaseConfig, load_release};
use std::path::Path;
use tracing::info;

use crate::compose::compose_release;

/// Release file picked up from the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "clarissa.kdl";

/// Load the release config from `path`, the default file, or built-in defaults.
pub fn load_config(path: Option<&str>) -> Result<ReleaseConfig> {
    match path {
        Some(path) => load_release(Path::new(path))
            .with_context(|| format!("Failed to load release config: {}", path)),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            info!(path = DEFAULT_CONFIG_FILE, "Using release config");
            load_release(Path::new(DEFAULT_CONFIG_FILE))
                .with_context(|| format!("Failed to load release config: {}", DEFAULT_CONFIG_FILE))
        }
        None => {
            info!("No release config found, using built-in release");
            Ok(ReleaseConfig::default())
        }
    }
}

pub fn validate(config_path: Option<&str>) -> Result<()> {
    let config = load_config(config_path)?;
    match compose_release(&config) {
        Ok(release) => {
            println!(
                "Release is valid: {} stages deploying {}",
                release.pipeline.stages().len(),
                release.function_stack.name
            );
            Ok(())
        }
        Err(e) => {
            println!("Release error: {:#}", e);
            std::process::exit(1);
        }
    }
}

pub fn graph(config_path: Option<&str>) -> Result<()> {
    let config = load_config(config_path)?;
    let release = compose_release(&config).context("Failed to compose release")?;
    println!("{}", release.pipeline.graph());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("release.kdl");
        std::fs::write(&path, r#"release "FromFile" { owner "me" }"#).unwrap();

        let config = load_config(path.to_str()).unwrap();
        assert_eq!(config.stack_name, "FromFile");
        assert_eq!(config.repo_owner, "me");
    }

    #[test]
    fn test_load_config_falls_back_to_built_in_release() {
        // Tests run from the crate directory, which holds no release file.
        assert!(!Path::new(DEFAULT_CONFIG_FILE).exists());
        let config = load_config(None).unwrap();
        assert_eq!(config, ReleaseConfig::default());
        assert!(compose_release(&config).is_ok());
    }

    #[test]
    fn test_load_config_missing_explicit_path_fails() {
        let result = load_config(Some("/nonexistent/release.kdl"));
        assert!(result.is_err());
    }
}

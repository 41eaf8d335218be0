//! Release configuration parsing.

use crate::{ConfigError, ConfigResult};
use clarissa_core::StackName;
use clarissa_core::action::RepositoryCoordinates;
use clarissa_core::buildspec::BuildImage;
use clarissa_core::secret::SecretReference;
use kdl::{KdlDocument, KdlNode};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

pub const DEFAULT_STACK_NAME: &str = "ClarissaCdkStack";
pub const DEFAULT_OWNER: &str = "wandersoulz";
pub const DEFAULT_INFRA_REPO: &str = "ClarissaCDK";
pub const DEFAULT_APP_REPO: &str = "randomname-lambda";
pub const DEFAULT_BRANCH: &str = "master";
pub const DEFAULT_SECRET: &str =
    "arn:aws:secretsmanager:us-east-1:399907205041:secret:GitHubTokenString-bofHoJ";

static STACK_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9-]{0,127}$").unwrap());

static SECRET_ARN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^arn:aws[a-z-]*:secretsmanager:[a-z0-9-]+:\d{12}:secret:[A-Za-z0-9/_+=.@-]+$")
        .unwrap()
});

/// Everything that varies between deliveries of the function stack.
///
/// Each value lives here exactly once; the pipeline and the function stack
/// both read from the same config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseConfig {
    /// Stack the pipeline deploys; also names the synthesized template file.
    pub stack_name: String,
    /// Owner of both repositories.
    pub repo_owner: String,
    /// Repository holding the infrastructure definition.
    pub infra_repo: String,
    /// Repository holding the function code.
    pub app_repo: String,
    /// Branch tracked in both repositories.
    pub branch: String,
    /// ARN of the secret holding the repository access token.
    pub secret_reference: String,
    /// Image both builds run in.
    pub build_image: String,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            stack_name: DEFAULT_STACK_NAME.to_string(),
            repo_owner: DEFAULT_OWNER.to_string(),
            infra_repo: DEFAULT_INFRA_REPO.to_string(),
            app_repo: DEFAULT_APP_REPO.to_string(),
            branch: DEFAULT_BRANCH.to_string(),
            secret_reference: DEFAULT_SECRET.to_string(),
            build_image: BuildImage::STANDARD_2_0.to_string(),
        }
    }
}

impl ReleaseConfig {
    pub fn stack_name(&self) -> StackName {
        StackName::new(&self.stack_name)
    }

    pub fn infra_repository(&self) -> RepositoryCoordinates {
        RepositoryCoordinates::new(&self.repo_owner, &self.infra_repo).with_branch(&self.branch)
    }

    pub fn app_repository(&self) -> RepositoryCoordinates {
        RepositoryCoordinates::new(&self.repo_owner, &self.app_repo).with_branch(&self.branch)
    }

    pub fn credential(&self) -> SecretReference {
        SecretReference::from_arn(&self.secret_reference)
    }

    pub fn build_image(&self) -> BuildImage {
        BuildImage::new(&self.build_image)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if !STACK_NAME_REGEX.is_match(&self.stack_name) {
            return Err(ConfigError::InvalidValue {
                field: "stack name".to_string(),
                message: format!(
                    "'{}' must start with a letter and contain only letters, digits and hyphens",
                    self.stack_name
                ),
            });
        }
        if !SECRET_ARN_REGEX.is_match(&self.secret_reference) {
            return Err(ConfigError::InvalidValue {
                field: "secret".to_string(),
                message: format!("'{}' is not a secret ARN", self.secret_reference),
            });
        }
        for (field, value) in [
            ("owner", &self.repo_owner),
            ("infra repo", &self.infra_repo),
            ("app repo", &self.app_repo),
            ("branch", &self.branch),
            ("build-image", &self.build_image),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField(field.to_string()));
            }
        }
        if self.infra_repo == self.app_repo {
            return Err(ConfigError::InvalidValue {
                field: "app repo".to_string(),
                message: format!("'{}' is already the infra repo", self.app_repo),
            });
        }
        Ok(())
    }
}

/// Read and parse a release file.
pub fn load_release(path: &Path) -> ConfigResult<ReleaseConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_release(&content)
}

/// Parse a release configuration from KDL text. Fields not given keep their defaults.
pub fn parse_release(kdl: &str) -> ConfigResult<ReleaseConfig> {
    let doc: KdlDocument = kdl.parse()?;

    let mut release: Option<ReleaseConfig> = None;

    for node in doc.nodes() {
        match node.name().value() {
            "release" => {
                if release.is_some() {
                    return Err(ConfigError::Duplicate("release".to_string()));
                }
                release = Some(parse_release_node(node)?);
            }
            _ => {} // Ignore unknown nodes
        }
    }

    let config = release.ok_or_else(|| ConfigError::MissingField("release".to_string()))?;
    config.validate()?;
    Ok(config)
}

fn parse_release_node(node: &KdlNode) -> ConfigResult<ReleaseConfig> {
    let mut config = ReleaseConfig {
        stack_name: get_first_string_arg(node)
            .ok_or_else(|| ConfigError::MissingField("release stack name".to_string()))?,
        ..ReleaseConfig::default()
    };

    if let Some(children) = node.children() {
        for child in children.nodes() {
            match child.name().value() {
                "owner" => config.repo_owner = required_arg(child, "owner")?,
                "branch" => config.branch = required_arg(child, "branch")?,
                "secret" => config.secret_reference = required_arg(child, "secret")?,
                "build-image" | "build_image" => {
                    config.build_image = required_arg(child, "build-image")?
                }
                "infra" => config.infra_repo = repo_name(child, "infra")?,
                "app" => config.app_repo = repo_name(child, "app")?,
                _ => {}
            }
        }
    }

    Ok(config)
}

/// Repository name from `repo="..."`, falling back to the first argument.
fn repo_name(node: &KdlNode, field: &str) -> ConfigResult<String> {
    get_string_prop(node, "repo")
        .or_else(|| get_first_string_arg(node))
        .ok_or_else(|| ConfigError::MissingField(format!("{} repo", field)))
}

fn required_arg(node: &KdlNode, field: &str) -> ConfigResult<String> {
    get_first_string_arg(node).ok_or_else(|| ConfigError::MissingField(field.to_string()))
}

// Helper functions for extracting values from KDL nodes

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn get_string_prop(node: &KdlNode, name: &str) -> Option<String> {
    node.get(name)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}

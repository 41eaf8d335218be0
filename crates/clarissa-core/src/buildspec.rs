//! Build specifications and build projects.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::template::logical_id;

/// Build spec format version understood by the build service.
pub const BUILD_SPEC_VERSION: &str = "0.2";

/// Named phase of a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    Install,
    Build,
}

impl std::fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhaseKind::Install => write!(f, "install"),
            PhaseKind::Build => write!(f, "build"),
        }
    }
}

/// An ordered list of shell commands run in one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    pub kind: PhaseKind,
    pub commands: Vec<String>,
}

/// Files of the build workspace that become the output artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactFiles {
    pub files: Vec<String>,
    pub base_directory: Option<String>,
}

/// What a build runs and what it keeps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSpec {
    pub version: String,
    /// Phases in execution order.
    pub phases: Vec<Phase>,
    pub artifacts: ArtifactFiles,
}

impl Default for BuildSpec {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildSpec {
    pub fn new() -> Self {
        Self {
            version: BUILD_SPEC_VERSION.to_string(),
            phases: Vec::new(),
            artifacts: ArtifactFiles::default(),
        }
    }

    /// Append commands to a phase, creating it if needed.
    pub fn phase<I, S>(mut self, kind: PhaseKind, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let commands = commands.into_iter().map(Into::into);
        match self.phases.iter_mut().find(|p| p.kind == kind) {
            Some(phase) => phase.commands.extend(commands),
            None => {
                self.phases.push(Phase {
                    kind,
                    commands: commands.collect(),
                });
                self.phases.sort_by_key(|p| p.kind);
            }
        }
        self
    }

    pub fn install<I, S>(self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.phase(PhaseKind::Install, commands)
    }

    pub fn build<I, S>(self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.phase(PhaseKind::Build, commands)
    }

    pub fn files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.artifacts.files.extend(files.into_iter().map(Into::into));
        self
    }

    pub fn base_directory(mut self, dir: impl Into<String>) -> Self {
        self.artifacts.base_directory = Some(dir.into());
        self
    }

    pub fn commands(&self, kind: PhaseKind) -> &[String] {
        self.phases
            .iter()
            .find(|p| p.kind == kind)
            .map(|p| p.commands.as_slice())
            .unwrap_or(&[])
    }

    /// Whether `file` is one of the declared output files.
    pub fn declares(&self, file: &str) -> bool {
        self.artifacts.files.iter().any(|f| f == file)
    }

    /// Render in the build service's buildspec document shape.
    pub fn to_document(&self) -> Value {
        let mut phases = Map::new();
        for phase in &self.phases {
            phases.insert(phase.kind.to_string(), json!({ "commands": phase.commands }));
        }

        let mut artifacts = Map::new();
        artifacts.insert("files".to_string(), json!(self.artifacts.files));
        if let Some(dir) = &self.artifacts.base_directory {
            artifacts.insert("base-directory".to_string(), json!(dir));
        }

        json!({
            "version": self.version,
            "phases": phases,
            "artifacts": artifacts,
        })
    }
}

/// Container image a build runs in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct BuildImage(String);

impl BuildImage {
    pub const STANDARD_2_0: &'static str = "aws/codebuild/standard:2.0";

    pub fn new(image: impl Into<String>) -> Self {
        Self(image.into())
    }

    pub fn standard_2_0() -> Self {
        Self::new(Self::STANDARD_2_0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for BuildImage {
    fn default() -> Self {
        Self::standard_2_0()
    }
}

/// Compute size of a build container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComputeType {
    #[default]
    Small,
}

impl std::fmt::Display for ComputeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComputeType::Small => write!(f, "BUILD_GENERAL1_SMALL"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildEnvironment {
    pub image: BuildImage,
    pub compute_type: ComputeType,
}

/// A build project: a spec plus the environment it runs in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildProject {
    pub name: String,
    pub spec: BuildSpec,
    pub environment: BuildEnvironment,
}

impl BuildProject {
    pub fn new(name: impl Into<String>, spec: BuildSpec) -> Self {
        Self {
            name: name.into(),
            spec,
            environment: BuildEnvironment::default(),
        }
    }

    pub fn with_image(mut self, image: BuildImage) -> Self {
        self.environment.image = image;
        self
    }

    pub fn logical_id(&self) -> String {
        logical_id(&self.name)
    }

    /// Logical id of the role the project's builds run under.
    pub fn role_logical_id(&self) -> String {
        format!("{}Role", self.logical_id())
    }
}

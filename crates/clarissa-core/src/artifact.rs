//! Artifacts passed between pipeline stages.
//!
//! An artifact is a named handle to a bundle of files. Nothing here knows what
//! the bundle contains; the platform stores it between stages and resolves
//! paths and locations at execution time.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Name of an artifact, unique within a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct ArtifactName(String);

impl ArtifactName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Name given to the output of an action that was not handed an explicit one.
    pub fn derived_from(action_name: &str) -> Self {
        let cleaned: String = action_name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        Self(format!("Artifact_{}", cleaned))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A handle to a file bundle produced by one action and consumed by others.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Artifact {
    name: ArtifactName,
}

impl Artifact {
    /// An artifact with an explicit name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: ArtifactName::new(name),
        }
    }

    /// The output artifact of an action that did not name it.
    pub fn derived_from(action_name: &str) -> Self {
        Self {
            name: ArtifactName::derived_from(action_name),
        }
    }

    pub fn name(&self) -> &ArtifactName {
        &self.name
    }

    /// A file inside this artifact.
    pub fn at_path(&self, file: impl Into<String>) -> ArtifactPath {
        ArtifactPath {
            artifact: self.name.clone(),
            file: file.into(),
        }
    }

    /// Where the platform will have stored this artifact once it is produced.
    pub fn s3_location(&self) -> ArtifactLocation {
        ArtifactLocation {
            artifact: self.name.clone(),
        }
    }
}

/// A file within an artifact, rendered as `<artifact>::<file>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Display)]
#[display("{artifact}::{file}")]
pub struct ArtifactPath {
    pub artifact: ArtifactName,
    pub file: String,
}

/// Attributes of a stored artifact the platform can substitute at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ArtifactAttribute {
    BucketName,
    ObjectKey,
}

impl std::fmt::Display for ArtifactAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactAttribute::BucketName => write!(f, "BucketName"),
            ArtifactAttribute::ObjectKey => write!(f, "ObjectKey"),
        }
    }
}

/// Deferred storage location of an artifact.
///
/// Only obtainable from an [`Artifact`], so anything bound to a location is
/// bound after the producing action's output has been declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactLocation {
    artifact: ArtifactName,
}

impl ArtifactLocation {
    pub fn artifact(&self) -> &ArtifactName {
        &self.artifact
    }

    pub fn bucket_name(&self) -> (ArtifactName, ArtifactAttribute) {
        (self.artifact.clone(), ArtifactAttribute::BucketName)
    }

    pub fn object_key(&self) -> (ArtifactName, ArtifactAttribute) {
        (self.artifact.clone(), ArtifactAttribute::ObjectKey)
    }
}

//! Deployment units: fetch one repository, build it, produce one artifact.

use serde::{Deserialize, Serialize};

use crate::action::{BuildAction, SourceAction};
use crate::artifact::Artifact;
use crate::{Error, Result};

/// A source action paired with the build that consumes its output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentUnit {
    source: SourceAction,
    build: BuildAction,
}

impl DeploymentUnit {
    /// Pair a source with its build. The build must consume the source's output.
    pub fn new(source: SourceAction, build: BuildAction) -> Result<Self> {
        if build.input() != source.output() {
            return Err(Error::InvalidInput(format!(
                "build '{}' consumes '{}' but source '{}' produces '{}'",
                build.name,
                build.input().name(),
                source.name,
                source.output().name()
            )));
        }
        Ok(Self { source, build })
    }

    pub fn source_action(&self) -> &SourceAction {
        &self.source
    }

    pub fn build_action(&self) -> &BuildAction {
        &self.build
    }

    /// The unit's single output: what its build produces.
    pub fn output(&self) -> &Artifact {
        self.build.output()
    }
}

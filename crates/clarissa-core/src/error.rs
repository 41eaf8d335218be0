//! Error types for pipeline definitions.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("duplicate name: {0}")]
    DuplicateName(String),

    #[error("artifact '{artifact}' is produced by both '{first}' and '{second}'")]
    DuplicateArtifact {
        artifact: String,
        first: String,
        second: String,
    },

    #[error("action '{action}' consumes artifact '{artifact}' which no action produces")]
    UnknownArtifact { action: String, artifact: String },

    #[error(
        "action '{action}' in stage '{stage}' consumes artifact '{artifact}' produced in stage '{producer_stage}'"
    )]
    StageOrder {
        action: String,
        stage: String,
        artifact: String,
        producer_stage: String,
    },

    #[error("template '{path}' is not declared as an output of the build that produces it")]
    TemplateNotProduced { path: String },

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

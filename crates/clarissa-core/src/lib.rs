//! Declarative model of the Clarissa release pipeline.
//!
//! This crate contains:
//! - Artifacts and their deferred paths and storage locations
//! - Source, build and stack-deploy actions
//! - Build specifications and projects
//! - Deployment units pairing a source with its build
//! - Stage ordering and pipeline validation
//! - Code parameters bound from build output at deploy time
//! - The function stack and template synthesis

pub mod action;
pub mod artifact;
pub mod buildspec;
pub mod error;
pub mod parameter;
pub mod pipeline;
pub mod secret;
pub mod stack;
pub mod template;
pub mod unit;

pub use error::{Error, Result};
pub use stack::StackName;

//! Credential references.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Identifier of a secret held by the platform's secret store.
///
/// The secret value is never part of a definition. Actions embed a dynamic
/// reference that the platform resolves when it runs them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct SecretReference(String);

impl SecretReference {
    pub fn from_arn(arn: impl Into<String>) -> Self {
        Self(arn.into())
    }

    pub fn arn(&self) -> &str {
        &self.0
    }

    /// Dynamic reference to the secret's string value.
    pub fn dynamic_reference(&self) -> String {
        format!("{{{{resolve:secretsmanager:{}:SecretString:::}}}}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dynamic_reference_wraps_arn() {
        let secret = SecretReference::from_arn(
            "arn:aws:secretsmanager:us-east-1:123456789012:secret:GitHubToken-abc123",
        );
        assert_eq!(
            secret.dynamic_reference(),
            "{{resolve:secretsmanager:arn:aws:secretsmanager:us-east-1:123456789012:secret:GitHubToken-abc123:SecretString:::}}"
        );
    }
}

//! Stack parameters whose values are only known once a build has run.
//!
//! Binding happens in two steps. The function stack declares the code
//! parameters up front; the pipeline later assigns them from the storage
//! location of the application build's output. An [`ArtifactLocation`] can
//! only come from a declared artifact, so assignment cannot precede the build
//! that produces the code.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, BTreeSet};

use crate::artifact::{ArtifactAttribute, ArtifactLocation, ArtifactName};

/// Placeholder for function code supplied through template parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeParameters {
    bucket_name_parameter: String,
    object_key_parameter: String,
}

impl CodeParameters {
    /// Declare the bucket-name and object-key parameters under `id`.
    pub fn declare(id: &str) -> Self {
        Self {
            bucket_name_parameter: format!("{}BucketNameParameter", id),
            object_key_parameter: format!("{}ObjectKeyParameter", id),
        }
    }

    pub fn bucket_name_parameter(&self) -> &str {
        &self.bucket_name_parameter
    }

    pub fn object_key_parameter(&self) -> &str {
        &self.object_key_parameter
    }

    /// Bind both parameters to the stored location of an artifact.
    pub fn assign(&self, location: &ArtifactLocation) -> ParameterOverrides {
        let (bucket_artifact, bucket_attr) = location.bucket_name();
        let (key_artifact, key_attr) = location.object_key();

        let mut overrides = ParameterOverrides::default();
        overrides.insert(
            self.bucket_name_parameter.clone(),
            ParameterValue::ArtifactAttribute {
                artifact: bucket_artifact,
                attribute: bucket_attr,
            },
        );
        overrides.insert(
            self.object_key_parameter.clone(),
            ParameterValue::ArtifactAttribute {
                artifact: key_artifact,
                attribute: key_attr,
            },
        );
        overrides
    }

    /// The `Parameters` entries a template declaring this code needs.
    pub fn template_parameters(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert(
            self.bucket_name_parameter.clone(),
            json!({
                "Type": "String",
                "Description": "Bucket holding the function code",
            }),
        );
        params.insert(
            self.object_key_parameter.clone(),
            json!({
                "Type": "String",
                "Description": "Object key of the function code",
            }),
        );
        params
    }
}

/// Value supplied for a stack parameter at deploy time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterValue {
    Literal(String),
    /// Resolved by the platform from a stored artifact.
    ArtifactAttribute {
        artifact: ArtifactName,
        attribute: ArtifactAttribute,
    },
}

impl ParameterValue {
    pub fn artifact(&self) -> Option<&ArtifactName> {
        match self {
            ParameterValue::Literal(_) => None,
            ParameterValue::ArtifactAttribute { artifact, .. } => Some(artifact),
        }
    }

    fn to_override(&self) -> Value {
        match self {
            ParameterValue::Literal(s) => json!(s),
            ParameterValue::ArtifactAttribute {
                artifact,
                attribute,
            } => json!({
                "Fn::GetArtifactAtt": [artifact.as_str(), attribute.to_string()]
            }),
        }
    }
}

/// Parameter overrides for a stack update, sorted by parameter name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterOverrides(BTreeMap<String, ParameterValue>);

impl ParameterOverrides {
    pub fn insert(&mut self, name: impl Into<String>, value: ParameterValue) {
        self.0.insert(name.into(), value);
    }

    /// Merge another set of overrides, later values winning.
    pub fn extend(&mut self, other: ParameterOverrides) {
        self.0.extend(other.0);
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParameterValue)> {
        self.0.iter()
    }

    /// Artifacts the platform must have available to resolve these overrides.
    pub fn referenced_artifacts(&self) -> BTreeSet<&ArtifactName> {
        self.0.values().filter_map(ParameterValue::artifact).collect()
    }

    /// JSON object in the shape the deploy action's configuration expects.
    pub fn to_configuration(&self) -> Value {
        let map: Map<String, Value> = self
            .0
            .iter()
            .map(|(k, v)| (k.clone(), v.to_override()))
            .collect();
        Value::Object(map)
    }
}

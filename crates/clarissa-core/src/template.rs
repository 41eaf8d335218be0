//! Synthesized stack templates.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

use crate::Result;

pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// A resource in a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Resource {
    #[serde(rename = "Type")]
    pub resource_type: String,
    pub properties: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Top-level resource attributes such as `UpdatePolicy` or `DeletionPolicy`.
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>, properties: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            properties,
            depends_on: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn depends_on(mut self, logical_id: impl Into<String>) -> Self {
        self.depends_on.push(logical_id.into());
        self
    }

    pub fn attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }
}

/// A stack template, rendered with sorted keys so output is stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub parameters: Map<String, Value>,
    pub resources: BTreeMap<String, Resource>,
}

impl Default for Template {
    fn default() -> Self {
        Self::new()
    }
}

impl Template {
    pub fn new() -> Self {
        Self {
            format_version: TEMPLATE_FORMAT_VERSION.to_string(),
            description: None,
            parameters: Map::new(),
            resources: BTreeMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn add_resource(&mut self, logical_id: impl Into<String>, resource: Resource) {
        self.resources.insert(logical_id.into(), resource);
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.get(logical_id)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Logical id for a construct name: alphanumerics only.
pub fn logical_id(name: &str) -> String {
    name.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

pub fn reference(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

/// An IAM role assumable by `service`, with an optional inline policy statement list.
pub fn service_role(service: &str, managed_policies: &[&str], statements: Vec<Value>) -> Resource {
    let mut properties = json!({
        "AssumeRolePolicyDocument": {
            "Version": "2012-10-17",
            "Statement": [{
                "Action": "sts:AssumeRole",
                "Effect": "Allow",
                "Principal": { "Service": service },
            }],
        },
    });
    if !managed_policies.is_empty() {
        properties["ManagedPolicyArns"] = json!(managed_policies);
    }
    if !statements.is_empty() {
        properties["Policies"] = json!([{
            "PolicyName": "Default",
            "PolicyDocument": {
                "Version": "2012-10-17",
                "Statement": statements,
            },
        }]);
    }
    Resource::new("AWS::IAM::Role", properties)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_id_strips_punctuation() {
        assert_eq!(logical_id("Lambda_CFN_Deploy"), "LambdaCFNDeploy");
        assert_eq!(logical_id("randomname-lambda"), "randomnamelambda");
    }

    #[test]
    fn test_template_serialization_shape() {
        let mut template = Template::new().with_description("test");
        template.add_resource(
            "Bucket",
            Resource::new("AWS::S3::Bucket", json!({}))
                .attribute("DeletionPolicy", json!("Retain"))
                .depends_on("Other"),
        );

        let value = serde_json::to_value(&template).unwrap();
        assert_eq!(value["AWSTemplateFormatVersion"], "2010-09-09");
        assert_eq!(value["Description"], "test");
        assert!(value.get("Parameters").is_none());
        assert_eq!(value["Resources"]["Bucket"]["Type"], "AWS::S3::Bucket");
        assert_eq!(value["Resources"]["Bucket"]["DeletionPolicy"], "Retain");
        assert_eq!(value["Resources"]["Bucket"]["DependsOn"][0], "Other");
    }

    #[test]
    fn test_service_role_policies() {
        let role = service_role(
            "lambda.amazonaws.com",
            &["arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole"],
            vec![],
        );
        assert_eq!(role.resource_type, "AWS::IAM::Role");
        assert_eq!(
            role.properties["AssumeRolePolicyDocument"]["Statement"][0]["Principal"]["Service"],
            "lambda.amazonaws.com"
        );
        assert!(role.properties.get("Policies").is_none());
        assert!(role.properties["ManagedPolicyArns"].is_array());
    }
}

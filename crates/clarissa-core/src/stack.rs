//! Stack names and the function stack the pipeline deploys.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::parameter::CodeParameters;
use crate::template::{Resource, Template, get_att, reference, service_role};

/// Name of a stack managed by the orchestration platform.
///
/// The template file a build emits for a stack and the stack a deploy action
/// updates are both derived from one `StackName` value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct StackName(String);

impl StackName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name the synthesizer writes this stack's template to.
    pub fn template_file(&self) -> String {
        format!("{}.template.json", self.0)
    }
}

/// Version qualifier that always tracks the most recently updated code.
pub const LATEST_VERSION: &str = "$LATEST";

/// Function runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Runtime {
    Go1x,
}

impl std::fmt::Display for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Runtime::Go1x => write!(f, "go1.x"),
        }
    }
}

/// Traffic shifting applied when the alias moves to a new version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrafficShift {
    Linear10PercentEvery1Minute,
}

impl std::fmt::Display for TrafficShift {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrafficShift::Linear10PercentEvery1Minute => {
                write!(f, "CodeDeployDefault.LambdaLinear10PercentEvery1Minute")
            }
        }
    }
}

/// A single function whose code arrives through template parameters, fronted
/// by an alias that shifts traffic gradually on each update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionStack {
    pub name: StackName,
    pub handler: String,
    pub runtime: Runtime,
    pub alias: String,
    pub traffic_shift: TrafficShift,
    code: CodeParameters,
}

impl FunctionStack {
    pub const CODE_ID: &'static str = "LambdaLambdaSource";

    pub fn new(name: StackName) -> Self {
        Self {
            name,
            handler: "main".to_string(),
            runtime: Runtime::Go1x,
            alias: "Prod".to_string(),
            traffic_shift: TrafficShift::Linear10PercentEvery1Minute,
            code: CodeParameters::declare(Self::CODE_ID),
        }
    }

    /// Code placeholder the pipeline binds to the application build output.
    pub fn code(&self) -> &CodeParameters {
        &self.code
    }

    pub fn template(&self) -> Template {
        let mut template = Template::new()
            .with_description(format!("Function stack {}", self.name));
        template.parameters = self.code.template_parameters();

        template.add_resource(
            "LambdaServiceRole",
            service_role(
                "lambda.amazonaws.com",
                &["arn:aws:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole"],
                Vec::new(),
            ),
        );
        template.add_resource(
            "Lambda",
            Resource::new(
                "AWS::Lambda::Function",
                json!({
                    "Code": {
                        "S3Bucket": reference(self.code.bucket_name_parameter()),
                        "S3Key": reference(self.code.object_key_parameter()),
                    },
                    "Handler": self.handler,
                    "Role": get_att("LambdaServiceRole", "Arn"),
                    "Runtime": self.runtime.to_string(),
                }),
            )
            .depends_on("LambdaServiceRole"),
        );
        template.add_resource(
            "LambdaAlias",
            Resource::new(
                "AWS::Lambda::Alias",
                json!({
                    "FunctionName": reference("Lambda"),
                    "FunctionVersion": LATEST_VERSION,
                    "Name": self.alias,
                }),
            )
            .attribute(
                "UpdatePolicy",
                json!({
                    "CodeDeployLambdaAliasUpdate": {
                        "ApplicationName": reference("DeploymentGroupApplication"),
                        "DeploymentGroupName": reference("DeploymentGroup"),
                    }
                }),
            ),
        );
        template.add_resource(
            "DeploymentGroupApplication",
            Resource::new(
                "AWS::CodeDeploy::Application",
                json!({ "ComputePlatform": "Lambda" }),
            ),
        );
        template.add_resource(
            "DeploymentGroupServiceRole",
            service_role(
                "codedeploy.amazonaws.com",
                &["arn:aws:iam::aws:policy/service-role/AWSCodeDeployRoleForLambdaLimited"],
                Vec::new(),
            ),
        );
        template.add_resource(
            "DeploymentGroup",
            Resource::new(
                "AWS::CodeDeploy::DeploymentGroup",
                json!({
                    "ApplicationName": reference("DeploymentGroupApplication"),
                    "ServiceRoleArn": get_att("DeploymentGroupServiceRole", "Arn"),
                    "DeploymentConfigName": self.traffic_shift.to_string(),
                    "DeploymentStyle": {
                        "DeploymentType": "BLUE_GREEN",
                        "DeploymentOption": "WITH_TRAFFIC_CONTROL",
                    },
                    "AutoRollbackConfiguration": {
                        "Enabled": true,
                        "Events": ["DEPLOYMENT_FAILURE"],
                    },
                }),
            ),
        );

        template
    }
}

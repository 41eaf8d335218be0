//! Pipeline actions: fetch a repository, run a build, update a stack.

use derive_more::From;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::artifact::{Artifact, ArtifactName, ArtifactPath};
use crate::buildspec::BuildProject;
use crate::parameter::ParameterOverrides;
use crate::secret::SecretReference;
use crate::stack::StackName;
use crate::template::{Resource, get_att, logical_id, reference};

/// Branch fetched when none is given.
pub const DEFAULT_BRANCH: &str = "master";

/// Owner, name and branch of a hosted repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryCoordinates {
    pub owner: String,
    pub name: String,
    pub branch: String,
}

impl RepositoryCoordinates {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            branch: DEFAULT_BRANCH.to_string(),
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }
}

impl std::fmt::Display for RepositoryCoordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.name, self.branch)
    }
}

/// Kind of work an action performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionCategory {
    Source,
    Build,
    Deploy,
}

impl std::fmt::Display for ActionCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionCategory::Source => write!(f, "Source"),
            ActionCategory::Build => write!(f, "Build"),
            ActionCategory::Deploy => write!(f, "Deploy"),
        }
    }
}

/// How the platform learns that a source branch has moved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceTrigger {
    /// The repository host calls a webhook on every push.
    #[default]
    Webhook,
    /// The platform polls the branch.
    Poll,
}

/// Turns the head of a repository branch into an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceAction {
    pub name: String,
    pub repository: RepositoryCoordinates,
    pub credential: SecretReference,
    pub trigger: SourceTrigger,
    output: Artifact,
}

impl SourceAction {
    /// The output artifact is named after the action unless replaced with [`Self::with_output`].
    pub fn new(
        name: impl Into<String>,
        repository: RepositoryCoordinates,
        credential: &SecretReference,
    ) -> Self {
        let name = name.into();
        let output = Artifact::derived_from(&name);
        Self {
            name,
            repository,
            credential: credential.clone(),
            trigger: SourceTrigger::default(),
            output,
        }
    }

    pub fn with_output(mut self, output: Artifact) -> Self {
        self.output = output;
        self
    }

    pub fn with_trigger(mut self, trigger: SourceTrigger) -> Self {
        self.trigger = trigger;
        self
    }

    pub fn output(&self) -> &Artifact {
        &self.output
    }

    /// Logical id of the push webhook, if this action is webhook-triggered.
    pub fn webhook_logical_id(&self) -> Option<String> {
        (self.trigger == SourceTrigger::Webhook)
            .then(|| format!("{}Webhook", logical_id(&self.name)))
    }

    /// Webhook that starts `pipeline_id` when the tracked branch receives a push.
    ///
    /// The shared secret is the same credential the action fetches with.
    pub fn webhook(&self, pipeline_id: &str) -> Option<Resource> {
        if self.trigger != SourceTrigger::Webhook {
            return None;
        }
        Some(Resource::new(
            "AWS::CodePipeline::Webhook",
            json!({
                "Authentication": "GITHUB_HMAC",
                "AuthenticationConfiguration": {
                    "SecretToken": self.credential.dynamic_reference(),
                },
                "Filters": [{
                    "JsonPath": "$.ref",
                    "MatchEquals": format!("refs/heads/{}", self.repository.branch),
                }],
                "TargetAction": self.name,
                "TargetPipeline": reference(pipeline_id),
                "TargetPipelineVersion": 1,
                "RegisterWithThirdParty": true,
            }),
        ))
    }

    fn configuration(&self) -> Value {
        json!({
            "Owner": self.repository.owner,
            "Repo": self.repository.name,
            "Branch": self.repository.branch,
            "OAuthToken": self.credential.dynamic_reference(),
            "PollForSourceChanges": self.trigger == SourceTrigger::Poll,
        })
    }
}

/// Runs a build project over one input artifact, producing one output artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildAction {
    pub name: String,
    pub project: BuildProject,
    input: Artifact,
    output: Artifact,
}

impl BuildAction {
    pub fn new(
        name: impl Into<String>,
        project: BuildProject,
        input: &Artifact,
        output: Artifact,
    ) -> Self {
        Self {
            name: name.into(),
            project,
            input: input.clone(),
            output,
        }
    }

    pub fn input(&self) -> &Artifact {
        &self.input
    }

    pub fn output(&self) -> &Artifact {
        &self.output
    }

    /// Whether the build spec lists `file` among its output files.
    pub fn declares_output(&self, file: &str) -> bool {
        self.project.spec.declares(file)
    }

    fn configuration(&self) -> Value {
        json!({ "ProjectName": reference(&self.project.logical_id()) })
    }
}

/// Creates or updates a stack from a template carried in an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployStackAction {
    pub name: String,
    pub stack_name: StackName,
    pub template_path: ArtifactPath,
    pub admin_permissions: bool,
    pub parameter_overrides: ParameterOverrides,
    pub extra_inputs: Vec<Artifact>,
}

impl DeployStackAction {
    pub fn new(name: impl Into<String>, stack_name: StackName, template_path: ArtifactPath) -> Self {
        Self {
            name: name.into(),
            stack_name,
            template_path,
            admin_permissions: false,
            parameter_overrides: ParameterOverrides::default(),
            extra_inputs: Vec::new(),
        }
    }

    pub fn admin_permissions(mut self, admin: bool) -> Self {
        self.admin_permissions = admin;
        self
    }

    pub fn parameter_overrides(mut self, overrides: ParameterOverrides) -> Self {
        self.parameter_overrides.extend(overrides);
        self
    }

    pub fn extra_input(mut self, artifact: &Artifact) -> Self {
        self.extra_inputs.push(artifact.clone());
        self
    }

    /// Logical id of the role the stack update runs under.
    pub fn role_logical_id(&self) -> String {
        logical_id(&format!("{}Role", self.name))
    }

    fn configuration(&self) -> Value {
        let mut config = json!({
            "ActionMode": "CREATE_UPDATE",
            "StackName": self.stack_name.as_str(),
            "TemplatePath": self.template_path.to_string(),
            "RoleArn": get_att(&self.role_logical_id(), "Arn"),
            "ParameterOverrides": self.parameter_overrides.to_configuration().to_string(),
        });
        if self.admin_permissions {
            config["Capabilities"] = json!("CAPABILITY_NAMED_IAM,CAPABILITY_AUTO_EXPAND");
        }
        config
    }
}

/// Any action a stage can hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, From)]
pub enum Action {
    Source(SourceAction),
    Build(BuildAction),
    Deploy(DeployStackAction),
}

impl Action {
    pub fn name(&self) -> &str {
        match self {
            Action::Source(a) => &a.name,
            Action::Build(a) => &a.name,
            Action::Deploy(a) => &a.name,
        }
    }

    pub fn category(&self) -> ActionCategory {
        match self {
            Action::Source(_) => ActionCategory::Source,
            Action::Build(_) => ActionCategory::Build,
            Action::Deploy(_) => ActionCategory::Deploy,
        }
    }

    /// Declared input artifacts, in declaration order.
    pub fn inputs(&self) -> Vec<&ArtifactName> {
        match self {
            Action::Source(_) => Vec::new(),
            Action::Build(a) => vec![a.input.name()],
            Action::Deploy(a) => {
                let mut inputs = vec![&a.template_path.artifact];
                for extra in &a.extra_inputs {
                    if !inputs.contains(&extra.name()) {
                        inputs.push(extra.name());
                    }
                }
                inputs
            }
        }
    }

    pub fn outputs(&self) -> Vec<&ArtifactName> {
        match self {
            Action::Source(a) => vec![a.output.name()],
            Action::Build(a) => vec![a.output.name()],
            Action::Deploy(_) => Vec::new(),
        }
    }

    /// Render as a pipeline action declaration.
    pub fn declaration(&self) -> Value {
        let (owner, provider, configuration) = match self {
            Action::Source(a) => ("ThirdParty", "GitHub", a.configuration()),
            Action::Build(a) => ("AWS", "CodeBuild", a.configuration()),
            Action::Deploy(a) => ("AWS", "CloudFormation", a.configuration()),
        };
        let artifacts = |names: Vec<&ArtifactName>| -> Vec<Value> {
            names
                .into_iter()
                .map(|n| json!({ "Name": n.as_str() }))
                .collect()
        };

        let mut decl = json!({
            "Name": self.name(),
            "ActionTypeId": {
                "Category": self.category().to_string(),
                "Owner": owner,
                "Provider": provider,
                "Version": "1",
            },
            "Configuration": configuration,
            "RunOrder": 1,
        });
        let inputs = artifacts(self.inputs());
        if !inputs.is_empty() {
            decl["InputArtifacts"] = Value::Array(inputs);
        }
        let outputs = artifacts(self.outputs());
        if !outputs.is_empty() {
            decl["OutputArtifacts"] = Value::Array(outputs);
        }
        decl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buildspec::BuildSpec;
    use crate::parameter::CodeParameters;

    fn credential() -> SecretReference {
        SecretReference::from_arn("arn:aws:secretsmanager:us-east-1:123456789012:secret:Token-abc")
    }

    #[test]
    fn test_source_output_defaults_to_derived_name() {
        let source = SourceAction::new(
            "CDKCode_Update",
            RepositoryCoordinates::new("wandersoulz", "ClarissaCDK"),
            &credential(),
        );
        assert_eq!(source.output().name().as_str(), "Artifact_CDKCode_Update");
        assert_eq!(source.repository.branch, "master");
        assert_eq!(source.trigger, SourceTrigger::Webhook);
    }

    #[test]
    fn test_webhook_filters_on_tracked_branch() {
        let source = SourceAction::new(
            "CDKCode_Update",
            RepositoryCoordinates::new("wandersoulz", "ClarissaCDK").with_branch("release"),
            &credential(),
        );
        assert_eq!(source.webhook_logical_id().as_deref(), Some("CDKCodeUpdateWebhook"));

        let webhook = source.webhook("Pipeline").unwrap();
        assert_eq!(webhook.resource_type, "AWS::CodePipeline::Webhook");
        let props = &webhook.properties;
        assert_eq!(props["Authentication"], "GITHUB_HMAC");
        assert_eq!(
            props["AuthenticationConfiguration"]["SecretToken"],
            credential().dynamic_reference()
        );
        assert_eq!(props["Filters"][0]["JsonPath"], "$.ref");
        assert_eq!(props["Filters"][0]["MatchEquals"], "refs/heads/release");
        assert_eq!(props["TargetAction"], "CDKCode_Update");
        assert_eq!(props["TargetPipeline"], json!({ "Ref": "Pipeline" }));
        assert_eq!(props["TargetPipelineVersion"], 1);
        assert_eq!(props["RegisterWithThirdParty"], true);

        let action: Action = source.into();
        assert_eq!(action.declaration()["Configuration"]["PollForSourceChanges"], false);
    }

    #[test]
    fn test_poll_trigger_has_no_webhook() {
        let source = SourceAction::new(
            "CDKCode_Update",
            RepositoryCoordinates::new("wandersoulz", "ClarissaCDK"),
            &credential(),
        )
        .with_trigger(SourceTrigger::Poll);
        assert!(source.webhook_logical_id().is_none());
        assert!(source.webhook("Pipeline").is_none());

        let action: Action = source.into();
        assert_eq!(action.declaration()["Configuration"]["PollForSourceChanges"], true);
    }

    #[test]
    fn test_source_declaration_embeds_reference_not_secret() {
        let action: Action = SourceAction::new(
            "LambdaCode_Update",
            RepositoryCoordinates::new("wandersoulz", "randomname-lambda").with_branch("main"),
            &credential(),
        )
        .into();

        let decl = action.declaration();
        assert_eq!(decl["ActionTypeId"]["Provider"], "GitHub");
        assert_eq!(decl["Configuration"]["Branch"], "main");
        let token = decl["Configuration"]["OAuthToken"].as_str().unwrap();
        assert!(token.starts_with("{{resolve:secretsmanager:arn:"));
        assert!(decl.get("InputArtifacts").is_none());
        assert_eq!(decl["OutputArtifacts"][0]["Name"], "Artifact_LambdaCode_Update");
    }

    #[test]
    fn test_build_inputs_and_outputs() {
        let source = Artifact::named("Src");
        let build: Action = BuildAction::new(
            "CDK_Build",
            BuildProject::new("CdkBuild", BuildSpec::new().files(["a.json"])),
            &source,
            Artifact::named("CdkBuildOutput"),
        )
        .into();

        assert_eq!(build.inputs(), vec![source.name()]);
        assert_eq!(build.outputs()[0].as_str(), "CdkBuildOutput");
        assert_eq!(
            build.declaration()["Configuration"]["ProjectName"],
            json!({ "Ref": "CdkBuild" })
        );
    }

    #[test]
    fn test_deploy_inputs_dedupe_template_artifact() {
        let infra = Artifact::named("CdkBuildOutput");
        let app = Artifact::named("LambdaBuildOutput");
        let deploy: Action = DeployStackAction::new(
            "Lambda_CFN_Deploy",
            StackName::new("Stack"),
            infra.at_path("Stack.template.json"),
        )
        .extra_input(&app)
        .extra_input(&infra)
        .into();

        assert_eq!(deploy.inputs(), vec![infra.name(), app.name()]);
        assert!(deploy.outputs().is_empty());
    }

    #[test]
    fn test_deploy_configuration() {
        let infra = Artifact::named("CdkBuildOutput");
        let app = Artifact::named("LambdaBuildOutput");
        let code = CodeParameters::declare("Code");
        let deploy: Action = DeployStackAction::new(
            "Lambda_CFN_Deploy",
            StackName::new("ClarissaCdkStack"),
            infra.at_path("ClarissaCdkStack.template.json"),
        )
        .admin_permissions(true)
        .parameter_overrides(code.assign(&app.s3_location()))
        .extra_input(&app)
        .into();

        let config = &deploy.declaration()["Configuration"];
        assert_eq!(config["ActionMode"], "CREATE_UPDATE");
        assert_eq!(config["StackName"], "ClarissaCdkStack");
        assert_eq!(
            config["TemplatePath"],
            "CdkBuildOutput::ClarissaCdkStack.template.json"
        );
        assert_eq!(config["RoleArn"], json!({ "Fn::GetAtt": ["LambdaCFNDeployRole", "Arn"] }));
        assert!(config["Capabilities"].is_string());

        let overrides: Value =
            serde_json::from_str(config["ParameterOverrides"].as_str().unwrap()).unwrap();
        assert_eq!(
            overrides["CodeBucketNameParameter"]["Fn::GetArtifactAtt"][0],
            "LambdaBuildOutput"
        );
    }

    #[test]
    fn test_deploy_without_admin_has_no_capabilities() {
        let deploy: Action = DeployStackAction::new(
            "Deploy",
            StackName::new("S"),
            Artifact::named("Out").at_path("S.template.json"),
        )
        .into();
        assert!(deploy.declaration()["Configuration"].get("Capabilities").is_none());
    }
}

//! Pipeline and stage definitions.
//!
//! A pipeline is an ordered list of stages. Stages run one after another and
//! the actions inside a stage have no ordering between them, so an artifact is
//! only usable by actions in stages after the one that produces it.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::action::{Action, ActionCategory, BuildAction, DeployStackAction, SourceAction};
use crate::artifact::ArtifactName;
use crate::template::{Resource, Template, get_att, logical_id, reference, service_role};
use crate::{Error, Result};

/// Logical id of the bucket that stores artifacts between stages.
pub const ARTIFACTS_BUCKET_ID: &str = "ArtifactsBucket";
/// Logical id of the role the pipeline itself runs under.
pub const PIPELINE_ROLE_ID: &str = "PipelineRole";

/// A stage in a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    /// Stage name.
    pub name: String,
    /// Actions run when the stage starts.
    pub actions: Vec<Action>,
}

impl Stage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actions: Vec::new(),
        }
    }

    pub fn action(mut self, action: impl Into<Action>) -> Self {
        self.actions.push(action.into());
        self
    }
}

/// Collects stages and validates them into a [`Pipeline`].
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    name: String,
    stages: Vec<Stage>,
}

impl PipelineBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
        }
    }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn build(self) -> Result<Pipeline> {
        validate(&self.name, &self.stages)?;
        debug!(pipeline = %self.name, stages = self.stages.len(), "Pipeline validated");
        Ok(Pipeline {
            name: self.name,
            stages: self.stages,
        })
    }
}

/// A validated pipeline definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pipeline {
    name: String,
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Find an action by name along with the stage that holds it.
    pub fn action(&self, name: &str) -> Option<(&Stage, &Action)> {
        self.actions().find(|(_, a)| a.name() == name)
    }

    /// The action producing `artifact`, with its stage.
    pub fn producer_of(&self, artifact: &ArtifactName) -> Option<(&Stage, &Action)> {
        self.actions()
            .find(|(_, a)| a.outputs().contains(&artifact))
    }

    fn actions(&self) -> impl Iterator<Item = (&Stage, &Action)> {
        self.stages
            .iter()
            .flat_map(|s| s.actions.iter().map(move |a| (s, a)))
    }

    /// Logical id of the pipeline resource.
    pub fn logical_id(&self) -> String {
        logical_id(&self.name)
    }

    fn source_actions(&self) -> impl Iterator<Item = &SourceAction> {
        self.actions().filter_map(|(_, a)| match a {
            Action::Source(s) => Some(s),
            _ => None,
        })
    }

    fn build_actions(&self) -> impl Iterator<Item = &BuildAction> {
        self.actions().filter_map(|(_, a)| match a {
            Action::Build(b) => Some(b),
            _ => None,
        })
    }

    fn deploy_actions(&self) -> impl Iterator<Item = &DeployStackAction> {
        self.actions().filter_map(|(_, a)| match a {
            Action::Deploy(d) => Some(d),
            _ => None,
        })
    }

    /// Synthesize the template that creates this pipeline, its build projects,
    /// the roles they run under and the push webhooks of its sources.
    pub fn to_template(&self) -> Template {
        let mut template =
            Template::new().with_description(format!("Release pipeline {}", self.name));

        template.add_resource(
            ARTIFACTS_BUCKET_ID,
            Resource::new("AWS::S3::Bucket", json!({}))
                .attribute("UpdateReplacePolicy", json!("Retain"))
                .attribute("DeletionPolicy", json!("Retain")),
        );
        let bucket_access = json!({
            "Action": [
                "s3:GetObject*",
                "s3:GetBucket*",
                "s3:List*",
                "s3:DeleteObject*",
                "s3:PutObject*",
                "s3:Abort*",
            ],
            "Effect": "Allow",
            "Resource": [
                get_att(ARTIFACTS_BUCKET_ID, "Arn"),
                { "Fn::Join": ["", [get_att(ARTIFACTS_BUCKET_ID, "Arn"), "/*"]] },
            ],
        });

        let mut project_arns = Vec::new();
        for build in self.build_actions() {
            let project_id = build.project.logical_id();
            let role_id = build.project.role_logical_id();
            template.add_resource(
                role_id.clone(),
                service_role(
                    "codebuild.amazonaws.com",
                    &[],
                    vec![
                        json!({
                            "Action": [
                                "logs:CreateLogGroup",
                                "logs:CreateLogStream",
                                "logs:PutLogEvents",
                            ],
                            "Effect": "Allow",
                            "Resource": "*",
                        }),
                        bucket_access.clone(),
                    ],
                ),
            );
            template.add_resource(
                project_id.clone(),
                Resource::new(
                    "AWS::CodeBuild::Project",
                    json!({
                        "Name": build.project.name,
                        "Artifacts": { "Type": "CODEPIPELINE" },
                        "Environment": {
                            "ComputeType": build.project.environment.compute_type.to_string(),
                            "Image": build.project.environment.image.as_str(),
                            "ImagePullCredentialsType": "CODEBUILD",
                            "PrivilegedMode": false,
                            "Type": "LINUX_CONTAINER",
                        },
                        "ServiceRole": get_att(&role_id, "Arn"),
                        "Source": {
                            "Type": "CODEPIPELINE",
                            "BuildSpec": build.project.spec.to_document().to_string(),
                        },
                    }),
                ),
            );
            project_arns.push(get_att(&project_id, "Arn"));
        }

        let mut deploy_role_arns = Vec::new();
        for deploy in self.deploy_actions() {
            let role_id = deploy.role_logical_id();
            let statements = if deploy.admin_permissions {
                vec![json!({ "Action": "*", "Effect": "Allow", "Resource": "*" })]
            } else {
                vec![bucket_access.clone()]
            };
            template.add_resource(
                role_id.clone(),
                service_role("cloudformation.amazonaws.com", &[], statements),
            );
            deploy_role_arns.push(get_att(&role_id, "Arn"));
        }

        let mut pipeline_statements = vec![bucket_access];
        if !project_arns.is_empty() {
            pipeline_statements.push(json!({
                "Action": ["codebuild:BatchGetBuilds", "codebuild:StartBuild", "codebuild:StopBuild"],
                "Effect": "Allow",
                "Resource": project_arns,
            }));
        }
        if !deploy_role_arns.is_empty() {
            pipeline_statements.push(json!({
                "Action": [
                    "cloudformation:CreateStack",
                    "cloudformation:DescribeStack*",
                    "cloudformation:GetStackPolicy",
                    "cloudformation:GetTemplate*",
                    "cloudformation:SetStackPolicy",
                    "cloudformation:UpdateStack",
                    "cloudformation:ValidateTemplate",
                ],
                "Effect": "Allow",
                "Resource": "*",
            }));
            pipeline_statements.push(json!({
                "Action": "iam:PassRole",
                "Effect": "Allow",
                "Resource": deploy_role_arns,
            }));
        }
        template.add_resource(
            PIPELINE_ROLE_ID,
            service_role("codepipeline.amazonaws.com", &[], pipeline_statements),
        );

        let stages: Vec<Value> = self
            .stages
            .iter()
            .map(|stage| {
                let actions: Vec<Value> = stage.actions.iter().map(Action::declaration).collect();
                json!({
                    "Name": stage.name,
                    "Actions": actions,
                })
            })
            .collect();
        let pipeline_id = self.logical_id();
        template.add_resource(
            pipeline_id.clone(),
            Resource::new(
                "AWS::CodePipeline::Pipeline",
                json!({
                    "RoleArn": get_att(PIPELINE_ROLE_ID, "Arn"),
                    "ArtifactStore": {
                        "Type": "S3",
                        "Location": reference(ARTIFACTS_BUCKET_ID),
                    },
                    "RestartExecutionOnUpdate": false,
                    "Stages": stages,
                }),
            )
            .depends_on(PIPELINE_ROLE_ID),
        );

        for source in self.source_actions() {
            if let (Some(id), Some(webhook)) =
                (source.webhook_logical_id(), source.webhook(&pipeline_id))
            {
                template.add_resource(id, webhook);
            }
        }

        template
    }

    /// Human-readable stage topology.
    pub fn graph(&self) -> String {
        let mut lines = vec![format!("{} ({} stages)", self.name, self.stages.len())];
        for (idx, stage) in self.stages.iter().enumerate() {
            lines.push(format!("[{}] {}", idx + 1, stage.name));
            for action in &stage.actions {
                let inputs = join_names(&action.inputs());
                let target = match action {
                    Action::Deploy(d) => format!("stack {}", d.stack_name),
                    _ => join_names(&action.outputs()),
                };
                if inputs.is_empty() {
                    lines.push(format!("    {} ({}) -> {}", action.name(), action.category(), target));
                } else {
                    lines.push(format!(
                        "    {} ({}) {} -> {}",
                        action.name(),
                        action.category(),
                        inputs,
                        target
                    ));
                }
            }
        }
        lines.join("\n")
    }
}

fn join_names(names: &[&ArtifactName]) -> String {
    names
        .iter()
        .map(|n| n.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Check the structural rules every pipeline must satisfy.
fn validate(name: &str, stages: &[Stage]) -> Result<()> {
    if stages.is_empty() {
        return Err(Error::InvalidInput(
            "pipeline must declare at least one stage".to_string(),
        ));
    }

    let mut stage_names = HashSet::new();
    for (idx, stage) in stages.iter().enumerate() {
        if stage.actions.is_empty() {
            return Err(Error::InvalidInput(format!(
                "stage '{}' has no actions",
                stage.name
            )));
        }
        if !stage_names.insert(stage.name.as_str()) {
            return Err(Error::DuplicateName(format!("stage '{}'", stage.name)));
        }

        let mut action_names = HashSet::new();
        for action in &stage.actions {
            if !action_names.insert(action.name()) {
                return Err(Error::DuplicateName(format!(
                    "action '{}' in stage '{}'",
                    action.name(),
                    stage.name
                )));
            }

            let is_source = action.category() == ActionCategory::Source;
            if idx == 0 && !is_source {
                return Err(Error::InvalidInput(format!(
                    "first stage '{}' may only hold source actions, found '{}'",
                    stage.name,
                    action.name()
                )));
            }
            if idx > 0 && is_source {
                return Err(Error::InvalidInput(format!(
                    "source action '{}' must be in the first stage, found in '{}'",
                    action.name(),
                    stage.name
                )));
            }
        }
    }

    let mut producers: HashMap<&ArtifactName, (usize, &Action)> = HashMap::new();
    for (idx, stage) in stages.iter().enumerate() {
        for action in &stage.actions {
            for output in action.outputs() {
                if let Some((_, first)) = producers.insert(output, (idx, action)) {
                    return Err(Error::DuplicateArtifact {
                        artifact: output.to_string(),
                        first: first.name().to_string(),
                        second: action.name().to_string(),
                    });
                }
            }
        }
    }

    for (idx, stage) in stages.iter().enumerate() {
        for action in &stage.actions {
            let inputs = action.inputs();

            if let Action::Deploy(deploy) = action {
                for referenced in deploy.parameter_overrides.referenced_artifacts() {
                    if !inputs.contains(&referenced) {
                        return Err(Error::InvalidInput(format!(
                            "action '{}' overrides parameters from '{}' which is not one of its inputs",
                            action.name(),
                            referenced
                        )));
                    }
                }
            }

            for input in &inputs {
                match producers.get(*input) {
                    None => {
                        return Err(Error::UnknownArtifact {
                            action: action.name().to_string(),
                            artifact: input.to_string(),
                        });
                    }
                    Some((producer_idx, _)) if *producer_idx >= idx => {
                        return Err(Error::StageOrder {
                            action: action.name().to_string(),
                            stage: stage.name.clone(),
                            artifact: input.to_string(),
                            producer_stage: stages[*producer_idx].name.clone(),
                        });
                    }
                    Some(_) => {}
                }
            }

            if let Action::Deploy(deploy) = action {
                if let Some((_, Action::Build(build))) = producers.get(&deploy.template_path.artifact)
                {
                    if !build.declares_output(&deploy.template_path.file) {
                        return Err(Error::TemplateNotProduced {
                            path: deploy.template_path.to_string(),
                        });
                    }
                }
            }
        }
        debug!(stage = %stage.name, actions = stage.actions.len(), "Stage validated");
    }

    check_logical_ids(name, stages)
}

/// Every resource the pipeline template declares needs its own logical id.
fn check_logical_ids(name: &str, stages: &[Stage]) -> Result<()> {
    let mut owners: HashMap<String, String> = HashMap::new();
    let mut claim = |id: String, owner: String| -> Result<()> {
        if id.is_empty() {
            return Err(Error::InvalidInput(format!(
                "{} has no alphanumeric characters to form a resource id",
                owner
            )));
        }
        if let Some(first) = owners.get(&id) {
            return Err(Error::DuplicateName(format!(
                "resource id '{}' used by both {} and {}",
                id, first, owner
            )));
        }
        owners.insert(id, owner);
        Ok(())
    };

    claim(ARTIFACTS_BUCKET_ID.to_string(), "the artifact store".to_string())?;
    claim(PIPELINE_ROLE_ID.to_string(), "the pipeline role".to_string())?;
    claim(logical_id(name), format!("pipeline '{}'", name))?;

    for action in stages.iter().flat_map(|s| &s.actions) {
        match action {
            Action::Source(source) => {
                if let Some(id) = source.webhook_logical_id() {
                    claim(id, format!("webhook of '{}'", source.name))?;
                }
            }
            Action::Build(build) => {
                claim(
                    build.project.logical_id(),
                    format!("project '{}'", build.project.name),
                )?;
                claim(
                    build.project.role_logical_id(),
                    format!("role of project '{}'", build.project.name),
                )?;
            }
            Action::Deploy(deploy) => {
                claim(deploy.role_logical_id(), format!("role of '{}'", deploy.name))?;
            }
        }
    }

    Ok(())
}

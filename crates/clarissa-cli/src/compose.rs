//! Composition root: the function stack and the pipeline that delivers it.

use anyhow::Context;
use clarissa_config::ReleaseConfig;
use clarissa_core::Result;
use clarissa_core::action::DeployStackAction;
use clarissa_core::parameter::CodeParameters;
use clarissa_core::pipeline::{Pipeline, PipelineBuilder, Stage};
use clarissa_core::stack::FunctionStack;
use tracing::{debug, info};

use crate::units::{app_unit, infra_unit};

/// Name of the stack holding the pipeline itself.
pub const PIPELINE_STACK_NAME: &str = "PipelineStack";

/// Both stacks of a release.
#[derive(Debug, Clone)]
pub struct Release {
    pub function_stack: FunctionStack,
    pub pipeline: Pipeline,
}

/// Validate the config, then declare the function stack and the pipeline delivering it.
pub fn compose_release(config: &ReleaseConfig) -> anyhow::Result<Release> {
    config.validate().context("Invalid release config")?;

    let function_stack = FunctionStack::new(config.stack_name());
    info!(stack = %function_stack.name, "Declared function stack");

    let pipeline = pipeline_stack(config, function_stack.code())?;
    info!(
        pipeline = %pipeline.name(),
        stages = pipeline.stages().len(),
        "Composed release pipeline"
    );

    Ok(Release {
        function_stack,
        pipeline,
    })
}

/// Source, Build and Deploy stages over the two deployment units.
///
/// `code` is the placeholder declared by the function stack; it is bound here
/// to the application build's output location.
pub fn pipeline_stack(config: &ReleaseConfig, code: &CodeParameters) -> Result<Pipeline> {
    let credential = config.credential();
    let infra = infra_unit(config, &credential)?;
    let app = app_unit(config, &credential)?;
    debug!(
        infra = %config.infra_repository(),
        app = %config.app_repository(),
        "Declared deployment units"
    );

    let deploy = DeployStackAction::new(
        "Lambda_CFN_Deploy",
        config.stack_name(),
        infra.template_path().clone(),
    )
    .admin_permissions(true)
    .parameter_overrides(code.assign(&app.output().s3_location()))
    .extra_input(app.output());

    PipelineBuilder::new("Pipeline")
        .stage(
            Stage::new("Source")
                .action(app.source_action().clone())
                .action(infra.unit().source_action().clone()),
        )
        .stage(
            Stage::new("Build")
                .action(app.build_action().clone())
                .action(infra.unit().build_action().clone()),
        )
        .stage(Stage::new("Deploy").action(deploy))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clarissa_core::action::Action;
    use clarissa_core::artifact::ArtifactName;

    fn deploy_action(pipeline: &Pipeline) -> &DeployStackAction {
        match pipeline.action("Lambda_CFN_Deploy") {
            Some((_, Action::Deploy(d))) => d,
            other => panic!("expected deploy action, got {:?}", other),
        }
    }

    #[test]
    fn test_stage_order() {
        let release = compose_release(&ReleaseConfig::default()).unwrap();
        let names: Vec<_> = release
            .pipeline
            .stages()
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["Source", "Build", "Deploy"]);

        let source = release.pipeline.stage("Source").unwrap();
        assert_eq!(source.actions.len(), 2);
        let build = release.pipeline.stage("Build").unwrap();
        assert_eq!(build.actions.len(), 2);
    }

    #[test]
    fn test_clarissa_stack_template_path() {
        let release = compose_release(&ReleaseConfig::default()).unwrap();
        let deploy = deploy_action(&release.pipeline);

        assert_eq!(deploy.stack_name.as_str(), "ClarissaCdkStack");
        assert_eq!(
            deploy.template_path.to_string(),
            "CdkBuildOutput::ClarissaCdkStack.template.json"
        );
        assert!(deploy.admin_permissions);

        let (_, producer) = release
            .pipeline
            .producer_of(&deploy.template_path.artifact)
            .unwrap();
        assert_eq!(producer.name(), "CDK_Build");
    }

    #[test]
    fn test_deploy_stack_name_matches_template_file() {
        let config = ReleaseConfig {
            stack_name: "RenamedStack".to_string(),
            ..ReleaseConfig::default()
        };
        let release = compose_release(&config).unwrap();
        let deploy = deploy_action(&release.pipeline);

        assert_eq!(
            deploy.template_path.file,
            format!("{}.template.json", deploy.stack_name)
        );
    }

    #[test]
    fn test_extra_inputs_are_application_output() {
        let release = compose_release(&ReleaseConfig::default()).unwrap();
        let deploy = deploy_action(&release.pipeline);

        let extra: Vec<_> = deploy.extra_inputs.iter().map(|a| a.name().as_str()).collect();
        assert_eq!(extra, vec!["LambdaBuildOutput"]);
    }

    #[test]
    fn test_parameter_overrides_reference_application_output_only() {
        let release = compose_release(&ReleaseConfig::default()).unwrap();
        let deploy = deploy_action(&release.pipeline);
        let code = release.function_stack.code();

        let referenced: Vec<_> = deploy
            .parameter_overrides
            .referenced_artifacts()
            .into_iter()
            .collect();
        assert_eq!(referenced, vec![&ArtifactName::new("LambdaBuildOutput")]);
        assert!(deploy
            .parameter_overrides
            .get(code.bucket_name_parameter())
            .is_some());
        assert!(deploy
            .parameter_overrides
            .get(code.object_key_parameter())
            .is_some());
    }

    #[test]
    fn test_each_unit_has_one_output() {
        let release = compose_release(&ReleaseConfig::default()).unwrap();
        for stage in release.pipeline.stages().iter().take(2) {
            for action in &stage.actions {
                assert_eq!(action.outputs().len(), 1, "{}", action.name());
            }
        }
    }

    #[test]
    fn test_composition_is_idempotent() {
        let config = ReleaseConfig::default();
        let first = compose_release(&config).unwrap();
        let second = compose_release(&config).unwrap();

        assert_eq!(first.pipeline, second.pipeline);
        assert_eq!(
            first.pipeline.to_template().to_json_pretty().unwrap(),
            second.pipeline.to_template().to_json_pretty().unwrap()
        );
        assert_eq!(
            first.function_stack.template().to_json_pretty().unwrap(),
            second.function_stack.template().to_json_pretty().unwrap()
        );
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = ReleaseConfig {
            stack_name: String::new(),
            ..ReleaseConfig::default()
        };
        let err = compose_release(&config).unwrap_err();
        assert!(err.to_string().contains("Invalid release config"));
        assert!(err.downcast_ref::<clarissa_config::ConfigError>().is_some());
    }

    #[test]
    fn test_source_artifacts_are_named() {
        let release = compose_release(&ReleaseConfig::default()).unwrap();
        let source = release.pipeline.stage("Source").unwrap();
        let outputs: Vec<_> = source
            .actions
            .iter()
            .flat_map(|a| a.outputs())
            .map(|n| n.as_str().to_string())
            .collect();
        assert_eq!(
            outputs,
            vec!["Artifact_LambdaCode_Update", "Artifact_CDKCode_Update"]
        );
    }
}

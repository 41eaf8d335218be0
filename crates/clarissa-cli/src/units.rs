//! The two deployment units of the release: infrastructure and application.

use clarissa_config::ReleaseConfig;
use clarissa_core::Result;
use clarissa_core::action::{BuildAction, SourceAction};
use clarissa_core::artifact::{Artifact, ArtifactPath};
use clarissa_core::buildspec::{BuildProject, BuildSpec};
use clarissa_core::secret::SecretReference;
use clarissa_core::unit::DeploymentUnit;

/// Directory the infrastructure build synthesizes templates into.
const SYNTH_DIR: &str = "dist";

/// The infrastructure unit plus the path of the template its build emits.
#[derive(Debug, Clone)]
pub struct InfraUnit {
    unit: DeploymentUnit,
    template_path: ArtifactPath,
}

impl InfraUnit {
    pub fn unit(&self) -> &DeploymentUnit {
        &self.unit
    }

    /// The stack template inside the build output. Derived from the same stack
    /// name that selects the build's output file.
    pub fn template_path(&self) -> &ArtifactPath {
        &self.template_path
    }
}

/// Fetch the infrastructure repository and synthesize its stack template.
pub fn infra_unit(config: &ReleaseConfig, credential: &SecretReference) -> Result<InfraUnit> {
    let template_file = config.stack_name().template_file();

    let spec = BuildSpec::new()
        .install(["npm install"])
        .build(["npm run build", "npm run cdk synth -- -o dist"])
        .base_directory(SYNTH_DIR)
        .files([template_file.clone()]);
    let project = BuildProject::new("CdkBuild", spec).with_image(config.build_image());

    let source = SourceAction::new("CDKCode_Update", config.infra_repository(), credential);
    let output = Artifact::named("CdkBuildOutput");
    let template_path = output.at_path(template_file);
    let build = BuildAction::new("CDK_Build", project, source.output(), output);

    Ok(InfraUnit {
        unit: DeploymentUnit::new(source, build)?,
        template_path,
    })
}

/// Fetch the application repository and compile the function binary.
pub fn app_unit(config: &ReleaseConfig, credential: &SecretReference) -> Result<DeploymentUnit> {
    let spec = BuildSpec::new()
        .install([
            "echo CODEBUILD_SRC_DIR - $CODEBUILD_SRC_DIR",
            "echo GOPATH - $GOPATH",
            "echo GOROOT - $GOROOT",
        ])
        .build([
            "echo Build started on `date`",
            "echo Getting packages",
            "go get github.com/aws/aws-lambda-go/lambda",
            "go get github.com/wandersoulz/randomname",
            "echo Compiling the Go code...",
            "go build main.go",
        ])
        .files(["main", "first-names.txt"]);
    let project = BuildProject::new("LambdaBuild", spec).with_image(config.build_image());

    let source = SourceAction::new("LambdaCode_Update", config.app_repository(), credential);
    let build = BuildAction::new(
        "Lambda_Build",
        project,
        source.output(),
        Artifact::named("LambdaBuildOutput"),
    );

    DeploymentUnit::new(source, build)
}

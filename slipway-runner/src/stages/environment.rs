use tracing::info;

use super::{image_for, names};
use crate::context::keys;
use crate::error::Result;
use crate::invoker::ToolInvocation;
use crate::stage::{Stage, StageEnv};

/// Version probes, one per external tool the later stages need
const PROBES: &[(&str, &[&str])] = &[
    (keys::BUILD_TOOL, &["--version"]),
    (keys::SCANNER, &["--version"]),
    (keys::CONTAINER_ENGINE, &["--version"]),
    (keys::CLUSTER_CLI, &["version", "--client"]),
];

/// Probes the toolchain and publishes the image reference for this build
pub struct ComputeEnvironment;

impl Stage for ComputeEnvironment {
    fn name(&self) -> &'static str {
        names::COMPUTE_ENVIRONMENT
    }

    fn execute(&self, env: &StageEnv<'_>) -> Result<()> {
        for (key, args) in PROBES {
            env.run(&ToolInvocation::new(format!("${{{}}}", key)).args(args.iter().copied()))?;
        }

        let build = env.context.build_identifier();
        let image = image_for(env.config, build);
        env.context.set(keys::IMAGE_REFERENCE, image.to_string())?;

        info!("Build {} will publish {}", build, image);
        env.info(format!("BUILD_ID={}", build));
        env.info(format!("IMAGE_REFERENCE={}", image));
        env.info(format!("NAMESPACE={}", env.config.namespace));

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::service::LogBufferService;
    use crate::testing::{ScriptedInvoker, StageHarness};

    #[test]
    fn test_probes_tools_and_sets_image_reference() {
        let harness = StageHarness::new(ScriptedInvoker::new());
        ComputeEnvironment.execute(&harness.env()).unwrap();

        assert_eq!(
            harness.invoker.lines(),
            vec![
                "mvn --version",
                "sonar-scanner --version",
                "docker --version",
                "kubectl version --client",
            ]
        );
        assert_eq!(
            harness.context.get(keys::IMAGE_REFERENCE).unwrap(),
            "acme/orders:2024-06-01-42"
        );

        let log = harness.log.drain();
        assert!(log.iter().any(|e| e.message == "IMAGE_REFERENCE=acme/orders:2024-06-01-42"));
    }

    #[test]
    fn test_missing_tool_fails_before_publishing() {
        let harness = StageHarness::new(ScriptedInvoker::new().fail_on("docker --version", 127));
        let err = ComputeEnvironment.execute(&harness.env()).unwrap_err();

        assert!(matches!(err, PipelineError::ToolExecution { exit_code: 127, .. }));
        assert!(!harness.context.contains(keys::IMAGE_REFERENCE));
    }

    #[test]
    fn test_second_run_conflicts() {
        let harness = StageHarness::new(ScriptedInvoker::new());
        ComputeEnvironment.execute(&harness.env()).unwrap();

        let err = ComputeEnvironment.execute(&harness.env()).unwrap_err();
        assert!(matches!(err, PipelineError::ConfigurationConflict { ref key } if key == "IMAGE_REFERENCE"));
    }
}

//! The standard build-test-package-deploy stages
//!
//! [`standard`] returns them in the fixed order the engine runs them.

mod build;
mod cluster;
mod deploy;
mod downstream;
mod environment;
mod image;
mod scan;
mod workspace;

pub use build::{Build, Test};
pub use cluster::DiscoverClusterEndpoint;
pub use deploy::{Deploy, render_manifest};
pub use downstream::TriggerDownstream;
pub use environment::ComputeEnvironment;
pub use image::{BuildImage, CleanContainerState, PushImage};
pub use scan::Scan;
pub use workspace::WorkspaceClean;

use slipway_core::domain::identifier::{BuildIdentifier, ImageReference};

use crate::config::Config;
use crate::stage::Stage;

pub mod names {
    pub const WORKSPACE_CLEAN: &str = "workspace-clean";
    pub const COMPUTE_ENVIRONMENT: &str = "compute-environment";
    pub const DISCOVER_CLUSTER_ENDPOINT: &str = "discover-cluster-endpoint";
    pub const BUILD: &str = "build";
    pub const TEST: &str = "test";
    pub const SCAN: &str = "scan";
    pub const CLEAN_CONTAINER_STATE: &str = "clean-docker-state";
    pub const BUILD_IMAGE: &str = "build-image";
    pub const PUSH_IMAGE: &str = "push-image";
    pub const TRIGGER_DOWNSTREAM: &str = "trigger-downstream";
    pub const DEPLOY: &str = "deploy";
}

/// The standard stage list, in execution order
pub fn standard() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(WorkspaceClean),
        Box::new(ComputeEnvironment),
        Box::new(DiscoverClusterEndpoint),
        Box::new(Build),
        Box::new(Test),
        Box::new(Scan),
        Box::new(CleanContainerState),
        Box::new(BuildImage),
        Box::new(PushImage),
        Box::new(TriggerDownstream),
        Box::new(Deploy),
    ]
}

/// Image reference published for a build
pub(crate) fn image_for(config: &Config, build: &BuildIdentifier) -> ImageReference {
    ImageReference::for_build(&config.registry_account, &config.image_name, build)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::params;

    #[test]
    fn test_standard_order() {
        let stages: Vec<&str> = standard().iter().map(|s| s.name()).collect();
        assert_eq!(
            stages,
            vec![
                "workspace-clean",
                "compute-environment",
                "discover-cluster-endpoint",
                "build",
                "test",
                "scan",
                "clean-docker-state",
                "build-image",
                "push-image",
                "trigger-downstream",
                "deploy",
            ]
        );
    }

    #[test]
    fn test_only_test_stage_is_guarded() {
        for stage in standard() {
            match stage.guard() {
                Some(guard) => {
                    assert_eq!(stage.name(), names::TEST);
                    assert!(guard(&params(false)));
                    assert!(!guard(&params(true)));
                }
                None => assert_ne!(stage.name(), names::TEST),
            }
        }
    }
}

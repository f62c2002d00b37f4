use slipway_core::domain::run::RunParameters;

use super::names;
use crate::error::Result;
use crate::invoker::ToolInvocation;
use crate::stage::{Guard, Stage, StageEnv};

/// Compiles and installs the project, without running tests
pub struct Build;

impl Stage for Build {
    fn name(&self) -> &'static str {
        names::BUILD
    }

    fn execute(&self, env: &StageEnv<'_>) -> Result<()> {
        env.run(&ToolInvocation::new("${BUILD_TOOL}").args(["clean", "install", "-DskipTests"]))?;
        Ok(())
    }
}

/// Runs the test suite unless the run asked to skip it
pub struct Test;

fn tests_requested(params: &RunParameters) -> bool {
    !params.skip_tests
}

impl Stage for Test {
    fn name(&self) -> &'static str {
        names::TEST
    }

    fn guard(&self) -> Option<Guard> {
        Some(tests_requested)
    }

    fn execute(&self, env: &StageEnv<'_>) -> Result<()> {
        env.run(&ToolInvocation::new("${BUILD_TOOL}").arg("test"))?;
        Ok(())
    }
}

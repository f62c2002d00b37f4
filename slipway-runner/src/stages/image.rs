use tracing::warn;

use super::{image_for, names};
use crate::credentials::Binding;
use crate::error::Result;
use crate::invoker::ToolInvocation;
use crate::stage::{Stage, StageEnv};

const REGISTRY_USERNAME: &str = "REGISTRY_USERNAME";
const REGISTRY_PASSWORD: &str = "REGISTRY_PASSWORD";

fn engine() -> ToolInvocation {
    ToolInvocation::new("${CONTAINER_ENGINE}")
}

/// Prunes containers, networks and every local image
pub struct CleanContainerState;

impl Stage for CleanContainerState {
    fn name(&self) -> &'static str {
        names::CLEAN_CONTAINER_STATE
    }

    fn execute(&self, env: &StageEnv<'_>) -> Result<()> {
        env.run(&engine().args(["system", "prune", "-af"]))?;
        env.run(&engine().args(["network", "prune", "-f"]))?;

        let listed = env.run(&engine().args(["images", "-aq"]))?;
        let mut images: Vec<&str> = listed.stdout.split_whitespace().collect();
        images.sort_unstable();
        images.dedup();

        if images.is_empty() {
            env.info("No images left to remove");
            return Ok(());
        }

        env.run(&engine().args(["rmi", "-f"]).args(images))?;
        Ok(())
    }
}

/// Builds the image from the workspace, tagged with the build identifier
pub struct BuildImage;

impl Stage for BuildImage {
    fn name(&self) -> &'static str {
        names::BUILD_IMAGE
    }

    fn execute(&self, env: &StageEnv<'_>) -> Result<()> {
        if let Some(base) = &env.config.base_image {
            env.run(&engine().args(["pull", base.as_str()]))?;
        }

        env.run(&engine().args(["build", "-t", "${IMAGE_REFERENCE}", "."]))?;
        Ok(())
    }
}

/// Logs into the registry and publishes the image
pub struct PushImage;

impl Stage for PushImage {
    fn name(&self) -> &'static str {
        names::PUSH_IMAGE
    }

    fn execute(&self, env: &StageEnv<'_>) -> Result<()> {
        let bindings = [Binding::username_password(
            &env.config.credentials.registry,
            REGISTRY_USERNAME,
            REGISTRY_PASSWORD,
        )];

        env.with_credentials(&bindings, |scope| {
            env.run_with(
                scope,
                &engine()
                    .args(["login", "--username", "${REGISTRY_USERNAME}", "--password-stdin"])
                    .stdin("${REGISTRY_PASSWORD}"),
            )?;

            let pushed = push(env);

            // The engine stores the login on disk; drop it with the scope
            if let Err(e) = env.run_with(scope, &engine().arg("logout")) {
                warn!("Registry logout failed: {}", e);
                env.warn(format!("Registry logout failed: {}", e));
            }

            pushed
        })
    }
}

fn push(env: &StageEnv<'_>) -> Result<()> {
    env.run(&engine().args(["push", "${IMAGE_REFERENCE}"]))?;

    if env.config.push_latest {
        let latest = image_for(env.config, env.context.build_identifier()).with_tag("latest");
        env.run(&engine().args(["tag", "${IMAGE_REFERENCE}"]).arg(latest.to_string()))?;
        env.run(&engine().arg("push").arg(latest.to_string()))?;
    }

    Ok(())
}

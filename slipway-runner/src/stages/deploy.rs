use std::fs;
use std::path::Path;
use tracing::{info, warn};

use super::cluster::KUBECONFIG;
use super::names;
use crate::context::keys;
use crate::credentials::Binding;
use crate::error::{PipelineError, Result};
use crate::invoker::ToolInvocation;
use crate::stage::{Stage, StageEnv};

/// Renders the manifest with the build identifier and applies it
pub struct Deploy;

impl Stage for Deploy {
    fn name(&self) -> &'static str {
        names::DEPLOY
    }

    fn execute(&self, env: &StageEnv<'_>) -> Result<()> {
        // Tools run inside the workspace, so hand them an absolute path
        let path = std::path::absolute(env.config.manifest_path())?;
        let manifest = path.to_string_lossy().to_string();
        let build = env.context.build_identifier();
        env.context.get(keys::KUBE_SERVER_URL)?;

        // Rendering rewrites the file in place, so it may happen once per run
        env.context.set(keys::MANIFEST_RENDERED, manifest.as_str())?;

        let replaced = render_manifest(&path, &env.config.manifest_placeholder, build.as_str())?;
        if replaced == 0 {
            warn!(
                "Placeholder '{}' not found in {}; applying it unchanged",
                env.config.manifest_placeholder, manifest
            );
            env.warn(format!(
                "Placeholder '{}' not found in {}; applying it unchanged",
                env.config.manifest_placeholder, manifest
            ));
        } else {
            info!("Rendered {} with build {}", manifest, build);
            env.info(format!("Rendered {} ({} occurrence(s))", manifest, replaced));
        }

        let bindings = [Binding::file(&env.config.credentials.cluster, KUBECONFIG)];
        env.with_credentials(&bindings, |scope| {
            env.run_with(scope, &cluster_cli().args(["apply", "-f", manifest.as_str()]))?;
            env.run_with(scope, &cluster_cli().args(["get", "pods"]))?;
            Ok(())
        })
    }
}

fn cluster_cli() -> ToolInvocation {
    ToolInvocation::new("${CLUSTER_CLI}").args([
        "--server",
        "${KUBE_SERVER_URL}",
        "-n",
        "${NAMESPACE}",
    ])
}

/// Replaces every occurrence of `placeholder` in the file at `path`
///
/// The file is rewritten in place. Returns the number of replacements; zero
/// leaves the file untouched.
pub fn render_manifest(path: &Path, placeholder: &str, value: &str) -> Result<usize> {
    let manifest_error = |reason: String| PipelineError::Manifest {
        path: path.to_path_buf(),
        reason,
    };

    let template = fs::read_to_string(path).map_err(|e| manifest_error(e.to_string()))?;
    let count = template.matches(placeholder).count();
    if count == 0 {
        return Ok(0);
    }

    fs::write(path, template.replace(placeholder, value))
        .map_err(|e| manifest_error(e.to_string()))?;
    Ok(count)
}

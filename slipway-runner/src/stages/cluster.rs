use tracing::info;

use super::names;
use crate::context::keys;
use crate::credentials::Binding;
use crate::error::{PipelineError, Result};
use crate::invoker::ToolInvocation;
use crate::stage::{Stage, StageEnv};

/// Variable the cluster CLI reads its credentials file from
pub(crate) const KUBECONFIG: &str = "KUBECONFIG";

/// Reads the API server URL out of the cluster credentials
pub struct DiscoverClusterEndpoint;

impl Stage for DiscoverClusterEndpoint {
    fn name(&self) -> &'static str {
        names::DISCOVER_CLUSTER_ENDPOINT
    }

    fn execute(&self, env: &StageEnv<'_>) -> Result<()> {
        let bindings = [Binding::file(&env.config.credentials.cluster, KUBECONFIG)];

        let output = env.with_credentials(&bindings, |scope| {
            env.run_with(
                scope,
                &ToolInvocation::new("${CLUSTER_CLI}").args([
                    "config",
                    "view",
                    "--minify",
                    "-o",
                    "jsonpath={.clusters[0].cluster.server}",
                ]),
            )
        })?;

        let url = output.stdout.trim();
        if url.is_empty() {
            return Err(PipelineError::UnexpectedOutput(
                "cluster credentials name no API server".to_string(),
            ));
        }

        env.context.set(keys::KUBE_SERVER_URL, url)?;
        info!("Cluster API server is {}", url);
        env.info(format!("KUBE_SERVER_URL={}", url));

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{KUBE_URL, ScriptedInvoker, StageHarness};

    #[test]
    fn test_discovers_server_url() {
        let harness = StageHarness::new(ScriptedInvoker::happy_path());
        DiscoverClusterEndpoint.execute(&harness.env()).unwrap();

        assert_eq!(harness.context.get(keys::KUBE_SERVER_URL).unwrap(), KUBE_URL);

        let calls = harness.invoker.calls();
        assert_eq!(calls.len(), 1);
        let kubeconfig = calls[0].env.get(KUBECONFIG).unwrap();
        assert!(!harness.context.contains(KUBECONFIG));
        // Credential file is gone once the scope closes
        assert!(!std::path::Path::new(kubeconfig).exists());
    }

    #[test]
    fn test_empty_output_is_rejected() {
        let harness = StageHarness::new(ScriptedInvoker::new());
        let err = DiscoverClusterEndpoint.execute(&harness.env()).unwrap_err();

        assert!(matches!(err, PipelineError::UnexpectedOutput(_)));
        assert!(!harness.context.contains(keys::KUBE_SERVER_URL));
    }

    #[test]
    fn test_rediscovery_conflicts() {
        let harness = StageHarness::new(ScriptedInvoker::happy_path());
        DiscoverClusterEndpoint.execute(&harness.env()).unwrap();

        let err = DiscoverClusterEndpoint.execute(&harness.env()).unwrap_err();
        assert!(matches!(err, PipelineError::ConfigurationConflict { ref key } if key == "KUBE_SERVER_URL"));
        assert_eq!(harness.context.get(keys::KUBE_SERVER_URL).unwrap(), KUBE_URL);
    }

    #[test]
    fn test_missing_cluster_credential() {
        let mut harness = StageHarness::new(ScriptedInvoker::happy_path());
        harness.secrets = crate::credentials::StaticSecretSource::new();

        let err = DiscoverClusterEndpoint.execute(&harness.env()).unwrap_err();
        assert!(matches!(err, PipelineError::CredentialResolution { .. }));
        assert!(harness.invoker.calls().is_empty());
    }
}

//! Runner configuration
//!
//! Defines the process-wide settings shared by every run: tool locations,
//! image naming, credential ids, the downstream pipeline, and capture limits.
//! These are constants for the lifetime of the process and never per-run
//! state.

use std::path::PathBuf;

/// Names (or paths) of the external tools the stages call
#[derive(Debug, Clone)]
pub struct ToolPaths {
    pub build_tool: String,
    pub scanner: String,
    pub container_engine: String,
    pub cluster_cli: String,
    pub vcs: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            build_tool: "mvn".to_string(),
            scanner: "sonar-scanner".to_string(),
            container_engine: "docker".to_string(),
            cluster_cli: "kubectl".to_string(),
            vcs: "git".to_string(),
        }
    }
}

/// Credential ids looked up in the secret source
#[derive(Debug, Clone)]
pub struct CredentialIds {
    /// Username/password for the image registry
    pub registry: String,
    /// Token for the quality scanner server
    pub scanner: String,
    /// Kubeconfig file for the target cluster
    pub cluster: String,
}

impl Default for CredentialIds {
    fn default() -> Self {
        Self {
            registry: "registry".to_string(),
            scanner: "scanner-token".to_string(),
            cluster: "kubeconfig".to_string(),
        }
    }
}

/// Runner configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory the source is checked out into and tools run in
    pub workspace: PathBuf,

    /// Directory the build identifier artifact is written to
    pub artifact_dir: PathBuf,

    pub tools: ToolPaths,

    /// Cluster namespace deployments go to
    pub namespace: String,

    /// Registry account the image is published under
    pub registry_account: String,

    pub image_name: String,

    /// Optional base image pulled before the image build
    pub base_image: Option<String>,

    /// Also tag and push `:latest` after the build-tagged image
    pub push_latest: bool,

    pub scanner_host_url: String,

    /// Compiled-output path handed to the scanner
    pub scanner_binaries: String,

    /// Deployment manifest, relative to the workspace unless absolute
    pub manifest: PathBuf,

    /// Token in the manifest replaced by the build identifier
    pub manifest_placeholder: String,

    /// Pipeline triggered after the image is published
    pub downstream_pipeline: String,

    /// Base URL of the pipeline service that accepts trigger requests
    pub pipeline_service_url: String,

    /// Maximum bytes of combined output kept per tool invocation
    pub output_limit: usize,

    pub credentials: CredentialIds,
}

impl Config {
    /// Creates a configuration with defaults rooted at the given directories
    pub fn new(workspace: PathBuf, artifact_dir: PathBuf) -> Self {
        Self {
            workspace,
            artifact_dir,
            tools: ToolPaths::default(),
            namespace: "default".to_string(),
            registry_account: "slipway".to_string(),
            image_name: "app".to_string(),
            base_image: None,
            push_latest: false,
            scanner_host_url: "http://localhost:9000".to_string(),
            scanner_binaries: "target/classes".to_string(),
            manifest: PathBuf::from("deployment.yaml"),
            manifest_placeholder: "$IMAGE_TAG".to_string(),
            downstream_pipeline: "integration-tests".to_string(),
            pipeline_service_url: "http://localhost:8080".to_string(),
            output_limit: 64 * 1024,
            credentials: CredentialIds::default(),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Every variable is optional; unset or unparsable values keep the
    /// default:
    /// - SLIPWAY_WORKSPACE, SLIPWAY_ARTIFACT_DIR
    /// - SLIPWAY_BUILD_TOOL, SLIPWAY_SCANNER, SLIPWAY_CONTAINER_ENGINE,
    ///   SLIPWAY_CLUSTER_CLI, SLIPWAY_VCS
    /// - SLIPWAY_NAMESPACE, SLIPWAY_REGISTRY_ACCOUNT, SLIPWAY_IMAGE_NAME,
    ///   SLIPWAY_BASE_IMAGE, SLIPWAY_PUSH_LATEST
    /// - SLIPWAY_SCANNER_HOST_URL, SLIPWAY_SCANNER_BINARIES
    /// - SLIPWAY_MANIFEST, SLIPWAY_MANIFEST_PLACEHOLDER
    /// - SLIPWAY_DOWNSTREAM_PIPELINE, SLIPWAY_PIPELINE_SERVICE_URL
    /// - SLIPWAY_OUTPUT_LIMIT (bytes)
    /// - SLIPWAY_REGISTRY_CREDENTIAL, SLIPWAY_SCANNER_CREDENTIAL,
    ///   SLIPWAY_CLUSTER_CREDENTIAL
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let text = |key: &str, slot: &mut String| {
            if let Some(value) = lookup(key) {
                *slot = value;
            }
        };

        if let Some(dir) = lookup("SLIPWAY_WORKSPACE") {
            config.workspace = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("SLIPWAY_ARTIFACT_DIR") {
            config.artifact_dir = PathBuf::from(dir);
        }

        text("SLIPWAY_BUILD_TOOL", &mut config.tools.build_tool);
        text("SLIPWAY_SCANNER", &mut config.tools.scanner);
        text("SLIPWAY_CONTAINER_ENGINE", &mut config.tools.container_engine);
        text("SLIPWAY_CLUSTER_CLI", &mut config.tools.cluster_cli);
        text("SLIPWAY_VCS", &mut config.tools.vcs);

        text("SLIPWAY_NAMESPACE", &mut config.namespace);
        text("SLIPWAY_REGISTRY_ACCOUNT", &mut config.registry_account);
        text("SLIPWAY_IMAGE_NAME", &mut config.image_name);
        config.base_image = lookup("SLIPWAY_BASE_IMAGE").filter(|s| !s.trim().is_empty());
        config.push_latest = lookup("SLIPWAY_PUSH_LATEST")
            .and_then(|s| s.parse::<bool>().ok())
            .unwrap_or(false);

        text("SLIPWAY_SCANNER_HOST_URL", &mut config.scanner_host_url);
        text("SLIPWAY_SCANNER_BINARIES", &mut config.scanner_binaries);

        if let Some(manifest) = lookup("SLIPWAY_MANIFEST") {
            config.manifest = PathBuf::from(manifest);
        }
        text("SLIPWAY_MANIFEST_PLACEHOLDER", &mut config.manifest_placeholder);

        text("SLIPWAY_DOWNSTREAM_PIPELINE", &mut config.downstream_pipeline);
        text("SLIPWAY_PIPELINE_SERVICE_URL", &mut config.pipeline_service_url);

        config.output_limit = lookup("SLIPWAY_OUTPUT_LIMIT")
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(config.output_limit);

        text("SLIPWAY_REGISTRY_CREDENTIAL", &mut config.credentials.registry);
        text("SLIPWAY_SCANNER_CREDENTIAL", &mut config.credentials.scanner);
        text("SLIPWAY_CLUSTER_CREDENTIAL", &mut config.credentials.cluster);

        config
    }

    /// Absolute location of the deployment manifest
    pub fn manifest_path(&self) -> PathBuf {
        if self.manifest.is_absolute() {
            self.manifest.clone()
        } else {
            self.workspace.join(&self.manifest)
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        let tools = [
            ("build_tool", &self.tools.build_tool),
            ("scanner", &self.tools.scanner),
            ("container_engine", &self.tools.container_engine),
            ("cluster_cli", &self.tools.cluster_cli),
            ("vcs", &self.tools.vcs),
        ];
        for (name, value) in tools {
            if value.trim().is_empty() {
                anyhow::bail!("tool '{}' cannot be empty", name);
            }
        }

        if self.namespace.is_empty() {
            anyhow::bail!("namespace cannot be empty");
        }

        if self.registry_account.is_empty() || self.image_name.is_empty() {
            anyhow::bail!("registry_account and image_name cannot be empty");
        }

        if self.manifest_placeholder.is_empty() {
            anyhow::bail!("manifest_placeholder cannot be empty");
        }

        if self.downstream_pipeline.is_empty() {
            anyhow::bail!("downstream_pipeline cannot be empty");
        }

        if !self.pipeline_service_url.starts_with("http://")
            && !self.pipeline_service_url.starts_with("https://")
        {
            anyhow::bail!("pipeline_service_url must start with http:// or https://");
        }

        if self.output_limit == 0 {
            anyhow::bail!("output_limit must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(PathBuf::from("workspace"), PathBuf::from("artifacts"))
    }
}

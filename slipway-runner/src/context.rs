//! Environment context for a pipeline run
//!
//! Holds every variable a stage may reference: the invocation parameters,
//! static configuration values (tool locations, namespace, image names) and
//! computed identifiers. It is built once at run start and shared by
//! reference with every stage. A few values are discovered mid-run (the
//! cluster endpoint, the image reference); those are added with [`set`],
//! which refuses to touch a key that already exists.
//!
//! [`set`]: EnvironmentContext::set

use chrono::NaiveDate;
use slipway_core::domain::identifier::BuildIdentifier;
use slipway_core::domain::run::RunParameters;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use tracing::debug;

use crate::config::Config;
use crate::error::{PipelineError, Result};

/// Variable names used by the stages
pub mod keys {
    pub const REPOSITORY_URL: &str = "REPOSITORY_URL";
    pub const BRANCH: &str = "BRANCH";
    pub const SCANNER_PROJECT_KEY: &str = "SCANNER_PROJECT_KEY";
    pub const SKIP_TESTS: &str = "SKIP_TESTS";
    pub const RUN_NUMBER: &str = "RUN_NUMBER";
    pub const BUILD_ID: &str = "BUILD_ID";

    pub const BUILD_TOOL: &str = "BUILD_TOOL";
    pub const SCANNER: &str = "SCANNER";
    pub const CONTAINER_ENGINE: &str = "CONTAINER_ENGINE";
    pub const CLUSTER_CLI: &str = "CLUSTER_CLI";
    pub const VCS: &str = "VCS";

    pub const WORKSPACE: &str = "WORKSPACE";
    pub const NAMESPACE: &str = "NAMESPACE";
    pub const REGISTRY_ACCOUNT: &str = "REGISTRY_ACCOUNT";
    pub const IMAGE_NAME: &str = "IMAGE_NAME";
    pub const SCANNER_HOST_URL: &str = "SCANNER_HOST_URL";

    // Written once by the stage that discovers them
    pub const IMAGE_REFERENCE: &str = "IMAGE_REFERENCE";
    pub const KUBE_SERVER_URL: &str = "KUBE_SERVER_URL";
    pub const MANIFEST_RENDERED: &str = "MANIFEST_RENDERED";
}

/// Read access to a set of variables
///
/// Implemented by the run-wide [`EnvironmentContext`] and by credential
/// scopes, which layer secret bindings over it.
pub trait VarProvider {
    /// Gets a variable value
    fn get_var(&self, name: &str) -> Option<String>;

    /// All visible variables, exported to child processes
    fn vars(&self) -> Vec<(String, String)>;

    /// Masks any secret values contained in `text`
    fn redact(&self, text: &str) -> String {
        text.to_string()
    }
}

/// Run-wide, write-once variable store
pub struct EnvironmentContext {
    build: BuildIdentifier,
    vars: Mutex<HashMap<String, String>>,
}

impl EnvironmentContext {
    /// Computes the static values and the build identifier for a run
    ///
    /// # Arguments
    /// * `params` - Invocation parameters
    /// * `config` - Process-wide configuration
    /// * `run_number` - Monotonic run number from the hosting scheduler
    /// * `date` - Date the build identifier is stamped with
    pub fn initialize(
        params: &RunParameters,
        config: &Config,
        run_number: u64,
        date: NaiveDate,
    ) -> Self {
        let build = BuildIdentifier::new(date, run_number);

        let vars = HashMap::from([
            (keys::REPOSITORY_URL, params.repository_url.clone()),
            (keys::BRANCH, params.branch.clone()),
            (keys::SCANNER_PROJECT_KEY, params.scanner_project_key.clone()),
            (keys::SKIP_TESTS, params.skip_tests.to_string()),
            (keys::RUN_NUMBER, run_number.to_string()),
            (keys::BUILD_ID, build.to_string()),
            (keys::BUILD_TOOL, config.tools.build_tool.clone()),
            (keys::SCANNER, config.tools.scanner.clone()),
            (keys::CONTAINER_ENGINE, config.tools.container_engine.clone()),
            (keys::CLUSTER_CLI, config.tools.cluster_cli.clone()),
            (keys::VCS, config.tools.vcs.clone()),
            (keys::WORKSPACE, config.workspace.to_string_lossy().to_string()),
            (keys::NAMESPACE, config.namespace.clone()),
            (keys::REGISTRY_ACCOUNT, config.registry_account.clone()),
            (keys::IMAGE_NAME, config.image_name.clone()),
            (keys::SCANNER_HOST_URL, config.scanner_host_url.clone()),
        ]);

        debug!("Initialized environment for build {}", build);

        Self {
            build,
            vars: Mutex::new(vars.into_iter().map(|(k, v)| (k.to_string(), v)).collect()),
        }
    }

    /// The computed `<YYYY-MM-DD>-<run-number>` identifier
    pub fn build_identifier(&self) -> &BuildIdentifier {
        &self.build
    }

    /// Gets a variable, failing if it is not set
    pub fn get(&self, key: &str) -> Result<String> {
        self.lock()
            .get(key)
            .cloned()
            .ok_or_else(|| PipelineError::UndefinedVariable(key.to_string()))
    }

    /// Adds a variable that is not yet present
    ///
    /// Fails with `ConfigurationConflict` if the key already exists, whatever
    /// its current value.
    pub fn set(&self, key: &str, value: impl Into<String>) -> Result<()> {
        let mut vars = self.lock();
        if vars.contains_key(key) {
            return Err(PipelineError::ConfigurationConflict {
                key: key.to_string(),
            });
        }

        debug!("Context variable {} set", key);
        vars.insert(key.to_string(), value.into());
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    /// Sorted copy of every variable
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.vars.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl VarProvider for EnvironmentContext {
    fn get_var(&self, name: &str) -> Option<String> {
        self.lock().get(name).cloned()
    }

    fn vars(&self) -> Vec<(String, String)> {
        self.snapshot().into_iter().collect()
    }
}

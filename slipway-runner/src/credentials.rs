//! Credential scopes
//!
//! Secrets are resolved from a [`SecretSource`] only for the duration of a
//! [`with_credentials`] block. Inside the block they are visible through a
//! [`CredentialScope`] layered over the run's [`EnvironmentContext`]; the
//! context itself never sees them. When the block exits, on success, error
//! or unwind, the scope is dropped: secret buffers are zeroed and
//! materialized credential files are deleted.

use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::context::{EnvironmentContext, VarProvider};
use crate::error::{PipelineError, Result};

const MASK: &str = "****";

/// A secret value
///
/// Masked in `Debug` output and its buffer is zeroed on drop. Copies handed
/// to child processes through [`VarProvider`] are plain strings.
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The plain value, for handing to a child process
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({})", MASK)
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        let mut bytes = std::mem::take(&mut self.0).into_bytes();
        bytes.iter_mut().for_each(|b| *b = 0);
    }
}

/// External store that resolves credential ids
///
/// Username/password credentials are resolved as `<id>/username` and
/// `<id>/password`.
pub trait SecretSource: Send + Sync {
    fn resolve(&self, id: &str) -> Result<Secret>;
}

/// Reads secrets from `SLIPWAY_SECRET_<ID>` process environment variables
///
/// The id is upper-cased and `-`, `/`, `.` become `_`, so
/// `registry/password` is read from `SLIPWAY_SECRET_REGISTRY_PASSWORD`.
#[derive(Debug, Default, Clone)]
pub struct EnvSecretSource;

impl EnvSecretSource {
    pub fn variable_for(id: &str) -> String {
        let normalized: String = id
            .chars()
            .map(|c| match c {
                '-' | '/' | '.' => '_',
                c => c.to_ascii_uppercase(),
            })
            .collect();
        format!("SLIPWAY_SECRET_{}", normalized)
    }
}

impl SecretSource for EnvSecretSource {
    fn resolve(&self, id: &str) -> Result<Secret> {
        let variable = Self::variable_for(id);
        std::env::var(&variable)
            .map(Secret::new)
            .map_err(|_| PipelineError::CredentialResolution {
                id: id.to_string(),
                reason: format!("{} is not set", variable),
            })
    }
}

/// In-memory secret source
#[derive(Default)]
pub struct StaticSecretSource {
    secrets: HashMap<String, String>,
}

impl StaticSecretSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(id.into(), value.into());
        self
    }
}

impl SecretSource for StaticSecretSource {
    fn resolve(&self, id: &str) -> Result<Secret> {
        self.secrets
            .get(id)
            .map(|value| Secret::new(value.clone()))
            .ok_or_else(|| PipelineError::CredentialResolution {
                id: id.to_string(),
                reason: "unknown credential".to_string(),
            })
    }
}

/// How one credential is exposed inside a scope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// Single secret bound to one variable
    Secret { id: String, variable: String },

    /// Username and password bound to two variables
    UsernamePassword {
        id: String,
        username_variable: String,
        password_variable: String,
    },

    /// Secret written to a temporary file whose path is bound to `variable`
    File { id: String, variable: String },
}

impl Binding {
    pub fn secret(id: impl Into<String>, variable: impl Into<String>) -> Self {
        Binding::Secret {
            id: id.into(),
            variable: variable.into(),
        }
    }

    pub fn username_password(
        id: impl Into<String>,
        username_variable: impl Into<String>,
        password_variable: impl Into<String>,
    ) -> Self {
        Binding::UsernamePassword {
            id: id.into(),
            username_variable: username_variable.into(),
            password_variable: password_variable.into(),
        }
    }

    pub fn file(id: impl Into<String>, variable: impl Into<String>) -> Self {
        Binding::File {
            id: id.into(),
            variable: variable.into(),
        }
    }
}

/// Child view of the context with secret bindings layered on top
///
/// Only reachable as a borrow inside [`with_credentials`], so it cannot
/// outlive the block.
pub struct CredentialScope<'a> {
    parent: &'a EnvironmentContext,
    bound: HashMap<String, Secret>,
    /// Path bindings; the variable holds the file path, not the secret itself
    files: HashMap<String, CredentialFile>,
}

/// A materialized credential, deleted on drop
struct CredentialFile {
    file: NamedTempFile,
    content: Secret,
}

impl CredentialFile {
    fn path_string(&self) -> String {
        self.file.path().to_string_lossy().to_string()
    }
}

impl<'a> CredentialScope<'a> {
    fn open(
        parent: &'a EnvironmentContext,
        source: &dyn SecretSource,
        bindings: &[Binding],
    ) -> Result<Self> {
        let mut scope = Self {
            parent,
            bound: HashMap::new(),
            files: HashMap::new(),
        };

        for binding in bindings {
            match binding {
                Binding::Secret { id, variable } => {
                    scope.bind(variable, source.resolve(id)?)?;
                }
                Binding::UsernamePassword {
                    id,
                    username_variable,
                    password_variable,
                } => {
                    let username = source.resolve(&format!("{}/username", id))?;
                    let password = source.resolve(&format!("{}/password", id))?;
                    scope.bind(username_variable, username)?;
                    scope.bind(password_variable, password)?;
                }
                Binding::File { id, variable } => {
                    let content = source.resolve(id)?;
                    scope.claim(variable)?;
                    let file = materialize(id, &content)?;
                    scope
                        .files
                        .insert(variable.clone(), CredentialFile { file, content });
                }
            }
        }

        Ok(scope)
    }

    fn claim(&self, variable: &str) -> Result<()> {
        if self.parent.contains(variable)
            || self.bound.contains_key(variable)
            || self.files.contains_key(variable)
        {
            return Err(PipelineError::ConfigurationConflict {
                key: variable.to_string(),
            });
        }
        Ok(())
    }

    fn bind(&mut self, variable: &str, secret: Secret) -> Result<()> {
        self.claim(variable)?;
        self.bound.insert(variable.to_string(), secret);
        Ok(())
    }

    /// Names of the variables bound by this scope
    pub fn bound_variables(&self) -> Vec<&str> {
        self.bound
            .keys()
            .chain(self.files.keys())
            .map(String::as_str)
            .collect()
    }
}

impl VarProvider for CredentialScope<'_> {
    fn get_var(&self, name: &str) -> Option<String> {
        if let Some(secret) = self.bound.get(name) {
            return Some(secret.expose().to_string());
        }
        if let Some(file) = self.files.get(name) {
            return Some(file.path_string());
        }
        self.parent.get_var(name)
    }

    fn vars(&self) -> Vec<(String, String)> {
        let mut vars = self.parent.vars();
        vars.extend(
            self.bound
                .iter()
                .map(|(k, v)| (k.clone(), v.expose().to_string())),
        );
        vars.extend(
            self.files
                .iter()
                .map(|(k, f)| (k.clone(), f.path_string())),
        );
        vars
    }

    fn redact(&self, text: &str) -> String {
        // File contents are masked whole and trimmed, as tools often echo
        // them without the trailing newline
        let mut secrets: Vec<&str> = self
            .bound
            .values()
            .map(Secret::expose)
            .chain(self.files.values().flat_map(|f| {
                let content = f.content.expose();
                [content, content.trim()]
            }))
            .filter(|s| !s.is_empty())
            .collect();
        // Longest first so a secret containing another is masked whole
        secrets.sort_by_key(|s| std::cmp::Reverse(s.len()));

        let mut redacted = text.to_string();
        for secret in secrets {
            redacted = redacted.replace(secret, MASK);
        }
        redacted
    }
}

fn materialize(id: &str, content: &Secret) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("slipway-cred-")
        .tempfile()
        .map_err(|e| PipelineError::CredentialResolution {
            id: id.to_string(),
            reason: format!("failed to create credential file: {}", e),
        })?;
    file.write_all(content.expose().as_bytes())?;
    file.flush()?;
    Ok(file)
}

/// Runs `body` with the given credentials bound
///
/// Resolution failures abort before `body` runs. Whatever `body` returns is
/// passed back unchanged, after the scope has been torn down.
pub fn with_credentials<T>(
    context: &EnvironmentContext,
    source: &dyn SecretSource,
    bindings: &[Binding],
    body: impl FnOnce(&CredentialScope<'_>) -> Result<T>,
) -> Result<T> {
    let scope = CredentialScope::open(context, source, bindings)?;
    debug!("Credential scope opened: {}", scope.bound_variables().join(", "));

    let result = body(&scope);

    drop(scope);
    debug!("Credential scope closed");

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::testing::{date, params};
    use std::path::PathBuf;

    fn context() -> EnvironmentContext {
        EnvironmentContext::initialize(&params(false), &Config::default(), 1, date(2024, 6, 1))
    }

    fn source() -> StaticSecretSource {
        StaticSecretSource::new()
            .with("scanner-token", "s3cr3t-token")
            .with("registry/username", "deployer")
            .with("registry/password", "hunter2")
            .with("kubeconfig", "apiVersion: v1\nkind: Config\n")
    }

    #[test]
    fn test_secret_debug_is_masked() {
        let secret = Secret::new("hunter2");
        assert_eq!(format!("{:?}", secret), "Secret(****)");
        assert_eq!(secret.expose(), "hunter2");
    }

    #[test]
    fn test_env_secret_variable_name() {
        assert_eq!(
            EnvSecretSource::variable_for("registry/password"),
            "SLIPWAY_SECRET_REGISTRY_PASSWORD"
        );
        assert_eq!(
            EnvSecretSource::variable_for("scanner-token"),
            "SLIPWAY_SECRET_SCANNER_TOKEN"
        );
    }

    #[test]
    fn test_bindings_visible_only_inside_scope() {
        let ctx = context();
        let bindings = [
            Binding::secret("scanner-token", "SONAR_TOKEN"),
            Binding::username_password("registry", "REGISTRY_USERNAME", "REGISTRY_PASSWORD"),
        ];

        let seen = with_credentials(&ctx, &source(), &bindings, |scope| {
            assert_eq!(scope.get_var("SONAR_TOKEN").as_deref(), Some("s3cr3t-token"));
            assert_eq!(scope.get_var("REGISTRY_PASSWORD").as_deref(), Some("hunter2"));
            // Parent values stay visible
            assert_eq!(scope.get_var("BRANCH").as_deref(), Some("main"));
            let mut names = scope.bound_variables();
            names.sort();
            assert_eq!(names, ["REGISTRY_PASSWORD", "REGISTRY_USERNAME", "SONAR_TOKEN"]);
            // The context itself never receives the bindings
            assert!(ctx.get("SONAR_TOKEN").is_err());
            Ok(scope.vars().len())
        })
        .unwrap();

        assert!(seen > ctx.vars().len());
        assert!(matches!(
            ctx.get("SONAR_TOKEN"),
            Err(PipelineError::UndefinedVariable(_))
        ));
        assert!(ctx.get_var("REGISTRY_PASSWORD").is_none());
    }

    #[test]
    fn test_body_failure_propagates_after_cleanup() {
        let ctx = context();
        let bindings = [Binding::file("kubeconfig", "KUBECONFIG")];
        let mut path = PathBuf::new();

        let err = with_credentials(&ctx, &source(), &bindings, |scope| -> Result<()> {
            path = PathBuf::from(scope.get_var("KUBECONFIG").unwrap());
            assert!(path.exists());
            Err(PipelineError::ToolExecution {
                command: "kubectl apply".to_string(),
                exit_code: 1,
                output: String::new(),
            })
        })
        .unwrap_err();

        assert_eq!(err.exit_code(), Some(1));
        assert!(!path.exists(), "credential file must be removed");
        assert!(ctx.get("KUBECONFIG").is_err());
    }

    #[test]
    fn test_file_binding_content() {
        let ctx = context();
        let bindings = [Binding::file("kubeconfig", "KUBECONFIG")];

        let content = with_credentials(&ctx, &source(), &bindings, |scope| {
            let path = scope.get_var("KUBECONFIG").unwrap();
            Ok(std::fs::read_to_string(path)?)
        })
        .unwrap();

        assert!(content.starts_with("apiVersion: v1"));
    }

    #[test]
    fn test_unresolved_credential_skips_body() {
        let ctx = context();
        let bindings = [Binding::secret("missing", "TOKEN")];
        let mut ran = false;

        let err = with_credentials(&ctx, &source(), &bindings, |_| {
            ran = true;
            Ok(())
        })
        .unwrap_err();

        assert!(!ran);
        assert!(matches!(err, PipelineError::CredentialResolution { ref id, .. } if id == "missing"));
    }

    #[test]
    fn test_binding_cannot_shadow_context() {
        let ctx = context();
        let bindings = [Binding::secret("scanner-token", "BRANCH")];

        let err = with_credentials(&ctx, &source(), &bindings, |_| Ok(())).unwrap_err();
        assert!(matches!(err, PipelineError::ConfigurationConflict { ref key } if key == "BRANCH"));
    }

    #[test]
    fn test_redact_masks_bound_secrets() {
        let ctx = context();
        let bindings = [
            Binding::secret("scanner-token", "SONAR_TOKEN"),
            Binding::username_password("registry", "REGISTRY_USERNAME", "REGISTRY_PASSWORD"),
        ];

        let text = with_credentials(&ctx, &source(), &bindings, |scope| {
            Ok(scope.redact("login deployer:hunter2 with s3cr3t-token on main"))
        })
        .unwrap();

        assert_eq!(text, "login ****:**** with **** on main");
    }

    #[test]
    fn test_redact_masks_file_contents() {
        let ctx = context();
        let bindings = [Binding::file("kubeconfig", "KUBECONFIG")];

        let (whole, trimmed) = with_credentials(&ctx, &source(), &bindings, |scope| {
            Ok((
                scope.redact("config:\napiVersion: v1\nkind: Config\ndone"),
                scope.redact("config: apiVersion: v1\nkind: Config"),
            ))
        })
        .unwrap();

        assert_eq!(whole, "config:\n****done");
        assert_eq!(trimmed, "config: ****");
    }
}

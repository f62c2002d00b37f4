//! Test doubles shared by the runner's unit tests

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::NaiveDate;
use slipway_core::domain::run::{PipelineRun, RunParameters};
use slipway_core::dto::trigger::{TriggerAccepted, TriggerPipeline};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use crate::config::Config;
use crate::context::{EnvironmentContext, VarProvider};
use crate::credentials::StaticSecretSource;
use crate::error::{PipelineError, Result};
use crate::invoker::{ToolInvocation, ToolInvoker, ToolOutput};
use crate::repository::PipelineRepository;
use crate::service::{Dispatcher, InMemoryLogBuffer, Notifier};
use crate::stage::StageEnv;

pub const KUBE_URL: &str = "https://10.0.0.1:6443";

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn params(skip_tests: bool) -> RunParameters {
    RunParameters {
        repository_url: "https://git.example.com/orders.git".to_string(),
        branch: "main".to_string(),
        scanner_project_key: "orders".to_string(),
        skip_tests,
    }
}

pub fn secrets() -> StaticSecretSource {
    StaticSecretSource::new()
        .with("registry/username", "deployer")
        .with("registry/password", "hunter2")
        .with("scanner-token", "s3cr3t-token")
        .with("kubeconfig", "apiVersion: v1\nkind: Config\n")
}

/// One recorded invocation, after substitution
#[derive(Debug, Clone)]
pub struct Call {
    pub line: String,
    pub stdin: Option<String>,
    pub env: HashMap<String, String>,
}

struct Rule {
    pattern: String,
    exit_code: i32,
    stdout: String,
}

/// Invoker that records every call and replays scripted results
///
/// The first rule whose pattern is contained in the resolved command line
/// decides the result; unmatched calls succeed with empty output.
pub struct ScriptedInvoker {
    rules: Vec<Rule>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedInvoker {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Invoker under which the full standard pipeline succeeds
    pub fn happy_path() -> Self {
        Self::new().respond("config view", KUBE_URL)
    }

    pub fn respond(mut self, pattern: &str, stdout: &str) -> Self {
        self.rules.push(Rule {
            pattern: pattern.to_string(),
            exit_code: 0,
            stdout: stdout.to_string(),
        });
        self
    }

    pub fn fail_on(mut self, pattern: &str, exit_code: i32) -> Self {
        self.rules.insert(
            0,
            Rule {
                pattern: pattern.to_string(),
                exit_code,
                stdout: format!("{} failed", pattern),
            },
        );
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.line).collect()
    }

    pub fn ran(&self, fragment: &str) -> bool {
        self.lines().iter().any(|line| line.contains(fragment))
    }
}

impl ToolInvoker for ScriptedInvoker {
    fn run(&self, invocation: &ToolInvocation, vars: &dyn VarProvider) -> Result<ToolOutput> {
        let resolved = invocation.resolve(vars)?;
        let line = resolved.display(vars);

        self.calls.lock().unwrap().push(Call {
            line: line.clone(),
            stdin: resolved.stdin.clone(),
            env: resolved.env.iter().cloned().collect(),
        });

        let rule = self.rules.iter().find(|r| line.contains(&r.pattern));
        let (exit_code, stdout) = rule
            .map(|r| (r.exit_code, vars.redact(&r.stdout)))
            .unwrap_or((0, String::new()));

        if exit_code != 0 {
            return Err(PipelineError::ToolExecution {
                command: line,
                exit_code,
                output: stdout,
            });
        }

        Ok(ToolOutput {
            exit_code,
            output: stdout.clone(),
            stdout,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub enum TriggerBehavior {
    Accept,
    Fail,
    /// Never resolves, like a service that holds the request open
    Hang,
}

/// Pipeline repository that records trigger requests
pub struct RecordingRepository {
    behavior: TriggerBehavior,
    calls: Mutex<Vec<TriggerPipeline>>,
}

impl RecordingRepository {
    pub fn new(behavior: TriggerBehavior) -> Self {
        Self {
            behavior,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<TriggerPipeline> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PipelineRepository for RecordingRepository {
    async fn trigger(&self, req: TriggerPipeline) -> anyhow::Result<TriggerAccepted> {
        self.calls.lock().unwrap().push(req.clone());
        match self.behavior {
            TriggerBehavior::Accept => Ok(TriggerAccepted {
                run_id: uuid::Uuid::new_v4(),
                pipeline: req.pipeline,
                queued_at: chrono::Utc::now(),
            }),
            TriggerBehavior::Fail => Err(anyhow!("pipeline service unavailable")),
            TriggerBehavior::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }
}

/// Notifier that counts notifications
#[derive(Default)]
pub struct CountingNotifier {
    count: AtomicUsize,
}

impl CountingNotifier {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl Notifier for CountingNotifier {
    fn notify_failure(&self, _run: &PipelineRun) -> anyhow::Result<()> {
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Temporary workspace, artifact directory and manifest
pub struct Sandbox {
    _root: TempDir,
    pub config: Config,
}

impl Sandbox {
    pub const MANIFEST: &'static str =
        "spec:\n  containers:\n    - image: acme/orders:$IMAGE_TAG\n";

    pub fn new() -> Self {
        let root = TempDir::new().unwrap();
        let workspace = root.path().join("workspace");
        let artifacts = root.path().join("artifacts");
        let deploy_dir = root.path().join("deploy");
        std::fs::create_dir_all(&deploy_dir).unwrap();

        let manifest = deploy_dir.join("deployment.yaml");
        std::fs::write(&manifest, Self::MANIFEST).unwrap();

        let mut config = Config::new(workspace, artifacts);
        config.registry_account = "acme".to_string();
        config.image_name = "orders".to_string();
        config.manifest = manifest;

        Self {
            _root: root,
            config,
        }
    }

    pub fn manifest(&self) -> PathBuf {
        self.config.manifest_path()
    }
}

/// Runs a single stage body against a fresh context
pub struct StageHarness {
    pub sandbox: Sandbox,
    pub context: EnvironmentContext,
    pub invoker: ScriptedInvoker,
    pub secrets: StaticSecretSource,
    pub repository: Arc<RecordingRepository>,
    pub dispatcher: Dispatcher,
    pub log: InMemoryLogBuffer,
    pub params: RunParameters,
    pub runtime: tokio::runtime::Runtime,
}

impl StageHarness {
    pub fn new(invoker: ScriptedInvoker) -> Self {
        let sandbox = Sandbox::new();
        let params = params(false);
        let context = EnvironmentContext::initialize(&params, &sandbox.config, 42, date(2024, 6, 1));
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let repository = Arc::new(RecordingRepository::new(TriggerBehavior::Accept));
        let dispatcher = Dispatcher::new(runtime.handle().clone(), repository.clone());

        Self {
            sandbox,
            context,
            invoker,
            secrets: secrets(),
            repository,
            dispatcher,
            log: InMemoryLogBuffer::new(),
            params,
            runtime,
        }
    }

    pub fn env(&self) -> StageEnv<'_> {
        StageEnv::new(
            &self.params,
            &self.sandbox.config,
            &self.context,
            &self.invoker,
            &self.secrets,
            &self.dispatcher,
            &self.log,
        )
    }
}

//! External tool invocation
//!
//! Handles running the external tools the stages delegate to:
//! - Substituting `${VAR}` references from the caller's variables
//! - Exporting those variables to the child process environment
//! - Executing the process synchronously in the workspace
//! - Capturing and truncating combined output
//! - Turning a nonzero exit status into a `ToolExecution` error
//!
//! The exit status is the only thing used to decide success. Output is
//! returned for the caller to read but never inspected here.

use regex::Regex;
use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::LazyLock;
use std::thread;
use tracing::{debug, warn};

use crate::context::VarProvider;
use crate::error::{PipelineError, Result};

static VARIABLE_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid variable pattern"));

/// A command to run: program, arguments and optional stdin, all of which may
/// contain `${VAR}` references
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<String>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Text written to the process's stdin (e.g. a password)
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Resolves every variable reference against `vars`
    pub fn resolve(&self, vars: &dyn VarProvider) -> Result<ResolvedCommand> {
        let program = substitute(&self.program, vars)?;
        let args = self
            .args
            .iter()
            .map(|arg| substitute(arg, vars))
            .collect::<Result<Vec<_>>>()?;
        let stdin = self
            .stdin
            .as_deref()
            .map(|input| substitute(input, vars))
            .transpose()?;

        Ok(ResolvedCommand {
            program,
            args,
            stdin,
            env: vars.vars(),
        })
    }
}

impl fmt::Display for ToolInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// A command with every reference substituted, ready to dispatch
#[derive(Debug, Clone)]
pub struct ResolvedCommand {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<String>,
    /// Variables exported to the child environment
    pub env: Vec<(String, String)>,
}

impl ResolvedCommand {
    /// Command line for logs and errors, with secrets masked
    pub fn display(&self, vars: &dyn VarProvider) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        vars.redact(&line)
    }
}

/// Result of a successful invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub exit_code: i32,
    /// Captured stdout (redacted, untruncated)
    pub stdout: String,
    /// stdout followed by stderr, truncated to the output limit
    pub output: String,
}

/// Synchronous command-execution facade
pub trait ToolInvoker: Send + Sync {
    /// Runs the invocation with `vars` as its environment
    ///
    /// Blocks until the process exits. A nonzero exit status is returned as
    /// `PipelineError::ToolExecution`; no retries are attempted.
    fn run(&self, invocation: &ToolInvocation, vars: &dyn VarProvider) -> Result<ToolOutput>;
}

/// Replaces `${NAME}` references with values from `vars`
///
/// Only the `${NAME}` form is recognized; a bare `$NAME` is left as is.
pub fn substitute(template: &str, vars: &dyn VarProvider) -> Result<String> {
    let mut result = String::with_capacity(template.len());
    let mut last = 0;

    for caps in VARIABLE_REF.captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value = vars
            .get_var(name.as_str())
            .ok_or_else(|| PipelineError::UndefinedVariable(name.as_str().to_string()))?;

        result.push_str(&template[last..whole.start()]);
        result.push_str(&value);
        last = whole.end();
    }

    result.push_str(&template[last..]);
    Ok(result)
}

/// Keeps the last `limit` bytes of `text`, cut on a character boundary
///
/// Build tools report failures at the end of their output, so the tail is
/// what is kept.
pub fn truncate_output(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        return text.to_string();
    }

    let mut start = text.len() - limit;
    while !text.is_char_boundary(start) {
        start += 1;
    }

    format!("[truncated {} bytes]\n{}", start, &text[start..])
}

/// Runs tools as child processes
pub struct ProcessInvoker {
    /// Working directory for every process
    workdir: PathBuf,
    output_limit: usize,
}

impl ProcessInvoker {
    /// Creates a process invoker
    ///
    /// # Arguments
    /// * `workdir` - Working directory for every process (the workspace)
    /// * `output_limit` - Bytes of combined output kept per invocation
    pub fn new(workdir: PathBuf, output_limit: usize) -> Self {
        Self {
            workdir,
            output_limit,
        }
    }
}

impl ToolInvoker for ProcessInvoker {
    fn run(&self, invocation: &ToolInvocation, vars: &dyn VarProvider) -> Result<ToolOutput> {
        let resolved = invocation.resolve(vars)?;
        let command_line = resolved.display(vars);

        debug!("Executing: {}", command_line);

        let mut command = Command::new(&resolved.program);
        command
            .args(&resolved.args)
            .envs(resolved.env.iter().map(|(k, v)| (k, v)))
            .current_dir(&self.workdir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if resolved.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });

        let launch_error = |source| PipelineError::ToolLaunch {
            command: command_line.clone(),
            source,
        };

        let mut child = command.spawn().map_err(launch_error)?;
        let input = resolved.stdin.as_deref().zip(child.stdin.take());

        // The tool may exit, or fill its output pipes, before reading stdin;
        // only its exit status decides the outcome
        let output = thread::scope(|s| {
            if let Some((input, mut stdin)) = input {
                s.spawn(move || {
                    if let Err(e) = stdin.write_all(input.as_bytes()) {
                        if e.kind() != io::ErrorKind::BrokenPipe {
                            warn!("Writing stdin failed: {}", e);
                        }
                    }
                    // Dropping stdin closes it so the tool sees EOF
                });
            }
            child.wait_with_output()
        })
        .map_err(launch_error)?;

        let stdout = vars.redact(&String::from_utf8_lossy(&output.stdout));
        let stderr = vars.redact(&String::from_utf8_lossy(&output.stderr));
        let combined = truncate_output(&format!("{}{}", stdout, stderr), self.output_limit);
        let exit_code = output.status.code().unwrap_or(-1);

        if !output.status.success() {
            debug!(
                "Command failed: {} exit_code={} output_len={}",
                command_line,
                exit_code,
                combined.len()
            );
            return Err(PipelineError::ToolExecution {
                command: command_line,
                exit_code,
                output: combined,
            });
        }

        debug!(
            "Command completed successfully: stdout_len={}, stderr_len={}",
            stdout.len(),
            stderr.len()
        );

        Ok(ToolOutput {
            exit_code,
            stdout,
            output: combined,
        })
    }
}

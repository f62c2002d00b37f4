use std::fs;
use std::io;
use std::path::Path;

use super::names;
use crate::error::{PipelineError, Result};
use crate::invoker::ToolInvocation;
use crate::stage::{Stage, StageEnv};

/// Empties the workspace and checks out the requested branch into it
pub struct WorkspaceClean;

impl Stage for WorkspaceClean {
    fn name(&self) -> &'static str {
        names::WORKSPACE_CLEAN
    }

    fn execute(&self, env: &StageEnv<'_>) -> Result<()> {
        let workspace = &env.config.workspace;
        let removed = clean_dir(workspace)?;
        env.info(format!(
            "Cleaned workspace {} ({} entries removed)",
            workspace.display(),
            removed
        ));

        env.run(&ToolInvocation::new("${VCS}").args([
            "clone",
            "--branch",
            "${BRANCH}",
            "--single-branch",
            "${REPOSITORY_URL}",
            ".",
        ]))?;

        Ok(())
    }
}

/// Removes everything inside `dir`, creating it if missing
///
/// Returns the number of top-level entries removed.
pub(crate) fn clean_dir(dir: &Path) -> Result<usize> {
    if dir.parent().is_none() {
        return Err(PipelineError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("refusing to clean {}", dir.display()),
        )));
    }

    if !dir.exists() {
        fs::create_dir_all(dir)?;
        return Ok(0);
    }

    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() && !path.is_symlink() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
        removed += 1;
    }
    Ok(removed)
}

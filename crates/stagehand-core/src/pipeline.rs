use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::error::ActionError;
use crate::supervisor::Supervisor;

/// Default bound on waiting for a destroy action to finish.
pub const DEFAULT_DESTROY_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Options for destroying a pipeline (clap-free).
#[derive(Debug, Clone)]
pub struct DestroyOpts {
    pub name: String,
    pub namespace: String,
    /// Wait for the destruction to finish, streaming its logs
    pub wait: bool,
    pub destroy_volumes: bool,
    /// Zero waits forever
    pub timeout: Duration,
}

/// Destroy a pipeline and optionally wait until it is gone.
///
/// A pipeline that does not exist is returned as an error when not waiting.
/// When waiting, it is treated as already destroyed.
pub async fn destroy(supervisor: &Supervisor, opts: &DestroyOpts) -> Result<(), ActionError> {
    let handle = match supervisor.destroy(&opts.name, opts.destroy_volumes).await {
        Ok(handle) => Some(handle),
        Err(err) if err.is_not_found() && opts.wait => None,
        Err(err) => return Err(err),
    };

    if !opts.wait {
        supervisor.sink().success(&format!(
            "Pipeline '{}' scheduled for destruction",
            opts.name
        ));
        return Ok(());
    }

    if let Some(handle) = handle {
        supervisor
            .wait_until_finished(&opts.name, &opts.namespace, &handle, opts.timeout)
            .await?;
    }

    supervisor
        .sink()
        .success(&format!("Pipeline '{}' successfully destroyed", opts.name));
    Ok(())
}

/// Derive a pipeline name from a repository URL: the last path segment,
/// without a `.git` suffix, lower-cased.
///
/// Handles `https://host/org/repo.git`, `git@host:org/repo.git` and plain paths.
pub fn pipeline_name_from_repo_url(url: &str) -> Option<String> {
    let trimmed = url.trim().trim_end_matches('/');
    let last = trimmed.rsplit(['/', ':']).next()?;
    let name = last.strip_suffix(".git").unwrap_or(last);
    if name.is_empty() {
        None
    } else {
        Some(name.to_lowercase())
    }
}

/// Resolve the pipeline name from the `origin` remote of the git repository at `dir`.
pub async fn pipeline_name_from_git(dir: &Path) -> Result<String> {
    let output = tokio::process::Command::new("git")
        .args(["config", "--get", "remote.origin.url"])
        .current_dir(dir)
        .output()
        .await
        .context("Failed to run git")?;

    if !output.status.success() {
        anyhow::bail!(
            "Could not determine the repository of '{}'. Use --name to set the pipeline name.",
            dir.display()
        );
    }

    let url = String::from_utf8_lossy(&output.stdout);
    pipeline_name_from_repo_url(&url)
        .with_context(|| format!("Could not derive a pipeline name from '{}'", url.trim()))
}

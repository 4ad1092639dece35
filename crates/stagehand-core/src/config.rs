use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// File name looked up from the current directory upwards.
pub const CONFIG_FILE_NAME: &str = "stagehand.yaml";

/// Namespace used when neither the CLI nor the config names one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Contexts larger than this (in bytes) trigger the ignore-file advisory.
pub const LARGE_CONTEXT_THRESHOLD: u64 = 50_000_000;

/// Heartbeat of the trace consumer loop.
pub const DEFAULT_HEARTBEAT_SECS: u64 = 600;

/// Exit code a destroy command uses to report that the pipeline does not exist.
pub const DEFAULT_NOT_FOUND_EXIT_CODE: i32 = 44;

/// Top-level `stagehand.yaml` configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StagehandConfig {
    /// Namespace for remote actions
    pub namespace: Option<String>,

    pub trace: TraceSettings,

    pub pipeline: PipelineSettings,
}

/// Tunables for following a build trace.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TraceSettings {
    pub large_context_threshold: u64,
    pub heartbeat_secs: u64,
    /// Ignore file suggested when the build context is large
    pub ignore_file: String,
}

impl Default for TraceSettings {
    fn default() -> Self {
        Self {
            large_context_threshold: LARGE_CONTEXT_THRESHOLD,
            heartbeat_secs: DEFAULT_HEARTBEAT_SECS,
            ignore_file: ".stagehandignore".to_string(),
        }
    }
}

impl TraceSettings {
    /// Heartbeat period, never shorter than one second.
    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs.max(1))
    }
}

/// Shell commands backing the pipeline actions.
///
/// Each command runs through the platform shell with `STAGEHAND_PIPELINE_NAME`,
/// `STAGEHAND_NAMESPACE`, `STAGEHAND_ACTION_NAME` and `STAGEHAND_DESTROY_VOLUMES`
/// set in its environment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineSettings {
    /// Schedules the destruction; prints the action name as its last stdout line
    pub destroy: Option<String>,

    /// Blocks until the action has finished
    pub wait: Option<String>,

    /// Streams the action's logs to stdout
    pub logs: Option<String>,

    pub not_found_exit_code: i32,

    /// Seconds the log stream may keep draining after the action finished
    pub log_drain_secs: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            destroy: None,
            wait: None,
            logs: None,
            not_found_exit_code: DEFAULT_NOT_FOUND_EXIT_CODE,
            log_drain_secs: 5,
        }
    }
}

impl PipelineSettings {
    pub fn log_drain(&self) -> Duration {
        Duration::from_secs(self.log_drain_secs)
    }
}

impl StagehandConfig {
    /// Find `stagehand.yaml` by walking up from `start` and parse it.
    ///
    /// Returns the defaults and `None` when no config file exists.
    pub fn find_and_load(start: &Path) -> Result<(Self, Option<PathBuf>)> {
        match find_config(start) {
            Some(path) => {
                let config = Self::load(&path)?;
                Ok((config, Some(path)))
            }
            None => Ok((Self::default(), None)),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: StagehandConfig = yaml_serde::from_str(content)?;
        Ok(config)
    }

    /// Resolve the namespace: explicit value, then config, then [`DEFAULT_NAMESPACE`].
    pub fn namespace_or(&self, explicit: Option<&str>) -> String {
        explicit
            .filter(|ns| !ns.is_empty())
            .or(self.namespace.as_deref().filter(|ns| !ns.is_empty()))
            .unwrap_or(DEFAULT_NAMESPACE)
            .to_string()
    }
}

/// Walk up from `start` looking for [`CONFIG_FILE_NAME`].
pub fn find_config(start: &Path) -> Option<PathBuf> {
    let mut dir = start;
    loop {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_empty() {
        let config = StagehandConfig::parse("").expect("empty config");
        assert_eq!(config.trace.large_context_threshold, 50_000_000);
        assert_eq!(config.trace.heartbeat(), Duration::from_secs(600));
        assert_eq!(config.pipeline.not_found_exit_code, 44);
        assert!(config.pipeline.destroy.is_none());
    }

    #[test]
    fn test_parse_camel_case_sections() {
        let yaml = r#"
namespace: staging
trace:
  largeContextThreshold: 1000
  ignoreFile: .dockerignore
pipeline:
  destroy: ./scripts/destroy.sh
  wait: ./scripts/wait.sh
  notFoundExitCode: 3
  logDrainSecs: 0
"#;
        let config = StagehandConfig::parse(yaml).expect("valid config");
        assert_eq!(config.namespace.as_deref(), Some("staging"));
        assert_eq!(config.trace.large_context_threshold, 1000);
        assert_eq!(config.trace.heartbeat_secs, DEFAULT_HEARTBEAT_SECS);
        assert_eq!(config.trace.ignore_file, ".dockerignore");
        assert_eq!(config.pipeline.destroy.as_deref(), Some("./scripts/destroy.sh"));
        assert!(config.pipeline.logs.is_none());
        assert_eq!(config.pipeline.not_found_exit_code, 3);
        assert_eq!(config.pipeline.log_drain(), Duration::ZERO);
    }

    #[test]
    fn test_heartbeat_never_zero() {
        let settings = TraceSettings {
            heartbeat_secs: 0,
            ..TraceSettings::default()
        };
        assert_eq!(settings.heartbeat(), Duration::from_secs(1));
    }

    #[test]
    fn test_invalid_yaml_is_error() {
        assert!(StagehandConfig::parse("trace: [1, 2").is_err());
    }

    #[test]
    fn test_namespace_precedence() {
        let config = StagehandConfig {
            namespace: Some("from-config".into()),
            ..StagehandConfig::default()
        };
        assert_eq!(config.namespace_or(Some("cli")), "cli");
        assert_eq!(config.namespace_or(Some("")), "from-config");
        assert_eq!(config.namespace_or(None), "from-config");
        assert_eq!(StagehandConfig::default().namespace_or(None), "default");
    }

    #[test]
    fn test_find_and_load_walks_up() {
        let dir = tempfile::tempdir().expect("create temp dir");
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "namespace: outer\n")
            .expect("write config");
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested).expect("create nested");

        let (config, path) = StagehandConfig::find_and_load(&nested).expect("load");
        assert_eq!(config.namespace.as_deref(), Some("outer"));
        assert_eq!(path, Some(dir.path().join(CONFIG_FILE_NAME)));
    }

    #[test]
    fn test_find_and_load_without_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let (config, path) = StagehandConfig::find_and_load(dir.path()).expect("load");
        // A stagehand.yaml above the temp dir would be picked up; only assert when none was found.
        if path.is_none() {
            assert!(config.namespace.is_none());
        }
    }
}

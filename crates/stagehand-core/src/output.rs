use std::fmt;
use std::str::FromStr;

/// Which operation is being traced. Only selects user-facing verbs and
/// whether stage announcements are printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum OutputMode {
    #[default]
    Build,
    Destroy,
    Test,
}

impl OutputMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputMode::Build => "build",
            OutputMode::Destroy => "destroy",
            OutputMode::Test => "test",
        }
    }

    /// Spinner text shown while a step is producing command logs.
    pub fn progress_text(&self) -> &'static str {
        match self {
            OutputMode::Build => "Deploying your development environment...",
            OutputMode::Destroy => "Destroying your development environment...",
            OutputMode::Test => "Running tests...",
        }
    }

    /// Stage announcements are suppressed while running tests.
    pub fn announces_stages(&self) -> bool {
        !matches!(self, OutputMode::Test)
    }

    /// Parse a mode name, falling back to [`OutputMode::Build`] for anything unknown.
    pub fn from_name(name: &str) -> Self {
        name.parse().unwrap_or_default()
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "build" => Ok(OutputMode::Build),
            "destroy" => Ok(OutputMode::Destroy),
            "test" => Ok(OutputMode::Test),
            other => Err(format!("unknown output mode '{}'", other)),
        }
    }
}

/// Terminal output used by the trace display and the action supervisor.
///
/// There is a single active progress line per process. Implementations are
/// shared between tasks, but an operation owns the sink for its duration so
/// calls never interleave between operations.
pub trait OutputSink: Send + Sync {
    fn start_spinner(&self);

    fn stop_spinner(&self);

    fn set_spinner_text(&self, text: &str);

    /// Print a line to the scrollback.
    fn println(&self, line: &str);

    /// Set the stage the following output belongs to. Empty clears it.
    fn set_stage(&self, stage: &str);

    /// Informational notice (e.g. stage announcements, advisories).
    fn information(&self, message: &str);

    fn success(&self, message: &str);

    fn warning(&self, message: &str);
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_mode_parse_known() {
        assert_eq!("build".parse::<OutputMode>(), Ok(OutputMode::Build));
        assert_eq!("destroy".parse::<OutputMode>(), Ok(OutputMode::Destroy));
        assert_eq!("test".parse::<OutputMode>(), Ok(OutputMode::Test));
    }

    #[test]
    fn test_output_mode_unknown_falls_back_to_build() {
        assert!("deploy".parse::<OutputMode>().is_err());
        assert_eq!(OutputMode::from_name("deploy"), OutputMode::Build);
        assert_eq!(OutputMode::from_name(""), OutputMode::Build);
    }

    #[test]
    fn test_only_test_mode_suppresses_announcements() {
        assert!(OutputMode::Build.announces_stages());
        assert!(OutputMode::Destroy.announces_stages());
        assert!(!OutputMode::Test.announces_stages());
    }

    #[test]
    fn test_progress_text_per_mode() {
        assert_eq!(
            OutputMode::Destroy.progress_text(),
            "Destroying your development environment..."
        );
        assert_eq!(OutputMode::Test.progress_text(), "Running tests...");
    }
}

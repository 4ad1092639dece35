use serde::Deserialize;

/// Stage emitted once the remote command has finished; never rendered.
pub const DONE_STAGE: &str = "done";

/// Stage whose errors abort the whole invocation.
pub const LOAD_MANIFEST_STAGE: &str = "Load manifest";

/// One structured line from a step's command output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogRecord {
    pub stage: String,
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    #[default]
    Info,
    Debug,
    Warn,
    Error,
    #[serde(other)]
    Other,
}

impl LogRecord {
    pub fn is_error(&self) -> bool {
        self.level == LogLevel::Error
    }
}

/// Decode one JSON log line. Callers skip lines that fail to decode.
pub fn decode(line: &str) -> serde_json::Result<LogRecord> {
    serde_json::from_str(line)
}

/// Split a raw log payload into lines, dropping empty ones.
pub fn split_lines(data: &str) -> impl Iterator<Item = &str> {
    data.split('\n').filter(|line| !line.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_full_record() {
        let record = decode(r#"{"stage":"build","level":"error","message":"boom"}"#)
            .expect("valid record");
        assert_eq!(record.stage, "build");
        assert!(record.is_error());
        assert_eq!(record.message, "boom");
    }

    #[test]
    fn test_decode_unknown_level_is_not_error() {
        let record =
            decode(r#"{"stage":"s","level":"trace","message":"m"}"#).expect("valid record");
        assert_eq!(record.level, LogLevel::Other);
        assert!(!record.is_error());
    }

    #[test]
    fn test_decode_missing_stage_defaults_empty() {
        let record = decode(r#"{"message":"hello"}"#).expect("valid record");
        assert!(record.stage.is_empty());
        assert_eq!(record.level, LogLevel::Info);
    }

    #[test]
    fn test_decode_plain_text_fails() {
        assert!(decode("Step 1/3 : FROM alpine").is_err());
    }

    #[test]
    fn test_split_empty_payload_yields_nothing() {
        assert_eq!(split_lines("").count(), 0);
        assert_eq!(split_lines("\n\n").count(), 0);
    }

    #[test]
    fn test_split_keeps_order() {
        let lines: Vec<_> = split_lines("a\nb\n").collect();
        assert_eq!(lines, vec!["a", "b"]);
    }
}

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// One problem found while validating a configuration document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted location inside the document, e.g. `subagents.kube.mcp_servers`.
    pub path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("I/O error for {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{}", list_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn list_errors(errors: &[ValidationError]) -> String {
    let mut text = format!("configuration has {} error(s)", errors.len());
    for error in errors {
        text.push_str(&format!("\n  - {error}"));
    }
    text
}

impl ConfigError {
    pub fn errors(&self) -> &[ValidationError] {
        match self {
            ConfigError::Validation(errors) => errors,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_display_lists_every_error() {
        let error = ConfigError::Validation(vec![
            ValidationError::new("agents.triage.subagents", "unknown subagent 'logs'"),
            ValidationError::new("", "version must be \"1.0\""),
        ]);
        let text = error.to_string();
        assert!(text.starts_with("configuration has 2 error(s)"));
        assert!(text.contains("  - agents.triage.subagents: unknown subagent 'logs'"));
        assert!(text.contains("  - version must be"));
        assert_eq!(error.errors().len(), 2);
    }

    #[test]
    fn io_error_keeps_its_source() {
        use std::error::Error as _;

        let error = ConfigError::Io {
            path: PathBuf::from("config.yaml"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(error.to_string(), "I/O error for config.yaml: denied");
        assert!(error.source().is_some());
        assert!(error.errors().is_empty());
    }
}

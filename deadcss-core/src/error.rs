//! Typed error handling for deadcss.
//!
//! Markup and stylesheet parse failures carry the offending path and, where
//! the parser knows it, a line/column so the orchestrator can report a
//! skipped group precisely.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for deadcss operations.
#[derive(Error, Debug)]
pub enum DeadcssError {
    /// I/O error when reading/writing files
    #[error("I/O error at {path}: {message}")]
    Io {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Malformed markup or stylesheet
    #[error("Parse error in {path}{}: {message}", location_suffix(.line, .column))]
    Parse {
        path: PathBuf,
        message: String,
        /// Line number (1-indexed) if available
        line: Option<usize>,
        /// Column number (1-indexed) if available
        column: Option<usize>,
    },

    /// Configuration file errors
    #[error("Config error at {path}: {message}")]
    Config { path: PathBuf, message: String },

    /// Refused or failed rewrite of a stylesheet
    #[error("Fix error at {path}: {message}")]
    Fix { path: PathBuf, message: String },

    /// Invalid argument provided
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Generic internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

fn location_suffix(line: &Option<usize>, column: &Option<usize>) -> String {
    match (*line, *column) {
        (Some(l), Some(c)) => format!(" at {}:{}", l, c),
        (Some(l), None) => format!(" at line {}", l),
        _ => String::new(),
    }
}

impl DeadcssError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create a parse error without location.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
            line: None,
            column: None,
        }
    }

    /// Create a parse error with line/column info.
    pub fn parse_at(
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        line: usize,
        column: usize,
    ) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
            line: Some(line),
            column: Some(column),
        }
    }

    /// Create a config error.
    pub fn config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a fix error.
    pub fn fix(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Fix {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Attach a path to a parse error produced from in-memory text.
    ///
    /// Parsers work on strings and report an empty path; the orchestrator
    /// fills it in once it knows which file the text came from.
    pub fn at_path(self, new_path: impl Into<PathBuf>) -> Self {
        match self {
            Self::Parse {
                message,
                line,
                column,
                ..
            } => Self::Parse {
                path: new_path.into(),
                message,
                line,
                column,
            },
            other => other,
        }
    }

    /// Check if this is a recoverable error (the group is skipped, the run continues).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::Fix { .. } | Self::Io { .. })
    }

    /// Get the path associated with this error, if any.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Io { path, .. } => Some(path),
            Self::Parse { path, .. } => Some(path),
            Self::Config { path, .. } => Some(path),
            Self::Fix { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Convenience type alias for deadcss results.
pub type DeadcssResult<T> = Result<T, DeadcssError>;

/// Extension trait for converting std::io::Error with path context.
pub trait IoResultExt<T> {
    /// Add path context to an I/O error.
    fn with_path(self, path: impl Into<PathBuf>) -> DeadcssResult<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> DeadcssResult<T> {
        self.map_err(|e| DeadcssError::io(path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error() {
        let err = DeadcssError::io(
            PathBuf::from("/test/app.component.scss"),
            std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        );
        assert!(matches!(err, DeadcssError::Io { .. }));
        assert_eq!(err.path(), Some(&PathBuf::from("/test/app.component.scss")));
        assert!(err.to_string().contains("/test/app.component.scss"));
    }

    #[test]
    fn test_parse_error_with_location() {
        let err = DeadcssError::parse_at("/src/a.css", "unclosed block", 10, 5);
        if let DeadcssError::Parse { line, column, .. } = &err {
            assert_eq!(*line, Some(10));
            assert_eq!(*column, Some(5));
        } else {
            panic!("Expected Parse error");
        }
        assert!(err.to_string().contains("at 10:5"));
    }

    #[test]
    fn test_at_path_fills_parse_errors_only() {
        let err = DeadcssError::parse_at("", "bad", 1, 1).at_path("/x/a.html");
        assert_eq!(err.path(), Some(&PathBuf::from("/x/a.html")));

        let other = DeadcssError::InvalidArgument {
            message: "nope".into(),
        }
        .at_path("/x/a.html");
        assert!(other.path().is_none());
    }

    #[test]
    fn test_is_recoverable() {
        assert!(DeadcssError::parse("/test.css", "error").is_recoverable());
        assert!(DeadcssError::fix("/test.css", "symlink").is_recoverable());
        assert!(!DeadcssError::config("/deadcss.toml", "bad").is_recoverable());
    }

    #[test]
    fn test_io_result_ext() {
        let result: std::io::Result<()> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"));
        let deadcss_result = result.with_path("/missing/file.css");
        assert!(deadcss_result.is_err());
    }
}

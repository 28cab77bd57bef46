//! Compile-time diagnostics.
//!
//! The runtime crate's flat [`Error`] codes say *what* failed; a
//! [`ConfigError`] adds *where*: a short category string, a subtext
//! pinpointing the rule that fired, and the 1-based line and column of
//! the offending token. File-global errors (for example "no states")
//! carry line and column -1 and render without a position.

use std::path::{Path, PathBuf};

use surefire_core::Error;

use crate::token::Token;

/// A config compilation failure with source context.
#[derive(Debug, Clone)]
pub struct ConfigError {
    code: Error,
    category: &'static str,
    message: String,
    line: i32,
    col: i32,
    file: Option<PathBuf>,
    source_line: Option<String>,
}

impl ConfigError {
    /// Error at an explicit line and column.
    pub fn new(
        code: Error,
        category: &'static str,
        message: impl Into<String>,
        line: i32,
        col: i32,
    ) -> ConfigError {
        ConfigError {
            code,
            category,
            message: message.into(),
            line,
            col,
            file: None,
            source_line: None,
        }
    }

    /// Error at a token's position.
    pub fn at(
        code: Error,
        category: &'static str,
        message: impl Into<String>,
        tok: &Token,
    ) -> ConfigError {
        Self::new(code, category, message, tok.line, tok.col)
    }

    /// File-global error with no position.
    pub fn global(
        code: Error,
        category: &'static str,
        message: impl Into<String>,
    ) -> ConfigError {
        Self::new(code, category, message, -1, -1)
    }

    /// Attach the path of the config file being compiled.
    pub fn with_file(mut self, path: &Path) -> ConfigError {
        self.file = Some(path.to_path_buf());
        self
    }

    /// Attach the offending source line, for the caret rendering.
    /// No-op for file-global errors.
    pub fn with_source(mut self, source: &str) -> ConfigError {
        if self.line >= 1 {
            self.source_line = source
                .lines()
                .nth((self.line - 1) as usize)
                .map(|l| l.to_string());
        }
        self
    }

    /// The underlying error code.
    pub fn code(&self) -> Error {
        self.code
    }

    /// Category string, e.g. `state machine config error`.
    pub fn category(&self) -> &'static str {
        self.category
    }

    /// Subtext pinpointing the rule that fired.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// 1-based line of the offending token, or -1 when file-global.
    pub fn line(&self) -> i32 {
        self.line
    }

    /// 1-based column of the offending token, or -1 when file-global.
    pub fn col(&self) -> i32 {
        self.col
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(file) = &self.file {
            write!(f, "{}:", file.display())?;
        }
        if self.line >= 0 {
            write!(f, "{}:{}: ", self.line, self.col)?;
        } else if self.file.is_some() {
            write!(f, " ")?;
        }
        write!(f, "{}: {}", self.category, self.message)?;
        // Point a caret at the offending column when the source line is
        // available.
        if let Some(line) = &self.source_line {
            if self.col >= 1 {
                write!(f, "\n  {}\n  {}^", line, " ".repeat((self.col - 1) as usize))?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_position() {
        let err = ConfigError::new(Error::ExcElem, "expression error", "unknown element `x`", 3, 7);
        assert_eq!(err.to_string(), "3:7: expression error: unknown element `x`");
        assert_eq!(err.code(), Error::ExcElem);
    }

    #[test]
    fn test_display_with_caret() {
        let err = ConfigError::new(Error::SmcAssignElem, "state machine config error", "unknown element `bar`", 2, 5)
            .with_source("[Initial]\n    bar = 1\n");
        assert_eq!(
            err.to_string(),
            "2:5: state machine config error: unknown element `bar`\n      bar = 1\n      ^"
        );
    }

    #[test]
    fn test_display_global_with_file() {
        let err = ConfigError::global(Error::SmcNoStates, "state machine config error", "no states")
            .with_file(Path::new("foo.sm"));
        assert_eq!(
            err.to_string(),
            "foo.sm: state machine config error: no states"
        );
        assert_eq!(err.line(), -1);
        assert_eq!(err.col(), -1);
    }
}

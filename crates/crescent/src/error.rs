//! Compile errors and the result alias used throughout the crate.
//!
//! Every fallible step produces a [`CompileError`]; the first one wins and
//! aborts the pipeline. Parser alternatives use `CompileResult<Option<T>>`
//! where `Ok(None)` means "this production did not match" — any other layer
//! receiving `None` is a bug in the caller.

use std::fmt;

use crate::token::TokenKind;

/// Result alias for every fallible operation in the compiler.
pub type CompileResult<T> = Result<T, CompileError>;

/// A single diagnostic. The pipeline stops at the first one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileError {
    /// Human-readable message. May contain the `#t` marker, which renders as
    /// the spelling of [`CompileError::token`].
    pub message: String,
    /// 1-based source line, when the error points at source text.
    pub line: Option<u32>,
    /// Path of the file the error was raised in, when known.
    pub file: Option<String>,
    /// Token kind substituted for `#t` in the message.
    pub token: Option<TokenKind>,
}

impl CompileError {
    pub fn new(message: impl Into<String>, line: u32, file: &str) -> Self {
        Self {
            message: message.into(),
            line: if line == 0 { None } else { Some(line) },
            file: if file.is_empty() { None } else { Some(file.to_owned()) },
            token: None,
        }
    }

    /// An error with no source position, e.g. file I/O before parsing.
    pub fn bare(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
            file: None,
            token: None,
        }
    }

    pub fn with_token(mut self, token: TokenKind) -> Self {
        self.token = Some(token);
        self
    }

    /// The message with `#t` expanded. This is the spelling the error-test
    /// harness matches against, without the `(line N)` suffix.
    pub fn rendered_message(&self) -> String {
        match self.token {
            Some(token) => self.message.replace("#t", token.spelling()),
            None => self.message.clone(),
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered_message())?;
        if let Some(line) = self.line {
            write!(f, " (line {line})")?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_line_suffix() {
        let err = CompileError::new("Expected \";\"", 12, "a.cres");
        assert_eq!(err.to_string(), "Expected \";\" (line 12)");
    }

    #[test]
    fn bare_error_has_no_suffix() {
        let err = CompileError::bare("Failed to read file \"x\"");
        assert_eq!(err.to_string(), "Failed to read file \"x\"");
    }

    #[test]
    fn token_marker_expands() {
        let err = CompileError::new("Unexpected token \"#t\"", 3, "a.cres").with_token(TokenKind::Semicolon);
        assert_eq!(err.rendered_message(), "Unexpected token \";\"");
    }
}

//! Stream failure types.

use crate::task::BoxError;
use crate::token::{SourceLocation, UnclosedTag};

/// Errors that end a pipeline stream.
#[derive(Debug, thiserror::Error)]
pub enum HtmsError {
    #[error("Missing open tag: '{html}' at {location}")]
    MissingOpenTag {
        html: String,
        location: SourceLocation,
    },

    #[error("Mismatch close tag: expected '</{expected}>', got '{got}' at {location}")]
    MismatchedCloseTag {
        expected: String,
        got: String,
        location: SourceLocation,
    },

    #[error("{}", format_unclosed(.0))]
    MissingCloseTags(Vec<UnclosedTag>),

    #[error("Markup error: {0}")]
    Markup(String),

    #[error("Invalid UTF-8 in input at byte {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("Failed to resolve task '{name}': {source}")]
    Resolve {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("the task '{name}' should be a function, got '{kind}'")]
    NotCallable { name: String, kind: &'static str },

    #[error("No task found")]
    NoTaskFound,

    #[error("Input error: {0}")]
    Input(String),
}

impl HtmsError {
    /// Whether the error only flags an anomaly in otherwise complete output.
    pub fn is_advisory(&self) -> bool {
        matches!(self, Self::NoTaskFound)
    }

    /// Whether the error comes from malformed markup.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::MissingOpenTag { .. }
                | Self::MismatchedCloseTag { .. }
                | Self::MissingCloseTags(_)
                | Self::Markup(_)
        )
    }
}

impl From<std::io::Error> for HtmsError {
    fn from(err: std::io::Error) -> Self {
        HtmsError::Input(err.to_string())
    }
}

impl From<std::convert::Infallible> for HtmsError {
    fn from(err: std::convert::Infallible) -> Self {
        match err {}
    }
}

fn format_unclosed(tags: &[UnclosedTag]) -> String {
    let mut lines = vec![format!("Missing close tag(s): {}", tags.len())];
    lines.extend(tags.iter().map(ToString::to_string));
    lines.join("\n")
}

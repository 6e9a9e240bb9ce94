//! Error types for modelshot operations.
//!
//! [`ModelshotError`] is what every service operation returns. Callers use
//! [`ModelshotError::kind`] to decide how to surface it and
//! [`ModelshotError::client_message`] for the text that is safe to show.

use std::{borrow::Cow, io};

use thiserror::Error;

use modelshot_parser::ParseError;

use crate::{assets::AssetError, render::BrowserError, store::StoreError};

/// How an error is surfaced to the caller that triggered it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed payload or missing required input. Never retried.
    Validation,
    /// Unknown id or slug, or a model the caller does not own.
    NotFound,
    /// The operation needs an authenticated caller.
    Unauthenticated,
    /// A collaborator failed. Details are logged, not shown.
    Dependency,
}

/// The main error type for modelshot operations.
///
/// # Diagnostic Variants
///
/// The `Parse` variant keeps the payload text next to the structured
/// diagnostics so they can be rendered with source snippets.
#[derive(Debug, Error)]
pub enum ModelshotError {
    #[error("{err}")]
    Parse { err: ParseError, src: String },

    #[error("{0}")]
    Invalid(String),

    #[error("could not find the {0}")]
    NotFound(&'static str),

    #[error("authentication required")]
    Unauthenticated,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Asset store error: {0}")]
    Asset(#[from] AssetError),

    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ModelshotError {
    /// Create a new `Parse` error with the associated source text.
    pub fn new_parse_error(err: ParseError, src: impl Into<String>) -> Self {
        Self::Parse {
            err,
            src: src.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Parse { .. } | Self::Invalid(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Unauthenticated => ErrorKind::Unauthenticated,
            Self::Store(_) | Self::Asset(_) | Self::Browser(_) | Self::Io(_) => {
                ErrorKind::Dependency
            }
        }
    }

    /// The message a caller may see. Dependency failures are opaque.
    pub fn client_message(&self) -> Cow<'_, str> {
        match self.kind() {
            ErrorKind::Dependency => Cow::Borrowed("Something went wrong"),
            _ => Cow::Owned(self.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_errors_are_opaque() {
        let err = ModelshotError::from(StoreError::Conflict("version 3 exists".to_string()));
        assert_eq!(err.kind(), ErrorKind::Dependency);
        assert_eq!(err.client_message(), "Something went wrong");
        assert!(err.to_string().contains("version 3 exists"));
    }

    #[test]
    fn test_client_errors_keep_their_message() {
        let err = ModelshotError::NotFound("content model");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.client_message(), "could not find the content model");

        let err = ModelshotError::Invalid("Title is required".to_string());
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.client_message(), "Title is required");
    }
}

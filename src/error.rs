//! Error taxonomy for the synchronization and query core.
//!
//! Each variant maps to one failure class with its own recovery rule:
//!
//! | Variant | Scope | Recovery |
//! |---------|-------|----------|
//! | [`Error::Persistence`] | metadata file | fatal for the pass, nothing committed |
//! | [`Error::SourceFolder`] | source folder listing | fatal for the pass, nothing mutated |
//! | [`Error::DocumentRead`] | one document | document skipped, record left unadvanced |
//! | [`Error::IndexOperation`] | one document (sync) or the query | record left unadvanced / query aborted |
//! | [`Error::ChatService`] | the chat call | surfaced as the final failure |
//!
//! None of these are retried in-process. A document whose record was not
//! advanced is picked up again by the next pass.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("metadata store {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("source folder {}: {source}", path.display())]
    SourceFolder {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("cannot read document {file_name}: {reason}")]
    DocumentRead { file_name: String, reason: String },

    #[error("index operation failed: {0}")]
    IndexOperation(String),

    #[error("chat service error: {0}")]
    ChatService(String),
}

impl Error {
    pub(crate) fn persistence(path: impl Into<PathBuf>, source: impl Into<BoxError>) -> Self {
        Error::Persistence {
            path: path.into(),
            source: source.into(),
        }
    }

    pub(crate) fn document_read(file_name: &str, reason: impl ToString) -> Self {
        Error::DocumentRead {
            file_name: file_name.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn index(err: impl std::fmt::Display) -> Self {
        Error::IndexOperation(err.to_string())
    }

    pub(crate) fn chat(err: impl std::fmt::Display) -> Self {
        Error::ChatService(err.to_string())
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::index(err)
    }
}

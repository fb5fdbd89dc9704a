use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
pub enum CoreErrorKind {
    ProviderNotFound,
    ProviderExecutionFailed,
    ProviderTimeout,
    ResultParseError,
    InvalidInput,
    Internal,
}

#[derive(Clone, Debug, Eq, PartialEq, Error, Serialize)]
#[error("{kind:?}: {message}")]
pub struct CoreError {
    pub project: Option<PathBuf>,
    pub kind: CoreErrorKind,
    pub message: String,
}

impl CoreError {
    pub fn new(kind: CoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            project: None,
            kind,
            message: message.into(),
        }
    }

    pub fn for_project(
        project: impl Into<PathBuf>,
        kind: CoreErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            project: Some(project.into()),
            kind,
            message: message.into(),
        }
    }

    /// Fills in the owning project when the error was raised below the layer that knows it.
    pub fn attribute(self, project: &std::path::Path) -> Self {
        Self {
            project: self.project.or_else(|| Some(project.to_path_buf())),
            kind: self.kind,
            message: self.message,
        }
    }
}

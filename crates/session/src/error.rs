// Session error taxonomy.
//
// Every variant is recoverable: the REPL reports it and keeps reading input.
// Only `SessionLost` changes the top-level state (back to anonymous).

use mobilecoder_common::names::NameError;
use thiserror::Error;

use crate::auth::AuthError;
use crate::remote::StoreError;

/// What a cache lookup was resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Workspace,
    File,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Workspace => "workspace",
            Self::File => "file",
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    /// Bad or missing argument. No remote call was made.
    #[error("{0}")]
    Validation(String),

    /// Name did not resolve in the local cache. No remote call was made.
    #[error("{} `{name}` does not exist", kind.as_str())]
    NotFound { kind: EntityKind, name: String },

    /// A store call failed; local state is exactly as before the call.
    #[error("unable to {action}: {source}")]
    Remote {
        action: String,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Overwrite deleted the old file but could not create the replacement.
    #[error(
        "`{name}` was deleted remotely but its replacement could not be created ({source}); \
         run `refresh` to resynchronize"
    )]
    Inconsistent {
        name: String,
        #[source]
        source: StoreError,
    },

    /// A workspace cascade delete stopped at the first failing file.
    #[error(
        "stopped deleting workspace `{workspace}` after {deleted} file(s); \
         {remaining} file(s) and the workspace were kept: {source}"
    )]
    PartialDelete {
        workspace: String,
        deleted: usize,
        remaining: usize,
        #[source]
        source: StoreError,
    },

    /// Refresh could not reload the user; the session is signed out.
    #[error("refresh failed ({0}); returning to the initial state")]
    SessionLost(String),

    #[error("invalid command `{0}`; enter `help` for the available commands")]
    InvalidCommand(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SessionError {
    pub fn remote(action: impl Into<String>, source: StoreError) -> Self {
        Self::Remote { action: action.into(), source }
    }

    pub fn not_found(kind: EntityKind, name: impl Into<String>) -> Self {
        Self::NotFound { kind, name: name.into() }
    }

    /// Stable machine-readable code for structured output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_FAILED",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Remote { .. } => "REMOTE_FAILURE",
            Self::Auth(_) => "AUTH_FAILURE",
            Self::Inconsistent { .. } => "CONSISTENCY_WARNING",
            Self::PartialDelete { .. } => "PARTIAL_DELETE",
            Self::SessionLost(_) => "SESSION_LOST",
            Self::InvalidCommand(_) => "INVALID_COMMAND",
            Self::Io(_) => "IO_ERROR",
        }
    }

    /// Warnings are rendered differently from hard failures.
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::Inconsistent { .. })
    }
}

impl From<NameError> for SessionError {
    fn from(error: NameError) -> Self {
        Self::Validation(error.to_string())
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

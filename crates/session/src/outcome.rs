// Results of successfully executed commands, rendered by the front end.

use std::path::PathBuf;

use mobilecoder_common::types::FileId;
use serde::Serialize;

use crate::local_fs::DirEntry;
use crate::session::SessionState;

/// A file that `pull file` could not materialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PullFailure {
    pub file_name: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Nothing,
    Help { all: bool, state: SessionState },
    Clear,
    Listing { entries: Vec<DirEntry> },
    Quit,
    SignedUp { email: String },
    LoggedIn { name: String, workspaces: usize },
    SignedOut,
    Workspaces { names: Vec<String> },
    WorkspaceCreated { name: String },
    WorkspaceDeleted { name: String, files: usize },
    EnteredWorkspace { name: String, files: usize },
    LeftWorkspace { name: String },
    Files { names: Vec<String> },
    Viewed { file_name: String, contents: String },
    FileAdded { file_name: String },
    FileOverwritten { file_name: String, old_id: FileId, new_id: FileId },
    Pulled { written: Vec<PathBuf>, failed: Vec<PullFailure> },
    FileDeleted { file_name: String },
    Refreshed { workspaces: usize, workspace: Option<String> },
    /// Refresh found the current workspace gone; the session left it.
    WorkspaceRemoved { name: String },
    /// A confirmation gate was declined; nothing changed.
    Cancelled { reason: String },
}

impl Outcome {
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled { reason: reason.into() }
    }
}

// Remote document store boundary.
//
// The store owns users, workspaces and files and assigns every identifier.
// Bulk reads may omit file contents (`skip_contents`); single-file contents
// are fetched on demand with `get_file_contents`.

use std::future::Future;

use chrono::{DateTime, Utc};
use mobilecoder_common::types::{File, FileId, NewFile, User, UserId, Workspace, WorkspaceId};
use thiserror::Error;

/// Failure reported by a store call. Never fatal to the session.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("{0} not found in store")]
    NotFound(String),

    #[error("store is unavailable")]
    Unavailable,

    #[error("store error: {0}")]
    Backend(String),
}

/// Failure of the two-step overwrite performed by [`RemoteStore::replace_file`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReplaceError {
    /// The old file could not be deleted; nothing changed remotely.
    #[error("failed to delete the existing file: {0}")]
    Delete(#[source] StoreError),

    /// The old file was deleted but the replacement was not created. The
    /// caller's record now names a file that no longer exists remotely.
    #[error("existing file was deleted but its replacement could not be created: {0}")]
    Create(#[source] StoreError),
}

/// CRUD over the user → workspace → file tree, keyed by store identifiers.
///
/// All methods return `Send` futures so a session can be driven from a
/// multi-threaded tokio runtime.
pub trait RemoteStore: Send + Sync {
    /// Create the profile document for a freshly signed-up user.
    fn create_user(
        &self,
        uid: &UserId,
        name: &str,
        email: &str,
    ) -> impl Future<Output = Result<User, StoreError>> + Send;

    /// Load a user with all workspaces and their files. `Ok(None)` when the
    /// profile does not exist.
    fn get_user(
        &self,
        uid: &UserId,
        skip_contents: bool,
    ) -> impl Future<Output = Result<Option<User>, StoreError>> + Send;

    fn create_workspace(
        &self,
        uid: &UserId,
        name: &str,
        created_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<Workspace, StoreError>> + Send;

    /// Delete the workspace document only. Files are not cascaded here.
    fn delete_workspace(
        &self,
        uid: &UserId,
        wid: &WorkspaceId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn get_workspaces(
        &self,
        uid: &UserId,
        skip_contents: bool,
    ) -> impl Future<Output = Result<Vec<Workspace>, StoreError>> + Send;

    /// Create a file; the returned record has a new identifier and empty
    /// contents.
    fn create_file(
        &self,
        uid: &UserId,
        wid: &WorkspaceId,
        file: NewFile,
    ) -> impl Future<Output = Result<File, StoreError>> + Send;

    fn get_files(
        &self,
        uid: &UserId,
        wid: &WorkspaceId,
        skip_contents: bool,
    ) -> impl Future<Output = Result<Vec<File>, StoreError>> + Send;

    fn get_file_contents(
        &self,
        uid: &UserId,
        wid: &WorkspaceId,
        fid: &FileId,
    ) -> impl Future<Output = Result<String, StoreError>> + Send;

    fn delete_file(
        &self,
        uid: &UserId,
        wid: &WorkspaceId,
        fid: &FileId,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Overwrite a file by deleting it and creating a replacement.
    ///
    /// The store has no in-place update, so the replacement always carries a
    /// new identifier. If the delete succeeds and the create fails the old
    /// file is gone remotely; this is reported as [`ReplaceError::Create`].
    fn replace_file(
        &self,
        uid: &UserId,
        wid: &WorkspaceId,
        old: &FileId,
        file: NewFile,
    ) -> impl Future<Output = Result<File, ReplaceError>> + Send {
        async move {
            self.delete_file(uid, wid, old).await.map_err(ReplaceError::Delete)?;
            self.create_file(uid, wid, file).await.map_err(ReplaceError::Create)
        }
    }
}

// In-memory store and auth with failure injection.
//
// Clones share state, so a test can keep a handle to the store it gave to a
// session and mutate the "remote" side out of band, or arm failures for the
// next call of a given kind.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use mobilecoder_common::types::{File, FileId, NewFile, User, UserId, Workspace, WorkspaceId};

use crate::auth::{AuthError, AuthProvider, AuthUser, MIN_PASSWORD_CHARS};
use crate::remote::{RemoteStore, StoreError};

/// Store operations that can be armed to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    CreateUser,
    GetUser,
    CreateWorkspace,
    DeleteWorkspace,
    GetWorkspaces,
    CreateFile,
    GetFiles,
    GetFileContents,
    DeleteFile,
}

#[derive(Debug, Default)]
struct MemoryState {
    users: Vec<User>,
    /// Full file records including contents, keyed by file id.
    contents: HashMap<FileId, String>,
    next_id: u64,
    fail_next: HashMap<StoreOp, usize>,
    fail_always: Vec<StoreOp>,
    fail_deletes_of: Vec<FileId>,
    calls: HashMap<StoreOp, usize>,
}

impl MemoryState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    /// Record a call and decide whether it should fail.
    fn enter(&mut self, op: StoreOp) -> Result<(), StoreError> {
        *self.calls.entry(op).or_default() += 1;
        if self.fail_always.contains(&op) {
            return Err(StoreError::Unavailable);
        }
        if let Some(pending) = self.fail_next.get_mut(&op) {
            if *pending > 0 {
                *pending -= 1;
                return Err(StoreError::Unavailable);
            }
        }
        Ok(())
    }

    fn user_mut(&mut self, uid: &UserId) -> Result<&mut User, StoreError> {
        self.users
            .iter_mut()
            .find(|u| &u.id == uid)
            .ok_or_else(|| StoreError::NotFound(format!("user {uid}")))
    }

    fn workspace_mut(&mut self, uid: &UserId, wid: &WorkspaceId) -> Result<&mut Workspace, StoreError> {
        self.user_mut(uid)?
            .workspaces
            .iter_mut()
            .find(|w| &w.id == wid)
            .ok_or_else(|| StoreError::NotFound(format!("workspace {wid}")))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A panic while holding the lock only happens inside a failing test.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fail the next `times` calls of `op` with `Unavailable`.
    pub fn fail_next(&self, op: StoreOp, times: usize) {
        *self.lock().fail_next.entry(op).or_default() += times;
    }

    /// Fail every call of `op` until [`MemoryStore::heal`].
    pub fn fail_always(&self, op: StoreOp) {
        self.lock().fail_always.push(op);
    }

    /// Fail every delete of this particular file.
    pub fn fail_delete_of(&self, fid: &FileId) {
        self.lock().fail_deletes_of.push(fid.clone());
    }

    /// Clear all armed failures.
    pub fn heal(&self) {
        let mut state = self.lock();
        state.fail_next.clear();
        state.fail_always.clear();
        state.fail_deletes_of.clear();
    }

    pub fn calls(&self, op: StoreOp) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Snapshot of a user as stored, without contents.
    pub fn snapshot(&self, uid: &UserId) -> Option<User> {
        self.lock().users.iter().find(|u| &u.id == uid).cloned()
    }

    pub fn workspace_names(&self, uid: &UserId) -> Vec<String> {
        self.snapshot(uid)
            .map(|u| u.workspaces.into_iter().map(|w| w.name).collect())
            .unwrap_or_default()
    }

    pub fn file_names(&self, uid: &UserId, workspace: &str) -> Vec<String> {
        self.snapshot(uid)
            .and_then(|u| u.workspaces.into_iter().find(|w| w.name == workspace))
            .map(|w| w.files.iter().map(File::file_name).collect())
            .unwrap_or_default()
    }

    pub fn file_exists(&self, fid: &FileId) -> bool {
        self.lock().contents.contains_key(fid)
    }

    pub fn contents_of(&self, fid: &FileId) -> Option<String> {
        self.lock().contents.get(fid).cloned()
    }

    /// Remove a workspace and its files behind the session's back.
    pub fn remove_workspace_out_of_band(&self, uid: &UserId, name: &str) -> bool {
        let mut state = self.lock();
        let Ok(user) = state.user_mut(uid) else {
            return false;
        };
        let Some(index) = user.workspaces.iter().position(|w| w.name == name) else {
            return false;
        };
        let removed = user.workspaces.remove(index);
        for file in &removed.files {
            state.contents.remove(&file.id);
        }
        true
    }

    /// Remove a user profile behind the session's back.
    pub fn remove_user_out_of_band(&self, uid: &UserId) {
        self.lock().users.retain(|u| &u.id != uid);
    }
}

impl RemoteStore for MemoryStore {
    async fn create_user(&self, uid: &UserId, name: &str, email: &str) -> Result<User, StoreError> {
        let mut state = self.lock();
        state.enter(StoreOp::CreateUser)?;
        let user = User::new(uid.clone(), name, email);
        state.users.push(user.clone());
        Ok(user)
    }

    async fn get_user(&self, uid: &UserId, skip_contents: bool) -> Result<Option<User>, StoreError> {
        let mut state = self.lock();
        state.enter(StoreOp::GetUser)?;
        let Some(mut user) = state.users.iter().find(|u| &u.id == uid).cloned() else {
            return Ok(None);
        };
        if !skip_contents {
            for file in user.workspaces.iter_mut().flat_map(|w| w.files.iter_mut()) {
                file.contents = state.contents.get(&file.id).cloned().unwrap_or_default();
            }
        }
        Ok(Some(user))
    }

    async fn create_workspace(
        &self,
        uid: &UserId,
        name: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Workspace, StoreError> {
        let mut state = self.lock();
        state.enter(StoreOp::CreateWorkspace)?;
        let wid = WorkspaceId::new(state.next_id("ws"));
        let workspace = Workspace::new(wid, name, created_at);
        state.user_mut(uid)?.workspaces.push(workspace.clone());
        Ok(workspace)
    }

    async fn delete_workspace(&self, uid: &UserId, wid: &WorkspaceId) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.enter(StoreOp::DeleteWorkspace)?;
        let user = state.user_mut(uid)?;
        let before = user.workspaces.len();
        user.workspaces.retain(|w| &w.id != wid);
        if user.workspaces.len() == before {
            return Err(StoreError::NotFound(format!("workspace {wid}")));
        }
        Ok(())
    }

    async fn get_workspaces(
        &self,
        uid: &UserId,
        skip_contents: bool,
    ) -> Result<Vec<Workspace>, StoreError> {
        let mut state = self.lock();
        state.enter(StoreOp::GetWorkspaces)?;
        drop(state);
        Ok(self.get_user_unchecked(uid, skip_contents)?.workspaces)
    }

    async fn create_file(
        &self,
        uid: &UserId,
        wid: &WorkspaceId,
        file: NewFile,
    ) -> Result<File, StoreError> {
        let mut state = self.lock();
        state.enter(StoreOp::CreateFile)?;
        let fid = FileId::new(state.next_id("file"));
        let record = file.into_file(fid);
        let summary = record.without_contents();
        state.workspace_mut(uid, wid)?.files.push(summary.clone());
        state.contents.insert(record.id, record.contents);
        Ok(summary)
    }

    async fn get_files(
        &self,
        uid: &UserId,
        wid: &WorkspaceId,
        skip_contents: bool,
    ) -> Result<Vec<File>, StoreError> {
        let mut state = self.lock();
        state.enter(StoreOp::GetFiles)?;
        drop(state);
        self.get_user_unchecked(uid, skip_contents)?
            .workspaces
            .into_iter()
            .find(|w| &w.id == wid)
            .map(|w| w.files)
            .ok_or_else(|| StoreError::NotFound(format!("workspace {wid}")))
    }

    async fn get_file_contents(
        &self,
        uid: &UserId,
        wid: &WorkspaceId,
        fid: &FileId,
    ) -> Result<String, StoreError> {
        let mut state = self.lock();
        state.enter(StoreOp::GetFileContents)?;
        if !state.workspace_mut(uid, wid)?.files.iter().any(|f| &f.id == fid) {
            return Err(StoreError::NotFound(format!("file {fid}")));
        }
        state.contents.get(fid).cloned().ok_or_else(|| StoreError::NotFound(format!("file {fid}")))
    }

    async fn delete_file(&self, uid: &UserId, wid: &WorkspaceId, fid: &FileId) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.enter(StoreOp::DeleteFile)?;
        if state.fail_deletes_of.contains(fid) {
            return Err(StoreError::Unavailable);
        }
        let workspace = state.workspace_mut(uid, wid)?;
        let before = workspace.files.len();
        workspace.files.retain(|f| &f.id != fid);
        if workspace.files.len() == before {
            return Err(StoreError::NotFound(format!("file {fid}")));
        }
        state.contents.remove(fid);
        Ok(())
    }
}

impl MemoryStore {
    fn get_user_unchecked(&self, uid: &UserId, skip_contents: bool) -> Result<User, StoreError> {
        let state = self.lock();
        let mut user = state
            .users
            .iter()
            .find(|u| &u.id == uid)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("user {uid}")))?;
        if !skip_contents {
            for file in user.workspaces.iter_mut().flat_map(|w| w.files.iter_mut()) {
                file.contents = state.contents.get(&file.id).cloned().unwrap_or_default();
            }
        }
        Ok(user)
    }
}

#[derive(Debug, Default)]
struct AuthState {
    accounts: Vec<(AuthUser, String)>,
    next_id: u64,
    fail_signout: bool,
}

/// Plain-text credential table for tests and demos.
#[derive(Debug, Clone, Default)]
pub struct MemoryAuth {
    state: Arc<Mutex<AuthState>>,
}

impl MemoryAuth {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, AuthState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register an account directly, returning its uid.
    pub fn register(&self, email: &str, password: &str) -> UserId {
        let mut state = self.lock();
        state.next_id += 1;
        let uid = UserId::new(format!("uid-{}", state.next_id));
        state.accounts.push((AuthUser { uid: uid.clone(), email: email.to_string() }, password.into()));
        uid
    }

    pub fn fail_signout(&self, fail: bool) {
        self.lock().fail_signout = fail;
    }
}

impl AuthProvider for MemoryAuth {
    async fn signup(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        if password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(AuthError::WeakPassword);
        }
        if self.lock().accounts.iter().any(|(a, _)| a.email.eq_ignore_ascii_case(email)) {
            return Err(AuthError::EmailInUse);
        }
        let uid = self.register(email, password);
        Ok(AuthUser { uid, email: email.to_string() })
    }

    async fn login(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        self.lock()
            .accounts
            .iter()
            .find(|(a, p)| a.email.eq_ignore_ascii_case(email) && p == password)
            .map(|(a, _)| a.clone())
            .ok_or(AuthError::InvalidCredentials)
    }

    async fn signout(&self) -> Result<(), AuthError> {
        if self.lock().fail_signout {
            return Err(AuthError::Backend("signout rejected".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(name: &str) -> NewFile {
        NewFile { name: name.into(), extension: ".txt".into(), contents: "x".into(), source_path: None }
    }

    #[tokio::test]
    async fn fail_next_is_consumed_once() {
        let store = MemoryStore::new();
        let uid = UserId::new("u");
        store.create_user(&uid, "u", "u@x.com").await.unwrap();

        store.fail_next(StoreOp::CreateWorkspace, 1);
        assert_eq!(
            store.create_workspace(&uid, "a", Utc::now()).await,
            Err(StoreError::Unavailable)
        );
        assert!(store.create_workspace(&uid, "a", Utc::now()).await.is_ok());
        assert_eq!(store.calls(StoreOp::CreateWorkspace), 2);
    }

    #[tokio::test]
    async fn targeted_delete_failure_only_hits_that_file() {
        let store = MemoryStore::new();
        let uid = UserId::new("u");
        store.create_user(&uid, "u", "u@x.com").await.unwrap();
        let ws = store.create_workspace(&uid, "w", Utc::now()).await.unwrap();
        let a = store.create_file(&uid, &ws.id, draft("a")).await.unwrap();
        let b = store.create_file(&uid, &ws.id, draft("b")).await.unwrap();

        store.fail_delete_of(&b.id);
        assert!(store.delete_file(&uid, &ws.id, &a.id).await.is_ok());
        assert_eq!(store.delete_file(&uid, &ws.id, &b.id).await, Err(StoreError::Unavailable));
        assert!(store.file_exists(&b.id));
        assert!(!store.file_exists(&a.id));
    }

    #[tokio::test]
    async fn out_of_band_removal_is_visible_to_clones() {
        let store = MemoryStore::new();
        let handle = store.clone();
        let uid = UserId::new("u");
        store.create_user(&uid, "u", "u@x.com").await.unwrap();
        store.create_workspace(&uid, "w", Utc::now()).await.unwrap();

        assert!(handle.remove_workspace_out_of_band(&uid, "w"));
        assert!(store.get_user(&uid, true).await.unwrap().unwrap().workspaces.is_empty());
    }
}

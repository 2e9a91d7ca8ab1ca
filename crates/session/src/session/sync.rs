// Workspace and file synchronization operations.
//
// Each operation validates against the cache first, then calls the store,
// and only patches the tree and cache after the store call succeeded. A
// failed store call leaves local state untouched, with two documented
// exceptions: a cascade delete that stops part-way drops the files it did
// delete, and an overwrite whose recreate fails raises `needs_refresh`.

use chrono::Utc;
use mobilecoder_common::names::{file_name_of, split_file_name, validate_workspace_name};
use mobilecoder_common::types::{File, FileId, NewFile};
use tracing::{info, warn};

use super::Session;
use crate::auth::AuthProvider;
use crate::command::PullTarget;
use crate::error::{EntityKind, SessionError, SessionResult};
use crate::outcome::{Outcome, PullFailure};
use crate::prompt::Prompter;
use crate::remote::{RemoteStore, ReplaceError, StoreError};

impl<R: RemoteStore, A: AuthProvider> Session<R, A> {
    // ── Workspaces ──────────────────────────────────────────────────

    pub fn show_workspaces(&self) -> SessionResult<Outcome> {
        let names = self.signed_in()?.workspaces.iter().map(|w| w.name.clone()).collect();
        Ok(Outcome::Workspaces { names })
    }

    pub async fn create_workspace(&mut self, name: &str) -> SessionResult<Outcome> {
        validate_workspace_name(name)?;
        if self.cache.lookup_workspace(name).is_some() {
            return Err(SessionError::Validation(format!("workspace `{name}` already exists")));
        }

        let uid = self.signed_in()?.id.clone();
        let workspace =
            self.store.create_workspace(&uid, name, Utc::now()).await.map_err(|source| {
                warn!(workspace = %name, error = %source, "failed to create workspace");
                SessionError::remote("create workspace", source)
            })?;

        info!(workspace = %workspace.name, wid = %workspace.id, "created workspace");
        self.cache.on_workspace_created(&workspace);
        let name = workspace.name.clone();
        self.signed_in_mut()?.workspaces.push(workspace);
        Ok(Outcome::WorkspaceCreated { name })
    }

    pub fn use_workspace(&mut self, name: &str) -> SessionResult<Outcome> {
        let index = self
            .cache
            .lookup_workspace(name)
            .ok_or_else(|| SessionError::not_found(EntityKind::Workspace, name))?;
        let user = self
            .user
            .as_ref()
            .ok_or_else(|| SessionError::InvalidCommand("not signed in".into()))?;
        let workspace = user
            .workspaces
            .get(index)
            .ok_or_else(|| SessionError::not_found(EntityKind::Workspace, name))?;

        self.cache.index_files(workspace);
        let outcome =
            Outcome::EnteredWorkspace { name: workspace.name.clone(), files: workspace.files.len() };
        info!(workspace = %workspace.name, "entered workspace");
        self.current = Some(index);
        Ok(outcome)
    }

    pub fn leave_workspace(&mut self) -> SessionResult<Outcome> {
        let name = self.workspace()?.name.clone();
        self.cache.clear_files();
        self.current = None;
        info!(workspace = %name, "left workspace");
        Ok(Outcome::LeftWorkspace { name })
    }

    /// Delete a workspace and, first, every file in it.
    ///
    /// Files are deleted one at a time in order. The first failing delete
    /// stops the cascade: the workspace and the remaining files are kept,
    /// and the files already deleted are dropped from the local tree so it
    /// matches the store.
    pub async fn delete_workspace(
        &mut self,
        name: &str,
        prompter: &mut dyn Prompter,
    ) -> SessionResult<Outcome> {
        let index = self
            .cache
            .lookup_workspace(name)
            .ok_or_else(|| SessionError::not_found(EntityKind::Workspace, name))?;
        let user = self.signed_in()?;
        let workspace = user
            .workspaces
            .get(index)
            .ok_or_else(|| SessionError::not_found(EntityKind::Workspace, name))?;
        let (uid, wid, workspace_name) =
            (user.id.clone(), workspace.id.clone(), workspace.name.clone());
        let file_ids: Vec<FileId> = workspace.files.iter().map(|f| f.id.clone()).collect();

        if !prompter.confirm(&format!(
            "Deleting workspace `{workspace_name}` also deletes its {} file(s). Continue?",
            file_ids.len()
        )) {
            return Ok(Outcome::cancelled(format!("did not delete workspace `{workspace_name}`")));
        }

        let mut deleted = 0;
        for fid in &file_ids {
            if let Err(source) = self.store.delete_file(&uid, &wid, fid).await {
                let remaining = file_ids.len() - deleted;
                warn!(
                    workspace = %workspace_name,
                    file_id = %fid,
                    deleted,
                    remaining,
                    error = %source,
                    "cascade delete stopped"
                );
                self.drop_leading_files(index, deleted)?;
                return Err(SessionError::PartialDelete {
                    workspace: workspace_name,
                    deleted,
                    remaining,
                    source,
                });
            }
            deleted += 1;
        }

        if let Err(source) = self.store.delete_workspace(&uid, &wid).await {
            warn!(workspace = %workspace_name, error = %source, "failed to delete workspace document");
            self.drop_leading_files(index, deleted)?;
            return Err(SessionError::remote("delete workspace", source));
        }

        self.signed_in_mut()?.workspaces.remove(index);
        self.cache.on_workspace_deleted(index);
        info!(workspace = %workspace_name, files = deleted, "deleted workspace");
        Ok(Outcome::WorkspaceDeleted { name: workspace_name, files: deleted })
    }

    fn drop_leading_files(&mut self, index: usize, count: usize) -> SessionResult<()> {
        if let Some(workspace) = self.signed_in_mut()?.workspaces.get_mut(index) {
            workspace.files.drain(..count.min(workspace.files.len()));
        }
        Ok(())
    }

    // ── Files ───────────────────────────────────────────────────────

    pub fn show_files(&self) -> SessionResult<Outcome> {
        let names = self.workspace()?.files.iter().map(File::file_name).collect();
        Ok(Outcome::Files { names })
    }

    /// Fetch a single file's contents for display.
    pub async fn view_file(&mut self, name: &str) -> SessionResult<Outcome> {
        let file = self.resolve_file(name)?.clone();
        let contents = self.fetch_contents(&file, "view file").await?;
        Ok(Outcome::Viewed { file_name: file.file_name(), contents })
    }

    /// Upload a local file. A name collision offers to overwrite instead.
    pub async fn add_file(
        &mut self,
        path: &str,
        prompter: &mut dyn Prompter,
    ) -> SessionResult<Outcome> {
        let draft = self.read_local_file(path)?;
        let file_name = draft.file_name();

        if let Some(index) = self.cache.lookup_file(&file_name) {
            if !prompter.confirm(&format!(
                "`{file_name}` already exists in this workspace. Overwrite it?"
            )) {
                return Ok(Outcome::cancelled(format!("did not add `{file_name}`")));
            }
            return self.replace_at(index, draft).await;
        }

        let (uid, wid) = self.workspace_ids()?;
        let file = self.store.create_file(&uid, &wid, draft).await.map_err(|source| {
            warn!(file = %file_name, error = %source, "failed to add file");
            SessionError::remote("add file", source)
        })?;

        info!(file = %file_name, file_id = %file.id, "added file");
        self.cache.on_file_created(&file);
        self.workspace_mut()?.files.push(file.without_contents());
        Ok(Outcome::FileAdded { file_name })
    }

    /// Replace a stored file with the local file at `path`.
    pub async fn overwrite_file(&mut self, path: &str) -> SessionResult<Outcome> {
        let file_name = file_name_of(path)?;
        let index = self
            .cache
            .lookup_file(&file_name)
            .ok_or_else(|| SessionError::not_found(EntityKind::File, file_name.as_str()))?;
        let draft = self.read_local_file(path)?;
        self.replace_at(index, draft).await
    }

    /// Overwrite semantics shared by `add file` and `overwrite file`.
    ///
    /// The store replaces by delete-then-create, so a successful overwrite
    /// always yields a new identifier, swapped into the tree and the cache
    /// together. If the delete went through but the create did not, the
    /// local record is left as is and flagged as inconsistent.
    async fn replace_at(&mut self, index: usize, draft: NewFile) -> SessionResult<Outcome> {
        let (uid, wid) = self.workspace_ids()?;
        let old = self
            .workspace()?
            .files
            .get(index)
            .ok_or_else(|| SessionError::not_found(EntityKind::File, draft.file_name()))?;
        let old_id = old.id.clone();
        let file_name = old.file_name();

        match self.store.replace_file(&uid, &wid, &old_id, draft).await {
            Ok(file) => {
                info!(file = %file_name, old_id = %old_id, new_id = %file.id, "overwrote file");
                self.cache.on_file_replaced(index, &file);
                let new_id = file.id.clone();
                let file_name = file.file_name();
                if let Some(slot) = self.workspace_mut()?.files.get_mut(index) {
                    *slot = file.without_contents();
                }
                Ok(Outcome::FileOverwritten { file_name, old_id, new_id })
            }
            Err(ReplaceError::Delete(source)) => {
                warn!(file = %file_name, error = %source, "overwrite failed before any change");
                Err(SessionError::remote("overwrite file", source))
            }
            Err(ReplaceError::Create(source)) => {
                warn!(
                    file = %file_name,
                    old_id = %old_id,
                    error = %source,
                    "overwrite deleted the old file but could not create its replacement"
                );
                self.needs_refresh = true;
                Err(SessionError::Inconsistent { name: file_name, source })
            }
        }
    }

    /// Materialize stored files in the working directory.
    ///
    /// `-a` keeps going past individual failures and reports them together.
    pub async fn pull_file(&mut self, target: &PullTarget) -> SessionResult<Outcome> {
        match target {
            PullTarget::Named(name) => {
                let file = self.resolve_file(name)?.clone();
                let contents = self.fetch_contents(&file, "pull file").await?;
                let path = self.local.write_file(&file.name, &file.extension, &contents)?;
                info!(file = %file.file_name(), path = %path.display(), "pulled file");
                Ok(Outcome::Pulled { written: vec![path], failed: Vec::new() })
            }
            PullTarget::All => {
                let files = self.workspace()?.files.clone();
                let mut written = Vec::new();
                let mut failed = Vec::new();
                for file in &files {
                    let result = match self.fetch_contents(file, "pull file").await {
                        Ok(contents) => self
                            .local
                            .write_file(&file.name, &file.extension, &contents)
                            .map_err(SessionError::from),
                        Err(error) => Err(error),
                    };
                    match result {
                        Ok(path) => written.push(path),
                        Err(error) => {
                            warn!(file = %file.file_name(), error = %error, "failed to pull file");
                            failed.push(PullFailure {
                                file_name: file.file_name(),
                                error: error.to_string(),
                            });
                        }
                    }
                }
                info!(written = written.len(), failed = failed.len(), "pulled workspace files");
                Ok(Outcome::Pulled { written, failed })
            }
        }
    }

    pub async fn delete_file(&mut self, name: &str) -> SessionResult<Outcome> {
        let index = self
            .cache
            .lookup_file(name)
            .ok_or_else(|| SessionError::not_found(EntityKind::File, name))?;
        let file_id = self
            .cache
            .file_id(name)
            .cloned()
            .ok_or_else(|| SessionError::not_found(EntityKind::File, name))?;
        let (uid, wid) = self.workspace_ids()?;

        self.store.delete_file(&uid, &wid, &file_id).await.map_err(|source| {
            warn!(file = %name, file_id = %file_id, error = %source, "failed to delete file");
            SessionError::remote("delete file", source)
        })?;

        let files = &mut self.workspace_mut()?.files;
        let file_name = if index < files.len() {
            files.remove(index).file_name()
        } else {
            name.to_string()
        };
        self.cache.on_file_deleted(index);
        info!(file = %file_name, file_id = %file_id, "deleted file");
        Ok(Outcome::FileDeleted { file_name })
    }

    // ── Refresh ─────────────────────────────────────────────────────

    /// Reload the whole user aggregate and rebuild every cache from scratch.
    ///
    /// A failed reload signs the session out. When the current workspace
    /// is no longer in the reloaded set the session leaves it.
    pub async fn refresh(&mut self) -> SessionResult<Outcome> {
        let uid = self.signed_in()?.id.clone();
        let current_name = self.current_workspace().map(|w| w.name.clone());

        let user = match self.store.get_user(&uid, true).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                warn!(uid = %uid, "refresh found no user profile");
                self.reset_to_anonymous();
                return Err(SessionError::SessionLost(StoreError::NotFound("user".into()).to_string()));
            }
            Err(source) => {
                warn!(uid = %uid, error = %source, "refresh failed");
                self.reset_to_anonymous();
                return Err(SessionError::SessionLost(source.to_string()));
            }
        };

        self.cache.clear();
        self.cache.index_workspaces(&user);
        self.needs_refresh = false;

        let mut current = None;
        if let Some(name) = &current_name {
            if let Some(index) = self.cache.lookup_workspace(name) {
                if let Some(workspace) = user.workspaces.get(index) {
                    self.cache.index_files(workspace);
                    current = Some(index);
                }
            }
        }

        let workspaces = user.workspaces.len();
        self.user = Some(user);
        self.current = current;

        match (current_name, current) {
            (Some(name), None) => {
                warn!(workspace = %name, "current workspace was removed remotely");
                Ok(Outcome::WorkspaceRemoved { name })
            }
            (workspace, _) => {
                info!(workspaces, state = ?self.state(), "refreshed user data");
                Ok(Outcome::Refreshed { workspaces, workspace })
            }
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────

    fn resolve_file(&self, name: &str) -> SessionResult<&File> {
        let index = self
            .cache
            .lookup_file(name)
            .ok_or_else(|| SessionError::not_found(EntityKind::File, name))?;
        self.workspace()?
            .files
            .get(index)
            .ok_or_else(|| SessionError::not_found(EntityKind::File, name))
    }

    async fn fetch_contents(&self, file: &File, action: &str) -> SessionResult<String> {
        let (uid, wid) = self.workspace_ids()?;
        self.store
            .get_file_contents(&uid, &wid, &file.id)
            .await
            .map_err(|source| SessionError::remote(action, source))
    }

    fn read_local_file(&self, path: &str) -> SessionResult<NewFile> {
        if !self.local.exists(path) {
            return Err(SessionError::Validation(format!(
                "local file `{path}` does not exist; check the path and include the extension"
            )));
        }
        let (name, extension) = split_file_name(path)?;
        let contents = self.local.read_text(path).map_err(|error| {
            SessionError::Validation(format!("unable to read `{path}`: {error}"))
        })?;
        Ok(NewFile { name, extension, contents, source_path: self.local.resolve_absolute(path) })
    }
}

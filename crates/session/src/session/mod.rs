// Session state machine.
//
// A `Session` is the explicit context every command runs against: the
// collaborators (store, auth, local filesystem), the name cache and the
// cursors into the user's tree. States:
//
//   Anonymous ──login──▶ Authenticated ──use workspace──▶ InWorkspace
//       ▲                  │     ▲                           │
//       └──signout/lost────┘     └──leave/refresh-removed────┘
//
// Global commands run before state dispatch; anything not allowed in the
// current state is an `InvalidCommand` and leaves the state unchanged.

mod sync;

use mobilecoder_common::types::{User, UserId, Workspace, WorkspaceId};
use serde::Serialize;
use tracing::{info, warn};

use crate::auth::{AuthProvider, MIN_PASSWORD_CHARS};
use crate::cache::LocalCache;
use crate::command::Command;
use crate::error::{SessionError, SessionResult};
use crate::local_fs::LocalFs;
use crate::outcome::Outcome;
use crate::prompt::Prompter;
use crate::remote::RemoteStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No user signed in.
    Anonymous,
    /// User signed in, no current workspace.
    Authenticated,
    /// User signed in and inside a workspace.
    InWorkspace,
}

pub struct Session<R, A> {
    store: R,
    auth: A,
    local: LocalFs,
    cache: LocalCache,
    user: Option<User>,
    /// Position of the current workspace in `user.workspaces`.
    current: Option<usize>,
    /// Raised when local state is known to disagree with the store.
    needs_refresh: bool,
}

impl<R: RemoteStore, A: AuthProvider> Session<R, A> {
    pub fn new(store: R, auth: A, local: LocalFs) -> Self {
        Self {
            store,
            auth,
            local,
            cache: LocalCache::new(),
            user: None,
            current: None,
            needs_refresh: false,
        }
    }

    pub fn state(&self) -> SessionState {
        match (&self.user, self.current) {
            (None, _) => SessionState::Anonymous,
            (Some(_), None) => SessionState::Authenticated,
            (Some(_), Some(_)) => SessionState::InWorkspace,
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn current_workspace(&self) -> Option<&Workspace> {
        let index = self.current?;
        self.user.as_ref()?.workspaces.get(index)
    }

    /// Name shown in the prompt; empty outside a workspace.
    pub fn workspace_label(&self) -> &str {
        self.current_workspace().map(|w| w.name.as_str()).unwrap_or("")
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    pub fn store(&self) -> &R {
        &self.store
    }

    pub fn local(&self) -> &LocalFs {
        &self.local
    }

    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh
    }

    /// Parse and run one input line.
    pub async fn execute(
        &mut self,
        input: &str,
        prompter: &mut dyn Prompter,
    ) -> SessionResult<Outcome> {
        let command = Command::parse(input)?;
        self.dispatch(command, prompter).await
    }

    /// Run a parsed command against the current state.
    pub async fn dispatch(
        &mut self,
        command: Command,
        prompter: &mut dyn Prompter,
    ) -> SessionResult<Outcome> {
        if command.is_global() {
            return self.run_global(command);
        }
        if !command.allowed_in(self.state()) {
            return Err(SessionError::InvalidCommand(command.phrase().to_string()));
        }
        if let Some(usage) = command.missing_argument() {
            return Err(SessionError::Validation(format!("missing argument; usage: `{usage}`")));
        }

        match command {
            Command::Signup => self.signup(prompter).await,
            Command::Login => self.login(prompter).await,
            Command::Signout => self.signout().await,
            Command::ShowWorkspaces => self.show_workspaces(),
            Command::CreateWorkspace(name) => self.create_workspace(&name).await,
            Command::UseWorkspace(name) => self.use_workspace(&name),
            Command::DeleteWorkspace(name) => self.delete_workspace(&name, prompter).await,
            Command::ShowFiles => self.show_files(),
            Command::ViewFile(name) => self.view_file(&name).await,
            Command::AddFile(path) => self.add_file(&path, prompter).await,
            Command::PullFile(target) => self.pull_file(&target).await,
            Command::DeleteFile(name) => self.delete_file(&name).await,
            Command::OverwriteFile(name) => self.overwrite_file(&name).await,
            Command::Refresh => self.refresh().await,
            Command::LeaveWorkspace => self.leave_workspace(),
            Command::Empty
            | Command::Help { .. }
            | Command::Clear
            | Command::Ls { .. }
            | Command::Quit => self.run_global(command),
        }
    }

    fn run_global(&self, command: Command) -> SessionResult<Outcome> {
        match command {
            Command::Help { all } => Ok(Outcome::Help { all, state: self.state() }),
            Command::Clear => Ok(Outcome::Clear),
            Command::Ls { path } => {
                let entries = self.local.list_directory(path.as_deref())?;
                Ok(Outcome::Listing { entries })
            }
            Command::Quit => Ok(Outcome::Quit),
            _ => Ok(Outcome::Nothing),
        }
    }

    // ── Account flows ───────────────────────────────────────────────

    /// Create an account and its profile. The session stays anonymous;
    /// `login` is a separate step.
    pub async fn signup(&mut self, prompter: &mut dyn Prompter) -> SessionResult<Outcome> {
        let email = ask_email(prompter)?;
        let password = prompter.ask_secret("Password: ").unwrap_or_default();
        if password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(SessionError::Validation(format!(
                "password must be at least {MIN_PASSWORD_CHARS} characters"
            )));
        }
        let confirmation =
            prompter.ask_secret("Enter the same password again: ").unwrap_or_default();
        if confirmation != password {
            return Err(SessionError::Validation("passwords did not match".into()));
        }

        let account = self.auth.signup(&email, &password).await?;
        let profile = self
            .store
            .create_user(&account.uid, account.display_name(), &account.email)
            .await
            .map_err(|source| {
                warn!(uid = %account.uid, error = %source, "failed to create user profile");
                SessionError::remote("create user profile", source)
            })?;

        info!(uid = %profile.id, "signed up new user");
        Ok(Outcome::SignedUp { email: profile.email })
    }

    pub async fn login(&mut self, prompter: &mut dyn Prompter) -> SessionResult<Outcome> {
        let email = ask_email(prompter)?;
        let password = prompter.ask_secret("Password: ").unwrap_or_default();

        let account = self.auth.login(&email, &password).await?;
        let loaded = self
            .store
            .get_user(&account.uid, true)
            .await
            .map_err(|source| SessionError::remote("load user profile", source))?;
        let user = match loaded {
            Some(user) => user,
            // Credentials exist but the profile write after signup failed.
            None => {
                warn!(uid = %account.uid, "user profile missing at login, creating it");
                self.store
                    .create_user(&account.uid, account.display_name(), &account.email)
                    .await
                    .map_err(|source| SessionError::remote("create user profile", source))?
            }
        };

        let outcome = Outcome::LoggedIn { name: user.name.clone(), workspaces: user.workspaces.len() };
        self.enter_authenticated(user);
        Ok(outcome)
    }

    pub async fn signout(&mut self) -> SessionResult<Outcome> {
        self.auth.signout().await?;
        self.reset_to_anonymous();
        Ok(Outcome::SignedOut)
    }

    fn enter_authenticated(&mut self, user: User) {
        self.cache.clear();
        self.cache.index_workspaces(&user);
        info!(uid = %user.id, workspaces = user.workspaces.len(), "session authenticated");
        self.user = Some(user);
        self.current = None;
        self.needs_refresh = false;
    }

    fn reset_to_anonymous(&mut self) {
        if let Some(user) = self.user.take() {
            info!(uid = %user.id, "session reset to anonymous");
        }
        self.current = None;
        self.cache.clear();
        self.needs_refresh = false;
    }

    // ── Cursor helpers ──────────────────────────────────────────────

    fn signed_in(&self) -> SessionResult<&User> {
        self.user.as_ref().ok_or_else(|| SessionError::InvalidCommand("not signed in".into()))
    }

    fn signed_in_mut(&mut self) -> SessionResult<&mut User> {
        self.user.as_mut().ok_or_else(|| SessionError::InvalidCommand("not signed in".into()))
    }

    fn workspace(&self) -> SessionResult<&Workspace> {
        self.current_workspace()
            .ok_or_else(|| SessionError::InvalidCommand("not inside a workspace".into()))
    }

    fn workspace_mut(&mut self) -> SessionResult<&mut Workspace> {
        let index = self
            .current
            .ok_or_else(|| SessionError::InvalidCommand("not inside a workspace".into()))?;
        self.signed_in_mut()?
            .workspaces
            .get_mut(index)
            .ok_or_else(|| SessionError::InvalidCommand("not inside a workspace".into()))
    }

    fn workspace_ids(&self) -> SessionResult<(UserId, WorkspaceId)> {
        let uid = self.signed_in()?.id.clone();
        let wid = self.workspace()?.id.clone();
        Ok((uid, wid))
    }
}

fn ask_email(prompter: &mut dyn Prompter) -> SessionResult<String> {
    let email = prompter.ask("Email: ").unwrap_or_default().trim().to_string();
    if email.is_empty() || !email.contains('@') {
        return Err(SessionError::Validation("enter a valid email address".into()));
    }
    Ok(email)
}

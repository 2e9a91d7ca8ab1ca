// Line command parsing.
//
// Input is split into at most three tokens: verb, object, and the unparsed
// remainder (which keeps internal spaces, e.g. a workspace name such as
// `My Notes`). Verb and object match case-insensitively; the remainder keeps
// its original casing.

use crate::error::{SessionError, SessionResult};
use crate::session::SessionState;

/// Argument of `pull file`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullTarget {
    All,
    Named(String),
}

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Empty,
    Help { all: bool },
    Clear,
    Ls { path: Option<String> },
    Quit,
    Signup,
    Login,
    Signout,
    ShowWorkspaces,
    CreateWorkspace(String),
    UseWorkspace(String),
    DeleteWorkspace(String),
    ShowFiles,
    ViewFile(String),
    AddFile(String),
    PullFile(PullTarget),
    DeleteFile(String),
    OverwriteFile(String),
    Refresh,
    LeaveWorkspace,
}

impl Command {
    /// Parse one input line.
    ///
    /// Unrecognised input is `InvalidCommand`. A recognised command missing
    /// its argument still parses; see [`Command::missing_argument`].
    pub fn parse(input: &str) -> SessionResult<Self> {
        let input = input.trim();
        let (verb, rest) = split_token(input);
        let (object, remainder) = split_token(rest);
        let verb = verb.to_lowercase();
        let object_lower = object.to_lowercase();
        let invalid = || SessionError::InvalidCommand(input.to_string());

        let command = match (verb.as_str(), object_lower.as_str()) {
            ("", _) => Self::Empty,
            ("help", "") => Self::Help { all: false },
            ("help", "-a") if remainder.is_empty() => Self::Help { all: true },
            ("clear", "") => Self::Clear,
            ("quit", "") => Self::Quit,
            ("ls", "") => Self::Ls { path: None },
            ("ls", _) => Self::Ls { path: Some(rest.to_string()) },
            ("signup", "") => Self::Signup,
            ("login", "") => Self::Login,
            ("signout", "") => Self::Signout,
            ("refresh", "") => Self::Refresh,
            ("show", "workspaces") if remainder.is_empty() => Self::ShowWorkspaces,
            ("show", "files") if remainder.is_empty() => Self::ShowFiles,
            ("leave", "workspace") if remainder.is_empty() => Self::LeaveWorkspace,
            ("create", "workspace") => Self::CreateWorkspace(argument(remainder)),
            ("use", "workspace") => Self::UseWorkspace(argument(remainder)),
            ("delete", "workspace") => Self::DeleteWorkspace(argument(remainder)),
            ("view", "file") => Self::ViewFile(argument(remainder)),
            ("add", "file") => Self::AddFile(argument(remainder)),
            ("pull", "file") => {
                let target = argument(remainder);
                if target == "-a" {
                    Self::PullFile(PullTarget::All)
                } else {
                    Self::PullFile(PullTarget::Named(target))
                }
            }
            ("delete", "file") => Self::DeleteFile(argument(remainder)),
            ("overwrite", "file") => Self::OverwriteFile(argument(remainder)),
            _ => return Err(invalid()),
        };
        Ok(command)
    }

    /// Commands available in every state, checked before state dispatch.
    pub fn is_global(&self) -> bool {
        matches!(
            self,
            Self::Empty | Self::Help { .. } | Self::Clear | Self::Ls { .. } | Self::Quit
        )
    }

    /// Verb phrase as typed by the user, without arguments.
    pub fn phrase(&self) -> &'static str {
        match self {
            Self::Empty => "",
            Self::Help { .. } => "help",
            Self::Clear => "clear",
            Self::Ls { .. } => "ls",
            Self::Quit => "quit",
            Self::Signup => "signup",
            Self::Login => "login",
            Self::Signout => "signout",
            Self::ShowWorkspaces => "show workspaces",
            Self::CreateWorkspace(_) => "create workspace",
            Self::UseWorkspace(_) => "use workspace",
            Self::DeleteWorkspace(_) => "delete workspace",
            Self::ShowFiles => "show files",
            Self::ViewFile(_) => "view file",
            Self::AddFile(_) => "add file",
            Self::PullFile(_) => "pull file",
            Self::DeleteFile(_) => "delete file",
            Self::OverwriteFile(_) => "overwrite file",
            Self::Refresh => "refresh",
            Self::LeaveWorkspace => "leave workspace",
        }
    }

    /// Usage line when a required argument is empty. Checked after the state
    /// guard, so a command typed in the wrong state is reported as invalid.
    pub fn missing_argument(&self) -> Option<&'static str> {
        let (argument, usage) = match self {
            Self::CreateWorkspace(name) => (name, "create workspace <name>"),
            Self::UseWorkspace(name) => (name, "use workspace <name>"),
            Self::DeleteWorkspace(name) => (name, "delete workspace <name>"),
            Self::ViewFile(name) => (name, "view file <name>"),
            Self::AddFile(path) => (path, "add file <path>"),
            Self::PullFile(PullTarget::Named(name)) => (name, "pull file <name|-a>"),
            Self::DeleteFile(name) => (name, "delete file <name>"),
            Self::OverwriteFile(name) => (name, "overwrite file <name>"),
            _ => return None,
        };
        argument.is_empty().then_some(usage)
    }

    /// Whether a state-specific command may run in `state`.
    pub fn allowed_in(&self, state: SessionState) -> bool {
        if self.is_global() {
            return true;
        }
        match self {
            Self::Signup | Self::Login => state == SessionState::Anonymous,
            Self::Signout
            | Self::ShowWorkspaces
            | Self::CreateWorkspace(_)
            | Self::UseWorkspace(_)
            | Self::DeleteWorkspace(_) => state == SessionState::Authenticated,
            Self::ShowFiles
            | Self::ViewFile(_)
            | Self::AddFile(_)
            | Self::PullFile(_)
            | Self::DeleteFile(_)
            | Self::OverwriteFile(_)
            | Self::LeaveWorkspace => state == SessionState::InWorkspace,
            Self::Refresh => state != SessionState::Anonymous,
            _ => false,
        }
    }
}

fn split_token(input: &str) -> (&str, &str) {
    match input.split_once(char::is_whitespace) {
        Some((head, tail)) => (head, tail.trim_start()),
        None => (input, ""),
    }
}

fn argument(remainder: &str) -> String {
    remainder.trim_end().to_string()
}

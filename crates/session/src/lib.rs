pub mod auth;
pub mod cache;
pub mod command;
pub mod error;
pub mod local_fs;
pub mod outcome;
pub mod prompt;
pub mod remote;
pub mod session;
pub mod store;

pub use error::{SessionError, SessionResult};
pub use session::{Session, SessionState};

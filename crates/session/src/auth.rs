// Authentication provider boundary.

use std::future::Future;

use mobilecoder_common::types::UserId;
use thiserror::Error;

/// Minimum password length accepted at signup.
pub const MIN_PASSWORD_CHARS: usize = 6;

/// Identity returned by the provider after signup or login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub uid: UserId,
    pub email: String,
}

impl AuthUser {
    /// Default display name: the local part of the email address.
    pub fn display_name(&self) -> &str {
        self.email.split_once('@').map(|(local, _)| local).unwrap_or(&self.email)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("email is already in use")]
    EmailInUse,

    #[error("wrong email or password")]
    InvalidCredentials,

    #[error("password must be at least {MIN_PASSWORD_CHARS} characters")]
    WeakPassword,

    #[error("auth provider error: {0}")]
    Backend(String),
}

/// Opaque login/signup/signout provider.
pub trait AuthProvider: Send + Sync {
    fn signup(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<AuthUser, AuthError>> + Send;

    fn login(
        &self,
        email: &str,
        password: &str,
    ) -> impl Future<Output = Result<AuthUser, AuthError>> + Send;

    fn signout(&self) -> impl Future<Output = Result<(), AuthError>> + Send;
}

//! Email/password authentication against the identity toolkit REST API.
//!
//! The signed-in user lives in a [`tokio::sync::watch`] channel so that the
//! live-update task can react to sign-in and sign-out the same way a browser
//! client reacts to an auth state listener.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

// ---

/// Error codes reported by the identity backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthErrorCode {
    EmailExists,
    EmailNotFound,
    InvalidPassword,
    InvalidLoginCredentials,
    InvalidEmail,
    WeakPassword,
    UserDisabled,
    TooManyAttempts,
    MissingEmail,
    MissingPassword,
    OperationNotAllowed,
    Other(String),
}

impl AuthErrorCode {
    /// Parse the backend's `error.message`.
    ///
    /// Some messages carry a detail suffix, e.g.
    /// `"WEAK_PASSWORD : Password should be at least 6 characters"`.
    pub fn from_message(message: &str) -> Self {
        // ---
        let code = message.split(':').next().unwrap_or_default().trim();
        match code {
            "EMAIL_EXISTS" => Self::EmailExists,
            "EMAIL_NOT_FOUND" => Self::EmailNotFound,
            "INVALID_PASSWORD" => Self::InvalidPassword,
            "INVALID_LOGIN_CREDENTIALS" => Self::InvalidLoginCredentials,
            "INVALID_EMAIL" => Self::InvalidEmail,
            "WEAK_PASSWORD" => Self::WeakPassword,
            "USER_DISABLED" => Self::UserDisabled,
            "TOO_MANY_ATTEMPTS_TRY_LATER" => Self::TooManyAttempts,
            "MISSING_EMAIL" => Self::MissingEmail,
            "MISSING_PASSWORD" => Self::MissingPassword,
            "OPERATION_NOT_ALLOWED" => Self::OperationNotAllowed,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::EmailExists => "EMAIL_EXISTS",
            Self::EmailNotFound => "EMAIL_NOT_FOUND",
            Self::InvalidPassword => "INVALID_PASSWORD",
            Self::InvalidLoginCredentials => "INVALID_LOGIN_CREDENTIALS",
            Self::InvalidEmail => "INVALID_EMAIL",
            Self::WeakPassword => "WEAK_PASSWORD",
            Self::UserDisabled => "USER_DISABLED",
            Self::TooManyAttempts => "TOO_MANY_ATTEMPTS_TRY_LATER",
            Self::MissingEmail => "MISSING_EMAIL",
            Self::MissingPassword => "MISSING_PASSWORD",
            Self::OperationNotAllowed => "OPERATION_NOT_ALLOWED",
            Self::Other(code) => code,
        }
    }

    /// Message to show the person at the login form.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::EmailExists => "An account with this email already exists.",
            Self::EmailNotFound | Self::InvalidPassword | Self::InvalidLoginCredentials => {
                "Incorrect email or password."
            }
            Self::InvalidEmail => "Please enter a valid email address.",
            Self::WeakPassword => "Password must be at least 6 characters.",
            Self::UserDisabled => "This account has been disabled.",
            Self::TooManyAttempts => "Too many attempts. Please try again later.",
            Self::MissingEmail => "Please enter your email.",
            Self::MissingPassword => "Please enter your password.",
            Self::OperationNotAllowed => "Email/password sign-in is not enabled.",
            Self::Other(_) => "Authentication failed. Please try again.",
        }
    }
}

impl fmt::Display for AuthErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("authentication rejected: {0}")]
    Rejected(AuthErrorCode),

    #[error("authentication service unreachable: {0}")]
    Transport(#[from] reqwest::Error),
}

impl AuthError {
    pub fn user_message(&self) -> &'static str {
        match self {
            AuthError::Rejected(code) => code.user_message(),
            AuthError::Transport(_) => "Authentication service is unreachable. Please try again.",
        }
    }
}

/// The signed-in account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthUser {
    pub uid: String,
    pub email: String,
    /// Credential for realtime database reads.
    #[serde(skip)]
    pub id_token: String,
}

/// Current auth state, observable through [`AuthSession::on_auth_change`].
#[derive(Debug)]
pub struct AuthSession {
    current: watch::Sender<Option<AuthUser>>,
}

impl Default for AuthSession {
    fn default() -> Self {
        Self {
            current: watch::Sender::new(None),
        }
    }
}

impl AuthSession {
    pub fn current_user(&self) -> Option<AuthUser> {
        self.current.borrow().clone()
    }

    /// Receiver that already holds the current user, then sees every change.
    pub fn on_auth_change(&self) -> watch::Receiver<Option<AuthUser>> {
        let mut rx = self.current.subscribe();
        rx.mark_changed();
        rx
    }

    pub(crate) fn set(&self, user: Option<AuthUser>) {
        self.current.send_replace(user);
    }
}

// ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordResponse {
    local_id: String,
    #[serde(default)]
    email: String,
    id_token: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Identity toolkit client plus the session it signs in and out of.
#[derive(Debug)]
pub struct AuthProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    session: AuthSession,
}

impl AuthProvider {
    // ---
    pub fn new(client: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            session: AuthSession::default(),
        }
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    /// Register a new account. On success the new account is signed in.
    pub async fn create_account(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        self.password_call("accounts:signUp", email, password).await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        self.password_call("accounts:signInWithPassword", email, password)
            .await
    }

    pub fn sign_out(&self) {
        if let Some(user) = self.session.current_user() {
            tracing::info!(uid = %user.uid, "Signed out");
        }
        self.session.set(None);
    }

    async fn password_call(
        &self,
        endpoint: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthUser, AuthError> {
        // ---
        let email = email.trim();
        if email.is_empty() {
            return Err(AuthError::Rejected(AuthErrorCode::MissingEmail));
        }
        if password.is_empty() {
            return Err(AuthError::Rejected(AuthErrorCode::MissingPassword));
        }

        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&PasswordRequest {
                email,
                password,
                return_secure_token: true,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let code = match response.json::<ErrorEnvelope>().await {
                Ok(envelope) => AuthErrorCode::from_message(&envelope.error.message),
                Err(_) => AuthErrorCode::Other(status.to_string()),
            };
            tracing::warn!(endpoint, %code, "Authentication rejected");
            return Err(AuthError::Rejected(code));
        }

        let body: PasswordResponse = response.json().await?;
        let user = AuthUser {
            uid: body.local_id,
            email: if body.email.is_empty() {
                email.to_string()
            } else {
                body.email
            },
            id_token: body.id_token,
        };

        tracing::info!(uid = %user.uid, endpoint, "Signed in");
        self.session.set(Some(user.clone()));
        Ok(user)
    }
}

use thiserror::Error;

use crate::capture::SessionState;

/// Failures that stop a run before (or instead of) the capture loop.
#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("URL list unavailable at {path}: {reason}")]
    UrlList { path: String, reason: String },

    #[error("profile service rejected the API token: {0}")]
    ProfileAuthorization(String),

    #[error("profile {profile_id} failed to start: {reason}")]
    ProfileLaunch { profile_id: String, reason: String },

    #[error("could not connect to browser: {0}")]
    BrowserConnect(String),
}

/// Lifecycle misuse of a capture session.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("invalid capture session transition {from:?} -> {to:?}")]
    InvalidTransition { from: SessionState, to: SessionState },
}

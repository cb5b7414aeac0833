//! Error types for the asset_migrator crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while migrating Earth Engine assets.
#[derive(Error, Debug)]
pub enum MigrateError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid asset path: {0}")]
    InvalidAssetPath(String),

    #[error("{0} is not a root folder")]
    NotARoot(String),

    #[error("Asset {path} is not under {root}")]
    OutsideRoot { path: String, root: String },

    #[error("Invalid principal {0:?}: expected a user:, group:, serviceAccount: or domain: prefix")]
    InvalidPrincipal(String),

    #[error("Credential file {0} holds neither a refresh token nor a service account key")]
    UnusableCredential(PathBuf),

    #[error("Glob pattern error: {0}")]
    GlobPatternError(#[from] glob::PatternError),

    #[error("Failed to read token directory entry: {0}")]
    GlobError(#[from] glob::GlobError),

    #[error("JWT encoding error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid URL: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("Token refresh failed: {0}")]
    TokenRefreshError(String),

    #[error("Authorization code missing in redirect")]
    MissingCode,

    #[error("Authorization timed out")]
    Timeout,

    #[error("Cancelled: {0}")]
    Cancelled(String),
}

/// Result type alias for MigrateError.
pub type Result<T> = std::result::Result<T, MigrateError>;

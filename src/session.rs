//! Opening authenticated sessions from stored credentials.
//!
//! A session is a plain value: switching accounts means opening another one,
//! so operations for two accounts can never share hidden global state.

use std::path::Path;

use tracing::info;

use crate::auth::{Authenticator, OAuthApp};
use crate::client::{AssetService, EarthEngineClient, DEFAULT_API_BASE};
use crate::credentials::CredentialRecord;
use crate::error::{MigrateError, Result};

/// Builds sessions from credential records.
pub trait SessionFactory {
    type Session: AssetService;

    /// Open a session for `record`, which was read from `path`.
    fn open(&self, record: &CredentialRecord, path: &Path) -> Result<Self::Session>;

    /// Read the credential file at `path` and open a session with it.
    fn initialize_from_token(&self, path: &Path) -> Result<Self::Session> {
        info!(token = %path.display(), "Initializing session");
        let record = CredentialRecord::load(path)?;
        self.open(&record, path)
    }
}

/// Sessions against the Earth Engine REST API.
#[derive(Debug, Clone)]
pub struct EarthEngineSessions {
    app: OAuthApp,
    base_url: String,
}

impl EarthEngineSessions {
    pub fn new(app: OAuthApp) -> Self {
        Self::with_base_url(app, DEFAULT_API_BASE)
    }

    pub fn with_base_url(app: OAuthApp, base_url: impl Into<String>) -> Self {
        Self {
            app,
            base_url: base_url.into(),
        }
    }
}

impl SessionFactory for EarthEngineSessions {
    type Session = EarthEngineClient;

    fn open(&self, record: &CredentialRecord, path: &Path) -> Result<EarthEngineClient> {
        let auth = Authenticator::from_record(record, &self.app)
            .ok_or_else(|| MigrateError::UnusableCredential(path.to_path_buf()))?;
        Ok(EarthEngineClient::with_base_url(auth, self.base_url.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_initialize_from_token() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"{"refresh_token": "1//abc", "roots": []}"#)
            .unwrap();

        let sessions =
            EarthEngineSessions::with_base_url(OAuthApp::new("id", "secret"), "http://localhost/v1/");
        let client = sessions.initialize_from_token(file.path()).unwrap();
        assert_eq!(client.base_url(), "http://localhost/v1");
    }

    #[test]
    fn test_initialize_from_unusable_token() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"{"roots": []}"#).unwrap();

        let sessions = EarthEngineSessions::new(OAuthApp::new("id", "secret"));
        let err = sessions.initialize_from_token(file.path()).err().unwrap();
        assert!(matches!(err, MigrateError::UnusableCredential(_)));
    }

    #[test]
    fn test_initialize_from_missing_file() {
        let sessions = EarthEngineSessions::new(OAuthApp::new("id", "secret"));
        assert!(sessions
            .initialize_from_token(Path::new("/nonexistent/token.json"))
            .is_err());
    }
}

//! Access-token minting for Google APIs.
//!
//! A credential is either a user refresh token obtained through the
//! interactive OAuth flow or a service account key.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::credentials::CredentialRecord;
use crate::error::{MigrateError, Result};
use crate::models::{ServiceAccountCredentials, TokenResponse};

/// Google OAuth2 token endpoint.
pub const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Google OAuth2 authorization endpoint.
pub const AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";

/// Scopes requested for Earth Engine access.
pub const SCOPES: [&str; 3] = [
    "https://www.googleapis.com/auth/earthengine",
    "https://www.googleapis.com/auth/cloud-platform",
    "https://www.googleapis.com/auth/devstorage.full_control",
];

/// OAuth client used for user credentials.
#[derive(Debug, Clone)]
pub struct OAuthApp {
    pub client_id: String,
    pub client_secret: String,
    pub token_uri: String,
    pub auth_uri: String,
}

impl OAuthApp {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_uri: TOKEN_URI.to_string(),
            auth_uri: AUTH_URI.to_string(),
        }
    }

    /// Override the token endpoint.
    pub fn with_token_uri(mut self, token_uri: impl Into<String>) -> Self {
        self.token_uri = token_uri.into();
        self
    }
}

/// JWT claims for service account authentication.
#[derive(Debug, Serialize)]
struct Claims {
    iss: String,   // Issuer (service account email)
    scope: String, // OAuth scopes, space separated
    aud: String,   // Audience (token endpoint)
    exp: u64,      // Expiration time
    iat: u64,      // Issued at
}

enum CredentialSource {
    RefreshToken {
        refresh_token: String,
        client_id: String,
        client_secret: String,
    },
    ServiceAccount(ServiceAccountCredentials),
}

/// Cached access token with expiration.
#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: SystemTime,
}

/// Authenticator for Google APIs.
#[derive(Clone)]
pub struct Authenticator {
    source: Arc<CredentialSource>,
    token_uri: String,
    client: Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl Authenticator {
    /// Create an authenticator from a user refresh token.
    pub fn from_refresh_token(refresh_token: impl Into<String>, app: &OAuthApp) -> Self {
        Self::new(
            CredentialSource::RefreshToken {
                refresh_token: refresh_token.into(),
                client_id: app.client_id.clone(),
                client_secret: app.client_secret.clone(),
            },
            app.token_uri.clone(),
        )
    }

    /// Create an authenticator from a service account key.
    pub fn from_service_account(credentials: ServiceAccountCredentials) -> Self {
        let token_uri = credentials
            .token_uri
            .clone()
            .unwrap_or_else(|| TOKEN_URI.to_string());
        Self::new(CredentialSource::ServiceAccount(credentials), token_uri)
    }

    /// Create an authenticator from a stored credential record.
    ///
    /// `client_id`, `client_secret` and `token_uri` stored in the record take
    /// precedence over the ones from `app`. Returns `None` when the record
    /// holds neither a refresh token nor a service account key.
    pub fn from_record(record: &CredentialRecord, app: &OAuthApp) -> Option<Self> {
        if let Some(refresh_token) = &record.refresh_token {
            let field = |key: &str, fallback: &str| {
                record
                    .extra
                    .get(key)
                    .and_then(|v| v.as_str())
                    .unwrap_or(fallback)
                    .to_string()
            };
            let app = OAuthApp {
                client_id: field("client_id", &app.client_id),
                client_secret: field("client_secret", &app.client_secret),
                token_uri: field("token_uri", &app.token_uri),
                auth_uri: app.auth_uri.clone(),
            };
            return Some(Self::from_refresh_token(refresh_token.clone(), &app));
        }

        serde_json::from_value::<ServiceAccountCredentials>(serde_json::Value::Object(
            record.extra.clone(),
        ))
        .ok()
        .map(Self::from_service_account)
    }

    fn new(source: CredentialSource, token_uri: String) -> Self {
        Self {
            source: Arc::new(source),
            token_uri,
            client: Client::new(),
            cached_token: Arc::new(RwLock::new(None)),
        }
    }

    /// Get a valid access token, refreshing if necessary.
    pub async fn get_access_token(&self) -> Result<String> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                // Add 60 second buffer before expiration
                let buffer = Duration::from_secs(60);
                if token.expires_at > SystemTime::now() + buffer {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let new_token = self.refresh_token().await?;

        {
            let mut cached = self.cached_token.write().await;
            *cached = Some(new_token.clone());
        }

        Ok(new_token.access_token)
    }

    async fn refresh_token(&self) -> Result<CachedToken> {
        let response = match self.source.as_ref() {
            CredentialSource::RefreshToken {
                refresh_token,
                client_id,
                client_secret,
            } => {
                let params = [
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token.as_str()),
                    ("client_id", client_id.as_str()),
                    ("client_secret", client_secret.as_str()),
                ];
                self.client.post(&self.token_uri).form(&params).send().await?
            }
            CredentialSource::ServiceAccount(credentials) => {
                let jwt = self.signed_assertion(credentials)?;
                let params = [
                    ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                    ("assertion", jwt.as_str()),
                ];
                self.client.post(&self.token_uri).form(&params).send().await?
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MigrateError::TokenRefreshError(format!(
                "Status {}: {}",
                status, body
            )));
        }

        let token_response: TokenResponse = response.json().await?;

        let expires_at = SystemTime::now() + Duration::from_secs(token_response.expires_in);

        Ok(CachedToken {
            access_token: token_response.access_token,
            expires_at,
        })
    }

    fn signed_assertion(&self, credentials: &ServiceAccountCredentials) -> Result<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| MigrateError::AuthenticationError(e.to_string()))?
            .as_secs();

        let claims = Claims {
            iss: credentials.client_email.clone(),
            scope: SCOPES.join(" "),
            aud: self.token_uri.clone(),
            iat: now,
            exp: now + 3600, // 1 hour
        };

        let header = Header::new(Algorithm::RS256);
        let key = EncodingKey::from_rsa_pem(credentials.private_key.as_bytes())?;
        Ok(encode(&header, &claims, &key)?)
    }
}

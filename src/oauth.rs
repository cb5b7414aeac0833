//! Interactive OAuth sign-in through the browser.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::warn;
use url::Url;

use crate::auth::{OAuthApp, SCOPES};
use crate::credentials::CredentialPrompt;
use crate::error::{MigrateError, Result};
use crate::models::TokenResponse;
use crate::prompt::LineInput;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Browser based sign-in with a loopback redirect.
///
/// Falls back to pasting the verification code by hand when the redirect
/// never arrives.
pub struct OAuthFlow {
    app: OAuthApp,
    timeout: Duration,
    http: Client,
}

impl OAuthFlow {
    pub fn new(app: OAuthApp) -> Self {
        Self {
            app,
            timeout: DEFAULT_TIMEOUT,
            http: Client::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the flow and return the refresh token.
    pub async fn obtain_refresh_token(&self) -> Result<String> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let redirect_uri = format!("http://127.0.0.1:{}", listener.local_addr()?.port());
        let url = authorize_url(&self.app, &redirect_uri)?;

        println!("Open this URL in your browser and sign in to the account:\n{}\n", url);
        println!(
            "If the browser offers the wrong account, copy the URL into a browser session that lists it."
        );

        let code = match wait_for_code(listener, self.timeout).await {
            Ok(code) => code,
            Err(e) => {
                warn!(error = %e, "Redirect not received, falling back to manual code entry");
                read_code_manually(&mut std::io::stdin())?
            }
        };

        let token = self.exchange_code(&code, &redirect_uri).await?;
        token.refresh_token.ok_or_else(|| {
            MigrateError::AuthenticationError("token response carried no refresh token".to_string())
        })
    }

    async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<TokenResponse> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", self.app.client_id.as_str()),
            ("client_secret", self.app.client_secret.as_str()),
        ];

        let response = self.http.post(&self.app.token_uri).form(&params).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MigrateError::AuthenticationError(format!(
                "Status {}: {}",
                status, body
            )));
        }

        Ok(response.json().await?)
    }
}

impl CredentialPrompt for OAuthFlow {
    async fn authenticate(&self, slot: &Path) -> Result<()> {
        let refresh_token = self.obtain_refresh_token().await?;
        let credential = json!({
            "refresh_token": refresh_token,
            "client_id": self.app.client_id,
            "client_secret": self.app.client_secret,
            "scopes": SCOPES,
        });
        fs::write(slot, serde_json::to_string_pretty(&credential)?)?;
        Ok(())
    }
}

/// Authorization URL requesting offline access for the Earth Engine scopes.
pub fn authorize_url(app: &OAuthApp, redirect_uri: &str) -> Result<Url> {
    let mut url = Url::parse(&app.auth_uri)?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &app.client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("scope", &SCOPES.join(" "))
        .append_pair("access_type", "offline")
        .append_pair("prompt", "select_account consent");
    Ok(url)
}

async fn wait_for_code(listener: TcpListener, timeout: Duration) -> Result<String> {
    let (mut stream, _) = tokio::time::timeout(timeout, listener.accept())
        .await
        .map_err(|_| MigrateError::Timeout)??;

    let mut request = vec![0u8; 8192];
    let read = tokio::time::timeout(Duration::from_secs(10), stream.read(&mut request))
        .await
        .map_err(|_| MigrateError::Timeout)??;
    let request_text = String::from_utf8_lossy(&request[..read]);
    let code = extract_code_from_http_request(&request_text).ok_or(MigrateError::MissingCode)?;

    let _ = stream
        .write_all(
            b"HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nConnection: close\r\n\r\n\
            <html><body><h2>Signed in</h2><p>You can close this tab and return to the terminal.</p></body></html>",
        )
        .await;
    let _ = stream.shutdown().await;

    Ok(code)
}

fn read_code_manually<I: LineInput>(input: &mut I) -> Result<String> {
    print!("Enter the verification code: ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    input.next_line(&mut line)?;
    let code = line.trim().to_string();
    if code.is_empty() {
        return Err(MigrateError::MissingCode);
    }
    Ok(code)
}

/// Pull the `code` query parameter out of the redirect's request line.
fn extract_code_from_http_request(request: &str) -> Option<String> {
    let request_line = request.lines().next()?;
    let target = request_line.split_whitespace().nth(1)?;
    let url = Url::parse(&format!("http://127.0.0.1{}", target)).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "code")
        .map(|(_, value)| value.into_owned())
        .filter(|code| !code.is_empty())
}

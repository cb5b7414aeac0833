//! Per-account credential files and the search for a credential that can
//! write to a given asset root.
//!
//! Each credential lives in its own JSON file inside a token directory:
//!
//! ```json
//! {"refresh_token": "1//...", "roots": ["projects/earthengine-legacy/assets/users/a"]}
//! ```
//!
//! `roots` caches the asset roots the credential is known to write to.

use std::fs;
use std::path::{Path, PathBuf};

use glob::{glob, Pattern};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::asset_path::{asset_root, fix_asset_path};
use crate::client::AssetService;
use crate::error::{MigrateError, Result};
use crate::prompt::Confirm;
use crate::session::SessionFactory;

/// Contents of a credential file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub roots: Vec<String>,
    /// Any other fields, kept as-is when the file is rewritten.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CredentialRecord {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Whether a cached root is a textual prefix of `root`.
    pub fn grants(&self, root: &str) -> bool {
        self.roots.iter().any(|cached| root.starts_with(cached.as_str()))
    }

    /// Append `root` unless already cached. Returns whether it was added.
    pub fn add_root(&mut self, root: &str) -> bool {
        if self.roots.iter().any(|r| r == root) {
            return false;
        }
        self.roots.push(root.to_string());
        true
    }
}

/// Default location the interactive sign-in writes its credential to.
pub fn default_credentials_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("earthengine").join("credentials"))
}

/// Interactive sign-in producing a new credential.
#[allow(async_fn_in_trait)]
pub trait CredentialPrompt {
    /// Sign in and write the resulting credential file to `slot`.
    async fn authenticate(&self, slot: &Path) -> Result<()>;
}

/// Directory holding one credential file per account.
#[derive(Debug, Clone)]
pub struct TokenStore {
    dir: PathBuf,
}

impl TokenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Credential files in the directory, in lexical order.
    pub fn candidates(&self) -> Result<Vec<PathBuf>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let dir = self.dir.to_string_lossy();
        let pattern = format!("{}/*.json", Pattern::escape(&dir));
        let mut paths = Vec::new();
        for entry in glob(&pattern)? {
            let path = entry?;
            if path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// A fresh, unguessable path for a new credential file.
    pub fn new_token_path(&self) -> PathBuf {
        let stem: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        self.dir.join(format!("{}.json", stem))
    }
}

/// Finds, verifies and creates credentials in a token directory.
pub struct CredentialManager<F, P> {
    store: TokenStore,
    sessions: F,
    prompt: P,
    slot: PathBuf,
}

impl<F: SessionFactory, P: CredentialPrompt> CredentialManager<F, P> {
    /// `slot` is the default credential path the sign-in flow writes to.
    pub fn new(store: TokenStore, sessions: F, prompt: P, slot: impl Into<PathBuf>) -> Self {
        Self {
            store,
            sessions,
            prompt,
            slot: slot.into(),
        }
    }

    pub fn sessions(&self) -> &F {
        &self.sessions
    }

    /// Return a credential file proven to write to `root`.
    ///
    /// Stored credentials are tried in order: first against their cached
    /// roots, then by probing the root's quota, which is cached on success.
    /// When none qualifies the operator is asked to sign in to another
    /// account and the search starts over. Declining ends the search.
    pub async fn smart_get_credentials<C: Confirm>(
        &self,
        root: &str,
        confirm: &mut C,
    ) -> Result<PathBuf> {
        let root = fix_asset_path(root);

        loop {
            for path in self.store.candidates()? {
                if self.verify(&path, &root).await? {
                    return Ok(path);
                }
            }

            let target = self.store.new_token_path();
            let message = format!(
                "No stored credential can write to \"{}\".\n\n\
                 Authenticate to an account with owner level permissions for that asset root.\n\
                 The token will be stored as \"{}\".\nContinue?",
                root,
                target.display()
            );
            if !confirm.confirm(&message)? {
                return Err(MigrateError::Cancelled(format!(
                    "no credential selected for {}",
                    root
                )));
            }

            match self.custom_authenticate(&target).await {
                Ok(()) => {
                    if let Err(e) = self.add_roots(&target).await {
                        warn!(token = %target.display(), error = %e, "Failed to list asset roots");
                    }
                }
                Err(e) => warn!(error = %e, "Authentication failed"),
            }
        }
    }

    async fn verify(&self, path: &Path, root: &str) -> Result<bool> {
        let mut record = CredentialRecord::load(path)?;
        if record.grants(root) {
            debug!(token = %path.display(), root, "Cached root matches");
            return Ok(true);
        }

        let quota_root = match asset_root(root) {
            Ok(quota_root) => quota_root,
            Err(e) => {
                debug!(root, error = %e, "No asset root to probe");
                return Ok(false);
            }
        };
        let session = self.sessions.open(&record, path)?;
        match session.get_asset_root_quota(&quota_root).await {
            Ok(_) => {
                record.add_root(root);
                record.save(path)?;
                info!(token = %path.display(), root, "Credential can write to root");
                Ok(true)
            }
            Err(e) => {
                debug!(token = %path.display(), root, error = %e, "Credential cannot write to root");
                Ok(false)
            }
        }
    }

    /// Run the sign-in flow and move the new credential to `target`.
    ///
    /// A credential already sitting in the default slot is set aside for the
    /// duration of the flow and put back afterwards, even on failure.
    pub async fn custom_authenticate(&self, target: &Path) -> Result<()> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        if let Some(parent) = self.slot.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut backup = self.slot.clone().into_os_string();
        backup.push("_temp");
        let backup = PathBuf::from(backup);

        let preserved = self.slot.exists();
        if preserved {
            move_file(&self.slot, &backup)?;
        }

        let result = match self.prompt.authenticate(&self.slot).await {
            Ok(()) => move_file(&self.slot, target),
            Err(e) => Err(e),
        };

        if preserved {
            move_file(&backup, &self.slot)?;
        }

        if result.is_ok() {
            info!(token = %target.display(), "Stored new credential");
        }
        result
    }

    /// Cache every asset root the credential's account can reach.
    pub async fn add_roots(&self, path: &Path) -> Result<()> {
        info!(token = %path.display(), "Adding root paths");
        let mut record = CredentialRecord::load(path)?;
        let session = self.sessions.open(&record, path)?;

        for root in session.get_asset_roots().await? {
            record.add_root(&root.name);
        }
        record.save(path)
    }

    /// Resolve credentials for both sides of a migration.
    pub async fn setup_credentials_for_migration<C: Confirm>(
        &self,
        source_root: &str,
        destination_root: &str,
        confirm: &mut C,
    ) -> Result<(PathBuf, PathBuf)> {
        let source = self.smart_get_credentials(source_root, confirm).await?;
        let destination = self.smart_get_credentials(destination_root, confirm).await?;
        Ok((source, destination))
    }
}

/// Rename, falling back to copy + remove across file systems.
fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to)?;
    fs::remove_file(from)?;
    Ok(())
}

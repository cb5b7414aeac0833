//! asset_migrator - Copy Earth Engine asset trees between repositories.
//!
//! This library provides functionality to:
//! - Walk an asset tree and copy it to another root
//! - Replace ACLs across a tree
//! - Delete a tree after two confirmations
//! - Keep one credential file per account and find the one that can write to
//!   a given asset root
//!
//! # Example
//!
//! ```no_run
//! use asset_migrator::{copy_asset_tree, EarthEngineSessions, OAuthApp, SessionFactory};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let sessions = EarthEngineSessions::new(OAuthApp::new("client-id", "client-secret"));
//!     let destination = sessions.initialize_from_token("tokens/owner.json".as_ref())?;
//!
//!     let report = copy_asset_tree(&destination, "users/a/demo", "users/b/demo2", None).await?;
//!     println!("{} of {} assets copied", report.copy.succeeded(), report.copy.attempted);
//!
//!     Ok(())
//! }
//! ```

pub mod asset_path;
pub mod auth;
pub mod client;
pub mod credentials;
pub mod error;
pub mod models;
pub mod oauth;
pub mod prompt;
pub mod session;
pub mod tree;

// Re-exports for convenience
pub use asset_path::fix_asset_path;
pub use auth::{Authenticator, OAuthApp};
pub use client::{AssetService, EarthEngineClient};
pub use credentials::{CredentialManager, CredentialPrompt, CredentialRecord, TokenStore};
pub use error::{MigrateError, Result};
pub use models::{Acl, Asset, AssetType};
pub use oauth::OAuthFlow;
pub use prompt::{Confirm, ConsolePrompt, LineInput};
pub use session::{EarthEngineSessions, SessionFactory};
pub use tree::{
    batch_change_permissions, change_tree_permissions, copy_asset_tree, delete_asset_tree,
    get_tree, BatchReport, CopyReport, TreeEntry,
};

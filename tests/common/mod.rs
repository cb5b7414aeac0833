//! In-memory asset service shared by the integration tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::rc::Rc;

use asset_migrator::asset_path::fix_asset_path;
use asset_migrator::credentials::{CredentialPrompt, CredentialRecord};
use asset_migrator::error::{MigrateError, Result};
use asset_migrator::models::{Acl, Asset, AssetType, Quota};
use asset_migrator::session::SessionFactory;
use asset_migrator::AssetService;

/// A remote call the fake observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Created(String, AssetType),
    Copied(String, String),
    Deleted(String),
    AclSet(String),
}

/// Shared remote state: assets in insertion order, root ownership, and
/// paths whose calls are made to fail.
#[derive(Default)]
pub struct Cloud {
    assets: RefCell<Vec<(String, AssetType)>>,
    owners: RefCell<HashMap<String, Vec<String>>>,
    acls: RefCell<HashMap<String, Acl>>,
    failing: RefCell<HashSet<String>>,
    unreadable: RefCell<HashSet<String>>,
    ops: RefCell<Vec<Op>>,
    quota_probes: Cell<usize>,
}

pub fn p(path: &str) -> String {
    fix_asset_path(path)
}

fn api_error(status: u16, message: impl Into<String>) -> MigrateError {
    MigrateError::ApiError {
        status,
        message: message.into(),
    }
}

impl Cloud {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Register `root` (a relative legacy path) as owned by `account`.
    pub fn add_root(&self, account: &str, root: &str) {
        let root = p(root).trim_end_matches('/').to_string();
        self.assets
            .borrow_mut()
            .push((root.clone(), AssetType::Folder));
        self.owners
            .borrow_mut()
            .entry(account.to_string())
            .or_default()
            .push(root);
    }

    pub fn add(&self, path: &str, asset_type: AssetType) {
        self.assets.borrow_mut().push((p(path), asset_type));
    }

    pub fn fail_on(&self, path: &str) {
        self.failing.borrow_mut().insert(p(path));
    }

    /// Make metadata lookups of `path` fail while listing keeps working.
    pub fn fail_lookup(&self, path: &str) {
        self.unreadable.borrow_mut().insert(p(path));
    }

    pub fn exists(&self, path: &str) -> bool {
        self.find(&p(path)).is_some()
    }

    pub fn ops(&self) -> Vec<Op> {
        self.ops.borrow().clone()
    }

    pub fn acl(&self, path: &str) -> Option<Acl> {
        self.acls.borrow().get(&p(path)).cloned()
    }

    pub fn quota_probes(&self) -> usize {
        self.quota_probes.get()
    }

    pub fn session(self: &Rc<Self>, account: &str) -> FakeSession {
        FakeSession {
            cloud: Rc::clone(self),
            account: account.to_string(),
        }
    }

    fn find(&self, name: &str) -> Option<AssetType> {
        self.assets
            .borrow()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| *t)
    }

    fn is_root(&self, name: &str) -> bool {
        self.owners.borrow().values().flatten().any(|r| r == name)
    }

    fn check_failing(&self, name: &str) -> Result<()> {
        if self.failing.borrow().contains(name) {
            return Err(api_error(500, format!("injected failure for {}", name)));
        }
        Ok(())
    }

    fn check_parent(&self, name: &str) -> Result<()> {
        let parent = name.rsplit_once('/').map(|(parent, _)| parent).unwrap_or("");
        if self.find(parent).is_none() {
            return Err(api_error(404, format!("parent of {} not found", name)));
        }
        Ok(())
    }

    fn children(&self, parent: &str) -> Vec<(String, AssetType)> {
        let prefix = format!("{}/", parent.trim_end_matches('/'));
        self.assets
            .borrow()
            .iter()
            .filter(|(n, _)| {
                n.strip_prefix(&prefix)
                    .map(|rest| !rest.is_empty() && !rest.contains('/'))
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }
}

/// One account's view of the fake service.
pub struct FakeSession {
    cloud: Rc<Cloud>,
    account: String,
}

impl FakeSession {
    fn asset(&self, name: &str, asset_type: AssetType) -> Asset {
        let quota = self.cloud.is_root(name).then(Quota::default);
        Asset {
            name: name.to_string(),
            asset_type,
            id: None,
            quota,
        }
    }
}

impl AssetService for FakeSession {
    async fn get_asset(&self, name: &str) -> Result<Asset> {
        if self.cloud.unreadable.borrow().contains(name) {
            return Err(api_error(403, format!("cannot read {}", name)));
        }
        let asset_type = self
            .cloud
            .find(name)
            .ok_or_else(|| api_error(404, format!("{} not found", name)))?;
        Ok(self.asset(name, asset_type))
    }

    async fn list_assets(&self, parent: &str) -> Result<Vec<Asset>> {
        let parent = parent.trim_end_matches('/');
        self.cloud.check_failing(parent)?;
        if self.cloud.find(parent).is_none() {
            return Err(api_error(404, format!("{} not found", parent)));
        }
        Ok(self
            .cloud
            .children(parent)
            .into_iter()
            .map(|(name, asset_type)| self.asset(&name, asset_type))
            .collect())
    }

    async fn create_asset(&self, name: &str, asset_type: AssetType) -> Result<()> {
        self.cloud.check_failing(name)?;
        if self.cloud.find(name).is_some() {
            return Err(api_error(409, format!("{} already exists", name)));
        }
        self.cloud.check_parent(name)?;
        self.cloud
            .assets
            .borrow_mut()
            .push((name.to_string(), asset_type));
        self.cloud
            .ops
            .borrow_mut()
            .push(Op::Created(name.to_string(), asset_type));
        Ok(())
    }

    async fn copy_asset(&self, source: &str, destination: &str, overwrite: bool) -> Result<()> {
        self.cloud.check_failing(destination)?;
        let asset_type = self
            .cloud
            .find(source)
            .ok_or_else(|| api_error(404, format!("{} not found", source)))?;
        if !overwrite && self.cloud.find(destination).is_some() {
            return Err(api_error(409, format!("{} already exists", destination)));
        }
        self.cloud.check_parent(destination)?;
        self.cloud
            .assets
            .borrow_mut()
            .push((destination.to_string(), asset_type));
        self.cloud
            .ops
            .borrow_mut()
            .push(Op::Copied(source.to_string(), destination.to_string()));
        Ok(())
    }

    async fn delete_asset(&self, name: &str) -> Result<()> {
        self.cloud.check_failing(name)?;
        if self.cloud.find(name).is_none() {
            return Err(api_error(404, format!("{} not found", name)));
        }
        if !self.cloud.children(name).is_empty() {
            return Err(api_error(400, format!("{} is not empty", name)));
        }
        self.cloud.assets.borrow_mut().retain(|(n, _)| n != name);
        self.cloud
            .ops
            .borrow_mut()
            .push(Op::Deleted(name.to_string()));
        Ok(())
    }

    async fn set_asset_acl(&self, name: &str, acl: &Acl) -> Result<()> {
        self.cloud.check_failing(name)?;
        if self.cloud.find(name).is_none() {
            return Err(api_error(404, format!("{} not found", name)));
        }
        self.cloud
            .acls
            .borrow_mut()
            .insert(name.to_string(), acl.clone());
        self.cloud
            .ops
            .borrow_mut()
            .push(Op::AclSet(name.to_string()));
        Ok(())
    }

    async fn get_asset_roots(&self) -> Result<Vec<Asset>> {
        let roots = self
            .cloud
            .owners
            .borrow()
            .get(&self.account)
            .cloned()
            .unwrap_or_default();
        Ok(roots
            .iter()
            .map(|root| self.asset(root, AssetType::Folder))
            .collect())
    }

    async fn get_asset_root_quota(&self, root: &str) -> Result<Quota> {
        self.cloud.quota_probes.set(self.cloud.quota_probes.get() + 1);
        let owned = self
            .cloud
            .owners
            .borrow()
            .get(&self.account)
            .map(|roots| roots.iter().any(|r| r == root))
            .unwrap_or(false);
        if owned {
            Ok(Quota::default())
        } else {
            Err(api_error(403, format!("{} cannot access {}", self.account, root)))
        }
    }
}

/// Sessions whose account is the record's refresh token.
pub struct FakeSessions {
    pub cloud: Rc<Cloud>,
}

impl SessionFactory for FakeSessions {
    type Session = FakeSession;

    fn open(&self, record: &CredentialRecord, path: &Path) -> Result<FakeSession> {
        let account = record
            .refresh_token
            .as_deref()
            .ok_or_else(|| MigrateError::UnusableCredential(path.to_path_buf()))?;
        Ok(self.cloud.session(account))
    }
}

/// Sign-in that hands out the given accounts in order.
pub struct FakeSignIn {
    accounts: RefCell<Vec<String>>,
}

impl FakeSignIn {
    pub fn new(accounts: &[&str]) -> Self {
        Self {
            accounts: RefCell::new(accounts.iter().rev().map(|a| a.to_string()).collect()),
        }
    }
}

impl CredentialPrompt for FakeSignIn {
    async fn authenticate(&self, slot: &Path) -> Result<()> {
        let account = self
            .accounts
            .borrow_mut()
            .pop()
            .ok_or_else(|| MigrateError::AuthenticationError("no account chosen".to_string()))?;
        fs::write(
            slot,
            serde_json::json!({ "refresh_token": account }).to_string(),
        )?;
        Ok(())
    }
}

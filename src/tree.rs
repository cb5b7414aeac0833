//! Recursive walk, copy, permission and delete routines over asset trees.
//!
//! All routines run strictly one remote call at a time. Per-asset failures in
//! copy, permission and delete batches are logged and skipped; the batch
//! carries on with the remaining entries.

use futures::future::{FutureExt, LocalBoxFuture};
use tracing::{debug, info, warn};

use crate::asset_path::{fix_asset_path, rebase};
use crate::client::AssetService;
use crate::error::Result;
use crate::models::{Acl, AssetType};
use crate::prompt::Confirm;

/// One asset of a walked tree and where it maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub asset_type: AssetType,
    pub source: String,
    pub destination: String,
}

/// A failed asset within a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFailure {
    pub path: String,
    pub error: String,
}

/// Outcome of a batch of per-asset calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub attempted: usize,
    pub failures: Vec<EntryFailure>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.attempted - self.failures.len()
    }

    fn record<T>(&mut self, path: &str, result: Result<T>) {
        self.attempted += 1;
        if let Err(e) = result {
            warn!(asset = path, error = %e, "Asset operation failed");
            self.failures.push(EntryFailure {
                path: path.to_string(),
                error: e.to_string(),
            });
        }
    }
}

/// Outcome of [`copy_asset_tree`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyReport {
    pub copy: BatchReport,
    /// Present when destination permissions were changed.
    pub permissions: Option<BatchReport>,
}

/// Enumerate every asset under `from_root`, mapped onto `to_root`.
///
/// The root itself comes first. Each container's children are listed before
/// any grandchild, so every container precedes its descendants. A root whose
/// metadata cannot be read is treated as a folder.
pub async fn get_tree<S: AssetService>(
    service: &S,
    from_root: &str,
    to_root: &str,
) -> Result<Vec<TreeEntry>> {
    let from_root = fix_asset_path(from_root);
    let to_root = fix_asset_path(to_root);

    let root_type = match service.get_asset(&from_root).await {
        Ok(asset) => asset.asset_type,
        Err(e) => {
            debug!(root = %from_root, error = %e, "Root lookup failed, assuming FOLDER");
            AssetType::Folder
        }
    };

    let mut tree = vec![TreeEntry {
        asset_type: root_type,
        source: from_root.clone(),
        destination: to_root.clone(),
    }];
    if root_type.is_container() {
        tree.extend(walk_children(service, from_root, to_root).await?);
    }
    Ok(tree)
}

fn walk_children<'a, S: AssetService>(
    service: &'a S,
    from: String,
    to: String,
) -> LocalBoxFuture<'a, Result<Vec<TreeEntry>>> {
    async move {
        let mut entries = Vec::new();
        let mut next_levels = Vec::new();

        for asset in service.list_assets(&from).await? {
            let destination = rebase(&asset.name, &from, &to)?;
            if asset.asset_type.is_container() {
                next_levels.push((asset.name.clone(), destination.clone()));
            }
            entries.push(TreeEntry {
                asset_type: asset.asset_type,
                source: asset.name,
                destination,
            });
        }

        for (from, to) in next_levels {
            entries.extend(walk_children(service, from, to).await?);
        }
        Ok(entries)
    }
    .boxed_local()
}

/// Copy the tree under `from_root` to `to_root`.
///
/// Containers are created with their source type, leaves are copied without
/// overwriting. When `acl` is given it then replaces the ACL of every
/// destination path.
pub async fn copy_asset_tree<S: AssetService>(
    service: &S,
    from_root: &str,
    to_root: &str,
    acl: Option<&Acl>,
) -> Result<CopyReport> {
    let tree = get_tree(service, from_root, to_root).await?;
    let mut report = CopyReport::default();

    for entry in &tree {
        if entry.asset_type.is_container() {
            info!(asset_type = %entry.asset_type, asset = %entry.destination, "Creating");
            let result = service
                .create_asset(&entry.destination, entry.asset_type)
                .await;
            report.copy.record(&entry.destination, result);
        } else {
            info!(asset_type = %entry.asset_type, asset = %entry.destination, "Copying");
            let result = service
                .copy_asset(&entry.source, &entry.destination, false)
                .await;
            report.copy.record(&entry.destination, result);
        }
    }

    if let Some(acl) = acl {
        let destinations: Vec<String> = tree.into_iter().map(|e| e.destination).collect();
        report.permissions = Some(batch_change_permissions(service, &destinations, acl).await);
    }

    Ok(report)
}

/// Replace the ACL of every asset in `assets`.
pub async fn batch_change_permissions<S: AssetService>(
    service: &S,
    assets: &[String],
    acl: &Acl,
) -> BatchReport {
    let mut report = BatchReport::default();
    for asset in assets {
        info!(asset = %asset, "Changing permissions");
        let result = service.set_asset_acl(asset, acl).await;
        report.record(asset, result);
    }
    report
}

/// Replace the ACL of `root` and everything below it.
pub async fn change_tree_permissions<S: AssetService>(
    service: &S,
    root: &str,
    acl: &Acl,
) -> Result<BatchReport> {
    let assets: Vec<String> = get_tree(service, root, root)
        .await?
        .into_iter()
        .map(|e| e.source)
        .collect();
    Ok(batch_change_permissions(service, &assets, acl).await)
}

/// Progress of a guarded delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteState {
    AwaitingFirstConfirm,
    AwaitingSecondConfirm,
    Deleting,
    Done,
}

impl DeleteState {
    /// Next state after the operator answered.
    pub fn answer(self, agreed: bool) -> Self {
        match (self, agreed) {
            (DeleteState::AwaitingFirstConfirm, true) => DeleteState::AwaitingSecondConfirm,
            (DeleteState::AwaitingSecondConfirm, true) => DeleteState::Deleting,
            (DeleteState::Deleting, _) => DeleteState::Deleting,
            _ => DeleteState::Done,
        }
    }
}

/// Delete everything below `root` after two confirmations.
///
/// Returns `None` when the operator declined. The root itself is kept;
/// descendants go deepest first so no container is removed before its
/// children.
pub async fn delete_asset_tree<S: AssetService, C: Confirm>(
    service: &S,
    root: &str,
    confirm: &mut C,
) -> Result<Option<BatchReport>> {
    let mut state = DeleteState::AwaitingFirstConfirm;

    loop {
        state = match state {
            DeleteState::AwaitingFirstConfirm => {
                let question = format!("Are you sure you want to delete all assets under {}?", root);
                state.answer(confirm.confirm(&question)?)
            }
            DeleteState::AwaitingSecondConfirm => {
                let question = format!(
                    "You answered yes. Just double checking. Are you really sure you want to delete all assets under {}?",
                    root
                );
                state.answer(confirm.confirm(&question)?)
            }
            DeleteState::Deleting => break,
            DeleteState::Done => {
                info!(root, "Delete cancelled");
                return Ok(None);
            }
        };
    }

    let mut tree = get_tree(service, root, root).await?;
    tree.remove(0);
    tree.reverse();

    let mut report = BatchReport::default();
    for entry in &tree {
        info!(asset = %entry.source, "Deleting");
        let result = service.delete_asset(&entry.source).await;
        report.record(&entry.source, result);
    }
    Ok(Some(report))
}

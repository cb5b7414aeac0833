//! Helpers for Earth Engine asset names.
//!
//! The REST API only accepts absolute names of the form
//! `projects/<project>/assets/<path>`. Older user roots such as
//! `users/<name>/...` live under the `earthengine-legacy` project.

use regex::Regex;
use std::sync::LazyLock;

use crate::error::{MigrateError, Result};

/// Prefix for assets stored under the legacy project.
pub const LEGACY_PREFIX: &str = "projects/earthengine-legacy/assets/";

/// Project that owns every legacy root.
pub const LEGACY_PROJECT: &str = "projects/earthengine-legacy";

static ABSOLUTE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^projects/[^/]+/assets/.*$").expect("Invalid asset regex"));

static PARTS_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(projects/([^/]+))/assets/(.*)$").expect("Invalid asset parts regex")
});

/// Canonicalize an asset path into its absolute form.
///
/// Paths already matching `projects/<id>/assets/...` are returned unchanged,
/// anything else gets the legacy prefix. Applying it twice is the same as
/// applying it once.
///
/// # Examples
///
/// ```
/// use asset_migrator::asset_path::fix_asset_path;
///
/// assert_eq!(
///     fix_asset_path("users/a/demo"),
///     "projects/earthengine-legacy/assets/users/a/demo"
/// );
/// assert_eq!(fix_asset_path("projects/p/assets/x"), "projects/p/assets/x");
/// ```
pub fn fix_asset_path(path: &str) -> String {
    if ABSOLUTE_REGEX.is_match(path) {
        path.to_string()
    } else {
        format!("{}{}", LEGACY_PREFIX, path)
    }
}

/// Append a trailing `/` unless one is already there.
pub fn with_trailing_slash(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{}/", path)
    }
}

/// Split an absolute asset name into its project (`projects/<id>`) and the
/// asset id relative to that project.
pub fn split_asset_name(name: &str) -> Result<(&str, &str)> {
    let captures = PARTS_REGEX
        .captures(name)
        .ok_or_else(|| MigrateError::InvalidAssetPath(name.to_string()))?;

    match (captures.get(1), captures.get(3)) {
        (Some(project), Some(id)) if !id.as_str().is_empty() => Ok((project.as_str(), id.as_str())),
        _ => Err(MigrateError::InvalidAssetPath(name.to_string())),
    }
}

/// Return the asset root that owns `path`.
///
/// Legacy roots are the first two segments below the legacy prefix
/// (`users/<name>` or `projects/<name>`). Cloud projects have a single root,
/// `projects/<id>/assets`.
pub fn asset_root(path: &str) -> Result<String> {
    let name = fix_asset_path(path);
    let captures = PARTS_REGEX
        .captures(&name)
        .ok_or_else(|| MigrateError::InvalidAssetPath(path.to_string()))?;

    let (project, id) = match (captures.get(1), captures.get(3)) {
        (Some(project), Some(id)) => (project.as_str(), id.as_str()),
        _ => return Err(MigrateError::InvalidAssetPath(path.to_string())),
    };

    // A cloud project's root may be named with an empty asset id.
    if project != LEGACY_PROJECT {
        return Ok(format!("{}/assets", project));
    }

    let segments: Vec<&str> = id.split('/').filter(|s| !s.is_empty()).take(2).collect();
    if segments.len() < 2 {
        return Err(MigrateError::InvalidAssetPath(path.to_string()));
    }

    Ok(format!("{}{}", LEGACY_PREFIX, segments.join("/")))
}

/// Map `path` below `from_root` onto the same relative location below
/// `to_root` by textual prefix substitution.
pub fn rebase(path: &str, from_root: &str, to_root: &str) -> Result<String> {
    let from_prefix = with_trailing_slash(from_root);
    let to_prefix = with_trailing_slash(to_root);

    path.strip_prefix(&from_prefix)
        .map(|rest| format!("{}{}", to_prefix, rest))
        .ok_or_else(|| MigrateError::OutsideRoot {
            path: path.to_string(),
            root: from_root.to_string(),
        })
}

//! Path validation for the process launcher.
//!
//! Prevents path traversal when resolving the target script or working directory
//! supplied by a tool-façade caller.

use crate::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Validates a target script path before spawn.
///
/// Rejects `..` components outright, then canonicalizes (resolving symlinks) and
/// confirms the file exists. If `workspace_root` is configured, the canonical path
/// must stay inside it.
pub fn validate_target_path(path_str: &str, workspace_root: Option<&str>) -> Result<PathBuf> {
    let path = Path::new(path_str);

    for component in path.components() {
        if component == Component::ParentDir {
            return Err(Error::InvalidTarget(format!(
                "path contains '..' component: {}",
                path_str
            )));
        }
    }

    let canonical = path
        .canonicalize()
        .map_err(|e| Error::InvalidTarget(format!("invalid or inaccessible path '{}': {}", path_str, e)))?;

    if let Some(root) = workspace_root {
        let root_canonical = PathBuf::from(root)
            .canonicalize()
            .map_err(|e| Error::InvalidTarget(format!("invalid workspace root '{}': {}", root, e)))?;
        if !canonical.starts_with(&root_canonical) {
            return Err(Error::InvalidTarget(format!(
                "path outside workspace: '{}' (workspace '{}')",
                canonical.display(),
                root_canonical.display()
            )));
        }
    }

    Ok(canonical)
}

/// Validates a working directory, same traversal/workspace checks as
/// [`validate_target_path`] but additionally requiring a directory.
pub fn validate_working_directory(path_str: &str, workspace_root: Option<&str>) -> Result<PathBuf> {
    let canonical = validate_target_path(path_str, workspace_root)?;
    if !canonical.is_dir() {
        return Err(Error::InvalidTarget(format!("not a directory: '{}'", canonical.display())));
    }
    Ok(canonical)
}

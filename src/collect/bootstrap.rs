//! One-time creation of the customizable copy of the baseline file.
//!
//! The copy is staged in a temporary file next to the target and moved into
//! place with no-clobber semantics, so concurrent runs never truncate or
//! overwrite a file that already exists.

use crate::error::{AuditError, AuditResult};
use serde::{Deserialize, Serialize};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// What the bootstrap step did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BootstrapOutcome {
    /// A new copy was written.
    Created { path: PathBuf },
    /// A file was already there and was left untouched.
    AlreadyPresent { path: PathBuf },
}

impl BootstrapOutcome {
    pub fn path(&self) -> &Path {
        match self {
            BootstrapOutcome::Created { path } | BootstrapOutcome::AlreadyPresent { path } => path,
        }
    }

    pub fn created(&self) -> bool {
        matches!(self, BootstrapOutcome::Created { .. })
    }
}

/// Copy `shipped` to `target` unless `target` already exists.
pub fn bootstrap_local_copy(shipped: &Path, target: &Path) -> AuditResult<BootstrapOutcome> {
    let target_label = target.display().to_string();

    if target.exists() {
        debug!("Local configuration already present at {}", target_label);
        return Ok(BootstrapOutcome::AlreadyPresent {
            path: target.to_path_buf(),
        });
    }

    let content = std::fs::read(shipped)
        .map_err(|e| AuditError::source_unavailable(&shipped.display().to_string(), e))?;

    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| AuditError::source_unavailable(&target_label, e))?;

    let mut staged =
        NamedTempFile::new_in(dir).map_err(|e| AuditError::source_unavailable(&target_label, e))?;
    staged
        .write_all(&content)
        .and_then(|_| staged.as_file().sync_all())
        .map_err(|e| AuditError::source_unavailable(&target_label, e))?;

    match staged.persist_noclobber(target) {
        Ok(_) => {
            info!("Created local configuration file {}", target_label);
            Ok(BootstrapOutcome::Created {
                path: target.to_path_buf(),
            })
        }
        // Another run won the race.
        Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
            Ok(BootstrapOutcome::AlreadyPresent {
                path: target.to_path_buf(),
            })
        }
        Err(e) => Err(AuditError::source_unavailable(&target_label, e.error)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use tempfile::TempDir;

    #[test]
    fn test_creates_copy_with_parent_dirs() {
        let temp = TempDir::new().unwrap();
        let shipped = temp.path().join("shipped.yaml");
        std::fs::write(&shipped, "Order:\n  modifiers: []\n").unwrap();
        let target = temp.path().join("mysite/_config/shop.yaml");

        let outcome = bootstrap_local_copy(&shipped, &target).unwrap();
        assert!(outcome.created());
        assert_eq!(
            std::fs::read_to_string(&target).unwrap(),
            "Order:\n  modifiers: []\n"
        );
    }

    #[test]
    fn test_second_run_never_overwrites() {
        let temp = TempDir::new().unwrap();
        let shipped = temp.path().join("shipped.yaml");
        std::fs::write(&shipped, "Order: {}\n").unwrap();
        let target = temp.path().join("local.yaml");

        assert!(bootstrap_local_copy(&shipped, &target).unwrap().created());
        std::fs::write(&target, "Order:\n  modifiers: [TaxModifier]\n").unwrap();

        let outcome = bootstrap_local_copy(&shipped, &target).unwrap();
        assert_eq!(
            outcome,
            BootstrapOutcome::AlreadyPresent {
                path: target.clone()
            }
        );
        assert_eq!(
            std::fs::read_to_string(&target).unwrap(),
            "Order:\n  modifiers: [TaxModifier]\n"
        );
    }

    #[test]
    fn test_existing_target_needs_no_shipped_file() {
        let temp = TempDir::new().unwrap();
        let target = temp.path().join("local.yaml");
        std::fs::write(&target, "{}").unwrap();

        let outcome =
            bootstrap_local_copy(&temp.path().join("missing.yaml"), &target).unwrap();
        assert!(!outcome.created());
    }

    #[test]
    fn test_missing_shipped_file_is_source_unavailable() {
        let temp = TempDir::new().unwrap();
        let shipped = temp.path().join("missing.yaml");
        let err = bootstrap_local_copy(&shipped, &temp.path().join("local.yaml")).unwrap_err();
        assert_eq!(err.code, ErrorCode::SourceUnavailable);
        assert_eq!(err.resource, Some(shipped.display().to_string()));
    }
}

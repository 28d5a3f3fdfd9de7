//! Default StorageClass transitions
//!
//! Kubernetes allows several classes to carry the default annotation at once,
//! and a PVC created while two are flagged gets an unpredictable class. The
//! transition therefore demotes every other default before promoting the
//! target. A PVC created between the two steps sees no default at all, which
//! fails loudly instead of silently landing on the wrong class.
//!
//! Two wizards running against the same cluster can still interleave their
//! patches. There is no lock around the sequence.

use super::{StorageClassInfo, StorageClassStore};
use crate::error::{CompileError, ExternalError};
use crate::services::manifests::{PROVISIONER_NAME, StorageConfig};
use anyhow::Result;

/// The patches needed to make `target` the single default class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultClassTransition {
    pub target: String,
    pub demote: Vec<String>,
    pub promote: bool,
}

impl DefaultClassTransition {
    pub fn plan(classes: &[StorageClassInfo], target: &str) -> Self {
        let demote = classes
            .iter()
            .filter(|c| c.is_default && c.name != target)
            .map(|c| c.name.clone())
            .collect();
        let promote = !classes.iter().any(|c| c.name == target && c.is_default);

        Self {
            target: target.to_string(),
            demote,
            promote,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.demote.is_empty() && !self.promote
    }

    /// All demotions complete before the promotion starts
    pub fn execute<S: StorageClassStore + ?Sized>(&self, store: &S) -> Result<()> {
        for name in &self.demote {
            store.set_default(name, false)?;
            println!("  ✓ {} is no longer the default class", name);
        }
        if self.promote {
            store.set_default(&self.target, true)?;
            println!("  ✓ {} is now the default class", self.target);
        }
        Ok(())
    }
}

/// Make `target` the only default StorageClass. Re-running is a no-op.
pub fn make_default<S: StorageClassStore + ?Sized>(
    store: &S,
    target: &str,
) -> Result<DefaultClassTransition> {
    let classes = store.list_storage_classes()?;
    if !classes.iter().any(|c| c.name == target) {
        return Err(ExternalError::ApplyFailed {
            what: format!("set default storage class {}", target),
            detail: "storage class not found on the cluster".to_string(),
        }
        .into());
    }

    let transition = DefaultClassTransition::plan(&classes, target);
    if transition.is_noop() {
        println!("  ✓ {} is already the only default class", target);
    } else {
        transition.execute(store)?;
    }
    Ok(transition)
}

/// A class of the same name may only exist if this provisioner already owns it
pub fn ensure_class_name_available(
    classes: &[StorageClassInfo],
    config: &StorageConfig,
) -> Result<(), CompileError> {
    match classes.iter().find(|c| c.name == config.class_name) {
        Some(existing) if existing.provisioner != PROVISIONER_NAME => {
            Err(CompileError::StorageClassConflict {
                name: existing.name.clone(),
                existing: existing.provisioner.clone(),
            })
        }
        _ => Ok(()),
    }
}

//! Reconciliation of a requested root directory change against the current
//! configuration.
//!
//! [`reconcile`] is pure: it decides the new root set and which previously
//! indexed roots must be purged from the catalog, and nothing else.

use serde::Serialize;

use crate::root_dirs::{ChangeRequest, RootDirectory, RootDirectorySet};

/// Outcome of reconciling a [`ChangeRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    /// The root set to persist.
    pub final_dirs: RootDirectorySet,

    /// Previously configured roots whose catalog entries must be dropped.
    pub purge_dirs: Vec<RootDirectory>,

    /// Set when the request re-selects the home directory that is already
    /// configured; nothing is persisted and no rebuild runs.
    pub unchanged: bool,
}

impl Reconciliation {
    fn unchanged(previous: &RootDirectorySet) -> Self {
        Self {
            final_dirs: previous.clone(),
            purge_dirs: Vec::new(),
            unchanged: true,
        }
    }
}

/// Compute the new root set and the roots to purge.
///
/// Removals naming a root that is not configured are ignored. Requested
/// additions already covered by a surviving root are dropped, and configured
/// roots beneath a requested addition are replaced by it.
pub fn reconcile(previous: &RootDirectorySet, request: &ChangeRequest) -> Reconciliation {
    if previous.is_home() && request.selects_only_home() {
        return Reconciliation::unchanged(previous);
    }

    if request.additions.iter().any(RootDirectory::is_home) {
        return Reconciliation {
            final_dirs: RootDirectorySet::home(),
            purge_dirs: previous.iter().filter(|d| !d.is_home()).cloned().collect(),
            unchanged: false,
        };
    }

    let mut working: Vec<RootDirectory> = if previous.is_home() {
        Vec::new()
    } else {
        previous.iter().cloned().collect()
    };

    let implicit = request.additions.iter().flat_map(|addition| {
        previous
            .iter()
            .filter(move |existing| addition.is_strict_ancestor_of(existing))
    });
    let removals: Vec<&RootDirectory> = request.removals.iter().chain(implicit).collect();

    working.retain(|dir| !removals.contains(&dir));
    working.extend(request.additions.iter().cloned());

    let final_dirs = RootDirectorySet::from_dirs(working);
    let purge_dirs = previous
        .iter()
        .filter(|dir| !final_dirs.contains(dir))
        .cloned()
        .collect();

    Reconciliation {
        final_dirs,
        purge_dirs,
        unchanged: false,
    }
}

//! Registry of paths under operation
//!
//! A path is in flight if it, or any of its ancestor folders, is registered.
//! The executor registers each unit's path on dispatch through an
//! [`InFlightGuard`], which deregisters when dropped. The UI layer may mark
//! whole folders with [`InFlightPaths::mark`].

use std::sync::Arc;

use dashmap::DashSet;
use tracing::trace;
use vaultsync_core::domain::VaultPath;

/// Shared set of in-flight paths
#[derive(Debug, Clone, Default)]
pub struct InFlightPaths {
    paths: Arc<DashSet<VaultPath>>,
}

impl InFlightPaths {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `path` or one of its ancestors is registered
    pub fn is_in_flight(&self, path: &VaultPath) -> bool {
        self.paths.contains(path) || path.ancestor_paths().any(|a| self.paths.contains(&a))
    }

    /// Registers `path` unless it is already in flight
    pub fn try_register(&self, path: &VaultPath) -> Option<InFlightGuard> {
        if self.is_in_flight(path) || !self.paths.insert(path.clone()) {
            return None;
        }
        trace!(path = %path, "Registered in-flight path");
        Some(InFlightGuard {
            paths: Arc::clone(&self.paths),
            path: path.clone(),
        })
    }

    /// Marks a path without a guard; pair with [`Self::unmark`]
    pub fn mark(&self, path: &VaultPath) -> bool {
        self.paths.insert(path.clone())
    }

    pub fn unmark(&self, path: &VaultPath) -> bool {
        self.paths.remove(path).is_some()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Deregisters its path on drop
#[derive(Debug)]
pub struct InFlightGuard {
    paths: Arc<DashSet<VaultPath>>,
    path: VaultPath,
}

impl InFlightGuard {
    pub fn path(&self) -> &VaultPath {
        &self.path
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.paths.remove(&self.path);
        trace!(path = %self.path, "Released in-flight path");
    }
}

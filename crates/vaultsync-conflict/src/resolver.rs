//! Placement collision resolver
//!
//! Planning checks every destination against the working tree exactly once.
//! Resolution then applies one policy to the whole batch:
//! - `Overwrite`: keep destinations as-is
//! - `Rename`: move colliding destinations to the lowest free `name (n).ext`
//! - `Skip`: drop colliding placements

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use vaultsync_core::{
    domain::{ConflictSet, Placement, Resolution, VaultPath},
    ports::IVaultFileSystem,
};

use crate::{error::ConflictError, namer::NumberedNamer};

/// Plans and resolves destination collisions
pub struct ConflictResolver {
    filesystem: Arc<dyn IVaultFileSystem>,
}

impl ConflictResolver {
    pub fn new(filesystem: Arc<dyn IVaultFileSystem>) -> Self {
        Self { filesystem }
    }

    /// Partitions placements into colliding and non-colliding
    ///
    /// A destination collides if it exists in the tree, or if an earlier
    /// placement of the same batch already targets it.
    pub async fn plan(&self, placements: Vec<Placement>) -> Result<ConflictSet, ConflictError> {
        let mut set = ConflictSet::default();
        let mut claimed: HashSet<VaultPath> = HashSet::new();

        for placement in placements {
            let exists = self.filesystem.file_exists(&placement.destination).await?;
            let duplicate = !claimed.insert(placement.destination.clone());
            if exists || duplicate {
                debug!(
                    source = %placement.source,
                    destination = %placement.destination,
                    exists,
                    duplicate,
                    "Placement collides"
                );
                set.conflicts.push(placement);
            } else {
                set.non_conflicts.push(placement);
            }
        }

        Ok(set)
    }

    /// Applies `resolution` to every colliding placement
    ///
    /// Returns the final placements: non-colliding ones first, in order, then
    /// the surviving colliding ones.
    pub async fn resolve(
        &self,
        set: ConflictSet,
        resolution: Resolution,
    ) -> Result<Vec<Placement>, ConflictError> {
        info!(
            resolution = %resolution,
            conflicts = set.conflicts.len(),
            clear = set.non_conflicts.len(),
            "Resolving placement collisions"
        );

        let ConflictSet {
            conflicts,
            non_conflicts,
        } = set;
        let mut finals = non_conflicts;

        match resolution {
            Resolution::Overwrite => finals.extend(conflicts),
            Resolution::Skip => {}
            Resolution::Rename => {
                let mut taken: HashSet<VaultPath> =
                    finals.iter().map(|p| p.destination.clone()).collect();
                for placement in conflicts {
                    let destination = self.free_name(&placement.destination, &taken).await?;
                    taken.insert(destination.clone());
                    finals.push(Placement::new(placement.source, destination));
                }
            }
        }

        Ok(finals)
    }

    /// Plans and resolves in one step
    pub async fn place(
        &self,
        placements: Vec<Placement>,
        resolution: Resolution,
    ) -> Result<Vec<Placement>, ConflictError> {
        let set = self.plan(placements).await?;
        self.resolve(set, resolution).await
    }

    /// Lowest numbered sibling of `destination` that exists neither on disk
    /// nor among names already handed out in this batch
    async fn free_name(
        &self,
        destination: &VaultPath,
        taken: &HashSet<VaultPath>,
    ) -> Result<VaultPath, ConflictError> {
        for candidate in NumberedNamer::candidates(destination) {
            let candidate = candidate?;
            if taken.contains(&candidate) {
                continue;
            }
            if !self.filesystem.file_exists(&candidate).await? {
                debug!(from = %destination, to = %candidate, "Renamed colliding destination");
                return Ok(candidate);
            }
        }

        Err(ConflictError::NameSpaceExhausted {
            path: destination.to_string(),
            attempts: NumberedNamer::MAX_ATTEMPTS,
        })
    }
}

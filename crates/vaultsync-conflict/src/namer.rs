//! Numbered names for colliding placements
//!
//! Generates sibling names following the pattern `name (n).ext`, counting up
//! from 1. The extension is whatever follows the last dot, so
//! `archive.tar.gz` becomes `archive.tar (1).gz`.

use vaultsync_core::domain::{DomainError, VaultPath};

/// Generates numbered sibling names
pub struct NumberedNamer;

impl NumberedNamer {
    /// Upper bound on `n` before giving up
    pub const MAX_ATTEMPTS: u32 = 10_000;

    /// The `n`-th numbered sibling of `path`
    pub fn candidate(path: &VaultPath, n: u32) -> Result<VaultPath, DomainError> {
        let name = match path.stem_and_extension() {
            (stem, Some(ext)) => format!("{stem} ({n}).{ext}"),
            (stem, None) => format!("{stem} ({n})"),
        };
        path.with_file_name(&name)
    }

    /// Numbered candidates `(1)`, `(2)`, ... up to [`Self::MAX_ATTEMPTS`]
    pub fn candidates(path: &VaultPath) -> impl Iterator<Item = Result<VaultPath, DomainError>> + '_ {
        (1..=Self::MAX_ATTEMPTS).map(move |n| Self::candidate(path, n))
    }
}

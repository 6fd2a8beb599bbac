//! Vault ignore rules
//!
//! Glob patterns matched against the whole vault-relative path and against
//! every single component of it, so `*.tmp` hides `a/b/x.tmp` and `build`
//! hides everything beneath a `build` folder. The `.vaultsync` metadata
//! folder is always ignored.

use glob::{MatchOptions, Pattern};
use tracing::{debug, trace, warn};
use vaultsync_core::domain::VaultPath;

/// Name of the per-vault metadata folder
pub const METADATA_DIR: &str = ".vaultsync";

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Compiled ignore patterns
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    patterns: Vec<Pattern>,
}

impl IgnoreRules {
    /// Compiles the given patterns
    ///
    /// Invalid patterns are logged and skipped; `Config::validate` reports
    /// them to the user.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Self {
        let patterns: Vec<Pattern> = patterns
            .iter()
            .filter_map(|raw| match Pattern::new(raw.as_ref()) {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!(pattern = %raw.as_ref(), error = %e, "Skipping invalid ignore pattern");
                    None
                }
            })
            .collect();

        debug!(patterns = patterns.len(), "Ignore rules compiled");
        Self { patterns }
    }

    /// Returns true if `path` is hidden from synchronization
    pub fn is_ignored(&self, path: &VaultPath) -> bool {
        if path.is_root() {
            return false;
        }
        let full = path.as_str();
        if full.split('/').next() == Some(METADATA_DIR) {
            return true;
        }

        let hit = self.patterns.iter().find(|pattern| {
            pattern.matches_with(full, MATCH_OPTIONS)
                || full
                    .split('/')
                    .any(|component| pattern.matches_with(component, MATCH_OPTIONS))
        });

        if let Some(pattern) = hit {
            trace!(path = %path, pattern = %pattern, "Path ignored");
        }
        hit.is_some()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

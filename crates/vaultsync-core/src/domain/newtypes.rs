//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for domain identifiers and values.
//! Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// Identifier types
// ============================================================================

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Create a new ", $label)]
            ///
            /// # Errors
            /// Returns error if the value is empty or contains whitespace
            pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
                let value = value.into();
                if value.is_empty() {
                    return Err(DomainError::InvalidId(format!("{} cannot be empty", $label)));
                }
                if value.chars().any(char::is_whitespace) {
                    return Err(DomainError::InvalidId(format!(
                        "{} contains whitespace: {value}",
                        $label
                    )));
                }
                Ok(Self(value))
            }

            /// Get the inner string reference
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = DomainError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                Self::new(s)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

string_id!(
    /// Identifier of a remote file record, assigned by the metadata service
    FileId,
    "file ID"
);

string_id!(
    /// Identifier of a vault user
    UserId,
    "user ID"
);

string_id!(
    /// Identifier of a workstation a user checks files out on
    MachineId,
    "machine ID"
);

impl FileId {
    /// Generate a fresh random file id (used by in-process services)
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }
}

impl MachineId {
    /// Generate a fresh random machine id for a newly configured workstation
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

// ============================================================================
// ContentHash
// ============================================================================

/// Hash of file bytes, used to detect modification and to address blob storage
///
/// Format: lowercase hexadecimal (SHA-256 for the bundled filesystem adapter)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Create a new ContentHash, normalizing to lowercase
    ///
    /// # Errors
    /// Returns error if the hash is empty or not hexadecimal
    pub fn new(hash: impl Into<String>) -> Result<Self, DomainError> {
        let hash = hash.into();
        if hash.is_empty() {
            return Err(DomainError::InvalidHash("Hash cannot be empty".to_string()));
        }
        if !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DomainError::InvalidHash(format!(
                "Hash is not hexadecimal: {hash}"
            )));
        }
        Ok(Self(hash.to_ascii_lowercase()))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Builds a hash from raw digest bytes
    #[must_use]
    pub fn from_digest(digest: &[u8]) -> Self {
        let hex = digest.iter().map(|b| format!("{b:02x}")).collect();
        Self(hex)
    }

    /// Short prefix for log output
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContentHash {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ContentHash {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

// ============================================================================
// VaultPath
// ============================================================================

/// A vault-rooted, forward-slash normalized relative path
///
/// The vault root itself is the empty path. Paths never start or end with
/// `/` and never contain `.` or `..` components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VaultPath(String);

impl VaultPath {
    /// Create a new VaultPath, normalizing separators and redundant slashes
    ///
    /// # Errors
    /// Returns error if the path contains traversal components or is empty
    pub fn new(path: impl Into<String>) -> Result<Self, DomainError> {
        let raw: String = path.into();
        let replaced = raw.replace('\\', "/");

        let mut components = Vec::new();
        for component in replaced.split('/') {
            match component {
                "" | "." => continue,
                ".." => {
                    return Err(DomainError::InvalidPath(format!(
                        "Path contains traversal: {raw}"
                    )))
                }
                c => components.push(c),
            }
        }

        if components.is_empty() {
            return Err(DomainError::InvalidPath(format!(
                "Path is empty after normalization: '{raw}'"
            )));
        }

        Ok(Self(components.join("/")))
    }

    /// The vault root (empty path)
    #[must_use]
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Returns true if this is the vault root
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Join a single path component
    ///
    /// # Errors
    /// Returns error if the component is empty or contains separators
    pub fn join(&self, component: &str) -> Result<Self, DomainError> {
        if component.is_empty()
            || component.contains('/')
            || component.contains('\\')
            || component == "."
            || component == ".."
        {
            return Err(DomainError::InvalidPath(format!(
                "Invalid path component: {component}"
            )));
        }

        if self.is_root() {
            Ok(Self(component.to_string()))
        } else {
            Ok(Self(format!("{}/{component}", self.0)))
        }
    }

    /// Get the parent folder (the root for top-level entries)
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => Some(Self::root()),
        }
    }

    /// Get the last path component
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        self.0.rsplit('/').next()
    }

    /// Splits the file name into stem and extension (without the dot)
    ///
    /// A leading dot does not start an extension (`.vaultignore` has none).
    #[must_use]
    pub fn stem_and_extension(&self) -> (&str, Option<&str>) {
        let name = self.file_name().unwrap_or("");
        match name.rfind('.') {
            Some(0) | None => (name, None),
            Some(idx) => (&name[..idx], Some(&name[idx + 1..])),
        }
    }

    /// Returns a sibling path with a different file name
    ///
    /// # Errors
    /// Returns error if the name is not a valid component
    pub fn with_file_name(&self, name: &str) -> Result<Self, DomainError> {
        self.parent().unwrap_or_else(Self::root).join(name)
    }

    /// Ancestor folders from the root down to the direct parent
    ///
    /// `a/b/c.txt` yields `""`, `"a"`, `"a/b"`.
    pub fn ancestors(&self) -> impl Iterator<Item = &str> + '_ {
        let root = std::iter::once("");
        let inner = self
            .0
            .match_indices('/')
            .map(move |(idx, _)| &self.0[..idx]);
        root.filter(move |_| !self.is_root()).chain(inner)
    }

    /// Ancestor folders as owned paths, root first
    pub fn ancestor_paths(&self) -> impl Iterator<Item = VaultPath> + '_ {
        self.ancestors().map(|s| Self(s.to_string()))
    }

    /// Joins a relative, possibly multi-component path
    ///
    /// # Errors
    /// Returns error if `relative` is empty or escapes the vault
    pub fn join_relative(&self, relative: &str) -> Result<Self, DomainError> {
        if self.is_root() {
            Self::new(relative)
        } else {
            Self::new(format!("{}/{relative}", self.0))
        }
    }

    /// Returns true if `self` equals `folder` or lies beneath it
    #[must_use]
    pub fn is_within(&self, folder: &VaultPath) -> bool {
        if folder.is_root() {
            return true;
        }
        self.0 == folder.0
            || (self.0.starts_with(&folder.0) && self.0.as_bytes().get(folder.0.len()) == Some(&b'/'))
    }

    /// Path of `self` relative to `folder`, if `self` lies strictly beneath it
    #[must_use]
    pub fn strip_prefix(&self, folder: &VaultPath) -> Option<&str> {
        if folder.is_root() {
            return (!self.is_root()).then_some(self.0.as_str());
        }
        self.0
            .strip_prefix(&folder.0)
            .and_then(|rest| rest.strip_prefix('/'))
    }
}

impl Display for VaultPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "/")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl FromStr for VaultPath {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for VaultPath {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        if s.is_empty() {
            return Ok(Self::root());
        }
        Self::new(s)
    }
}

impl From<VaultPath> for String {
    fn from(path: VaultPath) -> Self {
        path.0
    }
}

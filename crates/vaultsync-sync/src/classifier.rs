//! Diff status classification
//!
//! Classification is a pure function of (local state, remote record, ignore
//! match) plus the acting user and a reference time. Inputs are first reduced
//! to a [`Facts`] value, then matched against [`RULES`], an ordered table
//! where the first matching row wins. Precedence is therefore exactly the
//! order of the table:
//!
//! | # | pairing     | condition                                   | status          |
//! |---|-------------|---------------------------------------------|-----------------|
//! | 1 | any         | ignore match                                | `ignored`       |
//! | 2 | any         | directory, or nothing on either side        | `none`          |
//! | 3 | local only  | was synced before                           | `deletedRemote` |
//! | 4 | local only  |                                             | `added`         |
//! | 5 | remote only | held by me                                  | `deleted`       |
//! | 6 | remote only | created recently by another user            | `cloudNew`      |
//! | 7 | remote only |                                             | `cloud`         |
//! | 8 | both        | path changed, same content                  | `moved`         |
//! | 9 | both        | content differs, locally modified           | `modified`      |
//! |10 | both        | content differs, remote ahead               | `outdated`      |
//! |11 | both        | content differs                             | `modified`      |
//! |12 | both        |                                             | `none`          |
//!
//! A locally modified file that is also behind head reports `modified`.

use chrono::{DateTime, Duration, Utc};
use vaultsync_core::domain::{DiffStatus, FileRecord, LocalState, RemoteRecord, UserId, VaultPath};

use crate::ignore::IgnoreRules;

/// Inputs besides the file itself
#[derive(Debug, Clone)]
pub struct ClassifyContext {
    /// The acting user
    pub user: UserId,
    /// Reference time for the `cloudNew` window
    pub now: DateTime<Utc>,
    /// How long a remote addition by someone else stays `cloudNew`
    pub cloud_new_window: Duration,
}

impl ClassifyContext {
    pub fn new(user: UserId, now: DateTime<Utc>, cloud_new_window: Duration) -> Self {
        Self {
            user,
            now,
            cloud_new_window,
        }
    }
}

// ============================================================================
// Facts and rules
// ============================================================================

/// Which sides of the pair exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pairing {
    Neither,
    LocalOnly,
    RemoteOnly,
    Both,
}

/// Boolean facts a rule may test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Facts {
    pub pairing: Pairing,
    pub ignored: bool,
    pub directory: bool,
    pub was_synced: bool,
    pub hash_equal: bool,
    pub path_changed: bool,
    pub remote_ahead: bool,
    pub locally_modified: bool,
    pub held_by_me: bool,
    pub recent_by_other: bool,
}

/// One row of the precedence table
pub struct Rule {
    pub status: DiffStatus,
    pub applies: fn(&Facts) -> bool,
}

/// The precedence table, first match wins
pub static RULES: &[Rule] = &[
    Rule {
        status: DiffStatus::Ignored,
        applies: |f| f.ignored,
    },
    Rule {
        status: DiffStatus::Synced,
        applies: |f| f.directory || f.pairing == Pairing::Neither,
    },
    Rule {
        status: DiffStatus::DeletedRemote,
        applies: |f| f.pairing == Pairing::LocalOnly && f.was_synced,
    },
    Rule {
        status: DiffStatus::Added,
        applies: |f| f.pairing == Pairing::LocalOnly,
    },
    Rule {
        status: DiffStatus::Deleted,
        applies: |f| f.pairing == Pairing::RemoteOnly && f.held_by_me,
    },
    Rule {
        status: DiffStatus::CloudNew,
        applies: |f| f.pairing == Pairing::RemoteOnly && f.recent_by_other,
    },
    Rule {
        status: DiffStatus::Cloud,
        applies: |f| f.pairing == Pairing::RemoteOnly,
    },
    Rule {
        status: DiffStatus::Moved,
        applies: |f| f.path_changed && f.hash_equal,
    },
    Rule {
        status: DiffStatus::Modified,
        applies: |f| !f.hash_equal && f.locally_modified,
    },
    Rule {
        status: DiffStatus::Outdated,
        applies: |f| !f.hash_equal && f.remote_ahead,
    },
    Rule {
        status: DiffStatus::Modified,
        applies: |f| !f.hash_equal,
    },
    Rule {
        status: DiffStatus::Synced,
        applies: |_| true,
    },
];

// ============================================================================
// DiffClassifier
// ============================================================================

/// Stateless diff classifier
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffClassifier;

impl DiffClassifier {
    /// Reduces a local/remote pair to the facts the rules test
    ///
    /// A soft-deleted remote record counts as absent, with the file marked
    /// as previously synced.
    pub fn facts(
        path: &VaultPath,
        is_directory: bool,
        local: Option<&LocalState>,
        remote: Option<&RemoteRecord>,
        ignored: bool,
        ctx: &ClassifyContext,
    ) -> Facts {
        let live = remote.filter(|r| !r.deleted);
        let tombstoned = remote.is_some_and(|r| r.deleted);

        let pairing = match (local.is_some(), live.is_some()) {
            (false, false) => Pairing::Neither,
            (true, false) => Pairing::LocalOnly,
            (false, true) => Pairing::RemoteOnly,
            (true, true) => Pairing::Both,
        };

        let was_synced = tombstoned || local.is_some_and(|l| l.active_version.is_some());

        let hash_equal = match (local, live) {
            (Some(l), Some(r)) => l.content_hash.as_ref() == Some(&r.content_hash),
            _ => false,
        };

        let remote_ahead = match (local, live) {
            (Some(l), Some(r)) => r.version > l.active_version.unwrap_or(0),
            _ => false,
        };

        let locally_modified = match (local, live) {
            (Some(l), Some(r)) => l.differs_from_base(Some(&r.content_hash)),
            _ => false,
        };

        let held_by_me = live.is_some_and(|r| r.is_held_by(&ctx.user));

        let recent_by_other = live.is_some_and(|r| {
            let by_other = r.created_by.as_ref().is_some_and(|u| *u != ctx.user);
            let recent = r
                .created_at
                .is_some_and(|at| ctx.now.signed_duration_since(at) <= ctx.cloud_new_window);
            by_other && recent
        });

        Facts {
            pairing,
            ignored,
            directory: is_directory,
            was_synced,
            hash_equal,
            path_changed: live.is_some_and(|r| r.path != *path),
            remote_ahead,
            locally_modified,
            held_by_me,
            recent_by_other,
        }
    }

    /// First status of [`RULES`] whose condition holds
    pub fn status_for(facts: &Facts) -> DiffStatus {
        RULES
            .iter()
            .find(|rule| (rule.applies)(facts))
            .map_or(DiffStatus::Synced, |rule| rule.status)
    }

    /// Classifies a single local/remote pair
    pub fn classify(
        &self,
        path: &VaultPath,
        local: Option<&LocalState>,
        remote: Option<&RemoteRecord>,
        ignore: &IgnoreRules,
        ctx: &ClassifyContext,
    ) -> DiffStatus {
        let facts = Self::facts(path, false, local, remote, ignore.is_ignored(path), ctx);
        Self::status_for(&facts)
    }

    /// Classifies a table record
    pub fn classify_record(
        &self,
        record: &FileRecord,
        ignore: &IgnoreRules,
        ctx: &ClassifyContext,
    ) -> DiffStatus {
        let facts = Self::facts(
            record.path(),
            record.is_directory(),
            record.local(),
            record.remote(),
            ignore.is_ignored(record.path()),
            ctx,
        );
        Self::status_for(&facts)
    }
}

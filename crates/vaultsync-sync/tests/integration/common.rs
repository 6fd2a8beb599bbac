//! Shared fakes for sync integration tests
//!
//! In-memory implementations of the three ports with deterministic failure
//! injection, plus a harness that wires them into a connected vault and an
//! executor.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use chrono::Utc;
use vaultsync_audit::{AuditLogger, MemoryAuditStore};
use vaultsync_core::{
    domain::{
        ContentHash, FileId, Identity, MachineId, PendingMetadata, RemoteRecord, Role, UserId,
        VaultPath,
    },
    ports::{
        CheckinFields, DirEntry, IAuditStore, IBlobStore, IMetadataService, IVaultFileSystem,
        NewRecord,
    },
};
use vaultsync_sync::{
    content_hash_of, CommandExecutor, ExecutorSettings, Vault, VaultPorts, VaultSettings,
};

pub fn path(s: &str) -> VaultPath {
    VaultPath::new(s).unwrap()
}

pub fn user(s: &str) -> UserId {
    UserId::new(s).unwrap()
}

pub fn machine(s: &str) -> MachineId {
    MachineId::new(s).unwrap()
}

pub fn identity(user_id: &str, machine_id: &str, role: Role) -> Identity {
    Identity::new(user(user_id), machine(machine_id), format!("{machine_id}-ws"), role)
}

// ============================================================================
// FakeMetadataService
// ============================================================================

/// Metadata service keeping records in memory
#[derive(Default)]
pub struct FakeMetadataService {
    records: Mutex<BTreeMap<FileId, RemoteRecord>>,
    online: Mutex<HashSet<MachineId>>,
    failing: Mutex<HashSet<VaultPath>>,
    next_id: AtomicU64,
}

impl FakeMetadataService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a version-1 record for `content` and returns it
    pub fn seed(&self, p: &str, content: &[u8]) -> RemoteRecord {
        let id = self.fresh_id();
        let record = RemoteRecord::new(id, path(p), content_hash_of(content), content.len() as u64);
        self.insert(record.clone());
        record
    }

    pub fn insert(&self, record: RemoteRecord) {
        self.records.lock().unwrap().insert(record.id.clone(), record);
    }

    /// Marks `p` as held by `holder` from `machine_id`
    pub fn hold(&self, p: &str, holder: &Identity) {
        let mut records = self.records.lock().unwrap();
        let record = records
            .values_mut()
            .find(|r| r.path.as_str() == p)
            .expect("no record at path");
        record.checked_out_by = Some(holder.user_id().clone());
        record.checked_out_by_machine_id = Some(holder.machine_id().clone());
        record.checked_out_by_machine_name = Some(holder.machine_name().to_string());
    }

    pub fn set_online(&self, machine_id: &MachineId, online: bool) {
        let mut set = self.online.lock().unwrap();
        if online {
            set.insert(machine_id.clone());
        } else {
            set.remove(machine_id);
        }
    }

    /// Every call on the record at `p` fails from now on
    pub fn fail_on(&self, p: &str) {
        self.failing.lock().unwrap().insert(path(p));
    }

    pub fn by_path(&self, p: &str) -> Option<RemoteRecord> {
        self.records
            .lock()
            .unwrap()
            .values()
            .find(|r| r.path.as_str() == p && !r.deleted)
            .cloned()
    }

    pub fn all(&self) -> Vec<RemoteRecord> {
        self.records.lock().unwrap().values().cloned().collect()
    }

    fn fresh_id(&self) -> FileId {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        FileId::new(format!("f{n:04}")).unwrap()
    }

    fn update<F>(&self, id: &FileId, change: F) -> anyhow::Result<RemoteRecord>
    where
        F: FnOnce(&mut RemoteRecord) -> anyhow::Result<()>,
    {
        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(id)
            .ok_or_else(|| anyhow!("unknown file {id}"))?;
        if self.failing.lock().unwrap().contains(&record.path) {
            bail!("metadata service unavailable for {}", record.path);
        }
        change(record)?;
        Ok(record.clone())
    }
}

#[async_trait]
impl IMetadataService for FakeMetadataService {
    async fn fetch_manifest(&self) -> anyhow::Result<Vec<RemoteRecord>> {
        Ok(self.all())
    }

    async fn checkout(&self, file_id: &FileId, holder: &Identity) -> anyhow::Result<RemoteRecord> {
        self.update(file_id, |r| {
            if let Some(current) = &r.checked_out_by {
                bail!("already checked out by {current}");
            }
            r.checked_out_by = Some(holder.user_id().clone());
            r.checked_out_by_machine_id = Some(holder.machine_id().clone());
            r.checked_out_by_machine_name = Some(holder.machine_name().to_string());
            Ok(())
        })
    }

    async fn checkin(
        &self,
        file_id: &FileId,
        user: &UserId,
        fields: &CheckinFields,
    ) -> anyhow::Result<RemoteRecord> {
        self.update(file_id, |r| {
            if r.checked_out_by.as_ref() != Some(user) {
                bail!("{user} does not hold {}", r.path);
            }
            r.version += 1;
            r.content_hash = fields.content_hash.clone();
            r.size = fields.size;
            r.path = fields.path.clone();
            for (field, value) in &fields.metadata {
                field.apply_to(r, value);
            }
            r.clear_checkout();
            Ok(())
        })
    }

    async fn discard(&self, file_id: &FileId, _user: &UserId) -> anyhow::Result<RemoteRecord> {
        self.update(file_id, |r| {
            r.clear_checkout();
            Ok(())
        })
    }

    async fn force_release(&self, file_id: &FileId, _acting: &UserId) -> anyhow::Result<RemoteRecord> {
        self.update(file_id, |r| {
            r.clear_checkout();
            Ok(())
        })
    }

    async fn soft_delete(&self, file_id: &FileId, _user: &UserId) -> anyhow::Result<()> {
        self.update(file_id, |r| {
            r.deleted = true;
            Ok(())
        })
        .map(|_| ())
    }

    async fn create_record(&self, record: &NewRecord, user: &UserId) -> anyhow::Result<RemoteRecord> {
        if self.failing.lock().unwrap().contains(&record.path) {
            bail!("metadata service unavailable for {}", record.path);
        }
        let mut created = RemoteRecord::new(
            self.fresh_id(),
            record.path.clone(),
            record.content_hash.clone(),
            record.size,
        );
        created.created_by = Some(user.clone());
        created.created_at = Some(Utc::now());
        self.insert(created.clone());
        Ok(created)
    }

    async fn is_online(&self, _user: &UserId, machine: &MachineId) -> anyhow::Result<bool> {
        Ok(self.online.lock().unwrap().contains(machine))
    }

    async fn update_metadata(
        &self,
        file_id: &FileId,
        _user: &UserId,
        fields: &PendingMetadata,
    ) -> anyhow::Result<RemoteRecord> {
        self.update(file_id, |r| {
            for (field, value) in fields {
                field.apply_to(r, value);
            }
            Ok(())
        })
    }
}

// ============================================================================
// FakeBlobStore
// ============================================================================

#[derive(Default)]
pub struct FakeBlobStore {
    blobs: Mutex<HashMap<ContentHash, Vec<u8>>>,
}

impl FakeBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, hash: &ContentHash) -> bool {
        self.blobs.lock().unwrap().contains_key(hash)
    }
}

#[async_trait]
impl IBlobStore for FakeBlobStore {
    async fn get(&self, hash: &ContentHash) -> anyhow::Result<Vec<u8>> {
        self.blobs
            .lock()
            .unwrap()
            .get(hash)
            .cloned()
            .ok_or_else(|| anyhow!("blob {} not found", hash.short()))
    }

    async fn put(&self, data: &[u8]) -> anyhow::Result<ContentHash> {
        let hash = content_hash_of(data);
        self.blobs.lock().unwrap().insert(hash.clone(), data.to_vec());
        Ok(hash)
    }
}

// ============================================================================
// MemoryFileSystem
// ============================================================================

/// Working tree held in memory; parent folders are created implicitly
#[derive(Default)]
pub struct MemoryFileSystem {
    files: Mutex<BTreeMap<VaultPath, Vec<u8>>>,
    folders: Mutex<BTreeSet<VaultPath>>,
    failing: Mutex<HashSet<VaultPath>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, p: &str, content: &[u8]) {
        let p = path(p);
        self.add_parents(&p);
        self.files.lock().unwrap().insert(p, content.to_vec());
    }

    pub fn contents(&self, p: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(&path(p)).cloned()
    }

    pub fn exists(&self, p: &str) -> bool {
        self.files.lock().unwrap().contains_key(&path(p))
    }

    /// Every call touching `p` fails from now on
    pub fn fail_on(&self, p: &str) {
        self.failing.lock().unwrap().insert(path(p));
    }

    fn add_parents(&self, p: &VaultPath) {
        let mut folders = self.folders.lock().unwrap();
        for ancestor in p.ancestor_paths().filter(|a| !a.is_root()) {
            folders.insert(ancestor);
        }
    }

    fn check(&self, p: &VaultPath) -> anyhow::Result<()> {
        if self.failing.lock().unwrap().contains(p) {
            bail!("injected I/O failure on {p}");
        }
        Ok(())
    }
}

#[async_trait]
impl IVaultFileSystem for MemoryFileSystem {
    async fn create_folder(&self, p: &VaultPath) -> anyhow::Result<()> {
        self.check(p)?;
        self.add_parents(p);
        self.folders.lock().unwrap().insert(p.clone());
        Ok(())
    }

    async fn copy_file(&self, from: &VaultPath, to: &VaultPath) -> anyhow::Result<()> {
        self.check(from)?;
        self.check(to)?;
        let data = self
            .files
            .lock()
            .unwrap()
            .get(from)
            .cloned()
            .ok_or_else(|| anyhow!("{from} not found"))?;
        self.add_parents(to);
        self.files.lock().unwrap().insert(to.clone(), data);
        Ok(())
    }

    async fn move_file(&self, from: &VaultPath, to: &VaultPath) -> anyhow::Result<()> {
        self.check(from)?;
        self.check(to)?;
        let data = self
            .files
            .lock()
            .unwrap()
            .remove(from)
            .ok_or_else(|| anyhow!("{from} not found"))?;
        self.add_parents(to);
        self.files.lock().unwrap().insert(to.clone(), data);
        Ok(())
    }

    async fn delete_item(&self, p: &VaultPath) -> anyhow::Result<()> {
        self.check(p)?;
        let mut files = self.files.lock().unwrap();
        files.retain(|f, _| f != p && f.strip_prefix(p).is_none());
        self.folders
            .lock()
            .unwrap()
            .retain(|f| f != p && f.strip_prefix(p).is_none());
        Ok(())
    }

    async fn write_file(&self, p: &VaultPath, data: &[u8]) -> anyhow::Result<()> {
        self.check(p)?;
        self.add_parents(p);
        self.files.lock().unwrap().insert(p.clone(), data.to_vec());
        Ok(())
    }

    async fn read_file(&self, p: &VaultPath) -> anyhow::Result<Vec<u8>> {
        self.check(p)?;
        self.files
            .lock()
            .unwrap()
            .get(p)
            .cloned()
            .ok_or_else(|| anyhow!("{p} not found"))
    }

    async fn file_exists(&self, p: &VaultPath) -> anyhow::Result<bool> {
        Ok(self.files.lock().unwrap().contains_key(p) || self.folders.lock().unwrap().contains(p))
    }

    async fn read_directory(&self, p: &VaultPath) -> anyhow::Result<Vec<DirEntry>> {
        let mut entries: Vec<DirEntry> = self
            .folders
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.strip_prefix(p).is_some())
            .map(|f| DirEntry::directory(f.clone()))
            .collect();
        entries.extend(
            self.files
                .lock()
                .unwrap()
                .iter()
                .filter(|(f, _)| f.strip_prefix(p).is_some())
                .map(|(f, data)| DirEntry::file(f.clone(), data.len() as u64)),
        );
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    async fn compute_hash(&self, p: &VaultPath) -> anyhow::Result<ContentHash> {
        let data = self.read_file(p).await?;
        Ok(content_hash_of(&data))
    }
}

// ============================================================================
// Harness
// ============================================================================

/// A vault over the fakes, with an executor for the vault's identity
pub struct Harness {
    pub vault: Arc<Vault>,
    pub executor: CommandExecutor,
    pub metadata: Arc<FakeMetadataService>,
    pub blobs: Arc<FakeBlobStore>,
    pub fs: Arc<MemoryFileSystem>,
    pub audit: Arc<MemoryAuditStore>,
}

/// Backends shared by every harness built from them
#[derive(Clone, Default)]
pub struct Backends {
    pub metadata: Arc<FakeMetadataService>,
    pub blobs: Arc<FakeBlobStore>,
    pub fs: Arc<MemoryFileSystem>,
}

impl Backends {
    pub fn new() -> Self {
        Self::default()
    }

    /// A file present locally, on the server and in the blob store
    pub async fn synced(&self, p: &str, content: &[u8]) -> RemoteRecord {
        self.fs.put(p, content);
        self.blobs.put(content).await.unwrap();
        self.metadata.seed(p, content)
    }

    /// A file only on the server
    pub async fn cloud(&self, p: &str, content: &[u8]) -> RemoteRecord {
        self.blobs.put(content).await.unwrap();
        self.metadata.seed(p, content)
    }

    /// A file only on disk
    pub fn local(&self, p: &str, content: &[u8]) {
        self.fs.put(p, content);
    }

    /// Connects a vault for `identity`
    pub async fn connect(&self, identity: Identity) -> Harness {
        self.connect_with(identity, ExecutorSettings::default()).await
    }

    pub async fn connect_with(&self, identity: Identity, settings: ExecutorSettings) -> Harness {
        let ports = VaultPorts {
            metadata: Arc::clone(&self.metadata) as Arc<dyn IMetadataService>,
            blobs: Arc::clone(&self.blobs) as Arc<dyn IBlobStore>,
            filesystem: Arc::clone(&self.fs) as Arc<dyn IVaultFileSystem>,
        };
        let vault = Arc::new(Vault::new(identity.clone(), ports, VaultSettings::default()));
        vault.connect().await.expect("connect failed");

        let audit = Arc::new(MemoryAuditStore::new());
        let logger = Arc::new(AuditLogger::new(
            Arc::clone(&audit) as Arc<dyn IAuditStore>,
            identity,
        ));
        let executor = CommandExecutor::new(Arc::clone(&vault), logger, settings);

        Harness {
            vault,
            executor,
            metadata: Arc::clone(&self.metadata),
            blobs: Arc::clone(&self.blobs),
            fs: Arc::clone(&self.fs),
            audit,
        }
    }
}

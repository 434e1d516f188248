use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::attendance::repo::AttendanceRecord;
use crate::users::repo::User;

pub const USERS_ENTRY: &str = "users";
pub const ATTENDANCE_ENTRY: &str = "attendance";

/// Named-entry snapshot storage. Each entry holds one serialized JSON array
/// and is overwritten whole on every mutation.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn load(&self, entry: &str) -> anyhow::Result<Option<String>>;
    async fn save(&self, entry: &str, payload: &str) -> anyhow::Result<()>;
}

/// Snapshot store backed by one `<entry>.json` file per entry under a data
/// directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, entry: &str) -> PathBuf {
        self.dir.join(format!("{entry}.json"))
    }
}

#[async_trait]
impl SnapshotStore for FileStore {
    async fn load(&self, entry: &str) -> anyhow::Result<Option<String>> {
        match tokio::fs::read_to_string(self.path(entry)).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("read snapshot entry {entry}")),
        }
    }

    async fn save(&self, entry: &str, payload: &str) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .context("create data dir")?;
        tokio::fs::write(self.path(entry), payload)
            .await
            .with_context(|| format!("write snapshot entry {entry}"))
    }
}

/// In-memory snapshot store; used by `AppState::fake()` and tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: std::sync::Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self, name: &str) -> Option<String> {
        self.entries
            .lock()
            .expect("memory store poisoned")
            .get(name)
            .cloned()
    }

    pub fn preload(&self, name: &str, payload: &str) {
        self.entries
            .lock()
            .expect("memory store poisoned")
            .insert(name.to_string(), payload.to_string());
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn load(&self, entry: &str) -> anyhow::Result<Option<String>> {
        Ok(self.entry(entry))
    }

    async fn save(&self, entry: &str, payload: &str) -> anyhow::Result<()> {
        self.preload(entry, payload);
        Ok(())
    }
}

/// The two application collections, held in memory and mirrored to the
/// snapshot store on every mutation.
pub struct Store {
    users: RwLock<Vec<User>>,
    attendance: RwLock<Vec<AttendanceRecord>>,
    snapshots: Arc<dyn SnapshotStore>,
}

impl Store {
    /// Read both entries once at startup. A missing or unreadable entry
    /// starts that collection empty; the next mutation overwrites it.
    pub async fn open(snapshots: Arc<dyn SnapshotStore>) -> Self {
        let users = read_entry(snapshots.as_ref(), USERS_ENTRY).await;
        let attendance = read_entry(snapshots.as_ref(), ATTENDANCE_ENTRY).await;
        tracing::info!(
            users = users.len(),
            records = attendance.len(),
            "store opened"
        );
        Self {
            users: RwLock::new(users),
            attendance: RwLock::new(attendance),
            snapshots,
        }
    }

    /// A store with empty collections; nothing is read from `snapshots`.
    pub fn empty(snapshots: Arc<dyn SnapshotStore>) -> Self {
        Self {
            users: RwLock::new(Vec::new()),
            attendance: RwLock::new(Vec::new()),
            snapshots,
        }
    }

    pub async fn users(&self) -> Vec<User> {
        self.users.read().await.clone()
    }

    pub async fn attendance(&self) -> Vec<AttendanceRecord> {
        self.attendance.read().await.clone()
    }

    /// Apply a mutation to the users collection. The new collection is
    /// persisted before the in-memory copy is swapped; if the mutation or
    /// the snapshot write fails, memory keeps its prior state.
    pub async fn update_users<T>(
        &self,
        apply: impl FnOnce(&mut Vec<User>) -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        let mut guard = self.users.write().await;
        let mut next = guard.clone();
        let out = apply(&mut next)?;
        self.persist(USERS_ENTRY, &next).await?;
        *guard = next;
        Ok(out)
    }

    /// Same contract as [`Store::update_users`], for attendance records.
    pub async fn update_attendance<T>(
        &self,
        apply: impl FnOnce(&mut Vec<AttendanceRecord>) -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        let mut guard = self.attendance.write().await;
        let mut next = guard.clone();
        let out = apply(&mut next)?;
        self.persist(ATTENDANCE_ENTRY, &next).await?;
        *guard = next;
        Ok(out)
    }

    /// Mutate both collections under one pair of write locks (user deletion
    /// cascades, full wipe). Locks are taken users-then-attendance.
    pub async fn update_all<T>(
        &self,
        apply: impl FnOnce(&mut Vec<User>, &mut Vec<AttendanceRecord>) -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        let mut users = self.users.write().await;
        let mut attendance = self.attendance.write().await;
        let mut next_users = users.clone();
        let mut next_attendance = attendance.clone();
        let out = apply(&mut next_users, &mut next_attendance)?;
        self.persist(USERS_ENTRY, &next_users).await?;
        self.persist(ATTENDANCE_ENTRY, &next_attendance).await?;
        *users = next_users;
        *attendance = next_attendance;
        Ok(out)
    }

    async fn persist<S: Serialize>(&self, entry: &str, value: &S) -> anyhow::Result<()> {
        let payload =
            serde_json::to_string(value).with_context(|| format!("serialize {entry}"))?;
        self.snapshots.save(entry, &payload).await
    }
}

async fn read_entry<T: DeserializeOwned>(snapshots: &dyn SnapshotStore, entry: &str) -> Vec<T> {
    match snapshots.load(entry).await {
        Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, entry, "snapshot entry is corrupt; starting empty");
            Vec::new()
        }),
        Ok(None) => Vec::new(),
        Err(e) => {
            tracing::warn!(error = %e, entry, "failed to load snapshot entry; starting empty");
            Vec::new()
        }
    }
}

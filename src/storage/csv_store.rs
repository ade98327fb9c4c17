//! Flat-file user store: one header row plus one 7-field row per user.
//!
//! Every operation opens, reads or writes, and closes the file on its own; no
//! rows are cached between calls. Lookups are linear scans, which is fine for
//! the small tables this store is meant for.
//!
//! Mutations (create, update, delete) hold the store's exclusive lock for their
//! whole read-modify-write; reads hold the shared lock. The lock only covers
//! one process. Separate processes writing the same file are not coordinated.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use csv::StringRecord;
use time::OffsetDateTime;
use tracing::{debug, info};

use super::codec::{self, TimestampPolicy, HEADER};
use super::error::{StoreError, StoreResult};
use super::replace::replace_file;
use super::UserRepository;
use crate::users::repo_types::User;

pub const DATA_FILE: &str = "data.csv";
pub const TEMP_FILE: &str = "data_temp.csv";

pub struct CsvUserStore {
    path: PathBuf,
    temp_path: PathBuf,
    actor: String,
    timestamps: TimestampPolicy,
    lock: RwLock<()>,
}

impl CsvUserStore {
    /// Store backed by `<data_dir>/data.csv`. `actor` is recorded on every write.
    pub fn new(data_dir: impl AsRef<Path>, actor: impl Into<String>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            path: data_dir.join(DATA_FILE),
            temp_path: data_dir.join(TEMP_FILE),
            actor: actor.into(),
            timestamps: TimestampPolicy::default(),
            lock: RwLock::new(()),
        }
    }

    pub fn with_timestamp_policy(mut self, policy: TimestampPolicy) -> Self {
        self.timestamps = policy;
        self
    }

    /// Creates the data directory and a header-only file if the file is absent.
    /// An existing file is left alone.
    pub fn init(&self) -> StoreResult<()> {
        let _guard = self.write_guard();
        if self.path.exists() {
            return Ok(());
        }
        self.ensure_dir()?;
        replace_file(&self.path, &self.temp_path, &[StringRecord::from(HEADER.to_vec())])?;
        info!(path = %self.path.display(), "created empty user file");
        Ok(())
    }

    /// All users in file order.
    pub fn get_all(&self) -> StoreResult<Vec<User>> {
        let _guard = self.read_guard();
        let rows = self.read_rows()?;
        let users = rows
            .iter()
            .skip(1)
            .map(|r| codec::decode(r, self.timestamps))
            .collect::<StoreResult<Vec<_>>>()?;
        debug!(count = users.len(), "loaded users");
        Ok(users)
    }

    /// First user whose id equals `id`.
    pub fn get_by_id(&self, id: &str) -> StoreResult<User> {
        let _guard = self.read_guard();
        let rows = self.read_rows()?;
        let row = rows
            .iter()
            .skip(1)
            .find(|r| codec::matches_id(r, id))
            .ok_or_else(|| StoreError::not_found(id))?;
        codec::decode(row, self.timestamps)
    }

    /// Appends `user`, creating the directory and file (with header) if needed.
    /// Does not look for an existing row with the same id.
    pub fn create(&self, user: &User) -> StoreResult<()> {
        let record = codec::encode(user, &self.actor)?;

        let _guard = self.write_guard();
        self.ensure_dir()?;
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)?;
        let len = file.metadata()?.len();
        if len > 0 && !ends_with_newline(&mut file, len)? {
            file.write_all(b"\n")?;
        }

        let mut writer = csv::Writer::from_writer(file);
        if len == 0 {
            writer.write_record(HEADER)?;
        }
        writer.write_record(&record)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;

        debug!(id = %user.id, "user appended");
        Ok(())
    }

    /// Rewrites the row for `id` with the new name and email.
    ///
    /// A missing file counts as "no such user"; nothing is created.
    pub fn update(&self, id: &str, name: &str, email: &str) -> StoreResult<()> {
        let _guard = self.write_guard();
        let mut rows = match self.read_rows() {
            Ok(rows) => rows,
            Err(StoreError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::not_found(id))
            }
            Err(e) => return Err(e),
        };

        let row = rows
            .iter_mut()
            .skip(1)
            .find(|r| codec::matches_id(r, id))
            .ok_or_else(|| StoreError::not_found(id))?;
        *row = codec::stamp_update(row, name, email, OffsetDateTime::now_utc(), &self.actor)?;

        replace_file(&self.path, &self.temp_path, &rows)?;
        debug!(%id, "user updated");
        Ok(())
    }

    /// Rewrites the file without the row(s) carrying `id`.
    pub fn delete(&self, id: &str) -> StoreResult<()> {
        let _guard = self.write_guard();
        let rows = self.read_rows()?;
        let before = rows.len();

        let kept: Vec<StringRecord> = rows
            .into_iter()
            .enumerate()
            .filter(|(i, r)| *i == 0 || !codec::matches_id(r, id))
            .map(|(_, r)| r)
            .collect();
        if kept.len() == before {
            return Err(StoreError::not_found(id));
        }

        replace_file(&self.path, &self.temp_path, &kept)?;
        debug!(%id, removed = before - kept.len(), "user deleted");
        Ok(())
    }

    /// Every row of the file, header first. Data rows are shape-checked.
    fn read_rows(&self) -> StoreResult<Vec<StringRecord>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.path)?;

        let rows = reader.records().collect::<Result<Vec<_>, _>>()?;
        for row in rows.iter().skip(1) {
            codec::check_shape(row)?;
        }
        Ok(rows)
    }

    fn ensure_dir(&self) -> StoreResult<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    // The lock guards no data, so a poisoned lock is safe to reuse.
    fn read_guard(&self) -> RwLockReadGuard<'_, ()> {
        self.lock.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, ()> {
        self.lock.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Whether the last byte of a non-empty file is a line terminator.
/// Appends always land at the end regardless of the read position.
fn ends_with_newline(file: &mut File, len: u64) -> io::Result<bool> {
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Async face of [`CsvUserStore`]; each call runs on the blocking pool.
#[derive(Clone)]
pub struct CsvUserRepository {
    store: Arc<CsvUserStore>,
}

impl CsvUserRepository {
    pub fn new(store: CsvUserStore) -> Self {
        Self {
            store: Arc::new(store),
        }
    }

    async fn run<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&CsvUserStore) -> StoreResult<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|e| StoreError::Io(io::Error::other(e.to_string())))?
    }
}

#[async_trait]
impl UserRepository for CsvUserRepository {
    async fn get_all(&self) -> StoreResult<Vec<User>> {
        self.run(|s| s.get_all()).await
    }

    async fn get_by_id(&self, id: &str) -> StoreResult<User> {
        let id = id.to_string();
        self.run(move |s| s.get_by_id(&id)).await
    }

    async fn create(&self, user: User) -> StoreResult<()> {
        self.run(move |s| s.create(&user)).await
    }

    async fn update(&self, id: &str, name: &str, email: &str) -> StoreResult<()> {
        let (id, name, email) = (id.to_string(), name.to_string(), email.to_string());
        self.run(move |s| s.update(&id, &name, &email)).await
    }

    async fn delete(&self, id: &str) -> StoreResult<()> {
        let id = id.to_string();
        self.run(move |s| s.delete(&id)).await
    }
}

//! File-backed item database.
//!
//! Every mutation rewrites the whole store through a commit: the sealed
//! envelope is staged in a temp file beside the real one, the handle is
//! closed, then the temp file is renamed over the store. The rename is the
//! only visible state transition. Staged files are removed on every failure
//! path; anything a crash leaves behind is swept on the next load.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tempfile::{Builder, TempPath};
use tracing::{debug, info, warn};

use crate::config::StoreOptions;
use crate::document::Document;
use crate::error::{DbError, StoreError};
use crate::item::Item;
use crate::store::Store;

const STAGING_SUFFIX: &str = ".tmp";

#[derive(Debug)]
pub struct PassDb {
    store: Store,
    path: PathBuf,
}

impl PassDb {
    pub fn create<P: AsRef<Path>>(path: P, name: &str, passphrase: &str) -> Result<Self, DbError> {
        Self::create_with(path, name, passphrase, StoreOptions::default())
    }

    /// Create a new store file. Fails with [`DbError::FileAlreadyExists`]
    /// rather than overwrite anything at `path`.
    pub fn create_with<P: AsRef<Path>>(
        path: P,
        name: &str,
        passphrase: &str,
        options: StoreOptions,
    ) -> Result<Self, DbError> {
        let path = path.as_ref().to_path_buf();
        if path.exists() {
            return Err(DbError::FileAlreadyExists(path));
        }
        let mut bytes = Vec::new();
        let store = Store::create_with(&mut bytes, name, passphrase, options)?;
        let staged = write_staged(&path, &bytes, options.sync_before_rename)?;
        staged.persist_noclobber(&path).map_err(|e| {
            if e.error.kind() == io::ErrorKind::AlreadyExists {
                DbError::FileAlreadyExists(path.clone())
            } else {
                DbError::Io(e.error)
            }
        })?;
        if options.sync_before_rename {
            fsync_dir(parent_dir(&path))?;
        }
        info!(store = name, path = %path.display(), "created passdb");
        Ok(Self { store, path })
    }

    pub fn load<P: AsRef<Path>>(path: P, passphrase: &str) -> Result<Self, DbError> {
        Self::load_with(path, passphrase, StoreOptions::default())
    }

    pub fn load_with<P: AsRef<Path>>(
        path: P,
        passphrase: &str,
        options: StoreOptions,
    ) -> Result<Self, DbError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let store = Store::load_with(file, passphrase, options)?;
        cleanup_orphans(&path);
        debug!(store = store.name(), path = %path.display(), "loaded passdb");
        Ok(Self { store, path })
    }

    pub fn name(&self) -> &str {
        self.store.name()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn item_count(&self) -> usize {
        self.store.document().len()
    }

    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.store.document().last_modified()
    }

    /// Names of all items, sorted.
    pub fn list_items(&self) -> Vec<String> {
        self.store.document().keys().map(str::to_string).collect()
    }

    pub fn save_new_item(&mut self, item: &Item) -> Result<(), DbError> {
        let record = serialise_item(item)?;
        self.apply(|store| {
            store.create_key(&item.name, record)?;
            Ok(())
        })?;
        debug!(item = %item.name, "saved new item");
        Ok(())
    }

    pub fn retrieve_item(&self, name: &str) -> Result<Item, DbError> {
        let record = self.store.get_key(name).map_err(|e| not_found(e, name))?;
        serde_json::from_str(record).map_err(DbError::Record)
    }

    pub fn update_item(&mut self, item: &Item) -> Result<(), DbError> {
        let record = serialise_item(item)?;
        self.apply(|store| {
            store
                .update_key(&item.name, record)
                .map_err(|e| match e {
                    StoreError::NoChangeMade(name) => DbError::ItemUnchanged(name),
                    other => not_found(other, &item.name),
                })
        })?;
        debug!(item = %item.name, "updated item");
        Ok(())
    }

    pub fn rename_item(&mut self, current: &str, desired: &str) -> Result<(), DbError> {
        if current == desired {
            return Err(DbError::RenameToSameName);
        }
        let mut item = self.retrieve_item(current)?;
        if self.store.document().contains(desired) {
            return Err(DbError::ItemNameAlreadyInUse(desired.to_string()));
        }
        item.name = desired.to_string();
        let record = serialise_item(&item)?;
        self.apply(|store| {
            store.create_key(desired, record)?;
            store.delete_key(current)?;
            Ok(())
        })?;
        debug!(from = current, to = desired, "renamed item");
        Ok(())
    }

    pub fn delete_item(&mut self, name: &str) -> Result<(), DbError> {
        self.apply(|store| store.delete_key(name).map_err(|e| not_found(e, name)))?;
        debug!(item = name, "deleted item");
        Ok(())
    }

    /// Run a mutation and commit it. If either step fails the in-memory
    /// document is restored, so memory never runs ahead of disk.
    fn apply<T>(
        &mut self,
        op: impl FnOnce(&mut Store) -> Result<T, DbError>,
    ) -> Result<T, DbError> {
        let snapshot: Document = self.store.document().clone();
        let result = op(&mut self.store).and_then(|out| self.commit().map(|()| out));
        if result.is_err() {
            self.store.restore(snapshot);
        }
        result
    }

    fn commit(&self) -> Result<(), DbError> {
        let envelope = self.store.seal()?;
        let sync = self.store.options().sync_before_rename;
        let staged = write_staged(&self.path, &envelope, sync)?;
        publish(staged, &self.path, sync)
    }
}

fn serialise_item(item: &Item) -> Result<String, DbError> {
    serde_json::to_string(item).map_err(DbError::Record)
}

fn not_found(err: StoreError, name: &str) -> DbError {
    match err {
        StoreError::KeyDoesNotExist(_) => DbError::ItemDoesNotExist(name.to_string()),
        other => DbError::Store(other),
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn staging_prefix(path: &Path) -> OsString {
    let mut prefix = OsString::from(".");
    prefix.push(path.file_name().unwrap_or_default());
    prefix.push(".");
    prefix
}

/// Write `bytes` to a fresh temp file beside `path` and close it. The
/// returned [`TempPath`] deletes the file when dropped unless persisted.
fn write_staged(path: &Path, bytes: &[u8], sync: bool) -> Result<TempPath, DbError> {
    let mut staged = Builder::new()
        .prefix(&staging_prefix(path))
        .suffix(STAGING_SUFFIX)
        .tempfile_in(parent_dir(path))?;
    staged.write_all(bytes)?;
    staged.flush()?;
    if sync {
        staged.as_file().sync_all()?;
    }
    Ok(staged.into_temp_path())
}

fn publish(staged: TempPath, path: &Path, sync: bool) -> Result<(), DbError> {
    staged.persist(path).map_err(|e| DbError::Io(e.error))?;
    if sync {
        fsync_dir(parent_dir(path))?;
    }
    debug!(path = %path.display(), "committed passdb");
    Ok(())
}

/// Remove staged files a crash left beside `path`.
fn cleanup_orphans(path: &Path) {
    let prefix = staging_prefix(path);
    let prefix = prefix.to_string_lossy();
    let Ok(entries) = fs::read_dir(parent_dir(path)) else {
        return;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        if !is_staged_for(&prefix, &name.to_string_lossy()) {
            continue;
        }
        let orphan = entry.path();
        warn!(path = %orphan.display(), "removing orphaned staging file");
        if let Err(e) = fs::remove_file(&orphan) {
            warn!(path = %orphan.display(), error = %e, "failed to remove orphaned staging file");
        }
    }
}

/// `.<file>.<random>.tmp`, where the random part never contains a dot. A
/// sibling store named `<file>.<more>` stages as `.<file>.<more>.<random>.tmp`
/// and must not match.
fn is_staged_for(prefix: &str, name: &str) -> bool {
    name.strip_prefix(prefix)
        .and_then(|rest| rest.strip_suffix(STAGING_SUFFIX))
        .is_some_and(|random| !random.is_empty() && !random.contains('.'))
}

fn fsync_dir(path: &Path) -> io::Result<()> {
    #[cfg(unix)]
    {
        let dir = OpenOptions::new().read(true).open(path)?;
        dir.sync_all()?;
    }
    #[cfg(not(unix))]
    let _ = path;
    Ok(())
}

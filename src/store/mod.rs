//! Durable label-keyed entity store
//!
//! Records live in LMDB named databases (one per collection) as flat JSON
//! objects keyed by their label. A separate `selected` database maps a role
//! key (`acc`, `network`) to the label currently selected for that role.
//!
//! Every public mutating call is one all-or-nothing LMDB write transaction.
//! [`EntityStore::atomic`] groups several operations into a single commit.
//!
//! The store is opened exclusively: an advisory lock on `wallet.lock` inside
//! the data directory makes a second opener fail fast with
//! [`Error::StoreLocked`] instead of racing on the same environment.

use crate::{Error, Result};
use heed::types::{SerdeJson, Str};
use heed::{Database, Env, EnvOpenOptions, RoTxn, RwTxn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, OpenOptions, TryLockError};
use std::path::{Path, PathBuf};

/// Collection holding the selection pointers
pub const SELECTED: &str = "selected";

const ENV_DIR: &str = "wallet.mdb";
const LOCK_FILE: &str = "wallet.lock";
const MAP_SIZE: usize = 16 * 1024 * 1024; // 16MB
const MAX_DBS: u32 = 4;

/// A value stored in a labeled collection
pub trait Record: Serialize + DeserializeOwned + 'static {
    /// Name of the collection this record type lives in
    const COLLECTION: &'static str;

    /// Unique key of the record within its collection
    fn label(&self) -> &str;
}

type RecordDb<R> = Database<Str, SerdeJson<R>>;
type SelectionDb = Database<Str, Str>;

/// LMDB-backed store for labeled records and selection pointers
pub struct EntityStore {
    env: Env,
    data_dir: PathBuf,
    /// Held for the lifetime of the store; dropping it releases the lock
    _lock: File,
}

impl EntityStore {
    /// Open (or create) the store under `data_dir`
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;

        let lock = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(data_dir.join(LOCK_FILE))?;
        match lock.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => {
                return Err(Error::StoreLocked(data_dir.to_path_buf()));
            }
            Err(TryLockError::Error(e)) => return Err(e.into()),
        }

        let env_path = data_dir.join(ENV_DIR);
        std::fs::create_dir_all(&env_path)?;
        // SAFETY: the exclusive lock above keeps any other wallet process from
        // mapping this environment while we hold it.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(MAP_SIZE)
                .max_dbs(MAX_DBS)
                .open(&env_path)?
        };

        tracing::debug!(path = %env_path.display(), "Opened wallet store");

        Ok(Self {
            env,
            data_dir: data_dir.to_path_buf(),
            _lock: lock,
        })
    }

    /// Run `f` inside a single write transaction
    ///
    /// The transaction commits only if `f` returns `Ok`; any error aborts it
    /// and leaves the store untouched.
    pub fn atomic<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut StoreTxn<'_>) -> Result<T>,
    {
        let txn = self.env.write_txn()?;
        let mut txn = StoreTxn {
            env: &self.env,
            txn,
        };
        let out = f(&mut txn)?;
        txn.txn.commit()?;
        Ok(out)
    }

    /// Run `f` against a consistent read-only snapshot
    pub fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&StoreView<'_>) -> Result<T>,
    {
        let txn = self.env.read_txn()?;
        let view = StoreView {
            env: &self.env,
            txn,
        };
        f(&view)
    }

    /// Insert a new record; fails with `AlreadyExists` if the label is taken
    pub fn put<R: Record>(&self, record: &R) -> Result<()> {
        self.atomic(|txn| txn.put(record))
    }

    /// Insert or overwrite a record unconditionally
    pub fn upsert<R: Record>(&self, record: &R) -> Result<()> {
        self.atomic(|txn| txn.upsert(record))
    }

    /// Fetch a record by label
    pub fn get<R: Record>(&self, label: &str) -> Result<R> {
        self.read(|view| view.get(label))
    }

    /// Delete a record by label
    ///
    /// Fails with `NotFound` if the collection was never created. Returns
    /// whether a record was actually removed.
    pub fn delete<R: Record>(&self, label: &str) -> Result<bool> {
        self.atomic(|txn| txn.delete::<R>(label))
    }

    /// Visit every record of a collection in label order
    ///
    /// A missing collection is created empty, so this never fails on a fresh store.
    pub fn for_each<R, F>(&self, f: F) -> Result<()>
    where
        R: Record,
        F: FnMut(R) -> Result<()>,
    {
        let exists = self.read(|view| Ok(view.records::<R>()?.is_some()))?;
        if !exists {
            self.atomic(|txn| txn.ensure_collection::<R>())?;
        }
        self.read(|view| view.for_each(f))
    }

    /// Collect every record of a collection
    pub fn list<R: Record>(&self) -> Result<Vec<R>> {
        let mut records = Vec::new();
        self.for_each(|record: R| {
            records.push(record);
            Ok(())
        })?;
        Ok(records)
    }

    /// Label currently stored under a selection role
    pub fn selection(&self, role: &str) -> Result<Option<String>> {
        self.read(|view| view.selection(role))
    }

    pub fn set_selection(&self, role: &str, label: &str) -> Result<()> {
        self.atomic(|txn| txn.set_selection(role, label))
    }

    pub fn clear_selection(&self, role: &str) -> Result<bool> {
        self.atomic(|txn| txn.clear_selection(role))
    }
}

impl std::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore")
            .field("data_dir", &self.data_dir)
            .finish()
    }
}

fn open_records<R: Record>(env: &Env, txn: &RoTxn) -> Result<Option<RecordDb<R>>> {
    Ok(env.open_database::<Str, SerdeJson<R>>(txn, Some(R::COLLECTION))?)
}

fn open_selection(env: &Env, txn: &RoTxn) -> Result<Option<SelectionDb>> {
    Ok(env.open_database::<Str, Str>(txn, Some(SELECTED))?)
}

fn get_record<R: Record>(env: &Env, txn: &RoTxn, label: &str) -> Result<R> {
    let not_found = || Error::NotFound {
        collection: R::COLLECTION,
        label: label.to_string(),
    };
    let db = open_records::<R>(env, txn)?.ok_or_else(not_found)?;
    db.get(txn, label)?.ok_or_else(not_found)
}

fn contains_record<R: Record>(env: &Env, txn: &RoTxn, label: &str) -> Result<bool> {
    match open_records::<R>(env, txn)? {
        Some(db) => Ok(db.get(txn, label)?.is_some()),
        None => Ok(false),
    }
}

fn get_selection(env: &Env, txn: &RoTxn, role: &str) -> Result<Option<String>> {
    match open_selection(env, txn)? {
        Some(db) => Ok(db.get(txn, role)?.map(str::to_string)),
        None => Ok(None),
    }
}

/// Read-only snapshot of the store
pub struct StoreView<'e> {
    env: &'e Env,
    txn: RoTxn<'e>,
}

impl StoreView<'_> {
    fn records<R: Record>(&self) -> Result<Option<RecordDb<R>>> {
        open_records::<R>(self.env, &self.txn)
    }

    pub fn get<R: Record>(&self, label: &str) -> Result<R> {
        get_record(self.env, &self.txn, label)
    }

    pub fn contains<R: Record>(&self, label: &str) -> Result<bool> {
        contains_record::<R>(self.env, &self.txn, label)
    }

    pub fn selection(&self, role: &str) -> Result<Option<String>> {
        get_selection(self.env, &self.txn, role)
    }

    /// Visit every record; a missing collection yields nothing
    pub fn for_each<R, F>(&self, mut f: F) -> Result<()>
    where
        R: Record,
        F: FnMut(R) -> Result<()>,
    {
        let Some(db) = self.records::<R>()? else {
            return Ok(());
        };
        for entry in db.iter(&self.txn)? {
            let (_, record) = entry?;
            f(record)?;
        }
        Ok(())
    }
}

/// Write transaction handed out by [`EntityStore::atomic`]
pub struct StoreTxn<'e> {
    env: &'e Env,
    txn: RwTxn<'e>,
}

impl StoreTxn<'_> {
    fn ensure_collection<R: Record>(&mut self) -> Result<RecordDb<R>> {
        Ok(self
            .env
            .create_database::<Str, SerdeJson<R>>(&mut self.txn, Some(R::COLLECTION))?)
    }

    fn ensure_selection(&mut self) -> Result<SelectionDb> {
        Ok(self
            .env
            .create_database::<Str, Str>(&mut self.txn, Some(SELECTED))?)
    }

    pub fn get<R: Record>(&self, label: &str) -> Result<R> {
        get_record(self.env, &self.txn, label)
    }

    pub fn contains<R: Record>(&self, label: &str) -> Result<bool> {
        contains_record::<R>(self.env, &self.txn, label)
    }

    pub fn put<R: Record>(&mut self, record: &R) -> Result<()> {
        let db = self.ensure_collection::<R>()?;
        if db.get(&self.txn, record.label())?.is_some() {
            return Err(Error::AlreadyExists {
                collection: R::COLLECTION,
                label: record.label().to_string(),
            });
        }
        db.put(&mut self.txn, record.label(), record)?;
        Ok(())
    }

    pub fn upsert<R: Record>(&mut self, record: &R) -> Result<()> {
        let db = self.ensure_collection::<R>()?;
        db.put(&mut self.txn, record.label(), record)?;
        Ok(())
    }

    pub fn delete<R: Record>(&mut self, label: &str) -> Result<bool> {
        let db = open_records::<R>(self.env, &self.txn)?.ok_or_else(|| Error::NotFound {
            collection: R::COLLECTION,
            label: label.to_string(),
        })?;
        Ok(db.delete(&mut self.txn, label)?)
    }

    pub fn selection(&self, role: &str) -> Result<Option<String>> {
        get_selection(self.env, &self.txn, role)
    }

    pub fn set_selection(&mut self, role: &str, label: &str) -> Result<()> {
        let db = self.ensure_selection()?;
        db.put(&mut self.txn, role, label)?;
        Ok(())
    }

    pub fn clear_selection(&mut self, role: &str) -> Result<bool> {
        match open_selection(self.env, &self.txn)? {
            Some(db) => Ok(db.delete(&mut self.txn, role)?),
            None => Ok(false),
        }
    }
}

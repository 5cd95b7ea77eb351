//! Encrypted store handles.
//!
//! A `StoreHandle` binds a model to one store file, the key derived from the
//! store passphrase, and the migration options it was opened with. It owns a
//! single SQLite connection; several handles may address the same file and
//! only contend at the SQLite level.

use crate::context::ChangeSet;
use crate::error::{Error, Result};
use crate::model::{MappingModel, ObjectId, Record, Schema};
use crate::storage::crypto::{self, KdfParams, StoreKey};
use crate::storage::schema::{
    apply_schema, has_store_metadata, meta, STORE_FORMAT, VERIFIER_PLAINTEXT,
};
use parking_lot::Mutex;
use rusqlite::{
    params, Connection, ErrorCode, OpenFlags, OptionalExtension, Transaction, TransactionBehavior,
};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Listing query of [`StoreHandle::fetch_entity`], served by the
/// `(entity, created_at, id)` index.
pub(crate) const FETCH_ENTITY_SQL: &str = "SELECT id, nonce, payload FROM objects WHERE entity = ?1
     ORDER BY created_at ASC, id ASC";

/// Options applied when opening a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// Derive a mapping between model versions instead of requiring one.
    pub infer_mapping_automatically: bool,
    /// Migrate stores written with an older model on open.
    pub migrate_automatically: bool,
    /// Key-derivation cost for newly created stores. Existing stores keep
    /// the parameters they were created with.
    pub kdf: KdfParams,
    /// How long a write waits for the other handle's lock.
    pub busy_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            infer_mapping_automatically: true,
            migrate_automatically: true,
            kdf: KdfParams::default(),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// Outcome of committing a change set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitStats {
    pub upserted: usize,
    pub deleted: usize,
}

/// Access to one encrypted store file.
pub struct StoreHandle {
    label: String,
    path: PathBuf,
    schema: Arc<Schema>,
    key: StoreKey,
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandle")
            .field("label", &self.label)
            .field("path", &self.path)
            .field("model", &self.schema.name)
            .finish_non_exhaustive()
    }
}

/// Build the store file path for a model inside the documents directory.
#[must_use]
pub fn store_path(documents_dir: &Path, model_name: &str) -> PathBuf {
    documents_dir.join(format!("{model_name}.sqlite"))
}

/// `db` with `suffix` appended, the way SQLite names its side files.
fn sidecar_path(db: &Path, suffix: &str) -> PathBuf {
    let mut name = db.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

fn is_not_a_database(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt)
    )
}

impl StoreHandle {
    /// Open the store at `path`, creating it if the file does not exist.
    ///
    /// A new store is fully initialized under a staging name and then
    /// linked into place without overwriting, so `path` is either absent or
    /// a complete store. When several handles create the same store at
    /// once, one link wins and the others open the winner's file.
    ///
    /// An existing file must be an initialized store; an empty or foreign
    /// file is reported as corrupt rather than initialized in place.
    ///
    /// # Errors
    ///
    /// Returns `StoreCorrupt`, `InvalidPassphrase`, `IncompatibleModel`,
    /// `MappingUnavailable`, or the underlying database/IO error.
    pub fn open(
        label: &str,
        schema: Arc<Schema>,
        path: &Path,
        passphrase: &str,
        options: &StoreOptions,
    ) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let created_key = if path.exists() {
            None
        } else {
            Self::create(path, &schema, passphrase, options.kdf)?
        };
        let created = created_key.is_some();

        let corrupt = || Error::StoreCorrupt {
            path: path.to_path_buf(),
        };

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(options.busy_timeout)?;

        match has_store_metadata(&conn) {
            Ok(true) => {}
            Ok(false) => return Err(corrupt()),
            Err(e) if is_not_a_database(&e) => return Err(corrupt()),
            Err(e) => return Err(e.into()),
        }

        apply_schema(&conn).map_err(|e| if is_not_a_database(&e) { corrupt() } else { e.into() })?;

        let key = match created_key {
            Some(key) => key,
            None => Self::unlock(&conn, path, passphrase)?,
        };

        let handle = Self {
            label: label.to_string(),
            path: path.to_path_buf(),
            schema,
            key,
            conn: Mutex::new(conn),
        };

        if !created {
            handle.reconcile_model(options)?;
        }

        info!(
            handle = %handle.label,
            path = %handle.path.display(),
            created,
            "Store opened"
        );
        Ok(handle)
    }

    /// Build a store under a staging name and link it to `path`.
    ///
    /// Returns the key if this call published the store, or `None` if
    /// another handle got there first.
    fn create(
        path: &Path,
        schema: &Schema,
        passphrase: &str,
        kdf: KdfParams,
    ) -> Result<Option<StoreKey>> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let staging = path.with_file_name(format!(".{file_name}.{}.creating", uuid::Uuid::new_v4()));

        let published = Self::stage(&staging, schema, passphrase, kdf).and_then(|key| {
            match std::fs::hard_link(&staging, path) {
                Ok(()) => Ok(Some(key)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(None),
                Err(e) => Err(e.into()),
            }
        });

        let leftovers = ["", "-journal", "-wal", "-shm"].map(|suffix| sidecar_path(&staging, suffix));
        for leftover in leftovers {
            if let Err(e) = std::fs::remove_file(&leftover) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %leftover.display(), error = %e, "Could not remove staging file");
                }
            }
        }

        if matches!(published, Ok(None)) {
            debug!(path = %path.display(), "Store created concurrently, opening existing file");
        }
        published
    }

    fn stage(staging: &Path, schema: &Schema, passphrase: &str, kdf: KdfParams) -> Result<StoreKey> {
        let conn = Connection::open(staging)?;
        apply_schema(&conn)?;
        let key = Self::initialize(&conn, schema, passphrase, kdf)?;
        // Fold the WAL back into the main file before it is linked.
        conn.pragma_update(None, "journal_mode", "DELETE")?;
        drop(conn);
        Ok(key)
    }

    fn initialize(
        conn: &Connection,
        schema: &Schema,
        passphrase: &str,
        kdf: KdfParams,
    ) -> Result<StoreKey> {
        let salt = crypto::generate_salt();
        let key = crypto::derive_key(passphrase, &salt, kdf)?;
        let (verifier_nonce, verifier) = crypto::seal(&key, VERIFIER_PLAINTEXT)?;

        let tx = conn.unchecked_transaction()?;
        let entries: [(&str, Vec<u8>); 9] = [
            (meta::FORMAT, STORE_FORMAT.as_bytes().to_vec()),
            (meta::SALT, salt.to_vec()),
            (meta::KDF, serde_json::to_vec(&kdf)?),
            (meta::VERIFIER_NONCE, verifier_nonce.to_vec()),
            (meta::VERIFIER, verifier),
            (meta::MODEL_JSON, schema.to_json()?.into_bytes()),
            (meta::MODEL_HASH, schema.content_hash()?.into_bytes()),
            (meta::MODEL_VERSION, schema.version.to_string().into_bytes()),
            (
                meta::CREATED_AT,
                chrono::Utc::now().timestamp_millis().to_string().into_bytes(),
            ),
        ];
        for (key_name, value) in entries {
            write_meta(&tx, key_name, &value)?;
        }
        tx.commit()?;

        debug!(model = %schema.name, version = schema.version, "Store initialized");
        Ok(key)
    }

    fn unlock(conn: &Connection, path: &Path, passphrase: &str) -> Result<StoreKey> {
        let corrupt = || Error::StoreCorrupt {
            path: path.to_path_buf(),
        };
        let required = |key_name: &str| -> Result<Vec<u8>> {
            read_meta(conn, key_name)?.ok_or_else(corrupt)
        };

        if required(meta::FORMAT)? != STORE_FORMAT.as_bytes() {
            return Err(corrupt());
        }
        let salt = required(meta::SALT)?;
        let kdf: KdfParams = serde_json::from_slice(&required(meta::KDF)?).map_err(|_| corrupt())?;
        let key = crypto::derive_key(passphrase, &salt, kdf)?;

        let nonce = required(meta::VERIFIER_NONCE)?;
        let verifier = required(meta::VERIFIER)?;
        match crypto::open(&key, &nonce, &verifier) {
            Ok(plaintext) if plaintext.as_slice() == VERIFIER_PLAINTEXT => Ok(key),
            _ => Err(Error::InvalidPassphrase {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Bring the stored model in line with the handle's model.
    fn reconcile_model(&self, options: &StoreOptions) -> Result<()> {
        let current_hash = self.schema.content_hash()?;
        let mut conn = self.conn.lock();
        if self.stored_model_hash(&conn)? == current_hash {
            return Ok(());
        }

        let stored = self.stored_model(&conn)?;
        if !options.migrate_automatically {
            return Err(Error::IncompatibleModel {
                stored: stored.version,
                current: self.schema.version,
            });
        }
        if !options.infer_mapping_automatically {
            return Err(Error::MappingUnavailable {
                from: stored.version,
                to: self.schema.version,
                reason: "mapping inference is disabled".to_string(),
            });
        }

        let mapping = MappingModel::infer(&stored, &self.schema)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // The other handle may have migrated while we waited for the lock.
        if self.stored_model_hash(&tx)? == current_hash {
            return Ok(());
        }

        let rows: Vec<(String, String, Vec<u8>, Vec<u8>)> = tx
            .prepare("SELECT id, entity, nonce, payload FROM objects")?
            .query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<rusqlite::Result<_>>()?;

        let mut migrated = 0usize;
        let mut dropped = 0usize;
        let now = chrono::Utc::now().timestamp_millis();
        for (id, entity, nonce, payload) in rows {
            let record = self.decode_row(&id, entity, &nonce, &payload)?;
            match mapping.apply(record) {
                Some(record) => {
                    let (nonce, payload) = self.seal_attributes(&record.attributes)?;
                    tx.execute(
                        "UPDATE objects SET nonce = ?1, payload = ?2, updated_at = ?3 WHERE id = ?4",
                        params![nonce.as_slice(), payload, now, id],
                    )?;
                    migrated += 1;
                }
                None => {
                    tx.execute("DELETE FROM objects WHERE id = ?1", params![id])?;
                    dropped += 1;
                }
            }
        }

        write_meta(&tx, meta::MODEL_JSON, self.schema.to_json()?.as_bytes())?;
        write_meta(&tx, meta::MODEL_HASH, current_hash.as_bytes())?;
        write_meta(
            &tx,
            meta::MODEL_VERSION,
            self.schema.version.to_string().as_bytes(),
        )?;
        tx.execute(
            "INSERT INTO model_migrations
                (from_version, to_version, from_hash, to_hash, migrated_records, dropped_records, applied_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                stored.version,
                self.schema.version,
                stored.content_hash()?,
                current_hash,
                i64::try_from(migrated).unwrap_or(i64::MAX),
                i64::try_from(dropped).unwrap_or(i64::MAX),
                now
            ],
        )?;
        tx.commit()?;

        info!(
            handle = %self.label,
            from = stored.version,
            to = self.schema.version,
            migrated,
            dropped,
            "Model migrated"
        );
        Ok(())
    }

    fn stored_model_hash(&self, conn: &Connection) -> Result<String> {
        let bytes = read_meta(conn, meta::MODEL_HASH)?.ok_or_else(|| self.corrupt())?;
        String::from_utf8(bytes).map_err(|_| self.corrupt())
    }

    fn stored_model(&self, conn: &Connection) -> Result<Schema> {
        let bytes = read_meta(conn, meta::MODEL_JSON)?.ok_or_else(|| self.corrupt())?;
        serde_json::from_slice(&bytes).map_err(|_| self.corrupt())
    }

    fn corrupt(&self) -> Error {
        Error::StoreCorrupt {
            path: self.path.clone(),
        }
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Version of the model the store is currently written with.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata cannot be read.
    pub fn stored_model_version(&self) -> Result<u32> {
        let conn = self.conn.lock();
        let bytes = read_meta(&conn, meta::MODEL_VERSION)?.ok_or_else(|| self.corrupt())?;
        String::from_utf8(bytes)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| self.corrupt())
    }

    /// Fetch one object by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the row cannot be decrypted.
    pub fn fetch(&self, id: &ObjectId) -> Result<Option<Record>> {
        let conn = self.conn.lock();
        let row: Option<(String, Vec<u8>, Vec<u8>)> = conn
            .query_row(
                "SELECT entity, nonce, payload FROM objects WHERE id = ?1",
                params![id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        drop(conn);

        row.map(|(entity, nonce, payload)| {
            let attributes = self.open_attributes(&nonce, &payload)?;
            Ok(Record {
                id: *id,
                entity,
                attributes,
            })
        })
        .transpose()
    }

    /// Fetch every object of an entity, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row cannot be decrypted.
    pub fn fetch_entity(&self, entity: &str) -> Result<Vec<Record>> {
        let conn = self.conn.lock();
        let rows: Vec<(String, Vec<u8>, Vec<u8>)> = conn
            .prepare(FETCH_ENTITY_SQL)?
            .query_map(params![entity], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<rusqlite::Result<_>>()?;
        drop(conn);

        rows.into_iter()
            .map(|(id, nonce, payload)| self.decode_row(&id, entity.to_string(), &nonce, &payload))
            .collect()
    }

    /// Count the objects of an entity without decrypting them.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn count(&self, entity: &str) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM objects WHERE entity = ?1",
            params![entity],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Write a change set in one IMMEDIATE transaction.
    ///
    /// Inserts and updates are both written as upserts, so an update of an
    /// object deleted through another handle recreates it.
    ///
    /// # Errors
    ///
    /// Returns an error if sealing or any statement fails; nothing is
    /// written in that case.
    pub fn commit(&self, changes: &ChangeSet) -> Result<CommitStats> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = chrono::Utc::now().timestamp_millis();
        let mut stats = CommitStats::default();

        for record in changes.upserts() {
            let (nonce, payload) = self.seal_attributes(&record.attributes)?;
            upsert_object(&tx, record, &nonce, &payload, now)?;
            stats.upserted += 1;
        }
        for id in &changes.deleted {
            stats.deleted += tx.execute("DELETE FROM objects WHERE id = ?1", params![id.to_string()])?;
        }

        tx.commit()?;
        debug!(
            handle = %self.label,
            upserted = stats.upserted,
            deleted = stats.deleted,
            "Changes committed"
        );
        Ok(stats)
    }

    fn seal_attributes(&self, attributes: &Map<String, Value>) -> Result<([u8; crypto::NONCE_LEN], Vec<u8>)> {
        let plaintext = zeroize::Zeroizing::new(serde_json::to_vec(attributes)?);
        crypto::seal(&self.key, &plaintext)
    }

    fn open_attributes(&self, nonce: &[u8], payload: &[u8]) -> Result<Map<String, Value>> {
        let plaintext = crypto::open(&self.key, nonce, payload)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }

    fn decode_row(&self, id: &str, entity: String, nonce: &[u8], payload: &[u8]) -> Result<Record> {
        let id: ObjectId = id.parse()?;
        let attributes = self.open_attributes(nonce, payload).inspect_err(|e| {
            warn!(handle = %self.label, id = %id, error = %e, "Unreadable object");
        })?;
        Ok(Record {
            id,
            entity,
            attributes,
        })
    }
}

fn upsert_object(
    tx: &Transaction<'_>,
    record: &Record,
    nonce: &[u8],
    payload: &[u8],
    now: i64,
) -> Result<()> {
    tx.execute(
        "INSERT INTO objects (id, entity, nonce, payload, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)
         ON CONFLICT(id) DO UPDATE SET
             entity = excluded.entity,
             nonce = excluded.nonce,
             payload = excluded.payload,
             updated_at = excluded.updated_at",
        params![record.id.to_string(), record.entity, nonce, payload, now],
    )?;
    Ok(())
}

fn read_meta(conn: &Connection, key: &str) -> Result<Option<Vec<u8>>> {
    Ok(conn
        .query_row(
            "SELECT value FROM store_metadata WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?)
}

fn write_meta(conn: &Connection, key: &str, value: &[u8]) -> Result<()> {
    conn.execute(
        "INSERT INTO store_metadata (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FAST: KdfParams = KdfParams::new(256, 1, 1);

    const V1: &str = r#"{"name": "Lists", "version": 1, "entities": [
        {"name": "List", "attributes": [{"name": "name", "type": "string"}]},
        {"name": "Tag", "attributes": [{"name": "label", "type": "string"}]}
    ]}"#;

    fn options() -> StoreOptions {
        StoreOptions {
            kdf: FAST,
            ..StoreOptions::default()
        }
    }

    fn schema(json: &str) -> Arc<Schema> {
        Arc::new(Schema::from_json("Lists", json).unwrap())
    }

    fn open(path: &Path, json: &str, passphrase: &str) -> Result<StoreHandle> {
        StoreHandle::open("test", schema(json), path, passphrase, &options())
    }

    fn commit_records(store: &StoreHandle, records: &[Record]) {
        let mut changes = ChangeSet::default();
        for record in records {
            changes.insert(record.clone());
        }
        store.commit(&changes).unwrap();
    }

    #[test]
    fn test_store_path() {
        assert_eq!(
            store_path(Path::new("/docs"), "Lists"),
            PathBuf::from("/docs/Lists.sqlite")
        );
    }

    #[test]
    fn test_create_commit_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("Lists.sqlite");

        let store = open(&path, V1, "secret").unwrap();
        let list = Record::new("List", json!({"name": "Groceries"}));
        commit_records(&store, &[list.clone()]);
        drop(store);

        let reopened = open(&path, V1, "secret").unwrap();
        assert_eq!(reopened.fetch(&list.id).unwrap(), Some(list.clone()));
        assert_eq!(reopened.fetch_entity("List").unwrap(), vec![list]);
        assert_eq!(reopened.count("List").unwrap(), 1);
        assert_eq!(reopened.count("Tag").unwrap(), 0);
    }

    #[test]
    fn test_concurrent_first_open() {
        for _ in 0..8 {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("Lists.sqlite");

            let (first, second) = std::thread::scope(|scope| {
                let a = scope.spawn(|| open(&path, V1, "secret"));
                let b = scope.spawn(|| open(&path, V1, "secret"));
                (a.join().unwrap(), b.join().unwrap())
            });
            let first = first.unwrap();
            let second = second.unwrap();

            commit_records(&first, &[Record::new("List", json!({"name": "a"}))]);
            assert_eq!(second.count("List").unwrap(), 1);
            assert_eq!(second.fetch_entity("List").unwrap().len(), 1);

            let staged: Vec<_> = std::fs::read_dir(dir.path())
                .unwrap()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_name().to_string_lossy().contains(".creating"))
                .collect();
            assert!(staged.is_empty(), "{staged:?}");
        }
    }

    #[test]
    fn test_abandoned_staging_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Lists.sqlite");
        std::fs::write(dir.path().join(".Lists.sqlite.stale.creating"), b"half written").unwrap();

        let store = open(&path, V1, "secret").unwrap();
        commit_records(&store, &[Record::new("List", json!({"name": "a"}))]);
        drop(store);
        assert_eq!(open(&path, V1, "secret").unwrap().count("List").unwrap(), 1);
    }

    #[test]
    fn test_two_handles_same_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Lists.sqlite");
        let first = open(&path, V1, "secret").unwrap();
        let second = open(&path, V1, "secret").unwrap();

        commit_records(&second, &[Record::new("List", json!({"name": "a"}))]);
        assert_eq!(first.count("List").unwrap(), 1);
        assert_eq!(first.path(), second.path());
    }

    #[test]
    fn test_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir.path().join("Lists.sqlite"), V1, "secret").unwrap();
        let list = Record::new("List", json!({"name": "Groceries"}));
        commit_records(&store, &[list.clone()]);

        let mut changes = ChangeSet::default();
        changes.delete(list.id);
        let stats = store.commit(&changes).unwrap();
        assert_eq!(stats.deleted, 1);
        assert_eq!(store.fetch(&list.id).unwrap(), None);
    }

    #[test]
    fn test_payload_is_not_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(&dir.path().join("Lists.sqlite"), V1, "secret").unwrap();
        commit_records(&store, &[Record::new("List", json!({"name": "hidden-name"}))]);

        let conn = store.conn.lock();
        let payload: Vec<u8> = conn
            .query_row("SELECT payload FROM objects", [], |row| row.get(0))
            .unwrap();
        assert!(!payload.windows(11).any(|w| w == b"hidden-name"));
    }

    #[test]
    fn test_wrong_passphrase() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Lists.sqlite");
        open(&path, V1, "secret").unwrap();

        let err = open(&path, V1, "guess").unwrap_err();
        assert!(matches!(err, Error::InvalidPassphrase { .. }));
    }

    #[test]
    fn test_empty_and_foreign_files_are_corrupt() {
        let dir = tempfile::tempdir().unwrap();

        let empty = dir.path().join("empty.sqlite");
        std::fs::write(&empty, b"").unwrap();
        assert!(matches!(
            open(&empty, V1, "secret").unwrap_err(),
            Error::StoreCorrupt { .. }
        ));
        assert_eq!(std::fs::metadata(&empty).unwrap().len(), 0);

        let garbage = dir.path().join("garbage.sqlite");
        std::fs::write(&garbage, b"definitely not a sqlite database, just text".repeat(200))
            .unwrap();
        assert!(matches!(
            open(&garbage, V1, "secret").unwrap_err(),
            Error::StoreCorrupt { .. }
        ));

        let foreign = dir.path().join("foreign.sqlite");
        Connection::open(&foreign)
            .unwrap()
            .execute_batch("CREATE TABLE notes (body TEXT)")
            .unwrap();
        assert!(matches!(
            open(&foreign, V1, "secret").unwrap_err(),
            Error::StoreCorrupt { .. }
        ));
    }

    #[test]
    fn test_migration_drops_removed_entity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Lists.sqlite");
        let store = open(&path, V1, "secret").unwrap();
        let list = Record::new("List", json!({"name": "Groceries"}));
        commit_records(&store, &[list.clone(), Record::new("Tag", json!({"label": "x"}))]);
        drop(store);

        let v2 = r#"{"name": "Lists", "version": 2, "entities": [
            {"name": "List", "attributes": [
                {"name": "name", "type": "string"},
                {"name": "archived", "type": "boolean", "default": false}
            ]}
        ]}"#;
        let store = open(&path, v2, "secret").unwrap();
        assert_eq!(store.stored_model_version().unwrap(), 2);
        assert_eq!(store.count("Tag").unwrap(), 0);

        let migrated = store.fetch(&list.id).unwrap().unwrap();
        assert_eq!(migrated.get("archived"), Some(&json!(false)));

        let recorded: i64 = store
            .conn
            .lock()
            .query_row("SELECT dropped_records FROM model_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(recorded, 1);
    }

    #[test]
    fn test_migration_options() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Lists.sqlite");
        open(&path, V1, "secret").unwrap();
        let v2 = V1.replace(r#""version": 1"#, r#""version": 2"#);

        let no_migration = StoreOptions {
            migrate_automatically: false,
            ..options()
        };
        let err = StoreHandle::open("test", schema(&v2), &path, "secret", &no_migration)
            .unwrap_err();
        assert!(matches!(err, Error::IncompatibleModel { stored: 1, current: 2 }));

        let no_inference = StoreOptions {
            infer_mapping_automatically: false,
            ..options()
        };
        let err = StoreHandle::open("test", schema(&v2), &path, "secret", &no_inference)
            .unwrap_err();
        assert!(matches!(err, Error::MappingUnavailable { .. }));
    }
}

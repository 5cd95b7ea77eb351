//! The persistence coordinator.
//!
//! Owns one schema, two store handles on the same file and three object
//! contexts:
//!
//! ```text
//!   main (listvault-main) ──save──▶ private (listvault-private) ──▶ store
//!   import (listvault-import) ──────────────────────────────────▶ store'
//! ```
//!
//! Everything is created lazily on first access and memoized. Setup
//! failures come back as `Err` from the accessor that triggered them.

use crate::config::{PassphraseProvider, StoreConfig};
use crate::context::{ContextScope, ObjectContext};
use crate::error::{Error, Result};
use crate::lifecycle::{LifecycleEvent, NotificationCenter, SubscriptionId};
use crate::model::Schema;
use crate::storage::StoreHandle;
use crossbeam::channel::{self, RecvTimeoutError};
use parking_lot::Mutex;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Queue name of the foreground context.
pub const MAIN_QUEUE: &str = "listvault-main";
/// Queue name of the background context.
pub const PRIVATE_QUEUE: &str = "listvault-private";
/// Queue name of the import context.
pub const IMPORT_QUEUE: &str = "listvault-import";

/// What a flush did with one context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SaveOutcome {
    /// Nothing to save (or the context was never created).
    Clean,
    Saved { changes: usize },
    /// The save failed; the error was logged and the changes kept.
    Failed { code: String, message: String },
}

impl SaveOutcome {
    fn from_scope(scope: &mut ContextScope) -> Self {
        if !scope.has_changes() {
            return Self::Clean;
        }
        match scope.save() {
            Ok(changes) => Self::Saved { changes },
            Err(e) => {
                error!(
                    context = %scope.name(),
                    code = e.error_code().as_str(),
                    error = %e,
                    "Save failed during flush"
                );
                Self::Failed {
                    code: e.error_code().as_str().to_string(),
                    message: e.to_string(),
                }
            }
        }
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Result of one flush of the foreground/background pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    pub foreground: SaveOutcome,
    pub background: SaveOutcome,
    #[serde(with = "millis")]
    pub elapsed: Duration,
}

impl FlushReport {
    fn untouched() -> Self {
        Self {
            foreground: SaveOutcome::Clean,
            background: SaveOutcome::Clean,
            elapsed: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.foreground.is_failed() || self.background.is_failed()
    }
}

mod millis {
    use serde::Serializer;
    use std::time::Duration;

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }
}

type Slot<T> = Mutex<Option<Arc<T>>>;

/// Memoize `slot`, building its value with `build` on first use.
///
/// The slot lock is held while building, so concurrent first accesses
/// build once.
fn memoize<T>(slot: &Slot<T>, build: impl FnOnce() -> Result<T>) -> Result<Arc<T>> {
    let mut guard = slot.lock();
    if let Some(existing) = guard.as_ref() {
        return Ok(existing.clone());
    }
    let value = Arc::new(build()?);
    *guard = Some(value.clone());
    Ok(value)
}

/// Encrypted, layered object persistence for one model.
pub struct PersistenceCoordinator {
    config: StoreConfig,
    passphrase: Arc<dyn PassphraseProvider>,
    schema: Slot<Schema>,
    primary_store: Slot<StoreHandle>,
    import_store: Slot<StoreHandle>,
    background: Slot<ObjectContext>,
    foreground: Slot<ObjectContext>,
    import: Slot<ObjectContext>,
    subscriptions: Mutex<Vec<(NotificationCenter, SubscriptionId)>>,
}

impl std::fmt::Debug for PersistenceCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceCoordinator")
            .field("model", &self.config.model_name)
            .field("store", &self.config.store_path())
            .finish_non_exhaustive()
    }
}

impl PersistenceCoordinator {
    /// Create a coordinator. Nothing is loaded or opened yet.
    #[must_use]
    pub fn new(config: StoreConfig, passphrase: Arc<dyn PassphraseProvider>) -> Self {
        Self {
            config,
            passphrase,
            schema: Mutex::new(None),
            primary_store: Mutex::new(None),
            import_store: Mutex::new(None),
            background: Mutex::new(None),
            foreground: Mutex::new(None),
            import: Mutex::new(None),
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// `<documents>/<model>.sqlite`
    #[must_use]
    pub fn store_path(&self) -> PathBuf {
        self.config.store_path()
    }

    /// The loaded model.
    ///
    /// # Errors
    ///
    /// Returns `ModelNotFound` or `InvalidModel`.
    pub fn schema(&self) -> Result<Arc<Schema>> {
        memoize(&self.schema, || {
            let schema = Schema::load(&self.config.resources_dir, &self.config.model_name)?;
            info!(model = %schema.name, version = schema.version, "Model loaded");
            Ok(schema)
        })
    }

    fn open_store(&self, label: &str) -> Result<StoreHandle> {
        let schema = self.schema()?;
        let passphrase = self.passphrase.passphrase()?;
        StoreHandle::open(
            label,
            schema,
            &self.config.store_path(),
            &passphrase,
            &self.config.options,
        )
    }

    /// Store handle behind the foreground/background pair.
    ///
    /// # Errors
    ///
    /// Returns any setup error from loading the model or opening the store.
    pub fn primary_store(&self) -> Result<Arc<StoreHandle>> {
        memoize(&self.primary_store, || self.open_store("primary"))
    }

    /// Independent store handle behind the import context.
    ///
    /// # Errors
    ///
    /// Returns any setup error from loading the model or opening the store.
    pub fn import_store(&self) -> Result<Arc<StoreHandle>> {
        memoize(&self.import_store, || self.open_store("import"))
    }

    /// Context that writes to disk; parent of the main context.
    ///
    /// # Errors
    ///
    /// Returns any setup error of the primary store.
    pub fn background_context(&self) -> Result<Arc<ObjectContext>> {
        memoize(&self.background, || {
            ObjectContext::with_store(PRIVATE_QUEUE, self.primary_store()?)
        })
    }

    /// Foreground context. Its saves reach disk only through a flush.
    ///
    /// # Errors
    ///
    /// Returns any setup error of the primary store.
    pub fn main_context(&self) -> Result<Arc<ObjectContext>> {
        memoize(&self.foreground, || {
            ObjectContext::with_parent(MAIN_QUEUE, self.background_context()?)
        })
    }

    /// Context for bulk imports on its own store handle.
    ///
    /// # Errors
    ///
    /// Returns any setup error of the import store.
    pub fn import_context(&self) -> Result<Arc<ObjectContext>> {
        memoize(&self.import, || {
            ObjectContext::with_store(IMPORT_QUEUE, self.import_store()?)
        })
    }

    /// Load the model, open both handles and create all three contexts.
    ///
    /// # Errors
    ///
    /// Returns the first setup error encountered.
    pub fn initialize(&self) -> Result<()> {
        self.main_context()?;
        self.import_context()?;
        Ok(())
    }

    /// Flush with the configured timeout.
    ///
    /// # Errors
    ///
    /// See [`Self::flush_with_timeout`].
    pub fn flush(&self) -> Result<FlushReport> {
        self.flush_with_timeout(self.config.flush_timeout)
    }

    /// Save the main context into the background context, then the
    /// background context to disk, and wait for the disk write.
    ///
    /// The foreground step runs on the main queue and schedules the
    /// background step on the private queue whether or not it saved.
    /// Save failures are logged and reported in the [`FlushReport`]; they
    /// never abort the flush. Contexts that do not exist yet are not
    /// created.
    ///
    /// # Errors
    ///
    /// Returns `FlushTimeout` if the background step has not finished in
    /// time (it still runs to completion) and `Closed` if a queue is gone.
    pub fn flush_with_timeout(&self, timeout: Duration) -> Result<FlushReport> {
        let foreground = self.foreground.lock().clone();
        let background = self.background.lock().clone();
        let Some(background) = background else {
            debug!("Flush skipped, no contexts created");
            return Ok(FlushReport::untouched());
        };

        let started = Instant::now();
        let (report_tx, report_rx) = channel::bounded(1);

        match foreground {
            Some(foreground) => {
                foreground.perform(move |scope| {
                    let fg_outcome = SaveOutcome::from_scope(scope);
                    let scheduled = background.perform(move |scope| {
                        let bg_outcome = SaveOutcome::from_scope(scope);
                        let _ = report_tx.send((fg_outcome, bg_outcome));
                    });
                    if let Err(e) = scheduled {
                        warn!(error = %e, "Background flush could not be scheduled");
                    }
                })?;
            }
            None => {
                background.perform(move |scope| {
                    let bg_outcome = SaveOutcome::from_scope(scope);
                    let _ = report_tx.send((SaveOutcome::Clean, bg_outcome));
                })?;
            }
        }

        match report_rx.recv_timeout(timeout) {
            Ok((foreground, background)) => {
                let report = FlushReport {
                    foreground,
                    background,
                    elapsed: started.elapsed(),
                };
                debug!(?report, "Flush complete");
                Ok(report)
            }
            Err(RecvTimeoutError::Timeout) => Err(Error::FlushTimeout { timeout }),
            Err(RecvTimeoutError::Disconnected) => Err(Error::Closed {
                queue: PRIVATE_QUEUE.to_string(),
            }),
        }
    }

    /// Flush on `WillTerminate` and `DidEnterBackground` posted to `center`.
    ///
    /// The subscriptions hold a weak reference to the coordinator and are
    /// removed when it is closed or dropped.
    pub fn observe_lifecycle(self: &Arc<Self>, center: &NotificationCenter) {
        let mut subscriptions = self.subscriptions.lock();
        for event in [
            LifecycleEvent::WillTerminate,
            LifecycleEvent::DidEnterBackground,
        ] {
            let coordinator: Weak<Self> = Arc::downgrade(self);
            let id = center.subscribe(event, move |event| {
                if let Some(coordinator) = coordinator.upgrade() {
                    coordinator.flush_for_event(event);
                }
            });
            subscriptions.push((center.clone(), id));
        }
    }

    fn flush_for_event(&self, event: LifecycleEvent) {
        match self.flush() {
            Ok(report) if report.has_failures() => {
                warn!(%event, ?report, "Lifecycle flush finished with failures");
            }
            Ok(report) => {
                info!(%event, elapsed_ms = report.elapsed.as_millis(), "Lifecycle flush complete");
            }
            Err(e) => {
                error!(%event, code = e.error_code().as_str(), error = %e, "Lifecycle flush failed");
            }
        }
    }

    fn unsubscribe_all(&self) {
        for (center, id) in self.subscriptions.lock().drain(..) {
            center.unsubscribe(id);
        }
    }

    /// Stop observing lifecycle events, flush, and stop every queue.
    ///
    /// Contexts and handles are released; accessing them afterwards
    /// opens new ones.
    ///
    /// # Errors
    ///
    /// Returns the flush error, after the queues have been stopped.
    pub fn close(&self) -> Result<FlushReport> {
        self.unsubscribe_all();
        let flushed = self.flush();

        for slot in [&self.foreground, &self.background, &self.import] {
            if let Some(context) = slot.lock().take() {
                context.shutdown();
            }
        }
        self.primary_store.lock().take();
        self.import_store.lock().take();
        info!(store = %self.store_path().display(), "Coordinator closed");
        flushed
    }
}

impl Drop for PersistenceCoordinator {
    fn drop(&mut self) {
        self.unsubscribe_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticPassphrase;
    use crate::storage::StoreOptions;
    use crate::storage::crypto::KdfParams;
    use serde_json::json;
    use std::path::Path;
    use tempfile::TempDir;

    const LISTS_V1: &str = r#"{
        "name": "Lists",
        "version": 1,
        "entities": [
            {"name": "List", "attributes": [
                {"name": "name", "type": "string"},
                {"name": "created", "type": "date", "optional": true}
            ], "relationships": [
                {"name": "items", "destination": "Item", "to_many": true}
            ]},
            {"name": "Item", "attributes": [
                {"name": "title", "type": "string"},
                {"name": "done", "type": "boolean", "default": false}
            ], "relationships": [
                {"name": "list", "destination": "List"}
            ]}
        ]
    }"#;

    fn write_model(dir: &Path, contents: &str) {
        let resources = dir.join("resources");
        std::fs::create_dir_all(&resources).unwrap();
        std::fs::write(resources.join("Lists.model.json"), contents).unwrap();
    }

    fn config(dir: &Path) -> StoreConfig {
        StoreConfig::new("Lists", dir.join("documents"), dir.join("resources"))
            .unwrap()
            .with_options(StoreOptions {
                kdf: KdfParams::new(256, 1, 1),
                ..StoreOptions::default()
            })
            .with_flush_timeout(Duration::from_secs(10))
    }

    fn coordinator_with(dir: &Path, passphrase: &str) -> PersistenceCoordinator {
        PersistenceCoordinator::new(config(dir), Arc::new(StaticPassphrase::new(passphrase)))
    }

    fn coordinator(dir: &Path) -> PersistenceCoordinator {
        coordinator_with(dir, "secret")
    }

    fn setup() -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        write_model(dir.path(), LISTS_V1);
        dir
    }

    fn fresh_count(dir: &Path, entity: &str) -> usize {
        let reader = coordinator(dir);
        reader.background_context().unwrap().count(entity).unwrap()
    }

    #[test]
    fn test_both_handles_address_same_file() {
        let dir = setup();
        let coordinator = coordinator(dir.path());
        let primary = coordinator.primary_store().unwrap();
        let import = coordinator.import_store().unwrap();

        assert_eq!(primary.path(), import.path());
        assert_eq!(primary.path(), coordinator.store_path());
        assert!(!Arc::ptr_eq(&primary, &import));
    }

    #[test]
    fn test_accessors_memoize() {
        let dir = setup();
        let coordinator = coordinator(dir.path());
        let first = coordinator.main_context().unwrap();
        let second = coordinator.main_context().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(
            &coordinator.background_context().unwrap(),
            &coordinator.background_context().unwrap()
        ));
    }

    #[test]
    fn test_lists_scenario() {
        let dir = setup();
        let coordinator = coordinator(dir.path());
        let store_file = dir.path().join("documents").join("Lists.sqlite");
        assert!(!store_file.exists());

        let main = coordinator.main_context().unwrap();
        assert!(store_file.exists());

        main.insert("List", json!({"name": "Groceries"})).unwrap();
        let report = coordinator.flush().unwrap();
        assert_eq!(report.foreground, SaveOutcome::Saved { changes: 1 });
        assert_eq!(report.background, SaveOutcome::Saved { changes: 1 });

        assert_eq!(fresh_count(dir.path(), "List"), 1);
    }

    #[test]
    fn test_unflushed_insert_not_durable() {
        let dir = setup();
        let coordinator = coordinator(dir.path());
        let main = coordinator.main_context().unwrap();
        main.insert("List", json!({"name": "Groceries"})).unwrap();
        main.save().unwrap();

        assert_eq!(fresh_count(dir.path(), "List"), 0);
    }

    #[test]
    fn test_clean_flush_attempts_no_saves() {
        let dir = setup();
        let coordinator = coordinator(dir.path());
        coordinator.initialize().unwrap();

        let report = coordinator.flush().unwrap();
        assert_eq!(report.foreground, SaveOutcome::Clean);
        assert_eq!(report.background, SaveOutcome::Clean);
        assert_eq!(coordinator.main_context().unwrap().save_counts().attempts, 0);
        assert_eq!(
            coordinator.background_context().unwrap().save_counts().attempts,
            0
        );
    }

    #[test]
    fn test_flush_before_first_access_opens_nothing() {
        let dir = setup();
        let coordinator = coordinator(dir.path());
        let report = coordinator.flush().unwrap();
        assert!(!report.has_failures());
        assert!(!coordinator.store_path().exists());
    }

    #[test]
    fn test_background_flush_runs_after_foreground_failure() {
        let dir = setup();
        let coordinator = coordinator(dir.path());
        let main = coordinator.main_context().unwrap();
        let private = coordinator.background_context().unwrap();

        main.insert("List", json!({})).unwrap();
        private.insert("List", json!({"name": "Chores"})).unwrap();

        let report = coordinator.flush().unwrap();
        match &report.foreground {
            SaveOutcome::Failed { code, .. } => assert_eq!(code, "VALIDATION_FAILED"),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(report.background, SaveOutcome::Saved { changes: 1 });
        assert!(main.has_changes().unwrap());
        assert_eq!(fresh_count(dir.path(), "List"), 1);
    }

    #[test]
    fn test_import_not_blocked_by_main_queue() {
        let dir = setup();
        let coordinator = coordinator(dir.path());
        let main = coordinator.main_context().unwrap();
        let import = coordinator.import_context().unwrap();

        let (release_tx, release_rx) = channel::bounded::<()>(1);
        main.perform(move |_| {
            let _ = release_rx.recv_timeout(Duration::from_secs(30));
        })
        .unwrap();

        for i in 0..3 {
            import
                .insert("Item", json!({"title": format!("item {i}")}))
                .unwrap();
        }
        assert_eq!(import.save().unwrap(), 3);
        assert_eq!(fresh_count(dir.path(), "Item"), 3);

        release_tx.send(()).unwrap();
        assert!(!main.has_changes().unwrap());
    }

    #[test]
    fn test_concurrent_first_access_from_two_threads() {
        for _ in 0..8 {
            let dir = setup();
            let coordinator = coordinator(dir.path());

            let (main, import) = std::thread::scope(|scope| {
                let main = scope.spawn(|| coordinator.main_context().map(|_| ()));
                let import = scope.spawn(|| coordinator.import_context().map(|_| ()));
                (main.join().unwrap(), import.join().unwrap())
            });
            main.unwrap();
            import.unwrap();

            let import = coordinator.import_context().unwrap();
            import.insert("Item", json!({"title": "Tea"})).unwrap();
            import.save().unwrap();
            assert_eq!(
                coordinator.background_context().unwrap().count("Item").unwrap(),
                1
            );
        }
    }

    #[test]
    fn test_flush_timeout() {
        let dir = setup();
        let coordinator = coordinator(dir.path());
        let main = coordinator.main_context().unwrap();
        let private = coordinator.background_context().unwrap();

        let (release_tx, release_rx) = channel::bounded::<()>(1);
        private
            .perform(move |_| {
                let _ = release_rx.recv_timeout(Duration::from_secs(30));
            })
            .unwrap();
        main.insert("List", json!({"name": "Late"})).unwrap();

        let err = coordinator
            .flush_with_timeout(Duration::from_millis(50))
            .unwrap_err();
        assert!(matches!(err, Error::FlushTimeout { .. }), "{err:?}");

        release_tx.send(()).unwrap();
        // Queued behind the timed-out flush on both queues.
        coordinator.flush().unwrap();
        assert!(!main.has_changes().unwrap());
        assert!(!private.has_changes().unwrap());
        assert_eq!(fresh_count(dir.path(), "List"), 1);
    }

    #[test]
    fn test_empty_store_file_is_corrupt() {
        let dir = setup();
        let documents = dir.path().join("documents");
        std::fs::create_dir_all(&documents).unwrap();
        std::fs::write(documents.join("Lists.sqlite"), b"").unwrap();

        let err = coordinator(dir.path()).main_context().unwrap_err();
        assert!(matches!(err, Error::StoreCorrupt { .. }), "{err:?}");
        assert!(err.is_setup_error());
    }

    #[test]
    fn test_garbage_store_file_is_corrupt() {
        let dir = setup();
        let documents = dir.path().join("documents");
        std::fs::create_dir_all(&documents).unwrap();
        std::fs::write(documents.join("Lists.sqlite"), vec![0xA5u8; 8192]).unwrap();

        let err = coordinator(dir.path()).import_context().unwrap_err();
        assert!(matches!(err, Error::StoreCorrupt { .. }), "{err:?}");
    }

    #[test]
    fn test_wrong_passphrase() {
        let dir = setup();
        coordinator_with(dir.path(), "first").initialize().unwrap();

        let err = coordinator_with(dir.path(), "second")
            .main_context()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPassphrase { .. }), "{err:?}");
    }

    #[test]
    fn test_missing_model() {
        let dir = tempfile::tempdir().unwrap();
        let err = coordinator(dir.path()).main_context().unwrap_err();
        assert!(matches!(err, Error::ModelNotFound { .. }));
        assert!(err.is_setup_error());
    }

    fn seed_one_list(dir: &Path) {
        let coordinator = coordinator(dir);
        coordinator
            .main_context()
            .unwrap()
            .insert("List", json!({"name": "Groceries"}))
            .unwrap();
        coordinator.close().unwrap();
    }

    #[test]
    fn test_added_optional_attribute_migrates() {
        let dir = setup();
        seed_one_list(dir.path());

        let v2 = LISTS_V1
            .replace(r#""version": 1"#, r#""version": 2"#)
            .replace(
                r#"{"name": "created", "type": "date", "optional": true}"#,
                r#"{"name": "created", "type": "date", "optional": true},
                   {"name": "color", "type": "string", "optional": true}"#,
            );
        write_model(dir.path(), &v2);

        let coordinator = coordinator(dir.path());
        let lists = coordinator.background_context().unwrap().fetch("List").unwrap();
        assert_eq!(lists.len(), 1);
        assert_eq!(lists[0].get("name"), Some(&json!("Groceries")));
        assert_eq!(coordinator.primary_store().unwrap().stored_model_version().unwrap(), 2);
    }

    #[test]
    fn test_type_change_has_no_mapping() {
        let dir = setup();
        seed_one_list(dir.path());

        let v2 = LISTS_V1
            .replace(r#""version": 1"#, r#""version": 2"#)
            .replace(
                r#"{"name": "name", "type": "string"}"#,
                r#"{"name": "name", "type": "integer"}"#,
            );
        write_model(dir.path(), &v2);

        let err = coordinator(dir.path()).main_context().unwrap_err();
        assert!(matches!(err, Error::MappingUnavailable { .. }), "{err:?}");
    }

    #[test]
    fn test_migration_disabled() {
        let dir = setup();
        seed_one_list(dir.path());

        let v2 = LISTS_V1.replace(r#""version": 1"#, r#""version": 2"#);
        write_model(dir.path(), &v2);

        let config = config(dir.path()).with_options(StoreOptions {
            migrate_automatically: false,
            kdf: KdfParams::new(256, 1, 1),
            ..StoreOptions::default()
        });
        let coordinator =
            PersistenceCoordinator::new(config, Arc::new(StaticPassphrase::new("secret")));
        let err = coordinator.main_context().unwrap_err();
        assert!(matches!(err, Error::IncompatibleModel { .. }), "{err:?}");
    }

    #[test]
    fn test_lifecycle_event_triggers_flush() {
        let dir = setup();
        let center = NotificationCenter::new();
        let coordinator = Arc::new(coordinator(dir.path()));
        coordinator.observe_lifecycle(&center);
        assert_eq!(center.subscriber_count(), 2);

        coordinator
            .main_context()
            .unwrap()
            .insert("List", json!({"name": "Trip"}))
            .unwrap();
        assert_eq!(center.post(LifecycleEvent::DidEnterBackground), 1);
        assert_eq!(fresh_count(dir.path(), "List"), 1);

        drop(coordinator);
        assert_eq!(center.subscriber_count(), 0);
        assert_eq!(center.post(LifecycleEvent::WillTerminate), 0);
    }

    #[test]
    fn test_close_flushes_and_stops_queues() {
        let dir = setup();
        let coordinator = coordinator(dir.path());
        let main = coordinator.main_context().unwrap();
        main.insert("List", json!({"name": "Trip"})).unwrap();

        let report = coordinator.close().unwrap();
        assert_eq!(report.background, SaveOutcome::Saved { changes: 1 });
        assert!(matches!(main.has_changes(), Err(Error::Closed { .. })));
        assert_eq!(fresh_count(dir.path(), "List"), 1);
    }

    #[test]
    fn test_flush_report_json() {
        let report = FlushReport {
            foreground: SaveOutcome::Clean,
            background: SaveOutcome::Saved { changes: 2 },
            elapsed: Duration::from_millis(12),
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["foreground"]["status"], "clean");
        assert_eq!(value["background"]["changes"], 2);
        assert_eq!(value["elapsed"], 12);
    }
}

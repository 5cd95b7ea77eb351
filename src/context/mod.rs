//! Object contexts.
//!
//! An `ObjectContext` is an in-memory working set of objects plus their
//! pending mutations, confined to one serial queue. A context is bound
//! either to a store handle (saves write to disk) or to a parent context
//! (saves promote the pending changes into the parent).
//!
//! # Submodules
//!
//! - [`changes`] - Pending change sets and read overlays
//! - [`queue`] - Serial queues that own context state

pub mod changes;
pub mod queue;

pub use changes::{ChangeSet, Overlay};
pub use queue::SerialQueue;

use crate::error::{Error, Result};
use crate::model::{ObjectId, Record, Schema};
use crate::storage::StoreHandle;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Where a context's saves go.
#[derive(Debug, Clone)]
pub enum ContextParent {
    Store(Arc<StoreHandle>),
    Context(Arc<ObjectContext>),
}

/// Save counters for one context.
#[derive(Debug, Default)]
pub struct SaveStats {
    attempts: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of [`SaveStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SaveCounts {
    pub attempts: u64,
    pub succeeded: u64,
    pub failed: u64,
}

impl SaveStats {
    #[must_use]
    pub fn snapshot(&self) -> SaveCounts {
        SaveCounts {
            attempts: self.attempts.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Context state, reachable only from jobs running on the context's queue.
///
/// `perform` and `perform_and_wait` hand jobs a `&mut ContextScope`; all
/// reads and writes inside a job go through it directly, without another
/// trip through the queue.
#[derive(Debug)]
pub struct ContextScope {
    name: String,
    schema: Arc<Schema>,
    parent: ContextParent,
    pending: ChangeSet,
    stats: Arc<SaveStats>,
}

impl ContextScope {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dirty flag: whether uncommitted changes exist.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.pending.is_empty()
    }

    #[must_use]
    pub fn pending(&self) -> &ChangeSet {
        &self.pending
    }

    /// Insert a new object, filling attribute defaults from the model.
    ///
    /// Validation is deferred to `save`.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not part of the model.
    pub fn insert(&mut self, entity: &str, attributes: Value) -> Result<Record> {
        let mut record = Record::new(entity, attributes);
        self.schema.apply_defaults(&mut record)?;
        self.pending.insert(record.clone());
        Ok(record)
    }

    /// Merge `changes` into an existing object. `null` removes a value.
    ///
    /// # Errors
    ///
    /// Returns `ObjectNotFound` if the object is not visible here.
    pub fn update(&mut self, id: ObjectId, changes: Map<String, Value>) -> Result<Record> {
        let mut record = self
            .get(&id)?
            .ok_or_else(|| Error::ObjectNotFound { id: id.to_string() })?;
        record.apply_changes(changes);
        self.pending.update(record.clone());
        Ok(record)
    }

    /// Mark an object deleted.
    ///
    /// # Errors
    ///
    /// Returns `ObjectNotFound` if the object is not visible here.
    pub fn delete(&mut self, id: ObjectId) -> Result<()> {
        if self.get(&id)?.is_none() {
            return Err(Error::ObjectNotFound { id: id.to_string() });
        }
        self.pending.delete(id);
        Ok(())
    }

    /// Look up an object, seeing this context's pending changes first.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent cannot be read.
    pub fn get(&self, id: &ObjectId) -> Result<Option<Record>> {
        match self.pending.overlay(id) {
            Overlay::Changed(record) => Ok(Some(record.clone())),
            Overlay::Deleted => Ok(None),
            Overlay::Untouched => match &self.parent {
                ContextParent::Store(store) => store.fetch(id),
                ContextParent::Context(parent) => parent.get(*id),
            },
        }
    }

    /// All objects of an entity as seen from this context.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is unknown or the parent cannot be read.
    pub fn fetch(&self, entity: &str) -> Result<Vec<Record>> {
        self.schema.require_entity(entity)?;
        let base = match &self.parent {
            ContextParent::Store(store) => store.fetch_entity(entity)?,
            ContextParent::Context(parent) => parent.fetch(entity)?,
        };
        Ok(self.pending.overlay_entity(entity, base))
    }

    /// Number of objects of an entity as seen from this context.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is unknown or the parent cannot be read.
    pub fn count(&self, entity: &str) -> Result<usize> {
        if self.pending.is_empty() {
            if let ContextParent::Store(store) = &self.parent {
                self.schema.require_entity(entity)?;
                return store.count(entity);
            }
        }
        Ok(self.fetch(entity)?.len())
    }

    /// Persist pending changes into the parent.
    ///
    /// For a store-bound context this writes to disk; for a child context it
    /// moves the changes into the parent's pending set. Returns the number
    /// of changes saved. On failure the pending changes are kept.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if an object breaks the model, or the error of
    /// the underlying write.
    pub fn save(&mut self) -> Result<usize> {
        self.stats.attempts.fetch_add(1, Ordering::Relaxed);
        let result = self.save_pending();
        match &result {
            Ok(count) => {
                self.stats.succeeded.fetch_add(1, Ordering::Relaxed);
                debug!(context = %self.name, changes = count, "Context saved");
            }
            Err(_) => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
            }
        }
        result
    }

    fn save_pending(&mut self) -> Result<usize> {
        if self.pending.is_empty() {
            return Ok(0);
        }
        for record in self.pending.upserts() {
            self.schema.validate(record)?;
        }

        let count = self.pending.len();
        match &self.parent {
            ContextParent::Store(store) => {
                store.commit(&self.pending)?;
            }
            ContextParent::Context(parent) => {
                let changes = self.pending.clone();
                parent.perform_and_wait(move |scope| scope.pending.merge(changes))?;
            }
        }
        self.pending = ChangeSet::default();
        Ok(count)
    }

    /// Discard every pending change.
    pub fn rollback(&mut self) {
        self.pending = ChangeSet::default();
    }
}

/// A queue-confined object cache.
#[derive(Debug)]
pub struct ObjectContext {
    name: String,
    schema: Arc<Schema>,
    stats: Arc<SaveStats>,
    queue: SerialQueue<ContextScope>,
}

impl ObjectContext {
    /// Create a context whose saves write to `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue thread cannot be started.
    pub fn with_store(name: &str, store: Arc<StoreHandle>) -> Result<Self> {
        let schema = store.schema().clone();
        Self::spawn(name, schema, ContextParent::Store(store))
    }

    /// Create a child context whose saves merge into `parent`.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue thread cannot be started.
    pub fn with_parent(name: &str, parent: Arc<ObjectContext>) -> Result<Self> {
        let schema = parent.schema.clone();
        Self::spawn(name, schema, ContextParent::Context(parent))
    }

    fn spawn(name: &str, schema: Arc<Schema>, parent: ContextParent) -> Result<Self> {
        let stats = Arc::new(SaveStats::default());
        let scope = ContextScope {
            name: name.to_string(),
            schema: schema.clone(),
            parent,
            pending: ChangeSet::default(),
            stats: stats.clone(),
        };
        let queue = SerialQueue::spawn(name, scope)?;
        Ok(Self {
            name: name.to_string(),
            schema,
            stats,
            queue,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    #[must_use]
    pub fn save_counts(&self) -> SaveCounts {
        self.stats.snapshot()
    }

    /// Whether the caller is running on this context's queue.
    #[must_use]
    pub fn is_current_queue(&self) -> bool {
        self.queue.is_current()
    }

    /// Schedule `job` on the context's queue and return immediately.
    ///
    /// # Errors
    ///
    /// Returns `Closed` if the context has been shut down.
    pub fn perform<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce(&mut ContextScope) + Send + 'static,
    {
        self.queue.dispatch(job)
    }

    /// Run `job` on the context's queue and wait for its result.
    ///
    /// # Errors
    ///
    /// Returns `Closed` if the context has been shut down and
    /// `ReentrantPerform` if called from the context's own queue.
    pub fn perform_and_wait<F, R>(&self, job: F) -> Result<R>
    where
        F: FnOnce(&mut ContextScope) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.queue.dispatch_and_wait(job)
    }

    /// See [`ContextScope::insert`].
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is unknown or the queue is closed.
    pub fn insert(&self, entity: &str, attributes: Value) -> Result<Record> {
        let entity = entity.to_string();
        self.perform_and_wait(move |scope| scope.insert(&entity, attributes))?
    }

    /// See [`ContextScope::update`].
    ///
    /// # Errors
    ///
    /// Returns an error if the object is not visible or the queue is closed.
    pub fn update(&self, id: ObjectId, changes: Map<String, Value>) -> Result<Record> {
        self.perform_and_wait(move |scope| scope.update(id, changes))?
    }

    /// See [`ContextScope::delete`].
    ///
    /// # Errors
    ///
    /// Returns an error if the object is not visible or the queue is closed.
    pub fn delete(&self, id: ObjectId) -> Result<()> {
        self.perform_and_wait(move |scope| scope.delete(id))?
    }

    /// See [`ContextScope::get`].
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails or the queue is closed.
    pub fn get(&self, id: ObjectId) -> Result<Option<Record>> {
        self.perform_and_wait(move |scope| scope.get(&id))?
    }

    /// See [`ContextScope::fetch`].
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails or the queue is closed.
    pub fn fetch(&self, entity: &str) -> Result<Vec<Record>> {
        let entity = entity.to_string();
        self.perform_and_wait(move |scope| scope.fetch(&entity))?
    }

    /// See [`ContextScope::count`].
    ///
    /// # Errors
    ///
    /// Returns an error if the count fails or the queue is closed.
    pub fn count(&self, entity: &str) -> Result<usize> {
        let entity = entity.to_string();
        self.perform_and_wait(move |scope| scope.count(&entity))?
    }

    /// Dirty flag, read on the context's queue.
    ///
    /// # Errors
    ///
    /// Returns `Closed` if the context has been shut down.
    pub fn has_changes(&self) -> Result<bool> {
        self.perform_and_wait(|scope| scope.has_changes())
    }

    /// See [`ContextScope::save`].
    ///
    /// # Errors
    ///
    /// Returns the save error or `Closed`.
    pub fn save(&self) -> Result<usize> {
        self.perform_and_wait(ContextScope::save)?
    }

    /// See [`ContextScope::rollback`].
    ///
    /// # Errors
    ///
    /// Returns `Closed` if the context has been shut down.
    pub fn rollback(&self) -> Result<()> {
        self.perform_and_wait(ContextScope::rollback)
    }

    /// Stop the queue after draining already scheduled jobs.
    pub fn shutdown(&self) {
        self.queue.shutdown();
    }
}

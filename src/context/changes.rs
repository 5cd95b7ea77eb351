//! Pending change sets.
//!
//! Every object appears in at most one of the three maps: inserting then
//! updating keeps it an insert, deleting an uncommitted insert forgets it.

use crate::model::{ObjectId, Record};
use std::collections::{BTreeMap, BTreeSet};

/// Uncommitted mutations of one context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub inserted: BTreeMap<ObjectId, Record>,
    pub updated: BTreeMap<ObjectId, Record>,
    pub deleted: BTreeSet<ObjectId>,
}

/// How a change set resolves one object id.
#[derive(Debug, PartialEq)]
pub enum Overlay<'a> {
    /// The change set has the current version.
    Changed(&'a Record),
    /// The object is deleted here.
    Deleted,
    /// Not touched; ask the parent.
    Untouched,
}

impl ChangeSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inserted.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inserted.len() + self.updated.len() + self.deleted.len()
    }

    pub fn insert(&mut self, record: Record) {
        if self.deleted.remove(&record.id) {
            self.updated.insert(record.id, record);
        } else {
            self.inserted.insert(record.id, record);
        }
    }

    pub fn update(&mut self, record: Record) {
        if let Some(slot) = self.inserted.get_mut(&record.id) {
            *slot = record;
        } else {
            self.deleted.remove(&record.id);
            self.updated.insert(record.id, record);
        }
    }

    pub fn delete(&mut self, id: ObjectId) {
        if self.inserted.remove(&id).is_none() {
            self.updated.remove(&id);
            self.deleted.insert(id);
        }
    }

    /// Fold a child's committed changes into this set.
    pub fn merge(&mut self, child: ChangeSet) {
        for record in child.inserted.into_values() {
            self.insert(record);
        }
        for record in child.updated.into_values() {
            self.update(record);
        }
        for id in child.deleted {
            self.delete(id);
        }
    }

    #[must_use]
    pub fn overlay(&self, id: &ObjectId) -> Overlay<'_> {
        if self.deleted.contains(id) {
            Overlay::Deleted
        } else if let Some(record) = self.inserted.get(id).or_else(|| self.updated.get(id)) {
            Overlay::Changed(record)
        } else {
            Overlay::Untouched
        }
    }

    /// Apply this change set over the parent's view of one entity.
    #[must_use]
    pub fn overlay_entity(&self, entity: &str, base: Vec<Record>) -> Vec<Record> {
        let mut records: Vec<Record> = base
            .into_iter()
            .filter(|r| !self.deleted.contains(&r.id))
            .map(|r| match self.updated.get(&r.id) {
                Some(changed) => changed.clone(),
                None => r,
            })
            .collect();

        let present: BTreeSet<ObjectId> = records.iter().map(|r| r.id).collect();
        records.extend(
            self.inserted
                .values()
                .chain(self.updated.values())
                .filter(|r| r.entity == entity && !present.contains(&r.id))
                .cloned(),
        );
        records
    }

    /// Records that need to pass validation before this set is saved.
    pub fn upserts(&self) -> impl Iterator<Item = &Record> {
        self.inserted.values().chain(self.updated.values())
    }
}

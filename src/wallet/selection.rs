//! Single-selection bookkeeping
//!
//! Each selectable collection has one pointer in the `selected` collection
//! naming its active label. The pointer is the source of truth; the
//! `selected` flag on records is a projection that is rewritten whenever the
//! pointer moves and recomputed on every read.
//!
//! Moving the pointer (deselect old, point at new, mark new) and removing a
//! selected record (delete, clear pointer) each happen in one store commit,
//! so a failure part-way never leaves two records marked or a dangling pointer.

use crate::store::{EntityStore, Record, StoreTxn};
use crate::{Error, Result};

/// A record type that participates in single selection
pub trait Selectable: Record {
    /// Key of this type's pointer in the `selected` collection
    const ROLE: &'static str;
    /// Human name used in errors
    const KIND: &'static str;

    fn set_selected(&mut self, selected: bool);
}

/// Maintains the "at most one selected" invariant on top of the store
pub struct SelectionManager<'s> {
    store: &'s EntityStore,
}

impl<'s> SelectionManager<'s> {
    pub fn new(store: &'s EntityStore) -> Self {
        Self { store }
    }

    /// Make `label` the active record of its collection
    pub fn select<R: Selectable>(&self, label: &str) -> Result<R> {
        let record = self.store.atomic(|txn| select_in::<R>(txn, label))?;
        tracing::info!(kind = R::KIND, label = %label, "Selected");
        Ok(record)
    }

    /// Persist a new record and make it the active one, in one commit
    pub fn insert_and_select<R: Selectable>(&self, record: &R) -> Result<R> {
        let label = record.label().to_string();
        let record = self.store.atomic(|txn| {
            txn.put(record)?;
            select_in::<R>(txn, &label)
        })?;
        tracing::info!(kind = R::KIND, label = %label, "Added and selected");
        Ok(record)
    }

    /// The currently selected record
    ///
    /// Fails with `NothingSelected` when no pointer is stored and with
    /// `NotFound` if the pointer names a record that no longer exists.
    pub fn selected<R: Selectable>(&self) -> Result<R> {
        self.store.read(|view| {
            let label = view
                .selection(R::ROLE)?
                .ok_or(Error::NothingSelected(R::KIND))?;
            let mut record: R = view.get(&label)?;
            record.set_selected(true);
            Ok(record)
        })
    }

    /// Label of the selected record, if any
    pub fn selected_label<R: Selectable>(&self) -> Result<Option<String>> {
        self.store.selection(R::ROLE)
    }

    /// Fetch one record with its `selected` flag projected from the pointer
    pub fn get<R: Selectable>(&self, label: &str) -> Result<R> {
        self.store.read(|view| {
            let mut record: R = view.get(label)?;
            let selected = view.selection(R::ROLE)?;
            record.set_selected(selected.as_deref() == Some(label));
            Ok(record)
        })
    }

    /// All records with their `selected` flag projected from the pointer
    pub fn list<R: Selectable>(&self) -> Result<Vec<R>> {
        let mut records = self.store.list::<R>()?;
        let selected = self.store.selection(R::ROLE)?;
        for record in &mut records {
            let is_selected = selected.as_deref() == Some(record.label());
            record.set_selected(is_selected);
        }
        Ok(records)
    }

    /// Delete a record, clearing the pointer in the same commit if it named it
    ///
    /// Fails with `NotFound` if the label does not exist.
    pub fn remove<R: Selectable>(&self, label: &str) -> Result<()> {
        let cleared = self.store.atomic(|txn| {
            if !txn.contains::<R>(label)? {
                return Err(Error::NotFound {
                    collection: R::COLLECTION,
                    label: label.to_string(),
                });
            }
            txn.delete::<R>(label)?;
            if txn.selection(R::ROLE)?.as_deref() == Some(label) {
                txn.clear_selection(R::ROLE)?;
                return Ok(true);
            }
            Ok(false)
        })?;

        tracing::info!(kind = R::KIND, label = %label, cleared_selection = cleared, "Removed");
        Ok(())
    }
}

fn select_in<R: Selectable>(txn: &mut StoreTxn<'_>, label: &str) -> Result<R> {
    let mut target: R = txn.get(label)?;

    if let Some(previous) = txn.selection(R::ROLE)? {
        if previous != label {
            match txn.get::<R>(&previous) {
                Ok(mut record) => {
                    record.set_selected(false);
                    txn.upsert(&record)?;
                }
                Err(Error::NotFound { .. }) => {
                    tracing::warn!(kind = R::KIND, label = %previous, "Previous selection no longer exists");
                }
                Err(e) => return Err(e),
            }
        }
    }

    txn.set_selection(R::ROLE, label)?;
    target.set_selected(true);
    txn.upsert(&target)?;
    Ok(target)
}

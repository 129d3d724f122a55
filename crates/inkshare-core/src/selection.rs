//! Local selection set.

use crate::element::ElementId;
use crate::store::DocumentStore;
use kurbo::Rect;
use std::collections::{BTreeMap, BTreeSet};

/// Ids of the locally selected elements.
///
/// Only the reconciliation engine changes the selection, and it prunes it
/// whenever a member disappears, so it stays a subset of the live elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: BTreeSet<ElementId>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the selection.
    pub fn replace(&mut self, ids: impl IntoIterator<Item = ElementId>) {
        self.ids = ids.into_iter().collect();
    }

    /// Union with `ids`.
    pub fn extend(&mut self, ids: impl IntoIterator<Item = ElementId>) {
        self.ids.extend(ids);
    }

    /// Remove `ids` from the selection.
    pub fn subtract(&mut self, ids: impl IntoIterator<Item = ElementId>) {
        for id in ids {
            self.ids.remove(&id);
        }
    }

    /// Follow moved elements from their old to their new ids.
    pub fn remap(&mut self, moves: &BTreeMap<ElementId, ElementId>) {
        if moves.is_empty() {
            return;
        }
        self.ids = self
            .ids
            .iter()
            .map(|id| moves.get(id).copied().unwrap_or(*id))
            .collect();
    }

    /// Drop every id the store no longer has.
    pub fn retain_live(&mut self, store: &DocumentStore) {
        self.ids.retain(|id| store.contains(*id));
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.ids.contains(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.ids.iter().copied()
    }

    pub fn ids(&self) -> &BTreeSet<ElementId> {
        &self.ids
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Combined bounds of the selected elements.
    pub fn bounds(&self, store: &DocumentStore) -> Option<Rect> {
        self.ids
            .iter()
            .filter_map(|id| store.get(*id))
            .map(|e| e.bounds())
            .reduce(|acc, b| acc.union(b))
    }
}

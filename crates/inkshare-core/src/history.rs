//! Undo/redo history of server-confirmed local changes.
//!
//! Entries only ever record what the server confirmed for this client. They
//! reference live elements by id; only [`HistoryEntry::Deleted`] keeps full
//! copies, because the live elements are gone by the time it is recorded.

use crate::element::{Element, ElementId};
use crate::store::DocumentStore;
use kurbo::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Default maximum number of entries per stack.
pub const MAX_UNDO_HISTORY: usize = 50;

/// An old/new id pair produced by a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovePair {
    pub old: ElementId,
    pub new: ElementId,
}

impl MovePair {
    pub fn new(old: ElementId, new: ElementId) -> Self {
        Self { old, new }
    }
}

/// One undoable change.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryEntry {
    /// Elements this client added.
    Added { ids: BTreeSet<ElementId> },
    /// Elements this client deleted, as they were at deletion time.
    Deleted { elements: Vec<Element> },
    /// Elements this client moved; `offset` was subtracted from their geometry.
    Moved { pairs: Vec<MovePair>, offset: Vec2 },
}

impl HistoryEntry {
    /// The entry with every reference to `removed` dropped.
    ///
    /// Returns `None` when nothing is left to undo.
    pub fn without(&self, removed: &BTreeSet<ElementId>) -> Option<HistoryEntry> {
        match self {
            HistoryEntry::Added { ids } => {
                let ids: BTreeSet<_> = ids.difference(removed).copied().collect();
                (!ids.is_empty()).then_some(HistoryEntry::Added { ids })
            }
            HistoryEntry::Deleted { .. } => Some(self.clone()),
            HistoryEntry::Moved { pairs, offset } => {
                let pairs: Vec<_> = pairs
                    .iter()
                    .filter(|p| !removed.contains(&p.new))
                    .copied()
                    .collect();
                (!pairs.is_empty()).then_some(HistoryEntry::Moved {
                    pairs,
                    offset: *offset,
                })
            }
        }
    }

    /// The entry with ids retired by a move replaced by their successors.
    pub fn remapped(&self, moves: &BTreeMap<ElementId, ElementId>) -> HistoryEntry {
        let follow = |id: &ElementId| moves.get(id).copied().unwrap_or(*id);
        match self {
            HistoryEntry::Added { ids } => HistoryEntry::Added {
                ids: ids.iter().map(follow).collect(),
            },
            HistoryEntry::Deleted { .. } => self.clone(),
            HistoryEntry::Moved { pairs, offset } => HistoryEntry::Moved {
                pairs: pairs
                    .iter()
                    .map(|p| MovePair::new(p.old, follow(&p.new)))
                    .collect(),
                offset: *offset,
            },
        }
    }

    /// Ids of live elements this entry would act on when inverted.
    pub fn live_ids(&self) -> Vec<ElementId> {
        match self {
            HistoryEntry::Added { ids } => ids.iter().copied().collect(),
            HistoryEntry::Deleted { .. } => Vec::new(),
            HistoryEntry::Moved { pairs, .. } => pairs.iter().map(|p| p.new).collect(),
        }
    }
}

/// Which stack an entry goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stack {
    Undo,
    Redo,
}

impl Stack {
    /// Events produced by an undo land on the redo stack; everything else on undo.
    pub fn for_undo_flag(undo: bool) -> Self {
        if undo {
            Stack::Redo
        } else {
            Stack::Undo
        }
    }
}

/// Undo and redo stacks; the last element of each is the most recent.
#[derive(Debug, Clone)]
pub struct History {
    undo: Vec<HistoryEntry>,
    redo: Vec<HistoryEntry>,
    limit: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(MAX_UNDO_HISTORY)
    }
}

impl History {
    /// Create empty stacks holding at most `limit` entries each.
    pub fn new(limit: usize) -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
            limit: limit.max(1),
        }
    }

    pub fn push(&mut self, stack: Stack, entry: HistoryEntry) {
        let limit = self.limit;
        let entries = self.stack_mut(stack);
        entries.push(entry);
        if entries.len() > limit {
            entries.remove(0);
        }
    }

    pub fn pop(&mut self, stack: Stack) -> Option<HistoryEntry> {
        self.stack_mut(stack).pop()
    }

    fn stack_mut(&mut self, stack: Stack) -> &mut Vec<HistoryEntry> {
        match stack {
            Stack::Undo => &mut self.undo,
            Stack::Redo => &mut self.redo,
        }
    }

    /// Entries of a stack, oldest first.
    pub fn entries(&self, stack: Stack) -> &[HistoryEntry] {
        match stack {
            Stack::Undo => &self.undo,
            Stack::Redo => &self.redo,
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn clear_redo(&mut self) {
        self.redo.clear();
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    /// Drop references to deleted elements from both stacks.
    pub fn prune(&mut self, removed: &BTreeSet<ElementId>) {
        if removed.is_empty() {
            return;
        }
        self.rebuild(|entry| entry.without(removed));
    }

    /// Follow moved elements in both stacks.
    pub fn remap(&mut self, moves: &BTreeMap<ElementId, ElementId>) {
        if moves.is_empty() {
            return;
        }
        self.rebuild(|entry| Some(entry.remapped(moves)));
    }

    /// Drop references to anything the store no longer has.
    pub fn retain_live(&mut self, store: &DocumentStore) {
        self.rebuild(|entry| {
            let dead: BTreeSet<_> = entry
                .live_ids()
                .into_iter()
                .filter(|id| !store.contains(*id))
                .collect();
            if dead.is_empty() {
                Some(entry.clone())
            } else {
                entry.without(&dead)
            }
        });
    }

    fn rebuild(&mut self, f: impl Fn(&HistoryEntry) -> Option<HistoryEntry>) {
        self.undo = self.undo.iter().filter_map(&f).collect();
        self.redo = self.redo.iter().filter_map(&f).collect();
    }
}

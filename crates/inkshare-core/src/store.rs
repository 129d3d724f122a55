//! Document store: the element table as last confirmed by the server.

use crate::element::{Element, ElementId};
use kurbo::{Rect, Vec2};
use std::collections::BTreeMap;

/// All live elements, keyed and ordered by id.
///
/// Ids are handed out in creation order, so iteration order is also the
/// back-to-front drawing order.
#[derive(Debug, Clone, Default)]
pub struct DocumentStore {
    elements: BTreeMap<ElementId, Element>,
}

impl DocumentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an element, returning the element it replaced under the same id.
    pub fn insert(&mut self, element: Element) -> Option<Element> {
        self.elements.insert(element.id, element)
    }

    /// Remove an element, handing back its full state.
    pub fn remove(&mut self, id: ElementId) -> Option<Element> {
        self.elements.remove(&id)
    }

    /// Retire `old_id` and install a copy under `new_id` translated by `-offset`.
    ///
    /// Returns false, leaving the store untouched, when `old_id` is unknown.
    pub fn move_element(&mut self, old_id: ElementId, new_id: ElementId, offset: Vec2) -> bool {
        let Some(old) = self.elements.remove(&old_id) else {
            return false;
        };
        let moved = old.translated(new_id, -offset);
        self.elements.insert(new_id, moved);
        true
    }

    /// Replace the whole table, as on (re)connect.
    pub fn replace_all(&mut self, elements: impl IntoIterator<Item = Element>) {
        self.elements = elements.into_iter().map(|e| (e.id, e)).collect();
    }

    /// Clear all elements.
    pub fn clear(&mut self) {
        self.elements.clear();
    }

    /// Get an element by id.
    pub fn get(&self, id: ElementId) -> Option<&Element> {
        self.elements.get(&id)
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.elements.contains_key(&id)
    }

    /// Elements in drawing order (back to front).
    pub fn iter(&self) -> impl Iterator<Item = &Element> {
        self.elements.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.elements.keys().copied()
    }

    /// Clones of the listed elements that are still live, in id order of the input.
    pub fn snapshot(&self, ids: impl IntoIterator<Item = ElementId>) -> Vec<Element> {
        ids.into_iter()
            .filter_map(|id| self.elements.get(&id).cloned())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Get the bounding box of all elements.
    pub fn bounds(&self) -> Option<Rect> {
        self.elements
            .values()
            .map(Element::bounds)
            .reduce(|acc, b| acc.union(b))
    }

    /// Elements whose bounds intersect `rect`, for viewport culling.
    pub fn visible_in(&self, rect: Rect) -> impl Iterator<Item = &Element> {
        self.elements.values().filter(move |e| {
            let b = e.bounds();
            b.x0 <= rect.x1 && b.x1 >= rect.x0 && b.y0 <= rect.y1 && b.y1 >= rect.y0
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{ElementStyle, Shape};
    use kurbo::Point;

    fn line(id: ElementId, x0: f64, y0: f64, x1: f64, y1: f64) -> Element {
        Element::new(
            id,
            Shape::Line {
                start: Point::new(x0, y0),
                end: Point::new(x1, y1),
            },
            ElementStyle::default(),
        )
    }

    #[test]
    fn test_store_creation() {
        let store = DocumentStore::new();
        assert!(store.is_empty());
        assert!(store.bounds().is_none());
    }

    #[test]
    fn test_insert_and_remove() {
        let mut store = DocumentStore::new();
        store.insert(line(3, 0.0, 0.0, 10.0, 10.0));
        assert_eq!(store.len(), 1);
        assert!(store.contains(3));

        let removed = store.remove(3).unwrap();
        assert_eq!(removed.id, 3);
        assert!(store.is_empty());
        assert!(store.remove(3).is_none());
    }

    #[test]
    fn test_iteration_in_id_order() {
        let mut store = DocumentStore::new();
        store.insert(line(9, 0.0, 0.0, 1.0, 1.0));
        store.insert(line(2, 0.0, 0.0, 1.0, 1.0));
        store.insert(line(5, 0.0, 0.0, 1.0, 1.0));
        assert_eq!(store.ids().collect::<Vec<_>>(), vec![2, 5, 9]);
    }

    #[test]
    fn test_move_element() {
        let mut store = DocumentStore::new();
        store.insert(line(3, 0.0, 0.0, 10.0, 10.0));

        assert!(store.move_element(3, 9, Vec2::new(10.0, -4.0)));
        assert!(!store.contains(3));
        let moved = store.get(9).unwrap();
        assert_eq!(moved.bounds(), Rect::new(-10.0, 4.0, 0.0, 14.0));

        assert!(!store.move_element(3, 10, Vec2::new(1.0, 1.0)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_replace_all() {
        let mut store = DocumentStore::new();
        store.insert(line(1, 0.0, 0.0, 1.0, 1.0));
        store.replace_all(vec![line(4, 0.0, 0.0, 1.0, 1.0), line(6, 2.0, 2.0, 3.0, 3.0)]);
        assert_eq!(store.ids().collect::<Vec<_>>(), vec![4, 6]);
        assert_eq!(store.bounds(), Some(Rect::new(0.0, 0.0, 3.0, 3.0)));
    }

    #[test]
    fn test_visible_in() {
        let mut store = DocumentStore::new();
        store.insert(line(1, 0.0, 0.0, 10.0, 10.0));
        store.insert(line(2, 100.0, 100.0, 110.0, 100.0));

        let visible: Vec<_> = store
            .visible_in(Rect::new(-5.0, -5.0, 50.0, 50.0))
            .map(|e| e.id)
            .collect();
        assert_eq!(visible, vec![1]);
    }
}

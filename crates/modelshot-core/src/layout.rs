//! Diagram layouts and their normalization.
//!
//! A [`Layout`] maps content-type ids to the 2-D position of their card on
//! the canvas. Layouts are stored normalized: the bounding box of all
//! positions starts at the origin, so a diagram dragged around as a whole
//! compares equal to its previous placement.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{
    geometry::{Bounds, Point},
    graph::ContentGraph,
};

/// Positions of the content types in a diagram.
///
/// Serialized as `{"contentTypes": {"<id>": {"x": .., "y": ..}}}`. Entries
/// are kept ordered by id, so two layouts with the same positions are equal
/// regardless of the order they were written in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    content_types: BTreeMap<String, Point>,
}

impl Layout {
    /// Creates an empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the position of a node, replacing any previous one.
    pub fn insert(&mut self, node_id: impl Into<String>, position: Point) {
        self.content_types.insert(node_id.into(), position);
    }

    /// Returns the position of a node.
    pub fn get(&self, node_id: &str) -> Option<Point> {
        self.content_types.get(node_id).copied()
    }

    pub fn len(&self) -> usize {
        self.content_types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content_types.is_empty()
    }

    /// Iterates over `(node id, position)` pairs ordered by node id.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Point)> {
        self.content_types.iter().map(|(id, p)| (id.as_str(), *p))
    }

    /// Returns the bounding box of all positions, or `None` when empty.
    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::enclosing(self.content_types.values().copied())
    }

    /// Returns a copy of this layout shifted so the smallest x and the
    /// smallest y across all entries are both zero.
    ///
    /// The key set is preserved. An empty layout has no minimum and is
    /// returned unchanged. Normalizing an already-normalized layout returns
    /// an equal layout.
    ///
    /// # Examples
    ///
    /// ```
    /// use modelshot_core::{geometry::Point, layout::Layout};
    ///
    /// let layout: Layout = [("A", Point::new(10.0, 5.0)), ("B", Point::new(20.0, 5.0))]
    ///     .into_iter()
    ///     .collect();
    /// let normalized = layout.normalize();
    ///
    /// assert_eq!(normalized.get("A"), Some(Point::new(0.0, 0.0)));
    /// assert_eq!(normalized.get("B"), Some(Point::new(10.0, 0.0)));
    /// ```
    pub fn normalize(&self) -> Layout {
        let Some(bounds) = self.bounds() else {
            return self.clone();
        };
        let origin = bounds.min_point();

        Layout {
            content_types: self
                .content_types
                .iter()
                .map(|(id, position)| (id.clone(), position.sub_point(origin)))
                .collect(),
        }
    }

    /// Returns true if the layout's bounding box already starts at the origin.
    pub fn is_normalized(&self) -> bool {
        self.bounds().is_none_or(|bounds| bounds.min_point().is_zero())
    }

    /// Graph nodes that have no position in this layout.
    pub fn unpositioned_nodes<'a>(&self, graph: &'a ContentGraph) -> Vec<&'a str> {
        graph
            .node_ids()
            .filter(|id| !self.content_types.contains_key(*id))
            .collect()
    }

    /// Positioned ids that do not name a node in the graph.
    pub fn stray_positions(&self, graph: &ContentGraph) -> Vec<&str> {
        let known: BTreeSet<&str> = graph.node_ids().collect();
        self.content_types
            .keys()
            .map(String::as_str)
            .filter(|id| !known.contains(id))
            .collect()
    }
}

impl<K: Into<String>> FromIterator<(K, Point)> for Layout {
    fn from_iter<T: IntoIterator<Item = (K, Point)>>(iter: T) -> Self {
        Self {
            content_types: iter.into_iter().map(|(k, p)| (k.into(), p)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::assert_approx_eq;
    use proptest::prelude::*;

    use super::*;

    fn layout(entries: &[(&str, f64, f64)]) -> Layout {
        entries
            .iter()
            .map(|(id, x, y)| (*id, Point::new(*x, *y)))
            .collect()
    }

    #[test]
    fn test_normalize_shifts_to_origin() {
        let normalized = layout(&[("A", 10.0, 5.0), ("B", 20.0, 5.0)]).normalize();
        assert_eq!(normalized, layout(&[("A", 0.0, 0.0), ("B", 10.0, 0.0)]));
    }

    #[test]
    fn test_normalize_handles_negative_coordinates() {
        let normalized = layout(&[("A", -40.5, 12.0), ("B", 3.0, -8.0)]).normalize();

        let a = normalized.get("A").unwrap();
        let b = normalized.get("B").unwrap();
        assert_approx_eq!(f64, a.x(), 0.0);
        assert_approx_eq!(f64, a.y(), 20.0);
        assert_approx_eq!(f64, b.x(), 43.5);
        assert_approx_eq!(f64, b.y(), 0.0);
    }

    #[test]
    fn test_normalize_empty_layout_is_unchanged() {
        let empty = Layout::new();
        assert_eq!(empty.normalize(), empty);
        assert!(empty.is_normalized());
    }

    #[test]
    fn test_normalize_single_node() {
        let normalized = layout(&[("Only", 250.0, -75.0)]).normalize();
        assert_eq!(normalized, layout(&[("Only", 0.0, 0.0)]));
    }

    #[test]
    fn test_equality_ignores_insertion_order() {
        let first = layout(&[("A", 1.0, 2.0), ("B", 3.0, 4.0)]);
        let second = layout(&[("B", 3.0, 4.0), ("A", 1.0, 2.0)]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_serde_uses_content_types_key() {
        let json = serde_json::to_value(layout(&[("A", 0.0, 10.0)])).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"contentTypes": {"A": {"x": 0.0, "y": 10.0}}})
        );
    }

    #[test]
    fn test_cross_reference_helpers() {
        let graph: ContentGraph = serde_json::from_value(serde_json::json!([
            {"sys": {"id": "A"}, "name": "A", "fields": []},
            {"sys": {"id": "B"}, "name": "B", "fields": []}
        ]))
        .unwrap();
        let positions = layout(&[("A", 0.0, 0.0), ("Z", 5.0, 5.0)]);

        assert_eq!(positions.unpositioned_nodes(&graph), vec!["B"]);
        assert_eq!(positions.stray_positions(&graph), vec!["Z"]);
    }

    fn arb_layout() -> impl Strategy<Value = Layout> {
        prop::collection::btree_map(
            "[a-zA-Z][a-zA-Z0-9]{0,8}",
            (-100_000i32..100_000, -100_000i32..100_000),
            1..24,
        )
        .prop_map(|entries| {
            entries
                .into_iter()
                .map(|(id, (x, y))| (id, Point::new(f64::from(x), f64::from(y))))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_normalize_is_idempotent(layout in arb_layout()) {
            let once = layout.normalize();
            prop_assert_eq!(once.normalize(), once);
        }

        #[test]
        fn prop_normalized_minimums_are_zero(layout in arb_layout()) {
            let bounds = layout.normalize().bounds().unwrap();
            prop_assert_eq!(bounds.min_point().x(), 0.0);
            prop_assert_eq!(bounds.min_point().y(), 0.0);
        }

        #[test]
        fn prop_normalize_preserves_keys(layout in arb_layout()) {
            let normalized = layout.normalize();
            let before: Vec<&str> = layout.iter().map(|(id, _)| id).collect();
            let after: Vec<&str> = normalized.iter().map(|(id, _)| id).collect();
            prop_assert_eq!(before, after);
        }

        #[test]
        fn prop_normalize_is_translation_invariant(
            layout in arb_layout(),
            dx in -50_000i32..50_000,
            dy in -50_000i32..50_000,
        ) {
            let offset = Point::new(f64::from(dx), f64::from(dy));
            let moved: Layout = layout
                .iter()
                .map(|(id, p)| (id.to_string(), p.add_point(offset)))
                .collect();
            prop_assert_eq!(moved.normalize(), layout.normalize());
        }
    }
}

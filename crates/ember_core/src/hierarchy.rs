//! # Entity Hierarchy
//!
//! Parent / first-child / next-sibling index arrays for entity trees.
//!
//! `INVALID_INDEX` marks a root parent link and the end of a sibling list.
//! Attaching prepends to the new parent's child list, so enumeration order
//! is the reverse of attach order. Cycles are not validated; callers must
//! not introduce them.

use crate::handle::MAX_ENTITY_INDEX;

/// Sentinel for "no entity": root parents and sibling-list ends.
pub const INVALID_INDEX: u32 = u32::MAX;

/// Intrusive tree links, one slot per entity index.
pub struct Hierarchy {
    parent: Box<[u32]>,
    first_child: Box<[u32]>,
    next_sibling: Box<[u32]>,
}

impl Hierarchy {
    /// Creates link storage for `capacity` entity slots, all roots.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or exceeds the entity index space.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be greater than zero");
        assert!(
            capacity <= MAX_ENTITY_INDEX as usize + 1,
            "capacity cannot exceed the 24-bit index space"
        );

        Self {
            parent: vec![INVALID_INDEX; capacity].into_boxed_slice(),
            first_child: vec![INVALID_INDEX; capacity].into_boxed_slice(),
            next_sibling: vec![INVALID_INDEX; capacity].into_boxed_slice(),
        }
    }

    /// Returns the parent index of `child`, or `INVALID_INDEX` for roots.
    #[inline]
    #[must_use]
    pub fn parent(&self, child: u32) -> u32 {
        self.parent[child as usize]
    }

    /// Attaches `child` under `parent`, unlinking it from any previous
    /// parent first. The child becomes the head of the parent's child list.
    pub fn attach(&mut self, child: u32, parent: u32) {
        self.unlink(child);
        self.parent[child as usize] = parent;
        self.next_sibling[child as usize] = self.first_child[parent as usize];
        self.first_child[parent as usize] = child;
    }

    /// Detaches `child` from its parent, making it a root.
    pub fn set_root(&mut self, child: u32) {
        self.unlink(child);
        self.parent[child as usize] = INVALID_INDEX;
        self.next_sibling[child as usize] = INVALID_INDEX;
    }

    /// Removes `child` from its current parent's sibling list, if any.
    ///
    /// Linear in the number of siblings.
    fn unlink(&mut self, child: u32) {
        let parent = self.parent[child as usize];
        if parent == INVALID_INDEX {
            return;
        }

        let mut cursor = self.first_child[parent as usize];
        if cursor == child {
            self.first_child[parent as usize] = self.next_sibling[child as usize];
            return;
        }

        while cursor != INVALID_INDEX {
            let next = self.next_sibling[cursor as usize];
            if next == child {
                self.next_sibling[cursor as usize] = self.next_sibling[child as usize];
                return;
            }
            cursor = next;
        }
    }

    /// Iterates the child indices of `parent`, most recently attached
    /// first.
    pub fn children(&self, parent: u32) -> ChildIter<'_> {
        ChildIter {
            hierarchy: self,
            cursor: self.first_child[parent as usize],
        }
    }
}

/// Iterator over a parent's child indices.
pub struct ChildIter<'a> {
    hierarchy: &'a Hierarchy,
    cursor: u32,
}

impl Iterator for ChildIter<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.cursor == INVALID_INDEX {
            return None;
        }
        let current = self.cursor;
        self.cursor = self.hierarchy.next_sibling[current as usize];
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(h: &Hierarchy, parent: u32) -> Vec<u32> {
        h.children(parent).collect()
    }

    #[test]
    fn test_attach_prepends() {
        let mut h = Hierarchy::new(8);
        h.attach(1, 0);
        h.attach(2, 0);
        h.attach(3, 0);

        assert_eq!(collect(&h, 0), vec![3, 2, 1]);
        assert_eq!(h.parent(1), 0);
        assert_eq!(h.parent(0), INVALID_INDEX);
    }

    #[test]
    fn test_reattach_moves_between_parents() {
        // p gets c1, c2, c3; c2 then moves under p'.
        let mut h = Hierarchy::new(8);
        let (p, p2, c1, c2, c3) = (0, 1, 2, 3, 4);
        h.attach(c1, p);
        h.attach(c2, p);
        h.attach(c3, p);

        h.attach(c2, p2);

        assert_eq!(collect(&h, p), vec![c3, c1]);
        assert_eq!(collect(&h, p2), vec![c2]);
        assert_eq!(h.parent(c2), p2);
    }

    #[test]
    fn test_set_root_unlinks() {
        let mut h = Hierarchy::new(8);
        h.attach(1, 0);
        h.attach(2, 0);

        h.set_root(2);
        assert_eq!(collect(&h, 0), vec![1]);
        assert_eq!(h.parent(2), INVALID_INDEX);

        // Unlinking a root is a no-op.
        h.set_root(2);
        assert_eq!(h.parent(2), INVALID_INDEX);
    }

    #[test]
    fn test_unlink_middle_of_sibling_list() {
        let mut h = Hierarchy::new(8);
        for c in 1..=4 {
            h.attach(c, 0);
        }
        // List is [4, 3, 2, 1]; remove 2 from the middle.
        h.set_root(2);
        assert_eq!(collect(&h, 0), vec![4, 3, 1]);
    }

    #[test]
    fn test_children_matches_parent_links() {
        // Property: children(p) yields exactly the set {c : parent(c) == p},
        // once each, newest first.
        let mut h = Hierarchy::new(16);
        let mut expected: Vec<u32> = Vec::new();

        for c in [5, 9, 3, 12, 7] {
            h.attach(c, 2);
            expected.insert(0, c);
        }
        h.attach(9, 4); // move one away
        expected.retain(|&c| c != 9);

        assert_eq!(collect(&h, 2), expected);
        for &c in &expected {
            assert_eq!(h.parent(c), 2);
        }
    }
}

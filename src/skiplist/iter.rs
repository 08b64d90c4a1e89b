use std::ptr;

use super::{Node, SkipList};
use crate::cmp::Comparator;

/// Cursor over a skiplist. Lock-free, may run while the writer inserts;
/// nodes linked after a step may or may not be observed.
pub struct Iter<'a, K, C, R> {
    list: &'a SkipList<K, C, R>,
    node: *mut Node<K>,
}

impl<'a, K, C: Comparator<K>, R> Iter<'a, K, C, R> {
    pub(super) fn new(list: &'a SkipList<K, C, R>) -> Self {
        Iter {
            list,
            node: ptr::null_mut(),
        }
    }

    pub fn valid(&self) -> bool {
        !self.node.is_null()
    }

    pub fn key(&self) -> &'a K {
        assert!(self.valid());
        unsafe { Node::key(self.node) }
    }

    pub fn next(&mut self) {
        assert!(self.valid());
        self.node = unsafe { Node::next(self.node, 0) };
    }

    pub fn prev(&mut self) {
        assert!(self.valid());
        let node = self.list.find_less_than(self.key());
        self.node = self.not_head(node);
    }

    /// Positions at the first key not less than `target`.
    pub fn seek(&mut self, target: &K) {
        self.node = self.list.find_greater_or_equal(target, None);
    }

    pub fn seek_to_first(&mut self) {
        self.node = unsafe { Node::next(self.list.head, 0) };
    }

    pub fn seek_to_last(&mut self) {
        let node = self.list.find_last();
        self.node = self.not_head(node);
    }

    fn not_head(&self, node: *mut Node<K>) -> *mut Node<K> {
        if node == self.list.head {
            ptr::null_mut()
        } else {
            node
        }
    }
}

/// Iterator over keys in comparator order, starting from the first node.
pub struct Keys<'a, K, C, R> {
    iter: Iter<'a, K, C, R>,
}

impl<'a, K, C: Comparator<K>, R> Keys<'a, K, C, R> {
    pub(super) fn new(list: &'a SkipList<K, C, R>) -> Self {
        let mut iter = Iter::new(list);
        iter.seek_to_first();
        Keys { iter }
    }
}

impl<'a, K, C: Comparator<K>, R> Iterator for Keys<'a, K, C, R> {
    type Item = &'a K;

    fn next(&mut self) -> Option<&'a K> {
        if !self.iter.valid() {
            return None;
        }
        let key = self.iter.key();
        self.iter.next();
        Some(key)
    }
}

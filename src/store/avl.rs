//! Height-balanced binary search tree.
//!
//! Every subtree is owned by its parent slot. Structural operations take a
//! subtree by value and hand back its (possibly new) root, which the caller
//! stores back into the slot it came from, so rotations never need parent
//! pointers.
//!
//! Invariants, for every node:
//!
//! - in-order traversal yields strictly ascending comparator order
//! - `|height(left) - height(right)| <= 1`
//! - `height = 1 + max(height(left), height(right))`, an empty subtree being `-1`

use std::cmp::{self, Ordering};

use super::Store;
use crate::comparator::{Comparator, Record};

type Link<E> = Option<Box<Node<E>>>;

#[derive(Debug)]
struct Node<E> {
    element: E,
    height: i32,
    left: Link<E>,
    right: Link<E>,
}

impl<E> Node<E> {
    fn leaf(element: E) -> Box<Self> {
        Box::new(Node {
            element,
            height: 0,
            left: None,
            right: None,
        })
    }

    fn update_height(&mut self) {
        self.height = 1 + cmp::max(height(&self.left), height(&self.right));
    }

    fn balance_factor(&self) -> i32 {
        height(&self.left) - height(&self.right)
    }
}

fn height<E>(link: &Link<E>) -> i32 {
    link.as_ref().map_or(-1, |node| node.height)
}

// The left child becomes the subtree root.
fn rotate_right<E>(mut k1: Box<Node<E>>) -> Box<Node<E>> {
    let Some(mut k2) = k1.left.take() else {
        return k1;
    };
    k1.left = k2.right.take();
    k1.update_height();
    k2.right = Some(k1);
    k2.update_height();
    k2
}

// The right child becomes the subtree root.
fn rotate_left<E>(mut k1: Box<Node<E>>) -> Box<Node<E>> {
    let Some(mut k2) = k1.right.take() else {
        return k1;
    };
    k1.right = k2.left.take();
    k1.update_height();
    k2.left = Some(k1);
    k2.update_height();
    k2
}

fn rebalance<E>(mut node: Box<Node<E>>) -> Box<Node<E>> {
    let factor = node.balance_factor();
    if factor > 1 {
        if node.left.as_ref().is_some_and(|left| left.balance_factor() < 0) {
            node.left = node.left.take().map(rotate_left);
        }
        node = rotate_right(node);
    } else if factor < -1 {
        if node.right.as_ref().is_some_and(|right| right.balance_factor() > 0) {
            node.right = node.right.take().map(rotate_right);
        }
        node = rotate_left(node);
    }
    node.update_height();
    node
}

/// AVL tree store.
#[derive(Debug)]
pub struct AvlStore<E: Record> {
    root: Link<E>,
    len: usize,
    comparator: Comparator<E::Key>,
}

impl<E: Record> AvlStore<E> {
    pub fn new(comparator: Comparator<E::Key>) -> Self {
        Self {
            root: None,
            len: 0,
            comparator,
        }
    }

    /// Inserts `elements` one at a time. Later duplicates of a key are dropped.
    pub fn from_elements(comparator: Comparator<E::Key>, elements: Vec<E>) -> Self {
        let mut store = Self::new(comparator);
        let total = elements.len();
        for element in elements {
            store.insert(element);
        }
        if store.len != total {
            tracing::warn!(dropped = total - store.len, "Duplicate keys in initial elements");
        }
        store
    }

    /// Height of the tree, `-1` when empty.
    pub fn height(&self) -> i32 {
        height(&self.root)
    }

    /// Visits every element in order, recursively.
    pub fn for_each(&self, mut f: impl FnMut(&E)) {
        fn walk<E>(link: &Link<E>, f: &mut impl FnMut(&E)) {
            if let Some(node) = link {
                walk(&node.left, f);
                f(&node.element);
                walk(&node.right, f);
            }
        }
        walk(&self.root, &mut f);
    }

    fn insert_at(&self, link: Link<E>, element: E) -> (Box<Node<E>>, bool) {
        let Some(mut node) = link else {
            return (Node::leaf(element), true);
        };

        let inserted = match self.comparator.compare(element.key(), node.element.key()) {
            Ordering::Less => {
                let (left, inserted) = self.insert_at(node.left.take(), element);
                node.left = Some(left);
                inserted
            }
            Ordering::Greater => {
                let (right, inserted) = self.insert_at(node.right.take(), element);
                node.right = Some(right);
                inserted
            }
            Ordering::Equal => return (node, false),
        };

        (rebalance(node), inserted)
    }

    fn remove_at(&self, link: Link<E>, key: &E::Key) -> (Link<E>, bool) {
        let Some(mut node) = link else {
            return (None, false);
        };

        let removed = match self.comparator.compare(key, node.element.key()) {
            Ordering::Less => {
                let (left, removed) = self.remove_at(node.left.take(), key);
                node.left = left;
                removed
            }
            Ordering::Greater => {
                let (right, removed) = self.remove_at(node.right.take(), key);
                node.right = right;
                removed
            }
            Ordering::Equal => match (node.left.take(), node.right.take()) {
                (Some(left), Some(right)) => {
                    let (right, successor) = take_min(right);
                    node.element = successor;
                    node.left = Some(left);
                    node.right = right;
                    true
                }
                (child, None) | (None, child) => return (child, true),
            },
        };

        if !removed {
            return (Some(node), false);
        }
        (Some(rebalance(node)), true)
    }
}

// Detaches the leftmost node of a subtree, rebalancing on the way back up.
fn take_min<E>(mut node: Box<Node<E>>) -> (Link<E>, E) {
    match node.left.take() {
        None => {
            let Node { element, right, .. } = *node;
            (right, element)
        }
        Some(left) => {
            let (left, min) = take_min(left);
            node.left = left;
            (Some(rebalance(node)), min)
        }
    }
}

impl<E: Record> Store<E> for AvlStore<E> {
    type Iter<'a>
        = Iter<'a, E>
    where
        Self: 'a,
        E: 'a;

    fn insert(&mut self, element: E) -> bool {
        let root = self.root.take();
        let (root, inserted) = self.insert_at(root, element);
        self.root = Some(root);
        if inserted {
            self.len += 1;
        }
        inserted
    }

    fn find(&self, key: &E::Key) -> Option<&E> {
        let mut link = &self.root;
        while let Some(node) = link {
            match self.comparator.compare(key, node.element.key()) {
                Ordering::Less => link = &node.left,
                Ordering::Greater => link = &node.right,
                Ordering::Equal => return Some(&node.element),
            }
        }
        None
    }

    fn find_mut(&mut self, key: &E::Key) -> Option<&mut E> {
        let comparator = &self.comparator;
        let mut current = self.root.as_deref_mut();
        while let Some(node) = current {
            match comparator.compare(key, node.element.key()) {
                Ordering::Less => current = node.left.as_deref_mut(),
                Ordering::Greater => current = node.right.as_deref_mut(),
                Ordering::Equal => return Some(&mut node.element),
            }
        }
        None
    }

    fn remove(&mut self, key: &E::Key) -> bool {
        let root = self.root.take();
        let (root, removed) = self.remove_at(root, key);
        self.root = root;
        if removed {
            self.len -= 1;
        }
        removed
    }

    fn first(&self) -> Option<&E> {
        let mut node = self.root.as_deref()?;
        while let Some(left) = node.left.as_deref() {
            node = left;
        }
        Some(&node.element)
    }

    fn next_after(&self, key: &E::Key) -> Option<&E> {
        let mut candidate = None;
        let mut link = &self.root;
        while let Some(node) = link {
            if self.comparator.compare(key, node.element.key()) == Ordering::Less {
                candidate = Some(&node.element);
                link = &node.left;
            } else {
                link = &node.right;
            }
        }
        candidate
    }

    fn len(&self) -> usize {
        self.len
    }

    fn iter(&self) -> Self::Iter<'_> {
        let mut iter = Iter { stack: Vec::new() };
        iter.push_left(&self.root);
        iter
    }
}

/// In-order iterator over an [`AvlStore`], walking with an explicit stack.
pub struct Iter<'a, E> {
    stack: Vec<&'a Node<E>>,
}

impl<'a, E> Iter<'a, E> {
    fn push_left(&mut self, mut link: &'a Link<E>) {
        while let Some(node) = link {
            self.stack.push(node);
            link = &node.left;
        }
    }
}

impl<'a, E> Iterator for Iter<'a, E> {
    type Item = &'a E;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.push_left(&node.right);
        Some(&node.element)
    }
}

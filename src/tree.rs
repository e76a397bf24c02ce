//! Path-copying search-tree algorithms, generic over the node store.
//!
//! Every mutation rebuilds the nodes on the root-to-change path and
//! aliases the subtrees hanging off it, so versions built earlier keep
//! seeing the tree they were built from. The tree is a plain binary
//! search tree without rebalancing; all walks and rebuilds use explicit
//! stacks, never native recursion, so stack depth stays flat regardless
//! of tree height.

use std::borrow::Borrow;
use std::cmp::Ordering;

use smallvec::SmallVec;

use crate::store::{Node, NodeKey, NodeStore};

/// An optional owning link to a subtree.
pub(crate) type Link<H> = Option<H>;

/// Which side of an ancestor the descent continued on.
///
/// Recording the branch during descent is what lets the rebuild run
/// without comparing node identities on the way back up.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Branch {
    Left,
    Right,
}

/// Root-to-target descent record: each strict ancestor with the side taken.
pub(crate) type PathStack<H> = SmallVec<[(H, Branch); 32]>;

/// Result of tracing a value's position from the root.
pub(crate) enum Probe<H> {
    /// The value is present; `path` holds its strict ancestors.
    Found { path: PathStack<H>, target: H },
    /// The value is absent; `path` leads to its would-be attachment point.
    Missing { path: PathStack<H> },
}

/// Traces `value` from the root, recording the descent path.
pub(crate) fn probe<T, P, Q>(store: &P, root: Link<P::Handle>, value: &Q) -> Probe<P::Handle>
where
    P: NodeStore<T>,
    T: Borrow<Q>,
    Q: Ord + ?Sized,
{
    let mut path = PathStack::new();
    let mut current = root;
    while let Some(handle) = current {
        let node = store.node(handle);
        match value.cmp(node.value.borrow()) {
            Ordering::Less => {
                path.push((handle, Branch::Left));
                current = node.left;
            }
            Ordering::Greater => {
                path.push((handle, Branch::Right));
                current = node.right;
            }
            Ordering::Equal => {
                return Probe::Found {
                    path,
                    target: handle,
                };
            }
        }
    }
    Probe::Missing { path }
}

/// Finds the node holding `value` without recording a path.
pub(crate) fn locate<T, P, Q>(store: &P, root: Link<P::Handle>, value: &Q) -> Link<P::Handle>
where
    P: NodeStore<T>,
    T: Borrow<Q>,
    Q: Ord + ?Sized,
{
    let mut current = root;
    while let Some(handle) = current {
        let node = store.node(handle);
        current = match value.cmp(node.value.borrow()) {
            Ordering::Less => node.left,
            Ordering::Greater => node.right,
            Ordering::Equal => return Some(handle),
        };
    }
    None
}

/// Minimum of the subtree under `root`.
pub(crate) fn leftmost<T, P: NodeStore<T>>(store: &P, root: Link<P::Handle>) -> Link<P::Handle> {
    let mut current = root?;
    loop {
        match store.node(current).left {
            Some(next) => current = next,
            None => return Some(current),
        }
    }
}

/// Maximum of the subtree under `root`.
pub(crate) fn rightmost<T, P: NodeStore<T>>(store: &P, root: Link<P::Handle>) -> Link<P::Handle> {
    let mut current = root?;
    loop {
        match store.node(current).right {
            Some(next) => current = next,
            None => return Some(current),
        }
    }
}

/// Smallest node strictly greater than `value`, by re-descent from the root.
///
/// Total over the whole key space: `value` does not have to be present.
/// The boundary ancestor is tracked on the way down, so no parent links
/// are needed.
pub(crate) fn successor_of<T, P>(store: &P, root: Link<P::Handle>, value: &T) -> Link<P::Handle>
where
    P: NodeStore<T>,
    T: Ord,
{
    let mut candidate = None;
    let mut current = root;
    while let Some(handle) = current {
        let node = store.node(handle);
        if *value < node.value {
            candidate = Some(handle);
            current = node.left;
        } else {
            current = node.right;
        }
    }
    candidate
}

/// Largest node strictly smaller than `value`, by re-descent from the root.
pub(crate) fn predecessor_of<T, P>(store: &P, root: Link<P::Handle>, value: &T) -> Link<P::Handle>
where
    P: NodeStore<T>,
    T: Ord,
{
    let mut candidate = None;
    let mut current = root;
    while let Some(handle) = current {
        let node = store.node(handle);
        if *value > node.value {
            candidate = Some(handle);
            current = node.right;
        } else {
            current = node.left;
        }
    }
    candidate
}

/// Rebuilds the recorded path bottom-up over a replaced subtree.
///
/// Each rebuilt ancestor owns a fresh alias of its untouched child and
/// takes ownership of the subtree built so far on the changed side. The
/// returned link owns the new top of the path; nothing along the old path
/// is modified or released here, that is the caller's root swap.
pub(crate) fn rebuild_upward<T, P>(
    store: &mut P,
    path: &[(P::Handle, Branch)],
    mut subtree: Link<P::Handle>,
) -> Link<P::Handle>
where
    P: NodeStore<T>,
    T: Clone,
{
    for &(ancestor, branch) in path.iter().rev() {
        let (kept, value) = {
            let node = store.node(ancestor);
            let kept = match branch {
                Branch::Left => node.right,
                Branch::Right => node.left,
            };
            (kept, node.value.clone())
        };
        let kept = kept.map(|handle| store.alias(handle));
        let (left, right) = match branch {
            Branch::Left => (subtree, kept),
            Branch::Right => (kept, subtree),
        };
        subtree = Some(store.adopt(Node { left, right, value }));
    }
    subtree
}

/// Adopts a leaf for `value` and rebuilds the recorded path over it.
///
/// Returns the new root link and the key of the inserted node.
pub(crate) fn insert_at<T, P>(
    store: &mut P,
    path: &[(P::Handle, Branch)],
    value: T,
) -> (Link<P::Handle>, NodeKey)
where
    P: NodeStore<T>,
    T: Clone,
{
    let leaf = store.adopt(Node::leaf(value));
    let key = store.key(leaf);
    (rebuild_upward(store, path, Some(leaf)), key)
}

/// Removes `value`, path-copying the route to it.
///
/// Returns the new root link, or `None` when the value is absent and the
/// tree must stay untouched. A target with at most one child is
/// substituted by its surviving link without allocating a node; a target
/// with two children is replaced by a node promoting its in-order
/// successor.
pub(crate) fn erase_value<T, P, Q>(
    store: &mut P,
    root: Link<P::Handle>,
    value: &Q,
) -> Option<Link<P::Handle>>
where
    P: NodeStore<T>,
    T: Clone + Borrow<Q>,
    Q: Ord + ?Sized,
{
    let Probe::Found { path, target } = probe(store, root, value) else {
        return None;
    };
    let (target_left, target_right) = {
        let node = store.node(target);
        (node.left, node.right)
    };

    let replacement = match (target_left, target_right) {
        (None, child) | (child @ Some(_), None) => child.map(|handle| store.alias(handle)),
        (Some(left), Some(right)) => Some(promote_successor(store, left, right)),
    };
    Some(rebuild_upward(store, &path, replacement))
}

/// Builds the node replacing an erased target that had two children.
///
/// The in-order successor is the leftmost node of `right`. When `right`
/// itself is the successor, a single new node absorbs the target's left
/// subtree. Otherwise the successor is unhooked from the left spine of
/// `right` and that spine is rebuilt bottom-up before the promotion.
fn promote_successor<T, P>(store: &mut P, left: P::Handle, right: P::Handle) -> P::Handle
where
    P: NodeStore<T>,
    T: Clone,
{
    if store.node(right).left.is_none() {
        let (kept_right, value) = {
            let node = store.node(right);
            (node.right, node.value.clone())
        };
        let kept_right = kept_right.map(|handle| store.alias(handle));
        let kept_left = Some(store.alias(left));
        store.adopt(Node {
            left: kept_left,
            right: kept_right,
            value,
        })
    } else {
        let mut spine = PathStack::new();
        let mut current = right;
        loop {
            match store.node(current).left {
                Some(next) => {
                    spine.push((current, Branch::Left));
                    current = next;
                }
                None => break,
            }
        }
        let successor = current;
        let (successor_right, value) = {
            let node = store.node(successor);
            (node.right, node.value.clone())
        };
        let successor_right = successor_right.map(|handle| store.alias(handle));
        let new_right = rebuild_upward(store, &spine, successor_right);
        let kept_left = Some(store.alias(left));
        store.adopt(Node {
            left: kept_left,
            right: new_right,
            value,
        })
    }
}

/// Collects every value under `root` in ascending order.
pub(crate) fn in_order_values<T, P>(store: &P, root: Link<P::Handle>) -> Vec<T>
where
    P: NodeStore<T>,
    T: Clone,
{
    let mut values = Vec::new();
    let mut stack: SmallVec<[P::Handle; 32]> = SmallVec::new();
    let mut current = root;
    loop {
        while let Some(handle) = current {
            stack.push(handle);
            current = store.node(handle).left;
        }
        let Some(handle) = stack.pop() else {
            return values;
        };
        let node = store.node(handle);
        values.push(node.value.clone());
        current = node.right;
    }
}

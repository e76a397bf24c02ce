//! Persistent ordered set over a path-copying search tree.
//!
//! This module provides [`PersistentTreeSet`], an immutable, versioned
//! ordered set. Every mutation produces a new logical version of the set
//! while all unmodified structure is shared with the versions that came
//! before; copying a set is O(1), and independent versions stay valid and
//! iterable for as long as someone owns them.
//!
//! # Overview
//!
//! The tree is an unbalanced binary search tree: ordered operations cost
//! O(h) where h is the current height, O(n) in the worst case. What the
//! container gives up in balancing it keeps in sharing precision:
//!
//! - a mutation copies only the nodes on the root-to-change path
//! - every untouched subtree is shared between versions
//! - a node is freed the moment its last owner goes away
//!
//! Node ownership is pluggable through the
//! [`NodeStore`](crate::store::NodeStore) capability. The default policy
//! is [`CountedStore`](crate::store::CountedStore);
//! [`AliasRingStore`](crate::store::AliasRingStore) is the drop-in
//! alternative that links owners into rings instead of counting them.
//!
//! # Time Complexity
//!
//! | Operation       | Complexity           |
//! |-----------------|----------------------|
//! | `insert`        | O(h)                 |
//! | `remove`        | O(h)                 |
//! | `erase`         | O(h)                 |
//! | `find`          | O(h)                 |
//! | `contains`      | O(h)                 |
//! | `min` / `max`   | O(h)                 |
//! | cursor step     | O(h)                 |
//! | `clone`         | O(1)                 |
//! | `len`           | O(1)                 |
//! | `is_empty`      | O(1)                 |
//! | `iter`          | O(n) eager           |
//!
//! h is bounded by the number of elements, not by any balancing
//! guarantee; insertion order decides the shape.
//!
//! # Examples
//!
//! ```rust
//! use verset::PersistentTreeSet;
//!
//! let mut set: PersistentTreeSet<i32> = PersistentTreeSet::new();
//! set.insert(3);
//! set.insert(1);
//! set.insert(2);
//!
//! // An O(1) copy shares the whole tree.
//! let snapshot = set.clone();
//!
//! set.remove(&1);
//!
//! assert_eq!(set.iter().collect::<Vec<i32>>(), vec![2, 3]);
//! assert_eq!(snapshot.iter().collect::<Vec<i32>>(), vec![1, 2, 3]);
//! ```
//!
//! # Cursors
//!
//! [`Cursor`] is a bidirectional position in one version of a set. A
//! cursor pins the version it was created from: later mutations of the
//! container build new versions and never invalidate it, so every cursor
//! operation is total.
//!
//! ```rust
//! use verset::PersistentTreeSet;
//!
//! let mut set: PersistentTreeSet<i32> = (1..=3).collect();
//! let frozen = set.cursor_front();
//! set.remove(&1);
//!
//! assert_eq!(frozen.value(), Some(1)); // still sees its version
//! assert!(!set.contains(&1));
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter::FromIterator;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::store::{CountedStore, NodeKey, NodeStore, SharedStore};
use crate::tree::{self, Link, Probe};

// =============================================================================
// Owner Tags
// =============================================================================

/// Value identity of one container instance.
///
/// Tags are minted from a thread-local counter, so two containers never
/// share one, including a container and its clones. Cursor operations
/// compare tags by value; nothing in the crate compares addresses.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
struct OwnerTag(u64);

fn next_owner_tag() -> OwnerTag {
    thread_local! {
        static NEXT: Cell<u64> = const { Cell::new(0) };
    }
    NEXT.with(|next| {
        let tag = next.get();
        next.set(tag + 1);
        OwnerTag(tag)
    })
}

// =============================================================================
// Anchor
// =============================================================================

/// The container's entry into the tree: an owner tag plus the root link.
///
/// The anchor plays the past-the-end role for cursors. A cursor whose
/// position is absent, paired with the anchor's tag, is "one past the
/// maximum" of that container, and stepping backwards from it lands on
/// the maximum.
struct Anchor<H> {
    owner: OwnerTag,
    left: Link<H>,
}

// =============================================================================
// PersistentTreeSet Definition
// =============================================================================

/// A persistent (immutable, versioned) ordered set.
///
/// All versions produced from one original container, plus their cursors,
/// share a single node store behind `Rc`. The container itself is a thin
/// handle: an owner tag, a root link, and a tracked length.
///
/// Mutating methods (`insert`, `remove`, `erase`) replace the root with a
/// path-copied tree and retire the superseded root; clones made earlier
/// keep owning the version they pointed at. `Clone` is the copy
/// operation: O(1), sharing the whole tree.
///
/// # Type Parameters
///
/// * `T` - The element type. Ordered operations require `Clone + Ord`.
/// * `P` - The ownership policy, [`CountedStore`] unless chosen otherwise.
///
/// # Examples
///
/// ```rust
/// use verset::PersistentTreeSet;
///
/// let mut set: PersistentTreeSet<i32> = PersistentTreeSet::new();
/// let (cursor, inserted) = set.insert(42);
/// assert!(inserted);
/// assert_eq!(cursor.value(), Some(42));
///
/// let before = set.clone();
/// set.insert(7);
/// assert_eq!(before.len(), 1);
/// assert_eq!(set.len(), 2);
/// ```
///
/// Running on the ring policy instead:
///
/// ```rust
/// use verset::PersistentTreeSet;
/// use verset::store::AliasRingStore;
///
/// let mut set: PersistentTreeSet<i32, AliasRingStore<i32>> = PersistentTreeSet::new();
/// set.insert(1);
/// assert!(set.contains(&1));
/// ```
pub struct PersistentTreeSet<T, P = CountedStore<T>>
where
    P: NodeStore<T>,
{
    store: SharedStore<P>,
    anchor: Anchor<P::Handle>,
    length: usize,
    _values: PhantomData<T>,
}

// Static assertions to verify the shared-store types are not Send/Sync
static_assertions::assert_not_impl_any!(PersistentTreeSet<i32>: Send, Sync);
static_assertions::assert_not_impl_any!(PersistentTreeSet<String>: Send, Sync);
static_assertions::assert_not_impl_any!(Cursor<i32>: Send, Sync);

impl<T, P: NodeStore<T>> PersistentTreeSet<T, P> {
    /// Creates a new empty set with its own node store.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use verset::PersistentTreeSet;
    ///
    /// let set: PersistentTreeSet<i32> = PersistentTreeSet::new();
    /// assert!(set.is_empty());
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: Rc::new(RefCell::new(P::default())),
            anchor: Anchor {
                owner: next_owner_tag(),
                left: None,
            },
            length: 0,
            _values: PhantomData,
        }
    }

    /// Returns the number of elements in this version of the set.
    ///
    /// # Complexity
    ///
    /// O(1)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use verset::PersistentTreeSet;
    ///
    /// let mut set: PersistentTreeSet<i32> = PersistentTreeSet::new();
    /// set.insert(1);
    /// set.insert(2);
    /// assert_eq!(set.len(), 2);
    /// ```
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if this version contains no elements.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use verset::PersistentTreeSet;
    ///
    /// let empty: PersistentTreeSet<i32> = PersistentTreeSet::new();
    /// assert!(empty.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns the past-the-end cursor of this container.
    ///
    /// End cursors of different containers never compare equal, clones
    /// included.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use verset::PersistentTreeSet;
    ///
    /// let set: PersistentTreeSet<i32> = PersistentTreeSet::new();
    /// assert!(set.cursor_end().is_end());
    /// ```
    #[must_use]
    pub fn cursor_end(&self) -> Cursor<T, P> {
        self.cursor_at(None)
    }

    /// Returns a cursor at the smallest element, or the end cursor when
    /// the set is empty.
    ///
    /// An empty set is exactly the state where `cursor_front` and
    /// [`cursor_end`](Self::cursor_end) coincide.
    ///
    /// # Complexity
    ///
    /// O(h)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use verset::PersistentTreeSet;
    ///
    /// let mut set: PersistentTreeSet<i32> = PersistentTreeSet::new();
    /// set.insert(2);
    /// set.insert(1);
    /// assert_eq!(set.cursor_front().value(), Some(1));
    /// ```
    #[must_use]
    pub fn cursor_front(&self) -> Cursor<T, P> {
        let position = {
            let store = self.store.borrow();
            tree::leftmost(&*store, self.anchor.left).map(|handle| store.key(handle))
        };
        self.cursor_at(position)
    }

    /// Exchanges the contents of two sets.
    ///
    /// Only the tree contents move: each container keeps its own identity,
    /// so cursors keep referring to the container they were created from.
    /// Swapping a set with a clone of itself is harmless; links are plain
    /// values and the stores are untouched.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use verset::PersistentTreeSet;
    ///
    /// let mut first: PersistentTreeSet<i32> = (1..=2).collect();
    /// let mut second: PersistentTreeSet<i32> = (8..=9).collect();
    ///
    /// first.swap(&mut second);
    /// assert_eq!(first.iter().collect::<Vec<i32>>(), vec![8, 9]);
    /// assert_eq!(second.iter().collect::<Vec<i32>>(), vec![1, 2]);
    /// ```
    pub fn swap(&mut self, other: &mut Self) {
        core::mem::swap(&mut self.store, &mut other.store);
        core::mem::swap(&mut self.anchor.left, &mut other.anchor.left);
        core::mem::swap(&mut self.length, &mut other.length);
    }

    /// Number of nodes currently allocated in the store this set shares
    /// with its clones and cursors.
    ///
    /// Reclamation is exact: the count equals the nodes reachable from
    /// live versions and cursor pins, nothing more. With a single version
    /// and no cursors it equals [`len`](Self::len).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use verset::PersistentTreeSet;
    ///
    /// let mut set: PersistentTreeSet<i32> = PersistentTreeSet::new();
    /// set.insert(1);
    /// set.insert(2);
    /// assert_eq!(set.allocated_nodes(), 2);
    /// ```
    #[must_use]
    pub fn allocated_nodes(&self) -> usize {
        self.store.borrow().live_nodes()
    }

    /// Builds a cursor for this container, pinning the current root.
    fn cursor_at(&self, position: Option<NodeKey>) -> Cursor<T, P> {
        let root = self
            .anchor
            .left
            .map(|handle| self.store.borrow_mut().alias(handle));
        Cursor {
            store: Rc::clone(&self.store),
            owner: self.anchor.owner,
            root,
            position,
            _values: PhantomData,
        }
    }

    /// Installs a new root and retires the superseded one.
    ///
    /// The anchor is updated before the release so the container never
    /// holds a link to a retired tree.
    fn replace_root(&mut self, new_root: Link<P::Handle>) {
        let superseded = core::mem::replace(&mut self.anchor.left, new_root);
        if let Some(handle) = superseded {
            self.store.borrow_mut().release(handle);
        }
    }
}

impl<T: Clone + Ord, P: NodeStore<T>> PersistentTreeSet<T, P> {
    /// Returns a cursor at `value`, or the end cursor when it is absent.
    ///
    /// Accepts any borrowed form of the element type, so a
    /// `PersistentTreeSet<String>` can be searched with a `&str`.
    ///
    /// # Complexity
    ///
    /// O(h)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use verset::PersistentTreeSet;
    ///
    /// let set: PersistentTreeSet<i32> = [3, 1, 2].into_iter().collect();
    /// assert_eq!(set.find(&2).value(), Some(2));
    /// assert!(set.find(&9).is_end());
    /// ```
    #[must_use]
    pub fn find<Q>(&self, value: &Q) -> Cursor<T, P>
    where
        T: std::borrow::Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let position = {
            let store = self.store.borrow();
            tree::locate(&*store, self.anchor.left, value).map(|handle| store.key(handle))
        };
        self.cursor_at(position)
    }

    /// Returns `true` if the set contains `value`.
    ///
    /// # Complexity
    ///
    /// O(h)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use verset::PersistentTreeSet;
    ///
    /// let strings: PersistentTreeSet<String> =
    ///     ["apple".to_string(), "pear".to_string()].into_iter().collect();
    /// assert!(strings.contains("apple")); // no allocation needed
    /// assert!(!strings.contains("plum"));
    /// ```
    #[must_use]
    pub fn contains<Q>(&self, value: &Q) -> bool
    where
        T: std::borrow::Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let store = self.store.borrow();
        tree::locate(&*store, self.anchor.left, value).is_some()
    }

    /// Inserts `value`, advancing this container to a new version.
    ///
    /// Returns a cursor at the element plus `true` when the value was
    /// inserted, or a cursor at the equal element already present plus
    /// `false`. A duplicate insert allocates nothing and leaves the
    /// current version in place.
    ///
    /// Versions cloned off earlier are unaffected; they keep sharing
    /// every node the new version did not copy.
    ///
    /// # Complexity
    ///
    /// O(h), allocating one node per copied ancestor plus the leaf.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use verset::PersistentTreeSet;
    ///
    /// let mut set: PersistentTreeSet<i32> = PersistentTreeSet::new();
    /// let (_, first) = set.insert(5);
    /// let (cursor, second) = set.insert(5);
    ///
    /// assert!(first);
    /// assert!(!second);
    /// assert_eq!(cursor.value(), Some(5));
    /// assert_eq!(set.len(), 1);
    /// ```
    pub fn insert(&mut self, value: T) -> (Cursor<T, P>, bool) {
        let (key, inserted) = self.insert_impl(value);
        (self.cursor_at(Some(key)), inserted)
    }

    /// Removes `value` from this container's current version.
    ///
    /// Returns `true` when an element was removed. Other versions keep
    /// the element; removal path-copies exactly like insertion.
    ///
    /// # Complexity
    ///
    /// O(h)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use verset::PersistentTreeSet;
    ///
    /// let mut set: PersistentTreeSet<i32> = (1..=3).collect();
    /// assert!(set.remove(&2));
    /// assert!(!set.remove(&2));
    /// assert_eq!(set.len(), 2);
    /// ```
    pub fn remove<Q>(&mut self, value: &Q) -> bool
    where
        T: std::borrow::Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let removed = {
            let mut store = self.store.borrow_mut();
            tree::erase_value(&mut *store, self.anchor.left, value)
        };
        match removed {
            Some(new_root) => {
                self.replace_root(new_root);
                self.length -= 1;
                true
            }
            None => false,
        }
    }

    /// Removes the element a cursor points at.
    ///
    /// The operation is deliberately forgiving; it does nothing when
    ///
    /// - the set is empty,
    /// - `cursor` belongs to a different container (clones included),
    /// - `cursor` is the end cursor, or
    /// - the cursor's element is no longer present in the current
    ///   version (the cursor may be pinned to an older one).
    ///
    /// Otherwise the element equal to the cursor's value is removed from
    /// the current version. The cursor itself stays valid; it pins the
    /// version it was created from.
    ///
    /// # Complexity
    ///
    /// O(h)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use verset::PersistentTreeSet;
    ///
    /// let mut set: PersistentTreeSet<i32> = (1..=3).collect();
    /// let cursor = set.find(&2);
    /// set.erase(&cursor);
    /// assert!(!set.contains(&2));
    ///
    /// // A cursor from another container is ignored.
    /// let other: PersistentTreeSet<i32> = (1..=3).collect();
    /// set.erase(&other.find(&1));
    /// assert!(set.contains(&1));
    /// ```
    pub fn erase(&mut self, cursor: &Cursor<T, P>) {
        if self.is_empty() || cursor.owner != self.anchor.owner {
            return;
        }
        let Some(position) = cursor.position else {
            return;
        };
        // Read through the cursor's own store: after `swap` the container
        // may pair with a different store than the cursor pins.
        let value = {
            let store = cursor.store.borrow();
            match store.get(position) {
                Some(node) => node.value.clone(),
                None => return,
            }
        };
        self.remove(&value);
    }

    /// Returns the smallest element, or `None` when the set is empty.
    ///
    /// # Complexity
    ///
    /// O(h)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use verset::PersistentTreeSet;
    ///
    /// let set: PersistentTreeSet<i32> = [3, 1, 2].into_iter().collect();
    /// assert_eq!(set.min(), Some(1));
    /// ```
    #[must_use]
    pub fn min(&self) -> Option<T> {
        let store = self.store.borrow();
        tree::leftmost(&*store, self.anchor.left).map(|handle| store.node(handle).value.clone())
    }

    /// Returns the largest element, or `None` when the set is empty.
    ///
    /// # Complexity
    ///
    /// O(h)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use verset::PersistentTreeSet;
    ///
    /// let set: PersistentTreeSet<i32> = [3, 1, 2].into_iter().collect();
    /// assert_eq!(set.max(), Some(3));
    /// ```
    #[must_use]
    pub fn max(&self) -> Option<T> {
        let store = self.store.borrow();
        tree::rightmost(&*store, self.anchor.left).map(|handle| store.node(handle).value.clone())
    }

    /// Returns an iterator over the elements in ascending order.
    ///
    /// The iterator owns a snapshot of the values; it is unaffected by
    /// later mutations of the set.
    ///
    /// # Complexity
    ///
    /// O(n) for creation, O(1) per step.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use verset::PersistentTreeSet;
    ///
    /// let set: PersistentTreeSet<i32> = [3, 1, 2].into_iter().collect();
    /// assert_eq!(set.iter().collect::<Vec<i32>>(), vec![1, 2, 3]);
    /// ```
    #[must_use]
    pub fn iter(&self) -> PersistentTreeSetIterator<T> {
        let store = self.store.borrow();
        PersistentTreeSetIterator {
            entries: tree::in_order_values(&*store, self.anchor.left),
            current_index: 0,
        }
    }

    /// Returns a new version containing `value`, leaving this one as is.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use verset::PersistentTreeSet;
    ///
    /// let base: PersistentTreeSet<i32> = (1..=2).collect();
    /// let extended = base.with(3);
    ///
    /// assert_eq!(base.len(), 2);
    /// assert_eq!(extended.len(), 3);
    /// ```
    #[must_use]
    pub fn with(&self, value: T) -> Self {
        let mut next = self.clone();
        next.insert_impl(value);
        next
    }

    /// Returns a new version without `value`, leaving this one as is.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use verset::PersistentTreeSet;
    ///
    /// let base: PersistentTreeSet<i32> = (1..=3).collect();
    /// let trimmed = base.without(&2);
    ///
    /// assert!(base.contains(&2));
    /// assert!(!trimmed.contains(&2));
    /// ```
    #[must_use]
    pub fn without<Q>(&self, value: &Q) -> Self
    where
        T: std::borrow::Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut next = self.clone();
        next.remove(value);
        next
    }

    /// Shared insert path: returns the key holding the value plus
    /// whether an insertion happened.
    fn insert_impl(&mut self, value: T) -> (NodeKey, bool) {
        let probe = {
            let store = self.store.borrow();
            tree::probe(&*store, self.anchor.left, &value)
        };
        match probe {
            Probe::Found { target, .. } => (self.store.borrow().key(target), false),
            Probe::Missing { path } => {
                let (new_root, key) = {
                    let mut store = self.store.borrow_mut();
                    tree::insert_at(&mut *store, &path, value)
                };
                self.replace_root(new_root);
                self.length += 1;
                (key, true)
            }
        }
    }
}

// =============================================================================
// Clone / Drop / Default
// =============================================================================

impl<T, P: NodeStore<T>> Clone for PersistentTreeSet<T, P> {
    /// Copies the set in O(1) by sharing the current tree.
    ///
    /// The clone receives its own identity: cursors of the original do
    /// not authorize [`erase`](PersistentTreeSet::erase) on the clone.
    fn clone(&self) -> Self {
        let root = self
            .anchor
            .left
            .map(|handle| self.store.borrow_mut().alias(handle));
        Self {
            store: Rc::clone(&self.store),
            anchor: Anchor {
                owner: next_owner_tag(),
                left: root,
            },
            length: self.length,
            _values: PhantomData,
        }
    }
}

impl<T, P: NodeStore<T>> Drop for PersistentTreeSet<T, P> {
    fn drop(&mut self) {
        if let Some(handle) = self.anchor.left.take() {
            self.store.borrow_mut().release(handle);
        }
    }
}

impl<T, P: NodeStore<T>> Default for PersistentTreeSet<T, P> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Cursor
// =============================================================================

/// A bidirectional position in one version of a [`PersistentTreeSet`].
///
/// A cursor records which container created it and which element it is
/// at, both as plain values. It also pins the version it was created
/// from, so it keeps a consistent view no matter what the container does
/// afterwards, and it stays usable even after the container is dropped.
///
/// Stepping re-descends from the pinned root comparing values; the tree
/// carries no parent links.
///
/// # End semantics
///
/// The end cursor is "one past the maximum". Stepping
/// [`move_prev`](Cursor::move_prev) from it lands on the maximum;
/// stepping [`move_next`](Cursor::move_next) from it stays at end.
/// Stepping backwards from the minimum lands at end. Cursors of
/// different containers never compare equal, end cursors included.
///
/// # Examples
///
/// ```rust
/// use verset::PersistentTreeSet;
///
/// let set: PersistentTreeSet<i32> = [2, 1, 3].into_iter().collect();
/// let mut cursor = set.cursor_front();
///
/// assert_eq!(cursor.value(), Some(1));
/// cursor.move_next();
/// assert_eq!(cursor.value(), Some(2));
/// cursor.move_prev();
/// assert_eq!(cursor.value(), Some(1));
/// ```
pub struct Cursor<T, P = CountedStore<T>>
where
    P: NodeStore<T>,
{
    store: SharedStore<P>,
    owner: OwnerTag,
    /// Pin on the version this cursor was created from.
    root: Link<P::Handle>,
    /// Identity of the current element, absent past the end.
    position: Option<NodeKey>,
    _values: PhantomData<T>,
}

impl<T, P: NodeStore<T>> Cursor<T, P> {
    /// Returns `true` if this is the past-the-end cursor.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use verset::PersistentTreeSet;
    ///
    /// let set: PersistentTreeSet<i32> = [1].into_iter().collect();
    /// assert!(!set.cursor_front().is_end());
    /// assert!(set.cursor_end().is_end());
    /// ```
    #[inline]
    #[must_use]
    pub const fn is_end(&self) -> bool {
        self.position.is_none()
    }
}

impl<T: Clone + Ord, P: NodeStore<T>> Cursor<T, P> {
    /// Returns a copy of the element at the cursor, `None` at end.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use verset::PersistentTreeSet;
    ///
    /// let set: PersistentTreeSet<i32> = [7].into_iter().collect();
    /// assert_eq!(set.find(&7).value(), Some(7));
    /// assert_eq!(set.cursor_end().value(), None);
    /// ```
    #[must_use]
    pub fn value(&self) -> Option<T> {
        let position = self.position?;
        let store = self.store.borrow();
        store.get(position).map(|node| node.value.clone())
    }

    /// Steps to the next element in ascending order.
    ///
    /// Past the maximum the cursor becomes the end cursor; at end it
    /// stays there.
    ///
    /// # Complexity
    ///
    /// O(h) re-descent from the pinned root.
    pub fn move_next(&mut self) {
        let Some(position) = self.position else {
            return;
        };
        let store = self.store.borrow();
        let next = store
            .get(position)
            .and_then(|node| tree::successor_of(&*store, self.root, &node.value));
        self.position = next.map(|handle| store.key(handle));
    }

    /// Steps to the previous element in ascending order.
    ///
    /// From the end cursor this lands on the maximum; from the minimum
    /// it lands at end.
    ///
    /// # Complexity
    ///
    /// O(h) re-descent from the pinned root.
    pub fn move_prev(&mut self) {
        let store = self.store.borrow();
        let previous = match self.position {
            None => tree::rightmost(&*store, self.root),
            Some(position) => store
                .get(position)
                .and_then(|node| tree::predecessor_of(&*store, self.root, &node.value)),
        };
        self.position = previous.map(|handle| store.key(handle));
    }
}

impl<T, P: NodeStore<T>> Clone for Cursor<T, P> {
    /// Copies the cursor, pinning the same version once more.
    fn clone(&self) -> Self {
        let root = self
            .root
            .map(|handle| self.store.borrow_mut().alias(handle));
        Self {
            store: Rc::clone(&self.store),
            owner: self.owner,
            root,
            position: self.position,
            _values: PhantomData,
        }
    }
}

impl<T, P: NodeStore<T>> Drop for Cursor<T, P> {
    fn drop(&mut self) {
        if let Some(handle) = self.root.take() {
            self.store.borrow_mut().release(handle);
        }
    }
}

impl<T, P: NodeStore<T>> PartialEq for Cursor<T, P> {
    /// Cursors are equal when they come from the same container and sit
    /// at the same element (or both at end).
    fn eq(&self, other: &Self) -> bool {
        self.owner == other.owner && self.position == other.position
    }
}

impl<T, P: NodeStore<T>> Eq for Cursor<T, P> {}

impl<T, P: NodeStore<T>> fmt::Debug for Cursor<T, P> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(key) => formatter
                .debug_struct("Cursor")
                .field("position", &key)
                .finish(),
            None => formatter.write_str("Cursor(end)"),
        }
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// An iterator over the elements of a [`PersistentTreeSet`] in ascending
/// order.
///
/// The iterator owns its snapshot of the values, taken eagerly when it
/// is created.
pub struct PersistentTreeSetIterator<T> {
    entries: Vec<T>,
    current_index: usize,
}

impl<T: Clone> Iterator for PersistentTreeSetIterator<T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_index >= self.entries.len() {
            None
        } else {
            let entry = self.entries[self.current_index].clone();
            self.current_index += 1;
            Some(entry)
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.entries.len().saturating_sub(self.current_index);
        (remaining, Some(remaining))
    }
}

impl<T: Clone> ExactSizeIterator for PersistentTreeSetIterator<T> {
    fn len(&self) -> usize {
        self.entries.len().saturating_sub(self.current_index)
    }
}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<T: Clone + Ord, P: NodeStore<T>> FromIterator<T> for PersistentTreeSet<T, P> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = Self::new();
        for value in iter {
            set.insert_impl(value);
        }
        set
    }
}

impl<T: Clone + Ord, P: NodeStore<T>> Extend<T> for PersistentTreeSet<T, P> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.insert_impl(value);
        }
    }
}

impl<T: Clone + Ord, P: NodeStore<T>> IntoIterator for PersistentTreeSet<T, P> {
    type Item = T;
    type IntoIter = PersistentTreeSetIterator<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T: Clone + Ord, P: NodeStore<T>> IntoIterator for &'a PersistentTreeSet<T, P> {
    type Item = T;
    type IntoIter = PersistentTreeSetIterator<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: Clone + Ord, P: NodeStore<T>> PartialEq for PersistentTreeSet<T, P> {
    /// Two sets are equal when they hold the same elements; versions,
    /// policies and sharing history are invisible to equality.
    fn eq(&self, other: &Self) -> bool {
        self.length == other.length && self.iter().eq(other.iter())
    }
}

impl<T: Clone + Ord, P: NodeStore<T>> Eq for PersistentTreeSet<T, P> {}

/// Computes a hash for this set.
///
/// The length is hashed first, then each element in ascending order, so
/// equal sets hash equally regardless of how they were built.
impl<T, P> Hash for PersistentTreeSet<T, P>
where
    T: Clone + Ord + Hash,
    P: NodeStore<T>,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.length.hash(state);
        for value in self.iter() {
            value.hash(state);
        }
    }
}

impl<T: Clone + Ord + fmt::Debug, P: NodeStore<T>> fmt::Debug for PersistentTreeSet<T, P> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_set().entries(self.iter()).finish()
    }
}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl<T, P> serde::Serialize for PersistentTreeSet<T, P>
where
    T: serde::Serialize + Clone + Ord,
    P: NodeStore<T>,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeSeq;
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for element in self {
            seq.serialize_element(&element)?;
        }
        seq.end()
    }
}

#[cfg(feature = "serde")]
struct PersistentTreeSetVisitor<T, P> {
    marker: std::marker::PhantomData<(T, P)>,
}

#[cfg(feature = "serde")]
impl<T, P> PersistentTreeSetVisitor<T, P> {
    const fn new() -> Self {
        Self {
            marker: std::marker::PhantomData,
        }
    }
}

#[cfg(feature = "serde")]
impl<'de, T, P> serde::de::Visitor<'de> for PersistentTreeSetVisitor<T, P>
where
    T: serde::Deserialize<'de> + Clone + Ord,
    P: NodeStore<T>,
{
    type Value = PersistentTreeSet<T, P>;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a sequence")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::SeqAccess<'de>,
    {
        let mut set = PersistentTreeSet::new();
        while let Some(element) = seq.next_element()? {
            set.insert_impl(element);
        }
        Ok(set)
    }
}

#[cfg(feature = "serde")]
impl<'de, T, P> serde::Deserialize<'de> for PersistentTreeSet<T, P>
where
    T: serde::Deserialize<'de> + Clone + Ord,
    P: NodeStore<T>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_seq(PersistentTreeSetVisitor::new())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn new_set_is_empty() {
        let set: PersistentTreeSet<i32> = PersistentTreeSet::new();
        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
        assert_eq!(set.allocated_nodes(), 0);
    }

    #[rstest]
    fn insert_reports_whether_the_value_was_new() {
        let mut set: PersistentTreeSet<i32> = PersistentTreeSet::new();
        let (cursor, inserted) = set.insert(5);
        assert!(inserted);
        assert_eq!(cursor.value(), Some(5));

        let (cursor, inserted) = set.insert(5);
        assert!(!inserted);
        assert_eq!(cursor.value(), Some(5));
        assert_eq!(set.len(), 1);
    }

    #[rstest]
    fn duplicate_insert_allocates_nothing() {
        let mut set: PersistentTreeSet<i32> = (1..=4).collect();
        let baseline = set.allocated_nodes();
        set.insert(3);
        assert_eq!(set.allocated_nodes(), baseline);
    }

    #[rstest]
    fn find_supports_borrowed_queries() {
        let set: PersistentTreeSet<String> = ["pear".to_string(), "apple".to_string()]
            .into_iter()
            .collect();
        assert_eq!(set.find("apple").value(), Some("apple".to_string()));
        assert!(set.find("plum").is_end());
    }

    #[rstest]
    fn clone_shares_the_tree_without_copying_nodes() {
        let set: PersistentTreeSet<i32> = (1..=8).collect();
        let baseline = set.allocated_nodes();
        let copy = set.clone();

        assert_eq!(set.allocated_nodes(), baseline);
        assert_eq!(copy.iter().collect::<Vec<i32>>(), (1..=8).collect::<Vec<i32>>());
    }

    #[rstest]
    fn versions_diverge_independently() {
        let mut set: PersistentTreeSet<i32> = (1..=4).collect();
        let snapshot = set.clone();

        set.remove(&2);
        set.insert(9);

        assert_eq!(set.iter().collect::<Vec<i32>>(), vec![1, 3, 4, 9]);
        assert_eq!(snapshot.iter().collect::<Vec<i32>>(), vec![1, 2, 3, 4]);
    }

    #[rstest]
    fn erase_removes_the_element_at_the_cursor() {
        let mut set: PersistentTreeSet<i32> = (1..=3).collect();
        let cursor = set.find(&2);
        set.erase(&cursor);
        assert_eq!(set.iter().collect::<Vec<i32>>(), vec![1, 3]);
        assert_eq!(set.len(), 2);
    }

    #[rstest]
    fn erase_ignores_the_end_cursor() {
        let mut set: PersistentTreeSet<i32> = (1..=3).collect();
        let end = set.cursor_end();
        set.erase(&end);
        assert_eq!(set.len(), 3);
    }

    #[rstest]
    fn erase_ignores_cursors_of_other_containers() {
        let mut set: PersistentTreeSet<i32> = (1..=3).collect();
        let other: PersistentTreeSet<i32> = (1..=3).collect();
        set.erase(&other.find(&1));
        assert_eq!(set.len(), 3);

        // A clone is a different container as well.
        let clone = set.clone();
        set.erase(&clone.find(&1));
        assert_eq!(set.len(), 3);
    }

    #[rstest]
    fn erase_is_a_no_op_when_the_value_left_the_current_version() {
        let mut set: PersistentTreeSet<i32> = (1..=3).collect();
        let cursor = set.find(&2);
        set.remove(&2);

        let length = set.len();
        set.erase(&cursor); // 2 is already gone from this version
        assert_eq!(set.len(), length);
        assert_eq!(cursor.value(), Some(2)); // the pinned version still has it
    }

    #[rstest]
    fn cursor_walks_forward_and_backward() {
        let set: PersistentTreeSet<i32> = [4, 2, 6, 1, 3, 5, 7].into_iter().collect();

        let mut cursor = set.cursor_front();
        let mut forward = Vec::new();
        while let Some(value) = cursor.value() {
            forward.push(value);
            cursor.move_next();
        }
        assert_eq!(forward, vec![1, 2, 3, 4, 5, 6, 7]);
        assert!(cursor.is_end());

        let mut backward = Vec::new();
        loop {
            cursor.move_prev();
            match cursor.value() {
                Some(value) => backward.push(value),
                None => break,
            }
        }
        assert_eq!(backward, vec![7, 6, 5, 4, 3, 2, 1]);
    }

    #[rstest]
    fn stepping_back_from_end_reaches_the_maximum() {
        let set: PersistentTreeSet<i32> = (1..=3).collect();
        let mut cursor = set.cursor_end();
        cursor.move_prev();
        assert_eq!(cursor.value(), Some(3));
    }

    #[rstest]
    fn stepping_next_at_end_stays_at_end() {
        let set: PersistentTreeSet<i32> = (1..=3).collect();
        let mut cursor = set.cursor_end();
        cursor.move_next();
        assert!(cursor.is_end());
    }

    #[rstest]
    fn empty_set_front_equals_end() {
        let set: PersistentTreeSet<i32> = PersistentTreeSet::new();
        assert_eq!(set.cursor_front(), set.cursor_end());
    }

    #[rstest]
    fn end_cursors_of_different_containers_differ() {
        let first: PersistentTreeSet<i32> = PersistentTreeSet::new();
        let second: PersistentTreeSet<i32> = PersistentTreeSet::new();
        assert_ne!(first.cursor_end(), second.cursor_end());
        assert_ne!(first.cursor_end(), first.clone().cursor_end());
    }

    #[rstest]
    fn cursor_pins_its_version_across_mutations() {
        let mut set: PersistentTreeSet<i32> = (1..=3).collect();
        let mut cursor = set.cursor_front();

        set.remove(&1);
        set.remove(&2);

        let mut seen = Vec::new();
        while let Some(value) = cursor.value() {
            seen.push(value);
            cursor.move_next();
        }
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[rstest]
    fn cursor_outlives_its_container() {
        let cursor = {
            let set: PersistentTreeSet<i32> = (1..=3).collect();
            set.find(&2)
        };
        assert_eq!(cursor.value(), Some(2));
    }

    #[rstest]
    fn dropping_versions_and_cursors_reclaims_everything() {
        let mut set: PersistentTreeSet<i32> = (1..=6).collect();
        {
            let snapshot = set.clone();
            let cursor = set.cursor_front();
            set.remove(&3);
            set.remove(&5);
            assert!(set.allocated_nodes() > set.len());
            drop(snapshot);
            drop(cursor);
        }
        assert_eq!(set.allocated_nodes(), set.len());
    }

    #[rstest]
    fn swap_exchanges_contents_but_not_identity() {
        let mut first: PersistentTreeSet<i32> = (1..=2).collect();
        let mut second: PersistentTreeSet<i32> = (8..=9).collect();
        let cursor = first.find(&1);

        first.swap(&mut second);

        assert_eq!(first.iter().collect::<Vec<i32>>(), vec![8, 9]);
        assert_eq!(second.iter().collect::<Vec<i32>>(), vec![1, 2]);
        // The cursor still belongs to `first` and still sees its pinned tree.
        assert_eq!(cursor.value(), Some(1));
        first.erase(&cursor); // no 1 in first's current version: no-op
        assert_eq!(first.len(), 2);
    }

    #[rstest]
    fn equality_ignores_construction_order() {
        let first: PersistentTreeSet<i32> = [3, 1, 2].into_iter().collect();
        let second: PersistentTreeSet<i32> = [2, 3, 1].into_iter().collect();
        assert_eq!(first, second);

        let third: PersistentTreeSet<i32> = [1, 2].into_iter().collect();
        assert_ne!(first, third);
    }

    #[rstest]
    fn hash_agrees_with_equality() {
        use std::collections::HashMap;

        let mut outer: HashMap<PersistentTreeSet<i32>, &str> = HashMap::new();
        let key: PersistentTreeSet<i32> = [2, 1].into_iter().collect();
        outer.insert(key.clone(), "present");

        let same: PersistentTreeSet<i32> = [1, 2].into_iter().collect();
        assert_eq!(outer.get(&same), Some(&"present"));
    }

    #[rstest]
    fn debug_formats_as_a_set() {
        let set: PersistentTreeSet<i32> = [2, 1].into_iter().collect();
        assert_eq!(format!("{set:?}"), "{1, 2}");
    }

    #[rstest]
    fn extend_adds_only_new_values() {
        let mut set: PersistentTreeSet<i32> = (1..=3).collect();
        set.extend([3, 4, 5]);
        assert_eq!(set.iter().collect::<Vec<i32>>(), vec![1, 2, 3, 4, 5]);
    }

    #[rstest]
    fn min_and_max_track_the_boundaries() {
        let mut set: PersistentTreeSet<i32> = [5, 3, 9].into_iter().collect();
        assert_eq!(set.min(), Some(3));
        assert_eq!(set.max(), Some(9));

        set.remove(&9);
        assert_eq!(set.max(), Some(5));

        let empty: PersistentTreeSet<i32> = PersistentTreeSet::new();
        assert_eq!(empty.min(), None);
        assert_eq!(empty.max(), None);
    }

    #[rstest]
    fn with_and_without_snapshot_helpers() {
        let base: PersistentTreeSet<i32> = (1..=3).collect();
        let more = base.with(4);
        let less = base.without(&1);

        assert_eq!(base.iter().collect::<Vec<i32>>(), vec![1, 2, 3]);
        assert_eq!(more.iter().collect::<Vec<i32>>(), vec![1, 2, 3, 4]);
        assert_eq!(less.iter().collect::<Vec<i32>>(), vec![2, 3]);
    }
}

//! Node storage policies for the persistent set.
//!
//! This module defines the shared-ownership capability that the tree
//! algorithms are written against, together with the two policies that
//! satisfy it:
//!
//! - [`CountedStore`]: every node slot carries a non-atomic owner count
//! - [`AliasRingStore`]: the owners of a node form a circular
//!   doubly-linked ring of alias slots
//!
//! Nodes live in slot arenas owned by the policy. A [`NodeKey`] names a
//! slot by index plus a generation stamp, so a key held past the life of
//! its node fails a value comparison instead of turning into a dangling
//! pointer. All node access goes through the arena, which keeps the crate
//! free of `unsafe` while still sharing structure between versions.
//!
//! # Examples
//!
//! ```rust
//! use verset::store::{CountedStore, Node, NodeStore};
//!
//! let mut store: CountedStore<i32> = CountedStore::new();
//! let leaf = store.adopt(Node::leaf(7));
//! let shared = store.alias(leaf);
//!
//! assert_eq!(store.key(leaf), store.key(shared));
//! assert_eq!(store.live_nodes(), 1);
//!
//! store.release(leaf);
//! assert_eq!(store.live_nodes(), 1); // still owned through `shared`
//! store.release(shared);
//! assert_eq!(store.live_nodes(), 0);
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

mod alias_ring;
mod counted;

pub use alias_ring::{AliasKey, AliasRingStore};
pub use counted::CountedStore;

/// Store shared by every version and cursor of one tree family.
pub(crate) type SharedStore<P> = Rc<RefCell<P>>;

// =============================================================================
// Node Identity
// =============================================================================

/// Stable identity of a stored node: arena index plus generation stamp.
///
/// A key is valid for exactly one occupancy of its slot. Freeing the slot
/// advances the generation, so a key held past the node's life compares
/// unequal to every later key for the same slot and fails generation
/// checks instead of aliasing the recycled occupant.
///
/// The stamp is 32 bits wide and wraps: one slot would have to be freed
/// `u32::MAX` times between mint and use of a single stale key for the
/// check to be fooled.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeKey {
    index: u32,
    generation: u32,
}

impl NodeKey {
    /// Creates a key from its raw parts.
    ///
    /// Policies mint keys when placing nodes; container code only copies
    /// and compares them.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Arena slot index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Generation stamp of the occupancy this key refers to.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

// =============================================================================
// Node
// =============================================================================

/// A tree node as held by a store.
///
/// Nodes are immutable once adopted: mutating operations build new nodes
/// along the changed path and alias the untouched remainder, so a node's
/// links never change while it is live.
#[derive(Debug)]
pub struct Node<H, T> {
    /// Link to the left subtree, `None` on a leaf side.
    pub left: Option<H>,
    /// Link to the right subtree, `None` on a leaf side.
    pub right: Option<H>,
    /// The element stored at this node.
    pub value: T,
}

impl<H, T> Node<H, T> {
    /// Creates a childless node.
    #[inline]
    #[must_use]
    pub const fn leaf(value: T) -> Self {
        Self {
            left: None,
            right: None,
            value,
        }
    }
}

// =============================================================================
// NodeStore Capability
// =============================================================================

/// Shared ownership of tree nodes.
///
/// A store owns every node of one tree family (all versions produced from
/// one original container, plus the cursors pinned to them). The tree
/// algorithms are written against this capability alone, never against a
/// concrete policy, which makes [`CountedStore`] and [`AliasRingStore`]
/// drop-in interchangeable.
///
/// # Handles
///
/// A [`Handle`](Self::Handle) is a plain value naming one unit of
/// ownership. Copying the value does not create an owner;
/// [`alias`](Self::alias) does. Every handle reachable from live data (a node's
/// child link, a container root, or a cursor pin) is backed by exactly one
/// ownership unit, and every unit is eventually returned through
/// [`release`](Self::release).
///
/// An absent link is `Option::<Handle>::None`. Aliasing or releasing
/// through an absent link is a no-op at the call site (`Option::map`), and
/// swapping two links is a plain value swap that never touches the store,
/// even when both name the same node.
///
/// # Contract
///
/// - `adopt` consumes a node and returns a handle owning it.
/// - `alias(h)` adds one owner to the node behind `h`.
/// - `release(h)` removes one owner. A node losing its last owner is
///   freed, and the units held in its child links are released in turn;
///   the cascade is iterative, so native stack depth stays flat no matter
///   how tall the freed subtree is.
/// - `key(h)` names the node behind `h`. Cursors persist [`NodeKey`]s
///   rather than handles, which keeps their identity policy independent.
/// - `get(k)` is a non-owning, generation-checked read: `None` for a key
///   whose slot has been freed or recycled since the key was minted.
///
/// Passing a handle that this store never minted, or releasing a unit
/// twice, is an accounting violation and panics.
pub trait NodeStore<T>: Default {
    /// Owning reference to a stored node.
    type Handle: Copy + Eq + fmt::Debug;

    /// Takes ownership of `node` and returns a handle owning it.
    fn adopt(&mut self, node: Node<Self::Handle, T>) -> Self::Handle;

    /// Registers one more owner of the node behind `handle` and returns a
    /// handle for the new ownership unit.
    ///
    /// # Panics
    ///
    /// Panics if `handle` does not refer to a live node of this store.
    fn alias(&mut self, handle: Self::Handle) -> Self::Handle;

    /// Drops one owner of the node behind `handle`.
    ///
    /// When the last owner goes, the node is freed and the ownership
    /// units in its child links are released as well, iteratively.
    ///
    /// # Panics
    ///
    /// Panics if `handle` does not refer to a live node of this store.
    fn release(&mut self, handle: Self::Handle);

    /// Borrows the node behind `handle`.
    ///
    /// # Panics
    ///
    /// Panics if `handle` does not refer to a live node of this store.
    fn node(&self, handle: Self::Handle) -> &Node<Self::Handle, T>;

    /// Names the node behind `handle`.
    ///
    /// # Panics
    ///
    /// Panics if `handle` does not refer to a live node of this store.
    fn key(&self, handle: Self::Handle) -> NodeKey;

    /// Generation-checked, non-owning read of the node named by `key`.
    fn get(&self, key: NodeKey) -> Option<&Node<Self::Handle, T>>;

    /// Number of currently allocated nodes.
    ///
    /// Reclamation is exact, so once every owner of a family is gone this
    /// returns zero. Tests lean on that to prove nothing leaks.
    fn live_nodes(&self) -> usize;
}

/// Converts an arena length into the index of the slot about to be pushed.
///
/// Arena addressing is 32-bit by design; larger arenas are out of scope.
pub(crate) fn slot_index(occupied: usize) -> u32 {
    u32::try_from(occupied).expect("slot arena exceeded u32::MAX entries")
}

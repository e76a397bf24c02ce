//! Alias-ring ownership policy.
//!
//! [`AliasRingStore`] tracks the owners of a node without any counter:
//! every ownership unit is an alias slot, and the alias slots of one node
//! are threaded into a circular doubly-linked ring. Creating an alias
//! splices a new slot into the ring next to the source; releasing one
//! unlinks it. A slot whose successor is itself is the sole owner, so
//! "last owner released" is a pure link comparison.
//!
//! Ring links are arena indices with generation stamps, the same identity
//! scheme the node slots use, so the policy needs no address arithmetic
//! and stays in safe Rust.

use smallvec::SmallVec;

use super::{Node, NodeKey, NodeStore, slot_index};

/// Handle of the alias-ring policy: the identity of one alias slot.
///
/// Unlike the counting policy, aliasing here returns a handle that is
/// *distinct* from its source; the two are joined through the ring, and
/// [`NodeStore::key`] resolves both to the same [`NodeKey`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct AliasKey {
    index: u32,
    generation: u32,
}

/// Ring membership of one alias slot.
#[derive(Clone, Copy)]
struct RingLinks {
    node: NodeKey,
    prev: AliasKey,
    next: AliasKey,
}

struct NodeSlot<T> {
    generation: u32,
    state: NodeSlotState<T>,
}

enum NodeSlotState<T> {
    Vacant { next_free: Option<u32> },
    Occupied { node: Node<AliasKey, T> },
}

struct AliasSlot {
    generation: u32,
    state: AliasSlotState,
}

enum AliasSlotState {
    Vacant { next_free: Option<u32> },
    Occupied(RingLinks),
}

/// Ownership policy that links the owners of each node into a ring.
///
/// Behaviorally interchangeable with
/// [`CountedStore`](super::CountedStore): the container and the tree
/// algorithms observe identical semantics through either policy.
///
/// # Examples
///
/// ```rust
/// use verset::store::{AliasRingStore, Node, NodeStore};
///
/// let mut store: AliasRingStore<i32> = AliasRingStore::new();
/// let first = store.adopt(Node::leaf(1));
/// let second = store.alias(first);
///
/// assert_ne!(first, second); // distinct ring slots
/// assert_eq!(store.key(first), store.key(second)); // one node behind both
/// assert_eq!(store.live_aliases(), 2);
///
/// store.release(first);
/// assert_eq!(store.live_nodes(), 1);
/// store.release(second);
/// assert_eq!(store.live_nodes(), 0);
/// ```
pub struct AliasRingStore<T> {
    nodes: Vec<NodeSlot<T>>,
    node_free: Option<u32>,
    aliases: Vec<AliasSlot>,
    alias_free: Option<u32>,
    node_count: usize,
    alias_count: usize,
}

impl<T> AliasRingStore<T> {
    /// Creates an empty store.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            nodes: Vec::new(),
            node_free: None,
            aliases: Vec::new(),
            alias_free: None,
            node_count: 0,
            alias_count: 0,
        }
    }

    /// Number of live alias slots, summed over all rings.
    ///
    /// Every ownership unit in the tree family occupies one slot, so this
    /// equals the total owner count a counting policy would report.
    #[inline]
    #[must_use]
    pub const fn live_aliases(&self) -> usize {
        self.alias_count
    }

    fn links(&self, handle: AliasKey) -> RingLinks {
        match self
            .aliases
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .map(|slot| &slot.state)
        {
            Some(AliasSlotState::Occupied(links)) => *links,
            _ => panic!("use of an alias handle that is not live in this store"),
        }
    }

    fn links_mut(&mut self, handle: AliasKey) -> &mut RingLinks {
        match self
            .aliases
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .map(|slot| &mut slot.state)
        {
            Some(AliasSlotState::Occupied(links)) => links,
            _ => panic!("use of an alias handle that is not live in this store"),
        }
    }

    fn place_node(&mut self, node: Node<AliasKey, T>) -> NodeKey {
        self.node_count += 1;
        match self.node_free {
            Some(index) => {
                let slot = &mut self.nodes[index as usize];
                let next_free = match &slot.state {
                    NodeSlotState::Vacant { next_free } => *next_free,
                    NodeSlotState::Occupied { .. } => {
                        unreachable!("free list points at an occupied node slot")
                    }
                };
                self.node_free = next_free;
                slot.state = NodeSlotState::Occupied { node };
                NodeKey::new(index, slot.generation)
            }
            None => {
                let index = slot_index(self.nodes.len());
                self.nodes.push(NodeSlot {
                    generation: 0,
                    state: NodeSlotState::Occupied { node },
                });
                NodeKey::new(index, 0)
            }
        }
    }

    fn free_node(&mut self, key: NodeKey) -> Node<AliasKey, T> {
        let Some(slot) = self
            .nodes
            .get_mut(key.index() as usize)
            .filter(|slot| slot.generation == key.generation())
        else {
            panic!("alias ring points at a node slot that is not live");
        };
        slot.generation = slot.generation.wrapping_add(1);
        let state = core::mem::replace(
            &mut slot.state,
            NodeSlotState::Vacant {
                next_free: self.node_free,
            },
        );
        self.node_free = Some(key.index());
        self.node_count -= 1;
        match state {
            NodeSlotState::Occupied { node } => node,
            NodeSlotState::Vacant { .. } => {
                panic!("alias ring points at a node slot that is not live")
            }
        }
    }

    /// Places a fresh, self-linked alias slot for `node`.
    fn place_ring_head(&mut self, node: NodeKey) -> AliasKey {
        self.alias_count += 1;
        match self.alias_free {
            Some(index) => {
                let slot = &mut self.aliases[index as usize];
                let next_free = match &slot.state {
                    AliasSlotState::Vacant { next_free } => *next_free,
                    AliasSlotState::Occupied(_) => {
                        unreachable!("free list points at an occupied alias slot")
                    }
                };
                self.alias_free = next_free;
                let key = AliasKey {
                    index,
                    generation: slot.generation,
                };
                slot.state = AliasSlotState::Occupied(RingLinks {
                    node,
                    prev: key,
                    next: key,
                });
                key
            }
            None => {
                let index = slot_index(self.aliases.len());
                let key = AliasKey {
                    index,
                    generation: 0,
                };
                self.aliases.push(AliasSlot {
                    generation: 0,
                    state: AliasSlotState::Occupied(RingLinks {
                        node,
                        prev: key,
                        next: key,
                    }),
                });
                key
            }
        }
    }

    fn free_alias(&mut self, handle: AliasKey) {
        let Some(slot) = self
            .aliases
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
        else {
            panic!("release of an alias handle that is not live in this store");
        };
        if matches!(slot.state, AliasSlotState::Vacant { .. }) {
            panic!("release of an alias handle that is not live in this store");
        }
        slot.generation = slot.generation.wrapping_add(1);
        slot.state = AliasSlotState::Vacant {
            next_free: self.alias_free,
        };
        self.alias_free = Some(handle.index);
        self.alias_count -= 1;
    }

    /// Number of slots in the ring `handle` belongs to.
    #[cfg(test)]
    fn ring_len(&self, handle: AliasKey) -> usize {
        let mut count = 1;
        let mut cursor = self.links(handle).next;
        while cursor != handle {
            count += 1;
            cursor = self.links(cursor).next;
        }
        count
    }
}

impl<T> Default for AliasRingStore<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T> NodeStore<T> for AliasRingStore<T> {
    type Handle = AliasKey;

    fn adopt(&mut self, node: Node<AliasKey, T>) -> AliasKey {
        let key = self.place_node(node);
        self.place_ring_head(key)
    }

    fn alias(&mut self, handle: AliasKey) -> AliasKey {
        let RingLinks { node, next, .. } = self.links(handle);
        let fresh = self.place_ring_head(node);
        // Splice the fresh slot between `handle` and its old successor.
        {
            let links = self.links_mut(fresh);
            links.prev = handle;
            links.next = next;
        }
        self.links_mut(handle).next = fresh;
        self.links_mut(next).prev = fresh;
        fresh
    }

    fn release(&mut self, handle: AliasKey) {
        let mut pending: SmallVec<[AliasKey; 32]> = SmallVec::new();
        pending.push(handle);

        while let Some(alias) = pending.pop() {
            let links = self.links(alias);
            self.free_alias(alias);
            if links.next == alias {
                // Self-linked ring: this was the sole owner, the node goes too.
                let node = self.free_node(links.node);
                if let Some(child) = node.left {
                    pending.push(child);
                }
                if let Some(child) = node.right {
                    pending.push(child);
                }
            } else {
                self.links_mut(links.prev).next = links.next;
                self.links_mut(links.next).prev = links.prev;
            }
        }
    }

    fn node(&self, handle: AliasKey) -> &Node<AliasKey, T> {
        let key = self.links(handle).node;
        match self.get(key) {
            Some(node) => node,
            None => panic!("alias ring points at a node slot that is not live"),
        }
    }

    fn key(&self, handle: AliasKey) -> NodeKey {
        self.links(handle).node
    }

    fn get(&self, key: NodeKey) -> Option<&Node<AliasKey, T>> {
        let slot = self
            .nodes
            .get(key.index() as usize)
            .filter(|slot| slot.generation == key.generation())?;
        match &slot.state {
            NodeSlotState::Occupied { node } => Some(node),
            NodeSlotState::Vacant { .. } => None,
        }
    }

    fn live_nodes(&self) -> usize {
        self.node_count
    }
}

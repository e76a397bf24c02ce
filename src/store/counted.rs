//! Counter-based ownership policy.
//!
//! [`CountedStore`] keeps one owner count next to each node. The count is
//! plain (non-atomic) state, which is all the single-threaded container
//! needs, and it lives in the same slot as the node itself, so a node and
//! its accounting are allocated and freed together and no partially
//! constructed state can exist.

use smallvec::SmallVec;

use super::{Node, NodeKey, NodeStore, slot_index};

/// One arena slot: a generation stamp plus the occupancy state.
///
/// The stamp survives vacancy so that keys minted for an earlier
/// occupancy keep failing generation checks after the slot is reused.
struct Slot<T> {
    generation: u32,
    state: SlotState<T>,
}

enum SlotState<T> {
    Vacant { next_free: Option<u32> },
    Occupied { node: Node<NodeKey, T>, owners: usize },
}

/// Ownership policy with a per-node owner count.
///
/// This is the default policy of
/// [`PersistentTreeSet`](crate::set::PersistentTreeSet). Handles are the
/// node keys themselves: aliasing bumps the count behind the key and
/// hands the same key back.
///
/// # Examples
///
/// ```rust
/// use verset::store::{CountedStore, Node, NodeStore};
///
/// let mut store: CountedStore<&str> = CountedStore::new();
/// let handle = store.adopt(Node::leaf("root"));
/// let key = store.key(handle);
///
/// store.release(handle);
/// assert!(store.get(key).is_none()); // the generation check catches the stale key
/// ```
pub struct CountedStore<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<u32>,
    live: usize,
}

impl<T> CountedStore<T> {
    /// Creates an empty store.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_head: None,
            live: 0,
        }
    }

    fn slot(&self, key: NodeKey) -> Option<&Slot<T>> {
        self.slots
            .get(key.index() as usize)
            .filter(|slot| slot.generation == key.generation())
    }

    /// Owner count behind `key`, zero when the key is stale.
    #[cfg(test)]
    fn owners(&self, key: NodeKey) -> usize {
        match self.slot(key).map(|slot| &slot.state) {
            Some(SlotState::Occupied { owners, .. }) => *owners,
            _ => 0,
        }
    }
}

impl<T> Default for CountedStore<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T> NodeStore<T> for CountedStore<T> {
    type Handle = NodeKey;

    fn adopt(&mut self, node: Node<NodeKey, T>) -> NodeKey {
        self.live += 1;
        match self.free_head {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                let next_free = match &slot.state {
                    SlotState::Vacant { next_free } => *next_free,
                    SlotState::Occupied { .. } => {
                        unreachable!("free list points at an occupied slot")
                    }
                };
                self.free_head = next_free;
                slot.state = SlotState::Occupied { node, owners: 1 };
                NodeKey::new(index, slot.generation)
            }
            None => {
                let index = slot_index(self.slots.len());
                self.slots.push(Slot {
                    generation: 0,
                    state: SlotState::Occupied { node, owners: 1 },
                });
                NodeKey::new(index, 0)
            }
        }
    }

    fn alias(&mut self, handle: NodeKey) -> NodeKey {
        let slot = self
            .slots
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation());
        match slot.map(|slot| &mut slot.state) {
            Some(SlotState::Occupied { owners, .. }) => {
                *owners += 1;
                handle
            }
            _ => panic!("alias of a handle that is not live in this store"),
        }
    }

    fn release(&mut self, handle: NodeKey) {
        let mut pending: SmallVec<[NodeKey; 32]> = SmallVec::new();
        pending.push(handle);

        while let Some(key) = pending.pop() {
            let Some(slot) = self
                .slots
                .get_mut(key.index() as usize)
                .filter(|slot| slot.generation == key.generation())
            else {
                panic!("release of a handle that is not live in this store");
            };

            let last_owner = match &mut slot.state {
                SlotState::Occupied { owners, .. } => {
                    *owners -= 1;
                    *owners == 0
                }
                SlotState::Vacant { .. } => {
                    panic!("release of a handle that is not live in this store")
                }
            };
            if !last_owner {
                continue;
            }

            slot.generation = slot.generation.wrapping_add(1);
            let state = core::mem::replace(
                &mut slot.state,
                SlotState::Vacant {
                    next_free: self.free_head,
                },
            );
            self.free_head = Some(key.index());
            self.live -= 1;

            // The freed node's links each carried one ownership unit.
            if let SlotState::Occupied { node, .. } = state {
                if let Some(child) = node.left {
                    pending.push(child);
                }
                if let Some(child) = node.right {
                    pending.push(child);
                }
            }
        }
    }

    fn node(&self, handle: NodeKey) -> &Node<NodeKey, T> {
        match self.slot(handle).map(|slot| &slot.state) {
            Some(SlotState::Occupied { node, .. }) => node,
            _ => panic!("dereference of a handle that is not live in this store"),
        }
    }

    fn key(&self, handle: NodeKey) -> NodeKey {
        match self.slot(handle).map(|slot| &slot.state) {
            Some(SlotState::Occupied { .. }) => handle,
            _ => panic!("key of a handle that is not live in this store"),
        }
    }

    fn get(&self, key: NodeKey) -> Option<&Node<NodeKey, T>> {
        match &self.slot(key)?.state {
            SlotState::Occupied { node, .. } => Some(node),
            SlotState::Vacant { .. } => None,
        }
    }

    fn live_nodes(&self) -> usize {
        self.live
    }
}

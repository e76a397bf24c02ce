//! # verset
//!
//! A persistent ordered set built on path-copying search trees with
//! pluggable shared-ownership policies.
//!
//! ## Overview
//!
//! This library provides an immutable, versioned ordered-set container.
//! Every mutation yields a new version of the set; old versions remain
//! fully usable and share all unchanged structure with the new one. It
//! includes:
//!
//! - **`PersistentTreeSet`**: the container, with O(1) versioned copies
//! - **Cursors**: bidirectional positions that pin the version they came from
//! - **Ownership policies**: node lifetime managed by a reference count
//!   (`CountedStore`) or an intrusive alias ring (`AliasRingStore`)
//! - **Exact reclamation**: a node is freed the moment its last owner is gone
//!
//! The tree is deliberately unbalanced; operations cost O(h) where h is
//! the height produced by the insertion order.
//!
//! ## Feature Flags
//!
//! - `serde`: Serialization support for `PersistentTreeSet`
//!
//! ## Example
//!
//! ```rust
//! use verset::PersistentTreeSet;
//!
//! let mut set: PersistentTreeSet<i32> = PersistentTreeSet::new();
//! set.insert(2);
//! set.insert(1);
//!
//! let snapshot = set.clone(); // O(1), shares the tree
//! set.remove(&1);
//!
//! assert_eq!(set.iter().collect::<Vec<i32>>(), vec![2]);
//! assert_eq!(snapshot.iter().collect::<Vec<i32>>(), vec![1, 2]);
//! assert_eq!(set.min(), Some(2));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
// Note: Disabling redundant_closure_for_method_calls due to clippy 0.1.92 panic bug
#![allow(clippy::redundant_closure_for_method_calls)]

/// Prelude module for convenient imports.
///
/// Re-exports commonly used types and traits.
///
/// # Usage
///
/// ```rust
/// use verset::prelude::*;
/// ```
pub mod prelude {
    pub use crate::set::{Cursor, PersistentTreeSet, PersistentTreeSetIterator};
    pub use crate::store::{AliasRingStore, CountedStore, NodeStore};
}

pub mod set;
pub mod store;

mod tree;

pub use set::{Cursor, PersistentTreeSet, PersistentTreeSetIterator};
pub use store::{AliasRingStore, CountedStore, NodeKey, NodeStore};

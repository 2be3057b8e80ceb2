//! A key-value association list shared between threads.
//!
//! [`ConcurrentList`] keeps its entries in a singly linked chain bounded by
//! head and tail sentinels. Structural changes take an exclusive lock,
//! lookups a shared one.

mod linked_list;
mod node_arena;

pub mod bench;
pub mod error;
pub mod options;

#[cfg(test)]
mod test_utils;

pub use linked_list::{ConcurrentList, Key, Value};
pub use node_arena::ArenaStats;

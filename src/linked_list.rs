use std::{fmt, time::Duration};

use parking_lot::RwLock;

use crate::{
    error::{Error, Result},
    node_arena::{ArenaStats, HEAD, Node, NodeArena, NodeId, TAIL},
    options::ListOptions,
};

pub type Key = i64;
pub type Value = i64;

struct ListInner {
    arena: NodeArena,
    count: usize,
}

impl ListInner {
    fn push_front(&mut self, key: Key, value: Value) -> Result<()> {
        let first = self.arena.node(HEAD).next;
        let id = self.arena.allocate(key, value, first)?;
        self.arena.node_mut(HEAD).next = id;
        self.count += 1;
        Ok(())
    }

    fn find(&self, key: Key) -> Option<&Node> {
        self.iter().find(|node| node.key == key)
    }

    fn unlink_first(&mut self, key: Key) -> Option<Value> {
        let mut prev = HEAD;
        let mut cur = self.arena.node(HEAD).next;

        while cur != TAIL {
            let node = *self.arena.node(cur);
            if node.key == key {
                self.arena.node_mut(prev).next = node.next;
                self.arena.release(cur);
                self.count -= 1;
                return Some(node.value);
            }
            prev = cur;
            cur = node.next;
        }

        None
    }

    fn iter(&self) -> Iter<'_> {
        Iter {
            arena: &self.arena,
            cur: self.arena.node(HEAD).next,
        }
    }

    /// Releases every node from head through tail. Calling it again is a no-op.
    fn teardown(&mut self) -> ArenaStats {
        let mut cur = HEAD;
        while let Some(node) = self.arena.release(cur) {
            if cur == TAIL {
                break;
            }
            cur = node.next;
        }
        self.count = 0;
        self.arena.stats()
    }
}

/// Live nodes in head-to-tail order.
struct Iter<'a> {
    arena: &'a NodeArena,
    cur: NodeId,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cur == TAIL {
            return None;
        }
        let node = self.arena.node(self.cur);
        self.cur = node.next;
        Some(node)
    }
}

/// A singly linked key-value list shared between threads.
///
/// Insertions prepend, so the most recently completed insertion for a key
/// is the one lookups and removals see first. Keys are not deduplicated.
///
/// `insert` and `remove` hold the write lock for the whole splice or unlink;
/// lookups hold the read lock for the whole scan.
pub struct ConcurrentList {
    inner: RwLock<ListInner>,
}

impl Default for ConcurrentList {
    fn default() -> Self {
        Self::new()
    }
}

impl ConcurrentList {
    pub fn new() -> Self {
        ListOptions::default().build()
    }

    pub(crate) fn with_options(options: &ListOptions) -> Self {
        let list = Self {
            inner: RwLock::new(ListInner {
                arena: NodeArena::with_capacity(options.initial_capacity),
                count: 0,
            }),
        };
        tracing::debug!(
            "list created, initial capacity {}",
            options.initial_capacity
        );
        list
    }

    /// Prepends `(key, value)` as the new first entry.
    ///
    /// On allocation failure the list is left exactly as it was.
    pub fn insert(&self, key: Key, value: Value) -> Result<()> {
        Self::push_front(&mut self.inner.write(), key, value)
    }

    /// Like [`insert`](Self::insert), but gives up if the lock is not
    /// acquired within `timeout`.
    pub fn try_insert_for(&self, key: Key, value: Value, timeout: Duration) -> Result<()> {
        let mut inner = self
            .inner
            .try_write_for(timeout)
            .ok_or(Error::LockTimeout(timeout))?;
        Self::push_front(&mut inner, key, value)
    }

    fn push_front(inner: &mut ListInner, key: Key, value: Value) -> Result<()> {
        inner.push_front(key, value).inspect_err(|err| {
            tracing::error!("insert of key {} failed: {}", key, err);
        })
    }

    /// Unlinks the first entry with `key`, returning its value.
    pub fn remove(&self, key: Key) -> Option<Value> {
        Self::unlink_first(&mut self.inner.write(), key)
    }

    pub fn try_remove_for(&self, key: Key, timeout: Duration) -> Result<Option<Value>> {
        let mut inner = self
            .inner
            .try_write_for(timeout)
            .ok_or(Error::LockTimeout(timeout))?;
        Ok(Self::unlink_first(&mut inner, key))
    }

    fn unlink_first(inner: &mut ListInner, key: Key) -> Option<Value> {
        let removed = inner.unlink_first(key);
        if removed.is_some() {
            tracing::trace!("removed key {}", key);
        }
        removed
    }

    /// Value of the first entry with `key`, scanning from the head.
    pub fn get(&self, key: Key) -> Option<Value> {
        self.inner.read().find(key).map(|node| node.value)
    }

    pub fn try_get_for(&self, key: Key, timeout: Duration) -> Result<Option<Value>> {
        let inner = self
            .inner
            .try_read_for(timeout)
            .ok_or(Error::LockTimeout(timeout))?;
        Ok(inner.find(key).map(|node| node.value))
    }

    pub fn contains_key(&self, key: Key) -> bool {
        self.inner.read().find(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.read().count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all entries, head first.
    pub fn entries(&self) -> Vec<(Key, Value)> {
        let inner = self.inner.read();
        let mut entries = Vec::with_capacity(inner.count);
        entries.extend(inner.iter().map(|node| (node.key, node.value)));
        entries
    }

    pub fn arena_stats(&self) -> ArenaStats {
        self.inner.read().arena.stats()
    }

    /// Makes the next node allocation fail.
    #[cfg(test)]
    pub(crate) fn fail_next_insert(&self) {
        self.inner.write().arena.fail_next_alloc();
    }

    /// Releases every node, sentinels included, and returns the final
    /// allocation accounting.
    ///
    /// Lists shared through an `Arc` must be reclaimed with
    /// `Arc::into_inner` once every worker has been joined.
    pub fn destroy(mut self) -> ArenaStats {
        let stats = self.inner.get_mut().teardown();
        tracing::debug!(
            "list destroyed, {} allocated, {} released",
            stats.allocated,
            stats.released
        );
        stats
    }
}

impl Drop for ConcurrentList {
    fn drop(&mut self) {
        self.inner.get_mut().teardown();
    }
}

impl fmt::Debug for ConcurrentList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentList")
            .field("len", &self.len())
            .finish()
    }
}

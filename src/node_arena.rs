use crate::{
    error::Result,
    linked_list::{Key, Value},
};

pub(crate) type NodeId = usize;

/// Slot of the head sentinel. Never released while the list is alive.
pub(crate) const HEAD: NodeId = 0;
/// Slot of the tail sentinel. Terminates every scan and is never followed.
pub(crate) const TAIL: NodeId = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Node {
    pub(crate) key: Key,
    pub(crate) value: Value,
    pub(crate) next: NodeId,
}

impl Node {
    // Sentinel key and value are never compared or returned.
    fn sentinel(next: NodeId) -> Self {
        Self {
            key: -1,
            value: -1,
            next,
        }
    }
}

/// Allocation accounting of a list's node storage, sentinels included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArenaStats {
    pub allocated: u64,
    pub released: u64,
}

impl ArenaStats {
    pub fn live(&self) -> u64 {
        self.allocated - self.released
    }
}

/// Node storage addressed by stable indices.
///
/// Released slots are pushed on a free list and handed out again by later
/// allocations. The free list always has room for every slot, so releasing
/// never allocates.
pub(crate) struct NodeArena {
    slots: Vec<Option<Node>>,
    free: Vec<NodeId>,
    stats: ArenaStats,
    #[cfg(test)]
    fail_next_alloc: bool,
}

impl NodeArena {
    /// Creates the arena with head linked straight to tail.
    ///
    /// Aborts the process if the sentinels cannot be allocated.
    pub(crate) fn with_capacity(cap: usize) -> Self {
        let total = cap.saturating_add(2);
        let mut slots = Vec::with_capacity(total);
        slots.push(Some(Node::sentinel(TAIL)));
        slots.push(Some(Node::sentinel(TAIL)));

        Self {
            slots,
            free: Vec::with_capacity(total),
            stats: ArenaStats {
                allocated: 2,
                released: 0,
            },
            #[cfg(test)]
            fail_next_alloc: false,
        }
    }

    pub(crate) fn allocate(&mut self, key: Key, value: Value, next: NodeId) -> Result<NodeId> {
        #[cfg(test)]
        self.take_injected_failure()?;

        let node = Node { key, value, next };
        let id = match self.free.pop() {
            Some(id) => {
                self.slots[id] = Some(node);
                id
            }
            None => {
                self.slots.try_reserve(1)?;
                self.free.try_reserve(self.slots.len() + 1)?;
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };

        self.stats.allocated += 1;
        Ok(id)
    }

    /// Frees the slot, returning its node. Releasing a vacant slot is a no-op.
    pub(crate) fn release(&mut self, id: NodeId) -> Option<Node> {
        let node = self.slots.get_mut(id)?.take()?;
        self.free.push(id);
        self.stats.released += 1;
        Some(node)
    }

    pub(crate) fn node(&self, id: NodeId) -> &Node {
        self.slots[id]
            .as_ref()
            .unwrap_or_else(|| panic!("node {id} is not allocated"))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.slots[id]
            .as_mut()
            .unwrap_or_else(|| panic!("node {id} is not allocated"))
    }

    pub(crate) fn stats(&self) -> ArenaStats {
        self.stats
    }

    #[cfg(test)]
    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }

    #[cfg(test)]
    pub(crate) fn fail_next_alloc(&mut self) {
        self.fail_next_alloc = true;
    }

    #[cfg(test)]
    fn take_injected_failure(&mut self) -> Result<()> {
        if std::mem::take(&mut self.fail_next_alloc) {
            Vec::<Node>::new().try_reserve(usize::MAX)?;
        }
        Ok(())
    }
}

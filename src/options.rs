use crate::{
    ConcurrentList,
    error::{Error, Result},
};

#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub(crate) initial_capacity: usize,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预留的节点槽位数，不含两个哨兵
    pub fn initial_capacity(&mut self, cap: usize) -> &mut Self {
        self.initial_capacity = cap;
        self
    }

    pub fn build(&self) -> ConcurrentList {
        ConcurrentList::with_options(self)
    }
}

#[derive(Debug, Clone)]
pub struct BenchOptions {
    pub(crate) threads: usize,

    pub(crate) ops_per_thread: usize,

    pub(crate) single_thread_ops: usize,
}

impl Default for BenchOptions {
    fn default() -> Self {
        Self {
            threads: 4,
            ops_per_thread: 250_000,
            single_thread_ops: 1_000_000,
        }
    }
}

impl BenchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// 多线程阶段的工作线程数
    pub fn threads(&mut self, threads: usize) -> &mut Self {
        self.threads = threads;
        self
    }

    /// 每个工作线程插入的键数，各线程键区间互不重叠
    pub fn ops_per_thread(&mut self, ops: usize) -> &mut Self {
        self.ops_per_thread = ops;
        self
    }

    /// 单线程阶段插入的键数
    pub fn single_thread_ops(&mut self, ops: usize) -> &mut Self {
        self.single_thread_ops = ops;
        self
    }

    pub fn multi_thread_ops(&self) -> usize {
        self.threads * self.ops_per_thread
    }

    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 {
            return Err(Error::InvalidOptions(
                "threads must be greater than 0".to_string(),
            ));
        }
        let top_key = self
            .threads
            .checked_mul(self.ops_per_thread)
            .and_then(|n| i64::try_from(n).ok())
            .and_then(|n| n.checked_mul(10));
        if top_key.is_none() || i64::try_from(self.single_thread_ops.saturating_mul(10)).is_err() {
            return Err(Error::InvalidOptions(
                "workload keys overflow the key range".to_string(),
            ));
        }
        Ok(())
    }
}

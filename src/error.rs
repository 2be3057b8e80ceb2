use std::{collections::TryReserveError, time::Duration};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Alloc: {0}")]
    Alloc(#[from] TryReserveError),

    #[error("Lock not acquired within {0:?}")]
    LockTimeout(Duration),

    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Worker: {0}")]
    Worker(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

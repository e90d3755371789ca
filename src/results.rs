#[derive(::thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error(
        "Cache configuration n={n} key_size={key_size} \
         record_size={record_size} capacity={capacity} is invalid"
    )]
    Geometry {
        n: u32,
        key_size: u32,
        record_size: u32,
        capacity: u32,
    },
    #[error("block {block} is invalid. Must be below {block_count}")]
    BlockOutOfRange { block: u32, block_count: u32 },
    #[error("key is {actual} bytes, cache keys are {expected} bytes")]
    KeyLength { expected: usize, actual: usize },
    #[error("group {group} is invalid")]
    InvalidGroup { group: usize },
    #[error("priority table is full ({capacity} entries)")]
    PriorityListFull { capacity: usize },
    #[error("unknown action '{0}'")]
    UnknownAction(String),
    #[error("formatting error")]
    Fmt(#[from] ::std::fmt::Error),
}

/// How a search got its record
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum Outcome {
    /// the key was already in the cache
    Hit,
    /// not found, but the block had a free record
    Vacant,
    /// not found, the oldest record of the block was flushed
    Evicted,
}

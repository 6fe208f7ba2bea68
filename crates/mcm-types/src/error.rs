use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("negative index {0} is not a valid slot")]
    NegativeIndex(i32),

    #[error("ledger entry {position} repeats old index {old}")]
    RepeatedOldIndex { position: usize, old: i32 },

    #[error("ledger assigns new index {new}, expected {expected}")]
    NonContiguousNewIndex { new: i32, expected: i32 },
}

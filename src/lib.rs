//! In-memory write buffer for a log-structured storage engine: a
//! concurrent skiplist with one writer and lock-free readers, backed by a
//! bump arena that owns every node until the buffer is dropped.

mod cmp;
mod codec;
mod error;
mod memtable;
mod options;
mod skiplist;
mod slice;
mod types;
mod utils;

#[cfg(test)]
mod datadriven;

pub use cmp::{BitWiseComparator, Comparator};
pub use error::{Error, Result};
pub use memtable::{
    Entry, LookupKey, LookupResult, MemTable, MemTableIter, MemTableKeyComparator, UserComparator,
};
pub use options::{Options, BLOCK_SIZE, DEFAULT_BRANCHING, DEFAULT_MAX_HEIGHT, MAX_HEIGHT_LIMIT};
pub use skiplist::{random_height, Iter, Keys, SkipList};
pub use slice::UnsafeSlice;
pub use types::{SequenceNumber, ValueType, MAX_SEQUENCE_NUMBER};
pub use utils::arena::{Arena, ALIGN, BLOCK_OVERHEAD};

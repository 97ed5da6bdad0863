//! The two in-memory stores behind the service: a byte-keyed string
//! dictionary and an indexed sorted set (member dictionary plus score-ordered
//! skip-list, kept mutually consistent). Both are plain owned values with no
//! interior mutability; the single-threaded event loop owns them outright,
//! and harnesses that want concurrent readers can wrap them in an `RwLock`.

mod skiplist;
mod snapshot;
mod sorted_set;
mod strings;

pub use skiplist::{DEFAULT_MAX_LEVEL, SkipList};
pub use snapshot::SnapshotError;
pub use sorted_set::SortedSet;
pub use strings::StrStore;

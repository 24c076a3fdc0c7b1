//! Background work for the stash: a cancellable periodic ticker and the
//! sweeper that uses it to evict expired entries.

pub(crate) mod sweeper;
pub(crate) mod ticker;

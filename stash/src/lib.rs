//! An in-process, concurrent stash of values under string keys, where every
//! entry carries its own expiration policy.
//!
//! # Features
//! - **Per-entry expiration**: a fixed age, a sliding idle window, an absolute
//!   deadline, a custom condition, or any combination of them (the entry
//!   expires as soon as one of them holds).
//! - **Single-flight loading**: `get_with` runs the producer at most once per
//!   miss, no matter how many threads ask for the same key at the same time.
//! - **Self-parking sweeper**: expired entries are reclaimed by a background
//!   thread that only exists while there is something that can expire.
//! - **Global stash**: a lazily created process-wide instance behind the
//!   free functions in [`global`].
//!
//! ```
//! use fibre_stash::{expires, Expires, Stash};
//!
//! let stash = Stash::new();
//! let config = stash.get_with("config", || ("loaded".to_string(), expires().after_minutes_idle(20).after_hours(1)));
//! assert_eq!(config.as_str(), "loaded");
//!
//! stash.set("pinned", "forever".to_string(), Expires::Never);
//! assert!(stash.has("pinned"));
//! ```

// Public modules that form the API
pub mod builder;
pub mod error;
pub mod expiration;
pub mod global;
pub mod handles;
pub mod metrics;

// Internal, crate-only modules
mod entry;
mod lock_table;
mod shared;
mod store;
mod task;
mod time;

// Re-export the primary user-facing types for convenience
pub use builder::StashBuilder;
pub use error::BuildError;
pub use expiration::{expires, Condition, Expiration, Expires};
pub use handles::Stash;
pub use metrics::MetricsSnapshot;

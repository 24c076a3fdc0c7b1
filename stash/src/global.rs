//! The process-wide stash and free functions that delegate to it.
//!
//! The global stash is created on first use, never expires entries by
//! default, and can hold values of any type: each function downcasts to the
//! requested `T`. Reading a key that holds a value of another type yields
//! `None`.
//!
//! ```
//! use fibre_stash::{expires, global};
//!
//! let greeting = global::get_with("greeting", || ("hello".to_string(), expires().after_minutes(10)));
//! assert_eq!(greeting.as_deref().map(String::as_str), Some("hello"));
//! assert!(global::get::<u64>("greeting").is_none());
//! ```

use crate::expiration::Expires;
use crate::handles::Stash;

use std::any::Any;
use std::sync::Arc;

use once_cell::sync::Lazy;

/// A type-erased value held by the global stash.
pub type AnyValue = Arc<dyn Any + Send + Sync>;

// Created on its first access in a thread-safe manner.
static GLOBAL_STASH: Lazy<Stash<AnyValue>> = Lazy::new(Stash::new);

/// Provides a reference to the global stash.
pub fn shared() -> &'static Stash<AnyValue> {
  &GLOBAL_STASH
}

fn downcast<T>(value: Arc<AnyValue>) -> Option<Arc<T>>
where
  T: Any + Send + Sync,
{
  AnyValue::clone(&value).downcast::<T>().ok()
}

fn erase<T, X>((value, expires): (T, X)) -> (AnyValue, X)
where
  T: Any + Send + Sync,
{
  (Arc::new(value), expires)
}

/// See [`Stash::get`].
pub fn get<T>(key: &str) -> Option<Arc<T>>
where
  T: Any + Send + Sync,
{
  shared().get(key).and_then(downcast)
}

/// See [`Stash::get_with`]. `None` only if `key` holds a value of another type.
pub fn get_with<T, F, X>(key: &str, producer: F) -> Option<Arc<T>>
where
  T: Any + Send + Sync,
  F: FnOnce() -> (T, X),
  X: Into<Expires>,
{
  downcast(shared().get_with(key, || erase(producer())))
}

/// See [`Stash::try_get_with`]. `Ok(None)` only if `key` holds a value of
/// another type.
pub fn try_get_with<T, F, X, E>(key: &str, producer: F) -> Result<Option<Arc<T>>, E>
where
  T: Any + Send + Sync,
  F: FnOnce() -> Result<(T, X), E>,
  X: Into<Expires>,
{
  shared()
    .try_get_with(key, || producer().map(erase))
    .map(downcast)
}

/// See [`Stash::set`].
pub fn set<T>(key: impl Into<String>, value: T, expires: impl Into<Expires>)
where
  T: Any + Send + Sync,
{
  shared().set(key, Arc::new(value) as AnyValue, expires);
}

/// See [`Stash::has`].
pub fn has(key: &str) -> bool {
  shared().has(key)
}

/// See [`Stash::remove`].
pub fn remove(key: &str) -> bool {
  shared().remove(key)
}

/// See [`Stash::set_expires`].
pub fn set_expires(key: &str, expires: impl Into<Expires>) -> bool {
  shared().set_expires(key, expires)
}

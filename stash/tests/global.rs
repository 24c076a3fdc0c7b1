use fibre_stash::{expires, global, Expires};
use pretty_assertions::assert_eq;
use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;

#[test]
#[serial]
fn test_shared_is_a_singleton() {
  let first = global::shared() as *const _;
  let second = global::shared() as *const _;
  assert!(std::ptr::eq(first, second));
  assert!(global::shared().default_expiration().is_never());
}

#[test]
#[serial]
fn test_global_get_with_and_get() {
  let value = global::get_with("global-config", || {
    (vec!["alpha".to_string(), "beta".to_string()], expires().after_minutes(10))
  })
  .unwrap();
  assert_eq!(*value, vec!["alpha".to_string(), "beta".to_string()]);

  // A second producer never runs on a hit.
  let again = global::get_with("global-config", || -> (Vec<String>, Expires) {
    panic!("producer must not run on a hit")
  })
  .unwrap();
  assert!(Arc::ptr_eq(&value, &again));

  let read = global::get::<Vec<String>>("global-config").unwrap();
  assert_eq!(read.len(), 2);
  assert!(global::remove("global-config"));
}

#[test]
#[serial]
fn test_global_type_mismatch_reads_as_none() {
  global::set("global-number", 7_u32, Expires::Never);
  assert!(global::has("global-number"));
  assert_eq!(global::get::<u32>("global-number").as_deref(), Some(&7));
  assert!(global::get::<u64>("global-number").is_none());
  assert!(global::get_with("global-number", || (String::new(), Expires::Never)).is_none());
  assert!(global::remove("global-number"));
}

#[test]
#[serial]
fn test_global_set_expires_and_remove() {
  assert!(!global::set_expires("global-missing", Expires::Never));

  global::set("global-session", "token".to_string(), Expires::Never);
  assert!(global::set_expires("global-session", expires().after_idle_duration(Duration::from_secs(60))));
  let stored = global::shared().expiration("global-session").unwrap();
  assert_eq!(stored.idle(), Some(Duration::from_secs(60)));

  assert!(global::remove("global-session"));
  assert!(!global::has("global-session"));
  assert!(!global::remove("global-session"));
}

#[test]
#[serial]
fn test_global_try_get_with_propagates_errors() {
  let result = global::try_get_with::<i32, _, Expires, _>("global-flaky", || Err("backend down"));
  assert_eq!(result.unwrap_err(), "backend down");
  assert!(!global::has("global-flaky"));

  let result = global::try_get_with("global-flaky", || Ok::<_, &str>((5_i32, Expires::Never)));
  assert_eq!(result.unwrap().as_deref(), Some(&5));
  assert!(global::remove("global-flaky"));
}

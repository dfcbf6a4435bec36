//! Assertion macros over a view's current snapshot.

/// Assert that a view's flattened data equals a JSON literal.
#[macro_export]
macro_rules! assert_data {
    ($store:expr, $expected:expr) => {{
        let actual = $store.current_data();
        let expected = $crate::optica_core::Value::from($expected);
        assert_eq!(
            actual,
            expected,
            "Unexpected data in `{}`: {}",
            $store.path(),
            actual
        )
    }};
}

/// Assert a view's aggregate status.
#[macro_export]
macro_rules! assert_status {
    ($store:expr, $status:expr) => {
        assert_eq!(
            $store.current_status(),
            $status,
            "Unexpected status of `{}`",
            $store.path()
        )
    };
}

/// Assert the status of one loadable slot.
#[macro_export]
macro_rules! assert_slot {
    ($store:expr, $key:expr, $status:expr) => {{
        let raw = $store.current_raw_state();
        let slot = raw.loadable_values.get($key);
        assert!(slot.is_some(), "No slot `{}` in `{}`", $key, $store.path());
        assert_eq!(
            slot.map(|slot| slot.status),
            Some($status),
            "Unexpected status of slot `{}` in `{}`",
            $key,
            $store.path()
        )
    }};
}

/// Helper to read an integer out of a view's data.
pub fn int_at(data: &optica_core::Value, path: &[&str]) -> Option<i64> {
    data.get_path(path).and_then(optica_core::Value::as_i64)
}

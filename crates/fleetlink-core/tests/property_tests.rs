//! Property-based tests for status conversions and the error policy table.

use fleetlink_core::{DeviceStatus, ErrorKind};
use proptest::prelude::*;

fn any_status() -> impl Strategy<Value = DeviceStatus> {
    prop::sample::select(DeviceStatus::ALL.to_vec())
}

fn any_kind() -> impl Strategy<Value = ErrorKind> {
    prop::sample::select(ErrorKind::ALL.to_vec())
}

proptest! {
    /// Property: code, name and display text all map back to the same status.
    #[test]
    fn prop_status_roundtrip(status in any_status()) {
        prop_assert_eq!(DeviceStatus::from_code(status.code()), status);
        prop_assert_eq!(DeviceStatus::from_label(status.as_str()), status);
        prop_assert_eq!(DeviceStatus::from_label(&status.as_str().to_lowercase()), status);
        prop_assert_eq!(DeviceStatus::from_label(status.description()), status);
    }

    /// Property: codes outside 1..=4 never produce a known status.
    #[test]
    fn prop_unknown_codes(code in any::<i64>().prop_filter("known code", |c| !(1..=4).contains(c))) {
        prop_assert_eq!(DeviceStatus::from_code(code), DeviceStatus::Unknown);
    }

    /// Property: arbitrary text never panics and only known labels resolve.
    #[test]
    fn prop_from_label_total(label in ".{0,24}") {
        let status = DeviceStatus::from_label(&label);
        if status != DeviceStatus::Unknown {
            let trimmed = label.trim();
            let recognized = trimmed.parse::<i64>().is_ok()
                || trimmed.eq_ignore_ascii_case(status.as_str())
                || trimmed == status.description();
            prop_assert!(recognized);
        }
    }

    /// Property: no kind is both retryable and critical.
    #[test]
    fn prop_retryable_and_critical_disjoint(kind in any_kind()) {
        prop_assert!(!(kind.is_retryable() && kind.is_critical()));
    }
}

#[test]
fn test_policy_table_is_fixed() {
    let retryable: Vec<_> = ErrorKind::ALL
        .into_iter()
        .filter(|k| k.is_retryable())
        .collect();
    let critical: Vec<_> = ErrorKind::ALL
        .into_iter()
        .filter(|k| k.is_critical())
        .collect();

    assert_eq!(
        retryable,
        vec![
            ErrorKind::ConnectionTimeout,
            ErrorKind::OperationTimeout,
            ErrorKind::NetworkError,
            ErrorKind::DeviceBusy,
            ErrorKind::ResourceExhausted,
            ErrorKind::TemporaryError,
        ]
    );
    assert_eq!(
        critical,
        vec![
            ErrorKind::AuthenticationFailed,
            ErrorKind::PermissionDenied,
            ErrorKind::DeviceNotSupported,
            ErrorKind::DeviceFault,
            ErrorKind::ConfigurationError,
        ]
    );
}

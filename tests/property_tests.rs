//! Property-based tests for the pure derivation rules using proptest

use meshwatch::IpStatus;
use meshwatch::reconciler::canonical_ip_status;
use proptest::prelude::*;

// Property: reservation always wins, regardless of assignment activity
proptest! {
    #[test]
    fn prop_reserved_always_derives_reserved(has_active in any::<bool>()) {
        prop_assert_eq!(canonical_ip_status(true, has_active), IpStatus::Reserved);
    }
}

// Property: ASSIGNED exactly when unreserved with an active assignment
proptest! {
    #[test]
    fn prop_assigned_iff_unreserved_and_active(
        is_reserved in any::<bool>(),
        has_active in any::<bool>(),
    ) {
        let status = canonical_ip_status(is_reserved, has_active);
        prop_assert_eq!(status == IpStatus::Assigned, !is_reserved && has_active);
    }
}

// Property: the derivation never produces OFFLINE — that status can only be
// set by operators, and any sync pass erases it
proptest! {
    #[test]
    fn prop_derivation_never_offline(
        is_reserved in any::<bool>(),
        has_active in any::<bool>(),
    ) {
        prop_assert_ne!(canonical_ip_status(is_reserved, has_active), IpStatus::Offline);
    }
}

// Property: the derivation is a pure function of its two inputs - repeated
// evaluation is stable
proptest! {
    #[test]
    fn prop_derivation_stable(
        is_reserved in any::<bool>(),
        has_active in any::<bool>(),
    ) {
        let first = canonical_ip_status(is_reserved, has_active);
        let second = canonical_ip_status(is_reserved, has_active);
        prop_assert_eq!(first, second);
    }
}

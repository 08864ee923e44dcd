//! The override is process-wide, so everything touching it lives in this one test binary and a
//! single test function.

use formula_binio::limits::{
    allocation_override, check_length, set_allocation_override, AllocationOverride,
};

#[test]
fn process_wide_override_replaces_and_disables_caps() {
    set_allocation_override(None);
    assert!(check_length(2_000, 1_000).is_err());

    set_allocation_override(Some(AllocationOverride::Global(10_000)));
    assert_eq!(
        allocation_override(),
        Some(AllocationOverride::Global(10_000))
    );
    assert_eq!(check_length(2_000, 1_000).unwrap(), 2_000);
    assert!(check_length(10_001, 1_000_000).is_err());

    set_allocation_override(Some(AllocationOverride::Unlimited));
    assert_eq!(check_length(1 << 32, 16).unwrap(), 1 << 32);

    set_allocation_override(None);
    assert!(check_length(17, 16).is_err());
}

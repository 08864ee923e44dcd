//! Bounded allocation for lengths taken from untrusted input.
//!
//! Every decoder that sizes a buffer from a length field routes that length through
//! [`check_length`] with a cap chosen for the call site (for example the largest payload a record
//! type can legitimately carry). A corrupt or hostile length therefore fails with
//! [`Error::AllocationTooLarge`] before any memory proportional to it is requested.
//!
//! Operators that knowingly process abnormally large (but legitimate) files can replace the
//! per-call-site caps with a single global cap, or disable the check, via
//! [`set_allocation_override`] or the `FORMULA_BINIO_MAX_ALLOCATION` environment variable
//! (a byte count, or `unlimited`).
//!
//! The override is process-wide configuration. Set it once during startup, before any decoding
//! begins; changing it while other threads decode is memory-safe but makes their limits
//! unpredictable.

use std::sync::{Mutex, OnceLock};

use crate::{Error, Result};

const ENV_MAX_ALLOCATION: &str = "FORMULA_BINIO_MAX_ALLOCATION";

/// Upper bound on the capacity reserved up front for growable buffers whose final size comes
/// from untrusted input. Buffers still grow past this; they just don't start there.
pub const MAX_PREALLOC_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationOverride {
    /// Ignore per-call-site caps and apply this single cap instead.
    Global(usize),
    /// Disable the check entirely (lengths must still fit in `usize`).
    Unlimited,
}

fn override_slot() -> &'static Mutex<Option<AllocationOverride>> {
    static SLOT: OnceLock<Mutex<Option<AllocationOverride>>> = OnceLock::new();
    SLOT.get_or_init(|| {
        let initial = std::env::var(ENV_MAX_ALLOCATION)
            .ok()
            .and_then(|v| parse_override(&v));
        if let Some(initial) = initial {
            log::debug!("allocation override from {ENV_MAX_ALLOCATION}: {initial:?}");
        }
        Mutex::new(initial)
    })
}

/// Parse the `FORMULA_BINIO_MAX_ALLOCATION` syntax.
pub fn parse_override(value: &str) -> Option<AllocationOverride> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("unlimited") {
        return Some(AllocationOverride::Unlimited);
    }
    value.parse::<usize>().ok().map(AllocationOverride::Global)
}

/// Install (or clear, with `None`) the process-wide allocation override.
pub fn set_allocation_override(value: Option<AllocationOverride>) {
    let mut slot = match override_slot().lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    *slot = value;
}

pub fn allocation_override() -> Option<AllocationOverride> {
    match override_slot().lock() {
        Ok(guard) => *guard,
        Err(poisoned) => *poisoned.into_inner(),
    }
}

/// Validate `requested` against the call site's `max`, honouring the process-wide override.
pub fn check_length(requested: u64, max: usize) -> Result<usize> {
    check_length_with(requested, max, allocation_override())
}

/// Same as [`check_length`] with an explicit override instead of the process-wide one.
pub fn check_length_with(
    requested: u64,
    max: usize,
    override_: Option<AllocationOverride>,
) -> Result<usize> {
    let cap = match override_ {
        None => Some(max),
        Some(AllocationOverride::Global(global)) => Some(global),
        Some(AllocationOverride::Unlimited) => None,
    };

    let too_large = |max: usize| Error::AllocationTooLarge { requested, max };
    let len = usize::try_from(requested).map_err(|_| too_large(cap.unwrap_or(usize::MAX)))?;
    match cap {
        Some(cap) if len > cap => Err(too_large(cap)),
        _ => Ok(len),
    }
}

/// Allocate a zeroed buffer of `len` bytes after checking it against `max`.
pub fn safely_allocate(len: u64, max: usize) -> Result<Vec<u8>> {
    let len = check_length(len, max)?;
    Ok(vec![0u8; len])
}

/// Defensive copy of `src[offset..offset + len]`, clamped to the bytes actually available.
///
/// The copied length (not the requested one) is checked against `max`.
pub fn safely_clone(src: &[u8], offset: usize, len: usize, max: usize) -> Result<Vec<u8>> {
    if offset > src.len() {
        return Err(Error::InvalidRange {
            offset,
            len: src.len(),
        });
    }
    let real_len = len.min(src.len() - offset);
    let real_len = check_length(real_len as u64, max)?;
    Ok(src[offset..offset + real_len].to_vec())
}

/// Initial capacity for a buffer expected to reach `len` bytes.
pub fn initial_capacity(len: usize) -> usize {
    len.min(MAX_PREALLOC_BYTES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_max_and_rejects_max_plus_one() {
        assert_eq!(check_length_with(100, 100, None).unwrap(), 100);
        match check_length_with(101, 100, None) {
            Err(Error::AllocationTooLarge { requested, max }) => {
                assert_eq!(requested, 101);
                assert_eq!(max, 100);
            }
            other => panic!("expected AllocationTooLarge, got {other:?}"),
        }
    }

    #[test]
    fn global_override_replaces_call_site_cap() {
        let ov = Some(AllocationOverride::Global(1_000));
        assert_eq!(check_length_with(500, 10, ov).unwrap(), 500);
        assert!(matches!(
            check_length_with(1_001, 1_000_000, ov),
            Err(Error::AllocationTooLarge { max: 1_000, .. })
        ));
    }

    #[test]
    fn unlimited_override_disables_check() {
        let ov = Some(AllocationOverride::Unlimited);
        assert_eq!(check_length_with(1 << 30, 16, ov).unwrap(), 1 << 30);
    }

    #[test]
    fn error_message_names_both_lengths() {
        let err = check_length_with(5_000, 4_096, None).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("5000"), "msg={msg}");
        assert!(msg.contains("4096"), "msg={msg}");
    }

    #[test]
    fn parses_override_values() {
        assert_eq!(parse_override("unlimited"), Some(AllocationOverride::Unlimited));
        assert_eq!(parse_override(" UNLIMITED "), Some(AllocationOverride::Unlimited));
        assert_eq!(
            parse_override("1048576"),
            Some(AllocationOverride::Global(1_048_576))
        );
        assert_eq!(parse_override("-1"), None);
        assert_eq!(parse_override("lots"), None);
    }

    #[test]
    fn safely_clone_clamps_to_available_bytes() {
        let src = [1u8, 2, 3, 4, 5];
        assert_eq!(safely_clone(&src, 1, 3, 16).unwrap(), vec![2, 3, 4]);
        assert_eq!(safely_clone(&src, 3, 100, 16).unwrap(), vec![4, 5]);
        assert_eq!(safely_clone(&src, 5, 1, 16).unwrap(), Vec::<u8>::new());
        assert!(matches!(
            safely_clone(&src, 6, 1, 16),
            Err(Error::InvalidRange { offset: 6, len: 5 })
        ));
    }

    #[test]
    fn safely_clone_checks_clamped_length() {
        let src = [0u8; 32];
        // Requested length is huge but only 32 bytes exist; the clamped length is what counts.
        assert_eq!(safely_clone(&src, 0, usize::MAX, 32).unwrap().len(), 32);
        assert!(safely_clone(&src, 0, usize::MAX, 31).is_err());
    }

    #[test]
    fn initial_capacity_is_capped() {
        assert_eq!(initial_capacity(10), 10);
        assert_eq!(initial_capacity(usize::MAX), MAX_PREALLOC_BYTES);
    }
}

#![no_main]

use libfuzzer_sys::fuzz_target;

use formula_hpsf::PropertySet;

const MAX_INPUT_BYTES: usize = 64 * 1024;

fuzz_target!(|data: &[u8]| {
    let data = if data.len() > MAX_INPUT_BYTES {
        &data[..MAX_INPUT_BYTES]
    } else {
        data
    };

    let Ok(set) = PropertySet::parse(data) else {
        return;
    };

    // Text that decoded under a narrow codepage may not encode back (lossy fallback decode), so
    // only a successful write is checked for stability.
    let Ok(bytes) = set.to_bytes() else {
        return;
    };
    match PropertySet::parse(&bytes) {
        Ok(again) => assert_eq!(again.to_bytes().ok(), Some(bytes)),
        Err(err) => panic!("re-encoded property set failed to parse: {err}"),
    }
});

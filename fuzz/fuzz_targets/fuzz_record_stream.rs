#![no_main]

use libfuzzer_sys::fuzz_target;

use formula_biff_records::{
    decode_record_stream, encode_record_stream, DecodeOptions, DecodePolicy,
};

/// Keep the harness itself bounded; a few hundred records is plenty to reach every decoder.
const MAX_INPUT_BYTES: usize = 64 * 1024;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    let data = if data.len() > MAX_INPUT_BYTES {
        &data[..MAX_INPUT_BYTES]
    } else {
        data
    };

    // The first byte picks the options; the rest is the stream.
    let selector = data[0];
    let options = DecodeOptions {
        policy: if selector & 0b1 == 0 {
            DecodePolicy::Strict
        } else {
            DecodePolicy::Degrade
        },
        stop_at_eof: selector & 0b10 != 0,
        ..DecodeOptions::default()
    };
    let stream = &data[1..];

    let Ok(records) = decode_record_stream(stream, options) else {
        return;
    };

    // Whatever decodes must encode, and the encoding must be a fixed point. Bytes are compared
    // rather than records so NaN payloads do not count as differences.
    let encoded = match encode_record_stream(&records, Vec::new()) {
        Ok(encoded) => encoded,
        Err(err) => panic!("decoded records failed to encode: {err}"),
    };
    let options = DecodeOptions {
        stop_at_eof: false,
        ..options
    };
    let again = match decode_record_stream(&encoded, options) {
        Ok(again) => again,
        Err(err) => panic!("re-encoded stream failed to decode: {err}"),
    };
    assert_eq!(again.len(), records.len());
    match encode_record_stream(&again, Vec::new()) {
        Ok(reencoded) => assert!(reencoded == encoded, "encoding is not stable"),
        Err(err) => panic!("records failed to encode a second time: {err}"),
    }
});

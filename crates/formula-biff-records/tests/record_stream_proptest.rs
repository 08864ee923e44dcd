use formula_biff_records::continuable::ContinuableWriter;
use formula_biff_records::registry::RECORD_SPECS;
use formula_biff_records::{
    decode_record_stream, encode_record_stream, BiffRecord, DecodeOptions, DecodePolicy,
    FormatRun, LengthPrefix, RecordInput, SstRecord, StringRecord, XlString,
};
use proptest::prelude::*;

fn raw_frame(sid: u16, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&sid.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

/// Frames with a known sid (or CONTINUE) and arbitrary payloads, so typed decoders see garbage.
fn known_sid_frames() -> impl Strategy<Value = Vec<u8>> {
    let sid = prop_oneof![
        (0..RECORD_SPECS.len()).prop_map(|i| RECORD_SPECS[i].sid),
        Just(0x003C_u16),
        any::<u16>(),
    ];
    proptest::collection::vec((sid, proptest::collection::vec(any::<u8>(), 0..64)), 0..16)
        .prop_map(|frames| {
            frames
                .iter()
                .flat_map(|(sid, payload)| raw_frame(*sid, payload))
                .collect()
        })
}

fn xl_string() -> impl Strategy<Value = XlString> {
    prop_oneof![built_xl_string(), read_xl_string()]
}

fn built_xl_string() -> impl Strategy<Value = XlString> {
    (
        "[a-zé€Ω ]{0,40}",
        proptest::collection::vec((any::<u16>(), any::<u16>()), 0..3),
        proptest::option::of(proptest::collection::vec(any::<u8>(), 0..12)),
    )
        .prop_map(|(text, runs, ext)| {
            let runs = runs
                .into_iter()
                .map(|(char_pos, font_index)| FormatRun {
                    char_pos,
                    font_index,
                })
                .collect();
            let s = XlString::new(text).unwrap().with_runs(runs).unwrap();
            match ext {
                Some(ext) => s.with_ext_rst(ext),
                None => s,
            }
        })
}

/// Strings as a file may hold them: UTF-16 for text that would compress, reserved option bits,
/// a rich-text flag with no runs and unpaired surrogates.
fn read_xl_string() -> impl Strategy<Value = XlString> {
    let unit = prop_oneof![
        4 => 0x20u16..0x100,
        1 => 0x0100u16..0xD800,
        1 => 0xD800u16..0xE000,
    ];
    (
        proptest::collection::vec(unit, 0..40),
        any::<bool>(),
        any::<u8>(),
        any::<bool>(),
        proptest::collection::vec(any::<[u8; 4]>(), 0..3),
        proptest::option::of(proptest::collection::vec(any::<u8>(), 0..12)),
    )
        .prop_map(|(units, wide, reserved, rich, runs, ext)| {
            let wide = wide || units.iter().any(|&u| u > 0xFF);
            let mut flags = reserved & 0xF2;
            if wide {
                flags |= 0x01;
            }
            if rich || !runs.is_empty() {
                flags |= 0x08;
            }
            if ext.is_some() {
                flags |= 0x04;
            }

            let mut payload = Vec::new();
            payload.extend_from_slice(&(units.len() as u16).to_le_bytes());
            payload.push(flags);
            if flags & 0x08 != 0 {
                payload.extend_from_slice(&(runs.len() as u16).to_le_bytes());
            }
            if let Some(ext) = &ext {
                payload.extend_from_slice(&(ext.len() as u32).to_le_bytes());
            }
            for &u in &units {
                if wide {
                    payload.extend_from_slice(&u.to_le_bytes());
                } else {
                    payload.push(u as u8);
                }
            }
            for run in &runs {
                payload.extend_from_slice(run);
            }
            if let Some(ext) = &ext {
                payload.extend_from_slice(ext);
            }

            let record = StringRecord::decode(&RecordInput::new(StringRecord::SID, &payload)).unwrap();
            assert_eq!(record.to_payload(), payload);
            record.value
        })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        rng_seed: proptest::test_runner::RngSeed::Fixed(0),
        max_shrink_iters: 0,
        failure_persistence: None,
        .. ProptestConfig::default()
    })]

    #[test]
    fn arbitrary_bytes_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..=2048)) {
        for policy in [DecodePolicy::Strict, DecodePolicy::Degrade] {
            let options = DecodeOptions { policy, ..DecodeOptions::default() };
            let result = std::panic::catch_unwind(|| decode_record_stream(&bytes, options));
            prop_assert!(result.is_ok(), "decode_record_stream panicked");
        }
    }

    #[test]
    fn garbage_payloads_under_known_sids_never_panic(bytes in known_sid_frames()) {
        let options = DecodeOptions { policy: DecodePolicy::Degrade, ..DecodeOptions::default() };
        let result = std::panic::catch_unwind(|| {
            decode_record_stream(&bytes, options)
                .map(|records| encode_record_stream(&records, Vec::new()))
        });
        prop_assert!(result.is_ok(), "decode or re-encode panicked");
        // Well-formed framing with every payload error degraded: the stream always decodes.
        let decoded = result.unwrap();
        prop_assert!(decoded.is_ok());
        prop_assert!(decoded.unwrap().is_ok());
    }

    #[test]
    fn sst_strings_survive_any_frame_size(
        strings in proptest::collection::vec(xl_string(), 0..24),
        max_fragment in 16usize..64,
    ) {
        let mut out = ContinuableWriter::with_max_fragment(max_fragment);
        out.write_u32(strings.len() as u32);
        out.write_u32(strings.len() as u32);
        for s in &strings {
            out.write_string(s, LengthPrefix::U16);
        }
        let frame = out.into_frame(SstRecord::SID);
        prop_assert!(frame.fragment_sizes.iter().all(|&n| n <= max_fragment));

        let decoded = SstRecord::decode(&RecordInput::from_frame(&frame)).unwrap();
        prop_assert_eq!(decoded.strings, strings);
    }
}

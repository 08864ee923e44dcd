use formula_hpsf::well_known::{DOCUMENT_SUMMARY_INFORMATION, SUMMARY_INFORMATION};
use formula_hpsf::{PropertySet, Section, Value};
use proptest::prelude::*;

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i16>().prop_map(Value::I2),
        any::<i32>().prop_map(Value::I4),
        any::<u32>().prop_map(Value::UI4),
        any::<i64>().prop_map(Value::I8),
        any::<bool>().prop_map(Value::Bool),
        any::<u64>().prop_map(Value::FileTime),
        (-1.0e9f64..1.0e9).prop_map(Value::R8),
        "[a-zA-Z0-9 äöüß€]{0,24}".prop_map(Value::Lpstr),
        "[a-zA-Z0-9 Ωλ東京]{0,24}".prop_map(Value::Lpwstr),
        proptest::collection::vec(any::<u8>(), 0..20).prop_map(Value::Blob),
    ]
}

fn section(format_id: formula_hpsf::ClassId) -> impl Strategy<Value = Section> {
    (
        prop_oneof![Just(1252u16), Just(1200), Just(65001)],
        proptest::collection::btree_map(2u32..200, scalar(), 0..12),
    )
        .prop_map(move |(codepage, properties)| {
            let mut section = Section::new(format_id);
            section.set_codepage(codepage);
            for (id, value) in properties {
                section.set_property(id, value).unwrap();
            }
            section
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
    fn arbitrary_bytes_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..=1024)) {
        let result = std::panic::catch_unwind(|| PropertySet::parse(&bytes));
        prop_assert!(result.is_ok(), "PropertySet::parse panicked");
    }

    #[test]
    fn mutated_streams_never_panic(
        set in (section(SUMMARY_INFORMATION), section(DOCUMENT_SUMMARY_INFORMATION)),
        flips in proptest::collection::vec((any::<prop::sample::Index>(), any::<u8>()), 1..8),
    ) {
        let mut property_set = PropertySet::new();
        property_set.add_section(set.0);
        property_set.add_section(set.1);
        let mut bytes = property_set.to_bytes().unwrap();
        for (index, value) in flips {
            let at = index.index(bytes.len());
            bytes[at] = value;
        }
        let result = std::panic::catch_unwind(|| PropertySet::parse(&bytes));
        prop_assert!(result.is_ok(), "PropertySet::parse panicked");
    }

    #[test]
    fn built_sets_round_trip(a in section(SUMMARY_INFORMATION), b in section(DOCUMENT_SUMMARY_INFORMATION)) {
        let mut set = PropertySet::new();
        set.add_section(a);
        set.add_section(b);
        let bytes = set.to_bytes().unwrap();
        let reparsed = PropertySet::parse(&bytes).unwrap();
        prop_assert_eq!(&reparsed, &set);
        prop_assert_eq!(reparsed.to_bytes().unwrap(), bytes);
    }
}

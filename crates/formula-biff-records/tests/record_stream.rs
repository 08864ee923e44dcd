use formula_biff_records::framing::substream_offsets;
use formula_biff_records::sid;
use formula_biff_records::{
    decode_record_stream, encode_record_stream, substream, BiffRecord, BofRecord,
    BoundSheetRecord, CodepageRecord, DecodeOptions, DimensionsRecord, EofRecord,
    ExtendedFormatRecord, FontRecord, LabelSstRecord, MulRkRecord, Record, RecordWriter,
    RkCell, RkRecord, RowRecord, SstRecord, SubstreamRecords, UnknownRecord, Window1Record,
    XlString, MAX_RECORD_DATA_SIZE,
};
use pretty_assertions::assert_eq;

fn frame(sid: u16, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&sid.to_le_bytes());
    out.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    out.extend_from_slice(payload);
    out
}

fn sample_workbook() -> Vec<Record> {
    let strings: Vec<XlString> = (0..2500)
        .map(|i| XlString::new(format!("Zeile {i}: Größe Ω")).unwrap())
        .collect();
    let mut row = RowRecord::new(0);
    row.last_column = 3;

    vec![
        BofRecord::new(substream::WORKBOOK_GLOBALS).into(),
        CodepageRecord { codepage: 1200 }.into(),
        Window1Record::default().into(),
        FontRecord::new("Arial", 200).unwrap().into(),
        ExtendedFormatRecord::default().into(),
        BoundSheetRecord::new("Sheet1", 0).unwrap().into(),
        SstRecord::new(strings, 2600).into(),
        EofRecord.into(),
        BofRecord::new(substream::WORKSHEET).into(),
        DimensionsRecord {
            first_row: 0,
            last_row: 1,
            first_column: 0,
            last_column: 3,
            reserved: 0,
        }
        .into(),
        row.into(),
        LabelSstRecord {
            row: 0,
            column: 0,
            xf_index: 15,
            sst_index: 2499,
        }
        .into(),
        RkRecord::new(0, 1, 15, 12.5).unwrap().into(),
        MulRkRecord::new(
            0,
            2,
            vec![RkCell {
                xf_index: 15,
                rk: 0x0000_0002,
            }],
        )
        .unwrap()
        .into(),
        EofRecord.into(),
    ]
}

#[test]
fn workbook_stream_round_trips_exactly() {
    let records = sample_workbook();
    let bytes = encode_record_stream(&records, Vec::new()).unwrap();

    let decoded = decode_record_stream(&bytes, DecodeOptions::default()).unwrap();
    assert_eq!(decoded.len(), records.len());
    assert_eq!(decoded, records);
    assert_eq!(encode_record_stream(&decoded, Vec::new()).unwrap(), bytes);

    let Record::Sst(sst) = &decoded[6] else {
        panic!("expected SST, got {}", decoded[6].name());
    };
    assert_eq!(sst.get(2499).map(XlString::text), Some("Zeile 2499: Größe Ω"));
}

#[test]
fn substreams_can_be_located_and_walked() {
    let bytes = encode_record_stream(&sample_workbook(), Vec::new()).unwrap();
    let offsets = substream_offsets(&bytes);
    assert_eq!(offsets.len(), 2);
    assert_eq!(offsets[0], 0);

    let records = sample_workbook();
    let sheet: Vec<Record> = SubstreamRecords::new(&bytes, offsets[1]).unwrap().collect();
    assert_eq!(sheet.len(), 7);
    assert_eq!(sheet.first().map(Record::sid), Some(sid::RECORD_BOF));
    assert_eq!(sheet.last(), Some(&Record::Eof(EofRecord)));
    assert!(sheet.iter().all(|r| !r.is_unknown()));
    assert_eq!(sheet, records[records.len() - 7..].to_vec());
}

#[test]
fn unknown_records_pass_through_byte_for_byte() {
    let mut bytes = frame(0x0867, &[0xDE, 0xAD]);
    // Unknown record continued across two frames with an uneven split.
    bytes.extend(frame(0x0123, &[1, 2, 3]));
    bytes.extend(frame(sid::RECORD_CONTINUE, &[4]));
    bytes.extend(frame(sid::RECORD_EOF, &[]));

    let decoded = decode_record_stream(&bytes, DecodeOptions::default()).unwrap();
    assert_eq!(decoded.len(), 3);
    assert_eq!(
        decoded[1],
        Record::Unknown(UnknownRecord {
            sid: 0x0123,
            data: vec![1, 2, 3, 4],
            fragment_sizes: vec![3, 1],
        })
    );
    assert_eq!(encode_record_stream(&decoded, Vec::new()).unwrap(), bytes);
}

#[test]
fn oversized_payload_is_split_into_continue_frames() {
    let payload: Vec<u8> = (0..MAX_RECORD_DATA_SIZE * 3).map(|i| i as u8).collect();
    let record = Record::Unknown(UnknownRecord::new(0x0866, payload.clone()));
    let bytes = encode_record_stream([&record], Vec::new()).unwrap();

    let mut sids = Vec::new();
    let mut offset = 0;
    while offset < bytes.len() {
        let sid = u16::from_le_bytes([bytes[offset], bytes[offset + 1]]);
        let len = u16::from_le_bytes([bytes[offset + 2], bytes[offset + 3]]) as usize;
        sids.push(sid);
        offset += 4 + len;
    }
    assert_eq!(sids, vec![0x0866, sid::RECORD_CONTINUE, sid::RECORD_CONTINUE]);

    let decoded = decode_record_stream(&bytes, DecodeOptions::default()).unwrap();
    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0].payload(), payload);
}

#[test]
fn typed_records_survive_the_record_writer() {
    let record = RkRecord::new(3, 4, 15, -1.25).unwrap();
    let mut writer = RecordWriter::new(Vec::new());
    writer.write_frame(&record.to_frame()).unwrap();
    let bytes = writer.into_inner();
    assert_eq!(&bytes[..4], &[0x7E, 0x02, 10, 0]);

    let decoded = decode_record_stream(&bytes, DecodeOptions::default()).unwrap();
    assert_eq!(decoded, vec![Record::Rk(record)]);
}

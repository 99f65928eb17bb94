use proptest::prelude::*;

use patdecode::interpreter::{FormatVersion, SubRecordKind};
use patdecode::parser::{RecordHeader, TelemetryReader, checksum};
use patdecode::schema::FieldValue;
use patdecode::{Error, decode_telemetry};

fn record(payload: &[u8]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    data.extend_from_slice(&[0x00, 0x00]);
    data.extend_from_slice(&checksum(payload).to_be_bytes());
    data.extend_from_slice(payload);
    data
}

fn visual(tag: u8, id: &str) -> Vec<u8> {
    let mut sub = vec![tag];
    let mut id = id.as_bytes().to_vec();
    id.resize(16, 0);
    sub.extend_from_slice(&id);
    sub.extend_from_slice(&[10, 5, 25, 11]);
    sub.extend_from_slice(&2014u16.to_be_bytes());
    sub.extend_from_slice(b"Head Office\0\0\0\0\0");
    sub.extend_from_slice(b"Workshop\0\0\0\0\0\0\0\0");
    sub.extend_from_slice(b"J Smith\0\0\0\0");
    sub.extend_from_slice(b"1234567890");
    sub.extend_from_slice(b"0987654321\0");
    sub
}

fn real(s: &str) -> FieldValue {
    FieldValue::Real(s.parse().unwrap())
}

#[test]
fn test_overall_pass_scenario() {
    let data = [0x00u8, 0x02, 0x00, 0x00, 0x01, 0xef, 0xf0, 0xff];
    let records = decode_telemetry(&data[..])
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].header,
        RecordHeader {
            payload_length: 2,
            reserved: 0,
            checksum: 0x1ef,
        }
    );
    let kinds: Vec<_> = records[0].sub_records.iter().map(|s| s.kind).collect();
    assert_eq!(kinds, [SubRecordKind::OverallPass, SubRecordKind::EndOfRecord]);
}

#[test]
fn test_full_version_1_record() {
    let mut payload = visual(0x01, "A0001");
    payload.extend_from_slice(&[0xe0, 1, 3, 4, 5]);
    payload.extend_from_slice(&[0xf2, 0x80, 0x0b]);
    payload.extend_from_slice(&[0xf3]);
    payload.extend_from_slice(&(0x8000u16 | 18500).to_be_bytes());
    payload.extend_from_slice(&[0xf6, 0x80, 0x11, 0x00, 0x30]);
    payload.extend_from_slice(&[0xf8, 0x00, 0x00]);
    payload.extend_from_slice(&[0xfe]);
    payload.extend_from_slice(b"12A-3456789");
    payload.extend_from_slice(&[1, 2, 3]);
    payload.extend_from_slice(&[0xf0, 0xff]);

    let mut data = record(&payload);
    data.extend(record(&[0xf1, 0xff]));

    let records = decode_telemetry(&data[..])
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(records.len(), 2);

    let subs = &records[0].sub_records;
    assert_eq!(subs.len(), 9);

    assert_eq!(subs[0].fields.text("id"), Some("A0001"));
    assert_eq!(subs[0].fields.text("site"), Some("Head Office"));
    assert_eq!(subs[0].fields.text("tester"), Some("J Smith"));
    assert_eq!(subs[0].fields.unsigned("hour"), Some(10));

    assert_eq!(
        subs[1].fields.get("meaning2"),
        Some(&FieldValue::Label("Make"))
    );

    assert_eq!(subs[2].kind, SubRecordKind::EarthResistance);
    assert_eq!(subs[2].fields.get("resistance"), Some(&real("0.11")));

    assert_eq!(subs[3].kind, SubRecordKind::EarthInsulation);
    assert_eq!(subs[3].fields.get("resistance"), Some(&real("99.99")));
    assert_eq!(subs[3].fields.get("resistance_uncapped"), Some(&real("185")));
    assert_eq!(subs[3].fields.get("pass"), Some(&FieldValue::Bool(true)));

    assert_eq!(subs[4].fields.get("leakage"), Some(&real("0.17")));
    assert_eq!(subs[4].fields.get("load"), Some(&real("0.3")));

    assert_eq!(subs[5].fields.get("resistance"), Some(&FieldValue::NoResult));

    assert_eq!(subs[6].fields.text("serialnumber"), Some("12A-3456789"));
    assert_eq!(subs[6].fields.unsigned("firmware3"), Some(3));

    assert_eq!(records[0].overall_pass(), Some(true));
    assert_eq!(records[1].overall_pass(), Some(false));
}

#[test]
fn test_version_1_retest_and_current_layouts() {
    let mut payload = vec![0xe1, 0x00, 0x07, 0x32];
    payload.push(0x10);
    payload.extend_from_slice(&[0xf4, 0x40, 0x21]);
    payload.extend_from_slice(&[0xf5, 0x80, 0x0f]);
    payload.extend_from_slice(&[0xf7, 0xc0, 0x7b]);
    payload.extend_from_slice(&[0xf1, 0xff]);

    let data = record(&payload);
    let mut reader = decode_telemetry(&data[..]);
    let record = reader.next().unwrap().unwrap();
    assert_eq!(reader.version(), FormatVersion::V1);

    let kinds: Vec<_> = record.sub_records.iter().map(|s| s.kind).collect();
    assert_eq!(
        kinds,
        [
            SubRecordKind::Retest,
            SubRecordKind::Unknown,
            SubRecordKind::SubstituteLeakage,
            SubRecordKind::FlashLeakage,
            SubRecordKind::FlashLeakage,
            SubRecordKind::OverallFail,
            SubRecordKind::EndOfRecord,
        ]
    );

    let subs = &record.sub_records;
    assert_eq!(subs[0].fields.unsigned("nulls"), Some(0));
    assert_eq!(subs[0].fields.unsigned("unknown"), Some(7));
    assert_eq!(subs[0].fields.unsigned("frequency"), Some(0x32));
    assert!(subs[1].fields.is_empty());
    assert_eq!(subs[2].fields.get("current"), Some(&real("3.3")));
    assert_eq!(subs[3].fields.get("current"), Some(&real("0.15")));
    assert_eq!(subs[4].fields.get("current"), Some(&real("0.123")));
    assert_eq!(subs[4].label, "Flash Leakage (F7)");
    assert!(subs[2..5].iter().all(|s| s.repeat.is_none()));
    assert!(subs[2..5].iter().all(|s| s.fields.get("pass").is_none()));
    assert_eq!(record.overall_pass(), Some(false));
    assert!(reader.next().is_none());
}

#[test]
fn test_version_2_flash_leakage() {
    let data = record(&[0xf7, 0x02, 0x01, 0x40, 0x0a, 0xf5, 0x01, 0x00, 0x80, 0x63, 0xf0, 0xff]);
    let mut reader = TelemetryReader::with_version(&data[..], FormatVersion::V2);
    let record = reader.next().unwrap().unwrap();
    let subs = &record.sub_records;
    assert_eq!(subs.len(), 4);

    assert_eq!(subs[0].label, "Flash Leakage v2 (F7)");
    assert_eq!(subs[0].repeat, Some(2));
    assert_eq!(subs[0].fields.get("pass"), Some(&FieldValue::Bool(true)));
    assert_eq!(subs[0].fields.get("current"), Some(&real("1")));

    assert_eq!(subs[1].repeat, Some(1));
    assert_eq!(subs[1].fields.get("pass"), Some(&FieldValue::Bool(false)));
    assert_eq!(subs[1].fields.get("current"), Some(&real("0.99")));

    assert_eq!(subs[3].kind, SubRecordKind::EndOfRecord);
    assert_eq!(record.overall_pass(), Some(true));
}

#[test]
fn test_free_text() {
    let mut payload = vec![0xfb];
    for line in ["Cable damaged", "Plug replaced", "", "Retest in 3 months"] {
        let mut bytes = line.as_bytes().to_vec();
        bytes.resize(21, 0);
        payload.extend_from_slice(&bytes);
    }
    payload.push(0xff);

    let data = record(&payload);
    let record = decode_telemetry(&data[..]).next().unwrap().unwrap();
    let fields = &record.sub_records[0].fields;
    assert_eq!(fields.text("line1"), Some("Cable damaged"));
    assert_eq!(fields.text("line3"), Some(""));
    assert_eq!(fields.text("line4"), Some("Retest in 3 months"));
}

#[test]
fn test_upgrade_persists_across_records() {
    let mut first = visual(0x12, "B2");
    first.extend_from_slice(&[0xf1, 0xff]);

    let second = [0xf3, 0x01, 0x01, 0x83, 0xe8, 0xf0, 0xff];
    let third = [0xf5, 0x01, 0x00, 0x40, 0x05, 0xff];

    let mut data = record(&first);
    data.extend(record(&second));
    data.extend(record(&third));

    let mut reader = decode_telemetry(&data[..]);
    let first = reader.next().unwrap().unwrap();
    assert_eq!(first.sub_records[0].kind, SubRecordKind::VisualFail);
    assert_eq!(reader.version(), FormatVersion::V2);

    let second = reader.next().unwrap().unwrap();
    let insulation = &second.sub_records[0];
    assert_eq!(insulation.repeat, Some(1));
    assert_eq!(insulation.fields.get("resistance"), Some(&real("10")));
    assert_eq!(insulation.fields.get("pass"), Some(&FieldValue::Bool(true)));

    let third = reader.next().unwrap().unwrap();
    assert_eq!(third.sub_records[0].fields.get("current"), Some(&real("0.5")));
    assert_eq!(reader.version(), FormatVersion::V2);
    assert!(reader.next().is_none());
}

#[test]
fn test_version_1_layout_rejected_after_upgrade() {
    let mut first = visual(0x11, "C3");
    first.push(0xff);
    // A version 1 earth resistance body is one byte short once counted.
    let second = [0xf2, 0x80, 0x0b];

    let mut data = record(&first);
    data.extend(record(&second));

    let mut reader = decode_telemetry(&data[..]);
    assert!(reader.next().unwrap().is_ok());
    assert!(matches!(
        reader.next(),
        Some(Err(Error::TruncatedSubRecord {
            record: 1,
            tag: 0xf2,
            expected: 5,
            available: 2,
            ..
        }))
    ));
}

#[test]
fn test_starting_in_version_2() {
    let data = record(&[0xf8, 0x01, 0x01, 0x80, 0x05, 0xff]);
    let mut reader = TelemetryReader::with_version(&data[..], FormatVersion::V2);
    let record = reader.next().unwrap().unwrap();
    assert_eq!(record.sub_records[0].fields.get("resistance"), Some(&real("0.05")));
}

#[test]
fn test_error_offsets() {
    let mut data = record(&[0xf0, 0xff]);
    data.extend(record(&[0xf0, 0x99, 0xff]));
    let mut reader = decode_telemetry(&data[..]);
    assert!(reader.next().unwrap().is_ok());
    let error = reader.next().unwrap().unwrap_err();
    // Second record starts at 8; its payload at 14; the bad tag is one in.
    assert_eq!(error.offset(), Some(15));
    assert!(reader.next().is_none());
}

proptest! {
    #[test]
    fn prop_checksum_is_byte_sum(payload in proptest::collection::vec(any::<u8>(), 0..1024)) {
        let sum: u32 = payload.iter().map(|&b| u32::from(b)).sum();
        prop_assert_eq!(checksum(&payload), (sum & 0xffff) as u16);
    }

    #[test]
    fn prop_single_bit_flip_detected(
        payload in proptest::collection::vec(any::<u8>(), 1..512),
        position in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let mut data = record(&payload);
        let i = 6 + position.index(payload.len());
        data[i] ^= 1 << bit;
        let first = decode_telemetry(&data[..]).next();
        prop_assert!(
            matches!(first, Some(Err(Error::ChecksumMismatch { .. }))),
            "{:?}",
            first
        );
    }

    #[test]
    fn prop_arbitrary_input_never_panics(data in proptest::collection::vec(any::<u8>(), 0..512)) {
        for record in decode_telemetry(&data[..]) {
            if record.is_err() {
                break;
            }
        }
    }
}

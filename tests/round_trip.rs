use bstr::BString;

use cram_core::config::WriterOptionsBuilder;
use cram_core::container::{FileDefinition, ReferenceSequenceContext};
use cram_core::record::{CramFlags, Feature, Flags, MateInfo, Record};
use cram_core::{Reader, Writer};

fn sample_records() -> Vec<Record> {
    vec![
        Record {
            bam_flags: Flags::UNMAPPED,
            read_length: 4,
            name: Some(BString::from("read_1")),
            tag_set_id: 0,
            bases: Some(b"ACGT".to_vec()),
            ..Record::default()
        },
        Record {
            bam_flags: Flags::empty(),
            read_length: 6,
            alignment_start: 101,
            name: Some(BString::from("read_2")),
            tag_set_id: 1,
            tag_values: vec![b"chr1".to_vec()],
            features: vec![Feature::Substitution { position: 3, code: 2 }],
            mapping_quality: 60,
            ..Record::default()
        },
        Record {
            bam_flags: Flags::SEGMENTED | Flags::PROPERLY_ALIGNED,
            cram_flags: CramFlags::DETACHED,
            read_length: 8,
            alignment_start: 150,
            name: Some(BString::from("read_3")),
            mate: Some(MateInfo {
                mate_flags: 0,
                reference_sequence_id: 0,
                alignment_start: 400,
                template_length: 300,
            }),
            tag_set_id: 0,
            mapping_quality: 37,
            ..Record::default()
        },
        Record {
            bam_flags: Flags::UNMAPPED,
            read_length: 5,
            name: Some(BString::from("read_4")),
            tag_set_id: 0,
            bases: Some(b"TTTTT".to_vec()),
            ..Record::default()
        },
        Record {
            bam_flags: Flags::empty(),
            read_length: 3,
            alignment_start: 210,
            name: Some(BString::from("read_5")),
            tag_set_id: 1,
            tag_values: vec![b"chr2".to_vec()],
            features: vec![Feature::Deletion { position: 1, len: 2 }],
            mapping_quality: 20,
            ..Record::default()
        },
    ]
}

#[test]
fn round_trips_file_definition_header_and_records() {
    let tag_sets: Vec<Vec<([u8; 2], u8)>> = vec![Vec::new(), vec![(*b"RG", b'Z')]];
    let records = sample_records();

    let options = WriterOptionsBuilder::new()
        .records_per_slice(2)
        .slices_per_container(2)
        .build();

    let mut buf = Vec::new();
    {
        let mut writer = Writer::with_options(&mut buf, options);

        writer
            .write_file_definition(&FileDefinition {
                major_version: 3,
                minor_version: 0,
                file_id: *b"cram-core-test-00000",
            })
            .unwrap();

        writer.write_file_header(b"@HD\tVN:1.6\tSO:coordinate\n").unwrap();

        writer
            .write_records(ReferenceSequenceContext::Many, &tag_sets, &records)
            .unwrap();

        writer.finish().unwrap();
    }

    let mut reader = Reader::new(&buf[..]);

    let definition = reader.read_file_definition().unwrap();
    assert_eq!(definition.major_version, 3);
    assert_eq!(definition.minor_version, 0);

    let header_text = reader.read_file_header().unwrap();
    assert_eq!(header_text, b"@HD\tVN:1.6\tSO:coordinate\n");

    let decoded: Vec<Record> = reader.by_ref().collect::<Result<_, _>>().unwrap();
    assert_eq!(decoded.len(), records.len());

    for (expected, actual) in records.iter().zip(decoded.iter()) {
        assert_eq!(actual.name, expected.name);
        assert_eq!(actual.bam_flags, expected.bam_flags);
        assert_eq!(actual.read_length, expected.read_length);
        assert_eq!(actual.alignment_start, expected.alignment_start);
        assert_eq!(actual.bases, expected.bases);
        assert_eq!(actual.features, expected.features);
        assert_eq!(actual.mapping_quality, expected.mapping_quality);
        assert_eq!(actual.tag_values, expected.tag_values);
    }

    assert!(reader.next_record().unwrap().is_none());
}

#[test]
fn rejects_truncated_file_header() {
    let mut buf = Vec::new();
    {
        let mut writer = Writer::new(&mut buf);
        writer
            .write_file_definition(&FileDefinition {
                major_version: 3,
                minor_version: 0,
                file_id: [0u8; 20],
            })
            .unwrap();
        writer.finish().unwrap();
    }

    // Drop the EOF container, then try to read a file header from a stream that holds only
    // the file definition.
    buf.truncate(cram_core::container::FILE_ID_LEN + 6);

    let mut reader = Reader::new(&buf[..]);
    reader.read_file_definition().unwrap();
    assert!(reader.read_file_header().is_err());
}

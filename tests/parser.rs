mod common;

use std::fs::File;
use std::io::Cursor;

use assert_fs::prelude::*;
use common::*;
use seqstore::codec::chromatogram::{self, BaseCalls, Chromatogram, Section, Traces, Version};
use seqstore::{
    Error, Format, Memento, ParseControl, ParseOutcome, PushParser, Record, RecordBuilder,
    RecordHeader, RecordVisitor, Visit,
};

/// Builds every record and remembers where it started.
#[derive(Default)]
struct Collect {
    records: Vec<Record>,
    mementos: Vec<Memento>,
    halt_after: Option<usize>,
    ended: bool,
    halted: bool,
}

impl RecordVisitor for Collect {
    type Body = RecordBuilder;

    fn visit_record(&mut self, control: &mut ParseControl, header: &RecordHeader) -> Visit<RecordBuilder> {
        self.mementos.push(control.create_memento().unwrap());
        if Some(self.mementos.len()) == self.halt_after {
            control.halt_parsing();
        }
        Visit::Body(RecordBuilder::new(header))
    }

    fn record_done(&mut self, _control: &mut ParseControl, body: RecordBuilder) {
        self.records.push(body.build());
    }

    fn visit_end(&mut self) {
        self.ended = true;
    }

    fn halted(&mut self) {
        self.halted = true;
    }
}

#[test]
fn halting_at_the_fourth_record() -> TestResult {
    init_logging();
    let data = bfq_bytes(&ids(10), 12);
    let mut visitor = Collect {
        halt_after: Some(4),
        ..Collect::default()
    };

    let outcome = PushParser::new(bfq(), "reads").parse(&data[..], Some(data.len() as u64), &mut visitor)?;

    assert_eq!(outcome, ParseOutcome::Halted { records: 4 });
    assert!(visitor.halted);
    assert!(!visitor.ended);
    assert_eq!(visitor.mementos.len(), 4);
    assert_eq!(visitor.records.len(), 3);
    Ok(())
}

#[test]
fn replaying_any_memento_reproduces_the_record() -> TestResult {
    let file = bfq_file(&ids(25), 30);
    let parser = PushParser::for_path(file.path(), bfq())?;
    let len = std::fs::metadata(file.path())?.len();

    let mut forward = Collect::default();
    let outcome = parser.parse(File::open(file.path())?, Some(len), &mut forward)?;
    assert_eq!(outcome, ParseOutcome::Completed { records: 25 });
    assert!(forward.ended);

    for (memento, expected) in forward.mementos.iter().zip(&forward.records) {
        let mut one = Collect {
            halt_after: Some(1),
            ..Collect::default()
        };
        parser.replay(File::open(file.path())?, Some(len), memento, &mut one)?;
        // a halt in the header abandons the body
        assert!(one.records.is_empty());

        let mut one = Collect {
            halt_after: Some(2),
            ..Collect::default()
        };
        parser.replay(File::open(file.path())?, Some(len), memento, &mut one)?;
        assert_eq!(&one.records[0], expected);
    }
    Ok(())
}

#[test]
fn mementos_do_not_cross_parsers() -> TestResult {
    let data = bfq_bytes(&ids(3), 4);
    let parser = PushParser::new(bfq(), "a.bfq");
    let mut visitor = Collect::default();
    parser.parse(&data[..], None, &mut visitor)?;

    let other_origin = PushParser::new(bfq(), "b.bfq");
    let other_format = PushParser::new(
        Format::Bfq {
            byte_order: seqstore::ByteOrder::Big,
        },
        "a.bfq",
    );
    for other in [other_origin, other_format] {
        let err = other
            .replay(Cursor::new(&data), None, &visitor.mementos[1], &mut Collect::default())
            .unwrap_err();
        assert!(matches!(err, Error::IncompatibleMemento { .. }));
    }

    // mementos survive serialization
    let json = serde_json::to_string(&visitor.mementos[1])?;
    let memento: Memento = serde_json::from_str(&json)?;
    let mut one = Collect {
        halt_after: Some(2),
        ..Collect::default()
    };
    parser.replay(Cursor::new(&data), None, &memento, &mut one)?;
    assert_eq!(one.records[0].id(), "read_1");
    Ok(())
}

#[test]
fn chromatogram_file_is_one_record() -> TestResult {
    let mut c = Chromatogram::new(Version::V3, 2);
    c.traces = Traces {
        a: vec![0, 100, 400, 100],
        c: vec![5, 5, 5, 5],
        g: vec![0, 0, 0, 900],
        t: vec![1, 2, 3, 4],
    };
    c.calls = BaseCalls {
        peaks: vec![2, 3],
        prob_a: vec![30, 0],
        prob_c: vec![0, 0],
        prob_g: vec![0, 25],
        prob_t: vec![0, 0],
        bases: b"AG".to_vec(),
        spare: vec![[0; 3]; 2],
    };
    c.comments = b"NAME=trace_7\n".to_vec();

    let file = assert_fs::NamedTempFile::new("trace_7.scf")?;
    file.write_binary(&chromatogram::encode(&c, ORDER)?)?;

    let format = Format::Chromatogram { byte_order: ORDER };
    let parser = PushParser::for_path(file.path(), format)?;
    let mut visitor = Collect::default();
    parser.parse(File::open(file.path())?, None, &mut visitor)?;

    assert_eq!(visitor.records.len(), 1);
    let record = &visitor.records[0];
    assert_eq!(record.id(), "trace_7");
    assert_eq!(record.bases(), b"AG");
    assert_eq!(record.qualities(), Some(&[30, 25][..]));
    assert_eq!(record.comment(), Some("NAME=trace_7\n"));
    assert_eq!(record.sections().len(), 3);
    assert!(matches!(&record.sections()[0], Section::Traces(t) if t == &c.traces));
    Ok(())
}

#[test]
fn fastq_through_the_parser() -> TestResult {
    let file = assert_fs::NamedTempFile::new("reads.fastq")?;
    file.write_str(indoc::indoc! {"
        @r1 lane=1
        ACGT
        +
        IIII
        @r2
        GG
        +
        !#
    "})?;

    let parser = PushParser::for_path(file.path(), Format::Fastq)?;
    let mut visitor = Collect::default();
    parser.parse(File::open(file.path())?, None, &mut visitor)?;

    assert_eq!(visitor.records[0].comment(), Some("lane=1"));
    assert_eq!(visitor.records[1].qualities(), Some(&[0, 2][..]));
    assert_eq!(visitor.mementos[1].offset(), 23);
    Ok(())
}

mod common;

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;

use assert_fs::prelude::*;
use common::*;
use seqstore::codec::packed;
use seqstore::{AcceptAll, Error, Format, RecordStore};

#[test]
fn get_matches_the_streamed_record() -> TestResult {
    init_logging();
    let file = bfq_file(&ids(12), 40);
    let store = RecordStore::open(file.path(), bfq())?;
    assert_eq!(store.len()?, 12);

    let streamed: Vec<_> = store.iter()?.collect::<Result<_, _>>()?;
    assert_eq!(streamed.len(), 12);

    let seventh = store.get("read_7")?.expect("read_7 is indexed");
    assert_eq!(seventh, streamed[7]);
    assert_eq!(seventh.qualities().map(<[u8]>::len), Some(40));

    assert!(store.get("read_99")?.is_none());
    assert!(store.contains("read_0")?);
    assert!(!store.contains("read_12")?);
    Ok(())
}

#[test]
fn ids_follow_file_order_and_first_duplicate_wins() -> TestResult {
    let order = ["b", "a", "b", "c", "a"];
    let mut data = Vec::new();
    for (i, id) in order.iter().enumerate() {
        // the base count tells the occurrences apart
        packed::encode_into(&mut data, id, &vec![b'C'; i + 1], &vec![9; i + 1], ORDER)?;
    }
    let file = assert_fs::NamedTempFile::new("dups.bfq")?;
    file.write_binary(&data)?;

    let store = RecordStore::open(file.path(), bfq())?;
    assert_eq!(store.ids()?.collect::<Vec<_>>(), ["b", "a", "c"]);
    assert_eq!(store.get("b")?.map(|r| r.len()), Some(1));
    assert_eq!(store.get("a")?.map(|r| r.len()), Some(2));
    Ok(())
}

#[test]
fn filtered_ids_behave_as_absent() -> TestResult {
    let file = bfq_file(&ids(6), 8);
    let wanted: HashSet<String> = ["read_1".to_string(), "read_4".to_string()].into();
    let store = RecordStore::build(file.path(), bfq(), wanted)?;

    assert_eq!(store.len()?, 2);
    assert!(store.get("read_2")?.is_none());
    assert!(store.get("read_4")?.is_some());
    let streamed: Vec<String> = store
        .iter()?
        .map(|r| r.map(|r| r.id().to_string()))
        .collect::<Result<_, _>>()?;
    assert_eq!(streamed, ["read_1", "read_4"]);

    // a saved index keeps them out too
    let index = assert_fs::NamedTempFile::new("filtered.tsv")?;
    store.save_index(index.path())?;
    let loaded = RecordStore::with_index(file.path(), bfq(), index.path())?;
    assert_eq!(loaded.iter()?.count(), 2);
    Ok(())
}

#[test]
fn get_many_keeps_request_order() -> TestResult {
    let file = bfq_file(&ids(30), 16);
    let store = RecordStore::open(file.path(), bfq())?;

    let wanted = ["read_29", "missing", "read_0", "read_15"];
    let found = store.get_many(&wanted)?;
    let found_ids: Vec<_> = found.iter().map(|r| r.as_ref().map(|r| r.id())).collect();
    assert_eq!(
        found_ids,
        [Some("read_29"), None, Some("read_0"), Some("read_15")]
    );
    Ok(())
}

#[test]
fn changed_source_is_detected() -> TestResult {
    let file = bfq_file(&ids(3), 10);
    let store = RecordStore::open(file.path(), bfq())?;
    assert!(store.get("read_1")?.is_some());

    let mut extra = Vec::new();
    packed::encode_into(&mut extra, "late", b"ACGT", &[3; 4], ORDER)?;
    OpenOptions::new()
        .append(true)
        .open(file.path())?
        .write_all(&extra)?;

    assert!(matches!(store.get("read_1"), Err(Error::StaleSource { .. })));
    assert!(matches!(store.iter(), Err(Error::StaleSource { .. })));
    // absent ids never touch the file
    assert!(store.get("late")?.is_none());
    Ok(())
}

#[test]
fn closed_store_refuses_everything() -> TestResult {
    let file = bfq_file(&ids(3), 10);
    let store = RecordStore::open(file.path(), bfq())?;
    store.close();
    store.close();

    assert!(store.is_closed());
    assert!(matches!(store.get("read_0"), Err(Error::ClosedResource(_))));
    assert!(matches!(store.len(), Err(Error::ClosedResource(_))));
    assert!(matches!(store.contains("read_0"), Err(Error::ClosedResource(_))));
    assert!(store.ids().is_err());
    assert!(store.iter().is_err());
    Ok(())
}

#[test]
fn saved_index_round_trips() -> TestResult {
    let file = bfq_file(&ids(20), 12);
    let index = assert_fs::NamedTempFile::new("reads.bfq.tsv")?;

    let built = RecordStore::build(file.path(), bfq(), |id: &str| id != "read_3")?;
    built.save_index(index.path())?;

    let contents = std::fs::read_to_string(index.path())?;
    let first_line = contents.lines().next().unwrap_or_default();
    assert!(first_line.starts_with("#{"), "{first_line}");
    assert!(contents.contains("id\toffset"));

    let loaded = RecordStore::with_index(file.path(), bfq(), index.path())?;
    assert_eq!(loaded.len()?, 19);
    assert_eq!(
        loaded.ids()?.collect::<Vec<_>>(),
        built.ids()?.collect::<Vec<_>>()
    );
    assert_eq!(loaded.get("read_12")?, built.get("read_12")?);
    assert_eq!(loaded.memento("read_12")?, built.memento("read_12")?);

    // an index is tied to its format
    let other = Format::Bfq {
        byte_order: seqstore::ByteOrder::Big,
    };
    assert!(RecordStore::with_index(file.path(), other, index.path()).is_err());
    Ok(())
}

#[test]
fn every_format_is_addressable() -> TestResult {
    let fasta = assert_fs::NamedTempFile::new("refs.fa")?;
    fasta.write_str(">chr1 first\nACGT\nAAAA\n>chr2\nGG\n")?;
    let store = RecordStore::build(fasta.path(), Format::Fasta, AcceptAll)?;
    let chr1 = store.get("chr1")?.expect("chr1");
    assert_eq!(chr1.bases(), b"ACGTAAAA");
    assert_eq!(chr1.comment(), Some("first"));
    assert_eq!(chr1.qualities(), None);

    let mut refs = Vec::new();
    seqstore::codec::twobit::encode_into(&mut refs, "contig", b"ACGTNNNNACGT", ORDER)?;
    seqstore::codec::twobit::encode_into(&mut refs, "plasmid", b"TTGA", ORDER)?;
    let bfa = assert_fs::NamedTempFile::new("refs.bfa")?;
    bfa.write_binary(&refs)?;
    let store = RecordStore::open(bfa.path(), Format::Bfa { byte_order: ORDER })?;
    assert_eq!(store.get("plasmid")?.expect("plasmid").bases(), b"TTGA");
    assert_eq!(store.get("contig")?.expect("contig").bases(), b"ACGTNNNNACGT");
    Ok(())
}

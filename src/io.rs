use std::io::Write;

use crate::error::Result;
use crate::reader::fastx::QUALITY_OFFSET;
use crate::record::Record;

/// Utility function to extract the error from an iterator and stop iteration immediately. Useful
/// for iterators which yield a Result<T>, such as a [`RecordStream`](crate::RecordStream).
///
/// # Returns
///
/// This function returns an `Option<T>`. If the item is `Ok`, it returns `Some(T)`.
/// If the item is `Err`, it updates `err` with the error and returns `None`.
///
/// # Example
/// ```
/// use seqstore::io::until_err;
/// use seqstore::Error;
///
/// let mut err = Ok(());
/// let items = vec![Ok(1), Ok(2), Err(Error::WorkerPanicked), Ok(3)];
/// let results: Vec<_> = items.into_iter().scan(&mut err, until_err).collect();
/// assert_eq!(results, vec![1, 2]);
/// assert!(err.is_err());
/// ```
pub fn until_err<T>(err: &mut &mut Result<()>, item: Result<T>) -> Option<T> {
    match item {
        Ok(item) => Some(item),
        Err(e) => {
            **err = Err(e);
            None
        }
    }
}

/// Write a record as FASTQ when it has qualities, and as FASTA otherwise.
///
/// Qualities above the printable range are clamped.
pub fn write_record(writer: &mut impl Write, record: &Record) -> std::io::Result<()> {
    let header_mark = if record.qualities().is_some() { '@' } else { '>' };
    match record.comment() {
        Some(comment) => writeln!(writer, "{header_mark}{} {comment}", record.id())?,
        None => writeln!(writer, "{header_mark}{}", record.id())?,
    }
    writer.write_all(record.bases())?;
    writer.write_all(b"\n")?;

    if let Some(qualities) = record.qualities() {
        let encoded: Vec<u8> = qualities
            .iter()
            .map(|&q| q.min(b'~' - QUALITY_OFFSET) + QUALITY_OFFSET)
            .collect();
        writer.write_all(b"+\n")?;
        writer.write_all(&encoded)?;
        writer.write_all(b"\n")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn fasta_and_fastq_output() {
        let mut out = Vec::new();
        write_record(&mut out, &Record::new("ref", b"ACGT".to_vec(), None)).unwrap();
        write_record(
            &mut out,
            &Record::new("read", b"AC".to_vec(), Some(vec![0, 40])).with_comment("lane=1"),
        )
        .unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            indoc! {"
                >ref
                ACGT
                @read lane=1
                AC
                +
                !I
            "}
        );
    }
}

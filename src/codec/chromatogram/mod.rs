//! SCF chromatogram files: a fixed 128-byte header followed by up to four sections, each addressed
//! by an (offset, size) pair in the header. Sections may appear in any physical order, with gaps
//! between them; decoding visits them in ascending offset order and encoding always writes them
//! back in the canonical order samples, bases, comments, private data.

pub mod header;
pub mod sections;

use std::ops::ControlFlow;

pub use header::{Header, Version, HEADER_SIZE, MAGIC};
pub use sections::{layout, BaseCalls, Section, SectionCodec, SectionKind, Traces};

use crate::error::{Error, Result};
use crate::options::ByteOrder;
use crate::reader::bytes::ByteReader;
use header::SPARE_WORDS;
use sections::SectionContext;

/// A fully decoded chromatogram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chromatogram {
    /// Raw version field, kept verbatim so re-encoding reproduces it
    pub version: [u8; 4],
    /// Bytes per trace sample, 1 or 2
    pub sample_size: u8,
    pub code_set: u32,
    pub clip_left: u32,
    pub clip_right: u32,
    pub spare: [u32; SPARE_WORDS],
    pub traces: Traces,
    pub calls: BaseCalls,
    pub comments: Vec<u8>,
    pub private_data: Vec<u8>,
}

impl Chromatogram {
    pub fn new(version: Version, sample_size: u8) -> Self {
        Chromatogram {
            version: version.field(),
            sample_size,
            code_set: 0,
            clip_left: 0,
            clip_right: 0,
            spare: [0; SPARE_WORDS],
            traces: Traces::default(),
            calls: BaseCalls::default(),
            comments: Vec::new(),
            private_data: Vec::new(),
        }
    }

    fn from_header(header: &Header, sample_size: u8) -> Self {
        Chromatogram {
            version: header.version,
            sample_size,
            code_set: header.code_set,
            clip_left: header.bases_left_clip,
            clip_right: header.bases_right_clip,
            spare: header.spare,
            traces: Traces::default(),
            calls: BaseCalls::default(),
            comments: Vec::new(),
            private_data: Vec::new(),
        }
    }

    fn absorb(&mut self, section: Section) {
        match section {
            Section::Traces(t) => self.traces = t,
            Section::BaseCalls(c) => self.calls = c,
            Section::Comments(c) => self.comments = c,
            Section::PrivateData(p) => self.private_data = p,
        }
    }
}

fn sample_size_of(header: &Header, record_start: u64) -> Result<u8> {
    match header.sample_size {
        1 => Ok(1),
        2 => Ok(2),
        other => Err(Error::format(
            record_start + 40,
            format!("sample size must be 1 or 2, got {other}"),
        )),
    }
}

/// A present section, located in absolute stream offsets.
struct Placed {
    codec: &'static SectionCodec,
    offset: u64,
    len: u64,
}

/// Locate every present section and check that they fit, in ascending offset order.
fn plan(header: &Header, version: Version, record_start: u64, stream_len: Option<u64>) -> Result<Vec<Placed>> {
    let mut placed: Vec<Placed> = layout(version)
        .iter()
        .filter_map(|codec| {
            let (offset, len) = header.extent(codec.kind);
            // only comments and private data may be absent; counted sections at 0 are corrupt
            let optional = matches!(codec.kind, SectionKind::Comments | SectionKind::PrivateData);
            (len != 0 && (offset != 0 || !optional)).then_some(Placed {
                codec,
                offset: record_start + offset,
                len,
            })
        })
        .collect();
    placed.sort_by_key(|p| p.offset);

    let mut end_of_previous = record_start + HEADER_SIZE;
    for p in &placed {
        let name = p.codec.kind.name();
        if p.offset < record_start + HEADER_SIZE {
            return Err(Error::format(
                p.offset,
                format!("{name} section starts inside the header"),
            ));
        }
        if p.offset < end_of_previous {
            return Err(Error::format(
                p.offset,
                format!("{name} section overlaps the section before it"),
            ));
        }
        let end = p.offset + p.len;
        if let Some(len) = stream_len {
            if end > len {
                return Err(Error::format(
                    p.offset,
                    format!("{name} section ends at byte {end}, past the end of the stream ({len})"),
                ));
            }
        }
        end_of_previous = end;
    }

    Ok(placed)
}

/// Check the section table of `header` without reading any section.
pub fn validate(header: &Header, record_start: u64, stream_len: Option<u64>) -> Result<()> {
    let version = header.layout_version(record_start)?;
    sample_size_of(header, record_start)?;
    plan(header, version, record_start, stream_len).map(|_| ())
}

/// Decode every present section in ascending offset order, handing each to `visit` as soon as it
/// is read. `bytes` must be positioned right after the header. Stops early, without reading the
/// remaining sections, when `visit` breaks.
pub fn decode_sections<F>(
    bytes: &mut ByteReader,
    header: &Header,
    record_start: u64,
    order: ByteOrder,
    mut visit: F,
) -> Result<ControlFlow<()>>
where
    F: FnMut(Section) -> ControlFlow<()>,
{
    let version = header.layout_version(record_start)?;
    let sample_size = sample_size_of(header, record_start)?;

    for p in plan(header, version, record_start, bytes.stream_len())? {
        let kind = p.codec.kind;
        let gap = p.offset.saturating_sub(bytes.position());
        if gap > 0 {
            bytes.skip(gap, "gap before section")?;
        }

        let raw = bytes.read_bytes(p.len, kind.name())?;
        let count = match kind {
            SectionKind::Samples => header.samples as usize,
            SectionKind::Bases => header.bases as usize,
            _ => raw.len(),
        };
        let context = SectionContext {
            order,
            sample_size,
            count,
            offset: p.offset,
        };

        if visit((p.codec.decode)(&raw, &context)?).is_break() {
            return Ok(ControlFlow::Break(()));
        }
    }

    Ok(ControlFlow::Continue(()))
}

/// Decode one chromatogram starting at the reader's current position.
pub fn decode_from(bytes: &mut ByteReader, order: ByteOrder) -> Result<Chromatogram> {
    let record_start = bytes.position();
    let header = Header::read(bytes, order)?;
    let sample_size = sample_size_of(&header, record_start)?;

    let mut chromatogram = Chromatogram::from_header(&header, sample_size);
    decode_sections(bytes, &header, record_start, order, |section| {
        chromatogram.absorb(section);
        ControlFlow::Continue(())
    })?;
    Ok(chromatogram)
}

pub fn decode(bytes: &[u8], order: ByteOrder) -> Result<Chromatogram> {
    decode_from(&mut ByteReader::from_slice(bytes), order)
}

fn to_u32(n: usize, what: &str) -> Result<u32> {
    u32::try_from(n).map_err(|_| Error::encoding(None, format!("{what} does not fit in 32 bits")))
}

/// Encode with sections laid out back to back after the header, in canonical order.
pub fn encode(chromatogram: &Chromatogram, order: ByteOrder) -> Result<Vec<u8>> {
    let version = Version::from_field(&chromatogram.version).ok_or_else(|| {
        Error::encoding(
            None,
            format!(
                "unsupported chromatogram version `{}`",
                chromatogram.version.escape_ascii()
            ),
        )
    })?;
    if !matches!(chromatogram.sample_size, 1 | 2) {
        return Err(Error::encoding(
            None,
            format!("sample size must be 1 or 2, got {}", chromatogram.sample_size),
        ));
    }

    let mut header = Header {
        samples: to_u32(chromatogram.traces.len(), "sample count")?,
        samples_offset: 0,
        bases: to_u32(chromatogram.calls.len(), "base count")?,
        bases_left_clip: chromatogram.clip_left,
        bases_right_clip: chromatogram.clip_right,
        bases_offset: 0,
        comments_size: 0,
        comments_offset: 0,
        version: chromatogram.version,
        sample_size: chromatogram.sample_size as u32,
        code_set: chromatogram.code_set,
        private_size: 0,
        private_offset: 0,
        spare: chromatogram.spare,
    };

    let mut body = Vec::new();
    for codec in layout(version) {
        let section = (codec.encode)(chromatogram, order)?;
        if section.is_empty() {
            continue;
        }
        let offset = to_u32(HEADER_SIZE as usize + body.len(), "section offset")?;
        header.place(codec.kind, offset, to_u32(section.len(), "section size")?);
        body.extend_from_slice(&section);
    }

    let mut out = Vec::with_capacity(HEADER_SIZE as usize + body.len());
    header.write(&mut out, order);
    out.extend_from_slice(&body);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(version: Version, sample_size: u8) -> Chromatogram {
        let mut c = Chromatogram::new(version, sample_size);
        let max = if sample_size == 1 { 255 } else { 4000 };
        let wave = |phase: usize| -> Vec<u16> {
            (0..40)
                .map(|i| (((i * 37 + phase * 11) % 97) * max / 97) as u16)
                .collect()
        };
        c.traces = Traces {
            a: wave(0),
            c: wave(1),
            g: wave(2),
            t: wave(3),
        };
        c.calls = BaseCalls {
            peaks: vec![3, 12, 21, 30, 38],
            prob_a: vec![40, 0, 1, 2, 0],
            prob_c: vec![0, 35, 0, 0, 1],
            prob_g: vec![2, 0, 28, 0, 0],
            prob_t: vec![0, 1, 0, 50, 3],
            bases: b"ACGTN".to_vec(),
            spare: vec![[0; 3], [1, 2, 3], [0; 3], [0; 3], [9, 9, 9]],
        };
        c.clip_left = 1;
        c.clip_right = 4;
        c.code_set = 2;
        c.comments = b"NAME=sample\nMACH=ABI 377\n".to_vec();
        c.private_data = vec![0xde, 0xad, 0xbe, 0xef];
        c
    }

    /// Rewrite an encoded stream so its sections appear in reverse physical order, with a gap
    /// before each one.
    fn reverse_sections(bytes: &[u8], order: ByteOrder) -> Vec<u8> {
        let mut header = Header::read(&mut ByteReader::from_slice(bytes), order).unwrap();
        let version = header.layout_version(0).unwrap();

        let mut out = vec![0u8; HEADER_SIZE as usize];
        for codec in layout(version).iter().rev() {
            let (offset, len) = header.extent(codec.kind);
            if offset == 0 || len == 0 {
                continue;
            }
            let section = bytes[offset as usize..(offset + len) as usize].to_vec();
            out.extend_from_slice(&[0xaa; 7]);
            header.place(codec.kind, out.len() as u32, len as u32);
            out.extend_from_slice(&section);
        }

        let mut head = Vec::new();
        header.write(&mut head, order);
        out[..HEADER_SIZE as usize].copy_from_slice(&head);
        out
    }

    #[test]
    fn re_encode_is_byte_identical() {
        for version in [Version::V2, Version::V3] {
            for sample_size in [1, 2] {
                for order in [ByteOrder::Little, ByteOrder::Big] {
                    let chromatogram = sample(version, sample_size);
                    let bytes = encode(&chromatogram, order).unwrap();
                    let decoded = decode(&bytes, order).unwrap();
                    assert_eq!(decoded, chromatogram);
                    assert_eq!(encode(&decoded, order).unwrap(), bytes);
                }
            }
        }
    }

    #[test]
    fn physical_section_order_does_not_matter() {
        for version in [Version::V2, Version::V3] {
            let chromatogram = sample(version, 2);
            let canonical = encode(&chromatogram, ByteOrder::Big).unwrap();
            let shuffled = reverse_sections(&canonical, ByteOrder::Big);
            assert_ne!(canonical, shuffled);

            let mut seen = Vec::new();
            let mut bytes = ByteReader::from_slice(&shuffled);
            let header = Header::read(&mut bytes, ByteOrder::Big).unwrap();
            decode_sections(&mut bytes, &header, 0, ByteOrder::Big, |s| {
                seen.push(s.kind());
                ControlFlow::Continue(())
            })
            .unwrap();
            assert_eq!(
                seen,
                [
                    SectionKind::PrivateData,
                    SectionKind::Comments,
                    SectionKind::Bases,
                    SectionKind::Samples
                ]
            );

            assert_eq!(decode(&shuffled, ByteOrder::Big).unwrap(), chromatogram);
            // re-encoding restores canonical order
            assert_eq!(
                encode(&decode(&shuffled, ByteOrder::Big).unwrap(), ByteOrder::Big).unwrap(),
                canonical
            );
        }
    }

    #[test]
    fn absent_sections_are_skipped() {
        let mut chromatogram = Chromatogram::new(Version::V3, 2);
        chromatogram.comments = b"only comments".to_vec();
        let bytes = encode(&chromatogram, ByteOrder::Little).unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE as usize + 13);
        assert_eq!(decode(&bytes, ByteOrder::Little).unwrap(), chromatogram);
    }

    #[test]
    fn bad_magic_and_version() {
        let bytes = encode(&sample(Version::V2, 2), ByteOrder::Little).unwrap();
        let err = decode(&bytes, ByteOrder::Big).unwrap_err();
        assert!(matches!(err, Error::Format { offset: 0, .. }));

        let mut bytes = bytes;
        bytes[36] = b'9';
        let err = decode(&bytes, ByteOrder::Little).unwrap_err();
        assert!(matches!(err, Error::Format { offset: 36, .. }), "{err}");
    }

    #[test]
    fn overlapping_sections_are_rejected() {
        let bytes = encode(&sample(Version::V2, 1), ByteOrder::Little).unwrap();
        let mut header = Header::read(&mut ByteReader::from_slice(&bytes), ByteOrder::Little).unwrap();
        let samples_offset = header.samples_offset;
        header.place(SectionKind::Comments, samples_offset + 4, header.comments_size);

        let mut broken = Vec::new();
        header.write(&mut broken, ByteOrder::Little);
        broken.extend_from_slice(&bytes[HEADER_SIZE as usize..]);
        let err = decode(&broken, ByteOrder::Little).unwrap_err();
        assert!(err.to_string().contains("overlaps"), "{err}");
    }

    #[test]
    fn sections_outside_the_stream_are_rejected() {
        let bytes = encode(&sample(Version::V3, 2), ByteOrder::Little).unwrap();

        let truncated = &bytes[..bytes.len() - 1];
        let err = decode(truncated, ByteOrder::Little).unwrap_err();
        assert!(err.to_string().contains("past the end"), "{err}");

        let mut header = Header::read(&mut ByteReader::from_slice(&bytes), ByteOrder::Little).unwrap();
        header.place(SectionKind::PrivateData, 64, header.private_size);
        let mut broken = Vec::new();
        header.write(&mut broken, ByteOrder::Little);
        broken.extend_from_slice(&bytes[HEADER_SIZE as usize..]);
        let err = decode(&broken, ByteOrder::Little).unwrap_err();
        assert!(matches!(err, Error::Format { offset: 64, .. }), "{err}");
    }

    #[test]
    fn counted_sections_at_offset_zero_are_rejected() {
        let bytes = encode(&sample(Version::V2, 1), ByteOrder::Little).unwrap();
        for kind in [SectionKind::Bases, SectionKind::Samples] {
            let mut header = Header::read(&mut ByteReader::from_slice(&bytes), ByteOrder::Little).unwrap();
            assert!(header.bases > 0 && header.samples > 0);
            header.place(kind, 0, 0);
            let mut broken = Vec::new();
            header.write(&mut broken, ByteOrder::Little);
            broken.extend_from_slice(&bytes[HEADER_SIZE as usize..]);

            let err = decode(&broken, ByteOrder::Little).unwrap_err();
            assert!(matches!(err, Error::Format { offset: 0, .. }), "{kind:?}: {err}");
            assert!(err.to_string().contains("inside the header"), "{err}");
        }
    }

    #[test]
    fn empty_comments_at_offset_zero_are_absent() {
        let mut c = sample(Version::V3, 2);
        c.comments.clear();
        let bytes = encode(&c, ByteOrder::Little).unwrap();
        let mut header = Header::read(&mut ByteReader::from_slice(&bytes), ByteOrder::Little).unwrap();
        header.place(SectionKind::Comments, 0, 0);
        let mut patched = Vec::new();
        header.write(&mut patched, ByteOrder::Little);
        patched.extend_from_slice(&bytes[HEADER_SIZE as usize..]);

        let decoded = decode(&patched, ByteOrder::Little).unwrap();
        assert!(decoded.comments.is_empty());
        assert_eq!(decoded.calls, c.calls);
    }

    #[test]
    fn halting_stops_before_later_sections() {
        let bytes = encode(&sample(Version::V2, 2), ByteOrder::Little).unwrap();
        let mut bytes = ByteReader::from_slice(&bytes);
        let header = Header::read(&mut bytes, ByteOrder::Little).unwrap();
        let mut n = 0;
        let flow = decode_sections(&mut bytes, &header, 0, ByteOrder::Little, |_| {
            n += 1;
            ControlFlow::Break(())
        })
        .unwrap();
        assert!(flow.is_break());
        assert_eq!(n, 1);
    }

    #[test]
    fn oversized_samples_are_an_encoding_error() {
        let mut chromatogram = sample(Version::V2, 1);
        chromatogram.traces.a[0] = 300;
        assert!(matches!(
            encode(&chromatogram, ByteOrder::Little),
            Err(Error::Encoding { .. })
        ));
    }
}

use itertools::izip;

use super::header::Version;
use super::Chromatogram;
use crate::error::{Error, Result};
use crate::options::ByteOrder;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SectionKind {
    Samples,
    Bases,
    Comments,
    PrivateData,
}

impl SectionKind {
    pub fn name(self) -> &'static str {
        match self {
            SectionKind::Samples => "samples",
            SectionKind::Bases => "bases",
            SectionKind::Comments => "comments",
            SectionKind::PrivateData => "private data",
        }
    }
}

/// The four trace channels, one sample per point each.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Traces {
    pub a: Vec<u16>,
    pub c: Vec<u16>,
    pub g: Vec<u16>,
    pub t: Vec<u16>,
}

impl Traces {
    pub fn len(&self) -> usize {
        self.a.len()
    }

    pub fn is_empty(&self) -> bool {
        self.a.is_empty()
    }

    pub fn channels(&self) -> [&Vec<u16>; 4] {
        [&self.a, &self.c, &self.g, &self.t]
    }

    fn with_points(n: usize) -> Self {
        Traces {
            a: Vec::with_capacity(n),
            c: Vec::with_capacity(n),
            g: Vec::with_capacity(n),
            t: Vec::with_capacity(n),
        }
    }

    fn channels_mut(&mut self) -> [&mut Vec<u16>; 4] {
        [&mut self.a, &mut self.c, &mut self.g, &mut self.t]
    }
}

/// Called bases with their trace positions and per-channel probabilities.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BaseCalls {
    pub peaks: Vec<u32>,
    pub prob_a: Vec<u8>,
    pub prob_c: Vec<u8>,
    pub prob_g: Vec<u8>,
    pub prob_t: Vec<u8>,
    pub bases: Vec<u8>,
    pub spare: Vec<[u8; 3]>,
}

impl BaseCalls {
    pub fn len(&self) -> usize {
        self.bases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    /// Probability of the called base at every position, 0 for calls outside ACGT.
    pub fn called_qualities(&self) -> Result<Vec<u8>> {
        if !self.columns_consistent() {
            return Err(Error::encoding(
                None,
                format!("base call columns differ in length from {} calls", self.len()),
            ));
        }
        Ok(izip!(&self.bases, &self.prob_a, &self.prob_c, &self.prob_g, &self.prob_t)
            .map(|(b, &a, &c, &g, &t)| match b.to_ascii_uppercase() {
                b'A' => a,
                b'C' => c,
                b'G' => g,
                b'T' => t,
                _ => 0,
            })
            .collect())
    }

    fn with_calls(n: usize) -> Self {
        BaseCalls {
            peaks: Vec::with_capacity(n),
            prob_a: Vec::with_capacity(n),
            prob_c: Vec::with_capacity(n),
            prob_g: Vec::with_capacity(n),
            prob_t: Vec::with_capacity(n),
            bases: Vec::with_capacity(n),
            spare: Vec::with_capacity(n),
        }
    }

    fn columns_consistent(&self) -> bool {
        let n = self.bases.len();
        [
            self.peaks.len(),
            self.prob_a.len(),
            self.prob_c.len(),
            self.prob_g.len(),
            self.prob_t.len(),
            self.spare.len(),
        ]
        .iter()
        .all(|&l| l == n)
    }
}

/// Decoded content of one section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Section {
    Traces(Traces),
    BaseCalls(BaseCalls),
    Comments(Vec<u8>),
    PrivateData(Vec<u8>),
}

impl Section {
    pub fn kind(&self) -> SectionKind {
        match self {
            Section::Traces(_) => SectionKind::Samples,
            Section::BaseCalls(_) => SectionKind::Bases,
            Section::Comments(_) => SectionKind::Comments,
            Section::PrivateData(_) => SectionKind::PrivateData,
        }
    }
}

/// What a section decoder needs beyond the section's own bytes.
pub struct SectionContext {
    pub order: ByteOrder,
    pub sample_size: u8,
    /// Number of sample points or base calls declared in the header
    pub count: usize,
    /// Absolute offset of the section, for error reporting
    pub offset: u64,
}

pub type SectionDecoder = fn(&[u8], &SectionContext) -> Result<Section>;
pub type SectionEncoder = fn(&Chromatogram, ByteOrder) -> Result<Vec<u8>>;

pub struct SectionCodec {
    pub kind: SectionKind,
    pub decode: SectionDecoder,
    pub encode: SectionEncoder,
}

// Tables are in canonical write order.
static V2_LAYOUT: [SectionCodec; 4] = [
    SectionCodec {
        kind: SectionKind::Samples,
        decode: decode_samples_interleaved,
        encode: encode_samples_interleaved,
    },
    SectionCodec {
        kind: SectionKind::Bases,
        decode: decode_bases_rows,
        encode: encode_bases_rows,
    },
    SectionCodec {
        kind: SectionKind::Comments,
        decode: decode_comments,
        encode: encode_comments,
    },
    SectionCodec {
        kind: SectionKind::PrivateData,
        decode: decode_private,
        encode: encode_private,
    },
];

static V3_LAYOUT: [SectionCodec; 4] = [
    SectionCodec {
        kind: SectionKind::Samples,
        decode: decode_samples_planar,
        encode: encode_samples_planar,
    },
    SectionCodec {
        kind: SectionKind::Bases,
        decode: decode_bases_columns,
        encode: encode_bases_columns,
    },
    SectionCodec {
        kind: SectionKind::Comments,
        decode: decode_comments,
        encode: encode_comments,
    },
    SectionCodec {
        kind: SectionKind::PrivateData,
        decode: decode_private,
        encode: encode_private,
    },
];

/// Section codecs of a version, in canonical write order.
pub fn layout(version: Version) -> &'static [SectionCodec] {
    match version {
        Version::V2 => &V2_LAYOUT,
        Version::V3 => &V3_LAYOUT,
    }
}

fn sample_mask(sample_size: u8) -> u16 {
    if sample_size == 1 {
        0x00ff
    } else {
        0xffff
    }
}

fn read_sample(raw: &[u8], ctx: &SectionContext) -> u16 {
    match ctx.sample_size {
        1 => raw[0] as u16,
        _ => ctx.order.u16_from([raw[0], raw[1]]),
    }
}

fn put_sample(out: &mut Vec<u8>, v: u16, sample_size: u8, order: ByteOrder) -> Result<()> {
    if sample_size == 1 {
        let byte = u8::try_from(v).map_err(|_| {
            Error::encoding(None, format!("sample value {v} does not fit in one byte"))
        })?;
        out.push(byte);
    } else {
        order.put_u16(out, v);
    }
    Ok(())
}

/// Two rounds of first differences, wrapping at the sample width.
pub fn delta_delta_encode(samples: &mut [u16], sample_size: u8) {
    let mask = sample_mask(sample_size);
    for _ in 0..2 {
        let mut prev = 0u16;
        for s in samples.iter_mut() {
            let current = *s;
            *s = current.wrapping_sub(prev) & mask;
            prev = current;
        }
    }
}

pub fn delta_delta_decode(samples: &mut [u16], sample_size: u8) {
    let mask = sample_mask(sample_size);
    for _ in 0..2 {
        let mut prev = 0u16;
        for s in samples.iter_mut() {
            *s = s.wrapping_add(prev) & mask;
            prev = *s;
        }
    }
}

fn check_traces(chrom: &Chromatogram) -> Result<()> {
    let n = chrom.traces.len();
    if chrom.traces.channels().iter().any(|ch| ch.len() != n) {
        return Err(Error::encoding(
            None,
            "trace channels have different lengths",
        ));
    }
    Ok(())
}

fn decode_samples_interleaved(raw: &[u8], ctx: &SectionContext) -> Result<Section> {
    let width = ctx.sample_size as usize;
    let mut traces = Traces::with_points(ctx.count);
    for point in raw.chunks_exact(4 * width) {
        for (ch, sample) in traces.channels_mut().into_iter().zip(point.chunks_exact(width)) {
            ch.push(read_sample(sample, ctx));
        }
    }
    Ok(Section::Traces(traces))
}

fn encode_samples_interleaved(chrom: &Chromatogram, order: ByteOrder) -> Result<Vec<u8>> {
    check_traces(chrom)?;
    let t = &chrom.traces;
    let mut out = Vec::with_capacity(t.len() * 4 * chrom.sample_size as usize);
    for i in 0..t.len() {
        for ch in t.channels() {
            put_sample(&mut out, ch[i], chrom.sample_size, order)?;
        }
    }
    Ok(out)
}

fn decode_samples_planar(raw: &[u8], ctx: &SectionContext) -> Result<Section> {
    let width = ctx.sample_size as usize;
    let mut traces = Traces::default();
    let plane = ctx.count * width;
    for (ch, bytes) in traces.channels_mut().into_iter().zip(raw.chunks_exact(plane.max(1))) {
        ch.extend(bytes.chunks_exact(width).map(|s| read_sample(s, ctx)));
        delta_delta_decode(ch, ctx.sample_size);
    }
    Ok(Section::Traces(traces))
}

fn encode_samples_planar(chrom: &Chromatogram, order: ByteOrder) -> Result<Vec<u8>> {
    check_traces(chrom)?;
    let mut out = Vec::with_capacity(chrom.traces.len() * 4 * chrom.sample_size as usize);
    for ch in chrom.traces.channels() {
        let mut deltas = ch.clone();
        delta_delta_encode(&mut deltas, chrom.sample_size);
        for v in deltas {
            put_sample(&mut out, v, chrom.sample_size, order)?;
        }
    }
    Ok(out)
}

fn check_calls(chrom: &Chromatogram) -> Result<()> {
    if !chrom.calls.columns_consistent() {
        return Err(Error::encoding(
            None,
            "base call columns have different lengths",
        ));
    }
    Ok(())
}

fn decode_bases_rows(raw: &[u8], ctx: &SectionContext) -> Result<Section> {
    let mut calls = BaseCalls::with_calls(ctx.count);
    for row in raw.chunks_exact(12) {
        calls
            .peaks
            .push(ctx.order.u32_from([row[0], row[1], row[2], row[3]]));
        calls.prob_a.push(row[4]);
        calls.prob_c.push(row[5]);
        calls.prob_g.push(row[6]);
        calls.prob_t.push(row[7]);
        calls.bases.push(row[8]);
        calls.spare.push([row[9], row[10], row[11]]);
    }
    Ok(Section::BaseCalls(calls))
}

fn encode_bases_rows(chrom: &Chromatogram, order: ByteOrder) -> Result<Vec<u8>> {
    check_calls(chrom)?;
    let c = &chrom.calls;
    let mut out = Vec::with_capacity(c.len() * 12);
    for (&peak, &a, &cc, &g, &t, &base, spare) in izip!(
        &c.peaks, &c.prob_a, &c.prob_c, &c.prob_g, &c.prob_t, &c.bases, &c.spare
    ) {
        order.put_u32(&mut out, peak);
        out.extend_from_slice(&[a, cc, g, t, base]);
        out.extend_from_slice(spare);
    }
    Ok(out)
}

fn decode_bases_columns(raw: &[u8], ctx: &SectionContext) -> Result<Section> {
    let n = ctx.count;
    if raw.len() != n * 12 {
        return Err(Error::format(
            ctx.offset,
            format!("bases section holds {} bytes, {n} calls need {}", raw.len(), n * 12),
        ));
    }

    let (peaks, rest) = raw.split_at(n * 4);
    let column = |i: usize| rest[i * n..(i + 1) * n].to_vec();

    let spare = (0..n)
        .map(|j| [rest[6 * n + j], rest[7 * n + j], rest[8 * n + j]])
        .collect();

    Ok(Section::BaseCalls(BaseCalls {
        peaks: peaks
            .chunks_exact(4)
            .map(|p| ctx.order.u32_from([p[0], p[1], p[2], p[3]]))
            .collect(),
        prob_a: column(0),
        prob_c: column(1),
        prob_g: column(2),
        prob_t: column(3),
        bases: column(4),
        spare,
    }))
}

fn encode_bases_columns(chrom: &Chromatogram, order: ByteOrder) -> Result<Vec<u8>> {
    check_calls(chrom)?;
    let c = &chrom.calls;
    let mut out = Vec::with_capacity(c.len() * 12);
    for &p in &c.peaks {
        order.put_u32(&mut out, p);
    }
    for column in [&c.prob_a, &c.prob_c, &c.prob_g, &c.prob_t, &c.bases] {
        out.extend_from_slice(column);
    }
    for k in 0..3 {
        out.extend(c.spare.iter().map(|s| s[k]));
    }
    Ok(out)
}

fn decode_comments(raw: &[u8], _ctx: &SectionContext) -> Result<Section> {
    Ok(Section::Comments(raw.to_vec()))
}

fn encode_comments(chrom: &Chromatogram, _order: ByteOrder) -> Result<Vec<u8>> {
    Ok(chrom.comments.clone())
}

fn decode_private(raw: &[u8], _ctx: &SectionContext) -> Result<Section> {
    Ok(Section::PrivateData(raw.to_vec()))
}

fn encode_private(chrom: &Chromatogram, _order: ByteOrder) -> Result<Vec<u8>> {
    Ok(chrom.private_data.clone())
}

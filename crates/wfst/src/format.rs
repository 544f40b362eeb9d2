// Binary transducer format: header parsing, state and transition blocks.
//
// The layout is the OpenFST one, little-endian:
// - header: magic, fst type, arc type, version, flags, properties, start,
//   number of states, number of transitions
// - optional input and output symbol tables
// - "vector" body: per state the final weight, the transition count and
//   the 16-byte transition records
// - "const" body: a state array and a transition array, each aligned to
//   16 bytes from the start of the stream

use std::path::Path;

use bytemuck::{Pod, Zeroable};

use crate::fst::{ConstFst, Fst, VectorFst};
use crate::properties::{FstProperties, compute_properties};
use crate::semiring::Semiring;
use crate::symbol_table::parse_symbol_table;
use crate::tr::Tr;
use crate::{Result, StateId, WfstError};

/// Magic number opening every binary transducer.
pub const FST_MAGIC: i32 = 2_125_659_606;

/// Oldest supported file version.
const MIN_VERSION: i32 = 2;

/// Version written by `store`.
const VERSION: i32 = 2;

const FLAG_HAS_ISYMBOLS: i32 = 0x1;
const FLAG_HAS_OSYMBOLS: i32 = 0x2;
const FLAG_IS_ALIGNED: i32 = 0x4;

/// Alignment of the state and transition arrays of a const body.
const FILE_ALIGN: usize = 16;

pub const VECTOR_FST_TYPE: &str = "vector";
pub const CONST_FST_TYPE: &str = "const";

/// Parsed binary header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FstHeader {
    pub fst_type: String,
    pub arc_type: String,
    pub version: i32,
    pub flags: i32,
    pub properties: u64,
    /// `-1` when there is no start state.
    pub start: i64,
    pub num_states: i64,
    pub num_trs: i64,
}

/// Transition record (16 bytes).
///
/// Layout: `ilabel` (i32), `olabel` (i32), `weight` (f32), `nextstate` (i32).
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct TrRecord {
    ilabel: i32,
    olabel: i32,
    weight: f32,
    nextstate: i32,
}

/// State record of a const body (20 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct ConstStateRecord {
    final_weight: f32,
    pos: u32,
    ntrs: u32,
    niepsilons: u32,
    noepsilons: u32,
}

/// Bounds-checked little-endian cursor.
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    #[cfg(test)]
    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or(WfstError::TooShort {
            expected: usize::MAX,
            actual: self.data.len(),
        })?;
        if end > self.data.len() {
            return Err(WfstError::TooShort {
                expected: end,
                actual: self.data.len(),
            });
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        buf.copy_from_slice(self.take(N)?);
        Ok(buf)
    }

    pub(crate) fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    pub(crate) fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    pub(crate) fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    pub(crate) fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.array()?))
    }

    /// Length-prefixed (i32) UTF-8 string.
    pub(crate) fn read_string(&mut self) -> Result<String> {
        let len = self.read_i32()?;
        let len = usize::try_from(len)
            .map_err(|_| WfstError::InvalidFormat(format!("negative string length {len}")))?;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| WfstError::InvalidFormat("invalid UTF-8 in string".to_string()))
    }

    /// Skip padding up to the next multiple of `align`.
    fn align(&mut self, align: usize) -> Result<()> {
        let partial = self.pos % align;
        if partial > 0 {
            self.take(align - partial)?;
        }
        Ok(())
    }

    fn read_record<T: Pod>(&mut self) -> Result<T> {
        Ok(bytemuck::pod_read_unaligned(self.take(size_of::<T>())?))
    }
}

pub(crate) fn write_i32(out: &mut Vec<u8>, v: i32) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub(crate) fn write_i64(out: &mut Vec<u8>, v: i64) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn write_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn write_f32(out: &mut Vec<u8>, v: f32) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub(crate) fn write_string(out: &mut Vec<u8>, s: &str) {
    write_i32(out, s.len() as i32);
    out.extend_from_slice(s.as_bytes());
}

fn write_padding(out: &mut Vec<u8>, align: usize) {
    let partial = out.len() % align;
    if partial > 0 {
        out.resize(out.len() + (align - partial), 0);
    }
}

/// Parse and validate the binary header.
pub(crate) fn parse_header(reader: &mut ByteReader<'_>) -> Result<FstHeader> {
    let magic = reader.read_i32()?;
    if magic != FST_MAGIC {
        return Err(WfstError::InvalidMagic(magic));
    }
    let header = FstHeader {
        fst_type: reader.read_string()?,
        arc_type: reader.read_string()?,
        version: reader.read_i32()?,
        flags: reader.read_i32()?,
        properties: reader.read_u64()?,
        start: reader.read_i64()?,
        num_states: reader.read_i64()?,
        num_trs: reader.read_i64()?,
    };
    if header.version < MIN_VERSION {
        return Err(WfstError::InvalidFormat(format!(
            "unsupported version {}",
            header.version
        )));
    }
    if header.num_states < 0 || header.num_trs < 0 || header.start < -1 {
        return Err(WfstError::InvalidFormat(format!(
            "negative counts in header: start {}, states {}, transitions {}",
            header.start, header.num_states, header.num_trs
        )));
    }
    if header.start >= header.num_states {
        return Err(WfstError::InvalidFormat(format!(
            "start state {} out of range",
            header.start
        )));
    }
    Ok(header)
}

fn write_header(out: &mut Vec<u8>, header: &FstHeader) {
    write_i32(out, FST_MAGIC);
    write_string(out, &header.fst_type);
    write_string(out, &header.arc_type);
    write_i32(out, header.version);
    write_i32(out, header.flags);
    write_u64(out, header.properties);
    write_i64(out, header.start);
    write_i64(out, header.num_states);
    write_i64(out, header.num_trs);
}

fn make_header<W: Semiring, F: Fst<W>>(fst: &F, fst_type: &str) -> Result<FstHeader> {
    let mut flags = 0;
    if fst.input_symbols().is_some() {
        flags |= FLAG_HAS_ISYMBOLS;
    }
    if fst.output_symbols().is_some() {
        flags |= FLAG_HAS_OSYMBOLS;
    }
    let mut properties = compute_properties(fst)?;
    if fst_type == CONST_FST_TYPE {
        flags |= FLAG_IS_ALIGNED;
    } else {
        properties |= FstProperties::MUTABLE;
    }
    Ok(FstHeader {
        fst_type: fst_type.to_string(),
        arc_type: W::ARC_TYPE.to_string(),
        version: VERSION,
        flags,
        properties: properties.bits(),
        start: fst.start().map_or(-1, i64::from),
        num_states: fst.num_states() as i64,
        num_trs: fst.num_trs_total() as i64,
    })
}

fn final_to_f32<W: Semiring>(w: Option<W>) -> f32 {
    w.map_or(f32::INFINITY, |w| w.value())
}

fn f32_to_final<W: Semiring>(v: f32) -> Option<W> {
    if v == f32::INFINITY {
        None
    } else {
        Some(W::new(v))
    }
}

fn tr_record<W: Semiring>(tr: &Tr<W>) -> TrRecord {
    TrRecord {
        ilabel: tr.ilabel as i32,
        olabel: tr.olabel as i32,
        weight: tr.weight.value(),
        nextstate: tr.nextstate as i32,
    }
}

fn tr_from_record<W: Semiring>(rec: &TrRecord, num_states: usize) -> Result<Tr<W>> {
    if rec.nextstate < 0 || rec.nextstate as usize >= num_states {
        return Err(WfstError::InvalidFormat(format!(
            "transition to state {} out of range",
            rec.nextstate
        )));
    }
    if rec.ilabel < 0 || rec.olabel < 0 {
        return Err(WfstError::InvalidFormat(format!(
            "negative label in transition ({}, {})",
            rec.ilabel, rec.olabel
        )));
    }
    Ok(Tr::new(
        rec.ilabel as u32,
        rec.olabel as u32,
        W::new(rec.weight),
        rec.nextstate as StateId,
    ))
}

/// Serialize any transducer with the given body type.
pub fn serialize<W: Semiring, F: Fst<W>>(fst: &F, fst_type: &str) -> Result<Vec<u8>> {
    let header = make_header(fst, fst_type)?;
    let mut out = Vec::new();
    write_header(&mut out, &header);
    if let Some(symt) = fst.input_symbols() {
        symt.write_binary(&mut out);
    }
    if let Some(symt) = fst.output_symbols() {
        symt.write_binary(&mut out);
    }

    if fst_type == CONST_FST_TYPE {
        write_padding(&mut out, FILE_ALIGN);
        let mut pos = 0u32;
        for s in fst.states_iter() {
            let ntrs = fst.num_trs(s)? as u32;
            let rec = ConstStateRecord {
                final_weight: final_to_f32(fst.final_weight(s)?),
                pos,
                ntrs,
                niepsilons: fst.num_input_epsilons(s)? as u32,
                noepsilons: fst.num_output_epsilons(s)? as u32,
            };
            out.extend_from_slice(bytemuck::bytes_of(&rec));
            pos += ntrs;
        }
        write_padding(&mut out, FILE_ALIGN);
        for s in fst.states_iter() {
            for tr in fst.get_trs(s)? {
                out.extend_from_slice(bytemuck::bytes_of(&tr_record(tr)));
            }
        }
    } else {
        for s in fst.states_iter() {
            write_f32(&mut out, final_to_f32(fst.final_weight(s)?));
            let trs = fst.get_trs(s)?;
            write_i64(&mut out, trs.len() as i64);
            for tr in trs {
                out.extend_from_slice(bytemuck::bytes_of(&tr_record(tr)));
            }
        }
    }
    Ok(out)
}

/// Parse a binary transducer of either body type into a `VectorFst`.
pub fn deserialize<W: Semiring>(data: &[u8]) -> Result<VectorFst<W>> {
    let mut reader = ByteReader::new(data);
    let header = parse_header(&mut reader)?;
    if header.arc_type != W::ARC_TYPE {
        return Err(WfstError::TypeMismatch {
            expected: W::ARC_TYPE.to_string(),
            actual: header.arc_type,
        });
    }

    let mut fst = VectorFst::new();
    if header.flags & FLAG_HAS_ISYMBOLS != 0 {
        fst.set_input_symbols(parse_symbol_table(&mut reader)?.into());
    }
    if header.flags & FLAG_HAS_OSYMBOLS != 0 {
        fst.set_output_symbols(parse_symbol_table(&mut reader)?.into());
    }

    let num_states = header.num_states as usize;
    // Each state takes at least one byte of body.
    if num_states > data.len() {
        return Err(WfstError::TooShort {
            expected: num_states,
            actual: data.len(),
        });
    }
    fst.add_states(num_states);

    match header.fst_type.as_str() {
        VECTOR_FST_TYPE => {
            for s in 0..num_states {
                let final_weight = reader.read_f32()?;
                let ntrs = reader.read_i64()?;
                if ntrs < 0 {
                    return Err(WfstError::InvalidFormat(format!(
                        "negative transition count {ntrs}"
                    )));
                }
                let mut trs = Vec::with_capacity((ntrs as usize).min(data.len() / 16));
                for _ in 0..ntrs {
                    let rec: TrRecord = reader.read_record()?;
                    trs.push(tr_from_record(&rec, num_states)?);
                }
                fst.set_trs_unchecked(s as StateId, trs);
                if let Some(w) = f32_to_final(final_weight) {
                    fst.set_final_unchecked(s as StateId, w);
                }
            }
        }
        CONST_FST_TYPE => {
            if header.flags & FLAG_IS_ALIGNED != 0 {
                reader.align(FILE_ALIGN)?;
            }
            let mut records = Vec::with_capacity(num_states);
            for _ in 0..num_states {
                records.push(reader.read_record::<ConstStateRecord>()?);
            }
            if header.flags & FLAG_IS_ALIGNED != 0 {
                reader.align(FILE_ALIGN)?;
            }
            let num_trs = header.num_trs as usize;
            let mut all_trs = Vec::with_capacity(num_trs.min(data.len() / 16));
            for _ in 0..num_trs {
                let rec: TrRecord = reader.read_record()?;
                all_trs.push(tr_from_record::<W>(&rec, num_states)?);
            }
            for (s, rec) in records.iter().enumerate() {
                let (pos, n) = (rec.pos as usize, rec.ntrs as usize);
                let trs = all_trs.get(pos..pos + n).ok_or_else(|| {
                    WfstError::InvalidFormat(format!("state {s} transitions out of range"))
                })?;
                fst.set_trs_unchecked(s as StateId, trs.to_vec());
                if let Some(w) = f32_to_final(rec.final_weight) {
                    fst.set_final_unchecked(s as StateId, w);
                }
            }
        }
        other => {
            return Err(WfstError::InvalidFormat(format!(
                "unknown fst type {other:?}"
            )));
        }
    }

    if header.start >= 0 {
        fst.set_start(header.start as StateId)?;
    }
    Ok(fst)
}

impl<W: Semiring> VectorFst<W> {
    /// Serialize to bytes.
    pub fn store(&self) -> Result<Vec<u8>> {
        serialize(self, VECTOR_FST_TYPE)
    }

    /// Parse bytes written by [`VectorFst::store`] or [`ConstFst::store`].
    pub fn load(data: &[u8]) -> Result<Self> {
        deserialize(data)
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::load(&data)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.store()?)?;
        Ok(())
    }
}

impl<W: Semiring> ConstFst<W> {
    pub fn store(&self) -> Result<Vec<u8>> {
        serialize(self, CONST_FST_TYPE)
    }

    pub fn load(data: &[u8]) -> Result<Self> {
        Ok(deserialize(data)?.into())
    }

    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::load(&data)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.store()?)?;
        Ok(())
    }
}

/// Read only the header of a binary transducer.
pub fn read_header(data: &[u8]) -> Result<FstHeader> {
    parse_header(&mut ByteReader::new(data))
}

//! Reader for SPSS system files (`.sav`).
//!
//! Layout of a system file:
//! ```text
//!  header (176 bytes, "$FL2")
//!  dictionary records
//!     2   variable (one per 8-byte case element, strings add continuations)
//!     3/4 value labels + the variables they apply to
//!     6   document lines
//!     7   extension (subtype 3 int info, 4 float info, 13 long names,
//!         14 very long strings, 20 encoding, others skipped)
//!     999 end of dictionary
//!  case data (raw 8-byte elements, or bytecode compressed)
//! ```

use std::collections::HashMap;

use anyhow::{bail, Context, Result};

use super::model::{Column, Dataset, Value};
use crate::error::LoadError;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// One logical variable (string continuations and very-long-string segments
/// folded in).
#[derive(Debug, Clone)]
pub struct SavVariable {
    /// Long variable name when the file has one, short name otherwise.
    pub name: String,
    pub short_name: String,
    pub label: Option<String>,
    /// 0 for numeric variables, string width in bytes otherwise.
    pub width: usize,
    pub print_format: u32,
    pub value_labels: Vec<(Value, String)>,
}

impl SavVariable {
    fn format_type(&self) -> u8 {
        ((self.print_format >> 16) & 0xff) as u8
    }
}

/// A fully decoded system file.
#[derive(Debug, Clone)]
pub struct SavFile {
    pub dataset: Dataset,
    pub variables: Vec<SavVariable>,
    pub file_label: String,
    pub documents: Vec<String>,
    pub utf8: bool,
}

impl SavFile {
    /// Decode a system file held in memory.
    pub fn parse(bytes: &[u8]) -> Result<Self, LoadError> {
        match bytes.get(..4) {
            Some(b"$FL2") => {}
            Some(b"$FL3") => return Err(LoadError::UnsupportedFormat("zsav".to_string())),
            _ => return Err(LoadError::Malformed("not an SPSS system file".to_string())),
        }
        parse_system_file(bytes).map_err(LoadError::malformed)
    }

    /// Column identifiers in file order.
    pub fn column_names(&self) -> Vec<String> {
        self.variables.iter().map(|v| v.name.clone()).collect()
    }

    /// Variable labels in file order, parallel to [`Self::column_names`].
    pub fn column_labels(&self) -> Vec<Option<String>> {
        self.variables.iter().map(|v| v.label.clone()).collect()
    }
}

// ---------------------------------------------------------------------------
// Byte cursor
// ---------------------------------------------------------------------------

struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
    big_endian: bool,
}

impl<'a> ByteReader<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .with_context(|| format!("unexpected end of file at offset {} (wanted {n} bytes)", self.pos))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn take8(&mut self) -> Result<[u8; 8]> {
        let mut out = [0u8; 8];
        out.copy_from_slice(self.take(8)?);
        Ok(out)
    }

    fn i32(&mut self) -> Result<i32> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4)?);
        Ok(if self.big_endian {
            i32::from_be_bytes(raw)
        } else {
            i32::from_le_bytes(raw)
        })
    }

    fn f64(&mut self) -> Result<f64> {
        let raw = self.take8()?;
        Ok(self.to_f64(raw))
    }

    fn to_f64(&self, raw: [u8; 8]) -> f64 {
        if self.big_endian {
            f64::from_be_bytes(raw)
        } else {
            f64::from_le_bytes(raw)
        }
    }

    fn count(&mut self, what: &str) -> Result<usize> {
        let n = self.i32()?;
        usize::try_from(n).with_context(|| format!("negative {what} count {n}"))
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}

// ---------------------------------------------------------------------------
// Dictionary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum MissingSpec {
    None,
    Discrete(Vec<f64>),
    Range { low: f64, high: f64, extra: Option<f64> },
}

impl MissingSpec {
    fn is_missing(&self, v: f64) -> bool {
        match self {
            MissingSpec::None => false,
            MissingSpec::Discrete(values) => values.contains(&v),
            MissingSpec::Range { low, high, extra } => (*low..=*high).contains(&v) || *extra == Some(v),
        }
    }
}

/// One type-2 record, i.e. one 8-byte element of each case.
struct RawVariable {
    width: i32,
    name: Vec<u8>,
    label: Option<Vec<u8>>,
    missing: MissingSpec,
    print: u32,
}

struct ValueLabelSet {
    labels: Vec<([u8; 8], Vec<u8>)>,
    /// One-based dictionary indices.
    variables: Vec<usize>,
}

#[derive(Default)]
struct Dictionary {
    records: Vec<RawVariable>,
    label_sets: Vec<ValueLabelSet>,
    documents: Vec<Vec<u8>>,
    long_names: Option<Vec<u8>>,
    very_long: Option<Vec<u8>>,
    encoding: Option<String>,
    character_code: Option<i32>,
    sysmis: Option<f64>,
}

struct Header {
    compression: i32,
    n_cases: Option<usize>,
    bias: f64,
    file_label: Vec<u8>,
}

fn read_header(r: &mut ByteReader<'_>) -> Result<Header> {
    r.take(64).context("reading file header")?;
    let layout_bytes: [u8; 4] = r.take(4)?.try_into()?;
    r.big_endian = match (i32::from_le_bytes(layout_bytes), i32::from_be_bytes(layout_bytes)) {
        (2 | 3, _) => false,
        (_, 2 | 3) => true,
        (le, _) => bail!("unrecognised layout code {le}"),
    };
    let _nominal_case_size = r.i32()?;
    let compression = r.i32()?;
    let _weight_index = r.i32()?;
    let n_cases = usize::try_from(r.i32()?).ok();
    let bias = r.f64()?;
    r.take(9 + 8)?;
    let file_label = r.take(64)?.to_vec();
    r.take(3)?;
    Ok(Header {
        compression,
        n_cases,
        bias,
        file_label,
    })
}

fn read_dictionary(r: &mut ByteReader<'_>) -> Result<Dictionary> {
    let mut dict = Dictionary::default();
    loop {
        let offset = r.pos;
        let rec_type = r.i32()?;
        match rec_type {
            2 => {
                let record = read_variable(r)
                    .with_context(|| format!("variable record at offset {offset}"))?;
                dict.records.push(record);
            }
            3 => {
                let set = read_value_labels(r)
                    .with_context(|| format!("value label record at offset {offset}"))?;
                dict.label_sets.push(set);
            }
            6 => {
                let n = r.count("document line")?;
                for _ in 0..n {
                    dict.documents.push(r.take(80)?.to_vec());
                }
            }
            7 => read_extension(r, &mut dict)
                .with_context(|| format!("extension record at offset {offset}"))?,
            999 => {
                r.i32()?;
                return Ok(dict);
            }
            other => bail!("unknown record type {other} at offset {offset}"),
        }
    }
}

fn read_variable(r: &mut ByteReader<'_>) -> Result<RawVariable> {
    let width = r.i32()?;
    let has_label = r.i32()?;
    let n_missing = r.i32()?;
    let print = r.i32()? as u32;
    let _write = r.i32()?;
    let name = r.take(8)?.to_vec();

    let label = if has_label == 1 {
        let len = r.count("label length")?;
        let label = r.take(len)?.to_vec();
        r.take(len.next_multiple_of(4) - len)?;
        Some(label)
    } else {
        None
    };

    let mut values = Vec::new();
    for _ in 0..n_missing.unsigned_abs() {
        values.push(r.f64()?);
    }
    let missing = if width != 0 {
        // String missing values are not applied.
        MissingSpec::None
    } else {
        match (n_missing, values.as_slice()) {
            (0, _) => MissingSpec::None,
            (1..=3, _) => MissingSpec::Discrete(values),
            (-2, [low, high]) => MissingSpec::Range {
                low: *low,
                high: *high,
                extra: None,
            },
            (-3, [low, high, extra]) => MissingSpec::Range {
                low: *low,
                high: *high,
                extra: Some(*extra),
            },
            (n, _) => bail!("invalid missing value count {n}"),
        }
    };

    Ok(RawVariable {
        width,
        name,
        label,
        missing,
        print,
    })
}

fn read_value_labels(r: &mut ByteReader<'_>) -> Result<ValueLabelSet> {
    let n = r.count("value label")?;
    // Each entry takes at least 16 bytes, so the file bounds the count.
    let mut labels = Vec::with_capacity(n.min(r.remaining() / 16));
    for _ in 0..n {
        let value = r.take8()?;
        let len = r.take(1)?[0] as usize;
        let text = r.take(len)?.to_vec();
        r.take((len + 1).next_multiple_of(8) - (len + 1))?;
        labels.push((value, text));
    }

    let rec_type = r.i32()?;
    if rec_type != 4 {
        bail!("value labels not followed by a variable index record (got type {rec_type})");
    }
    let n_vars = r.count("value label variable")?;
    let mut variables = Vec::with_capacity(n_vars.min(r.remaining() / 4));
    for _ in 0..n_vars {
        variables.push(r.count("variable index")?);
    }
    Ok(ValueLabelSet { labels, variables })
}

fn read_extension(r: &mut ByteReader<'_>, dict: &mut Dictionary) -> Result<()> {
    let subtype = r.i32()?;
    let size = r.count("extension element size")?;
    let count = r.count("extension element")?;
    let len = size
        .checked_mul(count)
        .context("extension record too large")?;
    let data = r.take(len)?;

    let mut sub = ByteReader {
        buf: data,
        pos: 0,
        big_endian: r.big_endian,
    };
    match subtype {
        3 if size == 4 && count >= 8 => {
            sub.take(7 * 4)?;
            dict.character_code = Some(sub.i32()?);
        }
        4 if size == 8 && count >= 1 => dict.sysmis = Some(sub.f64()?),
        13 => dict.long_names = Some(data.to_vec()),
        14 => dict.very_long = Some(data.to_vec()),
        20 => dict.encoding = Some(String::from_utf8_lossy(data).trim().to_string()),
        other => log::debug!("skipping extension record subtype {other} ({len} bytes)"),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Text decoding
// ---------------------------------------------------------------------------

/// Windows-1252 code points for bytes 0x80..=0x9F.
const CP1252_HIGH: [char; 32] = [
    '€', '\u{81}', '‚', 'ƒ', '„', '…', '†', '‡', 'ˆ', '‰', 'Š', '‹', 'Œ', '\u{8d}', 'Ž', '\u{8f}',
    '\u{90}', '‘', '’', '“', '”', '•', '–', '—', '˜', '™', 'š', '›', 'œ', '\u{9d}', 'ž', 'Ÿ',
];

struct TextDecoder {
    utf8: bool,
}

impl TextDecoder {
    fn for_dictionary(dict: &Dictionary) -> Self {
        let declared_utf8 = dict.character_code == Some(65001)
            || dict
                .encoding
                .as_deref()
                .is_some_and(|e| e.eq_ignore_ascii_case("utf-8") || e.eq_ignore_ascii_case("utf8"));
        TextDecoder { utf8: declared_utf8 }
    }

    /// Decode and right-trim spaces and NULs.
    fn decode(&self, raw: &[u8]) -> String {
        let text = match std::str::from_utf8(raw) {
            Ok(s) => s.to_string(),
            Err(_) if self.utf8 => String::from_utf8_lossy(raw).into_owned(),
            Err(_) => raw
                .iter()
                .map(|&b| match b {
                    0x80..=0x9f => CP1252_HIGH[(b - 0x80) as usize],
                    _ => b as char,
                })
                .collect(),
        };
        text.trim_end_matches([' ', '\0']).to_string()
    }
}

// ---------------------------------------------------------------------------
// Logical variables
// ---------------------------------------------------------------------------

/// Where a logical variable's bytes live inside a case.
enum Slot {
    Numeric { element: usize, missing: MissingSpec },
    /// `(first element, elements, bytes used)` per segment.
    Text { segments: Vec<(usize, usize, usize)> },
}

fn very_long_widths(dict: &Dictionary, decoder: &TextDecoder) -> HashMap<String, usize> {
    let Some(raw) = &dict.very_long else {
        return HashMap::new();
    };
    decoder
        .decode(raw)
        .split('\t')
        .filter_map(|entry| {
            let (name, width) = entry.trim_matches('\0').split_once('=')?;
            let width = width.trim_matches('\0').trim().parse().ok()?;
            Some((name.trim().to_string(), width))
        })
        .collect()
}

fn long_names(dict: &Dictionary, decoder: &TextDecoder) -> HashMap<String, String> {
    let Some(raw) = &dict.long_names else {
        return HashMap::new();
    };
    decoder
        .decode(raw)
        .split('\t')
        .filter_map(|entry| {
            let (short, long) = entry.split_once('=')?;
            Some((short.trim().to_ascii_uppercase(), long.trim().to_string()))
        })
        .collect()
}

fn build_variables(
    dict: &Dictionary,
    decoder: &TextDecoder,
    big_endian: bool,
) -> Result<(Vec<SavVariable>, Vec<Slot>)> {
    let very_long = very_long_widths(dict, decoder);
    let long = long_names(dict, decoder);

    let mut variables = Vec::new();
    let mut slots = Vec::new();
    let mut i = 0;
    while i < dict.records.len() {
        let rec = &dict.records[i];
        if rec.width < 0 {
            bail!("continuation record {} without a string variable", i + 1);
        }
        let short_name = decoder.decode(&rec.name);
        let name = long
            .get(&short_name.to_ascii_uppercase())
            .cloned()
            .unwrap_or_else(|| short_name.clone());
        let label = rec.label.as_ref().map(|l| decoder.decode(l));

        let (width, slot) = if rec.width == 0 {
            i += 1;
            (
                0,
                Slot::Numeric {
                    element: i - 1,
                    missing: rec.missing.clone(),
                },
            )
        } else {
            let total_width = very_long.get(&short_name).copied().unwrap_or(rec.width as usize);
            let n_segments = if total_width < 256 { 1 } else { total_width.div_ceil(252) };
            let mut segments = Vec::new();
            for seg in 0..n_segments {
                let seg_rec = dict
                    .records
                    .get(i)
                    .filter(|r| r.width > 0)
                    .with_context(|| format!("variable {name} is missing string segment {seg}"))?;
                let elements = (seg_rec.width as usize).div_ceil(8);
                if i + elements > dict.records.len() {
                    bail!(
                        "variable {name} needs {elements} elements but the dictionary ends after {}",
                        dict.records.len() - i
                    );
                }
                let used = if seg + 1 < n_segments { 252 } else { seg_rec.width as usize };
                segments.push((i, elements, used));
                i += elements;
            }
            (total_width, Slot::Text { segments })
        };

        variables.push(SavVariable {
            name,
            short_name,
            label,
            width,
            print_format: rec.print,
            value_labels: Vec::new(),
        });
        slots.push(slot);
    }

    attach_value_labels(dict, decoder, big_endian, &mut variables, &slots)?;
    Ok((variables, slots))
}

fn attach_value_labels(
    dict: &Dictionary,
    decoder: &TextDecoder,
    big_endian: bool,
    variables: &mut [SavVariable],
    slots: &[Slot],
) -> Result<()> {
    let first_element = |slot: &Slot| match slot {
        Slot::Numeric { element, .. } => *element,
        Slot::Text { segments } => segments[0].0,
    };
    for set in &dict.label_sets {
        for &index in &set.variables {
            let Some(var_idx) = slots.iter().position(|s| first_element(s) + 1 == index) else {
                bail!("value labels refer to unknown variable index {index}");
            };
            let numeric = variables[var_idx].width == 0;
            variables[var_idx].value_labels = set
                .labels
                .iter()
                .map(|(raw, text)| {
                    let value = if numeric {
                        Value::Float(if big_endian {
                            f64::from_be_bytes(*raw)
                        } else {
                            f64::from_le_bytes(*raw)
                        })
                    } else {
                        Value::String(decoder.decode(raw))
                    };
                    (value, decoder.decode(text))
                })
                .collect();
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Case data
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub(crate) enum Element {
    Raw([u8; 8]),
    Number(f64),
    Spaces,
    Sysmis,
}

/// Decoder for bytecode-compressed case data.
struct Bytecode {
    ops: [u8; 8],
    next: usize,
    bias: f64,
    ended: bool,
}

impl Bytecode {
    fn new(bias: f64) -> Self {
        Bytecode {
            ops: [0; 8],
            next: 8,
            bias,
            ended: false,
        }
    }

    fn next(&mut self, r: &mut ByteReader<'_>) -> Result<Option<Element>> {
        loop {
            if self.ended {
                return Ok(None);
            }
            if self.next == 8 {
                if r.remaining() == 0 {
                    return Ok(None);
                }
                self.ops = r.take8()?;
                self.next = 0;
            }
            let op = self.ops[self.next];
            self.next += 1;
            let element = match op {
                0 => continue,
                252 => {
                    self.ended = true;
                    return Ok(None);
                }
                253 => Element::Raw(r.take8()?),
                254 => Element::Spaces,
                255 => Element::Sysmis,
                code => Element::Number(code as f64 - self.bias),
            };
            return Ok(Some(element));
        }
    }
}

fn read_cases(r: &mut ByteReader<'_>, header: &Header, n_elements: usize) -> Result<Vec<Vec<Element>>> {
    // The header's case count is not trusted for allocation.
    let mut cases = Vec::new();
    let mut bytecode = match header.compression {
        0 => None,
        1 => Some(Bytecode::new(header.bias)),
        other => bail!("unsupported compression scheme {other}"),
    };

    loop {
        if header.n_cases.is_some_and(|n| cases.len() == n) || n_elements == 0 {
            break;
        }
        let mut case = Vec::with_capacity(n_elements);
        for element in 0..n_elements {
            let next = match bytecode.as_mut() {
                Some(bc) => bc.next(r)?,
                None if r.remaining() >= 8 => Some(Element::Raw(r.take8()?)),
                None => None,
            };
            match next {
                Some(e) => case.push(e),
                None if element == 0 && header.n_cases.is_none() => return Ok(cases),
                None => bail!("case data truncated in case {}", cases.len() + 1),
            }
        }
        cases.push(case);
    }
    Ok(cases)
}

fn numeric_cell(e: Element, r: &ByteReader<'_>, sysmis: f64, missing: &MissingSpec) -> Value {
    let v = match e {
        Element::Raw(raw) => r.to_f64(raw),
        Element::Number(v) => v,
        Element::Spaces | Element::Sysmis => return Value::Null,
    };
    if v == sysmis || v.is_nan() || missing.is_missing(v) {
        Value::Null
    } else {
        Value::Float(v)
    }
}

fn text_cell(case: &[Element], segments: &[(usize, usize, usize)], decoder: &TextDecoder) -> Value {
    let mut bytes = Vec::new();
    for &(first, n, used) in segments {
        let mut seg = Vec::with_capacity(n * 8);
        for e in case.get(first..first + n).unwrap_or_default() {
            match e {
                Element::Raw(raw) => seg.extend_from_slice(raw),
                _ => seg.extend_from_slice(b"        "),
            }
        }
        seg.truncate(used);
        bytes.extend_from_slice(&seg);
    }
    Value::String(decoder.decode(&bytes))
}

// ---------------------------------------------------------------------------
// Date formats
// ---------------------------------------------------------------------------

/// Seconds between the SPSS epoch (1582-10-14) and the Unix epoch.
const SPSS_EPOCH_OFFSET: i64 = 12_219_379_200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Temporal {
    Date,
    DateTime,
    Time,
}

fn temporal_kind(format_type: u8) -> Option<Temporal> {
    match format_type {
        20 | 23 | 24 | 28 | 29 | 30 | 38 | 39 => Some(Temporal::Date),
        22 | 41 => Some(Temporal::DateTime),
        21 | 25 => Some(Temporal::Time),
        _ => None,
    }
}

/// Days since 1970-01-01 → proleptic Gregorian `(year, month, day)`.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

fn format_temporal(kind: Temporal, spss_seconds: f64) -> String {
    let secs = spss_seconds.round() as i64;
    let clock = |s: i64| format!("{:02}:{:02}:{:02}", s / 3600, (s / 60) % 60, s % 60);
    match kind {
        Temporal::Time => clock(secs),
        Temporal::Date | Temporal::DateTime => {
            let unix = secs - SPSS_EPOCH_OFFSET;
            let (y, m, d) = civil_from_days(unix.div_euclid(86_400));
            if kind == Temporal::Date {
                format!("{y:04}-{m:02}-{d:02}")
            } else {
                format!("{y:04}-{m:02}-{d:02}T{}", clock(unix.rem_euclid(86_400)))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

fn parse_system_file(bytes: &[u8]) -> Result<SavFile> {
    let mut r = ByteReader {
        buf: bytes,
        pos: 0,
        big_endian: false,
    };
    let header = read_header(&mut r)?;
    let dict = read_dictionary(&mut r)?;
    let decoder = TextDecoder::for_dictionary(&dict);
    let (variables, slots) = build_variables(&dict, &decoder, r.big_endian)?;
    let sysmis = dict.sysmis.unwrap_or(-f64::MAX);

    let cases = read_cases(&mut r, &header, dict.records.len()).context("reading case data")?;
    log::debug!(
        "system file: {} variables, {} cases, compression {}",
        variables.len(),
        cases.len(),
        header.compression
    );

    let columns = variables
        .iter()
        .zip(&slots)
        .map(|(var, slot)| {
            let temporal = temporal_kind(var.format_type());
            let values = cases
                .iter()
                .map(|case| match slot {
                    Slot::Numeric { element, missing } => {
                        match (numeric_cell(case[*element], &r, sysmis, missing), temporal) {
                            (Value::Float(v), Some(kind)) => Value::Date(format_temporal(kind, v)),
                            (value, _) => value,
                        }
                    }
                    Slot::Text { segments } => text_cell(case, segments, &decoder),
                })
                .collect();
            Column::new(var.name.clone(), values)
        })
        .collect();

    Ok(SavFile {
        dataset: Dataset::from_columns(columns)?,
        file_label: decoder.decode(&header.file_label),
        documents: dict.documents.iter().map(|d| decoder.decode(d)).collect(),
        utf8: decoder.utf8,
        variables,
    })
}

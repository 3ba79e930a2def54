use std::collections::BTreeMap;
use std::io::{Read, Seek};

use anyhow::{anyhow, bail, Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::loader::unique_headers;
use super::model::{Dataset, Value};

// ---------------------------------------------------------------------------
// Excel (.xlsx) loader
// ---------------------------------------------------------------------------

/// Read the first worksheet of a workbook into a dataset.
///
/// The first populated row holds the headers; every later row up to the last
/// populated one is a record, with absent cells as missing values.
pub fn read_first_sheet<R: Read + Seek>(input: R) -> Result<Dataset> {
    let mut archive = zip::ZipArchive::new(input).context("opening workbook archive")?;

    let shared = match read_part(&mut archive, "xl/sharedStrings.xml")? {
        Some(xml) => parse_shared_strings(&xml).context("parsing shared strings")?,
        None => Vec::new(),
    };

    let sheet_path = first_sheet_path(&mut archive)?;
    let sheet_xml = read_part(&mut archive, &sheet_path)?
        .with_context(|| format!("workbook has no part {sheet_path}"))?;
    let cells = parse_sheet(&sheet_xml, &shared).with_context(|| format!("parsing {sheet_path}"))?;

    grid_to_dataset(cells)
}

fn read_part<R: Read + Seek>(archive: &mut zip::ZipArchive<R>, name: &str) -> Result<Option<String>> {
    let part = match archive.by_name(name) {
        Ok(part) => part,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(anyhow!(e).context(format!("opening {name}"))),
    };
    let text = std::io::read_to_string(part).with_context(|| format!("reading {name}"))?;
    Ok(Some(text))
}

/// Path of the first `<sheet>` in `xl/workbook.xml`, via the workbook rels.
fn first_sheet_path<R: Read + Seek>(archive: &mut zip::ZipArchive<R>) -> Result<String> {
    const FALLBACK: &str = "xl/worksheets/sheet1.xml";

    let Some(workbook) = read_part(archive, "xl/workbook.xml")? else {
        return Ok(FALLBACK.to_string());
    };
    let Some(rel_id) = first_sheet_rel_id(&workbook)? else {
        return Ok(FALLBACK.to_string());
    };
    let Some(rels) = read_part(archive, "xl/_rels/workbook.xml.rels")? else {
        return Ok(FALLBACK.to_string());
    };

    let mut reader = Reader::from_str(&rels);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if attr(&e, b"Id")?.as_deref() == Some(rel_id.as_str()) {
                    let target = attr(&e, b"Target")?.context("relationship without Target")?;
                    return Ok(match target.strip_prefix('/') {
                        Some(absolute) => absolute.to_string(),
                        None => format!("xl/{target}"),
                    });
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(FALLBACK.to_string())
}

fn first_sheet_rel_id(workbook: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_str(workbook);
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                return attr(&e, b"id");
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

/// Unescaped value of the attribute whose local name is `key`.
fn attr(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>> {
    for a in e.attributes() {
        let a = a?;
        if a.key.local_name().as_ref() == key {
            return Ok(Some(a.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn parse_shared_strings(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    // Phonetic runs (<rPh>) repeat the text and must not be appended.
    let mut in_phonetic = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"t" => in_text = !in_phonetic,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => strings.push(std::mem::take(&mut current)),
                b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Text(t) if in_text => current.push_str(&t.unescape()?),
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(strings)
}

/// Cell grid: row index → column index → value.
type Grid = BTreeMap<usize, BTreeMap<usize, Value>>;

#[derive(Default)]
struct PendingCell {
    row: usize,
    col: usize,
    kind: String,
    text: String,
}

fn parse_sheet(xml: &str, shared: &[String]) -> Result<Grid> {
    let mut reader = Reader::from_str(xml);
    let mut grid = Grid::new();
    let mut row = 0usize;
    let mut next_col = 0usize;
    let mut cell: Option<PendingCell> = None;
    let mut in_value = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => {
                    row = row_start(&e, row)?;
                    next_col = 0;
                }
                b"c" => {
                    let (r, c) = cell_position(&e, row, next_col)?;
                    next_col = c + 1;
                    cell = Some(PendingCell {
                        row: r,
                        col: c,
                        kind: attr(&e, b"t")?.unwrap_or_else(|| "n".to_string()),
                        text: String::new(),
                    });
                }
                b"v" | b"t" => in_value = cell.is_some(),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"row" => row = row_start(&e, row)? + 1,
                b"c" => {
                    let (_, c) = cell_position(&e, row, next_col)?;
                    next_col = c + 1;
                }
                _ => {}
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"row" => row += 1,
                b"c" => {
                    if let Some(done) = cell.take() {
                        let value = cell_value(&done, shared)?;
                        if !value.is_null() {
                            grid.entry(done.row).or_default().insert(done.col, value);
                        }
                    }
                }
                b"v" | b"t" => in_value = false,
                _ => {}
            },
            Event::Text(t) if in_value => {
                if let Some(pending) = cell.as_mut() {
                    pending.text.push_str(&t.unescape()?);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(grid)
}

/// Worksheet limits (column `XFD`, row 1048576).
const MAX_COLUMNS: usize = 16_384;
const MAX_ROWS: usize = 1_048_576;

/// Zero-based row index of a `<row>` element (`r` is one-based).
fn row_start(e: &BytesStart<'_>, current: usize) -> Result<usize> {
    let row = match attr(e, b"r")? {
        Some(r) => r
            .parse::<usize>()
            .with_context(|| format!("bad row number {r}"))?
            .saturating_sub(1),
        None => current,
    };
    if row >= MAX_ROWS {
        bail!("row {} is beyond the worksheet limit", row + 1);
    }
    Ok(row)
}

fn cell_position(e: &BytesStart<'_>, row: usize, next_col: usize) -> Result<(usize, usize)> {
    match attr(e, b"r")? {
        Some(reference) => parse_cell_reference(&reference),
        None if next_col >= MAX_COLUMNS => bail!("row {} has more than {MAX_COLUMNS} cells", row + 1),
        None => Ok((row, next_col)),
    }
}

/// `"B3"` → `(2, 1)`: zero-based `(row, column)`.
fn parse_cell_reference(reference: &str) -> Result<(usize, usize)> {
    let split = reference
        .find(|c: char| c.is_ascii_digit())
        .with_context(|| format!("bad cell reference {reference}"))?;
    let (letters, digits) = reference.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        bail!("bad cell reference {reference}");
    }
    let col = letters
        .chars()
        .try_fold(0usize, |acc, c| {
            acc.checked_mul(26)?
                .checked_add(c.to_ascii_uppercase() as usize - 'A' as usize + 1)
        })
        .filter(|&col| col <= MAX_COLUMNS)
        .with_context(|| format!("cell reference {reference} is beyond column XFD"))?;
    let row: usize = digits
        .parse()
        .with_context(|| format!("bad cell reference {reference}"))?;
    if row == 0 || row > MAX_ROWS {
        bail!("cell reference {reference} is outside rows 1..={MAX_ROWS}");
    }
    Ok((row - 1, col - 1))
}

fn cell_value(cell: &PendingCell, shared: &[String]) -> Result<Value> {
    let text = cell.text.as_str();
    Ok(match cell.kind.as_str() {
        "s" => {
            let idx: usize = text
                .trim()
                .parse()
                .with_context(|| format!("bad shared string index {text}"))?;
            let s = shared
                .get(idx)
                .with_context(|| format!("shared string {idx} out of range"))?;
            Value::String(s.clone())
        }
        "str" | "inlineStr" => Value::String(text.to_string()),
        "b" => Value::Bool(text.trim() == "1"),
        "e" => Value::Null,
        "d" => Value::Date(text.to_string()),
        _ if text.trim().is_empty() => Value::Null,
        _ => {
            let f: f64 = text
                .trim()
                .parse()
                .with_context(|| format!("bad numeric cell {text}"))?;
            if f.fract() == 0.0 && f.abs() < 9.0e15 {
                Value::Integer(f as i64)
            } else {
                Value::Float(f)
            }
        }
    })
}

fn grid_to_dataset(mut grid: Grid) -> Result<Dataset> {
    let Some((&header_row, _)) = grid.iter().next() else {
        return Dataset::from_columns(Vec::new());
    };
    let header_cells = grid.remove(&header_row).unwrap_or_default();
    let width = grid
        .values()
        .chain(std::iter::once(&header_cells))
        .filter_map(|cells| cells.keys().next_back())
        .max()
        .map_or(0, |last| last + 1);

    let headers = unique_headers((0..width).map(|c| match header_cells.get(&c) {
        Some(v) => v.to_string(),
        None => String::new(),
    }));

    let last_row = grid.keys().next_back().copied().unwrap_or(header_row);
    let rows = (header_row + 1..=last_row)
        .map(|r| {
            let cells = grid.remove(&r).unwrap_or_default();
            (0..width)
                .map(|c| cells.get(&c).cloned().unwrap_or(Value::Null))
                .collect()
        })
        .collect();

    Dataset::from_rows(headers, rows)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::{Cursor, Write};

    use zip::write::SimpleFileOptions;

    use super::*;
    use crate::data::model::ColumnKind;

    /// Assemble a minimal single-sheet workbook in memory.
    pub(crate) fn workbook(sheet_xml: &str, shared: &[&str]) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zw = zip::ZipWriter::new(&mut buf);
            let opts = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

            zw.start_file("xl/workbook.xml", opts).unwrap();
            zw.write_all(
                br#"<?xml version="1.0" encoding="UTF-8"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets><sheet name="Datos" sheetId="1" r:id="rId7"/></sheets></workbook>"#,
            )
            .unwrap();

            zw.start_file("xl/_rels/workbook.xml.rels", opts).unwrap();
            zw.write_all(
                br#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId7" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/data.xml"/>
</Relationships>"#,
            )
            .unwrap();

            let sst: String = shared.iter().map(|s| format!("<si><t>{s}</t></si>")).collect();
            zw.start_file("xl/sharedStrings.xml", opts).unwrap();
            write!(zw, r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">{sst}</sst>"#)
                .unwrap();

            zw.start_file("xl/worksheets/data.xml", opts).unwrap();
            write!(
                zw,
                r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{sheet_xml}</sheetData></worksheet>"#
            )
            .unwrap();
            zw.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn reads_first_sheet_with_shared_strings() {
        let sheet = r#"
<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c><c r="C1" t="inlineStr"><is><t>zona</t></is></c></row>
<row r="2"><c r="A2"><v>25</v></c><c r="B2"><v>1.5</v></c><c r="C2" t="s"><v>2</v></c></row>
<row r="4"><c r="A4"><v>40</v></c><c r="C4" t="e"><v>#DIV/0!</v></c></row>"#;
        let bytes = workbook(sheet, &["edad", "puntaje", "Norte &amp; Sur"]);

        let ds = read_first_sheet(Cursor::new(bytes)).unwrap();
        assert_eq!(ds.column_names(), vec!["edad", "puntaje", "zona"]);
        assert_eq!(ds.len(), 3);

        let edad = ds.column("edad").unwrap();
        assert_eq!(edad.kind, ColumnKind::Integer);
        assert_eq!(edad.values, vec![Value::Integer(25), Value::Null, Value::Integer(40)]);

        let zona = ds.column("zona").unwrap();
        assert_eq!(zona.values[0], Value::String("Norte & Sur".into()));
        assert_eq!(zona.values[2], Value::Null);
        assert_eq!(ds.column("puntaje").unwrap().kind, ColumnKind::Float);
    }

    #[test]
    fn cell_references_are_zero_based() {
        assert_eq!(parse_cell_reference("A1").unwrap(), (0, 0));
        assert_eq!(parse_cell_reference("B3").unwrap(), (2, 1));
        assert_eq!(parse_cell_reference("AA10").unwrap(), (9, 26));
        assert!(parse_cell_reference("12").is_err());
    }

    #[test]
    fn references_outside_the_worksheet_are_rejected() {
        assert_eq!(parse_cell_reference("XFD1048576").unwrap(), (1_048_575, 16_383));
        assert!(parse_cell_reference("XFE1").is_err());
        assert!(parse_cell_reference("AAAAAAAAAAAAAAAA1").is_err());
        assert!(parse_cell_reference("A0").is_err());
        assert!(parse_cell_reference("A1048577").is_err());
    }

    #[test]
    fn corrupt_reference_in_sheet_is_an_error() {
        let sheet = r#"<worksheet><sheetData><row r="1"><c r="AAAAAAAAAAAAAAAA1" t="str"><v>x</v></c></row></sheetData></worksheet>"#;
        let bytes = workbook(sheet, &[]);
        assert!(read_first_sheet(Cursor::new(bytes)).is_err());
    }

    #[test]
    fn not_a_zip_is_an_error() {
        assert!(read_first_sheet(Cursor::new(b"age,income".to_vec())).is_err());
    }
}

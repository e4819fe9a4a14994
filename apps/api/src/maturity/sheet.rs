//! Loads an assessment spreadsheet into a rectangular grid of trimmed strings.
//!
//! XLSX workbooks are read straight from their OOXML parts (first worksheet
//! plus the shared string table). CSV exports come in whatever encoding and
//! separator the spreadsheet tool picked, so both are detected.

use std::io::Cursor;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use crate::data::extract::{
    extension_of, numbered_entries, read_zip_entry_bounded, ExtractError, MAX_XML_ENTRY_BYTES,
};

const MAX_GRID_ROWS: usize = 100_000;
const MAX_GRID_COLS: usize = 1_024;
const CSV_SEPARATORS: [char; 3] = [';', ',', '\t'];

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("unsupported spreadsheet extension '{0}'")]
    UnsupportedFormat(String),

    #[error("workbook could not be read: {0}")]
    Archive(#[from] ExtractError),

    #[error("workbook has no worksheet")]
    NoWorksheet,

    #[error("malformed worksheet XML: {0}")]
    Xml(String),
}

/// Cell text by (row, column), both zero based. Missing cells read as "".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    rows: Vec<Vec<String>>,
    width: usize,
}

impl Grid {
    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        let rows: Vec<Vec<String>> = rows
            .into_iter()
            .map(|row| row.into_iter().map(|c| normalize_cell(&c)).collect())
            .collect();
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        Self { rows, width }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }
}

/// Spreadsheet exports spell empty cells in several ways.
fn normalize_cell(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("nan") || trimmed.eq_ignore_ascii_case("none") {
        String::new()
    } else {
        trimmed.to_string()
    }
}

/// Parses a cell as a number, accepting a decimal comma.
pub fn cell_number(cell: &str) -> Option<f64> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }
    cell.replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
}

/// Dispatches on the file extension. Blocking.
pub fn load_grid(file_name: &str, bytes: &[u8]) -> Result<Grid, SheetError> {
    match extension_of(file_name).as_str() {
        ".xlsx" => read_xlsx(bytes),
        ".csv" => Ok(read_csv(bytes)),
        other => Err(SheetError::UnsupportedFormat(other.to_string())),
    }
}

// ─── XLSX ────────────────────────────────────────────────────────────────────

pub fn read_xlsx(bytes: &[u8]) -> Result<Grid, SheetError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;

    let shared = if archive.file_names().any(|n| n == "xl/sharedStrings.xml") {
        let xml = read_zip_entry_bounded(&mut archive, "xl/sharedStrings.xml", MAX_XML_ENTRY_BYTES)?;
        shared_strings(&xml)?
    } else {
        Vec::new()
    };

    let first = numbered_entries(&archive, "xl/worksheets/sheet")
        .into_iter()
        .next()
        .ok_or(SheetError::NoWorksheet)?;
    let xml = read_zip_entry_bounded(&mut archive, &first, MAX_XML_ENTRY_BYTES)?;
    Ok(Grid::from_rows(worksheet_rows(&xml, &shared)?))
}

/// One entry per `<si>`; rich text runs are concatenated, phonetic hints skipped.
fn shared_strings(xml: &[u8]) -> Result<Vec<String>, SheetError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut in_phonetic = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"t" => in_text = true,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Ok(Event::Text(te)) if in_text && !in_phonetic => {
                let text = te.unescape().map_err(|e| SheetError::Xml(e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                b"si" => strings.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Ok(Event::Eof) => break,
            Err(e) => return Err(SheetError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Value type of a `<c>` element, from its `t` attribute.
#[derive(Debug, Clone, Copy, PartialEq)]
enum CellKind {
    Number,
    Shared,
    Inline,
    Boolean,
    Literal,
}

struct PendingCell {
    row: usize,
    col: usize,
    kind: CellKind,
    value: String,
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

/// `"AB12"` → `(11, 27)`.
fn parse_cell_ref(reference: &str) -> Option<(usize, usize)> {
    let split = reference.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = reference.split_at(split);
    if letters.is_empty() || letters.len() > 3 || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let col = letters
        .chars()
        .fold(0usize, |acc, c| acc * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1));
    let row = digits.parse::<usize>().ok()?;
    (row > 0).then(|| (row - 1, col - 1))
}

fn render_number(raw: &str) -> String {
    match raw.trim().parse::<f64>() {
        Ok(n) if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", n as i64),
        Ok(n) if n.is_finite() => n.to_string(),
        _ => raw.to_string(),
    }
}

fn render_cell(cell: &PendingCell, shared: &[String]) -> String {
    match cell.kind {
        CellKind::Shared => cell
            .value
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|i| shared.get(i))
            .cloned()
            .unwrap_or_default(),
        CellKind::Boolean => match cell.value.trim() {
            "1" => "VRAI".to_string(),
            "0" => "FAUX".to_string(),
            other => other.to_string(),
        },
        CellKind::Number => render_number(&cell.value),
        CellKind::Inline | CellKind::Literal => cell.value.clone(),
    }
}

fn place(rows: &mut Vec<Vec<String>>, row: usize, col: usize, value: String) {
    if row >= MAX_GRID_ROWS || col >= MAX_GRID_COLS || value.is_empty() {
        return;
    }
    if rows.len() <= row {
        rows.resize_with(row + 1, Vec::new);
    }
    let cells = &mut rows[row];
    if cells.len() <= col {
        cells.resize(col + 1, String::new());
    }
    cells[col] = value;
}

fn worksheet_rows(xml: &[u8], shared: &[String]) -> Result<Vec<Vec<String>>, SheetError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut rows: Vec<Vec<String>> = Vec::new();

    let mut row_idx = 0usize;
    let mut next_row = 0usize;
    let mut next_col = 0usize;
    let mut pending: Option<PendingCell> = None;
    let mut in_value = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => {
                    row_idx = attribute(&e, b"r")
                        .and_then(|r| r.parse::<usize>().ok())
                        .filter(|r| *r > 0)
                        .map(|r| r - 1)
                        .unwrap_or(next_row);
                    next_col = 0;
                }
                b"c" => {
                    let (row, col) = attribute(&e, b"r")
                        .as_deref()
                        .and_then(parse_cell_ref)
                        .unwrap_or((row_idx, next_col));
                    let kind = match attribute(&e, b"t").as_deref() {
                        Some("s") => CellKind::Shared,
                        Some("inlineStr") => CellKind::Inline,
                        Some("b") => CellKind::Boolean,
                        Some("str") | Some("e") => CellKind::Literal,
                        _ => CellKind::Number,
                    };
                    next_col = col + 1;
                    pending = Some(PendingCell {
                        row,
                        col,
                        kind,
                        value: String::new(),
                    });
                }
                b"v" | b"t" => in_value = pending.is_some(),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"c" => {
                    next_col = attribute(&e, b"r")
                        .as_deref()
                        .and_then(parse_cell_ref)
                        .map(|(_, col)| col + 1)
                        .unwrap_or(next_col + 1);
                }
                b"row" => {
                    next_row = attribute(&e, b"r")
                        .and_then(|r| r.parse::<usize>().ok())
                        .unwrap_or(next_row + 1);
                }
                _ => {}
            },
            Ok(Event::Text(te)) if in_value => {
                let text = te.unescape().map_err(|e| SheetError::Xml(e.to_string()))?;
                if let Some(cell) = pending.as_mut() {
                    cell.value.push_str(&text);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    if let Some(cell) = pending.take() {
                        let value = render_cell(&cell, shared);
                        place(&mut rows, cell.row, cell.col, value);
                    }
                }
                b"row" => next_row = row_idx + 1,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(SheetError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(rows)
}

// ─── CSV ─────────────────────────────────────────────────────────────────────

pub fn read_csv(bytes: &[u8]) -> Grid {
    let text = decode_text(bytes);
    let separator = sniff_separator(&text);
    Grid::from_rows(parse_csv(&text, separator))
}

/// UTF-8 (BOM stripped) when valid, otherwise Windows-1252.
fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| windows_1252_char(b)).collect(),
    }
}

fn windows_1252_char(byte: u8) -> char {
    const HIGH: [char; 32] = [
        '\u{20AC}', '\u{81}', '\u{201A}', '\u{192}', '\u{201E}', '\u{2026}', '\u{2020}',
        '\u{2021}', '\u{2C6}', '\u{2030}', '\u{160}', '\u{2039}', '\u{152}', '\u{8D}', '\u{17D}',
        '\u{8F}', '\u{90}', '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}',
        '\u{2013}', '\u{2014}', '\u{2DC}', '\u{2122}', '\u{161}', '\u{203A}', '\u{153}', '\u{9D}',
        '\u{17E}', '\u{178}',
    ];
    match byte {
        0x80..=0x9F => HIGH[(byte - 0x80) as usize],
        _ => byte as char,
    }
}

/// Picks the separator whose most common field count (above one) covers the
/// most lines. Ties go to the earlier candidate; `;` when nothing splits.
fn sniff_separator(text: &str) -> char {
    let mut best = (CSV_SEPARATORS[0], 0usize);
    for sep in CSV_SEPARATORS {
        let mut counts: Vec<(usize, usize)> = Vec::new();
        for record in parse_csv(text, sep) {
            if record.len() < 2 {
                continue;
            }
            match counts.iter_mut().find(|(len, _)| *len == record.len()) {
                Some((_, n)) => *n += 1,
                None => counts.push((record.len(), 1)),
            }
        }
        let consistent = counts.iter().map(|(_, n)| *n).max().unwrap_or(0);
        if consistent > best.1 {
            best = (sep, consistent);
        }
    }
    best.0
}

/// RFC 4180 style: quoted fields may hold separators and newlines, `""` is a
/// literal quote. Blank lines are kept as empty rows.
fn parse_csv(text: &str, sep: char) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.trim().is_empty() => {
                field.clear();
                in_quotes = true;
            }
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            c if c == sep => record.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::extract::tests::zip_bytes;

    fn sheet_xml(cells: &str) -> String {
        format!(
            r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{cells}</sheetData></worksheet>"#
        )
    }

    #[test]
    fn test_grid_normalizes_cells() {
        let grid = Grid::from_rows(vec![
            vec!["  a ".to_string(), "NaN".to_string()],
            vec!["None".to_string(), "b".to_string(), "c".to_string()],
        ]);
        assert_eq!(grid.width(), 3);
        assert_eq!(grid.height(), 2);
        assert_eq!(grid.cell(0, 0), "a");
        assert_eq!(grid.cell(0, 1), "");
        assert_eq!(grid.cell(1, 0), "");
        assert_eq!(grid.cell(0, 2), "");
        assert_eq!(grid.cell(9, 9), "");
    }

    #[test]
    fn test_cell_number() {
        assert_eq!(cell_number("3"), Some(3.0));
        assert_eq!(cell_number(" 2,5 "), Some(2.5));
        assert_eq!(cell_number(""), None);
        assert_eq!(cell_number("abc"), None);
        assert_eq!(cell_number("inf"), None);
    }

    #[test]
    fn test_parse_cell_ref() {
        assert_eq!(parse_cell_ref("A1"), Some((0, 0)));
        assert_eq!(parse_cell_ref("C7"), Some((6, 2)));
        assert_eq!(parse_cell_ref("AB12"), Some((11, 27)));
        assert_eq!(parse_cell_ref("12"), None);
        assert_eq!(parse_cell_ref("A0"), None);
    }

    #[test]
    fn test_xlsx_cells_by_reference() {
        let sheet = sheet_xml(
            r#"<row r="1"><c r="A1" t="s"><v>0</v></c><c r="C1" t="s"><v>1</v></c></row>
               <row r="3"><c r="A3" t="b"><v>1</v></c><c r="B3"><v>4</v></c><c r="C3" t="inlineStr"><is><t>&lt;&lt;Automated&gt;&gt;</t></is></c></row>
               <row r="4"><c r="A4" t="b"><v>0</v></c><c r="B4"><v>2.5</v></c></row>"#,
        );
        let strings = r#"<sst><si><t>Axe 1 - Culture</t></si><si><r><t>Rich </t></r><r><t>text</t></r></si></sst>"#;
        let bytes = zip_bytes(&[
            ("xl/sharedStrings.xml", strings),
            ("xl/worksheets/sheet1.xml", sheet.as_str()),
        ]);

        let grid = load_grid("assessment.XLSX", &bytes).unwrap();
        assert_eq!(grid.height(), 4);
        assert_eq!(grid.cell(0, 0), "Axe 1 - Culture");
        assert_eq!(grid.cell(0, 2), "Rich text");
        assert_eq!(grid.cell(1, 0), "");
        assert_eq!(grid.cell(2, 0), "VRAI");
        assert_eq!(grid.cell(2, 1), "4");
        assert_eq!(grid.cell(2, 2), "<<Automated>>");
        assert_eq!(grid.cell(3, 0), "FAUX");
        assert_eq!(grid.cell(3, 1), "2.5");
    }

    #[test]
    fn test_xlsx_reads_first_sheet_without_shared_strings() {
        let first = sheet_xml(r#"<row r="1"><c r="B1"><v>7</v></c></row>"#);
        let second = sheet_xml(r#"<row r="1"><c r="A1"><v>9</v></c></row>"#);
        let bytes = zip_bytes(&[
            ("xl/worksheets/sheet2.xml", second.as_str()),
            ("xl/worksheets/sheet1.xml", first.as_str()),
        ]);
        let grid = read_xlsx(&bytes).unwrap();
        assert_eq!(grid.cell(0, 1), "7");
        assert_eq!(grid.cell(0, 0), "");
    }

    #[test]
    fn test_xlsx_without_worksheet() {
        let bytes = zip_bytes(&[("xl/workbook.xml", "<workbook/>")]);
        assert!(matches!(read_xlsx(&bytes), Err(SheetError::NoWorksheet)));
    }

    #[test]
    fn test_invalid_archive_is_an_error() {
        assert!(matches!(
            load_grid("broken.xlsx", b"not a zip"),
            Err(SheetError::Archive(_))
        ));
    }

    #[test]
    fn test_unsupported_extension() {
        assert!(matches!(
            load_grid("legacy.xls", b""),
            Err(SheetError::UnsupportedFormat(ext)) if ext == ".xls"
        ));
    }

    #[test]
    fn test_csv_semicolon_with_quotes() {
        let csv = "VRAI;3;\"<<Text; with separator>>\"\r\nFAUX;1;\"He said \"\"hi\"\"\"\r\n";
        let grid = read_csv(csv.as_bytes());
        assert_eq!(grid.height(), 2);
        assert_eq!(grid.cell(0, 2), "<<Text; with separator>>");
        assert_eq!(grid.cell(1, 2), "He said \"hi\"");
    }

    #[test]
    fn test_csv_comma_detected() {
        let csv = "a,b,c\n1,2,3\nx;y,z,w\n";
        assert_eq!(sniff_separator(csv), ',');
        let grid = read_csv(csv.as_bytes());
        assert_eq!(grid.cell(1, 1), "2");
    }

    #[test]
    fn test_csv_tab_detected() {
        let csv = "a\tb\n1\t2\n";
        assert_eq!(sniff_separator(csv), '\t');
    }

    #[test]
    fn test_csv_quoted_newline() {
        let grid = read_csv(b"\"line one\nline two\";x\nnext;y\n");
        assert_eq!(grid.height(), 2);
        assert_eq!(grid.cell(0, 0), "line one\nline two");
        assert_eq!(grid.cell(1, 0), "next");
    }

    #[test]
    fn test_csv_bom_and_windows_1252() {
        let grid = read_csv(b"\xEF\xBB\xBFAxe 1;ok\n");
        assert_eq!(grid.cell(0, 0), "Axe 1");

        // "Hypoth\xe8se \x96 test" in Windows-1252
        let grid = read_csv(b"Hypoth\xe8se \x96 test;x\n");
        assert_eq!(grid.cell(0, 0), "Hypothèse – test");
    }
}

//! Spreadsheet ingest with encoding and delimiter auto-detection.
//!
//! Reads the wide-format source table (four identifier columns followed by
//! one column per reporting period) from either a workbook sheet or a CSV
//! export. No house-price semantics here: cells come out as strings.

use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;

use crate::error::{IngestError, IngestResult};

/// Sheet holding median price paid by local authority in the source workbook.
pub const DEFAULT_SHEET: &str = "2a";

/// Title and notes rows above the header in the source workbook.
pub const DEFAULT_SKIP_ROWS: usize = 6;

/// Identifier columns before the first period column.
pub const ID_COLUMNS: usize = 4;

/// Where and how to read the source table.
#[derive(Debug, Clone)]
pub struct SourceSpec {
    /// Sheet name (workbooks only).
    pub sheet: String,
    /// Rows to skip before the header row.
    pub skip_rows: usize,
}

impl Default for SourceSpec {
    fn default() -> Self {
        Self {
            sheet: DEFAULT_SHEET.to_string(),
            skip_rows: DEFAULT_SKIP_ROWS,
        }
    }
}

/// A wide table as read from the source, cells rendered to strings.
#[derive(Debug, Clone, PartialEq)]
pub struct WideTable {
    /// Column headers
    pub headers: Vec<String>,
    /// Data rows, each padded or truncated to `headers.len()`
    pub rows: Vec<Vec<String>>,
    /// Detected or used encoding ("xlsx" for workbooks)
    pub encoding: String,
    /// Detected delimiter (CSV only)
    pub delimiter: Option<char>,
}

impl WideTable {
    /// Build from raw header and row cells, dropping trailing blank columns and blank rows.
    pub fn from_cells(
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
        encoding: impl Into<String>,
        delimiter: Option<char>,
    ) -> IngestResult<Self> {
        let mut headers = headers;
        while headers.last().is_some_and(|h| h.trim().is_empty()) {
            headers.pop();
        }
        if headers.len() < ID_COLUMNS + 1 {
            return Err(IngestError::TooFewColumns(headers.len()));
        }

        let width = headers.len();
        let rows = rows
            .into_iter()
            .filter(|row| row.iter().any(|c| !c.trim().is_empty()))
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();

        Ok(Self {
            headers,
            rows,
            encoding: encoding.into(),
            delimiter,
        })
    }

    /// Period column headers (everything after the identifiers).
    pub fn period_headers(&self) -> &[String] {
        &self.headers[ID_COLUMNS..]
    }
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        // utf-8 and anything unknown: lossy
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Detect the delimiter by counting occurrences in a header line
pub fn detect_delimiter(line: &str) -> char {
    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Read the source table, choosing the reader from the file extension.
pub fn read_table<P: AsRef<Path>>(path: P, source: &SourceSpec) -> IngestResult<WideTable> {
    let path = path.as_ref();
    let is_workbook = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_lowercase().as_str(), "xlsx" | "xlsm" | "xlsb" | "xls" | "ods"))
        .unwrap_or(false);

    if is_workbook {
        read_xlsx(path, &source.sheet, source.skip_rows)
    } else {
        read_csv(path, source.skip_rows)
    }
}

/// Read one sheet of a workbook, skipping `skip_rows` rows before the header.
pub fn read_xlsx<P: AsRef<Path>>(path: P, sheet: &str, skip_rows: usize) -> IngestResult<WideTable> {
    let mut workbook =
        open_workbook_auto(path.as_ref()).map_err(|e| IngestError::Workbook(e.to_string()))?;

    let names = workbook.sheet_names();
    if !names.iter().any(|n| n == sheet) {
        return Err(IngestError::MissingSheet {
            sheet: sheet.to_string(),
            available: names.join(", "),
        });
    }

    let range = workbook
        .worksheet_range(sheet)
        .map_err(|e| IngestError::Workbook(e.to_string()))?;

    // Range starts at the first used cell, not at A1
    let first_row = range.start().map(|(r, _)| r as usize).unwrap_or(0);
    let skip = skip_rows.saturating_sub(first_row);

    let mut rows = range
        .rows()
        .skip(skip)
        .map(|row| row.iter().map(cell_to_string).collect::<Vec<_>>());

    let headers = rows.next().ok_or(IngestError::EmptyTable(skip_rows))?;
    WideTable::from_cells(headers, rows.collect(), "xlsx", None)
}

/// Render a workbook cell as text.
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => f.to_string(),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.date().format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| dt.as_f64().to_string()),
        other => other.to_string(),
    }
}

/// Read a CSV export with auto-detected encoding and delimiter.
pub fn read_csv<P: AsRef<Path>>(path: P, skip_rows: usize) -> IngestResult<WideTable> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_bytes_auto(&bytes, skip_rows)
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8], skip_rows: usize) -> IngestResult<WideTable> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    parse_csv_str(&content, skip_rows, encoding)
}

/// Parse decoded CSV text, skipping `skip_rows` lines before the header.
pub fn parse_csv_str(content: &str, skip_rows: usize, encoding: String) -> IngestResult<WideTable> {
    let body: String = content
        .lines()
        .skip(skip_rows)
        .collect::<Vec<_>>()
        .join("\n");

    let header_line = body
        .lines()
        .find(|l| !l.trim().is_empty())
        .ok_or(IngestError::EmptyTable(skip_rows))?;
    let delimiter = detect_delimiter(header_line);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| IngestError::Csv {
            line: skip_rows + 1,
            message: e.to_string(),
        })?
        .iter()
        .map(String::from)
        .collect();

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|e| IngestError::Csv {
            line: skip_rows + idx + 2,
            message: e.to_string(),
        })?;
        rows.push(record.iter().map(String::from).collect());
    }

    WideTable::from_cells(headers, rows, encoding, Some(delimiter))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Median price paid by local authority
Source: test
Region code,Region name,Local authority code,Local authority name,Year ending Dec 1995,Year ending Mar 1996
E12000001,North East,E06000001,Hartlepool,\"42,000\",43000
E12000001,North East,E06000002,Middlesbrough,44500,:
";

    #[test]
    fn test_parse_with_skip_rows() {
        let table = parse_csv_str(SAMPLE, 2, "utf-8".into()).unwrap();

        assert_eq!(table.headers.len(), 6);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][3], "Hartlepool");
        assert_eq!(table.rows[0][4], "42,000");
        assert_eq!(table.rows[1][5], ":");
        assert_eq!(table.delimiter, Some(','));
        assert_eq!(table.period_headers(), &["Year ending Dec 1995", "Year ending Mar 1996"]);
    }

    #[test]
    fn test_semicolon_delimiter() {
        let csv = "a;b;c;d;2020-01\nR;Region;E1;Name;100\n";
        let table = parse_csv_str(csv, 0, "utf-8".into()).unwrap();

        assert_eq!(table.delimiter, Some(';'));
        assert_eq!(table.rows[0][4], "100");
    }

    #[test]
    fn test_short_rows_padded() {
        let csv = "a,b,c,d,2020-01,2020-02\nR,Region,E1,Name,100\n";
        let table = parse_csv_str(csv, 0, "utf-8".into()).unwrap();

        assert_eq!(table.rows[0].len(), 6);
        assert_eq!(table.rows[0][5], "");
    }

    #[test]
    fn test_blank_rows_and_trailing_columns_dropped() {
        let csv = "a,b,c,d,2020-01,\nR,Region,E1,Name,100,\n,,,,,\n";
        let table = parse_csv_str(csv, 0, "utf-8".into()).unwrap();

        assert_eq!(table.headers.len(), 5);
        assert_eq!(table.rows.len(), 1);
    }

    #[test]
    fn test_too_few_columns() {
        let csv = "a,b,c,d\n1,2,3,4\n";
        let result = parse_csv_str(csv, 0, "utf-8".into());
        assert!(matches!(result, Err(IngestError::TooFewColumns(4))));
    }

    #[test]
    fn test_skip_past_end_is_empty() {
        let result = parse_csv_str("a,b\n", 6, "utf-8".into());
        assert!(matches!(result, Err(IngestError::EmptyTable(6))));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c"), ';');
        assert_eq!(detect_delimiter("a,b,c"), ',');
        assert_eq!(detect_delimiter("a\tb\tc"), '\t');
        assert_eq!(detect_delimiter("a|b|c"), '|');
    }

    #[test]
    fn test_latin1_decoding() {
        // "Ynys Môn" in ISO-8859-1
        let bytes: &[u8] = &[0x59, 0x6E, 0x79, 0x73, 0x20, 0x4D, 0xF4, 0x6E];
        let decoded = decode_content(bytes, "iso-8859-1");
        assert_eq!(decoded, "Ynys Môn");
    }

    #[test]
    fn test_auto_parse_bytes() {
        let table = parse_bytes_auto(SAMPLE.as_bytes(), 2).unwrap();
        assert_eq!(table.encoding, "utf-8");
        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn test_missing_workbook() {
        let result = read_xlsx("does-not-exist.xlsx", DEFAULT_SHEET, DEFAULT_SKIP_ROWS);
        assert!(result.is_err());
    }
}

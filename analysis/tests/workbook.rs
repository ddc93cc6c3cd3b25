use chrono::NaiveDate;
use houseprice::{read_table, read_xlsx, wide_to_long, IngestError, SourceSpec};
use std::path::PathBuf;

fn fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/prices.xlsx")
}

const HEADER: [&str; 7] = [
    "Region code",
    "Region name",
    "Local authority code",
    "Local authority name",
    "Year ending Dec 1995",
    "Year ending March 1996",
    "Year ending Jun 1996",
];

#[test]
fn header_found_below_blank_rows() {
    // sheet "2a" starts with three empty rows, so the used range begins at row 4
    let table = read_xlsx(fixture(), "2a", 3).unwrap();

    assert_eq!(table.headers, HEADER);
    assert_eq!(table.rows.len(), 2);
    assert_eq!(table.rows[0][3], "Hartlepool");
    assert_eq!(table.rows[0][4], "42000");
    assert_eq!(table.rows[1][5], ":");
    assert_eq!(table.rows[1][6], "");
    assert_eq!(table.encoding, "xlsx");
}

#[test]
fn header_found_below_title_row() {
    let table = read_xlsx(fixture(), "titled", 2).unwrap();

    assert_eq!(table.headers, HEADER);
    assert_eq!(table.rows.len(), 2);
    assert_eq!(table.rows[1][2], "E06000002");
}

#[test]
fn read_table_picks_workbook_reader() {
    let source = SourceSpec {
        sheet: "2a".into(),
        skip_rows: 3,
    };
    let table = read_table(fixture(), &source).unwrap();
    let observations = wide_to_long(&table).unwrap();

    // Middlesbrough has no price for March or June 1996
    assert_eq!(observations.len(), 4);
    assert_eq!(observations[1].date, NaiveDate::from_ymd_opt(1996, 3, 1).unwrap());
    assert_eq!(observations[2].date, NaiveDate::from_ymd_opt(1996, 6, 1).unwrap());
    assert_eq!(observations[3].price, 44500.0);
}

#[test]
fn missing_sheet_lists_available() {
    let err = read_xlsx(fixture(), "3b", 3).unwrap_err();
    match err {
        IngestError::MissingSheet { sheet, available } => {
            assert_eq!(sheet, "3b");
            assert_eq!(available, "2a, titled");
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn skip_past_end_is_empty() {
    assert!(matches!(
        read_xlsx(fixture(), "2a", 50),
        Err(IngestError::EmptyTable(50))
    ));
}

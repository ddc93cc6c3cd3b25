//! Wide-to-long reshaping and date filtering.
//!
//! ```text
//! Wide (one column per period)                 Long (one row per observation)
//! ┌──────┬───────────┬──────────┬──────────┐   ┌──────┬────────────┬───────┐
//! │ code │ name      │ Dec 1995 │ Mar 1996 │   │ code │ date       │ price │
//! ├──────┼───────────┼──────────┼──────────┤ → ├──────┼────────────┼───────┤
//! │ E06… │ Hartlepool│ 42000    │ 43000    │   │ E06… │ 1995-12-01 │ 42000 │
//! └──────┴───────────┴──────────┴──────────┘   │ E06… │ 1996-03-01 │ 43000 │
//!                                              └──────┴────────────┴───────┘
//! ```

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};

use crate::error::{ReshapeError, ReshapeResult};
use crate::logs::{log_info, log_success, log_warning};
use crate::models::{Location, Observation};
use crate::parser::{WideTable, ID_COLUMNS};

/// "Year ending Mar 1996", "Mar 1996", "March 1996", "Sept 2000"
static MONTH_YEAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:year\s+ending\s+)?([a-z]{3,9})\.?\s+(\d{4})$").expect("valid regex")
});

const MONTHS: [&str; 12] = [
    "january", "february", "march", "april", "may", "june",
    "july", "august", "september", "october", "november", "december",
];

/// Cell values the source uses for "no data".
const MISSING_MARKERS: &[&str] = &["", ":", "..", "-", "x", "[x]", "[c]", "n/a", "na"];

/// Parse a period column header into the first day of its month (or the exact date).
pub fn parse_period(header: &str) -> Option<NaiveDate> {
    let header = header.trim();

    if let Ok(date) = NaiveDate::parse_from_str(header, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(&format!("{}-01", header), "%Y-%m-%d") {
        return Some(date);
    }

    let caps = MONTH_YEAR.captures(header)?;
    let month = month_number(&caps[1])?;
    let year = caps[2].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Month number from an English month name or any abbreviation of at least three letters.
fn month_number(name: &str) -> Option<u32> {
    let name = name.to_lowercase();
    if name.len() < 3 {
        return None;
    }
    let position = MONTHS.iter().position(|m| m.starts_with(name.as_str()))?;
    Some(position as u32 + 1)
}

/// A price cell that is neither a number nor a missing-value marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotAPrice;

/// Parse a price cell. `Ok(None)` for a missing-value marker.
pub fn parse_price(raw: &str) -> Result<Option<f64>, NotAPrice> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != ',' && *c != '£' && !c.is_whitespace())
        .collect();

    if MISSING_MARKERS.contains(&cleaned.to_lowercase().as_str()) {
        return Ok(None);
    }

    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(NotAPrice),
    }
}

/// Reshape the wide table into one observation per (location, period) with a price.
///
/// Output is sorted by local-authority code, then date.
pub fn wide_to_long(table: &WideTable) -> ReshapeResult<Vec<Observation>> {
    let periods: Vec<NaiveDate> = table
        .period_headers()
        .iter()
        .enumerate()
        .map(|(i, header)| {
            parse_period(header).ok_or_else(|| ReshapeError::BadPeriod {
                column: ID_COLUMNS + i + 1,
                header: header.clone(),
            })
        })
        .collect::<Result<_, _>>()?;

    let mut observations = Vec::with_capacity(table.rows.len() * periods.len());
    let mut seen: HashSet<(String, NaiveDate)> = HashSet::new();
    let mut missing_cells = 0usize;

    for (row_idx, row) in table.rows.iter().enumerate() {
        let row_num = row_idx + 1;
        let location = Location {
            region_code: row[0].trim().to_string(),
            region_name: row[1].trim().to_string(),
            code: row[2].trim().to_string(),
            name: row[3].trim().to_string(),
        };
        if location.code.is_empty() {
            return Err(ReshapeError::MissingCode(row_num));
        }

        for (col_idx, date) in periods.iter().enumerate() {
            let raw = &row[ID_COLUMNS + col_idx];
            let price = parse_price(raw).map_err(|_| ReshapeError::BadPrice {
                row: row_num,
                column: table.headers[ID_COLUMNS + col_idx].clone(),
                value: raw.clone(),
            })?;

            let Some(price) = price else {
                missing_cells += 1;
                continue;
            };

            if !seen.insert((location.code.clone(), *date)) {
                return Err(ReshapeError::DuplicateObservation {
                    code: location.code.clone(),
                    date: date.to_string(),
                });
            }

            observations.push(Observation {
                location: location.clone(),
                date: *date,
                price,
            });
        }
    }

    if observations.is_empty() {
        return Err(ReshapeError::NoObservations);
    }

    observations.sort_by(|a, b| a.code().cmp(b.code()).then(a.date.cmp(&b.date)));

    log_success(format!(
        "Reshaped {} rows × {} periods into {} observations",
        table.rows.len(),
        periods.len(),
        observations.len()
    ));
    if missing_cells > 0 {
        log_warning(format!("{} cells had no price", missing_cells));
    }

    Ok(observations)
}

/// Distinct local-authority codes in a set of observations.
pub fn distinct_codes<'a, I>(codes: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    codes.into_iter().map(String::from).collect()
}

/// Keep observations within `[from, to]` (either bound optional).
///
/// Fails if a location loses every observation, so no local authority
/// disappears silently.
pub fn filter_dates(
    observations: Vec<Observation>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> ReshapeResult<Vec<Observation>> {
    if from.is_none() && to.is_none() {
        return Ok(observations);
    }

    let before = distinct_codes(observations.iter().map(|o| o.code()));
    let kept: Vec<Observation> = observations
        .into_iter()
        .filter(|o| from.map_or(true, |f| o.date >= f) && to.map_or(true, |t| o.date <= t))
        .collect();
    let after = distinct_codes(kept.iter().map(|o| o.code()));

    log_info(format!(
        "Date window {} → {}: {} observations, {} local authorities",
        from.map_or("start".to_string(), |d| d.to_string()),
        to.map_or("end".to_string(), |d| d.to_string()),
        kept.len(),
        after.len()
    ));

    let lost: Vec<&String> = before.difference(&after).collect();
    if let Some(first) = lost.first() {
        return Err(ReshapeError::EmptyWindow {
            count: lost.len(),
            first: (*first).clone(),
        });
    }

    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(headers: &[&str], rows: &[&[&str]]) -> WideTable {
        WideTable::from_cells(
            headers.iter().map(|s| s.to_string()).collect(),
            rows.iter().map(|r| r.iter().map(|s| s.to_string()).collect()).collect(),
            "utf-8",
            Some(','),
        )
        .unwrap()
    }

    const HEADERS: &[&str] = &["rc", "rn", "code", "name", "Year ending Dec 1995", "Year ending Mar 1996"];

    #[test]
    fn test_parse_period_formats() {
        let dec95 = NaiveDate::from_ymd_opt(1995, 12, 1).unwrap();
        assert_eq!(parse_period("Year ending Dec 1995"), Some(dec95));
        assert_eq!(parse_period("year ending december 1995"), Some(dec95));
        assert_eq!(parse_period("Dec 1995"), Some(dec95));
        assert_eq!(parse_period("March 1996"), NaiveDate::from_ymd_opt(1996, 3, 1));
        assert_eq!(parse_period("Year ending June 2000"), NaiveDate::from_ymd_opt(2000, 6, 1));
        assert_eq!(parse_period("Sept 2000"), NaiveDate::from_ymd_opt(2000, 9, 1));
        assert_eq!(parse_period("Year ending Sep. 2000"), NaiveDate::from_ymd_opt(2000, 9, 1));
        assert_eq!(parse_period("Year ending Marchy 2000"), None);
        assert_eq!(parse_period("1995-12"), Some(dec95));
        assert_eq!(parse_period("1995-12-31"), NaiveDate::from_ymd_opt(1995, 12, 31));
        assert_eq!(parse_period("Local authority name"), None);
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("42,000"), Ok(Some(42000.0)));
        assert_eq!(parse_price(" 95500.5 "), Ok(Some(95500.5)));
        assert_eq!(parse_price(":"), Ok(None));
        assert_eq!(parse_price("[x]"), Ok(None));
        assert_eq!(parse_price(""), Ok(None));
        assert_eq!(parse_price("abc"), Err(NotAPrice));
    }

    #[test]
    fn test_wide_to_long() {
        let t = table(
            HEADERS,
            &[
                &["R1", "North", "E2", "Beta", "200", "220"],
                &["R1", "North", "E1", "Alpha", "100", ":"],
            ],
        );
        let obs = wide_to_long(&t).unwrap();

        assert_eq!(obs.len(), 3);
        // sorted by code then date
        assert_eq!(obs[0].code(), "E1");
        assert_eq!(obs[1].code(), "E2");
        assert_eq!(obs[1].date, NaiveDate::from_ymd_opt(1995, 12, 1).unwrap());
        assert_eq!(obs[2].price, 220.0);
        assert_eq!(obs[2].location.region_name, "North");
    }

    #[test]
    fn test_duplicate_identity_fails() {
        let t = table(
            HEADERS,
            &[
                &["R1", "North", "E1", "Alpha", "100", "110"],
                &["R1", "North", "E1", "Alpha again", "100", "110"],
            ],
        );
        assert!(matches!(
            wide_to_long(&t),
            Err(ReshapeError::DuplicateObservation { .. })
        ));
    }

    #[test]
    fn test_bad_header_and_price() {
        let t = table(&["rc", "rn", "code", "name", "notes"], &[&["R", "N", "E1", "A", "1"]]);
        assert!(matches!(wide_to_long(&t), Err(ReshapeError::BadPeriod { column: 5, .. })));

        let t = table(HEADERS, &[&["R", "N", "E1", "A", "1", "lots"]]);
        let err = wide_to_long(&t).unwrap_err();
        assert!(err.to_string().contains("lots"));
    }

    #[test]
    fn test_filter_dates_keeps_window() {
        let t = table(HEADERS, &[&["R", "N", "E1", "A", "100", "110"]]);
        let obs = wide_to_long(&t).unwrap();
        let from = NaiveDate::from_ymd_opt(1996, 1, 1);

        let kept = filter_dates(obs, from, None).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].price, 110.0);
    }

    #[test]
    fn test_filter_dates_refuses_to_lose_locations() {
        let t = table(
            HEADERS,
            &[
                &["R", "N", "E1", "A", "100", "110"],
                &["R", "N", "E2", "B", "100", ":"],
            ],
        );
        let obs = wide_to_long(&t).unwrap();
        let from = NaiveDate::from_ymd_opt(1996, 1, 1);

        let err = filter_dates(obs, from, None).unwrap_err();
        assert!(matches!(err, ReshapeError::EmptyWindow { count: 1, .. }));
    }
}

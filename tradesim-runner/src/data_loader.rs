//! CSV bar loading.
//!
//! Expects a header row `timestamp,open,high,low,close,volume` (column order
//! free, names case-insensitive). Timestamps may be dates (`2024-01-02`) or
//! datetimes (`2024-01-02 15:30:00` / `2024-01-02T15:30:00`). Rows are not
//! sorted; out-of-order input is rejected by `PriceSeries::new`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;
use tracing::debug;
use tradesim_core::domain::{Bar, PriceSeries, PriceSeriesError};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read '{}': {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("'{}' is missing column '{column}'", path.display())]
    MissingColumn { path: PathBuf, column: String },

    #[error("'{}' line {line}: {reason}", path.display())]
    BadRow {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    #[error(transparent)]
    Series(#[from] PriceSeriesError),
}

const COLUMNS: [&str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];

/// Load one instrument's bars from a CSV file.
pub fn load_csv(path: &Path, instrument: &str) -> Result<PriceSeries, LoadError> {
    let csv_err = |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;

    let headers = reader.headers().map_err(csv_err)?.clone();
    let mut index = [0usize; 6];
    for (slot, column) in index.iter_mut().zip(COLUMNS) {
        *slot = headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(column))
            .ok_or_else(|| LoadError::MissingColumn {
                path: path.to_path_buf(),
                column: column.to_string(),
            })?;
    }

    let mut bars = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let bad_row = |reason: String| LoadError::BadRow {
            path: path.to_path_buf(),
            line,
            reason,
        };
        let field = |i: usize| record.get(index[i]).unwrap_or("");

        let timestamp = parse_timestamp(field(0)).ok_or_else(|| {
            bad_row(format!("unparseable timestamp '{}'", field(0)))
        })?;
        let mut values = [0.0f64; 5];
        for (k, value) in values.iter_mut().enumerate() {
            let raw = field(k + 1);
            *value = raw
                .parse()
                .map_err(|_| bad_row(format!("bad {} value '{raw}'", COLUMNS[k + 1])))?;
        }
        let [open, high, low, close, volume] = values;
        bars.push(Bar {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        });
    }

    debug!(instrument, path = %path.display(), bars = bars.len(), "loaded csv");
    Ok(PriceSeries::new(instrument, bars)?)
}

/// Load several instruments at once, keyed by instrument.
pub fn load_all<'a, I>(sources: I) -> Result<HashMap<String, PriceSeries>, LoadError>
where
    I: IntoIterator<Item = (&'a str, &'a Path)>,
{
    sources
        .into_iter()
        .map(|(instrument, path)| Ok((instrument.to_string(), load_csv(path, instrument)?)))
        .collect()
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parses_dates_and_datetimes() {
        assert_eq!(
            parse_timestamp("2024-01-02"),
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(
            parse_timestamp("2024-01-02T15:30:00"),
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(15, 30, 0)
        );
        assert_eq!(
            parse_timestamp("2024-01-02 15:30"),
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(15, 30, 0)
        );
        assert_eq!(parse_timestamp("01/02/2024"), None);
    }

    #[test]
    fn loads_valid_file() {
        let file = write_csv(
            "timestamp,open,high,low,close,volume\n\
             2024-01-02,100,101,99,100.5,1000\n\
             2024-01-03,100.5,102,100,101.5,1200\n",
        );
        let series = load_csv(file.path(), "SPY").unwrap();
        assert_eq!(series.instrument(), "SPY");
        assert_eq!(series.len(), 2);
        assert_eq!(series.closes(), vec![100.5, 101.5]);
    }

    #[test]
    fn column_order_and_case_are_free() {
        let file = write_csv(
            "Close,Volume,Timestamp,Open,High,Low\n\
             10,5,2024-01-02,10,11,9\n",
        );
        let series = load_csv(file.path(), "X").unwrap();
        assert_eq!(series.bars()[0].high, 11.0);
        assert_eq!(series.bars()[0].close, 10.0);
    }

    #[test]
    fn missing_column() {
        let file = write_csv("timestamp,open,high,low,close\n2024-01-02,1,1,1,1\n");
        assert!(matches!(
            load_csv(file.path(), "X"),
            Err(LoadError::MissingColumn { column, .. }) if column == "volume"
        ));
    }

    #[test]
    fn bad_number_reports_row() {
        let file = write_csv(
            "timestamp,open,high,low,close,volume\n2024-01-02,1,1,1,abc,1\n",
        );
        let err = load_csv(file.path(), "X").unwrap_err();
        assert!(matches!(err, LoadError::BadRow { .. }));
        assert!(err.to_string().contains("close"), "{err}");
    }

    #[test]
    fn out_of_order_rows_rejected() {
        let file = write_csv(
            "timestamp,open,high,low,close,volume\n\
             2024-01-03,1,1,1,1,1\n\
             2024-01-02,1,1,1,1,1\n",
        );
        assert!(matches!(
            load_csv(file.path(), "X"),
            Err(LoadError::Series(PriceSeriesError::Invalid { .. }))
        ));
    }

    #[test]
    fn empty_file_rejected() {
        let file = write_csv("timestamp,open,high,low,close,volume\n");
        assert!(matches!(
            load_csv(file.path(), "X"),
            Err(LoadError::Series(PriceSeriesError::Empty { .. }))
        ));
    }

    #[test]
    fn missing_file() {
        assert!(matches!(
            load_csv(Path::new("/nonexistent/bars.csv"), "X"),
            Err(LoadError::Csv { .. })
        ));
    }
}

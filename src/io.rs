//! I/O Utilities
//!
//! Price CSV loading and directory helpers for rendered images.

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use csv::Reader;
use tracing::debug;

use crate::data::{Column, Frame};
use crate::error::{Error, Result};

const TIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

fn parse_time(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_float(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
        return Some(f64::NAN);
    }
    raw.parse().ok()
}

/// Load a price CSV with headers into a [`Frame`].
///
/// `firm_column` becomes text, `time_column` is parsed as a date or
/// date-time, every other column is read as float (empty cells are NaN).
pub fn load_prices_csv<P: AsRef<Path>>(path: P, firm_column: &str, time_column: &str) -> Result<Frame> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    let mut reader = Reader::from_path(path)?;
    let headers = reader.headers()?.clone();

    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| Error::InvalidColumn(name.to_string()))
    };
    let firm_idx = find(firm_column)?;
    let time_idx = find(time_column)?;

    let value_columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != firm_idx && *i != time_idx)
        .map(|(i, h)| (i, h.to_string()))
        .collect();

    let mut firms = Vec::new();
    let mut times = Vec::new();
    let mut values: Vec<Vec<f64>> = vec![Vec::new(); value_columns.len()];

    for (line, result) in reader.records().enumerate() {
        let record = result?;
        let field = |i: usize| record.get(i).unwrap_or("");

        firms.push(field(firm_idx).to_string());
        times.push(parse_time(field(time_idx)).ok_or_else(|| {
            Error::InvalidParameter(format!(
                "row {}: cannot parse time '{}'",
                line + 1,
                field(time_idx)
            ))
        })?);

        for (slot, (i, name)) in value_columns.iter().enumerate() {
            let value = parse_float(field(*i)).ok_or_else(|| {
                Error::InvalidParameter(format!(
                    "row {}: column '{}' value '{}' is not numeric",
                    line + 1,
                    name,
                    field(*i)
                ))
            })?;
            values[slot].push(value);
        }
    }

    let mut frame = Frame::new()
        .with_column(firm_column, Column::Text(firms))?
        .with_column(time_column, Column::Time(times))?;
    for ((_, name), column) in value_columns.into_iter().zip(values) {
        frame.set_column(name, Column::Float(column))?;
    }

    debug!(rows = frame.height(), columns = frame.width(), path = %path.display(), "loaded prices");
    Ok(frame)
}

/// Create directory if it doesn't exist
pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
    if !path.as_ref().exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Absolute paths of the regular, non-hidden files in `dir`, sorted by name
pub fn list_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref().canonicalize()?;
    let mut files = Vec::new();

    for entry in std::fs::read_dir(&dir)? {
        let entry = entry?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if !hidden && entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }

    files.sort();
    Ok(files)
}

/// Remove every non-hidden file in `dir`, returning how many were removed
pub fn clear_files<P: AsRef<Path>>(dir: P) -> Result<usize> {
    let files = list_files(dir)?;
    for file in &files {
        std::fs::remove_file(file)?;
    }
    Ok(files.len())
}

/// Remove a file if it exists
pub fn remove_file_if_exists<P: AsRef<Path>>(path: P) -> Result<bool> {
    let path = path.as_ref();
    if path.is_file() {
        std::fs::remove_file(path)?;
        return Ok(true);
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PRICES: &str = "\
firm,time,open,high,low,close
AAPL,2021-01-04,1.0,2.0,0.5,1.5
AAPL,2021-01-05 00:00:00,1.5,2.5,1.0,
GOOG,2021-01-04,10.0,11.0,9.0,NaN
";

    #[test]
    fn test_load_prices_csv() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prices.csv");
        std::fs::write(&path, PRICES).unwrap();

        let frame = load_prices_csv(&path, "firm", "time").unwrap();
        assert_eq!(frame.height(), 3);
        assert_eq!(frame.width(), 6);
        assert_eq!(frame.floats("open").unwrap(), &[1.0, 1.5, 10.0]);
        assert!(frame.floats("close").unwrap()[1].is_nan());
        assert!(frame.floats("close").unwrap()[2].is_nan());
        assert_eq!(
            frame.times("time").unwrap()[1],
            NaiveDate::from_ymd_opt(2021, 1, 5).unwrap().and_hms_opt(0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_load_prices_missing_firm_column() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prices.csv");
        std::fs::write(&path, PRICES).unwrap();

        let err = load_prices_csv(&path, "ticker", "time").unwrap_err();
        assert!(matches!(err, Error::InvalidColumn(_)));
    }

    #[test]
    fn test_load_prices_bad_number() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prices.csv");
        std::fs::write(&path, "firm,time,close\nA,2021-01-04,abc\n").unwrap();

        assert!(load_prices_csv(&path, "firm", "time").is_err());
    }

    #[test]
    fn test_list_and_clear_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.jpg"), b"x").unwrap();
        std::fs::write(dir.path().join("a.jpg"), b"x").unwrap();
        std::fs::write(dir.path().join(".hidden"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let files = list_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("a.jpg"));
        assert!(files.iter().all(|f| f.is_absolute()));

        assert_eq!(clear_files(dir.path()).unwrap(), 2);
        assert!(list_files(dir.path()).unwrap().is_empty());
        assert!(dir.path().join(".hidden").exists());
    }
}

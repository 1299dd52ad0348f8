//! Delimited-file source and export

use log::{debug, info};
use std::path::{Path, PathBuf};

use crate::error::LoadError;
use crate::types::{Column, ColumnKind, Observation, SleepRecord, SleepTable};

use super::{mask_non_finite, TableSource};

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// CSV file with a header row naming the observation columns
#[derive(Debug, Clone)]
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TableSource for CsvSource {
    fn load(&self) -> Result<SleepTable, LoadError> {
        load_from_csv(&self.path)
    }

    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }
}

/// Load a table from a CSV file.
///
/// The `date` column is parsed as a calendar date; empty, NaN and infinite
/// cells become missing values. Only observation columns named in the header
/// are present on the table; other header names are ignored.
pub fn load_from_csv(path: impl AsRef<Path>) -> Result<SleepTable, LoadError> {
    let path = path.as_ref();
    let mut reader = ::csv::ReaderBuilder::new()
        .trim(::csv::Trim::All)
        .from_path(path)
        .map_err(|e| LoadError::file(path, e))?;

    let supplied: Vec<Column> = reader
        .headers()
        .map_err(|e| LoadError::file(path, e))?
        .iter()
        .filter_map(|name| name.parse::<Column>().ok())
        .filter(|c| !c.is_derived())
        .collect();

    let mut records = reader
        .deserialize::<Observation>()
        .map(|row| row.map(SleepRecord::new))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| LoadError::file(path, e))?;
    mask_non_finite(&mut records, &path.display().to_string());

    debug!(
        "Loaded {} rows ({} columns) from {}",
        records.len(),
        supplied.len(),
        path.display()
    );
    Ok(SleepTable::with_raw_columns(records, supplied))
}

/// Write every present column of `table` to a CSV file.
///
/// Missing values are written as empty cells, timestamps as
/// `YYYY-MM-DD HH:MM:SS`.
pub fn export_csv(table: &SleepTable, path: impl AsRef<Path>) -> Result<(), LoadError> {
    let path = path.as_ref();
    let columns = table.columns();
    let mut writer = ::csv::Writer::from_path(path).map_err(|e| LoadError::file(path, e))?;

    writer
        .write_record(columns.iter().map(Column::as_str))
        .map_err(|e| LoadError::file(path, e))?;
    for record in table.records() {
        writer
            .write_record(columns.iter().map(|&c| format_cell(record, c)))
            .map_err(|e| LoadError::file(path, e))?;
    }
    writer.flush().map_err(|e| LoadError::file(path, e))?;

    info!("Exported {} rows to {}", table.len(), path.display());
    Ok(())
}

fn format_cell(record: &SleepRecord, column: Column) -> String {
    let features = record.features.as_ref();
    match column.kind() {
        ColumnKind::Date => record.observation.date.format("%Y-%m-%d").to_string(),
        ColumnKind::DateTime => {
            let timestamp = match column {
                Column::BedtimeDatetime => features.and_then(|f| f.bedtime_datetime),
                _ => features.and_then(|f| f.wake_time_datetime),
            };
            timestamp
                .map(|t| t.format(DATETIME_FORMAT).to_string())
                .unwrap_or_default()
        }
        ColumnKind::Integer => features
            .map(|f| f.day_of_week.to_string())
            .unwrap_or_default(),
        ColumnKind::Float => record
            .value(column)
            .map(|v| v.to_string())
            .unwrap_or_default(),
    }
}

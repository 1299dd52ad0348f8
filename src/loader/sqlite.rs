//! SQLite query source

use log::debug;
use rusqlite::types::Type;
use rusqlite::{Connection, OpenFlags, Row};

use crate::error::LoadError;
use crate::types::{calendar_date, Column, Observation, SleepRecord, SleepTable};

use super::{mask_non_finite, TableSource};

/// Result set of a SQL query against a SQLite database file
#[derive(Debug, Clone)]
pub struct SqliteSource {
    connection: String,
    query: String,
}

impl SqliteSource {
    pub fn new(connection: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            connection: connection.into(),
            query: query.into(),
        }
    }
}

impl TableSource for SqliteSource {
    fn load(&self) -> Result<SleepTable, LoadError> {
        load_from_database(&self.connection, &self.query)
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.connection)
    }
}

/// Run `query` against the database at `connection` and read the rows as
/// observations.
///
/// The database is opened read-only and closed before returning. The result
/// set must include a `date` column (TEXT); other observation columns are read
/// by name when present, and NULL becomes a missing value. Observation columns
/// the query does not select are absent from the table.
pub fn load_from_database(connection: &str, query: &str) -> Result<SleepTable, LoadError> {
    let conn = Connection::open_with_flags(
        connection,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI,
    )
    .map_err(LoadError::query)?;

    let mut stmt = conn.prepare(query).map_err(LoadError::query)?;
    let date_index = stmt
        .column_index(Column::Date.as_str())
        .map_err(LoadError::query)?;
    let selected: Vec<Column> = Column::RAW
        .into_iter()
        .filter(|c| *c != Column::Date)
        .filter(|c| stmt.column_index(c.as_str()).is_ok())
        .collect();

    let mut records = stmt
        .query_map([], |row| read_record(row, date_index, &selected))
        .map_err(LoadError::query)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(LoadError::query)?;
    mask_non_finite(&mut records, connection);

    debug!(
        "Loaded {} rows ({} metric columns) from {}",
        records.len(),
        selected.len(),
        connection
    );
    Ok(SleepTable::with_raw_columns(records, selected))
}

fn read_record(row: &Row<'_>, date_index: usize, columns: &[Column]) -> rusqlite::Result<SleepRecord> {
    let raw_date: String = row.get(date_index)?;
    let date = calendar_date::parse(&raw_date).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(date_index, Type::Text, Box::new(e))
    })?;

    let mut record = SleepRecord::new(Observation {
        date,
        sleep_duration: None,
        quality_score: None,
        bedtime: None,
        wake_time: None,
        activity_level: None,
        stress_level: None,
        heart_rate: None,
        deep_sleep_pct: None,
        rem_sleep_pct: None,
        light_sleep_pct: None,
    });
    for &column in columns {
        let value: Option<f64> = row.get(column.as_str())?;
        record.set(column, value);
    }
    Ok(record)
}

//! Table sources and flat export
//!
//! Loaders read a table into the observation schema without transforming
//! it. The table records which raw columns the source supplied, so a column
//! the source lacks fails with a schema error when a later step needs it.
//! NaN and infinite cells are read as missing.

mod csv;
mod sqlite;

pub use self::csv::{export_csv, load_from_csv, CsvSource};
pub use self::sqlite::{load_from_database, SqliteSource};

use log::warn;

use crate::error::LoadError;
use crate::types::{SleepRecord, SleepTable};

/// A place a sleep table can be read from
pub trait TableSource {
    /// Read the table. Failures are reported, never retried.
    fn load(&self) -> Result<SleepTable, LoadError>;

    /// Human-readable description of the source for logs
    fn describe(&self) -> String;
}

/// Mask non-finite cells so they count as missing downstream
fn mask_non_finite(records: &mut [SleepRecord], source: &str) {
    let masked: usize = records.iter_mut().map(SleepRecord::mask_non_finite).sum();
    if masked > 0 {
        warn!("Read {masked} non-finite cells from {source} as missing");
    }
}

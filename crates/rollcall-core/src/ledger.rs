//! Attendance ledger — append-only, date-partitioned record of
//! (name, time) pairs.
//!
//! One CSV file per calendar day, named `DD-MM-YYYY.csv`. Deduplication
//! within a run is the session's job (via its marked set); the file is
//! never read back. A restarted process on the same day appends to the
//! existing file without touching prior content.

use chrono::{NaiveDate, NaiveTime};
use std::borrow::Cow;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

const LEDGER_HEADER: &str = "Name,Time";

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Handle to one day's ledger file.
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    /// Ledger file name for a date, e.g. `14-03-2026.csv`.
    pub fn file_name(date: NaiveDate) -> String {
        format!("{}.csv", date.format("%d-%m-%Y"))
    }

    /// Idempotently ensure the ledger for `date` exists under `dir`.
    ///
    /// A missing file is created with the header row; an existing file is
    /// left byte-for-byte untouched, so re-running on the same day never
    /// duplicates the header or clears prior entries.
    pub fn open_for(dir: &Path, date: NaiveDate) -> Result<Self, LedgerError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(Self::file_name(date));

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                writeln!(file, "{LEDGER_HEADER}")?;
                tracing::info!(path = %path.display(), "ledger created");
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                tracing::info!(path = %path.display(), "appending to existing ledger");
            }
            Err(err) => return Err(err.into()),
        }

        Ok(Self { path })
    }

    /// Append one attendance row. Each call is an independent
    /// open-append-close cycle, so a crash after N successful marks loses
    /// nothing already written.
    pub fn append(&self, name: &str, time: NaiveTime) -> Result<(), LedgerError> {
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        writeln!(file, "{},{}", csv_field(name), time.format("%H:%M:%S"))?;
        file.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Quote a field only when it needs it (embedded comma, quote, newline).
fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

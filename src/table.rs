//! Result rows and the CSV files they are persisted to.

use core::fmt;
use std::fs::{File, OpenOptions};
use std::io::Seek;
use std::path::Path;

use fs2::FileExt;

use crate::error::{Error, Result};

/// One cell of a result row.
#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    /// An integer value.
    Int(i64),
    /// A floating-point value.
    Float(f64),
    /// A free-form value.
    Text(String),
    /// A missing value (an empty CSV cell).
    Empty,
}

impl Cell {
    /// Numeric view of the cell; `None` for text and empty cells.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(v) => Some(*v as f64),
            Cell::Float(v) => Some(*v),
            Cell::Text(_) | Cell::Empty => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Int(v) => write!(f, "{v}"),
            Cell::Float(v) => write!(f, "{v}"),
            Cell::Text(v) => f.write_str(v),
            Cell::Empty => Ok(()),
        }
    }
}

/// An insertion-ordered mapping from column name to [`Cell`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    cells: Vec<(String, Cell)>,
}

impl Row {
    /// Creates an empty row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `column` to `cell`, replacing an existing value in place.
    pub fn set(&mut self, column: impl Into<String>, cell: Cell) {
        let column = column.into();
        if let Some(slot) = self.cells.iter_mut().find(|(name, _)| *name == column) {
            slot.1 = cell;
        } else {
            self.cells.push((column, cell));
        }
    }

    /// Builder form of [`Row::set`].
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, cell: Cell) -> Self {
        self.set(column, cell);
        self
    }

    /// Appends every column of `other`, overriding duplicates.
    pub fn extend(&mut self, other: Row) {
        for (name, cell) in other.cells {
            self.set(name, cell);
        }
    }

    /// Looks up a column.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.cells
            .iter()
            .find_map(|(name, cell)| (name == column).then_some(cell))
    }

    /// Looks up a numeric column; empty and text cells read as `None`.
    #[must_use]
    pub fn get_f64(&self, column: &str) -> Option<f64> {
        self.get(column).and_then(Cell::as_f64)
    }

    /// Column names in insertion order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the row has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Renders the row against a fixed header; absent columns become empty cells.
    fn record<S: AsRef<str>>(&self, header: &[S]) -> Vec<String> {
        header
            .iter()
            .map(|column| {
                self.get(AsRef::<str>::as_ref(column))
                    .map(ToString::to_string)
                    .unwrap_or_default()
            })
            .collect()
    }
}

/// Appends `rows` to the CSV file at `path` under an exclusive file lock.
///
/// The header is written only when the file is new or empty, so repeated
/// calls grow the same table. Existing rows are never rewritten.
///
/// # Errors
///
/// Returns an I/O or CSV error if the file cannot be opened, locked or written.
pub fn append_rows<S: AsRef<str>>(path: &Path, header: &[S], rows: &[Row]) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.lock_exclusive()?;
    let result = write_locked(&mut file, header, rows);
    file.unlock()?;
    result
}

fn write_locked<S: AsRef<str>>(file: &mut File, header: &[S], rows: &[Row]) -> Result<()> {
    let is_empty = file.seek(std::io::SeekFrom::End(0))? == 0;
    let mut writer = csv::Writer::from_writer(&*file);
    if is_empty {
        writer.write_record(header.iter().map(|h| AsRef::<str>::as_ref(h)))?;
    }
    for row in rows {
        writer.write_record(row.record(header))?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes a whole table to `path`, replacing any previous content. An empty
/// header leaves an empty file.
///
/// # Errors
///
/// Returns an I/O or CSV error if the file cannot be written.
pub fn write_table<S: AsRef<str>>(path: &Path, header: &[S], rows: &[Row]) -> Result<()> {
    if header.is_empty() {
        File::create(path)?;
        return Ok(());
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(header.iter().map(|h| AsRef::<str>::as_ref(h)))?;
    for row in rows {
        writer.write_record(row.record(header))?;
    }
    writer.flush()?;
    Ok(())
}

/// A CSV table read back verbatim: header plus raw records.
#[derive(Clone, Debug, Default)]
pub struct RawTable {
    /// Column names.
    pub header: csv::StringRecord,
    /// Data rows in file order.
    pub records: Vec<csv::StringRecord>,
}

impl RawTable {
    /// Reads the CSV file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O or CSV error if the file cannot be read.
    pub fn read(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)?;
        let header = reader.headers()?.clone();
        let records = reader.records().collect::<core::result::Result<Vec<_>, _>>()?;
        Ok(Self { header, records })
    }

    /// Appends another table's records, requiring an identical header.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidData`] if the headers differ.
    pub fn concat(&mut self, other: RawTable) -> Result<()> {
        if self.header.is_empty() {
            self.header = other.header;
        } else if self.header != other.header {
            return Err(Error::InvalidData(format!(
                "cannot concatenate tables with headers {:?} and {:?}",
                self.header, other.header
            )));
        }
        self.records.extend(other.records);
        Ok(())
    }

    /// Writes the header and the selected records to `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O or CSV error if the file cannot be written.
    pub fn write_subset<'a>(
        &self,
        path: &Path,
        records: impl IntoIterator<Item = &'a csv::StringRecord>,
    ) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&self.header)?;
        for record in records {
            writer.write_record(record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

use std::path::Path;

use super::Study;
use crate::table::{self, Row};

impl Study {
    /// Every recorded trial as a row, in recording order.
    ///
    /// Columns are `trial`, `state`, `value`, then parameters by name; see
    /// [`CompletedTrial::to_row`](crate::sampler::CompletedTrial::to_row).
    #[must_use]
    pub fn to_rows(&self) -> Vec<Row> {
        self.storage
            .trials_arc()
            .read()
            .iter()
            .map(crate::sampler::CompletedTrial::to_row)
            .collect()
    }

    /// Writes every recorded trial to a CSV file at `path`.
    ///
    /// The header is the union of all columns in first-seen order, so
    /// trials that never suggested a parameter leave its cell empty.
    ///
    /// # Errors
    ///
    /// Returns an I/O or CSV error if the file cannot be written.
    ///
    /// # Examples
    ///
    /// ```
    /// use vader_hpopt::{Direction, Study};
    ///
    /// let study = Study::new(Direction::Maximize);
    /// let mut trial = study.ask();
    /// trial.suggest_int("batch_size", 8, 64).unwrap();
    /// study.complete_trial(trial, Some(0.3));
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let path = dir.path().join("trials.csv");
    /// study.export_csv(&path).unwrap();
    /// let csv = std::fs::read_to_string(&path).unwrap();
    /// assert!(csv.starts_with("trial,state,value,batch_size"));
    /// ```
    pub fn export_csv(&self, path: impl AsRef<Path>) -> crate::Result<()> {
        let rows = self.to_rows();
        let header = union_header(&rows);
        table::write_table(path.as_ref(), &header, &rows)
    }
}

/// Union of the rows' columns in first-seen order.
pub(crate) fn union_header(rows: &[Row]) -> Vec<String> {
    let mut header: Vec<String> = Vec::new();
    for row in rows {
        for column in row.columns() {
            if !header.iter().any(|h| h == column) {
                header.push(column.to_string());
            }
        }
    }
    header
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Cell;
    use crate::{Direction, Study};

    #[test]
    fn header_is_union_in_first_seen_order() {
        let rows = vec![
            Row::new().with("a", Cell::Int(1)).with("c", Cell::Int(2)),
            Row::new().with("b", Cell::Int(1)).with("a", Cell::Int(3)),
        ];
        assert_eq!(union_header(&rows), ["a", "c", "b"]);
    }

    #[test]
    fn failed_trials_have_empty_values() {
        let study = Study::new(Direction::Minimize);
        let trial = study.ask();
        study.fail_trial(trial, "broken");
        let rows = study.to_rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("state"), Some(&Cell::Text("Failed".to_string())));
        assert_eq!(rows[0].get("value"), Some(&Cell::Empty));
    }
}

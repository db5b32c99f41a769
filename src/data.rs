//! Input tensors: samples × time points × features, plus an optional 0/1 mask.

use std::path::Path;

use ndarray::{Array3, Axis};

use crate::error::{Error, Result};

/// A dataset of multivariate time series with an optional weight mask.
///
/// The mask marks observed (`1`) versus missing (`0`) entries. A present mask
/// always has the same shape as the data; an empty mask is normalised to
/// "no mask". Neither tensor is ever mutated after construction.
#[derive(Clone, Debug)]
pub struct Dataset {
    data: Array3<f64>,
    weights: Option<Array3<f64>>,
}

impl Dataset {
    /// Creates a dataset, validating the mask against the data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyDataset`] if any axis of `data` has length zero,
    /// [`Error::ShapeMismatch`] if a non-empty mask differs in shape and
    /// [`Error::InvalidWeights`] if the mask holds values other than 0 or 1.
    pub fn new(data: Array3<f64>, weights: Option<Array3<f64>>) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::EmptyDataset);
        }
        let weights = weights.filter(|w| !w.is_empty());
        if let Some(w) = &weights {
            if w.shape() != data.shape() {
                return Err(Error::ShapeMismatch {
                    data: data.shape().to_vec(),
                    weights: w.shape().to_vec(),
                });
            }
            if let Some(&bad) = w.iter().find(|&&v| v != 0.0 && v != 1.0) {
                return Err(Error::InvalidWeights(bad));
            }
        }
        Ok(Self { data, weights })
    }

    /// Creates a dataset where every entry counts as observed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyDataset`] if `data` is empty.
    pub fn unweighted(data: Array3<f64>) -> Result<Self> {
        Self::new(data, None)
    }

    /// Builds data and mask from a tensor that encodes missing values as NaN.
    ///
    /// NaN entries become `0.0` in the data and `0` in the mask.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyDataset`] if `raw` is empty.
    pub fn from_nan_tensor(raw: &Array3<f64>) -> Result<Self> {
        let weights = raw.mapv(|v| if v.is_nan() { 0.0 } else { 1.0 });
        let data = raw.mapv(|v| if v.is_nan() { 0.0 } else { v });
        Self::new(data, Some(weights))
    }

    /// Reads a flat CSV file: one row per sample, `n_time_points × n_features`
    /// values per row in time-major order.
    ///
    /// Empty cells, `NA` and `nan` (any case) mark missing values.
    ///
    /// # Errors
    ///
    /// Returns an I/O or CSV error if the file cannot be read, and
    /// [`Error::InvalidData`] if rows are ragged, a cell is not a number or the
    /// row width is not a multiple of `n_time_points`.
    pub fn read_flat_csv(
        path: impl AsRef<Path>,
        n_time_points: usize,
        has_header: bool,
    ) -> Result<Self> {
        if n_time_points == 0 {
            return Err(Error::InvalidData("n_time_points must be positive".into()));
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(has_header)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let mut values: Vec<f64> = Vec::new();
        let mut width = None;
        let mut n_samples = 0;
        for (line, record) in reader.records().enumerate() {
            let record = record?;
            let row_width = *width.get_or_insert(record.len());
            if record.len() != row_width {
                return Err(Error::InvalidData(format!(
                    "row {line} has {} values, expected {row_width}",
                    record.len()
                )));
            }
            for cell in &record {
                values.push(parse_cell(cell).ok_or_else(|| {
                    Error::InvalidData(format!("row {line}: cannot parse '{cell}'"))
                })?);
            }
            n_samples += 1;
        }

        let width = width.ok_or(Error::EmptyDataset)?;
        if width % n_time_points != 0 {
            return Err(Error::InvalidData(format!(
                "row width {width} is not a multiple of {n_time_points} time points"
            )));
        }
        let raw = Array3::from_shape_vec((n_samples, n_time_points, width / n_time_points), values)
            .map_err(|e| Error::InvalidData(e.to_string()))?;
        Self::from_nan_tensor(&raw)
    }

    /// The data tensor.
    #[must_use]
    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }

    /// The weight mask, if any.
    #[must_use]
    pub fn weights(&self) -> Option<&Array3<f64>> {
        self.weights.as_ref()
    }

    /// Number of samples (first axis).
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    /// Number of time points per sample.
    #[must_use]
    pub fn n_time_points(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    /// Number of features per time point.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.data.len_of(Axis(2))
    }

    /// Copies the samples at `indices` (and their mask rows) into a new dataset.
    ///
    /// # Panics
    ///
    /// Panics if an index is out of bounds.
    #[must_use]
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            data: self.data.select(Axis(0), indices),
            weights: self.weights.as_ref().map(|w| w.select(Axis(0), indices)),
        }
    }
}

fn parse_cell(cell: &str) -> Option<f64> {
    if cell.is_empty() || cell.eq_ignore_ascii_case("na") || cell.eq_ignore_ascii_case("nan") {
        return Some(f64::NAN);
    }
    cell.parse().ok()
}

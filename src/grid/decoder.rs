//! The seam through which GRIB2 decoding is plugged in.
//!
//! This crate does not parse GRIB2 itself. Callers provide a [`GridDecoder`]
//! backed by whatever GRIB library they use (eccodes bindings, a subprocess, ...).

use crate::grid::error::GridForecastError;
use crate::types::location::LatLon;
use chrono::{DateTime, Utc};
use std::path::Path;

/// Index into a 2-D lat/lon grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridCell {
    pub row: usize,
    pub col: usize,
}

/// Coordinates of every cell of a grid, stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct LatLonGrid {
    pub rows: usize,
    pub cols: usize,
    pub latitudes: Vec<f64>,
    pub longitudes: Vec<f64>,
}

impl LatLonGrid {
    pub fn new(rows: usize, cols: usize, latitudes: Vec<f64>, longitudes: Vec<f64>) -> Self {
        Self {
            rows,
            cols,
            latitudes,
            longitudes,
        }
    }

    fn index(&self, cell: GridCell) -> Option<usize> {
        (cell.row < self.rows && cell.col < self.cols).then(|| cell.row * self.cols + cell.col)
    }

    pub fn lat_lon(&self, cell: GridCell) -> Option<LatLon> {
        let idx = self.index(cell)?;
        Some(LatLon(*self.latitudes.get(idx)?, *self.longitudes.get(idx)?))
    }
}

/// A single decoded field at a single valid time.
#[derive(Debug, Clone, PartialEq)]
pub struct GridMessage {
    /// Short field name, e.g. `aswdir_s`.
    pub short_name: String,
    pub valid_time: DateTime<Utc>,
    pub grid: LatLonGrid,
    /// Cell values, row-major, same layout as `grid`.
    pub values: Vec<f64>,
}

impl GridMessage {
    pub fn value_at(&self, cell: GridCell) -> Option<f64> {
        self.grid.index(cell).and_then(|idx| self.values.get(idx).copied())
    }
}

/// Decodes a decompressed GRIB2 file into its messages.
///
/// Called from a blocking task, so implementations may do synchronous I/O.
pub trait GridDecoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<Vec<GridMessage>, GridForecastError>;
}

use std::io::{BufRead, Write};

use serde::{Deserialize, Serialize};

use crate::cache::Artifact;
use crate::error::Result;
use crate::io::table::{read_table, write_table};

/// A point in frame coordinates: `x` is the column, `y` the row. Pixel
/// `(row, col)` has its centre at `(col, row)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SourcePosition {
    pub x: f64,
    pub y: f64,
}

impl SourcePosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &SourcePosition) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Sources found on a reference frame, in detection (raster) order.
#[derive(Clone, Debug, Default)]
pub struct SourceCatalog {
    pub positions: Vec<SourcePosition>,
    /// Sigma-clipped sky level of the frame.
    pub background: f64,
    /// Sigma-clipped sky noise of the frame.
    pub noise: f64,
    /// Matched-filter amplitude a peak had to exceed.
    pub threshold: f64,
}

impl SourceCatalog {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

impl Artifact for Vec<SourcePosition> {
    fn encode<W: Write>(&self, w: &mut W) -> Result<()> {
        write_table(w, Some("x y"), self.iter().map(|p| vec![p.x, p.y]))
    }

    fn decode<R: BufRead>(r: &mut R) -> Result<Self> {
        Ok(read_table(r, 2)?
            .into_iter()
            .map(|row| SourcePosition::new(row[0], row[1]))
            .collect())
    }
}

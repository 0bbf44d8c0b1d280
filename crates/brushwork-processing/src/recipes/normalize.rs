//! Centring and scaling with statistics frozen at fit time.

use crate::dataset::Frame;
use crate::error::Result;
use crate::stats;
use ndarray::Axis;
use serde::{Deserialize, Serialize};

/// Per-column mean and standard deviation learned from the fitting frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizeStats {
    pub names: Vec<String>,
    pub means: Vec<f64>,
    /// Zero deviations are stored as 1 so constant columns map to 0.
    pub sds: Vec<f64>,
}

impl NormalizeStats {
    pub fn fit(frame: &Frame) -> Self {
        let means = frame.values.axis_iter(Axis(1)).map(stats::mean).collect();
        let sds = frame
            .values
            .axis_iter(Axis(1))
            .map(|col| {
                let sd = stats::sd(col);
                if sd > 0.0 && sd.is_finite() { sd } else { 1.0 }
            })
            .collect();
        Self {
            names: frame.names.clone(),
            means,
            sds,
        }
    }

    /// Apply the frozen statistics; columns are matched by name.
    pub fn transform(&self, frame: &Frame) -> Result<Frame> {
        let mut out = frame.select(&self.names)?;
        for (j, mut col) in out.values.axis_iter_mut(Axis(1)).enumerate() {
            let (m, s) = (self.means[j], self.sds[j]);
            col.mapv_inplace(|v| (v - m) / s);
        }
        Ok(out)
    }
}

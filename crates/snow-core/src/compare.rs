//! Change in white-Christmas probability between two periods.
use serde::Serialize;

use crate::archive::YearRange;
use crate::error::SnowResult;
use crate::grid::Grid;
use crate::probability::{classify_probability, PeriodTally};

#[derive(Debug, Clone)]
pub struct PeriodComparison {
    pub period: YearRange,
    pub baseline: YearRange,
    /// Class index of `period` minus class index of `baseline` (-4..=4).
    pub class_shift: Grid,
    /// Change of the white-year share in percentage points.
    pub percent_change: Grid,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonSummary {
    pub period: String,
    pub baseline: String,
    pub compared_cells: usize,
    /// Cells that moved to a lower probability class.
    pub fewer_white: usize,
    pub unchanged: usize,
    /// Cells that moved to a higher probability class.
    pub more_white: usize,
    pub mean_class_shift: f64,
    pub mean_percent_change: f64,
}

/// Compare `period` against `baseline`. Cells missing in either are `NaN`.
pub fn compare_periods(period: &PeriodTally, baseline: &PeriodTally) -> SnowResult<PeriodComparison> {
    let later = classify_probability(period);
    let earlier = classify_probability(baseline);
    let class_shift = later.zip_map(&earlier, |a, b| a - b)?;
    let percent_change = period.fraction().zip_map(&baseline.fraction(), |a, b| (a - b) * 100.0)?;

    Ok(PeriodComparison { period: period.range, baseline: baseline.range, class_shift, percent_change })
}

impl PeriodComparison {
    pub fn summary(&self) -> ComparisonSummary {
        let shifts: Vec<f32> = self.class_shift.data.iter().copied().filter(|v| !v.is_nan()).collect();
        ComparisonSummary {
            period: self.period.to_string(),
            baseline: self.baseline.to_string(),
            compared_cells: shifts.len(),
            fewer_white: shifts.iter().filter(|&&s| s < 0.0).count(),
            unchanged: shifts.iter().filter(|&&s| s == 0.0).count(),
            more_white: shifts.iter().filter(|&&s| s > 0.0).count(),
            mean_class_shift: self.class_shift.valid_mean().unwrap_or(0.0),
            mean_percent_change: self.percent_change.valid_mean().unwrap_or(0.0),
        }
    }
}

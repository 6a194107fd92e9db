//! Aggregation of yearly white-Christmas grids into probability classes.
//!
//! Class edges follow the FMI Christmas-weather statistics map, stated on a
//! 10-year scale: fewer than 6 white Christmases in 10 years, 6–8.3, 8.3–9.3,
//! 9.3–9.7, and 9.7 or more.
use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::archive::YearRange;
use crate::christmas::{classify_christmas, ChristmasWindow, WhiteMethod, WHITE};
use crate::error::{SnowError, SnowResult};
use crate::geotiff::YearRaster;
use crate::grid::Grid;

#[cfg(feature = "threading")]
use rayon::prelude::*;

/// Class edges in white Christmases per 10 years.
pub const CLASS_EDGES: [f64; 6] = [0.0, 6.0, 8.3, 9.3, 9.7, 10.0];

/// One of the five fixed white-Christmas probability buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum ProbabilityClass {
    Unlikely,
    Possible,
    Likely,
    VeryLikely,
    AlmostCertain,
}

impl ProbabilityClass {
    pub const ALL: [ProbabilityClass; 5] = [
        ProbabilityClass::Unlikely,
        ProbabilityClass::Possible,
        ProbabilityClass::Likely,
        ProbabilityClass::VeryLikely,
        ProbabilityClass::AlmostCertain,
    ];

    /// Bucket a white-year fraction (0–1). A full 100 % lands in the top
    /// class. `None` for `NaN` or out-of-range input.
    pub fn from_fraction(fraction: f64) -> Option<Self> {
        if !(0.0..=1.0).contains(&fraction) {
            return None;
        }
        let per_ten = fraction * 10.0;
        let idx = CLASS_EDGES[1..5].iter().take_while(|&&edge| per_ten >= edge).count();
        Some(Self::ALL[idx])
    }

    /// 1-based class number stored in class grids.
    pub fn index(self) -> u8 {
        self as u8 + 1
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(usize::from(index).checked_sub(1)?).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            ProbabilityClass::Unlikely => "< 60 %",
            ProbabilityClass::Possible => "60-83 %",
            ProbabilityClass::Likely => "83-93 %",
            ProbabilityClass::VeryLikely => "93-97 %",
            ProbabilityClass::AlmostCertain => ">= 97 %",
        }
    }
}

/// Per-cell count of white Christmases over a period.
#[derive(Debug, Clone)]
pub struct PeriodTally {
    pub range: YearRange,
    /// White-year counts; `NaN` where any year lacked data.
    pub counts: Grid,
}

impl PeriodTally {
    /// White-year fraction per cell.
    pub fn fraction(&self) -> Grid {
        let n = self.range.year_count() as f32;
        self.counts.map(|c| c / n)
    }
}

fn classify_years(
    years: &[(i32, &YearRaster)],
    window: ChristmasWindow,
    snow_threshold: f32,
    method: WhiteMethod,
) -> SnowResult<Vec<Grid>> {
    let classify = |&(year, raster): &(i32, &YearRaster)| {
        debug!(year, "classifying Christmas");
        classify_christmas(raster, window, snow_threshold, method)
    };

    #[cfg(feature = "threading")]
    {
        years.par_iter().map(classify).collect()
    }
    #[cfg(not(feature = "threading"))]
    {
        years.iter().map(classify).collect()
    }
}

fn years_in_range(rasters: &BTreeMap<i32, YearRaster>, range: YearRange) -> SnowResult<Vec<(i32, &YearRaster)>> {
    range
        .years()
        .map(|y| rasters.get(&y).map(|r| (y, r)).ok_or(SnowError::MissingYear(y)))
        .collect()
}

/// Classify and count white Christmases over `range`. Every year of the
/// range must be present in `rasters`.
pub fn white_christmas_tally(
    rasters: &BTreeMap<i32, YearRaster>,
    range: YearRange,
    window: ChristmasWindow,
    snow_threshold: f32,
    method: WhiteMethod,
) -> SnowResult<PeriodTally> {
    let years = years_in_range(rasters, range)?;
    let classified = classify_years(&years, window, snow_threshold, method)?;

    let mut iter = classified.into_iter();
    let mut counts = iter.next().ok_or(SnowError::MissingYear(range.start()))?;
    for grid in iter {
        counts.add_assign(&grid)?;
    }

    info!(range = %range, ?method, snow_threshold, "tallied white Christmases");
    Ok(PeriodTally { range, counts })
}

/// Grid of `ProbabilityClass::index` values, `NaN` kept.
pub fn classify_probability(tally: &PeriodTally) -> Grid {
    tally.fraction().map(|f| match ProbabilityClass::from_fraction(f as f64) {
        Some(class) => f32::from(class.index()),
        None => f32::NAN,
    })
}

/// Share of valid cells in each class, in `ProbabilityClass::ALL` order.
pub fn class_shares(class_grid: &Grid) -> [f64; 5] {
    let mut counts = [0usize; 5];
    for &v in &class_grid.data {
        if v.is_nan() {
            continue;
        }
        if let Some(class) = ProbabilityClass::from_index(v as u8) {
            counts[class as usize] += 1;
        }
    }
    let total: usize = counts.iter().sum();
    let mut shares = [0.0; 5];
    if total > 0 {
        for (s, &c) in shares.iter_mut().zip(&counts) {
            *s = c as f64 / total as f64;
        }
    }
    shares
}

/// White-Christmas coverage of one year.
#[derive(Debug, Clone, Serialize)]
pub struct YearShare {
    pub year: i32,
    /// Fraction of valid cells classified white.
    pub white_share: f64,
    pub valid_cells: usize,
}

/// Per-year share of the country with a white Christmas, for every year in
/// `range` that has a raster.
pub fn yearly_white_share(
    rasters: &BTreeMap<i32, YearRaster>,
    range: YearRange,
    window: ChristmasWindow,
    snow_threshold: f32,
    method: WhiteMethod,
) -> SnowResult<Vec<YearShare>> {
    let years: Vec<(i32, &YearRaster)> =
        rasters.range(range.start()..=range.end()).map(|(&y, r)| (y, r)).collect();
    let classified = classify_years(&years, window, snow_threshold, method)?;

    Ok(years
        .iter()
        .zip(classified)
        .map(|(&(year, _), grid)| {
            let valid_cells = grid.valid_count();
            let white = grid.data.iter().filter(|&&v| v == WHITE).count();
            let white_share = if valid_cells == 0 { 0.0 } else { white as f64 / valid_cells as f64 };
            YearShare { year, white_share, valid_cells }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::geotiff::test_support::christmas_year;

    fn rasters(range: YearRange, depth: impl Fn(i32) -> Vec<f32>) -> BTreeMap<i32, YearRaster> {
        range
            .years()
            .map(|y| {
                let d = depth(y);
                (y, christmas_year(365, &d, &d, &d))
            })
            .collect()
    }

    #[test]
    fn class_edges() {
        use ProbabilityClass::*;
        let cases = [
            (0.0, Unlikely),
            (0.59, Unlikely),
            (0.6, Possible),
            (25.0 / 30.0, Likely),
            (0.93, VeryLikely),
            (29.0 / 30.0, VeryLikely),
            (0.97, AlmostCertain),
            (1.0, AlmostCertain),
        ];
        for (f, expected) in cases {
            assert_eq!(ProbabilityClass::from_fraction(f), Some(expected), "fraction {f}");
        }
        assert_eq!(ProbabilityClass::from_fraction(f64::NAN), None);
        assert_eq!(ProbabilityClass::from_fraction(1.5), None);
    }

    #[test]
    fn index_roundtrip() {
        for class in ProbabilityClass::ALL {
            assert_eq!(ProbabilityClass::from_index(class.index()), Some(class));
        }
        assert_eq!(ProbabilityClass::from_index(0), None);
        assert_eq!(ProbabilityClass::from_index(6), None);
    }

    #[test]
    fn tally_counts_white_years_and_keeps_nan() {
        let range = YearRange::new(1991, 2000).unwrap();
        // Cell 0 white every year, cell 1 white in even years, cell 2 missing in 1995.
        let r = rasters(range, |y| {
            let c2 = if y == 1995 { f32::NAN } else { 10.0 };
            vec![10.0, if y % 2 == 0 { 5.0 } else { 0.0 }, c2]
        });
        let tally = white_christmas_tally(&r, range, ChristmasWindow::default(), 1.0, WhiteMethod::Average).unwrap();
        assert_eq!(tally.counts.get(0, 0), 10.0);
        assert_eq!(tally.counts.get(0, 1), 5.0);
        assert!(tally.counts.get(0, 2).is_nan());

        let frac = tally.fraction();
        assert_relative_eq!(frac.get(0, 1), 0.5);

        let classes = classify_probability(&tally);
        assert_eq!(classes.get(0, 0), f32::from(ProbabilityClass::AlmostCertain.index()));
        assert_eq!(classes.get(0, 1), f32::from(ProbabilityClass::Unlikely.index()));
        assert!(classes.get(0, 2).is_nan());

        let shares = class_shares(&classes);
        assert_relative_eq!(shares[0], 0.5);
        assert_relative_eq!(shares[4], 0.5);
    }

    #[test]
    fn tally_requires_every_year() {
        let range = YearRange::new(1991, 1993).unwrap();
        let mut r = rasters(range, |_| vec![1.0]);
        r.remove(&1992);
        let err = white_christmas_tally(&r, range, ChristmasWindow::default(), 1.0, WhiteMethod::Average).unwrap_err();
        assert!(matches!(err, SnowError::MissingYear(1992)));
    }

    #[test]
    fn yearly_share_uses_available_years() {
        let range = YearRange::new(1961, 1964).unwrap();
        let mut r = rasters(range, |y| if y < 1963 { vec![5.0, 0.0] } else { vec![5.0, 5.0] });
        r.remove(&1962);
        let shares = yearly_white_share(&r, range, ChristmasWindow::default(), 1.0, WhiteMethod::Average).unwrap();
        let years: Vec<i32> = shares.iter().map(|s| s.year).collect();
        assert_eq!(years, vec![1961, 1963, 1964]);
        assert_relative_eq!(shares[0].white_share, 0.5);
        assert_relative_eq!(shares[2].white_share, 1.0);
        assert_eq!(shares[0].valid_cells, 2);
    }
}

//! Loading a run of yearly snow rasters from a data directory.
//!
//! The FMI download unpacks to one `snow_{year}.tif` per year.
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::christmas::ChristmasWindow;
use crate::error::{SnowError, SnowResult};
use crate::geotiff::{read_year_raster, YearRaster};

/// First year of the FMI daily snow-depth series.
pub const FIRST_YEAR: i32 = 1961;

/// Current WMO climate normal period.
pub const NORMAL_1991_2020: YearRange = YearRange { start: 1991, end: 2020 };
/// First full normal period of the FMI series.
pub const NORMAL_1961_1990: YearRange = YearRange { start: 1961, end: 1990 };

/// An inclusive, validated interval of years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "(i32, i32)", into = "(i32, i32)")]
pub struct YearRange {
    start: i32,
    end: i32,
}

impl YearRange {
    pub fn new(start: i32, end: i32) -> SnowResult<Self> {
        if start < FIRST_YEAR || end < start {
            return Err(SnowError::InvalidYearRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> i32 {
        self.start
    }

    pub fn end(&self) -> i32 {
        self.end
    }

    pub fn year_count(&self) -> usize {
        (self.end - self.start + 1) as usize
    }

    pub fn years(&self) -> impl Iterator<Item = i32> {
        self.start..=self.end
    }

    pub fn contains(&self, year: i32) -> bool {
        (self.start..=self.end).contains(&year)
    }

    /// The smallest range covering both.
    pub fn union(&self, other: &YearRange) -> YearRange {
        YearRange { start: self.start.min(other.start), end: self.end.max(other.end) }
    }
}

impl TryFrom<(i32, i32)> for YearRange {
    type Error = SnowError;

    fn try_from((start, end): (i32, i32)) -> SnowResult<Self> {
        YearRange::new(start, end)
    }
}

impl From<YearRange> for (i32, i32) {
    fn from(r: YearRange) -> Self {
        (r.start, r.end)
    }
}

impl fmt::Display for YearRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Parses `1991-2020` or a single year `1991`.
impl FromStr for YearRange {
    type Err = SnowError;

    fn from_str(s: &str) -> SnowResult<Self> {
        let bad = || SnowError::Config(format!("cannot parse year range '{s}', expected START-END"));
        let (a, b) = match s.trim().split_once('-') {
            Some((a, b)) => (a, b),
            None => (s, s),
        };
        let start = a.trim().parse().map_err(|_| bad())?;
        let end = b.trim().parse().map_err(|_| bad())?;
        YearRange::new(start, end)
    }
}

pub fn year_raster_path(raster_dir: &Path, year: i32) -> PathBuf {
    raster_dir.join(format!("snow_{year}.tif"))
}

pub fn open_year_raster(raster_dir: &Path, year: i32) -> SnowResult<YearRaster> {
    read_year_raster(&year_raster_path(raster_dir, year))
}

/// Open every available year in `range`, keyed by year.
///
/// A year that cannot be read is left out of the map. With `missing_data`
/// set, gaps are expected and only logged at debug level.
pub fn open_snow_rasters(raster_dir: &Path, range: YearRange, missing_data: bool) -> BTreeMap<i32, YearRaster> {
    open_years(raster_dir, range, missing_data, None)
}

/// Like [`open_snow_rasters`], but keeps only the bands from the start of
/// `window` to the end of each year. A 60-year comparison would otherwise
/// hold every day of every year in memory.
pub fn open_christmas_rasters(
    raster_dir: &Path,
    range: YearRange,
    window: ChristmasWindow,
    missing_data: bool,
) -> BTreeMap<i32, YearRaster> {
    let keep = window.days_before_year_end().max().unwrap_or(0);
    open_years(raster_dir, range, missing_data, Some(keep))
}

fn open_years(raster_dir: &Path, range: YearRange, missing_data: bool, keep_last: Option<usize>) -> BTreeMap<i32, YearRaster> {
    let mut rasters = BTreeMap::new();

    for year in range.years() {
        match open_year_raster(raster_dir, year) {
            Ok(mut r) => {
                if let Some(n) = keep_last {
                    r.keep_last_days(n);
                }
                rasters.insert(year, r);
            }
            Err(e) if missing_data => debug!(year, error = %e, "snow raster unavailable"),
            Err(e) => warn!(year, error = %e, "failed to open snow raster"),
        }
    }

    info!(
        dir = %raster_dir.display(),
        range = %range,
        loaded = rasters.len(),
        expected = range.year_count(),
        "opened snow rasters"
    );
    rasters
}

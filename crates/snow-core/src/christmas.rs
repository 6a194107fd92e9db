//! Christmas-window averaging and white-day classification.
//!
//! Days are addressed from the end of the year so that leap years need no
//! special case: December 24th is always the 8th band from the end.
use serde::{Deserialize, Serialize};

use crate::error::{SnowError, SnowResult};
use crate::geotiff::YearRaster;
use crate::grid::Grid;

/// Default snow depth (cm) at which a day counts as white.
pub const DEFAULT_SNOW_THRESHOLD: f32 = 1.0;

/// Cell value for a white day / Christmas.
pub const WHITE: f32 = 1.0;
/// Cell value for a day without (enough) snow.
pub const NOT_WHITE: f32 = 0.0;

/// Inclusive run of December days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChristmasWindow {
    pub first_day: u8,
    pub last_day: u8,
}

impl Default for ChristmasWindow {
    /// Christmas Eve through Boxing Day.
    fn default() -> Self {
        Self { first_day: 24, last_day: 26 }
    }
}

impl ChristmasWindow {
    pub fn new(first_day: u8, last_day: u8) -> SnowResult<Self> {
        let w = Self { first_day, last_day };
        w.validate()?;
        Ok(w)
    }

    pub fn validate(&self) -> SnowResult<()> {
        if self.first_day == 0 || self.last_day > 31 || self.first_day > self.last_day {
            return Err(SnowError::InvalidWindow(format!(
                "December {}-{} is not a valid day range",
                self.first_day, self.last_day
            )));
        }
        Ok(())
    }

    pub fn day_count(&self) -> usize {
        (self.last_day - self.first_day + 1) as usize
    }

    /// Bands from the end of the year (`1` = December 31st), one per day.
    pub fn days_before_year_end(&self) -> impl Iterator<Item = usize> {
        (self.first_day..=self.last_day).map(|d| (32 - d) as usize)
    }

    fn day_grids<'a>(&self, year_raster: &'a YearRaster) -> SnowResult<Vec<&'a Grid>> {
        self.validate()?;
        self.days_before_year_end()
            .map(|back| {
                year_raster.band_from_end(back).ok_or_else(|| {
                    SnowError::InvalidWindow(format!(
                        "raster has {} bands, cannot reach {back} days before year end",
                        year_raster.band_count()
                    ))
                })
            })
            .collect()
    }
}

/// How a year's Christmas is judged white.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WhiteMethod {
    /// Mean depth over the window reaches the threshold.
    #[default]
    Average,
    /// Every day of the window reaches the threshold on its own.
    AllDays,
}

/// Mean snow depth over the window days; `NaN` in any day propagates.
pub fn christmas_average(year_raster: &YearRaster, window: ChristmasWindow) -> SnowResult<Grid> {
    let days = window.day_grids(year_raster)?;
    let mut sum = days[0].clone();
    for day in &days[1..] {
        sum.add_assign(day)?;
    }
    let n = days.len() as f32;
    Ok(sum.map(|v| v / n))
}

fn check_threshold(snow_threshold: f32) -> SnowResult<()> {
    if snow_threshold.is_nan() || snow_threshold <= 0.0 {
        return Err(SnowError::InvalidThreshold(snow_threshold));
    }
    Ok(())
}

/// Classify a day (or window average): `WHITE` where depth reaches
/// `snow_threshold` cm, `NOT_WHITE` below it, `NaN` kept.
pub fn classify_white_day(snow_day: &Grid, snow_threshold: f32) -> SnowResult<Grid> {
    check_threshold(snow_threshold)?;
    Ok(snow_day.map(|v| {
        if v.is_nan() {
            f32::NAN
        } else if v >= snow_threshold {
            WHITE
        } else {
            NOT_WHITE
        }
    }))
}

/// `WHITE` only where each window day is white on its own.
pub fn classify_all_white(year_raster: &YearRaster, window: ChristmasWindow, snow_threshold: f32) -> SnowResult<Grid> {
    check_threshold(snow_threshold)?;
    let days = window.day_grids(year_raster)?;
    let mut all = classify_white_day(days[0], snow_threshold)?;
    for day in &days[1..] {
        let white = classify_white_day(day, snow_threshold)?;
        all = all.zip_map(&white, |a, b| a * b)?;
    }
    Ok(all)
}

/// One year's white-Christmas grid under the chosen method.
pub fn classify_christmas(
    year_raster: &YearRaster,
    window: ChristmasWindow,
    snow_threshold: f32,
    method: WhiteMethod,
) -> SnowResult<Grid> {
    match method {
        WhiteMethod::Average => classify_white_day(&christmas_average(year_raster, window)?, snow_threshold),
        WhiteMethod::AllDays => classify_all_white(year_raster, window, snow_threshold),
    }
}

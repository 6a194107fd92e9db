//! White-Christmas analysis over the FMI daily snow-depth grids.
//!
//! Pipeline: load yearly rasters ([`archive`], [`geotiff`]) → Christmas
//! window average and white/non-white classification ([`christmas`]) →
//! per-period tally and probability classes ([`probability`]) → period
//! comparison ([`compare`]). [`projection`] and [`regions`] support map
//! output.

pub mod archive;
pub mod christmas;
pub mod compare;
pub mod config;
pub mod error;
pub mod geotiff;
pub mod grid;
pub mod probability;
pub mod projection;
pub mod regions;

pub use archive::{open_snow_rasters, YearRange};
pub use christmas::{ChristmasWindow, WhiteMethod};
pub use config::AnalysisConfig;
pub use error::{SnowError, SnowResult};
pub use grid::{GeoTransform, Grid};
pub use probability::{PeriodTally, ProbabilityClass};

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::archive::{YearRange, NORMAL_1961_1990, NORMAL_1991_2020};
use crate::christmas::{ChristmasWindow, WhiteMethod, DEFAULT_SNOW_THRESHOLD};
use crate::error::{SnowError, SnowResult};

/// Analysis settings. Every field has a default, so a config file only
/// needs the keys it changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Directory holding `snow_{year}.tif`.
    pub data_dir: PathBuf,
    /// GeoJSON region outlines; no overlay when absent.
    pub regions: Option<PathBuf>,
    pub output_dir: PathBuf,
    /// Snow depth (cm) at which a Christmas counts as white.
    pub snow_threshold: f32,
    pub window: ChristmasWindow,
    pub method: WhiteMethod,
    /// Main climate normal period.
    pub period: YearRange,
    /// Reference period the main period is compared against.
    pub baseline: YearRange,
    /// Tolerate missing yearly files while loading.
    pub missing_data: bool,
    /// Draw maps in Web Mercator instead of the native grid.
    pub reproject: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/snow"),
            regions: None,
            output_dir: PathBuf::from("output"),
            snow_threshold: DEFAULT_SNOW_THRESHOLD,
            window: ChristmasWindow::default(),
            method: WhiteMethod::Average,
            period: NORMAL_1991_2020,
            baseline: NORMAL_1961_1990,
            missing_data: false,
            reproject: true,
        }
    }
}

impl AnalysisConfig {
    pub fn from_json(text: &str) -> SnowResult<Self> {
        let cfg: Self = serde_json::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> SnowResult<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> SnowResult<()> {
        if self.snow_threshold.is_nan() || self.snow_threshold <= 0.0 {
            return Err(SnowError::InvalidThreshold(self.snow_threshold));
        }
        self.window.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_fmi_normals() {
        let cfg = AnalysisConfig::default();
        assert_eq!(cfg.period.to_string(), "1991-2020");
        assert_eq!(cfg.baseline.to_string(), "1961-1990");
        assert_eq!(cfg.snow_threshold, 1.0);
        assert_eq!(cfg.window, ChristmasWindow::default());
        cfg.validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = AnalysisConfig::from_json(r#"{ "snow_threshold": 5, "method": "all-days", "period": [1981, 2010] }"#).unwrap();
        assert_eq!(cfg.snow_threshold, 5.0);
        assert_eq!(cfg.method, WhiteMethod::AllDays);
        assert_eq!(cfg.period, YearRange::new(1981, 2010).unwrap());
        assert_eq!(cfg.baseline, YearRange::new(1961, 1990).unwrap());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(AnalysisConfig::from_json(r#"{ "snow_threshold": 0 }"#).is_err());
        assert!(AnalysisConfig::from_json(r#"{ "period": [1950, 1980] }"#).is_err());
        assert!(AnalysisConfig::from_json(r#"{ "window": { "first_day": 27, "last_day": 24 } }"#).is_err());
        assert!(AnalysisConfig::from_json(r#"{ "unknown": true }"#).is_err());
    }
}

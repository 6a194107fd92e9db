//! Error type shared by every snow-core module.

use std::path::PathBuf;

use thiserror::Error;

pub type SnowResult<T> = Result<T, SnowError>;

#[derive(Debug, Error)]
pub enum SnowError {
    #[error("start year {start} and end year {end} do not form a valid interval (need {min} <= start <= end)", min = crate::archive::FIRST_YEAR)]
    InvalidYearRange { start: i32, end: i32 },

    #[error("snow threshold must be bigger than 0, got {0}")]
    InvalidThreshold(f32),

    #[error("invalid Christmas window: {0}")]
    InvalidWindow(String),

    #[error("no snow raster loaded for year {0}")]
    MissingYear(i32),

    #[error("grid shape mismatch: {left_w}x{left_h} vs {right_w}x{right_h}")]
    ShapeMismatch {
        left_w: usize,
        left_h: usize,
        right_w: usize,
        right_h: usize,
    },

    #[error("{path}: {message}")]
    Raster { path: PathBuf, message: String },

    #[error("invalid regions file: {0}")]
    Regions(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Tiff(#[from] tiff::TiffError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SnowError {
    pub(crate) fn raster(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        SnowError::Raster { path: path.into(), message: message.into() }
    }
}

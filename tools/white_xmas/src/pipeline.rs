//! The four map/summary products, each a straight run through snow-core.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use snow_core::archive::{open_christmas_rasters, open_year_raster};
use snow_core::christmas::{classify_christmas, ChristmasWindow, WhiteMethod, WHITE};
use snow_core::compare::{compare_periods, ComparisonSummary};
use snow_core::grid::Grid;
use snow_core::probability::{
    class_shares, classify_probability, white_christmas_tally, yearly_white_share, PeriodTally, ProbabilityClass,
    YearShare,
};
use snow_core::projection::{reproject_to_web_mercator, Identity, MapProjection, Tm35FinToWebMercator};
use snow_core::regions::{load_regions, Region};
use snow_core::{AnalysisConfig, YearRange};
use tracing::info;

use crate::render::{
    draw_region_outlines, render_classes, save_png, with_legend, ClassPalette, CLASS_SHIFT, DEFAULT_CELL_PIXELS,
    PROBABILITY, WHITE_DAY,
};

// ── Output schema ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ClassShare {
    pub class: ProbabilityClass,
    pub label: &'static str,
    pub share: f64,
}

#[derive(Debug, Serialize)]
pub struct ProbabilitySummary {
    pub title: String,
    pub period: String,
    pub years: usize,
    pub snow_threshold: f32,
    pub method: WhiteMethod,
    pub window: ChristmasWindow,
    pub valid_cells: usize,
    pub classes: Vec<ClassShare>,
    pub map: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct CompareSummary {
    pub period: ProbabilitySummary,
    pub baseline: ProbabilitySummary,
    pub change: ComparisonSummary,
    pub change_map: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct YearSummary {
    pub title: String,
    pub year: i32,
    pub snow_threshold: f32,
    pub method: WhiteMethod,
    pub white_share: f64,
    pub valid_cells: usize,
    pub map: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct YearlySummary {
    pub period: String,
    pub snow_threshold: f32,
    pub method: WhiteMethod,
    pub years: Vec<YearShare>,
}

// ── Map drawing ──────────────────────────────────────────────────────────────

/// Everything a map needs besides the grid itself.
pub struct MapStyle {
    regions: Vec<Region>,
    reproject: bool,
    cell_pixels: u32,
}

impl MapStyle {
    pub fn from_config(cfg: &AnalysisConfig) -> Result<Self> {
        let regions = match &cfg.regions {
            Some(path) => load_regions(path).with_context(|| format!("Cannot read regions {}", path.display()))?,
            None => Vec::new(),
        };
        Ok(Self { regions, reproject: cfg.reproject, cell_pixels: DEFAULT_CELL_PIXELS })
    }

    pub fn draw(&self, grid: &Grid, palette: &ClassPalette, path: &Path) -> Result<()> {
        let (grid, projection): (Cow<'_, Grid>, Box<dyn MapProjection>) = if self.reproject {
            (Cow::Owned(reproject_to_web_mercator(grid)), Box::new(Tm35FinToWebMercator::default()))
        } else {
            (Cow::Borrowed(grid), Box::new(Identity))
        };

        let mut img = render_classes(&grid, palette, self.cell_pixels);
        draw_region_outlines(&mut img, &grid.transform, self.cell_pixels, &self.regions, projection.as_ref());
        save_png(&with_legend(&img, palette), path)?;
        info!(path = %path.display(), "wrote map");
        Ok(())
    }
}

fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("Write failed: {}", path.display()))?;
    info!(path = %path.display(), "wrote summary");
    Ok(())
}

fn prepare_output(cfg: &AnalysisConfig) -> Result<()> {
    fs::create_dir_all(&cfg.output_dir)
        .with_context(|| format!("Cannot create output directory {}", cfg.output_dir.display()))
}

// ── Products ─────────────────────────────────────────────────────────────────

fn probability_product(cfg: &AnalysisConfig, style: &MapStyle, tally: &PeriodTally) -> Result<ProbabilitySummary> {
    let classes = classify_probability(tally);
    let map = cfg.output_dir.join(format!("probability_{}.png", tally.range));
    style.draw(&classes, &PROBABILITY, &map)?;

    let shares = class_shares(&classes);
    Ok(ProbabilitySummary {
        title: format!("Probability of White Christmas in Finland {}", tally.range),
        period: tally.range.to_string(),
        years: tally.range.year_count(),
        snow_threshold: cfg.snow_threshold,
        method: cfg.method,
        window: cfg.window,
        valid_cells: classes.valid_count(),
        classes: ProbabilityClass::ALL
            .iter()
            .zip(shares)
            .map(|(&class, share)| ClassShare { class, label: class.label(), share })
            .collect(),
        map,
    })
}

/// Probability map for one period.
pub fn run_probability(cfg: &AnalysisConfig, period: YearRange) -> Result<ProbabilitySummary> {
    prepare_output(cfg)?;
    let style = MapStyle::from_config(cfg)?;
    let rasters = open_christmas_rasters(&cfg.data_dir, period, cfg.window, cfg.missing_data);
    let tally = white_christmas_tally(&rasters, period, cfg.window, cfg.snow_threshold, cfg.method)
        .with_context(|| format!("Cannot tally white Christmases for {period}"))?;

    let summary = probability_product(cfg, &style, &tally)?;
    write_json(&summary, &cfg.output_dir.join(format!("probability_{period}.json")))?;
    Ok(summary)
}

/// Probability maps for both periods plus the class-shift map between them.
pub fn run_compare(cfg: &AnalysisConfig, period: YearRange, baseline: YearRange) -> Result<CompareSummary> {
    prepare_output(cfg)?;
    let style = MapStyle::from_config(cfg)?;
    let rasters = open_christmas_rasters(&cfg.data_dir, period.union(&baseline), cfg.window, cfg.missing_data);

    let tally = |range: YearRange| {
        white_christmas_tally(&rasters, range, cfg.window, cfg.snow_threshold, cfg.method)
            .with_context(|| format!("Cannot tally white Christmases for {range}"))
    };
    let later = tally(period)?;
    let earlier = tally(baseline)?;

    let period_summary = probability_product(cfg, &style, &later)?;
    let baseline_summary = probability_product(cfg, &style, &earlier)?;

    let comparison = compare_periods(&later, &earlier).context("Cannot compare periods")?;
    let change_map = cfg.output_dir.join(format!("change_{period}_vs_{baseline}.png"));
    style.draw(&comparison.class_shift, &CLASS_SHIFT, &change_map)?;

    let summary = CompareSummary {
        period: period_summary,
        baseline: baseline_summary,
        change: comparison.summary(),
        change_map,
    };
    write_json(&summary, &cfg.output_dir.join(format!("compare_{period}_vs_{baseline}.json")))?;
    Ok(summary)
}

/// White / no-snow map of a single Christmas.
pub fn run_year(cfg: &AnalysisConfig, year: i32) -> Result<YearSummary> {
    YearRange::new(year, year)?;
    prepare_output(cfg)?;
    let style = MapStyle::from_config(cfg)?;

    let raster = open_year_raster(&cfg.data_dir, year)
        .with_context(|| format!("Cannot open snow raster for {year} in {}", cfg.data_dir.display()))?;
    let white = classify_christmas(&raster, cfg.window, cfg.snow_threshold, cfg.method)?;

    let map = cfg.output_dir.join(format!("white_christmas_{year}.png"));
    style.draw(&white, &WHITE_DAY, &map)?;

    let valid_cells = white.valid_count();
    let white_cells = white.data.iter().filter(|&&v| v == WHITE).count();
    let summary = YearSummary {
        title: format!("White Christmas {year}"),
        year,
        snow_threshold: cfg.snow_threshold,
        method: cfg.method,
        white_share: if valid_cells == 0 { 0.0 } else { white_cells as f64 / valid_cells as f64 },
        valid_cells,
        map,
    };
    write_json(&summary, &cfg.output_dir.join(format!("white_christmas_{year}.json")))?;
    Ok(summary)
}

/// Share of Finland with a white Christmas, year by year.
pub fn run_yearly(cfg: &AnalysisConfig, period: YearRange) -> Result<YearlySummary> {
    prepare_output(cfg)?;
    let rasters = open_christmas_rasters(&cfg.data_dir, period, cfg.window, cfg.missing_data);
    let years = yearly_white_share(&rasters, period, cfg.window, cfg.snow_threshold, cfg.method)?;

    let summary = YearlySummary {
        period: period.to_string(),
        snow_threshold: cfg.snow_threshold,
        method: cfg.method,
        years,
    };
    write_json(&summary, &cfg.output_dir.join(format!("yearly_{period}.json")))?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::fs::File;

    use snow_core::archive::year_raster_path;
    use tiff::encoder::{colortype, TiffEncoder};
    use tiff::tags::Tag;

    use super::*;

    const W: usize = 4;
    const H: usize = 3;

    /// Write a 365-page year where every day has `depth(cell)` cm.
    fn write_year(dir: &Path, year: i32, depth: impl Fn(usize) -> f32) {
        let file = File::create(year_raster_path(dir, year)).unwrap();
        let mut encoder = TiffEncoder::new(file).unwrap();
        let band: Vec<f32> = (0..W * H).map(depth).collect();
        for _ in 0..365 {
            let mut image = encoder.new_image::<colortype::Gray32Float>(W as u32, H as u32).unwrap();
            image.encoder().write_tag(Tag::from_u16_exhaustive(33550), &[10_000.0f64, 10_000.0, 0.0][..]).unwrap();
            image
                .encoder()
                .write_tag(Tag::from_u16_exhaustive(33922), &[0.0f64, 0.0, 0.0, 400_000.0, 7_100_000.0, 0.0][..])
                .unwrap();
            image.write_data(&band).unwrap();
        }
    }

    fn config(data: &Path, out: &Path) -> AnalysisConfig {
        AnalysisConfig {
            data_dir: data.to_path_buf(),
            output_dir: out.to_path_buf(),
            reproject: false,
            ..AnalysisConfig::default()
        }
    }

    #[test]
    fn probability_run_writes_map_and_summary() {
        let data = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let period = YearRange::new(2001, 2010).unwrap();
        // Cells 0-5 white every year, cells 6-11 white in 2001-2005 only.
        for year in period.years() {
            write_year(data.path(), year, |c| if c < 6 || year <= 2005 { 10.0 } else { 0.0 });
        }

        let summary = run_probability(&config(data.path(), out.path()), period).unwrap();
        assert_eq!(summary.years, 10);
        assert_eq!(summary.valid_cells, W * H);
        assert_eq!(summary.classes[0].share, 0.5);
        assert_eq!(summary.classes[4].share, 0.5);
        assert!(summary.map.exists());
        assert!(out.path().join("probability_2001-2010.json").exists());
    }

    #[test]
    fn compare_run_writes_three_maps() {
        let data = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let baseline = YearRange::new(1961, 1962).unwrap();
        let period = YearRange::new(1991, 1992).unwrap();
        for year in baseline.years() {
            write_year(data.path(), year, |_| 20.0);
        }
        for year in period.years() {
            write_year(data.path(), year, |c| if c % 2 == 0 { 20.0 } else { 0.0 });
        }

        let mut cfg = config(data.path(), out.path());
        cfg.missing_data = true;
        let summary = run_compare(&cfg, period, baseline).unwrap();
        assert_eq!(summary.change.compared_cells, W * H);
        assert_eq!(summary.change.fewer_white, W * H / 2);
        assert_eq!(summary.change.unchanged, W * H / 2);
        assert!(summary.period.map.exists());
        assert!(summary.baseline.map.exists());
        assert!(summary.change_map.exists());
    }

    #[test]
    fn year_run_reports_white_share() {
        let data = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_year(data.path(), 2010, |c| if c < 3 { 0.5 } else { 4.0 });

        let summary = run_year(&config(data.path(), out.path()), 2010).unwrap();
        assert_eq!(summary.white_share, 0.75);
        assert!(summary.map.exists());
    }

    #[test]
    fn year_before_series_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run_year(&config(dir.path(), dir.path()), 1950).is_err());
    }

    #[test]
    fn missing_year_fails_tally() {
        let data = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_year(data.path(), 2001, |_| 5.0);
        let mut cfg = config(data.path(), out.path());
        cfg.missing_data = true;
        assert!(run_probability(&cfg, YearRange::new(2001, 2002).unwrap()).is_err());

        let yearly = run_yearly(&cfg, YearRange::new(2001, 2002).unwrap()).unwrap();
        assert_eq!(yearly.years.len(), 1);
        assert_eq!(yearly.years[0].white_share, 1.0);
    }

    #[test]
    fn reprojected_map_with_regions() {
        let data = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        write_year(data.path(), 2000, |_| 5.0);
        let regions = out.path().join("regions.geojson");
        fs::write(
            &regions,
            r#"{"type":"FeatureCollection","features":[{"type":"Feature","properties":{"nimi":"Keski-Suomi"},
               "geometry":{"type":"Polygon","coordinates":[[[405000,7095000],[435000,7095000],[435000,7075000],[405000,7095000]]]}}]}"#,
        )
        .unwrap();

        let mut cfg = config(data.path(), out.path());
        cfg.reproject = true;
        cfg.regions = Some(regions);
        let summary = run_year(&cfg, 2000).unwrap();
        assert!(summary.map.exists());
        assert_eq!(summary.white_share, 1.0);
    }
}

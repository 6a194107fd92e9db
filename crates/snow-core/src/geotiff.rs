//! FMI daily snow-depth GeoTIFF reader.
//!
//! One file holds one calendar year: a band per day (365 or 366), 10 km
//! cells on the ETRS-TM35FIN grid, depth in centimetres. GDAL writes the
//! bands as a single multi-sample image; files that went through other
//! tooling sometimes carry one page per day instead. Both layouts decode
//! to the same `YearRaster`.
use std::fs;
use std::io::{self, Seek};
use std::path::Path;

use tiff::decoder::{ChunkType, Decoder, DecodingResult};
use tiff::tags::Tag;
use tracing::{debug, warn};

use crate::error::{SnowError, SnowResult};
use crate::grid::{GeoTransform, Grid};

/// EPSG code of ETRS89 / TM35FIN(E,N), the CRS of every FMI grid product.
pub const ETRS_TM35FIN: u32 = 3067;

// GeoTIFF / GDAL private tags.
const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GDAL_NODATA: u16 = 42113;

const PLANAR_SEPARATE: u16 = 2;

/// All daily bands of one year.
#[derive(Debug, Clone)]
pub struct YearRaster {
    /// One grid per day, January 1st first.
    pub bands: Vec<Grid>,
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    pub epsg: u32,
}

impl YearRaster {
    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Band counted back from December 31st (`1` = last day of the year).
    pub fn band_from_end(&self, days_before_end: usize) -> Option<&Grid> {
        if days_before_end == 0 || days_before_end > self.bands.len() {
            return None;
        }
        self.bands.get(self.bands.len() - days_before_end)
    }

    /// Drop all but the last `n` days. Indexing with `band_from_end` is
    /// unaffected for the days kept.
    pub fn keep_last_days(&mut self, n: usize) {
        let drop = self.bands.len().saturating_sub(n);
        self.bands.drain(..drop);
    }
}

/// Geo-referencing and nodata read from the first IFD.
struct RasterMeta {
    transform: GeoTransform,
    nodata: Option<f32>,
}

fn find_geo_tag<R: io::Read + Seek>(decoder: &mut Decoder<R>, tag: u16) -> SnowResult<Option<Vec<f64>>> {
    match decoder.find_tag(Tag::from_u16_exhaustive(tag))? {
        Some(v) => Ok(Some(v.into_f64_vec()?)),
        None => Ok(None),
    }
}

fn read_meta<R: io::Read + Seek>(decoder: &mut Decoder<R>, path: &Path) -> SnowResult<RasterMeta> {
    let scale = find_geo_tag(decoder, MODEL_PIXEL_SCALE)?;
    let tiepoint = find_geo_tag(decoder, MODEL_TIEPOINT)?;

    let transform = match (scale, tiepoint) {
        (Some(s), Some(t)) if s.len() >= 2 && t.len() >= 6 => {
            // Tiepoint maps raster (i, j) to model (x, y).
            GeoTransform::new(t[3] - t[0] * s[0], t[4] + t[1] * s[1], s[0], s[1])
        }
        _ => {
            warn!(path = %path.display(), "raster has no GeoTIFF placement, using unit transform");
            GeoTransform::unit()
        }
    };

    let nodata = match decoder.find_tag(Tag::from_u16_exhaustive(GDAL_NODATA))? {
        Some(v) => {
            let text = v.into_string()?;
            let text = text.trim_matches(char::from(0)).trim();
            match text.parse::<f32>() {
                Ok(n) => Some(n),
                Err(_) => {
                    warn!(path = %path.display(), nodata = text, "unparseable nodata value ignored");
                    None
                }
            }
        }
        None => None,
    };

    Ok(RasterMeta { transform, nodata })
}

fn samples_to_f32(result: DecodingResult) -> Option<Vec<f32>> {
    let v = match result {
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|x| x as f32).collect(),
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        _ => return None,
    };
    Some(v)
}

fn mask_nodata(samples: &mut [f32], nodata: Option<f32>) {
    if let Some(nd) = nodata {
        for s in samples.iter_mut() {
            if *s == nd {
                *s = f32::NAN;
            }
        }
    }
}

/// Split a decoded multi-sample buffer into one plane per band.
fn split_bands(samples: Vec<f32>, n_pixels: usize, n_bands: usize, planar: bool) -> Vec<Vec<f32>> {
    if n_bands == 1 {
        return vec![samples];
    }
    if planar {
        return samples.chunks_exact(n_pixels).map(|c| c.to_vec()).collect();
    }
    let mut out = vec![Vec::with_capacity(n_pixels); n_bands];
    for pixel in samples.chunks_exact(n_bands) {
        for (band, &v) in out.iter_mut().zip(pixel) {
            band.push(v);
        }
    }
    out
}

/// All planes of a planar image, back to back. `read_image` stops after
/// the first plane; strips are stored band by band, so index order is
/// band order.
fn read_planes<R: io::Read + Seek>(decoder: &mut Decoder<R>, path: &Path) -> SnowResult<Vec<f32>> {
    if decoder.get_chunk_type() != ChunkType::Strip {
        return Err(SnowError::raster(path, "tiled planar images are not supported"));
    }
    let mut samples = Vec::new();
    for strip in 0..decoder.strip_count()? {
        let chunk = samples_to_f32(decoder.read_chunk(strip)?)
            .ok_or_else(|| SnowError::raster(path, "unsupported sample type"))?;
        samples.extend(chunk);
    }
    Ok(samples)
}

fn decode_image<R: io::Read + Seek>(decoder: &mut Decoder<R>, path: &Path) -> SnowResult<(usize, usize, Vec<Vec<f32>>)> {
    let (w, h) = decoder.dimensions()?;
    let (width, height) = (w as usize, h as usize);
    if width == 0 || height == 0 {
        return Err(SnowError::raster(path, "zero-sized image"));
    }

    let n_bands = match decoder.find_tag(Tag::SamplesPerPixel)? {
        Some(v) => v.into_u16()? as usize,
        None => 1,
    };
    let planar = match decoder.find_tag(Tag::PlanarConfiguration)? {
        Some(v) => v.into_u16()? == PLANAR_SEPARATE,
        None => false,
    };

    let samples = if planar && n_bands > 1 {
        read_planes(decoder, path)?
    } else {
        samples_to_f32(decoder.read_image()?).ok_or_else(|| SnowError::raster(path, "unsupported sample type"))?
    };
    let n_pixels = width * height;
    if samples.len() != n_pixels * n_bands.max(1) {
        return Err(SnowError::raster(
            path,
            format!("expected {} samples, decoded {}", n_pixels * n_bands.max(1), samples.len()),
        ));
    }

    Ok((width, height, split_bands(samples, n_pixels, n_bands.max(1), planar)))
}

/// Decode a year of daily snow depth from any seekable reader.
pub fn decode_year_raster<R: io::Read + Seek>(reader: R, path: &Path) -> SnowResult<YearRaster> {
    let mut decoder = Decoder::new(reader)?;
    let meta = read_meta(&mut decoder, path)?;

    let (width, height, mut planes) = decode_image(&mut decoder, path)?;
    while decoder.more_images() {
        decoder.next_image()?;
        let (w, h, more) = decode_image(&mut decoder, path)?;
        if (w, h) != (width, height) {
            return Err(SnowError::raster(
                path,
                format!("page size {w}x{h} differs from first page {width}x{height}"),
            ));
        }
        planes.extend(more);
    }

    let bands = planes
        .into_iter()
        .map(|mut data| {
            mask_nodata(&mut data, meta.nodata);
            Grid { data, width, height, transform: meta.transform }
        })
        .collect::<Vec<_>>();

    debug!(path = %path.display(), width, height, bands = bands.len(), "decoded snow raster");

    Ok(YearRaster { bands, width, height, transform: meta.transform, epsg: ETRS_TM35FIN })
}

/// Open one FMI snow-depth GeoTIFF. The CRS is always stamped as
/// ETRS-TM35FIN; the FMI files do not carry reliable GeoKeys.
pub fn read_year_raster(path: &Path) -> SnowResult<YearRaster> {
    let file = fs::File::open(path)?;
    decode_year_raster(io::BufReader::new(file), path)
}


#[cfg(test)]
mod tests {
    use super::test_support::{write_multisample, write_pages};
    use super::*;

    /// Ten bands on a 3×2 grid: band `b` holds `100 b + pixel`, with the
    /// first pixel of the last band set to nodata.
    fn ten_bands() -> Vec<Vec<f32>> {
        let mut bands: Vec<Vec<f32>> = (0..10).map(|b| (0..6).map(|p| (100 * b + p) as f32).collect()).collect();
        bands[9][0] = -9999.0;
        bands
    }

    fn assert_ten_bands(raster: &YearRaster, t: GeoTransform) {
        assert_eq!(raster.band_count(), 10);
        assert_eq!((raster.width, raster.height), (3, 2));
        assert_eq!(raster.transform, t);
        assert_eq!(raster.bands[3].data, vec![300.0, 301.0, 302.0, 303.0, 304.0, 305.0]);
        assert_eq!(raster.bands[0].get(1, 2), 5.0);
        let last = raster.band_from_end(1).unwrap();
        assert!(last.get(0, 0).is_nan(), "nodata sample should be masked");
        assert_eq!(last.get(0, 1), 901.0);
    }

    #[test]
    fn reads_pixel_interleaved_multisample() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snow_2001.tif");
        let t = GeoTransform::new(60_000.0, 7_800_000.0, 10_000.0, 10_000.0);
        write_multisample(&path, 3, 2, t, Some(-9999.0), &ten_bands(), false);

        assert_ten_bands(&read_year_raster(&path).unwrap(), t);
    }

    #[test]
    fn reads_planar_multisample() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snow_2002.tif");
        let t = GeoTransform::new(60_000.0, 7_800_000.0, 10_000.0, 10_000.0);
        write_multisample(&path, 3, 2, t, Some(-9999.0), &ten_bands(), true);

        assert_ten_bands(&read_year_raster(&path).unwrap(), t);
    }

    #[test]
    fn split_bands_pixel_interleaved() {
        // 2 pixels × 3 bands, interleaved: p0b0 p0b1 p0b2 p1b0 p1b1 p1b2
        let samples = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let bands = split_bands(samples, 2, 3, false);
        assert_eq!(bands, vec![vec![1.0, 4.0], vec![2.0, 5.0], vec![3.0, 6.0]]);
    }

    #[test]
    fn split_bands_planar() {
        let samples = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let bands = split_bands(samples, 2, 3, true);
        assert_eq!(bands, vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]);
    }

    #[test]
    fn reads_pages_placement_and_nodata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snow_2000.tif");
        let t = GeoTransform::new(60_000.0, 7_800_000.0, 10_000.0, 10_000.0);
        let bands = vec![vec![1.0, -1.0, 3.0, 4.0, 5.0, 6.0], vec![7.0; 6], vec![0.0; 6]];
        write_pages(&path, 3, 2, t, Some(-1.0), &bands);

        let raster = read_year_raster(&path).unwrap();
        assert_eq!(raster.band_count(), 3);
        assert_eq!((raster.width, raster.height), (3, 2));
        assert_eq!(raster.transform, t);
        assert_eq!(raster.epsg, ETRS_TM35FIN);

        let first = &raster.bands[0];
        assert_eq!(first.get(0, 0), 1.0);
        assert!(first.get(0, 1).is_nan(), "nodata sample should be masked");
        assert_eq!(first.get(1, 2), 6.0);
        assert_eq!(raster.band_from_end(1).unwrap().get(0, 0), 0.0);
        assert!(raster.band_from_end(4).is_none());
    }

    #[test]
    fn keep_last_days_preserves_indexing_from_end() {
        let y = test_support::christmas_year(366, &[1.0], &[2.0], &[3.0]);
        let mut trimmed = y.clone();
        trimmed.keep_last_days(8);
        assert_eq!(trimmed.band_count(), 8);
        for back in 1..=8 {
            assert_eq!(trimmed.band_from_end(back).unwrap().data, y.band_from_end(back).unwrap().data);
        }
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_year_raster(Path::new("/nonexistent/snow_1961.tif")).unwrap_err();
        assert!(matches!(err, SnowError::Io(_)));
    }
}

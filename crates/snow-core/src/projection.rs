//! ETRS-TM35FIN (EPSG:3067) and Web Mercator (EPSG:3857).
//!
//! The transverse Mercator uses the Krüger series to third order in the
//! third flattening `n`, good to well under a millimetre within the zone.
//! Maps are drawn in Web Mercator, which is what the FMI reference map and
//! most basemaps use.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

use crate::grid::{GeoTransform, Grid};

/// GRS80 semi-major axis (metres).
const GRS80_A: f64 = 6_378_137.0;
/// GRS80 inverse flattening.
const GRS80_INV_F: f64 = 298.257_222_101;

/// Web Mercator sphere radius (metres).
const WEB_MERCATOR_R: f64 = 6_378_137.0;
/// Web Mercator latitude limit (degrees).
const WEB_MERCATOR_MAX_LAT: f64 = 85.051_128_779_806_59;

/// Transverse Mercator on an ellipsoid.
#[derive(Debug, Clone)]
pub struct TransverseMercator {
    /// Central meridian in radians.
    lon0: f64,
    k0: f64,
    false_easting: f64,
    false_northing: f64,
    /// Rectifying radius.
    big_a: f64,
    /// First eccentricity.
    e: f64,
    alpha: [f64; 3],
    beta: [f64; 3],
    delta: [f64; 3],
}

impl TransverseMercator {
    pub fn new(a: f64, inv_f: f64, lon0_deg: f64, k0: f64, false_easting: f64, false_northing: f64) -> Self {
        let f = 1.0 / inv_f;
        let n = f / (2.0 - f);
        let (n2, n3) = (n * n, n * n * n);

        let big_a = a / (1.0 + n) * (1.0 + n2 / 4.0 + n2 * n2 / 64.0);
        let e = 2.0 * n.sqrt() / (1.0 + n);

        Self {
            lon0: lon0_deg.to_radians(),
            k0,
            false_easting,
            false_northing,
            big_a,
            e,
            alpha: [
                n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0,
                13.0 * n2 / 48.0 - 3.0 * n3 / 5.0,
                61.0 * n3 / 240.0,
            ],
            beta: [
                n / 2.0 - 2.0 * n2 / 3.0 + 37.0 * n3 / 96.0,
                n2 / 48.0 + n3 / 15.0,
                17.0 * n3 / 480.0,
            ],
            delta: [
                2.0 * n - 2.0 * n2 / 3.0 - 2.0 * n3,
                7.0 * n2 / 3.0 - 8.0 * n3 / 5.0,
                56.0 * n3 / 15.0,
            ],
        }
    }

    /// EPSG:3067, ETRS89 / TM35FIN(E,N).
    pub fn tm35fin() -> Self {
        Self::new(GRS80_A, GRS80_INV_F, 27.0, 0.9996, 500_000.0, 0.0)
    }

    /// Geographic (degrees) to projected (easting, northing) metres.
    pub fn forward(&self, lat_deg: f64, lon_deg: f64) -> (f64, f64) {
        let phi = lat_deg.to_radians();
        let dlon = lon_deg.to_radians() - self.lon0;

        let t = (phi.sin().atanh() - self.e * (self.e * phi.sin()).atanh()).sinh();
        let xi_p = t.atan2(dlon.cos());
        let eta_p = (dlon.sin() / (1.0 + t * t).sqrt()).atanh();

        let mut xi = xi_p;
        let mut eta = eta_p;
        for (j, a) in self.alpha.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            xi += a * (k * xi_p).sin() * (k * eta_p).cosh();
            eta += a * (k * xi_p).cos() * (k * eta_p).sinh();
        }

        (
            self.false_easting + self.k0 * self.big_a * eta,
            self.false_northing + self.k0 * self.big_a * xi,
        )
    }

    /// Projected (easting, northing) metres to geographic (lat, lon) degrees.
    pub fn inverse(&self, easting: f64, northing: f64) -> (f64, f64) {
        let xi = (northing - self.false_northing) / (self.k0 * self.big_a);
        let eta = (easting - self.false_easting) / (self.k0 * self.big_a);

        let mut xi_p = xi;
        let mut eta_p = eta;
        for (j, b) in self.beta.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            xi_p -= b * (k * xi).sin() * (k * eta).cosh();
            eta_p -= b * (k * xi).cos() * (k * eta).sinh();
        }

        let chi = (xi_p.sin() / eta_p.cosh()).asin();
        let mut phi = chi;
        for (j, d) in self.delta.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            phi += d * (k * chi).sin();
        }
        let lon = self.lon0 + eta_p.sinh().atan2(xi_p.cos());

        (phi.to_degrees(), lon.to_degrees())
    }
}

/// Geographic (degrees) to Web Mercator metres.
pub fn web_mercator_forward(lat_deg: f64, lon_deg: f64) -> (f64, f64) {
    let lat = lat_deg.clamp(-WEB_MERCATOR_MAX_LAT, WEB_MERCATOR_MAX_LAT).to_radians();
    (WEB_MERCATOR_R * lon_deg.to_radians(), WEB_MERCATOR_R * (FRAC_PI_4 + lat / 2.0).tan().ln())
}

/// Web Mercator metres to geographic (lat, lon) degrees.
pub fn web_mercator_inverse(x: f64, y: f64) -> (f64, f64) {
    let lat = 2.0 * (y / WEB_MERCATOR_R).exp().atan() - FRAC_PI_2;
    (lat.to_degrees(), (x / WEB_MERCATOR_R).to_degrees())
}

/// Maps projected source coordinates onto the coordinates a rendered grid
/// is placed in.
pub trait MapProjection {
    fn project(&self, x: f64, y: f64) -> (f64, f64);
}

/// Keeps EPSG:3067 coordinates as they are.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl MapProjection for Identity {
    fn project(&self, x: f64, y: f64) -> (f64, f64) {
        (x, y)
    }
}

/// EPSG:3067 to EPSG:3857.
#[derive(Debug, Clone)]
pub struct Tm35FinToWebMercator {
    tm: TransverseMercator,
}

impl Default for Tm35FinToWebMercator {
    fn default() -> Self {
        Self { tm: TransverseMercator::tm35fin() }
    }
}

impl MapProjection for Tm35FinToWebMercator {
    fn project(&self, x: f64, y: f64) -> (f64, f64) {
        let (lat, lon) = self.tm.inverse(x, y);
        web_mercator_forward(lat, lon)
    }
}

/// Resample an EPSG:3067 grid onto a north-up Web Mercator grid by nearest
/// neighbour. Pixels are square; the longer side keeps the source pixel
/// count. Cells outside the source stay `NaN`.
pub fn reproject_to_web_mercator(grid: &Grid) -> Grid {
    let tm = TransverseMercator::tm35fin();
    let to_merc = Tm35FinToWebMercator { tm: tm.clone() };

    // Bounds from the projected outline; edges curve, so sample along them.
    let (min_x, min_y, max_x, max_y) = grid.bounds();
    let steps = 32;
    let mut bx = (f64::INFINITY, f64::NEG_INFINITY);
    let mut by = (f64::INFINITY, f64::NEG_INFINITY);
    for i in 0..=steps {
        let f = i as f64 / steps as f64;
        let x = min_x + f * (max_x - min_x);
        let y = min_y + f * (max_y - min_y);
        for (px, py) in [(x, min_y), (x, max_y), (min_x, y), (max_x, y)] {
            let (mx, my) = to_merc.project(px, py);
            bx = (bx.0.min(mx), bx.1.max(mx));
            by = (by.0.min(my), by.1.max(my));
        }
    }

    let pixel = ((bx.1 - bx.0) / grid.width as f64).max((by.1 - by.0) / grid.height as f64);
    let out_w = ((bx.1 - bx.0) / pixel).ceil().max(1.0) as usize;
    let out_h = ((by.1 - by.0) / pixel).ceil().max(1.0) as usize;
    let transform = GeoTransform::new(bx.0, by.1, pixel, pixel);
    let mut out = Grid::new(out_w, out_h, transform, f32::NAN);

    for r in 0..out_h {
        for c in 0..out_w {
            let (mx, my) = transform.pixel_center(r, c);
            let (lat, lon) = web_mercator_inverse(mx, my);
            let (e, n) = tm.forward(lat, lon);
            let (sr, sc) = grid.transform.pixel_at(e, n);
            if sr < 0.0 || sc < 0.0 {
                continue;
            }
            let (sr, sc) = (sr as usize, sc as usize);
            if sr < grid.height && sc < grid.width {
                out.set(r, c, grid.get(sr, sc));
            }
        }
    }
    out
}

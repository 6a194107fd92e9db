//! Region outlines for map overlays.
//!
//! Regions are read from a GeoJSON FeatureCollection in EPSG:3067, e.g. the
//! Statistics Finland regions layer after `ogr2ogr -f GeoJSON`.
use std::fs;
use std::path::Path;

use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::{SnowError, SnowResult};

/// Property keys tried, in order, for a region's display name.
const NAME_KEYS: [&str; 4] = ["name", "namn", "nimi", "NAMEFIN"];

#[derive(Debug, Clone)]
pub struct Region {
    pub name: String,
    pub geometry: MultiPolygon<f64>,
}

impl Region {
    /// Every exterior and interior ring of the region.
    pub fn rings(&self) -> impl Iterator<Item = &LineString<f64>> {
        self.geometry.0.iter().flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors()))
    }
}

// ── GeoJSON schema ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct FeatureCollectionDef {
    features: Vec<FeatureDef>,
}

#[derive(Deserialize)]
struct FeatureDef {
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    geometry: Option<GeometryDef>,
}

type Ring = Vec<Vec<f64>>;

#[derive(Deserialize)]
#[serde(tag = "type")]
enum GeometryDef {
    Polygon { coordinates: Vec<Ring> },
    MultiPolygon { coordinates: Vec<Vec<Ring>> },
    #[serde(other)]
    Unsupported,
}

fn ring(points: &Ring) -> SnowResult<LineString<f64>> {
    points
        .iter()
        .map(|p| match p.as_slice() {
            [x, y, ..] => Ok(Coord { x: *x, y: *y }),
            _ => Err(SnowError::Regions(format!("position with {} values", p.len()))),
        })
        .collect::<SnowResult<Vec<_>>>()
        .map(LineString::new)
}

fn polygon(rings: &[Ring]) -> SnowResult<Option<Polygon<f64>>> {
    let Some((exterior, interiors)) = rings.split_first() else {
        return Ok(None);
    };
    let interiors = interiors.iter().map(ring).collect::<SnowResult<Vec<_>>>()?;
    Ok(Some(Polygon::new(ring(exterior)?, interiors)))
}

fn feature_name(properties: Option<&Map<String, Value>>, index: usize) -> String {
    properties
        .and_then(|props| NAME_KEYS.iter().find_map(|k| props.get(*k)))
        .and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| format!("region {index}"))
}

/// Parse a GeoJSON FeatureCollection into regions. Features without polygon
/// geometry are skipped.
pub fn parse_regions(text: &str) -> SnowResult<Vec<Region>> {
    let collection: FeatureCollectionDef = serde_json::from_str(text)?;
    let mut regions = Vec::with_capacity(collection.features.len());

    for (index, feature) in collection.features.iter().enumerate() {
        let name = feature_name(feature.properties.as_ref(), index);
        let polygons = match &feature.geometry {
            Some(GeometryDef::Polygon { coordinates }) => polygon(coordinates)?.into_iter().collect(),
            Some(GeometryDef::MultiPolygon { coordinates }) => coordinates
                .iter()
                .map(|p| polygon(p))
                .collect::<SnowResult<Vec<_>>>()?
                .into_iter()
                .flatten()
                .collect(),
            Some(GeometryDef::Unsupported) | None => {
                warn!(region = %name, "skipping feature without polygon geometry");
                continue;
            }
        };
        regions.push(Region { name, geometry: MultiPolygon::new(polygons) });
    }
    Ok(regions)
}

pub fn load_regions(path: &Path) -> SnowResult<Vec<Region>> {
    let text = fs::read_to_string(path)?;
    let regions = parse_regions(&text)?;
    info!(path = %path.display(), count = regions.len(), "loaded regions");
    Ok(regions)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "nimi": "Lappi" },
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [
                        [[0, 0], [10, 0], [10, 10], [0, 10], [0, 0]],
                        [[2, 2], [3, 2], [3, 3], [2, 2]]
                    ]
                }
            },
            {
                "type": "Feature",
                "properties": { "name": "Ahvenanmaa" },
                "geometry": {
                    "type": "MultiPolygon",
                    "coordinates": [
                        [[[0, 0, 5], [1, 0, 5], [1, 1, 5], [0, 0, 5]]],
                        [[[4, 4], [5, 4], [5, 5], [4, 4]]]
                    ]
                }
            },
            {
                "type": "Feature",
                "properties": {},
                "geometry": { "type": "Point", "coordinates": [1, 2] }
            },
            { "type": "Feature", "properties": null, "geometry": null }
        ]
    }"#;

    #[test]
    fn parses_polygons_and_skips_other_geometry() {
        let regions = parse_regions(SAMPLE).unwrap();
        assert_eq!(regions.len(), 2);

        assert_eq!(regions[0].name, "Lappi");
        assert_eq!(regions[0].geometry.0.len(), 1);
        assert_eq!(regions[0].rings().count(), 2);

        assert_eq!(regions[1].name, "Ahvenanmaa");
        assert_eq!(regions[1].geometry.0.len(), 2);
        let first = regions[1].geometry.0[0].exterior();
        assert_eq!(first.0[1], Coord { x: 1.0, y: 0.0 });
    }

    #[test]
    fn unnamed_features_fall_back_to_index() {
        let text = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","properties":{"id":7},"geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[0,1],[0,0]]]}}
        ]}"#;
        assert_eq!(parse_regions(text).unwrap()[0].name, "region 0");
    }

    #[test]
    fn bad_position_is_an_error() {
        let text = r#"{"type":"FeatureCollection","features":[
            {"type":"Feature","geometry":{"type":"Polygon","coordinates":[[[0],[1,0],[0,1]]]}}
        ]}"#;
        assert!(matches!(parse_regions(text), Err(SnowError::Regions(_))));
    }
}

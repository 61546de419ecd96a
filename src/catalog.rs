//! In-memory POI catalog.
//!
//! Loaded once from the POI table and read-only afterwards. Name lookups
//! fall back to fixed defaults; the tagged [`Lookup`] variants expose whether
//! the fallback was used.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::LoadError;
use crate::geo::Coordinate;

/// Category label for office buildings.
pub const OFFICE_TYPE: &str = "写字楼";
/// Category label for shopping malls.
pub const MALL_TYPE: &str = "商场";
/// Category label for residential compounds.
pub const RESIDENTIAL_TYPE: &str = "住宅区";
/// Bucket for names absent from the catalog.
pub const OTHER_TYPE: &str = "其他";

/// Location reported for names absent from the catalog (central Beijing).
pub const FALLBACK_LOCATION: Coordinate = Coordinate::new(116.3, 40.1);

/// What to do with a row whose coordinate field does not parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedRowPolicy {
    /// Fail the whole load.
    #[default]
    Reject,
    /// Drop the row and keep loading.
    Skip,
}

/// A single point of interest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub poi_type: String,
    pub location: Coordinate,
    pub address: String,
    pub open_time: String,
}

/// A lookup result tagged with whether the default was substituted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lookup<T> {
    pub value: T,
    pub defaulted: bool,
}

impl<T> Lookup<T> {
    fn found(value: T) -> Self {
        Self { value, defaulted: false }
    }

    fn fallback(value: T) -> Self {
        Self { value, defaulted: true }
    }
}

#[derive(Debug, Deserialize)]
struct PoiRow {
    name: String,
    #[serde(rename = "type")]
    poi_type: String,
    location: String,
    #[serde(default)]
    address: String,
    #[serde(default)]
    open_time: String,
}

/// Points of interest indexed by name, in file order.
#[derive(Debug, Clone, Default)]
pub struct PoiCatalog {
    records: Vec<PoiRecord>,
    // Last row wins for repeated names.
    by_name: HashMap<String, usize>,
}

impl PoiCatalog {
    pub fn new(records: Vec<PoiRecord>) -> Self {
        let by_name = records
            .iter()
            .enumerate()
            .map(|(index, record)| (record.name.clone(), index))
            .collect();
        Self { records, by_name }
    }

    pub fn from_csv_path(path: impl AsRef<Path>, policy: MalformedRowPolicy) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let catalog = Self::from_reader(File::open(path)?, policy)?;
        tracing::info!(path = %path.display(), pois = catalog.len(), "loaded POI catalog");
        Ok(catalog)
    }

    /// Reads `name,type,location,address,open_time` rows.
    ///
    /// Rows repeating an earlier `(name, location)` pair are dropped.
    pub fn from_reader<R: io::Read>(reader: R, policy: MalformedRowPolicy) -> Result<Self, LoadError> {
        let mut records = Vec::new();
        let mut seen = HashSet::new();

        for (index, row) in csv::Reader::from_reader(reader).deserialize().enumerate() {
            let row: PoiRow = row?;
            // Header is line 1.
            let line = index + 2;
            let location = match row.location.parse::<Coordinate>() {
                Ok(location) => location,
                Err(source) => match policy {
                    MalformedRowPolicy::Reject => return Err(LoadError::Coordinate { row: line, source }),
                    MalformedRowPolicy::Skip => {
                        tracing::warn!(row = line, poi = %row.name, error = %source, "skipping POI row");
                        continue;
                    }
                },
            };

            if !seen.insert((row.name.clone(), location.lon.to_bits(), location.lat.to_bits())) {
                tracing::debug!(row = line, poi = %row.name, "dropping duplicate POI row");
                continue;
            }

            records.push(PoiRecord {
                name: row.name,
                poi_type: row.poi_type,
                location,
                address: row.address,
                open_time: row.open_time,
            });
        }

        Ok(Self::new(records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[PoiRecord] {
        &self.records
    }

    pub fn get(&self, name: &str) -> Option<&PoiRecord> {
        self.by_name.get(name).map(|&index| &self.records[index])
    }

    pub fn type_lookup(&self, name: &str) -> Lookup<&str> {
        match self.get(name) {
            Some(record) => Lookup::found(record.poi_type.as_str()),
            None => {
                tracing::debug!(poi = name, "unknown POI name, defaulting type to {}", OTHER_TYPE);
                Lookup::fallback(OTHER_TYPE)
            }
        }
    }

    pub fn location_lookup(&self, name: &str) -> Lookup<Coordinate> {
        match self.get(name) {
            Some(record) => Lookup::found(record.location),
            None => {
                tracing::debug!(poi = name, "unknown POI name, defaulting location to {}", FALLBACK_LOCATION);
                Lookup::fallback(FALLBACK_LOCATION)
            }
        }
    }

    /// Category of `name`, or [`OTHER_TYPE`] if unknown.
    pub fn type_of(&self, name: &str) -> &str {
        self.type_lookup(name).value
    }

    /// Location of `name`, or [`FALLBACK_LOCATION`] if unknown.
    pub fn location_of(&self, name: &str) -> Coordinate {
        self.location_lookup(name).value
    }

    /// POIs within `radius_km` of `origin`, in catalog order.
    pub fn nearby(&self, origin: Coordinate, radius_km: f64) -> Vec<&PoiRecord> {
        let found: Vec<&PoiRecord> = self
            .records
            .iter()
            .filter(|record| origin.distance_km(&record.location) <= radius_km)
            .collect();
        tracing::info!(origin = %origin, radius_km, found = found.len(), "nearby POI query");
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
name,type,location,address,open_time
国贸大厦,写字楼,\"116.461,39.909\",建国门外大街1号,
三里屯太古里,商场,\"116.455,39.935\",三里屯路19号,10:00-22:00
国贸大厦,写字楼,\"116.461,39.909\",建国门外大街1号,
国贸大厦,商场,\"116.462,39.910\",建国门外大街1号B座,
";

    #[test]
    fn test_load_drops_exact_duplicates() {
        let catalog = PoiCatalog::from_reader(CSV.as_bytes(), MalformedRowPolicy::Reject).unwrap();
        assert_eq!(catalog.len(), 3, "duplicate (name, location) row should be dropped");
    }

    #[test]
    fn test_repeated_name_last_row_wins() {
        let catalog = PoiCatalog::from_reader(CSV.as_bytes(), MalformedRowPolicy::Reject).unwrap();
        assert_eq!(catalog.type_of("国贸大厦"), MALL_TYPE);
        assert_eq!(catalog.location_of("国贸大厦"), Coordinate::new(116.462, 39.910));
    }

    #[test]
    fn test_unknown_name_defaults() {
        let catalog = PoiCatalog::from_reader(CSV.as_bytes(), MalformedRowPolicy::Reject).unwrap();

        let kind = catalog.type_lookup("不存在的地方");
        assert_eq!(kind.value, OTHER_TYPE);
        assert!(kind.defaulted);

        let location = catalog.location_lookup("不存在的地方");
        assert_eq!(location.value, FALLBACK_LOCATION);
        assert!(location.defaulted);

        let known = catalog.type_lookup("三里屯太古里");
        assert_eq!(known.value, MALL_TYPE);
        assert!(!known.defaulted);
    }

    #[test]
    fn test_empty_open_time_is_kept() {
        let catalog = PoiCatalog::from_reader(CSV.as_bytes(), MalformedRowPolicy::Reject).unwrap();
        assert_eq!(catalog.records()[0].open_time, "");
        assert_eq!(catalog.get("三里屯太古里").unwrap().open_time, "10:00-22:00");
    }

    #[test]
    fn test_malformed_location_rejects_load() {
        let csv = "name,type,location,address,open_time\n坏点,商场,116.4,地址,\n";
        let err = PoiCatalog::from_reader(csv.as_bytes(), MalformedRowPolicy::Reject).unwrap_err();
        assert!(matches!(err, LoadError::Coordinate { row: 2, .. }), "got {:?}", err);
    }

    #[test]
    fn test_malformed_location_skipped_when_allowed() {
        let csv = "name,type,location,address,open_time\n坏点,商场,abc,地址,\n好点,商场,\"116.4,39.9\",地址,\n";
        let catalog = PoiCatalog::from_reader(csv.as_bytes(), MalformedRowPolicy::Skip).unwrap();
        assert_eq!(catalog.len(), 1);
        assert!(catalog.get("好点").is_some());
    }

    #[test]
    fn test_nearby_keeps_catalog_order() {
        let catalog = PoiCatalog::new(vec![
            record("far", 116.50, 39.92),
            record("near", 116.40, 39.90),
        ]);
        let origin = Coordinate::new(116.40, 39.90);
        let names: Vec<&str> = catalog.nearby(origin, 20.0).iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["far", "near"], "nearby must not sort by distance");
    }

    fn record(name: &str, lon: f64, lat: f64) -> PoiRecord {
        PoiRecord {
            name: name.to_string(),
            poi_type: OFFICE_TYPE.to_string(),
            location: Coordinate::new(lon, lat),
            address: String::new(),
            open_time: String::new(),
        }
    }
}

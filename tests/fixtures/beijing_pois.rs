//! Real Beijing POIs for test fixtures.
//!
//! Coordinates are (lon, lat) as published by the AMap place API.

use mobility_synth::catalog::PoiRecord;
use mobility_synth::geo::Coordinate;

/// A named POI with its category and coordinates.
#[derive(Debug, Clone)]
pub struct Place {
    pub name: &'static str,
    pub kind: &'static str,
    pub lon: f64,
    pub lat: f64,
}

impl Place {
    pub const fn new(name: &'static str, kind: &'static str, lon: f64, lat: f64) -> Self {
        Self { name, kind, lon, lat }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lon, self.lat)
    }

    pub fn record(&self) -> PoiRecord {
        PoiRecord {
            name: self.name.to_string(),
            poi_type: self.kind.to_string(),
            location: self.coordinate(),
            address: String::new(),
            open_time: String::new(),
        }
    }
}

/// Home location used by fixture residents, just north of Guomao.
pub const CBD_HOME: Coordinate = Coordinate::new(116.4600, 39.9200);

// ============================================================================
// Within 10 km of CBD_HOME
// ============================================================================

pub const CBD_PLACES: &[Place] = &[
    Place::new("国贸大厦", "写字楼", 116.4610, 39.9090),
    Place::new("三里屯太古里", "商场", 116.4550, 39.9350),
    Place::new("团结湖小区", "住宅区", 116.4700, 39.9330),
    Place::new("西单大悦城", "商场", 116.3730, 39.9100),
    Place::new("全聚德前门店", "餐馆", 116.3970, 39.8990),
];

// ============================================================================
// More than 10 km from CBD_HOME
// ============================================================================

pub const OUTER_PLACES: &[Place] = &[
    Place::new("中关村软件园", "写字楼", 116.2980, 40.0430),
    Place::new("天通苑", "住宅区", 116.4200, 40.0700),
    Place::new("北京大学", "学校", 116.3100, 39.9920),
];

pub fn all_places() -> Vec<Place> {
    let mut all = Vec::with_capacity(CBD_PLACES.len() + OUTER_PLACES.len());
    // Interleave so catalog order differs from distance order.
    all.push(OUTER_PLACES[0].clone());
    all.extend_from_slice(&CBD_PLACES[..3]);
    all.push(OUTER_PLACES[1].clone());
    all.extend_from_slice(&CBD_PLACES[3..]);
    all.push(OUTER_PLACES[2].clone());
    all
}

/// The fixture places rendered as a POI CSV document.
pub fn poi_csv() -> String {
    let mut csv = String::from("name,type,location,address,open_time\n");
    for place in all_places() {
        csv.push_str(&format!("{},{},\"{},{}\",,\n", place.name, place.kind, place.lon, place.lat));
    }
    csv
}

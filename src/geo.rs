//! Great-circle distance and coordinate parsing.
//!
//! Coordinates travel through the datasets as `"lon,lat"` strings. They are
//! validated once at the edge and carried as [`Coordinate`] afterwards.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoordinateError;

/// Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lon: f64,
    pub lat: f64,
}

impl Coordinate {
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Builds a coordinate, rejecting values outside the valid lon/lat range.
    pub fn checked(lon: f64, lat: f64) -> Result<Self, CoordinateError> {
        if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
            return Err(CoordinateError::OutOfRange { lon, lat });
        }
        Ok(Self { lon, lat })
    }

    /// Great-circle distance to `other` in kilometers.
    pub fn distance_km(&self, other: &Coordinate) -> f64 {
        distance_km(*self, *other)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lon, self.lat)
    }
}

impl FromStr for Coordinate {
    type Err = CoordinateError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = input.split(',').collect();
        if parts.len() != 2 {
            return Err(CoordinateError::FieldCount {
                input: input.to_string(),
                field_count: parts.len(),
            });
        }

        let parse = |component: &str| {
            component
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .ok_or_else(|| CoordinateError::NotNumeric {
                    input: input.to_string(),
                    component: component.to_string(),
                })
        };

        Coordinate::checked(parse(parts[0])?, parse(parts[1])?)
    }
}

/// Haversine distance between two coordinates in kilometers.
///
/// Not meaningful for out-of-range inputs; construct coordinates through
/// [`Coordinate::checked`] or [`FromStr`] to guarantee validity.
pub fn distance_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lon = (b.lon - a.lon).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

//! Polyline representation for route geometries.
//!
//! Geometries travel as decoded coordinate sequences inside the planner.
//! The compact encoded form (precision 5, as OSRM returns it) is handled only
//! at the boundary by [`Polyline::decode`] and [`Polyline::encode`]; it is
//! also the serialized form, so plans carry geometry the way OSRM does.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::GeoPoint;

const PRECISION: f64 = 1e5;

#[derive(Debug, Error)]
#[error("invalid encoded polyline")]
pub struct InvalidPolyline;

/// A polyline representing a route geometry as decoded coordinates.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Polyline {
    points: Vec<GeoPoint>,
}

impl Polyline {
    /// Creates a new Polyline from decoded coordinate points.
    pub fn new(points: Vec<GeoPoint>) -> Self {
        Self { points }
    }

    /// Returns a reference to the coordinate points.
    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    /// Consumes the polyline and returns the owned coordinate points.
    pub fn into_points(self) -> Vec<GeoPoint> {
        self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Decodes an encoded polyline string.
    ///
    /// Returns `None` when the string is truncated or contains characters
    /// outside the encoding alphabet.
    pub fn decode(encoded: &str) -> Option<Self> {
        let bytes = encoded.as_bytes();
        let mut index = 0;
        let mut lat: i64 = 0;
        let mut lng: i64 = 0;
        let mut points = Vec::new();

        while index < bytes.len() {
            lat += decode_value(bytes, &mut index)?;
            lng += decode_value(bytes, &mut index)?;
            points.push(GeoPoint::new(lat as f64 / PRECISION, lng as f64 / PRECISION));
        }

        Some(Self { points })
    }

    /// Encodes the points into the compact polyline format.
    pub fn encode(&self) -> String {
        let mut out = String::new();
        let mut prev_lat: i64 = 0;
        let mut prev_lng: i64 = 0;
        for point in &self.points {
            let lat = (point.latitude * PRECISION).round() as i64;
            let lng = (point.longitude * PRECISION).round() as i64;
            encode_value(lat - prev_lat, &mut out);
            encode_value(lng - prev_lng, &mut out);
            prev_lat = lat;
            prev_lng = lng;
        }
        out
    }
}

impl From<Polyline> for String {
    fn from(polyline: Polyline) -> Self {
        polyline.encode()
    }
}

impl TryFrom<String> for Polyline {
    type Error = InvalidPolyline;

    fn try_from(encoded: String) -> Result<Self, Self::Error> {
        Polyline::decode(&encoded).ok_or(InvalidPolyline)
    }
}

fn decode_value(bytes: &[u8], index: &mut usize) -> Option<i64> {
    let mut result: i64 = 0;
    let mut shift = 0;
    loop {
        let byte = *bytes.get(*index)?;
        *index += 1;
        if !(63..=126).contains(&byte) || shift > 60 {
            return None;
        }
        let chunk = i64::from(byte - 63);
        result |= (chunk & 0x1f) << shift;
        shift += 5;
        if chunk < 0x20 {
            break;
        }
    }
    Some(if result & 1 != 0 { !(result >> 1) } else { result >> 1 })
}

fn encode_value(value: i64, out: &mut String) {
    let mut v = if value < 0 { !(value << 1) } else { value << 1 };
    while v >= 0x20 {
        out.push(char::from((((v & 0x1f) | 0x20) + 63) as u8));
        v >>= 5;
    }
    out.push(char::from((v + 63) as u8));
}

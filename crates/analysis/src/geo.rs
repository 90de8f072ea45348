//! Geographic sanity filter for well and extraction-point coordinates.

use serde::Deserialize;

/// Inclusive WGS84 bounding box, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct GeoEnvelope {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl GeoEnvelope {
    /// Continental Chile.
    pub const NATIONAL: GeoEnvelope = GeoEnvelope {
        lat_min: -56.0,
        lat_max: -17.0,
        lon_min: -76.0,
        lon_max: -66.0,
    };

    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.lat_min..=self.lat_max).contains(&latitude)
            && (self.lon_min..=self.lon_max).contains(&longitude)
    }
}

impl Default for GeoEnvelope {
    fn default() -> Self {
        Self::NATIONAL
    }
}

/// True iff both coordinates are present, finite, and inside `envelope`.
pub fn is_valid(latitude: Option<f64>, longitude: Option<f64>, envelope: &GeoEnvelope) -> bool {
    match (latitude, longitude) {
        (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => envelope.contains(lat, lon),
        _ => false,
    }
}

/// Keep the items whose coordinates pass `is_valid`.
pub fn retain_valid<'a, T, F>(items: &'a [T], envelope: &GeoEnvelope, coords: F) -> Vec<&'a T>
where
    F: Fn(&T) -> (Option<f64>, Option<f64>),
{
    items
        .iter()
        .filter(|item| {
            let (lat, lon) = coords(item);
            is_valid(lat, lon, envelope)
        })
        .collect()
}

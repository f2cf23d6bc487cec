//! Great-circle proximity filter over merchant coordinates.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub const EARTH_RADIUS_KM: f64 = 6371.0;
pub const DEFAULT_RADIUS_KM: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Spherical law of cosines distance in kilometres.
pub fn distance_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let (lat1, lat2) = (a.latitude.to_radians(), b.latitude.to_radians());
    let delta_lon = b.longitude.to_radians() - a.longitude.to_radians();

    let cosine = lat1.cos() * lat2.cos() * delta_lon.cos() + lat1.sin() * lat2.sin();

    // Rounding can push identical points just past 1.0, where acos is NaN.
    EARTH_RADIUS_KM * cosine.clamp(-1.0, 1.0).acos()
}

/// Inclusive radius check.
pub fn within_radius(center: GeoPoint, point: GeoPoint, radius_km: f64) -> bool {
    distance_km(center, point) <= radius_km
}

/// Ids of every located item within `radius_km` of `center`.
pub fn nearby<I>(center: GeoPoint, radius_km: f64, located: I) -> BTreeSet<i64>
where
    I: IntoIterator<Item = (i64, GeoPoint)>,
{
    located
        .into_iter()
        .filter(|(_, point)| within_radius(center, *point, radius_km))
        .map(|(id, _)| id)
        .collect()
}

use uuid::Uuid;

use crate::models::driver::GeoPoint;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Bounding-box half-width for the cheap pre-filter, in degrees.
const BOX_HALF_WIDTH_DEG: f64 = 0.05;

pub fn haversine_m(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_M * central_angle
}

fn within_bounding_box(origin: &GeoPoint, candidate: &GeoPoint) -> bool {
    (candidate.lat - origin.lat).abs() <= BOX_HALF_WIDTH_DEG
        && (candidate.lng - origin.lng).abs() <= BOX_HALF_WIDTH_DEG
}

/// An entity with distance from the query point, produced by `nearby`.
#[derive(Debug, Clone)]
pub struct Nearby<T> {
    pub entity: T,
    pub distance_m: f64,
}

/// Stateless proximity matcher. Ranks any entity type against an origin:
/// bounding-box pre-filter, exact haversine distance, radius cut, then
/// ascending distance with entity id as the deterministic tie-break.
///
/// `extract` returns the entity's position (and may decline entities with no
/// known location); `id_of` supplies the tie-break key.
pub fn nearby<T>(
    items: impl IntoIterator<Item = T>,
    origin: &GeoPoint,
    radius_m: f64,
    extract: impl Fn(&T) -> Option<GeoPoint>,
    id_of: impl Fn(&T) -> Uuid,
) -> Vec<Nearby<T>> {
    let mut matches: Vec<Nearby<T>> = items
        .into_iter()
        .filter_map(|entity| {
            let location = extract(&entity)?;
            if !within_bounding_box(origin, &location) {
                return None;
            }
            let distance_m = haversine_m(origin, &location);
            (distance_m <= radius_m).then_some(Nearby { entity, distance_m })
        })
        .collect();

    matches.sort_by(|a, b| {
        a.distance_m
            .total_cmp(&b.distance_m)
            .then_with(|| id_of(&a.entity).cmp(&id_of(&b.entity)))
    });

    matches
}

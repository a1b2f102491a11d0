use uuid::Uuid;

use crate::models::location::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Great-circle distance between two points in kilometers.
pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let h = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * central_angle
}

/// Scans `candidates` and returns the ids within `radius_km` of `origin`,
/// closest first, capped at `limit`.
pub fn nearest_within<I>(
    origin: &GeoPoint,
    candidates: I,
    radius_km: f64,
    limit: usize,
) -> Vec<(Uuid, f64)>
where
    I: IntoIterator<Item = (Uuid, GeoPoint)>,
{
    let mut hits: Vec<(Uuid, f64)> = candidates
        .into_iter()
        .map(|(id, point)| (id, haversine_km(origin, &point)))
        .filter(|(_, distance)| *distance <= radius_km)
        .collect();

    hits.sort_by(|a, b| a.1.total_cmp(&b.1));
    hits.truncate(limit);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(lat: f64, lng: f64) -> GeoPoint {
        GeoPoint { lat, lng }
    }

    #[test]
    fn zero_distance_for_same_point() {
        let p = point(40.4168, -3.7038);
        assert!(haversine_km(&p, &p) < 1e-9);
    }

    #[test]
    fn one_degree_of_longitude_at_the_equator() {
        let a = point(0.0, 0.0);
        let b = point(0.0, 1.0);
        let distance = haversine_km(&a, &b);
        assert!((distance - 111.2).abs() < 1.0);
    }

    #[test]
    fn nearest_within_filters_sorts_and_caps() {
        let origin = point(0.0, 0.0);
        let far = Uuid::new_v4();
        let near = Uuid::new_v4();
        let nearer = Uuid::new_v4();
        let candidates = vec![
            (far, point(0.0, 3.0)),
            (near, point(0.0, 0.02)),
            (nearer, point(0.0, 0.01)),
        ];

        let hits = nearest_within(&origin, candidates.clone(), 10.0, 10);
        assert_eq!(
            hits.iter().map(|(id, _)| *id).collect::<Vec<_>>(),
            vec![nearer, near]
        );

        let capped = nearest_within(&origin, candidates, 10.0, 1);
        assert_eq!(capped.len(), 1);
        assert_eq!(capped[0].0, nearer);
    }
}

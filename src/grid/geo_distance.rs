//! Great-circle distances and nearest grid cell lookup.

use crate::grid::decoder::{GridCell, LatLonGrid};
use crate::types::location::LatLon;
use haversine::{distance, Location as HaversineLocation, Units};
use ordered_float::OrderedFloat;

/// Central angle between two points on a sphere, in radians.
///
/// Multiply by an Earth radius to get a length. The result is symmetric and
/// exactly `0.0` for identical points.
pub fn arc_distance(a: LatLon, b: LatLon) -> f64 {
    // spherical coordinates: colatitude and longitude
    let phi1 = (90.0 - a.0).to_radians();
    let phi2 = (90.0 - b.0).to_radians();
    let theta1 = a.1.to_radians();
    let theta2 = b.1.to_radians();

    // sin φ1 sin φ2 cos(θ1−θ2) + cos φ1 cos φ2, rearranged so equal points give exactly 1
    let cos = (phi1 - phi2).cos() - phi1.sin() * phi2.sin() * (1.0 - (theta1 - theta2).cos());
    cos.clamp(-1.0, 1.0).acos()
}

/// Distance in kilometers, used for logging how far the chosen cell is from the site.
pub fn distance_km(a: LatLon, b: LatLon) -> f64 {
    distance(
        HaversineLocation {
            latitude: a.0,
            longitude: a.1,
        },
        HaversineLocation {
            latitude: b.0,
            longitude: b.1,
        },
        Units::Kilometers,
    )
}

/// Returns the grid cell with the smallest arc distance to `target`.
///
/// Linear scan over all cells; ties resolve to the first cell in row-major order.
/// `None` only for an empty grid.
pub fn nearest_cell(grid: &LatLonGrid, target: LatLon) -> Option<GridCell> {
    (0..grid.rows)
        .flat_map(|row| (0..grid.cols).map(move |col| GridCell { row, col }))
        .filter_map(|cell| grid.lat_lon(cell).map(|point| (cell, point)))
        .min_by_key(|(_, point)| OrderedFloat(arc_distance(*point, target)))
        .map(|(cell, _)| cell)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ULM: LatLon = LatLon(48.40, 9.99);
    const ROME: LatLon = LatLon(41.90, 12.50);

    #[test]
    fn test_distance_to_self_is_zero() {
        assert_eq!(arc_distance(ULM, ULM), 0.0);
        assert_eq!(arc_distance(ROME, ROME), 0.0);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let forth = arc_distance(ULM, ROME);
        let back = arc_distance(ROME, ULM);
        assert!((forth - back).abs() < 1e-12);
        assert!(forth > 0.0);
    }

    #[test]
    fn test_arc_matches_haversine() {
        let arc_km = arc_distance(ULM, ROME) * 6371.0;
        let haversine_km = distance_km(ULM, ROME);
        assert!(
            (arc_km - haversine_km).abs() < 1.0,
            "arc {arc_km} km vs haversine {haversine_km} km"
        );
    }

    #[test]
    fn test_nearest_cell() {
        // 3x3 grid, one degree spacing around 47..49 N, 9..11 E
        let mut latitudes = Vec::new();
        let mut longitudes = Vec::new();
        for row in 0..3 {
            for col in 0..3 {
                latitudes.push(47.0 + row as f64);
                longitudes.push(9.0 + col as f64);
            }
        }
        let grid = LatLonGrid::new(3, 3, latitudes, longitudes);

        assert_eq!(nearest_cell(&grid, ULM), Some(GridCell { row: 1, col: 1 }));
        assert_eq!(
            nearest_cell(&grid, LatLon(49.2, 11.3)),
            Some(GridCell { row: 2, col: 2 })
        );
        assert_eq!(nearest_cell(&LatLonGrid::new(0, 0, vec![], vec![]), ULM), None);
    }
}

use anyhow::{Context, Result};
use geo::{Distance, Haversine, Point};
use proj4rs::Proj;

pub(crate) const METERS_PER_MILE: f64 = 1609.344;

// Mean earth radius, the sphere the haversine metric measures on. Used only
// to size R-tree search windows; membership is always confirmed by haversine.
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Great-circle distance in meters between two lon/lat points on the sphere.
pub(crate) fn haversine_m(a: Point<f64>, b: Point<f64>) -> f64 {
    Haversine.distance(a, b)
}

/// Half-widths in degrees of a lat/lon window guaranteed to cover a
/// great-circle radius of `radius_m` meters around latitude `lat`.
pub(crate) fn degree_window(lat: f64, radius_m: f64) -> (f64, f64) {
    let d = radius_m / EARTH_RADIUS_M; // angular radius of the cap
    // Small cushion so the coarse filter never excludes a true match.
    let dlat = d.to_degrees() * 1.05;

    // Longitude half-span of a spherical cap centered at `lat`. A cap that
    // reaches past a pole contains every longitude.
    let sin_ratio = d.sin() / lat.to_radians().cos().abs();
    let dlon = if sin_ratio < 1.0 {
        (sin_ratio.asin().to_degrees() * 1.05).min(180.0)
    } else {
        180.0
    };
    (dlat, dlon)
}

/// Pure point transformation between a fixed pair of coordinate reference
/// systems. Containment testing goes through this seam so an alternate
/// reference frame can be substituted without touching pipeline logic.
pub trait CrsTransform {
    /// Transform a lon/lat point (degrees) into the target frame (degrees).
    fn transform(&self, point: Point<f64>) -> Result<Point<f64>>;
}

/// EPSG:4326 (WGS84) to EPSG:4269 (NAD83), the native frame of TIGER
/// tract geometry.
pub struct Wgs84ToNad83 {
    src: Proj,
    dst: Proj,
}

impl Wgs84ToNad83 {
    pub fn new() -> Result<Self> {
        let src = Proj::from_proj_string("+proj=longlat +datum=WGS84 +no_defs")
            .context("build EPSG:4326 projection")?;
        let dst = Proj::from_proj_string("+proj=longlat +ellps=GRS80 +towgs84=0,0,0,0,0,0,0 +no_defs")
            .context("build EPSG:4269 projection")?;
        Ok(Self { src, dst })
    }
}

impl CrsTransform for Wgs84ToNad83 {
    fn transform(&self, point: Point<f64>) -> Result<Point<f64>> {
        // proj4rs works in radians for geographic CRS
        let mut coords = (point.x().to_radians(), point.y().to_radians(), 0.0);
        proj4rs::transform::transform(&self.src, &self.dst, &mut coords)
            .context("transform point EPSG:4326 -> EPSG:4269")?;
        Ok(Point::new(coords.0.to_degrees(), coords.1.to_degrees()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn haversine_matches_known_distance() {
        // One degree of longitude at the equator is ~111.2 km
        let a = Point::new(0.0, 0.0);
        let b = Point::new(1.0, 0.0);
        let d = haversine_m(a, b);
        assert!((d - 111_195.0).abs() < 200.0, "got {d}");
    }

    #[test]
    fn haversine_is_symmetric() {
        let a = Point::new(-96.7, 32.9);
        let b = Point::new(-96.5, 33.1);
        assert_eq!(haversine_m(a, b), haversine_m(b, a));
    }

    #[test]
    fn degree_window_covers_radius() {
        let lat = 33.0;
        let radius = 5.0 * METERS_PER_MILE;
        let (dlat, dlon) = degree_window(lat, radius);
        // Walking the window half-width in either axis must exceed the radius.
        let center = Point::new(-96.0, lat);
        assert!(haversine_m(center, Point::new(-96.0, lat + dlat)) >= radius);
        assert!(haversine_m(center, Point::new(-96.0 + dlon, lat)) >= radius);
    }

    #[test]
    fn degree_window_covers_radius_at_high_latitude() {
        let lat = 84.0;
        let radius = 10.0 * METERS_PER_MILE;
        let (_, dlon) = degree_window(lat, radius);
        let center = Point::new(0.0, lat);
        assert!(haversine_m(center, Point::new(dlon, lat)) >= radius);
    }

    #[test]
    fn degree_window_spans_all_longitudes_near_pole() {
        let (_, dlon) = degree_window(89.9, 10.0 * METERS_PER_MILE);
        assert_eq!(dlon, 180.0);
    }

    #[test]
    fn wgs84_to_nad83_is_near_identity() {
        let crs = Wgs84ToNad83::new().unwrap();
        let p = crs.transform(Point::new(-96.75, 32.85)).unwrap();
        assert_abs_diff_eq!(p.x(), -96.75, epsilon = 1e-6);
        assert_abs_diff_eq!(p.y(), 32.85, epsilon = 1e-6);
    }
}

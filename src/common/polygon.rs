use anyhow::{bail, Result};
use shapefile::{PolygonRing, Shape};

/// Convert a shapefile shape into a geo::MultiPolygon.
/// Shapefiles store rings flat, each exterior followed by its holes; the
/// ring kind is explicit, so grouping is a single forward pass.
pub(crate) fn shape_to_multipolygon(shape: Shape) -> Result<geo::MultiPolygon<f64>> {
    let polygon = match shape {
        Shape::Polygon(p) => p,
        Shape::NullShape => return Ok(geo::MultiPolygon(Vec::new())),
        other => bail!("unsupported shape type: {}", other.shapetype()),
    };

    fn ring_to_linestring(points: &[shapefile::Point]) -> geo::LineString<f64> {
        let mut coords: Vec<geo::Coord<f64>> = points
            .iter()
            .map(|pt| geo::Coord { x: pt.x, y: pt.y })
            .collect();
        // geo expects closed rings
        if let (Some(first), Some(last)) = (coords.first().copied(), coords.last().copied()) {
            if first != last {
                coords.push(first);
            }
        }
        geo::LineString(coords)
    }

    let mut polys: Vec<geo::Polygon<f64>> = Vec::new();
    let mut exterior: Option<geo::LineString<f64>> = None;
    let mut holes: Vec<geo::LineString<f64>> = Vec::new();

    for ring in polygon.rings() {
        match ring {
            PolygonRing::Outer(points) => {
                if let Some(ext) = exterior.take() {
                    polys.push(geo::Polygon::new(ext, std::mem::take(&mut holes)));
                }
                exterior = Some(ring_to_linestring(points));
            }
            PolygonRing::Inner(points) => {
                // A hole before any exterior is malformed; skip it.
                if exterior.is_some() {
                    holes.push(ring_to_linestring(points));
                }
            }
        }
    }
    if let Some(ext) = exterior {
        polys.push(geo::Polygon::new(ext, holes));
    }

    Ok(geo::MultiPolygon(polys))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Area;
    use shapefile::Point;

    #[test]
    fn outer_ring_becomes_polygon() {
        let ring = vec![
            Point::new(0.0, 0.0),
            Point::new(0.0, 1.0),
            Point::new(1.0, 1.0),
            Point::new(1.0, 0.0),
            Point::new(0.0, 0.0),
        ];
        let shp = shapefile::Polygon::with_rings(vec![PolygonRing::Outer(ring)]);
        let mp = shape_to_multipolygon(Shape::Polygon(shp)).unwrap();
        assert_eq!(mp.0.len(), 1);
        assert!((mp.unsigned_area() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn hole_attaches_to_preceding_exterior() {
        let outer = vec![
            Point::new(0.0, 0.0),
            Point::new(0.0, 4.0),
            Point::new(4.0, 4.0),
            Point::new(4.0, 0.0),
            Point::new(0.0, 0.0),
        ];
        let inner = vec![
            Point::new(1.0, 1.0),
            Point::new(3.0, 1.0),
            Point::new(3.0, 3.0),
            Point::new(1.0, 3.0),
            Point::new(1.0, 1.0),
        ];
        let shp = shapefile::Polygon::with_rings(vec![
            PolygonRing::Outer(outer),
            PolygonRing::Inner(inner),
        ]);
        let mp = shape_to_multipolygon(Shape::Polygon(shp)).unwrap();
        assert_eq!(mp.0.len(), 1);
        assert_eq!(mp.0[0].interiors().len(), 1);
        assert!((mp.unsigned_area() - 12.0).abs() < 1e-9);
    }

    #[test]
    fn null_shape_is_empty() {
        let mp = shape_to_multipolygon(Shape::NullShape).unwrap();
        assert!(mp.0.is_empty());
    }
}

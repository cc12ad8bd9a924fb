use ahash::AHashMap;
use geo::{BooleanOps, BoundingRect, Contains, InteriorPoint, MultiPolygon, Point, Rect, Validation};
use rstar::{primitives::GeomWithData, RTree, RTreeObject, AABB};

use crate::geodesy;

use super::TractId;

/// One polygon in the unified store, repaired and carrying its
/// representative point.
#[derive(Debug, Clone)]
pub struct TractPolygon {
    pub id: TractId,
    pub geom: MultiPolygon<f64>,
    /// Interior point-on-surface (degrees, unprojected). This is the
    /// polygon's sole proxy for all radius distance tests.
    pub rep_point: Point<f64>,
    pub area_land: Option<f64>,
    pub area_water: Option<f64>,
}

#[derive(Debug, Clone)]
struct BoundingBox {
    idx: usize, // Index of corresponding polygon in the store
    bbox: Rect<f64>,
}

impl RTreeObject for BoundingBox {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.bbox.min().into(), self.bbox.max().into())
    }
}

/// Unified polygon table with two spatial indexes: polygon bounding boxes
/// for containment candidate lookup, representative points for radius
/// pre-filtering.
#[derive(Debug)]
pub struct TractStore {
    polygons: Vec<TractPolygon>,
    index: AHashMap<TractId, u32>, // last write wins on duplicate GEOIDs
    bbox_tree: RTree<BoundingBox>,
    point_tree: RTree<GeomWithData<[f64; 2], usize>>,
}

impl TractStore {
    /// Build the store from concatenated shard rows. Invalid geometry gets
    /// one repair attempt (boolean-op renoding); polygons that stay invalid
    /// or yield no interior point are dropped and counted.
    pub(crate) fn from_features(
        features: Vec<super::shard::ShardFeature>,
    ) -> (Self, usize) {
        let mut polygons = Vec::with_capacity(features.len());
        let mut dropped = 0usize;

        for feature in features {
            let geom = if feature.geom.is_valid() {
                feature.geom
            } else {
                let repaired = repair(&feature.geom);
                if !repaired.is_valid() || repaired.0.is_empty() {
                    eprintln!("[store] WARN dropping unrepairable polygon {}", feature.geoid);
                    dropped += 1;
                    continue;
                }
                repaired
            };

            let Some(rep_point) = geom.interior_point() else {
                eprintln!("[store] WARN dropping degenerate polygon {}", feature.geoid);
                dropped += 1;
                continue;
            };

            polygons.push(TractPolygon {
                id: TractId::new(&feature.geoid),
                geom,
                rep_point,
                area_land: feature.area_land,
                area_water: feature.area_water,
            });
        }

        let index = polygons
            .iter()
            .enumerate()
            .map(|(i, poly)| (poly.id.clone(), i as u32))
            .collect();

        let bbox_tree = RTree::bulk_load(
            polygons
                .iter()
                .enumerate()
                .filter_map(|(i, poly)| {
                    poly.geom.bounding_rect().map(|bbox| BoundingBox { idx: i, bbox })
                })
                .collect(),
        );

        let point_tree = RTree::bulk_load(
            polygons
                .iter()
                .enumerate()
                .map(|(i, poly)| GeomWithData::new([poly.rep_point.x(), poly.rep_point.y()], i))
                .collect(),
        );

        (Self { polygons, index, bbox_tree, point_tree }, dropped)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    #[inline]
    pub fn polygons(&self) -> &[TractPolygon] {
        &self.polygons
    }

    pub fn get(&self, id: &TractId) -> Option<&TractPolygon> {
        self.index.get(id).map(|&i| &self.polygons[i as usize])
    }

    /// Polygons whose representative point lies within `radius_m` meters of
    /// `center` (great-circle). Coarse window filter first, exact haversine
    /// confirmation second.
    pub fn within_radius(&self, center: Point<f64>, radius_m: f64) -> Vec<&TractPolygon> {
        let (dlat, dlon) = geodesy::degree_window(center.y(), radius_m);
        let envelope = AABB::from_corners(
            [center.x() - dlon, center.y() - dlat],
            [center.x() + dlon, center.y() + dlat],
        );

        self.point_tree
            .locate_in_envelope_intersecting(&envelope)
            .filter_map(|entry| {
                let poly = &self.polygons[entry.data];
                (geodesy::haversine_m(center, poly.rep_point) <= radius_m).then_some(poly)
            })
            .collect()
    }

    /// Polygons whose geometry contains `point` exactly. Candidates come
    /// from the bounding-box tree; a boundary touch does not count.
    pub fn containing(&self, point: Point<f64>) -> Vec<&TractPolygon> {
        self.bbox_tree
            .locate_in_envelope_intersecting(&AABB::from_point([point.x(), point.y()]))
            .filter_map(|cand| {
                let poly = &self.polygons[cand.idx];
                poly.geom.contains(&point).then_some(poly)
            })
            .collect()
    }
}

/// Validity-restoring transform: renode the geometry through a boolean union
/// with the empty multipolygon.
fn repair(geom: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    geom.union(&MultiPolygon::new(Vec::new()))
}

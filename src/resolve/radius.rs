use std::collections::BTreeSet;
use std::sync::Arc;

use crate::config::RadiusTier;
use crate::facility::Facility;
use crate::geodesy;
use crate::tracts::{TractId, TractStore};

/// Matched tract set for one facility at one radius tier.
#[derive(Debug)]
pub(crate) struct MembershipEntry {
    pub facility: Arc<str>,
    pub tier: RadiusTier,
    /// Ordered set: dedups duplicate GEOIDs across shards and fixes the
    /// iteration order so downstream output is reproducible.
    pub tracts: BTreeSet<TractId>,
}

/// All facility x tier memberships, facility input order x configured tier
/// order. Entries with an empty tract set are omitted, matching the join
/// semantics of the aggregation stage.
#[derive(Debug, Default)]
pub(crate) struct RadiusMembership {
    pub entries: Vec<MembershipEntry>,
}

impl RadiusMembership {
    pub fn row_count(&self) -> usize {
        self.entries.iter().map(|entry| entry.tracts.len()).sum()
    }
}

/// For each facility and tier, collect the polygons whose representative
/// point lies within the tier radius. One spatial query per facility at the
/// widest tier; narrower tiers are carved out of that candidate set by
/// distance, which makes membership monotonic in the radius by construction.
pub(crate) fn resolve_radius(
    facilities: &[Facility],
    store: &TractStore,
    tiers: &[RadiusTier],
) -> RadiusMembership {
    let mut membership = RadiusMembership::default();
    let Some(max_meters) = tiers.iter().map(RadiusTier::meters).reduce(f64::max) else {
        return membership;
    };

    for facility in facilities {
        let center = facility.point();
        let candidates: Vec<(f64, &TractId)> = store
            .within_radius(center, max_meters)
            .into_iter()
            .map(|poly| (geodesy::haversine_m(center, poly.rep_point), &poly.id))
            .collect();

        for &tier in tiers {
            let tracts: BTreeSet<TractId> = candidates
                .iter()
                .filter(|(distance, _)| *distance <= tier.meters())
                .map(|(_, id)| (*id).clone())
                .collect();

            if !tracts.is_empty() {
                membership.entries.push(MembershipEntry {
                    facility: facility.id.clone(),
                    tier,
                    tracts,
                });
            }
        }
    }

    membership
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracts::shard::ShardFeature;
    use geo::{Coord, LineString, MultiPolygon, Polygon};

    fn square(geoid: &str, x0: f64, y0: f64, size: f64) -> ShardFeature {
        let ring = LineString(vec![
            Coord { x: x0, y: y0 },
            Coord { x: x0 + size, y: y0 },
            Coord { x: x0 + size, y: y0 + size },
            Coord { x: x0, y: y0 + size },
            Coord { x: x0, y: y0 },
        ]);
        ShardFeature {
            geoid: geoid.to_string(),
            geom: MultiPolygon(vec![Polygon::new(ring, vec![])]),
            area_land: None,
            area_water: None,
        }
    }

    fn facility(id: &str, lat: f64, lon: f64) -> Facility {
        Facility { id: Arc::from(id), lat, lon }
    }

    fn tiers(miles: &[f64]) -> Vec<RadiusTier> {
        miles.iter().map(|&m| RadiusTier::new(m)).collect()
    }

    #[test]
    fn membership_is_monotonic_in_radius() {
        // Representative points roughly 0, 5.6, 8.9, 13.3 km east of the
        // facility, straddling the 3-mile (4.8 km) and 5-mile (8.0 km) cuts.
        let features = vec![
            square("48001950100", 0.0, 0.0, 0.01),
            square("48001950200", 0.05, 0.0, 0.01),
            square("48001950300", 0.08, 0.0, 0.01),
            square("48001950400", 0.12, 0.0, 0.01),
        ];
        let (store, _) = TractStore::from_features(features);
        let facilities = vec![facility("f1", 0.005, 0.005)];

        let membership = resolve_radius(&facilities, &store, &tiers(&[3.0, 5.0, 10.0]));

        let sets: Vec<&BTreeSet<TractId>> = membership
            .entries
            .iter()
            .map(|entry| &entry.tracts)
            .collect();
        assert_eq!(sets.len(), 3);
        assert!(sets[0].is_subset(sets[1]));
        assert!(sets[1].is_subset(sets[2]));
        assert_eq!(sets[0].len(), 1);
        assert_eq!(sets[1].len(), 2);
        assert_eq!(sets[2].len(), 4);
    }

    #[test]
    fn facility_with_no_matches_is_omitted() {
        let (store, _) = TractStore::from_features(vec![square("48001950100", 0.0, 0.0, 0.01)]);
        let facilities = vec![facility("far", 45.0, 45.0)];

        let membership = resolve_radius(&facilities, &store, &tiers(&[3.0]));
        assert!(membership.entries.is_empty());
        assert_eq!(membership.row_count(), 0);
    }

    #[test]
    fn duplicate_geoids_collapse_to_one_row() {
        // Same GEOID appearing in two shards.
        let features = vec![
            square("48001950100", 0.0, 0.0, 0.01),
            square("48001950100", 0.001, 0.0, 0.01),
        ];
        let (store, _) = TractStore::from_features(features);
        let facilities = vec![facility("f1", 0.005, 0.005)];

        let membership = resolve_radius(&facilities, &store, &tiers(&[3.0]));
        assert_eq!(membership.entries.len(), 1);
        assert_eq!(membership.entries[0].tracts.len(), 1);
    }

    #[test]
    fn square_scenario_matches_all_tiers() {
        // A facility at the center of a small square matches it at 3, 5, 10 miles.
        let (store, _) = TractStore::from_features(vec![square("48001950100", 0.0, 0.0, 0.02)]);
        let facilities = vec![facility("f1", 0.01, 0.01)];

        let membership = resolve_radius(&facilities, &store, &tiers(&[3.0, 5.0, 10.0]));
        assert_eq!(membership.entries.len(), 3);
        for entry in &membership.entries {
            assert_eq!(entry.tracts.len(), 1);
            assert!(entry.tracts.contains(&TractId::new("48001950100")));
        }
    }
}

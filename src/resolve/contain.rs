use std::sync::Arc;

use anyhow::Result;

use crate::facility::Facility;
use crate::geodesy::CrsTransform;
use crate::tracts::{TractId, TractStore};

/// One facility assigned to the single polygon containing it.
#[derive(Debug)]
pub(crate) struct Assignment {
    pub facility: Arc<str>,
    pub tract: TractId,
    /// Number of containing polygons before tie-break (1 in the normal case).
    pub candidates: usize,
}

#[derive(Debug, Default)]
pub(crate) struct ContainmentOutcome {
    /// One entry per assigned facility, in facility input order.
    pub assignments: Vec<Assignment>,
    pub unassigned: usize,
    pub multi_containment: usize,
}

/// Assign each facility to the polygon that geometrically contains its
/// point, after transforming the point into the polygon layer's reference
/// frame. Zero containment is reported, not fatal. Multiple containment
/// (boundary or overlap artifacts upstream) is resolved deterministically:
/// the lowest GEOID wins.
pub(crate) fn resolve_containment(
    facilities: &[Facility],
    store: &TractStore,
    crs: &dyn CrsTransform,
) -> Result<ContainmentOutcome> {
    let mut outcome = ContainmentOutcome::default();

    for facility in facilities {
        let point = crs.transform(facility.point())?;

        let mut candidates: Vec<&TractId> = store
            .containing(point)
            .into_iter()
            .map(|poly| &poly.id)
            .collect();
        candidates.sort();

        match candidates.len() {
            0 => {
                eprintln!("[contain] WARN facility {} not contained by any polygon", facility.id);
                outcome.unassigned += 1;
            }
            n => {
                if n > 1 {
                    eprintln!(
                        "[contain] WARN facility {} contained by {n} polygons, keeping {}",
                        facility.id, candidates[0]
                    );
                    outcome.multi_containment += 1;
                }
                outcome.assignments.push(Assignment {
                    facility: facility.id.clone(),
                    tract: candidates[0].clone(),
                    candidates: n,
                });
            }
        }
    }

    Ok(outcome)
}

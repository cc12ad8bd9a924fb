use std::collections::BTreeMap;
use std::sync::Arc;

use ahash::AHashSet;

use crate::census::CensusTable;
use crate::config::RadiusTier;
use crate::resolve::RadiusMembership;

/// Per (facility, tier) rollup of the membership rows.
#[derive(Debug, Clone)]
pub(crate) struct TierSummary {
    pub facility: Arc<str>,
    pub miles: f64,
    pub tract_count: usize,
    pub population: i64,
}

/// Aggregated catchment figures, long and wide.
#[derive(Debug)]
pub(crate) struct AggregateOutput {
    /// Sorted by (facility, miles).
    pub long: Vec<TierSummary>,
    /// facility -> population per tier, in configured tier order. Tiers the
    /// facility matched nothing at contribute zero. Facilities that matched
    /// nothing at any tier are absent entirely.
    pub wide: BTreeMap<Arc<str>, Vec<i64>>,
    /// Distinct matched tract ids with no demographic record.
    pub unmatched_geoids: usize,
}

/// Count matched polygons and sum their populations per facility and tier,
/// then pivot to one row per facility. Unmatched demographic keys contribute
/// zero population and are counted, not dropped.
pub(crate) fn aggregate(
    membership: &RadiusMembership,
    census: &CensusTable,
    tiers: &[RadiusTier],
) -> AggregateOutput {
    let mut unmatched = AHashSet::new();
    let mut long: Vec<TierSummary> = membership
        .entries
        .iter()
        .map(|entry| TierSummary {
            facility: entry.facility.clone(),
            miles: entry.tier.miles,
            tract_count: entry.tracts.len(),
            population: census.population_sum(entry.tracts.iter(), &mut unmatched),
        })
        .collect();

    long.sort_by(|a, b| {
        a.facility
            .cmp(&b.facility)
            .then(a.miles.total_cmp(&b.miles))
    });

    let mut wide: BTreeMap<Arc<str>, Vec<i64>> = BTreeMap::new();
    for summary in &long {
        let row = wide
            .entry(summary.facility.clone())
            .or_insert_with(|| vec![0; tiers.len()]);
        if let Some(slot) = tiers.iter().position(|tier| tier.miles == summary.miles) {
            row[slot] = summary.population;
        }
    }

    AggregateOutput { long, wide, unmatched_geoids: unmatched.len() }
}

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{ensure, Result};
use polars::frame::DataFrame;
use polars::prelude::Column;

use crate::aggregate::{aggregate, AggregateOutput};
use crate::census::CensusTable;
use crate::common;
use crate::config::{PipelineConfig, RadiusTier};
use crate::facility;
use crate::geodesy::Wgs84ToNad83;
use crate::report::RunReport;
use crate::resolve::{resolve_containment, resolve_radius, ContainmentOutcome, RadiusMembership};
use crate::tracts::{self, TractStore};

/// Run the full catchment + containment pipeline: ingest polygon shards,
/// validate facilities, normalize the demographic feed, resolve radius
/// membership and containment, aggregate, and write the toggled output
/// tables. Returns the structured run report.
pub fn run(config: &PipelineConfig, verbose: u8) -> Result<RunReport> {
    config.validate()?;
    common::ensure_dir_exists(&config.out_dir)?;

    let mut report = RunReport::default();

    // Polygon store
    let shard_load = tracts::load_shards(&config.shards_dir, verbose)?;
    report.shards_read = shard_load.shards_read;
    report.shards_skipped = shard_load.shards_skipped;
    report.polygons_dropped = shard_load.rows_dropped;

    let (store, repair_dropped) = TractStore::from_features(shard_load.features);
    report.polygons_dropped += repair_dropped;
    report.polygons_loaded = store.len();
    ensure!(!store.is_empty(), "no usable polygons after geometry repair");
    if verbose > 0 {
        eprintln!("[store] {} polygons, {} dropped", store.len(), report.polygons_dropped);
    }

    // Facilities
    let facilities = facility::load_facilities(&config.facilities_csv)?;
    report.facilities_in = facilities.rows_in;
    report.facilities_dropped = facilities.dropped;
    if verbose > 0 {
        eprintln!(
            "[facility] {} valid, {} dropped",
            facilities.facilities.len(),
            facilities.dropped
        );
    }

    // Demographics
    let census = CensusTable::load(&config.census_csv)?;
    report.census_rows = census.rows;
    report.census_rows_skipped = census.rows_skipped;
    ensure!(!census.is_empty(), "no usable rows in demographic feed");
    if verbose > 0 {
        eprintln!("[census] {} tracts keyed, {} rows skipped", census.len(), census.rows_skipped);
    }

    // Radius membership + aggregation
    let tiers = config.tiers();
    let membership = resolve_radius(&facilities.facilities, &store, &tiers);
    report.membership_rows = membership.row_count();

    let agg = aggregate(&membership, &census, &tiers);
    report.unmatched_geoids = agg.unmatched_geoids;

    // Containment
    let crs = Wgs84ToNad83::new()?;
    let outcome = resolve_containment(&facilities.facilities, &store, &crs)?;
    report.facilities_unassigned = outcome.unassigned;
    report.facilities_multi_containment = outcome.multi_containment;

    // Outputs
    let toggles = &config.outputs;
    let mut write = |name: &str, df: DataFrame, report: &mut RunReport| -> Result<()> {
        common::data::write_table(&config.out_dir, name, &df)?;
        if verbose > 0 {
            eprintln!("[export] {name}: {} rows", df.height());
        }
        report.tables_written.push((name.to_string(), df.height()));
        Ok(())
    };

    if toggles.population_wide {
        write("facility_radius_population_wide", wide_df(&agg, &tiers)?, &mut report)?;
    }
    if toggles.population_long {
        write("facility_radius_population", population_long_df(&agg)?, &mut report)?;
    }
    if toggles.tract_counts {
        write("facility_radius_counts", counts_df(&agg)?, &mut report)?;
    }
    if toggles.radius_detail {
        write("facility_radius_detail", detail_df(&membership, &census)?, &mut report)?;
    }
    if toggles.assignment {
        write(
            "facility_tract_assignment",
            assignment_df(&outcome, &agg, &tiers)?,
            &mut report,
        )?;
    }
    if toggles.assignment_urban {
        write(
            "facility_tract_assignment_urban",
            assignment_urban_df(&outcome, &agg, &tiers, &census, &store)?,
            &mut report,
        )?;
    }
    if toggles.census_table {
        write("census_tracts", census.to_dataframe()?, &mut report)?;
    }

    eprintln!(
        "[run] done: {} polygons, {} facilities, {} membership rows, {} unassigned",
        report.polygons_loaded,
        facilities.facilities.len(),
        report.membership_rows,
        report.facilities_unassigned
    );

    Ok(report)
}

/// One row per facility, one population column per tier in configured order.
fn wide_df(agg: &AggregateOutput, tiers: &[RadiusTier]) -> Result<DataFrame> {
    let facilities: Vec<&str> = agg.wide.keys().map(|f| f.as_ref()).collect();

    let mut columns = vec![Column::new("facility_id".into(), &facilities)];
    for (slot, tier) in tiers.iter().enumerate() {
        columns.push(Column::new(
            format!("pop_{}mi", tier.label()).into(),
            agg.wide.values().map(|pops| pops[slot]).collect::<Vec<i64>>(),
        ));
    }

    Ok(DataFrame::new(columns)?)
}

fn population_long_df(agg: &AggregateOutput) -> Result<DataFrame> {
    Ok(DataFrame::new(vec![
        Column::new("facility_id".into(), agg.long.iter().map(|s| s.facility.as_ref()).collect::<Vec<&str>>()),
        Column::new("miles".into(), agg.long.iter().map(|s| s.miles).collect::<Vec<f64>>()),
        Column::new("population_in_radius".into(), agg.long.iter().map(|s| s.population).collect::<Vec<i64>>()),
    ])?)
}

fn counts_df(agg: &AggregateOutput) -> Result<DataFrame> {
    Ok(DataFrame::new(vec![
        Column::new("facility_id".into(), agg.long.iter().map(|s| s.facility.as_ref()).collect::<Vec<&str>>()),
        Column::new("miles".into(), agg.long.iter().map(|s| s.miles).collect::<Vec<f64>>()),
        Column::new("tracts_in_radius".into(), agg.long.iter().map(|s| s.tract_count as u32).collect::<Vec<u32>>()),
    ])?)
}

/// One row per facility x tier x matched tract, with tract metadata and its
/// population (zero when the demographic key is unmatched).
fn detail_df(membership: &RadiusMembership, census: &CensusTable) -> Result<DataFrame> {
    struct DetailRow<'a> {
        facility: &'a str,
        miles: f64,
        tract: &'a crate::tracts::TractId,
    }

    let mut rows: Vec<DetailRow> = membership
        .entries
        .iter()
        .flat_map(|entry| {
            entry.tracts.iter().map(move |tract| DetailRow {
                facility: entry.facility.as_ref(),
                miles: entry.tier.miles,
                tract,
            })
        })
        .collect();
    rows.sort_by(|a, b| {
        a.facility
            .cmp(b.facility)
            .then(a.miles.total_cmp(&b.miles))
            .then(a.tract.cmp(b.tract))
    });

    Ok(DataFrame::new(vec![
        Column::new("facility_id".into(), rows.iter().map(|r| r.facility).collect::<Vec<&str>>()),
        Column::new("miles".into(), rows.iter().map(|r| r.miles).collect::<Vec<f64>>()),
        Column::new("geoid".into(), rows.iter().map(|r| r.tract.as_str()).collect::<Vec<&str>>()),
        Column::new("tract_ce".into(), rows.iter().map(|r| r.tract.tract_code()).collect::<Vec<&str>>()),
        Column::new("state_fips".into(), rows.iter().map(|r| r.tract.state_fips()).collect::<Vec<&str>>()),
        Column::new("county_fips".into(), rows.iter().map(|r| r.tract.county_fips()).collect::<Vec<&str>>()),
        Column::new(
            "population".into(),
            rows.iter()
                .map(|r| census.get(r.tract).map_or(0, |p| p.population))
                .collect::<Vec<i64>>(),
        ),
    ])?)
}

/// Containment assignments sorted by facility id, with the wide population
/// columns joined on.
fn sorted_assignments(outcome: &ContainmentOutcome) -> Vec<&crate::resolve::Assignment> {
    let mut assignments: Vec<_> = outcome.assignments.iter().collect();
    assignments.sort_by(|a, b| a.facility.cmp(&b.facility));
    assignments
}

fn population_columns(
    assignments: &[&crate::resolve::Assignment],
    wide: &BTreeMap<Arc<str>, Vec<i64>>,
    tiers: &[RadiusTier],
) -> Vec<Column> {
    tiers
        .iter()
        .enumerate()
        .map(|(slot, tier)| {
            Column::new(
                format!("pop_{}mi", tier.label()).into(),
                assignments
                    .iter()
                    .map(|a| wide.get(&a.facility).map(|pops| pops[slot]))
                    .collect::<Vec<Option<i64>>>(),
            )
        })
        .collect()
}

fn assignment_df(
    outcome: &ContainmentOutcome,
    agg: &AggregateOutput,
    tiers: &[RadiusTier],
) -> Result<DataFrame> {
    let assignments = sorted_assignments(outcome);

    let mut columns = vec![
        Column::new("facility_id".into(), assignments.iter().map(|a| a.facility.as_ref()).collect::<Vec<&str>>()),
        Column::new("geoid".into(), assignments.iter().map(|a| a.tract.as_str()).collect::<Vec<&str>>()),
        Column::new("tract_ce".into(), assignments.iter().map(|a| a.tract.tract_code()).collect::<Vec<&str>>()),
    ];
    columns.extend(population_columns(&assignments, &agg.wide, tiers));

    Ok(DataFrame::new(columns)?)
}

/// Assignment rows additionally enriched with the density/urbanicity code
/// and land/water areas of the winning polygon.
fn assignment_urban_df(
    outcome: &ContainmentOutcome,
    agg: &AggregateOutput,
    tiers: &[RadiusTier],
    census: &CensusTable,
    store: &TractStore,
) -> Result<DataFrame> {
    let assignments = sorted_assignments(outcome);

    let mut columns = vec![
        Column::new("facility_id".into(), assignments.iter().map(|a| a.facility.as_ref()).collect::<Vec<&str>>()),
        Column::new("geoid".into(), assignments.iter().map(|a| a.tract.as_str()).collect::<Vec<&str>>()),
        Column::new("tract_ce".into(), assignments.iter().map(|a| a.tract.tract_code()).collect::<Vec<&str>>()),
    ];
    columns.extend(population_columns(&assignments, &agg.wide, tiers));

    let areas: Vec<(Option<f64>, Option<f64>)> = assignments
        .iter()
        .map(|a| {
            store
                .get(&a.tract)
                .map_or((None, None), |poly| (poly.area_land, poly.area_water))
        })
        .collect();

    columns.push(Column::new(
        "urban_rural_ind".into(),
        assignments
            .iter()
            .map(|a| {
                census
                    .get(&a.tract)
                    .and_then(|p| p.density.as_ref())
                    .map(|d| d.as_str().to_string())
            })
            .collect::<Vec<Option<String>>>(),
    ));
    columns.push(Column::new("area_land".into(), areas.iter().map(|(land, _)| *land).collect::<Vec<Option<f64>>>()));
    columns.push(Column::new("area_water".into(), areas.iter().map(|(_, water)| *water).collect::<Vec<Option<f64>>>()));
    columns.push(Column::new(
        "is_water".into(),
        areas.iter().map(|&(land, water)| is_water(land, water)).collect::<Vec<i32>>(),
    ));

    Ok(DataFrame::new(columns)?)
}

/// A polygon counts as water-dominated when water area is at least half of
/// its total area.
fn is_water(area_land: Option<f64>, area_water: Option<f64>) -> i32 {
    let land = area_land.unwrap_or(0.0);
    let water = area_water.unwrap_or(0.0);
    let total = land + water;
    (total > 0.0 && water / total >= 0.5) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_water_threshold_is_half_of_total() {
        assert_eq!(is_water(Some(100.0), Some(100.0)), 1);
        assert_eq!(is_water(Some(100.0), Some(99.0)), 0);
        assert_eq!(is_water(Some(0.0), Some(1.0)), 1);
        assert_eq!(is_water(None, None), 0);
        assert_eq!(is_water(Some(100.0), None), 0);
    }
}

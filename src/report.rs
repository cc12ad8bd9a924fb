use serde::Serialize;

/// Structured outcome of a pipeline run. Every skip/drop the pipeline makes
/// is counted here so callers can assert on error rates instead of scraping
/// log output.
#[derive(Debug, Default, Clone, Serialize)]
pub struct RunReport {
    /// Polygon shards parsed successfully.
    pub shards_read: usize,
    /// Polygon shards skipped after a parse failure.
    pub shards_skipped: usize,
    /// Polygons in the unified store.
    pub polygons_loaded: usize,
    /// Polygons dropped (empty, unrepairable, or missing identifiers).
    pub polygons_dropped: usize,
    /// Facility rows read from the input table.
    pub facilities_in: usize,
    /// Facility rows dropped for missing or out-of-range coordinates.
    pub facilities_dropped: usize,
    /// Demographic rows keyed successfully.
    pub census_rows: usize,
    /// Demographic rows skipped (no population value).
    pub census_rows_skipped: usize,
    /// Facility x tier x tract membership rows produced.
    pub membership_rows: usize,
    /// Distinct matched tract ids with no demographic record.
    pub unmatched_geoids: usize,
    /// Facilities contained by no polygon.
    pub facilities_unassigned: usize,
    /// Facilities contained by more than one polygon (tie-broken).
    pub facilities_multi_containment: usize,
    /// (table name, row count) per output table written.
    pub tables_written: Vec<(String, usize)>,
}

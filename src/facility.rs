use std::path::Path;
use std::sync::Arc;

use anyhow::{ensure, Context, Result};
use geo::Point;
use polars::prelude::{DataType, Field, Schema};

use crate::common;

/// One validated facility point.
#[derive(Debug, Clone)]
pub struct Facility {
    pub id: Arc<str>,
    pub lat: f64,
    pub lon: f64,
}

impl Facility {
    /// Lon/lat point in EPSG:4326 degrees.
    #[inline]
    pub fn point(&self) -> Point<f64> {
        Point::new(self.lon, self.lat)
    }
}

/// The canonical facility table used by both resolvers.
#[derive(Debug)]
pub struct FacilityTable {
    pub facilities: Vec<Facility>,
    /// Rows in the raw input, before validation.
    pub rows_in: usize,
    /// Rows dropped for missing or out-of-range coordinates.
    pub dropped: usize,
}

/// Read raw facility rows (facility_id, lat, lon), coerce coordinates to
/// numeric, and drop rows outside the valid lat/lon ranges. Dropped rows are
/// counted, never clamped.
pub fn load_facilities(path: &Path) -> Result<FacilityTable> {
    // Keep facility ids as text so numeric-looking ids survive unchanged.
    let schema = Schema::from_iter([Field::new("facility_id".into(), DataType::String)]);
    let df = common::data::read_csv_file(path, Some(Arc::new(schema)))?;

    let ids = df
        .column("facility_id")
        .with_context(|| format!("missing facility_id column in {}", path.display()))?
        .str()?
        .clone();
    let lats = df
        .column("lat")
        .with_context(|| format!("missing lat column in {}", path.display()))?
        .cast(&DataType::Float64)?
        .f64()?
        .clone();
    let lons = df
        .column("lon")
        .with_context(|| format!("missing lon column in {}", path.display()))?
        .cast(&DataType::Float64)?
        .f64()?
        .clone();

    let rows_in = df.height();
    let mut facilities = Vec::with_capacity(rows_in);
    let mut dropped = 0usize;

    for i in 0..rows_in {
        let (Some(id), Some(lat), Some(lon)) = (ids.get(i), lats.get(i), lons.get(i)) else {
            dropped += 1;
            continue;
        };
        if !coordinates_in_range(lat, lon) {
            dropped += 1;
            continue;
        }
        facilities.push(Facility { id: Arc::from(id), lat, lon });
    }

    ensure!(
        !facilities.is_empty(),
        "no facility rows with valid coordinates in {}",
        path.display()
    );

    Ok(FacilityTable { facilities, rows_in, dropped })
}

#[inline]
fn coordinates_in_range(lat: f64, lon: f64) -> bool {
    lat.is_finite() && lon.is_finite() && (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)
}

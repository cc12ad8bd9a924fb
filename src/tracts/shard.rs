use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use shapefile::dbase::{FieldValue, Record};
use walkdir::WalkDir;

use crate::common;

/// One polygon row lifted out of a shard, before geometry repair.
pub(crate) struct ShardFeature {
    pub geoid: String,
    pub geom: geo::MultiPolygon<f64>,
    pub area_land: Option<f64>,
    pub area_water: Option<f64>,
}

/// Result of ingesting every shard in a directory.
pub(crate) struct ShardLoad {
    pub features: Vec<ShardFeature>,
    pub shards_read: usize,
    pub shards_skipped: usize,
    pub rows_dropped: usize,
}

/// Read every `*.zip` shard under `dir` (sorted, for reproducible ingest
/// order) and concatenate their polygon rows. A shard that fails to parse is
/// skipped with a warning; only zero parseable shards is fatal.
pub(crate) fn load_shards(dir: &Path, verbose: u8) -> Result<ShardLoad> {
    common::require_dir_exists(dir)?;

    let mut zip_paths: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list shard directory {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("zip")))
        .collect();
    zip_paths.sort();

    if zip_paths.is_empty() {
        bail!("No .zip polygon shards found in {}", dir.display());
    }

    let mut load = ShardLoad {
        features: Vec::new(),
        shards_read: 0,
        shards_skipped: 0,
        rows_dropped: 0,
    };

    for zip_path in &zip_paths {
        match read_shard(zip_path, &mut load.rows_dropped) {
            Ok(features) => {
                if verbose > 0 {
                    eprintln!("[ingest] {} -> {} polygons", zip_path.display(), features.len());
                }
                load.features.extend(features);
                load.shards_read += 1;
            }
            Err(err) => {
                eprintln!("[ingest] WARN skipping shard {}: {err:#}", zip_path.display());
                load.shards_skipped += 1;
            }
        }
    }

    if load.shards_read == 0 {
        bail!("All {} polygon shards failed to parse", zip_paths.len());
    }

    Ok(load)
}

/// Extract one shard archive into a temp directory and parse the shapefile
/// inside it. Rows missing identifier attributes or with empty geometry are
/// dropped and counted, not fatal.
fn read_shard(zip_path: &Path, rows_dropped: &mut usize) -> Result<Vec<ShardFeature>> {
    let scratch = tempfile::tempdir().context("create scratch directory")?;
    common::extract_zip(zip_path, scratch.path())?;

    let shp_path = find_shp(scratch.path())
        .with_context(|| format!("no .shp found inside {}", zip_path.display()))?;

    let mut reader = shapefile::Reader::from_path(&shp_path)
        .with_context(|| format!("Failed to open shapefile: {}", shp_path.display()))?;

    let mut features = Vec::with_capacity(reader.shape_count()?);
    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result.context("Error reading shape+record")?;

        let geom = common::shape_to_multipolygon(shape)?;
        if geom.0.is_empty() {
            *rows_dropped += 1;
            continue;
        }

        let Some(geoid) = feature_geoid(&record) else {
            *rows_dropped += 1;
            continue;
        };

        features.push(ShardFeature {
            geoid,
            geom,
            area_land: numeric_field(&record, &["ALAND", "ALAND20"]),
            area_water: numeric_field(&record, &["AWATER", "AWATER20"]),
        });
    }

    Ok(features)
}

/// Locate the first `.shp` in an extracted shard, whatever its inner layout.
fn find_shp(dir: &Path) -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("shp")))
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}

/// Composite geographic identifier: prefer the precomputed GEOID attribute,
/// fall back to concatenating the FIPS segments. Shard vintages differ in
/// whether attribute names carry a year suffix.
fn feature_geoid(record: &Record) -> Option<String> {
    if let Some(geoid) = character_field(record, &["GEOID", "GEOID20"]) {
        return Some(geoid);
    }
    let state = character_field(record, &["STATEFP", "STATEFP20"])?;
    let county = character_field(record, &["COUNTYFP", "COUNTYFP20"])?;
    let tract = character_field(record, &["TRACTCE", "TRACTCE20"])?;
    Some(format!("{state}{county}{tract}"))
}

fn character_field(record: &Record, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| match record.get(name) {
        Some(FieldValue::Character(Some(s))) => Some(s.trim().to_string()),
        _ => None,
    })
}

fn numeric_field(record: &Record, names: &[&str]) -> Option<f64> {
    names.iter().find_map(|name| match record.get(name) {
        Some(FieldValue::Numeric(Some(n))) => Some(*n),
        Some(FieldValue::Double(n)) => Some(*n),
        Some(FieldValue::Float(Some(n))) => Some(*n as f64),
        Some(FieldValue::Integer(n)) => Some(*n as f64),
        _ => None,
    })
}

use std::{fs::File, path::Path};

use anyhow::{Context, Result};
use polars::{
    frame::DataFrame,
    io::{SerReader, SerWriter},
    prelude::{CsvReader, CsvReadOptions, CsvWriter, ParquetWriter, SchemaRef},
};
use tempfile::NamedTempFile;

/// Reads a CSV file into a Polars DataFrame.
/// `schema_overwrite` forces named columns to a dtype (e.g. keep identifier
/// columns as strings so leading zeros survive inference).
pub(crate) fn read_csv_file(path: &Path, schema_overwrite: Option<SchemaRef>) -> Result<DataFrame> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;

    let options = CsvReadOptions::default().with_schema_overwrite(schema_overwrite);

    let df = CsvReader::new(file)
        .with_options(options)
        .finish()
        .with_context(|| format!("Failed to parse CSV file: {}", path.display()))?;
    Ok(df)
}

/// Reads a headerless CSV file with every column as text.
/// Columns come back positionally named (column_1, column_2, ...).
pub(crate) fn read_headerless_csv_file(path: &Path) -> Result<DataFrame> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;

    let options = CsvReadOptions::default()
        .with_has_header(false)
        .with_infer_schema_length(Some(0)); // 0 => read everything as String

    let df = CsvReader::new(file)
        .with_options(options)
        .finish()
        .with_context(|| format!("Failed to parse CSV file: {}", path.display()))?;
    Ok(df)
}

/// Writes a DataFrame as both `<name>.csv` and `<name>.parquet` under `dir`.
/// Each file is written to a temp file and renamed into place, so a failed
/// run never leaves a partially-written table behind.
pub(crate) fn write_table(dir: &Path, name: &str, df: &DataFrame) -> Result<()> {
    let csv_path = dir.join(format!("{name}.csv"));
    let mut tmp = NamedTempFile::new_in(dir).context("create temp file")?;
    CsvWriter::new(&mut tmp).finish(&mut df.clone())?;
    tmp.persist(&csv_path)
        .with_context(|| format!("rename to {}", csv_path.display()))?;

    let parquet_path = dir.join(format!("{name}.parquet"));
    let mut tmp = NamedTempFile::new_in(dir).context("create temp file")?;
    ParquetWriter::new(&mut tmp).finish(&mut df.clone())?;
    tmp.persist(&parquet_path)
        .with_context(|| format!("rename to {}", parquet_path.display()))?;

    Ok(())
}

use std::path::Path;

use ahash::{AHashMap, AHashSet};
use anyhow::{ensure, Result};
use polars::frame::DataFrame;
use polars::prelude::Column;

use crate::common;
use crate::tracts::TractId;

// 0-based positions in the headerless feed.
const COL_STATE: usize = 2;
const COL_COUNTY: usize = 3;
const COL_TRACT: usize = 4;
const COL_PRINCIPAL_CITY: usize = 5;
const COL_SMALL_COUNTY: usize = 6;
const COL_SPLIT_TRACT: usize = 7;
const COL_DEMOGRAPHICS: usize = 8;
const COL_URBAN_RURAL: usize = 9;
const COL_MEDIAN_FAM_INCOME_MSAMD: usize = 10;
const COL_MEDIAN_HH_INCOME_MSAMD: usize = 11;
const COL_MEDIAN_FAM_INCOME_PCT_MSAMD: usize = 12;
const COL_MEDIAN_FAM_INCOME_FFIEC: usize = 13;
const COL_INCOME_IND: usize = 14;
const COL_POVERTY: usize = 15;
const COL_UNEMPLOYMENT: usize = 16;
const COL_DISTRESSED: usize = 17;
const COL_REMOTE: usize = 18;
const COL_POPULATION: usize = 22;
const MIN_COLUMNS: usize = 23;

/// Density/urbanicity code carried by the feed. The known set is closed;
/// anything else passes through as an opaque code, never rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DensityCode {
    Urban,
    Rural,
    Mixed,
    Other(String),
}

impl DensityCode {
    pub fn parse(code: &str) -> Option<Self> {
        let code = code.trim();
        match code {
            "" => None,
            "U" => Some(Self::Urban),
            "R" => Some(Self::Rural),
            "M" => Some(Self::Mixed),
            other => Some(Self::Other(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Urban => "U",
            Self::Rural => "R",
            Self::Mixed => "M",
            Self::Other(code) => code,
        }
    }
}

/// One normalized demographic row, keyed by composite GEOID.
#[derive(Debug, Clone)]
pub struct TractProfile {
    pub id: TractId,
    pub population: i64,
    /// Raw income indicator digit plus its mapped label.
    pub income_ind: String,
    pub income_class: Option<&'static str>,
    /// Low-or-moderate income: income indicator 1 or 2.
    pub lmi: bool,
    pub poverty: bool,
    pub unemployment: bool,
    pub distressed: bool,
    pub remote_area: bool,
    pub principal_city: String,
    pub small_county: String,
    pub split_tract: String,
    pub demographics_ind: String,
    pub density: Option<DensityCode>,
    pub median_fam_income_msamd: Option<f64>,
    pub median_hh_income_msamd: Option<f64>,
    pub median_fam_income_pct_msamd: Option<f64>,
    pub median_fam_income_ffiec: Option<f64>,
}

/// Normalized demographic table, keyed uniquely by GEOID.
/// Duplicate keys resolve last-write-wins.
#[derive(Debug)]
pub struct CensusTable {
    profiles: AHashMap<TractId, TractProfile>,
    /// Rows keyed successfully.
    pub rows: usize,
    /// Rows skipped for a missing population value.
    pub rows_skipped: usize,
}

impl CensusTable {
    /// Parse the headerless fixed-column feed. Every field is read as text;
    /// identifier segments are zero-padded (or left-truncated) to their fixed
    /// widths and the tract code's implied decimal point is stripped.
    pub fn load(path: &Path) -> Result<Self> {
        let df = common::data::read_headerless_csv_file(path)?;
        ensure!(
            df.width() >= MIN_COLUMNS,
            "demographic feed {} has {} columns, expected at least {MIN_COLUMNS}",
            path.display(),
            df.width()
        );

        let columns = df.get_columns();
        let mut profiles = AHashMap::with_capacity(df.height());
        let mut rows = 0usize;
        let mut rows_skipped = 0usize;

        for i in 0..df.height() {
            let field = |idx: usize| -> Result<&str> {
                Ok(columns[idx].str()?.get(i).unwrap_or(""))
            };

            // Rows without a population value carry nothing we aggregate; skip.
            let pop_text = field(COL_POPULATION)?.trim().replace(',', "");
            if pop_text.is_empty() {
                rows_skipped += 1;
                continue;
            }
            let population = pop_text.parse::<i64>().unwrap_or(0);

            let state = pad_code(field(COL_STATE)?, 2);
            let county = pad_code(field(COL_COUNTY)?, 3);
            let tract = pad_code(&field(COL_TRACT)?.replace('.', ""), 6);
            let id = TractId::from_parts(&state, &county, &tract);

            let income_ind = field(COL_INCOME_IND)?.trim().to_string();
            let profile = TractProfile {
                id: id.clone(),
                population,
                income_class: income_class_label(&income_ind),
                lmi: matches!(income_ind.as_str(), "1" | "2"),
                income_ind,
                poverty: field(COL_POVERTY)?.trim() == "X",
                unemployment: field(COL_UNEMPLOYMENT)?.trim() == "X",
                distressed: field(COL_DISTRESSED)?.trim() == "X",
                remote_area: field(COL_REMOTE)?.trim() == "X",
                principal_city: field(COL_PRINCIPAL_CITY)?.trim().to_string(),
                small_county: field(COL_SMALL_COUNTY)?.trim().to_string(),
                split_tract: field(COL_SPLIT_TRACT)?.trim().to_string(),
                demographics_ind: field(COL_DEMOGRAPHICS)?.trim().to_string(),
                density: DensityCode::parse(field(COL_URBAN_RURAL)?),
                median_fam_income_msamd: parse_decimal(field(COL_MEDIAN_FAM_INCOME_MSAMD)?),
                median_hh_income_msamd: parse_decimal(field(COL_MEDIAN_HH_INCOME_MSAMD)?),
                median_fam_income_pct_msamd: parse_decimal(field(COL_MEDIAN_FAM_INCOME_PCT_MSAMD)?),
                median_fam_income_ffiec: parse_decimal(field(COL_MEDIAN_FAM_INCOME_FFIEC)?),
            };

            profiles.insert(id, profile);
            rows += 1;
        }

        Ok(Self { profiles, rows, rows_skipped })
    }

    pub fn get(&self, id: &TractId) -> Option<&TractProfile> {
        self.profiles.get(id)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Look up populations for a set of tract ids: (sum, distinct unmatched).
    /// Unmatched keys contribute zero, never an error.
    pub fn population_sum<'a>(
        &self,
        ids: impl Iterator<Item = &'a TractId>,
        unmatched: &mut AHashSet<TractId>,
    ) -> i64 {
        ids.map(|id| match self.profiles.get(id) {
            Some(profile) => profile.population,
            None => {
                unmatched.insert(id.clone());
                0
            }
        })
        .sum()
    }

    /// Full normalized table as a DataFrame, sorted by GEOID.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut sorted: Vec<&TractProfile> = self.profiles.values().collect();
        sorted.sort_by(|a, b| a.id.cmp(&b.id));

        let df = DataFrame::new(vec![
            Column::new("geoid".into(), sorted.iter().map(|p| p.id.as_str()).collect::<Vec<_>>()),
            Column::new("state_fips".into(), sorted.iter().map(|p| p.id.state_fips()).collect::<Vec<_>>()),
            Column::new("county_fips".into(), sorted.iter().map(|p| p.id.county_fips()).collect::<Vec<_>>()),
            Column::new("tract".into(), sorted.iter().map(|p| p.id.tract_code()).collect::<Vec<_>>()),
            Column::new("population".into(), sorted.iter().map(|p| p.population).collect::<Vec<_>>()),
            Column::new("cra_income_ind".into(), sorted.iter().map(|p| p.income_ind.as_str()).collect::<Vec<_>>()),
            Column::new("cra_income_class".into(), sorted.iter().map(|p| p.income_class).collect::<Vec<_>>()),
            Column::new("lmi_ind".into(), sorted.iter().map(|p| p.lmi as i32).collect::<Vec<_>>()),
            Column::new("cra_poverty".into(), sorted.iter().map(|p| p.poverty as i32).collect::<Vec<_>>()),
            Column::new("cra_unemployment".into(), sorted.iter().map(|p| p.unemployment as i32).collect::<Vec<_>>()),
            Column::new("cra_distressed".into(), sorted.iter().map(|p| p.distressed as i32).collect::<Vec<_>>()),
            Column::new("cra_remote_area".into(), sorted.iter().map(|p| p.remote_area as i32).collect::<Vec<_>>()),
            Column::new("principal_city".into(), sorted.iter().map(|p| p.principal_city.as_str()).collect::<Vec<_>>()),
            Column::new("small_county".into(), sorted.iter().map(|p| p.small_county.as_str()).collect::<Vec<_>>()),
            Column::new("split_tract".into(), sorted.iter().map(|p| p.split_tract.as_str()).collect::<Vec<_>>()),
            Column::new("demographics_ind".into(), sorted.iter().map(|p| p.demographics_ind.as_str()).collect::<Vec<_>>()),
            Column::new("urban_rural_ind".into(), sorted.iter().map(|p| p.density.as_ref().map(|d| d.as_str().to_string())).collect::<Vec<_>>()),
            Column::new("median_fam_income_msamd".into(), sorted.iter().map(|p| p.median_fam_income_msamd).collect::<Vec<_>>()),
            Column::new("median_hh_income_msamd".into(), sorted.iter().map(|p| p.median_hh_income_msamd).collect::<Vec<_>>()),
            Column::new("median_fam_income_prcnt_msamd".into(), sorted.iter().map(|p| p.median_fam_income_pct_msamd).collect::<Vec<_>>()),
            Column::new("median_fam_income_ffiec".into(), sorted.iter().map(|p| p.median_fam_income_ffiec).collect::<Vec<_>>()),
        ])?;
        Ok(df)
    }
}

/// SQL-style lpad with '0': pad to `width`, or keep only the leftmost
/// `width` characters when the trimmed value is longer. Counts characters,
/// not bytes; the feed is external data and may carry anything.
pub(crate) fn pad_code(raw: &str, width: usize) -> String {
    let s = raw.trim();
    if s.chars().count() >= width {
        s.chars().take(width).collect()
    } else {
        format!("{s:0>width$}")
    }
}

fn income_class_label(income_ind: &str) -> Option<&'static str> {
    match income_ind {
        "1" => Some("low"),
        "2" => Some("moderate"),
        "3" => Some("middle"),
        "4" => Some("upper"),
        "0" => Some("NA"),
        _ => None,
    }
}

fn parse_decimal(raw: &str) -> Option<f64> {
    let s = raw.trim().replace(',', "");
    if s.is_empty() {
        return None;
    }
    s.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    /// A feed row with the keyed fields filled and the rest blank.
    fn feed_row(state: &str, county: &str, tract: &str, urban: &str, income: &str, pop: &str) -> String {
        let mut fields = vec![String::new(); MIN_COLUMNS];
        fields[0] = "2025".to_string();
        fields[COL_STATE] = state.to_string();
        fields[COL_COUNTY] = county.to_string();
        fields[COL_TRACT] = tract.to_string();
        fields[COL_URBAN_RURAL] = urban.to_string();
        fields[COL_INCOME_IND] = income.to_string();
        fields[COL_POPULATION] = if pop.contains(',') { format!("\"{pop}\"") } else { pop.to_string() };
        fields.join(",")
    }

    fn load_from_rows(rows: &[String]) -> Result<CensusTable> {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", rows.join("\n")).unwrap();
        file.flush().unwrap();
        CensusTable::load(file.path())
    }

    #[test]
    fn pad_code_pads_and_truncates() {
        assert_eq!(pad_code("48", 2), "48");
        assert_eq!(pad_code("1", 3), "001");
        assert_eq!(pad_code(" 45 ", 6), "000045");
        // Longer than the fixed width keeps the leftmost characters.
        assert_eq!(pad_code("0123450", 6), "012345");
    }

    #[test]
    fn pad_code_truncates_on_char_boundaries() {
        // Multi-byte character spanning the byte cut must not panic.
        assert_eq!(pad_code("12345é7", 6), "12345é");
        assert_eq!(pad_code("é", 3), "00é");
    }

    #[test]
    fn implied_decimal_is_stripped_from_tract_code() {
        let table = load_from_rows(&[feed_row("48", "113", "0123.45", "U", "3", "1000")]).unwrap();
        let profile = table.get(&TractId::new("48113012345")).unwrap();
        assert_eq!(profile.id.tract_code(), "012345");
        assert_eq!(profile.population, 1000);
    }

    #[test]
    fn overlong_tract_code_truncates_to_width() {
        // "0123450" with its implied decimal already stripped upstream.
        let table = load_from_rows(&[feed_row("48", "113", "0123450", "U", "3", "10")]).unwrap();
        assert!(table.get(&TractId::new("48113012345")).is_some());
    }

    #[test]
    fn population_comma_separators_are_stripped() {
        let table = load_from_rows(&[feed_row("48", "113", "9501.00", "U", "3", "1,234")]).unwrap();
        let profile = table.get(&TractId::new("48113950100")).unwrap();
        assert_eq!(profile.population, 1234);
    }

    #[test]
    fn missing_population_skips_the_row() {
        let table = load_from_rows(&[
            feed_row("48", "113", "9501.00", "U", "3", ""),
            feed_row("48", "113", "9502.00", "R", "2", "700"),
        ])
        .unwrap();
        assert_eq!(table.rows, 1);
        assert_eq!(table.rows_skipped, 1);
        assert!(table.get(&TractId::new("48113950100")).is_none());
    }

    #[test]
    fn duplicate_geoid_is_last_write_wins() {
        let table = load_from_rows(&[
            feed_row("48", "113", "9501.00", "U", "3", "100"),
            feed_row("48", "113", "9501.00", "R", "2", "200"),
        ])
        .unwrap();
        assert_eq!(table.len(), 1);
        let profile = table.get(&TractId::new("48113950100")).unwrap();
        assert_eq!(profile.population, 200);
        assert_eq!(profile.density, Some(DensityCode::Rural));
    }

    #[test]
    fn unknown_density_code_passes_through() {
        let table = load_from_rows(&[feed_row("48", "113", "9501.00", "Z", "3", "10")]).unwrap();
        let profile = table.get(&TractId::new("48113950100")).unwrap();
        assert_eq!(profile.density, Some(DensityCode::Other("Z".to_string())));
        assert_eq!(profile.density.as_ref().unwrap().as_str(), "Z");
    }

    #[test]
    fn income_class_maps_documented_codes() {
        let table = load_from_rows(&[
            feed_row("48", "001", "9501.00", "U", "1", "10"),
            feed_row("48", "002", "9501.00", "U", "4", "10"),
            feed_row("48", "003", "9501.00", "U", "9", "10"),
        ])
        .unwrap();
        let low = table.get(&TractId::new("48001950100")).unwrap();
        assert_eq!(low.income_class, Some("low"));
        assert!(low.lmi);
        let upper = table.get(&TractId::new("48002950100")).unwrap();
        assert_eq!(upper.income_class, Some("upper"));
        assert!(!upper.lmi);
        let unknown = table.get(&TractId::new("48003950100")).unwrap();
        assert_eq!(unknown.income_class, None);
    }

    #[test]
    fn population_sum_counts_unmatched_keys() {
        let table = load_from_rows(&[feed_row("48", "113", "9501.00", "U", "3", "500")]).unwrap();
        let ids = vec![TractId::new("48113950100"), TractId::new("48113999999")];
        let mut unmatched = AHashSet::new();
        let sum = table.population_sum(ids.iter(), &mut unmatched);
        assert_eq!(sum, 500);
        assert_eq!(unmatched.len(), 1);
        assert!(unmatched.contains(&TractId::new("48113999999")));
    }
}

pub(crate) mod shard;
mod store;

use std::fmt;
use std::sync::Arc;

pub(crate) use shard::{load_shards, ShardLoad};
pub use store::{TractPolygon, TractStore};

/// Stable key for a census tract: the 11-character composite GEOID
/// (2-digit state FIPS ∥ 3-digit county FIPS ∥ 6-digit tract code).
/// Keeps the original text (leading zeros included) behind a cheap clone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TractId(Arc<str>);

impl TractId {
    pub fn new(geoid: &str) -> Self {
        Self(Arc::from(geoid))
    }

    pub fn from_parts(state: &str, county: &str, tract: &str) -> Self {
        Self(Arc::from(format!("{state}{county}{tract}").as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 2 characters: state FIPS code.
    pub fn state_fips(&self) -> &str {
        &self.0[..char_boundary(&self.0, 2)]
    }

    /// Characters 2..5: county FIPS code.
    pub fn county_fips(&self) -> &str {
        &self.0[char_boundary(&self.0, 2)..char_boundary(&self.0, 5)]
    }

    /// Characters 5..: tract code.
    pub fn tract_code(&self) -> &str {
        &self.0[char_boundary(&self.0, 5)..]
    }
}

/// Byte offset of the `n`th character, or the string's end when shorter.
/// Identifiers come from shapefile attributes and are not guaranteed ASCII.
fn char_boundary(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map_or(s.len(), |(i, _)| i)
}

impl fmt::Display for TractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_splits_into_fips_segments() {
        let id = TractId::new("48113950100");
        assert_eq!(id.state_fips(), "48");
        assert_eq!(id.county_fips(), "113");
        assert_eq!(id.tract_code(), "950100");
    }

    #[test]
    fn from_parts_concatenates() {
        let id = TractId::from_parts("01", "001", "020100");
        assert_eq!(id.as_str(), "01001020100");
    }

    #[test]
    fn short_id_does_not_panic() {
        let id = TractId::new("481");
        assert_eq!(id.state_fips(), "48");
        assert_eq!(id.county_fips(), "1");
        assert_eq!(id.tract_code(), "");
    }

    #[test]
    fn non_ascii_id_splits_on_char_boundaries() {
        let id = TractId::new("48é13950100");
        assert_eq!(id.state_fips(), "48");
        assert_eq!(id.county_fips(), "é13");
        assert_eq!(id.tract_code(), "950100");
    }

    #[test]
    fn ordering_is_lexicographic() {
        let a = TractId::new("01001020100");
        let b = TractId::new("48113950100");
        assert!(a < b);
    }
}

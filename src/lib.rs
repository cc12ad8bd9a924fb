#![doc = "Catchment analytics public API"]
mod aggregate;
mod census;
pub mod cli;
pub mod commands;
mod common;
mod config;
mod facility;
mod geodesy;
mod pipeline;
mod report;
mod resolve;
mod tracts;

#[doc(inline)]
pub use census::{CensusTable, DensityCode, TractProfile};

#[doc(inline)]
pub use config::{OutputToggles, PipelineConfig, RadiusTier};

#[doc(inline)]
pub use facility::{Facility, FacilityTable};

#[doc(inline)]
pub use geodesy::{CrsTransform, Wgs84ToNad83};

#[doc(inline)]
pub use pipeline::run;

#[doc(inline)]
pub use report::RunReport;

#[doc(inline)]
pub use tracts::{TractId, TractPolygon, TractStore};

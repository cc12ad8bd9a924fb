mod fs;
mod polygon;

pub(crate) mod data;

pub(crate) use fs::*;
pub(crate) use polygon::*;

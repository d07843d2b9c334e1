// src/normalize/mod.rs
//! Leaf normalizers shared by the event and news pipelines: dates, locations, regions.

pub mod date;
pub mod location;
pub mod region;

pub use date::{infer_year_from_heading, normalize_partial_date, DateSpan};
pub use location::{canonical_region, normalize_location, title_case, Location};
pub use region::{
    infer_regions, infer_regions_from_source, infer_regions_with_fallback, primary_region,
    RegionTable, GLOBAL_REGION,
};

//! Transformation module.
//!
//! Turns raw registry records into geocoded transactions:
//! - Row: field conversion of one record
//! - Pipeline: filter, parse, geocode and emit over whole files

pub mod pipeline;
pub mod row;

pub use pipeline::*;
pub use row::parse_row;

pub mod decoder;
pub mod error;
pub mod geo_distance;
pub mod reader;

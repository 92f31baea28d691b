pub mod archive_reader;
pub mod cache_reader;
pub mod cache_selector;
pub mod data_loader;
pub mod error;

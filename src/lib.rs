//! Mineralpedia - crawler for the Dakota Matrix mineral encyclopedia.
//!
//! Walks the paginated listing, extracts the physical attributes and image
//! links of every mineral entry, exports them to a delimited file and
//! downloads the referenced images.

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod scrapers;
pub mod services;
pub mod utils;

pub use error::CrawlError;

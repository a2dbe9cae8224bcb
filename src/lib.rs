//! # straindb
//!
//! A pipeline for normalizing free-text laboratory strain records into clean
//! relational tables ready for database load.
//!
//! ## Features
//!
//! - Genotype notation parsing into structured, serializable documents
//! - Allele name validation, suffix cleaning and classification
//! - Per-table row filtering with per-fault rejected-row logs
//! - Flattening of parsed genotypes into a strain/allele join table
//! - Multi-threaded genotype parsing for large exports
//! - Transparent reading of gzipped raw exports

pub mod config;
pub mod errorlog;
pub mod fileio;
pub mod filter;
pub mod normalize;
pub mod parsers;
pub mod types;

// Re-export key types
pub use config::Config;
pub use errorlog::{RowFault, TableStats};
pub use filter::FilterPass;
pub use parsers::{AlleleClassifier, GenotypeParser, InvalidAlleleName};
pub use types::*;

//! Parsers for the two free-text notations carried by the raw tables:
//! genotype strings on strain rows and allele names on allele rows.

pub mod allele;
pub mod genotype;

pub use allele::{AlleleClassifier, InvalidAlleleName};
pub use genotype::GenotypeParser;

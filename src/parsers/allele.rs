use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use crate::types::AlleleClass;

lazy_static! {
    // Whole-name shape: alternating alpha/numeric runs with an optional
    // lowercase tail, e.g. `tm290`, `nsIs53`, `e1370lf`
    static ref RE_NAME: Regex = Regex::new(r"^([a-zA-Z]+[0-9]+[a-z]*)+$").unwrap();
    static ref RE_SUFFIX: Regex = Regex::new(r"[a-z]+$").unwrap();
    static ref RE_MUTANT: Regex = Regex::new(r"^([a-z]{1,3}[0-9]+)+$").unwrap();
    static ref RE_TRANSGENE: Regex = Regex::new(r"^[a-z]{1,3}(Ex|Is|Si)[0-9]+$").unwrap();
    static ref RE_REARRANGEMENT: Regex = Regex::new(r"^[a-z]{1,3}(T|C|In|Df)[0-9]+$").unwrap();
}

/// An allele name that fails the lexical shape check
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid allele name: {0:?}")]
pub struct InvalidAlleleName(pub String);

/// Validates, cleans and categorizes raw allele names
pub struct AlleleClassifier;

impl AlleleClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Validate `raw`, strip any trailing lowercase isoform suffix, and
    /// classify the cleaned name.
    ///
    /// Malformed names are an expected, common case and come back as a
    /// normal `Err` value, never a panic.
    pub fn classify(&self, raw: &str) -> Result<(String, AlleleClass), InvalidAlleleName> {
        if raw.is_empty() || !RE_NAME.is_match(raw) {
            return Err(InvalidAlleleName(raw.to_string()));
        }

        // Isoform suffix letters are not part of the core identifier
        let cleaned = RE_SUFFIX.replace(raw, "").into_owned();

        let class = if RE_MUTANT.is_match(&cleaned) {
            AlleleClass::Mutant
        } else if RE_TRANSGENE.is_match(&cleaned) {
            AlleleClass::Transgene
        } else if RE_REARRANGEMENT.is_match(&cleaned) {
            AlleleClass::Rearrangement
        } else {
            AlleleClass::Other
        };

        Ok((cleaned, class))
    }
}

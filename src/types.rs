use serde::{Deserialize, Serialize};
use std::fmt;

/// Chromosomes that may scope a genotype clause
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Chromosome {
    I,
    II,
    III,
    IV,
    V,
    X,
}

impl Chromosome {
    /// Look up a chromosome by its label as written in genotype notation
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "I" => Some(Chromosome::I),
            "II" => Some(Chromosome::II),
            "III" => Some(Chromosome::III),
            "IV" => Some(Chromosome::IV),
            "V" => Some(Chromosome::V),
            "X" => Some(Chromosome::X),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Chromosome::I => "I",
            Chromosome::II => "II",
            Chromosome::III => "III",
            Chromosome::IV => "IV",
            Chromosome::V => "V",
            Chromosome::X => "X",
        }
    }
}

impl fmt::Display for Chromosome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Category assigned to a cleaned allele name
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AlleleClass {
    Mutant,
    Transgene,
    Rearrangement,
    Other,
}

impl AlleleClass {
    /// Lowercase name used in the output tables
    pub fn as_str(&self) -> &'static str {
        match self {
            AlleleClass::Mutant => "mutant",
            AlleleClass::Transgene => "transgene",
            AlleleClass::Rearrangement => "rearrangement",
            AlleleClass::Other => "other",
        }
    }
}

impl fmt::Display for AlleleClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single allele occurrence within one allele set
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlleleRecord {
    pub allele_name: String,
    /// Present only when the source text used the `gene(allele)` form
    pub gene_name: Option<String>,
    /// True iff the clause has two-set shape and this allele name is absent
    /// from the opposing set
    pub heterozygous: bool,
}

/// The alleles written on one homologous chromosome copy
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct AlleleSet {
    pub records: Vec<AlleleRecord>,
}

impl AlleleSet {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// One `;`-delimited, chromosome-scoped segment of a genotype
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Clause {
    pub chromosome: Option<Chromosome>,
    /// One entry for a single-copy clause, two for `/`-separated diploid
    /// notation; position + 1 is the set's binary id in the output tables
    pub allele_sets: Vec<AlleleSet>,
}

/// Structured form of a whole genotype string
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct GenotypeDocument {
    pub clauses: Vec<Clause>,
}

impl GenotypeDocument {
    /// Total number of allele records across all clauses and sets
    pub fn allele_count(&self) -> usize {
        self.clauses
            .iter()
            .flat_map(|c| c.allele_sets.iter())
            .map(|s| s.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_document() -> GenotypeDocument {
        GenotypeDocument {
            clauses: vec![Clause {
                chromosome: Some(Chromosome::III),
                allele_sets: vec![
                    AlleleSet {
                        records: vec![AlleleRecord {
                            allele_name: "tm290".to_string(),
                            gene_name: None,
                            heterozygous: true,
                        }],
                    },
                    AlleleSet {
                        records: vec![AlleleRecord {
                            allele_name: "e200".to_string(),
                            gene_name: Some("dec-2".to_string()),
                            heterozygous: true,
                        }],
                    },
                ],
            }],
        }
    }

    #[test]
    fn document_serializes_as_a_clause_array() {
        let json = serde_json::to_string(&sample_document()).unwrap();
        assert_eq!(
            json,
            r#"[{"chromosome":"III","allele_sets":[[{"allele_name":"tm290","gene_name":null,"heterozygous":true}],[{"allele_name":"e200","gene_name":"dec-2","heterozygous":true}]]}]"#
        );
    }

    #[test]
    fn allele_count_spans_clauses_and_sets() {
        assert_eq!(sample_document().allele_count(), 2);
        assert_eq!(GenotypeDocument::default().allele_count(), 0);
    }

    #[test]
    fn chromosome_labels_round_trip() {
        for label in ["I", "II", "III", "IV", "V", "X"] {
            assert_eq!(Chromosome::from_label(label).unwrap().label(), label);
        }
        assert_eq!(Chromosome::from_label("XI"), None);
    }
}

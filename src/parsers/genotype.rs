use lazy_static::lazy_static;
use regex::Regex;

use crate::types::{AlleleRecord, AlleleSet, Chromosome, Clause, GenotypeDocument};

lazy_static! {
    // Bracketed construct annotations and stock line notes carry no
    // genetic payload and are removed before anything else runs
    static ref RE_BRACKETED: Regex = Regex::new(r"\[.*?\]").unwrap();
    static ref RE_LINE_NOTE: Regex = Regex::new(r"\(line [0-9]+\)").unwrap();
    static ref RE_CLAUSE_SPLIT: Regex = Regex::new(r"\s*;\s*").unwrap();
    // Lazy body so a trailing roman numeral is claimed by the chromosome
    // group whenever the remainder allows it
    static ref RE_CLAUSE: Regex =
        Regex::new(r"^(?P<body>[-+.()a-zA-Z0-9\s/]+?)\s*(?P<chrom>I|II|III|IV|V|X)?$").unwrap();
    static ref RE_SET_SPLIT: Regex = Regex::new(r"\s*/\s*").unwrap();
    static ref RE_GENE_ALLELE: Regex =
        Regex::new(r"^(?P<gene>[-.a-zA-Z0-9]+)\s*\((?P<allele>[-a-zA-Z0-9]+)\)").unwrap();
    static ref RE_BARE_ALLELE: Regex = Regex::new(r"^[-a-zA-Z0-9]+").unwrap();
}

/// A single allele hit from the token scan, tagged by which shape matched
#[derive(Debug, PartialEq, Eq)]
enum AlleleToken<'a> {
    /// `gene(allele)`
    GeneAllele { gene: &'a str, allele: &'a str },
    /// A lone allele or balancer name
    Bare { allele: &'a str },
}

impl<'a> AlleleToken<'a> {
    fn allele(&self) -> &'a str {
        match self {
            AlleleToken::GeneAllele { allele, .. } | AlleleToken::Bare { allele } => allele,
        }
    }

    fn gene(&self) -> Option<&'a str> {
        match self {
            AlleleToken::GeneAllele { gene, .. } => Some(gene),
            AlleleToken::Bare { .. } => None,
        }
    }
}

/// Parses free-text genotype notation into a structured document
pub struct GenotypeParser;

impl GenotypeParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse one genotype string.
    ///
    /// Returns `None` when any clause fails to match, so a partially
    /// readable genotype is rejected as a whole rather than silently
    /// losing clauses.
    pub fn parse(&self, raw: &str) -> Option<GenotypeDocument> {
        let trimmed = raw.trim();
        let no_brackets = RE_BRACKETED.replace_all(trimmed, "");
        let cleaned = RE_LINE_NOTE.replace_all(&no_brackets, "");

        let mut clauses = Vec::new();
        for clause_text in RE_CLAUSE_SPLIT.split(&cleaned) {
            clauses.push(self.parse_clause(clause_text)?);
        }
        Some(GenotypeDocument { clauses })
    }

    fn parse_clause(&self, clause: &str) -> Option<Clause> {
        let caps = RE_CLAUSE.captures(clause)?;
        let body = caps.name("body")?.as_str();
        let chromosome = caps
            .name("chrom")
            .and_then(|m| Chromosome::from_label(m.as_str()));

        let segments: Vec<&str> = RE_SET_SPLIT.split(body).collect();
        let diploid = segments.len() == 2;

        // A wild-type homolog is not tracked as an allele record, but the
        // clause keeps its two-set shape for zygosity purposes
        let mut kept = segments;
        if diploid {
            if let Some(pos) = kept.iter().position(|s| *s == "+") {
                kept.remove(pos);
            }
        }

        let token_sets: Vec<Vec<AlleleToken>> =
            kept.iter().map(|set| extract_alleles(set)).collect();

        let mut allele_sets = Vec::with_capacity(token_sets.len());
        for (idx, tokens) in token_sets.iter().enumerate() {
            let records = tokens
                .iter()
                .map(|token| AlleleRecord {
                    allele_name: token.allele().to_string(),
                    gene_name: token.gene().map(str::to_string),
                    heterozygous: diploid && !in_opposing_set(&token_sets, idx, token.allele()),
                })
                .collect();
            allele_sets.push(AlleleSet { records });
        }

        Some(Clause {
            chromosome,
            allele_sets,
        })
    }
}

/// True when `name` also occurs in the set opposite `idx`.
/// Only meaningful for two-set clauses.
fn in_opposing_set(sets: &[Vec<AlleleToken>], idx: usize, name: &str) -> bool {
    sets.len() == 2 && sets[1 - idx].iter().any(|token| token.allele() == name)
}

/// Scan one homolog segment left to right, trying the `gene(allele)` shape
/// first and a bare token second at each position; characters matching
/// neither are skipped.
fn extract_alleles(text: &str) -> Vec<AlleleToken<'_>> {
    let mut tokens = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        if let Some((token, end)) = match_gene_allele(rest) {
            tokens.push(token);
            rest = &rest[end..];
        } else if let Some(found) = RE_BARE_ALLELE.find(rest) {
            tokens.push(AlleleToken::Bare {
                allele: found.as_str(),
            });
            rest = &rest[found.end()..];
        } else {
            let skip = rest.chars().next().map_or(1, char::len_utf8);
            rest = &rest[skip..];
        }
    }
    tokens
}

fn match_gene_allele(text: &str) -> Option<(AlleleToken<'_>, usize)> {
    let caps = RE_GENE_ALLELE.captures(text)?;
    let end = caps.get(0)?.end();
    let gene = caps.name("gene")?.as_str();
    let allele = caps.name("allele")?.as_str();
    Some((AlleleToken::GeneAllele { gene, allele }, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(name: &str, gene: Option<&str>, heterozygous: bool) -> AlleleRecord {
        AlleleRecord {
            allele_name: name.to_string(),
            gene_name: gene.map(str::to_string),
            heterozygous,
        }
    }

    fn parse(genotype: &str) -> Option<GenotypeDocument> {
        GenotypeParser::new().parse(genotype)
    }

    #[test]
    fn splits_homologs_and_marks_zygosity() {
        let doc = parse("e123/dec-2(e200) e321 X").unwrap();
        assert_eq!(doc.clauses.len(), 1);
        let clause = &doc.clauses[0];
        assert_eq!(clause.chromosome, Some(Chromosome::X));
        assert_eq!(clause.allele_sets.len(), 2);
        assert_eq!(
            clause.allele_sets[0].records,
            vec![record("e123", None, true)]
        );
        assert_eq!(
            clause.allele_sets[1].records,
            vec![
                record("e200", Some("dec-2"), true),
                record("e321", None, true)
            ]
        );
    }

    #[test]
    fn single_set_clause_is_never_heterozygous() {
        let doc = parse("bec-1").unwrap();
        assert_eq!(doc.clauses.len(), 1);
        let clause = &doc.clauses[0];
        assert_eq!(clause.chromosome, None);
        assert_eq!(clause.allele_sets.len(), 1);
        assert_eq!(
            clause.allele_sets[0].records,
            vec![record("bec-1", None, false)]
        );
    }

    #[test]
    fn same_allele_on_both_homologs_is_homozygous() {
        let doc = parse("ok700/ok700 II").unwrap();
        let clause = &doc.clauses[0];
        assert_eq!(clause.chromosome, Some(Chromosome::II));
        assert_eq!(clause.allele_sets.len(), 2);
        for set in &clause.allele_sets {
            assert_eq!(set.records, vec![record("ok700", None, false)]);
        }
    }

    #[test]
    fn keeps_clause_order() {
        let doc = parse("ced-3 (n717) IV; ok700/nT1 (qIs51); bec-1").unwrap();
        assert_eq!(doc.clauses.len(), 3);

        assert_eq!(doc.clauses[0].chromosome, Some(Chromosome::IV));
        assert_eq!(doc.clauses[0].allele_sets.len(), 1);
        assert_eq!(
            doc.clauses[0].allele_sets[0].records,
            vec![record("n717", Some("ced-3"), false)]
        );

        assert_eq!(doc.clauses[1].chromosome, None);
        assert_eq!(doc.clauses[1].allele_sets.len(), 2);
        assert_eq!(
            doc.clauses[1].allele_sets[0].records,
            vec![record("ok700", None, true)]
        );
        assert_eq!(
            doc.clauses[1].allele_sets[1].records,
            vec![record("qIs51", Some("nT1"), true)]
        );

        assert_eq!(doc.clauses[2].chromosome, None);
        assert_eq!(
            doc.clauses[2].allele_sets[0].records,
            vec![record("bec-1", None, false)]
        );
    }

    #[test]
    fn wild_type_homolog_is_dropped_but_keeps_heterozygosity() {
        let doc = parse("e123/+ II").unwrap();
        let clause = &doc.clauses[0];
        assert_eq!(clause.chromosome, Some(Chromosome::II));
        assert_eq!(clause.allele_sets.len(), 1);
        assert_eq!(
            clause.allele_sets[0].records,
            vec![record("e123", None, true)]
        );

        let flipped = parse("+/e123 II").unwrap();
        assert_eq!(flipped.clauses[0], doc.clauses[0]);
    }

    #[test]
    fn three_homolog_segments_each_become_a_set() {
        let doc = parse("tm290/e189/e200").unwrap();
        let clause = &doc.clauses[0];
        assert_eq!(clause.allele_sets.len(), 3);
        for set in &clause.allele_sets {
            assert_eq!(set.len(), 1);
            assert!(!set.records[0].heterozygous);
        }
    }

    #[test]
    fn strips_bracketed_annotations_and_line_notes() {
        let doc = parse("nsIs53 [pNAS88 unc-5p::GFP] X; e123 (line 12) II").unwrap();
        assert_eq!(doc.clauses.len(), 2);
        assert_eq!(doc.clauses[0].chromosome, Some(Chromosome::X));
        assert_eq!(
            doc.clauses[0].allele_sets[0].records,
            vec![record("nsIs53", None, false)]
        );
        assert_eq!(doc.clauses[1].chromosome, Some(Chromosome::II));
        assert_eq!(
            doc.clauses[1].allele_sets[0].records,
            vec![record("e123", None, false)]
        );
    }

    #[test]
    fn chromosome_label_takes_the_longest_roman_numeral() {
        let doc = parse("tm290/e189 III").unwrap();
        assert_eq!(doc.clauses[0].chromosome, Some(Chromosome::III));
        let sets = &doc.clauses[0].allele_sets;
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].records, vec![record("tm290", None, true)]);
        assert_eq!(sets[1].records, vec![record("e189", None, true)]);
    }

    #[test]
    fn chromosome_only_clause_keeps_an_empty_allele_set() {
        let doc = parse("[pJM20] V").unwrap();
        let clause = &doc.clauses[0];
        assert_eq!(clause.chromosome, Some(Chromosome::V));
        assert_eq!(clause.allele_sets.len(), 1);
        assert!(clause.allele_sets[0].is_empty());
    }

    #[test]
    fn disallowed_characters_fail_the_whole_parse() {
        assert_eq!(parse("abc#def"), None);
        assert_eq!(parse("e123 II; abc#def"), None);
        assert_eq!(parse(""), None);
        assert_eq!(parse("   "), None);
    }

    #[test]
    fn document_survives_the_intermediate_json_column() {
        let doc = parse("ced-3 (n717) IV; ok700/nT1 (qIs51)").unwrap();
        let json = serde_json::to_string(&doc).unwrap();
        let back: GenotypeDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(doc, back);
    }
}

use anyhow::{Context, Result};
use csv::StringRecord;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::info;

use crate::config::Config;
use crate::fileio::{csv_reader, csv_writer};
use crate::types::GenotypeDocument;

// Column positions of the filtered tables written by the filter pass
const STRAIN_LINE: usize = 0;
const STRAIN_NAME: usize = 1;
const STRAIN_GENOTYPE: usize = 2;
const STRAIN_SOURCE: usize = 3;
const STRAIN_OTHER_NAMES: usize = 4;
const STRAIN_COMMENT: usize = 5;

const ALLELE_LINE: usize = 0;
const ALLELE_NAME: usize = 1;
const ALLELE_TYPE: usize = 2;
const ALLELE_GENE: usize = 3;
const ALLELE_PLASMIDS: usize = 4;
const ALLELE_COMMENT: usize = 5;

const STRAIN_ALLELE_HEADER: [&str; 10] = [
    "strain_original_line_number",
    "strain_name",
    "chromosome",
    "alleleset_binaryid",
    "allele_name",
    "gene_name",
    "heterozygous",
    "source",
    "other_name",
    "comment",
];

const ALLELE_HEADER: [&str; 6] = [
    "allele_original_line_number",
    "allele_name",
    "allele_type",
    "gene_name",
    "plasmid_name",
    "comment",
];

lazy_static! {
    static ref RE_PLASMID_SPLIT: Regex = Regex::new(r"\s*[,;]\s*").unwrap();
}

/// Flatten both filtered tables. Returns the data row counts of
/// `strain_allele.csv` and `allele.csv`.
pub fn run(config: &Config) -> Result<(u64, u64)> {
    let strain_rows = normalize_strains(config)?;
    let allele_rows = normalize_alleles(config)?;
    Ok((strain_rows, allele_rows))
}

/// Flatten the genotype column into `strain_allele.csv`: one row per
/// allele record, per set, per clause, in document order. Strains without
/// a genotype keep a single row with `NULL` genotype fields.
pub fn normalize_strains(config: &Config) -> Result<u64> {
    let infile = config.filter_dir().join("strain.csv");
    let outfile = config.normalize_dir().join("strain_allele.csv");

    let mut reader = csv_reader(&infile)?;
    let mut writer = csv_writer(&outfile)?;
    writer.write_record(STRAIN_ALLELE_HEADER)?;

    let mut rows_written = 0u64;
    for result in reader.records().skip(1) {
        let record = result.with_context(|| format!("Failed to read {}", infile.display()))?;

        let linenum = field(&record, STRAIN_LINE);
        let strain_name = field(&record, STRAIN_NAME);
        let genotype = field(&record, STRAIN_GENOTYPE);
        let source = field(&record, STRAIN_SOURCE);
        let other_names = field(&record, STRAIN_OTHER_NAMES);
        let comment = field(&record, STRAIN_COMMENT);

        if genotype == "NULL" {
            writer.write_record([
                linenum,
                strain_name,
                "NULL",
                "NULL",
                "NULL",
                "NULL",
                "NULL",
                source,
                other_names,
                comment,
            ])?;
            rows_written += 1;
            continue;
        }

        let doc: GenotypeDocument = serde_json::from_str(genotype).with_context(|| {
            format!(
                "Corrupt genotype column at line {} of {}",
                linenum,
                infile.display()
            )
        })?;

        for clause in &doc.clauses {
            let chromosome = clause.chromosome.map_or("NULL", |c| c.label());
            for (idx, set) in clause.allele_sets.iter().enumerate() {
                let binary_id = (idx + 1).to_string();
                for allele in &set.records {
                    writer.write_record([
                        linenum,
                        strain_name,
                        chromosome,
                        binary_id.as_str(),
                        allele.allele_name.as_str(),
                        allele.gene_name.as_deref().unwrap_or("NULL"),
                        if allele.heterozygous { "1" } else { "0" },
                        source,
                        other_names,
                        comment,
                    ])?;
                    rows_written += 1;
                }
            }
        }
    }
    writer.flush()?;

    info!("Wrote {} strain_allele rows", rows_written);
    Ok(rows_written)
}

/// Split each allele row's plasmid list into one `allele.csv` row per
/// plasmid; rows without plasmids keep a single `NULL` entry.
pub fn normalize_alleles(config: &Config) -> Result<u64> {
    let infile = config.filter_dir().join("allele.csv");
    let outfile = config.normalize_dir().join("allele.csv");

    let mut reader = csv_reader(&infile)?;
    let mut writer = csv_writer(&outfile)?;
    writer.write_record(ALLELE_HEADER)?;

    let mut rows_written = 0u64;
    for result in reader.records().skip(1) {
        let record = result.with_context(|| format!("Failed to read {}", infile.display()))?;

        let linenum = field(&record, ALLELE_LINE);
        let allele_name = field(&record, ALLELE_NAME);
        let allele_type = field(&record, ALLELE_TYPE);
        let gene_name = field(&record, ALLELE_GENE);
        let plasmids = field(&record, ALLELE_PLASMIDS);
        let comment = field(&record, ALLELE_COMMENT);

        if plasmids.is_empty() {
            writer.write_record([linenum, allele_name, allele_type, gene_name, "NULL", comment])?;
            rows_written += 1;
            continue;
        }

        for plasmid in RE_PLASMID_SPLIT.split(plasmids) {
            writer.write_record([linenum, allele_name, allele_type, gene_name, plasmid, comment])?;
            rows_written += 1;
        }
    }
    writer.flush()?;

    info!("Wrote {} allele rows", rows_written);
    Ok(rows_written)
}

fn field(record: &StringRecord, idx: usize) -> &str {
    record.get(idx).map(str::trim).unwrap_or("")
}

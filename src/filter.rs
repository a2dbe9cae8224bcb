use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use csv::StringRecord;
use hashbrown::HashSet;
use lazy_static::lazy_static;
use rayon::prelude::*;
use regex::Regex;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::config::Config;
use crate::errorlog::{append_errstats, init_errstats, ErrorLog, RowFault, TableStats};
use crate::fileio::{csv_reader, csv_writer, read_header};
use crate::parsers::{AlleleClassifier, GenotypeParser};
use crate::types::GenotypeDocument;

// Fixed column positions of the lab's raw exports (0-based)
const STRAIN_NAME: usize = 2;
const STRAIN_GENOTYPE: usize = 8;
const STRAIN_SOURCE: usize = 9;
const STRAIN_COMMENT: usize = 11;
const STRAIN_OTHER_NAMES: usize = 15;

const ALLELE_NAME: usize = 2;
const ALLELE_GENE: usize = 3;
const ALLELE_COMMENT: usize = 5;
const ALLELE_PLASMIDS: usize = 8;

const PLASMID_EXPANDED_NAME: usize = 2;
const PLASMID_NAME: usize = 5;
const PLASMID_DATE: usize = 6;
const PLASMID_PARENT1: usize = 7;
const PLASMID_PARENT2: usize = 8;
const PLASMID_RESTRICTION_SITE: usize = 9;
const PLASMID_SOURCE: usize = 13;

const STRAIN_HEADER: [&str; 6] = [
    "strain_original_line_number",
    "strain_name",
    "genotype",
    "source",
    "other_names",
    "comment",
];

const ALLELE_HEADER: [&str; 6] = [
    "allele_original_line_number",
    "allele_name",
    "allele_type",
    "gene_name",
    "plasmids",
    "comment",
];

const PLASMID_HEADER: [&str; 8] = [
    "plasmid_original_line_number",
    "name",
    "expanded_name",
    "source",
    "parent1",
    "parent2",
    "restriction_site",
    "date",
];

lazy_static! {
    static ref RE_STRAIN_NAME: Regex = Regex::new(r"^CHB[0-9]+").unwrap();
    static ref RE_PLASMID_NAME: Regex = Regex::new(r"^p[a-zA-Z]+[0-9]+").unwrap();
    static ref RE_GENOTYPE_CHARSET: Regex = Regex::new(r"^[-+.\[\]()a-zA-Z0-9\s/;]+$").unwrap();
}

// Date spellings seen in the lab's plasmid export
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%m/%d/%y",
    "%m-%d-%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Filter pass over the three raw tables. Valid rows go to the filtered
/// tables under `filter/`, rejected rows to the per-fault logs under
/// `filter_errorlog/`, and each table appends a statistics block to
/// `errstats.txt`.
pub struct FilterPass<'a> {
    config: &'a Config,
    errstats: PathBuf,
}

impl<'a> FilterPass<'a> {
    /// Prepare the error log directory and the `errstats.txt` preamble.
    pub fn new(config: &'a Config) -> Result<Self> {
        let errstats = config.errorlog_dir().join("errstats.txt");
        let filter_dir = config.filter_dir();
        let outputs: Vec<PathBuf> = ["strain.csv", "allele.csv", "plasmid.csv"]
            .iter()
            .map(|name| filter_dir.join(name))
            .collect();
        init_errstats(
            &errstats,
            &[
                config.raw_csv.strain.as_path(),
                config.raw_csv.allele.as_path(),
                config.raw_csv.plasmid.as_path(),
            ],
            &outputs,
            &config.errorlog_dir(),
        )?;
        Ok(Self { config, errstats })
    }

    /// Filter all three tables in order.
    pub fn run(&self) -> Result<Vec<TableStats>> {
        Ok(vec![self.strains()?, self.alleles()?, self.plasmids()?])
    }

    pub fn strains(&self) -> Result<TableStats> {
        let stats = filter_strains(self.config)?;
        self.report(&stats)?;
        Ok(stats)
    }

    pub fn alleles(&self) -> Result<TableStats> {
        let stats = filter_alleles(self.config)?;
        self.report(&stats)?;
        Ok(stats)
    }

    pub fn plasmids(&self) -> Result<TableStats> {
        let stats = filter_plasmids(self.config)?;
        self.report(&stats)?;
        Ok(stats)
    }

    fn report(&self, stats: &TableStats) -> Result<()> {
        append_errstats(&self.errstats, stats)?;
        info!(
            "{}: {} of {} rows valid",
            stats.table, stats.valid, stats.rows
        );
        Ok(())
    }
}

/// Genotype column outcome, computed ahead of the sequential row walk so
/// parsing can fan out over the thread pool.
enum GenotypeOutcome {
    /// Empty or explicit wild type; stored as `NULL`
    Empty,
    /// Disallowed characters, or notation the parser rejected
    Invalid,
    Parsed(GenotypeDocument),
}

fn parse_genotype_cell(parser: &GenotypeParser, genotype: &str) -> GenotypeOutcome {
    if genotype.is_empty() || genotype.eq_ignore_ascii_case("WT") {
        return GenotypeOutcome::Empty;
    }
    if !RE_GENOTYPE_CHARSET.is_match(genotype) {
        return GenotypeOutcome::Invalid;
    }
    match parser.parse(genotype) {
        Some(doc) => GenotypeOutcome::Parsed(doc),
        None => {
            debug!("Could not parse genotype: {}", genotype);
            GenotypeOutcome::Invalid
        }
    }
}

fn filter_strains(config: &Config) -> Result<TableStats> {
    let raw_path = &config.raw_csv.strain;
    let raw_header = read_header(raw_path)?;
    let mut errlog = ErrorLog::create(
        &config.errorlog_dir(),
        "strain",
        &[
            RowFault::InvalidStrainName,
            RowFault::DuplicateStrain,
            RowFault::InvalidGenotype,
        ],
        &raw_header,
    )?;

    // Load all rows up front so genotype parsing can run in parallel
    let mut reader = csv_reader(raw_path)?;
    let mut rows = Vec::new();
    for result in reader.records().skip(1) {
        rows.push(result.with_context(|| format!("Failed to read {}", raw_path.display()))?);
    }

    let parser = GenotypeParser::new();
    let outcomes: Vec<GenotypeOutcome> = rows
        .par_iter()
        .map(|row| parse_genotype_cell(&parser, field(row, STRAIN_GENOTYPE)))
        .collect();

    let mut writer = csv_writer(&config.filter_dir().join("strain.csv"))?;
    writer.write_record(STRAIN_HEADER)?;

    let mut seen = HashSet::new();
    let mut valid = 0u64;
    for (i, (row, outcome)) in rows.iter().zip(&outcomes).enumerate() {
        let linenum = (i + 2) as u64;
        let record = trimmed(row);

        let strain_name = field(&record, STRAIN_NAME);
        let source = field(&record, STRAIN_SOURCE);
        let comment = field(&record, STRAIN_COMMENT);
        let other_names = field(&record, STRAIN_OTHER_NAMES);

        let mut failure = false;
        if strain_name.is_empty() || !RE_STRAIN_NAME.is_match(strain_name) {
            errlog.record(RowFault::InvalidStrainName, linenum, &record)?;
            failure = true;
        } else if !seen.insert(strain_name.to_string()) {
            errlog.record(RowFault::DuplicateStrain, linenum, &record)?;
            failure = true;
        }

        let genotype_json = match outcome {
            GenotypeOutcome::Empty => None,
            GenotypeOutcome::Invalid => {
                errlog.record(RowFault::InvalidGenotype, linenum, &record)?;
                failure = true;
                None
            }
            GenotypeOutcome::Parsed(doc) => Some(
                serde_json::to_string(doc).context("Failed to serialize genotype document")?,
            ),
        };

        if !failure {
            writer.write_record([
                linenum.to_string().as_str(),
                strain_name,
                genotype_json.as_deref().unwrap_or("NULL"),
                or_null(source),
                or_null(other_names),
                flatten_comment(comment).as_str(),
            ])?;
            valid += 1;
        }
    }
    writer.flush()?;

    Ok(TableStats {
        table: "STRAINS".to_string(),
        rows: rows.len() as u64,
        valid,
        fault_counts: errlog.finish()?,
    })
}

fn filter_alleles(config: &Config) -> Result<TableStats> {
    let raw_path = &config.raw_csv.allele;
    let raw_header = read_header(raw_path)?;
    let mut errlog = ErrorLog::create(
        &config.errorlog_dir(),
        "allele",
        &[RowFault::InvalidAlleleName, RowFault::DuplicateAllele],
        &raw_header,
    )?;

    let mut writer = csv_writer(&config.filter_dir().join("allele.csv"))?;
    writer.write_record(ALLELE_HEADER)?;

    let classifier = AlleleClassifier::new();
    let mut reader = csv_reader(raw_path)?;
    let mut seen = HashSet::new();
    let mut rows = 0u64;
    let mut valid = 0u64;
    for (i, result) in reader.records().skip(1).enumerate() {
        let linenum = (i + 2) as u64;
        rows += 1;
        let record =
            trimmed(&result.with_context(|| format!("Failed to read {}", raw_path.display()))?);

        let raw_name = field(&record, ALLELE_NAME);
        let gene_name = field(&record, ALLELE_GENE);
        let comment = field(&record, ALLELE_COMMENT);
        let plasmids = field(&record, ALLELE_PLASMIDS);

        // Duplicates are tracked on the cleaned name, so `tm290a` collides
        // with an earlier `tm290`
        let (name, class) = match classifier.classify(raw_name) {
            Ok(parsed) => parsed,
            Err(_) => {
                errlog.record(RowFault::InvalidAlleleName, linenum, &record)?;
                continue;
            }
        };
        if !seen.insert(name.clone()) {
            errlog.record(RowFault::DuplicateAllele, linenum, &record)?;
            continue;
        }

        writer.write_record([
            linenum.to_string().as_str(),
            name.as_str(),
            class.as_str(),
            or_null(gene_name),
            plasmids,
            flatten_comment(comment).as_str(),
        ])?;
        valid += 1;
    }
    writer.flush()?;

    Ok(TableStats {
        table: "ALLELES".to_string(),
        rows,
        valid,
        fault_counts: errlog.finish()?,
    })
}

fn filter_plasmids(config: &Config) -> Result<TableStats> {
    let raw_path = &config.raw_csv.plasmid;
    let raw_header = read_header(raw_path)?;
    let mut errlog = ErrorLog::create(
        &config.errorlog_dir(),
        "plasmid",
        &[
            RowFault::InvalidPlasmidName,
            RowFault::DuplicatePlasmid,
            RowFault::InvalidExpandedName,
            RowFault::InvalidDate,
        ],
        &raw_header,
    )?;

    let mut writer = csv_writer(&config.filter_dir().join("plasmid.csv"))?;
    writer.write_record(PLASMID_HEADER)?;

    let mut reader = csv_reader(raw_path)?;
    let mut seen = HashSet::new();
    let mut rows = 0u64;
    let mut valid = 0u64;
    for (i, result) in reader.records().skip(1).enumerate() {
        let linenum = (i + 2) as u64;
        rows += 1;
        let record =
            trimmed(&result.with_context(|| format!("Failed to read {}", raw_path.display()))?);

        let expanded_name = field(&record, PLASMID_EXPANDED_NAME);
        let plasmid_name = field(&record, PLASMID_NAME);
        let date = field(&record, PLASMID_DATE);
        let parent1 = field(&record, PLASMID_PARENT1);
        let parent2 = field(&record, PLASMID_PARENT2);
        let restriction_site = field(&record, PLASMID_RESTRICTION_SITE);
        let source = field(&record, PLASMID_SOURCE);

        let mut failure = false;
        if plasmid_name.is_empty() || !RE_PLASMID_NAME.is_match(plasmid_name) {
            errlog.record(RowFault::InvalidPlasmidName, linenum, &record)?;
            failure = true;
        } else if !seen.insert(plasmid_name.to_string()) {
            errlog.record(RowFault::DuplicatePlasmid, linenum, &record)?;
            failure = true;
        }

        // Dates are optional; present ones must parse and are rewritten in
        // unpadded Y-M-D form
        let date_out = if date.is_empty() {
            "NULL".to_string()
        } else {
            match parse_date(date) {
                Some(parsed) => format!("{}-{}-{}", parsed.year(), parsed.month(), parsed.day()),
                None => {
                    errlog.record(RowFault::InvalidDate, linenum, &record)?;
                    failure = true;
                    String::new()
                }
            }
        };

        if expanded_name.is_empty() {
            errlog.record(RowFault::InvalidExpandedName, linenum, &record)?;
            failure = true;
        }

        if !failure {
            writer.write_record([
                linenum.to_string().as_str(),
                plasmid_name,
                expanded_name,
                or_null(source),
                or_null(parent1),
                or_null(parent2),
                or_null(restriction_site),
                date_out.as_str(),
            ])?;
            valid += 1;
        }
    }
    writer.flush()?;

    Ok(TableStats {
        table: "PLASMIDS".to_string(),
        rows,
        valid,
        fault_counts: errlog.finish()?,
    })
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// Cell at `idx`, trimmed; missing trailing columns read as empty.
fn field(row: &StringRecord, idx: usize) -> &str {
    row.get(idx).map(str::trim).unwrap_or("")
}

fn trimmed(row: &StringRecord) -> StringRecord {
    row.iter().map(str::trim).collect()
}

fn or_null(value: &str) -> &str {
    if value.is_empty() {
        "NULL"
    } else {
        value
    }
}

fn flatten_comment(comment: &str) -> String {
    if comment.is_empty() {
        "NULL".to_string()
    } else {
        comment.replace('\n', " ")
    }
}

use anyhow::{bail, Context, Result};
use chrono::Local;
use csv::{StringRecord, Writer};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::fileio::{csv_writer, mkparent};

/// Reasons a raw row is rejected. Each fault gets its own log file per
/// table, named `<table>.<key>.csv`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
pub enum RowFault {
    #[error("Invalid strain_name")]
    InvalidStrainName,
    #[error("Duplicate strain_name")]
    DuplicateStrain,
    #[error("Invalid genotype")]
    InvalidGenotype,
    #[error("Invalid allele_name")]
    InvalidAlleleName,
    #[error("Duplicate allele_name")]
    DuplicateAllele,
    #[error("Invalid plasmid_name")]
    InvalidPlasmidName,
    #[error("Duplicate plasmid_name")]
    DuplicatePlasmid,
    #[error("Invalid expanded_name")]
    InvalidExpandedName,
    #[error("Invalid date")]
    InvalidDate,
}

impl RowFault {
    /// File name fragment for this fault's log
    pub fn key(self) -> &'static str {
        match self {
            RowFault::InvalidStrainName => "invalid_strain_name",
            RowFault::DuplicateStrain => "duplicate_strain",
            RowFault::InvalidGenotype => "invalid_genotype",
            RowFault::InvalidAlleleName => "invalid_allele_name",
            RowFault::DuplicateAllele => "duplicate_allele",
            RowFault::InvalidPlasmidName => "invalid_plasmid_name",
            RowFault::DuplicatePlasmid => "duplicate_plasmid",
            RowFault::InvalidExpandedName => "invalid_expanded_name",
            RowFault::InvalidDate => "invalid_date",
        }
    }
}

struct FaultFile {
    fault: RowFault,
    writer: Writer<File>,
    count: u64,
}

/// Per-table rejected-row logs. Every registered fault gets a CSV headed
/// by the raw table header with an `Original Line Number` column
/// prepended, so rejected rows can be fixed in the source export.
pub struct ErrorLog {
    table: String,
    files: Vec<FaultFile>,
}

impl ErrorLog {
    pub fn create(
        dir: &Path,
        table: &str,
        faults: &[RowFault],
        raw_header: &StringRecord,
    ) -> Result<Self> {
        let mut err_header = StringRecord::new();
        err_header.push_field("Original Line Number");
        err_header.extend(raw_header.iter());

        let mut files = Vec::with_capacity(faults.len());
        for &fault in faults {
            let path = dir.join(format!("{}.{}.csv", table, fault.key()));
            let mut writer = csv_writer(&path)?;
            writer.write_record(&err_header)?;
            files.push(FaultFile {
                fault,
                writer,
                count: 0,
            });
        }

        Ok(Self {
            table: table.to_string(),
            files,
        })
    }

    /// Log one rejected row under its original line number.
    pub fn record(&mut self, fault: RowFault, linenum: u64, row: &StringRecord) -> Result<()> {
        for file in &mut self.files {
            if file.fault == fault {
                let mut entry = StringRecord::new();
                entry.push_field(&linenum.to_string());
                entry.extend(row.iter());
                file.writer.write_record(&entry)?;
                file.count += 1;
                return Ok(());
            }
        }
        bail!("No {} error log for table {}", fault.key(), self.table)
    }

    /// Flush all fault files and hand back the counts, in registration
    /// order.
    pub fn finish(self) -> Result<Vec<(RowFault, u64)>> {
        let table = self.table;
        let mut counts = Vec::with_capacity(self.files.len());
        for mut file in self.files {
            file.writer
                .flush()
                .with_context(|| format!("Failed to flush {} error log", table))?;
            counts.push((file.fault, file.count));
        }
        Ok(counts)
    }
}

/// Outcome of one table's filter pass. `Display` renders the table's
/// `errstats.txt` block.
#[derive(Debug, Clone)]
pub struct TableStats {
    pub table: String,
    pub rows: u64,
    pub valid: u64,
    pub fault_counts: Vec<(RowFault, u64)>,
}

impl TableStats {
    /// Integer percentage of rows that survived the filter
    pub fn success_rate(&self) -> u64 {
        100 * self.valid / self.rows.max(1)
    }
}

impl fmt::Display for TableStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\n{}:", self.table)?;
        writeln!(f, "  Rows processed: {}", self.rows)?;
        writeln!(f, "  Valid rows: {}", self.valid)?;
        for (fault, count) in &self.fault_counts {
            writeln!(f, "    {}: {}", fault, count)?;
        }
        write!(f, "  Success Rate: {}%", self.success_rate())
    }
}

/// Start `errstats.txt` with the run context. Table blocks are appended
/// as each table finishes.
pub fn init_errstats(
    path: &Path,
    inputs: &[&Path],
    outputs: &[PathBuf],
    errdir: &Path,
) -> Result<()> {
    mkparent(path)?;
    let mut f = File::create(path)
        .with_context(|| format!("Failed to create error statistics file: {}", path.display()))?;

    writeln!(f, "Tool:")?;
    writeln!(f, "  straindb {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(f)?;
    writeln!(f, "Run started:")?;
    writeln!(f, "  {}", Local::now().format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(f)?;
    writeln!(f, "Input files:")?;
    for input in inputs {
        writeln!(f, "  {}", input.display())?;
    }
    writeln!(f)?;
    writeln!(f, "Output files:")?;
    for output in outputs {
        writeln!(f, "  {}", output.display())?;
    }
    writeln!(f)?;
    writeln!(f, "Error log directory:")?;
    writeln!(f, "  {}", errdir.display())?;
    writeln!(f)?;
    writeln!(f, "ERROR STATISTICS")?;
    writeln!(f, "----------------")?;
    Ok(())
}

/// Append one table's statistics block to `errstats.txt`.
pub fn append_errstats(path: &Path, stats: &TableStats) -> Result<()> {
    let mut f = OpenOptions::new()
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open error statistics file: {}", path.display()))?;
    writeln!(f, "{}", stats)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn rejected_rows_carry_their_line_number() -> Result<()> {
        let dir = TempDir::new()?;
        let raw_header = StringRecord::from(vec!["id", "name", "genotype"]);

        let mut log = ErrorLog::create(
            dir.path(),
            "strain",
            &[RowFault::InvalidStrainName, RowFault::InvalidGenotype],
            &raw_header,
        )?;

        let row = StringRecord::from(vec!["17", "BAD", "abc#def"]);
        log.record(RowFault::InvalidGenotype, 5, &row)?;
        let counts = log.finish()?;

        assert_eq!(
            counts,
            vec![
                (RowFault::InvalidStrainName, 0),
                (RowFault::InvalidGenotype, 1)
            ]
        );

        let logged = fs::read_to_string(dir.path().join("strain.invalid_genotype.csv"))?;
        assert_eq!(
            logged,
            "Original Line Number,id,name,genotype\n5,17,BAD,abc#def\n"
        );

        let untouched = fs::read_to_string(dir.path().join("strain.invalid_strain_name.csv"))?;
        assert_eq!(untouched, "Original Line Number,id,name,genotype\n");
        Ok(())
    }

    #[test]
    fn unregistered_fault_is_rejected() -> Result<()> {
        let dir = TempDir::new()?;
        let raw_header = StringRecord::from(vec!["id"]);
        let mut log =
            ErrorLog::create(dir.path(), "allele", &[RowFault::DuplicateAllele], &raw_header)?;

        let row = StringRecord::from(vec!["1"]);
        assert!(log.record(RowFault::InvalidDate, 2, &row).is_err());
        Ok(())
    }

    #[test]
    fn stats_block_lists_every_fault_count() {
        let stats = TableStats {
            table: "STRAINS".to_string(),
            rows: 6,
            valid: 3,
            fault_counts: vec![
                (RowFault::InvalidStrainName, 1),
                (RowFault::DuplicateStrain, 1),
                (RowFault::InvalidGenotype, 1),
            ],
        };

        let block = stats.to_string();
        assert_eq!(
            block,
            "\nSTRAINS:\n  Rows processed: 6\n  Valid rows: 3\n    Invalid strain_name: 1\n    Duplicate strain_name: 1\n    Invalid genotype: 1\n  Success Rate: 50%"
        );
    }

    #[test]
    fn empty_table_has_a_zero_success_rate() {
        let stats = TableStats {
            table: "ALLELES".to_string(),
            rows: 0,
            valid: 0,
            fault_counts: vec![],
        };
        assert_eq!(stats.success_rate(), 0);
    }
}

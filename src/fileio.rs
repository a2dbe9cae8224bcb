use anyhow::{bail, Context, Result};
use csv::{Reader, ReaderBuilder, StringRecord, Writer};
use flate2::read::MultiGzDecoder;
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;

/// Open a table for reading, transparently decompressing `.gz` exports.
pub fn get_dynamic_reader(path: &Path) -> Result<BufReader<Box<dyn Read>>> {
    let is_gzipped = path.extension() == Some(OsStr::new("gz"));
    let file =
        File::open(path).with_context(|| format!("Failed to open file: {}", path.display()))?;
    let file: Box<dyn Read> = match is_gzipped {
        true => Box::new(MultiGzDecoder::new(file)),
        false => Box::new(file),
    };

    Ok(BufReader::new(file))
}

/// CSV reader over a table. Raw exports have uneven row widths, so the
/// reader is flexible; the header row is consumed by the caller.
pub fn csv_reader(path: &Path) -> Result<Reader<BufReader<Box<dyn Read>>>> {
    let reader = get_dynamic_reader(path)?;
    Ok(ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader))
}

/// CSV writer that creates the parent directory on demand.
pub fn csv_writer(path: &Path) -> Result<Writer<File>> {
    mkparent(path)?;
    Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV writer for {}", path.display()))
}

/// First record of a table, used to head the per-fault error logs.
pub fn read_header(path: &Path) -> Result<StringRecord> {
    let mut reader = csv_reader(path)?;
    let mut record = StringRecord::new();
    let got = reader
        .read_record(&mut record)
        .with_context(|| format!("Failed to read header of {}", path.display()))?;
    if !got {
        bail!("Empty table: {}", path.display());
    }
    Ok(record)
}

pub fn mkparent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

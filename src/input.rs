//! Opens a CSV file, detects its encoding and dialect, and materializes rows.

use std::{
    fs::File,
    io::{BufReader, Cursor, Read},
    path::Path,
};

use anyhow::{Context, Result, bail};
use log::{debug, info};

use crate::{
    dialect::{self, Dialect},
    encoding::{self, DetectedEncoding},
    recode::RecodingStream,
    rows::{Row, RowReader},
};

#[derive(Debug, Clone, Default)]
pub struct InputOptions {
    pub encoding: Option<String>,
    pub delimiter: Option<u8>,
    pub sample_bytes: usize,
}

#[derive(Debug)]
pub struct LoadedInput {
    pub encoding: DetectedEncoding,
    pub dialect: Dialect,
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

/// Reads every row of `path`; an input without data rows is an error.
pub fn load_rows(path: &Path, options: &InputOptions) -> Result<LoadedInput> {
    let sample_file =
        File::open(path).with_context(|| format!("Opening input file {path:?}"))?;
    let sample = encoding::read_sample(sample_file, options.sample_bytes.max(1))
        .with_context(|| format!("Reading encoding sample from {path:?}"))?;
    if sample.is_empty() {
        bail!("{} contains no data", path.display());
    }
    let encoding = match options.encoding.as_deref() {
        Some(label) => encoding::resolve_label(label, &sample)?,
        None => encoding::detect_encoding(&sample)
            .with_context(|| format!("Detecting encoding of {path:?}"))?,
    };
    info!("Reading '{}' as {}", path.display(), encoding);

    let file = File::open(path).with_context(|| format!("Opening input file {path:?}"))?;
    let mut stream = RecodingStream::new(BufReader::new(file), encoding);
    let Some(first_line) = stream.next_line() else {
        bail!("{} contains no data", path.display());
    };
    let first_line = first_line.with_context(|| format!("Reading header of {path:?}"))?;

    let dialect = match options.delimiter {
        Some(delimiter) => Dialect::with_delimiter(delimiter),
        None => dialect::sniff(&String::from_utf8_lossy(&first_line))
            .with_context(|| format!("Detecting CSV dialect of {path:?}"))?,
    };
    debug!("Using {dialect} for {path:?}");

    let (headers, rows) = read_all(Cursor::new(first_line).chain(stream), &dialect)?;
    if rows.is_empty() {
        bail!("{} contains no data", path.display());
    }
    info!("Read {} row(s) with {} column(s)", rows.len(), headers.len());
    Ok(LoadedInput {
        encoding,
        dialect,
        headers,
        rows,
    })
}

fn read_all<R: Read>(input: R, dialect: &Dialect) -> Result<(Vec<String>, Vec<Row>)> {
    let mut reader = RowReader::new(input, dialect);
    let headers = reader.headers()?.to_vec();
    let rows = reader.collect::<Result<Vec<_>>>()?;
    Ok((headers, rows))
}

//! Row model and the CSV row reader.
//!
//! [`RowReader`] parses a UTF-8 byte stream with a sniffed [`Dialect`] and
//! yields one [`Row`] per record. Header names and values are trimmed, short
//! records are padded with empty strings and surplus fields are dropped.
//! When the dialect says fields follow their delimiter after a blank, the
//! blanks are removed before parsing so `a, "b, c"` keeps its quoted field.

use std::io::{self, BufRead, BufReader, Read};

use anyhow::{Context, Result};
use log::warn;

use crate::dialect::Dialect;

/// Ordered column name to value mapping for a single CSV record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    fields: Vec<(String, String)>,
}

impl Row {
    pub fn new(fields: Vec<(String, String)>) -> Self {
        Self { fields }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, column: &str) -> bool {
        self.fields.iter().any(|(name, _)| name == column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

/// Removes the spaces that follow each unquoted delimiter.
///
/// Quote state carries across lines so quoted fields with embedded newlines
/// are left untouched. Passes input through unchanged when the dialect does
/// not skip initial spaces.
pub struct InitialSpaceFilter<R: Read> {
    inner: BufReader<R>,
    dialect: Dialect,
    in_quotes: bool,
    escaped: bool,
    line: Vec<u8>,
    offset: usize,
}

impl<R: Read> InitialSpaceFilter<R> {
    pub fn new(input: R, dialect: &Dialect) -> Self {
        Self {
            inner: BufReader::new(input),
            dialect: *dialect,
            in_quotes: false,
            escaped: false,
            line: Vec::new(),
            offset: 0,
        }
    }

    fn filter_line(&mut self, raw: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(raw.len());
        let mut skipping = false;
        for &byte in raw {
            if skipping {
                if byte == b' ' {
                    continue;
                }
                skipping = false;
            }
            if self.in_quotes {
                if self.escaped {
                    self.escaped = false;
                } else if Some(byte) == self.dialect.escape {
                    self.escaped = true;
                } else if byte == self.dialect.quote {
                    self.in_quotes = false;
                }
            } else if byte == self.dialect.quote {
                self.in_quotes = true;
            } else if byte == self.dialect.delimiter {
                skipping = true;
            }
            out.push(byte);
        }
        out
    }
}

impl<R: Read> Read for InitialSpaceFilter<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.dialect.skip_initial_space {
            return self.inner.read(buf);
        }
        while self.offset >= self.line.len() {
            let mut raw = Vec::new();
            if self.inner.read_until(b'\n', &mut raw)? == 0 {
                return Ok(0);
            }
            self.line = self.filter_line(&raw);
            self.offset = 0;
        }
        let available = &self.line[self.offset..];
        let count = available.len().min(buf.len());
        buf[..count].copy_from_slice(&available[..count]);
        self.offset += count;
        Ok(count)
    }
}

pub struct RowReader<R: Read> {
    reader: csv::Reader<InitialSpaceFilter<R>>,
    headers: Option<Vec<String>>,
    record: csv::StringRecord,
}

impl<R: Read> RowReader<R> {
    pub fn new(input: R, dialect: &Dialect) -> Self {
        Self {
            reader: dialect
                .reader_builder()
                .from_reader(InitialSpaceFilter::new(input, dialect)),
            headers: None,
            record: csv::StringRecord::new(),
        }
    }

    /// Trimmed field names from the header record.
    pub fn headers(&mut self) -> Result<&[String]> {
        if self.headers.is_none() {
            let raw = self.reader.headers().context("Reading CSV header")?;
            self.headers = Some(raw.iter().map(|name| name.trim().to_string()).collect());
        }
        Ok(self.headers.as_deref().unwrap_or_default())
    }

    fn read_row(&mut self) -> Result<Option<Row>> {
        self.headers()?;
        let has_record = self.reader.read_record(&mut self.record).with_context(|| {
            let line = self.reader.position().line();
            format!("Parsing CSV record near line {line}")
        })?;
        if !has_record {
            return Ok(None);
        }
        let headers = self.headers.as_deref().unwrap_or_default();
        if self.record.len() > headers.len() {
            let line = self
                .record
                .position()
                .map(|pos| pos.line())
                .unwrap_or_default();
            warn!(
                "Line {line}: ignoring {} field(s) beyond the {} header column(s)",
                self.record.len() - headers.len(),
                headers.len()
            );
        }
        let fields = headers
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let value = self.record.get(idx).unwrap_or("").trim().to_string();
                (name.clone(), value)
            })
            .collect();
        Ok(Some(Row::new(fields)))
    }
}

impl<R: Read> Iterator for RowReader<R> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_row().transpose()
    }
}

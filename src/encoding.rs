//! Character encoding detection for input files.
//!
//! Detection runs once per invocation over a byte sample taken from the start
//! of the file:
//!
//! - a byte-order mark decides immediately (UTF-8 BOM becomes `utf-8-sig`),
//! - a sample that is valid UTF-8 is reported as `utf-8`,
//! - anything else goes through `chardetng` content sniffing.
//!
//! The result is applied uniformly to every row by the recoding stream.

use std::{
    fmt,
    io::{self, Read},
};

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};
use thiserror::Error;

pub const DEFAULT_SAMPLE_BYTES: usize = 64 * 1024;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("cannot detect encoding of an empty sample")]
    EmptySample,
    #[error("unknown encoding '{0}'")]
    UnknownLabel(String),
    #[error("reading encoding sample: {0}")]
    Io(#[from] io::Error),
}

/// Encoding chosen for an input file, immutable for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectedEncoding {
    encoding: &'static Encoding,
    bom: bool,
}

impl DetectedEncoding {
    pub fn new(encoding: &'static Encoding, bom: bool) -> Self {
        Self { encoding, bom }
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// True when the input starts with a byte-order mark that decoding must strip.
    pub fn has_bom(&self) -> bool {
        self.bom
    }

    /// Lowercase label, `utf-8-sig` for BOM-prefixed UTF-8.
    pub fn label(&self) -> String {
        if self.encoding == UTF_8 && self.bom {
            "utf-8-sig".to_string()
        } else {
            self.encoding.name().to_ascii_lowercase()
        }
    }
}

impl fmt::Display for DetectedEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

pub fn detect_encoding(sample: &[u8]) -> Result<DetectedEncoding, DetectionError> {
    if sample.is_empty() {
        return Err(DetectionError::EmptySample);
    }
    if let Some((encoding, _)) = Encoding::for_bom(sample) {
        return Ok(DetectedEncoding::new(encoding, true));
    }
    if is_utf8_prefix(sample) {
        return Ok(DetectedEncoding::new(UTF_8, false));
    }
    let mut detector = EncodingDetector::new();
    detector.feed(sample, true);
    let encoding = detector.guess(None, false);
    Ok(DetectedEncoding::new(encoding, false))
}

/// Resolves a user-supplied label, keeping BOM handling for UTF-8 files that carry one.
pub fn resolve_label(label: &str, sample: &[u8]) -> Result<DetectedEncoding, DetectionError> {
    let trimmed = label.trim();
    if trimmed.eq_ignore_ascii_case("utf-8-sig") {
        return Ok(DetectedEncoding::new(UTF_8, true));
    }
    let encoding = Encoding::for_label(trimmed.as_bytes())
        .ok_or_else(|| DetectionError::UnknownLabel(trimmed.to_string()))?;
    let bom = encoding == UTF_8 && sample.starts_with(UTF8_BOM);
    Ok(DetectedEncoding::new(encoding, bom))
}

/// Reads up to `sample_bytes` from the start of `reader`.
pub fn read_sample<R: Read>(reader: R, sample_bytes: usize) -> Result<Vec<u8>, DetectionError> {
    let limit = u64::try_from(sample_bytes).unwrap_or(u64::MAX);
    let mut sample = Vec::with_capacity(sample_bytes.min(DEFAULT_SAMPLE_BYTES));
    reader.take(limit).read_to_end(&mut sample)?;
    Ok(sample)
}

// A multi-byte sequence cut off by the sample boundary still counts as UTF-8.
fn is_utf8_prefix(sample: &[u8]) -> bool {
    match std::str::from_utf8(sample) {
        Ok(_) => true,
        Err(err) => err.error_len().is_none(),
    }
}

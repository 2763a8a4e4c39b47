//! Delimiter and quoting inference from the header line.

use std::fmt;

use thiserror::Error;

/// Candidate delimiters in preference order; ties resolve to the earlier entry.
const CANDIDATE_DELIMITERS: &[u8] = b",\t;|:";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DialectError {
    #[error("could not determine delimiter: sample line is empty")]
    EmptySample,
    #[error("could not determine delimiter: unbalanced {0} quotes in sample line")]
    UnbalancedQuotes(char),
    #[error("could not determine delimiter: none of , tab ; | : found in sample line")]
    NoDelimiter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialect {
    pub delimiter: u8,
    pub quote: u8,
    pub double_quote: bool,
    pub escape: Option<u8>,
    pub skip_initial_space: bool,
}

impl Dialect {
    pub fn with_delimiter(delimiter: u8) -> Self {
        Self {
            delimiter,
            ..Self::default()
        }
    }

    pub fn reader_builder(&self) -> csv::ReaderBuilder {
        let mut builder = csv::ReaderBuilder::new();
        builder
            .has_headers(true)
            .delimiter(self.delimiter)
            .quote(self.quote)
            .double_quote(self.double_quote)
            .escape(self.escape)
            .flexible(true);
        builder
    }
}

impl Default for Dialect {
    fn default() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            double_quote: true,
            escape: None,
            skip_initial_space: false,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "delimiter '{}', quote '{}'",
            printable_delimiter(self.delimiter),
            self.quote as char
        )
    }
}

/// Infers the dialect from the first line of a file.
pub fn sniff(line: &str) -> Result<Dialect, DialectError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Err(DialectError::EmptySample);
    }
    let bytes = line.as_bytes();
    let quote = guess_quote(bytes);
    let (counts, escaped) = count_unquoted(bytes, quote)?;

    let mut best: Option<(u8, usize)> = None;
    for (&candidate, &count) in CANDIDATE_DELIMITERS.iter().zip(counts.iter()) {
        if count == 0 {
            continue;
        }
        match best {
            Some((_, best_count)) if best_count >= count => {}
            _ => best = Some((candidate, count)),
        }
    }
    let (delimiter, _) = best.ok_or(DialectError::NoDelimiter)?;

    Ok(Dialect {
        delimiter,
        quote,
        double_quote: true,
        escape: escaped.then_some(b'\\'),
        skip_initial_space: followed_by_space(bytes, delimiter, quote),
    })
}

pub fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}

/// Accepts `,`, `tab`, `;`, `|` and any single ASCII character.
pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

fn field_starts(bytes: &[u8]) -> impl Iterator<Item = u8> + '_ {
    bytes.iter().enumerate().filter_map(move |(idx, &byte)| {
        let at_start = idx == 0
            || CANDIDATE_DELIMITERS.contains(&bytes[idx - 1])
            || (bytes[idx - 1] == b' '
                && idx >= 2
                && CANDIDATE_DELIMITERS.contains(&bytes[idx - 2]));
        at_start.then_some(byte)
    })
}

fn guess_quote(bytes: &[u8]) -> u8 {
    let starts = field_starts(bytes).collect::<Vec<_>>();
    if starts.contains(&b'"') {
        b'"'
    } else if starts.contains(&b'\'') {
        b'\''
    } else {
        b'"'
    }
}

fn count_unquoted(
    bytes: &[u8],
    quote: u8,
) -> Result<([usize; CANDIDATE_DELIMITERS.len()], bool), DialectError> {
    let mut counts = [0usize; CANDIDATE_DELIMITERS.len()];
    let mut in_quotes = false;
    let mut escaped = false;
    let mut idx = 0;
    while idx < bytes.len() {
        let byte = bytes[idx];
        if in_quotes {
            if byte == b'\\' && bytes.get(idx + 1) == Some(&quote) {
                escaped = true;
                idx += 2;
                continue;
            }
            if byte == quote {
                if bytes.get(idx + 1) == Some(&quote) {
                    idx += 2;
                    continue;
                }
                in_quotes = false;
            }
        } else if byte == quote {
            in_quotes = true;
        } else if let Some(pos) = CANDIDATE_DELIMITERS.iter().position(|&c| c == byte) {
            counts[pos] += 1;
        }
        idx += 1;
    }
    if in_quotes {
        return Err(DialectError::UnbalancedQuotes(quote as char));
    }
    Ok((counts, escaped))
}

fn followed_by_space(bytes: &[u8], delimiter: u8, quote: u8) -> bool {
    let mut in_quotes = false;
    let mut seen = false;
    for (idx, &byte) in bytes.iter().enumerate() {
        if byte == quote {
            in_quotes = !in_quotes;
        } else if byte == delimiter && !in_quotes {
            if bytes.get(idx + 1) != Some(&b' ') {
                return false;
            }
            seen = true;
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_comma() {
        let dialect = sniff("username,firstname,lastname\r\n").unwrap();
        assert_eq!(dialect.delimiter, b',');
        assert_eq!(dialect.quote, b'"');
        assert!(!dialect.skip_initial_space);
    }

    #[test]
    fn sniffs_semicolon_with_commas_inside_quotes() {
        let dialect = sniff("username;\"description, long\";mail").unwrap();
        assert_eq!(dialect.delimiter, b';');
    }

    #[test]
    fn sniffs_tab_and_pipe() {
        assert_eq!(sniff("a\tb\tc").unwrap().delimiter, b'\t');
        assert_eq!(sniff("a|b|c").unwrap().delimiter, b'|');
    }

    #[test]
    fn highest_count_wins_and_ties_prefer_comma() {
        assert_eq!(sniff("a;b;c,d").unwrap().delimiter, b';');
        assert_eq!(sniff("a;b,c").unwrap().delimiter, b',');
    }

    #[test]
    fn detects_single_quotes_and_initial_space() {
        let dialect = sniff("'user name', 'mail'").unwrap();
        assert_eq!(dialect.quote, b'\'');
        assert!(dialect.skip_initial_space);
    }

    #[test]
    fn detects_backslash_escape() {
        let dialect = sniff("\"a\\\"b\",c").unwrap();
        assert_eq!(dialect.escape, Some(b'\\'));
    }

    #[test]
    fn single_column_header_fails() {
        assert_eq!(sniff("username"), Err(DialectError::NoDelimiter));
    }

    #[test]
    fn empty_line_fails() {
        assert_eq!(sniff("  \r\n"), Err(DialectError::EmptySample));
    }

    #[test]
    fn unbalanced_quotes_fail() {
        assert_eq!(
            sniff("\"username,lastname"),
            Err(DialectError::UnbalancedQuotes('"'))
        );
    }

    #[test]
    fn parse_delimiter_accepts_names() {
        assert_eq!(parse_delimiter("tab").unwrap(), b'\t');
        assert_eq!(parse_delimiter("semicolon").unwrap(), b';');
        assert!(parse_delimiter("ab").is_err());
    }
}

//! Line-oriented transcoding of input files to UTF-8.

use std::io::{self, BufRead, BufReader, Read};

use encoding_rs_io::{DecodeReaderBytes, DecodeReaderBytesBuilder};

use crate::encoding::DetectedEncoding;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Forward-only stream of UTF-8 byte lines decoded from an arbitrary encoding.
///
/// Lines keep their terminator so the CSV parser sees the original record
/// boundaries, including newlines embedded in quoted fields. The stream is
/// finite and cannot be rewound.
pub struct RecodingStream<R: Read> {
    inner: BufReader<DecodeReaderBytes<R, Vec<u8>>>,
    first_line: bool,
    finished: bool,
    pending: Vec<u8>,
    offset: usize,
}

impl<R: Read> RecodingStream<R> {
    pub fn new(reader: R, encoding: DetectedEncoding) -> Self {
        let decoder = DecodeReaderBytesBuilder::new()
            .encoding(Some(encoding.encoding()))
            .bom_override(encoding.has_bom())
            .build(reader);
        Self {
            inner: BufReader::new(decoder),
            first_line: true,
            finished: false,
            pending: Vec::new(),
            offset: 0,
        }
    }

    /// Pulls the next UTF-8 line, or `None` once the underlying stream is exhausted.
    pub fn next_line(&mut self) -> Option<io::Result<Vec<u8>>> {
        if self.finished {
            return None;
        }
        let mut line = Vec::new();
        match self.inner.read_until(b'\n', &mut line) {
            Ok(0) => {
                self.finished = true;
                None
            }
            Ok(_) => {
                if self.first_line {
                    self.first_line = false;
                    if line.starts_with(UTF8_BOM) {
                        line.drain(..UTF8_BOM.len());
                    }
                }
                Some(Ok(line))
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}

impl<R: Read> Read for RecodingStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.offset >= self.pending.len() {
            match self.next_line() {
                Some(line) => {
                    self.pending = line?;
                    self.offset = 0;
                }
                None => return Ok(0),
            }
        }
        let available = &self.pending[self.offset..];
        let count = available.len().min(buf.len());
        buf[..count].copy_from_slice(&available[..count]);
        self.offset += count;
        Ok(count)
    }
}

impl<R: Read> Iterator for RecodingStream<R> {
    type Item = io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_line()
    }
}

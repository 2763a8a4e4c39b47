//! Console status lines for an import run.

use std::{
    fmt::Display,
    io::{self, Stderr, Stdout, Write},
};

use colored::Colorize;

/// Counters for a finished (or aborted) run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub total: usize,
    pub processed: usize,
    pub errors: usize,
}

impl ImportSummary {
    pub fn succeeded(&self) -> bool {
        self.errors == 0 && self.processed == self.total
    }
}

pub struct Reporter<O: Write, E: Write> {
    out: O,
    err: E,
    total: usize,
}

impl Reporter<Stdout, Stderr> {
    pub fn stdio() -> Self {
        Self::new(io::stdout(), io::stderr())
    }
}

impl<O: Write, E: Write> Reporter<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self { out, err, total: 0 }
    }

    pub fn set_total(&mut self, total: usize) {
        self.total = total;
    }

    pub fn info(&mut self, message: impl Display) {
        let _ = writeln!(self.out, "{} {message}", "info:".cyan().bold());
    }

    pub fn row_success(&mut self, row: usize, verb: &str, dn: &str) {
        let _ = writeln!(
            self.out,
            "{} {} {verb} {dn}",
            self.progress(row),
            "ok:".green().bold()
        );
    }

    pub fn row_error(&mut self, row: usize, error: impl Display) {
        let _ = writeln!(
            self.err,
            "{} {} {error}",
            self.progress(row),
            "error:".red().bold()
        );
    }

    /// Error that ends the run before or outside row processing.
    pub fn fatal(&mut self, error: impl Display) {
        let _ = writeln!(self.err, "{} {error}", "error:".red().bold());
        let _ = self.err.flush();
    }

    pub fn summary(&mut self, summary: &ImportSummary) {
        let line = format!(
            "Processed {} of {} row(s), {} error(s)",
            summary.processed, summary.total, summary.errors
        );
        let styled = if summary.errors == 0 {
            line.green()
        } else {
            line.red()
        };
        let _ = writeln!(self.out, "{styled}");
        let _ = self.out.flush();
    }

    pub fn into_parts(self) -> (O, E) {
        (self.out, self.err)
    }

    fn progress(&self, row: usize) -> String {
        let width = self.total.to_string().len();
        format!("[{row:>width$}/{}]", self.total)
    }
}

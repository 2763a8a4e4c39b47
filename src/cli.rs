use std::{fmt, path::PathBuf};

use clap::{Parser, ValueEnum};

use crate::{dialect::parse_delimiter, encoding::DEFAULT_SAMPLE_BYTES};

pub const STORE_ENV: &str = "CSV_DIRECTORY_STORE";

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Create, modify, or remove directory objects from a CSV file",
    long_about = None
)]
pub struct Cli {
    /// Module type of the objects, e.g. `users/user`
    pub module: String,
    /// Operation applied to every row
    #[arg(value_enum)]
    pub action: Action,
    /// CSV file with one object per row
    pub file: PathBuf,
    /// Directory store the objects are written to
    #[arg(short, long, env = STORE_ENV, default_value = "directory.yml")]
    pub directory: PathBuf,
    /// Character encoding of the input file (detected when omitted)
    #[arg(long)]
    pub encoding: Option<String>,
    /// CSV delimiter character (sniffed from the header line when omitted)
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Number of leading bytes inspected for encoding detection
    #[arg(long, default_value_t = DEFAULT_SAMPLE_BYTES)]
    pub sample_bytes: usize,
    /// Read and validate the file without changing the directory
    #[arg(long)]
    pub dry_run: bool,
    /// Disable colored status output
    #[arg(long)]
    pub no_color: bool,
    /// Log debug details
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
#[value(rename_all = "kebab-case")]
pub enum Action {
    Create,
    Modify,
    Remove,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Modify => "modify",
            Action::Remove => "remove",
        }
    }

    pub fn past_tense(&self) -> &'static str {
        match self {
            Action::Create => "created",
            Action::Modify => "modified",
            Action::Remove => "removed",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//! Row-by-row dispatch of create/modify/remove against a [`DirectoryService`].
//!
//! Rows are processed strictly in order. Failures that concern a single row
//! (validation, lookup, missing relations, storage) are counted and the run
//! continues; failures that prove the column set itself is wrong (unknown
//! property, unknown module) abort immediately. Nothing is rolled back.

use std::io::Write;

use log::{debug, info, warn};
use thiserror::Error;

use crate::{
    cli::Action,
    directory::{DN_COLUMN, DirectoryError, DirectoryObject, DirectoryService, ModuleInfo},
    preflight::{self, ColumnCheck, PreconditionError},
    report::{ImportSummary, Reporter},
    rows::Row,
};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("input contains no data")]
    NoData,
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    Precondition(#[from] PreconditionError),
    #[error("row {row}: {source}; aborting")]
    Aborted {
        row: usize,
        summary: ImportSummary,
        source: DirectoryError,
    },
}

pub struct Importer<'d, D: DirectoryService> {
    directory: &'d mut D,
    module: ModuleInfo,
    action: Action,
}

impl<'d, D: DirectoryService> Importer<'d, D> {
    pub fn new(directory: &'d mut D, module: &str, action: Action) -> Result<Self, ImportError> {
        let module = directory.module(module)?;
        Ok(Self {
            directory,
            module,
            action,
        })
    }

    /// Pre-flight gate over the first row's columns.
    pub fn check(&self, rows: &[Row]) -> Result<ColumnCheck, ImportError> {
        let first = rows.first().ok_or(ImportError::NoData)?;
        let properties = match self.action {
            Action::Remove => Ok(Vec::new()),
            Action::Create | Action::Modify => self.directory.property_names(&self.module.name),
        };
        let outcome = preflight::check_columns(
            self.action,
            &self.module.name,
            &self.module.identifying_property,
            first.columns(),
            properties,
        )?;
        if let ColumnCheck::Skipped(reason) = &outcome {
            warn!("Skipping unknown-column check for '{}': {reason}", self.module.name);
        }
        Ok(outcome)
    }

    /// Processes every row, reporting each outcome and a final summary.
    pub fn run<O: Write, E: Write>(
        &mut self,
        rows: &[Row],
        reporter: &mut Reporter<O, E>,
    ) -> Result<ImportSummary, ImportError> {
        let mut summary = ImportSummary {
            total: rows.len(),
            ..ImportSummary::default()
        };
        reporter.set_total(rows.len());
        info!(
            "Running {} for {} row(s) of '{}'",
            self.action,
            rows.len(),
            self.module.name
        );

        for (idx, row) in rows.iter().enumerate() {
            let number = idx + 1;
            match self.process_row(row) {
                Ok(dn) => {
                    debug!("Row {number}: {} {dn}", self.action.past_tense());
                    summary.processed += 1;
                    reporter.row_success(number, self.action.past_tense(), &dn);
                }
                Err(err) if err.is_fatal() => {
                    summary.errors += 1;
                    reporter.row_error(number, &err);
                    reporter.summary(&summary);
                    return Err(ImportError::Aborted {
                        row: number,
                        summary,
                        source: err,
                    });
                }
                Err(err) => {
                    debug!("Row {number}: {err}");
                    summary.errors += 1;
                    reporter.row_error(number, &err);
                }
            }
        }

        reporter.summary(&summary);
        Ok(summary)
    }

    fn process_row(&mut self, row: &Row) -> Result<String, DirectoryError> {
        match self.action {
            Action::Create => {
                let mut object = self.directory.new_object(&self.module.name)?;
                self.apply(&mut object, row)?;
                self.directory.save(&mut object)
            }
            Action::Modify => {
                let mut object = self.lookup(row)?;
                self.apply(&mut object, row)?;
                self.directory.save(&mut object)
            }
            Action::Remove => {
                let object = self.lookup(row)?;
                let dn = object
                    .dn
                    .clone()
                    .ok_or_else(|| DirectoryError::NotFound("object without dn".to_string()))?;
                self.directory.delete(object)?;
                Ok(dn)
            }
        }
    }

    fn lookup(&self, row: &Row) -> Result<DirectoryObject, DirectoryError> {
        if let Some(dn) = row.get(DN_COLUMN).filter(|dn| !dn.is_empty()) {
            return self.directory.get_by_dn(&self.module.name, dn);
        }
        let key = self.module.identifying_property.as_str();
        match row.get(key).filter(|value| !value.is_empty()) {
            Some(value) => self.directory.get_by_id(&self.module.name, value),
            None => Err(DirectoryError::Validation(format!(
                "row has neither a '{DN_COLUMN}' nor a '{key}' value"
            ))),
        }
    }

    fn apply(&self, object: &mut DirectoryObject, row: &Row) -> Result<(), DirectoryError> {
        for (column, value) in row.iter() {
            match column {
                DN_COLUMN => {}
                "options" | "policies" | "position" | "superordinate" if value.is_empty() => {}
                "options" => object.set_options(value),
                "policies" => object.set_policies(value),
                "position" => object.set_position(value),
                "superordinate" => object.set_superordinate(value),
                _ => self.directory.set_property(object, column, value)?,
            }
        }
        Ok(())
    }
}

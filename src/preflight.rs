//! Column-set checks that run before any row is mutated.

use itertools::Itertools;
use thiserror::Error;

use crate::{
    cli::Action,
    directory::{DN_COLUMN, DirectoryError, STRUCTURAL_COLUMNS},
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("the 'dn' column must not be present when creating objects")]
    DnNotAllowed,
    #[error("either a 'dn' or a '{identifying_property}' column is required")]
    MissingIdentifier { identifying_property: String },
    #[error("unknown column(s) for module '{module}': {}", .columns.join(", "))]
    UnknownColumns { module: String, columns: Vec<String> },
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Outcome of the unknown-column check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnCheck {
    Passed,
    NotRequired,
    /// The module could not enumerate its properties; unknown columns will
    /// surface as per-row failures instead.
    Skipped(String),
}

/// Validates the first row's columns against what `action` needs.
///
/// `properties` is the module's property enumeration result; a
/// [`DirectoryError::MissingRelation`] there skips the unknown-column check,
/// any other error is returned.
pub fn check_columns<'a>(
    action: Action,
    module: &str,
    identifying_property: &str,
    columns: impl IntoIterator<Item = &'a str>,
    properties: Result<Vec<String>, DirectoryError>,
) -> Result<ColumnCheck, PreconditionError> {
    let columns = columns.into_iter().collect::<Vec<_>>();
    let has_dn = columns.contains(&DN_COLUMN);

    match action {
        Action::Create if has_dn => return Err(PreconditionError::DnNotAllowed),
        Action::Modify | Action::Remove
            if !has_dn && !columns.contains(&identifying_property) =>
        {
            return Err(PreconditionError::MissingIdentifier {
                identifying_property: identifying_property.to_string(),
            });
        }
        _ => {}
    }

    if action == Action::Remove {
        return Ok(ColumnCheck::NotRequired);
    }

    let properties = match properties {
        Ok(properties) => properties,
        Err(DirectoryError::MissingRelation(reason)) => return Ok(ColumnCheck::Skipped(reason)),
        Err(err) => return Err(err.into()),
    };
    let unknown = columns
        .iter()
        .filter(|column| {
            !STRUCTURAL_COLUMNS.contains(column) && !properties.iter().any(|p| p == *column)
        })
        .map(|column| column.to_string())
        .sorted()
        .dedup()
        .collect::<Vec<_>>();
    if unknown.is_empty() {
        Ok(ColumnCheck::Passed)
    } else {
        Err(PreconditionError::UnknownColumns {
            module: module.to_string(),
            columns: unknown,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props() -> Result<Vec<String>, DirectoryError> {
        Ok(vec!["username".into(), "lastname".into()])
    }

    #[test]
    fn create_rejects_dn_column() {
        let result = check_columns(
            Action::Create,
            "users/user",
            "username",
            ["dn", "username"],
            props(),
        );
        assert_eq!(result, Err(PreconditionError::DnNotAllowed));
    }

    #[test]
    fn modify_needs_dn_or_identifying_property() {
        let result = check_columns(
            Action::Modify,
            "users/user",
            "username",
            ["lastname"],
            props(),
        );
        assert!(matches!(
            result,
            Err(PreconditionError::MissingIdentifier { .. })
        ));
        assert_eq!(
            check_columns(
                Action::Modify,
                "users/user",
                "username",
                ["dn", "lastname"],
                props()
            ),
            Ok(ColumnCheck::Passed)
        );
    }

    #[test]
    fn remove_skips_property_check() {
        let result = check_columns(
            Action::Remove,
            "users/user",
            "username",
            ["username", "whatever"],
            props(),
        );
        assert_eq!(result, Ok(ColumnCheck::NotRequired));
    }

    #[test]
    fn unknown_columns_are_listed_sorted() {
        let result = check_columns(
            Action::Create,
            "users/user",
            "username",
            ["username", "zeta", "position", "alpha"],
            props(),
        );
        assert_eq!(
            result,
            Err(PreconditionError::UnknownColumns {
                module: "users/user".into(),
                columns: vec!["alpha".into(), "zeta".into()],
            })
        );
    }

    #[test]
    fn missing_relation_skips_unknown_column_check() {
        let result = check_columns(
            Action::Create,
            "dhcp/host",
            "host",
            ["host", "bogus"],
            Err(DirectoryError::MissingRelation("needs service".into())),
        );
        assert_eq!(result, Ok(ColumnCheck::Skipped("needs service".into())));
    }

    #[test]
    fn other_enumeration_errors_propagate() {
        let result = check_columns(
            Action::Modify,
            "users/user",
            "username",
            ["username"],
            Err(DirectoryError::ModuleNotFound("users/user".into())),
        );
        assert!(matches!(result, Err(PreconditionError::Directory(_))));
    }
}

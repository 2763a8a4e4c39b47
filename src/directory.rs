//! Object-management collaborator interface.
//!
//! The import driver never touches a directory backend directly. It talks to
//! a [`DirectoryService`], which owns module schemas and persistence, and
//! manipulates [`DirectoryObject`] values in between calls. Every failure is
//! reported as one [`DirectoryError`] kind so callers can match on it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Columns that map onto object structure rather than module properties.
pub const STRUCTURAL_COLUMNS: &[&str] = &["dn", "options", "policies", "position", "superordinate"];

pub const DN_COLUMN: &str = "dn";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("unknown module type '{0}'")]
    ModuleNotFound(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("no such object: {0}")]
    NotFound(String),
    #[error("missing required relation: {0}")]
    MissingRelation(String),
    #[error("unknown property '{property}' for module '{module}'")]
    UnknownProperty { module: String, property: String },
    #[error("storage failure: {0}")]
    Storage(String),
}

impl DirectoryError {
    /// Failures that invalidate the whole input rather than a single row.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DirectoryError::ModuleNotFound(_) | DirectoryError::UnknownProperty { .. }
        )
    }
}

/// A directory entry as seen between lookup and persistence.
///
/// `dn` is `None` until the object has been saved for the first time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryObject {
    pub module: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superordinate: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub policies: Vec<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl DirectoryObject {
    pub fn new(module: &str) -> Self {
        Self {
            module: module.to_string(),
            ..Self::default()
        }
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    pub fn set_position(&mut self, position: &str) {
        self.position = Some(position.to_string());
    }

    pub fn set_superordinate(&mut self, dn: &str) {
        self.superordinate = Some(dn.to_string());
    }

    pub fn set_options(&mut self, value: &str) {
        self.options = split_list(value);
    }

    pub fn set_policies(&mut self, value: &str) {
        self.policies = split_list(value);
    }
}

fn split_list(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

/// Schema facts the driver needs about a module type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub name: String,
    pub identifying_property: String,
}

pub trait DirectoryService {
    fn module(&self, module: &str) -> Result<ModuleInfo, DirectoryError>;

    /// Names of all properties the module accepts. Fails with
    /// [`DirectoryError::MissingRelation`] when the schema depends on a
    /// superordinate that is not known yet.
    fn property_names(&self, module: &str) -> Result<Vec<String>, DirectoryError>;

    fn new_object(&self, module: &str) -> Result<DirectoryObject, DirectoryError>;

    fn get_by_dn(&self, module: &str, dn: &str) -> Result<DirectoryObject, DirectoryError>;

    /// Looks up the single object whose identifying property equals `value`.
    fn get_by_id(&self, module: &str, value: &str) -> Result<DirectoryObject, DirectoryError>;

    fn set_property(
        &self,
        object: &mut DirectoryObject,
        name: &str,
        value: &str,
    ) -> Result<(), DirectoryError>;

    /// Persists the object and returns its distinguished name.
    fn save(&mut self, object: &mut DirectoryObject) -> Result<String, DirectoryError>;

    fn delete(&mut self, object: DirectoryObject) -> Result<(), DirectoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_setters_split_on_whitespace() {
        let mut object = DirectoryObject::new("users/user");
        object.set_options("pki  kerberos\tmail");
        object.set_policies("cn=pw,cn=policies,dc=example,dc=com");
        assert_eq!(object.options, vec!["pki", "kerberos", "mail"]);
        assert_eq!(object.policies, vec!["cn=pw,cn=policies,dc=example,dc=com"]);
    }

    #[test]
    fn fatal_kinds() {
        assert!(DirectoryError::ModuleNotFound("x".into()).is_fatal());
        assert!(
            DirectoryError::UnknownProperty {
                module: "m".into(),
                property: "p".into()
            }
            .is_fatal()
        );
        assert!(!DirectoryError::NotFound("x".into()).is_fatal());
        assert!(!DirectoryError::Validation("x".into()).is_fatal());
    }
}

//! YAML-file directory backend.
//!
//! [`LocalDirectory`] implements [`DirectoryService`] over a single YAML
//! document holding module definitions and the stored objects. Every
//! successful `save`/`delete` rewrites the file, so completed rows survive an
//! aborted run.
//!
//! ```yaml
//! base: dc=example,dc=com
//! modules:
//!   users/user:
//!     identifying_property: username
//!     rdn: uid
//!     container: cn=users
//!     properties: [username, firstname, lastname, password, mail]
//!     required: [username, lastname]
//!     options: [pki, kerberos]
//! objects: []
//! ```

use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::directory::{DirectoryError, DirectoryObject, DirectoryService, ModuleInfo};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDefinition {
    pub identifying_property: String,
    /// Attribute name used for the leading dn component; defaults to the identifying property.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rdn: Option<String>,
    /// Default container, relative to the store base.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(default)]
    pub properties: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Module type of the object every instance must be placed under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superordinate: Option<String>,
}

impl ModuleDefinition {
    fn rdn_attribute(&self) -> &str {
        self.rdn.as_deref().unwrap_or(&self.identifying_property)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreDocument {
    pub base: String,
    #[serde(default)]
    pub modules: BTreeMap<String, ModuleDefinition>,
    #[serde(default)]
    pub objects: Vec<DirectoryObject>,
}

#[derive(Debug)]
pub struct LocalDirectory {
    path: Option<PathBuf>,
    document: StoreDocument,
}

impl LocalDirectory {
    pub fn load(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("Opening directory store {path:?}"))?;
        let reader = BufReader::new(file);
        let document: StoreDocument = serde_yaml::from_reader(reader)
            .with_context(|| format!("Parsing directory store {path:?}"))?;
        debug!(
            "Loaded {} module(s) and {} object(s) from {:?}",
            document.modules.len(),
            document.objects.len(),
            path
        );
        Ok(Self {
            path: Some(path.to_path_buf()),
            document,
        })
    }

    /// Store that lives only in memory; nothing is written on save.
    pub fn in_memory(document: StoreDocument) -> Self {
        Self {
            path: None,
            document,
        }
    }

    pub fn objects(&self, module: &str) -> impl Iterator<Item = &DirectoryObject> {
        self.document
            .objects
            .iter()
            .filter(move |object| object.module == module)
    }

    fn definition(&self, module: &str) -> Result<&ModuleDefinition, DirectoryError> {
        self.document
            .modules
            .get(module)
            .ok_or_else(|| DirectoryError::ModuleNotFound(module.to_string()))
    }

    fn position_of(&self, dn: &str) -> Option<usize> {
        self.document
            .objects
            .iter()
            .position(|object| object.dn.as_deref().is_some_and(|d| same_dn(d, dn)))
    }

    fn has_subordinates(&self, dn: &str) -> bool {
        self.document.objects.iter().any(|object| {
            object
                .superordinate
                .as_deref()
                .is_some_and(|sup| same_dn(sup, dn))
        })
    }

    fn default_position(&self, definition: &ModuleDefinition) -> String {
        match definition.container.as_deref() {
            Some(container) if !container.is_empty() => {
                format!("{container},{}", self.document.base)
            }
            _ => self.document.base.clone(),
        }
    }

    fn validate(
        &self,
        definition: &ModuleDefinition,
        object: &DirectoryObject,
    ) -> Result<(), DirectoryError> {
        if let Some(option) = object
            .options
            .iter()
            .find(|option| !definition.options.contains(option))
        {
            return Err(DirectoryError::Validation(format!(
                "option '{option}' is not available for module '{}'",
                object.module
            )));
        }
        let missing = definition
            .required
            .iter()
            .filter(|name| object.property(name).is_none_or(str::is_empty))
            .cloned()
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(DirectoryError::Validation(format!(
                "required propert{} missing: {}",
                if missing.len() == 1 { "y" } else { "ies" },
                missing.join(", ")
            )));
        }
        if let Some(sup_module) = definition.superordinate.as_deref() {
            let sup_dn = object.superordinate.as_deref().ok_or_else(|| {
                DirectoryError::MissingRelation(format!(
                    "module '{}' requires a '{sup_module}' superordinate",
                    object.module
                ))
            })?;
            let exists = self
                .position_of(sup_dn)
                .is_some_and(|idx| self.document.objects[idx].module == sup_module);
            if !exists {
                return Err(DirectoryError::MissingRelation(format!(
                    "superordinate '{sup_dn}' does not exist"
                )));
            }
        }
        Ok(())
    }

    fn flush(&self) -> Result<(), DirectoryError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let yaml = serde_yaml::to_string(&self.document)
            .map_err(|err| DirectoryError::Storage(err.to_string()))?;
        fs::write(path, yaml).map_err(|err| {
            DirectoryError::Storage(format!("writing {}: {err}", path.display()))
        })
    }

    fn commit(&mut self, previous: StoreDocument) -> Result<(), DirectoryError> {
        if let Err(err) = self.flush() {
            self.document = previous;
            return Err(err);
        }
        Ok(())
    }
}

impl DirectoryService for LocalDirectory {
    fn module(&self, module: &str) -> Result<ModuleInfo, DirectoryError> {
        let definition = self.definition(module)?;
        Ok(ModuleInfo {
            name: module.to_string(),
            identifying_property: definition.identifying_property.clone(),
        })
    }

    fn property_names(&self, module: &str) -> Result<Vec<String>, DirectoryError> {
        let definition = self.definition(module)?;
        if let Some(sup_module) = &definition.superordinate {
            return Err(DirectoryError::MissingRelation(format!(
                "properties of '{module}' depend on a '{sup_module}' superordinate"
            )));
        }
        Ok(definition.properties.clone())
    }

    fn new_object(&self, module: &str) -> Result<DirectoryObject, DirectoryError> {
        self.definition(module)?;
        Ok(DirectoryObject::new(module))
    }

    fn get_by_dn(&self, module: &str, dn: &str) -> Result<DirectoryObject, DirectoryError> {
        self.definition(module)?;
        self.position_of(dn)
            .map(|idx| &self.document.objects[idx])
            .filter(|object| object.module == module)
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound(dn.to_string()))
    }

    fn get_by_id(&self, module: &str, value: &str) -> Result<DirectoryObject, DirectoryError> {
        let definition = self.definition(module)?;
        let key = definition.identifying_property.as_str();
        let mut matches = self
            .objects(module)
            .filter(|object| object.property(key) == Some(value));
        let Some(found) = matches.next() else {
            return Err(DirectoryError::NotFound(format!("{key}={value}")));
        };
        if matches.next().is_some() {
            return Err(DirectoryError::Validation(format!(
                "more than one '{module}' object has {key}={value}"
            )));
        }
        Ok(found.clone())
    }

    fn set_property(
        &self,
        object: &mut DirectoryObject,
        name: &str,
        value: &str,
    ) -> Result<(), DirectoryError> {
        let definition = self.definition(&object.module)?;
        if !definition.properties.iter().any(|p| p == name) {
            return Err(DirectoryError::UnknownProperty {
                module: object.module.clone(),
                property: name.to_string(),
            });
        }
        object.properties.insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn save(&mut self, object: &mut DirectoryObject) -> Result<String, DirectoryError> {
        let definition = self.definition(&object.module)?.clone();
        self.validate(&definition, object)?;

        let rdn_value = object
            .property(&definition.identifying_property)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                DirectoryError::Validation(format!(
                    "'{}' must be set to name the object",
                    definition.identifying_property
                ))
            })?
            .to_string();
        let position = match (&object.position, &object.superordinate) {
            (Some(position), _) => position.clone(),
            (None, Some(sup)) if definition.superordinate.is_some() => sup.clone(),
            _ => self.default_position(&definition),
        };
        let dn = format!("{}={rdn_value},{position}", definition.rdn_attribute());

        let existing = match object.dn.as_deref() {
            Some(old) => Some(
                self.position_of(old)
                    .ok_or_else(|| DirectoryError::NotFound(old.to_string()))?,
            ),
            None => None,
        };
        if let Some(conflict) = self.position_of(&dn)
            && Some(conflict) != existing
        {
            return Err(DirectoryError::Validation(format!(
                "an object named '{dn}' already exists"
            )));
        }
        if let Some(old) = object.dn.as_deref()
            && !same_dn(old, &dn)
            && self.has_subordinates(old)
        {
            return Err(DirectoryError::Validation(format!(
                "cannot rename '{old}' while other objects are placed under it"
            )));
        }

        object.position = Some(position);
        object.dn = Some(dn.clone());
        let previous = self.document.clone();
        match existing {
            Some(idx) => self.document.objects[idx] = object.clone(),
            None => self.document.objects.push(object.clone()),
        }
        self.commit(previous)?;
        Ok(dn)
    }

    fn delete(&mut self, object: DirectoryObject) -> Result<(), DirectoryError> {
        let dn = object
            .dn
            .ok_or_else(|| DirectoryError::NotFound("object has not been saved".to_string()))?;
        let idx = self
            .position_of(&dn)
            .ok_or_else(|| DirectoryError::NotFound(dn.clone()))?;
        if self.has_subordinates(&dn) {
            return Err(DirectoryError::Validation(format!(
                "'{dn}' still has subordinate objects"
            )));
        }
        let previous = self.document.clone();
        self.document.objects.remove(idx);
        self.commit(previous)
    }
}

fn same_dn(left: &str, right: &str) -> bool {
    left.eq_ignore_ascii_case(right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const STORE: &str = r#"
base: dc=example,dc=com
modules:
  users/user:
    identifying_property: username
    rdn: uid
    container: cn=users
    properties: [username, firstname, lastname, mail]
    required: [username, lastname]
    options: [pki]
  dhcp/service:
    identifying_property: service
    rdn: cn
    properties: [service]
  dhcp/host:
    identifying_property: host
    rdn: cn
    properties: [host, hwaddress]
    superordinate: dhcp/service
objects:
  - module: users/user
    dn: uid=alice,cn=users,dc=example,dc=com
    position: cn=users,dc=example,dc=com
    properties: {username: alice, lastname: Liddell}
"#;

    fn store() -> LocalDirectory {
        LocalDirectory::in_memory(serde_yaml::from_str(STORE).unwrap())
    }

    fn user(store: &LocalDirectory, username: &str, lastname: &str) -> DirectoryObject {
        let mut object = store.new_object("users/user").unwrap();
        store.set_property(&mut object, "username", username).unwrap();
        store.set_property(&mut object, "lastname", lastname).unwrap();
        object
    }

    #[test]
    fn unknown_module_is_reported() {
        assert_eq!(
            store().module("users/nobody"),
            Err(DirectoryError::ModuleNotFound("users/nobody".into()))
        );
    }

    #[test]
    fn save_assigns_dn_under_container() {
        let mut store = store();
        let mut object = user(&store, "bob", "Builder");
        let dn = store.save(&mut object).unwrap();
        assert_eq!(dn, "uid=bob,cn=users,dc=example,dc=com");
        assert_eq!(store.objects("users/user").count(), 2);
    }

    #[test]
    fn save_rejects_missing_required_and_duplicates() {
        let mut store = store();
        let mut object = store.new_object("users/user").unwrap();
        store.set_property(&mut object, "username", "carol").unwrap();
        assert!(matches!(
            store.save(&mut object),
            Err(DirectoryError::Validation(_))
        ));

        let mut duplicate = user(&store, "alice", "Other");
        assert!(matches!(
            store.save(&mut duplicate),
            Err(DirectoryError::Validation(msg)) if msg.contains("already exists")
        ));
    }

    #[test]
    fn save_rejects_undeclared_option() {
        let mut store = store();
        let mut object = user(&store, "dave", "Grohl");
        object.set_options("pki samba");
        assert!(matches!(
            store.save(&mut object),
            Err(DirectoryError::Validation(msg)) if msg.contains("samba")
        ));
    }

    #[test]
    fn set_property_rejects_unknown_names() {
        let store = store();
        let mut object = store.new_object("users/user").unwrap();
        assert_eq!(
            store.set_property(&mut object, "shoe_size", "44"),
            Err(DirectoryError::UnknownProperty {
                module: "users/user".into(),
                property: "shoe_size".into()
            })
        );
    }

    #[test]
    fn lookup_by_id_and_dn() {
        let store = store();
        let by_id = store.get_by_id("users/user", "alice").unwrap();
        let by_dn = store
            .get_by_dn("users/user", "UID=alice,cn=users,dc=example,dc=com")
            .unwrap();
        assert_eq!(by_id, by_dn);
        assert!(matches!(
            store.get_by_id("users/user", "zed"),
            Err(DirectoryError::NotFound(_))
        ));
    }

    #[test]
    fn modify_renames_when_identifier_changes() {
        let mut store = store();
        let mut object = store.get_by_id("users/user", "alice").unwrap();
        store.set_property(&mut object, "username", "alicia").unwrap();
        let dn = store.save(&mut object).unwrap();
        assert_eq!(dn, "uid=alicia,cn=users,dc=example,dc=com");
        assert_eq!(store.objects("users/user").count(), 1);
    }

    #[test]
    fn superordinate_modules_cannot_enumerate_properties() {
        let store = store();
        assert!(matches!(
            store.property_names("dhcp/host"),
            Err(DirectoryError::MissingRelation(_))
        ));
        assert_eq!(
            store.property_names("dhcp/service").unwrap(),
            vec!["service".to_string()]
        );
    }

    #[test]
    fn subordinate_needs_existing_superordinate() {
        let mut store = store();
        let mut host = store.new_object("dhcp/host").unwrap();
        store.set_property(&mut host, "host", "printer").unwrap();
        assert!(matches!(
            store.save(&mut host),
            Err(DirectoryError::MissingRelation(_))
        ));

        let mut service = store.new_object("dhcp/service").unwrap();
        store.set_property(&mut service, "service", "lan").unwrap();
        let service_dn = store.save(&mut service).unwrap();
        host.set_superordinate(&service_dn);
        let host_dn = store.save(&mut host).unwrap();
        assert_eq!(host_dn, "cn=printer,cn=lan,dc=example,dc=com");

        let service = store.get_by_dn("dhcp/service", &service_dn).unwrap();
        assert!(matches!(
            store.delete(service),
            Err(DirectoryError::Validation(_))
        ));
    }

    #[test]
    fn delete_removes_object() {
        let mut store = store();
        let object = store.get_by_id("users/user", "alice").unwrap();
        store.delete(object).unwrap();
        assert_eq!(store.objects("users/user").count(), 0);
    }

    #[test]
    fn file_store_persists_changes() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("directory.yml");
        fs::write(&path, STORE).expect("write store");

        let mut store = LocalDirectory::load(&path).unwrap();
        let mut object = user(&store, "erin", "Hannon");
        store.save(&mut object).unwrap();

        let reloaded = LocalDirectory::load(&path).unwrap();
        assert!(reloaded.get_by_id("users/user", "erin").is_ok());
    }
}

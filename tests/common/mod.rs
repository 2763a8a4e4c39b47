#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use csv_directory::store::LocalDirectory;
use tempfile::{TempDir, tempdir};

pub const STORE: &str = r#"
base: dc=example,dc=com
modules:
  users/user:
    identifying_property: username
    rdn: uid
    container: cn=users
    properties: [username, firstname, lastname, password, mail]
    required: [username, lastname]
    options: [pki, kerberos]
  dhcp/service:
    identifying_property: service
    rdn: cn
    container: cn=dhcp
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
  - module: users/user
    dn: uid=bob,cn=users,dc=example,dc=com
    position: cn=users,dc=example,dc=com
    properties: {username: bob, lastname: Builder}
  - module: dhcp/service
    dn: cn=lan,cn=dhcp,dc=example,dc=com
    position: cn=dhcp,dc=example,dc=com
    properties: {service: lan}
"#;

/// Scratch directory holding a directory store and CSV inputs.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a workspace seeded with the default directory store.
    pub fn new() -> Self {
        let workspace = Self {
            temp_dir: tempdir().expect("temp dir"),
        };
        workspace.write("directory.yml", STORE);
        workspace
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn store_path(&self) -> PathBuf {
        self.path().join("directory.yml")
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        self.write_bytes(name, contents.as_bytes())
    }

    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents).expect("write temp file contents");
        path
    }

    pub fn store(&self) -> LocalDirectory {
        LocalDirectory::load(&self.store_path()).expect("load store")
    }

    pub fn store_text(&self) -> String {
        fs::read_to_string(self.store_path()).expect("read store")
    }

    /// Binary invocation preconfigured with this workspace's store.
    pub fn command(&self, module: &str, action: &str, csv: &Path) -> Command {
        let mut cmd = Command::cargo_bin("csv-directory").expect("binary exists");
        cmd.env_remove("CSV_DIRECTORY_STORE")
            .env_remove("RUST_LOG")
            .env("NO_COLOR", "1")
            .args([module, action, csv.to_str().unwrap()])
            .args(["--directory", self.store_path().to_str().unwrap()]);
        cmd
    }
}

//! Read-only queries against the broker's security document.
//!
//! # Purpose
//! Answers identity and role questions (does a role exist, who is admin, what
//! kind of entity is a client) from the file the broker's dynamic-security
//! plugin persists.
//!
//! # Key invariants and assumptions
//! - Every query reloads and fully parses the document. There is no cache, so
//!   answers are as fresh as the broker's last save and no fresher.
//! - The file is never written here.
//! - A document that cannot be loaded is an error, never an empty answer.
//!
//! # Concurrency
//! Reads are blocking `std::fs` calls with no lock against a concurrent writer.
//! A read racing a broker save may fail to parse; callers surface that as
//! `DocumentUnavailable` and may retry the request.
use crate::document::{ClientRecord, Identity, RoleRecord, SecurityDocument};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("security document {path} does not exist")]
    Missing { path: PathBuf },
    #[error("read security document {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("parse security document {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type DocumentResult<T> = Result<T, DocumentError>;

#[derive(Debug, Clone)]
pub struct SecurityStateReader {
    path: PathBuf,
}

impl SecurityStateReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load and parse the whole document.
    ///
    /// # Errors
    /// - [`DocumentError::Missing`] if the file does not exist.
    /// - [`DocumentError::Io`] for any other read failure.
    /// - [`DocumentError::Malformed`] if the contents are not a valid document.
    pub fn load(&self) -> DocumentResult<SecurityDocument> {
        let contents = std::fs::read(&self.path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => DocumentError::Missing {
                path: self.path.clone(),
            },
            _ => DocumentError::Io {
                path: self.path.clone(),
                source,
            },
        })?;
        serde_json::from_slice(&contents).map_err(|source| DocumentError::Malformed {
            path: self.path.clone(),
            source,
        })
    }

    pub fn role_exists(&self, rolename: &str) -> DocumentResult<bool> {
        Ok(self.load()?.role_exists(rolename))
    }

    pub fn find_admin_client(&self) -> DocumentResult<Option<String>> {
        Ok(self.load()?.admin_client().map(str::to_string))
    }

    pub fn get_client(&self, username: &str) -> DocumentResult<Option<ClientRecord>> {
        Ok(self.load()?.client(username).cloned())
    }

    pub fn get_role(&self, rolename: &str) -> DocumentResult<Option<RoleRecord>> {
        Ok(self.load()?.role(rolename).cloned())
    }

    pub fn primary_role_of(&self, username: &str) -> DocumentResult<Option<String>> {
        Ok(self.load()?.primary_role_of(username).map(str::to_string))
    }

    pub fn client_role(&self, username: &str) -> DocumentResult<Option<RoleRecord>> {
        Ok(self.load()?.client_role(username).cloned())
    }

    pub fn classify(&self, username: &str) -> DocumentResult<Identity> {
        Ok(self.load()?.classify(username))
    }

    pub fn device_client(&self, username: &str) -> DocumentResult<Option<ClientRecord>> {
        Ok(self.load()?.device_client(username).cloned())
    }

    pub fn app_client(&self, username: &str) -> DocumentResult<Option<ClientRecord>> {
        Ok(self.load()?.app_client(username).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const DOCUMENT: &str = r#"{
        "clients": [
            { "username": "root", "roles": [{ "rolename": "admin" }] },
            { "username": "sensor-1", "roles": [{ "rolename": "sensor-1" }] },
            { "username": "dash", "roles": [{ "rolename": "$apps", "priority": -1 }] }
        ],
        "roles": [
            { "rolename": "admin", "acls": [] },
            { "rolename": "sensor-1", "acls": [] },
            { "rolename": "$apps", "acls": [] }
        ]
    }"#;

    fn write_document(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write");
        file
    }

    #[test]
    fn queries_answer_from_the_file() {
        let file = write_document(DOCUMENT);
        let reader = SecurityStateReader::new(file.path());

        assert!(reader.role_exists("$apps").expect("role_exists"));
        assert!(!reader.role_exists("$apps_dash").expect("role_exists"));
        assert_eq!(
            reader.find_admin_client().expect("admin"),
            Some("root".to_string())
        );
        assert_eq!(
            reader.primary_role_of("dash").expect("primary"),
            Some("$apps".to_string())
        );
        assert_eq!(reader.classify("sensor-1").expect("classify"), Identity::Device);
        assert_eq!(reader.classify("dash").expect("classify"), Identity::App);
        assert_eq!(reader.classify("ghost").expect("classify"), Identity::Unknown);
        assert!(reader.get_client("ghost").expect("client").is_none());
        assert!(reader.get_role("admin").expect("role").is_some());
        assert!(reader.device_client("sensor-1").expect("device").is_some());
        assert!(reader.app_client("sensor-1").expect("app").is_none());
        assert_eq!(
            reader
                .client_role("dash")
                .expect("client role")
                .map(|role| role.rolename),
            Some("$apps".to_string())
        );
    }

    #[test]
    fn every_query_sees_the_latest_contents() {
        let file = write_document(r#"{ "clients": [], "roles": [] }"#);
        let reader = SecurityStateReader::new(file.path());
        assert_eq!(reader.find_admin_client().expect("admin"), None);

        std::fs::write(file.path(), DOCUMENT).expect("rewrite");
        assert_eq!(
            reader.find_admin_client().expect("admin"),
            Some("root".to_string())
        );
    }

    #[test]
    fn missing_document_is_an_error_not_an_empty_answer() {
        let dir = tempfile::tempdir().expect("temp dir");
        let reader = SecurityStateReader::new(dir.path().join("dynamic-security.json"));
        assert!(matches!(
            reader.role_exists("$apps"),
            Err(DocumentError::Missing { .. })
        ));
        assert!(matches!(
            reader.get_client("dash"),
            Err(DocumentError::Missing { .. })
        ));
    }

    #[test]
    fn malformed_document_is_reported() {
        let file = write_document("{ \"clients\": [ ");
        let reader = SecurityStateReader::new(file.path());
        let err = reader.classify("dash").expect_err("malformed");
        assert!(matches!(err, DocumentError::Malformed { .. }));
        assert!(err.to_string().contains("parse security document"));
    }
}

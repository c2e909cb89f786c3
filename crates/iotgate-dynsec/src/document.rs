//! Shapes of the broker's persisted dynamic-security document.
//!
//! Only the fields this system reads are modelled; everything else in the
//! document (hashed passwords, default ACL access, groups) is ignored on load.
use crate::naming::{ADMIN_ROLE, SHARED_ROLE};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityDocument {
    #[serde(default)]
    pub clients: Vec<ClientRecord>,
    #[serde(default)]
    pub roles: Vec<RoleRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub username: String,
    #[serde(default)]
    pub roles: Vec<ClientRole>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRole {
    pub rolename: String,
    #[serde(default)]
    pub priority: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRecord {
    pub rolename: String,
    #[serde(default)]
    pub acls: Vec<AclEntry>,
}

/// ACL entry as stored by the broker.
///
/// `acltype` stays a string here: the document may hold kinds this system
/// never writes (`publishClientReceive`, `unsubscribePattern`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclEntry {
    pub acltype: String,
    pub topic: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub allow: bool,
}

/// What kind of entity a broker client represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Identity {
    Device,
    App,
    Unknown,
}

impl SecurityDocument {
    pub fn client(&self, username: &str) -> Option<&ClientRecord> {
        self.clients.iter().find(|client| client.username == username)
    }

    pub fn role(&self, rolename: &str) -> Option<&RoleRecord> {
        self.roles.iter().find(|role| role.rolename == rolename)
    }

    pub fn role_exists(&self, rolename: &str) -> bool {
        self.role(rolename).is_some()
    }

    /// First client holding the `admin` role, in document order.
    pub fn admin_client(&self) -> Option<&str> {
        self.clients
            .iter()
            .find(|client| client.roles.iter().any(|role| role.rolename == ADMIN_ROLE))
            .map(|client| client.username.as_str())
    }

    /// First role binding of a client.
    pub fn primary_role_of(&self, username: &str) -> Option<&str> {
        self.client(username)
            .and_then(|client| client.roles.first())
            .map(|role| role.rolename.as_str())
    }

    /// Role record behind a client's primary binding.
    pub fn client_role(&self, username: &str) -> Option<&RoleRecord> {
        self.primary_role_of(username)
            .and_then(|rolename| self.role(rolename))
    }

    /// Classify a client by its primary role.
    ///
    /// The App check runs first: a primary role starting with `$apps` makes the
    /// client an App even if the role name also equals the client's own name.
    /// Otherwise a client bound to a role named like itself is a Device.
    pub fn classify(&self, username: &str) -> Identity {
        match self.primary_role_of(username) {
            Some(role) if role.starts_with(SHARED_ROLE) => Identity::App,
            Some(role) if role == username => Identity::Device,
            _ => Identity::Unknown,
        }
    }

    pub fn device_client(&self, username: &str) -> Option<&ClientRecord> {
        match self.classify(username) {
            Identity::Device => self.client(username),
            _ => None,
        }
    }

    pub fn app_client(&self, username: &str) -> Option<&ClientRecord> {
        match self.classify(username) {
            Identity::App => self.client(username),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> SecurityDocument {
        serde_json::from_value(json!({
            "defaultACLAccess": { "publishClientSend": false },
            "clients": [
                { "username": "broker-admin", "textname": "admin", "password": "hash",
                  "roles": [{ "rolename": "admin" }] },
                { "username": "sensor-1", "roles": [{ "rolename": "sensor-1", "priority": 0 }] },
                { "username": "dash", "roles": [{ "rolename": "$apps", "priority": -1 }] },
                { "username": "vault", "roles": [{ "rolename": "$apps_vault", "priority": -1 }] },
                { "username": "orphan", "roles": [] },
                { "username": "guest", "roles": [{ "rolename": "viewers" }] }
            ],
            "roles": [
                { "rolename": "admin", "acls": [] },
                { "rolename": "sensor-1", "acls": [
                    { "acltype": "publishClientSend", "topic": "iot3/sensor-1/evt/#", "priority": 0, "allow": true },
                    { "acltype": "publishClientReceive", "topic": "iot3/sensor-1/cmd/#", "allow": true }
                ] },
                { "rolename": "$apps", "acls": [] },
                { "rolename": "$apps_vault", "acls": [] }
            ]
        }))
        .expect("document")
    }

    #[test]
    fn lookups_return_none_when_absent() {
        let doc = sample();
        assert!(doc.client("nobody").is_none());
        assert!(doc.role("nobody").is_none());
        assert!(doc.primary_role_of("nobody").is_none());
        assert!(doc.primary_role_of("orphan").is_none());
        assert!(doc.client_role("guest").is_none());
    }

    #[test]
    fn admin_client_is_found_by_role_binding() {
        assert_eq!(sample().admin_client(), Some("broker-admin"));

        let mut doc = sample();
        doc.clients.retain(|client| client.username != "broker-admin");
        assert_eq!(doc.admin_client(), None);
    }

    #[test]
    fn client_role_resolves_primary_binding() {
        let doc = sample();
        let role = doc.client_role("sensor-1").expect("role");
        assert_eq!(role.rolename, "sensor-1");
        assert_eq!(role.acls.len(), 2);
        assert_eq!(role.acls[1].acltype, "publishClientReceive");
    }

    #[test]
    fn classification() {
        let doc = sample();
        assert_eq!(doc.classify("sensor-1"), Identity::Device);
        assert_eq!(doc.classify("dash"), Identity::App);
        assert_eq!(doc.classify("vault"), Identity::App);
        assert_eq!(doc.classify("broker-admin"), Identity::Unknown);
        assert_eq!(doc.classify("orphan"), Identity::Unknown);
        assert_eq!(doc.classify("guest"), Identity::Unknown);
        assert_eq!(doc.classify("nobody"), Identity::Unknown);
        assert!(doc.device_client("sensor-1").is_some());
        assert!(doc.device_client("dash").is_none());
        assert!(doc.app_client("vault").is_some());
        assert!(doc.app_client("sensor-1").is_none());
    }

    #[test]
    fn self_named_app_role_classifies_as_app() {
        // Malformed data: a client bound to a role that both carries the App
        // prefix and equals its own name.
        let doc: SecurityDocument = serde_json::from_value(json!({
            "clients": [{ "username": "$apps_x", "roles": [{ "rolename": "$apps_x" }] }],
            "roles": []
        }))
        .expect("document");
        assert_eq!(doc.classify("$apps_x"), Identity::App);
    }

    #[test]
    fn classification_is_total_over_clients() {
        let doc = sample();
        for client in &doc.clients {
            let identity = doc.classify(&client.username);
            let matches = [Identity::Device, Identity::App, Identity::Unknown]
                .iter()
                .filter(|candidate| **candidate == identity)
                .count();
            assert_eq!(matches, 1);
            assert_eq!(
                doc.device_client(&client.username).is_some(),
                identity == Identity::Device
            );
            assert_eq!(
                doc.app_client(&client.username).is_some(),
                identity == Identity::App
            );
        }
    }

    #[test]
    fn missing_collections_default_to_empty() {
        let doc: SecurityDocument = serde_json::from_value(json!({})).expect("document");
        assert!(doc.clients.is_empty());
        assert!(doc.roles.is_empty());
        assert_eq!(doc.admin_client(), None);
    }
}

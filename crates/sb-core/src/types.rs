//! Core domain types
//!
//! Server and group records come from the bridge API in loosely specified
//! shapes (wrapped or bare arrays, `_id` or `id`, numeric or string ports).
//! They are validated exactly once here, at the API boundary; everything
//! downstream works with the normalized descriptors.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::NetworkError;

/// Fixed size of a file transfer chunk (256 KiB)
pub const TRANSFER_CHUNK_SIZE: usize = 262_144;

/// SSH port assumed when a server record has none
pub const DEFAULT_SSH_PORT: u16 = 22;

/// A server reachable through the bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerDescriptor {
    pub id: String,
    pub name: String,
    pub ip: String,
    pub port: u16,
    /// Account used on the target host
    pub login_name: String,
    pub private_key_path: Option<String>,
    pub hostname: Option<String>,
    pub status: Option<String>,
    /// Group id, when the server belongs to one
    pub group: Option<String>,
}

impl ServerDescriptor {
    /// Whether the name contains `marker`, ignoring case
    pub fn is_production(&self, marker: &str) -> bool {
        !marker.is_empty() && self.name.to_uppercase().contains(&marker.to_uppercase())
    }

    /// Status label for listings
    pub fn display_status(&self) -> &str {
        self.status.as_deref().unwrap_or("Available")
    }

    /// Whether `query` names this server exactly (by name or hostname)
    pub fn matches(&self, query: &str) -> bool {
        self.name == query || self.hostname.as_deref() == Some(query)
    }
}

/// A named group of servers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupDescriptor {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawServer {
    #[serde(rename = "_id")]
    underscore_id: Option<Value>,
    id: Option<Value>,
    name: Option<String>,
    ip: Option<String>,
    hostname: Option<String>,
    port: Option<Value>,
    server_login_name: Option<String>,
    private_key_path: Option<String>,
    status: Option<String>,
    connection_status: Option<String>,
    group: Option<Value>,
    group_id: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawGroup {
    #[serde(rename = "_id")]
    underscore_id: Option<Value>,
    id: Option<Value>,
    name: Option<String>,
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_port(value: Option<&Value>) -> u16 {
    let port = match value {
        Some(Value::Number(n)) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
        Some(Value::String(s)) => s.trim().parse::<u16>().ok(),
        _ => None,
    };
    port.filter(|p| *p != 0).unwrap_or(DEFAULT_SSH_PORT)
}

impl TryFrom<RawServer> for ServerDescriptor {
    type Error = String;

    fn try_from(raw: RawServer) -> Result<Self, Self::Error> {
        let id = raw
            .underscore_id
            .as_ref()
            .and_then(scalar_string)
            .or_else(|| raw.id.as_ref().and_then(scalar_string))
            .ok_or("missing id")?;
        let name = raw.name.filter(|n| !n.is_empty()).ok_or("missing name")?;
        let ip = raw
            .ip
            .filter(|ip| !ip.is_empty())
            .or_else(|| raw.hostname.clone())
            .ok_or("missing ip")?;

        // `group` is either an id or an embedded group object
        let group = match raw.group.as_ref() {
            Some(Value::Object(map)) => map
                .get("_id")
                .or_else(|| map.get("id"))
                .and_then(scalar_string),
            Some(other) => scalar_string(other),
            None => None,
        }
        .or_else(|| raw.group_id.as_ref().and_then(scalar_string));

        Ok(Self {
            id,
            name,
            ip,
            port: parse_port(raw.port.as_ref()),
            login_name: raw.server_login_name.unwrap_or_default(),
            private_key_path: raw.private_key_path.filter(|p| !p.is_empty()),
            hostname: raw.hostname,
            status: raw.status.or(raw.connection_status),
            group,
        })
    }
}

fn list_items<'a>(body: &'a Value, key: &str) -> Option<&'a Vec<Value>> {
    body.get(key)
        .and_then(Value::as_array)
        .or_else(|| body.as_array())
}

/// Decode a `GET /api/servers` body (`{servers:[...]}` or a bare array).
///
/// Malformed entries are dropped with a warning; a body of any other shape
/// is an error.
pub fn decode_servers(body: &Value) -> Result<Vec<ServerDescriptor>, NetworkError> {
    let items = list_items(body, "servers").ok_or_else(|| {
        NetworkError::Decode(format!("unexpected server list structure: {}", body))
    })?;

    let servers = items
        .iter()
        .filter_map(|item| {
            serde_json::from_value::<RawServer>(item.clone())
                .map_err(|e| e.to_string())
                .and_then(ServerDescriptor::try_from)
                .map_err(|reason| {
                    tracing::warn!(%reason, "Skipping malformed server record");
                })
                .ok()
        })
        .collect();

    Ok(servers)
}

/// Decode a `GET /api/servers/groups` body (bare array or `{groups:[...]}`).
///
/// Groups are decoration only, so an unexpected shape yields an empty list.
pub fn decode_groups(body: &Value) -> Vec<GroupDescriptor> {
    let Some(items) = list_items(body, "groups") else {
        tracing::warn!("Unexpected groups format, defaulting to empty list");
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| serde_json::from_value::<RawGroup>(item.clone()).ok())
        .filter_map(|raw| {
            let id = raw
                .underscore_id
                .as_ref()
                .and_then(scalar_string)
                .or_else(|| raw.id.as_ref().and_then(scalar_string))?;
            let name = raw.name.filter(|n| !n.is_empty())?;
            Some(GroupDescriptor { id, name })
        })
        .collect()
}

/// Pick a server by list index or by exact name/hostname.
///
/// A purely numeric query within range selects by index first, matching the
/// order the server list was returned in.
pub fn resolve_server<'a>(
    servers: &'a [ServerDescriptor],
    query: &str,
) -> Option<&'a ServerDescriptor> {
    if let Ok(index) = query.parse::<usize>() {
        if let Some(server) = servers.get(index) {
            return Some(server);
        }
    }
    servers.iter().find(|s| s.matches(query))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn server(id: &str, name: &str) -> ServerDescriptor {
        ServerDescriptor {
            id: id.to_string(),
            name: name.to_string(),
            ip: "10.0.0.1".to_string(),
            port: 22,
            login_name: "ubuntu".to_string(),
            private_key_path: None,
            hostname: None,
            status: None,
            group: None,
        }
    }

    #[test]
    fn test_decode_wrapped_server_list() {
        let body = json!({
            "servers": [{
                "_id": "64f1",
                "name": "web-01",
                "ip": "10.0.0.5",
                "port": 2222,
                "serverLoginName": "deploy",
                "privateKeyPath": "/keys/web.pem",
                "connectionStatus": "online",
                "group": {"_id": "g1", "name": "Web"}
            }]
        });

        let servers = decode_servers(&body).unwrap();
        assert_eq!(servers.len(), 1);
        let s = &servers[0];
        assert_eq!(s.id, "64f1");
        assert_eq!(s.port, 2222);
        assert_eq!(s.login_name, "deploy");
        assert_eq!(s.private_key_path.as_deref(), Some("/keys/web.pem"));
        assert_eq!(s.display_status(), "online");
        assert_eq!(s.group.as_deref(), Some("g1"));
    }

    #[test]
    fn test_decode_bare_array_normalizes_fields() {
        let body = json!([
            {"id": 7, "name": "db", "ip": "10.0.0.9", "port": "5022"},
            {"id": 8, "name": "cache", "ip": "10.0.0.10", "port": 0},
        ]);

        let servers = decode_servers(&body).unwrap();
        assert_eq!(servers[0].id, "7");
        assert_eq!(servers[0].port, 5022);
        assert_eq!(servers[1].port, DEFAULT_SSH_PORT);
        assert_eq!(servers[1].display_status(), "Available");
    }

    #[test]
    fn test_decode_drops_malformed_entries() {
        let body = json!({"servers": [
            {"name": "no-id", "ip": "1.1.1.1"},
            {"_id": "a", "ip": "1.1.1.1"},
            {"_id": "b", "name": "ok", "hostname": "ok.internal"},
            "garbage",
        ]});

        let servers = decode_servers(&body).unwrap();
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].ip, "ok.internal");
    }

    #[test]
    fn test_decode_rejects_unknown_shape() {
        assert!(matches!(
            decode_servers(&json!({"data": []})),
            Err(NetworkError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_groups_shapes() {
        let bare = decode_groups(&json!([{"_id": "g1", "name": "Web"}]));
        assert_eq!(
            bare,
            vec![GroupDescriptor {
                id: "g1".to_string(),
                name: "Web".to_string()
            }]
        );

        let wrapped = decode_groups(&json!({"groups": [{"id": 3, "name": "DB"}, {"id": 4}]}));
        assert_eq!(wrapped.len(), 1);
        assert_eq!(wrapped[0].id, "3");

        assert!(decode_groups(&json!("nope")).is_empty());
    }

    #[test]
    fn test_production_marker_is_case_insensitive() {
        assert!(server("1", "prod-api").is_production("PROD"));
        assert!(server("1", "Api-Production").is_production("prod"));
        assert!(!server("1", "staging-api").is_production("PROD"));
        assert!(!server("1", "prod-api").is_production(""));
    }

    #[test]
    fn test_resolve_server_by_index_then_name() {
        let mut named = server("3", "bastion");
        named.hostname = Some("bastion.internal".to_string());
        let servers = vec![server("1", "web"), server("2", "0"), named];

        assert_eq!(resolve_server(&servers, "0").unwrap().id, "1");
        assert_eq!(resolve_server(&servers, "web").unwrap().id, "1");
        assert_eq!(resolve_server(&servers, "bastion.internal").unwrap().id, "3");
        assert_eq!(resolve_server(&servers, "2").unwrap().id, "3");
        assert!(resolve_server(&servers, "9").is_none());
        assert!(resolve_server(&servers, "missing").is_none());
    }
}

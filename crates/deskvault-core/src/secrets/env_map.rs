//! Secret key namespaces to backend environment variable names.
//!
//! Rules are tried top to bottom and the first match decides, including the
//! decision to drop a key. The order is part of the contract: `mcp.ext` must
//! be checked before the catch-all.

use std::collections::BTreeMap;

struct Rule {
    name: &'static str,
    matches: fn(&[&str]) -> bool,
    map: fn(&str, &[&str]) -> Option<String>,
}

const RULES: &[Rule] = &[
    Rule {
        name: "provider",
        matches: |parts| parts[0] == "provider" && parts.len() >= 3,
        map: |_, parts| {
            let provider = to_env_part(parts[1]);
            let rest = to_env_part(&parts[2..].join("_"));
            prefixed("PROVIDER", &[provider, rest])
        },
    },
    Rule {
        name: "sftp",
        matches: |parts| parts[0] == "sftp" && parts.len() >= 2,
        map: |_, parts| prefixed("SFTP", &[to_env_part(&parts[1..].join("_"))]),
    },
    Rule {
        name: "mcp_system",
        matches: |parts| parts[0] == "mcp" && parts.get(1) == Some(&"system") && parts.len() >= 3,
        map: |_, parts| prefixed("MCP_SYSTEM", &[to_env_part(&parts[2..].join("_"))]),
    },
    // NOTE: keys shorter than `mcp.ext.<id>.<name>` match here and are dropped
    // rather than falling through to the catch-all.
    Rule {
        name: "mcp_ext",
        matches: |parts| parts[0] == "mcp" && parts.get(1) == Some(&"ext"),
        map: |_, parts| {
            if parts.len() < 4 {
                return None;
            }
            let extension = to_env_part(parts[2]);
            let rest = to_env_part(&parts[3..].join("_"));
            prefixed("MCP_EXT", &[extension, rest])
        },
    },
    Rule {
        name: "server",
        matches: |parts| parts[0] == "server" && parts.len() >= 2,
        map: |_, parts| prefixed("SERVER", &[to_env_part(&parts[1..].join("_"))]),
    },
    Rule {
        name: "app_secret",
        matches: |_| true,
        map: |key, _| prefixed("APP_SECRET", &[to_env_part(key)]),
    },
];

/// Map stored secrets to backend environment variables.
///
/// Input order matters only for collisions: when two keys produce the same
/// name, the later one wins.
pub fn map_secrets_to_server_env<I, K, V>(records: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    let mut mapped = BTreeMap::new();
    for (key, value) in records {
        if let Some(name) = env_name_for(key.as_ref()) {
            mapped.insert(name, value.into());
        }
    }
    mapped
}

/// Environment variable name for a single key, or `None` if the key is dropped.
pub fn env_name_for(key: &str) -> Option<String> {
    let parts: Vec<&str> = key.split('.').collect();
    let rule = RULES.iter().find(|rule| (rule.matches)(&parts))?;
    let name = (rule.map)(key, &parts);
    if name.is_none() {
        tracing::debug!(rule = rule.name, "secret key dropped from server env");
    }
    name
}

/// Uppercase a segment, collapsing every run of non-alphanumerics to `_`.
fn to_env_part(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut pending_sep = false;
    for ch in value.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(ch.to_ascii_uppercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

fn prefixed(prefix: &str, segments: &[String]) -> Option<String> {
    if segments.iter().any(String::is_empty) {
        return None;
    }
    Some(format!("{prefix}_{}", segments.join("_")))
}

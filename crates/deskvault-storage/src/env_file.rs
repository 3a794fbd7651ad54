//! Flat `NAME=value` file used when platform encryption is unavailable.
//!
//! Secret keys are hex-encoded behind a fixed marker so that any key becomes a
//! safe variable name and decodes back exactly. Lines without the marker are
//! ignored on load, so hand-edited files keep working.

use std::collections::BTreeMap;

pub const SECRET_ENV_PREFIX: &str = "AGENT_SECRET_KEY_HEX_";

const HEX: &[u8; 16] = b"0123456789ABCDEF";

/// Uppercase hex of the key's UTF-8 bytes.
pub fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len() * 2);
    for byte in key.bytes() {
        out.push(HEX[usize::from(byte >> 4)] as char);
        out.push(HEX[usize::from(byte & 0x0f)] as char);
    }
    out
}

pub fn decode_key(encoded: &str) -> Option<String> {
    if encoded.is_empty() || encoded.len() % 2 != 0 {
        return None;
    }
    let bytes = encoded
        .as_bytes()
        .chunks(2)
        .map(|pair| Some((hex_val(pair[0])? << 4) | hex_val(pair[1])?))
        .collect::<Option<Vec<u8>>>()?;
    String::from_utf8(bytes).ok()
}

fn hex_val(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        _ => None,
    }
}

/// Render secrets as marker lines sorted by variable name.
pub fn render<'a>(records: impl IntoIterator<Item = (&'a str, &'a str)>) -> String {
    let lines: BTreeMap<String, String> = records
        .into_iter()
        .map(|(key, value)| {
            (
                format!("{SECRET_ENV_PREFIX}{}", encode_key(key)),
                escape_value(value),
            )
        })
        .collect();

    let mut out = String::new();
    for (name, value) in &lines {
        out.push_str(name);
        out.push('=');
        out.push_str(value);
        out.push('\n');
    }
    out
}

/// Parse marker lines back into `key -> value`.
pub fn parse(contents: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for line in contents.lines() {
        let line = line.trim_start();
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((name, value)) = line.split_once('=') else {
            continue;
        };
        let Some(encoded) = name.trim().strip_prefix(SECRET_ENV_PREFIX) else {
            continue;
        };
        let Some(key) = decode_key(encoded) else {
            tracing::debug!("skipping undecodable fallback secret line");
            continue;
        };
        if key.trim().is_empty() {
            continue;
        }
        out.insert(key, unescape_value(value.trim_end_matches('\r')));
    }
    out
}

// Multi-line values (PEM keys) must stay on one line.
fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
    out
}

fn unescape_value(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

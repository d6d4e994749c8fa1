//! Access token payload decoding.
//!
//! The payload is read without verifying the signature. Claims obtained
//! this way are only a hint: the server never confirmed them, so role
//! resolution consults them last.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde_json::{Map, Value};

use super::{Role, UserId};

pub type Claims = Map<String, Value>;

/// Decode the payload segment (between the first and second `.`) of a JWT.
///
/// Returns `None` for anything that is not three segments of base64url JSON.
pub fn decode_payload(token: &str) -> Option<Claims> {
    let mut segments = token.split('.');
    let (_header, payload) = (segments.next()?, segments.next()?);
    segments.next()?;

    let normalized: String = payload
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();

    let bytes = URL_SAFE_NO_PAD.decode(normalized).ok()?;
    match serde_json::from_slice::<Value>(&bytes).ok()? {
        Value::Object(claims) => Some(claims),
        _ => None,
    }
}

/// First role found under `claim_names`, checked in order.
///
/// A claim may hold a single role string or a list of them.
pub fn role_claim(claims: &Claims, claim_names: &[String]) -> Option<Role> {
    claim_names.iter().find_map(|name| {
        let role = match claims.get(name)? {
            Value::String(s) => Role::parse(s),
            Value::Array(items) => items
                .iter()
                .filter_map(Value::as_str)
                .map(Role::parse)
                .find(Role::is_known)?,
            _ => return None,
        };
        role.is_known().then_some(role)
    })
}

pub fn username_claim(claims: &Claims) -> Option<String> {
    ["username", "preferred_username", "name"]
        .iter()
        .find_map(|key| claims.get(*key)?.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn user_id_claim(claims: &Claims) -> Option<UserId> {
    ["user_id", "uid", "sub"]
        .iter()
        .find_map(|key| UserId::from_json(claims.get(*key)?))
}

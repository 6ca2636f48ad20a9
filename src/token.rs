use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

/// The claims the console reads from a bearer token. The signature is not
/// checked here; the server re-validates every request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default, alias = "userId")]
    pub user_id: Option<serde_json::Value>,
    #[serde(default)]
    pub role: Option<String>,
}

pub fn decode_claims(token: &str) -> Option<TokenClaims> {
    let payload = token.trim().split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('=').as_bytes())
        .ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Unreadable claims count as expired. A token without `exp` never expires
/// on the client side.
pub fn is_expired_at(token: &str, now_secs: i64) -> bool {
    match decode_claims(token) {
        Some(claims) => claims.exp.is_some_and(|exp| exp < now_secs),
        None => true,
    }
}

pub fn is_expired(token: &str) -> bool {
    is_expired_at(token, now_secs())
}

pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// Builds an unsigned token carrying the given claims. Used by the in-memory
/// backend; real tokens come from the server.
pub fn encode_unsigned(user_id: &str, role: &str, exp: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let claims = serde_json::json!({ "userId": user_id, "role": role, "exp": exp });
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string().as_bytes());
    format!("{header}.{payload}.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_exp_and_user_id() {
        let token = encode_unsigned("12", "COACH", 2_000_000_000);
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.exp, Some(2_000_000_000));
        assert_eq!(claims.role.as_deref(), Some("COACH"));
        assert_eq!(claims.user_id, Some(serde_json::json!("12")));
    }

    #[test]
    fn expiry_compares_against_now() {
        let token = encode_unsigned("1", "ADMIN", 1_000);
        assert!(is_expired_at(&token, 1_001));
        assert!(!is_expired_at(&token, 1_000));
        assert!(!is_expired_at(&token, 999));
    }

    #[test]
    fn garbage_tokens_count_as_expired() {
        assert!(is_expired_at("not-a-token", 0));
        assert!(is_expired_at("a.!!!.c", 0));
    }

    #[test]
    fn token_without_exp_is_not_expired() {
        let no_exp = format!("x.{}.y", URL_SAFE_NO_PAD.encode(br#"{"userId":1}"#));
        assert!(!is_expired_at(&no_exp, i64::MAX));
    }

    #[test]
    fn tolerates_padded_payload_segment() {
        let payload = base64::engine::general_purpose::URL_SAFE.encode(br#"{"exp":5}"#);
        let token = format!("h.{payload}.s");
        assert_eq!(decode_claims(&token).and_then(|c| c.exp), Some(5));
    }
}

//! Unverified JWT claim decoding.
//!
//! Only the payload segment is read. Signatures are never checked on the
//! client; the backend remains the authority on token validity.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// base64url with optional padding, as issued by different backends.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Claims decoded from a token payload.
///
/// `exp` drives all expiry logic; the remaining fields are read-only
/// projections for callers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject, usually the user ID. Numeric subjects are stringified.
    #[serde(default, deserialize_with = "lenient_string")]
    pub sub: Option<String>,
    /// Email address of the subject, if the backend includes it.
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: Option<String>,
    /// Role of the subject, if the backend includes it.
    #[serde(default, deserialize_with = "lenient_string")]
    pub role: Option<String>,
    /// Issued-at timestamp (seconds since epoch).
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub iat: Option<i64>,
    /// Expiration timestamp (seconds since epoch). `None` when missing or
    /// unparseable, which callers treat as expired.
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub exp: Option<i64>,
    /// Any other claims.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenClaims {
    /// Returns the expiration as a `DateTime<Utc>`.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }

    /// Whether the token is expired at `now` (seconds since epoch).
    pub fn is_expired_at(&self, now: i64) -> bool {
        match self.exp {
            Some(exp) => exp <= now,
            None => true,
        }
    }

    /// Seconds until expiry at `now`; negative once expired.
    ///
    /// `None` when there is no `exp` or the distance does not fit in an `i64`.
    pub fn seconds_remaining_at(&self, now: i64) -> Option<i64> {
        self.exp.and_then(|exp| exp.checked_sub(now))
    }
}

/// Decodes the payload of a `header.payload.signature` token.
///
/// Returns `None` for anything that is not three dot-separated segments
/// with a base64url JSON object in the middle.
pub fn decode_claims(token: &str) -> Option<TokenClaims> {
    let mut segments = token.split('.');
    let (_header, payload, _signature) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() || payload.is_empty() {
        return None;
    }

    let bytes = PAYLOAD_ENGINE.decode(payload).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f.floor() as i64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

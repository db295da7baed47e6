//! Entity tags and HTTP conditional requests.
//!
//! Tags are computed fresh from the serialized representation on every call;
//! nothing is stored. Reads use `If-None-Match` to skip re-sending an
//! unchanged body, writes use `If-Match` to refuse updates based on a stale
//! copy (optimistic concurrency).
//!
//! Malformed or missing client tags never produce an error: they only mean
//! "no precondition requested".

use crate::error::{PawpalError, PawpalResult};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Header carrying the read precondition.
pub const IF_NONE_MATCH: &str = "if-none-match";
/// Header carrying the write precondition.
pub const IF_MATCH: &str = "if-match";

/// Strong entity tag for `content`: a quoted SHA-256 hex digest.
pub fn fingerprint(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    format!("\"{}\"", hex::encode(digest))
}

/// Entity tag for a serializable resource.
///
/// The value goes through `serde_json::Value` first, whose object maps keep
/// keys sorted, so field order in the Rust type does not affect the tag.
pub fn fingerprint_json<T: Serialize + ?Sized>(resource: &T) -> PawpalResult<String> {
    let canonical = serde_json::to_value(resource)?;
    Ok(fingerprint(&serde_json::to_string(&canonical)?))
}

/// Strip an optional `W/` prefix and every double quote.
fn normalize(tag: &str) -> String {
    let tag = tag.trim();
    tag.strip_prefix("W/").unwrap_or(tag).replace('"', "")
}

/// Whether a client tag refers to the current representation.
///
/// Weak and strong forms compare equal. Absent or empty tags never match.
pub fn matches(client_tag: Option<&str>, current_tag: Option<&str>) -> bool {
    match (supplied(client_tag), supplied(current_tag)) {
        (Some(client), Some(current)) => normalize(client) == normalize(current),
        _ => false,
    }
}

/// Treat empty header values like missing ones.
fn supplied(tag: Option<&str>) -> Option<&str> {
    tag.filter(|t| !t.trim().is_empty())
}

/// Decision for a conditional read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadPrecondition {
    /// Client copy is current; answer 304 without a body
    NotModified,
    /// Send the representation
    Proceed,
}

impl ReadPrecondition {
    pub fn short_circuit(self) -> bool {
        self == ReadPrecondition::NotModified
    }
}

/// Decision for a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePrecondition {
    /// No tag supplied, or the tag is current
    Proceed,
    /// Client based its update on a stale copy; answer 412
    PreconditionFailed,
}

impl WritePrecondition {
    pub fn proceed(self) -> bool {
        self == WritePrecondition::Proceed
    }
}

/// Evaluate `If-None-Match` against the current tag.
pub fn evaluate_read_precondition(
    client_tag: Option<&str>,
    current_tag: &str,
) -> ReadPrecondition {
    if matches(client_tag, Some(current_tag)) {
        ReadPrecondition::NotModified
    } else {
        ReadPrecondition::Proceed
    }
}

/// Evaluate `If-Match` against the current tag.
pub fn evaluate_write_precondition(
    client_tag: Option<&str>,
    current_tag: &str,
) -> WritePrecondition {
    match supplied(client_tag) {
        None => WritePrecondition::Proceed,
        Some(tag) if matches(Some(tag), Some(current_tag)) => WritePrecondition::Proceed,
        Some(_) => WritePrecondition::PreconditionFailed,
    }
}

/// Preconditions captured from an incoming request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preconditions {
    /// `If-Match` value, if any
    pub if_match: Option<String>,
    /// `If-None-Match` value, if any
    pub if_none_match: Option<String>,
}

impl Preconditions {
    /// Pick the conditional headers out of `(name, value)` pairs.
    ///
    /// Header names compare case-insensitively; the last occurrence wins.
    pub fn from_headers<'a, I>(headers: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut preconditions = Self::default();
        for (name, value) in headers {
            if name.eq_ignore_ascii_case(IF_MATCH) {
                preconditions.if_match = Some(value.to_string());
            } else if name.eq_ignore_ascii_case(IF_NONE_MATCH) {
                preconditions.if_none_match = Some(value.to_string());
            }
        }
        preconditions
    }

    pub fn read(&self, current_tag: &str) -> ReadPrecondition {
        evaluate_read_precondition(self.if_none_match.as_deref(), current_tag)
    }

    pub fn write(&self, current_tag: &str) -> WritePrecondition {
        evaluate_write_precondition(self.if_match.as_deref(), current_tag)
    }

    /// Guard a mutation: `Err(PreconditionFailed)` when `If-Match` is stale.
    pub fn ensure_write(&self, current_tag: &str) -> PawpalResult<()> {
        match self.write(current_tag) {
            WritePrecondition::Proceed => Ok(()),
            WritePrecondition::PreconditionFailed => {
                tracing::debug!(
                    "Rejecting write: If-Match {:?} does not match {}",
                    self.if_match,
                    current_tag
                );
                Err(PawpalError::PreconditionFailed {
                    expected: self.if_match.clone().unwrap_or_default(),
                    current: current_tag.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fingerprint_is_deterministic_and_quoted() {
        let a = fingerprint(r#"{"id":1,"name":"Rex"}"#);
        assert_eq!(a, fingerprint(r#"{"id":1,"name":"Rex"}"#));
        assert!(a.starts_with('"') && a.ends_with('"'));
        assert_eq!(a.len(), 64 + 2);
        assert_ne!(a, fingerprint(r#"{"id":1,"name":"Max"}"#));
    }

    #[test]
    fn test_fingerprint_is_order_sensitive_on_raw_strings() {
        assert_ne!(
            fingerprint(r#"{"a":1,"b":2}"#),
            fingerprint(r#"{"b":2,"a":1}"#)
        );
    }

    #[test]
    fn test_fingerprint_json_ignores_field_order() {
        #[derive(Serialize)]
        struct Dog {
            name: &'static str,
            breed: &'static str,
        }

        #[derive(Serialize)]
        struct DogReordered {
            breed: &'static str,
            name: &'static str,
        }

        let a = fingerprint_json(&Dog {
            name: "Rex",
            breed: "Collie",
        })
        .unwrap();
        let b = fingerprint_json(&DogReordered {
            breed: "Collie",
            name: "Rex",
        })
        .unwrap();
        assert_eq!(a, b);
        let untyped = fingerprint_json(&json!({"name": "Rex", "breed": "Collie"})).unwrap();
        assert_eq!(a, untyped);
    }

    #[test]
    fn test_matches() {
        assert!(matches(Some("\"abc\""), Some("\"abc\"")));
        assert!(matches(Some("W/\"abc\""), Some("\"abc\"")));
        assert!(matches(Some("abc"), Some("\"abc\"")));
        assert!(!matches(Some("\"abd\""), Some("\"abc\"")));
        assert!(!matches(None, Some("\"abc\"")));
        assert!(!matches(Some("\"abc\""), None));
        assert!(!matches(Some(""), Some("\"abc\"")));
        assert!(!matches(None, None));
    }

    #[test]
    fn test_matches_ignores_inner_quotes() {
        assert!(matches(Some("\"ab\"c\""), Some("\"abc\"")));
        assert!(matches(Some("W/\"a\"\"bc\""), Some("abc")));
        assert!(!matches(Some("\"\""), Some("\"abc\"")));
    }

    #[test]
    fn test_read_precondition() {
        let read = evaluate_read_precondition(Some("\"abc\""), "\"abc\"");
        assert_eq!(read, ReadPrecondition::NotModified);
        assert!(read.short_circuit());

        let read = evaluate_read_precondition(None, "\"abc\"");
        assert_eq!(read, ReadPrecondition::Proceed);
        assert!(!read.short_circuit());

        assert_eq!(
            evaluate_read_precondition(Some("\"old\""), "\"abc\""),
            ReadPrecondition::Proceed
        );
    }

    #[test]
    fn test_write_precondition() {
        let write = evaluate_write_precondition(Some("\"stale\""), "\"current\"");
        assert_eq!(write, WritePrecondition::PreconditionFailed);
        assert!(!write.proceed());

        assert!(evaluate_write_precondition(None, "\"current\"").proceed());
        assert!(evaluate_write_precondition(Some(""), "\"current\"").proceed());
        assert!(evaluate_write_precondition(Some("W/\"current\""), "\"current\"").proceed());
    }

    #[test]
    fn test_preconditions_from_headers() {
        let preconditions = Preconditions::from_headers([
            ("Content-Type", "application/json"),
            ("If-Match", "\"v1\""),
            ("IF-NONE-MATCH", "W/\"v0\""),
        ]);
        assert_eq!(preconditions.if_match.as_deref(), Some("\"v1\""));
        assert_eq!(preconditions.if_none_match.as_deref(), Some("W/\"v0\""));

        assert!(preconditions.read("\"v0\"").short_circuit());
        assert!(preconditions.write("\"v1\"").proceed());
        assert!(preconditions.ensure_write("\"v1\"").is_ok());
    }

    #[test]
    fn test_ensure_write_rejects_stale_tag() {
        let current = fingerprint_json(&json!({"id": 7, "name": "Luna"})).unwrap();
        let stale = fingerprint_json(&json!({"id": 7, "name": "Lunaa"})).unwrap();

        let preconditions = Preconditions {
            if_match: Some(stale.clone()),
            if_none_match: None,
        };
        let err = preconditions.ensure_write(&current).unwrap_err();
        assert_eq!(err.status_code(), 412);
        assert!(matches!(
            err,
            PawpalError::PreconditionFailed { expected, .. } if expected == stale
        ));

        assert!(Preconditions::default().ensure_write(&current).is_ok());
    }
}

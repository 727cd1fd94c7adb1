use crate::codec::{self, BValue};
use crate::error::EnvelopeError;

/// A validated `{t, y, ...}` message envelope. Downstream
/// handlers consume this typed value, never the raw [`BValue`].
#[derive(Clone, Debug)]
pub struct Envelope {
    pub t: Vec<u8>,
    pub kind: EnvelopeKind,
}

#[derive(Clone, Debug)]
pub enum EnvelopeKind {
    /// `q`/`a` are carried unvalidated: per §4.1 envelope validation stops
    /// at the top-level dict and `t`/`y`, while a missing or malformed `q`
    /// or `a` is a *request-argument* error (§4.5/§7) that must reply 203
    /// echoing `t` — something only the request handler can do, since only
    /// it still has `t` in hand at that point.
    Query { q: Option<Vec<u8>>, a: Option<BValue> },
    Response { r: BValue },
    Error { e: BValue },
}

/// Decodes a raw datagram and validates the envelope shape. On failure the
/// caller MUST silently drop the packet — the sender's `t` is untrusted, so
/// no reply can be addressed back to it.
pub fn parse_message(raw: &[u8]) -> Result<Envelope, EnvelopeError> {
    let value = codec::decode(raw)?;
    let dict = value.as_dict().ok_or(EnvelopeError::NotADict)?;

    let t = dict
        .get(b"t".as_slice())
        .ok_or(EnvelopeError::MissingKey("t"))?
        .as_bytes()
        .ok_or(EnvelopeError::BadKeyType {
            key: "t",
            expected: "byte-string",
        })?
        .to_vec();

    let y = dict
        .get(b"y".as_slice())
        .ok_or(EnvelopeError::MissingKey("y"))?
        .as_bytes()
        .ok_or(EnvelopeError::BadKeyType {
            key: "y",
            expected: "byte-string",
        })?;

    let kind = match y {
        b"q" => {
            // Not `require_bytes`/`require_dict`: a missing or
            // wrongly-typed `q`/`a` here must not fail the whole parse
            // (that would make the packet indistinguishable from a
            // `MalformedEnvelope` and drop it silently) — it must reach
            // the request handler so it can reply 203 echoing `t`.
            let q = value.get("q").and_then(|v| v.as_bytes()).map(|b| b.to_vec());
            let a = value.get("a").cloned();
            EnvelopeKind::Query { q, a }
        }
        b"r" => {
            let r = require_dict(&value, "r")?.clone();
            EnvelopeKind::Response { r: BValue::Dict(r) }
        }
        b"e" => {
            let e = require_list(&value, "e")?.to_vec();
            EnvelopeKind::Error { e: BValue::List(e) }
        }
        _ => return Err(EnvelopeError::UnknownKind),
    };

    Ok(Envelope { t, kind })
}

/// Typed field accessor, specialized per expected kind. Used by both the
/// envelope parser and the request/response handlers —
/// handlers distinguish request-time failures (reply 203) from
/// response/error-time failures (silent drop) at their own call sites.
pub fn require_bytes<'a>(value: &'a BValue, key: &'static str) -> Result<&'a [u8], EnvelopeError> {
    value
        .get(key)
        .ok_or(EnvelopeError::MissingKey(key))?
        .as_bytes()
        .ok_or(EnvelopeError::BadKeyType {
            key,
            expected: "byte-string",
        })
}

pub fn require_int(value: &BValue, key: &'static str) -> Result<i64, EnvelopeError> {
    value
        .get(key)
        .ok_or(EnvelopeError::MissingKey(key))?
        .as_int()
        .ok_or(EnvelopeError::BadKeyType {
            key,
            expected: "int",
        })
}

pub fn require_dict<'a>(
    value: &'a BValue,
    key: &'static str,
) -> Result<&'a std::collections::BTreeMap<Vec<u8>, BValue>, EnvelopeError> {
    value
        .get(key)
        .ok_or(EnvelopeError::MissingKey(key))?
        .as_dict()
        .ok_or(EnvelopeError::BadKeyType {
            key,
            expected: "map",
        })
}

pub fn require_list<'a>(value: &'a BValue, key: &'static str) -> Result<&'a [BValue], EnvelopeError> {
    value
        .get(key)
        .ok_or(EnvelopeError::MissingKey(key))?
        .as_list()
        .ok_or(EnvelopeError::BadKeyType {
            key,
            expected: "list",
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;

    #[test]
    fn parses_a_query_envelope() {
        let raw = codec::encode(&codec::dict([
            ("t", BValue::Bytes(b"aa".to_vec())),
            ("y", BValue::Bytes(b"q".to_vec())),
            ("q", BValue::Bytes(b"ping".to_vec())),
            (
                "a",
                codec::dict([("id", BValue::Bytes(vec![1; 20]))]),
            ),
        ]))
        .unwrap();

        let envelope = parse_message(&raw).unwrap();
        assert_eq!(envelope.t, b"aa");
        match envelope.kind {
            EnvelopeKind::Query { q, .. } => assert_eq!(q, Some(b"ping".to_vec())),
            _ => panic!("expected a query"),
        }
    }

    #[test]
    fn query_with_missing_q_and_a_still_parses_so_the_request_handler_can_reply_203() {
        let raw = codec::encode(&codec::dict([
            ("t", BValue::Bytes(b"aa".to_vec())),
            ("y", BValue::Bytes(b"q".to_vec())),
        ]))
        .unwrap();

        let envelope = parse_message(&raw).unwrap();
        assert_eq!(envelope.t, b"aa");
        match envelope.kind {
            EnvelopeKind::Query { q, a } => {
                assert_eq!(q, None);
                assert_eq!(a, None);
            }
            _ => panic!("expected a query"),
        }
    }

    #[test]
    fn rejects_missing_t() {
        let raw = codec::encode(&codec::dict([("y", BValue::Bytes(b"q".to_vec()))])).unwrap();
        assert!(matches!(
            parse_message(&raw),
            Err(EnvelopeError::MissingKey("t"))
        ));
    }

    #[test]
    fn rejects_non_dict_top_level() {
        let raw = codec::encode(&BValue::List(vec![])).unwrap();
        assert!(matches!(parse_message(&raw), Err(EnvelopeError::NotADict)));
    }

    #[test]
    fn rejects_unknown_y() {
        let raw = codec::encode(&codec::dict([
            ("t", BValue::Bytes(b"aa".to_vec())),
            ("y", BValue::Bytes(b"z".to_vec())),
        ]))
        .unwrap();
        assert!(matches!(
            parse_message(&raw),
            Err(EnvelopeError::UnknownKind)
        ));
    }
}

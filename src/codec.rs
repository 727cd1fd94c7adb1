//! Thin contract over bencode encode/decode. The engine treats the
//! wire format as a dynamic tagged value and enforces the protocol schema
//! itself, at the envelope parser boundary — downstream handlers never see
//! a raw [`BValue`].

use std::collections::BTreeMap;

use serde_bencode::value::Value as RawValue;

use crate::error::EnvelopeError;

/// The bencode data model: a sum of int, byte-string, list, and
/// dict-with-byte-string-keys.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BValue {
    Int(i64),
    Bytes(Vec<u8>),
    List(Vec<BValue>),
    Dict(BTreeMap<Vec<u8>, BValue>),
}

impl BValue {
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            BValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            BValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[BValue]> {
        match self {
            BValue::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&BTreeMap<Vec<u8>, BValue>> {
        match self {
            BValue::Dict(d) => Some(d),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&BValue> {
        self.as_dict()?.get(key.as_bytes())
    }
}

impl From<RawValue> for BValue {
    fn from(value: RawValue) -> Self {
        match value {
            RawValue::Int(i) => BValue::Int(i),
            RawValue::Bytes(b) => BValue::Bytes(b),
            RawValue::List(l) => BValue::List(l.into_iter().map(BValue::from).collect()),
            RawValue::Dict(d) => {
                BValue::Dict(d.into_iter().map(|(k, v)| (k, BValue::from(v))).collect())
            }
        }
    }
}

impl From<BValue> for RawValue {
    fn from(value: BValue) -> Self {
        match value {
            BValue::Int(i) => RawValue::Int(i),
            BValue::Bytes(b) => RawValue::Bytes(b),
            BValue::List(l) => RawValue::List(l.into_iter().map(RawValue::from).collect()),
            BValue::Dict(d) => {
                RawValue::Dict(d.into_iter().map(|(k, v)| (k, RawValue::from(v))).collect())
            }
        }
    }
}

/// Decodes a raw datagram into the dynamic tagged value model.
pub fn decode(raw: &[u8]) -> Result<BValue, EnvelopeError> {
    serde_bencode::from_bytes::<RawValue>(raw)
        .map(BValue::from)
        .map_err(|e| EnvelopeError::Decode(e.to_string()))
}

/// Encodes a dynamic tagged value back into bencode bytes.
pub fn encode(value: &BValue) -> Result<Vec<u8>, EnvelopeError> {
    let raw: RawValue = value.clone().into();
    serde_bencode::to_bytes(&raw).map_err(|e| EnvelopeError::Decode(e.to_string()))
}

/// Builds a `BValue::Dict` from owned key/value pairs; used throughout the
/// handlers to assemble reply bodies without repeating `BTreeMap::from`.
pub fn dict(pairs: impl IntoIterator<Item = (&'static str, BValue)>) -> BValue {
    BValue::Dict(
        pairs
            .into_iter()
            .map(|(k, v)| (k.as_bytes().to_vec(), v))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_dict() {
        let value = dict([
            ("t", BValue::Bytes(b"aa".to_vec())),
            ("y", BValue::Bytes(b"q".to_vec())),
        ]);
        let encoded = encode(&value).unwrap();
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode(b"not bencode").is_err());
    }
}

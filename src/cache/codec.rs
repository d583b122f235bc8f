//! Tagged byte encoding for fetch outcomes
//!
//! Every stored entry starts with a one-byte tag:
//!
//! | tag | body                               |
//! |-----|------------------------------------|
//! | `O` | JSON text of a structured payload  |
//! | `S` | UTF-8 text                         |
//! | `B` | raw bytes                          |
//! | `E` | `404` or `403`                     |
//!
//! Opaque failures have no encoding and are never written to the store.

use crate::error::{CacheError, Result};
use crate::fetch::{FetchError, FetchOutcome, Fetched, Payload};
use bytes::{BufMut, Bytes, BytesMut};

const TAG_OBJECT: u8 = b'O';
const TAG_STRING: u8 = b'S';
const TAG_BINARY: u8 = b'B';
const TAG_ERROR: u8 = b'E';

/// Encode an outcome for storage, or `None` when it must not be cached
///
/// Headers are not part of the encoding.
pub fn encode(outcome: &FetchOutcome) -> Option<Bytes> {
    match outcome {
        Err(FetchError::NotFound { .. }) => Some(Bytes::from_static(b"E404")),
        Err(FetchError::Forbidden { .. }) => Some(Bytes::from_static(b"E403")),
        Err(_) => None,
        Ok(fetched) => Some(encode_payload(&fetched.payload)),
    }
}

fn encode_payload(payload: &Payload) -> Bytes {
    match payload {
        Payload::Json(value) => {
            // Value's Display writes compact JSON and cannot fail
            let text = value.to_string();
            tagged(TAG_OBJECT, text.as_bytes())
        }
        Payload::Text(text) => tagged(TAG_STRING, text.as_bytes()),
        Payload::Binary(raw) => tagged(TAG_BINARY, raw),
    }
}

fn tagged(tag: u8, body: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(body.len() + 1);
    buf.put_u8(tag);
    buf.put_slice(body);
    buf.freeze()
}

/// Decode a stored entry back into an outcome
///
/// Negative outcomes come back with `cached: true`.
pub fn decode(entry: &[u8]) -> Result<FetchOutcome> {
    let (&tag, body) = entry
        .split_first()
        .ok_or_else(|| CacheError::InvalidEncoding("empty entry".to_string()))?;

    match tag {
        TAG_OBJECT => {
            let value: serde_json::Value = serde_json::from_slice(body)?;
            Ok(Ok(Fetched::new(Payload::Json(value))))
        }
        TAG_STRING => {
            let text = std::str::from_utf8(body).map_err(|e| {
                CacheError::InvalidEncoding(format!("string entry is not UTF-8: {}", e))
            })?;
            Ok(Ok(Fetched::new(Payload::Text(text.to_string()))))
        }
        TAG_BINARY => Ok(Ok(Fetched::new(Payload::Binary(Bytes::copy_from_slice(body))))),
        TAG_ERROR => match body {
            b"404" => Ok(Err(FetchError::NotFound { cached: true })),
            b"403" => Ok(Err(FetchError::Forbidden { cached: true })),
            other => Err(CacheError::InvalidEncoding(format!(
                "unsupported error status '{}'",
                String::from_utf8_lossy(other)
            ))),
        },
        other => Err(CacheError::InvalidEncoding(format!(
            "unknown tag byte 0x{:02x}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn roundtrip(outcome: FetchOutcome) -> FetchOutcome {
        let encoded = encode(&outcome).expect("representable outcome");
        decode(&encoded).expect("valid entry")
    }

    #[test]
    fn test_encode_tags() {
        assert_eq!(
            encode(&Ok(Fetched::new("hello"))).unwrap(),
            Bytes::from_static(b"Shello")
        );
        assert_eq!(
            encode(&Ok(Fetched::new(vec![0u8, 255]))).unwrap(),
            Bytes::from_static(&[b'B', 0, 255])
        );
        assert_eq!(
            encode(&Ok(Fetched::new(serde_json::json!({"tiles": ["a"]})))).unwrap(),
            Bytes::from_static(br#"O{"tiles":["a"]}"#)
        );
        assert_eq!(
            encode(&Err(FetchError::not_found())).unwrap(),
            Bytes::from_static(b"E404")
        );
        assert_eq!(
            encode(&Err(FetchError::forbidden())).unwrap(),
            Bytes::from_static(b"E403")
        );
    }

    #[test]
    fn test_empty_payload_is_binary() {
        let encoded = encode(&Ok(Fetched::new(Payload::empty()))).unwrap();
        assert_eq!(encoded, Bytes::from_static(b"B"));
        assert_eq!(roundtrip(Ok(Fetched::new(Payload::empty()))).unwrap().payload, Payload::empty());
    }

    #[test]
    fn test_json_floats_are_exact() {
        for f in [1.0715660391465826e-75, 0.1, 2.2250738585072014e-308, 1.7976931348623157e308] {
            let value = serde_json::json!({"f": f, "list": [f, -f]});
            let decoded = roundtrip(Ok(Fetched::new(value.clone()))).unwrap();
            assert_eq!(decoded.payload, Payload::Json(value));
        }
    }

    #[test]
    fn test_opaque_errors_are_not_encoded() {
        assert!(encode(&Err(FetchError::Other(anyhow::anyhow!("timeout")))).is_none());
        assert!(encode(&Err(FetchError::InvalidUrl("::".to_string()))).is_none());
    }

    #[test]
    fn test_decode_negative_outcomes_are_marked_cached() {
        let not_found = decode(b"E404").unwrap().unwrap_err();
        assert!(matches!(not_found, FetchError::NotFound { cached: true }));

        let forbidden = decode(b"E403").unwrap().unwrap_err();
        assert!(matches!(forbidden, FetchError::Forbidden { cached: true }));
    }

    #[test]
    fn test_decode_rejects_bad_entries() {
        assert!(matches!(decode(b""), Err(CacheError::InvalidEncoding(_))));
        assert!(matches!(decode(b"Xabc"), Err(CacheError::InvalidEncoding(_))));
        assert!(matches!(decode(b"E500"), Err(CacheError::InvalidEncoding(_))));
        assert!(matches!(decode(b"E40"), Err(CacheError::InvalidEncoding(_))));
        assert!(matches!(decode(b"E"), Err(CacheError::InvalidEncoding(_))));
        assert!(matches!(decode(&[b'S', 0xff, 0xfe]), Err(CacheError::InvalidEncoding(_))));
        assert!(matches!(decode(b"O{not json"), Err(CacheError::Json(_))));
    }

    #[test]
    fn test_headers_are_not_persisted() {
        let mut headers = crate::fetch::Headers::new();
        headers.insert("content-type".to_string(), "text/plain".to_string());
        let decoded = roundtrip(Ok(Fetched::new("x").with_headers(headers))).unwrap();
        assert_eq!(decoded, Fetched::new("x"));
    }

    fn json_value() -> impl Strategy<Value = serde_json::Value> {
        let leaf = prop_oneof![
            Just(serde_json::Value::Null),
            any::<bool>().prop_map(serde_json::Value::from),
            any::<i64>().prop_map(serde_json::Value::from),
            any::<f64>()
                .prop_filter("JSON has no NaN or infinity", |f| f.is_finite())
                .prop_map(serde_json::Value::from),
            ".*".prop_map(serde_json::Value::from),
        ];
        leaf.prop_recursive(3, 16, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(serde_json::Value::from),
                prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                    .prop_map(|m| serde_json::Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_text_roundtrip(text in ".*") {
            let decoded = roundtrip(Ok(Fetched::new(text.clone()))).unwrap();
            prop_assert_eq!(decoded.payload, Payload::Text(text));
        }

        #[test]
        fn prop_binary_roundtrip(raw in prop::collection::vec(any::<u8>(), 0..256)) {
            let decoded = roundtrip(Ok(Fetched::new(raw.clone()))).unwrap();
            prop_assert_eq!(decoded.payload, Payload::Binary(Bytes::from(raw)));
        }

        #[test]
        fn prop_json_roundtrip(value in json_value()) {
            let decoded = roundtrip(Ok(Fetched::new(value.clone()))).unwrap();
            prop_assert_eq!(decoded.payload, Payload::Json(value));
        }

        #[test]
        fn prop_status_roundtrip(not_found in any::<bool>()) {
            let outcome = if not_found { FetchError::not_found() } else { FetchError::forbidden() };
            let status = outcome.status_code();
            let decoded = roundtrip(Err(outcome)).unwrap_err();
            prop_assert_eq!(decoded.status_code(), status);
            prop_assert!(decoded.is_cached());
        }
    }
}

//! Encoding of the auxiliary payload column.
//!
//! Two interchangeable formats exist. Which one a stored row uses is not
//! recorded, so readers decode with the currently configured format. A row
//! written under the other format decodes to an empty payload; this is a known
//! limitation of switching the format on a live store.

use thiserror::Error;

use crate::EventPayload;

mod native;

/// Storage format of the auxiliary payload column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayloadFormat {
    /// Portable JSON text.
    Json,
    /// Compact binary serde encoding, stored as lowercase hex.
    Native,
}

impl PayloadFormat {
    /// Maps the `jsonformat` setting onto a format.
    #[must_use]
    pub fn from_json_flag(use_json: bool) -> Self {
        if use_json { Self::Json } else { Self::Native }
    }
}

/// Reasons a stored payload cannot be decoded.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The column is not valid JSON.
    #[error("malformed json payload: {0}")]
    Json(#[from] serde_json::Error),

    /// The column is not a hex string.
    #[error("malformed native payload encoding: {0}")]
    Hex(#[from] hex::FromHexError),

    /// The decoded bytes are not a native payload.
    #[error("malformed native payload: {0}")]
    Native(#[from] postcard::Error),

    /// The native payload nests lists or maps too deeply to read safely.
    #[error("payload nested deeper than {} levels", native::MAX_NESTING_DEPTH)]
    TooDeep,

    /// The column decoded to something other than a mapping.
    #[error("payload is not a mapping")]
    NotAMapping,
}

/// Encodes a payload for storage.
pub fn encode(payload: &EventPayload, format: PayloadFormat) -> Result<String, CodecError> {
    match format {
        PayloadFormat::Json => Ok(serde_json::to_string(&payload.to_json_value())?),
        PayloadFormat::Native => Ok(hex::encode(postcard::to_allocvec(payload)?)),
    }
}

/// Decodes a stored payload, reporting why it could not be read.
pub fn try_decode(stored: &str, format: PayloadFormat) -> Result<EventPayload, CodecError> {
    match format {
        PayloadFormat::Json => {
            let value = serde_json::from_str(stored)?;
            EventPayload::from_json_value(value).ok_or(CodecError::NotAMapping)
        }
        PayloadFormat::Native => {
            let bytes = hex::decode(stored.trim())?;
            native::from_bytes(&bytes)
        }
    }
}

/// Decodes a stored payload, substituting an empty payload when the value is
/// malformed or was written in another format.
#[must_use]
pub fn decode(stored: &str, format: PayloadFormat) -> EventPayload {
    try_decode(stored, format).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use proptest::prelude::*;

    use super::{CodecError, PayloadFormat, decode, encode, try_decode};
    use crate::{EventPayload, PayloadValue};

    fn sample_payload() -> EventPayload {
        let mut nested = BTreeMap::new();
        nested.insert("grade".to_owned(), PayloadValue::Float(87.5));
        nested.insert(
            "items".to_owned(),
            PayloadValue::List(vec![PayloadValue::Integer(1), PayloadValue::Null]),
        );

        EventPayload::new()
            .with("courseid", PayloadValue::Integer(12))
            .with("name", PayloadValue::Text("Quiz <1> & \"2\"".to_owned()))
            .with("visible", PayloadValue::Bool(false))
            .with("detail", PayloadValue::Map(nested))
    }

    #[test]
    fn json_round_trip_preserves_payload() {
        let payload = sample_payload();
        let encoded = encode(&payload, PayloadFormat::Json);
        assert!(encoded.is_ok());
        let encoded = encoded.unwrap_or_default();
        assert_eq!(decode(&encoded, PayloadFormat::Json), payload);
    }

    #[test]
    fn native_round_trip_preserves_payload() {
        let payload = sample_payload();
        let encoded = encode(&payload, PayloadFormat::Native).unwrap_or_default();
        assert!(encoded.chars().all(|character| character.is_ascii_hexdigit()));
        assert_eq!(decode(&encoded, PayloadFormat::Native), payload);
    }

    #[test]
    fn json_row_read_as_native_decodes_empty() {
        let encoded = encode(&sample_payload(), PayloadFormat::Json).unwrap_or_default();
        assert!(try_decode(&encoded, PayloadFormat::Native).is_err());
        assert!(decode(&encoded, PayloadFormat::Native).is_empty());
    }

    #[test]
    fn json_scalar_is_rejected() {
        assert!(try_decode("false", PayloadFormat::Json).is_err());
        assert!(decode("null", PayloadFormat::Json).is_empty());
    }

    #[test]
    fn deeply_nested_native_payload_decodes_empty() {
        // {"a": [[[...[null]...]]]} with 20 000 nested lists.
        let mut bytes = vec![1, 1, b'a'];
        for _ in 0..20_000 {
            bytes.extend_from_slice(&[5, 1]);
        }
        bytes.push(0);
        let stored = hex::encode(bytes);

        assert!(matches!(
            try_decode(&stored, PayloadFormat::Native),
            Err(CodecError::TooDeep)
        ));
        assert!(decode(&stored, PayloadFormat::Native).is_empty());
    }

    #[test]
    fn moderately_nested_native_payload_round_trips() {
        let mut value = PayloadValue::Text("leaf".to_owned());
        for level in 0..100 {
            value = if level % 2 == 0 {
                PayloadValue::List(vec![value])
            } else {
                PayloadValue::Map(BTreeMap::from([("inner".to_owned(), value)]))
            };
        }
        let payload = EventPayload::new().with("deep", value);

        let encoded = encode(&payload, PayloadFormat::Native).unwrap_or_default();
        assert_eq!(decode(&encoded, PayloadFormat::Native), payload);
    }

    #[test]
    fn format_follows_json_flag() {
        assert_eq!(PayloadFormat::from_json_flag(true), PayloadFormat::Json);
        assert_eq!(PayloadFormat::from_json_flag(false), PayloadFormat::Native);
    }

    fn payload_value() -> impl Strategy<Value = PayloadValue> {
        let leaf = prop_oneof![
            Just(PayloadValue::Null),
            any::<bool>().prop_map(PayloadValue::Bool),
            any::<i64>().prop_map(PayloadValue::Integer),
            (-1.0e9f64..1.0e9f64).prop_map(PayloadValue::Float),
            ".{0,12}".prop_map(PayloadValue::Text),
        ];
        leaf.prop_recursive(4, 32, 6, |inner| {
            prop_oneof![
                proptest::collection::vec(inner.clone(), 0..6).prop_map(PayloadValue::List),
                proptest::collection::btree_map("[a-z_]{1,8}", inner, 0..6)
                    .prop_map(PayloadValue::Map),
            ]
        })
    }

    fn payload() -> impl Strategy<Value = EventPayload> {
        proptest::collection::btree_map("[a-z_]{1,8}", payload_value(), 0..6)
            .prop_map(EventPayload::from)
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(payload in payload(), use_json in any::<bool>()) {
            let format = PayloadFormat::from_json_flag(use_json);
            let encoded = encode(&payload, format);
            prop_assert!(encoded.is_ok());
            let encoded = encoded.unwrap_or_default();
            prop_assert_eq!(decode(&encoded, format), payload);
        }

        #[test]
        fn decode_is_total(stored in ".{0,64}", use_json in any::<bool>()) {
            let format = PayloadFormat::from_json_flag(use_json);
            let _ = decode(&stored, format);
        }

        #[test]
        fn decode_is_total_for_hex_input(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let _ = decode(&hex::encode(bytes), PayloadFormat::Native);
        }
    }
}

//! Depth-limited reader for the native payload format.
//!
//! Produces the same values as the derived `Deserialize` impls, but refuses
//! to open more than [`MAX_NESTING_DEPTH`] nested lists or maps so a crafted
//! column cannot exhaust the stack.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::de::{
    self, DeserializeSeed, Deserializer, EnumAccess, MapAccess, SeqAccess, VariantAccess, Visitor,
};

use super::CodecError;
use crate::{EventPayload, PayloadValue};

/// Deepest container nesting accepted, matching the JSON reader's limit.
pub(super) const MAX_NESTING_DEPTH: usize = 128;

const VARIANTS: &[&str] = &["Null", "Bool", "Integer", "Float", "Text", "List", "Map"];

#[derive(Deserialize)]
#[serde(variant_identifier)]
enum Variant {
    Null,
    Bool,
    Integer,
    Float,
    Text,
    List,
    Map,
}

/// Decodes postcard bytes into a payload.
pub(super) fn from_bytes(bytes: &[u8]) -> Result<EventPayload, CodecError> {
    let too_deep = Cell::new(false);
    let mut deserializer = postcard::Deserializer::from_bytes(bytes);

    // `EventPayload` is a newtype, which postcard writes as its inner map.
    let decoded = MapSeed {
        depth: 0,
        too_deep: &too_deep,
    }
    .deserialize(&mut deserializer);

    match decoded {
        Ok(map) => Ok(EventPayload::from(map)),
        Err(_) if too_deep.get() => Err(CodecError::TooDeep),
        Err(error) => Err(CodecError::Native(error)),
    }
}

#[derive(Clone, Copy)]
struct ValueSeed<'a> {
    depth: usize,
    too_deep: &'a Cell<bool>,
}

impl ValueSeed<'_> {
    fn nested<E: de::Error>(self) -> Result<Self, E> {
        if self.depth >= MAX_NESTING_DEPTH {
            self.too_deep.set(true);
            return Err(E::custom("payload nests too deeply"));
        }
        Ok(Self {
            depth: self.depth + 1,
            too_deep: self.too_deep,
        })
    }
}

impl<'de> DeserializeSeed<'de> for ValueSeed<'_> {
    type Value = PayloadValue;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_enum("PayloadValue", VARIANTS, self)
    }
}

impl<'de> Visitor<'de> for ValueSeed<'_> {
    type Value = PayloadValue;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a payload value")
    }

    fn visit_enum<A: EnumAccess<'de>>(self, data: A) -> Result<Self::Value, A::Error> {
        let (variant, access) = data.variant::<Variant>()?;
        match variant {
            Variant::Null => access.unit_variant().map(|()| PayloadValue::Null),
            Variant::Bool => access.newtype_variant().map(PayloadValue::Bool),
            Variant::Integer => access.newtype_variant().map(PayloadValue::Integer),
            Variant::Float => access.newtype_variant().map(PayloadValue::Float),
            Variant::Text => access.newtype_variant().map(PayloadValue::Text),
            Variant::List => {
                let inner = self.nested()?;
                access
                    .newtype_variant_seed(ListSeed(inner))
                    .map(PayloadValue::List)
            }
            Variant::Map => {
                let inner = self.nested()?;
                access
                    .newtype_variant_seed(MapSeed {
                        depth: inner.depth,
                        too_deep: inner.too_deep,
                    })
                    .map(PayloadValue::Map)
            }
        }
    }
}

struct ListSeed<'a>(ValueSeed<'a>);

impl<'de> DeserializeSeed<'de> for ListSeed<'_> {
    type Value = Vec<PayloadValue>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for ListSeed<'_> {
    type Value = Vec<PayloadValue>;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a list of payload values")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut values = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(256));
        while let Some(value) = seq.next_element_seed(self.0)? {
            values.push(value);
        }
        Ok(values)
    }
}

struct MapSeed<'a> {
    depth: usize,
    too_deep: &'a Cell<bool>,
}

impl<'de> DeserializeSeed<'de> for MapSeed<'_> {
    type Value = BTreeMap<String, PayloadValue>;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for MapSeed<'_> {
    type Value = BTreeMap<String, PayloadValue>;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a mapping of payload values")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let seed = ValueSeed {
            depth: self.depth,
            too_deep: self.too_deep,
        };
        let mut values = BTreeMap::new();
        while let Some(key) = map.next_key::<String>()? {
            let value = map.next_value_seed(seed)?;
            values.insert(key, value);
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::{MAX_NESTING_DEPTH, from_bytes};
    use crate::codec::CodecError;
    use crate::{EventPayload, PayloadValue};

    fn nested_lists(depth: usize) -> EventPayload {
        let mut value = PayloadValue::Integer(1);
        for _ in 0..depth {
            value = PayloadValue::List(vec![value]);
        }
        EventPayload::new().with("a", value)
    }

    #[test]
    fn nesting_up_to_the_limit_is_accepted() {
        let payload = nested_lists(MAX_NESTING_DEPTH);
        let bytes = postcard::to_allocvec(&payload).unwrap_or_default();
        assert!(matches!(from_bytes(&bytes), Ok(decoded) if decoded == payload));
    }

    #[test]
    fn nesting_past_the_limit_is_rejected() {
        let payload = nested_lists(MAX_NESTING_DEPTH + 1);
        let bytes = postcard::to_allocvec(&payload).unwrap_or_default();
        assert!(matches!(from_bytes(&bytes), Err(CodecError::TooDeep)));
    }
}

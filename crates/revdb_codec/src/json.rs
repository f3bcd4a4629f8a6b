//! Serde and JSON interop for [`Value`].
//!
//! JSON integers must fit `i64`. Larger ones are refused rather than
//! widened to a float, so a stored number always reads back unchanged.

use crate::error::CodecError;
use crate::value::{Object, Value};
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::fmt;

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Integer(n) => serializer.serialize_i64(*n),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Object(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (key, item) in fields {
                    map.serialize_entry(key, item)?;
                }
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON-like value")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        Value::deserialize(deserializer)
    }

    fn visit_bool<E: de::Error>(self, b: bool) -> Result<Value, E> {
        Ok(Value::Bool(b))
    }

    fn visit_i64<E: de::Error>(self, n: i64) -> Result<Value, E> {
        Ok(Value::Integer(n))
    }

    fn visit_u64<E: de::Error>(self, n: u64) -> Result<Value, E> {
        i64::try_from(n)
            .map(Value::Integer)
            .map_err(|_| E::custom(CodecError::IntegerOverflow))
    }

    fn visit_f64<E: de::Error>(self, f: f64) -> Result<Value, E> {
        Ok(Value::Float(f))
    }

    fn visit_str<E: de::Error>(self, s: &str) -> Result<Value, E> {
        Ok(Value::Text(s.to_string()))
    }

    fn visit_string<E: de::Error>(self, s: String) -> Result<Value, E> {
        Ok(Value::Text(s))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Value::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Value, A::Error> {
        let mut fields = Object::new();
        while let Some((key, item)) = map.next_entry::<String, Value>()? {
            if fields.contains_key(&key) {
                return Err(de::Error::custom(format!("duplicate field {key:?}")));
            }
            fields.insert(key, item);
        }
        Ok(Value::Object(fields))
    }
}

impl TryFrom<serde_json::Value> for Value {
    type Error = CodecError;

    /// Fails with `IntegerOverflow` for an integer above `i64::MAX`.
    fn try_from(json: serde_json::Value) -> Result<Self, CodecError> {
        Ok(match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else if n.is_u64() {
                    return Err(CodecError::IntegerOverflow);
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Text(s),
            serde_json::Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(Value::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            serde_json::Value::Object(fields) => Value::Object(
                fields
                    .into_iter()
                    .map(|(key, item)| Ok((key, Value::try_from(item)?)))
                    .collect::<Result<_, CodecError>>()?,
            ),
        })
    }
}

impl From<&Value> for serde_json::Value {
    /// Non-finite floats have no JSON form and become `null`.
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Integer(n) => serde_json::Value::from(*n),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(serde_json::Value::Null, serde_json::Value::Number),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(serde_json::Value::from).collect())
            }
            Value::Object(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(key, item)| (key.clone(), serde_json::Value::from(item)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn convert(json: serde_json::Value) -> Value {
        Value::try_from(json).unwrap()
    }

    #[test]
    fn json_numbers_keep_their_kind() {
        assert_eq!(convert(json!(3)), Value::Integer(3));
        assert_eq!(convert(json!(-3)), Value::Integer(-3));
        assert_eq!(convert(json!(0.25)), Value::Float(0.25));
        assert_eq!(convert(json!(i64::MAX)), Value::Integer(i64::MAX));
    }

    #[test]
    fn integers_beyond_i64_are_refused() {
        let big = i64::MAX as u64 + 1;
        assert_eq!(
            Value::try_from(json!({"n": [big]})),
            Err(CodecError::IntegerOverflow)
        );

        let parsed: Result<Value, _> = serde_json::from_str(&format!(r#"{{"n":{big}}}"#));
        assert!(parsed.is_err());
    }

    #[test]
    fn json_nested_roundtrip() {
        let original = json!({
            "text": "hello",
            "tags": ["a", "b"],
            "meta": {"pinned": true, "weight": 1.5, "parent": null}
        });
        let value = convert(original.clone());
        assert_eq!(serde_json::Value::from(&value), original);
    }

    #[test]
    fn non_finite_float_becomes_null() {
        assert_eq!(
            serde_json::Value::from(&Value::Float(f64::INFINITY)),
            serde_json::Value::Null
        );
    }

    #[test]
    fn serde_derive_path_matches_conversion() {
        let text = r#"{"a":[1,2.5,"x"],"b":{"c":false}}"#;
        let parsed: Value = serde_json::from_str(text).unwrap();
        assert_eq!(parsed, convert(serde_json::from_str::<serde_json::Value>(text).unwrap()));
        assert_eq!(serde_json::to_string(&parsed).unwrap(), text);
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let result: Result<Value, _> = serde_json::from_str(r#"{"a":1,"a":2}"#);
        assert!(result.is_err());
    }
}

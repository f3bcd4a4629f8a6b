//! # revdb codec
//!
//! The value model for document bodies and its on-disk encoding.
//!
//! A document body is a tree of [`Value`] nodes: scalars, sequences and
//! string-keyed objects. The store persists bodies as deterministic CBOR
//! so the same body always produces the same bytes, which keeps revision
//! hashing stable.
//!
//! ## Encoding rules
//!
//! - integers use the shortest head
//! - floats are written as 64-bit
//! - object keys are text, unique, and written in sorted order
//! - no indefinite-length items, byte strings or tags
//!
//! ## Usage
//!
//! ```
//! use revdb_codec::{from_cbor, to_cbor, Value};
//!
//! let value: Value = serde_json::from_str(r#"{"text":"a","n":1}"#).unwrap();
//! let bytes = to_cbor(&value).unwrap();
//! assert_eq!(from_cbor(&bytes).unwrap(), value);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod json;
mod value;

pub use decoder::{from_cbor, Decoder};
pub use encoder::{object_to_cbor, to_cbor, Encoder};
pub use error::{CodecError, CodecResult};
pub use value::{Object, Value};

/// Maximum nesting depth accepted by the encoder and the decoder.
pub const MAX_DEPTH: usize = 128;

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn value_strategy() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Integer),
            any::<f64>()
                .prop_filter("NaN never compares equal", |f| !f.is_nan())
                .prop_map(Value::Float),
            "[a-z0-9 /]{0,12}".prop_map(Value::Text),
        ];
        leaf.prop_recursive(4, 48, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                prop::collection::btree_map("[a-z_]{1,8}", inner, 0..6).prop_map(Value::Object),
            ]
        })
    }

    proptest! {
        #[test]
        fn decode_inverts_encode(value in value_strategy()) {
            prop_assert_eq!(from_cbor(&to_cbor(&value).unwrap()).unwrap(), value);
        }

        #[test]
        fn encoding_is_deterministic(value in value_strategy()) {
            let copy = value.clone();
            prop_assert_eq!(to_cbor(&value).unwrap(), to_cbor(&copy).unwrap());
        }
    }

    #[test]
    fn nested_document_body() {
        let body: Value = serde_json::from_str(
            r#"{"title":"groceries","items":[{"name":"milk","qty":2},{"name":"tea","qty":0.5}],"done":false}"#,
        )
        .unwrap();
        let decoded = from_cbor(&to_cbor(&body).unwrap()).unwrap();
        assert_eq!(decoded, body);
        assert_eq!(decoded.get("done"), Some(&Value::Bool(false)));
    }
}

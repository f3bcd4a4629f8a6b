//! Deterministic CBOR encoder.

use crate::error::{CodecError, CodecResult};
use crate::value::{Object, Value};
use crate::MAX_DEPTH;

/// Encodes a value to deterministic CBOR bytes.
///
/// Identical values always produce identical bytes:
/// - integers use the shortest head
/// - object keys are written in sorted order (they live in a `BTreeMap`)
/// - floats are always written as 64-bit (`0xfb`)
/// - no indefinite-length items
///
/// # Errors
///
/// `TooDeep` when the value nests deeper than the decoder accepts.
pub fn to_cbor(value: &Value) -> CodecResult<Vec<u8>> {
    let mut encoder = Encoder::with_capacity(64);
    encoder.encode(value)?;
    Ok(encoder.into_bytes())
}

/// Encodes a document body (an object) to deterministic CBOR bytes.
///
/// # Errors
///
/// See [`to_cbor`].
pub fn object_to_cbor(fields: &Object) -> CodecResult<Vec<u8>> {
    let mut encoder = Encoder::with_capacity(64);
    encoder.encode_object(fields)?;
    Ok(encoder.into_bytes())
}

/// A deterministic CBOR encoder writing into an owned buffer.
///
/// Every item it writes can be read back by [`crate::from_cbor`]; nesting
/// past [`MAX_DEPTH`] is refused instead of written.
#[derive(Debug, Default)]
pub struct Encoder {
    buffer: Vec<u8>,
}

impl Encoder {
    /// Creates an empty encoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an encoder with preallocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Appends the encoding of `value`.
    ///
    /// # Errors
    ///
    /// `TooDeep` past [`MAX_DEPTH`]; the buffer is left unchanged.
    pub fn encode(&mut self, value: &Value) -> CodecResult<()> {
        check_depth(value, 0)?;
        self.write_value(value);
        Ok(())
    }

    /// Appends the encoding of an object, identical to encoding
    /// `Value::Object` with the same fields.
    ///
    /// # Errors
    ///
    /// See [`Encoder::encode`].
    pub fn encode_object(&mut self, fields: &Object) -> CodecResult<()> {
        for item in fields.values() {
            check_depth(item, 1)?;
        }
        self.write_object(fields);
        Ok(())
    }

    /// Consumes the encoder and returns the bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    fn write_value(&mut self, value: &Value) {
        match value {
            Value::Null => self.buffer.push(0xf6),
            Value::Bool(b) => self.buffer.push(if *b { 0xf5 } else { 0xf4 }),
            Value::Integer(n) => self.encode_integer(*n),
            Value::Float(f) => {
                self.buffer.push(0xfb);
                self.buffer.extend_from_slice(&f.to_bits().to_be_bytes());
            }
            Value::Text(s) => self.encode_text(s),
            Value::Array(items) => {
                self.encode_head(4, items.len() as u64);
                for item in items {
                    self.write_value(item);
                }
            }
            Value::Object(fields) => self.write_object(fields),
        }
    }

    fn write_object(&mut self, fields: &Object) {
        self.encode_head(5, fields.len() as u64);
        for (key, item) in fields {
            self.encode_text(key);
            self.write_value(item);
        }
    }

    #[allow(clippy::cast_sign_loss)]
    fn encode_integer(&mut self, n: i64) {
        if n >= 0 {
            self.encode_head(0, n as u64);
        } else {
            // -1 encodes argument 0, i64::MIN encodes i64::MAX
            self.encode_head(1, (-(n + 1)) as u64);
        }
    }

    fn encode_text(&mut self, s: &str) {
        self.encode_head(3, s.len() as u64);
        self.buffer.extend_from_slice(s.as_bytes());
    }

    #[allow(clippy::cast_possible_truncation)]
    fn encode_head(&mut self, major: u8, arg: u64) {
        let mt = major << 5;
        if arg < 24 {
            self.buffer.push(mt | arg as u8);
        } else if arg <= u64::from(u8::MAX) {
            self.buffer.push(mt | 24);
            self.buffer.push(arg as u8);
        } else if arg <= u64::from(u16::MAX) {
            self.buffer.push(mt | 25);
            self.buffer.extend_from_slice(&(arg as u16).to_be_bytes());
        } else if arg <= u64::from(u32::MAX) {
            self.buffer.push(mt | 26);
            self.buffer.extend_from_slice(&(arg as u32).to_be_bytes());
        } else {
            self.buffer.push(mt | 27);
            self.buffer.extend_from_slice(&arg.to_be_bytes());
        }
    }
}

/// Mirrors the decoder's limit: an item at depth `depth` is rejected when
/// `depth > MAX_DEPTH`, the top-level item being depth 0.
fn check_depth(value: &Value, depth: usize) -> CodecResult<()> {
    if depth > MAX_DEPTH {
        return Err(CodecError::TooDeep { max: MAX_DEPTH });
    }
    match value {
        Value::Array(items) => items.iter().try_for_each(|item| check_depth(item, depth + 1)),
        Value::Object(fields) => fields
            .values()
            .try_for_each(|item| check_depth(item, depth + 1)),
        _ => Ok(()),
    }
}

//! CBOR decoder for document values.

use crate::error::{CodecError, CodecResult};
use crate::value::{Object, Value};
use crate::MAX_DEPTH;

/// Decodes exactly one value from `bytes`.
///
/// # Errors
///
/// Fails on truncated input, trailing bytes, indefinite-length items,
/// byte strings, tags, non-text object keys, duplicate keys, invalid UTF-8,
/// or nesting deeper than [`MAX_DEPTH`].
pub fn from_cbor(bytes: &[u8]) -> CodecResult<Value> {
    let mut decoder = Decoder::new(bytes);
    let value = decoder.decode()?;
    let remaining = decoder.remaining();
    if remaining != 0 {
        return Err(CodecError::TrailingBytes { remaining });
    }
    Ok(value)
}

/// A decoder reading values from a byte slice.
#[derive(Debug)]
pub struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    /// Creates a decoder positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Number of bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Decodes the next value.
    ///
    /// # Errors
    ///
    /// See [`from_cbor`].
    pub fn decode(&mut self) -> CodecResult<Value> {
        self.decode_at(0)
    }

    fn decode_at(&mut self, depth: usize) -> CodecResult<Value> {
        if depth > MAX_DEPTH {
            return Err(CodecError::TooDeep { max: MAX_DEPTH });
        }

        let initial = self.read_u8()?;
        let major = initial >> 5;
        let info = initial & 0x1f;

        match major {
            0 => {
                let arg = self.read_arg(info)?;
                i64::try_from(arg)
                    .map(Value::Integer)
                    .map_err(|_| CodecError::IntegerOverflow)
            }
            1 => {
                let arg = self.read_arg(info)?;
                let n = i64::try_from(arg).map_err(|_| CodecError::IntegerOverflow)?;
                Ok(Value::Integer(-1 - n))
            }
            2 => Err(CodecError::unsupported("byte string")),
            3 => self.read_text(info).map(Value::Text),
            4 => {
                let len = self.read_len(info)?;
                let mut items = Vec::with_capacity(len.min(self.remaining()));
                for _ in 0..len {
                    items.push(self.decode_at(depth + 1)?);
                }
                Ok(Value::Array(items))
            }
            5 => {
                let len = self.read_len(info)?;
                let mut fields = Object::new();
                for _ in 0..len {
                    let key_head = self.read_u8()?;
                    if key_head >> 5 != 3 {
                        return Err(CodecError::invalid_structure("object key is not text"));
                    }
                    let key = self.read_text(key_head & 0x1f)?;
                    let value = self.decode_at(depth + 1)?;
                    if fields.insert(key.clone(), value).is_some() {
                        return Err(CodecError::invalid_structure(format!(
                            "duplicate object key {key:?}"
                        )));
                    }
                }
                Ok(Value::Object(fields))
            }
            6 => Err(CodecError::unsupported("tag")),
            _ => self.read_simple(info),
        }
    }

    fn read_simple(&mut self, info: u8) -> CodecResult<Value> {
        match info {
            20 => Ok(Value::Bool(false)),
            21 => Ok(Value::Bool(true)),
            22 => Ok(Value::Null),
            25 => {
                let bits = u16::from_be_bytes(self.read_array::<2>()?);
                Ok(Value::Float(half_to_f64(bits)))
            }
            26 => {
                let bits = u32::from_be_bytes(self.read_array::<4>()?);
                Ok(Value::Float(f64::from(f32::from_bits(bits))))
            }
            27 => {
                let bits = u64::from_be_bytes(self.read_array::<8>()?);
                Ok(Value::Float(f64::from_bits(bits)))
            }
            31 => Err(CodecError::IndefiniteLengthForbidden),
            other => Err(CodecError::unsupported(format!("simple value {other}"))),
        }
    }

    fn read_text(&mut self, info: u8) -> CodecResult<String> {
        let len = self.read_len(info)?;
        let bytes = self.read_slice(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8)
    }

    fn read_len(&mut self, info: u8) -> CodecResult<usize> {
        let arg = self.read_arg(info)?;
        usize::try_from(arg).map_err(|_| CodecError::IntegerOverflow)
    }

    fn read_arg(&mut self, info: u8) -> CodecResult<u64> {
        match info {
            0..=23 => Ok(u64::from(info)),
            24 => Ok(u64::from(self.read_u8()?)),
            25 => Ok(u64::from(u16::from_be_bytes(self.read_array::<2>()?))),
            26 => Ok(u64::from(u32::from_be_bytes(self.read_array::<4>()?))),
            27 => Ok(u64::from_be_bytes(self.read_array::<8>()?)),
            31 => Err(CodecError::IndefiniteLengthForbidden),
            _ => Err(CodecError::invalid_structure(format!(
                "reserved additional info {info}"
            ))),
        }
    }

    fn read_u8(&mut self) -> CodecResult<u8> {
        let byte = *self.data.get(self.pos).ok_or(CodecError::UnexpectedEof)?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_array<const N: usize>(&mut self) -> CodecResult<[u8; N]> {
        let slice = self.read_slice(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    fn read_slice(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        if len > self.remaining() {
            return Err(CodecError::UnexpectedEof);
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }
}

/// IEEE 754 half precision to `f64`.
fn half_to_f64(bits: u16) -> f64 {
    let sign = if bits & 0x8000 != 0 { -1.0 } else { 1.0 };
    let exp = i32::from((bits >> 10) & 0x1f);
    let mant = f64::from(bits & 0x03ff);

    let magnitude = match exp {
        0 => mant * 2f64.powi(-24),
        31 if mant == 0.0 => f64::INFINITY,
        31 => f64::NAN,
        _ => (1.0 + mant / 1024.0) * 2f64.powi(exp - 15),
    };
    sign * magnitude
}

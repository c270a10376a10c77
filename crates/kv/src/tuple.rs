//! Order-preserving tuple packing.
//!
//! Index parts are packed into key bytes with the FoundationDB tuple
//! layout: each element carries a type code chosen so that unsigned byte
//! comparison of packed tuples matches element-wise comparison of the
//! values. This is what keeps prefix scans and range reads correct without
//! ever decoding a key.
//!
//! Supported element types are the scalar types a primary key may use:
//! bytes, UTF-8 strings, 64-bit integers, doubles, and booleans.

use snafu::Snafu;

const BYTES_CODE: u8 = 0x01;
const STRING_CODE: u8 = 0x02;
const INT_ZERO_CODE: u8 = 0x14;
const DOUBLE_CODE: u8 = 0x21;
const FALSE_CODE: u8 = 0x26;
const TRUE_CODE: u8 = 0x27;

const ESCAPE: u8 = 0xFF;
const TERMINATOR: u8 = 0x00;

/// A single element of a packed tuple.
#[derive(Debug, Clone, PartialEq)]
pub enum TupleValue {
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// UTF-8 string.
    String(String),
    /// 64-bit signed integer.
    Int(i64),
    /// IEEE 754 double.
    Double(f64),
    /// Boolean.
    Bool(bool),
}

impl From<&str> for TupleValue {
    fn from(value: &str) -> Self {
        TupleValue::String(value.to_string())
    }
}

impl From<i64> for TupleValue {
    fn from(value: i64) -> Self {
        TupleValue::Int(value)
    }
}

impl From<bool> for TupleValue {
    fn from(value: bool) -> Self {
        TupleValue::Bool(value)
    }
}

/// Errors produced while unpacking a tuple.
#[derive(Debug, Snafu)]
pub enum TupleError {
    /// The buffer ended inside an element.
    #[snafu(display("truncated tuple"))]
    Truncated,

    /// An element starts with a type code this layer does not know.
    #[snafu(display("unknown tuple type code {code:#04x} at offset {offset}"))]
    UnknownCode {
        /// The offending type code.
        code: u8,
        /// Byte offset of the code within the buffer.
        offset: usize,
    },

    /// A string element holds invalid UTF-8.
    #[snafu(display("invalid utf-8 in tuple string"))]
    InvalidUtf8,

    /// An integer element does not fit in an `i64`.
    #[snafu(display("tuple integer out of i64 range"))]
    IntOutOfRange,
}

impl From<TupleError> for folio_types::Error {
    #[track_caller]
    fn from(err: TupleError) -> Self {
        folio_types::Error::internal(err.to_string())
    }
}

/// Packs a sequence of values into order-preserving bytes.
pub fn pack(values: &[TupleValue]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 8);
    for value in values {
        pack_one(value, &mut out);
    }
    out
}

fn pack_one(value: &TupleValue, out: &mut Vec<u8>) {
    match value {
        TupleValue::Bytes(b) => {
            out.push(BYTES_CODE);
            escape_into(b, out);
        },
        TupleValue::String(s) => {
            out.push(STRING_CODE);
            escape_into(s.as_bytes(), out);
        },
        TupleValue::Int(i) => pack_int(*i, out),
        TupleValue::Double(d) => {
            out.push(DOUBLE_CODE);
            out.extend_from_slice(&transform_double(*d).to_be_bytes());
        },
        TupleValue::Bool(b) => out.push(if *b { TRUE_CODE } else { FALSE_CODE }),
    }
}

// Embedded NUL bytes are escaped as 00 FF so the bare 00 terminator stays
// unambiguous.
fn escape_into(bytes: &[u8], out: &mut Vec<u8>) {
    for &b in bytes {
        out.push(b);
        if b == TERMINATOR {
            out.push(ESCAPE);
        }
    }
    out.push(TERMINATOR);
}

fn pack_int(value: i64, out: &mut Vec<u8>) {
    if value == 0 {
        out.push(INT_ZERO_CODE);
        return;
    }

    if value > 0 {
        let magnitude = value as u64;
        let width = byte_width(magnitude);
        out.push(INT_ZERO_CODE + width);
        out.extend_from_slice(&magnitude.to_be_bytes()[8 - width as usize..]);
    } else {
        // Negative values are stored offset-binary: larger magnitudes get
        // smaller codes and smaller byte values, preserving order.
        let magnitude = value.unsigned_abs();
        let width = byte_width(magnitude);
        let max = max_for_width(width);
        let encoded = max - magnitude;
        out.push(INT_ZERO_CODE - width);
        out.extend_from_slice(&encoded.to_be_bytes()[8 - width as usize..]);
    }
}

fn byte_width(magnitude: u64) -> u8 {
    let bits = 64 - magnitude.leading_zeros();
    (bits.div_ceil(8).max(1)) as u8
}

fn max_for_width(width: u8) -> u64 {
    if width >= 8 { u64::MAX } else { (1u64 << (8 * u32::from(width))) - 1 }
}

// IEEE doubles compare correctly as unsigned bytes after flipping the sign
// bit of positives and all bits of negatives.
fn transform_double(value: f64) -> u64 {
    let bits = value.to_bits();
    if bits & (1 << 63) != 0 { !bits } else { bits ^ (1 << 63) }
}

fn untransform_double(bits: u64) -> f64 {
    let raw = if bits & (1 << 63) != 0 { bits ^ (1 << 63) } else { !bits };
    f64::from_bits(raw)
}

/// Unpacks bytes produced by [`pack`] back into values.
///
/// # Errors
///
/// Returns a [`TupleError`] on truncation, an unknown type code, invalid
/// UTF-8 in a string element, or an integer wider than 64 bits. Never
/// panics on malformed input.
pub fn unpack(mut bytes: &[u8]) -> Result<Vec<TupleValue>, TupleError> {
    let total = bytes.len();
    let mut values = Vec::new();

    while let Some((&code, rest)) = bytes.split_first() {
        let offset = total - bytes.len();
        let (value, remaining) = match code {
            BYTES_CODE => {
                let (raw, rem) = unescape(rest)?;
                (TupleValue::Bytes(raw), rem)
            },
            STRING_CODE => {
                let (raw, rem) = unescape(rest)?;
                let s = String::from_utf8(raw).map_err(|_| TupleError::InvalidUtf8)?;
                (TupleValue::String(s), rem)
            },
            c if (INT_ZERO_CODE - 8..=INT_ZERO_CODE + 8).contains(&c) => {
                let (i, rem) = unpack_int(c, rest)?;
                (TupleValue::Int(i), rem)
            },
            DOUBLE_CODE => {
                if rest.len() < 8 {
                    return Err(TupleError::Truncated);
                }
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&rest[..8]);
                (TupleValue::Double(untransform_double(u64::from_be_bytes(buf))), &rest[8..])
            },
            FALSE_CODE => (TupleValue::Bool(false), rest),
            TRUE_CODE => (TupleValue::Bool(true), rest),
            other => return Err(TupleError::UnknownCode { code: other, offset }),
        };
        values.push(value);
        bytes = remaining;
    }

    Ok(values)
}

fn unescape(bytes: &[u8]) -> Result<(Vec<u8>, &[u8]), TupleError> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == TERMINATOR {
            if bytes.get(i + 1) == Some(&ESCAPE) {
                out.push(TERMINATOR);
                i += 2;
                continue;
            }
            return Ok((out, &bytes[i + 1..]));
        }
        out.push(bytes[i]);
        i += 1;
    }
    Err(TupleError::Truncated)
}

fn unpack_int(code: u8, bytes: &[u8]) -> Result<(i64, &[u8]), TupleError> {
    if code == INT_ZERO_CODE {
        return Ok((0, bytes));
    }

    let positive = code > INT_ZERO_CODE;
    let width = if positive { code - INT_ZERO_CODE } else { INT_ZERO_CODE - code } as usize;
    if bytes.len() < width {
        return Err(TupleError::Truncated);
    }

    let mut buf = [0u8; 8];
    buf[8 - width..].copy_from_slice(&bytes[..width]);
    let raw = u64::from_be_bytes(buf);
    let rest = &bytes[width..];

    if positive {
        let value = i64::try_from(raw).map_err(|_| TupleError::IntOutOfRange)?;
        Ok((value, rest))
    } else {
        let magnitude = max_for_width(width as u8) - raw;
        let value = i64::try_from(-i128::from(magnitude)).map_err(|_| TupleError::IntOutOfRange)?;
        Ok((value, rest))
    }
}

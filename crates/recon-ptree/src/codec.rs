//! Length-prefixed encoding of field value arrays
//!
//! Layout: `u32` big-endian count, then for each value a `u32` big-endian
//! byte length followed by the minimal big-endian magnitude.

use crate::field::Zp;
use crate::{CoreError, Result};
use bytes::{Buf, BufMut};
use num_bigint::BigUint;
use std::sync::Arc;

const LEN_PREFIX: usize = 4;

/// Encode a value array
pub fn write_zz_array(values: &[Zp]) -> Vec<u8> {
    let mut out = Vec::with_capacity(encoded_len(values));
    put_zz_array(&mut out, values);
    out
}

/// Append an encoded value array to a buffer
pub fn put_zz_array<B: BufMut>(out: &mut B, values: &[Zp]) {
    out.put_u32(values.len() as u32);
    for value in values {
        let bytes = value.to_bytes_be();
        out.put_u32(bytes.len() as u32);
        out.put_slice(&bytes);
    }
}

/// Decode a value array; every value must be canonical for `modulus`
pub fn read_zz_array(mut buf: &[u8], modulus: &Arc<BigUint>) -> Result<Vec<Zp>> {
    let count = take_u32(&mut buf, "array length")? as usize;
    // Each entry needs at least its length prefix
    if count > buf.remaining() / LEN_PREFIX {
        return Err(CoreError::MalformedRecord(format!(
            "array claims {count} values but only {} bytes follow",
            buf.remaining()
        )));
    }

    let mut values = Vec::with_capacity(count);
    for index in 0..count {
        let len = take_u32(&mut buf, "value length")? as usize;
        if buf.remaining() < len {
            return Err(CoreError::MalformedRecord(format!(
                "value {index} truncated: need {len} bytes, have {}",
                buf.remaining()
            )));
        }
        values.push(Zp::decode(Arc::clone(modulus), &buf[..len])?);
        buf.advance(len);
    }

    if buf.has_remaining() {
        return Err(CoreError::MalformedRecord(format!(
            "{} trailing bytes after value array",
            buf.remaining()
        )));
    }
    Ok(values)
}

/// Encoded size of a value array without materializing it
pub fn encoded_len(values: &[Zp]) -> usize {
    LEN_PREFIX + values.iter().map(encoded_value_len).sum::<usize>()
}

/// Encoded size of one array entry
pub fn encoded_value_len(value: &Zp) -> usize {
    LEN_PREFIX + value.to_bytes_be().len()
}

fn take_u32(buf: &mut &[u8], what: &str) -> Result<u32> {
    if buf.remaining() < LEN_PREFIX {
        return Err(CoreError::MalformedRecord(format!("truncated {what}")));
    }
    Ok(buf.get_u32())
}

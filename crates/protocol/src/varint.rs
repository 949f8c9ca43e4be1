//! # Overview
//!
//! Block sizes, baseline lengths and block lengths are written as unsigned
//! LEB128 varints: seven value bits per byte, least significant group first,
//! with the high bit set on every byte except the last.
//!
//! # Examples
//!
//! ```
//! use protocol::{decode_varint, encode_varint_to_vec};
//!
//! let mut encoded = Vec::new();
//! encode_varint_to_vec(300, &mut encoded);
//! assert_eq!(encoded, [0xac, 0x02]);
//! let (value, remainder) = decode_varint(&encoded)?;
//! assert_eq!(value, 300);
//! assert!(remainder.is_empty());
//! # Ok::<(), std::io::Error>(())
//! ```

use std::io::{self, Read, Write};

/// Longest encoding of a `u64`.
pub const MAX_VARINT_LEN: usize = 10;

fn invalid_data(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

fn encode_bytes(mut value: u64) -> (usize, [u8; MAX_VARINT_LEN]) {
    let mut bytes = [0u8; MAX_VARINT_LEN];
    let mut len = 0;
    loop {
        let low = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            bytes[len] = low;
            return (len + 1, bytes);
        }
        bytes[len] = low | 0x80;
        len += 1;
    }
}

/// Folds one encoded byte into `value`; returns `true` when it was the last.
fn accumulate(value: &mut u64, index: usize, byte: u8) -> io::Result<bool> {
    if index >= MAX_VARINT_LEN {
        return Err(invalid_data("varint longer than 10 bytes"));
    }
    let bits = u64::from(byte & 0x7f);
    if index == MAX_VARINT_LEN - 1 && bits > 1 {
        return Err(invalid_data("varint overflows u64"));
    }
    *value |= bits << (7 * index as u32);
    Ok(byte & 0x80 == 0)
}

/// Writes `value` as an unsigned LEB128 varint.
pub fn write_varint<W: Write + ?Sized>(writer: &mut W, value: u64) -> io::Result<()> {
    let (len, bytes) = encode_bytes(value);
    writer.write_all(&bytes[..len])
}

/// Appends the encoding of `value` to `out`.
pub fn encode_varint_to_vec(value: u64, out: &mut Vec<u8>) {
    let (len, bytes) = encode_bytes(value);
    out.extend_from_slice(&bytes[..len]);
}

/// Reads an unsigned LEB128 varint.
///
/// # Errors
///
/// [`io::ErrorKind::UnexpectedEof`] when the reader ends mid-value and
/// [`io::ErrorKind::InvalidData`] when the value does not fit in `u64`.
pub fn read_varint<R: Read + ?Sized>(reader: &mut R) -> io::Result<u64> {
    let mut value = 0u64;
    let mut byte = [0u8; 1];
    let mut index = 0;
    loop {
        reader.read_exact(&mut byte)?;
        if accumulate(&mut value, index, byte[0])? {
            return Ok(value);
        }
        index += 1;
    }
}

/// Decodes a varint from the start of `bytes`, returning the value and the
/// remaining input.
pub fn decode_varint(bytes: &[u8]) -> io::Result<(u64, &[u8])> {
    let mut value = 0u64;
    for (index, &byte) in bytes.iter().enumerate() {
        if accumulate(&mut value, index, byte)? {
            return Ok((value, &bytes[index + 1..]));
        }
    }
    Err(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        "truncated variable-length integer",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Cursor;

    #[test]
    fn encode_matches_known_examples() {
        let cases: [(u64, &[u8]); 5] = [
            (0, &[0x00]),
            (127, &[0x7f]),
            (128, &[0x80, 0x01]),
            (4096, &[0x80, 0x20]),
            (u64::MAX, &[0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x01]),
        ];
        for (value, expected) in cases {
            let mut out = Vec::new();
            encode_varint_to_vec(value, &mut out);
            assert_eq!(out, expected, "value {value}");
        }
    }

    #[test]
    fn read_varint_errors_on_truncated_input() {
        let err = read_varint(&mut Cursor::new([0x80u8])).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(decode_varint(&[]).is_err());
    }

    #[test]
    fn overlong_encoding_is_rejected() {
        let bytes = [0xffu8; 11];
        let err = read_varint(&mut Cursor::new(bytes)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        let mut overflow = [0xffu8; 10];
        overflow[9] = 0x02;
        assert_eq!(
            decode_varint(&overflow).unwrap_err().kind(),
            io::ErrorKind::InvalidData
        );
    }

    #[test]
    fn decode_leaves_trailing_bytes() {
        let (value, rest) = decode_varint(&[0x05, 0xaa, 0xbb]).unwrap();
        assert_eq!(value, 5);
        assert_eq!(rest, &[0xaa, 0xbb]);
    }

    proptest! {
        #[test]
        fn sequences_read_back(values in prop::collection::vec(any::<u64>(), 1..=32)) {
            let mut buf = Vec::new();
            for &value in &values {
                write_varint(&mut buf, value).unwrap();
            }
            let mut cursor = Cursor::new(buf);
            for &value in &values {
                prop_assert_eq!(read_varint(&mut cursor).unwrap(), value);
            }
        }
    }
}

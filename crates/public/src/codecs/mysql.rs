/*
 * Copyright (c) 2024 Yunshan Networks
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! MySQL length-encoded integers and strings.
//!
//! Both decoders return the decoded value together with the offset right
//! after it. A `None` value always comes with the input offset unchanged, so
//! callers can stop scanning without rewinding.

use std::fmt;

use consts::*;

use crate::bytes::{read_u16_le, read_u24_le, read_u64_le};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LengthEncodedValue {
    Null,
    Text(String),
}

impl LengthEncodedValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Null => NULL_TEXT,
            Self::Text(s) => s.as_str(),
        }
    }

    pub fn into_string(self) -> String {
        match self {
            Self::Null => NULL_TEXT.to_owned(),
            Self::Text(s) => s,
        }
    }
}

impl fmt::Display for LengthEncodedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn decode_int(bytes: &[u8], offset: usize) -> (Option<u64>, usize) {
    if offset >= bytes.len() {
        return (None, offset);
    }
    let remain = &bytes[offset..];
    match remain[0] {
        b if b < LENENC_NULL => (Some(b as u64), offset + 1),
        LENENC_INT_2 if remain.len() >= 3 => (Some(read_u16_le(&remain[1..]) as u64), offset + 3),
        LENENC_INT_3 if remain.len() >= 4 => (Some(read_u24_le(&remain[1..]) as u64), offset + 4),
        LENENC_INT_8 if remain.len() >= 9 => (Some(read_u64_le(&remain[1..])), offset + 9),
        // 0xfb is NULL and 0xff starts an error packet, neither is an integer
        _ => (None, offset),
    }
}

pub fn decode_string(bytes: &[u8], offset: usize) -> (Option<LengthEncodedValue>, usize) {
    if offset >= bytes.len() {
        return (None, offset);
    }
    if bytes[offset] == LENENC_NULL {
        return (Some(LengthEncodedValue::Null), offset + 1);
    }
    let (Some(len), start) = decode_int(bytes, offset) else {
        return (None, offset);
    };
    let remain = (bytes.len() - start) as u64;
    if len > remain {
        return (None, offset);
    }
    let end = start + len as usize;
    let text = String::from_utf8_lossy(&bytes[start..end]).into_owned();
    (Some(LengthEncodedValue::Text(text)), end)
}

pub fn encode_int(buf: &mut Vec<u8>, v: u64) {
    match v {
        0..=0xfa => buf.push(v as u8),
        0xfb..=0xffff => {
            buf.push(LENENC_INT_2);
            buf.extend_from_slice(&(v as u16).to_le_bytes());
        }
        0x10000..=0xffffff => {
            buf.push(LENENC_INT_3);
            buf.extend_from_slice(&(v as u32).to_le_bytes()[..3]);
        }
        _ => {
            buf.push(LENENC_INT_8);
            buf.extend_from_slice(&v.to_le_bytes());
        }
    }
}

pub fn encode_string(buf: &mut Vec<u8>, value: &LengthEncodedValue) {
    match value {
        LengthEncodedValue::Null => buf.push(LENENC_NULL),
        LengthEncodedValue::Text(s) => {
            encode_int(buf, s.len() as u64);
            buf.extend_from_slice(s.as_bytes());
        }
    }
}

pub mod consts {
    pub const LENENC_NULL: u8 = 0xfb;
    pub const LENENC_INT_2: u8 = 0xfc;
    pub const LENENC_INT_3: u8 = 0xfd;
    pub const LENENC_INT_8: u8 = 0xfe;

    pub const NULL_TEXT: &str = "NULL";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_byte_int() {
        for b in 0..LENENC_NULL {
            assert_eq!(decode_int(&[b], 0), (Some(b as u64), 1), "byte {:#x}", b);
        }
    }

    #[test]
    fn multi_byte_int() {
        assert_eq!(decode_int(&[0xfc, 0x01, 0x02], 0), (Some(0x0201), 3));
        assert_eq!(
            decode_int(&[0xfd, 0x01, 0x02, 0x03], 0),
            (Some(0x030201), 4)
        );
        assert_eq!(
            decode_int(&[0xfe, 1, 2, 3, 4, 5, 6, 7, 8], 0),
            (Some(0x0807060504030201), 9)
        );
        // offset is honoured
        assert_eq!(decode_int(&[0xff, 0xfc, 0x10, 0x00], 1), (Some(0x10), 4));
    }

    #[test]
    fn truncated_int() {
        assert_eq!(decode_int(&[0xfc, 0x01], 0), (None, 0));
        assert_eq!(decode_int(&[0xfd, 0x01, 0x02], 0), (None, 0));
        assert_eq!(decode_int(&[0xfe, 1, 2, 3, 4, 5, 6, 7], 0), (None, 0));
        assert_eq!(decode_int(&[0x01], 1), (None, 1));
        assert_eq!(decode_int(&[], 0), (None, 0));
        assert_eq!(decode_int(&[0xfb], 0), (None, 0));
        assert_eq!(decode_int(&[0xff, 0x00], 0), (None, 0));
    }

    #[test]
    fn null_string() {
        assert_eq!(
            decode_string(&[0xfb, 0xff, 0xff], 0),
            (Some(LengthEncodedValue::Null), 1)
        );
        assert_eq!(
            decode_string(&[0x00, 0xfb], 1),
            (Some(LengthEncodedValue::Null), 2)
        );
        assert_eq!(LengthEncodedValue::Null.to_string(), "NULL");
    }

    #[test]
    fn text_string() {
        let (value, offset) = decode_string(b"\x05Alice\x03Bob", 0);
        assert_eq!(value, Some(LengthEncodedValue::Text("Alice".to_owned())));
        assert_eq!(offset, 6);
        let (value, offset) = decode_string(b"\x05Alice\x03Bob", offset);
        assert_eq!(value.map(|v| v.into_string()), Some("Bob".to_owned()));
        assert_eq!(offset, 10);

        let (value, offset) = decode_string(&[0x00], 0);
        assert_eq!(value, Some(LengthEncodedValue::Text(String::new())));
        assert_eq!(offset, 1);
    }

    #[test]
    fn lossy_string() {
        let (value, _) = decode_string(&[0x03, b'a', 0xff, b'b'], 0);
        assert_eq!(value.unwrap().as_str(), "a\u{fffd}b");
    }

    #[test]
    fn string_longer_than_buffer() {
        assert_eq!(decode_string(b"\x06Alice", 0), (None, 0));
        assert_eq!(decode_string(&[0xfc, 0x01], 0), (None, 0));
    }

    #[test]
    fn encode_then_decode() {
        let mut buf = vec![];
        for v in [0u64, 0xfa, 0xfb, 0xffff, 0x10000, 0xffffff, 0x1000000] {
            buf.clear();
            encode_int(&mut buf, v);
            assert_eq!(decode_int(&buf, 0), (Some(v), buf.len()));
        }

        buf.clear();
        encode_string(&mut buf, &LengthEncodedValue::Text("x".repeat(300)));
        encode_string(&mut buf, &LengthEncodedValue::Null);
        let (first, offset) = decode_string(&buf, 0);
        assert_eq!(first.unwrap().as_str().len(), 300);
        let (second, offset) = decode_string(&buf, offset);
        assert!(second.unwrap().is_null());
        assert_eq!(offset, buf.len());
    }
}

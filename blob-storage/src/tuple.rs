//! Order-preserving tuple encoding for composite keys.
//!
//! Packed tuples sort byte-wise in the same order as their elements, which is
//! what lets all chunks of one blob be fetched with a single range scan. The
//! encoding follows the FoundationDB tuple layer, restricted to null, byte
//! strings, UTF-8 strings and signed 64-bit integers.

use byteorder::{BigEndian, ByteOrder};
use thiserror::Error;

const NULL_CODE: u8 = 0x00;
const BYTES_CODE: u8 = 0x01;
const STRING_CODE: u8 = 0x02;
const INT_ZERO_CODE: u8 = 0x14;
const NEG_INT_MIN_CODE: u8 = 0x0C;
const POS_INT_MAX_CODE: u8 = 0x1C;

/// Follows an embedded 0x00 inside a byte or string element.
const NULL_ESCAPE: u8 = 0xFF;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TupleError {
    #[error("unexpected end of input at offset {offset}")]
    UnexpectedEnd { offset: usize },

    #[error("unknown type code 0x{code:02X} at offset {offset}")]
    UnknownTypeCode { code: u8, offset: usize },

    #[error("missing null terminator for element at offset {offset}")]
    MissingTerminator { offset: usize },

    #[error("invalid UTF-8 in string element at offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("integer overflow at offset {offset}")]
    IntegerOverflow { offset: usize },

    #[error("key does not start with the subspace prefix")]
    PrefixMismatch,
}

/// A single typed component of a [`Tuple`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Element {
    Null,
    Bytes(Vec<u8>),
    String(String),
    Int(i64),
}

impl Element {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Element::Int(n) => Some(*n),
            _ => None,
        }
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Element::Null => out.push(NULL_CODE),
            Element::Bytes(bytes) => {
                out.push(BYTES_CODE);
                encode_escaped(bytes, out);
            }
            Element::String(s) => {
                out.push(STRING_CODE);
                encode_escaped(s.as_bytes(), out);
            }
            Element::Int(n) => encode_int(*n, out),
        }
    }
}

impl From<&str> for Element {
    fn from(s: &str) -> Self {
        Element::String(s.to_string())
    }
}

impl From<String> for Element {
    fn from(s: String) -> Self {
        Element::String(s)
    }
}

impl From<&[u8]> for Element {
    fn from(bytes: &[u8]) -> Self {
        Element::Bytes(bytes.to_vec())
    }
}

impl From<Vec<u8>> for Element {
    fn from(bytes: Vec<u8>) -> Self {
        Element::Bytes(bytes)
    }
}

impl From<i64> for Element {
    fn from(n: i64) -> Self {
        Element::Int(n)
    }
}

impl From<u32> for Element {
    fn from(n: u32) -> Self {
        Element::Int(i64::from(n))
    }
}

/// An ordered list of elements that packs into a sortable byte key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Tuple {
    elements: Vec<Element>,
}

impl Tuple {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an element, builder style.
    pub fn push(mut self, element: impl Into<Element>) -> Self {
        self.elements.push(element.into());
        self
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn last(&self) -> Option<&Element> {
        self.elements.last()
    }

    pub fn pack(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.pack_into(&mut out);
        out
    }

    pub fn pack_into(&self, out: &mut Vec<u8>) {
        for element in &self.elements {
            element.encode_into(out);
        }
    }

    pub fn unpack(data: &[u8]) -> Result<Tuple, TupleError> {
        let mut elements = Vec::new();
        let mut offset = 0;
        while offset < data.len() {
            let (element, consumed) = decode_element(data, offset)?;
            elements.push(element);
            offset += consumed;
        }
        Ok(Tuple { elements })
    }
}

impl FromIterator<Element> for Tuple {
    fn from_iter<I: IntoIterator<Item = Element>>(iter: I) -> Self {
        Tuple {
            elements: iter.into_iter().collect(),
        }
    }
}

impl From<Element> for Tuple {
    fn from(element: Element) -> Self {
        Tuple {
            elements: vec![element],
        }
    }
}

impl From<&str> for Tuple {
    fn from(s: &str) -> Self {
        Tuple::new().push(s)
    }
}

impl From<String> for Tuple {
    fn from(s: String) -> Self {
        Tuple::new().push(s)
    }
}

impl From<&String> for Tuple {
    fn from(s: &String) -> Self {
        Tuple::new().push(s.as_str())
    }
}

impl From<&[u8]> for Tuple {
    fn from(bytes: &[u8]) -> Self {
        Tuple::new().push(bytes)
    }
}

impl From<Vec<u8>> for Tuple {
    fn from(bytes: Vec<u8>) -> Self {
        Tuple::new().push(bytes)
    }
}

impl From<i64> for Tuple {
    fn from(n: i64) -> Self {
        Tuple::new().push(n)
    }
}

impl From<&Tuple> for Tuple {
    fn from(tuple: &Tuple) -> Self {
        tuple.clone()
    }
}

fn encode_escaped(bytes: &[u8], out: &mut Vec<u8>) {
    for &b in bytes {
        out.push(b);
        if b == 0x00 {
            out.push(NULL_ESCAPE);
        }
    }
    out.push(0x00);
}

/// Minimal number of bytes needed to hold `n`.
fn byte_len(n: u64) -> usize {
    (64 - n.leading_zeros() as usize + 7) / 8
}

fn encode_int(n: i64, out: &mut Vec<u8>) {
    if n == 0 {
        out.push(INT_ZERO_CODE);
        return;
    }
    let magnitude = n.unsigned_abs();
    let size = byte_len(magnitude);
    let mut buf = [0u8; 8];
    if n > 0 {
        out.push(INT_ZERO_CODE + size as u8);
        BigEndian::write_u64(&mut buf, magnitude);
    } else {
        // one's complement keeps negative values ordered below positives
        out.push(INT_ZERO_CODE - size as u8);
        BigEndian::write_u64(&mut buf, !magnitude);
    }
    out.extend_from_slice(&buf[8 - size..]);
}

/// Decodes one element starting at `offset`; returns it with the byte count consumed.
fn decode_element(data: &[u8], offset: usize) -> Result<(Element, usize), TupleError> {
    let code = *data.get(offset).ok_or(TupleError::UnexpectedEnd { offset })?;
    match code {
        NULL_CODE => Ok((Element::Null, 1)),
        BYTES_CODE => {
            let (bytes, consumed) = decode_escaped(data, offset + 1)?;
            Ok((Element::Bytes(bytes), consumed + 1))
        }
        STRING_CODE => {
            let (bytes, consumed) = decode_escaped(data, offset + 1)?;
            let s = String::from_utf8(bytes).map_err(|_| TupleError::InvalidUtf8 { offset })?;
            Ok((Element::String(s), consumed + 1))
        }
        NEG_INT_MIN_CODE..=POS_INT_MAX_CODE => decode_int(data, offset),
        code => Err(TupleError::UnknownTypeCode { code, offset }),
    }
}

fn decode_escaped(data: &[u8], start: usize) -> Result<(Vec<u8>, usize), TupleError> {
    let mut out = Vec::new();
    let mut i = start;
    while i < data.len() {
        if data[i] == 0x00 {
            if data.get(i + 1) == Some(&NULL_ESCAPE) {
                out.push(0x00);
                i += 2;
                continue;
            }
            return Ok((out, i - start + 1));
        }
        out.push(data[i]);
        i += 1;
    }
    Err(TupleError::MissingTerminator { offset: start })
}

fn decode_int(data: &[u8], offset: usize) -> Result<(Element, usize), TupleError> {
    let code = data[offset];
    if code == INT_ZERO_CODE {
        return Ok((Element::Int(0), 1));
    }
    let positive = code > INT_ZERO_CODE;
    let size = if positive {
        (code - INT_ZERO_CODE) as usize
    } else {
        (INT_ZERO_CODE - code) as usize
    };
    let body = data
        .get(offset + 1..offset + 1 + size)
        .ok_or(TupleError::UnexpectedEnd { offset })?;
    let raw = BigEndian::read_uint(body, size);

    let n = if positive {
        i64::try_from(raw).map_err(|_| TupleError::IntegerOverflow { offset })?
    } else {
        let mask = if size == 8 { u64::MAX } else { (1u64 << (size * 8)) - 1 };
        let magnitude = !raw & mask;
        if magnitude > i64::MAX as u64 + 1 {
            return Err(TupleError::IntegerOverflow { offset });
        }
        (magnitude as i64).wrapping_neg()
    };
    Ok((Element::Int(n), 1 + size))
}

//! NDN names and their typed components.
//!
//! Names are sequences of typed components. The URI form follows the NDN
//! naming conventions: `sha256digest=`/`params-sha256=` for digest
//! components, `seg=`/`v=`/`t=`/`seq=` for the numeric conventions, a
//! decimal `<type>=<value>` form for everything else, and percent
//! encoding for bytes outside the URI-safe set.

use crate::error::Error;
use crate::tlv::{self, TlNum};
use crate::wire::ParseReader;
use crate::Result;
use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// One typed component of an NDN name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Component {
    pub typ: u32,
    pub value: Bytes,
}

impl Component {
    pub const GENERIC: u32 = 8;
    pub const IMPLICIT_SHA256_DIGEST: u32 = 1;
    pub const PARAMETERS_SHA256_DIGEST: u32 = 2;
    pub const KEYWORD: u32 = 32;
    pub const SEGMENT: u32 = 50;
    pub const BYTE_OFFSET: u32 = 52;
    pub const VERSION: u32 = 54;
    pub const TIMESTAMP: u32 = 56;
    pub const SEQUENCE_NUM: u32 = 58;

    pub fn new(typ: u32, value: impl Into<Bytes>) -> Self {
        Self {
            typ,
            value: value.into(),
        }
    }

    pub fn generic(value: impl Into<Bytes>) -> Self {
        Self::new(Self::GENERIC, value)
    }

    pub fn keyword(value: impl Into<Bytes>) -> Self {
        Self::new(Self::KEYWORD, value)
    }

    pub fn segment(n: u64) -> Self {
        Self::new(Self::SEGMENT, tlv::nat_bytes(n))
    }

    pub fn version(n: u64) -> Self {
        Self::new(Self::VERSION, tlv::nat_bytes(n))
    }

    pub fn timestamp(n: u64) -> Self {
        Self::new(Self::TIMESTAMP, tlv::nat_bytes(n))
    }

    pub fn sequence_num(n: u64) -> Self {
        Self::new(Self::SEQUENCE_NUM, tlv::nat_bytes(n))
    }

    pub fn implicit_digest(digest: [u8; 32]) -> Self {
        Self::new(Self::IMPLICIT_SHA256_DIGEST, digest.to_vec())
    }

    pub fn params_digest(digest: [u8; 32]) -> Self {
        Self::new(Self::PARAMETERS_SHA256_DIGEST, digest.to_vec())
    }

    pub fn is_digest(&self) -> bool {
        self.typ == Self::IMPLICIT_SHA256_DIGEST || self.typ == Self::PARAMETERS_SHA256_DIGEST
    }

    /// Interpret the value as a non-negative integer, as the numeric
    /// conventions (segment, version, timestamp, sequence) encode it.
    pub fn as_number(&self) -> Result<u64> {
        tlv::parse_nat(&self.value)
    }

    pub fn encoded_len(&self) -> usize {
        tlv::tlv_len(self.typ as u64, self.value.len())
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        tlv::encode_tlv(self.typ as u64, &self.value, buf);
    }

    /// Parse one component from the reader.
    pub fn parse(reader: &mut ParseReader<'_>) -> Result<Self> {
        let (typ, len) = tlv::read_header(reader)?;
        let typ = u32::try_from(typ)
            .map_err(|_| Error::Format(format!("component type {typ} out of range")))?;
        let value = reader
            .read(len)
            .map_err(|e| e.in_field(typ as u64))?;
        let comp = Self { typ, value };
        if comp.is_digest() && comp.value.len() != 32 {
            return Err(Error::Format(format!(
                "digest component must be 32 bytes, got {}",
                comp.value.len()
            )));
        }
        Ok(comp)
    }

    /// Parse a component from one URI segment.
    pub fn from_uri(segment: &str) -> Result<Self> {
        if let Some((head, tail)) = segment.split_once('=') {
            match head {
                "sha256digest" => return Ok(Self::new(Self::IMPLICIT_SHA256_DIGEST, hex_value(tail)?)),
                "params-sha256" => return Ok(Self::new(Self::PARAMETERS_SHA256_DIGEST, hex_value(tail)?)),
                "seg" => return Ok(Self::segment(dec_value(tail)?)),
                "v" => return Ok(Self::version(dec_value(tail)?)),
                "t" => return Ok(Self::timestamp(dec_value(tail)?)),
                "seq" => return Ok(Self::sequence_num(dec_value(tail)?)),
                _ => {
                    if let Ok(typ) = head.parse::<u32>() {
                        return Ok(Self::new(typ, percent_decode(tail)?));
                    }
                }
            }
        }
        Ok(Self::generic(percent_decode(segment)?))
    }

    fn fmt_uri(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.typ {
            Self::IMPLICIT_SHA256_DIGEST => write!(f, "sha256digest={}", hex::encode(&self.value)),
            Self::PARAMETERS_SHA256_DIGEST => write!(f, "params-sha256={}", hex::encode(&self.value)),
            Self::SEGMENT | Self::VERSION | Self::TIMESTAMP | Self::SEQUENCE_NUM => {
                let conv = match self.typ {
                    Self::SEGMENT => "seg",
                    Self::VERSION => "v",
                    Self::TIMESTAMP => "t",
                    _ => "seq",
                };
                match self.as_number() {
                    Ok(n) => write!(f, "{conv}={n}"),
                    Err(_) => write!(f, "{}={}", self.typ, PercentEncoded(&self.value)),
                }
            }
            Self::GENERIC => write!(f, "{}", PercentEncoded(&self.value)),
            typ => write!(f, "{}={}", typ, PercentEncoded(&self.value)),
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_uri(f)
    }
}

impl Ord for Component {
    /// NDN canonical order: type number, then value length, then bytes.
    fn cmp(&self, other: &Self) -> Ordering {
        self.typ
            .cmp(&other.typ)
            .then(self.value.len().cmp(&other.value.len()))
            .then_with(|| self.value.cmp(&other.value))
    }
}

impl PartialOrd for Component {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/* ---------------------------------------------------------------- *
 * Name
 * ---------------------------------------------------------------- */

/// An NDN name: an ordered sequence of typed components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Name(Vec<Component>);

impl Name {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn from_components(components: Vec<Component>) -> Self {
        Self(components)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Component> {
        self.0.get(index)
    }

    pub fn components(&self) -> &[Component] {
        &self.0
    }

    pub fn push(&mut self, component: Component) {
        self.0.push(component);
    }

    /// Builder-style append.
    pub fn appended(mut self, component: Component) -> Self {
        self.0.push(component);
        self
    }

    /// The first `len` components as a new name.
    pub fn prefix(&self, len: usize) -> Self {
        Self(self.0.iter().take(len).cloned().collect())
    }

    /// Drop the last component, if any.
    pub fn pop(&mut self) -> Option<Component> {
        self.0.pop()
    }

    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.0.len() <= other.0.len() && self.0.iter().zip(&other.0).all(|(a, b)| a == b)
    }

    /// Concatenate two names.
    pub fn join(&self, suffix: &Name) -> Name {
        let mut out = self.clone();
        out.0.extend(suffix.0.iter().cloned());
        out
    }

    /// Encoded size of the component sequence (the Name TLV's value).
    pub fn value_len(&self) -> usize {
        self.0.iter().map(Component::encoded_len).sum()
    }

    /// Append only the component sequence, without the Name TLV header.
    pub fn encode_value(&self, buf: &mut BytesMut) {
        for comp in &self.0 {
            comp.encode(buf);
        }
    }

    /// Append the full Name TLV.
    pub fn encode(&self, buf: &mut BytesMut) {
        TlNum(tlv::TYPE_NAME).encode(buf);
        TlNum(self.value_len() as u64).encode(buf);
        self.encode_value(buf);
    }

    /// The component sequence as one contiguous buffer; used as the
    /// canonical key for storage and pending-Interest tables.
    pub fn to_value_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.value_len());
        self.encode_value(&mut buf);
        buf.freeze()
    }

    /// The full Name TLV as one contiguous buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(tlv::tlv_len(tlv::TYPE_NAME, self.value_len()));
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Parse the component sequence from a reader bounded to the Name
    /// TLV's value.
    pub fn parse_value(reader: &mut ParseReader<'_>) -> Result<Self> {
        let mut components = Vec::new();
        while reader.remaining() > 0 {
            components.push(Component::parse(reader)?);
        }
        Ok(Self(components))
    }

    /// Parse a full Name TLV from the reader.
    pub fn parse(reader: &mut ParseReader<'_>) -> Result<Self> {
        let (typ, len) = tlv::read_header(reader)?;
        if typ != tlv::TYPE_NAME {
            return Err(Error::Format(format!(
                "expected name TLV type {}, got {typ}",
                tlv::TYPE_NAME
            )));
        }
        let mut inner = reader.delegate(len)?;
        Self::parse_value(&mut inner).map_err(|e| e.in_field(tlv::TYPE_NAME))
    }
}

impl FromStr for Name {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut components = Vec::new();
        for segment in s.split('/') {
            if segment.is_empty() {
                continue;
            }
            components.push(Component::from_uri(segment)?);
        }
        Ok(Self(components))
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for comp in &self.0 {
            write!(f, "/{comp}")?;
        }
        Ok(())
    }
}

impl From<Vec<Component>> for Name {
    fn from(components: Vec<Component>) -> Self {
        Self(components)
    }
}

/* ---------------------------------------------------------------- *
 * URI escaping helpers
 * ---------------------------------------------------------------- */

fn is_uri_safe(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'~' | b'-')
}

struct PercentEncoded<'a>(&'a [u8]);

impl fmt::Display for PercentEncoded<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in self.0 {
            if is_uri_safe(b) {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "%{b:02x}")?;
            }
        }
        Ok(())
    }
}

fn percent_decode(s: &str) -> Result<Vec<u8>> {
    let raw = s.as_bytes();
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'%' {
            if raw.len() < i + 3 {
                return Err(Error::Format(format!("truncated percent escape in {s:?}")));
            }
            let hi = hex_digit(raw[i + 1])?;
            let lo = hex_digit(raw[i + 2])?;
            out.push(hi << 4 | lo);
            i += 3;
        } else {
            out.push(raw[i]);
            i += 1;
        }
    }
    Ok(out)
}

fn hex_digit(b: u8) -> Result<u8> {
    match b {
        b'0'..=b'9' => Ok(b - b'0'),
        b'a'..=b'f' => Ok(b - b'a' + 10),
        b'A'..=b'F' => Ok(b - b'A' + 10),
        _ => Err(Error::Format(format!("invalid hex digit {:?}", b as char))),
    }
}

fn hex_value(s: &str) -> Result<Vec<u8>> {
    let bytes = hex::decode(s).map_err(|e| Error::Format(format!("invalid hex value: {e}")))?;
    if bytes.len() != 32 {
        return Err(Error::Format(format!(
            "digest component must be 32 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(bytes)
}

fn dec_value(s: &str) -> Result<u64> {
    s.parse()
        .map_err(|e| Error::Format(format!("invalid number {s:?}: {e}")))
}

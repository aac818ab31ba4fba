//! Interest and Data packets, NDN packet format v0.3.
//!
//! Encoding produces the packet wire together with the exact signed
//! portion so signers and validators cover the same bytes; decoding
//! slices the signed portion zero-copy out of the input wire.

use crate::error::Error;
use crate::name::{Component, Name};
use crate::security::{sha256_wire, Signer};
use crate::tlv::{self, TlNum};
use crate::wire::{ParseReader, Wire};
use crate::Result;
use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Default Interest lifetime when none is carried on the wire.
pub const DEFAULT_INTEREST_LIFETIME: Duration = Duration::from_secs(4);

/* ---------------------------------------------------------------- *
 * Signature metadata
 * ---------------------------------------------------------------- */

/// NDN signature type numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SigType {
    DigestSha256,
    Sha256WithRsa,
    Sha256WithEcdsa,
    HmacWithSha256,
    Other(u64),
}

impl From<u64> for SigType {
    fn from(value: u64) -> Self {
        match value {
            0 => Self::DigestSha256,
            1 => Self::Sha256WithRsa,
            3 => Self::Sha256WithEcdsa,
            4 => Self::HmacWithSha256,
            other => Self::Other(other),
        }
    }
}

impl From<SigType> for u64 {
    fn from(value: SigType) -> Self {
        match value {
            SigType::DigestSha256 => 0,
            SigType::Sha256WithRsa => 1,
            SigType::Sha256WithEcdsa => 3,
            SigType::HmacWithSha256 => 4,
            SigType::Other(other) => other,
        }
    }
}

/// Identifies the signing key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyLocator {
    Name(Name),
    KeyDigest(Bytes),
}

/// Signature metadata carried in ISigInfo / DSigInfo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureInfo {
    pub sig_type: SigType,
    pub key_locator: Option<KeyLocator>,
}

impl SignatureInfo {
    pub fn new(sig_type: SigType) -> Self {
        Self {
            sig_type,
            key_locator: None,
        }
    }

    pub fn with_key_name(mut self, name: Name) -> Self {
        self.key_locator = Some(KeyLocator::Name(name));
        self
    }

    fn value_len(&self) -> usize {
        let mut len = tlv::tlv_len(tlv::TYPE_SIGNATURE_TYPE, nat_len(self.sig_type.into()));
        if let Some(locator) = &self.key_locator {
            let inner = match locator {
                KeyLocator::Name(name) => tlv::tlv_len(tlv::TYPE_NAME, name.value_len()),
                KeyLocator::KeyDigest(d) => tlv::tlv_len(tlv::TYPE_KEY_DIGEST, d.len()),
            };
            len += tlv::tlv_len(tlv::TYPE_KEY_LOCATOR, inner);
        }
        len
    }

    /// Append this info as a TLV of the given outer type (ISigInfo for
    /// Interests, DSigInfo for Data).
    pub fn encode_as(&self, outer_type: u64, buf: &mut BytesMut) {
        TlNum(outer_type).encode(buf);
        TlNum(self.value_len() as u64).encode(buf);
        tlv::encode_tlv(
            tlv::TYPE_SIGNATURE_TYPE,
            &tlv::nat_bytes(self.sig_type.into()),
            buf,
        );
        if let Some(locator) = &self.key_locator {
            let mut inner = BytesMut::new();
            match locator {
                KeyLocator::Name(name) => name.encode(&mut inner),
                KeyLocator::KeyDigest(d) => tlv::encode_tlv(tlv::TYPE_KEY_DIGEST, d, &mut inner),
            }
            tlv::encode_tlv(tlv::TYPE_KEY_LOCATOR, &inner, buf);
        }
    }

    /// Parse from a reader bounded to the info TLV's value.
    pub fn parse_value(reader: &mut ParseReader<'_>) -> Result<Self> {
        let mut sig_type = None;
        let mut key_locator = None;
        while reader.remaining() > 0 {
            let (typ, len) = tlv::read_header(reader)?;
            match typ {
                tlv::TYPE_SIGNATURE_TYPE => {
                    let raw = reader.read(len)?;
                    sig_type = Some(SigType::from(
                        tlv::parse_nat(&raw).map_err(|e| e.in_field(typ))?,
                    ));
                }
                tlv::TYPE_KEY_LOCATOR => {
                    let mut inner = reader.delegate(len)?;
                    let (ityp, ilen) = tlv::read_header(&mut inner)?;
                    key_locator = Some(match ityp {
                        tlv::TYPE_NAME => {
                            let mut name_reader = inner.delegate(ilen)?;
                            KeyLocator::Name(
                                Name::parse_value(&mut name_reader)
                                    .map_err(|e| e.in_field(typ))?,
                            )
                        }
                        tlv::TYPE_KEY_DIGEST => KeyLocator::KeyDigest(inner.read(ilen)?),
                        other => return Err(Error::UnrecognizedField { typ: other }),
                    });
                }
                other => tlv::skip_unrecognized(reader, other, len)?,
            }
        }
        let sig_type = sig_type.ok_or(Error::SkipRequired {
            typ: tlv::TYPE_SIGNATURE_TYPE,
        })?;
        Ok(Self {
            sig_type,
            key_locator,
        })
    }
}

fn nat_len(value: u64) -> usize {
    tlv::nat_bytes(value).len()
}

/* ---------------------------------------------------------------- *
 * MetaInfo
 * ---------------------------------------------------------------- */

/// Data content type numbers.
pub mod content_type {
    pub const BLOB: u64 = 0;
    pub const LINK: u64 = 1;
    pub const KEY: u64 = 2;
    pub const NACK: u64 = 3;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaInfo {
    pub content_type: Option<u64>,
    pub freshness_period: Option<Duration>,
    pub final_block_id: Option<Component>,
}

impl MetaInfo {
    fn is_default(&self) -> bool {
        self.content_type.is_none()
            && self.freshness_period.is_none()
            && self.final_block_id.is_none()
    }

    fn encode(&self, buf: &mut BytesMut) {
        if self.is_default() {
            return;
        }
        let mut inner = BytesMut::new();
        if let Some(ct) = self.content_type {
            tlv::encode_tlv(tlv::TYPE_CONTENT_TYPE, &tlv::nat_bytes(ct), &mut inner);
        }
        if let Some(fp) = self.freshness_period {
            tlv::encode_tlv(
                tlv::TYPE_FRESHNESS_PERIOD,
                &tlv::nat_bytes(fp.as_millis() as u64),
                &mut inner,
            );
        }
        if let Some(fbi) = &self.final_block_id {
            let mut comp = BytesMut::new();
            fbi.encode(&mut comp);
            tlv::encode_tlv(tlv::TYPE_FINAL_BLOCK_ID, &comp, &mut inner);
        }
        tlv::encode_tlv(tlv::TYPE_META_INFO, &inner, buf);
    }

    fn parse_value(reader: &mut ParseReader<'_>) -> Result<Self> {
        let mut meta = MetaInfo::default();
        while reader.remaining() > 0 {
            let (typ, len) = tlv::read_header(reader)?;
            match typ {
                tlv::TYPE_CONTENT_TYPE => {
                    let raw = reader.read(len)?;
                    meta.content_type =
                        Some(tlv::parse_nat(&raw).map_err(|e| e.in_field(typ))?);
                }
                tlv::TYPE_FRESHNESS_PERIOD => {
                    let raw = reader.read(len)?;
                    let ms = tlv::parse_nat(&raw).map_err(|e| e.in_field(typ))?;
                    meta.freshness_period = Some(Duration::from_millis(ms));
                }
                tlv::TYPE_FINAL_BLOCK_ID => {
                    let mut inner = reader.delegate(len)?;
                    meta.final_block_id =
                        Some(Component::parse(&mut inner).map_err(|e| e.in_field(typ))?);
                }
                other => tlv::skip_unrecognized(reader, other, len)?,
            }
        }
        Ok(meta)
    }
}

/* ---------------------------------------------------------------- *
 * Interest
 * ---------------------------------------------------------------- */

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interest {
    pub name: Name,
    pub can_be_prefix: bool,
    pub must_be_fresh: bool,
    /// Raw value of the ForwardingHint TLV, kept opaque.
    pub forwarding_hint: Option<Wire>,
    pub nonce: Option<u32>,
    pub lifetime: Option<Duration>,
    pub hop_limit: Option<u8>,
    pub app_param: Option<Wire>,
    pub sig_info: Option<SignatureInfo>,
    pub sig_value: Option<Bytes>,
}

impl Interest {
    pub fn new(name: Name) -> Self {
        Self {
            name,
            can_be_prefix: false,
            must_be_fresh: false,
            forwarding_hint: None,
            nonce: None,
            lifetime: None,
            hop_limit: None,
            app_param: None,
            sig_info: None,
            sig_value: None,
        }
    }

    pub fn with_can_be_prefix(mut self, value: bool) -> Self {
        self.can_be_prefix = value;
        self
    }

    pub fn with_must_be_fresh(mut self, value: bool) -> Self {
        self.must_be_fresh = value;
        self
    }

    pub fn with_nonce(mut self, nonce: u32) -> Self {
        self.nonce = Some(nonce);
        self
    }

    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = Some(lifetime);
        self
    }

    pub fn with_app_param(mut self, app_param: Wire) -> Self {
        self.app_param = Some(app_param);
        self
    }

    /// Lifetime to use when arming timers.
    pub fn lifetime_or_default(&self) -> Duration {
        self.lifetime.unwrap_or(DEFAULT_INTEREST_LIFETIME)
    }

    /// Encode without an Interest signature.
    pub fn encode(&self) -> Result<EncodedInterest> {
        self.encode_impl(None)
    }

    /// Encode as a signed Interest. An absent ApplicationParameters
    /// field is treated as empty, as signed Interests require one.
    pub fn encode_signed(&self, signer: &dyn Signer) -> Result<EncodedInterest> {
        self.encode_impl(Some(signer))
    }

    fn encode_impl(&self, signer: Option<&dyn Signer>) -> Result<EncodedInterest> {
        // The parameters digest is recomputed below; drop a stale one.
        let mut name = self.name.clone();
        if matches!(name.components().last(), Some(c) if c.typ == Component::PARAMETERS_SHA256_DIGEST)
        {
            name.pop();
        }

        let mut mid = BytesMut::new();
        if self.can_be_prefix {
            tlv::encode_tlv(tlv::TYPE_CAN_BE_PREFIX, &[], &mut mid);
        }
        if self.must_be_fresh {
            tlv::encode_tlv(tlv::TYPE_MUST_BE_FRESH, &[], &mut mid);
        }
        if let Some(hint) = &self.forwarding_hint {
            tlv::encode_tlv(tlv::TYPE_FORWARDING_HINT, &hint.join(), &mut mid);
        }
        if let Some(nonce) = self.nonce {
            tlv::encode_tlv(tlv::TYPE_NONCE, &nonce.to_be_bytes(), &mut mid);
        }
        if let Some(lifetime) = self.lifetime {
            tlv::encode_tlv(
                tlv::TYPE_INTEREST_LIFETIME,
                &tlv::nat_bytes(lifetime.as_millis() as u64),
                &mut mid,
            );
        }
        if let Some(hop_limit) = self.hop_limit {
            tlv::encode_tlv(tlv::TYPE_HOP_LIMIT, &[hop_limit], &mut mid);
        }

        let mut sig_covered = Wire::new();
        let mut tail_parts: Vec<Bytes> = Vec::new();
        if self.app_param.is_some() || signer.is_some() {
            let app = self.app_param.clone().unwrap_or_default();
            let mut head = BytesMut::new();
            tlv::encode_tlv(tlv::TYPE_APP_PARAMETERS, &app.join(), &mut head);
            if let Some(signer) = signer {
                signer
                    .sig_info()
                    .encode_as(tlv::TYPE_INTEREST_SIG_INFO, &mut head);
            }
            let head = head.freeze();

            let mut sig_tail = BytesMut::new();
            if let Some(signer) = signer {
                let covered =
                    Wire::from_segments(vec![name.to_value_bytes(), head.clone()]);
                let sig = signer.sign(&covered)?;
                tlv::encode_tlv(tlv::TYPE_INTEREST_SIG_VALUE, &sig, &mut sig_tail);
                sig_covered = covered;
            }
            let sig_tail = sig_tail.freeze();

            let mut hasher = Sha256::new();
            hasher.update(&head);
            hasher.update(&sig_tail);
            name.push(Component::params_digest(hasher.finalize().into()));

            tail_parts.push(head);
            if !sig_tail.is_empty() {
                tail_parts.push(sig_tail);
            }
        }

        let name_bytes = name.to_bytes();
        let mid = mid.freeze();
        let inner_len =
            name_bytes.len() + mid.len() + tail_parts.iter().map(Bytes::len).sum::<usize>();
        let mut head = BytesMut::new();
        TlNum(tlv::TYPE_INTEREST).encode(&mut head);
        TlNum(inner_len as u64).encode(&mut head);

        let mut segments = vec![head.freeze(), name_bytes];
        if !mid.is_empty() {
            segments.push(mid);
        }
        segments.extend(tail_parts);

        Ok(EncodedInterest {
            wire: Wire::from_segments(segments),
            sig_covered,
            name,
        })
    }

    /// Decode from a frame wire. Verifies the parameters digest when
    /// ApplicationParameters is present.
    pub fn decode(wire: &Wire) -> Result<DecodedInterest> {
        let mut outer = ParseReader::new(wire);
        let (typ, len) = tlv::read_header(&mut outer)?;
        if typ != tlv::TYPE_INTEREST {
            return Err(Error::Format(format!(
                "expected Interest TLV type {}, got {typ}",
                tlv::TYPE_INTEREST
            )));
        }
        let mut r = outer.delegate(len)?;

        let (t, l) = tlv::read_header(&mut r)?;
        if t != tlv::TYPE_NAME {
            return Err(Error::SkipRequired {
                typ: tlv::TYPE_NAME,
            });
        }
        let name_start = r.pos();
        let mut name_reader = r.delegate(l)?;
        let name =
            Name::parse_value(&mut name_reader).map_err(|e| e.in_field(tlv::TYPE_NAME))?;
        let name_end = r.pos();
        let digest_len = name
            .components()
            .last()
            .filter(|c| c.typ == Component::PARAMETERS_SHA256_DIGEST)
            .map(Component::encoded_len)
            .unwrap_or(0);
        let name_covered_end = name_end - digest_len;

        let mut interest = Interest::new(name);
        let mut app_start = None;
        let mut sig_info_end = None;
        while r.remaining() > 0 {
            let field_start = r.pos();
            let (typ, len) = tlv::read_header(&mut r)?;
            match typ {
                tlv::TYPE_CAN_BE_PREFIX => {
                    r.skip(len)?;
                    interest.can_be_prefix = true;
                }
                tlv::TYPE_MUST_BE_FRESH => {
                    r.skip(len)?;
                    interest.must_be_fresh = true;
                }
                tlv::TYPE_FORWARDING_HINT => {
                    interest.forwarding_hint = Some(r.read_wire(len)?);
                }
                tlv::TYPE_NONCE => {
                    let raw = r.read(len)?;
                    let nonce: [u8; 4] = raw[..]
                        .try_into()
                        .map_err(|_| Error::Format("nonce must be 4 bytes".into()).in_field(typ))?;
                    interest.nonce = Some(u32::from_be_bytes(nonce));
                }
                tlv::TYPE_INTEREST_LIFETIME => {
                    let raw = r.read(len)?;
                    let ms = tlv::parse_nat(&raw).map_err(|e| e.in_field(typ))?;
                    interest.lifetime = Some(Duration::from_millis(ms));
                }
                tlv::TYPE_HOP_LIMIT => {
                    let raw = r.read(len)?;
                    if raw.len() != 1 {
                        return Err(Error::Format("hop limit must be 1 byte".into()).in_field(typ));
                    }
                    interest.hop_limit = Some(raw[0]);
                }
                tlv::TYPE_APP_PARAMETERS => {
                    app_start = Some(field_start);
                    interest.app_param = Some(r.read_wire(len)?);
                }
                tlv::TYPE_INTEREST_SIG_INFO => {
                    let mut inner = r.delegate(len)?;
                    interest.sig_info = Some(
                        SignatureInfo::parse_value(&mut inner).map_err(|e| e.in_field(typ))?,
                    );
                    sig_info_end = Some(r.pos());
                }
                tlv::TYPE_INTEREST_SIG_VALUE => {
                    interest.sig_value = Some(r.read(len)?);
                }
                other => tlv::skip_unrecognized(&mut r, other, len)?,
            }
        }

        match (&interest.app_param, app_start) {
            (Some(_), Some(app_start)) => {
                let digest = interest
                    .name
                    .components()
                    .last()
                    .filter(|c| c.typ == Component::PARAMETERS_SHA256_DIGEST)
                    .ok_or(Error::IncorrectDigest)?;
                let computed = sha256_wire(&r.range(app_start, r.length()));
                if computed[..] != digest.value[..] {
                    return Err(Error::IncorrectDigest);
                }
            }
            _ => {
                if digest_len != 0 {
                    // A parameters digest without parameters is bogus.
                    return Err(Error::IncorrectDigest);
                }
            }
        }

        let sig_covered = match (app_start, sig_info_end) {
            (Some(app_start), Some(sig_info_end)) => {
                let mut covered = r.range(name_start, name_covered_end);
                covered.extend(r.range(app_start, sig_info_end));
                covered
            }
            _ => Wire::new(),
        };

        Ok(DecodedInterest {
            interest,
            sig_covered,
        })
    }
}

/// Result of encoding an Interest: the wire, the signed portion, and
/// the final name including any parameters digest component.
pub struct EncodedInterest {
    pub wire: Wire,
    pub sig_covered: Wire,
    pub name: Name,
}

/// Result of decoding an Interest.
#[derive(Debug, Clone)]
pub struct DecodedInterest {
    pub interest: Interest,
    pub sig_covered: Wire,
}

/* ---------------------------------------------------------------- *
 * Data
 * ---------------------------------------------------------------- */

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Data {
    pub name: Name,
    pub meta_info: MetaInfo,
    pub content: Option<Wire>,
    pub sig_info: Option<SignatureInfo>,
    pub sig_value: Option<Bytes>,
}

impl Data {
    pub fn new(name: Name) -> Self {
        Self {
            name,
            meta_info: MetaInfo::default(),
            content: None,
            sig_info: None,
            sig_value: None,
        }
    }

    pub fn with_content(mut self, content: Wire) -> Self {
        self.content = Some(content);
        self
    }

    pub fn with_freshness(mut self, freshness: Duration) -> Self {
        self.meta_info.freshness_period = Some(freshness);
        self
    }

    pub fn with_content_type(mut self, content_type: u64) -> Self {
        self.meta_info.content_type = Some(content_type);
        self
    }

    /// Encode and sign; the signature covers Name through SignatureInfo.
    pub fn encode_signed(&self, signer: &dyn Signer) -> Result<EncodedData> {
        let mut body = BytesMut::new();
        self.name.encode(&mut body);
        self.meta_info.encode(&mut body);
        if let Some(content) = &self.content {
            tlv::encode_tlv(tlv::TYPE_CONTENT, &content.join(), &mut body);
        }
        signer
            .sig_info()
            .encode_as(tlv::TYPE_DATA_SIG_INFO, &mut body);
        let body = body.freeze();

        let sig_covered = Wire::from(body.clone());
        let sig = signer.sign(&sig_covered)?;
        let mut sig_buf = BytesMut::new();
        tlv::encode_tlv(tlv::TYPE_DATA_SIG_VALUE, &sig, &mut sig_buf);
        let sig_buf = sig_buf.freeze();

        let mut head = BytesMut::new();
        TlNum(tlv::TYPE_DATA).encode(&mut head);
        TlNum((body.len() + sig_buf.len()) as u64).encode(&mut head);

        Ok(EncodedData {
            wire: Wire::from_segments(vec![head.freeze(), body, sig_buf]),
            sig_covered,
        })
    }

    /// Decode from a frame wire.
    pub fn decode(wire: &Wire) -> Result<DecodedData> {
        let mut outer = ParseReader::new(wire);
        let (typ, len) = tlv::read_header(&mut outer)?;
        if typ != tlv::TYPE_DATA {
            return Err(Error::Format(format!(
                "expected Data TLV type {}, got {typ}",
                tlv::TYPE_DATA
            )));
        }
        let mut r = outer.delegate(len)?;

        let covered_start = r.pos();
        let (t, l) = tlv::read_header(&mut r)?;
        if t != tlv::TYPE_NAME {
            return Err(Error::SkipRequired {
                typ: tlv::TYPE_NAME,
            });
        }
        let mut name_reader = r.delegate(l)?;
        let name =
            Name::parse_value(&mut name_reader).map_err(|e| e.in_field(tlv::TYPE_NAME))?;

        let mut data = Data::new(name);
        let mut sig_info_end = None;
        while r.remaining() > 0 {
            let (typ, len) = tlv::read_header(&mut r)?;
            match typ {
                tlv::TYPE_META_INFO => {
                    let mut inner = r.delegate(len)?;
                    data.meta_info =
                        MetaInfo::parse_value(&mut inner).map_err(|e| e.in_field(typ))?;
                }
                tlv::TYPE_CONTENT => {
                    data.content = Some(r.read_wire(len)?);
                }
                tlv::TYPE_DATA_SIG_INFO => {
                    let mut inner = r.delegate(len)?;
                    data.sig_info = Some(
                        SignatureInfo::parse_value(&mut inner).map_err(|e| e.in_field(typ))?,
                    );
                    sig_info_end = Some(r.pos());
                }
                tlv::TYPE_DATA_SIG_VALUE => {
                    data.sig_value = Some(r.read(len)?);
                }
                other => tlv::skip_unrecognized(&mut r, other, len)?,
            }
        }

        let sig_info_end = sig_info_end.ok_or(Error::SkipRequired {
            typ: tlv::TYPE_DATA_SIG_INFO,
        })?;
        Ok(DecodedData {
            sig_covered: r.range(covered_start, sig_info_end),
            data,
        })
    }
}

/// Result of encoding a Data packet.
pub struct EncodedData {
    pub wire: Wire,
    pub sig_covered: Wire,
}

/// Result of decoding a Data packet.
#[derive(Debug, Clone)]
pub struct DecodedData {
    pub data: Data,
    pub sig_covered: Wire,
}

/* ---------------------------------------------------------------- *
 * Frames
 * ---------------------------------------------------------------- */

/// NDNLPv2 Nack reasons.
pub mod nack_reason {
    pub const CONGESTION: u64 = 50;
    pub const DUPLICATE: u64 = 100;
    pub const NO_ROUTE: u64 = 150;
    pub const UNSPECIFIED: u64 = 0;
}

/// One packet as read from a face.
pub enum Frame {
    Interest(DecodedInterest),
    Data(DecodedData),
    /// A network Nack carrying the rejected Interest.
    Nack {
        reason: u64,
        interest: DecodedInterest,
    },
}

impl Frame {
    /// Decode a frame, dispatching on the outer TLV type.
    pub fn decode(wire: &Wire) -> Result<Frame> {
        let mut reader = ParseReader::new(wire);
        let (typ, len) = tlv::read_header(&mut reader)?;
        match typ {
            tlv::TYPE_INTEREST => Interest::decode(wire).map(Frame::Interest),
            tlv::TYPE_DATA => Data::decode(wire).map(Frame::Data),
            tlv::TYPE_LP_PACKET => {
                let mut r = reader.delegate(len)?;
                Self::decode_lp(&mut r)
            }
            other => Err(Error::Format(format!("unknown frame type {other}"))),
        }
    }

    /// Parse the NDNLPv2 subset: a Nack header plus the fragment
    /// holding the nacked Interest. Link-layer headers are hop-by-hop;
    /// unknown ones are skipped rather than treated as critical.
    fn decode_lp(reader: &mut ParseReader<'_>) -> Result<Frame> {
        let mut reason = None;
        let mut fragment = None;
        while reader.remaining() > 0 {
            let (typ, len) = tlv::read_header(reader)?;
            match typ {
                tlv::TYPE_LP_NACK => {
                    let mut inner = reader.delegate(len)?;
                    let mut r = nack_reason::UNSPECIFIED;
                    while inner.remaining() > 0 {
                        let (ityp, ilen) = tlv::read_header(&mut inner)?;
                        if ityp == tlv::TYPE_LP_NACK_REASON {
                            let raw = inner.read(ilen)?;
                            r = tlv::parse_nat(&raw).map_err(|e| e.in_field(ityp))?;
                        } else {
                            inner.skip(ilen)?;
                        }
                    }
                    reason = Some(r);
                }
                tlv::TYPE_LP_FRAGMENT => {
                    fragment = Some(reader.read_wire(len)?);
                }
                _ => reader.skip(len)?,
            }
        }
        let reason = reason.ok_or(Error::SkipRequired {
            typ: tlv::TYPE_LP_NACK,
        })?;
        let fragment = fragment.ok_or(Error::SkipRequired {
            typ: tlv::TYPE_LP_FRAGMENT,
        })?;
        let interest = Interest::decode(&fragment)?;
        Ok(Frame::Nack { reason, interest })
    }

    /// Encode a Nack frame for the given encoded Interest.
    pub fn encode_nack(interest_wire: &Wire, reason: u64) -> Wire {
        let mut headers = BytesMut::new();
        let mut nack_val = BytesMut::new();
        tlv::encode_tlv(
            tlv::TYPE_LP_NACK_REASON,
            &tlv::nat_bytes(reason),
            &mut nack_val,
        );
        tlv::encode_tlv(tlv::TYPE_LP_NACK, &nack_val, &mut headers);
        TlNum(tlv::TYPE_LP_FRAGMENT).encode(&mut headers);
        TlNum(interest_wire.len() as u64).encode(&mut headers);
        let headers = headers.freeze();

        let mut head = BytesMut::new();
        TlNum(tlv::TYPE_LP_PACKET).encode(&mut head);
        TlNum((headers.len() + interest_wire.len()) as u64).encode(&mut head);

        let mut segments = vec![head.freeze(), headers];
        segments.extend(interest_wire.segments().iter().cloned());
        Wire::from_segments(segments)
    }
}

#[cfg(test)]
mod tests;

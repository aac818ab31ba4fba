//! NFD local management: prefix registration commands.
//!
//! A registration is a signed command Interest under
//! `/localhost/nfd/rib/{register,unregister}` carrying a
//! ControlParameters component; the forwarder answers with a Data packet
//! holding a ControlResponse whose status code 200 means success.

use bytes::BytesMut;
use rust_ndn_common::error::Error;
use rust_ndn_common::name::{Component, Name};
use rust_ndn_common::packet::Data;
use rust_ndn_common::tlv::{self, TlNum};
use rust_ndn_common::wire::ParseReader;
use rust_ndn_common::Result;

/// Outcome of a management command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlResponse {
    pub status_code: u64,
    pub status_text: String,
}

impl ControlResponse {
    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }
}

/// Build the name of a RIB command Interest for the given prefix.
pub fn rib_command_name(verb: &str, prefix: &Name) -> Name {
    let mut params = BytesMut::new();
    let mut name_buf = BytesMut::new();
    prefix.encode(&mut name_buf);
    tlv::encode_tlv(tlv::TYPE_CONTROL_PARAMETERS, &name_buf, &mut params);

    Name::new()
        .appended(Component::generic(&b"localhost"[..]))
        .appended(Component::generic(&b"nfd"[..]))
        .appended(Component::generic(&b"rib"[..]))
        .appended(Component::generic(verb.as_bytes().to_vec()))
        .appended(Component::generic(params.freeze()))
}

/// Parse the ControlResponse out of a command reply.
pub fn parse_control_response(data: &Data) -> Result<ControlResponse> {
    let content = data
        .content
        .as_ref()
        .ok_or_else(|| Error::Format("control response without content".into()))?;
    let mut reader = ParseReader::new(content);

    let (typ, len) = tlv::read_header(&mut reader)?;
    if typ != tlv::TYPE_CONTROL_RESPONSE {
        return Err(Error::Format(format!(
            "expected ControlResponse TLV, got {typ}"
        )));
    }
    let mut r = reader.delegate(len)?;

    let mut status_code = None;
    let mut status_text = String::new();
    while r.remaining() > 0 {
        let (typ, len) = tlv::read_header(&mut r)?;
        match typ {
            tlv::TYPE_STATUS_CODE => {
                let raw = r.read(len)?;
                status_code = Some(tlv::parse_nat(&raw).map_err(|e| e.in_field(typ))?);
            }
            tlv::TYPE_STATUS_TEXT => {
                let raw = r.read(len)?;
                status_text = String::from_utf8_lossy(&raw).into_owned();
            }
            other => tlv::skip_unrecognized(&mut r, other, len)?,
        }
    }

    let status_code = status_code.ok_or(Error::SkipRequired {
        typ: tlv::TYPE_STATUS_CODE,
    })?;
    Ok(ControlResponse {
        status_code,
        status_text,
    })
}

/// Encode a ControlResponse; used by tests standing in for a forwarder.
pub fn encode_control_response(response: &ControlResponse) -> bytes::Bytes {
    let mut inner = BytesMut::new();
    tlv::encode_tlv(
        tlv::TYPE_STATUS_CODE,
        &tlv::nat_bytes(response.status_code),
        &mut inner,
    );
    tlv::encode_tlv(
        tlv::TYPE_STATUS_TEXT,
        response.status_text.as_bytes(),
        &mut inner,
    );

    let mut out = BytesMut::new();
    TlNum(tlv::TYPE_CONTROL_RESPONSE).encode(&mut out);
    TlNum(inner.len() as u64).encode(&mut out);
    out.extend_from_slice(&inner);
    out.freeze()
}

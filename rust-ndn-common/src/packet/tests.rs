//! Unit tests for the packet layer.

use super::*;
use crate::security::sha256_wire;

struct TestDigestSigner;

impl Signer for TestDigestSigner {
    fn sig_info(&self) -> SignatureInfo {
        SignatureInfo::new(SigType::DigestSha256)
    }

    fn estimated_size(&self) -> usize {
        32
    }

    fn sign(&self, covered: &Wire) -> Result<Bytes> {
        Ok(Bytes::copy_from_slice(&sha256_wire(covered)))
    }
}

fn digest_checks_out(sig_covered: &Wire, sig_value: &Bytes) -> bool {
    sha256_wire(sig_covered)[..] == sig_value[..]
}

#[test]
fn interest_roundtrip() {
    let interest = Interest::new("/test/interest".parse().unwrap())
        .with_can_be_prefix(true)
        .with_must_be_fresh(true)
        .with_nonce(42)
        .with_lifetime(Duration::from_millis(4000));

    let encoded = interest.encode().unwrap();
    let decoded = Interest::decode(&encoded.wire).unwrap().interest;

    assert_eq!(decoded.name, interest.name);
    assert!(decoded.can_be_prefix);
    assert!(decoded.must_be_fresh);
    assert_eq!(decoded.nonce, Some(42));
    assert_eq!(decoded.lifetime, Some(Duration::from_millis(4000)));
    assert_eq!(decoded.app_param, None);
}

#[test]
fn interest_defaults_stay_off_the_wire() {
    let interest = Interest::new("/a".parse().unwrap());
    let encoded = interest.encode().unwrap();
    let decoded = Interest::decode(&encoded.wire).unwrap().interest;
    assert!(!decoded.can_be_prefix);
    assert!(!decoded.must_be_fresh);
    assert_eq!(decoded.nonce, None);
    assert_eq!(decoded.lifetime, None);
    assert_eq!(decoded.lifetime_or_default(), DEFAULT_INTEREST_LIFETIME);
}

#[test]
fn data_roundtrip() {
    let data = Data::new("/test/data".parse().unwrap())
        .with_content(Wire::from(&b"Hello, NDN!"[..]))
        .with_content_type(content_type::BLOB)
        .with_freshness(Duration::from_secs(10));

    let encoded = data.encode_signed(&TestDigestSigner).unwrap();
    let decoded = Data::decode(&encoded.wire).unwrap();

    assert_eq!(decoded.data.name, data.name);
    assert_eq!(decoded.data.content, data.content);
    assert_eq!(decoded.data.meta_info, data.meta_info);
    assert_eq!(
        decoded.data.sig_info.as_ref().unwrap().sig_type,
        SigType::DigestSha256
    );
    assert_eq!(decoded.sig_covered, encoded.sig_covered);
    assert!(digest_checks_out(
        &decoded.sig_covered,
        decoded.data.sig_value.as_ref().unwrap()
    ));
}

#[test]
fn signature_covers_exactly_the_signed_portion() {
    let data = Data::new("/cover/check".parse().unwrap())
        .with_content(Wire::from(&b"payload"[..]))
        .with_freshness(Duration::from_secs(1));
    let encoded = data.encode_signed(&TestDigestSigner).unwrap();
    let clean = encoded.wire.join();

    // Every byte of the packet except the outer header participates in
    // the check: flipping a covered byte or a signature byte must break
    // validation (or parsing outright).
    let covered_len = encoded.sig_covered.len();
    let outer_header = clean.len() - covered_len - sig_value_tlv_len();
    for i in outer_header..clean.len() {
        let mut mutated = clean.to_vec();
        mutated[i] ^= 0x01;
        let wire = Wire::from(mutated);
        match Data::decode(&wire) {
            Ok(decoded) => match decoded.data.sig_value {
                Some(sig) => assert!(
                    !digest_checks_out(&decoded.sig_covered, &sig),
                    "flipping byte {i} went undetected"
                ),
                None => {} // the signature field itself was destroyed
            },
            Err(_) => {} // structural damage is also a rejection
        }
    }

    // The untouched packet still validates.
    let decoded = Data::decode(&encoded.wire).unwrap();
    assert!(digest_checks_out(
        &decoded.sig_covered,
        decoded.data.sig_value.as_ref().unwrap()
    ));
}

fn sig_value_tlv_len() -> usize {
    2 + 32 // type + length + sha256
}

#[test]
fn signed_interest_roundtrip_and_digest() {
    let interest = Interest::new("/cmd/do".parse().unwrap())
        .with_app_param(Wire::from(&b"params"[..]))
        .with_nonce(7);
    let encoded = interest.encode_signed(&TestDigestSigner).unwrap();

    // The final name gained a parameters digest component.
    let last = encoded.name.components().last().unwrap();
    assert_eq!(last.typ, Component::PARAMETERS_SHA256_DIGEST);

    let decoded = Interest::decode(&encoded.wire).unwrap();
    assert_eq!(decoded.interest.app_param, interest.app_param);
    assert!(decoded.interest.sig_info.is_some());
    assert!(digest_checks_out(
        &decoded.sig_covered,
        decoded.interest.sig_value.as_ref().unwrap()
    ));
    assert_eq!(decoded.sig_covered, encoded.sig_covered);
}

#[test]
fn parameters_digest_mismatch_rejected() {
    let interest = Interest::new("/cmd/do".parse().unwrap())
        .with_app_param(Wire::from(&b"params"[..]));
    let encoded = interest.encode().unwrap();
    let clean = encoded.wire.join();

    // Find the digest component bytes and flip one bit.
    let digest = &encoded.name.components().last().unwrap().value;
    let pos = clean
        .windows(digest.len())
        .position(|w| w == &digest[..])
        .unwrap();
    let mut mutated = clean.to_vec();
    mutated[pos] ^= 0x01;

    let err = Interest::decode(&Wire::from(mutated)).unwrap_err();
    assert!(matches!(err, Error::IncorrectDigest));
}

#[test]
fn unrecognized_critical_field_rejected() {
    // Hand-build an Interest carrying an unknown type-1000 TLV.
    let name: Name = "/a/b".parse().unwrap();
    let mut inner = BytesMut::new();
    name.encode(&mut inner);
    tlv::encode_tlv(1000, b"??", &mut inner);

    let mut frame = BytesMut::new();
    TlNum(tlv::TYPE_INTEREST).encode(&mut frame);
    TlNum(inner.len() as u64).encode(&mut frame);
    frame.extend_from_slice(&inner);

    let err = Interest::decode(&Wire::from(frame.freeze())).unwrap_err();
    assert!(matches!(err, Error::UnrecognizedField { typ: 1000 }));
}

#[test]
fn unrecognized_noncritical_field_skipped() {
    let name: Name = "/a/b".parse().unwrap();
    let mut inner = BytesMut::new();
    name.encode(&mut inner);
    tlv::encode_tlv(0x1F, b"ignore me", &mut inner);

    let mut frame = BytesMut::new();
    TlNum(tlv::TYPE_INTEREST).encode(&mut frame);
    TlNum(inner.len() as u64).encode(&mut frame);
    frame.extend_from_slice(&inner);

    let decoded = Interest::decode(&Wire::from(frame.freeze())).unwrap();
    assert_eq!(decoded.interest.name, name);
}

#[test]
fn missing_name_reported_as_required() {
    let mut frame = BytesMut::new();
    TlNum(tlv::TYPE_INTEREST).encode(&mut frame);
    let mut inner = BytesMut::new();
    tlv::encode_tlv(tlv::TYPE_NONCE, &7u32.to_be_bytes(), &mut inner);
    TlNum(inner.len() as u64).encode(&mut frame);
    frame.extend_from_slice(&inner);

    let err = Interest::decode(&Wire::from(frame.freeze())).unwrap_err();
    assert!(matches!(
        err,
        Error::SkipRequired {
            typ: tlv::TYPE_NAME
        }
    ));
}

#[test]
fn truncated_packet_overflows() {
    let interest = Interest::new("/t".parse().unwrap()).with_nonce(1);
    let clean = interest.encode().unwrap().wire.join();
    let truncated = Wire::from(clean.slice(..clean.len() - 2));
    assert!(Interest::decode(&truncated).is_err());
}

#[test]
fn nack_frame_roundtrip() {
    let interest = Interest::new("/no/route".parse().unwrap()).with_nonce(3);
    let encoded = interest.encode().unwrap();
    let nack = Frame::encode_nack(&encoded.wire, nack_reason::NO_ROUTE);

    match Frame::decode(&nack).unwrap() {
        Frame::Nack { reason, interest } => {
            assert_eq!(reason, nack_reason::NO_ROUTE);
            assert_eq!(interest.interest.name, "/no/route".parse().unwrap());
        }
        _ => panic!("expected a nack frame"),
    }
}

#[test]
fn frame_dispatch() {
    let interest = Interest::new("/x".parse().unwrap()).encode().unwrap();
    assert!(matches!(
        Frame::decode(&interest.wire).unwrap(),
        Frame::Interest(_)
    ));

    let data = Data::new("/x".parse().unwrap())
        .encode_signed(&TestDigestSigner)
        .unwrap();
    assert!(matches!(Frame::decode(&data.wire).unwrap(), Frame::Data(_)));

    let bogus = Wire::from(vec![0x42, 0x00]);
    assert!(Frame::decode(&bogus).is_err());
}

//! Concrete signers and signature validators.

use bytes::Bytes;
use hmac::{Hmac, Mac};
use rust_ndn_common::error::Error;
use rust_ndn_common::name::Name;
use rust_ndn_common::packet::{SigType, SignatureInfo};
use rust_ndn_common::security::{sha256_wire, Signer};
use rust_ndn_common::wire::Wire;
use rust_ndn_common::Result;
use sha2::Sha256;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

/* ---------------------------------------------------------------- *
 * Signers
 * ---------------------------------------------------------------- */

/// DigestSha256: the signature value is the SHA-256 of the covered
/// portion, with no key locator.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Signer;

impl Signer for Sha256Signer {
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

/// HMAC-SHA-256 with a fixed key; the key locator names the signing key.
#[derive(Clone)]
pub struct HmacSigner {
    key: Bytes,
    key_name: Name,
}

impl HmacSigner {
    pub fn new(key: impl Into<Bytes>, key_name: Name) -> Self {
        Self {
            key: key.into(),
            key_name,
        }
    }
}

impl Signer for HmacSigner {
    fn sig_info(&self) -> SignatureInfo {
        SignatureInfo::new(SigType::HmacWithSha256).with_key_name(self.key_name.clone())
    }

    fn estimated_size(&self) -> usize {
        32
    }

    fn sign(&self, covered: &Wire) -> Result<Bytes> {
        let mut mac = HmacSha256::new_from_slice(&self.key)
            .map_err(|e| Error::Signing(format!("bad hmac key: {e}")))?;
        for seg in covered.segments() {
            mac.update(seg);
        }
        Ok(Bytes::from(mac.finalize().into_bytes().to_vec()))
    }
}

/* ---------------------------------------------------------------- *
 * Validators
 * ---------------------------------------------------------------- */

/// Decides whether a received packet's signature is acceptable.
pub type Validator =
    Arc<dyn Fn(&Name, &Wire, Option<&SignatureInfo>, Option<&Bytes>) -> bool + Send + Sync>;

/// Verify an HMAC-SHA-256 signature over the covered portion.
pub fn verify_hmac(key: &[u8], covered: &Wire, sig: &[u8]) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        return false;
    };
    for seg in covered.segments() {
        mac.update(seg);
    }
    mac.verify_slice(sig).is_ok()
}

/// Verify a DigestSha256 signature over the covered portion.
pub fn verify_digest(covered: &Wire, sig: &[u8]) -> bool {
    sha256_wire(covered)[..] == sig[..]
}

/// Accept everything; for tests and trusted local faces.
pub fn pass_all() -> Validator {
    Arc::new(|_, _, _, _| true)
}

/// Accept only verifiable DigestSha256 signatures.
pub fn digest_validator() -> Validator {
    Arc::new(|_, covered, info, value| match (info, value) {
        (Some(info), Some(value)) if info.sig_type == SigType::DigestSha256 => {
            verify_digest(covered, value)
        }
        _ => false,
    })
}

/// Accept DigestSha256 and HMAC signatures made with the given key.
pub fn hmac_validator(key: impl Into<Bytes>) -> Validator {
    let key = key.into();
    Arc::new(move |_, covered, info, value| match (info, value) {
        (Some(info), Some(value)) => match info.sig_type {
            SigType::DigestSha256 => verify_digest(covered, value),
            SigType::HmacWithSha256 => verify_hmac(&key, covered, value),
            _ => false,
        },
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_signer_verifies() {
        let covered = Wire::from(&b"signed bytes"[..]);
        let sig = Sha256Signer.sign(&covered).unwrap();
        assert!(verify_digest(&covered, &sig));
        assert!(!verify_digest(&Wire::from(&b"other bytes"[..]), &sig));
    }

    #[test]
    fn hmac_signer_verifies_with_same_key_only() {
        let key_name: Name = "/keys/app".parse().unwrap();
        let signer = HmacSigner::new(&b"Hello, World!"[..], key_name.clone());
        let covered = Wire::from(&b"signed bytes"[..]);
        let sig = signer.sign(&covered).unwrap();

        assert!(verify_hmac(b"Hello, World!", &covered, &sig));
        assert!(!verify_hmac(b"other key", &covered, &sig));

        let info = signer.sig_info();
        assert_eq!(info.sig_type, SigType::HmacWithSha256);
        assert_eq!(
            info.key_locator,
            Some(rust_ndn_common::packet::KeyLocator::Name(key_name))
        );
    }

    #[test]
    fn validators_dispatch_on_sig_type() {
        let covered = Wire::from(&b"abc"[..]);
        let sig = Sha256Signer.sign(&covered).unwrap();
        let name: Name = "/n".parse().unwrap();
        let info = SignatureInfo::new(SigType::DigestSha256);

        let v = digest_validator();
        assert!(v(&name, &covered, Some(&info), Some(&sig)));
        assert!(!v(&name, &covered, None, None));

        let hv = hmac_validator(&b"k"[..]);
        assert!(hv(&name, &covered, Some(&info), Some(&sig)));
    }
}

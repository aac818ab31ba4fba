//! Signing interfaces consumed by the packet codec.
//!
//! Concrete signers (SHA-256 digest, HMAC) live in the engine crate;
//! the codec only needs a way to obtain signature metadata and a
//! signature over the covered portion.

use crate::packet::SignatureInfo;
use crate::wire::Wire;
use crate::Result;
use bytes::Bytes;
use sha2::{Digest, Sha256};

/// Produces signatures over the signed portion of a packet.
pub trait Signer: Send + Sync {
    /// Signature metadata to embed in the packet before signing.
    fn sig_info(&self) -> SignatureInfo;

    /// Upper bound of the signature value length, for buffer sizing.
    fn estimated_size(&self) -> usize;

    /// Sign the covered portion.
    fn sign(&self, covered: &Wire) -> Result<Bytes>;
}

/// SHA-256 over a wire without materialising it.
pub fn sha256_wire(wire: &Wire) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for seg in wire.segments() {
        hasher.update(seg);
    }
    hasher.finalize().into()
}

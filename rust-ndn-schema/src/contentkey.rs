//! Content keys: AES-256-GCM payload encryption with named keys.
//!
//! A content-key node generates random keys addressed by an 8-byte key
//! id and serves the raw key bytes from a distribution leaf at
//! `<node>/<key-id>`, signed per the signer policy active there.
//! Encrypted payloads carry (key id, IV, ciphertext) as TLVs so a
//! consumer can learn which key to fetch before decrypting.

use crate::event::EventCallback;
use bytes::{Bytes, BytesMut};
use log::{debug, warn};
use rand::Rng;
use ring::aead;
use rust_ndn_common::error::Error;
use rust_ndn_common::tlv;
use rust_ndn_common::wire::{ParseReader, Wire};
use rust_ndn_common::Result;
use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex};

/// Pattern tag of the key-distribution leaf's key-id slot.
pub const KEY_ID_TAG: &str = "key-id";

pub const KEY_LEN: usize = 32;
pub const KEY_ID_LEN: usize = 8;
pub const IV_LEN: usize = 12;

/// TLV types of the encrypted-content structure.
pub const TYPE_KEY_ID: u64 = 0x81;
pub const TYPE_INITIAL_VECTOR: u64 = 0x82;
pub const TYPE_CIPHER_TEXT: u64 = 0x83;

/// Keys generated under one content-key node, shared with its
/// key-distribution leaf.
#[derive(Default, Clone)]
pub struct ContentKeyState {
    pub(crate) keys: Arc<Mutex<HashMap<Bytes, Bytes>>>,
}

impl ContentKeyState {
    /// Generate and retain a fresh key, returning its id.
    pub(crate) fn generate(&self) -> Bytes {
        let mut rng = rand::thread_rng();
        let mut id = [0u8; KEY_ID_LEN];
        rng.fill(&mut id);
        let mut key = [0u8; KEY_LEN];
        rng.fill(&mut key);
        let id = Bytes::copy_from_slice(&id);
        self.keys
            .lock()
            .unwrap()
            .insert(id.clone(), Bytes::copy_from_slice(&key));
        id
    }

    pub(crate) fn key(&self, id: &[u8]) -> Option<Bytes> {
        self.keys.lock().unwrap().get(id).cloned()
    }
}

/// The `on_interest` callback of the key-distribution leaf: serve the
/// requested key's raw bytes, signed per the active signer policy.
pub(crate) fn key_service_callback(state: ContentKeyState) -> EventCallback {
    Arc::new(move |event| {
        let Some(id) = event.binding(KEY_ID_TAG) else {
            return ControlFlow::Continue(());
        };
        let Some(key) = state.key(id) else {
            debug!("unknown content key requested at {}", event.name);
            return ControlFlow::Continue(());
        };
        match event.provide(Wire::from(key)) {
            Ok(wire) => {
                if let Err(e) = event.reply(wire) {
                    warn!("failed to reply with content key: {e}");
                }
                ControlFlow::Break(())
            }
            Err(e) => {
                warn!("failed to provide content key: {e}");
                ControlFlow::Continue(())
            }
        }
    })
}

/* ---------------------------------------------------------------- *
 * Encrypted content
 * ---------------------------------------------------------------- */

/// The wire form of an encrypted payload: which key, which IV, and the
/// AEAD ciphertext (tag included).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedContent {
    pub key_id: Bytes,
    pub iv: Bytes,
    pub ciphertext: Bytes,
}

impl EncryptedContent {
    pub fn encode(&self) -> Wire {
        let mut buf = BytesMut::new();
        tlv::encode_tlv(TYPE_KEY_ID, &self.key_id, &mut buf);
        tlv::encode_tlv(TYPE_INITIAL_VECTOR, &self.iv, &mut buf);
        tlv::encode_tlv(TYPE_CIPHER_TEXT, &self.ciphertext, &mut buf);
        Wire::from(buf.freeze())
    }

    pub fn parse(wire: &Wire) -> Result<Self> {
        let mut reader = ParseReader::new(wire);
        let mut key_id = None;
        let mut iv = None;
        let mut ciphertext = None;
        while reader.remaining() > 0 {
            let (typ, len) = tlv::read_header(&mut reader)?;
            match typ {
                TYPE_KEY_ID => key_id = Some(reader.read(len)?),
                TYPE_INITIAL_VECTOR => iv = Some(reader.read(len)?),
                TYPE_CIPHER_TEXT => ciphertext = Some(reader.read(len)?),
                other => tlv::skip_unrecognized(&mut reader, other, len)?,
            }
        }
        Ok(Self {
            key_id: key_id.ok_or(Error::SkipRequired { typ: TYPE_KEY_ID })?,
            iv: iv.ok_or(Error::SkipRequired {
                typ: TYPE_INITIAL_VECTOR,
            })?,
            ciphertext: ciphertext.ok_or(Error::SkipRequired {
                typ: TYPE_CIPHER_TEXT,
            })?,
        })
    }
}

/// Encrypt a payload under the given key with a fresh random IV. The
/// key id is bound into the AEAD as associated data.
pub fn seal(key: &[u8], key_id: &[u8], plaintext: &Wire) -> Result<EncryptedContent> {
    let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, key)
        .map_err(|_| Error::Signing("content key must be 32 bytes".into()))?;
    let sealing = aead::LessSafeKey::new(unbound);

    let mut iv = [0u8; IV_LEN];
    rand::thread_rng().fill(&mut iv);
    let nonce = aead::Nonce::assume_unique_for_key(iv);

    let mut buf = plaintext.to_vec();
    sealing
        .seal_in_place_append_tag(nonce, aead::Aad::from(key_id), &mut buf)
        .map_err(|_| Error::Signing("content encryption failed".into()))?;

    Ok(EncryptedContent {
        key_id: Bytes::copy_from_slice(key_id),
        iv: Bytes::copy_from_slice(&iv),
        ciphertext: Bytes::from(buf),
    })
}

/// Decrypt an encoded encrypted-content wire with raw key bytes, as
/// fetched from a key-distribution leaf.
pub fn decrypt(key: &[u8], wire: &Wire) -> Result<Wire> {
    open(key, &EncryptedContent::parse(wire)?)
}

/// Decrypt; fails on key/IV mismatch or a tampered ciphertext.
pub fn open(key: &[u8], content: &EncryptedContent) -> Result<Wire> {
    let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, key)
        .map_err(|_| Error::Signing("content key must be 32 bytes".into()))?;
    let opening = aead::LessSafeKey::new(unbound);

    let nonce = aead::Nonce::try_assume_unique_for_key(&content.iv)
        .map_err(|_| Error::Format("initial vector must be 12 bytes".into()))?;
    let mut buf = content.ciphertext.to_vec();
    let plaintext = opening
        .open_in_place(nonce, aead::Aad::from(&content.key_id[..]), &mut buf)
        .map_err(|_| Error::Validation("content decryption failed".into()))?;
    Ok(Wire::from(plaintext.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> ([u8; KEY_LEN], [u8; KEY_ID_LEN]) {
        ([0x42; KEY_LEN], [0x07; KEY_ID_LEN])
    }

    #[test]
    fn seal_open_roundtrip() {
        let (key, id) = test_key();
        let plaintext = Wire::from(&b"hi"[..]);
        let sealed = seal(&key, &id, &plaintext).unwrap();
        assert_eq!(open(&key, &sealed).unwrap(), plaintext);
    }

    #[test]
    fn distinct_ivs_yield_distinct_ciphertexts() {
        let (key, id) = test_key();
        let plaintext = Wire::from(&b"same message"[..]);
        let a = seal(&key, &id, &plaintext).unwrap();
        let b = seal(&key, &id, &plaintext).unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn wrong_key_or_tamper_rejected() {
        let (key, id) = test_key();
        let sealed = seal(&key, &id, &Wire::from(&b"secret"[..])).unwrap();

        let mut wrong = key;
        wrong[0] ^= 1;
        assert!(open(&wrong, &sealed).is_err());

        let mut tampered = sealed.clone();
        let mut bytes = tampered.ciphertext.to_vec();
        bytes[0] ^= 1;
        tampered.ciphertext = Bytes::from(bytes);
        assert!(open(&key, &tampered).is_err());
    }

    #[test]
    fn encrypted_content_roundtrip() {
        let (key, id) = test_key();
        let sealed = seal(&key, &id, &Wire::from(&b"payload"[..])).unwrap();
        let parsed = EncryptedContent::parse(&sealed.encode()).unwrap();
        assert_eq!(parsed, sealed);
        assert_eq!(open(&key, &parsed).unwrap(), Wire::from(&b"payload"[..]));
    }

    #[test]
    fn generated_keys_are_retained_and_distinct() {
        let state = ContentKeyState::default();
        let a = state.generate();
        let b = state.generate();
        assert_ne!(a, b);
        assert_eq!(a.len(), KEY_ID_LEN);
        assert!(state.key(&a).is_some());
        assert!(state.key(&b).is_some());
        assert!(state.key(b"nope").is_none());
    }
}

//! Policies: cross-cutting concerns attached to subtrees.
//!
//! A policy anchored at a node installs hook handlers on that node and
//! every node below it while the tree attaches; detaching clears them.

use crate::node::Node;
use bytes::Bytes;
use log::debug;
use rust_ndn_common::name::Name;
use rust_ndn_common::packet::SigType;
use rust_ndn_common::pattern::NamePattern;
use rust_ndn_engine::security::{verify_digest, verify_hmac, HmacSigner, Sha256Signer};
use rust_ndn_engine::Engine;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Where a policy is being installed.
pub struct PolicyContext<'a> {
    /// The prefix the tree is attaching at.
    pub prefix: &'a Name,
    /// Path of the node the policy is anchored at.
    pub anchor: &'a NamePattern,
    /// Path of the node being installed into.
    pub path: &'a NamePattern,
    pub engine: &'a Engine,
}

impl PolicyContext<'_> {
    /// True at the node the policy was attached to.
    pub fn at_anchor(&self) -> bool {
        self.anchor == self.path
    }
}

/// A cross-cutting attachment evaluated at attach time.
pub trait Policy: Send + Sync {
    fn install(&self, node: &mut Node, ctx: &PolicyContext<'_>);
}

/* ---------------------------------------------------------------- *
 * RegisterPolicy
 * ---------------------------------------------------------------- */

/// Announce (or not) the anchor node's prefix to the forwarder.
pub struct RegisterPolicy {
    register_if: bool,
}

impl RegisterPolicy {
    pub fn new(register_if: bool) -> Self {
        Self { register_if }
    }
}

impl Policy for RegisterPolicy {
    fn install(&self, node: &mut Node, ctx: &PolicyContext<'_>) {
        if !ctx.at_anchor() {
            return;
        }
        let register_if = self.register_if;
        node.hooks_mut()
            .on_register
            .push(Arc::new(move |_| Some(register_if)));
    }
}

/* ---------------------------------------------------------------- *
 * Signer policies
 * ---------------------------------------------------------------- */

/// Sign with DigestSha256; validate by recomputing the digest.
#[derive(Default)]
pub struct Sha256SignerPolicy;

impl Sha256SignerPolicy {
    pub fn new() -> Self {
        Self
    }
}

impl Policy for Sha256SignerPolicy {
    fn install(&self, node: &mut Node, _ctx: &PolicyContext<'_>) {
        let hooks = node.hooks_mut();
        hooks
            .get_signer
            .push(Arc::new(|_, _| Some(Arc::new(Sha256Signer))));
        hooks.validate.push(Arc::new(|_, covered, info, value| {
            match (info, value) {
                (Some(info), Some(value)) if info.sig_type == SigType::DigestSha256 => {
                    Some(verify_digest(covered, value))
                }
                _ => Some(false),
            }
        }));
    }
}

/// HMAC-SHA-256 with a fixed key; the key locator names the Data being
/// signed.
pub struct FixedHmacSignerPolicy {
    key: Bytes,
}

impl FixedHmacSignerPolicy {
    pub fn new(key: impl Into<Bytes>) -> Self {
        Self { key: key.into() }
    }
}

impl Policy for FixedHmacSignerPolicy {
    fn install(&self, node: &mut Node, _ctx: &PolicyContext<'_>) {
        let key = self.key.clone();
        let hooks = node.hooks_mut();
        hooks.get_signer.push(Arc::new(move |name, _| {
            Some(Arc::new(HmacSigner::new(key.clone(), name.clone())))
        }));
        let key = self.key.clone();
        hooks.validate.push(Arc::new(move |_, covered, info, value| {
            match (info, value) {
                (Some(info), Some(value)) if info.sig_type == SigType::HmacWithSha256 => {
                    Some(verify_hmac(&key, covered, value))
                }
                _ => Some(false),
            }
        }));
    }
}

/* ---------------------------------------------------------------- *
 * MemStorage
 * ---------------------------------------------------------------- */

struct StoredItem {
    wire: Bytes,
    fresh_until: Option<Instant>,
    valid_until: Instant,
}

impl StoredItem {
    fn is_fresh(&self, now: Instant) -> bool {
        self.fresh_until.is_some_and(|until| until > now)
    }
}

/// In-memory content store keyed by the canonical (encoded) name.
/// Insertion is last-write-wins; expired entries are evicted lazily on
/// access.
#[derive(Default)]
pub struct MemStorage {
    entries: Mutex<BTreeMap<Bytes, StoredItem>>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn insert(
        &self,
        name: &Name,
        wire: Bytes,
        fresh_until: Option<Instant>,
        valid_until: Instant,
    ) {
        self.entries.lock().unwrap().insert(
            name.to_value_bytes(),
            StoredItem {
                wire,
                fresh_until,
                valid_until,
            },
        );
    }

    /// Look up a stored Data for `name`, honouring `can_be_prefix` and
    /// `must_be_fresh`.
    pub fn search(&self, name: &Name, can_be_prefix: bool, must_be_fresh: bool) -> Option<Bytes> {
        let key = name.to_value_bytes();
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();

        if can_be_prefix {
            let mut expired = Vec::new();
            let mut found = None;
            for (stored_key, item) in entries.range(key.clone()..) {
                if !stored_key.starts_with(&key) {
                    break;
                }
                if item.valid_until <= now {
                    expired.push(stored_key.clone());
                    continue;
                }
                if must_be_fresh && !item.is_fresh(now) {
                    continue;
                }
                found = Some(item.wire.clone());
                break;
            }
            for stale in expired {
                entries.remove(&stale);
            }
            found
        } else {
            match entries.get(&key) {
                Some(item) if item.valid_until <= now => {
                    entries.remove(&key);
                    None
                }
                Some(item) if must_be_fresh && !item.is_fresh(now) => None,
                Some(item) => Some(item.wire.clone()),
                None => None,
            }
        }
    }
}

/// Install a shared [`MemStorage`] as the subtree's content store.
#[derive(Default)]
pub struct MemStoragePolicy {
    store: Arc<MemStorage>,
}

impl MemStoragePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// The underlying store, for inspection and pre-seeding.
    pub fn store(&self) -> Arc<MemStorage> {
        Arc::clone(&self.store)
    }
}

impl Policy for MemStoragePolicy {
    fn install(&self, node: &mut Node, ctx: &PolicyContext<'_>) {
        debug!("memory storage installed at {}", ctx.path);
        let store = Arc::clone(&self.store);
        let hooks = node.hooks_mut();
        hooks
            .search_storage
            .push(Arc::new(move |name, can_be_prefix, must_be_fresh| {
                store.search(name, can_be_prefix, must_be_fresh)
            }));
        let store = Arc::clone(&self.store);
        hooks
            .save_storage
            .push(Arc::new(move |name, wire, fresh_until, valid_until| {
                store.insert(name, wire.clone(), fresh_until, valid_until);
            }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn name(s: &str) -> Name {
        s.parse().unwrap()
    }

    fn far_future() -> Instant {
        Instant::now() + Duration::from_secs(3600)
    }

    #[test]
    fn exact_and_prefix_search() {
        let store = MemStorage::new();
        store.insert(
            &name("/a/b/c"),
            Bytes::from_static(b"abc"),
            Some(far_future()),
            far_future(),
        );

        assert_eq!(
            store.search(&name("/a/b/c"), false, false),
            Some(Bytes::from_static(b"abc"))
        );
        assert_eq!(store.search(&name("/a/b"), false, false), None);
        assert_eq!(
            store.search(&name("/a/b"), true, false),
            Some(Bytes::from_static(b"abc"))
        );
        // A sibling prefix must not match.
        assert_eq!(store.search(&name("/a/x"), true, false), None);
    }

    #[test]
    fn freshness_gates_must_be_fresh_only() {
        let store = MemStorage::new();
        let stale_since = Instant::now() - Duration::from_secs(1);
        store.insert(
            &name("/stale"),
            Bytes::from_static(b"old"),
            Some(stale_since),
            far_future(),
        );

        assert_eq!(store.search(&name("/stale"), false, true), None);
        assert_eq!(
            store.search(&name("/stale"), false, false),
            Some(Bytes::from_static(b"old"))
        );

        // Data stored without a freshness period is never fresh.
        store.insert(&name("/never"), Bytes::from_static(b"n"), None, far_future());
        assert_eq!(store.search(&name("/never"), false, true), None);
    }

    #[test]
    fn expired_entries_are_evicted_on_access() {
        let store = MemStorage::new();
        let expired = Instant::now() - Duration::from_secs(1);
        store.insert(&name("/gone"), Bytes::from_static(b"x"), None, expired);
        assert_eq!(store.len(), 1);

        assert_eq!(store.search(&name("/gone"), false, false), None);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn last_write_wins() {
        let store = MemStorage::new();
        store.insert(&name("/k"), Bytes::from_static(b"one"), None, far_future());
        store.insert(&name("/k"), Bytes::from_static(b"two"), None, far_future());
        assert_eq!(
            store.search(&name("/k"), false, false),
            Some(Bytes::from_static(b"two"))
        );
    }
}

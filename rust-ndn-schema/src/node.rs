//! Schema tree nodes: kinds, properties and hook tables.

use crate::contentkey::ContentKeyState;
use crate::event::EventCallback;
use crate::policy::Policy;
use bytes::Bytes;
use log::debug;
use rust_ndn_common::error::Error;
use rust_ndn_common::name::Name;
use rust_ndn_common::packet::{Data, SignatureInfo};
use rust_ndn_common::pattern::{Matching, NamePattern, PatternComponent};
use rust_ndn_common::security::Signer;
use rust_ndn_common::wire::Wire;
use rust_ndn_common::Result;
use rust_ndn_engine::security::Sha256Signer;
use rust_ndn_engine::Engine;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What a node is, which decides how it composes its hooks.
pub enum NodeKind {
    /// Routing only; no intrinsic behavior.
    Base,
    /// Consumer side: `need` builds and expresses an Interest.
    ExpressPoint,
    /// Producer side: serves storage hits and user `on_interest`
    /// callbacks; `provide` packages, signs and stores Data.
    Leaf,
    /// Symmetric content keys with a key-distribution leaf below.
    ContentKey(ContentKeyState),
}

impl NodeKind {
    /// A fresh content-key node state.
    pub fn content_key() -> NodeKind {
        NodeKind::ContentKey(ContentKeyState::default())
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            NodeKind::Base => "base",
            NodeKind::ExpressPoint => "express-point",
            NodeKind::Leaf => "leaf",
            NodeKind::ContentKey(_) => "content-key",
        }
    }
}

/// Per-node packet attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Properties {
    /// Interests built by `need` ask for prefix matches, and incoming
    /// names may extend past this node.
    pub can_be_prefix: bool,
    pub must_be_fresh: bool,
    /// Lifetime of Interests built by `need`.
    pub lifetime: Duration,
    /// FreshnessPeriod stamped on provided Data; zero omits the field.
    pub freshness: Duration,
    /// How long provided Data stays servable from storage.
    pub valid_duration: Duration,
}

impl Default for Properties {
    fn default() -> Self {
        Self {
            can_be_prefix: false,
            must_be_fresh: true,
            lifetime: Duration::from_secs(4),
            freshness: Duration::from_secs(1),
            valid_duration: Duration::from_secs(3600),
        }
    }
}

/* ---------------------------------------------------------------- *
 * Hook table
 * ---------------------------------------------------------------- */

/// Search storage: (name, can_be_prefix, must_be_fresh) → stored wire.
pub type SearchStorageHook = Arc<dyn Fn(&Name, bool, bool) -> Option<Bytes> + Send + Sync>;
/// Save storage: (name, data wire, fresh-until, valid-until).
pub type SaveStorageHook = Arc<dyn Fn(&Name, &Bytes, Option<Instant>, Instant) + Send + Sync>;
/// Resolve the signer for a Data packet about to be produced.
pub type SignerHook = Arc<dyn Fn(&Name, &Matching) -> Option<Arc<dyn Signer>> + Send + Sync>;
/// Judge a packet signature (signed Interest or Data); `None` abstains.
pub type ValidateHook = Arc<
    dyn Fn(&Name, &Wire, Option<&SignatureInfo>, Option<&Bytes>) -> Option<bool> + Send + Sync,
>;
/// Should this node's (concrete) pattern be announced as a route?
pub type RegisterHook = Arc<dyn Fn(&NamePattern) -> Option<bool> + Send + Sync>;
/// Runs while the tree attaches, after policies installed their hooks.
pub type AttachHook = Arc<dyn Fn(&NamePattern, &Engine) -> Result<()> + Send + Sync>;
/// Runs while the tree detaches, bottom-up.
pub type DetachHook = Arc<dyn Fn() + Send + Sync>;

/// Policy-installed handlers, one dense list per hook point. Rebuilt on
/// every attach; cleared on detach.
#[derive(Default)]
pub struct HookTable {
    pub on_attach: Vec<AttachHook>,
    pub on_detach: Vec<DetachHook>,
    pub search_storage: Vec<SearchStorageHook>,
    pub save_storage: Vec<SaveStorageHook>,
    pub get_signer: Vec<SignerHook>,
    pub validate: Vec<ValidateHook>,
    pub on_register: Vec<RegisterHook>,
}

impl HookTable {
    pub(crate) fn clear(&mut self) {
        self.on_attach.clear();
        self.on_detach.clear();
        self.search_storage.clear();
        self.save_storage.clear();
        self.get_signer.clear();
        self.validate.clear();
        self.on_register.clear();
    }
}

/* ---------------------------------------------------------------- *
 * Node
 * ---------------------------------------------------------------- */

/// One vertex of the schema tree. The tree exclusively owns its nodes;
/// absolute names are recomputed from the root path, so nodes carry no
/// parent references.
pub struct Node {
    pub(crate) kind: NodeKind,
    /// Edge from the parent; `None` only at the root.
    pub(crate) edge: Option<PatternComponent>,
    /// Children in insertion order; literal edges are tried first.
    pub(crate) children: Vec<Node>,
    pub(crate) policies: Vec<Arc<dyn Policy>>,
    pub(crate) props: Properties,
    pub(crate) on_interest: Vec<EventCallback>,
    pub(crate) hooks: HookTable,
    pub(crate) attached: bool,
}

impl Node {
    pub(crate) fn new(kind: NodeKind, edge: Option<PatternComponent>) -> Self {
        Self {
            kind,
            edge,
            children: Vec::new(),
            policies: Vec::new(),
            props: Properties::default(),
            on_interest: Vec::new(),
            hooks: HookTable::default(),
            attached: false,
        }
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn properties(&self) -> &Properties {
        &self.props
    }

    pub fn properties_mut(&mut self) -> &mut Properties {
        &mut self.props
    }

    /// Attach a policy anchored at this node; it installs hooks on this
    /// node and everything below it when the tree attaches.
    pub fn add_policy(&mut self, policy: Arc<dyn Policy>) {
        self.policies.push(policy);
    }

    /// Bind a user callback fired when a matching Interest arrives and
    /// storage could not satisfy it. Callbacks run in registration
    /// order; the first to break short-circuits the rest.
    pub fn on_interest(&mut self, callback: EventCallback) {
        self.on_interest.push(callback);
    }

    /// The hook table, for custom policies.
    pub fn hooks_mut(&mut self) -> &mut HookTable {
        &mut self.hooks
    }

    /// Package, sign and store one Data packet for `name`, returning
    /// its encoded wire. The caller replies or publishes it.
    pub(crate) fn provide_inner(
        &self,
        name: &Name,
        matching: &Matching,
        content: Wire,
        engine: &Engine,
    ) -> Result<Wire> {
        if !matches!(self.kind, NodeKind::Leaf) {
            return Err(Error::Format(format!(
                "cannot provide on a {} node",
                self.kind.label()
            )));
        }
        let signer = self
            .hooks
            .get_signer
            .iter()
            .find_map(|hook| hook(name, matching))
            .unwrap_or_else(|| Arc::new(Sha256Signer));

        let mut data = Data::new(name.clone()).with_content(content);
        if self.props.freshness > Duration::ZERO {
            data.meta_info.freshness_period = Some(self.props.freshness);
        }
        let encoded = data.encode_signed(signer.as_ref())?;
        let wire_bytes = encoded.wire.join();

        let now = engine.timer().now();
        let fresh_until = (self.props.freshness > Duration::ZERO)
            .then(|| now + self.props.freshness);
        let valid_until = now + self.props.valid_duration;
        for save in &self.hooks.save_storage {
            save(name, &wire_bytes, fresh_until, valid_until);
        }
        debug!("provided {name} ({} bytes)", wire_bytes.len());
        Ok(Wire::from(wire_bytes))
    }
}

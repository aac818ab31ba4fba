//! The schema tree: a trie of nodes indexed by name patterns.
//!
//! The tree is built up front (nodes, policies, callbacks), then
//! attached to an engine at a prefix. Attaching walks the tree once,
//! letting policies install their hooks and announcing routes; incoming
//! Interests then resolve through [`Tree::match_name`] into a node plus
//! variable bindings.
//!
//! One readers-writer lock guards the structure: `attach`, `detach` and
//! `put_node` take it exclusively, matching and Interest handling take
//! it shared. Hooks run under the shared lock and must not reacquire
//! the exclusive one.

use crate::contentkey::{self, ContentKeyState};
use crate::event::{Event, EventCallback};
use crate::node::{Node, NodeKind};
use crate::policy::{Policy, PolicyContext};
use bytes::{Bytes, BytesMut};
use log::{debug, info, warn};
use rust_ndn_common::error::Error;
use rust_ndn_common::name::{Component, Name};
use rust_ndn_common::packet::{Data, Interest};
use rust_ndn_common::pattern::{
    Matching, NamePattern, PatternComponent, TAG_PARAMS_SHA256, TAG_SHA256_DIGEST, TAG_TAIL,
};
use rust_ndn_common::wire::Wire;
use rust_ndn_common::Result;
use rust_ndn_engine::{Engine, ExpressResult, InterestContext, InterestHandler};
use std::sync::{Arc, RwLock};

struct TreeState {
    root: Node,
    prefix: Option<Name>,
    engine: Option<Engine>,
    routes: Vec<Name>,
}

struct TreeShared {
    state: RwLock<TreeState>,
}

/// Handle on a schema tree; cheap to clone and share.
#[derive(Clone)]
pub struct Tree {
    shared: Arc<TreeShared>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// An empty tree holding only a base root.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(TreeShared {
                state: RwLock::new(TreeState {
                    root: Node::new(NodeKind::Base, None),
                    prefix: None,
                    engine: None,
                    routes: Vec::new(),
                }),
            }),
        }
    }

    /// Install a node at `path`, creating base placeholders for missing
    /// interiors. Fails with `AlreadyExists` when the terminal is
    /// occupied by anything but a placeholder.
    pub fn put_node(&self, path: &NamePattern, kind: NodeKind) -> Result<()> {
        let mut state = self.shared.state.write().unwrap();
        if state.engine.is_some() {
            return Err(Error::AlreadyExists(
                "tree is attached; its structure is frozen".into(),
            ));
        }
        if path.is_empty() {
            return install_kind(&mut state.root, kind, path);
        }
        let mut node = &mut state.root;
        for (i, pc) in path.components().iter().enumerate() {
            let idx = match node
                .children
                .iter()
                .position(|c| c.edge.as_ref() == Some(pc))
            {
                Some(idx) => idx,
                None => {
                    node.children
                        .push(Node::new(NodeKind::Base, Some(pc.clone())));
                    node.children.len() - 1
                }
            };
            node = &mut node.children[idx];
            if i + 1 == path.len() {
                return install_kind(node, kind, path);
            }
        }
        unreachable!("non-empty path always hits its terminal");
    }

    /// Structural lookup by pattern; no matching takes place.
    pub fn at(&self, path: &NamePattern) -> Option<NodeHandle> {
        let state = self.shared.state.read().unwrap();
        resolve(&state.root, path)?;
        Some(NodeHandle {
            tree: self.clone(),
            path: path.clone(),
        })
    }

    /// Edit the node at `path` (properties, policies, callbacks).
    pub fn edit_node<R>(
        &self,
        path: &NamePattern,
        edit: impl FnOnce(&mut Node) -> R,
    ) -> Result<R> {
        let mut state = self.shared.state.write().unwrap();
        let node = resolve_mut(&mut state.root, path)
            .ok_or_else(|| Error::NotFound(path.to_string()))?;
        Ok(edit(node))
    }

    /// Anchor a policy at `path`.
    pub fn set_policy(&self, path: &NamePattern, policy: Arc<dyn Policy>) -> Result<()> {
        self.edit_node(path, |node| node.add_policy(policy))
    }

    /// Bind an `on_interest` callback on the node at `path`.
    pub fn on_interest(&self, path: &NamePattern, callback: EventCallback) -> Result<()> {
        self.edit_node(path, |node| node.on_interest(callback))
    }

    /// Match a root-relative name down the trie. At each step literal
    /// edges are tried before variable edges, in insertion order.
    pub fn match_name(&self, name: &Name) -> Option<(NodeHandle, Matching)> {
        let state = self.shared.state.read().unwrap();
        let mut matching = Matching::new();
        let (_, path) = match_walk(&state.root, name, &mut matching)?;
        Some((
            NodeHandle {
                tree: self.clone(),
                path,
            },
            matching,
        ))
    }

    /// Bind the tree to `engine` at `prefix`: walk the tree depth-first
    /// installing policy hooks and firing `on_attach` exactly once per
    /// node, register the prefix handler, then announce routes chosen
    /// by register policies.
    pub async fn attach(&self, prefix: Name, engine: Engine) -> Result<()> {
        let routes = {
            let mut state = self.shared.state.write().unwrap();
            if state.engine.is_some() {
                return Err(Error::AlreadyExists("tree is already attached".into()));
            }
            let mut routes = Vec::new();
            attach_walk(
                &mut state.root,
                &prefix,
                &NamePattern::new(),
                &[],
                &engine,
                &mut routes,
            )?;
            state.prefix = Some(prefix.clone());
            state.engine = Some(engine.clone());
            state.routes = routes.clone();
            routes
        };

        let weak = Arc::downgrade(&self.shared);
        let handler: InterestHandler = Arc::new(move |ctx| {
            if let Some(shared) = weak.upgrade() {
                Tree { shared }.handle_interest(ctx);
            }
        });
        if let Err(e) = engine.attach_handler(&prefix, handler) {
            let mut state = self.shared.state.write().unwrap();
            state.prefix = None;
            state.engine = None;
            state.routes.clear();
            detach_walk(&mut state.root);
            return Err(e);
        }

        for route in &routes {
            engine.register_route(route).await?;
        }
        info!("schema tree attached at {prefix}");
        Ok(())
    }

    /// Unbind from the engine: withdraw routes, remove the prefix
    /// handler, then fire `on_detach` bottom-up exactly once per node.
    pub async fn detach(&self) {
        let (prefix, engine, routes) = {
            let mut state = self.shared.state.write().unwrap();
            let Some(engine) = state.engine.take() else {
                return;
            };
            let prefix = state.prefix.take().expect("attached tree has a prefix");
            let routes = std::mem::take(&mut state.routes);
            (prefix, engine, routes)
        };

        for route in &routes {
            if let Err(e) = engine.unregister_route(route).await {
                debug!("route withdrawal for {route} failed: {e}");
            }
        }
        if let Err(e) = engine.detach_handler(&prefix) {
            debug!("handler removal at {prefix} failed: {e}");
        }

        let mut state = self.shared.state.write().unwrap();
        detach_walk(&mut state.root);
        info!("schema tree detached from {prefix}");
    }

    /// The engine's Interest handler for the attached prefix.
    fn handle_interest(&self, ctx: InterestContext) {
        let state = self.shared.state.read().unwrap();
        let (Some(prefix), Some(engine)) = (&state.prefix, &state.engine) else {
            return;
        };
        if !prefix.is_prefix_of(&ctx.interest.name) {
            warn!("interest {} outside attached prefix", ctx.interest.name);
            return;
        }

        // A trailing digest component is not part of the schema path;
        // capture it as a binding instead.
        let mut matching = Matching::new();
        let mut components: Vec<Component> =
            ctx.interest.name.components()[prefix.len()..].to_vec();
        if let Some(last) = components.last() {
            let tag = match last.typ {
                Component::IMPLICIT_SHA256_DIGEST => Some(TAG_SHA256_DIGEST),
                Component::PARAMETERS_SHA256_DIGEST => Some(TAG_PARAMS_SHA256),
                _ => None,
            };
            if let Some(tag) = tag {
                matching.insert(tag.to_string(), last.value.clone());
                components.pop();
            }
        }
        let relative = Name::from_components(components);

        let Some((node, _path)) = match_walk(&state.root, &relative, &mut matching) else {
            warn!("unexpected interest {}; dropping", ctx.interest.name);
            return;
        };
        let concrete = prefix.join(&relative);
        dispatch_to_node(node, &ctx, &concrete, &matching, engine);
    }
}

/// Serve one matched Interest at its node: storage first, then the
/// user's `on_interest` callbacks in registration order.
fn dispatch_to_node(
    node: &Node,
    ctx: &InterestContext,
    name: &Name,
    matching: &Matching,
    engine: &Engine,
) {
    if ctx.interest.sig_info.is_some() {
        let verdict = node.hooks.validate.iter().find_map(|hook| {
            hook(
                name,
                &ctx.sig_covered,
                ctx.interest.sig_info.as_ref(),
                ctx.interest.sig_value.as_ref(),
            )
        });
        if verdict == Some(false) {
            warn!("dropping interest {name}: signature rejected");
            return;
        }
    }

    for hook in &node.hooks.search_storage {
        if let Some(stored) = hook(name, ctx.interest.can_be_prefix, ctx.interest.must_be_fresh)
        {
            debug!("storage hit for {name}");
            if let Err(e) = (ctx.reply)(Wire::from(stored)) {
                warn!("reply from storage failed: {e}");
            }
            return;
        }
    }

    if node.on_interest.is_empty() {
        debug!(
            "interest {name} reached a {} node with no handler; unsatisfied",
            node.kind.label()
        );
        return;
    }
    let event = Event {
        node,
        engine,
        name,
        matching,
        interest: Some(&ctx.interest),
        deadline: Some(ctx.deadline),
        reply: Some(&ctx.reply),
    };
    for callback in &node.on_interest {
        if callback(&event).is_break() {
            break;
        }
    }
}

/* ---------------------------------------------------------------- *
 * Tree walks
 * ---------------------------------------------------------------- */

fn resolve<'a>(root: &'a Node, path: &NamePattern) -> Option<&'a Node> {
    let mut node = root;
    for pc in path.components() {
        node = node
            .children
            .iter()
            .find(|c| c.edge.as_ref() == Some(pc))?;
    }
    Some(node)
}

fn resolve_mut<'a>(root: &'a mut Node, path: &NamePattern) -> Option<&'a mut Node> {
    let mut node = root;
    for pc in path.components() {
        node = node
            .children
            .iter_mut()
            .find(|c| c.edge.as_ref() == Some(pc))?;
    }
    Some(node)
}

fn match_walk<'a>(
    root: &'a Node,
    name: &Name,
    matching: &mut Matching,
) -> Option<(&'a Node, NamePattern)> {
    let mut node = root;
    let mut path = NamePattern::new();
    let mut i = 0;
    loop {
        if i == name.len() {
            return Some((node, path));
        }
        let comp = name.get(i).unwrap();

        let literals = node
            .children
            .iter()
            .filter(|c| matches!(c.edge, Some(PatternComponent::Literal(_))));
        let variables = node
            .children
            .iter()
            .filter(|c| matches!(c.edge, Some(PatternComponent::Variable { .. })));
        let next = literals
            .chain(variables)
            .find(|c| c.edge.as_ref().unwrap().matches(comp, matching));

        match next {
            Some(child) => {
                path.push(child.edge.clone().unwrap());
                node = child;
                i += 1;
            }
            None if node.props.can_be_prefix => {
                let mut tail = BytesMut::new();
                for c in &name.components()[i..] {
                    c.encode(&mut tail);
                }
                matching.insert(TAG_TAIL.to_string(), tail.freeze());
                return Some((node, path));
            }
            None => return None,
        }
    }
}

type AnchoredPolicy = (NamePattern, Arc<dyn Policy>);

fn attach_walk(
    node: &mut Node,
    prefix: &Name,
    path: &NamePattern,
    inherited: &[AnchoredPolicy],
    engine: &Engine,
    routes: &mut Vec<Name>,
) -> Result<()> {
    let mut active: Vec<AnchoredPolicy> = inherited.to_vec();
    active.extend(
        node.policies
            .iter()
            .map(|p| (path.clone(), Arc::clone(p))),
    );

    node.hooks.clear();
    for (anchor, policy) in &active {
        policy.install(
            node,
            &PolicyContext {
                prefix,
                anchor,
                path,
                engine,
            },
        );
    }
    for hook in &node.hooks.on_attach {
        hook(path, engine)?;
    }
    node.attached = true;

    if !node.hooks.on_register.is_empty() {
        let full = NamePattern::from_name(prefix).join(path);
        if full.is_concrete() {
            let announce = node
                .hooks
                .on_register
                .iter()
                .find_map(|hook| hook(&full))
                .unwrap_or(false);
            if announce {
                routes.push(full.apply(&Matching::new())?);
            }
        } else {
            debug!("register policy at variable pattern {full} ignored");
        }
    }

    for child in &mut node.children {
        let child_path = path.clone().appended(child.edge.clone().unwrap());
        attach_walk(child, prefix, &child_path, &active, engine, routes)?;
    }
    Ok(())
}

fn detach_walk(node: &mut Node) {
    for child in &mut node.children {
        detach_walk(child);
    }
    if node.attached {
        for hook in &node.hooks.on_detach {
            hook();
        }
        node.attached = false;
        node.hooks.clear();
    }
}

fn install_kind(node: &mut Node, kind: NodeKind, path: &NamePattern) -> Result<()> {
    if !matches!(node.kind, NodeKind::Base) {
        return Err(Error::AlreadyExists(path.to_string()));
    }
    if let NodeKind::ContentKey(state) = &kind {
        node.children.push(key_distribution_leaf(state.clone()));
    }
    node.kind = kind;
    Ok(())
}

/// The built-in `<key-id>` leaf below a content-key node.
fn key_distribution_leaf(state: ContentKeyState) -> Node {
    let mut leaf = Node::new(
        NodeKind::Leaf,
        Some(PatternComponent::variable(
            contentkey::KEY_ID_TAG,
            Component::GENERIC,
        )),
    );
    leaf.on_interest(contentkey::key_service_callback(state));
    leaf
}

/* ---------------------------------------------------------------- *
 * Node handles and materialised views
 * ---------------------------------------------------------------- */

/// A structural reference to a node, addressed by its path.
#[derive(Clone)]
pub struct NodeHandle {
    tree: Tree,
    path: NamePattern,
}

impl NodeHandle {
    pub fn path(&self) -> &NamePattern {
        &self.path
    }

    /// Materialise this node with variable bindings; operations on the
    /// result reuse the underlying node.
    pub fn apply(&self, matching: Matching) -> MatchedNode {
        MatchedNode {
            tree: self.tree.clone(),
            path: self.path.clone(),
            matching,
        }
    }
}

/// Outcome of a successful [`MatchedNode::need`].
#[derive(Debug)]
pub struct NeedResult {
    pub data: Data,
    pub raw: Wire,
}

impl NeedResult {
    /// The Data's content, empty when the packet carried none.
    pub fn content(&self) -> Wire {
        self.data.content.clone().unwrap_or_default()
    }
}

/// A `(node, matching)` pair: a node with its variables bound, exposing
/// the node kind's typed operations.
#[derive(Clone)]
pub struct MatchedNode {
    tree: Tree,
    path: NamePattern,
    pub matching: Matching,
}

impl MatchedNode {
    /// The concrete name of this view (attached prefix + applied path).
    pub fn name(&self) -> Result<Name> {
        let state = self.tree.shared.state.read().unwrap();
        let prefix = state.prefix.as_ref().ok_or(Error::NotRunning)?;
        Ok(prefix.join(&self.path.apply(&self.matching)?))
    }

    /// Produce Data for this name: package content with the node's
    /// freshness, sign via the signer hook, store via the storage hook,
    /// and return the encoded wire.
    pub fn provide(&self, content: Wire) -> Result<Wire> {
        let state = self.tree.shared.state.read().unwrap();
        let engine = state.engine.as_ref().ok_or(Error::NotRunning)?;
        let prefix = state.prefix.as_ref().ok_or(Error::NotRunning)?;
        let node = resolve(&state.root, &self.path)
            .ok_or_else(|| Error::NotFound(self.path.to_string()))?;
        let name = prefix.join(&self.path.apply(&self.matching)?);
        node.provide_inner(&name, &self.matching, content, engine)
    }

    /// Express an Interest built from the node's attributes and deliver
    /// the validated result.
    pub async fn need(&self) -> Result<NeedResult> {
        let (engine, interest, validate_hooks, save_hooks, valid_duration) = {
            let state = self.tree.shared.state.read().unwrap();
            let engine = state.engine.clone().ok_or(Error::NotRunning)?;
            let prefix = state.prefix.as_ref().ok_or(Error::NotRunning)?;
            let node = resolve(&state.root, &self.path)
                .ok_or_else(|| Error::NotFound(self.path.to_string()))?;
            if !matches!(node.kind, NodeKind::Leaf | NodeKind::ExpressPoint) {
                return Err(Error::Format(format!(
                    "cannot express a need on a {} node",
                    node.kind.label()
                )));
            }
            let name = prefix.join(&self.path.apply(&self.matching)?);
            let interest = Interest::new(name)
                .with_can_be_prefix(node.props.can_be_prefix)
                .with_must_be_fresh(node.props.must_be_fresh)
                .with_lifetime(node.props.lifetime);
            (
                engine,
                interest,
                node.hooks.validate.clone(),
                node.hooks.save_storage.clone(),
                node.props.valid_duration,
            )
        };

        let handle = engine.express(interest)?;
        match handle.wait().await {
            ExpressResult::Data {
                data,
                sig_covered,
                raw,
            } => {
                let verdict = validate_hooks.iter().find_map(|hook| {
                    hook(
                        &data.name,
                        &sig_covered,
                        data.sig_info.as_ref(),
                        data.sig_value.as_ref(),
                    )
                });
                if verdict == Some(false) {
                    return Err(Error::Validation(data.name.to_string()));
                }
                if !save_hooks.is_empty() {
                    let now = engine.timer().now();
                    let fresh_until = data.meta_info.freshness_period.map(|f| now + f);
                    let wire_bytes = raw.join();
                    for save in &save_hooks {
                        save(&data.name, &wire_bytes, fresh_until, now + valid_duration);
                    }
                }
                Ok(NeedResult { data, raw })
            }
            ExpressResult::Nack { reason } => Err(Error::Nack(reason)),
            ExpressResult::Timeout => Err(Error::Timeout),
            ExpressResult::Cancelled => Err(Error::Cancelled),
        }
    }

    /// Generate a fresh content key under this content-key node,
    /// returning its id. The key is served by the distribution leaf.
    pub fn gen_key(&self) -> Result<Bytes> {
        self.with_content_key_state(|state| state.generate())
    }

    /// Encrypt a payload under a previously generated key.
    pub fn encrypt(&self, key_id: &[u8], plaintext: &Wire) -> Result<Wire> {
        let key = self
            .with_content_key_state(|state| state.key(key_id))?
            .ok_or_else(|| Error::NotFound("content key".into()))?;
        Ok(contentkey::seal(&key, key_id, plaintext)?.encode())
    }

    fn with_content_key_state<R>(&self, f: impl FnOnce(&ContentKeyState) -> R) -> Result<R> {
        let state = self.tree.shared.state.read().unwrap();
        let node = resolve(&state.root, &self.path)
            .ok_or_else(|| Error::NotFound(self.path.to_string()))?;
        match &node.kind {
            NodeKind::ContentKey(ck) => Ok(f(ck)),
            other => Err(Error::Format(format!(
                "{} is a {} node, not a content-key node",
                self.path,
                other.label()
            ))),
        }
    }
}

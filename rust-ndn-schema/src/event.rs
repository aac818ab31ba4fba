//! The event protocol: how user callbacks observe and answer Interests.

use crate::node::Node;
use bytes::Bytes;
use rust_ndn_common::error::Error;
use rust_ndn_common::name::Name;
use rust_ndn_common::packet::Interest;
use rust_ndn_common::pattern::Matching;
use rust_ndn_common::wire::Wire;
use rust_ndn_common::Result;
use rust_ndn_engine::{Engine, ReplyFunc};
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Instant;

/// The view handed to an `on_interest` callback: the matched node, its
/// concrete name and bindings, the triggering Interest, and a way to
/// reply before the deadline.
pub struct Event<'a> {
    pub(crate) node: &'a Node,
    pub(crate) engine: &'a Engine,
    /// Concrete name of the matched node (the Interest name without a
    /// trailing digest component).
    pub name: &'a Name,
    pub matching: &'a Matching,
    pub interest: Option<&'a Interest>,
    pub deadline: Option<Instant>,
    pub(crate) reply: Option<&'a ReplyFunc>,
}

impl Event<'_> {
    /// Package, sign and store Data for this event's name, returning
    /// the encoded wire. Reply with it via [`Event::reply`].
    pub fn provide(&self, content: Wire) -> Result<Wire> {
        self.node
            .provide_inner(self.name, self.matching, content, self.engine)
    }

    /// Send an encoded Data packet back towards the requester.
    pub fn reply(&self, wire: Wire) -> Result<()> {
        let reply = self
            .reply
            .ok_or_else(|| Error::NotFound("reply channel".into()))?;
        reply(wire)
    }

    /// A binding captured by the matched pattern.
    pub fn binding(&self, tag: &str) -> Option<&Bytes> {
        self.matching.get(tag)
    }
}

/// User callback bound to a node event. Returning `Break` stops the
/// remaining callbacks for this event.
pub type EventCallback = Arc<dyn for<'a> Fn(&Event<'a>) -> ControlFlow<()> + Send + Sync>;

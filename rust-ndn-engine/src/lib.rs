//! The NDN engine: faces, timers, signing and Interest/Data dispatch.
//!
//! The [`Engine`](engine::Engine) owns a [`Face`](face::Face) to a
//! forwarder, keeps a pending-Interest table with deadline timers and a
//! prefix-handler table, and bridges producer/consumer code to the wire.

pub mod engine;
pub mod face;
pub mod metrics;
pub mod mgmt;
pub mod security;
pub mod timer;

pub use engine::{Engine, ExpressHandle, ExpressResult, InterestContext, InterestHandler, ReplyFunc};
pub use face::Face;
pub use timer::Timer;

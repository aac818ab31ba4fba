//! NTSchema: a schema tree binding NDN names to producer/consumer logic.
//!
//! Applications describe their namespace as a trie of typed nodes
//! indexed by name patterns, attach cross-cutting policies (signing,
//! storage, registration) to subtrees, and attach the whole tree to an
//! engine. Incoming Interests resolve through the trie into a node plus
//! variable bindings; nodes expose typed operations (`provide`, `need`,
//! `gen_key`, `encrypt`) against those bindings.

pub mod contentkey;
pub mod event;
pub mod node;
pub mod policy;
pub mod tree;

pub use event::{Event, EventCallback};
pub use node::{HookTable, Node, NodeKind, Properties};
pub use policy::{
    FixedHmacSignerPolicy, MemStorage, MemStoragePolicy, Policy, PolicyContext, RegisterPolicy,
    Sha256SignerPolicy,
};
pub use tree::{MatchedNode, NeedResult, NodeHandle, Tree};

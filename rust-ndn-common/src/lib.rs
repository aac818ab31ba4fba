//! Common types and codecs for the rust-ndn stack.
//!
//! This crate provides the TLV encoding substrate (variable-length numbers,
//! scattered wires, the zero-copy parse reader), the NDN name model with
//! schema name patterns, and the Interest/Data packet layer shared by the
//! engine and the schema tree.

pub mod error;
pub mod name;
pub mod packet;
pub mod pattern;
pub mod security;
pub mod tlv;
pub mod wire;

/// Reexport of common types
pub use error::Error;
pub type Result<T> = std::result::Result<T, Error>;

//! Name patterns: name-shaped templates with variable slots.
//!
//! A pattern component is either a literal component, matching only
//! itself, or a variable slot written `<tag>` (any generic component) or
//! `<conv=tag>` where `conv` is one of the naming conventions (`v`, `t`,
//! `seg`, `seq`) constraining the component type. Matching a name binds
//! each slot's tag to the raw component value.

use crate::error::Error;
use crate::name::{Component, Name};
use crate::Result;
use bytes::Bytes;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Variable bindings captured while matching a name against a pattern.
pub type Matching = HashMap<String, Bytes>;

/// Tag under which a trailing ImplicitSha256Digest component is bound.
pub const TAG_SHA256_DIGEST: &str = "sha256digest";
/// Tag under which a trailing ParametersSha256Digest component is bound.
pub const TAG_PARAMS_SHA256: &str = "params-sha256";
/// Tag under which unmatched trailing components are bound when the
/// matched node accepts prefixes.
pub const TAG_TAIL: &str = "_tail";

/// One element of a [`NamePattern`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternComponent {
    Literal(Component),
    Variable { tag: String, typ: u32 },
}

impl PatternComponent {
    pub fn variable(tag: impl Into<String>, typ: u32) -> Self {
        Self::Variable {
            tag: tag.into(),
            typ,
        }
    }

    /// Does this element accept the given name component? Variables
    /// additionally record the captured value in `matching`.
    pub fn matches(&self, comp: &Component, matching: &mut Matching) -> bool {
        match self {
            Self::Literal(lit) => lit == comp,
            Self::Variable { tag, typ } => {
                if *typ != comp.typ {
                    return false;
                }
                matching.insert(tag.clone(), comp.value.clone());
                true
            }
        }
    }

    /// Substitute a concrete component using the bindings in `matching`.
    pub fn apply(&self, matching: &Matching) -> Result<Component> {
        match self {
            Self::Literal(lit) => Ok(lit.clone()),
            Self::Variable { tag, typ } => {
                let value = matching
                    .get(tag)
                    .ok_or_else(|| Error::NotFound(format!("binding for <{tag}>")))?;
                Ok(Component::new(*typ, value.clone()))
            }
        }
    }

    fn parse_segment(segment: &str) -> Result<Self> {
        if let Some(inner) = segment
            .strip_prefix('<')
            .and_then(|s| s.strip_suffix('>'))
        {
            if inner.is_empty() {
                return Err(Error::Format("empty pattern variable".into()));
            }
            let (conv, tag) = match inner.split_once('=') {
                Some((conv, tag)) => (conv, tag),
                None => return Ok(Self::variable(inner, Component::GENERIC)),
            };
            let typ = match conv {
                "v" => Component::VERSION,
                "t" => Component::TIMESTAMP,
                "seg" => Component::SEGMENT,
                "seq" => Component::SEQUENCE_NUM,
                "sha256digest" => Component::IMPLICIT_SHA256_DIGEST,
                "params-sha256" => Component::PARAMETERS_SHA256_DIGEST,
                other => {
                    return Err(Error::Format(format!(
                        "unknown pattern convention {other:?}"
                    )))
                }
            };
            if tag.is_empty() {
                return Err(Error::Format("empty pattern tag".into()));
            }
            Ok(Self::variable(tag, typ))
        } else {
            Ok(Self::Literal(Component::from_uri(segment)?))
        }
    }
}

impl fmt::Display for PatternComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(comp) => write!(f, "{comp}"),
            Self::Variable { tag, typ } => {
                let conv = match *typ {
                    Component::VERSION => Some("v"),
                    Component::TIMESTAMP => Some("t"),
                    Component::SEGMENT => Some("seg"),
                    Component::SEQUENCE_NUM => Some("seq"),
                    Component::IMPLICIT_SHA256_DIGEST => Some("sha256digest"),
                    Component::PARAMETERS_SHA256_DIGEST => Some("params-sha256"),
                    _ => None,
                };
                match conv {
                    Some(conv) => write!(f, "<{conv}={tag}>"),
                    None => write!(f, "<{tag}>"),
                }
            }
        }
    }
}

/// A name-shaped template; the edge labels of the schema trie.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NamePattern(Vec<PatternComponent>);

impl NamePattern {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn from_components(components: Vec<PatternComponent>) -> Self {
        Self(components)
    }

    /// A pattern of literals mirroring a concrete name.
    pub fn from_name(name: &Name) -> Self {
        Self(
            name.components()
                .iter()
                .cloned()
                .map(PatternComponent::Literal)
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn components(&self) -> &[PatternComponent] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<&PatternComponent> {
        self.0.get(index)
    }

    pub fn push(&mut self, component: PatternComponent) {
        self.0.push(component);
    }

    pub fn appended(mut self, component: PatternComponent) -> Self {
        self.0.push(component);
        self
    }

    /// Concatenate two patterns.
    pub fn join(&self, suffix: &NamePattern) -> NamePattern {
        let mut out = self.clone();
        out.0.extend(suffix.0.iter().cloned());
        out
    }

    /// True when the pattern contains no variable slots.
    pub fn is_concrete(&self) -> bool {
        self.0
            .iter()
            .all(|c| matches!(c, PatternComponent::Literal(_)))
    }

    /// Substitute all slots from `matching`, yielding a concrete name.
    pub fn apply(&self, matching: &Matching) -> Result<Name> {
        let mut components = Vec::with_capacity(self.0.len());
        for pc in &self.0 {
            components.push(pc.apply(matching)?);
        }
        Ok(Name::from_components(components))
    }

    /// Match the whole of `name` against the whole of this pattern.
    ///
    /// Succeeds only on equal lengths; the schema trie handles prefix
    /// semantics itself during descent.
    pub fn matches(&self, name: &Name) -> Option<Matching> {
        if self.0.len() != name.len() {
            return None;
        }
        let mut matching = Matching::new();
        for (pc, comp) in self.0.iter().zip(name.components()) {
            if !pc.matches(comp, &mut matching) {
                return None;
            }
        }
        Some(matching)
    }
}

impl FromStr for NamePattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut components = Vec::new();
        for segment in s.split('/') {
            if segment.is_empty() {
                continue;
            }
            components.push(PatternComponent::parse_segment(segment)?);
        }
        Ok(Self(components))
    }
}

impl fmt::Display for NamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for comp in &self.0 {
            write!(f, "/{comp}")?;
        }
        Ok(())
    }
}

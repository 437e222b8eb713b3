//! Typed namespace paths.
//!
//! A namespace both prefixes a model's action types and addresses its slice
//! in the root state tree: each segment is one level of nesting.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use super::error::ModelError;

/// Separator between namespace segments and between a namespace and an
/// operation name in an action type.
pub const SEPARATOR: char = '/';

/// Validated, ordered list of path segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Namespace {
    segments: Vec<String>,
}

impl Namespace {
    /// Parse a slash-delimited path such as `"pages/articles"`.
    pub fn parse(input: &str) -> Result<Self, ModelError> {
        Self::from_segments(input.split(SEPARATOR))
    }

    /// Build a namespace from explicit segments.
    pub fn from_segments<I, S>(segments: I) -> Result<Self, ModelError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        let display = segments.join("/");
        if segments.is_empty() {
            return Err(ModelError::InvalidNamespace {
                input: display,
                reason: "namespace has no segments".to_string(),
            });
        }
        for segment in &segments {
            if segment.is_empty() {
                return Err(ModelError::InvalidNamespace {
                    input: display,
                    reason: "empty segment".to_string(),
                });
            }
            if segment.contains(SEPARATOR) {
                return Err(ModelError::InvalidNamespace {
                    input: display,
                    reason: format!("segment '{}' contains '{}'", segment, SEPARATOR),
                });
            }
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// True when the namespace spans more than one level of the state tree.
    pub fn is_nested(&self) -> bool {
        self.segments.len() > 1
    }

    /// Action type for an operation of this namespace.
    ///
    /// Qualified names (already containing a separator) are returned verbatim.
    pub fn type_for(&self, name: &str) -> String {
        if is_qualified(name) {
            name.to_string()
        } else {
            format!("{}{}{}", self, SEPARATOR, name)
        }
    }

    /// True when `other` lies on the same branch of the state tree, i.e. one
    /// is a prefix of (or equal to) the other.
    pub fn overlaps(&self, other: &Namespace) -> bool {
        let len = self.segments.len().min(other.segments.len());
        self.segments[..len] == other.segments[..len]
    }

    /// Read this namespace's slice out of a root state tree.
    pub fn select<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(root, |node, segment| node.get(segment.as_str()))
    }

    /// Mutable slot for this namespace's slice, creating intermediate objects
    /// as needed. Non-object intermediates are replaced by empty objects.
    pub(crate) fn slot_mut<'a>(&self, root: &'a mut Value) -> &'a mut Value {
        let mut node = root;
        for segment in &self.segments {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            let Value::Object(map) = node else {
                unreachable!("node was just made an object")
            };
            node = map.entry(segment.clone()).or_insert(Value::Null);
        }
        node
    }

    /// Remove this namespace's slice from a root state tree.
    pub(crate) fn remove_from(&self, root: &mut Value) -> Option<Value> {
        let (last, parents) = self.segments.split_last()?;
        let mut node = root;
        for segment in parents {
            node = node.get_mut(segment.as_str())?;
        }
        node.as_object_mut()?.remove(last.as_str())
    }
}

/// True when an operation name already carries a namespace.
pub fn is_qualified(name: &str) -> bool {
    name.contains(SEPARATOR)
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

impl FromStr for Namespace {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

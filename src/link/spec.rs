//! Textual link specifications
//!
//! Two forms are accepted:
//! - `Obj1.attr1:Obj2.attr2`: a full link between two named objects
//! - `Obj.attr`: one side only, for links whose other side is already known
//!
//! Whitespace anywhere in the text is ignored, so `"lineEdit.text : label.text"`
//! is the same as `"lineEdit.text:label.text"`.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// The text does not split into exactly two colon-separated halves.
    SideCount,
    /// One half of a link is not `Obj.prop`.
    SideShape,
    /// A single reference is not `Obj.prop`.
    RefShape,
    /// An object or attribute name is empty.
    EmptyName,
}

impl ParseErrorKind {
    fn message(self) -> &'static str {
        match self {
            Self::SideCount => "Use format Obj.prop:Other.prop",
            Self::SideShape => "Each side must be Obj.prop",
            Self::RefShape => "Use format Obj.prop",
            Self::EmptyName => "Empty object or property name.",
        }
    }
}

/// Malformed specification text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} (got \"{spec}\")", .kind.message())]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub spec: String,
}

impl ParseError {
    fn new(kind: ParseErrorKind, spec: &str) -> Self {
        Self {
            kind,
            spec: spec.to_string(),
        }
    }
}

/// `Obj.attr`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttrRef {
    pub object: String,
    pub attribute: String,
}

impl fmt::Display for AttrRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.object, self.attribute)
    }
}

impl FromStr for AttrRef {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_attr_ref(s)
    }
}

/// `Obj1.attr1:Obj2.attr2`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkSpec {
    pub left: AttrRef,
    pub right: AttrRef,
}

impl fmt::Display for LinkSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.left, self.right)
    }
}

impl FromStr for LinkSpec {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_link_spec(s)
    }
}

fn strip_whitespace(spec: &str) -> String {
    spec.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Split `Obj.attr` into its two tokens; `None` unless there are exactly two.
fn split_ref(side: &str) -> Option<(&str, &str)> {
    let mut parts = side.split('.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(object), Some(attribute), None) => Some((object, attribute)),
        _ => None,
    }
}

fn make_ref(object: &str, attribute: &str, spec: &str) -> Result<AttrRef, ParseError> {
    if object.is_empty() || attribute.is_empty() {
        return Err(ParseError::new(ParseErrorKind::EmptyName, spec));
    }
    Ok(AttrRef {
        object: object.to_string(),
        attribute: attribute.to_string(),
    })
}

pub fn parse_link_spec(spec: &str) -> Result<LinkSpec, ParseError> {
    let s = strip_whitespace(spec);
    let halves: Vec<&str> = s.split(':').collect();
    let [left, right] = halves.as_slice() else {
        return Err(ParseError::new(ParseErrorKind::SideCount, spec));
    };

    let (Some((lo, la)), Some((ro, ra))) = (split_ref(left), split_ref(right)) else {
        return Err(ParseError::new(ParseErrorKind::SideShape, spec));
    };

    Ok(LinkSpec {
        left: make_ref(lo, la, spec)?,
        right: make_ref(ro, ra, spec)?,
    })
}

pub fn parse_attr_ref(spec: &str) -> Result<AttrRef, ParseError> {
    let s = strip_whitespace(spec);
    let Some((object, attribute)) = split_ref(&s) else {
        return Err(ParseError::new(ParseErrorKind::RefShape, spec));
    };
    make_ref(object, attribute, spec)
}

//! The static type hierarchy.
//!
//! Every type has exactly one direct supertype except `item()`. Subtype tests
//! walk this table; nothing is encoded in Rust type relationships.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;
use string_cache::DefaultAtom;

const PARENTS: &[(&str, &str)] = &[
    ("node()", "item()"),
    ("function(*)", "item()"),
    ("xs:anyAtomicType", "item()"),
    ("map(*)", "function(*)"),
    ("array(*)", "function(*)"),
    ("document()", "node()"),
    ("element()", "node()"),
    ("attribute()", "node()"),
    ("text()", "node()"),
    ("comment()", "node()"),
    ("processing-instruction()", "node()"),
    ("xs:untypedAtomic", "xs:anyAtomicType"),
    ("xs:string", "xs:anyAtomicType"),
    ("xs:normalizedString", "xs:string"),
    ("xs:token", "xs:normalizedString"),
    ("xs:language", "xs:token"),
    ("xs:NMTOKEN", "xs:token"),
    ("xs:Name", "xs:token"),
    ("xs:NCName", "xs:Name"),
    ("xs:ID", "xs:NCName"),
    ("xs:IDREF", "xs:NCName"),
    ("xs:ENTITY", "xs:NCName"),
    ("xs:anyURI", "xs:anyAtomicType"),
    ("xs:boolean", "xs:anyAtomicType"),
    ("xs:numeric", "xs:anyAtomicType"),
    ("xs:decimal", "xs:numeric"),
    ("xs:float", "xs:numeric"),
    ("xs:double", "xs:numeric"),
    ("xs:integer", "xs:decimal"),
    ("xs:nonPositiveInteger", "xs:integer"),
    ("xs:negativeInteger", "xs:nonPositiveInteger"),
    ("xs:long", "xs:integer"),
    ("xs:int", "xs:long"),
    ("xs:short", "xs:int"),
    ("xs:byte", "xs:short"),
    ("xs:nonNegativeInteger", "xs:integer"),
    ("xs:unsignedLong", "xs:nonNegativeInteger"),
    ("xs:unsignedInt", "xs:unsignedLong"),
    ("xs:unsignedShort", "xs:unsignedInt"),
    ("xs:unsignedByte", "xs:unsignedShort"),
    ("xs:positiveInteger", "xs:nonNegativeInteger"),
    ("xs:QName", "xs:anyAtomicType"),
    ("xs:NOTATION", "xs:anyAtomicType"),
    ("xs:duration", "xs:anyAtomicType"),
    ("xs:yearMonthDuration", "xs:duration"),
    ("xs:dayTimeDuration", "xs:duration"),
    ("xs:dateTime", "xs:anyAtomicType"),
    ("xs:dateTimeStamp", "xs:dateTime"),
    ("xs:date", "xs:anyAtomicType"),
    ("xs:time", "xs:anyAtomicType"),
    ("xs:gYearMonth", "xs:anyAtomicType"),
    ("xs:gYear", "xs:anyAtomicType"),
    ("xs:gMonthDay", "xs:anyAtomicType"),
    ("xs:gDay", "xs:anyAtomicType"),
    ("xs:gMonth", "xs:anyAtomicType"),
    ("xs:hexBinary", "xs:anyAtomicType"),
    ("xs:base64Binary", "xs:anyAtomicType"),
];

/// Abstract atomic types that no value can have.
const ABSTRACT: &[&str] = &["xs:anyAtomicType", "xs:numeric", "xs:NOTATION"];

static HIERARCHY: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| PARENTS.iter().copied().collect());

pub fn supertype(name: &str) -> Option<&'static str> {
    HIERARCHY.get(name).copied()
}

pub fn is_known_type(name: &str) -> bool {
    name == "item()" || HIERARCHY.contains_key(name)
}

/// True iff `ancestor` lies on the path from `name` to `item()`, inclusive.
pub fn is_subtype_of(name: &str, ancestor: &str) -> bool {
    if name == ancestor {
        return is_known_type(name);
    }
    let mut cur = supertype(name);
    while let Some(t) = cur {
        if t == ancestor {
            return true;
        }
        cur = supertype(t);
    }
    false
}

/// Concrete atomic types a value may carry.
pub fn concrete_atomic_types() -> impl Iterator<Item = &'static str> {
    PARENTS
        .iter()
        .map(|(t, _)| *t)
        .filter(|t| t.starts_with("xs:") && !ABSTRACT.contains(t))
}

/// The primitive ancestor (`xs:integer` counts as primitive).
pub fn primitive_type(name: &str) -> Option<&'static str> {
    let mut cur: &'static str = HIERARCHY.get_key_value(name).map(|(k, _)| *k)?;
    loop {
        if cur == "xs:integer" {
            return Some(cur);
        }
        match supertype(cur)? {
            "xs:anyAtomicType" | "xs:numeric" => return Some(cur),
            "item()" => return None,
            parent => cur = parent,
        }
    }
}

/// An interned type name such as `xs:integer` or `map(*)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeName(DefaultAtom);

impl TypeName {
    pub fn new(name: &str) -> Self {
        Self(DefaultAtom::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_subtype_of(&self, ancestor: &str) -> bool {
        is_subtype_of(self.as_str(), ancestor)
    }

    pub fn is_atomic(&self) -> bool {
        self.is_subtype_of("xs:anyAtomicType")
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Occurrence {
    ExactlyOne,
    ZeroOrOne,
    ZeroOrMore,
    OneOrMore,
}

impl Occurrence {
    pub fn allows(self, count: usize) -> bool {
        match self {
            Occurrence::ExactlyOne => count == 1,
            Occurrence::ZeroOrOne => count <= 1,
            Occurrence::ZeroOrMore => true,
            Occurrence::OneOrMore => count >= 1,
        }
    }

    pub fn max_one(self) -> bool {
        matches!(self, Occurrence::ExactlyOne | Occurrence::ZeroOrOne)
    }
}

/// An item type with an occurrence indicator, e.g. `xs:string*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SequenceType {
    pub item_type: TypeName,
    pub occurrence: Occurrence,
}

impl SequenceType {
    pub fn new(item_type: &str, occurrence: Occurrence) -> Self {
        Self { item_type: TypeName::new(item_type), occurrence }
    }

    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        let (item, occurrence) = match s.as_bytes().last() {
            Some(b'?') => (&s[..s.len() - 1], Occurrence::ZeroOrOne),
            Some(b'*') => (&s[..s.len() - 1], Occurrence::ZeroOrMore),
            Some(b'+') => (&s[..s.len() - 1], Occurrence::OneOrMore),
            _ => (s, Occurrence::ExactlyOne),
        };
        Self::new(item, occurrence)
    }

    pub fn item() -> Self {
        Self::new("item()", Occurrence::ZeroOrMore)
    }

    pub fn is_atomic(&self) -> bool {
        self.item_type.is_atomic()
    }
}

impl fmt::Display for SequenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = match self.occurrence {
            Occurrence::ExactlyOne => "",
            Occurrence::ZeroOrOne => "?",
            Occurrence::ZeroOrMore => "*",
            Occurrence::OneOrMore => "+",
        };
        write!(f, "{}{suffix}", self.item_type)
    }
}

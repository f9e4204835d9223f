//! Static ranking of expressions.

use crate::model::NodeKind;
use std::fmt;
use string_cache::DefaultAtom;

/// Kinds of specificity in decreasing order of priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecificityKind {
    External,
    Attribute,
    NodeName,
    NodeType,
    Universal,
}

impl SpecificityKind {
    const ALL: [SpecificityKind; 5] = [
        SpecificityKind::External,
        SpecificityKind::Attribute,
        SpecificityKind::NodeName,
        SpecificityKind::NodeType,
        SpecificityKind::Universal,
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn label(self) -> &'static str {
        match self {
            SpecificityKind::External => "external",
            SpecificityKind::Attribute => "attribute",
            SpecificityKind::NodeName => "nodeName",
            SpecificityKind::NodeType => "nodeType",
            SpecificityKind::Universal => "universal",
        }
    }
}

/// Counts per [`SpecificityKind`]. Ordering compares the counts of the
/// highest-priority kind first, then the next, and so on.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Specificity {
    counts: [u32; 5],
}

impl Specificity {
    pub fn new(counts: &[(SpecificityKind, u32)]) -> Self {
        let mut s = Self::default();
        for (kind, n) in counts {
            s.counts[kind.index()] += n;
        }
        s
    }

    pub fn of(kind: SpecificityKind) -> Self {
        Self::new(&[(kind, 1)])
    }

    pub fn count(&self, kind: SpecificityKind) -> u32 {
        self.counts[kind.index()]
    }

    /// Sum of both; used for expressions that must all match.
    #[must_use]
    pub fn add(&self, other: &Specificity) -> Specificity {
        let mut counts = self.counts;
        for (c, o) in counts.iter_mut().zip(other.counts) {
            *c = c.saturating_add(o);
        }
        Specificity { counts }
    }
}

impl fmt::Debug for Specificity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for kind in SpecificityKind::ALL {
            let n = self.count(kind);
            if n > 0 {
                map.entry(&kind.label(), &n);
            }
        }
        map.finish()
    }
}

/// Which nodes an expression could ever match; hosts use it to skip
/// candidates without evaluating anything.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Bucket {
    NodeKind(NodeKind),
    LocalName(DefaultAtom),
}

impl Bucket {
    /// Whether a node of this kind and local name can be in the bucket.
    pub fn admits(&self, kind: NodeKind, local_name: Option<&str>) -> bool {
        match self {
            Bucket::NodeKind(k) => *k == kind,
            Bucket::LocalName(name) => kind == NodeKind::Element && local_name == Some(&**name),
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bucket::NodeKind(k) => write!(f, "type-{}", k.type_name()),
            Bucket::LocalName(name) => write!(f, "name-{name}"),
        }
    }
}

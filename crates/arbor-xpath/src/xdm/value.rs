use super::atomic::AtomicValue;
use super::types::{SequenceType, TypeName};
use super::ExpandedName;
use crate::engine::conversion::convert_arguments;
use crate::engine::deep_equal::same_key;
use crate::engine::runtime::{CallContext, Error, ErrorCode};
use crate::engine::sequence::{Sequence, SharedSequence};
use crate::model::XdmNode;
use std::fmt;
use std::rc::Rc;

/// One item of a sequence.
#[derive(Debug, Clone)]
pub enum Value<N> {
    Atomic(AtomicValue),
    Node(N),
    Map(MapValue<N>),
    Array(ArrayValue<N>),
    Function(FunctionValue<N>),
}

impl<N: XdmNode> Value<N> {
    pub fn type_name(&self) -> TypeName {
        match self {
            Value::Atomic(a) => a.type_name().clone(),
            Value::Node(n) => TypeName::new(n.kind().type_name()),
            Value::Map(_) => TypeName::new("map(*)"),
            Value::Array(_) => TypeName::new("array(*)"),
            Value::Function(_) => TypeName::new("function(*)"),
        }
    }

    pub fn is_instance_of(&self, ancestor: &str) -> bool {
        self.type_name().is_subtype_of(ancestor)
    }
}

impl<N> Value<N> {
    pub fn as_node(&self) -> Option<&N> {
        match self {
            Value::Node(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_atomic(&self) -> Option<&AtomicValue> {
        match self {
            Value::Atomic(a) => Some(a),
            _ => None,
        }
    }

    pub fn is_node(&self) -> bool {
        matches!(self, Value::Node(_))
    }
}

impl<N> From<AtomicValue> for Value<N> {
    fn from(a: AtomicValue) -> Self {
        Value::Atomic(a)
    }
}

// ===== Maps =====

/// Insertion-ordered map with atomic keys unique under deep-equality.
pub struct MapValue<N> {
    entries: Rc<Vec<(AtomicValue, SharedSequence<N>)>>,
}

impl<N> Clone for MapValue<N> {
    fn clone(&self) -> Self {
        Self { entries: Rc::clone(&self.entries) }
    }
}

impl<N: XdmNode> MapValue<N> {
    pub fn new(entries: Vec<(AtomicValue, SharedSequence<N>)>) -> Result<Self, Error> {
        for (i, (key, _)) in entries.iter().enumerate() {
            if entries[..i].iter().any(|(k, _)| same_key(k, key)) {
                return Err(Error::from_code(ErrorCode::XQDY0137, format!("duplicate map key {key}")));
            }
        }
        Ok(Self { entries: Rc::new(entries) })
    }

    pub fn empty() -> Self {
        Self { entries: Rc::new(Vec::new()) }
    }

    pub fn get(&self, key: &AtomicValue) -> Option<&SharedSequence<N>> {
        self.entries.iter().find(|(k, _)| same_key(k, key)).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &AtomicValue) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &AtomicValue> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn entries(&self) -> &[(AtomicValue, SharedSequence<N>)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: fmt::Debug> fmt::Debug for MapValue<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter().map(|(k, v)| (k, v))).finish()
    }
}

// ===== Arrays =====

/// Members are independent sequences of any length.
pub struct ArrayValue<N> {
    members: Rc<Vec<SharedSequence<N>>>,
}

impl<N> Clone for ArrayValue<N> {
    fn clone(&self) -> Self {
        Self { members: Rc::clone(&self.members) }
    }
}

impl<N: XdmNode> ArrayValue<N> {
    pub fn new(members: Vec<SharedSequence<N>>) -> Self {
        Self { members: Rc::new(members) }
    }

    /// One member per item.
    pub fn from_items(items: Vec<Value<N>>) -> Self {
        Self::new(items.into_iter().map(|v| SharedSequence::from_vec(vec![v])).collect())
    }

    pub fn members(&self) -> &[SharedSequence<N>] {
        &self.members
    }

    /// Member at a 0-based index.
    pub fn get(&self, index: usize) -> Option<&SharedSequence<N>> {
        self.members.get(index)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl<N: fmt::Debug> fmt::Debug for ArrayValue<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.members.iter()).finish()
    }
}

// ===== Functions =====

pub type FunctionImpl<N> = Rc<dyn Fn(&CallContext<N>, Vec<Sequence<N>>) -> Result<Sequence<N>, Error>>;

pub struct FunctionValue<N> {
    name: Option<ExpandedName>,
    argument_types: Rc<[SequenceType]>,
    return_type: SequenceType,
    implementation: FunctionImpl<N>,
}

impl<N> Clone for FunctionValue<N> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            argument_types: Rc::clone(&self.argument_types),
            return_type: self.return_type.clone(),
            implementation: Rc::clone(&self.implementation),
        }
    }
}

impl<N: XdmNode> FunctionValue<N> {
    pub fn new(
        name: Option<ExpandedName>,
        argument_types: Vec<SequenceType>,
        return_type: SequenceType,
        implementation: FunctionImpl<N>,
    ) -> Self {
        Self { name, argument_types: argument_types.into(), return_type, implementation }
    }

    pub fn name(&self) -> Option<&ExpandedName> {
        self.name.as_ref()
    }

    pub fn arity(&self) -> usize {
        self.argument_types.len()
    }

    pub fn argument_types(&self) -> &[SequenceType] {
        &self.argument_types
    }

    pub fn return_type(&self) -> &SequenceType {
        &self.return_type
    }

    /// Display name used in error messages.
    pub fn label(&self) -> String {
        match &self.name {
            Some(n) => format!("{n}#{}", self.arity()),
            None => format!("(anonymous)#{}", self.arity()),
        }
    }

    /// Call with converted arguments.
    pub fn invoke(&self, ctx: &CallContext<N>, args: Vec<Sequence<N>>) -> Result<Sequence<N>, Error> {
        if args.len() != self.arity() {
            return Err(Error::type_error(format!(
                "expected arity of function {} to be {}, got {} arguments",
                self.label(),
                self.arity(),
                args.len()
            )));
        }
        let args = convert_arguments(&self.argument_types, args, &ctx.params, &self.label())?;
        (self.implementation)(ctx, args)
    }

    /// Bind the supplied arguments; `None` entries stay open and become the
    /// parameters of the returned function.
    pub fn apply_arguments(&self, args: Vec<Option<Sequence<N>>>) -> FunctionValue<N> {
        let mut open_types = Vec::new();
        let bound: Vec<Option<SharedSequence<N>>> = args
            .into_iter()
            .zip(self.argument_types.iter())
            .map(|(arg, ty)| match arg {
                Some(seq) => Some(SharedSequence::new(seq)),
                None => {
                    open_types.push(ty.clone());
                    None
                }
            })
            .collect();
        let inner = self.clone();
        let implementation: FunctionImpl<N> = Rc::new(move |ctx: &CallContext<N>, supplied: Vec<Sequence<N>>| {
            let mut supplied = supplied.into_iter();
            let mut full = Vec::with_capacity(bound.len());
            for slot in &bound {
                match slot {
                    Some(shared) => full.push(shared.reader()),
                    None => full.push(supplied.next().ok_or_else(|| Error::internal("missing placeholder argument"))?),
                }
            }
            inner.invoke(ctx, full)
        });
        FunctionValue::new(None, open_types, self.return_type.clone(), implementation)
    }
}

impl<N> fmt::Debug for FunctionValue<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionValue")
            .field("name", &self.name)
            .field("arity", &self.argument_types.len())
            .finish_non_exhaustive()
    }
}

use crate::consts::{ARRAY_NS, ERR_NS, FNS, MAP_NS, MATH_NS, XML_URI, XS};
use crate::engine::sequence::{Sequence, SharedSequence};
use crate::engine::suspend::Fetch;
use crate::model::{DocumentFacade, XdmNode};
use crate::xdm::{ExpandedName, FunctionValue, SequenceType, Value};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// Error codes raised by the engine (namespace `http://www.w3.org/2005/xqt-errors`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    FOAR0001, // division by zero
    FOAR0002, // numeric overflow
    FOAY0001, // array index out of bounds
    FOAY0002, // negative array length
    FOCA0002, // invalid lexical value for numeric cast
    FOER0000, // unidentified error
    FOJS0001, // invalid JSON
    FONS0004, // no namespace for prefix
    FORG0001, // invalid value for cast
    FORG0006, // invalid argument type (EBV)
    FOTY0013, // function item cannot be atomized
    XPDY0002, // context item absent
    XPST0008, // undefined variable
    XPST0017, // unknown function
    XPTY0004, // type error
    XPTY0018, // mixed nodes and non-nodes in path result
    XPTY0019, // non-node on the left of a path step
    XQDY0137, // duplicate map key
    Unknown,
}

/// Coarse classification of error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    TypeMismatch,
    CastError,
    NamespaceResolution,
    Bounds,
    Parse,
    UnsupportedOperation,
    MissingContext,
    Dynamic,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::FOAR0001 => "FOAR0001",
            ErrorCode::FOAR0002 => "FOAR0002",
            ErrorCode::FOAY0001 => "FOAY0001",
            ErrorCode::FOAY0002 => "FOAY0002",
            ErrorCode::FOCA0002 => "FOCA0002",
            ErrorCode::FOER0000 => "FOER0000",
            ErrorCode::FOJS0001 => "FOJS0001",
            ErrorCode::FONS0004 => "FONS0004",
            ErrorCode::FORG0001 => "FORG0001",
            ErrorCode::FORG0006 => "FORG0006",
            ErrorCode::FOTY0013 => "FOTY0013",
            ErrorCode::XPDY0002 => "XPDY0002",
            ErrorCode::XPST0008 => "XPST0008",
            ErrorCode::XPST0017 => "XPST0017",
            ErrorCode::XPTY0004 => "XPTY0004",
            ErrorCode::XPTY0018 => "XPTY0018",
            ErrorCode::XPTY0019 => "XPTY0019",
            ErrorCode::XQDY0137 => "XQDY0137",
            ErrorCode::Unknown => "UNKNOWN",
        }
    }

    pub fn from_code(s: &str) -> Self {
        use ErrorCode::*;
        let local = s.strip_prefix("err:").unwrap_or(s);
        [
            FOAR0001, FOAR0002, FOAY0001, FOAY0002, FOCA0002, FOER0000, FOJS0001, FONS0004, FORG0001,
            FORG0006, FOTY0013, XPDY0002, XPST0008, XPST0017, XPTY0004, XPTY0018, XPTY0019, XQDY0137,
        ]
        .into_iter()
        .find(|c| c.as_str() == local)
        .unwrap_or(Unknown)
    }

    pub fn qname(self) -> ExpandedName {
        ExpandedName { ns_uri: Some(ERR_NS.to_string()), local: self.as_str().to_string() }
    }

    pub fn kind(self) -> ErrorKind {
        match self {
            ErrorCode::XPTY0004 | ErrorCode::XPTY0018 | ErrorCode::XPTY0019 | ErrorCode::FORG0006 => {
                ErrorKind::TypeMismatch
            }
            ErrorCode::FORG0001 | ErrorCode::FOCA0002 => ErrorKind::CastError,
            ErrorCode::FONS0004 => ErrorKind::NamespaceResolution,
            ErrorCode::FOAY0001 | ErrorCode::FOAY0002 => ErrorKind::Bounds,
            ErrorCode::FOJS0001 => ErrorKind::Parse,
            ErrorCode::FOTY0013 => ErrorKind::UnsupportedOperation,
            ErrorCode::XPDY0002 => ErrorKind::MissingContext,
            ErrorCode::FOAR0001
            | ErrorCode::FOAR0002
            | ErrorCode::FOER0000
            | ErrorCode::XPST0008
            | ErrorCode::XPST0017
            | ErrorCode::XQDY0137
            | ErrorCode::Unknown => ErrorKind::Dynamic,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "err:{}", self.as_str())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{code}: {message}")]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    #[source]
    pub source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    pub fn from_code(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), source: None }
    }

    /// Compose an error with a source cause.
    pub fn with_source(mut self, source: impl Into<Option<Arc<dyn std::error::Error + Send + Sync>>>) -> Self {
        self.source = source.into();
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.code.kind()
    }

    pub(crate) fn type_error(msg: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::XPTY0004, msg)
    }

    pub(crate) fn internal(msg: impl Into<String>) -> Self {
        Self::from_code(ErrorCode::FOER0000, msg)
    }

    pub(crate) fn missing_context(what: &str) -> Self {
        Self::from_code(ErrorCode::XPDY0002, format!("{what} requires a context item"))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::from_code(ErrorCode::FOJS0001, format!("invalid JSON: {e}")).with_source(Some(Arc::new(e) as Arc<dyn std::error::Error + Send + Sync>))
    }
}

impl From<rust_decimal::Error> for Error {
    fn from(e: rust_decimal::Error) -> Self {
        Error::from_code(ErrorCode::FOAR0002, e.to_string()).with_source(Some(Arc::new(e) as Arc<dyn std::error::Error + Send + Sync>))
    }
}

/// Resolves namespace prefixes for QName construction.
pub trait NamespaceResolver {
    fn resolve_namespace(&self, prefix: &str) -> Option<String>;
}

/// Resolver that knows no prefixes at all.
pub struct NoNamespaces;

impl NamespaceResolver for NoNamespaces {
    fn resolve_namespace(&self, prefix: &str) -> Option<String> {
        (prefix == "xml").then(|| XML_URI.to_string())
    }
}

// ===== Function registry =====

/// Built-in and host functions, keyed by expanded name and arity.
pub struct FunctionRegistry<N> {
    fns: HashMap<(ExpandedName, usize), FunctionValue<N>>,
}

impl<N> Default for FunctionRegistry<N> {
    fn default() -> Self {
        Self { fns: HashMap::new() }
    }
}

impl<N: XdmNode> FunctionRegistry<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `ns:local` with declared argument and return types (`"xs:string*"`, `"node()?"`, ...).
    pub fn register(
        &mut self,
        ns: &str,
        local: &str,
        argument_types: &[&str],
        return_type: &str,
        implementation: impl Fn(&CallContext<N>, Vec<Sequence<N>>) -> Result<Sequence<N>, Error> + 'static,
    ) {
        let name = ExpandedName::ns(ns, local);
        let arity = argument_types.len();
        let function = FunctionValue::new(
            Some(name.clone()),
            argument_types.iter().map(|t| SequenceType::parse(t)).collect(),
            SequenceType::parse(return_type),
            Rc::new(implementation),
        );
        self.fns.insert((name, arity), function);
    }

    pub fn lookup(&self, name: &ExpandedName, arity: usize) -> Option<FunctionValue<N>> {
        self.fns.get(&(name.clone(), arity)).cloned()
    }

    pub fn len(&self) -> usize {
        self.fns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fns.is_empty()
    }
}

// ===== Static context =====

pub struct StaticContext<N> {
    namespaces: HashMap<String, String>,
    pub default_element_namespace: Option<String>,
    pub default_function_namespace: String,
    pub functions: Rc<FunctionRegistry<N>>,
}

impl<N: XdmNode> StaticContext<N> {
    pub fn builder() -> StaticContextBuilder<N> {
        StaticContextBuilder::new()
    }

    pub fn namespace_bindings(&self) -> impl Iterator<Item = (&str, &str)> {
        self.namespaces.iter().map(|(p, u)| (p.as_str(), u.as_str()))
    }
}

impl<N: XdmNode> Default for StaticContext<N> {
    fn default() -> Self {
        StaticContextBuilder::new().build()
    }
}

impl<N> NamespaceResolver for StaticContext<N> {
    fn resolve_namespace(&self, prefix: &str) -> Option<String> {
        if prefix.is_empty() {
            return self.default_element_namespace.clone();
        }
        self.namespaces.get(prefix).cloned()
    }
}

impl<N> fmt::Debug for StaticContext<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticContext")
            .field("namespaces", &self.namespaces)
            .field("default_element_namespace", &self.default_element_namespace)
            .field("functions", &self.functions.fns.len())
            .finish()
    }
}

pub struct StaticContextBuilder<N> {
    namespaces: HashMap<String, String>,
    default_element_namespace: Option<String>,
    functions: Option<Rc<FunctionRegistry<N>>>,
}

impl<N: XdmNode> Default for StaticContextBuilder<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: XdmNode> StaticContextBuilder<N> {
    pub fn new() -> Self {
        let namespaces = [
            ("xml", XML_URI),
            ("xs", XS),
            ("fn", FNS),
            ("map", MAP_NS),
            ("array", ARRAY_NS),
            ("math", MATH_NS),
            ("err", ERR_NS),
        ]
        .into_iter()
        .map(|(p, u)| (p.to_string(), u.to_string()))
        .collect();
        Self { namespaces, default_element_namespace: None, functions: None }
    }

    pub fn with_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.namespaces.insert(prefix.into(), uri.into());
        self
    }

    pub fn with_default_element_namespace(mut self, uri: impl Into<String>) -> Self {
        self.default_element_namespace = Some(uri.into());
        self
    }

    pub fn with_functions(mut self, reg: Rc<FunctionRegistry<N>>) -> Self {
        self.functions = Some(reg);
        self
    }

    pub fn build(self) -> StaticContext<N> {
        StaticContext {
            namespaces: self.namespaces,
            default_element_namespace: self.default_element_namespace,
            default_function_namespace: FNS.to_string(),
            functions: self.functions.unwrap_or_else(|| Rc::new(crate::engine::functions::default_function_registry())),
        }
    }
}

// ===== Dynamic context =====

/// Immutable evaluation environment. Scoping creates a child that keeps a
/// pointer to its parent; the parent is never changed.
pub struct DynamicContext<N> {
    pub context_item: Option<Value<N>>,
    /// 1-based position of the context item within `context_sequence`.
    pub context_position: usize,
    pub context_sequence: Option<SharedSequence<N>>,
    bindings: Rc<HashMap<ExpandedName, SharedSequence<N>>>,
    parent: Option<Rc<DynamicContext<N>>>,
}

impl<N: Clone> Clone for DynamicContext<N> {
    fn clone(&self) -> Self {
        Self {
            context_item: self.context_item.clone(),
            context_position: self.context_position,
            context_sequence: self.context_sequence.clone(),
            bindings: Rc::clone(&self.bindings),
            parent: self.parent.clone(),
        }
    }
}

impl<N> Default for DynamicContext<N> {
    fn default() -> Self {
        Self {
            context_item: None,
            context_position: 0,
            context_sequence: None,
            bindings: Rc::new(HashMap::new()),
            parent: None,
        }
    }
}

impl<N: XdmNode> DynamicContext<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> DynamicContextBuilder<N> {
        DynamicContextBuilder::default()
    }

    /// Child context focused on one item of `sequence`.
    pub fn scope_with_focus(&self, position: usize, item: Value<N>, sequence: SharedSequence<N>) -> Self {
        Self {
            context_item: Some(item),
            context_position: position,
            context_sequence: Some(sequence),
            bindings: Rc::new(HashMap::new()),
            parent: Some(Rc::new(self.clone())),
        }
    }

    /// Child context adding variable bindings on top of this one.
    pub fn scope_with_variables(&self, bindings: HashMap<ExpandedName, SharedSequence<N>>) -> Self {
        Self {
            context_item: self.context_item.clone(),
            context_position: self.context_position,
            context_sequence: self.context_sequence.clone(),
            bindings: Rc::new(bindings),
            parent: Some(Rc::new(self.clone())),
        }
    }

    pub fn parent(&self) -> Option<&DynamicContext<N>> {
        self.parent.as_deref()
    }

    pub fn lookup_variable(&self, name: &ExpandedName) -> Option<SharedSequence<N>> {
        let mut cur = Some(self);
        while let Some(ctx) = cur {
            if let Some(v) = ctx.bindings.get(name) {
                return Some(v.clone());
            }
            cur = ctx.parent.as_deref();
        }
        None
    }
}

impl<N> fmt::Debug for DynamicContext<N>
where
    N: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicContext")
            .field("context_item", &self.context_item)
            .field("context_position", &self.context_position)
            .field("bindings", &self.bindings.keys().collect::<Vec<_>>())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

pub struct DynamicContextBuilder<N> {
    context_item: Option<Value<N>>,
    variables: HashMap<ExpandedName, SharedSequence<N>>,
}

impl<N> Default for DynamicContextBuilder<N> {
    fn default() -> Self {
        Self { context_item: None, variables: HashMap::new() }
    }
}

impl<N: XdmNode> DynamicContextBuilder<N> {
    pub fn with_context_item(mut self, item: impl Into<Value<N>>) -> Self {
        self.context_item = Some(item.into());
        self
    }

    pub fn with_variable(mut self, name: ExpandedName, value: Vec<Value<N>>) -> Self {
        self.variables.insert(name, SharedSequence::from_vec(value));
        self
    }

    pub fn build(self) -> DynamicContext<N> {
        let context_sequence = self.context_item.clone().map(|i| SharedSequence::from_vec(vec![i]));
        DynamicContext {
            context_position: usize::from(self.context_item.is_some()),
            context_item: self.context_item,
            context_sequence,
            bindings: Rc::new(self.variables),
            parent: None,
        }
    }
}

// ===== Execution parameters =====

/// Capabilities supplied by the host for one evaluation.
pub struct ExecutionParameters<N> {
    pub document: Rc<dyn DocumentFacade<N>>,
}

impl<N> Clone for ExecutionParameters<N> {
    fn clone(&self) -> Self {
        Self { document: Rc::clone(&self.document) }
    }
}

impl<N: XdmNode> ExecutionParameters<N> {
    pub fn new(document: Rc<dyn DocumentFacade<N>>) -> Self {
        Self { document }
    }

    /// Parameters without any document; every facade call fails with XPDY0002.
    pub fn detached() -> Self {
        Self { document: Rc::new(NoDocument) }
    }
}

impl<N> fmt::Debug for ExecutionParameters<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ExecutionParameters")
    }
}

struct NoDocument;

impl NoDocument {
    fn absent<T>() -> Result<Fetch<T>, Error> {
        Err(Error::from_code(ErrorCode::XPDY0002, "no document available during static evaluation"))
    }
}

impl<N: XdmNode> DocumentFacade<N> for NoDocument {
    fn child_nodes(&self, _: &N) -> Result<Fetch<Vec<N>>, Error> {
        Self::absent()
    }
    fn parent_node(&self, _: &N) -> Result<Fetch<Option<N>>, Error> {
        Self::absent()
    }
    fn attribute(&self, _: &N, _: &str) -> Result<Fetch<Option<String>>, Error> {
        Self::absent()
    }
    fn all_attributes(&self, _: &N) -> Result<Fetch<Vec<N>>, Error> {
        Self::absent()
    }
    fn data(&self, _: &N) -> Result<Fetch<String>, Error> {
        Self::absent()
    }
}

// ===== Function call context =====

/// Everything a function implementation may consult.
pub struct CallContext<N> {
    pub dynamic: DynamicContext<N>,
    pub params: ExecutionParameters<N>,
    pub static_ctx: Rc<StaticContext<N>>,
}

impl<N: Clone> Clone for CallContext<N> {
    fn clone(&self) -> Self {
        Self { dynamic: self.dynamic.clone(), params: self.params.clone(), static_ctx: Rc::clone(&self.static_ctx) }
    }
}

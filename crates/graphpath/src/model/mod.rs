//! Addressable locations within a bound object graph.
//!
//! Every backing shape (maps, records, sequences, documents, cells, variables)
//! is exposed through the [`NodePointer`] capability trait. Evaluation only
//! ever sees the cloneable [`Pointer`] handle, which adds identity semantics:
//! two pointers addressing the same logical location compare equal, and all
//! pointers into one graph are totally ordered in document order.
use core::cmp::Ordering;
use core::fmt;
use std::sync::Arc;

use compact_str::CompactString;
use smallvec::SmallVec;

use crate::error::EvalError;
use crate::factory::ObjectFactory;
use crate::value::Value;

mod collection;
mod document;
mod property;
mod scalar;
mod variable;

pub use collection::{ItemPointer, ListPointer};
pub use document::DocNodePointer;
pub use property::{MapPointer, PropertyPointer, RecordPointer};
pub use scalar::{CellPointer, NullPointer, ScalarPointer};
pub use variable::VariablePointer;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    pub prefix: Option<CompactString>,
    pub local: CompactString,
    pub ns_uri: Option<CompactString>,
}

impl QName {
    pub fn local(local: &str) -> Self {
        QName { prefix: None, local: local.into(), ns_uri: None }
    }

    pub fn prefixed(prefix: &str, local: &str) -> Self {
        QName { prefix: Some(prefix.into()), local: local.into(), ns_uri: None }
    }

    /// Split `prefix:local`; anything without a single colon is a local name.
    pub fn parse(text: &str) -> Self {
        match text.split_once(':') {
            Some((prefix, local)) if !prefix.is_empty() && !local.is_empty() => {
                QName::prefixed(prefix, local)
            }
            _ => QName::local(text),
        }
    }

    #[must_use]
    pub fn with_ns_uri(mut self, uri: Option<&str>) -> Self {
        self.ns_uri = uri.map(Into::into);
        self
    }

    /// Name as it appears in keys and paths.
    pub fn lexical(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{}", self.local),
            None => self.local.to_string(),
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(prefix) => write!(f, "{prefix}:{}", self.local),
            None => f.write_str(&self.local),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Root of a tree document.
    Document,
    /// Document element, map key, record property or sequence item.
    Element,
    Attribute,
    Text,
}

/// Node test of a step, with any prefix already resolved to a namespace URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    Name(QName),
    AnyName,
    Prefix { prefix: CompactString, ns_uri: Option<CompactString> },
    Node,
    Text,
}

impl NodeTest {
    pub fn matches(&self, pointer: &Pointer) -> bool {
        match self {
            NodeTest::Node => true,
            NodeTest::Text => pointer.kind() == NodeKind::Text,
            NodeTest::AnyName => {
                matches!(pointer.kind(), NodeKind::Element | NodeKind::Attribute)
                    && pointer.name().is_some()
            }
            NodeTest::Prefix { prefix, ns_uri } => pointer.name().is_some_and(|name| {
                match ns_uri {
                    Some(uri) if pointer.is_namespace_aware() => name.ns_uri.as_ref() == Some(uri),
                    _ => name.prefix.as_ref() == Some(prefix),
                }
            }),
            // Tests without a namespace URI (unprefixed, or with an unbound
            // prefix) compare prefixes, so default-namespace elements match
            // unprefixed names.
            NodeTest::Name(test) => pointer.name().is_some_and(|name| {
                if name.local != test.local {
                    return false;
                }
                match &test.ns_uri {
                    Some(uri) if pointer.is_namespace_aware() => name.ns_uri.as_ref() == Some(uri),
                    _ => name.prefix == test.prefix,
                }
            }),
        }
    }
}

/// Position of a pointer relative to its immediate parent.
///
/// Value-level pointers (the typed view of the value a structural pointer
/// holds) use [`Ordinal::VALUE`]; attributes sort before children.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ordinal {
    pub group: u8,
    pub position: usize,
    pub index: Option<usize>,
    pub label: CompactString,
}

impl Ordinal {
    pub const VALUE: Ordinal =
        Ordinal { group: 0, position: 0, index: None, label: CompactString::const_new("") };

    pub fn attribute(position: usize, label: &str) -> Self {
        Ordinal { group: 1, position, index: None, label: label.into() }
    }

    pub fn child(position: usize, index: Option<usize>, label: &str) -> Self {
        Ordinal { group: 2, position, index, label: label.into() }
    }

    pub fn is_value(&self) -> bool {
        self.group == 0
    }
}

/// Locale a graph is bound with; used by `lang()` and handed to factories.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locale(Arc<str>);

impl Locale {
    pub fn new(tag: &str) -> Self {
        Locale(Arc::from(tag))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Locale {
    fn default() -> Self {
        Locale::new("en")
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Capability interface of one addressing strategy.
///
/// Methods that hand out pointers receive `this`, the [`Pointer`] handle
/// wrapping `self`, so implementations can link new pointers to it.
pub trait NodePointer: Send + Sync + fmt::Debug {
    fn name(&self) -> Option<QName>;

    fn kind(&self) -> NodeKind {
        NodeKind::Element
    }

    /// Value at this location; `Null` when nothing is there.
    fn value(&self) -> Value;

    /// The underlying object, which differs from [`NodePointer::value`] for
    /// document nodes (node handle vs. text content).
    fn node(&self) -> Value {
        self.value()
    }

    /// Like [`NodePointer::value`] but fails for locations that must not be
    /// read while absent, such as undeclared variables.
    fn try_value(&self) -> Result<Value, EvalError> {
        Ok(self.value())
    }

    fn parent(&self) -> Option<Pointer>;

    fn ordinal(&self) -> Ordinal {
        Ordinal::VALUE
    }

    /// Whether the addressed slot currently holds a value.
    fn is_actual(&self) -> bool {
        true
    }

    /// Structural slot owning the value below it (property, variable, cell).
    fn is_container(&self) -> bool {
        false
    }

    /// Addresses a sequence whose items are expanded by filter expressions.
    fn is_collection(&self) -> bool {
        false
    }

    fn is_leaf(&self) -> bool {
        true
    }

    /// Names carry namespace URIs that name tests compare against.
    fn is_namespace_aware(&self) -> bool {
        false
    }

    fn locale(&self) -> Locale {
        self.parent().map(|parent| parent.locale()).unwrap_or_default()
    }

    /// Identity of the graph root, the first component of document order.
    fn root_identity(&self) -> usize {
        self.parent().map_or(0, |parent| parent.root_identity())
    }

    fn namespace_uri(&self, prefix: &str) -> Option<String> {
        self.parent().and_then(|parent| parent.namespace_uri(prefix))
    }

    /// Terminal pointer for the value held here.
    fn value_pointer(&self, this: &Pointer) -> Pointer {
        this.clone()
    }

    fn children(&self, _this: &Pointer) -> Vec<Pointer> {
        Vec::new()
    }

    fn attributes(&self, _this: &Pointer) -> Vec<Pointer> {
        Vec::new()
    }

    /// Members a filter expression iterates; the pointer itself unless it is
    /// a collection.
    fn items(&self, this: &Pointer) -> Vec<Pointer> {
        vec![this.clone()]
    }

    /// First child (or attribute) called `name`, or a non-actual slot where
    /// it would be created.
    fn child_slot(&self, this: &Pointer, name: &QName, attribute: bool) -> Pointer {
        let found = if attribute { this.attributes() } else { this.children() };
        let test = NodeTest::Name(name.clone());
        found
            .into_iter()
            .find(|candidate| test.matches(candidate))
            .unwrap_or_else(|| NullPointer::slot(this.clone(), name.clone(), attribute))
    }

    fn set_value(&self, value: Value) -> Result<(), EvalError>;

    fn remove(&self) -> Result<(), EvalError> {
        Err(EvalError::CannotRemove(self.path_segment()))
    }

    /// Materialize this location (and its ancestors), optionally assigning
    /// `value`. Returns the pointer now addressing the location.
    fn create_path(
        &self,
        this: &Pointer,
        _factory: &dyn ObjectFactory,
        value: Option<Value>,
    ) -> Result<Pointer, EvalError> {
        if let Some(value) = value {
            self.set_value(value)?;
        }
        Ok(this.clone())
    }

    /// Create the child or attribute `name` below this value-level pointer.
    fn create_child(
        &self,
        this: &Pointer,
        _factory: &dyn ObjectFactory,
        name: &QName,
        _attribute: bool,
        _value: Option<Value>,
    ) -> Result<Pointer, EvalError> {
        Err(EvalError::CannotCreate(format!(
            "child '{name}' of {} holding a {}",
            this.as_path(),
            self.value().type_name()
        )))
    }

    /// One step of the canonical path; empty for value-level pointers.
    fn path_segment(&self) -> String;
}

/// Cloneable handle to an addressable location.
#[derive(Clone)]
pub struct Pointer(Arc<dyn NodePointer>);

impl Pointer {
    pub fn new(inner: impl NodePointer + 'static) -> Self {
        Pointer(Arc::new(inner))
    }

    pub fn from_arc(inner: Arc<dyn NodePointer>) -> Self {
        Pointer(inner)
    }

    pub fn name(&self) -> Option<QName> {
        self.0.name()
    }

    pub fn kind(&self) -> NodeKind {
        self.0.kind()
    }

    pub fn value(&self) -> Value {
        self.0.value()
    }

    pub fn try_value(&self) -> Result<Value, EvalError> {
        self.0.try_value()
    }

    pub fn node(&self) -> Value {
        self.0.node()
    }

    pub fn parent(&self) -> Option<Pointer> {
        self.0.parent()
    }

    pub fn ordinal(&self) -> Ordinal {
        self.0.ordinal()
    }

    pub fn is_actual(&self) -> bool {
        self.0.is_actual()
    }

    pub fn is_container(&self) -> bool {
        self.0.is_container()
    }

    pub fn is_collection(&self) -> bool {
        self.0.is_collection()
    }

    pub fn is_leaf(&self) -> bool {
        self.0.is_leaf()
    }

    pub fn is_namespace_aware(&self) -> bool {
        self.0.is_namespace_aware()
    }

    pub fn locale(&self) -> Locale {
        self.0.locale()
    }

    pub fn root_identity(&self) -> usize {
        self.0.root_identity()
    }

    pub fn namespace_uri(&self, prefix: &str) -> Option<String> {
        self.0.namespace_uri(prefix)
    }

    pub fn value_pointer(&self) -> Pointer {
        self.0.value_pointer(self)
    }

    pub fn children(&self) -> Vec<Pointer> {
        self.0.children(self)
    }

    pub fn attributes(&self) -> Vec<Pointer> {
        self.0.attributes(self)
    }

    pub fn items(&self) -> Vec<Pointer> {
        self.0.items(self)
    }

    pub fn child_slot(&self, name: &QName, attribute: bool) -> Pointer {
        self.0.child_slot(self, name, attribute)
    }

    pub fn set_value(&self, value: Value) -> Result<(), EvalError> {
        self.0.set_value(value)
    }

    pub fn remove(&self) -> Result<(), EvalError> {
        self.0.remove()
    }

    pub fn create_path(
        &self,
        factory: &dyn ObjectFactory,
        value: Option<Value>,
    ) -> Result<Pointer, EvalError> {
        self.0.create_path(self, factory, value)
    }

    pub fn create_child(
        &self,
        factory: &dyn ObjectFactory,
        name: &QName,
        attribute: bool,
        value: Option<Value>,
    ) -> Result<Pointer, EvalError> {
        self.0.create_child(self, factory, name, attribute, value)
    }

    /// Nearest ancestor that is a node of its own, skipping value-level
    /// views of the same location.
    pub fn structural_parent(&self) -> Option<Pointer> {
        let mut current = self.parent()?;
        while current.ordinal().is_value() {
            match current.parent() {
                Some(next) => current = next,
                None => return Some(current),
            }
        }
        Some(current)
    }

    /// The pointer itself when it is a node, otherwise the structural
    /// location it is a view of.
    pub fn structural(&self) -> Pointer {
        if self.ordinal().is_value()
            && let Some(parent) = self.parent()
        {
            return parent.structural();
        }
        self.clone()
    }

    fn ordinal_path(&self) -> SmallVec<[Ordinal; 8]> {
        let mut path: SmallVec<[Ordinal; 8]> = SmallVec::new();
        let mut current = Some(self.clone());
        while let Some(pointer) = current {
            path.push(pointer.ordinal());
            current = pointer.parent();
        }
        path.reverse();
        path
    }

    /// Canonical path of this location, such as `/orders[2]/@id`.
    pub fn as_path(&self) -> String {
        let mut segments: Vec<String> = Vec::new();
        let mut current = Some(self.clone());
        while let Some(pointer) = current {
            let segment = pointer.0.path_segment();
            if !segment.is_empty() {
                segments.push(segment);
            }
            current = pointer.parent();
        }
        let mut path = String::new();
        for segment in segments.into_iter().rev() {
            if segment.starts_with('[') {
                if path.is_empty() {
                    path.push_str("/.");
                }
            } else if !segment.starts_with('$') {
                path.push('/');
            }
            path.push_str(&segment);
        }
        if path.is_empty() {
            path.push('/');
        }
        path
    }
}

impl PartialEq for Pointer {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Pointer {}

impl PartialOrd for Pointer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pointer {
    fn cmp(&self, other: &Self) -> Ordering {
        self.root_identity()
            .cmp(&other.root_identity())
            .then_with(|| self.ordinal_path().cmp(&other.ordinal_path()))
    }
}

impl fmt::Debug for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pointer")
            .field("path", &self.as_path())
            .field("actual", &self.is_actual())
            .finish()
    }
}

impl fmt::Display for Pointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_path())
    }
}

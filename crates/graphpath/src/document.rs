//! In-memory tree documents: elements, attributes and text under a document
//! root, with namespace declarations and in-place mutation.
//!
//! Example:
//! ```
//! use graphpath::document::{attr, doc, elem, ns, text};
//!
//! // <root xmlns:p="urn:one" id="r"><child>Hello</child></root>
//! let document = doc()
//!     .child(
//!         elem("root")
//!             .namespace(ns("p", "urn:one"))
//!             .attr(attr("id", "r"))
//!             .child(elem("child").child(text("Hello"))),
//!     )
//!     .build();
//! let root = document.children()[0].clone();
//! assert_eq!(root.lookup_namespace_uri("p").as_deref(), Some("urn:one"));
//! assert_eq!(root.string_value(), "Hello");
//! ```
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use compact_str::CompactString;

use crate::model::{NodeKind, QName};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub prefix: CompactString,
    pub uri: CompactString,
}

struct Inner {
    kind: NodeKind,
    name: Option<QName>,
    value: RwLock<Option<String>>,
    parent: RwLock<Option<Weak<Inner>>>,
    attributes: RwLock<Vec<DocNode>>,
    namespaces: RwLock<Vec<Namespace>>,
    children: RwLock<Vec<DocNode>>,
}

fn read<T: Clone>(lock: &RwLock<T>) -> T {
    lock.read().unwrap_or_else(PoisonError::into_inner).clone()
}

/// Handle to a document node; clones share the node.
#[derive(Clone)]
pub struct DocNode(Arc<Inner>);

impl PartialEq for DocNode {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for DocNode {}

impl std::hash::Hash for DocNode {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Debug for DocNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocNode")
            .field("kind", &self.0.kind)
            .field("name", &self.0.name)
            .field("value", &read(&self.0.value))
            .finish()
    }
}

impl DocNode {
    fn new(kind: NodeKind, name: Option<QName>, value: Option<String>) -> Self {
        DocNode(Arc::new(Inner {
            kind,
            name,
            value: RwLock::new(value),
            parent: RwLock::new(None),
            attributes: RwLock::new(Vec::new()),
            namespaces: RwLock::new(Vec::new()),
            children: RwLock::new(Vec::new()),
        }))
    }

    pub fn document() -> DocBuilder {
        DocBuilder::new(DocNode::new(NodeKind::Document, None, None))
    }

    pub fn element(name: &str) -> DocBuilder {
        DocBuilder::new(DocNode::new(NodeKind::Element, Some(QName::parse(name)), None))
    }

    pub fn attribute(name: &str, value: &str) -> DocNode {
        DocNode::new(NodeKind::Attribute, Some(QName::parse(name)), Some(value.to_string()))
    }

    pub fn text(value: &str) -> DocNode {
        DocNode::new(NodeKind::Text, None, Some(value.to_string()))
    }

    pub fn kind(&self) -> NodeKind {
        self.0.kind
    }

    /// Lexical name as written, prefix included.
    pub fn name(&self) -> Option<QName> {
        self.0.name.clone()
    }

    /// Name with the namespace URI its prefix (or the default namespace)
    /// resolves to. Unprefixed attributes are never in a namespace.
    pub fn expanded_name(&self) -> Option<QName> {
        let name = self.0.name.clone()?;
        let uri = match (&name.prefix, self.0.kind) {
            (Some(prefix), _) => self.lookup_namespace_uri(prefix),
            (None, NodeKind::Element) => self.lookup_namespace_uri(""),
            (None, _) => None,
        };
        Some(name.with_ns_uri(uri.as_deref()))
    }

    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    pub fn string_value(&self) -> String {
        match self.0.kind {
            NodeKind::Text | NodeKind::Attribute => read(&self.0.value).unwrap_or_default(),
            NodeKind::Element | NodeKind::Document => {
                fn collect(node: &DocNode, out: &mut String) {
                    for child in node.children() {
                        if child.kind() == NodeKind::Text {
                            if let Some(text) = read(&child.0.value) {
                                out.push_str(&text);
                            }
                        } else {
                            collect(&child, out);
                        }
                    }
                }
                let mut out = String::new();
                collect(self, &mut out);
                out
            }
        }
    }

    pub fn parent(&self) -> Option<DocNode> {
        read(&self.0.parent).and_then(|weak| weak.upgrade()).map(DocNode)
    }

    pub fn children(&self) -> Vec<DocNode> {
        read(&self.0.children)
    }

    pub fn attributes(&self) -> Vec<DocNode> {
        read(&self.0.attributes)
    }

    pub fn namespaces(&self) -> Vec<Namespace> {
        read(&self.0.namespaces)
    }

    /// Resolve a prefix by walking the ancestor chain, self included. The
    /// empty prefix looks up the default namespace.
    pub fn lookup_namespace_uri(&self, prefix: &str) -> Option<String> {
        if prefix == "xml" {
            return Some("http://www.w3.org/XML/1998/namespace".to_string());
        }
        let mut current = Some(self.clone());
        while let Some(node) = current {
            if let Some(found) = node.namespaces().into_iter().find(|ns| ns.prefix == prefix) {
                return Some(found.uri.to_string());
            }
            current = node.parent();
        }
        None
    }

    /// Replace text content: the value of attributes and text nodes, the
    /// single text child of elements.
    pub fn set_text(&self, value: &str) {
        match self.0.kind {
            NodeKind::Text | NodeKind::Attribute => {
                *self.0.value.write().unwrap_or_else(PoisonError::into_inner) =
                    Some(value.to_string());
            }
            NodeKind::Element | NodeKind::Document => {
                let text = DocNode::text(value);
                text.attach_to(self);
                *self.0.children.write().unwrap_or_else(PoisonError::into_inner) = vec![text];
            }
        }
    }

    fn attach_to(&self, parent: &DocNode) {
        *self.0.parent.write().unwrap_or_else(PoisonError::into_inner) =
            Some(Arc::downgrade(&parent.0));
    }

    pub fn append_child(&self, child: DocNode) {
        child.attach_to(self);
        self.0.children.write().unwrap_or_else(PoisonError::into_inner).push(child);
    }

    /// Set (or add) attribute `name`, returning the attribute node.
    pub fn set_attribute(&self, name: &str, value: &str) -> DocNode {
        let qname = QName::parse(name);
        let existing = self.attributes().into_iter().find(|a| a.0.name.as_ref() == Some(&qname));
        if let Some(attribute) = existing {
            attribute.set_text(value);
            return attribute;
        }
        let attribute = DocNode::attribute(name, value);
        attribute.attach_to(self);
        self.0.attributes.write().unwrap_or_else(PoisonError::into_inner).push(attribute.clone());
        attribute
    }

    /// Detach this node from its parent. Returns false for roots.
    pub fn detach(&self) -> bool {
        let Some(parent) = self.parent() else {
            return false;
        };
        let list = if self.0.kind == NodeKind::Attribute {
            &parent.0.attributes
        } else {
            &parent.0.children
        };
        let mut nodes = list.write().unwrap_or_else(PoisonError::into_inner);
        let before = nodes.len();
        nodes.retain(|node| node != self);
        let removed = nodes.len() != before;
        drop(nodes);
        *self.0.parent.write().unwrap_or_else(PoisonError::into_inner) = None;
        removed
    }

    /// Index among the parent's attributes or children.
    pub fn position(&self) -> Option<usize> {
        let parent = self.parent()?;
        let siblings =
            if self.0.kind == NodeKind::Attribute { parent.attributes() } else { parent.children() };
        siblings.iter().position(|node| node == self)
    }
}

pub struct DocBuilder {
    node: DocNode,
    pending_children: Vec<DocNode>,
    pending_attrs: Vec<DocNode>,
    pending_ns: Vec<Namespace>,
}

impl DocBuilder {
    fn new(node: DocNode) -> Self {
        DocBuilder {
            node,
            pending_children: Vec::new(),
            pending_attrs: Vec::new(),
            pending_ns: Vec::new(),
        }
    }

    #[must_use]
    pub fn child(mut self, child: impl Into<NodeOrBuilder>) -> Self {
        self.pending_children.push(child.into().build());
        self
    }

    #[must_use]
    pub fn children<I: IntoIterator<Item = NodeOrBuilder>>(mut self, it: I) -> Self {
        self.pending_children.extend(it.into_iter().map(NodeOrBuilder::build));
        self
    }

    #[must_use]
    pub fn attr(mut self, attr: DocNode) -> Self {
        debug_assert!(attr.kind() == NodeKind::Attribute);
        self.pending_attrs.push(attr);
        self
    }

    #[must_use]
    pub fn namespace(mut self, ns: Namespace) -> Self {
        self.pending_ns.push(ns);
        self
    }

    pub fn build(self) -> DocNode {
        for attr in &self.pending_attrs {
            attr.attach_to(&self.node);
        }
        for child in &self.pending_children {
            child.attach_to(&self.node);
        }
        self.node.0.attributes.write().unwrap_or_else(PoisonError::into_inner).extend(self.pending_attrs);
        self.node.0.namespaces.write().unwrap_or_else(PoisonError::into_inner).extend(self.pending_ns);
        self.node.0.children.write().unwrap_or_else(PoisonError::into_inner).extend(self.pending_children);
        self.node
    }
}

pub enum NodeOrBuilder {
    Built(DocNode),
    Builder(DocBuilder),
}

impl NodeOrBuilder {
    fn build(self) -> DocNode {
        match self {
            NodeOrBuilder::Built(node) => node,
            NodeOrBuilder::Builder(builder) => builder.build(),
        }
    }
}

impl From<DocNode> for NodeOrBuilder {
    fn from(n: DocNode) -> Self {
        NodeOrBuilder::Built(n)
    }
}

impl From<DocBuilder> for NodeOrBuilder {
    fn from(b: DocBuilder) -> Self {
        NodeOrBuilder::Builder(b)
    }
}

pub fn doc() -> DocBuilder {
    DocNode::document()
}

pub fn elem(name: &str) -> DocBuilder {
    DocNode::element(name)
}

pub fn attr(name: &str, value: &str) -> DocNode {
    DocNode::attribute(name, value)
}

pub fn text(value: &str) -> DocNode {
    DocNode::text(value)
}

/// Namespace declaration; an empty prefix declares the default namespace.
pub fn ns(prefix: &str, uri: &str) -> Namespace {
    Namespace { prefix: prefix.into(), uri: uri.into() }
}

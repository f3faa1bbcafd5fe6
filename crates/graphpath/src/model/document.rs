use super::{Locale, NodeKind, NodePointer, Ordinal, Pointer, QName};
use crate::document::DocNode;
use crate::error::EvalError;
use crate::factory::ObjectFactory;
use crate::value::Value;

/// Pointer to a node of a tree document.
///
/// The entry pointer (the one a factory creates for a bound or embedded
/// node) is value-level; pointers reached by navigation are children of it.
#[derive(Debug)]
pub struct DocNodePointer {
    node: DocNode,
    parent: Option<Pointer>,
    entry: bool,
    locale: Option<Locale>,
}

impl DocNodePointer {
    pub fn root(node: DocNode, locale: Locale) -> Pointer {
        Pointer::new(DocNodePointer { node, parent: None, entry: true, locale: Some(locale) })
    }

    pub fn entry(parent: Pointer, node: DocNode) -> Pointer {
        Pointer::new(DocNodePointer { node, parent: Some(parent), entry: true, locale: None })
    }

    fn nested(parent: &Pointer, node: DocNode) -> Pointer {
        Pointer::new(DocNodePointer {
            node,
            parent: Some(parent.clone()),
            entry: false,
            locale: None,
        })
    }

    pub fn doc_node(&self) -> &DocNode {
        &self.node
    }

    /// 1-based position among preceding siblings of the same kind and name.
    fn sibling_index(&self) -> usize {
        let Some(parent) = self.node.parent() else {
            return 1;
        };
        let name = self.node.name();
        let kind = self.node.kind();
        let siblings = parent.children();
        let position = siblings.iter().position(|n| *n == self.node).unwrap_or(0);
        1 + siblings[..position].iter().filter(|n| n.kind() == kind && n.name() == name).count()
    }
}

impl NodePointer for DocNodePointer {
    fn name(&self) -> Option<QName> {
        self.node.expanded_name()
    }

    fn kind(&self) -> NodeKind {
        self.node.kind()
    }

    /// Text content; use [`NodePointer::node`] for the node itself.
    fn value(&self) -> Value {
        Value::String(self.node.string_value())
    }

    fn node(&self) -> Value {
        Value::Node(self.node.clone())
    }

    fn parent(&self) -> Option<Pointer> {
        self.parent.clone()
    }

    fn ordinal(&self) -> Ordinal {
        if self.entry {
            return Ordinal::VALUE;
        }
        let position = self.node.position().unwrap_or(usize::MAX);
        if self.node.kind() == NodeKind::Attribute {
            Ordinal::attribute(position, "")
        } else {
            Ordinal::child(position, None, "")
        }
    }

    fn is_leaf(&self) -> bool {
        !self.node.children().iter().any(|child| child.kind() == NodeKind::Element)
    }

    fn is_namespace_aware(&self) -> bool {
        true
    }

    fn locale(&self) -> Locale {
        match (&self.locale, &self.parent) {
            (Some(locale), _) => locale.clone(),
            (None, Some(parent)) => parent.locale(),
            (None, None) => Locale::default(),
        }
    }

    fn root_identity(&self) -> usize {
        self.parent.as_ref().map_or_else(|| self.node.identity(), Pointer::root_identity)
    }

    fn namespace_uri(&self, prefix: &str) -> Option<String> {
        self.node.lookup_namespace_uri(prefix)
    }

    fn children(&self, this: &Pointer) -> Vec<Pointer> {
        self.node.children().into_iter().map(|node| DocNodePointer::nested(this, node)).collect()
    }

    fn attributes(&self, this: &Pointer) -> Vec<Pointer> {
        self.node.attributes().into_iter().map(|node| DocNodePointer::nested(this, node)).collect()
    }

    fn set_value(&self, value: Value) -> Result<(), EvalError> {
        match value {
            Value::Node(node) if matches!(self.node.kind(), NodeKind::Element | NodeKind::Document) => {
                for child in self.node.children() {
                    child.detach();
                }
                self.node.append_child(node);
            }
            other => self.node.set_text(&other.string_value()),
        }
        Ok(())
    }

    fn remove(&self) -> Result<(), EvalError> {
        if self.node.detach() {
            Ok(())
        } else {
            Err(EvalError::CannotRemove("a document root".into()))
        }
    }

    fn create_child(
        &self,
        this: &Pointer,
        factory: &dyn ObjectFactory,
        name: &QName,
        attribute: bool,
        value: Option<Value>,
    ) -> Result<Pointer, EvalError> {
        if !matches!(self.node.kind(), NodeKind::Element | NodeKind::Document) {
            return Err(EvalError::CannotCreate(format!(
                "'{name}' below a {:?} node",
                self.node.kind()
            )));
        }
        let text = value.as_ref().map(Value::string_value).unwrap_or_default();
        let created = if attribute {
            self.node.set_attribute(&name.lexical(), &text)
        } else {
            let element = match factory.create_object(this, name, None) {
                Some(Value::Node(node)) if node.kind() == NodeKind::Element => node,
                Some(_) => DocNode::element(&name.lexical()).build(),
                None => {
                    return Err(EvalError::CannotCreate(format!("element '{name}' in {}", this.as_path())));
                }
            };
            self.node.append_child(element.clone());
            if value.is_some() {
                element.set_text(&text);
            }
            element
        };
        Ok(DocNodePointer::nested(this, created))
    }

    fn path_segment(&self) -> String {
        if self.entry {
            return String::new();
        }
        match (self.node.kind(), self.node.name()) {
            (NodeKind::Attribute, Some(name)) => format!("@{name}"),
            (NodeKind::Text, _) => format!("text()[{}]", self.sibling_index()),
            (_, Some(name)) => format!("{name}[{}]", self.sibling_index()),
            (_, None) => String::new(),
        }
    }
}

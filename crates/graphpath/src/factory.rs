use crate::document::DocNode;
use crate::model::{Pointer, QName};
use crate::value::Value;
use crate::variables::Variables;

/// Supplies objects for intermediate locations created by `create_path`.
pub trait ObjectFactory: Send + Sync {
    /// Value to store in the missing slot `name` (item `index` when the slot
    /// is a sequence) owned by `parent`. `None` refuses creation.
    fn create_object(&self, parent: &Pointer, name: &QName, index: Option<usize>) -> Option<Value>;

    /// Declare `name` before it is assigned through an undeclared variable
    /// reference. Returns false to refuse.
    fn declare_variable(&self, variables: &dyn Variables, name: &QName) -> bool {
        variables.declare(name.clone(), Value::Null);
        true
    }
}

/// Default factory: intermediate locations hold an empty map, or an empty
/// element below a document node.
#[derive(Debug, Default, Clone, Copy)]
pub struct MapFactory;

impl ObjectFactory for MapFactory {
    fn create_object(&self, parent: &Pointer, name: &QName, index: Option<usize>) -> Option<Value> {
        if let Value::Node(_) = parent.node() {
            tracing::trace!(parent = %parent, %name, "creating empty element");
            return Some(Value::Node(DocNode::element(&name.lexical()).build()));
        }
        tracing::trace!(parent = %parent, %name, ?index, "creating empty map");
        Some(Value::empty_map())
    }
}

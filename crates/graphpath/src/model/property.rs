use std::collections::BTreeMap;
use std::sync::Arc;

use super::{Locale, NodeKind, NodePointer, NullPointer, Ordinal, Pointer, QName};
use crate::error::EvalError;
use crate::factory::ObjectFactory;
use crate::registry;
use crate::value::{Record, Shared, Value};

/// Storage a property slot lives in.
#[derive(Debug, Clone)]
enum Owner {
    Map(Shared<BTreeMap<String, Value>>),
    Record(Arc<dyn Record>),
}

impl Owner {
    fn get(&self, key: &str) -> Option<Value> {
        match self {
            Owner::Map(map) => map.read().get(key).cloned(),
            Owner::Record(record) => record.get(key),
        }
    }

    fn contains(&self, key: &str) -> bool {
        match self {
            Owner::Map(map) => map.read().contains_key(key),
            Owner::Record(record) => record.property_names().iter().any(|name| name == key),
        }
    }

    fn put(&self, key: &str, value: Value) -> Result<(), EvalError> {
        match self {
            Owner::Map(map) => {
                map.write().insert(key.to_string(), value);
                Ok(())
            }
            Owner::Record(record) => record.set(key, value),
        }
    }

    fn clear(&self, key: &str) -> Result<(), EvalError> {
        match self {
            Owner::Map(map) => {
                map.write().remove(key);
                Ok(())
            }
            Owner::Record(record) => record.set(key, Value::Null),
        }
    }

    /// Position of `key` among the owner's properties; absent map keys sort
    /// where they would be inserted, unknown record properties last.
    fn position(&self, key: &str) -> usize {
        match self {
            Owner::Map(map) => map.read().keys().take_while(|k| k.as_str() < key).count(),
            Owner::Record(record) => {
                let names = record.property_names();
                names.iter().position(|name| name == key).unwrap_or(names.len())
            }
        }
    }

    fn entries(&self) -> Vec<(String, Value)> {
        match self {
            Owner::Map(map) => map.read().iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            Owner::Record(record) => record
                .property_names()
                .into_iter()
                .map(|name| {
                    let value = record.get(&name).unwrap_or_default();
                    (name, value)
                })
                .collect(),
        }
    }
}

/// One property of a map or record, optionally narrowed to one item when the
/// property holds a sequence.
#[derive(Debug)]
pub struct PropertyPointer {
    owner_pointer: Pointer,
    owner: Owner,
    key: String,
    attribute: bool,
    index: Option<usize>,
}

impl PropertyPointer {
    fn pointer(
        owner_pointer: &Pointer,
        owner: &Owner,
        key: &str,
        attribute: bool,
        index: Option<usize>,
    ) -> Pointer {
        Pointer::new(PropertyPointer {
            owner_pointer: owner_pointer.clone(),
            owner: owner.clone(),
            key: key.to_string(),
            attribute,
            index,
        })
    }

    /// Pointers for every item of a sequence-valued property, or the
    /// property itself. Empty sequences contribute nothing.
    fn expand(
        owner_pointer: &Pointer,
        owner: &Owner,
        key: &str,
        attribute: bool,
        value: &Value,
    ) -> Vec<Pointer> {
        match value {
            Value::List(list) => (0..list.read().len())
                .map(|i| PropertyPointer::pointer(owner_pointer, owner, key, attribute, Some(i)))
                .collect(),
            _ => vec![PropertyPointer::pointer(owner_pointer, owner, key, attribute, None)],
        }
    }

    fn raw(&self) -> Option<Value> {
        let value = self.owner.get(&self.key)?;
        match self.index {
            None => Some(value),
            Some(i) => match value {
                Value::List(list) => list.read().get(i).cloned(),
                other if i == 0 => Some(other),
                _ => None,
            },
        }
    }

    fn qname(&self) -> QName {
        QName::parse(&self.key)
    }
}

impl NodePointer for PropertyPointer {
    fn name(&self) -> Option<QName> {
        Some(self.qname())
    }

    fn kind(&self) -> NodeKind {
        if self.attribute { NodeKind::Attribute } else { NodeKind::Element }
    }

    fn value(&self) -> Value {
        self.raw().unwrap_or_default()
    }

    fn parent(&self) -> Option<Pointer> {
        Some(self.owner_pointer.clone())
    }

    fn ordinal(&self) -> Ordinal {
        let position = self.owner.position(&self.key);
        if self.attribute {
            Ordinal::attribute(position, &self.key)
        } else {
            Ordinal::child(position, self.index, &self.key)
        }
    }

    fn is_actual(&self) -> bool {
        self.owner.contains(&self.key) && (self.index.is_none() || self.raw().is_some())
    }

    fn is_container(&self) -> bool {
        true
    }

    fn is_collection(&self) -> bool {
        self.index.is_none() && matches!(self.raw(), Some(Value::List(_)))
    }

    fn is_leaf(&self) -> bool {
        !matches!(
            self.raw(),
            Some(Value::List(_) | Value::Map(_) | Value::Record(_) | Value::Node(_) | Value::Cell(_))
        )
    }

    fn value_pointer(&self, this: &Pointer) -> Pointer {
        match self.raw() {
            None => this.clone(),
            Some(Value::Null) => NullPointer::value_of(this.clone()),
            Some(value) => registry::new_child_pointer(this, Some(self.qname()), value),
        }
    }

    fn children(&self, this: &Pointer) -> Vec<Pointer> {
        match self.raw() {
            None | Some(Value::Null) => Vec::new(),
            Some(_) => this.value_pointer().children(),
        }
    }

    fn attributes(&self, this: &Pointer) -> Vec<Pointer> {
        match self.raw() {
            None | Some(Value::Null) => Vec::new(),
            Some(_) => this.value_pointer().attributes(),
        }
    }

    fn items(&self, this: &Pointer) -> Vec<Pointer> {
        if self.is_collection() {
            PropertyPointer::expand(&self.owner_pointer, &self.owner, &self.key, self.attribute, &self.value())
        } else {
            vec![this.clone()]
        }
    }

    fn child_slot(&self, this: &Pointer, name: &QName, attribute: bool) -> Pointer {
        if self.is_actual() {
            this.value_pointer().child_slot(name, attribute)
        } else {
            NullPointer::slot(this.clone(), name.clone(), attribute)
        }
    }

    fn set_value(&self, value: Value) -> Result<(), EvalError> {
        let Some(index) = self.index else {
            return self.owner.put(&self.key, value);
        };
        match self.owner.get(&self.key) {
            Some(Value::List(list)) => {
                let mut items = list.write();
                if items.len() <= index {
                    items.resize(index + 1, Value::Null);
                }
                items[index] = value;
                Ok(())
            }
            Some(other) if index == 0 && !other.is_null() => self.owner.put(&self.key, value),
            _ => {
                let mut items = vec![Value::Null; index + 1];
                items[index] = value;
                self.owner.put(&self.key, Value::list(items))
            }
        }
    }

    fn remove(&self) -> Result<(), EvalError> {
        let Some(index) = self.index else {
            return self.owner.clear(&self.key);
        };
        match self.owner.get(&self.key) {
            Some(Value::List(list)) => {
                let mut items = list.write();
                if index < items.len() {
                    items.remove(index);
                }
                Ok(())
            }
            Some(_) if index == 0 => self.owner.clear(&self.key),
            _ => Ok(()),
        }
    }

    fn create_path(
        &self,
        this: &Pointer,
        factory: &dyn ObjectFactory,
        value: Option<Value>,
    ) -> Result<Pointer, EvalError> {
        match value {
            Some(value) => self.set_value(value)?,
            None if self.value().is_null() => {
                let created = factory
                    .create_object(&self.owner_pointer, &self.qname(), self.index)
                    .ok_or_else(|| EvalError::CannotCreate(format!("object for {}", this.as_path())))?;
                self.set_value(created)?;
            }
            None => {}
        }
        Ok(this.clone())
    }

    fn path_segment(&self) -> String {
        match (self.attribute, self.index) {
            (true, _) => format!("@{}", self.key),
            (false, Some(i)) => format!("{}[{}]", self.key, i + 1),
            (false, None) => self.key.clone(),
        }
    }
}

/// Shared behaviour of value-level pointers over property owners.
#[derive(Debug)]
struct OwnerView {
    name: Option<QName>,
    owner: Owner,
    parent: Option<Pointer>,
    locale: Option<Locale>,
}

impl OwnerView {
    fn locale(&self) -> Locale {
        match (&self.locale, &self.parent) {
            (Some(locale), _) => locale.clone(),
            (None, Some(parent)) => parent.locale(),
            (None, None) => Locale::default(),
        }
    }

    fn properties(&self, this: &Pointer, attribute: bool) -> Vec<Pointer> {
        self.owner
            .entries()
            .iter()
            .flat_map(|(key, value)| PropertyPointer::expand(this, &self.owner, key, attribute, value))
            .collect()
    }

    fn set_value(&self, value: Value) -> Result<(), EvalError> {
        match &self.parent {
            Some(parent) => parent.set_value(value),
            None => Err(EvalError::ReadOnly("the root value cannot be replaced".into())),
        }
    }

    fn remove(&self) -> Result<(), EvalError> {
        match &self.parent {
            Some(parent) => parent.remove(),
            None => Err(EvalError::CannotRemove("the root value".into())),
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
        PropertyPointer::pointer(this, &self.owner, &name.lexical(), attribute, None)
            .create_path(factory, value)
    }
}

/// Value-level pointer over a string-keyed map. Keys are children in key
/// order and are equally reachable through the attribute axis.
#[derive(Debug)]
pub struct MapPointer {
    view: OwnerView,
    map: Shared<BTreeMap<String, Value>>,
}

impl MapPointer {
    pub fn root(name: Option<QName>, map: Shared<BTreeMap<String, Value>>, locale: Locale) -> Pointer {
        Pointer::new(MapPointer {
            view: OwnerView { name, owner: Owner::Map(map.clone()), parent: None, locale: Some(locale) },
            map,
        })
    }

    pub fn child(parent: Pointer, name: Option<QName>, map: Shared<BTreeMap<String, Value>>) -> Pointer {
        Pointer::new(MapPointer {
            view: OwnerView { name, owner: Owner::Map(map.clone()), parent: Some(parent), locale: None },
            map,
        })
    }
}

impl NodePointer for MapPointer {
    fn name(&self) -> Option<QName> {
        self.view.name.clone()
    }

    fn value(&self) -> Value {
        Value::Map(self.map.clone())
    }

    fn parent(&self) -> Option<Pointer> {
        self.view.parent.clone()
    }

    fn is_leaf(&self) -> bool {
        false
    }

    fn locale(&self) -> Locale {
        self.view.locale()
    }

    fn root_identity(&self) -> usize {
        self.view.parent.as_ref().map_or_else(|| self.map.identity(), Pointer::root_identity)
    }

    fn children(&self, this: &Pointer) -> Vec<Pointer> {
        self.view.properties(this, false)
    }

    fn attributes(&self, this: &Pointer) -> Vec<Pointer> {
        self.view.properties(this, true)
    }

    fn child_slot(&self, this: &Pointer, name: &QName, attribute: bool) -> Pointer {
        PropertyPointer::pointer(this, &self.view.owner, &name.lexical(), attribute, None)
    }

    fn set_value(&self, value: Value) -> Result<(), EvalError> {
        self.view.set_value(value)
    }

    fn remove(&self) -> Result<(), EvalError> {
        self.view.remove()
    }

    fn create_child(
        &self,
        this: &Pointer,
        factory: &dyn ObjectFactory,
        name: &QName,
        attribute: bool,
        value: Option<Value>,
    ) -> Result<Pointer, EvalError> {
        self.view.create_child(this, factory, name, attribute, value)
    }

    fn path_segment(&self) -> String {
        String::new()
    }
}

/// Value-level pointer over a [`Record`]; properties in declaration order.
#[derive(Debug)]
pub struct RecordPointer {
    view: OwnerView,
    record: Arc<dyn Record>,
}

impl RecordPointer {
    pub fn root(name: Option<QName>, record: Arc<dyn Record>, locale: Locale) -> Pointer {
        Pointer::new(RecordPointer {
            view: OwnerView {
                name,
                owner: Owner::Record(Arc::clone(&record)),
                parent: None,
                locale: Some(locale),
            },
            record,
        })
    }

    pub fn child(parent: Pointer, name: Option<QName>, record: Arc<dyn Record>) -> Pointer {
        Pointer::new(RecordPointer {
            view: OwnerView {
                name,
                owner: Owner::Record(Arc::clone(&record)),
                parent: Some(parent),
                locale: None,
            },
            record,
        })
    }
}

impl NodePointer for RecordPointer {
    fn name(&self) -> Option<QName> {
        self.view.name.clone()
    }

    fn value(&self) -> Value {
        Value::Record(Arc::clone(&self.record))
    }

    fn parent(&self) -> Option<Pointer> {
        self.view.parent.clone()
    }

    fn is_leaf(&self) -> bool {
        false
    }

    fn locale(&self) -> Locale {
        self.view.locale()
    }

    fn root_identity(&self) -> usize {
        self.view
            .parent
            .as_ref()
            .map_or_else(|| Arc::as_ptr(&self.record).cast::<()>() as usize, Pointer::root_identity)
    }

    fn children(&self, this: &Pointer) -> Vec<Pointer> {
        self.view.properties(this, false)
    }

    fn attributes(&self, this: &Pointer) -> Vec<Pointer> {
        self.view.properties(this, true)
    }

    fn child_slot(&self, this: &Pointer, name: &QName, attribute: bool) -> Pointer {
        PropertyPointer::pointer(this, &self.view.owner, &name.lexical(), attribute, None)
    }

    fn set_value(&self, value: Value) -> Result<(), EvalError> {
        self.view.set_value(value)
    }

    fn remove(&self) -> Result<(), EvalError> {
        self.view.remove()
    }

    fn create_child(
        &self,
        this: &Pointer,
        factory: &dyn ObjectFactory,
        name: &QName,
        attribute: bool,
        value: Option<Value>,
    ) -> Result<Pointer, EvalError> {
        self.view.create_child(this, factory, name, attribute, value)
    }

    fn path_segment(&self) -> String {
        String::new()
    }
}

use super::{Locale, NodePointer, NullPointer, Ordinal, Pointer, QName};
use crate::error::EvalError;
use crate::factory::ObjectFactory;
use crate::registry;
use crate::value::{Shared, Value};

/// Value-level pointer over a sequence that was not reached through a named
/// property: a bound root, a variable value, an item of another sequence.
///
/// Child steps look through the sequence into each item.
#[derive(Debug)]
pub struct ListPointer {
    name: Option<QName>,
    list: Shared<Vec<Value>>,
    parent: Option<Pointer>,
    locale: Option<Locale>,
}

impl ListPointer {
    pub fn root(name: Option<QName>, list: Shared<Vec<Value>>, locale: Locale) -> Pointer {
        Pointer::new(ListPointer { name, list, parent: None, locale: Some(locale) })
    }

    pub fn child(parent: Pointer, name: Option<QName>, list: Shared<Vec<Value>>) -> Pointer {
        Pointer::new(ListPointer { name, list, parent: Some(parent), locale: None })
    }
}

impl NodePointer for ListPointer {
    fn name(&self) -> Option<QName> {
        self.name.clone()
    }

    fn value(&self) -> Value {
        Value::List(self.list.clone())
    }

    fn parent(&self) -> Option<Pointer> {
        self.parent.clone()
    }

    fn is_collection(&self) -> bool {
        true
    }

    fn is_leaf(&self) -> bool {
        false
    }

    fn locale(&self) -> Locale {
        match (&self.locale, &self.parent) {
            (Some(locale), _) => locale.clone(),
            (None, Some(parent)) => parent.locale(),
            (None, None) => Locale::default(),
        }
    }

    fn root_identity(&self) -> usize {
        self.parent.as_ref().map_or_else(|| self.list.identity(), Pointer::root_identity)
    }

    fn children(&self, this: &Pointer) -> Vec<Pointer> {
        this.items().iter().flat_map(Pointer::children).collect()
    }

    fn attributes(&self, this: &Pointer) -> Vec<Pointer> {
        this.items().iter().flat_map(Pointer::attributes).collect()
    }

    fn items(&self, this: &Pointer) -> Vec<Pointer> {
        let len = self.list.read().len();
        (0..len)
            .map(|index| {
                Pointer::new(ItemPointer {
                    list_pointer: this.clone(),
                    list: self.list.clone(),
                    name: self.name.clone(),
                    index,
                })
            })
            .collect()
    }

    /// First item holding the child; otherwise a slot that cannot be
    /// created, since the intended item is ambiguous.
    fn child_slot(&self, this: &Pointer, name: &QName, attribute: bool) -> Pointer {
        this.items()
            .iter()
            .map(|item| item.child_slot(name, attribute))
            .find(Pointer::is_actual)
            .unwrap_or_else(|| NullPointer::slot(this.clone(), name.clone(), attribute))
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

    fn path_segment(&self) -> String {
        String::new()
    }
}

/// One item of a [`ListPointer`] sequence.
#[derive(Debug)]
pub struct ItemPointer {
    list_pointer: Pointer,
    list: Shared<Vec<Value>>,
    name: Option<QName>,
    index: usize,
}

impl ItemPointer {
    fn raw(&self) -> Option<Value> {
        self.list.read().get(self.index).cloned()
    }
}

impl NodePointer for ItemPointer {
    fn name(&self) -> Option<QName> {
        self.name.clone()
    }

    fn value(&self) -> Value {
        self.raw().unwrap_or_default()
    }

    fn parent(&self) -> Option<Pointer> {
        Some(self.list_pointer.clone())
    }

    fn ordinal(&self) -> Ordinal {
        Ordinal::child(self.index, None, "")
    }

    fn is_actual(&self) -> bool {
        self.index < self.list.read().len()
    }

    fn is_container(&self) -> bool {
        true
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
            Some(value) => registry::new_child_pointer(this, self.name.clone(), value),
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

    fn child_slot(&self, this: &Pointer, name: &QName, attribute: bool) -> Pointer {
        if self.is_actual() {
            this.value_pointer().child_slot(name, attribute)
        } else {
            NullPointer::slot(this.clone(), name.clone(), attribute)
        }
    }

    fn set_value(&self, value: Value) -> Result<(), EvalError> {
        let mut items = self.list.write();
        if items.len() <= self.index {
            items.resize(self.index + 1, Value::Null);
        }
        items[self.index] = value;
        Ok(())
    }

    fn remove(&self) -> Result<(), EvalError> {
        let mut items = self.list.write();
        if self.index < items.len() {
            items.remove(self.index);
        }
        Ok(())
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
                let name = self.name.clone().unwrap_or_else(|| QName::local("item"));
                let created = factory
                    .create_object(&self.list_pointer, &name, Some(self.index))
                    .ok_or_else(|| EvalError::CannotCreate(format!("object for {}", this.as_path())))?;
                self.set_value(created)?;
            }
            None => {}
        }
        Ok(this.clone())
    }

    fn path_segment(&self) -> String {
        format!("[{}]", self.index + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn children_look_through_items() {
        let value = Value::from_json(&serde_json::json!([{"a": 1}, {"a": 2}, {"b": 3}]));
        let pointer = registry::new_pointer(None, value, &Locale::default());
        let values: Vec<Value> = pointer
            .children()
            .iter()
            .filter(|p| p.name() == Some(QName::local("a")))
            .map(Pointer::value)
            .collect();
        assert_eq!(values, vec![Value::from(1), Value::from(2)]);
        assert_eq!(pointer.items()[1].as_path(), "/.[2]");
    }

    #[test]
    fn removing_an_item_shifts_followers() {
        let value = Value::from_json(&serde_json::json!(["a", "b", "c"]));
        let pointer = registry::new_pointer(None, value.clone(), &Locale::default());
        pointer.items()[0].remove().expect("removed");
        assert_eq!(value.to_json(), serde_json::json!(["b", "c"]));
    }
}

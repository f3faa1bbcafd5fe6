use super::{Locale, NodeKind, NodePointer, Ordinal, Pointer, QName};
use crate::error::EvalError;
use crate::factory::ObjectFactory;
use crate::registry;
use crate::value::{Shared, Value};

/// Terminal pointer: the value addresses itself.
#[derive(Debug)]
pub struct ScalarPointer {
    name: Option<QName>,
    value: Value,
    parent: Option<Pointer>,
    locale: Option<Locale>,
}

impl ScalarPointer {
    pub fn root(name: Option<QName>, value: Value, locale: Locale) -> Pointer {
        Pointer::new(ScalarPointer { name, value, parent: None, locale: Some(locale) })
    }

    pub fn child(parent: Pointer, name: Option<QName>, value: Value) -> Pointer {
        Pointer::new(ScalarPointer { name, value, parent: Some(parent), locale: None })
    }
}

impl NodePointer for ScalarPointer {
    fn name(&self) -> Option<QName> {
        self.name.clone()
    }

    fn value(&self) -> Value {
        self.value.clone()
    }

    fn parent(&self) -> Option<Pointer> {
        self.parent.clone()
    }

    fn locale(&self) -> Locale {
        match (&self.locale, &self.parent) {
            (Some(locale), _) => locale.clone(),
            (None, Some(parent)) => parent.locale(),
            (None, None) => Locale::default(),
        }
    }

    fn root_identity(&self) -> usize {
        self.parent.as_ref().map_or_else(|| self.value.identity(), Pointer::root_identity)
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

/// Container over a [`Value::Cell`]; its value is the cell content.
#[derive(Debug)]
pub struct CellPointer {
    name: Option<QName>,
    cell: Shared<Value>,
    parent: Option<Pointer>,
    locale: Option<Locale>,
}

impl CellPointer {
    pub fn root(name: Option<QName>, cell: Shared<Value>, locale: Locale) -> Pointer {
        Pointer::new(CellPointer { name, cell, parent: None, locale: Some(locale) })
    }

    pub fn child(parent: Pointer, name: Option<QName>, cell: Shared<Value>) -> Pointer {
        Pointer::new(CellPointer { name, cell, parent: Some(parent), locale: None })
    }
}

impl NodePointer for CellPointer {
    fn name(&self) -> Option<QName> {
        self.name.clone()
    }

    fn value(&self) -> Value {
        self.cell.read().clone()
    }

    fn node(&self) -> Value {
        Value::Cell(self.cell.clone())
    }

    fn parent(&self) -> Option<Pointer> {
        self.parent.clone()
    }

    fn is_container(&self) -> bool {
        true
    }

    fn is_collection(&self) -> bool {
        matches!(&*self.cell.read(), Value::List(_))
    }

    fn is_leaf(&self) -> bool {
        !matches!(
            &*self.cell.read(),
            Value::List(_) | Value::Map(_) | Value::Record(_) | Value::Node(_) | Value::Cell(_)
        )
    }

    fn locale(&self) -> Locale {
        match (&self.locale, &self.parent) {
            (Some(locale), _) => locale.clone(),
            (None, Some(parent)) => parent.locale(),
            (None, None) => Locale::default(),
        }
    }

    fn root_identity(&self) -> usize {
        self.parent.as_ref().map_or_else(|| self.cell.identity(), Pointer::root_identity)
    }

    fn value_pointer(&self, this: &Pointer) -> Pointer {
        let value = self.value();
        if value.is_null() {
            NullPointer::value_of(this.clone())
        } else {
            registry::new_child_pointer(this, self.name.clone(), value)
        }
    }

    fn children(&self, this: &Pointer) -> Vec<Pointer> {
        if self.value().is_null() { Vec::new() } else { this.value_pointer().children() }
    }

    fn attributes(&self, this: &Pointer) -> Vec<Pointer> {
        if self.value().is_null() { Vec::new() } else { this.value_pointer().attributes() }
    }

    fn items(&self, this: &Pointer) -> Vec<Pointer> {
        if self.is_collection() { this.value_pointer().items() } else { vec![this.clone()] }
    }

    fn child_slot(&self, this: &Pointer, name: &QName, attribute: bool) -> Pointer {
        this.value_pointer().child_slot(name, attribute)
    }

    fn set_value(&self, value: Value) -> Result<(), EvalError> {
        *self.cell.write() = value;
        Ok(())
    }

    fn remove(&self) -> Result<(), EvalError> {
        *self.cell.write() = Value::Null;
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
                let name = self.name.clone().unwrap_or_else(|| QName::local("cell"));
                let created = factory
                    .create_object(this, &name, None)
                    .ok_or_else(|| EvalError::CannotCreate(format!("object for {}", this.as_path())))?;
                self.set_value(created)?;
            }
            None => {}
        }
        Ok(this.clone())
    }

    fn path_segment(&self) -> String {
        String::new()
    }
}

#[derive(Debug)]
enum NullRole {
    /// View of a slot holding null.
    ValueOf,
    /// Missing child (or attribute) of the parent.
    Slot { attribute: bool },
}

/// Non-actual location. Creating it materializes the parent chain first.
#[derive(Debug)]
pub struct NullPointer {
    parent: Pointer,
    name: Option<QName>,
    role: NullRole,
}

impl NullPointer {
    /// Value-level view of `parent`, a slot currently holding nothing.
    pub fn value_of(parent: Pointer) -> Pointer {
        let name = parent.name();
        Pointer::new(NullPointer { parent, name, role: NullRole::ValueOf })
    }

    /// Hypothetical child `name` of `parent`.
    pub fn slot(parent: Pointer, name: QName, attribute: bool) -> Pointer {
        Pointer::new(NullPointer { parent, name: Some(name), role: NullRole::Slot { attribute } })
    }
}

impl NodePointer for NullPointer {
    fn name(&self) -> Option<QName> {
        self.name.clone()
    }

    fn kind(&self) -> NodeKind {
        match self.role {
            NullRole::Slot { attribute: true } => NodeKind::Attribute,
            _ => NodeKind::Element,
        }
    }

    fn value(&self) -> Value {
        Value::Null
    }

    fn parent(&self) -> Option<Pointer> {
        Some(self.parent.clone())
    }

    fn ordinal(&self) -> Ordinal {
        let label = self.name.as_ref().map(QName::lexical).unwrap_or_default();
        match self.role {
            NullRole::ValueOf => Ordinal::VALUE,
            NullRole::Slot { attribute: true } => Ordinal::attribute(usize::MAX, &label),
            NullRole::Slot { attribute: false } => Ordinal::child(usize::MAX, None, &label),
        }
    }

    fn is_actual(&self) -> bool {
        false
    }

    fn set_value(&self, value: Value) -> Result<(), EvalError> {
        match self.role {
            NullRole::ValueOf => self.parent.set_value(value),
            NullRole::Slot { .. } => Err(EvalError::ReadOnly(format!(
                "no object at {}",
                self.parent.as_path()
            ))),
        }
    }

    fn remove(&self) -> Result<(), EvalError> {
        match self.role {
            NullRole::ValueOf => self.parent.remove(),
            NullRole::Slot { .. } => Ok(()),
        }
    }

    fn create_path(
        &self,
        _this: &Pointer,
        factory: &dyn ObjectFactory,
        value: Option<Value>,
    ) -> Result<Pointer, EvalError> {
        match (&self.role, &self.name) {
            (NullRole::ValueOf, _) => self.parent.create_path(factory, value),
            (NullRole::Slot { attribute }, Some(name)) => {
                let parent = self.parent.create_path(factory, None)?;
                parent.value_pointer().create_child(factory, name, *attribute, value)
            }
            (NullRole::Slot { .. }, None) => {
                Err(EvalError::CannotCreate(format!("unnamed child of {}", self.parent.as_path())))
            }
        }
    }

    fn path_segment(&self) -> String {
        match (&self.role, &self.name) {
            (NullRole::Slot { attribute: true }, Some(name)) => format!("@{name}"),
            (NullRole::Slot { attribute: false }, Some(name)) => name.lexical(),
            _ => String::new(),
        }
    }
}

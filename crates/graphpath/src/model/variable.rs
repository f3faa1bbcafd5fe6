use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use super::{NodePointer, NullPointer, Pointer, QName};
use crate::error::EvalError;
use crate::factory::ObjectFactory;
use crate::registry;
use crate::value::Value;
use crate::variables::Variables;

/// Pointer to a variable, bound to the context level that declares it.
///
/// An unbound pointer remembers the variable set of the context the query
/// ran against; writing through it declares the variable there.
#[derive(Debug)]
pub struct VariablePointer {
    name: QName,
    scope: Option<Arc<dyn Variables>>,
    target: Arc<dyn Variables>,
}

impl VariablePointer {
    pub fn bound(name: QName, scope: Arc<dyn Variables>) -> Pointer {
        let target = Arc::clone(&scope);
        Pointer::new(VariablePointer { name, scope: Some(scope), target })
    }

    pub fn unbound(name: QName, target: Arc<dyn Variables>) -> Pointer {
        Pointer::new(VariablePointer { name, scope: None, target })
    }

    fn variables(&self) -> Option<&Arc<dyn Variables>> {
        match &self.scope {
            Some(scope) => Some(scope),
            None if self.target.is_declared(&self.name) => Some(&self.target),
            None => None,
        }
    }
}

impl NodePointer for VariablePointer {
    fn name(&self) -> Option<QName> {
        Some(self.name.clone())
    }

    fn value(&self) -> Value {
        self.variables().and_then(|vars| vars.get(&self.name)).unwrap_or_default()
    }

    fn try_value(&self) -> Result<Value, EvalError> {
        match self.variables() {
            Some(vars) => Ok(vars.get(&self.name).unwrap_or_default()),
            None => Err(EvalError::UndefinedVariable(self.name.clone())),
        }
    }

    fn parent(&self) -> Option<Pointer> {
        None
    }

    fn is_actual(&self) -> bool {
        self.variables().is_some_and(|vars| vars.is_declared(&self.name))
    }

    fn is_container(&self) -> bool {
        true
    }

    fn is_collection(&self) -> bool {
        matches!(self.value(), Value::List(_))
    }

    fn is_leaf(&self) -> bool {
        !matches!(
            self.value(),
            Value::List(_) | Value::Map(_) | Value::Record(_) | Value::Node(_) | Value::Cell(_)
        )
    }

    fn root_identity(&self) -> usize {
        let mut hasher = DefaultHasher::new();
        self.name.hash(&mut hasher);
        let scope = self.variables().unwrap_or(&self.target);
        #[allow(clippy::cast_possible_truncation)]
        let name_hash = hasher.finish() as usize;
        (Arc::as_ptr(scope).cast::<()>() as usize) ^ name_hash
    }

    fn value_pointer(&self, this: &Pointer) -> Pointer {
        if !self.is_actual() {
            return this.clone();
        }
        match self.value() {
            Value::Null => NullPointer::value_of(this.clone()),
            value => registry::new_child_pointer(this, Some(self.name.clone()), value),
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
        if self.is_actual() {
            this.value_pointer().child_slot(name, attribute)
        } else {
            NullPointer::slot(this.clone(), name.clone(), attribute)
        }
    }

    fn set_value(&self, value: Value) -> Result<(), EvalError> {
        let vars = self.variables().unwrap_or(&self.target);
        vars.declare(self.name.clone(), value);
        Ok(())
    }

    fn remove(&self) -> Result<(), EvalError> {
        match self.variables() {
            Some(vars) => {
                vars.undeclare(&self.name);
                Ok(())
            }
            None => Err(EvalError::UndefinedVariable(self.name.clone())),
        }
    }

    fn create_path(
        &self,
        this: &Pointer,
        factory: &dyn ObjectFactory,
        value: Option<Value>,
    ) -> Result<Pointer, EvalError> {
        if self.variables().is_none() && !factory.declare_variable(self.target.as_ref(), &self.name) {
            return Err(EvalError::CannotCreate(format!("variable ${}", self.name)));
        }
        match value {
            Some(value) => self.set_value(value)?,
            None if self.value().is_null() => {
                let created = factory
                    .create_object(this, &self.name, None)
                    .ok_or_else(|| EvalError::CannotCreate(format!("object for ${}", self.name)))?;
                self.set_value(created)?;
            }
            None => {}
        }
        Ok(this.clone())
    }

    fn path_segment(&self) -> String {
        format!("${}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::BasicVariables;

    #[test]
    fn unbound_reads_fail_and_writes_declare() {
        let target: Arc<dyn Variables> = Arc::new(BasicVariables::new());
        let pointer = VariablePointer::unbound(QName::local("x"), Arc::clone(&target));
        assert!(!pointer.is_actual());
        assert!(matches!(pointer.try_value(), Err(EvalError::UndefinedVariable(_))));

        pointer.set_value(Value::from(3)).expect("declared");
        assert!(pointer.is_actual());
        assert_eq!(target.get(&QName::local("x")), Some(Value::from(3)));
    }
}

use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

use crate::model::QName;
use crate::value::Value;

/// Variables declared at one context level.
///
/// Declaration goes through `&self`: the scope resolver declares lazily into
/// a set other contexts may share.
pub trait Variables: Send + Sync + fmt::Debug {
    fn is_declared(&self, name: &QName) -> bool;

    fn get(&self, name: &QName) -> Option<Value>;

    /// Declare `name`, replacing any previous value.
    fn declare(&self, name: QName, value: Value);

    fn undeclare(&self, name: &QName) -> bool;
}

#[derive(Debug, Default)]
pub struct BasicVariables {
    values: RwLock<HashMap<QName, Value>>,
}

impl BasicVariables {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(self, name: &str, value: impl Into<Value>) -> Self {
        self.declare(QName::parse(name), value.into());
        self
    }

    pub fn len(&self) -> usize {
        self.values.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Variables for BasicVariables {
    fn is_declared(&self, name: &QName) -> bool {
        self.values.read().unwrap_or_else(PoisonError::into_inner).contains_key(name)
    }

    fn get(&self, name: &QName) -> Option<Value> {
        self.values.read().unwrap_or_else(PoisonError::into_inner).get(name).cloned()
    }

    fn declare(&self, name: QName, value: Value) {
        self.values.write().unwrap_or_else(PoisonError::into_inner).insert(name, value);
    }

    fn undeclare(&self, name: &QName) -> bool {
        self.values.write().unwrap_or_else(PoisonError::into_inner).remove(name).is_some()
    }
}

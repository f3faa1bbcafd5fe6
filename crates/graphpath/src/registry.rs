//! Ordered, process-wide registry of pointer factories.
//!
//! Factories are consulted in ascending `order`; the first one that can
//! address a value creates its pointer. Values no factory claims get a
//! terminal [`ScalarPointer`].
//!
//! | order | factory |
//! |------:|---------|
//! | 10    | lists   |
//! | 100   | documents |
//! | 200   | cells   |
//! | 800   | maps    |
//! | 900   | records |
use std::fmt;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use crate::model::{
    CellPointer, DocNodePointer, ListPointer, Locale, MapPointer, Pointer, QName, RecordPointer,
    ScalarPointer,
};
use crate::value::Value;

/// Turns values of one shape into pointers.
pub trait PointerFactory: Send + Sync + fmt::Debug {
    fn can_address(&self, value: &Value) -> bool;

    /// Pointer for a value bound as the root of a graph.
    fn create_pointer(&self, name: Option<QName>, value: Value, locale: &Locale) -> Pointer;

    /// Pointer for a value reached from `parent`.
    fn create_child_pointer(&self, parent: &Pointer, name: Option<QName>, value: Value) -> Pointer;
}

struct Registration {
    order: i32,
    seq: u64,
    factory: Arc<dyn PointerFactory>,
}

#[derive(Default)]
struct RegistryState {
    registrations: Vec<Registration>,
    next_seq: u64,
    /// Sorted view; `None` after a registration until the next resolution.
    sorted: Option<Arc<[Arc<dyn PointerFactory>]>>,
}

#[derive(Default)]
pub struct PointerRegistry {
    state: RwLock<RegistryState>,
}

impl fmt::Debug for PointerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("PointerRegistry")
            .field("factories", &state.registrations.len())
            .field("sorted", &state.sorted.is_some())
            .finish()
    }
}

impl PointerRegistry {
    /// An empty registry; only the scalar fallback applies.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in factories.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(ListPointerFactory), 10);
        registry.register(Arc::new(DocumentPointerFactory), 100);
        registry.register(Arc::new(CellPointerFactory), 200);
        registry.register(Arc::new(MapPointerFactory), 800);
        registry.register(Arc::new(RecordPointerFactory), 900);
        registry
    }

    /// Add a factory. Equal orders keep registration order.
    pub fn register(&self, factory: Arc<dyn PointerFactory>, order: i32) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let seq = state.next_seq;
        state.next_seq += 1;
        tracing::debug!(?factory, order, "registering pointer factory");
        state.registrations.push(Registration { order, seq, factory });
        state.sorted = None;
    }

    /// Factories in consultation order. Rebuilt under the write lock when a
    /// registration invalidated the previous view.
    pub fn factories(&self) -> Arc<[Arc<dyn PointerFactory>]> {
        {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(sorted) = &state.sorted {
                return Arc::clone(sorted);
            }
        }
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(sorted) = &state.sorted {
            return Arc::clone(sorted);
        }
        state.registrations.sort_by_key(|registration| (registration.order, registration.seq));
        let sorted: Arc<[Arc<dyn PointerFactory>]> = state
            .registrations
            .iter()
            .map(|registration| Arc::clone(&registration.factory))
            .collect();
        tracing::trace!(factories = sorted.len(), "rebuilt pointer factory order");
        state.sorted = Some(Arc::clone(&sorted));
        sorted
    }

    pub fn len(&self) -> usize {
        self.state.read().unwrap_or_else(PoisonError::into_inner).registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn resolve(&self, name: Option<QName>, value: Value, locale: &Locale) -> Pointer {
        match self.factories().iter().find(|factory| factory.can_address(&value)) {
            Some(factory) => factory.create_pointer(name, value, locale),
            None => ScalarPointer::root(name, value, locale.clone()),
        }
    }

    pub fn resolve_child(&self, parent: &Pointer, name: Option<QName>, value: Value) -> Pointer {
        match self.factories().iter().find(|factory| factory.can_address(&value)) {
            Some(factory) => factory.create_child_pointer(parent, name, value),
            None => ScalarPointer::child(parent.clone(), name, value),
        }
    }
}

static GLOBAL: LazyLock<PointerRegistry> = LazyLock::new(PointerRegistry::with_builtins);

/// The process-wide registry, populated with the built-in factories on first
/// use.
pub fn global() -> &'static PointerRegistry {
    &GLOBAL
}

/// Register a factory with the process-wide registry.
pub fn register_pointer_factory(factory: Arc<dyn PointerFactory>, order: i32) {
    global().register(factory, order);
}

/// Pointer for a root value, resolved through the process-wide registry.
pub fn new_pointer(name: Option<QName>, value: Value, locale: &Locale) -> Pointer {
    global().resolve(name, value, locale)
}

/// Pointer for a value reached from `parent`, resolved through the
/// process-wide registry.
pub fn new_child_pointer(parent: &Pointer, name: Option<QName>, value: Value) -> Pointer {
    global().resolve_child(parent, name, value)
}

#[derive(Debug)]
struct ListPointerFactory;

impl PointerFactory for ListPointerFactory {
    fn can_address(&self, value: &Value) -> bool {
        matches!(value, Value::List(_))
    }

    fn create_pointer(&self, name: Option<QName>, value: Value, locale: &Locale) -> Pointer {
        match value {
            Value::List(list) => ListPointer::root(name, list, locale.clone()),
            other => ScalarPointer::root(name, other, locale.clone()),
        }
    }

    fn create_child_pointer(&self, parent: &Pointer, name: Option<QName>, value: Value) -> Pointer {
        match value {
            Value::List(list) => ListPointer::child(parent.clone(), name, list),
            other => ScalarPointer::child(parent.clone(), name, other),
        }
    }
}

#[derive(Debug)]
struct DocumentPointerFactory;

impl PointerFactory for DocumentPointerFactory {
    fn can_address(&self, value: &Value) -> bool {
        matches!(value, Value::Node(_))
    }

    fn create_pointer(&self, _name: Option<QName>, value: Value, locale: &Locale) -> Pointer {
        match value {
            Value::Node(node) => DocNodePointer::root(node, locale.clone()),
            other => ScalarPointer::root(None, other, locale.clone()),
        }
    }

    fn create_child_pointer(&self, parent: &Pointer, name: Option<QName>, value: Value) -> Pointer {
        match value {
            Value::Node(node) => DocNodePointer::entry(parent.clone(), node),
            other => ScalarPointer::child(parent.clone(), name, other),
        }
    }
}

#[derive(Debug)]
struct CellPointerFactory;

impl PointerFactory for CellPointerFactory {
    fn can_address(&self, value: &Value) -> bool {
        matches!(value, Value::Cell(_))
    }

    fn create_pointer(&self, name: Option<QName>, value: Value, locale: &Locale) -> Pointer {
        match value {
            Value::Cell(cell) => CellPointer::root(name, cell, locale.clone()),
            other => ScalarPointer::root(name, other, locale.clone()),
        }
    }

    fn create_child_pointer(&self, parent: &Pointer, name: Option<QName>, value: Value) -> Pointer {
        match value {
            Value::Cell(cell) => CellPointer::child(parent.clone(), name, cell),
            other => ScalarPointer::child(parent.clone(), name, other),
        }
    }
}

#[derive(Debug)]
struct MapPointerFactory;

impl PointerFactory for MapPointerFactory {
    fn can_address(&self, value: &Value) -> bool {
        matches!(value, Value::Map(_))
    }

    fn create_pointer(&self, name: Option<QName>, value: Value, locale: &Locale) -> Pointer {
        match value {
            Value::Map(map) => MapPointer::root(name, map, locale.clone()),
            other => ScalarPointer::root(name, other, locale.clone()),
        }
    }

    fn create_child_pointer(&self, parent: &Pointer, name: Option<QName>, value: Value) -> Pointer {
        match value {
            Value::Map(map) => MapPointer::child(parent.clone(), name, map),
            other => ScalarPointer::child(parent.clone(), name, other),
        }
    }
}

#[derive(Debug)]
struct RecordPointerFactory;

impl PointerFactory for RecordPointerFactory {
    fn can_address(&self, value: &Value) -> bool {
        matches!(value, Value::Record(_))
    }

    fn create_pointer(&self, name: Option<QName>, value: Value, locale: &Locale) -> Pointer {
        match value {
            Value::Record(record) => RecordPointer::root(name, record, locale.clone()),
            other => ScalarPointer::root(name, other, locale.clone()),
        }
    }

    fn create_child_pointer(&self, parent: &Pointer, name: Option<QName>, value: Value) -> Pointer {
        match value {
            Value::Record(record) => RecordPointer::child(parent.clone(), name, record),
            other => ScalarPointer::child(parent.clone(), name, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Tagged(&'static str);

    impl PointerFactory for Tagged {
        fn can_address(&self, value: &Value) -> bool {
            matches!(value, Value::String(_))
        }

        fn create_pointer(&self, _name: Option<QName>, value: Value, locale: &Locale) -> Pointer {
            ScalarPointer::root(Some(QName::local(self.0)), value, locale.clone())
        }

        fn create_child_pointer(
            &self,
            parent: &Pointer,
            _name: Option<QName>,
            value: Value,
        ) -> Pointer {
            ScalarPointer::child(parent.clone(), Some(QName::local(self.0)), value)
        }
    }

    #[test]
    fn registration_invalidates_the_sorted_view() {
        let registry = PointerRegistry::new();
        registry.register(Arc::new(Tagged("late")), 50);
        let first = registry.factories();
        assert_eq!(first.len(), 1);
        registry.register(Arc::new(Tagged("early")), 5);
        let second = registry.factories();
        assert_eq!(second.len(), 2);
        let pointer = registry.resolve(None, Value::from("x"), &Locale::default());
        assert_eq!(pointer.name(), Some(QName::local("early")));
    }

    #[test]
    fn unclaimed_values_fall_back_to_scalars() {
        let registry = PointerRegistry::new();
        let pointer = registry.resolve(None, Value::from(4), &Locale::default());
        assert!(pointer.is_leaf());
        assert_eq!(pointer.value(), Value::from(4));
    }
}

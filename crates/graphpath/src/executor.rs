//! Query operations on a [`Context`].
//!
//! Every operation compiles the query through the context's cache (or takes
//! a precompiled expression in its `_compiled` flavour), evaluates it
//! against the context pointer and normalizes the result shape. Strict
//! contexts fail with [`Error::NoValue`] where lenient ones return a null
//! or empty result.
use crate::compiler::CompiledExpression;
use crate::context::Context;
use crate::convert::{FromValue, TargetType};
use crate::error::{Error, EvalError, Operation, Result};
use crate::evaluator::Computed;
use crate::model::Pointer;
use crate::registry;
use crate::value::Value;

/// Values produced by [`Context::iterate`].
#[derive(Debug)]
pub struct QueryIter {
    inner: std::vec::IntoIter<Value>,
}

impl Iterator for QueryIter {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for QueryIter {}

/// Pointers produced by [`Context::iterate_pointers`], in document order.
#[derive(Debug)]
pub struct PointerIter {
    inner: std::vec::IntoIter<Pointer>,
}

impl Iterator for PointerIter {
    type Item = Pointer;

    fn next(&mut self) -> Option<Pointer> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for PointerIter {}

impl DoubleEndedIterator for PointerIter {
    fn next_back(&mut self) -> Option<Pointer> {
        self.inner.next_back()
    }
}

impl Context<'_> {
    // ===== Reading =====

    /// Value addressed by `query`.
    ///
    /// In strict mode a path that reaches nothing fails with
    /// [`Error::NoValue`], except for a slot that is merely empty inside an
    /// existing container.
    pub fn read(&self, query: &str) -> Result<Value> {
        self.run(Operation::Read, query, || self.read_value(&*self.compile(query)?))
    }

    pub fn read_compiled(&self, compiled: &CompiledExpression) -> Result<Value> {
        self.run(Operation::Read, compiled.source(), || self.read_value(compiled))
    }

    /// Like [`Context::read`], converting a non-null result to `target`.
    pub fn read_typed(&self, query: &str, target: TargetType) -> Result<Value> {
        self.run(Operation::Read, query, || self.read_converted(&*self.compile(query)?, target))
    }

    pub fn read_typed_compiled(&self, compiled: &CompiledExpression, target: TargetType) -> Result<Value> {
        self.run(Operation::Read, compiled.source(), || self.read_converted(compiled, target))
    }

    /// Typed read into a Rust type; `None` when the result is null.
    pub fn read_as<T: FromValue>(&self, query: &str) -> Result<Option<T>> {
        let value = self.read_typed(query, T::TARGET)?;
        if value.is_null() {
            return Ok(None);
        }
        let found = value.type_name();
        T::from_value(value).map(Some).map_err(|_| Error::InvalidConversion {
            query: query.to_string(),
            found,
            expected: T::TARGET.to_string(),
        })
    }

    /// Every value `query` selects. A list-valued result yields its items.
    pub fn iterate(&self, query: &str) -> Result<QueryIter> {
        self.run(Operation::Iterate, query, || self.iterate_values(&*self.compile(query)?))
    }

    pub fn iterate_compiled(&self, compiled: &CompiledExpression) -> Result<QueryIter> {
        self.run(Operation::Iterate, compiled.source(), || self.iterate_values(compiled))
    }

    /// Pointer to the location `query` addresses. Plain values are wrapped
    /// in a pointer of their own.
    pub fn read_pointer(&self, query: &str) -> Result<Pointer> {
        self.run(Operation::ReadPointer, query, || {
            self.resolve_pointer(&*self.compile(query)?, Operation::ReadPointer)
        })
    }

    pub fn read_pointer_compiled(&self, compiled: &CompiledExpression) -> Result<Pointer> {
        self.run(Operation::ReadPointer, compiled.source(), || {
            self.resolve_pointer(compiled, Operation::ReadPointer)
        })
    }

    /// Pointers to every location `query` selects, in document order.
    pub fn iterate_pointers(&self, query: &str) -> Result<PointerIter> {
        self.run(Operation::IteratePointers, query, || {
            let pointers = self.collect_pointers(&*self.compile(query)?, Operation::IteratePointers)?;
            Ok(PointerIter { inner: pointers.into_iter() })
        })
    }

    pub fn iterate_pointers_compiled(&self, compiled: &CompiledExpression) -> Result<PointerIter> {
        self.run(Operation::IteratePointers, compiled.source(), || {
            let pointers = self.collect_pointers(compiled, Operation::IteratePointers)?;
            Ok(PointerIter { inner: pointers.into_iter() })
        })
    }

    // ===== Writing =====

    /// Assign `value` to the location `query` addresses. The location's
    /// container must exist; see [`Context::create_path_and_set`].
    pub fn write(&self, query: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.run(Operation::Write, query, || self.write_value(&*self.compile(query)?, value))
    }

    pub fn write_compiled(&self, compiled: &CompiledExpression, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.run(Operation::Write, compiled.source(), || self.write_value(compiled, value))
    }

    /// Materialize the location `query` addresses, creating missing
    /// intermediate objects through the context's object factory.
    ///
    /// Only simple paths (named child and attribute steps without
    /// predicates) can be created when nothing is addressed yet.
    pub fn create_path(&self, query: &str) -> Result<Pointer> {
        self.run(Operation::Create, query, || self.create(&*self.compile(query)?, None))
    }

    pub fn create_path_compiled(&self, compiled: &CompiledExpression) -> Result<Pointer> {
        self.run(Operation::Create, compiled.source(), || self.create(compiled, None))
    }

    /// [`Context::create_path`], then assign `value`.
    pub fn create_path_and_set(&self, query: &str, value: impl Into<Value>) -> Result<Pointer> {
        let value = value.into();
        self.run(Operation::Create, query, || self.create(&*self.compile(query)?, Some(value)))
    }

    pub fn create_path_and_set_compiled(
        &self,
        compiled: &CompiledExpression,
        value: impl Into<Value>,
    ) -> Result<Pointer> {
        let value = value.into();
        self.run(Operation::Create, compiled.source(), || self.create(compiled, Some(value)))
    }

    // ===== Removing =====

    /// Remove the location `query` addresses. A location that does not
    /// exist is left alone in lenient mode.
    pub fn remove_one(&self, query: &str) -> Result<()> {
        self.run(Operation::Remove, query, || self.remove_first(&*self.compile(query)?))
    }

    pub fn remove_one_compiled(&self, compiled: &CompiledExpression) -> Result<()> {
        self.run(Operation::Remove, compiled.source(), || self.remove_first(compiled))
    }

    /// Remove every location `query` selects and return how many were
    /// removed. Removal runs in reverse document order so earlier
    /// positions in a sequence stay valid while later ones go.
    pub fn remove_all(&self, query: &str) -> Result<usize> {
        self.run(Operation::Remove, query, || self.remove_selected(&*self.compile(query)?))
    }

    pub fn remove_all_compiled(&self, compiled: &CompiledExpression) -> Result<usize> {
        self.run(Operation::Remove, compiled.source(), || self.remove_selected(compiled))
    }

    // ===== Pipeline =====

    fn run<T>(&self, operation: Operation, query: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        tracing::debug!(%operation, query, lenient = self.is_lenient(), "executing query");
        let result = f();
        if let Err(error) = &result {
            tracing::debug!(%operation, query, %error, "query failed");
        }
        result
    }

    fn compute(&self, compiled: &CompiledExpression, operation: Operation) -> Result<Computed> {
        self.eval_context()
            .compute(compiled)
            .map_err(|err| Error::from_eval(operation, compiled.source(), err))
    }

    fn read_value(&self, compiled: &CompiledExpression) -> Result<Value> {
        let operation = Operation::Read;
        let query = compiled.source();
        let pointer = match self.compute(compiled, operation)? {
            Computed::Value(value) => {
                if value.is_null() && !self.is_lenient() && compiled.is_path() {
                    return Err(Error::no_value(operation, query));
                }
                return Ok(value);
            }
            Computed::Nodes(nodes) => match nodes.into_iter().next() {
                Some(first) => first,
                None if self.is_lenient() => return Ok(Value::Null),
                None => return Err(Error::no_value(operation, query)),
            },
            Computed::Pointer(pointer) => pointer,
        };

        let value_pointer = pointer.value_pointer();
        let value = value_pointer.try_value().map_err(|err| Error::from_eval(operation, query, err))?;
        if !self.is_lenient() && !value_pointer.is_actual() {
            let in_existing_container =
                value_pointer.parent().is_some_and(|parent| parent.is_container() && parent.is_actual());
            if !in_existing_container {
                return Err(Error::no_value(operation, query));
            }
        }
        Ok(value)
    }

    fn read_converted(&self, compiled: &CompiledExpression, target: TargetType) -> Result<Value> {
        let value = self.read_value(compiled)?;
        if value.is_null() {
            return Ok(value);
        }
        let converter = self.converter();
        if !converter.can_convert(&value, target) {
            return Err(Error::InvalidConversion {
                query: compiled.source().to_string(),
                found: value.type_name(),
                expected: target.to_string(),
            });
        }
        converter
            .convert(&value, target)
            .map_err(|err| Error::from_eval(Operation::Read, compiled.source(), err))
    }

    fn iterate_values(&self, compiled: &CompiledExpression) -> Result<QueryIter> {
        let computed = self
            .eval_context()
            .evaluate(compiled)
            .map_err(|err| Error::from_eval(Operation::Iterate, compiled.source(), err))?;
        let values: Vec<Value> = match computed {
            Computed::Value(Value::Null) => Vec::new(),
            Computed::Value(Value::List(list)) => list.read().clone(),
            Computed::Value(value) => vec![value],
            Computed::Nodes(nodes) => nodes.iter().map(Pointer::value).collect(),
            Computed::Pointer(pointer) => pointer.items().iter().map(Pointer::value).collect(),
        };
        Ok(QueryIter { inner: values.into_iter() })
    }

    fn resolve_pointer(&self, compiled: &CompiledExpression, operation: Operation) -> Result<Pointer> {
        let query = compiled.source();
        match self.compute(compiled, operation)? {
            Computed::Nodes(nodes) => match nodes.into_iter().next() {
                Some(first) => Ok(first),
                None if self.is_lenient() => Ok(registry::new_pointer(None, Value::Null, &self.locale())),
                None => Err(Error::no_value(operation, query)),
            },
            Computed::Pointer(pointer) => {
                if !self.is_lenient() && !pointer.is_actual() {
                    return Err(Error::no_value(operation, query));
                }
                Ok(pointer)
            }
            Computed::Value(value) => Ok(registry::new_pointer(None, value, &self.locale())),
        }
    }

    fn collect_pointers(&self, compiled: &CompiledExpression, operation: Operation) -> Result<Vec<Pointer>> {
        let computed = self
            .eval_context()
            .evaluate(compiled)
            .map_err(|err| Error::from_eval(operation, compiled.source(), err))?;
        Ok(match computed {
            Computed::Nodes(nodes) => nodes,
            Computed::Pointer(pointer) => pointer.items(),
            Computed::Value(Value::Null) => Vec::new(),
            Computed::Value(value) => registry::new_pointer(None, value, &self.locale()).items(),
        })
    }

    /// The single location a mutating operation targets, if the query
    /// addresses one.
    fn target(&self, compiled: &CompiledExpression, operation: Operation) -> Result<Option<Pointer>> {
        Ok(match self.compute(compiled, operation)? {
            Computed::Pointer(pointer) => Some(pointer),
            Computed::Nodes(nodes) => nodes.into_iter().next(),
            Computed::Value(_) => None,
        })
    }

    fn write_value(&self, compiled: &CompiledExpression, value: Value) -> Result<()> {
        let operation = Operation::Write;
        let query = compiled.source();
        let pointer = self.target(compiled, operation)?.ok_or_else(|| {
            Error::from_eval(operation, query, EvalError::custom("the query addresses no location"))
        })?;
        pointer.set_value(value).map_err(|err| Error::from_eval(operation, query, err))
    }

    fn create(&self, compiled: &CompiledExpression, value: Option<Value>) -> Result<Pointer> {
        let operation = Operation::Create;
        let query = compiled.source();
        let Some(pointer) = self.target(compiled, operation)? else {
            if !compiled.is_simple_path() {
                return Err(Error::NonCreatablePath { query: query.to_string() });
            }
            return Err(Error::from_eval(
                operation,
                query,
                EvalError::CannotCreate("a location for a path that addresses nothing".into()),
            ));
        };
        let factory = self.factory();
        let created =
            pointer.create_path(&*factory, value).map_err(|err| Error::from_eval(operation, query, err))?;
        tracing::debug!(path = %created, "created path");
        Ok(created)
    }

    fn remove_first(&self, compiled: &CompiledExpression) -> Result<()> {
        let operation = Operation::Remove;
        let query = compiled.source();
        let pointer = match self.compute(compiled, operation)? {
            Computed::Value(value) => {
                let err = EvalError::CannotRemove(format!("a computed {}", value.type_name()));
                return Err(Error::from_eval(operation, query, err));
            }
            Computed::Nodes(nodes) => nodes.into_iter().next(),
            Computed::Pointer(pointer) => Some(pointer),
        };
        match pointer {
            Some(pointer) if pointer.is_actual() => {
                pointer.remove().map_err(|err| Error::from_eval(operation, query, err))
            }
            _ if self.is_lenient() => Ok(()),
            _ => Err(Error::no_value(operation, query)),
        }
    }

    fn remove_selected(&self, compiled: &CompiledExpression) -> Result<usize> {
        let operation = Operation::Remove;
        let mut pointers = self.collect_pointers(compiled, operation)?;
        pointers.sort();
        pointers.dedup();
        for pointer in pointers.iter().rev() {
            tracing::trace!(path = %pointer, "removing");
            pointer.remove().map_err(|err| Error::from_eval(operation, compiled.source(), err))?;
        }
        Ok(pointers.len())
    }
}

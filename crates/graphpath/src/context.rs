//! Query contexts and their scope chain.
//!
//! A [`Context`] binds a graph (its root and current pointer) together with
//! the variables, functions, namespaces and policies queries run under.
//! Contexts form a chain through non-owning parent references: variable and
//! function lookups walk from the innermost context outwards, everything a
//! context leaves unset is inherited.
use core::fmt;
use std::sync::{Arc, LazyLock};

use crate::cache::{self, ExpressionCache};
use crate::compiler::CompiledExpression;
use crate::convert::{DefaultConverter, TypeConverter};
use crate::error::{EvalError, Error, Operation, Result};
use crate::evaluator::EvalContext;
use crate::factory::{MapFactory, ObjectFactory};
use crate::functions::{Function, FunctionLibrary, generic};
use crate::model::{Locale, Pointer, QName, VariablePointer};
use crate::namespace::NamespaceResolver;
use crate::registry;
use crate::value::Value;
use crate::variables::{BasicVariables, Variables};

static DEFAULT_FACTORY: LazyLock<Arc<dyn ObjectFactory>> = LazyLock::new(|| Arc::new(MapFactory));
static DEFAULT_CONVERTER: LazyLock<Arc<dyn TypeConverter>> =
    LazyLock::new(|| Arc::new(DefaultConverter));

pub struct Context<'p> {
    parent: Option<&'p Context<'p>>,
    context_pointer: Pointer,
    root_pointer: Pointer,
    namespaces: Arc<NamespaceResolver>,
    variables: Arc<dyn Variables>,
    functions: Option<Arc<dyn FunctionLibrary>>,
    lenient: Option<bool>,
    factory: Option<Arc<dyn ObjectFactory>>,
    locale: Option<Locale>,
    converter: Option<Arc<dyn TypeConverter>>,
    cache: Arc<ExpressionCache>,
}

impl fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("context_pointer", &self.context_pointer)
            .field("has_parent", &self.parent.is_some())
            .field("lenient", &self.is_lenient())
            .field("namespaces", &self.namespaces)
            .field("variables", &self.variables)
            .field("functions", &self.functions)
            .finish_non_exhaustive()
    }
}

impl<'p> Context<'p> {
    pub fn parent(&self) -> Option<&'p Context<'p>> {
        self.parent
    }

    /// Location relative queries start from.
    pub fn context_pointer(&self) -> &Pointer {
        &self.context_pointer
    }

    /// Root of the bound graph; absolute paths start here.
    pub fn root_pointer(&self) -> &Pointer {
        &self.root_pointer
    }

    /// Whether "no result" conditions yield null/empty results instead of
    /// failing. Unset levels inherit from their parent; the default is
    /// strict.
    pub fn is_lenient(&self) -> bool {
        match (self.lenient, self.parent) {
            (Some(lenient), _) => lenient,
            (None, Some(parent)) => parent.is_lenient(),
            (None, None) => false,
        }
    }

    pub fn set_lenient(&mut self, lenient: bool) {
        self.lenient = Some(lenient);
    }

    /// Variables declared at this level.
    pub fn variables(&self) -> &Arc<dyn Variables> {
        &self.variables
    }

    pub fn set_variables(&mut self, variables: Arc<dyn Variables>) {
        self.variables = variables;
    }

    /// Functions registered at this level.
    pub fn functions(&self) -> Option<&Arc<dyn FunctionLibrary>> {
        self.functions.as_ref()
    }

    pub fn set_functions(&mut self, functions: Arc<dyn FunctionLibrary>) {
        self.functions = Some(functions);
    }

    pub fn factory(&self) -> Arc<dyn ObjectFactory> {
        match (&self.factory, self.parent) {
            (Some(factory), _) => Arc::clone(factory),
            (None, Some(parent)) => parent.factory(),
            (None, None) => Arc::clone(&DEFAULT_FACTORY),
        }
    }

    pub fn set_factory(&mut self, factory: Arc<dyn ObjectFactory>) {
        self.factory = Some(factory);
    }

    pub fn converter(&self) -> Arc<dyn TypeConverter> {
        match (&self.converter, self.parent) {
            (Some(converter), _) => Arc::clone(converter),
            (None, Some(parent)) => parent.converter(),
            (None, None) => Arc::clone(&DEFAULT_CONVERTER),
        }
    }

    pub fn locale(&self) -> Locale {
        match (&self.locale, self.parent) {
            (Some(locale), _) => locale.clone(),
            (None, Some(parent)) => parent.locale(),
            (None, None) => self.root_pointer.locale(),
        }
    }

    pub fn cache(&self) -> &Arc<ExpressionCache> {
        &self.cache
    }

    // ===== Namespaces =====

    /// Bind `prefix` for queries run against this context.
    ///
    /// A sealed resolver is replaced by an unsealed copy first, so holders
    /// of the sealed instance never observe the change.
    pub fn register_namespace(&mut self, prefix: &str, uri: &str) {
        self.unsealed_namespaces().register(prefix, uri);
    }

    /// Pointer whose in-scope namespace declarations back up the explicit
    /// bindings.
    pub fn set_namespace_context_pointer(&mut self, pointer: Option<Pointer>) {
        self.unsealed_namespaces().set_context_pointer(pointer);
    }

    pub fn namespace_context_pointer(&self) -> Option<&Pointer> {
        self.namespaces.context_pointer()
    }

    /// URI bound to `prefix` here or at any enclosing level.
    pub fn namespace_uri(&self, prefix: &str) -> Option<String> {
        self.namespaces.uri_for(prefix).or_else(|| self.parent.and_then(|p| p.namespace_uri(prefix)))
    }

    /// The resolver of this level, sealed so later registrations on this
    /// context do not leak into the returned instance.
    pub fn namespace_resolver(&self) -> Arc<NamespaceResolver> {
        self.namespaces.seal();
        Arc::clone(&self.namespaces)
    }

    fn unsealed_namespaces(&mut self) -> &mut NamespaceResolver {
        if self.namespaces.is_sealed() {
            tracing::debug!("copying sealed namespace resolver");
            self.namespaces = Arc::new((*self.namespaces).clone());
        }
        Arc::make_mut(&mut self.namespaces)
    }

    // ===== Scope resolution =====

    /// Pointer to variable `name`, bound to the innermost level declaring
    /// it. Undeclared names yield an unbound pointer: reading it fails,
    /// writing it declares the variable at this level.
    pub fn variable_pointer(&self, name: &QName) -> Pointer {
        let mut level = Some(self);
        while let Some(context) = level {
            if context.variables.is_declared(name) {
                return VariablePointer::bound(name.clone(), Arc::clone(&context.variables));
            }
            level = context.parent;
        }
        VariablePointer::unbound(name.clone(), Arc::clone(&self.variables))
    }

    /// Function `name` taking `arity` arguments.
    ///
    /// Levels are asked innermost first; a level that does not know the
    /// name, or knows it only for other arities, passes to the next. The
    /// generic library is consulted last.
    pub fn function(&self, name: &QName, arity: usize) -> Result<Function, EvalError> {
        let mut level = Some(self);
        while let Some(context) = level {
            if let Some(library) = &context.functions {
                match library.resolve(name, arity) {
                    Ok(Some(function)) => return Ok(function),
                    Ok(None) | Err(EvalError::WrongArity { .. }) => {}
                    Err(err) => return Err(err),
                }
            }
            level = context.parent;
        }
        generic().resolve(name, arity)?.ok_or_else(|| EvalError::UndefinedFunction(name.clone()))
    }

    // ===== Compilation and evaluation contexts =====

    pub fn compile(&self, query: &str) -> Result<Arc<CompiledExpression>> {
        self.cache.compile(query)
    }

    /// Evaluation context positioned at the context pointer.
    pub fn eval_context(&self) -> EvalContext<'_> {
        EvalContext::new(self, self.context_pointer.clone())
    }

    /// Evaluation context positioned at the root of the bound graph.
    pub fn absolute_root_context(&self) -> EvalContext<'_> {
        EvalContext::new(self, self.root_pointer.clone())
    }

    // ===== Derived contexts =====

    /// Child context over an unrelated value. Only the scope chain is
    /// shared.
    pub fn child(&self, value: impl Into<Value>) -> Context<'_> {
        ContextBuilder::new(value).build_child(self)
    }

    /// Child context positioned at `pointer`, which must address an
    /// existing node of the bound graph.
    pub fn relative_context(&self, pointer: &Pointer) -> Result<Context<'_>> {
        if pointer.node().is_null() {
            let err = Error::Evaluation {
                operation: Operation::RelativeContext,
                query: pointer.as_path(),
                source: EvalError::custom("the pointer does not address an existing node"),
            };
            tracing::debug!(%err, "relative context rejected");
            return Err(err);
        }
        Ok(ContextBuilder::from_pointer(pointer.clone()).build_child(self))
    }
}

fn top_of(pointer: &Pointer) -> Pointer {
    let mut current = pointer.clone();
    while let Some(parent) = current.parent() {
        current = parent;
    }
    current
}

/// Builder for [`Context`].
///
/// ```
/// use graphpath::{ContextBuilder, Value};
///
/// let context = ContextBuilder::new(Value::from_json(&serde_json::json!({ "a": 1 })))
///     .lenient(true)
///     .with_variable("limit", 10)
///     .build();
/// assert!(context.is_lenient());
/// ```
pub struct ContextBuilder {
    value: Option<Value>,
    pointer: Option<Pointer>,
    lenient: Option<bool>,
    namespaces: Vec<(String, String)>,
    variables: Arc<dyn Variables>,
    bindings: Vec<(QName, Value)>,
    functions: Option<Arc<dyn FunctionLibrary>>,
    factory: Option<Arc<dyn ObjectFactory>>,
    locale: Option<Locale>,
    converter: Option<Arc<dyn TypeConverter>>,
    cache: Option<Arc<ExpressionCache>>,
}

impl fmt::Debug for ContextBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextBuilder")
            .field("value", &self.value)
            .field("pointer", &self.pointer)
            .field("lenient", &self.lenient)
            .field("namespaces", &self.namespaces)
            .finish_non_exhaustive()
    }
}

impl ContextBuilder {
    pub fn new(value: impl Into<Value>) -> Self {
        Self::with_source(Some(value.into()), None)
    }

    /// Bind an existing pointer instead of a raw value. The root pointer is
    /// the top of its parent chain.
    pub fn from_pointer(pointer: Pointer) -> Self {
        Self::with_source(None, Some(pointer))
    }

    fn with_source(value: Option<Value>, pointer: Option<Pointer>) -> Self {
        ContextBuilder {
            value,
            pointer,
            lenient: None,
            namespaces: Vec::new(),
            variables: Arc::new(BasicVariables::new()),
            bindings: Vec::new(),
            functions: None,
            factory: None,
            locale: None,
            converter: None,
            cache: None,
        }
    }

    #[must_use]
    pub fn with_pointer(mut self, pointer: Pointer) -> Self {
        self.value = None;
        self.pointer = Some(pointer);
        self
    }

    #[must_use]
    pub fn lenient(mut self, lenient: bool) -> Self {
        self.lenient = Some(lenient);
        self
    }

    #[must_use]
    pub fn with_namespace(mut self, prefix: &str, uri: &str) -> Self {
        self.namespaces.push((prefix.to_string(), uri.to_string()));
        self
    }

    #[must_use]
    pub fn with_variables(mut self, variables: Arc<dyn Variables>) -> Self {
        self.variables = variables;
        self
    }

    /// Declare `name` (`prefix:local` or `local`) in this level's
    /// variables when the context is built, whichever set they end up in.
    #[must_use]
    pub fn with_variable(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.bindings.push((QName::parse(name), value.into()));
        self
    }

    #[must_use]
    pub fn with_functions(mut self, functions: Arc<dyn FunctionLibrary>) -> Self {
        self.functions = Some(functions);
        self
    }

    #[must_use]
    pub fn with_factory(mut self, factory: Arc<dyn ObjectFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    #[must_use]
    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = Some(locale);
        self
    }

    #[must_use]
    pub fn with_converter(mut self, converter: Arc<dyn TypeConverter>) -> Self {
        self.converter = Some(converter);
        self
    }

    /// Compile through `cache` instead of the process-wide one.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<ExpressionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn build(self) -> Context<'static> {
        self.assemble(None)
    }

    /// Build a context nested in `parent`. Unset policies, the locale and
    /// the cache are inherited.
    pub fn build_child<'p>(self, parent: &'p Context<'p>) -> Context<'p> {
        self.assemble(Some(parent))
    }

    fn assemble<'p>(self, parent: Option<&'p Context<'p>>) -> Context<'p> {
        let locale = self.locale.clone().or_else(|| parent.map(Context::locale)).unwrap_or_default();
        let context_pointer = match (self.pointer, self.value) {
            (Some(pointer), _) => pointer,
            (None, value) => registry::new_pointer(None, value.unwrap_or_default(), &locale),
        };
        let root_pointer = top_of(&context_pointer);
        for (name, value) in self.bindings {
            self.variables.declare(name, value);
        }

        let mut namespaces = NamespaceResolver::new();
        namespaces.set_context_pointer(Some(context_pointer.clone()));
        for (prefix, uri) in &self.namespaces {
            namespaces.register(prefix, uri);
        }

        let cache = self
            .cache
            .or_else(|| parent.map(|p| Arc::clone(&p.cache)))
            .unwrap_or_else(cache::global);

        Context {
            parent,
            context_pointer,
            root_pointer,
            namespaces: Arc::new(namespaces),
            variables: self.variables,
            functions: self.functions,
            lenient: self.lenient,
            factory: self.factory,
            locale: self.locale,
            converter: self.converter,
            cache,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::Functions;

    #[test]
    fn policies_are_inherited_until_overridden() {
        let outer = ContextBuilder::new(Value::Null).lenient(true).build();
        let mut inner = outer.child(Value::Null);
        assert!(inner.is_lenient());
        inner.set_lenient(false);
        assert!(!inner.is_lenient());
        assert!(outer.is_lenient());
    }

    #[test]
    fn sealed_resolver_is_copied_on_write() {
        let mut context = ContextBuilder::new(Value::Null).with_namespace("a", "urn:a").build();
        let sealed = context.namespace_resolver();
        context.register_namespace("a", "urn:b");
        assert_eq!(sealed.uri_for("a").as_deref(), Some("urn:a"));
        assert_eq!(context.namespace_uri("a").as_deref(), Some("urn:b"));
        assert!(!context.namespaces.is_sealed());
    }

    #[test]
    fn user_wrong_arity_falls_through_to_outer_levels() {
        let outer_fns = Functions::new().with("twice", 1, |_ctx, args| {
            Ok(crate::evaluator::Computed::Value(Value::Number(args[0].number_value() * 2.0)))
        });
        let outer = ContextBuilder::new(Value::Null).with_functions(Arc::new(outer_fns)).build();
        let inner_fns = Functions::new().with("twice", 2, |_ctx, _args| {
            Ok(crate::evaluator::Computed::Value(Value::Null))
        });
        let inner = ContextBuilder::new(Value::Null).with_functions(Arc::new(inner_fns)).build_child(&outer);

        assert!(inner.function(&QName::local("twice"), 1).is_ok());
        assert!(inner.function(&QName::local("twice"), 2).is_ok());
        assert!(matches!(
            inner.function(&QName::local("twice"), 3),
            Err(EvalError::UndefinedFunction(_))
        ));
        assert!(matches!(
            inner.function(&QName::local("concat"), 1),
            Err(EvalError::WrongArity { .. })
        ));
    }
}

//! Compiled, cached path expressions over in-memory object graphs.
//!
//! A [`Context`] binds a graph of [`Value`]s (maps, lists, records, tree
//! documents) and runs XPath 1.0 style queries against it: reading values
//! and pointers, writing, creating missing structure and removing.
//!
//! ```
//! use graphpath::{ContextBuilder, Value};
//!
//! let graph = Value::from_json(&serde_json::json!({
//!     "orders": [{ "id": 1, "total": 20 }, { "id": 2, "total": 5 }]
//! }));
//! let context = ContextBuilder::new(graph).build();
//! assert_eq!(context.read("orders[total > 10]/id").unwrap(), Value::from(1));
//!
//! context.create_path_and_set("customer/name", "Ada").unwrap();
//! assert_eq!(context.read("customer/name").unwrap(), Value::from("Ada"));
//! ```
pub mod cache;
pub mod compiler;
pub mod context;
pub mod convert;
pub mod document;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod factory;
pub mod functions;
pub mod model;
pub mod namespace;
pub mod parser;
pub mod registry;
pub mod value;
pub mod variables;

pub use cache::{CacheConfig, ExpressionCache};
pub use compiler::{CompiledExpression, compile};
pub use context::{Context, ContextBuilder};
pub use convert::{DefaultConverter, FromValue, TargetType, TypeConverter};
pub use document::{DocNode, attr, doc, elem, ns, text};
pub use error::{Error, ErrorKind, EvalError, Operation, Result};
pub use evaluator::{Computed, EvalContext};
pub use executor::{PointerIter, QueryIter};
pub use factory::{MapFactory, ObjectFactory};
pub use functions::{CallCtx, Function, FunctionLibrary, Functions};
pub use model::{Locale, NodeKind, NodePointer, Pointer, QName};
pub use namespace::NamespaceResolver;
pub use registry::{PointerFactory, PointerRegistry, register_pointer_factory};
pub use value::{FieldRecord, Record, Value};
pub use variables::{BasicVariables, Variables};

use core::fmt;
use std::sync::Arc;

use crate::model::QName;

/// The query operation during which an error surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Read,
    Iterate,
    ReadPointer,
    IteratePointers,
    Write,
    Create,
    Remove,
    RelativeContext,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Read => "read",
            Operation::Iterate => "iterate",
            Operation::ReadPointer => "read pointer",
            Operation::IteratePointers => "iterate pointers",
            Operation::Write => "write",
            Operation::Create => "create",
            Operation::Remove => "remove",
            Operation::RelativeContext => "relative context",
        }
    }

    /// Mutating operations report collaborator failures as [`Error::Mutation`].
    pub fn is_mutation(self) -> bool {
        matches!(self, Operation::Write | Operation::Create | Operation::Remove)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure raised by collaborators during evaluation: pointers, functions,
/// variable sets, object factories and converters.
///
/// These never reach callers unwrapped; the executor attaches the query text
/// and the operation (see [`Error::from_eval`]).
#[derive(Debug, Clone, thiserror::Error)]
pub enum EvalError {
    #[error("undefined function: {0}")]
    UndefinedFunction(QName),
    #[error("function {name} does not accept {arity} argument(s); available: {available:?}")]
    WrongArity { name: QName, arity: usize, available: Vec<usize> },
    #[error("undefined variable: ${0}")]
    UndefinedVariable(QName),
    #[error("location is read-only: {0}")]
    ReadOnly(String),
    #[error("cannot create {0}")]
    CannotCreate(String),
    #[error("cannot remove {0}")]
    CannotRemove(String),
    #[error("type error: {0}")]
    Type(String),
    #[error("{message}")]
    Custom { message: String, source: Option<Arc<dyn core::error::Error + Send + Sync>> },
}

impl EvalError {
    pub fn custom(message: impl Into<String>) -> Self {
        EvalError::Custom { message: message.into(), source: None }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl core::error::Error + Send + Sync + 'static,
    ) -> Self {
        EvalError::Custom { message: message.into(), source: Some(Arc::new(source)) }
    }
}

/// Discriminant of [`Error`], for matching on the failure kind alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Compile,
    NoValue,
    InvalidConversion,
    NonCreatablePath,
    UndefinedFunction,
    Mutation,
    Evaluation,
}

/// Error returned by every query operation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("cannot compile '{query}' at position {position}: {message}")]
    Compile { query: String, position: usize, message: String },
    #[error("no value for path '{query}' ({operation})")]
    NoValue { operation: Operation, query: String },
    #[error("invalid expression type: '{query}' returns {found}, it cannot be converted to {expected}")]
    InvalidConversion { query: String, found: String, expected: String },
    #[error(
        "cannot create path '{query}': only child and attribute steps without predicates can be created"
    )]
    NonCreatablePath { query: String },
    #[error("undefined function {name} in '{query}'")]
    UndefinedFunction { name: QName, query: String },
    #[error("exception trying to {operation} path '{query}': {source}")]
    Mutation {
        operation: Operation,
        query: String,
        #[source]
        source: EvalError,
    },
    #[error("failed to {operation} path '{query}': {source}")]
    Evaluation {
        operation: Operation,
        query: String,
        #[source]
        source: EvalError,
    },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Compile { .. } => ErrorKind::Compile,
            Error::NoValue { .. } => ErrorKind::NoValue,
            Error::InvalidConversion { .. } => ErrorKind::InvalidConversion,
            Error::NonCreatablePath { .. } => ErrorKind::NonCreatablePath,
            Error::UndefinedFunction { .. } => ErrorKind::UndefinedFunction,
            Error::Mutation { .. } => ErrorKind::Mutation,
            Error::Evaluation { .. } => ErrorKind::Evaluation,
        }
    }

    /// The query text the failure belongs to.
    pub fn query(&self) -> &str {
        match self {
            Error::Compile { query, .. }
            | Error::NoValue { query, .. }
            | Error::InvalidConversion { query, .. }
            | Error::NonCreatablePath { query }
            | Error::UndefinedFunction { query, .. }
            | Error::Mutation { query, .. }
            | Error::Evaluation { query, .. } => query,
        }
    }

    pub(crate) fn no_value(operation: Operation, query: &str) -> Self {
        Error::NoValue { operation, query: query.to_string() }
    }

    /// Attach operation and query text to a collaborator failure.
    ///
    /// Undefined functions keep their own kind; everything else becomes a
    /// mutation failure for write/create/remove and an evaluation failure
    /// otherwise.
    pub(crate) fn from_eval(operation: Operation, query: &str, source: EvalError) -> Self {
        match source {
            EvalError::UndefinedFunction(name) => {
                Error::UndefinedFunction { name, query: query.to_string() }
            }
            source if operation.is_mutation() => {
                Error::Mutation { operation, query: query.to_string(), source }
            }
            source => Error::Evaluation { operation, query: query.to_string(), source },
        }
    }
}

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_function_keeps_its_kind_during_mutation() {
        let err = Error::from_eval(
            Operation::Write,
            "foo()",
            EvalError::UndefinedFunction(QName::local("foo")),
        );
        assert_eq!(err.kind(), ErrorKind::UndefinedFunction);
        assert_eq!(err.query(), "foo()");
    }

    #[test]
    fn collaborator_failures_are_wrapped_per_operation() {
        let write = Error::from_eval(Operation::Remove, "a", EvalError::CannotRemove("/a".into()));
        assert_eq!(write.kind(), ErrorKind::Mutation);
        assert!(write.to_string().contains("remove"));

        let read = Error::from_eval(Operation::Read, "a", EvalError::Type("x".into()));
        assert_eq!(read.kind(), ErrorKind::Evaluation);
    }
}

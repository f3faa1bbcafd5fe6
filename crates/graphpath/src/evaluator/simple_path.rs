//! Interpreter for simple paths: each named step follows the first
//! matching child or attribute, and continues through hypothetical slots
//! once the graph ends.
use super::{EvalContext, resolve_name};
use crate::compiler::ir::{Origin, SimplePath};
use crate::model::Pointer;

/// Undeclared variables resolve to unbound pointers here; reading through
/// them fails later, writing declares them.
pub(super) fn interpret(ctx: &EvalContext<'_>, path: &SimplePath) -> Pointer {
    let context = ctx.context();
    let mut current = match &path.origin {
        Origin::Context => ctx.pointer().clone(),
        Origin::Root => context.root_pointer().clone(),
        Origin::Variable(name) => context.variable_pointer(name),
    };
    for step in &path.steps {
        current = current.child_slot(&resolve_name(context, &step.name), step.attribute);
    }
    tracing::trace!(path = %current, actual = current.is_actual(), "resolved simple path");
    current
}

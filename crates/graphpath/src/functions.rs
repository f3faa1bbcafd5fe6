//! Function libraries.
//!
//! Registration conventions:
//! - One registration per function name using an arity range; closures
//!   dispatch on `args.len()` for optional parameters.
//! - Overlapping ranges are allowed; resolution picks the most specific one
//!   (highest minimum, then smallest maximum).
//!
//! The process-wide [`generic`] library holds the XPath 1.0 core functions
//! and is consulted after every context-level library.
use core::fmt;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use itertools::Itertools;

use crate::context::Context;
use crate::error::EvalError;
use crate::evaluator::Computed;
use crate::model::{Pointer, QName};
use crate::value::Value;

pub type Arity = usize;

/// Evaluation state handed to function implementations.
pub struct CallCtx<'a> {
    pub context: &'a Context<'a>,
    /// The context node of the call.
    pub node: &'a Pointer,
    pub position: usize,
    pub size: usize,
}

pub type Function =
    Arc<dyn Fn(&CallCtx<'_>, &[Computed]) -> Result<Computed, EvalError> + Send + Sync>;

/// A set of functions one context level contributes.
pub trait FunctionLibrary: Send + Sync + fmt::Debug {
    /// `Ok(None)` when the library does not know `name`; `WrongArity` when
    /// it knows the name but not for `arity` arguments.
    fn resolve(&self, name: &QName, arity: Arity) -> Result<Option<Function>, EvalError>;
}

#[derive(Clone, Default)]
pub struct Functions {
    // Each name maps to (min_arity, max_arity, impl) tuples; `None` as
    // maximum marks a variadic function.
    fns: HashMap<QName, Vec<(Arity, Option<Arity>, Function)>>,
}

impl fmt::Debug for Functions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.fns.keys().map(ToString::to_string).sorted().collect();
        f.debug_struct("Functions").field("names", &names).finish()
    }
}

impl Functions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` (`prefix:local` or `local`) for exactly `arity`
    /// arguments.
    pub fn register<F>(&mut self, name: &str, arity: Arity, f: F)
    where
        F: 'static + Send + Sync + Fn(&CallCtx<'_>, &[Computed]) -> Result<Computed, EvalError>,
    {
        self.register_range(name, arity, Some(arity), f);
    }

    pub fn register_variadic<F>(&mut self, name: &str, min_arity: Arity, f: F)
    where
        F: 'static + Send + Sync + Fn(&CallCtx<'_>, &[Computed]) -> Result<Computed, EvalError>,
    {
        self.register_range(name, min_arity, None, f);
    }

    pub fn register_range<F>(&mut self, name: &str, min_arity: Arity, max_arity: Option<Arity>, f: F)
    where
        F: 'static + Send + Sync + Fn(&CallCtx<'_>, &[Computed]) -> Result<Computed, EvalError>,
    {
        let candidates = self.fns.entry(QName::parse(name)).or_default();
        candidates.push((min_arity, max_arity, Arc::new(f)));
        candidates.sort_by(|a, b| {
            b.0.cmp(&a.0).then_with(|| match (a.1, b.1) {
                (Some(amax), Some(bmax)) => amax.cmp(&bmax),
                (Some(_), None) => core::cmp::Ordering::Less,
                (None, Some(_)) => core::cmp::Ordering::Greater,
                (None, None) => core::cmp::Ordering::Equal,
            })
        });
    }

    #[must_use]
    pub fn with<F>(mut self, name: &str, arity: Arity, f: F) -> Self
    where
        F: 'static + Send + Sync + Fn(&CallCtx<'_>, &[Computed]) -> Result<Computed, EvalError>,
    {
        self.register(name, arity, f);
        self
    }

    pub fn contains(&self, name: &QName) -> bool {
        self.fns.contains_key(&lookup_key(name))
    }
}

fn lookup_key(name: &QName) -> QName {
    QName { prefix: name.prefix.clone(), local: name.local.clone(), ns_uri: None }
}

impl FunctionLibrary for Functions {
    fn resolve(&self, name: &QName, arity: Arity) -> Result<Option<Function>, EvalError> {
        let key = lookup_key(name);
        let Some(candidates) = self.fns.get(&key) else {
            return Ok(None);
        };
        if let Some((_, _, f)) =
            candidates.iter().find(|(min, max, _)| arity >= *min && max.is_none_or(|m| arity <= m))
        {
            return Ok(Some(Arc::clone(f)));
        }
        let mut available: Vec<Arity> = Vec::new();
        for (min, max, _) in candidates {
            match max {
                Some(max) => available.extend(*min..=*max),
                None => available.push(*min),
            }
        }
        available.sort_unstable();
        available.dedup();
        Err(EvalError::WrongArity { name: key, arity, available })
    }
}

static GENERIC: LazyLock<Functions> = LazyLock::new(generic_functions);

/// The process-wide library of unnamespaced core functions.
pub fn generic() -> &'static Functions {
    &GENERIC
}

fn string(value: impl Into<String>) -> Computed {
    Computed::Value(Value::String(value.into()))
}

fn number(value: f64) -> Computed {
    Computed::Value(Value::Number(value))
}

fn boolean(value: bool) -> Computed {
    Computed::Value(Value::Bool(value))
}

#[allow(clippy::cast_precision_loss)]
fn count(n: usize) -> f64 {
    n as f64
}

fn node_set(args: &[Computed], index: usize, function: &str) -> Result<Vec<Pointer>, EvalError> {
    args.get(index)
        .and_then(Computed::nodes)
        .ok_or_else(|| EvalError::Type(format!("{function}() expects a node-set argument")))
}

/// String argument `index`, or the string value of the context node.
fn string_arg(ctx: &CallCtx<'_>, args: &[Computed], index: usize) -> String {
    match args.get(index) {
        Some(arg) => arg.string_value(),
        None => ctx.node.value().string_value(),
    }
}

/// The node named by an optional node-set argument, or the context node.
fn named_node(ctx: &CallCtx<'_>, args: &[Computed], function: &str) -> Result<Option<Pointer>, EvalError> {
    if args.is_empty() {
        return Ok(Some(ctx.node.clone()));
    }
    Ok(node_set(args, 0, function)?.into_iter().next())
}

/// XPath `round`: halves round towards positive infinity.
fn xpath_round(n: f64) -> f64 {
    if n.is_nan() || n.is_infinite() { n } else { (n + 0.5).floor() }
}

fn substring(text: &str, start: f64, length: Option<f64>) -> String {
    let start = xpath_round(start);
    let end = length.map_or(f64::INFINITY, |len| start + xpath_round(len));
    text.chars()
        .enumerate()
        .filter(|(i, _)| {
            let position = count(*i + 1);
            position >= start && position < end
        })
        .map(|(_, c)| c)
        .collect()
}

fn translate(text: &str, from: &str, to: &str) -> String {
    let from: Vec<char> = from.chars().collect();
    let to: Vec<char> = to.chars().collect();
    text.chars()
        .filter_map(|c| match from.iter().position(|f| *f == c) {
            Some(i) => to.get(i).copied(),
            None => Some(c),
        })
        .collect()
}

fn generic_functions() -> Functions {
    let mut reg = Functions::new();

    // ===== Node-set functions =====
    reg.register("last", 0, |ctx, _args| Ok(number(count(ctx.size))));
    reg.register("position", 0, |ctx, _args| Ok(number(count(ctx.position))));
    reg.register("count", 1, |_ctx, args| Ok(number(count(node_set(args, 0, "count")?.len()))));
    reg.register_range("name", 0, Some(1), |ctx, args| {
        let node = named_node(ctx, args, "name")?;
        Ok(string(node.and_then(|n| n.name()).map(|n| n.to_string()).unwrap_or_default()))
    });
    reg.register_range("local-name", 0, Some(1), |ctx, args| {
        let node = named_node(ctx, args, "local-name")?;
        Ok(string(node.and_then(|n| n.name()).map(|n| n.local.to_string()).unwrap_or_default()))
    });
    reg.register_range("namespace-uri", 0, Some(1), |ctx, args| {
        let node = named_node(ctx, args, "namespace-uri")?;
        let uri = node.and_then(|n| n.name()).and_then(|n| n.ns_uri).map(|u| u.to_string());
        Ok(string(uri.unwrap_or_default()))
    });

    // ===== String functions =====
    reg.register_range("string", 0, Some(1), |ctx, args| Ok(string(string_arg(ctx, args, 0))));
    reg.register_variadic("concat", 2, |_ctx, args| {
        Ok(string(args.iter().map(Computed::string_value).join("")))
    });
    reg.register("contains", 2, |_ctx, args| {
        Ok(boolean(args[0].string_value().contains(&args[1].string_value())))
    });
    reg.register("starts-with", 2, |_ctx, args| {
        Ok(boolean(args[0].string_value().starts_with(&args[1].string_value())))
    });
    reg.register("ends-with", 2, |_ctx, args| {
        Ok(boolean(args[0].string_value().ends_with(&args[1].string_value())))
    });
    reg.register_range("substring", 2, Some(3), |_ctx, args| {
        let length = args.get(2).map(Computed::number_value);
        Ok(string(substring(&args[0].string_value(), args[1].number_value(), length)))
    });
    reg.register("substring-before", 2, |_ctx, args| {
        let text = args[0].string_value();
        let needle = args[1].string_value();
        Ok(string(text.split_once(needle.as_str()).map(|(before, _)| before).unwrap_or_default()))
    });
    reg.register("substring-after", 2, |_ctx, args| {
        let text = args[0].string_value();
        let needle = args[1].string_value();
        Ok(string(text.split_once(needle.as_str()).map(|(_, after)| after).unwrap_or_default()))
    });
    reg.register_range("string-length", 0, Some(1), |ctx, args| {
        Ok(number(count(string_arg(ctx, args, 0).chars().count())))
    });
    reg.register_range("normalize-space", 0, Some(1), |ctx, args| {
        Ok(string(string_arg(ctx, args, 0).split_whitespace().join(" ")))
    });
    reg.register("translate", 3, |_ctx, args| {
        Ok(string(translate(&args[0].string_value(), &args[1].string_value(), &args[2].string_value())))
    });

    // ===== Boolean functions =====
    reg.register("true", 0, |_ctx, _args| Ok(boolean(true)));
    reg.register("false", 0, |_ctx, _args| Ok(boolean(false)));
    reg.register("not", 1, |_ctx, args| Ok(boolean(!args[0].boolean_value())));
    reg.register("boolean", 1, |_ctx, args| Ok(boolean(args[0].boolean_value())));
    reg.register("lang", 1, |ctx, args| {
        let wanted = args[0].string_value().to_ascii_lowercase();
        let locale = ctx.node.locale().as_str().to_ascii_lowercase();
        Ok(boolean(
            locale == wanted
                || locale.strip_prefix(wanted.as_str()).is_some_and(|rest| rest.starts_with(['-', '_'])),
        ))
    });

    // ===== Number functions =====
    reg.register_range("number", 0, Some(1), |ctx, args| {
        Ok(number(match args.first() {
            Some(arg) => arg.number_value(),
            None => ctx.node.value().number_value(),
        }))
    });
    reg.register("sum", 1, |_ctx, args| {
        let nodes = node_set(args, 0, "sum")?;
        Ok(number(nodes.iter().map(|node| node.value().number_value()).sum()))
    });
    reg.register("floor", 1, |_ctx, args| Ok(number(args[0].number_value().floor())));
    reg.register("ceiling", 1, |_ctx, args| Ok(number(args[0].number_value().ceil())));
    reg.register("round", 1, |_ctx, args| Ok(number(xpath_round(args[0].number_value()))));

    reg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn most_specific_range_wins() {
        let mut reg = Functions::new();
        reg.register_variadic("f", 1, |_ctx, _args| Ok(string("variadic")));
        reg.register("f", 2, |_ctx, _args| Ok(string("exact")));
        let names: Vec<_> = reg.fns[&QName::local("f")].iter().map(|(min, max, _)| (*min, *max)).collect();
        assert_eq!(names, vec![(2, Some(2)), (1, None)]);
    }

    #[test]
    fn wrong_arity_lists_available_arities() {
        let err = generic().resolve(&QName::local("substring"), 1).err().expect("wrong arity");
        match err {
            EvalError::WrongArity { available, .. } => assert_eq!(available, vec![2, 3]),
            other => panic!("unexpected {other:?}"),
        }
        assert!(generic().resolve(&QName::local("nope"), 0).expect("lookup").is_none());
    }

    #[test]
    fn substring_follows_xpath_rounding() {
        assert_eq!(substring("12345", 1.5, Some(2.6)), "234");
        assert_eq!(substring("12345", 0.0, Some(3.0)), "12");
        assert_eq!(substring("12345", f64::NAN, Some(3.0)), "");
        assert_eq!(substring("12345", -42.0, Some(f64::INFINITY)), "12345");
        assert_eq!(translate("--aaa--", "abc-", "ABC"), "AAA");
    }
}

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::model::Pointer;

pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Prefix to URI bindings of one context, with a pointer whose in-scope
/// namespace declarations serve as fallback.
///
/// Once sealed the resolver is shared read-only. Owners mutate a sealed
/// resolver by replacing it with a copy (see `Context::register_namespace`);
/// copies start unsealed.
#[derive(Debug, Default)]
pub struct NamespaceResolver {
    bindings: BTreeMap<String, String>,
    context_pointer: Option<Pointer>,
    sealed: AtomicBool,
}

impl Clone for NamespaceResolver {
    fn clone(&self) -> Self {
        NamespaceResolver {
            bindings: self.bindings.clone(),
            context_pointer: self.context_pointer.clone(),
            sealed: AtomicBool::new(false),
        }
    }
}

impl NamespaceResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `prefix`. The reserved `xml` prefix cannot be rebound.
    pub fn register(&mut self, prefix: &str, uri: &str) {
        debug_assert!(!self.is_sealed(), "sealed namespace resolvers are immutable");
        if prefix == "xml" {
            return;
        }
        self.bindings.insert(prefix.to_string(), uri.to_string());
    }

    pub fn set_context_pointer(&mut self, pointer: Option<Pointer>) {
        debug_assert!(!self.is_sealed(), "sealed namespace resolvers are immutable");
        self.context_pointer = pointer;
    }

    pub fn context_pointer(&self) -> Option<&Pointer> {
        self.context_pointer.as_ref()
    }

    pub fn uri_for(&self, prefix: &str) -> Option<String> {
        if prefix == "xml" {
            return Some(XML_NAMESPACE.to_string());
        }
        if let Some(uri) = self.bindings.get(prefix) {
            return Some(uri.clone());
        }
        self.context_pointer.as_ref().and_then(|pointer| pointer.namespace_uri(prefix))
    }

    /// First registered prefix bound to `uri`.
    pub fn prefix_for(&self, uri: &str) -> Option<String> {
        if uri == XML_NAMESPACE {
            return Some("xml".to_string());
        }
        self.bindings.iter().find(|(_, bound)| bound.as_str() == uri).map(|(prefix, _)| prefix.clone())
    }

    /// Explicitly registered bindings, in prefix order.
    pub fn bindings(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings.iter().map(|(prefix, uri)| (prefix.as_str(), uri.as_str()))
    }

    pub fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_are_unsealed_and_independent() {
        let mut original = NamespaceResolver::new();
        original.register("a", "urn:a");
        original.seal();

        let mut copy = original.clone();
        assert!(!copy.is_sealed());
        copy.register("a", "urn:changed");

        assert_eq!(original.uri_for("a").as_deref(), Some("urn:a"));
        assert_eq!(copy.uri_for("a").as_deref(), Some("urn:changed"));
        assert_eq!(copy.prefix_for("urn:changed").as_deref(), Some("a"));
    }

    #[test]
    fn xml_prefix_is_reserved() {
        let mut resolver = NamespaceResolver::new();
        resolver.register("xml", "urn:other");
        assert_eq!(resolver.uri_for("xml").as_deref(), Some(XML_NAMESPACE));
    }
}

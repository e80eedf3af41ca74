//! Processor registry with supertype-chain fallback.
//!
//! Processors are indexed by contract type name for O(1) dispatch. When a
//! type name resolves to nothing, the registry walks the registrant's
//! [`TypeResolver`] supertype chain with a visited-set cycle guard — a
//! derived contract type is served by the nearest registered ancestor.

use crate::spi::{ChannelProcessor, HandlerProcessor, MarkerProcessor, TypeResolver};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Central lookup for channel, handler, and marker processors.
///
/// Immutable after construction; shared across runs behind an `Arc`.
#[derive(Default)]
pub struct ProcessorRegistry {
    channels: HashMap<String, Arc<dyn ChannelProcessor>>,
    handlers: HashMap<String, Arc<dyn HandlerProcessor>>,
    markers: HashMap<String, Arc<dyn MarkerProcessor>>,
    type_resolver: Option<Box<dyn TypeResolver>>,
}

impl ProcessorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a channel processor under each of its type names.
    ///
    /// # Panics
    ///
    /// Panics if the processor declares no type names.
    pub fn register_channel(&mut self, processor: Arc<dyn ChannelProcessor>) {
        let names = processor.type_names();
        assert!(!names.is_empty(), "processors must declare a type name");
        for name in names {
            self.channels.insert((*name).to_string(), Arc::clone(&processor));
        }
    }

    /// Registers a handler processor under each of its type names.
    ///
    /// # Panics
    ///
    /// Panics if the processor declares no type names.
    pub fn register_handler(&mut self, processor: Arc<dyn HandlerProcessor>) {
        let names = processor.type_names();
        assert!(!names.is_empty(), "processors must declare a type name");
        for name in names {
            self.handlers.insert((*name).to_string(), Arc::clone(&processor));
        }
    }

    /// Registers a marker processor under each of its type names.
    ///
    /// # Panics
    ///
    /// Panics if the processor declares no type names.
    pub fn register_marker(&mut self, processor: Arc<dyn MarkerProcessor>) {
        let names = processor.type_names();
        assert!(!names.is_empty(), "processors must declare a type name");
        for name in names {
            self.markers.insert((*name).to_string(), Arc::clone(&processor));
        }
    }

    /// Installs the supertype resolver consulted on lookup misses.
    pub fn set_type_resolver(&mut self, resolver: Box<dyn TypeResolver>) {
        self.type_resolver = Some(resolver);
    }

    /// Direct channel lookup (no chain walk).
    #[must_use]
    pub fn channel(&self, type_name: &str) -> Option<&Arc<dyn ChannelProcessor>> {
        self.channels.get(type_name)
    }

    /// Direct handler lookup (no chain walk).
    #[must_use]
    pub fn handler(&self, type_name: &str) -> Option<&Arc<dyn HandlerProcessor>> {
        self.handlers.get(type_name)
    }

    /// Direct marker lookup (no chain walk).
    #[must_use]
    pub fn marker(&self, type_name: &str) -> Option<&Arc<dyn MarkerProcessor>> {
        self.markers.get(type_name)
    }

    /// Channel lookup walking the supertype chain.
    #[must_use]
    pub fn resolve_channel(&self, type_name: &str) -> Option<&Arc<dyn ChannelProcessor>> {
        self.resolve(type_name, |name| self.channels.get(name))
    }

    /// Handler lookup walking the supertype chain.
    #[must_use]
    pub fn resolve_handler(&self, type_name: &str) -> Option<&Arc<dyn HandlerProcessor>> {
        self.resolve(type_name, |name| self.handlers.get(name))
    }

    /// Marker lookup walking the supertype chain.
    #[must_use]
    pub fn resolve_marker(&self, type_name: &str) -> Option<&Arc<dyn MarkerProcessor>> {
        self.resolve(type_name, |name| self.markers.get(name))
    }

    fn resolve<'a, T: ?Sized>(
        &self,
        type_name: &str,
        lookup: impl Fn(&str) -> Option<&'a Arc<T>>,
    ) -> Option<&'a Arc<T>> {
        if let Some(found) = lookup(type_name) {
            return Some(found);
        }
        let resolver = self.type_resolver.as_deref()?;
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(type_name.to_string());
        let mut current = resolver.super_type(type_name)?;
        loop {
            if let Some(found) = lookup(&current) {
                return Some(found);
            }
            if !visited.insert(current.clone()) {
                // supertype cycle; nothing more to find
                return None;
            }
            current = resolver.super_type(&current)?;
        }
    }
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorRegistry")
            .field("channels", &self.channels.keys().collect::<Vec<_>>())
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .field("markers", &self.markers.keys().collect::<Vec<_>>())
            .field("has_type_resolver", &self.type_resolver.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ContractError, ProcessorError};
    use crate::spi::{ChannelContext, ChannelMatch};
    use serde_json::Value;

    struct StubChannel(&'static [&'static str]);

    impl ChannelProcessor for StubChannel {
        fn type_names(&self) -> &[&'static str] {
            self.0
        }
        fn validate(&self, _key: &str, _contract: &Value) -> Result<(), ContractError> {
            Ok(())
        }
        fn evaluate(
            &self,
            _contract: &Value,
            _ctx: &ChannelContext<'_>,
        ) -> Result<ChannelMatch, ProcessorError> {
            Ok(ChannelMatch::no_match())
        }
    }

    struct ChainResolver;

    impl TypeResolver for ChainResolver {
        fn super_type(&self, type_name: &str) -> Option<String> {
            match type_name {
                "Derived Channel" => Some("Base Channel".to_string()),
                "Looping A" => Some("Looping B".to_string()),
                "Looping B" => Some("Looping A".to_string()),
                _ => None,
            }
        }
    }

    #[test]
    fn direct_lookup() {
        let mut registry = ProcessorRegistry::new();
        registry.register_channel(Arc::new(StubChannel(&["Base Channel"])));
        assert!(registry.channel("Base Channel").is_some());
        assert!(registry.channel("Other").is_none());
    }

    #[test]
    fn supertype_chain_resolution() {
        let mut registry = ProcessorRegistry::new();
        registry.register_channel(Arc::new(StubChannel(&["Base Channel"])));
        registry.set_type_resolver(Box::new(ChainResolver));
        assert!(registry.resolve_channel("Derived Channel").is_some());
        assert!(registry.channel("Derived Channel").is_none());
    }

    #[test]
    fn supertype_cycle_is_guarded() {
        let mut registry = ProcessorRegistry::new();
        registry.set_type_resolver(Box::new(ChainResolver));
        assert!(registry.resolve_channel("Looping A").is_none());
    }

    #[test]
    fn no_resolver_means_direct_only() {
        let registry = ProcessorRegistry::new();
        assert!(registry.resolve_channel("Derived Channel").is_none());
    }
}

//! Run-scoped identifier registry.
//!
//! Maps each original identifier to exactly one replacement. Populated during
//! the collection pass, frozen before the rewrite pass, dropped at run end.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use super::naming::NameGenerator;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default)]
pub struct Registry {
    generator: NameGenerator,
    forward: BTreeMap<String, String>,
    assigned: HashSet<String>,
    reserved: BTreeSet<String>,
    frozen: bool,
}

impl Registry {
    pub fn new(generator: NameGenerator) -> Self {
        Self {
            generator,
            ..Self::default()
        }
    }

    /// Replacement for `identifier`, generating one on first sight.
    ///
    /// Idempotent per identifier. Once frozen, only already-known identifiers
    /// resolve; anything else means the two passes disagreed.
    pub fn resolve(&mut self, identifier: &str) -> Result<String> {
        if let Some(existing) = self.forward.get(identifier) {
            return Ok(existing.clone());
        }

        if self.frozen {
            return Err(Error::registry_unknown_identifier(identifier));
        }

        let replacement = self.generator.generate(identifier, |candidate| {
            self.assigned.contains(candidate) || self.reserved.contains(candidate)
        });

        self.assigned.insert(replacement.clone());
        self.forward
            .insert(identifier.to_string(), replacement.clone());
        Ok(replacement)
    }

    /// Strict read used by the rewrite pass for declaration sites.
    pub fn get(&self, identifier: &str) -> Result<&str> {
        self.forward
            .get(identifier)
            .map(String::as_str)
            .ok_or_else(|| Error::registry_unknown_identifier(identifier))
    }

    /// Lenient read used for reference sites, which never introduce names.
    pub fn lookup(&self, identifier: &str) -> Option<&str> {
        self.forward.get(identifier).map(String::as_str)
    }

    pub fn is_known(&self, identifier: &str) -> bool {
        self.forward.contains_key(identifier)
    }

    /// Record a token that stays in the output verbatim in a class/id
    /// position, so no generated name can shadow it.
    pub fn reserve(&mut self, token: &str) -> Result<()> {
        if self.frozen {
            return Err(Error::registry_frozen(token));
        }

        if self.assigned.contains(token) {
            let owner = self
                .forward
                .iter()
                .find(|(_, v)| v.as_str() == token)
                .map(|(k, _)| k.clone())
                .unwrap_or_default();
            return Err(Error::registry_collision(owner, token));
        }

        self.reserved.insert(token.to_string());
        Ok(())
    }

    pub fn is_reserved(&self, token: &str) -> bool {
        self.reserved.contains(token)
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// `(original, replacement)` pairs ordered by original.
    pub fn mappings(&self) -> impl Iterator<Item = (&str, &str)> {
        self.forward.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn reserved(&self) -> impl Iterator<Item = &str> {
        self.reserved.iter().map(String::as_str)
    }

    pub fn generator(&self) -> &NameGenerator {
        &self.generator
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_is_idempotent() {
        let mut registry = Registry::default();
        let first = registry.resolve("label-inactive").unwrap();
        let second = registry.resolve("label-inactive").unwrap();
        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn resolve_is_injective_across_many_identifiers() {
        let mut registry = Registry::new(NameGenerator::new("v-", 4).unwrap());
        let mut seen = HashSet::new();
        for i in 0..5000 {
            let replacement = registry.resolve(&format!("id-{}", i)).unwrap();
            assert!(seen.insert(replacement), "duplicate replacement at id-{}", i);
        }
        assert_eq!(registry.len(), 5000);
    }

    #[test]
    fn frozen_registry_rejects_unknown_identifiers() {
        let mut registry = Registry::default();
        registry.resolve("known").unwrap();
        registry.freeze();

        assert!(registry.resolve("known").is_ok());
        let err = registry.resolve("late-arrival").unwrap_err();
        assert_eq!(err.code.as_str(), "registry.unknown_identifier");
        assert!(registry.get("late-arrival").is_err());
        assert_eq!(registry.lookup("late-arrival"), None);
    }

    #[test]
    fn reserved_tokens_are_never_generated() {
        let generator = NameGenerator::default();
        let natural = generator.generate("abc", |_| false);

        let mut registry = Registry::new(generator);
        registry.reserve(&natural).unwrap();
        let replacement = registry.resolve("abc").unwrap();

        assert_ne!(replacement, natural);
        assert!(replacement.starts_with(&natural));
    }

    #[test]
    fn reserve_after_assignment_is_a_collision() {
        let mut registry = Registry::default();
        let replacement = registry.resolve("abc").unwrap();
        let err = registry.reserve(&replacement).unwrap_err();
        assert_eq!(err.code.as_str(), "registry.collision");
        assert_eq!(err.details["identifier"], "abc");
    }

    #[test]
    fn reserve_after_freeze_is_rejected() {
        let mut registry = Registry::default();
        registry.freeze();
        assert_eq!(
            registry.reserve("hidden").unwrap_err().code.as_str(),
            "registry.frozen"
        );
    }

    #[test]
    fn mappings_are_sorted_by_original() {
        let mut registry = Registry::default();
        registry.resolve("zeta").unwrap();
        registry.resolve("alpha").unwrap();
        let originals: Vec<&str> = registry.mappings().map(|(k, _)| k).collect();
        assert_eq!(originals, vec!["alpha", "zeta"]);
    }
}

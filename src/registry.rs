use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use parking_lot::RwLock;

use crate::{command::HandlerDescriptor, schema::StructuredSchema};

/// The live command tables shared by the dispatcher and the loader.
///
/// Keys are lower-case. A key maps to at most one descriptor; installing a
/// descriptor under an occupied key replaces the previous occupant.
#[derive(Default)]
pub struct Registry {
    state: RwLock<RegistryState>,
}

#[derive(Default)]
pub(crate) struct RegistryState {
    by_name: HashMap<String, Arc<HandlerDescriptor>>,
    by_structured_name: HashMap<String, Arc<HandlerDescriptor>>,
    /// Loaded units and the descriptors each one contributed
    units: BTreeMap<String, Vec<Arc<HandlerDescriptor>>>,
}

impl Registry {
    pub fn lookup(&self, key: &str) -> Option<Arc<HandlerDescriptor>> {
        self.state.read().by_name.get(key).cloned()
    }

    pub fn lookup_structured(&self, name: &str) -> Option<Arc<HandlerDescriptor>> {
        self.state.read().by_structured_name.get(name).cloned()
    }

    pub fn is_loaded(&self, unit: &str) -> bool {
        self.state.read().units.contains_key(unit)
    }

    pub fn loaded_units(&self) -> Vec<String> {
        self.state.read().units.keys().cloned().collect()
    }

    /// Every command currently reachable by at least one key, sorted by name.
    pub fn commands(&self) -> Vec<Arc<HandlerDescriptor>> {
        let state = self.state.read();
        let mut commands: Vec<_> = state
            .units
            .values()
            .flatten()
            .filter(|d| state.is_reachable(d))
            .cloned()
            .collect();
        commands.sort_by(|a, b| a.name.cmp(&b.name));
        commands
    }

    /// The schemas to register with the platform.
    pub fn structured_schemas(&self) -> Vec<StructuredSchema> {
        let state = self.state.read();
        let mut schemas: Vec<_> = state
            .by_structured_name
            .values()
            .filter_map(|d| d.kind.structured())
            .map(|s| s.schema.clone())
            .collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Installs a unit's descriptors, replacing whatever the unit held before.
    /// Returns the primary names installed.
    pub(crate) fn install_unit(&self, unit: &str, descriptors: Vec<HandlerDescriptor>) -> Vec<String> {
        self.state.write().install_unit(unit, descriptors)
    }

    /// Removes a unit and every key that still points at one of its descriptors.
    /// Returns `None` if the unit was not loaded.
    pub(crate) fn remove_unit(&self, unit: &str) -> Option<Vec<String>> {
        self.state.write().remove_unit(unit)
    }

    /// Swaps in a fully built state in one step.
    pub(crate) fn replace(&self, state: RegistryState) {
        *self.state.write() = state;
    }
}

impl RegistryState {
    pub(crate) fn install_unit(
        &mut self,
        unit: &str,
        descriptors: Vec<HandlerDescriptor>,
    ) -> Vec<String> {
        self.remove_unit(unit);

        let mut members = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            let descriptor = Arc::new(descriptor);
            if descriptor.kind.text().is_some() {
                for key in descriptor.keys() {
                    self.by_name.insert(key.to_string(), descriptor.clone());
                }
            }
            if let Some(name) = descriptor.structured_name() {
                self.by_structured_name
                    .insert(name.to_string(), descriptor.clone());
            }
            members.push(descriptor);
        }

        let names = members.iter().map(|d| d.name.clone()).collect();
        self.units.insert(unit.to_string(), members);
        names
    }

    fn remove_unit(&mut self, unit: &str) -> Option<Vec<String>> {
        let members = self.units.remove(unit)?;
        for member in &members {
            for key in member.keys() {
                remove_if_owned(&mut self.by_name, key, member);
            }
            if let Some(name) = member.structured_name() {
                remove_if_owned(&mut self.by_structured_name, name, member);
            }
        }
        Some(members.iter().map(|d| d.name.clone()).collect())
    }

    fn is_reachable(&self, descriptor: &Arc<HandlerDescriptor>) -> bool {
        let owns = |map: &HashMap<String, Arc<HandlerDescriptor>>, key: &str| {
            map.get(key).is_some_and(|d| Arc::ptr_eq(d, descriptor))
        };
        descriptor.keys().any(|k| owns(&self.by_name, k))
            || descriptor
                .structured_name()
                .is_some_and(|n| owns(&self.by_structured_name, n))
    }
}

fn remove_if_owned(
    map: &mut HashMap<String, Arc<HandlerDescriptor>>,
    key: &str,
    owner: &Arc<HandlerDescriptor>,
) {
    if map.get(key).is_some_and(|d| Arc::ptr_eq(d, owner)) {
        map.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::testing::{Canned, text_descriptor};

    fn keys(registry: &Registry) -> Vec<String> {
        let mut keys: Vec<_> = registry.state.read().by_name.keys().cloned().collect();
        keys.sort();
        keys
    }

    #[test]
    fn last_registration_wins() {
        let registry = Registry::default();
        registry.install_unit(
            "a",
            vec![text_descriptor("a", "quote", &["q"], Canned::replying("a"))],
        );
        registry.install_unit(
            "b",
            vec![text_descriptor("b", "query", &["q"], Canned::replying("b"))],
        );

        assert_eq!(registry.lookup("q").unwrap().name, "query");
        assert_eq!(registry.lookup("quote").unwrap().name, "quote");
    }

    #[test]
    fn removing_a_unit_keeps_keys_taken_over_by_others() {
        let registry = Registry::default();
        registry.install_unit(
            "a",
            vec![text_descriptor("a", "quote", &["q"], Canned::replying("a"))],
        );
        registry.install_unit(
            "b",
            vec![text_descriptor("b", "query", &["q"], Canned::replying("b"))],
        );

        assert_eq!(registry.remove_unit("a"), Some(vec!["quote".to_string()]));
        assert_eq!(keys(&registry), ["q", "query"]);
        assert_eq!(registry.lookup("q").unwrap().unit, "b");
        assert!(!registry.is_loaded("a"));
        assert!(registry.remove_unit("a").is_none());
    }

    #[test]
    fn reinstalling_a_unit_drops_its_old_members() {
        let registry = Registry::default();
        registry.install_unit(
            "misc",
            vec![
                text_descriptor("misc", "one", &[], Canned::replying("1")),
                text_descriptor("misc", "two", &["2"], Canned::replying("2")),
            ],
        );
        registry.install_unit(
            "misc",
            vec![text_descriptor("misc", "one", &[], Canned::replying("1"))],
        );

        assert_eq!(keys(&registry), ["one"]);
    }

    #[test]
    fn overwritten_commands_are_not_listed() {
        let registry = Registry::default();
        registry.install_unit(
            "a",
            vec![text_descriptor("a", "ping", &[], Canned::replying("a"))],
        );
        registry.install_unit(
            "b",
            vec![text_descriptor("b", "ping", &[], Canned::replying("b"))],
        );

        let commands = registry.commands();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].unit, "b");
        assert_eq!(registry.loaded_units(), ["a", "b"]);
    }

    #[test]
    fn empty_units_still_count_as_loaded() {
        let registry = Registry::default();
        assert!(registry.install_unit("empty", vec![]).is_empty());
        assert!(registry.is_loaded("empty"));
    }
}

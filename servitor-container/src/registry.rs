//! Service registry: definitions, aliases, the instance cache and
//! provider bookkeeping.
//!
//! The registry itself is a plain data structure; the container guards it
//! with a single lock and never calls user code while holding it.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::definition::Definition;
use crate::inject::Instance;
use crate::key::ServiceId;
use crate::provider::DeferredProvider;

/// What the container remembers about a registered provider.
#[derive(Debug, Clone)]
pub struct ProviderRecord {
    pub name: String,
    pub provides: Vec<ServiceId>,
    pub deferred: bool,
}

/// Stores all service registrations and resolved shared instances.
#[derive(Default)]
pub(crate) struct Registry {
    definitions: HashMap<ServiceId, Definition>,
    aliases: HashMap<ServiceId, ServiceId>,
    instances: HashMap<ServiceId, Instance>,
    /// Bumped on every (re)definition; a resolution only caches what it
    /// built if the revision it started from is still current.
    revisions: HashMap<ServiceId, u64>,
    next_revision: u64,
    deferred: HashMap<ServiceId, Arc<DeferredProvider>>,
    providers: Vec<ProviderRecord>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a definition, replacing any previous one (last write wins).
    ///
    /// A cached instance for the id is dropped so the new definition
    /// takes effect on the next resolve. A deferred provider still pending
    /// for the id no longer gets to register it.
    pub fn define(&mut self, id: ServiceId, definition: Definition) {
        self.shadow_deferred(&id);
        self.insert_definition(id, definition);
    }

    /// Stores a definition made by a provider while it is being loaded.
    pub fn provide(&mut self, id: ServiceId, definition: Definition) {
        self.insert_definition(id, definition);
    }

    fn insert_definition(&mut self, id: ServiceId, definition: Definition) {
        debug!(
            id = %id,
            kind = definition.concrete.kind(),
            lifecycle = %definition.lifecycle,
            "Registered service"
        );
        self.next_revision += 1;
        self.revisions.insert(id.clone(), self.next_revision);
        self.instances.remove(&id);
        self.definitions.insert(id, definition);
    }

    /// Registers an alias: looking up `from` looks up `to` instead.
    ///
    /// The target does not need to exist yet.
    pub fn alias(&mut self, from: ServiceId, to: ServiceId) {
        self.shadow_deferred(&from);
        self.provide_alias(from, to);
    }

    /// Registers an alias made by a provider while it is being loaded.
    pub fn provide_alias(&mut self, from: ServiceId, to: ServiceId) {
        debug!(from = %from, to = %to, "Registered alias");
        self.aliases.insert(from, to);
    }

    fn shadow_deferred(&mut self, id: &ServiceId) {
        if let Some(pending) = self.deferred.remove(id) {
            debug!(id = %id, provider = pending.name(), "Explicit registration shadows deferred provider");
            pending.shadow(id.clone());
        }
    }

    /// Follows at most one alias hop.
    pub fn canonical(&self, id: &ServiceId) -> ServiceId {
        match self.aliases.get(id) {
            Some(target) => {
                trace!(from = %id, to = %target, "Following alias");
                target.clone()
            }
            None => id.clone(),
        }
    }

    pub fn alias_target(&self, id: &ServiceId) -> Option<&ServiceId> {
        self.aliases.get(id)
    }

    pub fn definition(&self, canonical: &ServiceId) -> Option<&Definition> {
        self.definitions.get(canonical)
    }

    pub fn instance(&self, canonical: &ServiceId) -> Option<&Instance> {
        self.instances.get(canonical)
    }

    /// Current revision of the definition under `canonical`.
    pub fn revision(&self, canonical: &ServiceId) -> Option<u64> {
        self.revisions.get(canonical).copied()
    }

    /// Caches a shared instance built from `revision` of its definition.
    ///
    /// If the definition was replaced or removed while the instance was
    /// being built, the instance is handed back uncached. If another
    /// resolution cached one first, that one wins and is returned, so every
    /// caller sees the same object.
    pub fn store_instance(&mut self, canonical: ServiceId, instance: Instance, revision: u64) -> Instance {
        if self.revision(&canonical) != Some(revision) {
            debug!(id = %canonical, "Definition changed during resolution, not caching");
            return instance;
        }
        trace!(id = %canonical, "Caching shared instance");
        self.instances.entry(canonical).or_insert(instance).clone()
    }

    pub fn forget_instance(&mut self, canonical: &ServiceId) -> bool {
        self.instances.remove(canonical).is_some()
    }

    pub fn forget_instances(&mut self) {
        self.instances.clear();
    }

    /// Definition, cached instance, or a deferred provider promising it.
    pub fn contains(&self, canonical: &ServiceId) -> bool {
        self.definitions.contains_key(canonical)
            || self.instances.contains_key(canonical)
            || self.deferred.contains_key(canonical)
    }

    pub fn defer(&mut self, provider: Arc<DeferredProvider>) {
        for id in provider.provides() {
            debug!(id = %id, provider = provider.name(), "Deferred service");
            self.deferred.insert(id.clone(), provider.clone());
        }
    }

    pub fn deferred(&self, canonical: &ServiceId) -> Option<&Arc<DeferredProvider>> {
        self.deferred.get(canonical)
    }

    /// Drops every id that `provider` was deferred under. Returns whether
    /// any was still pending.
    pub fn settle(&mut self, provider: &Arc<DeferredProvider>) -> bool {
        let before = self.deferred.len();
        self.deferred.retain(|_, pending| !Arc::ptr_eq(pending, provider));
        self.deferred.len() != before
    }

    pub fn record_provider(&mut self, record: ProviderRecord) {
        self.providers.push(record);
    }

    pub fn providers(&self) -> &[ProviderRecord] {
        &self.providers
    }

    pub fn definitions(&self) -> impl Iterator<Item = (&ServiceId, &Definition)> {
        self.definitions.iter()
    }

    /// Sorted, de-duplicated union of definition ids, cached ids and
    /// alias ids. Ids only promised by a pending deferred provider are not
    /// included.
    pub fn service_ids(&self) -> Vec<ServiceId> {
        self.definitions
            .keys()
            .chain(self.instances.keys())
            .chain(self.aliases.keys())
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Returns the registry to its initial empty state.
    pub fn clear(&mut self) {
        self.definitions.clear();
        self.aliases.clear();
        self.instances.clear();
        self.revisions.clear();
        self.deferred.clear();
        self.providers.clear();
    }
}

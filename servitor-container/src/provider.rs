//! Provider trait: a module of related service registrations.
//!
//! Providers group related services together, like Laravel's
//! ServiceProvider.
//!
//! # Examples
//! ```rust
//! use servitor_container::prelude::*;
//!
//! struct Db;
//! struct DatabaseProvider;
//!
//! impl Provider for DatabaseProvider {
//!     fn register(&self, registrar: &dyn Registrar) -> Result<()> {
//!         registrar.singleton("db", Concrete::factory(|_| Ok(Db)));
//!         registrar.alias("database".into(), "db".into());
//!         Ok(())
//!     }
//!
//!     fn provides(&self) -> Vec<ServiceId> {
//!         vec!["db".into(), "database".into()]
//!     }
//!
//!     fn is_deferred(&self) -> bool {
//!         true
//!     }
//! }
//!
//! let container = Container::new();
//! container.register(DatabaseProvider).unwrap();
//! assert!(container.has("database"));
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::debug;

use crate::definition::{Concrete, ExtenderFn};
use crate::error::Result;
use crate::key::ServiceId;

/// A bundle of related registrations applied to a container as a unit.
pub trait Provider: Send + Sync {
    /// Registers services into the container.
    ///
    /// Called once: on `Container::register` for eager providers, or on
    /// first access to one of [`provides`](Provider::provides) for
    /// deferred ones. Must not resolve its own services.
    fn register(&self, registrar: &dyn Registrar) -> Result<()>;

    /// Ids this provider registers. Deferred loading keys off this list.
    fn provides(&self) -> Vec<ServiceId> {
        Vec::new()
    }

    /// Whether registration may wait until one of the provided ids is
    /// first requested.
    fn is_deferred(&self) -> bool {
        false
    }

    /// Human-readable name for logs and introspection.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// The registration surface providers see.
///
/// A subset of the container's API, so providers can be tested against
/// a mock.
pub trait Registrar {
    /// Stores a definition under `id`, overwriting any previous one.
    fn set(&self, id: ServiceId, concrete: Concrete, shared: bool);

    /// Records `alias` as another name for `target`.
    fn alias(&self, alias: ServiceId, target: ServiceId);

    /// Decorates the existing definition for `id`.
    fn extend_instance(&self, id: ServiceId, extender: ExtenderFn) -> Result<()>;
}

/// Shorthands over any [`Registrar`].
pub trait RegistrarExt: Registrar {
    fn singleton(&self, id: impl Into<ServiceId>, concrete: impl Into<Concrete>) {
        self.set(id.into(), concrete.into(), true);
    }

    fn factory(&self, id: impl Into<ServiceId>, concrete: impl Into<Concrete>) {
        self.set(id.into(), concrete.into(), false);
    }

    fn instance<T: Send + Sync + 'static>(&self, id: impl Into<ServiceId>, value: T) {
        self.set(id.into(), Concrete::instance(value), true);
    }
}

impl<R: Registrar + ?Sized> RegistrarExt for R {}

/// A deferred provider waiting for first use of one of its ids.
pub(crate) struct DeferredProvider {
    provider: Arc<dyn Provider>,
    provides: Vec<ServiceId>,
    /// Ids registered explicitly after this provider was deferred.
    shadowed: Mutex<HashSet<ServiceId>>,
    loaded: OnceCell<()>,
}

impl DeferredProvider {
    pub fn new(provider: Arc<dyn Provider>, provides: Vec<ServiceId>) -> Self {
        Self {
            provider,
            provides,
            shadowed: Mutex::new(HashSet::new()),
            loaded: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.provider.name()
    }

    pub fn provides(&self) -> &[ServiceId] {
        &self.provides
    }

    /// Keeps the provider from registering `id` when it loads.
    pub fn shadow(&self, id: ServiceId) {
        self.shadowed.lock().insert(id);
    }

    /// Runs the provider's registration exactly once, even when several
    /// threads ask at the same time. A failed attempt may be retried.
    ///
    /// Registrations for shadowed ids are dropped.
    pub fn load(&self, registrar: &dyn Registrar) -> Result<()> {
        self.loaded
            .get_or_try_init(|| {
                let shadowed = self.shadowed.lock().clone();
                debug!(provider = self.name(), shadowed = shadowed.len(), "Loading deferred provider");
                self.provider.register(&Shadowing {
                    inner: registrar,
                    shadowed,
                    provider: self.name(),
                })
            })
            .map(|_| ())
    }
}

/// Forwards a provider's registrations, skipping shadowed ids.
struct Shadowing<'r> {
    inner: &'r dyn Registrar,
    shadowed: HashSet<ServiceId>,
    provider: &'r str,
}

impl Shadowing<'_> {
    fn allows(&self, id: &ServiceId) -> bool {
        if self.shadowed.contains(id) {
            debug!(id = %id, provider = self.provider, "Skipping shadowed registration");
            return false;
        }
        true
    }
}

impl Registrar for Shadowing<'_> {
    fn set(&self, id: ServiceId, concrete: Concrete, shared: bool) {
        if self.allows(&id) {
            self.inner.set(id, concrete, shared);
        }
    }

    fn alias(&self, alias: ServiceId, target: ServiceId) {
        if self.allows(&alias) {
            self.inner.alias(alias, target);
        }
    }

    fn extend_instance(&self, id: ServiceId, extender: ExtenderFn) -> Result<()> {
        if self.allows(&id) {
            return self.inner.extend_instance(id, extender);
        }
        Ok(())
    }
}

impl fmt::Debug for DeferredProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredProvider")
            .field("name", &self.name())
            .field("provides", &self.provides)
            .field("loaded", &self.loaded.get().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    // Mock registrar for testing providers
    #[derive(Default)]
    struct MockRegistrar {
        definitions: Mutex<Vec<(ServiceId, bool)>>,
        aliases: Mutex<Vec<(ServiceId, ServiceId)>>,
    }

    impl Registrar for MockRegistrar {
        fn set(&self, id: ServiceId, _concrete: Concrete, shared: bool) {
            self.definitions.lock().push((id, shared));
        }

        fn alias(&self, alias: ServiceId, target: ServiceId) {
            self.aliases.lock().push((alias, target));
        }

        fn extend_instance(&self, _id: ServiceId, _extender: ExtenderFn) -> Result<()> {
            Ok(())
        }
    }

    struct MailProvider {
        calls: AtomicU32,
    }

    impl Provider for MailProvider {
        fn register(&self, registrar: &dyn Registrar) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            registrar.singleton("mailer", Concrete::factory(|_| Ok(String::from("smtp"))));
            registrar.factory("message", Concrete::factory(|_| Ok(Vec::<u8>::new())));
            registrar.alias("mail".into(), "mailer".into());
            Ok(())
        }

        fn provides(&self) -> Vec<ServiceId> {
            vec!["mailer".into(), "message".into(), "mail".into()]
        }
    }

    #[test]
    fn provider_registers_into_mock() {
        let registrar = MockRegistrar::default();
        let provider = MailProvider { calls: AtomicU32::new(0) };

        provider.register(&registrar).unwrap();

        let definitions = registrar.definitions.lock();
        assert_eq!(definitions.len(), 2);
        assert_eq!(definitions[0], (ServiceId::from("mailer"), true));
        assert_eq!(definitions[1], (ServiceId::from("message"), false));
        assert_eq!(registrar.aliases.lock().len(), 1);
    }

    #[test]
    fn provider_defaults() {
        struct Bare;
        impl Provider for Bare {
            fn register(&self, _: &dyn Registrar) -> Result<()> {
                Ok(())
            }
        }

        assert!(!Bare.is_deferred());
        assert!(Bare.provides().is_empty());
        assert!(Bare.name().contains("Bare"));
    }

    #[test]
    fn deferred_provider_loads_once() {
        let provider = Arc::new(MailProvider { calls: AtomicU32::new(0) });
        let deferred = DeferredProvider::new(provider.clone(), provider.provides());
        let registrar = MockRegistrar::default();

        deferred.load(&registrar).unwrap();
        deferred.load(&registrar).unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(deferred.provides().len(), 3);
    }

    #[test]
    fn shadowed_ids_are_skipped_on_load() {
        let provider = Arc::new(MailProvider { calls: AtomicU32::new(0) });
        let deferred = DeferredProvider::new(provider.clone(), provider.provides());
        deferred.shadow("mailer".into());
        deferred.shadow("mail".into());
        let registrar = MockRegistrar::default();

        deferred.load(&registrar).unwrap();

        let definitions = registrar.definitions.lock();
        assert_eq!(*definitions, vec![(ServiceId::from("message"), false)]);
        assert!(registrar.aliases.lock().is_empty());
    }
}

//! # The Container: heart of Servitor
//!
//! Registers, resolves and manages the lifecycle of application services.
//!
//! # Architecture
//! ```text
//! get(id) ──> alias (one hop) ──> deferred provider? ──> instance cache
//!                                                            │ miss
//!                                                            ▼
//!                                                        Definition
//!                                       ┌────────────────────┼─────────────────┐
//!                                    Factory               Type            Instance
//!                                       │                    │
//!                                  f(resolver)     introspect parameters,
//!                                                  resolve each in order
//!                                                  (override → registry →
//!                                                   direct construction →
//!                                                   default → optional)
//! ```
//!
//! # Examples
//! ```rust
//! use servitor_container::prelude::*;
//! use std::sync::Arc;
//!
//! trait Logger: Send + Sync {
//!     fn log(&self, msg: &str);
//! }
//!
//! struct ConsoleLogger;
//! impl Logger for ConsoleLogger {
//!     fn log(&self, msg: &str) { println!("{msg}"); }
//! }
//!
//! struct UserService {
//!     logger: Arc<dyn Logger>,
//! }
//!
//! let container = Container::new();
//! container.singleton(
//!     ServiceId::of::<dyn Logger>(),
//!     Concrete::factory(|_| Ok(Arc::new(ConsoleLogger) as Arc<dyn Logger>)),
//! );
//! container.factory(
//!     "users",
//!     Concrete::factory(|r| {
//!         let logger: Arc<dyn Logger> = r.get_cloned(ServiceId::of::<dyn Logger>())?;
//!         Ok(UserService { logger })
//!     }),
//! );
//!
//! let service: Arc<UserService> = container.get("users").expect("Failed to resolve");
//! service.logger.log("ready");
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use servitor_support::rendering::suggest_similar;
use tracing::{debug, info, instrument, trace, warn};

use crate::definition::{Concrete, Definition, ExtenderFn, FactoryFn};
use crate::error::{ContainerError, Result, ServiceNotFoundError};
use crate::inject::{Arguments, Injectable, Instance, Overrides, Parameter, ParameterKind, TypeRef};
use crate::key::ServiceId;
use crate::lifecycle::Lifecycle;
use crate::provider::{DeferredProvider, Provider, Registrar};
use crate::registry::{ProviderRecord, Registry};
use crate::resolver::{Resolution, Resolver, ResolverExt};
use crate::settings::Settings;
use crate::validate::GraphValidator;

// ═══════════════════════════════════════════
// Container
// ═══════════════════════════════════════════

/// Thread-safe service container.
///
/// Registration and resolution both take `&self`. All state sits behind a
/// single lock that is released before any factory, constructor, extender
/// or provider runs, so those may call back into the container.
///
/// Create one at process start and pass it (or an `Arc` of it) to whoever
/// needs it; there is no global instance.
pub struct Container {
    registry: RwLock<Registry>,
    settings: Settings,
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    /// Creates an empty container with default settings.
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    pub fn with_settings(settings: Settings) -> Self {
        Self {
            registry: RwLock::new(Registry::new()),
            settings,
        }
    }

    /// Create a new builder.
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // ── Registration ──

    /// Stores `concrete` under `id`, overwriting any previous definition.
    ///
    /// Ids are not validated: empty and duplicate ids are accepted and the
    /// last write wins.
    pub fn set(&self, id: impl Into<ServiceId>, concrete: impl Into<Concrete>, shared: bool) {
        self.registry
            .write()
            .define(id.into(), Definition::new(concrete, shared));
    }

    /// Registers a shared service: one instance per container.
    pub fn singleton(&self, id: impl Into<ServiceId>, concrete: impl Into<Concrete>) {
        self.set(id, concrete, true);
    }

    /// Registers a transient service: a new instance per resolve.
    pub fn factory(&self, id: impl Into<ServiceId>, concrete: impl Into<Concrete>) {
        self.set(id, concrete, false);
    }

    /// Registers a pre-built value as a shared service.
    pub fn instance<T: Send + Sync + 'static>(&self, id: impl Into<ServiceId>, value: T) {
        self.set(id, Concrete::instance(value), true);
    }

    /// Registers an existing `Arc` as a shared service; `get` returns that
    /// same `Arc`.
    pub fn shared_instance<T: Send + Sync + 'static>(&self, id: impl Into<ServiceId>, value: Arc<T>) {
        self.set(id, Concrete::shared_instance(value), true);
    }

    /// Registers `T` under its own type name, built by introspection, shared.
    pub fn singleton_type<T: Injectable>(&self) {
        self.set(ServiceId::of::<T>(), TypeRef::of::<T>(), true);
    }

    /// Registers `T` under its own type name, built by introspection, transient.
    pub fn factory_type<T: Injectable>(&self) {
        self.set(ServiceId::of::<T>(), TypeRef::of::<T>(), false);
    }

    /// Binds interface `I` to implementation `C`.
    ///
    /// Resolving `ServiceId::of::<I>()` builds `C` by introspection and
    /// upcasts it with `cast`:
    ///
    /// ```rust,ignore
    /// container.bind::<dyn Logger, ConsoleLogger>(true, |c| c as Arc<dyn Logger>);
    /// ```
    pub fn bind<I, C>(&self, shared: bool, cast: fn(Arc<C>) -> Arc<I>)
    where
        I: ?Sized + Send + Sync + 'static,
        C: Injectable,
    {
        let factory = Concrete::factory(move |resolver: &dyn Resolver| {
            let concrete: Arc<C> = resolver.make(Overrides::new())?;
            Ok(cast(concrete))
        });
        self.set(ServiceId::of::<I>(), factory, shared);
    }

    /// Registers a shared service unless `id` is already bound.
    /// Returns whether it registered.
    pub fn singleton_if(&self, id: impl Into<ServiceId>, concrete: impl Into<Concrete>) -> bool {
        self.set_if(id.into(), concrete.into(), true)
    }

    /// Registers a transient service unless `id` is already bound.
    /// Returns whether it registered.
    pub fn factory_if(&self, id: impl Into<ServiceId>, concrete: impl Into<Concrete>) -> bool {
        self.set_if(id.into(), concrete.into(), false)
    }

    fn set_if(&self, id: ServiceId, concrete: Concrete, shared: bool) -> bool {
        let mut registry = self.registry.write();
        let canonical = registry.canonical(&id);
        if registry.contains(&canonical) {
            trace!(id = %id, "Already bound, skipping");
            return false;
        }
        registry.define(canonical, Definition::new(concrete, shared));
        true
    }

    /// Records `alias` as another name for `target`.
    ///
    /// The target is not checked; a dangling alias fails only when resolved.
    pub fn alias(&self, alias: impl Into<ServiceId>, target: impl Into<ServiceId>) {
        self.registry.write().alias(alias.into(), target.into());
    }

    /// Applies a provider.
    ///
    /// Eager providers (and every provider when `defer_providers` is off)
    /// register immediately. A deferred provider that advertises ids
    /// registers on first `get` or `extend` of one of them.
    pub fn register<P: Provider + 'static>(&self, provider: P) -> Result<()> {
        let provider: Arc<dyn Provider> = Arc::new(provider);
        let provides = provider.provides();
        let record = ProviderRecord {
            name: provider.name().to_string(),
            provides: provides.clone(),
            deferred: self.settings.defer_providers && provider.is_deferred() && !provides.is_empty(),
        };

        if record.deferred {
            let pending = Arc::new(DeferredProvider::new(provider, provides));
            let mut registry = self.registry.write();
            registry.defer(pending);
            registry.record_provider(record);
            return Ok(());
        }

        debug!(provider = %record.name, "Registering provider");
        provider.register(self)?;
        self.registry.write().record_provider(record);
        Ok(())
    }

    /// Registered providers, in registration order.
    pub fn providers(&self) -> Vec<ProviderRecord> {
        self.registry.read().providers().to_vec()
    }

    // ── Decoration ──

    /// Decorates the service registered under `id`.
    ///
    /// The next resolve builds the original service, then returns whatever
    /// `extender` makes of it. The lifecycle is kept and any cached instance
    /// is dropped.
    ///
    /// # Errors
    /// [`ContainerError::ServiceNotFound`] if `id` has no definition.
    pub fn extend<T, U, F>(&self, id: impl Into<ServiceId>, extender: F) -> Result<()>
    where
        T: Send + Sync + 'static,
        U: Send + Sync + 'static,
        F: Fn(Arc<T>, &dyn Resolver) -> Result<U> + Send + Sync + 'static,
    {
        let id = id.into();
        let owner = id.clone();
        self.extend_instance(
            id,
            move |instance: Instance, resolver: &dyn Resolver| {
                let typed = instance
                    .downcast::<T>()
                    .map_err(|_| ContainerError::type_mismatch::<T>(&owner))?;
                extender(typed, resolver).map(|value| Arc::new(value) as Instance)
            },
        )
    }

    /// Type-erased form of [`extend`](Self::extend).
    pub fn extend_instance(
        &self,
        id: impl Into<ServiceId>,
        extender: impl Fn(Instance, &dyn Resolver) -> Result<Instance> + Send + Sync + 'static,
    ) -> Result<()> {
        self.extend_with(id.into(), Arc::new(extender))
    }

    fn extend_with(&self, id: ServiceId, extender: ExtenderFn) -> Result<()> {
        self.load_pending(&id)?;
        self.wrap_definition(id, extender, Registry::define)
    }

    /// Replaces the definition behind `id` with one that decorates it.
    /// `store` is how the replacement is written back.
    fn wrap_definition(
        &self,
        id: ServiceId,
        extender: ExtenderFn,
        store: fn(&mut Registry, ServiceId, Definition),
    ) -> Result<()> {
        let mut registry = self.registry.write();
        let canonical = registry.canonical(&id);
        let Some(original) = registry.definition(&canonical).cloned() else {
            return Err(self.not_found(&registry, &id, None));
        };

        let owner = canonical.clone();
        let wrapped: FactoryFn = Arc::new(move |resolver: &dyn Resolver| {
            let instance = resolver.resolve_concrete(&owner, &original.concrete)?;
            extender(instance, resolver)
        });

        debug!(id = %canonical, "Extended service");
        store(
            &mut *registry,
            canonical,
            Definition { concrete: Concrete::Factory(wrapped), lifecycle: original.lifecycle },
        );
        Ok(())
    }

    // ── Introspection ──

    /// Whether a shared instance for `id` is currently cached.
    pub fn resolved(&self, id: impl Into<ServiceId>) -> bool {
        let registry = self.registry.read();
        let canonical = registry.canonical(&id.into());
        registry.instance(&canonical).is_some()
    }

    /// Whether `id` is registered as shared. Unknown ids are not shared.
    pub fn is_shared(&self, id: impl Into<ServiceId>) -> bool {
        let registry = self.registry.read();
        let canonical = registry.canonical(&id.into());
        registry
            .definition(&canonical)
            .is_some_and(Definition::is_shared)
    }

    pub fn is_alias(&self, id: impl Into<ServiceId>) -> bool {
        self.registry.read().alias_target(&id.into()).is_some()
    }

    pub fn alias_target(&self, id: impl Into<ServiceId>) -> Option<ServiceId> {
        self.registry.read().alias_target(&id.into()).cloned()
    }

    /// Lifecycle of the definition behind `id`, if any.
    pub fn lifecycle(&self, id: impl Into<ServiceId>) -> Option<Lifecycle> {
        let registry = self.registry.read();
        let canonical = registry.canonical(&id.into());
        registry.definition(&canonical).map(|definition| definition.lifecycle)
    }

    /// Union of definition ids, cached ids and alias ids; sorted, no
    /// duplicates.
    ///
    /// Ids a pending deferred provider advertises are left out until it
    /// loads, although [`has`](ResolverExt::has) loads it and may report
    /// them.
    pub fn service_ids(&self) -> Vec<ServiceId> {
        self.registry.read().service_ids()
    }

    /// Number of definitions.
    pub fn len(&self) -> usize {
        self.registry.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.read().is_empty()
    }

    // ── Cache management ──

    /// Drops the cached instance for `id`; the definition stays.
    pub fn forget_instance(&self, id: impl Into<ServiceId>) -> bool {
        let mut registry = self.registry.write();
        let canonical = registry.canonical(&id.into());
        registry.forget_instance(&canonical)
    }

    /// Drops every cached instance; definitions stay.
    pub fn forget_instances(&self) {
        self.registry.write().forget_instances();
    }

    /// Wipes definitions, aliases, cached instances and providers.
    pub fn clear(&self) {
        debug!("Clearing container");
        self.registry.write().clear();
    }

    // ── Validation ──

    /// Walks every type definition's parameter graph without building
    /// anything.
    ///
    /// # Errors
    /// - [`ContainerError::CircularDependency`]: cycle detected
    /// - [`ContainerError::UnresolvableParameter`]: a parameter has no
    ///   resolution path
    /// - [`ContainerError::InvalidDefinition`]: an abstract type registered
    ///   as a type definition
    #[instrument(skip(self), name = "container_validate")]
    pub fn validate(&self) -> Result<()> {
        let registry = self.registry.read();
        GraphValidator::new(&registry).validate()
    }

    // ── Resolution internals ──

    /// Whether `id` resolves to something, loading a deferred provider
    /// behind it first so the answer matches what `get` would find.
    pub(crate) fn bound(&self, id: &ServiceId) -> Result<bool> {
        self.load_pending(id)?;
        let registry = self.registry.read();
        Ok(registry.contains(&registry.canonical(id)))
    }

    /// [`bound`](Self::bound), treating a failing provider as unbound.
    pub(crate) fn is_bound(&self, id: &ServiceId) -> bool {
        self.bound(id).unwrap_or_else(|err| {
            warn!(id = %id, error = %err, "Deferred provider failed while checking binding");
            false
        })
    }

    /// Loads deferred providers for `id`, before and after its alias hop.
    /// A provider may add the alias that leads to another pending id.
    fn load_pending(&self, id: &ServiceId) -> Result<()> {
        let before = self.registry.read().canonical(id);
        self.load_deferred(&before)?;
        let after = self.registry.read().canonical(id);
        if after != before {
            self.load_deferred(&after)?;
        }
        Ok(())
    }

    /// Runs the deferred provider for `canonical`, if one is pending.
    fn load_deferred(&self, canonical: &ServiceId) -> Result<()> {
        let pending = self.registry.read().deferred(canonical).cloned();
        let Some(pending) = pending else {
            return Ok(());
        };
        pending.load(&Loading(self))?;

        let mut registry = self.registry.write();
        if registry.settle(&pending) {
            for advertised in pending.provides() {
                let target = registry.canonical(advertised);
                if !registry.contains(&target) {
                    warn!(
                        id = %advertised,
                        provider = pending.name(),
                        "Deferred provider did not register an advertised service"
                    );
                }
            }
        }
        Ok(())
    }

    fn not_found(&self, registry: &Registry, id: &ServiceId, required_by: Option<ServiceId>) -> ContainerError {
        let known = registry.service_ids();
        let known: Vec<&str> = known.iter().map(ServiceId::as_str).collect();
        ContainerError::ServiceNotFound(ServiceNotFoundError {
            requested: id.clone(),
            required_by,
            suggestions: suggest_similar(id.as_str(), &known, self.settings.max_suggestions),
        })
    }

    pub(crate) fn resolve_in(&self, id: &ServiceId, cx: &Resolution<'_>) -> Result<Instance> {
        self.load_pending(id)?;

        let (canonical, definition, revision) = {
            let registry = self.registry.read();
            // loading a provider may have added the alias
            let canonical = registry.canonical(id);
            if let Some(instance) = registry.instance(&canonical) {
                trace!(id = %canonical, "Resolved from cache");
                return Ok(instance.clone());
            }
            match (registry.definition(&canonical), registry.revision(&canonical)) {
                (Some(definition), Some(revision)) => (canonical, definition.clone(), revision),
                _ => return Err(self.not_found(&registry, id, cx.current())),
            }
        };

        let _guard = cx.enter(&canonical)?;
        trace!(id = %canonical, lifecycle = %definition.lifecycle, "Resolving");
        let instance = self.concrete_in(&canonical, &definition.concrete, cx)?;

        if definition.is_shared() {
            return Ok(self.registry.write().store_instance(canonical, instance, revision));
        }
        Ok(instance)
    }

    pub(crate) fn concrete_in(
        &self,
        owner: &ServiceId,
        concrete: &Concrete,
        cx: &Resolution<'_>,
    ) -> Result<Instance> {
        match concrete {
            Concrete::Factory(factory) => factory(cx as &dyn Resolver),
            Concrete::Instance(instance) => Ok(instance.clone()),
            Concrete::Type(type_ref) => self.construct_in(owner, type_ref, &Overrides::new(), cx),
        }
    }

    pub(crate) fn construct_in(
        &self,
        owner: &ServiceId,
        type_ref: &TypeRef,
        overrides: &Overrides,
        cx: &Resolution<'_>,
    ) -> Result<Instance> {
        let Some(constructor) = type_ref.constructor() else {
            return Err(ContainerError::invalid_definition(
                owner,
                format!("{} is not a constructible type", type_ref.id()),
            ));
        };
        let parameters = type_ref.parameters();
        let args = self.arguments_in(owner, &parameters, overrides, cx)?;
        constructor(&args)
    }

    pub(crate) fn arguments_in(
        &self,
        owner: &ServiceId,
        parameters: &[Parameter],
        overrides: &Overrides,
        cx: &Resolution<'_>,
    ) -> Result<Arguments> {
        let mut slots = Vec::with_capacity(parameters.len());
        for parameter in parameters {
            let value = self.parameter_in(owner, parameter, overrides, cx)?;
            slots.push((parameter.name(), value));
        }
        Ok(Arguments::new(owner.clone(), slots))
    }

    /// override → registry → direct construction → default → optional.
    fn parameter_in(
        &self,
        owner: &ServiceId,
        parameter: &Parameter,
        overrides: &Overrides,
        cx: &Resolution<'_>,
    ) -> Result<Option<Instance>> {
        if let Some(value) = overrides.get(parameter.name()) {
            return Ok(Some(value.clone()));
        }

        if let ParameterKind::Service { id, constructor } = parameter.kind() {
            if self.bound(id)? {
                return self.resolve_in(id, cx).map(Some);
            }
            if let Some(type_ref) = constructor {
                return cx.build_type(type_ref, &Overrides::new()).map(Some);
            }
        }

        if let Some(value) = parameter.default_value() {
            return Ok(Some(value));
        }
        if parameter.is_optional() {
            return Ok(None);
        }
        Err(parameter.unresolvable(owner))
    }
}

impl Resolver for Container {
    fn resolve_id(&self, id: &ServiceId) -> Result<Instance> {
        Resolution::new(self).resolve_id(id)
    }

    fn contains(&self, id: &ServiceId) -> bool {
        self.is_bound(id)
    }

    fn build_type(&self, type_ref: &TypeRef, overrides: &Overrides) -> Result<Instance> {
        Resolution::new(self).build_type(type_ref, overrides)
    }

    fn resolve_concrete(&self, owner: &ServiceId, concrete: &Concrete) -> Result<Instance> {
        Resolution::new(self).resolve_concrete(owner, concrete)
    }

    fn resolve_arguments(
        &self,
        owner: &ServiceId,
        parameters: &[Parameter],
        overrides: &Overrides,
    ) -> Result<Arguments> {
        Resolution::new(self).resolve_arguments(owner, parameters, overrides)
    }
}

// Registrar impl so providers can register into the container
impl Registrar for Container {
    fn set(&self, id: ServiceId, concrete: Concrete, shared: bool) {
        Container::set(self, id, concrete, shared);
    }

    fn alias(&self, alias: ServiceId, target: ServiceId) {
        Container::alias(self, alias, target);
    }

    fn extend_instance(&self, id: ServiceId, extender: ExtenderFn) -> Result<()> {
        self.extend_with(id, extender)
    }
}

/// The registrar a deferred provider loads through. Unlike the container's
/// own, its writes do not shadow the provider's other pending ids, and
/// extending does not try to load the provider again.
struct Loading<'c>(&'c Container);

impl Registrar for Loading<'_> {
    fn set(&self, id: ServiceId, concrete: Concrete, shared: bool) {
        self.0.registry.write().provide(id, Definition::new(concrete, shared));
    }

    fn alias(&self, alias: ServiceId, target: ServiceId) {
        self.0.registry.write().provide_alias(alias, target);
    }

    fn extend_instance(&self, id: ServiceId, extender: ExtenderFn) -> Result<()> {
        self.0.wrap_definition(id, extender, Registry::provide)
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.read();
        f.debug_struct("Container")
            .field("registered", &registry.len())
            .field("providers", &registry.providers().len())
            .finish()
    }
}

// ═══════════════════════════════════════════
// ContainerBuilder
// ═══════════════════════════════════════════

/// Fluent startup wiring for a [`Container`].
///
/// ```rust,ignore
/// let container = Container::builder()
///     .instance("config", Config::load())
///     .singleton("db", Concrete::factory(|r| { ... }))
///     .provider(MailProvider)
///     .validate(true)
///     .build()?;
/// ```
pub struct ContainerBuilder {
    container: Container,
    error: Option<ContainerError>,
    validate: bool,
}

impl ContainerBuilder {
    fn new() -> Self {
        Self {
            container: Container::new(),
            error: None,
            validate: false,
        }
    }

    /// Replaces the settings. Call before adding providers, since deferral
    /// is decided when a provider is added.
    pub fn settings(mut self, settings: Settings) -> Self {
        self.container.settings = settings;
        self
    }

    /// Run [`Container::validate`] during [`build`](Self::build).
    pub fn validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn singleton(self, id: impl Into<ServiceId>, concrete: impl Into<Concrete>) -> Self {
        self.container.singleton(id, concrete);
        self
    }

    pub fn factory(self, id: impl Into<ServiceId>, concrete: impl Into<Concrete>) -> Self {
        self.container.factory(id, concrete);
        self
    }

    pub fn instance<T: Send + Sync + 'static>(self, id: impl Into<ServiceId>, value: T) -> Self {
        self.container.instance(id, value);
        self
    }

    pub fn alias(self, alias: impl Into<ServiceId>, target: impl Into<ServiceId>) -> Self {
        self.container.alias(alias, target);
        self
    }

    /// Add a [`Provider`]. The first provider error is reported by `build`.
    pub fn provider<P: Provider + 'static>(mut self, provider: P) -> Self {
        if self.error.is_none() {
            if let Err(err) = self.container.register(provider) {
                self.error = Some(err);
            }
        }
        self
    }

    /// Finishes wiring.
    ///
    /// # Errors
    /// The first provider error, or a validation error when validation is on.
    #[instrument(skip(self), name = "container_build")]
    pub fn build(self) -> Result<Container> {
        if let Some(err) = self.error {
            return Err(err);
        }
        info!(registered = self.container.len(), "Building container");
        if self.validate {
            self.container.validate()?;
        }
        info!("Container built successfully ✓");
        Ok(self.container)
    }
}

impl fmt::Debug for ContainerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerBuilder")
            .field("container", &self.container)
            .field("validate", &self.validate)
            .finish()
    }
}

// ═══════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════

pub mod prelude {
    pub use super::{Container, ContainerBuilder};
    pub use crate::definition::{Concrete, Definition, ExtenderFn, FactoryFn};
    pub use crate::error::{ContainerError, Result};
    pub use crate::inject::{Arguments, Callable, Injectable, Instance, Overrides, Parameter, ParameterKind, TypeRef};
    pub use crate::key::ServiceId;
    pub use crate::lifecycle::Lifecycle;
    pub use crate::provider::{Provider, Registrar, RegistrarExt};
    pub use crate::resolver::{Resolver, ResolverExt};
    pub use crate::settings::Settings;
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════

//! The resolution surface handed to factories, extenders and callers.
//!
//! [`Resolver`] is object-safe so factories can take `&dyn Resolver`;
//! [`ResolverExt`] layers the typed, generic helpers on top of it.
//!
//! Every top-level resolution walks the graph with its own
//! [`Resolution`], which tracks the ids currently being built. Asking for
//! an id that is already on that stack fails with
//! [`ContainerError::CircularDependency`] instead of recursing forever.

use std::cell::RefCell;
use std::sync::Arc;

use tracing::warn;

use crate::container::Container;
use crate::definition::Concrete;
use crate::error::{CircularDependencyError, ContainerError, Result};
use crate::inject::{Arguments, Callable, Injectable, Instance, Overrides, Parameter, TypeRef};
use crate::key::ServiceId;

/// Trait for resolving services.
///
/// Implemented by [`Container`] and by the per-resolution context that
/// factories receive.
pub trait Resolver {
    /// Resolves `id` (one alias hop), honoring the cache for shared services.
    fn resolve_id(&self, id: &ServiceId) -> Result<Instance>;

    /// Whether `id` (one alias hop) has a definition, a cached instance or
    /// a deferred provider.
    fn contains(&self, id: &ServiceId) -> bool;

    /// Builds a fresh instance of a type; the cache is neither read nor written.
    fn build_type(&self, type_ref: &TypeRef, overrides: &Overrides) -> Result<Instance>;

    /// Produces an instance from a concrete on behalf of `owner`, without caching.
    fn resolve_concrete(&self, owner: &ServiceId, concrete: &Concrete) -> Result<Instance>;

    /// Resolves a parameter list in declaration order.
    fn resolve_arguments(
        &self,
        owner: &ServiceId,
        parameters: &[Parameter],
        overrides: &Overrides,
    ) -> Result<Arguments>;
}

/// Typed helpers over any [`Resolver`], including `dyn Resolver`.
pub trait ResolverExt: Resolver {
    /// Returns true iff `get` would not fail with `ServiceNotFound`.
    fn has(&self, id: impl Into<ServiceId>) -> bool {
        self.contains(&id.into())
    }

    /// Resolves `id` as its type-erased instance.
    fn get_instance(&self, id: impl Into<ServiceId>) -> Result<Instance> {
        self.resolve_id(&id.into())
    }

    /// Resolves `id` and downcasts it to `Arc<T>`.
    fn get<T: Send + Sync + 'static>(&self, id: impl Into<ServiceId>) -> Result<Arc<T>> {
        let id = id.into();
        self.resolve_id(&id)?
            .downcast::<T>()
            .map_err(|_| ContainerError::type_mismatch::<T>(&id))
    }

    /// Resolves `id` and clones the value out; use for trait object
    /// handles (`Arc<dyn Logger>`) and plain values.
    fn get_cloned<T: Clone + Send + Sync + 'static>(&self, id: impl Into<ServiceId>) -> Result<T> {
        let id = id.into();
        let instance = self.resolve_id(&id)?;
        (*instance)
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| ContainerError::type_mismatch::<T>(&id))
    }

    /// Builds a fresh `T`, bypassing the cache and any registered
    /// lifecycle for it.
    fn make<T: Injectable>(&self, overrides: Overrides) -> Result<Arc<T>> {
        let type_ref = TypeRef::of::<T>();
        self.build_type(&type_ref, &overrides)?
            .downcast::<T>()
            .map_err(|_| ContainerError::type_mismatch::<T>(type_ref.id()))
    }

    /// Invokes `callable`, resolving its parameters the way `make` does.
    fn call<R>(&self, callable: &Callable<'_, R>, overrides: Overrides) -> Result<R> {
        let args = self.resolve_arguments(callable.name(), callable.parameters(), &overrides)?;
        callable.invoke(&args)
    }
}

impl<R: Resolver + ?Sized> ResolverExt for R {}

/// One resolution walk: the container plus the stack of ids in progress.
pub(crate) struct Resolution<'c> {
    container: &'c Container,
    stack: RefCell<Vec<ServiceId>>,
}

impl<'c> Resolution<'c> {
    pub(crate) fn new(container: &'c Container) -> Self {
        Self { container, stack: RefCell::new(Vec::new()) }
    }

    /// Pushes `id`, failing if it is already being resolved.
    pub(crate) fn enter(&self, id: &ServiceId) -> Result<StackGuard<'_>> {
        let mut stack = self.stack.borrow_mut();
        if let Some(start) = stack.iter().position(|entry| entry == id) {
            let mut chain = stack[start..].to_vec();
            chain.push(id.clone());
            warn!(cycle = ?chain, "Circular dependency detected");
            return Err(ContainerError::CircularDependency(CircularDependencyError { chain }));
        }
        stack.push(id.clone());
        Ok(StackGuard { stack: &self.stack })
    }

    /// The service currently being built, if any.
    pub(crate) fn current(&self) -> Option<ServiceId> {
        self.stack.borrow().last().cloned()
    }
}

impl Resolver for Resolution<'_> {
    fn resolve_id(&self, id: &ServiceId) -> Result<Instance> {
        self.container.resolve_in(id, self)
    }

    fn contains(&self, id: &ServiceId) -> bool {
        self.container.is_bound(id)
    }

    fn build_type(&self, type_ref: &TypeRef, overrides: &Overrides) -> Result<Instance> {
        let _guard = self.enter(type_ref.id())?;
        self.container.construct_in(type_ref.id(), type_ref, overrides, self)
    }

    fn resolve_concrete(&self, owner: &ServiceId, concrete: &Concrete) -> Result<Instance> {
        self.container.concrete_in(owner, concrete, self)
    }

    fn resolve_arguments(
        &self,
        owner: &ServiceId,
        parameters: &[Parameter],
        overrides: &Overrides,
    ) -> Result<Arguments> {
        self.container.arguments_in(owner, parameters, overrides, self)
    }
}

/// Pops its id when dropped, on success and error paths alike.
pub(crate) struct StackGuard<'a> {
    stack: &'a RefCell<Vec<ServiceId>>,
}

impl Drop for StackGuard<'_> {
    fn drop(&mut self) {
        self.stack.borrow_mut().pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enter_detects_reentry() {
        let container = Container::new();
        let resolution = Resolution::new(&container);
        let a = ServiceId::from("a");
        let b = ServiceId::from("b");

        let _ga = resolution.enter(&a).unwrap();
        let _gb = resolution.enter(&b).unwrap();
        match resolution.enter(&a) {
            Err(ContainerError::CircularDependency(err)) => {
                assert_eq!(err.chain, vec![a.clone(), b.clone(), a.clone()]);
            }
            other => panic!("Expected CircularDependency, got: {:?}", other.map(|_| ())),
        }
        assert_eq!(resolution.current(), Some(b));
    }

    #[test]
    fn guard_pops_on_drop() {
        let container = Container::new();
        let resolution = Resolution::new(&container);
        let a = ServiceId::from("a");
        {
            let _guard = resolution.enter(&a).unwrap();
            assert_eq!(resolution.current(), Some(a.clone()));
        }
        assert_eq!(resolution.current(), None);
        assert!(resolution.enter(&a).is_ok());
    }
}

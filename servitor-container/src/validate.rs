//! Dependency graph validation.
//!
//! Walks the parameter graph of every type definition without building
//! anything:
//! - Detects circular dependencies
//! - Checks that every parameter has a resolution path
//! - Rejects abstract types registered as type definitions
//!
//! Factories and pre-built instances are opaque leaves: what a factory
//! resolves is only known when it runs.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::definition::{Concrete, Definition};
use crate::error::{CircularDependencyError, ContainerError};
use crate::inject::{Parameter, ParameterKind, TypeRef};
use crate::key::ServiceId;
use crate::lifecycle::Lifecycle;
use crate::registry::Registry;

/// Validates the registered graph for correctness.
///
/// # Algorithm
/// Depth-first search over services and directly constructed types.
/// The "visiting" set holds the current path and detects cycles.
pub(crate) struct GraphValidator<'r> {
    registry: &'r Registry,
    /// Currently being visited (for cycle detection)
    visiting: HashSet<ServiceId>,
    /// Already validated (cache)
    validated: HashSet<ServiceId>,
    /// Current DFS path (for error reporting)
    path: Vec<ServiceId>,
}

impl<'r> GraphValidator<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            visiting: HashSet::new(),
            validated: HashSet::new(),
            path: Vec::new(),
        }
    }

    /// Validates every definition.
    pub fn validate(&mut self) -> Result<(), ContainerError> {
        let mut ids: Vec<ServiceId> = self.registry.definitions().map(|(id, _)| id.clone()).collect();
        ids.sort();

        debug!(definitions = ids.len(), "Starting dependency graph validation");

        for id in ids {
            self.visit_service(&id)?;
        }

        debug!("Dependency graph validation passed ✓");
        Ok(())
    }

    /// Validates the service behind `id` (one alias hop).
    fn visit_service(&mut self, id: &ServiceId) -> Result<(), ContainerError> {
        let canonical = self.registry.canonical(id);
        // deferred or cached-only ids have nothing to inspect
        let Some(definition) = self.registry.definition(&canonical) else {
            return Ok(());
        };
        let Definition { concrete, lifecycle } = definition.clone();

        match concrete {
            Concrete::Factory(_) | Concrete::Instance(_) => Ok(()),
            Concrete::Type(type_ref) => self.visit_type(&canonical, &type_ref, Some(lifecycle)),
        }
    }

    /// Validates a type's constructor under the node key `key`.
    fn visit_type(
        &mut self,
        key: &ServiceId,
        type_ref: &TypeRef,
        lifecycle: Option<Lifecycle>,
    ) -> Result<(), ContainerError> {
        if self.validated.contains(key) {
            return Ok(());
        }

        if self.visiting.contains(key) {
            let start = self.path.iter().position(|k| k == key).unwrap_or(0);
            let mut chain = self.path[start..].to_vec();
            chain.push(key.clone());

            warn!(cycle = ?chain, "Circular dependency detected!");
            return Err(ContainerError::CircularDependency(CircularDependencyError { chain }));
        }

        if !type_ref.is_constructible() {
            return Err(ContainerError::invalid_definition(
                key,
                format!("{} is not a constructible type", type_ref.id()),
            ));
        }

        self.visiting.insert(key.clone());
        self.path.push(key.clone());

        for parameter in type_ref.parameters() {
            self.visit_parameter(key, lifecycle, &parameter)?;
        }

        self.path.pop();
        self.visiting.remove(key);
        self.validated.insert(key.clone());
        Ok(())
    }

    /// Mirrors the runtime order: registry, direct construction, default,
    /// optional. Overrides do not exist at validation time.
    fn visit_parameter(
        &mut self,
        owner: &ServiceId,
        owner_lifecycle: Option<Lifecycle>,
        parameter: &Parameter,
    ) -> Result<(), ContainerError> {
        if let ParameterKind::Service { id, constructor } = parameter.kind() {
            let canonical = self.registry.canonical(id);
            if self.registry.contains(&canonical) {
                self.check_captive(owner, owner_lifecycle, &canonical);
                return self.visit_service(id);
            }
            if let Some(type_ref) = constructor {
                return self.visit_type(type_ref.id(), type_ref, None);
            }
        }

        if parameter.has_default() || parameter.is_optional() {
            return Ok(());
        }
        Err(parameter.unresolvable(owner))
    }

    /// A shared service holding a transient one keeps that single transient
    /// instance alive forever. Legal, but usually unintended.
    fn check_captive(&self, owner: &ServiceId, owner_lifecycle: Option<Lifecycle>, dependency: &ServiceId) {
        let Some(consumer) = owner_lifecycle else {
            return;
        };
        let Some(definition) = self.registry.definition(dependency) else {
            return;
        };
        if consumer > definition.lifecycle {
            warn!(
                consumer = %owner,
                consumer_lifecycle = %consumer,
                dependency = %dependency,
                dependency_lifecycle = %definition.lifecycle,
                "Shared service captures a transient dependency"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::inject::{Arguments, Injectable};
    use std::sync::Arc;

    // === Types for tests ===
    struct Database;
    struct UserRepo;
    struct UserService;

    impl Injectable for Database {
        fn construct(_: &Arguments) -> Result<Self> {
            Ok(Database)
        }
    }

    impl Injectable for UserRepo {
        fn parameters() -> Vec<Parameter> {
            vec![Parameter::service::<Database>("db")]
        }
        fn construct(args: &Arguments) -> Result<Self> {
            args.shared::<Database>("db")?;
            Ok(UserRepo)
        }
    }

    impl Injectable for UserService {
        fn parameters() -> Vec<Parameter> {
            vec![
                Parameter::service::<UserRepo>("repo"),
                Parameter::value::<u32>("page_size").with_default(|| 20u32),
            ]
        }
        fn construct(_: &Arguments) -> Result<Self> {
            Ok(UserService)
        }
    }

    // A → B → C → A, all constructible
    struct A;
    struct B;
    struct C;

    impl Injectable for A {
        fn parameters() -> Vec<Parameter> {
            vec![Parameter::service::<B>("b")]
        }
        fn construct(_: &Arguments) -> Result<Self> {
            Ok(A)
        }
    }

    impl Injectable for B {
        fn parameters() -> Vec<Parameter> {
            vec![Parameter::service::<C>("c")]
        }
        fn construct(_: &Arguments) -> Result<Self> {
            Ok(B)
        }
    }

    impl Injectable for C {
        fn parameters() -> Vec<Parameter> {
            vec![Parameter::service::<A>("a")]
        }
        fn construct(_: &Arguments) -> Result<Self> {
            Ok(C)
        }
    }

    fn define(registry: &mut Registry, id: ServiceId, type_ref: TypeRef, shared: bool) {
        registry.define(id, Definition::new(type_ref, shared));
    }

    #[test]
    fn valid_simple_graph() {
        let mut registry = Registry::new();
        define(&mut registry, ServiceId::of::<UserService>(), TypeRef::of::<UserService>(), false);

        assert!(GraphValidator::new(&registry).validate().is_ok());
    }

    #[test]
    fn detect_cycle_through_direct_construction() {
        let mut registry = Registry::new();
        define(&mut registry, "entry".into(), TypeRef::of::<A>(), false);

        match GraphValidator::new(&registry).validate().unwrap_err() {
            ContainerError::CircularDependency(err) => {
                assert!(err.chain.len() >= 4);
                assert_eq!(err.chain.last(), Some(&ServiceId::of::<A>()));
            }
            other => panic!("Expected CircularDependency, got: {other:?}"),
        }
    }

    #[test]
    fn detect_cycle_through_registry() {
        let mut registry = Registry::new();
        define(&mut registry, ServiceId::of::<A>(), TypeRef::of::<A>(), true);
        define(&mut registry, ServiceId::of::<B>(), TypeRef::of::<B>(), true);
        define(&mut registry, ServiceId::of::<C>(), TypeRef::of::<C>(), true);

        assert!(matches!(
            GraphValidator::new(&registry).validate(),
            Err(ContainerError::CircularDependency(_))
        ));
    }

    #[test]
    fn detect_unresolvable_parameter() {
        let mut registry = Registry::new();
        registry.define(
            "svc".into(),
            Definition::new(TypeRef::of::<UserService>(), true),
        );
        // an interface parameter with nothing registered
        struct NeedsPort;
        impl Injectable for NeedsPort {
            fn parameters() -> Vec<Parameter> {
                trait Port {}
                vec![Parameter::interface::<dyn Port>("port")]
            }
            fn construct(_: &Arguments) -> Result<Self> {
                Ok(NeedsPort)
            }
        }
        define(&mut registry, "needs_port".into(), TypeRef::of::<NeedsPort>(), true);

        match GraphValidator::new(&registry).validate().unwrap_err() {
            ContainerError::UnresolvableParameter(err) => {
                assert_eq!(err.parameter, "port");
                assert_eq!(err.service, ServiceId::from("needs_port"));
            }
            other => panic!("Expected UnresolvableParameter, got: {other:?}"),
        }
    }

    #[test]
    fn factories_and_instances_are_leaves() {
        let mut registry = Registry::new();
        registry.define(
            ServiceId::of::<Database>(),
            Definition::new(Concrete::factory(|_| Ok(Database)), true),
        );
        registry.define(
            "answer".into(),
            Definition::new(Concrete::shared_instance(Arc::new(42u8)), true),
        );
        define(&mut registry, ServiceId::of::<UserRepo>(), TypeRef::of::<UserRepo>(), false);

        assert!(GraphValidator::new(&registry).validate().is_ok());
    }

    #[test]
    fn abstract_type_definition_is_invalid() {
        trait Port {}
        let mut registry = Registry::new();
        define(&mut registry, "port".into(), TypeRef::abstract_of::<dyn Port>(), true);

        assert!(matches!(
            GraphValidator::new(&registry).validate(),
            Err(ContainerError::InvalidDefinition { .. })
        ));
    }

    #[test]
    fn captive_dependency_is_only_a_warning() {
        let mut registry = Registry::new();
        define(&mut registry, ServiceId::of::<Database>(), TypeRef::of::<Database>(), false);
        define(&mut registry, ServiceId::of::<UserRepo>(), TypeRef::of::<UserRepo>(), true);

        assert!(GraphValidator::new(&registry).validate().is_ok());
    }

    #[test]
    fn diamond_dependency_ok() {
        //     Top
        //    /   \
        //  Left  Right
        //    \   /
        //   Database
        struct Left;
        struct Right;
        struct Top;

        impl Injectable for Left {
            fn parameters() -> Vec<Parameter> {
                vec![Parameter::service::<Database>("db")]
            }
            fn construct(_: &Arguments) -> Result<Self> {
                Ok(Left)
            }
        }
        impl Injectable for Right {
            fn parameters() -> Vec<Parameter> {
                vec![Parameter::service::<Database>("db")]
            }
            fn construct(_: &Arguments) -> Result<Self> {
                Ok(Right)
            }
        }
        impl Injectable for Top {
            fn parameters() -> Vec<Parameter> {
                vec![Parameter::service::<Left>("left"), Parameter::service::<Right>("right")]
            }
            fn construct(_: &Arguments) -> Result<Self> {
                Ok(Top)
            }
        }

        let mut registry = Registry::new();
        define(&mut registry, ServiceId::of::<Top>(), TypeRef::of::<Top>(), true);
        assert!(GraphValidator::new(&registry).validate().is_ok());
    }
}

//! Service definitions: the registered recipe plus its lifecycle.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::inject::{Injectable, Instance, TypeRef};
use crate::lifecycle::Lifecycle;
use crate::resolver::Resolver;

/// Type alias for factory functions.
///
/// A factory receives the [`Resolver`] (to resolve its own dependencies)
/// and returns an instance or an error.
pub type FactoryFn = Arc<dyn Fn(&dyn Resolver) -> Result<Instance> + Send + Sync>;

/// Decorates an already resolved instance; see `Container::extend`.
pub type ExtenderFn = Arc<dyn Fn(Instance, &dyn Resolver) -> Result<Instance> + Send + Sync>;

/// How a service is produced.
#[derive(Clone)]
pub enum Concrete {
    /// Called with the resolver; its result is returned unmodified.
    Factory(FactoryFn),
    /// Built by introspecting the type's constructor.
    Type(TypeRef),
    /// Already built; returned as is.
    Instance(Instance),
}

impl Concrete {
    /// Wraps a typed factory.
    ///
    /// For interface services return the trait object handle:
    /// `Concrete::factory(|_| Ok(Arc::new(Console) as Arc<dyn Logger>))`.
    pub fn factory<T, F>(factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&dyn Resolver) -> Result<T> + Send + Sync + 'static,
    {
        Concrete::Factory(Arc::new(move |resolver: &dyn Resolver| {
            factory(resolver).map(|value| Arc::new(value) as Instance)
        }))
    }

    /// Wraps a factory that already returns an `Arc<T>`; the `Arc` itself
    /// becomes the instance.
    pub fn shared_factory<T, F>(factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&dyn Resolver) -> Result<Arc<T>> + Send + Sync + 'static,
    {
        Concrete::Factory(Arc::new(move |resolver: &dyn Resolver| {
            factory(resolver).map(|value| value as Instance)
        }))
    }

    /// A constructible type reference for `T`.
    pub fn of<T: Injectable>() -> Self {
        Concrete::Type(TypeRef::of::<T>())
    }

    /// A pre-built value.
    pub fn instance<T: Send + Sync + 'static>(value: T) -> Self {
        Concrete::Instance(Arc::new(value))
    }

    /// A pre-built shared value; identity is preserved.
    pub fn shared_instance<T: Send + Sync + 'static>(value: Arc<T>) -> Self {
        Concrete::Instance(value)
    }

    /// Short name of the variant, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Concrete::Factory(_) => "factory",
            Concrete::Type(_) => "type",
            Concrete::Instance(_) => "instance",
        }
    }
}

impl From<TypeRef> for Concrete {
    fn from(type_ref: TypeRef) -> Self {
        Concrete::Type(type_ref)
    }
}

impl From<FactoryFn> for Concrete {
    fn from(factory: FactoryFn) -> Self {
        Concrete::Factory(factory)
    }
}

impl fmt::Debug for Concrete {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Concrete::Factory(_) => f.write_str("Factory(..)"),
            Concrete::Type(type_ref) => f.debug_tuple("Type").field(type_ref).finish(),
            Concrete::Instance(_) => f.write_str("Instance(..)"),
        }
    }
}

/// Registration entry for a single service.
#[derive(Debug, Clone)]
pub struct Definition {
    pub concrete: Concrete,
    pub lifecycle: Lifecycle,
}

impl Definition {
    pub fn new(concrete: impl Into<Concrete>, shared: bool) -> Self {
        Self { concrete: concrete.into(), lifecycle: Lifecycle::from_shared(shared) }
    }

    #[inline]
    pub fn is_shared(&self) -> bool {
        self.lifecycle.is_shared()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inject::Arguments;

    struct Clock;

    impl Injectable for Clock {
        fn construct(_: &Arguments) -> Result<Self> {
            Ok(Clock)
        }
    }

    #[test]
    fn concrete_kinds() {
        assert_eq!(Concrete::of::<Clock>().kind(), "type");
        assert_eq!(Concrete::instance(1u8).kind(), "instance");
        assert_eq!(Concrete::factory(|_| Ok(1u8)).kind(), "factory");
    }

    #[test]
    fn shared_instance_keeps_identity() {
        let clock = Arc::new(Clock);
        match Concrete::shared_instance(clock.clone()) {
            Concrete::Instance(instance) => {
                let back = instance.downcast::<Clock>().ok().unwrap();
                assert!(Arc::ptr_eq(&clock, &back));
            }
            other => panic!("Expected Instance, got: {other:?}"),
        }
    }

    #[test]
    fn definition_flag_maps_lifecycle() {
        assert!(Definition::new(Concrete::instance(1u8), true).is_shared());
        assert_eq!(
            Definition::new(TypeRef::of::<Clock>(), false).lifecycle,
            Lifecycle::Transient
        );
    }
}

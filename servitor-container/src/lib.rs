//! Core container implementation for Servitor.
//!
//! A [`Container`] maps string ids to definitions (factory closures,
//! constructible types or pre-built instances), caches shared instances,
//! follows one level of aliases, decorates services through extenders and
//! autowires constructor parameters declared by [`Injectable`] types.

pub mod container;
pub mod definition;
pub mod error;
pub mod inject;
pub mod key;
pub mod lifecycle;
pub mod provider;
pub mod registry;
pub mod resolver;
pub mod settings;
mod validate;

pub use container::{prelude, Container, ContainerBuilder};
pub use definition::{Concrete, Definition, ExtenderFn, FactoryFn};
pub use error::{
    CircularDependencyError, ContainerError, Result, ServiceNotFoundError, UnresolvableParameterError,
};
pub use inject::{Arguments, Callable, Injectable, Instance, Overrides, Parameter, ParameterKind, TypeRef};
pub use key::ServiceId;
pub use lifecycle::Lifecycle;
pub use provider::{Provider, Registrar, RegistrarExt};
pub use registry::ProviderRecord;
pub use resolver::{Resolver, ResolverExt};
pub use settings::Settings;

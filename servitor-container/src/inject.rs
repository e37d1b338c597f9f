//! Constructor introspection.
//!
//! Rust has no runtime reflection, so a type describes its own constructor:
//! [`Injectable::parameters`] lists what it needs and
//! [`Injectable::construct`] builds it from the resolved [`Arguments`].
//! `#[derive(Injectable)]` writes both for you.
//!
//! ```rust
//! use std::sync::Arc;
//! use servitor_container::prelude::*;
//!
//! struct Db;
//! impl Injectable for Db {
//!     fn construct(_: &Arguments) -> Result<Self> { Ok(Db) }
//! }
//!
//! struct Repo { db: Arc<Db>, page_size: u32 }
//! impl Injectable for Repo {
//!     fn parameters() -> Vec<Parameter> {
//!         vec![
//!             Parameter::service::<Db>("db"),
//!             Parameter::value::<u32>("page_size").with_default(|| 50u32),
//!         ]
//!     }
//!     fn construct(args: &Arguments) -> Result<Self> {
//!         Ok(Repo { db: args.shared("db")?, page_size: args.cloned("page_size")? })
//!     }
//! }
//!
//! let container = Container::new();
//! let repo: Arc<Repo> = container.make(Overrides::new()).unwrap();
//! assert_eq!(repo.page_size, 50);
//! ```

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{ContainerError, Result, UnresolvableParameterError};
use crate::key::ServiceId;

/// A resolved service, type-erased.
///
/// A value of type `T` is stored as `Arc<T>`; identity is `Arc::ptr_eq`.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Produces a parameter's default value on demand.
pub type DefaultFn = Arc<dyn Fn() -> Instance + Send + Sync>;

type ConstructorFn = fn(&Arguments) -> Result<Instance>;

/// A type the container can build by resolving its constructor parameters.
pub trait Injectable: Sized + Send + Sync + 'static {
    /// Constructor parameters in declaration order.
    ///
    /// The default is an empty list: the type is built with no arguments.
    fn parameters() -> Vec<Parameter> {
        Vec::new()
    }

    /// Builds the value from resolved arguments.
    fn construct(args: &Arguments) -> Result<Self>;
}

fn construct_erased<T: Injectable>(args: &Arguments) -> Result<Instance> {
    T::construct(args).map(|value| Arc::new(value) as Instance)
}

fn no_parameters() -> Vec<Parameter> {
    Vec::new()
}

/// Runtime descriptor of a type: its id, parameter list and constructor.
#[derive(Clone)]
pub struct TypeRef {
    id: ServiceId,
    parameters: fn() -> Vec<Parameter>,
    constructor: Option<ConstructorFn>,
}

impl TypeRef {
    /// Describes a constructible type.
    pub fn of<T: Injectable>() -> Self {
        Self {
            id: ServiceId::of::<T>(),
            parameters: T::parameters,
            constructor: Some(construct_erased::<T>),
        }
    }

    /// Describes a type that cannot be constructed on its own, such as
    /// an interface (`dyn Trait`).
    pub fn abstract_of<T: ?Sized + 'static>() -> Self {
        Self {
            id: ServiceId::of::<T>(),
            parameters: no_parameters,
            constructor: None,
        }
    }

    #[inline]
    pub fn id(&self) -> &ServiceId {
        &self.id
    }

    /// Introspects the constructor's parameter list.
    pub fn parameters(&self) -> Vec<Parameter> {
        (self.parameters)()
    }

    #[inline]
    pub fn is_constructible(&self) -> bool {
        self.constructor.is_some()
    }

    pub(crate) fn constructor(&self) -> Option<ConstructorFn> {
        self.constructor
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRef")
            .field("id", &self.id)
            .field("constructible", &self.is_constructible())
            .finish()
    }
}

/// What a parameter is declared as.
#[derive(Debug, Clone)]
pub enum ParameterKind {
    /// A class or interface: resolvable through the registry, and directly
    /// constructible when `constructor` is set.
    Service {
        id: ServiceId,
        constructor: Option<TypeRef>,
    },
    /// A primitive: only overrides, defaults and optionality apply.
    Value { type_name: &'static str },
}

/// One declared constructor (or callable) parameter.
#[derive(Clone)]
pub struct Parameter {
    name: &'static str,
    kind: ParameterKind,
    default: Option<DefaultFn>,
    optional: bool,
}

impl Parameter {
    /// A parameter of concrete service type `T`.
    ///
    /// Looked up as `ServiceId::of::<T>()`; built directly when unregistered.
    pub fn service<T: Injectable>(name: &'static str) -> Self {
        Self::with_kind(
            name,
            ParameterKind::Service {
                id: ServiceId::of::<T>(),
                constructor: Some(TypeRef::of::<T>()),
            },
        )
    }

    /// A parameter of interface type `I`, e.g. `dyn Logger`.
    ///
    /// Looked up as `ServiceId::of::<I>()`; never built directly.
    pub fn interface<I: ?Sized + 'static>(name: &'static str) -> Self {
        Self::lookup(name, ServiceId::of::<I>())
    }

    /// A parameter resolved only through the registry under `id`.
    pub fn lookup(name: &'static str, id: impl Into<ServiceId>) -> Self {
        Self::with_kind(name, ParameterKind::Service { id: id.into(), constructor: None })
    }

    /// A primitive parameter of type `T`.
    pub fn value<T: ?Sized + 'static>(name: &'static str) -> Self {
        Self::with_kind(name, ParameterKind::Value { type_name: type_name::<T>() })
    }

    fn with_kind(name: &'static str, kind: ParameterKind) -> Self {
        Self { name, kind, default: None, optional: false }
    }

    /// Looks the parameter up under `id` instead of its type name.
    ///
    /// A value parameter becomes a registry lookup.
    pub fn with_id(mut self, id: impl Into<ServiceId>) -> Self {
        let id = id.into();
        self.kind = match self.kind {
            ParameterKind::Service { constructor, .. } => ParameterKind::Service { id, constructor },
            ParameterKind::Value { .. } => ParameterKind::Service { id, constructor: None },
        };
        self
    }

    /// Default used when neither an override nor the registry applies.
    pub fn with_default<T, F>(mut self, default: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.default = Some(Arc::new(move || Arc::new(default()) as Instance));
        self
    }

    /// Like [`with_default`](Self::with_default) for service parameters,
    /// whose instances are the `Arc<T>` itself.
    pub fn with_default_shared<T, F>(mut self, default: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn() -> Arc<T> + Send + Sync + 'static,
    {
        self.default = Some(Arc::new(move || default() as Instance));
        self
    }

    /// Marks the parameter optional: it resolves to absent instead of failing.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn kind(&self) -> &ParameterKind {
        &self.kind
    }

    #[inline]
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    #[inline]
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// The declared type: a service id or a value type name.
    pub fn declared_type(&self) -> &str {
        match &self.kind {
            ParameterKind::Service { id, .. } => id.as_str(),
            ParameterKind::Value { type_name } => type_name,
        }
    }

    pub(crate) fn default_value(&self) -> Option<Instance> {
        self.default.as_ref().map(|default| default())
    }

    pub(crate) fn unresolvable(&self, service: &ServiceId) -> ContainerError {
        ContainerError::UnresolvableParameter(UnresolvableParameterError {
            parameter: self.name.to_string(),
            declared: self.declared_type().to_string(),
            service: service.clone(),
        })
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("default", &self.default.is_some())
            .field("optional", &self.optional)
            .finish()
    }
}

/// Resolved parameter values handed to a constructor or callable body.
///
/// Absent optional parameters hold no value.
pub struct Arguments {
    owner: ServiceId,
    slots: Vec<(&'static str, Option<Instance>)>,
}

impl Arguments {
    pub(crate) fn new(owner: ServiceId, slots: Vec<(&'static str, Option<Instance>)>) -> Self {
        Self { owner, slots }
    }

    /// The service or callable these arguments were resolved for.
    pub fn owner(&self) -> &ServiceId {
        &self.owner
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The raw instance for `name`, if it resolved to a value.
    pub fn instance(&self, name: &str) -> Option<&Instance> {
        self.slots
            .iter()
            .find(|(slot, _)| *slot == name)
            .and_then(|(_, value)| value.as_ref())
    }

    /// A service parameter, as the shared `Arc<T>`.
    pub fn shared<T: Send + Sync + 'static>(&self, name: &'static str) -> Result<Arc<T>> {
        self.optional_shared(name)?
            .ok_or_else(|| self.missing::<T>(name))
    }

    /// A value parameter (or a trait object handle such as
    /// `Arc<dyn Logger>`), cloned out of its instance.
    pub fn cloned<T: Clone + Send + Sync + 'static>(&self, name: &'static str) -> Result<T> {
        self.optional_cloned(name)?
            .ok_or_else(|| self.missing::<T>(name))
    }

    pub fn optional_shared<T: Send + Sync + 'static>(&self, name: &'static str) -> Result<Option<Arc<T>>> {
        match self.slot::<T>(name)? {
            Some(instance) => instance
                .clone()
                .downcast::<T>()
                .map(Some)
                .map_err(|_| ContainerError::type_mismatch::<T>(&self.owner)),
            None => Ok(None),
        }
    }

    pub fn optional_cloned<T: Clone + Send + Sync + 'static>(&self, name: &'static str) -> Result<Option<T>> {
        match self.slot::<T>(name)? {
            Some(instance) => (**instance)
                .downcast_ref::<T>()
                .cloned()
                .map(Some)
                .ok_or_else(|| ContainerError::type_mismatch::<T>(&self.owner)),
            None => Ok(None),
        }
    }

    fn slot<T: 'static>(&self, name: &'static str) -> Result<Option<&Instance>> {
        self.slots
            .iter()
            .find(|(slot, _)| *slot == name)
            .map(|(_, value)| value.as_ref())
            .ok_or_else(|| self.missing::<T>(name))
    }

    fn missing<T: 'static>(&self, name: &'static str) -> ContainerError {
        Parameter::value::<T>(name).unresolvable(&self.owner)
    }
}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let resolved: Vec<(&str, bool)> = self
            .slots
            .iter()
            .map(|(name, value)| (*name, value.is_some()))
            .collect();
        f.debug_struct("Arguments")
            .field("owner", &self.owner)
            .field("resolved", &resolved)
            .finish()
    }
}

/// Named parameter values that take priority over everything else
/// during `make` and `call`.
#[derive(Clone, Default)]
pub struct Overrides {
    values: HashMap<String, Instance>,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides `name` with a value (or a trait object handle).
    pub fn with<T: Send + Sync + 'static>(self, name: impl Into<String>, value: T) -> Self {
        self.with_instance(name, Arc::new(value))
    }

    /// Overrides a service parameter with an existing shared instance.
    pub fn with_shared<T: Send + Sync + 'static>(self, name: impl Into<String>, value: Arc<T>) -> Self {
        self.with_instance(name, value)
    }

    pub fn with_instance(mut self, name: impl Into<String>, instance: Instance) -> Self {
        self.values.insert(name.into(), instance);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Instance> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Overrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.values.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Overrides").field("names", &names).finish()
    }
}

/// A function whose parameters the container resolves, for `call`.
///
/// ```rust
/// use servitor_container::prelude::*;
///
/// let container = Container::new();
/// container.instance("greeting", String::from("hello"));
///
/// let greet = Callable::new("greet", |args| {
///     let greeting: String = args.cloned("greeting")?;
///     let name: String = args.cloned("name")?;
///     Ok(format!("{greeting}, {name}"))
/// })
/// .param(Parameter::lookup("greeting", "greeting"))
/// .param(Parameter::value::<String>("name"));
///
/// let out = container.call(&greet, Overrides::new().with("name", String::from("ada"))).unwrap();
/// assert_eq!(out, "hello, ada");
/// ```
pub struct Callable<'f, R> {
    name: ServiceId,
    parameters: Vec<Parameter>,
    body: Box<dyn Fn(&Arguments) -> Result<R> + 'f>,
}

impl<'f, R> Callable<'f, R> {
    pub fn new(name: impl Into<ServiceId>, body: impl Fn(&Arguments) -> Result<R> + 'f) -> Self {
        Self { name: name.into(), parameters: Vec::new(), body: Box::new(body) }
    }

    /// Appends a parameter; order of calls is declaration order.
    pub fn param(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn name(&self) -> &ServiceId {
        &self.name
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub(crate) fn invoke(&self, args: &Arguments) -> Result<R> {
        (self.body)(args)
    }
}

impl<R> fmt::Debug for Callable<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Leaf;

    impl Injectable for Leaf {
        fn construct(_: &Arguments) -> Result<Self> {
            Ok(Leaf)
        }
    }

    fn args(slots: Vec<(&'static str, Option<Instance>)>) -> Arguments {
        Arguments::new(ServiceId::from("owner"), slots)
    }

    #[test]
    fn type_ref_of_injectable() {
        let t = TypeRef::of::<Leaf>();
        assert!(t.is_constructible());
        assert!(t.parameters().is_empty());
        assert_eq!(t.id(), &ServiceId::of::<Leaf>());
    }

    #[test]
    fn abstract_type_ref_is_not_constructible() {
        trait Port {}
        let t = TypeRef::abstract_of::<dyn Port>();
        assert!(!t.is_constructible());
    }

    #[test]
    fn parameter_kinds() {
        let p = Parameter::service::<Leaf>("leaf");
        assert!(matches!(p.kind(), ParameterKind::Service { constructor: Some(_), .. }));

        let p = Parameter::value::<u16>("port").with_id("config.port");
        match p.kind() {
            ParameterKind::Service { id, constructor } => {
                assert_eq!(id, &ServiceId::from("config.port"));
                assert!(constructor.is_none());
            }
            other => panic!("Expected Service, got: {other:?}"),
        }
        assert_eq!(p.declared_type(), "config.port");
    }

    #[test]
    fn default_value_is_fresh_each_time() {
        let p = Parameter::value::<Vec<u8>>("buf").with_default(Vec::<u8>::new);
        let a = p.default_value().unwrap();
        let b = p.default_value().unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn arguments_shared_keeps_identity() {
        let leaf = Arc::new(Leaf);
        let a = args(vec![("leaf", Some(leaf.clone() as Instance))]);
        let got: Arc<Leaf> = a.shared("leaf").unwrap();
        assert!(Arc::ptr_eq(&leaf, &got));
    }

    #[test]
    fn arguments_cloned_and_optional() {
        let a = args(vec![
            ("port", Some(Arc::new(8080u16) as Instance)),
            ("tls", None),
        ]);
        assert_eq!(a.cloned::<u16>("port").unwrap(), 8080);
        assert_eq!(a.optional_cloned::<bool>("tls").unwrap(), None);
        assert!(a.cloned::<bool>("tls").is_err());
    }

    #[test]
    fn arguments_type_mismatch() {
        let a = args(vec![("port", Some(Arc::new(8080u16) as Instance))]);
        match a.cloned::<String>("port").unwrap_err() {
            ContainerError::TypeMismatch { id, expected } => {
                assert_eq!(id, ServiceId::from("owner"));
                assert!(expected.contains("String"));
            }
            other => panic!("Expected TypeMismatch, got: {other:?}"),
        }
    }

    #[test]
    fn arguments_undeclared_name() {
        let a = args(vec![]);
        assert!(matches!(
            a.shared::<Leaf>("nope"),
            Err(ContainerError::UnresolvableParameter(_))
        ));
    }

    #[test]
    fn overrides_debug_lists_names() {
        let o = Overrides::new().with("b", 1u8).with("a", 2u8);
        assert_eq!(o.len(), 2);
        assert!(format!("{o:?}").contains(r#"["a", "b"]"#));
    }
}

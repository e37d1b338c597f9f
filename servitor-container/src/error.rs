//! Error types for container operations.
//!
//! Every error names the service it is about and, where it helps,
//! carries a hint on how to fix the wiring.

use std::fmt;

use servitor_support::rendering::{render_chain, shorten_type_name};

use crate::key::ServiceId;

/// Main error type for all container operations.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// The requested id (after one alias hop) has neither a definition
    /// nor a cached instance.
    #[error("{}", .0)]
    ServiceNotFound(ServiceNotFoundError),

    /// A constructor or callable parameter had no resolution path.
    #[error("{}", .0)]
    UnresolvableParameter(UnresolvableParameterError),

    /// A registered definition cannot produce an instance.
    #[error("Invalid definition for {id}: {reason}")]
    InvalidDefinition { id: ServiceId, reason: String },

    /// Resolution re-entered a service that is already being resolved.
    #[error("{}", .0)]
    CircularDependency(CircularDependencyError),

    /// An instance was not of the type the caller asked for.
    #[error("Type mismatch for {id}: expected {expected}")]
    TypeMismatch { id: ServiceId, expected: &'static str },

    /// A factory, extender or provider reported its own failure.
    #[error("Failed to construct {id}: {source}")]
    ConstructionFailed {
        id: ServiceId,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ContainerError {
    /// Wraps an arbitrary failure raised while building `id`.
    pub fn construction(
        id: impl Into<ServiceId>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        ContainerError::ConstructionFailed { id: id.into(), source: source.into() }
    }

    pub(crate) fn type_mismatch<T: ?Sized>(id: &ServiceId) -> Self {
        ContainerError::TypeMismatch {
            id: id.clone(),
            expected: std::any::type_name::<T>(),
        }
    }

    pub(crate) fn invalid_definition(id: &ServiceId, reason: impl Into<String>) -> Self {
        ContainerError::InvalidDefinition { id: id.clone(), reason: reason.into() }
    }
}

/// Error when a service id is unknown.
#[derive(Debug)]
pub struct ServiceNotFoundError {
    /// The id that was requested (before the alias hop).
    pub requested: ServiceId,
    /// The service being resolved when the lookup failed, if any.
    pub required_by: Option<ServiceId>,
    /// Known ids that look similar, for "did you mean?" hints.
    pub suggestions: Vec<String>,
}

impl fmt::Display for ServiceNotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service not found: {}", self.requested)?;

        if let Some(ref parent) = self.required_by {
            write!(f, "\n  Required by: {parent}")?;
        }

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {suggestion}")?;
            }
        }

        write!(
            f,
            "\n  Hint: register it with .singleton(\"{}\", ...) or .factory(\"{}\", ...)",
            self.requested, self.requested,
        )
    }
}

/// Error when a parameter cannot be satisfied by override, registry,
/// direct construction, default or optionality.
#[derive(Debug)]
pub struct UnresolvableParameterError {
    /// Parameter name as declared.
    pub parameter: String,
    /// Declared type (a service id or a value type name).
    pub declared: String,
    /// The service or callable whose parameter list was being resolved.
    pub service: ServiceId,
}

impl fmt::Display for UnresolvableParameterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Unresolvable parameter `{}: {}` while resolving {}",
            self.parameter,
            shorten_type_name(&self.declared),
            self.service,
        )?;
        write!(
            f,
            "\n  Hint: register {}, give the parameter a default, make it optional, or pass an override",
            shorten_type_name(&self.declared),
        )
    }
}

/// Error when a circular dependency is detected.
///
/// Shows the full chain so you can see where the cycle closes.
#[derive(Debug)]
pub struct CircularDependencyError {
    /// The ids that form the cycle, first and last being the same.
    pub chain: Vec<ServiceId>,
}

impl fmt::Display for CircularDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Circular dependency detected:\n  {}", render_chain(&self.chain))?;
        write!(
            f,
            "\n  Hint: break the cycle with a factory that resolves one side lazily"
        )
    }
}

/// Convenient Result type for container operations.
pub type Result<T> = std::result::Result<T, ContainerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_not_found_display() {
        let err = ContainerError::ServiceNotFound(ServiceNotFoundError {
            requested: ServiceId::from("mailer"),
            required_by: Some(ServiceId::from("notifier")),
            suggestions: vec!["mailer.smtp".into()],
        });

        let msg = format!("{err}");
        assert!(msg.contains("Service not found: mailer"));
        assert!(msg.contains("Required by: notifier"));
        assert!(msg.contains("- mailer.smtp"));
    }

    #[test]
    fn unresolvable_parameter_display() {
        let err = ContainerError::UnresolvableParameter(UnresolvableParameterError {
            parameter: "port".into(),
            declared: "u16".into(),
            service: ServiceId::from("server"),
        });

        let msg = format!("{err}");
        assert!(msg.contains("`port: u16`"));
        assert!(msg.contains("server"));
    }

    #[test]
    fn circular_dependency_display() {
        let err = ContainerError::CircularDependency(CircularDependencyError {
            chain: vec!["a".into(), "b".into(), "a".into()],
        });

        let msg = format!("{err}");
        assert!(msg.contains("Circular"));
        assert!(msg.contains("a → b → a"));
    }

    #[test]
    fn construction_failed_keeps_source() {
        use std::error::Error as _;

        let err = ContainerError::construction("db", "connection refused");
        assert!(format!("{err}").contains("connection refused"));
        assert!(err.source().is_some());
    }
}

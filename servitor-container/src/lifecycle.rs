//! Service lifecycles.
//!
//! A lifecycle decides whether a resolved service is cached:
//! - [`Lifecycle::Shared`]: one instance per container, cached on first resolve
//! - [`Lifecycle::Transient`]: a new instance on every resolve
//!
//! # Ordering
//! `Shared > Transient`: a shared service outlives a transient one.
use std::fmt;

/// Defines how long a resolved service lives within the container.
///
/// # Examples
/// ```
/// use servitor_container::lifecycle::Lifecycle;
///
/// assert!(Lifecycle::Shared > Lifecycle::Transient);
/// assert_eq!(Lifecycle::from_shared(false), Lifecycle::Transient);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Lifecycle {
    /// One instance shared by every caller for the lifetime of the container.
    ///
    /// Created on first resolve and kept until the container is cleared,
    /// the instance is forgotten, or the definition is replaced or extended.
    /// Laravel `singleton()`, .NET `Singleton`.
    #[default]
    Shared,

    /// New instance created on every resolve call. Never cached.
    /// Laravel `bind()`, .NET `Transient`.
    Transient,
}

impl Lifecycle {
    /// Maps the registration-time `shared` flag.
    #[inline]
    pub fn from_shared(shared: bool) -> Self {
        if shared { Lifecycle::Shared } else { Lifecycle::Transient }
    }

    /// Returns `true` if resolved instances are cached.
    #[inline]
    pub fn is_shared(&self) -> bool {
        matches!(self, Lifecycle::Shared)
    }

    #[inline]
    fn ordering(&self) -> u8 {
        match self {
            Lifecycle::Shared => 1,
            Lifecycle::Transient => 0,
        }
    }
}

impl PartialOrd for Lifecycle {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Lifecycle {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.ordering().cmp(&other.ordering())
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifecycle::Shared => write!(f, "Shared"),
            Lifecycle::Transient => write!(f, "Transient"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_ordering() {
        assert!(Lifecycle::Shared > Lifecycle::Transient);
    }

    #[test]
    fn lifecycle_from_flag() {
        assert_eq!(Lifecycle::from_shared(true), Lifecycle::Shared);
        assert_eq!(Lifecycle::from_shared(false), Lifecycle::Transient);
        assert!(Lifecycle::Shared.is_shared());
        assert!(!Lifecycle::Transient.is_shared());
    }

    #[test]
    fn lifecycle_display() {
        assert_eq!(format!("{}", Lifecycle::Shared), "Shared");
        assert_eq!(format!("{}", Lifecycle::Transient), "Transient");
    }
}

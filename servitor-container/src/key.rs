//! Service identifiers.
//!
//! A [`ServiceId`] names a service inside the container. Ids are plain
//! strings: a short logical name (`"db"`, `"mailer.smtp"`) or the name of a
//! Rust type obtained through [`ServiceId::of`].

use std::any::type_name;
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// Uniquely identifies a service in the container.
///
/// Cloning is cheap: the text is shared behind an `Arc<str>`.
///
/// # Examples
/// ```
/// use servitor_container::key::ServiceId;
///
/// // Logical name
/// let db = ServiceId::from("db");
/// assert_eq!(db.as_str(), "db");
///
/// // Type name
/// let id = ServiceId::of::<String>();
/// assert_eq!(id.as_str(), "alloc::string::String");
/// ```
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceId(Arc<str>);

impl ServiceId {
    /// Creates an id from any string.
    ///
    /// Empty ids are accepted; the container does not validate id format.
    #[inline]
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    /// Creates the id under which type `T` is known.
    ///
    /// Works for unsized types too, which is how interfaces are named:
    /// `ServiceId::of::<dyn Logger>()`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self(Arc::from(type_name::<T>()))
    }

    /// Returns the id text.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for ServiceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ServiceId {
    fn from(id: String) -> Self {
        Self(Arc::from(id))
    }
}

impl From<&String> for ServiceId {
    fn from(id: &String) -> Self {
        Self::new(id)
    }
}

impl From<&ServiceId> for ServiceId {
    fn from(id: &ServiceId) -> Self {
        id.clone()
    }
}

impl Borrow<str> for ServiceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ServiceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for ServiceId {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for ServiceId {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

impl fmt::Debug for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceId({:?})", &*self.0)
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

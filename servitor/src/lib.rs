//! # Servitor: Service Container for Rust
//!
//! Register services under string ids as factories, constructible types or
//! pre-built instances; resolve them with shared or transient lifecycles,
//! aliases, decorators and constructor autowiring.
//!
//! ```rust
//! use std::sync::Arc;
//! use servitor::prelude::*;
//!
//! struct Database {
//!     url: String,
//! }
//!
//! #[derive(Injectable)]
//! struct UserRepository {
//!     #[inject(id = "db", no_autowire)]
//!     db: Arc<Database>,
//! }
//!
//! let container = Container::new();
//! container.singleton("db", Concrete::factory(|_| {
//!     Ok(Database { url: "postgres://localhost/app".to_string() })
//! }));
//! container.singleton("users", TypeRef::of::<UserRepository>());
//!
//! let users: Arc<UserRepository> = container.get("users").unwrap();
//! assert_eq!(users.db.url, "postgres://localhost/app");
//! assert!(Arc::ptr_eq(&users, &container.get("users").unwrap()));
//! ```

pub use servitor_container::*;
pub use servitor_derive::Injectable;
pub use servitor_support as support;

pub mod prelude {
    pub use servitor_container::prelude::*;
    pub use servitor_derive::Injectable;
}

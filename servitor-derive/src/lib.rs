//! Derive macros for Servitor.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use servitor::prelude::*;
//!
//! #[derive(Injectable)]
//! struct Clock;
//!
//! #[derive(Injectable)]
//! struct Scheduler {
//!     clock: Arc<Clock>,
//!     #[inject(default = "8")]
//!     workers: usize,
//! }
//!
//! let container = Container::new();
//! let scheduler: Arc<Scheduler> = container.make(Overrides::new()).unwrap();
//! assert_eq!(scheduler.workers, 8);
//! ```

pub use servitor_macros::Injectable;

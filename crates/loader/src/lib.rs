//! Lazy, memory-bounded lifecycle for the research capability.
//!
//! The [`ResourceLoader`] owns the one capability instance of the process.
//! Nothing is built at startup: the first caller of
//! [`ResourceLoader::acquire`] starts construction on a detached task, every
//! concurrent caller awaits that same construction, and the outcome (loaded
//! handle or failure) is cached for the rest of the process lifetime.

pub mod hints;
pub mod loader;

pub use hints::{HintApplier, ProcessEnv};
pub use loader::{LoadStatus, LoaderStats, ResourceLoader};

//! Research capability implementations for the Deep Researcher API.
//!
//! All capabilities implement `deepresearch_core::ResearchCapability` and are
//! built through a `CapabilityFactory`. [`build_from_config`] selects the
//! factory for the configured research mode; the resource loader decides
//! *when* it runs.

pub mod cache;
pub mod corpus;
#[cfg(feature = "local")]
pub mod embedding;
pub mod placeholder;

use std::sync::Arc;

use deepresearch_config::{AppConfig, ResearchMode};
use deepresearch_core::{CapabilityFactory, MemoryProfile, ResearchCapability, ResearchError};

pub use cache::{MODEL_FILES, ModelCache, ModelPaths};
#[cfg(feature = "local")]
pub use embedding::{EmbeddingFactory, EmbeddingResearcher};
pub use placeholder::{PlaceholderFactory, PlaceholderResearcher};

/// Build the capability factory for the configured research mode.
///
/// Nothing expensive happens here; the factory only runs when the loader
/// first needs the capability.
pub fn build_from_config(config: &AppConfig) -> Arc<dyn CapabilityFactory> {
    match config.research.mode {
        ResearchMode::Placeholder => Arc::new(PlaceholderFactory),
        #[cfg(feature = "local")]
        ResearchMode::Embedding => Arc::new(EmbeddingFactory::from_config(&config.model)),
        #[cfg(not(feature = "local"))]
        ResearchMode::Embedding => Arc::new(UnavailableFactory {
            name: "embedding",
            reason: "embedding mode requires a build with the `local` feature",
        }),
    }
}

/// Factory for a capability this build cannot provide. Every construction
/// fails, which the loader records as a sticky load failure.
#[derive(Debug)]
pub struct UnavailableFactory {
    pub name: &'static str,
    pub reason: &'static str,
}

impl CapabilityFactory for UnavailableFactory {
    fn name(&self) -> &str {
        self.name
    }

    fn build(&self, _profile: &MemoryProfile) -> Result<Arc<dyn ResearchCapability>, ResearchError> {
        Err(ResearchError::Unavailable(self.reason.into()))
    }
}

//! Degraded-mode research capability.
//!
//! Produces a deterministic result from the query text alone, without a
//! model. Used on hosts where the embedding model does not fit, and as the
//! default mode so the service answers `/research` with a stable shape.

use std::sync::Arc;

use async_trait::async_trait;
use deepresearch_core::{
    CapabilityFactory, Finding, MemoryProfile, ResearchCapability, ResearchError, ResearchResult,
};
use tracing::debug;

/// Confidence reported for every placeholder result.
pub const PLACEHOLDER_CONFIDENCE: f64 = 0.85;

/// Processing time reported for every placeholder result, in seconds.
pub const PLACEHOLDER_PROCESSING_TIME: f64 = 0.1;

/// Synthesizes research results from the query text.
#[derive(Debug, Default)]
pub struct PlaceholderResearcher;

impl PlaceholderResearcher {
    pub fn synthesize(query: &str) -> ResearchResult {
        ResearchResult {
            query: query.to_string(),
            sources: 1,
            confidence: PLACEHOLDER_CONFIDENCE,
            findings: vec![Finding {
                content: format!("Research findings for: {query}"),
                source: "Sample Document".into(),
                relevance: PLACEHOLDER_CONFIDENCE,
            }],
            reasoning: format!("Analyzed query: {query}"),
            processing_time: PLACEHOLDER_PROCESSING_TIME,
        }
    }
}

#[async_trait]
impl ResearchCapability for PlaceholderResearcher {
    fn name(&self) -> &str {
        "placeholder"
    }

    async fn process(&self, query: &str) -> Result<ResearchResult, ResearchError> {
        debug!(query_len = query.len(), "Answering with placeholder result");
        Ok(Self::synthesize(query))
    }
}

/// Builds a [`PlaceholderResearcher`]. Construction cannot fail.
#[derive(Debug, Default)]
pub struct PlaceholderFactory;

impl CapabilityFactory for PlaceholderFactory {
    fn name(&self) -> &str {
        "placeholder"
    }

    fn build(&self, _profile: &MemoryProfile) -> Result<Arc<dyn ResearchCapability>, ResearchError> {
        Ok(Arc::new(PlaceholderResearcher))
    }
}

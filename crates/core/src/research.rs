//! Research capability trait and the request/result model.
//!
//! A [`ResearchCapability`] is the expensive, lazily constructed agent. It is
//! built exactly once by a [`CapabilityFactory`] and afterwards shared
//! read-only between all requests.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Error, ResearchError};
use crate::profile::MemoryProfile;

/// Body of `POST /research`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchRequest {
    pub query: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl ResearchRequest {
    /// Reject empty or whitespace-only queries. The query itself is passed
    /// on exactly as received.
    pub fn validate(&self) -> crate::Result<()> {
        if self.query.trim().is_empty() {
            return Err(Error::Validation("query must not be empty".into()));
        }
        Ok(())
    }
}

/// Body of `POST /suggest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionRequest {
    pub query: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// One piece of evidence backing a research result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub content: String,
    pub source: String,
    /// Relevance to the query, in `[0, 1]`
    pub relevance: f64,
}

/// The answer to a research query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchResult {
    pub query: String,

    /// Number of distinct sources consulted
    pub sources: usize,

    /// Overall confidence, in `[0, 1]`
    pub confidence: f64,

    /// Findings ordered by relevance
    pub findings: Vec<Finding>,

    pub reasoning: String,

    /// Wall-clock processing time in seconds
    pub processing_time: f64,
}

/// A proposed refinement of a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub suggested_query: String,
    pub refinement_type: String,
    pub rationale: String,
    /// Confidence in the suggestion, in `[0, 1]`
    pub confidence: f64,
    pub expected_improvement: f64,
}

impl Suggestion {
    /// Suggest narrowing the query down.
    pub fn specificity(query: &str) -> Self {
        Self {
            suggested_query: format!("More specific: {query}"),
            refinement_type: "specificity".into(),
            rationale: "Make the query more specific".into(),
            confidence: 0.8,
            expected_improvement: 0.15,
        }
    }
}

/// Body returned by `POST /suggest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggestionResponse {
    pub success: bool,
    pub suggestions: Vec<Suggestion>,
}

/// The loaded research agent.
///
/// Implementations must be `Send + Sync`: a single instance is shared by all
/// in-flight requests through an `Arc`.
#[async_trait]
pub trait ResearchCapability: Send + Sync {
    /// Short identifier used in logs and status output.
    fn name(&self) -> &str;

    /// Enter the capability's scoped lifecycle. Called once, right after
    /// construction.
    fn enter(&self) -> Result<(), ResearchError> {
        Ok(())
    }

    /// Leave the scoped lifecycle and release held resources.
    fn exit(&self) {}

    /// Release construction-time scratch memory. Best effort.
    fn trim_memory(&self) {}

    /// Answer a research query.
    async fn process(&self, query: &str) -> Result<ResearchResult, ResearchError>;
}

/// Builds the research capability.
///
/// `build` is blocking and may be slow (model download, weight loading); it
/// is run off the async executor and at most once per successful load.
pub trait CapabilityFactory: Send + Sync {
    /// Which capability this factory produces.
    fn name(&self) -> &str;

    /// Construct the capability under the given memory profile.
    fn build(&self, profile: &MemoryProfile) -> Result<Arc<dyn ResearchCapability>, ResearchError>;
}

//! # Deep Researcher Core
//!
//! Domain types, traits, and error definitions for the Deep Researcher API.
//! This crate has **no framework dependencies**. It defines the request and
//! result model plus the seams that the loader, providers, and gateway
//! implement against.
//!
//! ## Design Philosophy
//!
//! The expensive research agent is only ever seen through two traits:
//! - [`CapabilityFactory`] builds it (once, under a [`MemoryProfile`])
//! - [`ResearchCapability`] answers queries once it is loaded
//!
//! Everything else (lazy loading, HTTP, model files) lives in other crates.

pub mod error;
pub mod profile;
pub mod research;

// Re-export key types at crate root for ergonomics
pub use error::{Error, InitError, ResearchError, Result};
pub use profile::{ComputeDevice, MemoryProfile};
pub use research::{
    CapabilityFactory, Finding, ResearchCapability, ResearchRequest, ResearchResult, Suggestion,
    SuggestionRequest, SuggestionResponse,
};

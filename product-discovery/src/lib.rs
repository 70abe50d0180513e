//! Product Discovery AI
//!
//! A multi-agent pipeline that validates early-stage product ideas: market
//! landscape, customer pain mining, opportunity sizing, risk assessment,
//! and a final go/no-go strategy synthesis, with live progress observation
//! and best-effort structured extraction of the final report.

// Static agent/task definition registries
pub mod config;

// LLM-backed agent executor
pub mod executor;

// Orchestrator, streaming facade, run state, result interpreter
pub mod pipeline;

// Capability tool adapters (web search, Reddit, website scraping)
pub mod tools;

pub use product_discovery_sdk as sdk;

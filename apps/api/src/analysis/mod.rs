//! Candidate/job compatibility analysis.

pub mod error;
pub mod fallback;
pub mod handlers;
pub mod hasher;
pub mod models;
pub mod orchestrator;
pub mod prompts;
pub mod repair;
pub mod schema;
pub mod validation;

//! Heuristic applicant-tracking score: eight isolated analyzers, a weighted
//! composite and ranked suggestions.

pub mod analyzers;
pub mod engine;
pub mod fallback;
pub mod handlers;
pub mod suggestions;
pub mod text;
pub mod types;

//! mobility-synth: synthetic daily mobility trajectories and their evaluation.
//!
//! Residents are matched with nearby points of interest, a generative model
//! proposes one day of visits per resident (cached so each resident is
//! generated at most once), and the batch is scored against reference urban
//! mobility statistics.

pub mod config;
pub mod error;
pub mod geo;
pub mod catalog;
pub mod residents;
pub mod traits;
pub mod trajectory;
pub mod store;
pub mod generator;
pub mod llm;
pub mod orchestrator;
pub mod parser;
pub mod evaluation;

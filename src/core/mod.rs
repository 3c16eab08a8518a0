// File: src/core/mod.rs
pub mod engine;
pub mod inference;
pub mod keymodel;
pub mod orchestrator;
pub mod stats;
pub mod types;
pub mod vocabulary;

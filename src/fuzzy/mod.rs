// File: src/fuzzy/mod.rs
pub mod cache;
pub mod fingerprint;
mod lru;

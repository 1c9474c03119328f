//! # rev-core
//!
//! Core types shared across all Reverie crates:
//! - Record structs for the three vector tables (code, doc chunks, PR comments)
//! - Context tags produced by the classifier
//! - The cross-cutting error taxonomy with typed codes and retryability
//! - Content hashing and similarity helpers
//! - Language detection from file extensions

pub mod context;
pub mod errors;
pub mod hash;
pub mod language;
pub mod record;
pub mod similarity;

/// Embedding dimension used system-wide (AllMiniLML6V2).
pub const VECTOR_DIM: usize = 384;

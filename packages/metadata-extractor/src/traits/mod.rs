//! Trait abstractions over the extractor's collaborators.

pub mod fetcher;

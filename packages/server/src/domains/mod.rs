// Business domains
pub mod metadata;

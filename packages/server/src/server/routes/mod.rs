// HTTP routes
pub mod health;
pub mod metadata;

pub use health::*;
pub use metadata::*;

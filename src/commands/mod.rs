//! avix commands

pub mod config;
pub mod index;
pub mod query;

pub use config::ConfigArgs;
pub use index::IndexArgs;
pub use query::QueryArgs;
